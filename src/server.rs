// 该文件是 RadEthix 项目的一部分。
// src/server.rs - HTTP 服务
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::{sync::Arc, time::Duration};

use axum::{
  Router,
  extract::DefaultBodyLimit,
  http::{HeaderValue, Method},
  routing::{get, post},
};
use tower_http::{
  cors::{AllowOrigin, Any, CorsLayer},
  trace::TraceLayer,
};
use tracing::warn;

use crate::{model::Classifier, output::OverlayCompositor, patient::PatientRegistry};

pub mod error;
mod handlers;

pub use self::error::ApiError;

/// 单次预测超时
///
/// 超时只结束请求本身：阻塞线程上的推理会继续跑完，期间仍持有推理会话，
/// 之后的请求会排在它后面。
pub const DEFAULT_PREDICT_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;
pub const DEFAULT_ALLOWED_ORIGINS: [&str; 6] = [
  "http://localhost:3000",
  "http://127.0.0.1:3000",
  "http://localhost:3001",
  "http://127.0.0.1:3001",
  "http://localhost:8000",
  "http://127.0.0.1:8000",
];

/// 各请求共享的服务状态
#[derive(Clone)]
pub struct AppState {
  /// 模型加载失败时为 `None`，服务以降级模式运行
  pub classifier: Option<Arc<dyn Classifier>>,
  pub patients: Arc<PatientRegistry>,
  pub compositor: Arc<OverlayCompositor>,
  pub predict_timeout: Duration,
}

impl AppState {
  pub fn new(classifier: Option<Arc<dyn Classifier>>) -> Self {
    Self {
      classifier,
      patients: Arc::new(PatientRegistry::with_demo_patient()),
      compositor: Arc::new(OverlayCompositor::default()),
      predict_timeout: DEFAULT_PREDICT_TIMEOUT,
    }
  }

  pub fn with_predict_timeout(mut self, timeout: Duration) -> Self {
    self.predict_timeout = timeout;
    self
  }
}

#[derive(Debug, Clone)]
pub struct ServerOptions {
  pub allowed_origins: Vec<String>,
  pub max_upload_bytes: usize,
}

impl Default for ServerOptions {
  fn default() -> Self {
    Self {
      allowed_origins: DEFAULT_ALLOWED_ORIGINS.iter().map(|s| s.to_string()).collect(),
      max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
    }
  }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
  let origins: Vec<HeaderValue> = origins
    .iter()
    .filter_map(|origin| match HeaderValue::from_str(origin) {
      Ok(value) => Some(value),
      Err(_) => {
        warn!("忽略无效的 CORS 来源: {}", origin);
        None
      }
    })
    .collect();

  CorsLayer::new()
    .allow_origin(AllowOrigin::list(origins))
    .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
    .allow_headers(Any)
}

pub fn router(state: AppState, options: &ServerOptions) -> Router {
  Router::new()
    .route("/", get(handlers::index))
    .route("/health", get(handlers::health))
    .route("/diseases", get(handlers::diseases))
    .route("/predict", post(handlers::predict))
    .route("/knowledge", get(handlers::knowledge_search))
    .route("/knowledge/:pathology", get(handlers::knowledge_entry))
    .route("/signup", post(handlers::signup))
    .route("/login", post(handlers::login))
    .route("/verify/:patient_id", get(handlers::verify))
    .layer(DefaultBodyLimit::max(options.max_upload_bytes))
    .layer(cors_layer(&options.allowed_origins))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

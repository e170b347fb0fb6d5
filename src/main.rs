// 该文件是 RadEthix 项目的一部分。
// src/main.rs - 服务主程序
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

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use radethix::{
  args::Args,
  model::load_classifier,
  server::{AppState, router},
};

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    error!("无法监听退出信号: {}", e);
    return;
  }
  info!("收到退出信号，正在停止服务...");
}

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let args = Args::parse();

  info!("RadEthix 胸片分析服务");
  info!("监听地址: {}", args.bind_address());
  info!("预测超时: {:?}", args.predict_timeout());

  let classifier = match &args.model {
    Some(url) => {
      info!("模型地址: {}", url);
      match load_classifier(url) {
        Ok(classifier) => {
          info!(
            "模型加载完成: {}，支持 {} 种病理",
            classifier.name(),
            classifier.pathologies().len()
          );
          Some(classifier)
        }
        Err(e) => {
          error!("模型加载失败: {}，服务将以降级模式运行", e);
          None
        }
      }
    }
    None => {
      warn!("未指定模型，服务将以降级模式运行");
      None
    }
  };

  let state = AppState::new(classifier).with_predict_timeout(args.predict_timeout());
  let app = router(state, &args.server_options());

  let listener = tokio::net::TcpListener::bind(args.bind_address())
    .await
    .with_context(|| format!("无法监听 {}", args.bind_address()))?;
  info!("服务已启动: http://{}", listener.local_addr()?);

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("服务异常退出")?;

  info!("服务已停止");
  Ok(())
}

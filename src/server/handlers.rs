// 该文件是 RadEthix 项目的一部分。
// src/server/handlers.rs - HTTP 路由处理
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

use axum::{
  Json,
  extract::{Multipart, Path, Query, State},
  response::Html,
};
use chrono::Local;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::{
  knowledge::{self, MedicalKnowledgeEntry},
  pathology::Pathology,
  patient::{LoginRequest, Patient, SignupRequest},
  server::{AppState, error::ApiError},
  task::{PredictTask, Prediction, Task, XrayUpload},
};

const ENDPOINTS: [(&str, &str); 9] = [
  ("root", "GET /"),
  ("health", "GET /health"),
  ("diseases", "GET /diseases"),
  ("predict", "POST /predict"),
  ("knowledge", "GET /knowledge?q="),
  ("knowledge_entry", "GET /knowledge/:pathology"),
  ("signup", "POST /signup"),
  ("login", "POST /login"),
  ("verify", "GET /verify/:patient_id"),
];

pub async fn index(State(state): State<AppState>) -> Html<String> {
  let (model, device, pathologies) = match &state.classifier {
    Some(c) => (c.name().to_string(), c.device().to_string(), c.pathologies().len()),
    None => ("not loaded".to_string(), "n/a".to_string(), 0),
  };
  let endpoints: String = ENDPOINTS
    .iter()
    .map(|(_, route)| format!("<li><code>{}</code></li>", route))
    .collect();

  Html(format!(
    r#"<!DOCTYPE html>
<html>
<head><meta charset="UTF-8"><title>RAD-ETHIX API</title></head>
<body>
<h1>RAD-ETHIX API v{version}</h1>
<p>Model: {model}<br>Device: {device}<br>Pathologies: {pathologies}</p>
<h2>Endpoints</h2>
<ul>{endpoints}</ul>
<h2>Test X-ray Upload</h2>
<form action="/predict" method="post" enctype="multipart/form-data">
<input type="file" name="file" accept="image/*" required>
<input type="text" name="patient_id" placeholder="Patient ID (optional)">
<input type="submit" value="Analyze X-ray">
</form>
<p><small>For research and educational purposes.</small></p>
</body>
</html>"#,
    version = env!("CARGO_PKG_VERSION"),
  ))
}

#[derive(Serialize)]
pub struct Health {
  status: &'static str,
  model_loaded: bool,
  device: String,
  runtime: String,
  pathologies: Vec<&'static str>,
  endpoints: serde_json::Map<String, serde_json::Value>,
}

pub async fn health(State(state): State<AppState>) -> Json<Health> {
  let endpoints = ENDPOINTS
    .iter()
    .map(|(name, route)| (name.to_string(), serde_json::Value::from(*route)))
    .collect();

  Json(match &state.classifier {
    Some(c) => Health {
      status: "healthy",
      model_loaded: true,
      device: c.device().to_string(),
      runtime: c.name().to_string(),
      pathologies: c.pathologies().iter().map(|p| p.name()).collect(),
      endpoints,
    },
    None => Health {
      status: "degraded",
      model_loaded: false,
      device: "n/a".to_string(),
      runtime: format!("radethix {}", env!("CARGO_PKG_VERSION")),
      pathologies: Vec::new(),
      endpoints,
    },
  })
}

#[derive(Serialize)]
pub struct Disease {
  name: &'static str,
  description: &'static str,
}

#[derive(Serialize)]
pub struct Diseases {
  diseases: Vec<Disease>,
  total_count: usize,
  source: &'static str,
}

pub async fn diseases() -> Json<Diseases> {
  let diseases: Vec<Disease> = Pathology::ALL
    .iter()
    .map(|p| Disease {
      name: p.name(),
      description: p.description(),
    })
    .collect();
  Json(Diseases {
    total_count: diseases.len(),
    diseases,
    source: "CheXpert Dataset via TorchXRayVision",
  })
}

fn multipart_error(e: axum::extract::multipart::MultipartError) -> ApiError {
  ApiError::BadRequest(format!("Malformed multipart body: {}", e))
}

pub async fn predict(
  State(state): State<AppState>,
  mut multipart: Multipart,
) -> Result<Json<Prediction>, ApiError> {
  let classifier = state.classifier.clone().ok_or(ApiError::ModelUnavailable)?;

  let mut upload = None;
  let mut patient_id = None;
  while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
    let name = field.name().unwrap_or_default().to_string();
    match name.as_str() {
      "file" => {
        let content_type = field.content_type().unwrap_or_default().to_string();
        if !content_type.starts_with("image/") {
          return Err(ApiError::InvalidContentType(content_type));
        }
        let filename = field.file_name().unwrap_or("upload").to_string();
        let bytes = field.bytes().await.map_err(multipart_error)?;
        upload = Some(XrayUpload {
          filename,
          bytes: bytes.to_vec(),
        });
      }
      "patient_id" => {
        let text = field.text().await.map_err(multipart_error)?;
        if !text.trim().is_empty() {
          patient_id = Some(text);
        }
      }
      _ => {}
    }
  }

  let upload =
    upload.ok_or_else(|| ApiError::BadRequest("Missing multipart field 'file'".to_string()))?;
  let patient = patient_id
    .map(|id| state.patients.find(&id))
    .transpose()?;
  info!("收到胸片: {} ({} 字节)", upload.filename, upload.bytes.len());

  let task = PredictTask::new(Local::now().naive_local()).with_patient(patient);
  let compositor = state.compositor.clone();
  let job = tokio::task::spawn_blocking(move || task.run_task(upload, &*classifier, &*compositor));

  let prediction = tokio::time::timeout(state.predict_timeout, job)
    .await
    .map_err(|_| {
      error!("推理超时: {:?}", state.predict_timeout);
      ApiError::PredictionFailed(format!(
        "Prediction timed out after {}s",
        state.predict_timeout.as_secs()
      ))
    })?
    .map_err(|e| {
      error!("推理任务异常退出: {}", e);
      ApiError::PredictionFailed("Prediction task aborted unexpectedly".to_string())
    })??;

  Ok(Json(prediction))
}

#[derive(Debug, Deserialize)]
pub struct KnowledgeQuery {
  q: Option<String>,
}

pub async fn knowledge_search(
  Query(query): Query<KnowledgeQuery>,
) -> Json<Vec<&'static MedicalKnowledgeEntry>> {
  Json(match query.q.as_deref() {
    Some(q) => knowledge::search(q),
    None => knowledge::all().iter().collect(),
  })
}

/// 既接受知识库条目名，也接受分类器标签名
pub async fn knowledge_entry(
  Path(name): Path<String>,
) -> Result<Json<&'static MedicalKnowledgeEntry>, ApiError> {
  knowledge::lookup(&name)
    .or_else(|| Pathology::from_name(&name).and_then(knowledge::for_pathology))
    .map(Json)
    .ok_or_else(|| ApiError::NotFound(format!("No knowledge entry for '{}'", name)))
}

pub async fn signup(
  State(state): State<AppState>,
  Json(request): Json<SignupRequest>,
) -> Result<Json<Patient>, ApiError> {
  Ok(Json(state.patients.signup(request)?))
}

pub async fn login(
  State(state): State<AppState>,
  Json(request): Json<LoginRequest>,
) -> Result<Json<Patient>, ApiError> {
  Ok(Json(state.patients.login(&request)?))
}

pub async fn verify(
  State(state): State<AppState>,
  Path(patient_id): Path<String>,
) -> Result<Json<Patient>, ApiError> {
  Ok(Json(state.patients.find(&patient_id)?))
}

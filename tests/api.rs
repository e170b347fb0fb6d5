// 该文件是 RadEthix 项目的一部分。
// tests/api.rs - HTTP 接口集成测试
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

use std::{
  io::Cursor,
  sync::Arc,
  time::{Duration, Instant},
};

use axum::{
  Router,
  body::Body,
  http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use image::{ImageFormat, Rgb, RgbImage};
use serde_json::Value;
use tower::ServiceExt;

use radethix::{
  frame::{FeatureMap, InputTensor},
  model::{Classifier, LayerCapture, ModelError},
  pathology::{PATHOLOGY_COUNT, Pathology},
  server::{AppState, ServerOptions, router},
};

const BOUNDARY: &str = "radethix-test-boundary";

/// 固定输出的分类器
struct FixedClassifier {
  logits: Vec<f32>,
  with_layer: bool,
}

impl FixedClassifier {
  fn quiet() -> Self {
    Self {
      logits: vec![-20.0; PATHOLOGY_COUNT],
      with_layer: true,
    }
  }

  fn with(pathology: Pathology, probability: f32) -> Self {
    let mut logits = vec![-20.0; PATHOLOGY_COUNT];
    logits[pathology.index()] = (probability / (1.0 - probability)).ln();
    Self {
      logits,
      with_layer: true,
    }
  }
}

impl Classifier for FixedClassifier {
  fn name(&self) -> &str {
    "fixed-test-classifier"
  }

  fn device(&self) -> &str {
    "cpu"
  }

  fn feature_size(&self) -> (usize, usize) {
    (7, 7)
  }

  fn compute_logits(&self, _input: &InputTensor) -> Result<Vec<f32>, ModelError> {
    Ok(self.logits.clone())
  }

  fn capture_target_layer(
    &self,
    _input: &InputTensor,
    _class_index: usize,
  ) -> Result<Option<LayerCapture>, ModelError> {
    if !self.with_layer {
      return Ok(None);
    }
    // 左上角一个热点
    let mut activations = vec![0.0; 2 * 7 * 7];
    activations[0] = 1.0;
    Ok(Some(LayerCapture {
      activations: FeatureMap::from_vec(2, 7, 7, activations)?,
      gradients: FeatureMap::from_vec(2, 7, 7, vec![0.5; 2 * 7 * 7])?,
    }))
  }
}

fn app(classifier: Option<FixedClassifier>) -> Router {
  let classifier = classifier.map(|c| Arc::new(c) as Arc<dyn Classifier>);
  router(AppState::new(classifier), &ServerOptions::default())
}

/// 推理阶段出问题的分类器
enum Misbehaving {
  Panics,
  Stalls(Duration),
}

impl Classifier for Misbehaving {
  fn name(&self) -> &str {
    "misbehaving-test-classifier"
  }

  fn device(&self) -> &str {
    "cpu"
  }

  fn feature_size(&self) -> (usize, usize) {
    (7, 7)
  }

  fn compute_logits(&self, _input: &InputTensor) -> Result<Vec<f32>, ModelError> {
    match self {
      Misbehaving::Panics => panic!("推理崩溃"),
      Misbehaving::Stalls(delay) => {
        std::thread::sleep(*delay);
        Ok(vec![-20.0; PATHOLOGY_COUNT])
      }
    }
  }

  fn capture_target_layer(
    &self,
    _input: &InputTensor,
    _class_index: usize,
  ) -> Result<Option<LayerCapture>, ModelError> {
    Ok(None)
  }
}

fn misbehaving_app(classifier: Misbehaving, timeout: Duration) -> Router {
  let state = AppState::new(Some(Arc::new(classifier) as Arc<dyn Classifier>))
    .with_predict_timeout(timeout);
  router(state, &ServerOptions::default())
}

fn png_bytes() -> Vec<u8> {
  let mut buf = Cursor::new(Vec::new());
  RgbImage::from_fn(64, 48, |x, y| Rgb([(x * 4) as u8, (y * 5) as u8, 128]))
    .write_to(&mut buf, ImageFormat::Png)
    .unwrap();
  buf.into_inner()
}

fn multipart(content_type: &str, bytes: &[u8], patient_id: Option<&str>) -> Request<Body> {
  let mut body = Vec::new();
  if let Some(id) = patient_id {
    body.extend_from_slice(
      format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"patient_id\"\r\n\r\n{id}\r\n"
      )
      .as_bytes(),
    );
  }
  body.extend_from_slice(
    format!(
      "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"chest.png\"\r\nContent-Type: {content_type}\r\n\r\n"
    )
    .as_bytes(),
  );
  body.extend_from_slice(bytes);
  body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

  Request::builder()
    .method("POST")
    .uri("/predict")
    .header(
      header::CONTENT_TYPE,
      format!("multipart/form-data; boundary={BOUNDARY}"),
    )
    .body(Body::from(body))
    .unwrap()
}

fn get(uri: &str) -> Request<Body> {
  Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, json: Value) -> Request<Body> {
  Request::builder()
    .method("POST")
    .uri(uri)
    .header(header::CONTENT_TYPE, "application/json")
    .body(Body::from(json.to_string()))
    .unwrap()
}

async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
  let response = app.oneshot(req).await.unwrap();
  let status = response.status();
  let bytes = response.into_body().collect().await.unwrap().to_bytes();
  let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
  (status, json)
}

#[tokio::test]
async fn health_reports_degraded_without_model() {
  let (status, body) = send(app(None), get("/health")).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["status"], "degraded");
  assert_eq!(body["model_loaded"], false);
  assert_eq!(body["endpoints"]["predict"], "POST /predict");
}

#[tokio::test]
async fn health_reports_pathologies_with_model() {
  let (_, body) = send(app(Some(FixedClassifier::quiet())), get("/health")).await;
  assert_eq!(body["status"], "healthy");
  assert_eq!(body["pathologies"].as_array().unwrap().len(), PATHOLOGY_COUNT);
  assert_eq!(body["pathologies"][9], "Pleural_Thickening");
}

#[tokio::test]
async fn diseases_lists_every_label() {
  let (status, body) = send(app(None), get("/diseases")).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["total_count"], PATHOLOGY_COUNT);
  assert_eq!(body["diseases"][0]["name"], "Atelectasis");
}

#[tokio::test]
async fn index_is_html() {
  let response = app(None).oneshot(get("/")).await.unwrap();
  assert_eq!(response.status(), StatusCode::OK);
  let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap();
  assert!(content_type.starts_with("text/html"));
}

#[tokio::test]
async fn predict_without_model_is_unavailable() {
  let (status, body) = send(app(None), multipart("image/png", &png_bytes(), None)).await;
  assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
  assert_eq!(body["error"]["code"], "MODEL_UNAVAILABLE");
}

#[tokio::test]
async fn predict_rejects_non_image_upload() {
  let app = app(Some(FixedClassifier::quiet()));
  let (status, body) = send(app, multipart("text/plain", b"hello", None)).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["error"]["code"], "INVALID_CONTENT_TYPE");
}

#[tokio::test]
async fn predict_rejects_undecodable_image() {
  let app = app(Some(FixedClassifier::quiet()));
  let (status, body) = send(app, multipart("image/png", b"definitely not a png", None)).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["error"]["code"], "UNSUPPORTED_IMAGE_FORMAT");
}

#[tokio::test]
async fn quiet_prediction_has_no_findings() {
  let app = app(Some(FixedClassifier::quiet()));
  let (status, body) = send(app, multipart("image/png", &png_bytes(), None)).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["status"], "success");
  assert_eq!(body["findings"].as_array().unwrap().len(), 0);
  assert!(body["combined_heatmap"].is_null());
  assert!(body["individual_heatmaps"].as_object().unwrap().is_empty());
  assert_eq!(body["needs_doctor_review"], true);
  assert_eq!(body["review_reason"], "Low confidence");
  assert_eq!(body["metadata"]["findings_count"], 0);
  assert_eq!(body["metadata"]["filename"], "chest.png");
  let ai_report = body["ai_report"].as_str().unwrap();
  assert!(ai_report.contains("No acute cardiopulmonary disease."));
  assert!(body["patient_report"].as_str().unwrap().contains("GOOD NEWS"));
}

#[tokio::test]
async fn pneumonia_finding_is_critical_with_heatmaps() {
  let app = app(Some(FixedClassifier::with(Pathology::Pneumonia, 0.55)));
  let (status, body) = send(app, multipart("image/jpeg", &png_bytes(), None)).await;
  assert_eq!(status, StatusCode::OK);

  let findings = body["findings"].as_array().unwrap();
  assert_eq!(findings.len(), 1);
  assert_eq!(findings[0]["pathology"], "Pneumonia");
  assert_eq!(findings[0]["severity"], "Critical");
  assert_eq!(findings[0]["critical"], true);

  assert!(body["individual_heatmaps"]["Pneumonia"].is_string());
  assert!(body["combined_heatmap"].is_string());
  assert_eq!(body["review_reason"], "Low confidence");
  assert!(!body["citations"].as_array().unwrap().is_empty());
  let overall = body["confidence_metrics"]["overall_confidence"].as_f64().unwrap();
  assert!((overall - 0.55).abs() < 1e-4);
}

#[tokio::test]
async fn missing_target_layer_still_renders_heatmap() {
  let mut classifier = FixedClassifier::with(Pathology::Cardiomegaly, 0.9);
  classifier.with_layer = false;
  let (status, body) = send(app(Some(classifier)), multipart("image/png", &png_bytes(), None)).await;
  assert_eq!(status, StatusCode::OK);
  assert!(body["individual_heatmaps"]["Cardiomegaly"].is_string());
  assert_eq!(body["needs_doctor_review"], false);
  assert_eq!(body["review_reason"], "Standard review");
}

#[tokio::test]
async fn prediction_report_includes_patient() {
  let app = app(Some(FixedClassifier::with(Pathology::Effusion, 0.75)));
  let (status, body) = send(
    app.clone(),
    post_json("/signup", serde_json::json!({"name": "Alice", "age": 30, "gender": "Female"})),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  let id = body["patient_id"].as_str().unwrap().to_string();

  let (status, body) = send(app.clone(), multipart("image/png", &png_bytes(), Some(&id))).await;
  assert_eq!(status, StatusCode::OK);
  assert!(body["ai_report"].as_str().unwrap().contains("Patient Name: Alice"));

  let (status, body) = send(app, multipart("image/png", &png_bytes(), Some("RDX9999"))).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn patient_signup_login_verify() {
  let app = app(None);
  let (_, created) = send(
    app.clone(),
    post_json("/signup", serde_json::json!({"name": "Bob", "age": 52, "gender": "Male"})),
  )
  .await;
  assert_eq!(created["patient_id"], "RDX0002");

  let (status, body) = send(
    app.clone(),
    post_json("/login", serde_json::json!({"patient_id": "rdx0002"})),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["name"], "Bob");

  let (status, body) = send(app.clone(), get("/verify/RDX0001")).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["patient_id"], "RDX0001");

  let (status, _) = send(app, get("/verify/RDX4242")).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn knowledge_lookup_and_search() {
  let (status, body) = send(app(None), get("/knowledge/Effusion")).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["pathology"], "Pleural Effusion");

  let (status, body) = send(app(None), get("/knowledge?q=kerley")).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body[0]["pathology"], "Edema");

  let (status, body) = send(app(None), get("/knowledge/Hernia")).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn panicking_pipeline_is_a_prediction_failure() {
  let app = misbehaving_app(Misbehaving::Panics, Duration::from_secs(5));
  let (status, body) = send(app, multipart("image/png", &png_bytes(), None)).await;
  assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
  assert_eq!(body["error"]["code"], "PREDICTION_FAILED");
  assert!(!body["error"]["message"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn slow_prediction_times_out() {
  let app = misbehaving_app(
    Misbehaving::Stalls(Duration::from_millis(800)),
    Duration::from_millis(50),
  );
  let started = Instant::now();
  let (status, body) = send(app, multipart("image/png", &png_bytes(), None)).await;
  assert!(started.elapsed() < Duration::from_millis(800));
  assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
  assert_eq!(body["error"]["code"], "PREDICTION_FAILED");
  assert!(body["error"]["message"].as_str().unwrap().contains("timed out"));
}

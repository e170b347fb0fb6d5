// 该文件是 RadEthix 项目的一部分。
// src/model/densenet.rs - DenseNet 胸片分类模型 (ONNX Runtime)
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

use std::sync::Arc;

use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::{Classifier, ModelError},
};

const DENSENET_SCHEME: &str = "densenet";
const DENSENET_LOGITS_OUTPUT: &str = "logits";
const DENSENET_FEATURES_OUTPUT: &str = "features";
// DenseNet121 在 224x224 输入下 norm5 的空间尺寸
const DENSENET_FEATURE_SIZE: usize = 7;
const DENSENET_INTRA_THREADS: usize = 2;

/// `densenet:///models/chex.onnx?head=/models/chex-head.json&features=features&logits=logits`
#[derive(Debug, Clone)]
#[cfg_attr(not(feature = "onnx"), allow(dead_code))]
pub struct DenseNetBuilder {
  model_path: String,
  head_path: Option<String>,
  logits_output: String,
  features_output: String,
  feature_size: usize,
  intra_threads: usize,
}

impl FromUrlWithScheme for DenseNetBuilder {
  const SCHEME: &'static str = DENSENET_SCHEME;
}

impl FromUrl for DenseNetBuilder {
  type Error = ModelError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ModelError::ModelPathError(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }
    if url.path().is_empty() || url.path() == "/" {
      return Err(ModelError::ModelPathError("模型路径为空".to_string()));
    }

    let mut builder = DenseNetBuilder {
      model_path: url.path().to_string(),
      head_path: None,
      logits_output: DENSENET_LOGITS_OUTPUT.to_string(),
      features_output: DENSENET_FEATURES_OUTPUT.to_string(),
      feature_size: DENSENET_FEATURE_SIZE,
      intra_threads: DENSENET_INTRA_THREADS,
    };

    for (key, value) in url.query_pairs() {
      match key.as_ref() {
        "head" => builder.head_path = Some(value.into_owned()),
        "logits" => builder.logits_output = value.into_owned(),
        "features" => builder.features_output = value.into_owned(),
        "feature_size" => {
          builder.feature_size = value
            .parse()
            .map_err(|_| ModelError::ModelPathError(format!("无效的 feature_size: {}", value)))?
        }
        "threads" => {
          builder.intra_threads = value
            .parse()
            .map_err(|_| ModelError::ModelPathError(format!("无效的 threads: {}", value)))?
        }
        other => {
          return Err(ModelError::ModelPathError(format!(
            "未知的模型参数: {}",
            other
          )));
        }
      }
    }

    Ok(builder)
  }
}

impl DenseNetBuilder {
  pub fn model_path(&self) -> &str {
    &self.model_path
  }

  pub fn head_path(&self) -> Option<&str> {
    self.head_path.as_deref()
  }

  pub fn feature_size(&self) -> usize {
    self.feature_size
  }

  #[cfg(feature = "onnx")]
  pub fn build_shared(self) -> Result<Arc<dyn Classifier>, ModelError> {
    Ok(Arc::new(self.build()?))
  }

  #[cfg(not(feature = "onnx"))]
  pub fn build_shared(self) -> Result<Arc<dyn Classifier>, ModelError> {
    tracing::error!("无法加载模型 {}: 未启用 ONNX 推理后端", self.model_path);
    Err(ModelError::BackendDisabled)
  }

  #[cfg(feature = "onnx")]
  pub fn build(self) -> Result<DenseNet, ModelError> {
    use ort::session::Session;

    tracing::info!("加载模型文件: {}", self.model_path);
    let session = Session::builder()
      .map_err(|e: ort::Error| ModelError::ModelInvalid(e.to_string()))?
      .with_intra_threads(self.intra_threads)
      .map_err(|e: ort::Error| ModelError::ModelInvalid(e.to_string()))?
      .commit_from_file(&self.model_path)
      .map_err(|e: ort::Error| ModelError::ModelInvalid(format!("ONNX 模型加载失败: {}", e)))?;

    let head = match &self.head_path {
      Some(path) => Some(super::DenseHead::from_json_file(path)?),
      None => {
        tracing::info!("未配置分类头权重，热力图将退化为全零");
        None
      }
    };
    tracing::info!("模型加载完成");

    Ok(DenseNet {
      session: std::sync::Mutex::new(session),
      head,
      logits_output: self.logits_output,
      features_output: self.features_output,
      feature_size: (self.feature_size, self.feature_size),
    })
  }
}

#[cfg(feature = "onnx")]
mod onnx {
  use std::sync::Mutex;

  use ort::{session::Session, value::TensorRef};
  use tracing::{debug, warn};

  use crate::{
    frame::{FeatureMap, InputTensor},
    input::AsNchwTensor,
    model::{Classifier, DenseHead, LayerCapture, ModelError},
    pathology::PATHOLOGY_COUNT,
  };

  /// DenseNet 分类器
  ///
  /// ONNX 模型导出两个输出：分类 logits 与 norm5 特征图。
  /// `ort::Session::run` 需要 `&mut self`，会话放在互斥锁里，
  /// 每次前向传播都是一个临界区。
  pub struct DenseNet {
    pub(super) session: Mutex<Session>,
    pub(super) head: Option<DenseHead>,
    pub(super) logits_output: String,
    pub(super) features_output: String,
    pub(super) feature_size: (usize, usize),
  }

  struct RawOutputs {
    logits: Option<Vec<f32>>,
    features: Option<FeatureMap>,
  }

  impl DenseNet {
    fn run(&self, input: &InputTensor) -> Result<RawOutputs, ModelError> {
      let shape = input.shape();
      let array = ndarray::Array4::from_shape_vec(
        (shape[0], shape[1], shape[2], shape[3]),
        input.as_nchw().to_vec(),
      )
      .map_err(|e| ModelError::InferenceError(e.to_string()))?;
      let tensor = TensorRef::from_array_view(&array)
        .map_err(|e| ModelError::InferenceError(e.to_string()))?;

      let mut session = self.session.lock().map_err(|_| ModelError::LockPoisoned)?;
      debug!("执行模型推理");
      let outputs = session
        .run(ort::inputs![tensor])
        .map_err(|e| ModelError::InferenceError(format!("ONNX 推理失败: {}", e)))?;

      let logits = match outputs.get(self.logits_output.as_str()) {
        Some(value) => {
          let (_, data) = value
            .try_extract_tensor::<f32>()
            .map_err(|e| ModelError::InferenceError(e.to_string()))?;
          Some(data.to_vec())
        }
        None => None,
      };

      let features = match outputs.get(self.features_output.as_str()) {
        Some(value) => {
          let (shape, data) = value
            .try_extract_tensor::<f32>()
            .map_err(|e| ModelError::InferenceError(e.to_string()))?;
          if shape.len() != 4 || shape[0] != 1 {
            return Err(ModelError::InferenceError(format!(
              "特征图形状异常: {:?}",
              shape
            )));
          }
          Some(FeatureMap::from_vec(
            shape[1] as usize,
            shape[2] as usize,
            shape[3] as usize,
            data.to_vec(),
          )?)
        }
        None => None,
      };

      Ok(RawOutputs { logits, features })
    }
  }

  impl Classifier for DenseNet {
    fn name(&self) -> &str {
      "DenseNet121 (CheXpert)"
    }

    fn device(&self) -> &str {
      "cpu"
    }

    fn feature_size(&self) -> (usize, usize) {
      self.feature_size
    }

    fn compute_logits(&self, input: &InputTensor) -> Result<Vec<f32>, ModelError> {
      let raw = self.run(input)?;
      let logits = match (raw.logits, raw.features, &self.head) {
        (Some(logits), _, _) => logits,
        (None, Some(features), Some(head)) => head.forward(&features)?,
        _ => {
          return Err(ModelError::InferenceError(format!(
            "模型缺少输出 '{}'",
            self.logits_output
          )));
        }
      };

      if logits.len() != PATHOLOGY_COUNT {
        return Err(ModelError::OutputMismatch {
          expected: PATHOLOGY_COUNT,
          actual: logits.len(),
        });
      }
      Ok(logits)
    }

    fn capture_target_layer(
      &self,
      input: &InputTensor,
      class_index: usize,
    ) -> Result<Option<LayerCapture>, ModelError> {
      let Some(head) = &self.head else {
        warn!("未配置分类头，无法计算梯度");
        return Ok(None);
      };
      let Some(activations) = self.run(input)?.features else {
        warn!("模型缺少特征输出 '{}'", self.features_output);
        return Ok(None);
      };

      let gradients = head.gradient(&activations, class_index)?;
      Ok(Some(LayerCapture {
        activations,
        gradients,
      }))
    }
  }
}

#[cfg(feature = "onnx")]
pub use self::onnx::DenseNet;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_query_parameters() {
    let url = Url::parse(
      "densenet:///models/chex.onnx?head=/models/head.json&features=norm5&feature_size=14",
    )
    .unwrap();
    let builder = DenseNetBuilder::from_url(&url).unwrap();
    assert_eq!(builder.model_path(), "/models/chex.onnx");
    assert_eq!(builder.head_path(), Some("/models/head.json"));
    assert_eq!(builder.features_output, "norm5");
    assert_eq!(builder.logits_output, DENSENET_LOGITS_OUTPUT);
    assert_eq!(builder.feature_size(), 14);
  }

  #[test]
  fn rejects_unknown_parameters() {
    let url = Url::parse("densenet:///models/chex.onnx?colour=red").unwrap();
    assert!(matches!(
      DenseNetBuilder::from_url(&url),
      Err(ModelError::ModelPathError(_))
    ));
  }

  #[test]
  fn rejects_empty_path() {
    let url = Url::parse("densenet:///").unwrap();
    assert!(DenseNetBuilder::from_url(&url).is_err());
  }

  #[cfg(not(feature = "onnx"))]
  #[test]
  fn build_without_backend_reports_disabled() {
    let url = Url::parse("densenet:///models/chex.onnx").unwrap();
    let result = DenseNetBuilder::from_url(&url).unwrap().build_shared();
    assert!(matches!(result, Err(ModelError::BackendDisabled)));
  }
}

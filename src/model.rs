// 该文件是 RadEthix 项目的一部分。
// src/model.rs - 分类模型
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

use thiserror::Error;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{FeatureMap, InputTensor, ShapeMismatch},
  pathology::Pathology,
};

#[derive(Error, Debug)]
pub enum ModelError {
  #[error("模型加载错误: {0}")]
  ModelLoadError(#[from] std::io::Error),
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
  #[error("模型无效: {0}")]
  ModelInvalid(String),
  #[error("推理错误: {0}")]
  InferenceError(String),
  #[error("模型输出长度不匹配: 期望 {expected}, 实际 {actual}")]
  OutputMismatch { expected: usize, actual: usize },
  #[error("类别索引越界: {index} (共 {count} 类)")]
  ClassIndexOutOfRange { index: usize, count: usize },
  #[error("特征图形状错误: {0}")]
  Shape(#[from] ShapeMismatch),
  #[error("推理会话锁已失效")]
  LockPoisoned,
  #[error("未启用 ONNX 推理后端，请使用 `--features onnx` 编译")]
  BackendDisabled,
}

/// 挂载层在一次前向/反向传播中捕获的激活与梯度
#[derive(Debug, Clone)]
pub struct LayerCapture {
  pub activations: FeatureMap,
  pub gradients: FeatureMap,
}

/// 分类器能力接口
///
/// 实现需要自行保证 `compute_logits` 与 `capture_target_layer`
/// 可以被多个请求并发调用：前向/反向传播的中间状态不能在调用之间共享。
pub trait Classifier: Send + Sync {
  /// 模型名称，用于报告与健康检查
  fn name(&self) -> &str;

  /// 推理设备
  fn device(&self) -> &str;

  /// 输出顺序对应的病理标签
  fn pathologies(&self) -> &[Pathology] {
    &Pathology::ALL
  }

  /// 挂载层特征图的空间尺寸 (height, width)
  fn feature_size(&self) -> (usize, usize);

  fn compute_logits(&self, input: &InputTensor) -> Result<Vec<f32>, ModelError>;

  /// 对 `class_index` 对应的输出做一次前向与反向传播，
  /// 返回挂载层的激活与梯度；无法定位挂载层时返回 `None`
  fn capture_target_layer(
    &self,
    input: &InputTensor,
    class_index: usize,
  ) -> Result<Option<LayerCapture>, ModelError>;
}

pub fn sigmoid(x: f32) -> f32 {
  1.0 / (1.0 + (-x).exp())
}

/// 根据 URL 方案加载分类器
pub fn load_classifier(url: &Url) -> Result<Arc<dyn Classifier>, ModelError> {
  match url.scheme() {
    DenseNetBuilder::SCHEME => DenseNetBuilder::from_url(url)?.build_shared(),
    other => Err(ModelError::ModelPathError(format!(
      "不支持的模型方案: {}",
      other
    ))),
  }
}

pub mod head;
pub use self::head::DenseHead;

mod densenet;
#[cfg(feature = "onnx")]
pub use self::densenet::DenseNet;
pub use self::densenet::DenseNetBuilder;

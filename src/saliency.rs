// 该文件是 RadEthix 项目的一部分。
// src/saliency.rs - Grad-CAM 显著图
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

use thiserror::Error;
use tracing::{debug, warn};

use crate::{
  frame::InputTensor,
  model::{Classifier, LayerCapture, ModelError},
};

/// 显著图退化为全零的原因
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaliencyDegraded {
  #[error("未能定位目标层")]
  TargetLayerMissing,
  #[error("激活、梯度与特征图尺寸不一致")]
  ShapeMismatch,
  #[error("没有正向响应")]
  ZeroActivation,
}

#[derive(Error, Debug)]
pub enum SaliencyError {
  #[error("类别索引越界: {index} (共 {count} 类)")]
  ClassIndexOutOfRange { index: usize, count: usize },
  #[error("模型错误: {0}")]
  Model(#[from] ModelError),
}

/// 单通道显著图，取值 [0, 1]，尺寸与挂载层特征图一致
#[derive(Debug, Clone, PartialEq)]
pub struct SaliencyMap {
  height: usize,
  width: usize,
  data: Box<[f32]>,
  degraded: Option<SaliencyDegraded>,
}

impl SaliencyMap {
  pub fn zeros(height: usize, width: usize, reason: SaliencyDegraded) -> Self {
    Self {
      height,
      width,
      data: vec![0f32; height * width].into_boxed_slice(),
      degraded: Some(reason),
    }
  }

  pub fn height(&self) -> usize {
    self.height
  }

  pub fn width(&self) -> usize {
    self.width
  }

  pub fn get(&self, y: usize, x: usize) -> f32 {
    self.data[y * self.width + x]
  }

  pub fn as_slice(&self) -> &[f32] {
    &self.data
  }

  pub fn degraded(&self) -> Option<SaliencyDegraded> {
    self.degraded
  }

  pub fn max(&self) -> f32 {
    self.data.iter().copied().fold(0.0, f32::max)
  }
}

/// Grad-CAM：按梯度空间均值加权激活通道，ReLU 后按最大值归一化
pub fn grad_cam(capture: &LayerCapture) -> Result<SaliencyMap, SaliencyDegraded> {
  let LayerCapture {
    activations,
    gradients,
  } = capture;
  if !activations.same_shape(gradients) {
    return Err(SaliencyDegraded::ShapeMismatch);
  }

  let spatial = activations.spatial();
  let mut cam = vec![0f32; spatial];
  for c in 0..activations.channels() {
    let grad = gradients.channel(c);
    let weight = grad.iter().sum::<f32>() / spatial.max(1) as f32;
    if weight == 0.0 {
      continue;
    }
    for (value, activation) in cam.iter_mut().zip(activations.channel(c)) {
      *value += weight * activation;
    }
  }

  let max = cam.iter().copied().fold(0.0f32, f32::max);
  if max.is_nan() || max <= 0.0 {
    return Err(SaliencyDegraded::ZeroActivation);
  }
  for value in cam.iter_mut() {
    *value = value.max(0.0) / max;
  }

  Ok(SaliencyMap {
    height: activations.height(),
    width: activations.width(),
    data: cam.into_boxed_slice(),
    degraded: None,
  })
}

/// 显著图生成器
///
/// 生成器本身不保存任何捕获状态；前向/反向传播的互斥由分类器负责，
/// 因此同一个生成器可以在多个请求之间共享。
pub struct SaliencyMapGenerator<'a, M: Classifier + ?Sized> {
  classifier: &'a M,
}

impl<'a, M: Classifier + ?Sized> SaliencyMapGenerator<'a, M> {
  pub fn new(classifier: &'a M) -> Self {
    Self { classifier }
  }

  /// 生成 `class_index` 的显著图
  ///
  /// 挂载层缺失或梯度退化时返回全零图（尺寸固定为分类器的特征图尺寸），不视为错误。
  pub fn generate(
    &self,
    input: &InputTensor,
    class_index: usize,
  ) -> Result<SaliencyMap, SaliencyError> {
    let count = self.classifier.pathologies().len();
    if class_index >= count {
      return Err(SaliencyError::ClassIndexOutOfRange {
        index: class_index,
        count,
      });
    }

    let (height, width) = self.classifier.feature_size();
    let result = match self.classifier.capture_target_layer(input, class_index)? {
      Some(capture) => grad_cam(&capture).and_then(|map| {
        // 输出尺寸只认分类器声明的特征图尺寸
        if (map.height(), map.width()) == (height, width) {
          Ok(map)
        } else {
          warn!(
            "挂载层尺寸 {}x{} 与声明的特征图尺寸 {}x{} 不符",
            map.height(),
            map.width(),
            height,
            width
          );
          Err(SaliencyDegraded::ShapeMismatch)
        }
      }),
      None => Err(SaliencyDegraded::TargetLayerMissing),
    };

    match result {
      Ok(map) => {
        debug!(
          "类别 {} 显著图尺寸: {}x{}",
          class_index,
          map.height(),
          map.width()
        );
        Ok(map)
      }
      Err(reason) => {
        warn!(
          "SaliencyGenerationDegraded: 类别 {} 显著图退化为全零: {}",
          class_index, reason
        );
        Ok(SaliencyMap::zeros(height, width, reason))
      }
    }
  }
}

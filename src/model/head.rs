// 该文件是 RadEthix 项目的一部分。
// src/model/head.rs - 全局池化 + 全连接分类头
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

use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info};

use crate::{frame::FeatureMap, model::ModelError};

/// 分类头：ReLU -> 全局平均池化 -> 全连接
///
/// 挂载层（最后一个特征层）之后只剩这一段计算，
/// 所以类别得分对挂载层输出的梯度可以直接解析求得：
/// `d logit_k / d A[c,i,j] = W[k,c] * 1[A[c,i,j] > 0] / (H * W)`。
#[derive(Debug, Clone)]
pub struct DenseHead {
  classes: usize,
  channels: usize,
  /// 行优先 [classes, channels]
  weights: Box<[f32]>,
  bias: Box<[f32]>,
}

#[derive(Deserialize)]
struct HeadFile {
  weights: Vec<Vec<f32>>,
  bias: Vec<f32>,
}

impl DenseHead {
  pub fn new(
    classes: usize,
    channels: usize,
    weights: Vec<f32>,
    bias: Vec<f32>,
  ) -> Result<Self, ModelError> {
    if weights.len() != classes * channels {
      return Err(ModelError::ModelInvalid(format!(
        "分类头权重数量 {} 与形状 [{}, {}] 不符",
        weights.len(),
        classes,
        channels
      )));
    }
    if bias.len() != classes {
      return Err(ModelError::ModelInvalid(format!(
        "分类头偏置数量 {} 与类别数 {} 不符",
        bias.len(),
        classes
      )));
    }

    Ok(Self {
      classes,
      channels,
      weights: weights.into_boxed_slice(),
      bias: bias.into_boxed_slice(),
    })
  }

  /// 从 JSON 文件加载：`{"weights": [[...], ...], "bias": [...]}`
  pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ModelError> {
    let path = path.as_ref();
    info!("加载分类头权重: {}", path.display());
    let text = std::fs::read_to_string(path)?;
    let file: HeadFile = serde_json::from_str(&text)
      .map_err(|e| ModelError::ModelInvalid(format!("分类头文件解析失败: {}", e)))?;

    let classes = file.weights.len();
    let channels = file.weights.first().map(Vec::len).unwrap_or(0);
    if file.weights.iter().any(|row| row.len() != channels) {
      return Err(ModelError::ModelInvalid(
        "分类头权重各行长度不一致".to_string(),
      ));
    }
    debug!("分类头形状: [{}, {}]", classes, channels);

    Self::new(
      classes,
      channels,
      file.weights.into_iter().flatten().collect(),
      file.bias,
    )
  }

  pub fn classes(&self) -> usize {
    self.classes
  }

  pub fn channels(&self) -> usize {
    self.channels
  }

  fn check_channels(&self, features: &FeatureMap) -> Result<(), ModelError> {
    if features.channels() != self.channels {
      return Err(ModelError::OutputMismatch {
        expected: self.channels,
        actual: features.channels(),
      });
    }
    Ok(())
  }

  fn row(&self, class: usize) -> &[f32] {
    &self.weights[class * self.channels..(class + 1) * self.channels]
  }

  pub fn forward(&self, features: &FeatureMap) -> Result<Vec<f32>, ModelError> {
    self.check_channels(features)?;
    let spatial = features.spatial().max(1) as f32;

    let pooled: Vec<f32> = (0..self.channels)
      .map(|c| features.channel(c).iter().map(|v| v.max(0.0)).sum::<f32>() / spatial)
      .collect();

    Ok(
      (0..self.classes)
        .map(|k| {
          self
            .row(k)
            .iter()
            .zip(&pooled)
            .fold(self.bias[k], |acc, (w, p)| acc + w * p)
        })
        .collect(),
    )
  }

  /// 类别 `class` 的得分对输入特征图的梯度
  pub fn gradient(&self, features: &FeatureMap, class: usize) -> Result<FeatureMap, ModelError> {
    self.check_channels(features)?;
    if class >= self.classes {
      return Err(ModelError::ClassIndexOutOfRange {
        index: class,
        count: self.classes,
      });
    }

    let spatial = features.spatial();
    let scale = 1.0 / spatial.max(1) as f32;
    let mut gradients = FeatureMap::zeros(features.channels(), features.height(), features.width());
    let out = gradients.as_mut();

    for (c, weight) in self.row(class).iter().enumerate() {
      for (i, activation) in features.channel(c).iter().enumerate() {
        if *activation > 0.0 {
          out[c * spatial + i] = weight * scale;
        }
      }
    }

    Ok(gradients)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn head() -> DenseHead {
    // 2 类, 2 通道
    DenseHead::new(2, 2, vec![1.0, -1.0, 0.5, 2.0], vec![0.1, -0.2]).unwrap()
  }

  fn features() -> FeatureMap {
    // 通道 0: [2, -2], 通道 1: [1, 3]
    FeatureMap::from_vec(2, 1, 2, vec![2.0, -2.0, 1.0, 3.0]).unwrap()
  }

  #[test]
  fn forward_applies_relu_and_mean_pool() {
    let logits = head().forward(&features()).unwrap();
    // pooled = [1.0, 2.0]
    assert!((logits[0] - (0.1 + 1.0 - 2.0)).abs() < 1e-6);
    assert!((logits[1] - (-0.2 + 0.5 + 4.0)).abs() < 1e-6);
  }

  #[test]
  fn gradient_matches_finite_difference() {
    let head = head();
    let base = features();
    let grad = head.gradient(&base, 1).unwrap();
    let eps = 1e-2;

    for idx in 0..base.as_slice().len() {
      let mut bumped = base.clone();
      bumped.as_mut()[idx] += eps;
      let numeric = (head.forward(&bumped).unwrap()[1] - head.forward(&base).unwrap()[1]) / eps;
      assert!(
        (numeric - grad.as_slice()[idx]).abs() < 1e-3,
        "index {}: numeric {} analytic {}",
        idx,
        numeric,
        grad.as_slice()[idx]
      );
    }
  }

  #[test]
  fn rejects_mismatched_shapes() {
    assert!(DenseHead::new(2, 2, vec![0.0; 3], vec![0.0; 2]).is_err());
    assert!(DenseHead::new(2, 2, vec![0.0; 4], vec![0.0; 1]).is_err());
    let wrong = FeatureMap::zeros(3, 1, 1);
    assert!(matches!(
      head().forward(&wrong),
      Err(ModelError::OutputMismatch { .. })
    ));
    assert!(matches!(
      head().gradient(&features(), 2),
      Err(ModelError::ClassIndexOutOfRange { .. })
    ));
  }

  #[test]
  fn loads_from_json() {
    let path = std::env::temp_dir().join("radethix-head.json");
    std::fs::write(&path, r#"{"weights": [[1.0, 0.0], [0.0, 1.0], [1.0, 1.0]], "bias": [0, 0, 1]}"#)
      .unwrap();
    let head = DenseHead::from_json_file(&path).unwrap();
    assert_eq!(head.classes(), 3);
    assert_eq!(head.channels(), 2);
    std::fs::remove_file(path).ok();
  }
}

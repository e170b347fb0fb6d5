// 该文件是 RadEthix 项目的一部分。
// src/frame.rs - 输入张量与特征图定义
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

use crate::input::AsNchwTensor;

const GRAY_CHANNELS: usize = 1;

/// 分类器输入分辨率
pub const MODEL_INPUT_SIZE: u32 = 224;

/// 分类器输入张量：单通道，224x224，取值范围 [-1024, 1024]
pub type InputTensor = GrayNchwTensor<MODEL_INPUT_SIZE, MODEL_INPUT_SIZE>;

#[derive(Error, Debug, PartialEq)]
#[error("数据长度不匹配: 期望长度 {expected}, 实际长度 {actual}")]
pub struct ShapeMismatch {
  pub expected: usize,
  pub actual: usize,
}

#[derive(Debug, Clone)]
pub struct GrayNchwTensor<const W: u32, const H: u32> {
  data: Box<[f32]>,
}

impl<const W: u32, const H: u32> TryFrom<Vec<f32>> for GrayNchwTensor<W, H> {
  type Error = ShapeMismatch;

  fn try_from(data: Vec<f32>) -> Result<Self, Self::Error> {
    let expected = GRAY_CHANNELS * W as usize * H as usize;
    if data.len() != expected {
      return Err(ShapeMismatch {
        expected,
        actual: data.len(),
      });
    }

    Ok(Self {
      data: data.into_boxed_slice(),
    })
  }
}

impl<const W: u32, const H: u32> Default for GrayNchwTensor<W, H> {
  fn default() -> Self {
    let size = GRAY_CHANNELS * (W as usize) * (H as usize);
    let data = vec![0f32; size].into_boxed_slice();
    Self { data }
  }
}

impl<const W: u32, const H: u32> GrayNchwTensor<W, H> {
  pub fn height(&self) -> usize {
    H as usize
  }

  pub fn width(&self) -> usize {
    W as usize
  }

  pub fn channels(&self) -> usize {
    GRAY_CHANNELS
  }

  /// NCHW 形状，批大小固定为 1
  pub fn shape(&self) -> [usize; 4] {
    [1, GRAY_CHANNELS, H as usize, W as usize]
  }
}

impl<const W: u32, const H: u32> AsMut<[f32]> for GrayNchwTensor<W, H> {
  fn as_mut(&mut self) -> &mut [f32] {
    &mut self.data
  }
}

impl<const W: u32, const H: u32> AsNchwTensor<W, H> for GrayNchwTensor<W, H> {
  fn as_nchw(&self) -> &[f32] {
    &self.data
  }
}

/// CHW 布局的特征图（批大小为 1），用于挂载层的激活与梯度
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMap {
  channels: usize,
  height: usize,
  width: usize,
  data: Box<[f32]>,
}

impl FeatureMap {
  pub fn zeros(channels: usize, height: usize, width: usize) -> Self {
    Self {
      channels,
      height,
      width,
      data: vec![0f32; channels * height * width].into_boxed_slice(),
    }
  }

  pub fn from_vec(
    channels: usize,
    height: usize,
    width: usize,
    data: Vec<f32>,
  ) -> Result<Self, ShapeMismatch> {
    let expected = channels * height * width;
    if data.len() != expected {
      return Err(ShapeMismatch {
        expected,
        actual: data.len(),
      });
    }
    Ok(Self {
      channels,
      height,
      width,
      data: data.into_boxed_slice(),
    })
  }

  pub fn channels(&self) -> usize {
    self.channels
  }

  pub fn height(&self) -> usize {
    self.height
  }

  pub fn width(&self) -> usize {
    self.width
  }

  pub fn spatial(&self) -> usize {
    self.height * self.width
  }

  /// 单个通道的连续切片
  pub fn channel(&self, c: usize) -> &[f32] {
    let spatial = self.spatial();
    &self.data[c * spatial..(c + 1) * spatial]
  }

  pub fn as_slice(&self) -> &[f32] {
    &self.data
  }

  pub fn same_shape(&self, other: &FeatureMap) -> bool {
    self.channels == other.channels && self.height == other.height && self.width == other.width
  }
}

impl AsMut<[f32]> for FeatureMap {
  fn as_mut(&mut self) -> &mut [f32] {
    &mut self.data
  }
}

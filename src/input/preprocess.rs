// 该文件是 RadEthix 项目的一部分。
// src/input/preprocess.rs - X 光图像预处理
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

use image::{
  ImageBuffer, Luma, RgbImage,
  imageops::{self, FilterType},
};
use thiserror::Error;
use tracing::debug;

use crate::frame::{InputTensor, MODEL_INPUT_SIZE, ShapeMismatch};

/// 归一化后的动态范围 [-XRAY_RANGE, XRAY_RANGE]
pub const XRAY_RANGE: f32 = 1024.0;
/// 8 位像素最大值
pub const PIXEL_MAX: f32 = 255.0;

type GrayF32Image = ImageBuffer<Luma<f32>, Vec<f32>>;

#[derive(Error, Debug)]
pub enum PreprocessError {
  #[error("不支持的图像格式: {0}")]
  UnsupportedImageFormat(String),
  #[error("张量形状错误: {0}")]
  Shape(#[from] ShapeMismatch),
}

impl From<image::ImageError> for PreprocessError {
  fn from(err: image::ImageError) -> Self {
    PreprocessError::UnsupportedImageFormat(err.to_string())
  }
}

/// 预处理结果：模型输入张量与可展示的原始图像
#[derive(Debug, Clone)]
pub struct Preprocessed {
  pub tensor: InputTensor,
  pub original: RgbImage,
}

/// 将上传的原始字节转换为分类器输入
///
/// 先统一转换为 RGB，再只取第一个通道（不做亮度加权），
/// 缩放到 [-1024, 1024]，最后中心裁剪并缩放到 224x224。
pub fn preprocess(bytes: &[u8]) -> Result<Preprocessed, PreprocessError> {
  let decoded = image::load_from_memory(bytes)?;
  let original = decoded.to_rgb8();
  let (width, height) = original.dimensions();
  if width == 0 || height == 0 {
    return Err(PreprocessError::UnsupportedImageFormat(
      "图像尺寸为空".to_string(),
    ));
  }
  debug!("解码图像尺寸: {}x{}", width, height);

  // image 对浮点像素按 [0, 1] 截断，缩放完成后再映射到模型范围
  let channel = extract_channel(&original, 0);
  let cropped = center_crop(&channel);
  let resized = imageops::resize(
    &cropped,
    MODEL_INPUT_SIZE,
    MODEL_INPUT_SIZE,
    FilterType::Triangle,
  );
  let data = resized.into_raw().into_iter().map(rescale).collect::<Vec<_>>();
  let tensor = InputTensor::try_from(data)?;

  Ok(Preprocessed { tensor, original })
}

/// 取出单个通道，像素值映射到 [0, 1]
pub fn extract_channel(image: &RgbImage, channel: usize) -> GrayF32Image {
  let (width, height) = image.dimensions();
  ImageBuffer::from_fn(width, height, |x, y| {
    Luma([image.get_pixel(x, y)[channel] as f32 / PIXEL_MAX])
  })
}

/// [0, 1] 线性映射到 [-1024, 1024]
pub fn rescale(unit: f32) -> f32 {
  (2.0 * unit - 1.0) * XRAY_RANGE
}

/// 以短边为边长的中心正方形裁剪
pub fn center_crop(image: &GrayF32Image) -> GrayF32Image {
  let (width, height) = image.dimensions();
  let size = width.min(height);
  let start_x = width / 2 - size / 2;
  let start_y = height / 2 - size / 2;
  imageops::crop_imm(image, start_x, start_y, size, size).to_image()
}

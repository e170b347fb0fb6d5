// 该文件是 RadEthix 项目的一部分。
// src/output/overlay.rs - 显著图热力叠加
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

use std::io::Cursor;

use base64::{Engine, engine::general_purpose::STANDARD};
use image::{
  ImageBuffer, ImageFormat, Luma, Rgb, RgbImage,
  imageops::{self, FilterType},
};
use thiserror::Error;
use tracing::debug;

use crate::{output::Render, saliency::SaliencyMap};

/// 叠加图边长
pub const OVERLAY_SIZE: u32 = 224;
/// 热力图权重，底图权重为 1 - alpha
pub const OVERLAY_ALPHA: f32 = 0.4;

#[derive(Error, Debug)]
pub enum OverlayError {
  #[error("图像编码错误: {0}")]
  Encode(#[from] image::ImageError),
}

/// JET 色表：0 为深蓝，1 为深红
pub fn jet(value: u8) -> [u8; 3] {
  let x = value as f32 / 255.0;
  let channel = |center: f32| ((1.5 - (4.0 * x - center).abs()).clamp(0.0, 1.0) * 255.0).round() as u8;
  [channel(3.0), channel(2.0), channel(1.0)]
}

pub struct OverlayCompositor {
  size: u32,
  alpha: f32,
}

impl Default for OverlayCompositor {
  fn default() -> Self {
    Self {
      size: OVERLAY_SIZE,
      alpha: OVERLAY_ALPHA,
    }
  }
}

impl OverlayCompositor {
  pub fn size(&self) -> u32 {
    self.size
  }

  /// 缩放到叠加尺寸后转灰度，再扩回三通道
  fn base(&self, original: &RgbImage) -> RgbImage {
    let mut resized = imageops::resize(original, self.size, self.size, FilterType::Triangle);
    for pixel in resized.pixels_mut() {
      let [r, g, b] = pixel.0;
      let luma = (0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32).round() as u8;
      *pixel = Rgb([luma, luma, luma]);
    }
    resized
  }

  /// 双线性上采样到叠加尺寸
  fn upsample(&self, map: &SaliencyMap) -> Vec<f32> {
    let n = (self.size * self.size) as usize;
    let source = ImageBuffer::<Luma<f32>, Vec<f32>>::from_raw(
      map.width() as u32,
      map.height() as u32,
      map.as_slice().to_vec(),
    );
    match source {
      Some(source) if map.height() > 0 && map.width() > 0 => {
        imageops::resize(&source, self.size, self.size, FilterType::Triangle).into_raw()
      }
      _ => vec![0.0; n],
    }
  }

  pub fn compose(&self, original: &RgbImage, map: &SaliencyMap) -> RgbImage {
    let mut image = self.base(original);
    let heat = self.upsample(map);
    for (pixel, value) in image.pixels_mut().zip(heat) {
      let color = jet((value.clamp(0.0, 1.0) * 255.0) as u8);
      for (base, h) in pixel.0.iter_mut().zip(color) {
        *base = ((1.0 - self.alpha) * *base as f32 + self.alpha * h as f32).round() as u8;
      }
    }
    image
  }

  pub fn encode_png(image: &RgbImage) -> Result<Vec<u8>, OverlayError> {
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, ImageFormat::Png)?;
    Ok(buffer.into_inner())
  }
}

impl Render<RgbImage, SaliencyMap> for OverlayCompositor {
  /// base64 编码的 PNG
  type Rendered = String;
  type Error = OverlayError;

  fn render_result(&self, frame: &RgbImage, result: &SaliencyMap) -> Result<String, OverlayError> {
    let overlay = self.compose(frame, result);
    let png = Self::encode_png(&overlay)?;
    debug!("叠加图 PNG 大小: {} 字节", png.len());
    Ok(STANDARD.encode(png))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    frame::FeatureMap,
    model::LayerCapture,
    saliency::{SaliencyDegraded, grad_cam},
  };

  fn white(w: u32, h: u32) -> RgbImage {
    RgbImage::from_pixel(w, h, Rgb([255, 255, 255]))
  }

  #[test]
  fn jet_endpoints() {
    assert_eq!(jet(0), [0, 0, 128]);
    assert_eq!(jet(255), [128, 0, 0]);
    let mid = jet(128);
    assert!(mid[1] > 200);
  }

  #[test]
  fn overlay_has_fixed_size() {
    let map = SaliencyMap::zeros(7, 7, SaliencyDegraded::TargetLayerMissing);
    let overlay = OverlayCompositor::default().compose(&white(640, 480), &map);
    assert_eq!(overlay.dimensions(), (OVERLAY_SIZE, OVERLAY_SIZE));
  }

  #[test]
  fn zero_map_blends_blue_tint() {
    let map = SaliencyMap::zeros(7, 7, SaliencyDegraded::TargetLayerMissing);
    let overlay = OverlayCompositor::default().compose(&white(32, 32), &map);
    // 0.6 * 255 = 153, 0.6 * 255 + 0.4 * 128 = 204.2
    assert_eq!(overlay.get_pixel(100, 100).0, [153, 153, 204]);
  }

  #[test]
  fn upsample_interpolates_between_cells() {
    let compositor = OverlayCompositor::default();
    // 左列 0，右列 1
    let capture = LayerCapture {
      activations: FeatureMap::from_vec(1, 2, 2, vec![0.0, 1.0, 0.0, 1.0]).unwrap(),
      gradients: FeatureMap::from_vec(1, 2, 2, vec![1.0; 4]).unwrap(),
    };
    let map = grad_cam(&capture).unwrap();
    let heat = compositor.upsample(&map);
    let n = OVERLAY_SIZE as usize;
    assert_eq!(heat.len(), n * n);
    let row = &heat[n * (n / 2)..n * (n / 2 + 1)];
    assert!(row[0] < 1e-3);
    assert!(row[n - 1] > 1.0 - 1e-3);
    assert!(row.windows(2).all(|w| w[0] <= w[1] + 1e-6));
    assert!(row.iter().all(|v| (0.0..=1.0).contains(v)));
  }

  #[test]
  fn grayscale_base_uses_bt601_weights() {
    let base = OverlayCompositor::default().base(&RgbImage::from_pixel(8, 8, Rgb([255, 0, 0])));
    // 0.299 * 255 = 76.2
    assert_eq!(base.get_pixel(5, 5).0, [76, 76, 76]);
  }

  #[test]
  fn render_produces_png_base64() {
    let map = SaliencyMap::zeros(7, 7, SaliencyDegraded::ZeroActivation);
    let encoded = OverlayCompositor::default()
      .render_result(&white(64, 64), &map)
      .unwrap();
    let png = STANDARD.decode(encoded).unwrap();
    let decoded = image::load_from_memory_with_format(&png, ImageFormat::Png).unwrap();
    assert_eq!(decoded.width(), OVERLAY_SIZE);
  }
}

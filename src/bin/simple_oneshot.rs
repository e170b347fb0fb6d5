// 该文件是 RadEthix 项目的一部分。
// src/bin/simple_oneshot.rs - 单张胸片离线分析
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

use std::path::PathBuf;

use anyhow::{Context, Result};
use base64::{Engine, engine::general_purpose::STANDARD};
use clap::Parser;
use tracing::info;
use url::Url;

use radethix::{
  FromUrl,
  input::ImageFileInput,
  model::load_classifier,
  output::OverlayCompositor,
  task::{PredictTask, Task, XrayUpload},
};

/// 对一张胸片运行完整分析并把结果写到目录
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型地址
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 输入图像，例如 image:///data/chest.png
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出目录
  #[arg(long, value_name = "DIR")]
  pub output: PathBuf,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型地址: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("输出目录: {}", args.output.display());

  let input = ImageFileInput::from_url(&args.input)?;
  let model = load_classifier(&args.model)?;
  let compositor = OverlayCompositor::default();

  let upload = XrayUpload {
    filename: input.filename().to_string(),
    bytes: input.bytes().to_vec(),
  };
  let now = std::time::Instant::now();
  let prediction = PredictTask::new(chrono::Local::now().naive_local()).run_task(
    upload,
    &*model,
    &compositor,
  )?;
  info!("分析完成，耗时: {:.2?}", now.elapsed());

  std::fs::create_dir_all(&args.output)
    .with_context(|| format!("无法创建输出目录 {}", args.output.display()))?;

  let json = serde_json::to_string_pretty(&prediction)?;
  std::fs::write(args.output.join("prediction.json"), json)?;
  std::fs::write(args.output.join("ai_report.txt"), &prediction.ai_report)?;
  std::fs::write(args.output.join("patient_report.txt"), &prediction.patient_report)?;

  for (pathology, encoded) in &prediction.individual_heatmaps {
    let file = format!("heatmap_{}.png", pathology.replace(' ', "_").to_lowercase());
    std::fs::write(args.output.join(&file), STANDARD.decode(encoded)?)?;
    info!("保存热力图: {}", file);
  }
  if let Some(encoded) = &prediction.combined_heatmap {
    std::fs::write(args.output.join("heatmap_combined.png"), STANDARD.decode(encoded)?)?;
  }

  for finding in &prediction.findings {
    info!(
      "{}: {:.1}% ({})",
      finding.pathology,
      finding.confidence * 100.0,
      finding.severity
    );
  }
  info!(
    "共 {} 项阳性，需要医生复核: {}",
    prediction.findings.len(),
    prediction.needs_doctor_review
  );

  Ok(())
}

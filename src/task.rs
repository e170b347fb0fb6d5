// 该文件是 RadEthix 项目的一部分。
// src/task.rs - 单张胸片的完整分析流程
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

use std::{collections::BTreeMap, fmt::Display, time::Instant};

use chrono::NaiveDateTime;
use image::RgbImage;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
  finding::{
    Assessment, ConfidenceMetrics, Finding, FindingError, POSITIVE_THRESHOLD, ProbabilityVector,
    ReviewReason, assess,
  },
  frame::InputTensor,
  input::{PreprocessError, preprocess},
  model::{Classifier, ModelError},
  output::Render,
  patient::Patient,
  report::{self, ReportInput},
  saliency::{SaliencyMap, SaliencyMapGenerator},
};

pub trait Task<I, M, O>: Sized {
  type Output;
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<Self::Output, Self::Error>;
}

#[derive(Error, Debug)]
pub enum TaskError {
  #[error("预处理错误: {0}")]
  Preprocess(#[from] PreprocessError),
  #[error("模型错误: {0}")]
  Model(#[from] ModelError),
  #[error("结果解析错误: {0}")]
  Finding(#[from] FindingError),
}

/// 上传的原始胸片
#[derive(Debug, Clone)]
pub struct XrayUpload {
  pub filename: String,
  pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
  pub name: String,
  pub training_dataset: &'static str,
  pub paper: &'static str,
  pub pathologies_supported: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictionMetadata {
  pub filename: String,
  pub model_version: String,
  pub device: String,
  pub findings_count: usize,
  pub detection_threshold: f32,
}

/// `/predict` 的响应体
#[derive(Debug, Clone, Serialize)]
pub struct Prediction {
  pub status: &'static str,
  pub timestamp: String,
  pub findings: Vec<Finding>,
  pub confidence_metrics: ConfidenceMetrics,
  pub combined_heatmap: Option<String>,
  pub individual_heatmaps: BTreeMap<String, String>,
  pub ai_report: String,
  pub patient_report: String,
  pub citations: Vec<&'static str>,
  pub needs_doctor_review: bool,
  pub review_reason: ReviewReason,
  pub model_info: ModelInfo,
  pub metadata: PredictionMetadata,
}

pub fn model_version() -> String {
  format!("radethix-{}", env!("CARGO_PKG_VERSION"))
}

/// 预处理 -> 分类 -> 判定 -> 显著图 -> 叠加 -> 报告
pub struct PredictTask {
  generated_at: NaiveDateTime,
  patient: Option<Patient>,
}

impl PredictTask {
  pub fn new(generated_at: NaiveDateTime) -> Self {
    Self {
      generated_at,
      patient: None,
    }
  }

  pub fn with_patient(mut self, patient: Option<Patient>) -> Self {
    self.patient = patient;
    self
  }
}

struct Heatmaps<'a, M: Classifier + ?Sized, O> {
  generator: SaliencyMapGenerator<'a, M>,
  output: &'a O,
  tensor: &'a InputTensor,
  original: &'a RgbImage,
}

impl<'a, M, O> Heatmaps<'a, M, O>
where
  M: Classifier + ?Sized,
  O: Render<RgbImage, SaliencyMap, Rendered = String>,
  O::Error: Display,
{
  /// 失败只记录日志，不影响整体结果
  fn render(&self, finding: &Finding) -> Option<String> {
    let map = match self
      .generator
      .generate(self.tensor, finding.pathology.index())
    {
      Ok(map) => map,
      Err(e) => {
        warn!("{} 显著图生成失败: {}", finding.pathology, e);
        return None;
      }
    };
    match self.output.render_result(self.original, &map) {
      Ok(encoded) => Some(encoded),
      Err(e) => {
        warn!("{} 热力图渲染失败: {}", finding.pathology, e);
        None
      }
    }
  }
}

impl<'m, 'o, M, O> Task<XrayUpload, &'m M, &'o O> for PredictTask
where
  M: Classifier + ?Sized,
  O: Render<RgbImage, SaliencyMap, Rendered = String>,
  O::Error: Display,
{
  type Output = Prediction;
  type Error = TaskError;

  fn run_task(self, input: XrayUpload, model: &'m M, output: &'o O) -> Result<Prediction, TaskError> {
    info!("开始分析胸片: {}", input.filename);
    let started = Instant::now();

    let pre = preprocess(&input.bytes)?;
    debug!(
      "原图尺寸: {}x{}，预处理耗时: {:.2?}",
      pre.original.width(),
      pre.original.height(),
      started.elapsed()
    );

    let now = Instant::now();
    let logits = model.compute_logits(&pre.tensor)?;
    let probabilities = ProbabilityVector::from_logits(&logits)?;
    info!("推理完成，耗时: {:.2?}", now.elapsed());

    let Assessment {
      findings,
      overall_confidence,
      average_confidence,
      needs_doctor_review,
      review_reason,
    } = assess(&probabilities);
    let confidence_metrics = ConfidenceMetrics {
      overall_confidence,
      average_confidence,
      uncertainty: 1.0 - overall_confidence,
    };

    let now = Instant::now();
    let heatmaps = Heatmaps {
      generator: SaliencyMapGenerator::new(model),
      output,
      tensor: &pre.tensor,
      original: &pre.original,
    };
    let mut individual_heatmaps = BTreeMap::new();
    for finding in &findings {
      if let Some(encoded) = heatmaps.render(finding) {
        individual_heatmaps.insert(finding.pathology.name().to_string(), encoded);
      }
    }

    // 综合热力图取概率最高的病理；它一定也是阳性，能复用就复用
    let combined_heatmap = if findings.is_empty() {
      None
    } else {
      let top = probabilities.argmax();
      individual_heatmaps.get(top.name()).cloned().or_else(|| {
        findings
          .iter()
          .find(|f| f.pathology == top)
          .and_then(|f| heatmaps.render(f))
      })
    };
    info!(
      "热力图生成完成: {} 张，耗时: {:.2?}",
      individual_heatmaps.len(),
      now.elapsed()
    );

    let report_input = ReportInput {
      findings: &findings,
      overall_confidence,
      generated_at: self.generated_at,
      patient: self.patient.as_ref(),
      model_name: model.name(),
    };
    let ai_report = report::clinical_report(&report_input);
    let patient_report = report::patient_report(&report_input);
    let citations = report::aggregate_citations(&findings);

    info!(
      "分析完成: {} 项阳性，总耗时: {:.2?}",
      findings.len(),
      started.elapsed()
    );

    Ok(Prediction {
      status: "success",
      timestamp: self.generated_at.format("%Y-%m-%d %H:%M:%S%.f").to_string(),
      confidence_metrics,
      combined_heatmap,
      individual_heatmaps,
      ai_report,
      patient_report,
      citations,
      needs_doctor_review,
      review_reason,
      model_info: ModelInfo {
        name: model.name().to_string(),
        training_dataset: "CheXpert",
        paper: "https://arxiv.org/abs/2111.00595",
        pathologies_supported: model.pathologies().len(),
      },
      metadata: PredictionMetadata {
        filename: input.filename,
        model_version: model_version(),
        device: model.device().to_string(),
        findings_count: findings.len(),
        detection_threshold: POSITIVE_THRESHOLD,
      },
      findings,
    })
  }
}

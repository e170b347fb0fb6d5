// 该文件是 RadEthix 项目的一部分。
// src/finding.rs - 阳性判定与严重程度策略
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

use serde::Serialize;
use thiserror::Error;

use crate::{
  model::sigmoid,
  pathology::{PATHOLOGY_COUNT, Pathology},
};

/// 阳性阈值（严格大于）
pub const POSITIVE_THRESHOLD: f32 = 0.3;
/// 低于该整体置信度时需要医生复核
pub const DOCTOR_REVIEW_THRESHOLD: f32 = 0.6;
/// 阳性数量超过该值时需要医生复核
pub const MAX_UNREVIEWED_FINDINGS: usize = 2;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FindingError {
  #[error("概率向量长度不匹配: 期望 {expected}, 实际 {actual}")]
  LengthMismatch { expected: usize, actual: usize },
  #[error("第 {index} 个 logit 为 NaN")]
  NanLogit { index: usize },
}

/// 按标签顺序排列的各病理概率
#[derive(Debug, Clone, PartialEq)]
pub struct ProbabilityVector([f32; PATHOLOGY_COUNT]);

impl ProbabilityVector {
  pub fn from_logits(logits: &[f32]) -> Result<Self, FindingError> {
    if logits.len() != PATHOLOGY_COUNT {
      return Err(FindingError::LengthMismatch {
        expected: PATHOLOGY_COUNT,
        actual: logits.len(),
      });
    }
    if let Some(index) = logits.iter().position(|l| l.is_nan()) {
      return Err(FindingError::NanLogit { index });
    }
    let mut probs = [0f32; PATHOLOGY_COUNT];
    for (p, logit) in probs.iter_mut().zip(logits) {
      *p = sigmoid(*logit);
    }
    Ok(Self(probs))
  }

  pub fn from_probabilities(probs: [f32; PATHOLOGY_COUNT]) -> Self {
    Self(probs.map(|p| if p.is_nan() { 0.0 } else { p.clamp(0.0, 1.0) }))
  }

  pub fn get(&self, pathology: Pathology) -> f32 {
    self.0[pathology.index()]
  }

  pub fn as_slice(&self) -> &[f32] {
    &self.0
  }

  pub fn iter(&self) -> impl Iterator<Item = (Pathology, f32)> + '_ {
    Pathology::ALL.iter().copied().zip(self.0.iter().copied())
  }

  pub fn max(&self) -> f32 {
    self.0.iter().copied().fold(0.0, f32::max)
  }

  /// 概率最高的病理；并列时取标签顺序靠前者
  pub fn argmax(&self) -> Pathology {
    let mut best = 0;
    for (i, p) in self.0.iter().enumerate() {
      if *p > self.0[best] {
        best = i;
      }
    }
    Pathology::ALL[best]
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Severity {
  Low,
  Moderate,
  High,
  Critical,
}

impl std::fmt::Display for Severity {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let s = match self {
      Severity::Low => "Low",
      Severity::Moderate => "Moderate",
      Severity::High => "High",
      Severity::Critical => "Critical",
    };
    f.write_str(s)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CriticalityClass {
  Critical,
  Standard,
}

impl From<Pathology> for CriticalityClass {
  fn from(pathology: Pathology) -> Self {
    if pathology.is_critical() {
      CriticalityClass::Critical
    } else {
      CriticalityClass::Standard
    }
  }
}

// (下界, 等级)，自上而下匹配第一个满足 p >= 下界 的行
const CRITICAL_SEVERITY: [(f32, Severity); 3] = [
  (0.5, Severity::Critical),
  (0.35, Severity::High),
  (f32::NEG_INFINITY, Severity::Moderate),
];

const STANDARD_SEVERITY: [(f32, Severity); 3] = [
  (0.7, Severity::High),
  (0.5, Severity::Moderate),
  (f32::NEG_INFINITY, Severity::Low),
];

pub fn severity(class: CriticalityClass, probability: f32) -> Severity {
  let table = match class {
    CriticalityClass::Critical => &CRITICAL_SEVERITY,
    CriticalityClass::Standard => &STANDARD_SEVERITY,
  };
  table
    .iter()
    .find(|(lower, _)| probability >= *lower)
    .map(|(_, s)| *s)
    .unwrap_or(Severity::Low)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finding {
  pub pathology: Pathology,
  pub confidence: f32,
  pub severity: Severity,
  pub description: &'static str,
  pub critical: bool,
}

impl Finding {
  /// 概率未超过阳性阈值时返回 `None`
  pub fn classify(pathology: Pathology, probability: f32) -> Option<Self> {
    // NaN 不算阳性
    if probability.is_nan() || probability <= POSITIVE_THRESHOLD {
      return None;
    }
    Some(Finding {
      pathology,
      confidence: probability,
      severity: severity(pathology.into(), probability),
      description: pathology.description(),
      critical: pathology.is_critical(),
    })
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewReason {
  LowConfidence,
  MultipleFindings,
  Standard,
}

impl ReviewReason {
  pub fn as_str(self) -> &'static str {
    match self {
      ReviewReason::LowConfidence => "Low confidence",
      ReviewReason::MultipleFindings => "Multiple findings",
      ReviewReason::Standard => "Standard review",
    }
  }
}

impl Serialize for ReviewReason {
  fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(self.as_str())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConfidenceMetrics {
  pub overall_confidence: f32,
  pub average_confidence: f32,
  pub uncertainty: f32,
}

/// 一次预测的阳性列表与置信度汇总
#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
  pub findings: Vec<Finding>,
  pub overall_confidence: f32,
  pub average_confidence: f32,
  pub needs_doctor_review: bool,
  pub review_reason: ReviewReason,
}

impl Assessment {
  pub fn metrics(&self) -> ConfidenceMetrics {
    ConfidenceMetrics {
      overall_confidence: self.overall_confidence,
      average_confidence: self.average_confidence,
      uncertainty: 1.0 - self.overall_confidence,
    }
  }
}

pub fn assess(probabilities: &ProbabilityVector) -> Assessment {
  let findings: Vec<Finding> = probabilities
    .iter()
    .filter_map(|(pathology, p)| Finding::classify(pathology, p))
    .collect();

  let overall_confidence = probabilities.max();
  let average_confidence = if findings.is_empty() {
    0.0
  } else {
    findings.iter().map(|f| f.confidence).sum::<f32>() / findings.len() as f32
  };

  let review_reason = if overall_confidence < DOCTOR_REVIEW_THRESHOLD {
    ReviewReason::LowConfidence
  } else if findings.len() > MAX_UNREVIEWED_FINDINGS {
    ReviewReason::MultipleFindings
  } else {
    ReviewReason::Standard
  };

  Assessment {
    needs_doctor_review: review_reason != ReviewReason::Standard,
    findings,
    overall_confidence,
    average_confidence,
    review_reason,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn probs(entries: &[(Pathology, f32)]) -> ProbabilityVector {
    let mut raw = [0f32; PATHOLOGY_COUNT];
    for (p, v) in entries {
      raw[p.index()] = *v;
    }
    ProbabilityVector::from_probabilities(raw)
  }

  #[test]
  fn logits_must_cover_every_pathology() {
    assert_eq!(
      ProbabilityVector::from_logits(&[0.0; 5]),
      Err(FindingError::LengthMismatch {
        expected: PATHOLOGY_COUNT,
        actual: 5
      })
    );
    let v = ProbabilityVector::from_logits(&[3.0; PATHOLOGY_COUNT]).unwrap();
    assert_eq!(v.as_slice().len(), PATHOLOGY_COUNT);
    assert!(v.as_slice().iter().all(|p| (0.0..=1.0).contains(p)));
  }

  #[test]
  fn nan_logit_is_rejected() {
    let mut logits = [-20.0; PATHOLOGY_COUNT];
    logits[0] = f32::NAN;
    assert_eq!(
      ProbabilityVector::from_logits(&logits),
      Err(FindingError::NanLogit { index: 0 })
    );

    // 无穷大 logit 仍是合法概率
    logits[0] = f32::INFINITY;
    let v = ProbabilityVector::from_logits(&logits).unwrap();
    assert_eq!(v.get(Pathology::Atelectasis), 1.0);
  }

  #[test]
  fn nan_probability_is_never_a_finding() {
    assert!(Finding::classify(Pathology::Atelectasis, f32::NAN).is_none());

    let mut raw = [0f32; PATHOLOGY_COUNT];
    raw[Pathology::Atelectasis.index()] = f32::NAN;
    let a = assess(&ProbabilityVector::from_probabilities(raw));
    assert!(a.findings.is_empty());
    assert!(a.findings.iter().all(|f| f.confidence > POSITIVE_THRESHOLD));
  }

  #[test]
  fn threshold_is_strict() {
    assert!(Finding::classify(Pathology::Nodule, 0.3).is_none());
    assert!(Finding::classify(Pathology::Nodule, 0.300001).is_some());
  }

  #[test]
  fn critical_severity_boundaries() {
    let c = CriticalityClass::Critical;
    assert_eq!(severity(c, 0.5), Severity::Critical);
    assert_eq!(severity(c, 0.49999), Severity::High);
    assert_eq!(severity(c, 0.35), Severity::High);
    assert_eq!(severity(c, 0.349999), Severity::Moderate);
  }

  #[test]
  fn standard_severity_boundaries() {
    let s = CriticalityClass::Standard;
    assert_eq!(severity(s, 0.7), Severity::High);
    assert_eq!(severity(s, 0.5), Severity::Moderate);
    assert_eq!(severity(s, 0.49999), Severity::Low);
  }

  #[test]
  fn pneumonia_at_055_is_critical() {
    let finding = Finding::classify(Pathology::Pneumonia, 0.55).unwrap();
    assert_eq!(finding.severity, Severity::Critical);
    assert!(finding.critical);
  }

  #[test]
  fn empty_prediction_needs_review() {
    let a = assess(&probs(&[]));
    assert!(a.findings.is_empty());
    assert_eq!(a.overall_confidence, 0.0);
    assert_eq!(a.average_confidence, 0.0);
    assert!(a.needs_doctor_review);
    assert_eq!(a.review_reason, ReviewReason::LowConfidence);
    assert_eq!(a.metrics().uncertainty, 1.0);
  }

  #[test]
  fn review_truth_table() {
    // 高置信单阳性
    let a = assess(&probs(&[(Pathology::Effusion, 0.8)]));
    assert!(!a.needs_doctor_review);
    assert_eq!(a.review_reason, ReviewReason::Standard);

    // 高置信多阳性
    let a = assess(&probs(&[
      (Pathology::Effusion, 0.8),
      (Pathology::Edema, 0.4),
      (Pathology::Cardiomegaly, 0.35),
    ]));
    assert!(a.needs_doctor_review);
    assert_eq!(a.review_reason, ReviewReason::MultipleFindings);

    // 低置信优先于多阳性
    let a = assess(&probs(&[
      (Pathology::Effusion, 0.5),
      (Pathology::Edema, 0.4),
      (Pathology::Cardiomegaly, 0.35),
    ]));
    assert_eq!(a.review_reason, ReviewReason::LowConfidence);
  }

  #[test]
  fn findings_keep_label_order_and_average() {
    let a = assess(&probs(&[(Pathology::Mass, 0.4), (Pathology::Atelectasis, 0.6)]));
    let names: Vec<_> = a.findings.iter().map(|f| f.pathology).collect();
    assert_eq!(names, vec![Pathology::Atelectasis, Pathology::Mass]);
    assert!((a.average_confidence - 0.5).abs() < 1e-6);
    assert_eq!(probs(&[(Pathology::Mass, 0.4), (Pathology::Atelectasis, 0.6)]).argmax(), Pathology::Atelectasis);
  }
}

// 该文件是 RadEthix 项目的一部分。
// src/report.rs - 临床报告与患者报告
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

//! 报告生成都是纯函数：相同的输入（包括时间戳）得到相同的文本。

use std::fmt::Write;

use chrono::NaiveDateTime;

use crate::{finding::Finding, knowledge, patient::Patient};

const EXAMINATION_TYPE: &str = "Chest Radiograph (PA/Lateral)";
const ACTIONS_PER_FINDING: usize = 2;

/// 报告所需的全部输入
#[derive(Debug, Clone, Copy)]
pub struct ReportInput<'a> {
  pub findings: &'a [Finding],
  pub overall_confidence: f32,
  pub generated_at: NaiveDateTime,
  pub patient: Option<&'a Patient>,
  pub model_name: &'a str,
}

fn display_name(finding: &Finding) -> String {
  finding.pathology.name().replace('_', " ")
}

/// 按置信度降序排列，置信度相同保持原顺序
pub fn rank_findings(findings: &[Finding]) -> Vec<&Finding> {
  let mut ranked: Vec<&Finding> = findings.iter().collect();
  ranked.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
  ranked
}

pub fn confidence_band(confidence: f32) -> &'static str {
  if confidence > 0.8 {
    "High confidence finding."
  } else if confidence > 0.5 {
    "Moderate confidence finding."
  } else {
    "Low confidence finding, correlation with clinical symptoms recommended."
  }
}

fn push_unique(list: &mut Vec<&'static str>, item: &'static str) {
  if !list.contains(&item) {
    list.push(item);
  }
}

/// 汇总参考文献：去重，保留第一次出现的顺序
pub fn aggregate_citations(findings: &[Finding]) -> Vec<&'static str> {
  let mut citations = Vec::new();
  for finding in rank_findings(findings) {
    if let Some(entry) = knowledge::for_pathology(finding.pathology) {
      for citation in entry.citations {
        push_unique(&mut citations, *citation);
      }
    }
  }
  citations
}

/// 每个阳性取前两条处置建议，去重，保留第一次出现的顺序
pub fn recommended_actions(findings: &[Finding]) -> Vec<&'static str> {
  let mut actions = Vec::new();
  for finding in rank_findings(findings) {
    if let Some(entry) = knowledge::for_pathology(finding.pathology) {
      for step in entry.action_steps.iter().take(ACTIONS_PER_FINDING) {
        push_unique(&mut actions, *step);
      }
    }
  }
  actions
}

pub fn format_citations(citations: &[&str]) -> String {
  if citations.is_empty() {
    return "No references cited for this report.\n".to_string();
  }
  let mut out = String::from("REFERENCES:\n\n");
  for (idx, citation) in citations.iter().enumerate() {
    let _ = writeln!(out, "[{}] {}", idx + 1, citation);
  }
  out
}

fn write_header(out: &mut String, input: &ReportInput) {
  out.push_str("CHEST X-RAY AI ANALYSIS REPORT\n");
  out.push_str(&"=".repeat(50));
  out.push_str("\n\n");
  let _ = writeln!(out, "MODEL: {}", input.model_name);
  let _ = writeln!(
    out,
    "EXAMINATION DATE: {}",
    input.generated_at.format("%B %d, %Y")
  );
  let _ = writeln!(
    out,
    "ANALYSIS TIME: {}",
    input.generated_at.format("%Y-%m-%d %H:%M:%S")
  );
  let _ = writeln!(out, "EXAMINATION TYPE: {}", EXAMINATION_TYPE);
  if let Some(patient) = input.patient {
    out.push('\n');
    let _ = writeln!(out, "Patient Name: {}", patient.name);
    let _ = writeln!(out, "Patient ID: {}", patient.patient_id);
    let _ = writeln!(out, "Age: {} years", patient.age);
    let _ = writeln!(out, "Gender: {}", patient.gender);
  }
  out.push('\n');
}

/// 面向医生的结构化报告
pub fn clinical_report(input: &ReportInput) -> String {
  let mut out = String::new();
  write_header(&mut out, input);
  let ranked = rank_findings(input.findings);

  out.push_str("FINDINGS:\n\n");
  if ranked.is_empty() {
    out.push_str(
      "The chest radiograph demonstrates clear lung fields bilaterally with no acute \
       cardiopulmonary abnormality. Cardiac silhouette is within normal limits. \
       Mediastinal contours are unremarkable. No pleural effusion or pneumothorax identified.\n\n",
    );
  } else {
    for (idx, finding) in ranked.iter().enumerate() {
      let observation = knowledge::for_pathology(finding.pathology)
        .and_then(|e| e.primary_finding())
        .unwrap_or(finding.description);
      let _ = write!(
        out,
        "{}. {}. This is consistent with {}. {}\n\n",
        idx + 1,
        observation,
        display_name(finding).to_lowercase(),
        confidence_band(finding.confidence)
      );
    }
  }

  out.push_str("IMPRESSION:\n\n");
  if ranked.is_empty() {
    out.push_str("No acute cardiopulmonary disease.\n\n");
  } else {
    for finding in &ranked {
      let significance = knowledge::for_pathology(finding.pathology)
        .map(|e| e.clinical_significance)
        .unwrap_or(finding.description);
      let _ = writeln!(out, "- {}: {}", display_name(finding), significance);
    }
    out.push('\n');
  }

  out.push_str("RECOMMENDED ACTIONS:\n\n");
  if ranked.is_empty() {
    out.push_str("- No immediate action required\n");
    out.push_str("- Routine follow-up as clinically indicated\n");
    out.push_str("- Correlate with patient symptoms\n\n");
  } else {
    let actions = recommended_actions(input.findings);
    if actions.is_empty() {
      out.push_str("- Clinical correlation and physician review recommended\n");
    }
    for (idx, step) in actions.iter().enumerate() {
      let _ = writeln!(out, "{}. {}", idx + 1, step);
    }
    out.push('\n');
  }

  let _ = write!(
    out,
    "OVERALL CONFIDENCE: {:.1}%\n\n",
    input.overall_confidence * 100.0
  );
  out.push_str(&format_citations(&aggregate_citations(input.findings)));
  out.push('\n');

  out.push_str(
    "---\n\
     Report generated by RAD-ETHIX AI-Assisted Diagnostic System\n\
     This report should be reviewed by a licensed radiologist before clinical use\n\
     AI Confidence scores and findings are supplementary to clinical judgment\n",
  );
  out
}

/// 面向患者的通俗报告
pub fn patient_report(input: &ReportInput) -> String {
  let mut out = String::from("Your Chest X-Ray Results\n");
  out.push_str(&"=".repeat(30));
  out.push_str("\n\n");
  if let Some(patient) = input.patient {
    let _ = write!(
      out,
      "Prepared for: {} ({})\nDate: {}\n\n",
      patient.name,
      patient.patient_id,
      input.generated_at.format("%B %d, %Y")
    );
  }

  if input.findings.is_empty() {
    out.push_str("✅ GOOD NEWS: No concerning findings detected\n\n");
    out.push_str("The AI analysis did not identify signs of disease in your chest X-ray.\n\n");
  } else {
    let _ = write!(
      out,
      "📋 SUMMARY: {} findings detected\n\n",
      input.findings.len()
    );
    out.push_str("The AI has identified some areas that may need medical attention:\n\n");
    for (idx, finding) in input.findings.iter().enumerate() {
      let _ = writeln!(out, "{}. {}", idx + 1, display_name(finding));
      let _ = writeln!(out, "   • AI Confidence: {:.0}%", finding.confidence * 100.0);
      let _ = writeln!(out, "   • What it means: {}", finding.description);
      if let Some(entry) = knowledge::for_pathology(finding.pathology) {
        let _ = writeln!(out, "   • Medical definition: {}", entry.definition);
      }
      if finding.critical {
        out.push_str("   • ⚠️  IMPORTANT: Needs prompt medical attention\n");
      }
      out.push('\n');
    }
  }

  out.push_str("NEXT STEPS:\n");
  out.push_str("• Schedule appointment with your doctor\n");
  out.push_str("• Discuss these results and your symptoms\n");
  out.push_str("• Follow medical advice for treatment\n\n");
  out.push_str("NOTE: This AI uses a medical-grade model trained on real hospital data\n");
  out.push_str("Only qualified doctors can provide final diagnosis and treatment\n");
  out
}

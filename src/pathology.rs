// 该文件是 RadEthix 项目的一部分。
// src/pathology.rs - 病理标签定义
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

use serde::{Serialize, Serializer};

/// 分类器支持的胸片病理，顺序与模型输出一致
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Pathology {
  Atelectasis,
  Consolidation,
  Infiltration,
  Pneumothorax,
  Edema,
  Emphysema,
  Fibrosis,
  Effusion,
  Pneumonia,
  PleuralThickening,
  Cardiomegaly,
  Nodule,
  Mass,
  Hernia,
  LungLesion,
  Fracture,
  LungOpacity,
  EnlargedCardiomediastinum,
}

/// 支持的病理数量
pub const PATHOLOGY_COUNT: usize = 18;

impl Pathology {
  pub const ALL: [Pathology; PATHOLOGY_COUNT] = [
    Pathology::Atelectasis,
    Pathology::Consolidation,
    Pathology::Infiltration,
    Pathology::Pneumothorax,
    Pathology::Edema,
    Pathology::Emphysema,
    Pathology::Fibrosis,
    Pathology::Effusion,
    Pathology::Pneumonia,
    Pathology::PleuralThickening,
    Pathology::Cardiomegaly,
    Pathology::Nodule,
    Pathology::Mass,
    Pathology::Hernia,
    Pathology::LungLesion,
    Pathology::Fracture,
    Pathology::LungOpacity,
    Pathology::EnlargedCardiomediastinum,
  ];

  /// 模型标签中使用的名称
  pub fn name(self) -> &'static str {
    match self {
      Pathology::Atelectasis => "Atelectasis",
      Pathology::Consolidation => "Consolidation",
      Pathology::Infiltration => "Infiltration",
      Pathology::Pneumothorax => "Pneumothorax",
      Pathology::Edema => "Edema",
      Pathology::Emphysema => "Emphysema",
      Pathology::Fibrosis => "Fibrosis",
      Pathology::Effusion => "Effusion",
      Pathology::Pneumonia => "Pneumonia",
      Pathology::PleuralThickening => "Pleural_Thickening",
      Pathology::Cardiomegaly => "Cardiomegaly",
      Pathology::Nodule => "Nodule",
      Pathology::Mass => "Mass",
      Pathology::Hernia => "Hernia",
      Pathology::LungLesion => "Lung Lesion",
      Pathology::Fracture => "Fracture",
      Pathology::LungOpacity => "Lung Opacity",
      Pathology::EnlargedCardiomediastinum => "Enlarged Cardiomediastinum",
    }
  }

  pub fn index(self) -> usize {
    self as usize
  }

  pub fn from_name(name: &str) -> Option<Self> {
    Self::ALL.iter().copied().find(|p| p.name() == name)
  }

  /// 危急类病理：气胸、肿块、肺炎
  pub fn is_critical(self) -> bool {
    matches!(
      self,
      Pathology::Pneumothorax | Pathology::Mass | Pathology::Pneumonia
    )
  }

  /// 面向患者的简要说明
  pub fn description(self) -> &'static str {
    match self {
      Pathology::Atelectasis => {
        "Collapse or closure of lung tissue resulting in reduced gas exchange"
      }
      Pathology::Consolidation => {
        "Areas of lung filled with liquid instead of air, often indicating pneumonia"
      }
      Pathology::Infiltration => {
        "Abnormal substance in lung tissue, may indicate infection or inflammation"
      }
      Pathology::Pneumothorax => {
        "Collapsed lung due to air leak - requires immediate medical attention"
      }
      Pathology::Edema => "Fluid accumulation in lung tissue, may indicate heart failure",
      Pathology::Emphysema => "Lung condition causing shortness of breath due to damaged air sacs",
      Pathology::Fibrosis => "Lung scarring that makes breathing difficult",
      Pathology::Effusion => "Abnormal accumulation of fluid around the lungs",
      Pathology::Pneumonia => "Lung infection causing inflammation - may need antibiotic treatment",
      Pathology::PleuralThickening => "Scarring of the lining around the lungs",
      Pathology::Cardiomegaly => "Enlarged heart, may indicate underlying heart disease",
      Pathology::Nodule => "Small spots in lungs that need follow-up evaluation",
      Pathology::Mass => "Larger abnormal growth requiring immediate medical evaluation",
      Pathology::Hernia => "Protrusion of organs visible on chest X-ray",
      Pathology::LungLesion => "Abnormal tissue in lungs requiring medical assessment",
      Pathology::Fracture => "Bone break visible on chest X-ray",
      Pathology::LungOpacity => "Cloudy areas in lungs that may indicate disease",
      Pathology::EnlargedCardiomediastinum => "Enlargement of heart and surrounding structures",
    }
  }
}

impl std::fmt::Display for Pathology {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.name())
  }
}

impl Serialize for Pathology {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(self.name())
  }
}

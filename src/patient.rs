// 该文件是 RadEthix 项目的一部分。
// src/patient.rs - 内存患者档案
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

use std::{collections::HashMap, sync::RwLock};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

const PATIENT_ID_PREFIX: &str = "RDX";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PatientError {
  #[error("未找到患者: {0}")]
  NotFound(String),
  #[error("请求无效: {0}")]
  InvalidRequest(String),
  #[error("患者档案锁已失效")]
  LockPoisoned,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patient {
  pub patient_id: String,
  pub name: String,
  pub age: u32,
  pub gender: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignupRequest {
  pub name: String,
  pub age: u32,
  pub gender: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
  pub patient_id: String,
}

/// 患者档案，只保存在内存中，重启后丢失
///
/// 不做身份认证，只是把患者编号映射到报告抬头需要的信息。
#[derive(Debug, Default)]
pub struct PatientRegistry {
  patients: RwLock<HashMap<String, Patient>>,
}

fn normalize_id(patient_id: &str) -> String {
  patient_id.trim().to_uppercase()
}

impl PatientRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// 预置一个演示患者 `RDX0001`
  pub fn with_demo_patient() -> Self {
    let registry = Self::new();
    let demo = Patient {
      patient_id: format!("{}0001", PATIENT_ID_PREFIX),
      name: "Demo Patient".to_string(),
      age: 45,
      gender: "Unspecified".to_string(),
    };
    if let Ok(mut patients) = registry.patients.write() {
      patients.insert(demo.patient_id.clone(), demo);
    }
    registry
  }

  pub fn len(&self) -> usize {
    self.patients.read().map(|p| p.len()).unwrap_or(0)
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn signup(&self, request: SignupRequest) -> Result<Patient, PatientError> {
    let name = request.name.trim();
    if name.is_empty() {
      return Err(PatientError::InvalidRequest("姓名不能为空".to_string()));
    }

    let mut patients = self
      .patients
      .write()
      .map_err(|_| PatientError::LockPoisoned)?;
    let patient = Patient {
      patient_id: format!("{}{:04}", PATIENT_ID_PREFIX, patients.len() + 1),
      name: name.to_string(),
      age: request.age,
      gender: request.gender.trim().to_string(),
    };
    patients.insert(patient.patient_id.clone(), patient.clone());
    info!("注册患者: {}", patient.patient_id);
    Ok(patient)
  }

  pub fn find(&self, patient_id: &str) -> Result<Patient, PatientError> {
    let id = normalize_id(patient_id);
    let patients = self
      .patients
      .read()
      .map_err(|_| PatientError::LockPoisoned)?;
    patients
      .get(&id)
      .cloned()
      .ok_or(PatientError::NotFound(id))
  }

  pub fn login(&self, request: &LoginRequest) -> Result<Patient, PatientError> {
    self.find(&request.patient_id)
  }
}

// 该文件是 RadEthix 项目的一部分。
// src/server/error.rs - HTTP 错误响应
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

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

use crate::{input::PreprocessError, patient::PatientError, task::TaskError};

/// `{"error": {"code": ..., "message": ...}}`
#[derive(Debug, Serialize)]
pub struct ErrorBody {
  pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
  pub code: &'static str,
  pub message: String,
}

#[derive(Error, Debug)]
pub enum ApiError {
  #[error("上传内容类型无效: {0}")]
  InvalidContentType(String),
  #[error("无法解码图像: {0}")]
  UnsupportedImageFormat(String),
  #[error("模型未加载")]
  ModelUnavailable,
  #[error("预测失败: {0}")]
  PredictionFailed(String),
  #[error("请求无效: {0}")]
  BadRequest(String),
  #[error("未找到: {0}")]
  NotFound(String),
  #[error("内部错误: {0}")]
  Internal(String),
}

impl ApiError {
  pub fn status(&self) -> StatusCode {
    match self {
      ApiError::InvalidContentType(_)
      | ApiError::UnsupportedImageFormat(_)
      | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::ModelUnavailable => StatusCode::SERVICE_UNAVAILABLE,
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::PredictionFailed(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  pub fn code(&self) -> &'static str {
    match self {
      ApiError::InvalidContentType(_) => "INVALID_CONTENT_TYPE",
      ApiError::UnsupportedImageFormat(_) => "UNSUPPORTED_IMAGE_FORMAT",
      ApiError::ModelUnavailable => "MODEL_UNAVAILABLE",
      ApiError::PredictionFailed(_) => "PREDICTION_FAILED",
      ApiError::BadRequest(_) => "BAD_REQUEST",
      ApiError::NotFound(_) => "NOT_FOUND",
      ApiError::Internal(_) => "INTERNAL",
    }
  }

  fn message(&self) -> String {
    match self {
      ApiError::InvalidContentType(found) => {
        format!("Please upload an image file (got content type '{}')", found)
      }
      ApiError::UnsupportedImageFormat(detail) => format!("Unsupported image format: {}", detail),
      ApiError::ModelUnavailable => "Model not loaded".to_string(),
      ApiError::PredictionFailed(detail)
      | ApiError::BadRequest(detail)
      | ApiError::NotFound(detail) => detail.clone(),
      // 内部细节只写日志
      ApiError::Internal(_) => "An internal error occurred".to_string(),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    match &self {
      ApiError::PredictionFailed(_) | ApiError::Internal(_) => error!("{}", self),
      _ => warn!("{}", self),
    }

    let body = ErrorBody {
      error: ErrorDetail {
        code: self.code(),
        message: self.message(),
      },
    };
    (self.status(), Json(body)).into_response()
  }
}

impl From<TaskError> for ApiError {
  fn from(err: TaskError) -> Self {
    match err {
      TaskError::Preprocess(PreprocessError::UnsupportedImageFormat(detail)) => {
        ApiError::UnsupportedImageFormat(detail)
      }
      other => ApiError::PredictionFailed(other.to_string()),
    }
  }
}

impl From<PatientError> for ApiError {
  fn from(err: PatientError) -> Self {
    match err {
      PatientError::NotFound(id) => ApiError::NotFound(format!("Patient ID not found: {}", id)),
      PatientError::InvalidRequest(detail) => ApiError::BadRequest(detail),
      other @ PatientError::LockPoisoned => ApiError::Internal(other.to_string()),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn status_and_code_mapping() {
    let cases = [
      (
        ApiError::InvalidContentType("text/plain".into()),
        StatusCode::BAD_REQUEST,
        "INVALID_CONTENT_TYPE",
      ),
      (
        ApiError::UnsupportedImageFormat("x".into()),
        StatusCode::BAD_REQUEST,
        "UNSUPPORTED_IMAGE_FORMAT",
      ),
      (
        ApiError::ModelUnavailable,
        StatusCode::SERVICE_UNAVAILABLE,
        "MODEL_UNAVAILABLE",
      ),
      (
        ApiError::PredictionFailed("boom".into()),
        StatusCode::INTERNAL_SERVER_ERROR,
        "PREDICTION_FAILED",
      ),
      (
        ApiError::NotFound("x".into()),
        StatusCode::NOT_FOUND,
        "NOT_FOUND",
      ),
    ];
    for (err, status, code) in cases {
      assert_eq!(err.status(), status);
      assert_eq!(err.code(), code);
    }
  }

  #[test]
  fn undecodable_image_maps_to_bad_request() {
    let err: ApiError =
      TaskError::Preprocess(PreprocessError::UnsupportedImageFormat("bad".into())).into();
    assert_eq!(err.code(), "UNSUPPORTED_IMAGE_FORMAT");
  }

  #[test]
  fn internal_message_is_generic() {
    let err = ApiError::Internal("lock poisoned".into());
    assert_eq!(err.message(), "An internal error occurred");
  }
}

// 该文件是 RadEthix 项目的一部分。
// src/args.rs - 服务参数配置
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

use std::time::Duration;

use clap::Parser;
use url::Url;

use crate::server::{DEFAULT_ALLOWED_ORIGINS, DEFAULT_MAX_UPLOAD_BYTES, ServerOptions};

/// RadEthix 胸片分析服务
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 监听地址
  #[arg(long, env = "RADETHIX_HOST", default_value = "127.0.0.1")]
  pub host: String,

  /// 监听端口
  #[arg(long, env = "RADETHIX_PORT", default_value_t = 8000)]
  pub port: u16,

  /// 模型地址，例如
  /// densenet:///models/chex.onnx?head=/models/chex-head.json
  /// 未指定或加载失败时服务以降级模式运行
  #[arg(long, env = "RADETHIX_MODEL", value_name = "MODEL")]
  pub model: Option<Url>,

  /// 单次预测超时（秒）
  #[arg(long, env = "RADETHIX_PREDICT_TIMEOUT", default_value_t = 60, value_name = "SECONDS")]
  pub predict_timeout_secs: u64,

  /// 上传大小上限（字节）
  #[arg(long, env = "RADETHIX_MAX_UPLOAD", default_value_t = DEFAULT_MAX_UPLOAD_BYTES, value_name = "BYTES")]
  pub max_upload_bytes: usize,

  /// 允许的 CORS 来源，可重复指定；不指定时使用本地开发地址
  #[arg(long = "allowed-origin", value_name = "ORIGIN")]
  pub allowed_origins: Vec<String>,
}

impl Args {
  pub fn bind_address(&self) -> String {
    format!("{}:{}", self.host, self.port)
  }

  pub fn predict_timeout(&self) -> Duration {
    Duration::from_secs(self.predict_timeout_secs)
  }

  pub fn server_options(&self) -> ServerOptions {
    let allowed_origins = if self.allowed_origins.is_empty() {
      DEFAULT_ALLOWED_ORIGINS.iter().map(|s| s.to_string()).collect()
    } else {
      self.allowed_origins.clone()
    };
    ServerOptions {
      allowed_origins,
      max_upload_bytes: self.max_upload_bytes,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults() {
    let args = Args::try_parse_from(["radethix"]).unwrap();
    assert_eq!(args.port, 8000);
    assert_eq!(args.predict_timeout(), Duration::from_secs(60));
    assert_eq!(args.server_options().allowed_origins.len(), DEFAULT_ALLOWED_ORIGINS.len());
    assert_eq!(args.server_options().max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
  }

  #[test]
  fn explicit_values() {
    let args = Args::try_parse_from([
      "radethix",
      "--host",
      "0.0.0.0",
      "--port",
      "9000",
      "--model",
      "densenet:///models/chex.onnx",
      "--allowed-origin",
      "https://rad.example.org",
      "--allowed-origin",
      "https://ops.example.org",
    ])
    .unwrap();
    assert_eq!(args.bind_address(), "0.0.0.0:9000");
    assert_eq!(args.model.as_ref().map(|u| u.scheme()), Some("densenet"));
    assert_eq!(
      args.server_options().allowed_origins,
      vec!["https://rad.example.org", "https://ops.example.org"]
    );
  }
}

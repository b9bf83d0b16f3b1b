// 该文件是 TinyYolo （微型 YOLO 解码） 项目的一部分。
// src/output/json_file.rs - 保存 JSON 检测结果
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

use thiserror::Error;
use tracing::warn;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, model::DetectResult, output::Render, url_file_path};

#[derive(Error, Debug)]
pub enum JsonFileOutputError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 序列化错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

/// 把最近一次的检测结果写成 JSON 数组，每次渲染覆盖文件
pub struct JsonFileOutput {
  path: PathBuf,
}

impl FromUrlWithScheme for JsonFileOutput {
  const SCHEME: &'static str = "json";
}

impl FromUrl for JsonFileOutput {
  type Error = JsonFileOutputError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(JsonFileOutputError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    Ok(JsonFileOutput {
      path: url_file_path(uri),
    })
  }
}

impl JsonFileOutput {
  fn save_json(&self, result: &DetectResult) -> Result<(), JsonFileOutputError> {
    if let Some(parent) = self.path.parent() {
      if !parent.as_os_str().is_empty() {
        std::fs::create_dir_all(parent)?;
      }
    }

    let text = serde_json::to_string_pretty(&result.items)?;
    std::fs::write(&self.path, text)?;

    warn!("保存检测结果到文件: {}", self.path.display());
    Ok(())
  }
}

impl<I> Render<I, DetectResult> for JsonFileOutput {
  type Error = JsonFileOutputError;

  fn render_result(&self, _input: &I, result: &DetectResult) -> Result<(), Self::Error> {
    self.save_json(result)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::{BoundingBox, DetectItem};

  #[test]
  fn writes_detection_records() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("out.json");
    let url = Url::parse(&format!("json://{}", path.display())).unwrap();
    let output = JsonFileOutput::from_url(&url).unwrap();

    let result = DetectResult::from(vec![DetectItem {
      bbox: BoundingBox::new(8.0, 16.0, 32.0, 64.0),
      label: "sofa".to_string(),
      confidence: 0.75,
      class_id: 17,
      color: [255, 0, 0],
    }]);
    output.render_result(&(), &result).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value[0]["label"], "sofa");
    assert_eq!(value[0]["width"], 32.0);
    assert_eq!(value[0]["confidence"], 0.75);
    assert_eq!(value.as_array().unwrap().len(), 1);
  }

  #[test]
  fn empty_result_writes_empty_array() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.json");
    let url = Url::parse(&format!("json://{}", path.display())).unwrap();
    JsonFileOutput::from_url(&url)
      .unwrap()
      .render_result(&(), &DetectResult::default())
      .unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "[]");
  }
}

// 该文件是 TinyYolo （微型 YOLO 解码） 项目的一部分。
// src/input/json_file.rs - JSON 张量文件输入
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

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::{OutputTensor, ParseError},
  url_file_path,
};

#[derive(Error, Debug)]
pub enum JsonFileInputError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 解析错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("张量解析错误: {0}")]
  ParseError(#[from] ParseError),
}

/// `{"shape": [1, 13, 13, 125], "data": [...]}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensorDocument {
  pub shape: Vec<usize>,
  pub data: Vec<f32>,
}

impl TryFrom<TensorDocument> for OutputTensor {
  type Error = ParseError;

  fn try_from(document: TensorDocument) -> Result<Self, Self::Error> {
    OutputTensor::new(&document.shape, document.data)
  }
}

pub struct JsonFileInput {
  tensor: Option<OutputTensor>,
}

impl FromUrlWithScheme for JsonFileInput {
  const SCHEME: &'static str = "json";
}

impl FromUrl for JsonFileInput {
  type Error = JsonFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(JsonFileInputError::SchemaMismatch);
    }

    let tensor = load_json_file(&url_file_path(url))?;
    Ok(JsonFileInput {
      tensor: Some(tensor),
    })
  }
}

impl Iterator for JsonFileInput {
  type Item = OutputTensor;

  fn next(&mut self) -> Option<Self::Item> {
    self.tensor.take()
  }
}

pub fn load_json_file(path: &Path) -> Result<OutputTensor, JsonFileInputError> {
  let text = std::fs::read_to_string(path)?;
  let document: TensorDocument = serde_json::from_str(&text)?;
  debug!(
    "读取 JSON 张量 {}: 形状 {:?}, {} 个数值",
    path.display(),
    document.shape,
    document.data.len()
  );
  Ok(OutputTensor::try_from(document)?)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::TENSOR_SHAPE;

  fn write_document(dir: &tempfile::TempDir, document: &serde_json::Value) -> Url {
    let path = dir.path().join("tensor.json");
    std::fs::write(&path, document.to_string()).unwrap();
    Url::parse(&format!("json://{}", path.display())).unwrap()
  }

  #[test]
  fn reads_tensor_document() {
    let dir = tempfile::tempdir().unwrap();
    let mut data = vec![0.0f32; 13 * 13 * 125];
    data[4] = 3.0;
    let document = serde_json::to_value(TensorDocument {
      shape: TENSOR_SHAPE.to_vec(),
      data,
    })
    .unwrap();

    let mut input = JsonFileInput::from_url(&write_document(&dir, &document)).unwrap();
    let tensor = input.next().unwrap();
    assert_eq!(tensor.get(0, 0, 4).unwrap(), 3.0);
    assert!(input.next().is_none());
  }

  #[test]
  fn wrong_shape_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let document = serde_json::json!({
      "shape": [1, 10, 10, 125],
      "data": vec![0.0f32; 10 * 10 * 125],
    });
    let err = JsonFileInput::from_url(&write_document(&dir, &document)).err();
    assert!(matches!(
      err,
      Some(JsonFileInputError::ParseError(ParseError::ShapeMismatch { .. }))
    ));
  }

  #[test]
  fn malformed_document_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let document = serde_json::json!({ "shape": [1, 13, 13, 125] });
    let err = JsonFileInput::from_url(&write_document(&dir, &document)).err();
    assert!(matches!(err, Some(JsonFileInputError::JsonError(_))));
  }
}

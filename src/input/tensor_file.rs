// 该文件是 TinyYolo （微型 YOLO 解码） 项目的一部分。
// src/input/tensor_file.rs - 原始 f32 张量文件输入
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

use thiserror::Error;
use tracing::{debug, error};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::{OutputTensor, ParseError, TENSOR_SHAPE},
  url_file_path,
};

const F32_SIZE: usize = std::mem::size_of::<f32>();

#[derive(Error, Debug)]
pub enum TensorFileInputError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("张量文件长度 {0} 字节不是 4 的整数倍")]
  InvalidLength(usize),
  #[error("形状参数无效: {0}")]
  InvalidShape(String),
  #[error("张量解析错误: {0}")]
  ParseError(#[from] ParseError),
}

/// 读取小端 f32 原始张量文件，例如 `tensor:///data/frame.bin?shape=1,13,13,125`
pub struct TensorFileInput {
  tensor: Option<OutputTensor>,
}

impl FromUrlWithScheme for TensorFileInput {
  const SCHEME: &'static str = "tensor";
}

impl FromUrl for TensorFileInput {
  type Error = TensorFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(TensorFileInputError::SchemaMismatch);
    }

    let shape = match url.query_pairs().find(|(k, _)| k == "shape") {
      Some((_, value)) => parse_shape(&value)?,
      None => TENSOR_SHAPE.to_vec(),
    };

    let tensor = load_tensor_file(&url_file_path(url), &shape)?;
    Ok(TensorFileInput {
      tensor: Some(tensor),
    })
  }
}

impl Iterator for TensorFileInput {
  type Item = OutputTensor;

  fn next(&mut self) -> Option<Self::Item> {
    self.tensor.take()
  }
}

fn parse_shape(value: &str) -> Result<Vec<usize>, TensorFileInputError> {
  value
    .split(',')
    .map(|dim| {
      dim
        .trim()
        .parse::<usize>()
        .map_err(|_| TensorFileInputError::InvalidShape(value.to_string()))
    })
    .collect()
}

pub fn load_tensor_file(path: &Path, shape: &[usize]) -> Result<OutputTensor, TensorFileInputError> {
  let bytes = std::fs::read(path)?;
  debug!("读取张量文件 {}: {} 字节", path.display(), bytes.len());

  if bytes.len() % F32_SIZE != 0 {
    error!("张量文件长度 {} 字节不是 4 的整数倍", bytes.len());
    return Err(TensorFileInputError::InvalidLength(bytes.len()));
  }

  let data = bytes
    .chunks_exact(F32_SIZE)
    .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
    .collect();

  Ok(OutputTensor::new(shape, data)?)
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;

  fn write_values(values: &[f32]) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    for v in values {
      file.write_all(&v.to_le_bytes()).unwrap();
    }
    file.flush().unwrap();
    file
  }

  fn url_for(file: &tempfile::NamedTempFile, query: &str) -> Url {
    Url::parse(&format!("tensor://{}{}", file.path().display(), query)).unwrap()
  }

  #[test]
  fn reads_little_endian_tensor() {
    let mut values = vec![0.0f32; 13 * 13 * 125];
    values[125] = 1.5;
    values[13 * 13 * 125 - 1] = -2.25;
    let file = write_values(&values);

    let mut input = TensorFileInput::from_url(&url_for(&file, "")).unwrap();
    let tensor = input.next().unwrap();
    assert_eq!(tensor.get(0, 1, 0).unwrap(), 1.5);
    assert_eq!(tensor.get(12, 12, 124).unwrap(), -2.25);
    assert!(input.next().is_none());
  }

  #[test]
  fn declared_shape_is_validated() {
    let file = write_values(&vec![0.0f32; 10 * 10 * 125]);
    let err = TensorFileInput::from_url(&url_for(&file, "?shape=1,10,10,125")).err();
    assert!(matches!(
      err,
      Some(TensorFileInputError::ParseError(ParseError::ShapeMismatch { .. }))
    ));
  }

  #[test]
  fn short_file_is_rejected() {
    let file = write_values(&[0.0f32; 16]);
    let err = TensorFileInput::from_url(&url_for(&file, "")).err();
    assert!(matches!(
      err,
      Some(TensorFileInputError::ParseError(ParseError::ShapeMismatch { .. }))
    ));
  }

  #[test]
  fn truncated_value_is_rejected() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&[0u8; 7]).unwrap();
    file.flush().unwrap();
    let err = TensorFileInput::from_url(&url_for(&file, "")).err();
    assert!(matches!(err, Some(TensorFileInputError::InvalidLength(7))));
  }

  #[test]
  fn malformed_shape_query_is_rejected() {
    let file = write_values(&[0.0f32; 4]);
    let err = TensorFileInput::from_url(&url_for(&file, "?shape=1,x,13")).err();
    assert!(matches!(err, Some(TensorFileInputError::InvalidShape(_))));
  }

  #[test]
  fn wrong_scheme_is_rejected() {
    let url = Url::parse("image:///tmp/photo.png").unwrap();
    assert!(matches!(
      TensorFileInput::from_url(&url),
      Err(TensorFileInputError::SchemaMismatch)
    ));
  }
}

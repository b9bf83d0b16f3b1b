// 该文件是 TinyYolo （微型 YOLO 解码） 项目的一部分。
// src/input/folder.rs - 目录批量张量输入
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
use tracing::{error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  input::{load_json_file, load_tensor_file},
  model::{OutputTensor, TENSOR_SHAPE},
  url_file_path,
};

#[derive(Error, Debug)]
pub enum FolderInputError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("不是目录: {0}")]
  NotADirectory(String),
}

/// 按文件名顺序逐个读取目录中的 `*.bin` 与 `*.json` 张量
///
/// 无法解析的文件会记录错误并跳过。
pub struct FolderInput {
  files: std::vec::IntoIter<PathBuf>,
}

impl FromUrlWithScheme for FolderInput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for FolderInput {
  type Error = FolderInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(FolderInputError::SchemaMismatch);
    }

    let directory = url_file_path(url);
    if !directory.is_dir() {
      return Err(FolderInputError::NotADirectory(
        directory.display().to_string(),
      ));
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(&directory)? {
      let path = entry?.path();
      if path.is_file() && tensor_kind(&path).is_some() {
        files.push(path);
      }
    }
    files.sort();

    info!("目录 {} 中共有 {} 个张量文件", directory.display(), files.len());

    Ok(FolderInput {
      files: files.into_iter(),
    })
  }
}

enum TensorKind {
  Raw,
  Json,
}

fn tensor_kind(path: &std::path::Path) -> Option<TensorKind> {
  match path.extension()?.to_str()?.to_lowercase().as_str() {
    "bin" => Some(TensorKind::Raw),
    "json" => Some(TensorKind::Json),
    _ => None,
  }
}

impl Iterator for FolderInput {
  type Item = OutputTensor;

  fn next(&mut self) -> Option<Self::Item> {
    for path in self.files.by_ref() {
      let loaded = match tensor_kind(&path) {
        Some(TensorKind::Raw) => load_tensor_file(&path, &TENSOR_SHAPE).map_err(|e| e.to_string()),
        Some(TensorKind::Json) => load_json_file(&path).map_err(|e| e.to_string()),
        None => continue,
      };

      match loaded {
        Ok(tensor) => return Some(tensor),
        Err(e) => error!("跳过张量文件 {}: {}", path.display(), e),
      }
    }
    None
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::input::TensorDocument;

  fn raw_bytes(first: f32) -> Vec<u8> {
    let mut values = vec![0.0f32; 13 * 13 * 125];
    values[0] = first;
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
  }

  #[test]
  fn reads_supported_files_in_name_order() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("b.bin"), raw_bytes(2.0)).unwrap();
    std::fs::write(dir.path().join("a.bin"), raw_bytes(1.0)).unwrap();
    let mut data = vec![0.0f32; 13 * 13 * 125];
    data[0] = 3.0;
    let document = TensorDocument {
      shape: TENSOR_SHAPE.to_vec(),
      data,
    };
    std::fs::write(
      dir.path().join("c.json"),
      serde_json::to_string(&document).unwrap(),
    )
    .unwrap();
    std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

    let url = Url::parse(&format!("folder://{}", dir.path().display())).unwrap();
    let firsts: Vec<f32> = FolderInput::from_url(&url)
      .unwrap()
      .map(|t| t.get(0, 0, 0).unwrap())
      .collect();
    assert_eq!(firsts, [1.0, 2.0, 3.0]);
  }

  #[test]
  fn broken_file_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.bin"), [0u8; 12]).unwrap();
    std::fs::write(dir.path().join("b.bin"), raw_bytes(5.0)).unwrap();

    let url = Url::parse(&format!("folder://{}", dir.path().display())).unwrap();
    let tensors: Vec<OutputTensor> = FolderInput::from_url(&url).unwrap().collect();
    assert_eq!(tensors.len(), 1);
    assert_eq!(tensors[0].get(0, 0, 0).unwrap(), 5.0);
  }

  #[test]
  fn missing_directory_is_rejected() {
    let url = Url::parse("folder:///definitely/not/here").unwrap();
    assert!(matches!(
      FolderInput::from_url(&url),
      Err(FolderInputError::NotADirectory(_))
    ));
  }
}

// 该文件是 TinyYolo （微型 YOLO 解码） 项目的一部分。
// src/input.rs - 张量输入
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

use thiserror::Error;

use crate::{FromUrl, FromUrlWithScheme, model::OutputTensor};

mod folder;
mod json_file;
mod tensor_file;

pub use self::folder::{FolderInput, FolderInputError};
pub use self::json_file::{JsonFileInput, JsonFileInputError, TensorDocument, load_json_file};
pub use self::tensor_file::{TensorFileInput, TensorFileInputError, load_tensor_file};

#[derive(Error, Debug)]
pub enum InputError {
  #[error("Tensor file input error: {0}")]
  TensorFileInputError(#[from] TensorFileInputError),
  #[error("JSON file input error: {0}")]
  JsonFileInputError(#[from] JsonFileInputError),
  #[error("Folder input error: {0}")]
  FolderInputError(#[from] FolderInputError),
  #[error("URI scheme mismatch")]
  SchemeMismatch,
}

pub enum InputWrapper {
  TensorFile(TensorFileInput),
  JsonFile(JsonFileInput),
  Folder(FolderInput),
}

impl FromUrl for InputWrapper {
  type Error = InputError;

  fn from_url(url: &url::Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      TensorFileInput::SCHEME => Ok(InputWrapper::TensorFile(TensorFileInput::from_url(url)?)),
      JsonFileInput::SCHEME => Ok(InputWrapper::JsonFile(JsonFileInput::from_url(url)?)),
      FolderInput::SCHEME => Ok(InputWrapper::Folder(FolderInput::from_url(url)?)),
      _ => Err(InputError::SchemeMismatch),
    }
  }
}

impl Iterator for InputWrapper {
  type Item = OutputTensor;

  fn next(&mut self) -> Option<Self::Item> {
    match self {
      InputWrapper::TensorFile(input) => input.next(),
      InputWrapper::JsonFile(input) => input.next(),
      InputWrapper::Folder(input) => input.next(),
    }
  }
}

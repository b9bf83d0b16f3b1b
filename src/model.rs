// 该文件是 TinyYolo （微型 YOLO 解码） 项目的一部分。
// src/model.rs - 模型输出解码
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

use serde::Serialize;
use thiserror::Error;

mod anchor;
mod nms;
mod score;
mod tensor;
mod tiny_yolo;

pub use self::anchor::{AnchorTable, Color, VOC_ANCHORS, VOC_CLASSES, VOC_COLORS};
pub use self::nms::{NonMaxSuppressor, iou, non_max_suppression};
pub use self::score::{argmax, best_class, softmax};
pub use self::tensor::{CHANNEL_COUNT, GRID_COLS, GRID_ROWS, OutputTensor, TENSOR_SHAPE};
pub use self::tiny_yolo::{
  CELL_HEIGHT, CELL_WIDTH, DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_LIMIT, DEFAULT_OVERLAP_THRESHOLD,
  TinyYolo, TinyYoloBuilder, sigmoid,
};

/// 解码器：把推理引擎输出的张量转换为检测结果
pub trait Decoder {
  type Input;
  type Output;
  type Error;

  fn decode(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
  #[error("张量形状不匹配: 期望 {expected:?}, 实际 {actual:?}")]
  ShapeMismatch {
    expected: Vec<usize>,
    actual: Vec<usize>,
  },
  #[error("张量索引越界: 行 {row}, 列 {col}, 通道 {channel}")]
  Index {
    row: usize,
    col: usize,
    channel: usize,
  },
  #[error("配置错误: {0}")]
  Configuration(String),
}

impl ParseError {
  pub fn configuration(msg: impl Into<String>) -> Self {
    ParseError::Configuration(msg.into())
  }
}

/// 像素坐标下的边界框，原点在左上角
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
  pub x: f32,
  pub y: f32,
  pub width: f32,
  pub height: f32,
}

impl BoundingBox {
  pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
    Self {
      x,
      y,
      width,
      height,
    }
  }

  pub fn area(&self) -> f32 {
    self.width * self.height
  }

  pub fn right(&self) -> f32 {
    self.x + self.width
  }

  pub fn bottom(&self) -> f32 {
    self.y + self.height
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectItem {
  #[serde(flatten)]
  pub bbox: BoundingBox,
  pub label: String,
  pub confidence: f32,
  #[serde(skip)]
  pub class_id: usize,
  #[serde(skip)]
  pub color: Color,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectResult {
  pub items: Box<[DetectItem]>,
}

impl DetectResult {
  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn iter(&self) -> std::slice::Iter<'_, DetectItem> {
    self.items.iter()
  }
}

impl From<Vec<DetectItem>> for DetectResult {
  fn from(items: Vec<DetectItem>) -> Self {
    Self {
      items: items.into_boxed_slice(),
    }
  }
}

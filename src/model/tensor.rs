// 该文件是 TinyYolo （微型 YOLO 解码） 项目的一部分。
// src/model/tensor.rs - 输出张量只读视图
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

use std::ops::Range;

use tracing::error;

use crate::model::ParseError;

pub const GRID_ROWS: usize = 13;
pub const GRID_COLS: usize = 13;
pub const CHANNEL_COUNT: usize = 125;
pub const TENSOR_SHAPE: [usize; 4] = [1, GRID_ROWS, GRID_COLS, CHANNEL_COUNT];

const TENSOR_LEN: usize = GRID_ROWS * GRID_COLS * CHANNEL_COUNT;

/// 形状为 (1, 13, 13, 125) 的 NHWC 输出张量
///
/// 同一网格单元的全部通道在内存中连续存放，
/// 相邻单元之间的跨度为 [`CHANNEL_COUNT`]。
#[derive(Debug, Clone, PartialEq)]
pub struct OutputTensor {
  data: Box<[f32]>,
}

impl OutputTensor {
  /// 按声明的形状包装一段缓冲区，形状或长度不符时返回 [`ParseError::ShapeMismatch`]
  pub fn new(shape: &[usize], data: Vec<f32>) -> Result<Self, ParseError> {
    if shape != TENSOR_SHAPE {
      error!("张量形状不匹配: 期望 {:?}, 实际 {:?}", TENSOR_SHAPE, shape);
      return Err(ParseError::ShapeMismatch {
        expected: TENSOR_SHAPE.to_vec(),
        actual: shape.to_vec(),
      });
    }

    if data.len() != TENSOR_LEN {
      error!("张量数据长度不匹配: 期望 {}, 实际 {}", TENSOR_LEN, data.len());
      return Err(ParseError::ShapeMismatch {
        expected: vec![TENSOR_LEN],
        actual: vec![data.len()],
      });
    }

    Ok(Self {
      data: data.into_boxed_slice(),
    })
  }

  pub fn zeros() -> Self {
    Self {
      data: vec![0.0; TENSOR_LEN].into_boxed_slice(),
    }
  }

  pub fn shape(&self) -> [usize; 4] {
    TENSOR_SHAPE
  }

  pub fn as_slice(&self) -> &[f32] {
    &self.data
  }

  pub fn get(&self, row: usize, col: usize, channel: usize) -> Result<f32, ParseError> {
    let offset = checked_offset(row, col, channel)?;
    Ok(self.data[offset])
  }

  /// 读取某个网格单元的一段连续通道
  pub fn channels(
    &self,
    row: usize,
    col: usize,
    channels: Range<usize>,
  ) -> Result<&[f32], ParseError> {
    if channels.start > channels.end || channels.end > CHANNEL_COUNT {
      return Err(ParseError::Index {
        row,
        col,
        channel: channels.end,
      });
    }
    let start = checked_offset(row, col, 0)? + channels.start;
    let end = start + channels.len();
    Ok(&self.data[start..end])
  }
}

/// NHWC 下 (row, col, channel) 对应的扁平索引
pub(crate) fn offset(row: usize, col: usize, channel: usize) -> usize {
  (row * GRID_COLS + col) * CHANNEL_COUNT + channel
}

fn checked_offset(row: usize, col: usize, channel: usize) -> Result<usize, ParseError> {
  if row >= GRID_ROWS || col >= GRID_COLS || channel >= CHANNEL_COUNT {
    return Err(ParseError::Index { row, col, channel });
  }
  Ok(offset(row, col, channel))
}

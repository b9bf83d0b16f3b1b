// 该文件是 TinyYolo （微型 YOLO 解码） 项目的一部分。
// src/model/anchor.rs - 锚框与类别表
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

use tracing::error;

use crate::model::{CHANNEL_COUNT, ParseError};

/// 每个锚框的 4 个几何量加 1 个置信度
pub(crate) const BOX_INFO_FEATURE_COUNT: usize = 5;

/// RGB 显示颜色
pub type Color = [u8; 3];

const CYAN: Color = [0, 255, 255];
const GREEN: Color = [0, 255, 0];
const MAGENTA: Color = [255, 0, 255];
const RED: Color = [255, 0, 0];
const YELLOW: Color = [255, 235, 4];
const BLACK: Color = [0, 0, 0];
const BLUE: Color = [0, 0, 255];

/// Tiny-YOLO VOC 模型的锚框 (宽, 高)，单位为网格单元
pub const VOC_ANCHORS: [(f32, f32); 5] = [
  (1.08, 1.19),
  (3.42, 4.41),
  (6.63, 11.38),
  (9.42, 5.11),
  (16.62, 10.52),
];

/// Pascal VOC 数据集类别名称
pub const VOC_CLASSES: [&str; 20] = [
  "aeroplane",
  "bicycle",
  "bird",
  "boat",
  "bottle",
  "bus",
  "car",
  "cat",
  "chair",
  "cow",
  "diningtable",
  "dog",
  "horse",
  "motorbike",
  "person",
  "pottedplant",
  "sheep",
  "sofa",
  "train",
  "tvmonitor",
];

pub const VOC_COLORS: [Color; 20] = [
  CYAN, GREEN, MAGENTA, RED, YELLOW, BLACK, BLUE, CYAN, GREEN, MAGENTA, RED, YELLOW, BLACK, BLUE,
  CYAN, GREEN, MAGENTA, RED, YELLOW, BLACK,
];

/// 锚框、类别名称与显示颜色，构造后只读
#[derive(Debug, Clone, PartialEq)]
pub struct AnchorTable {
  anchors: Box<[(f32, f32)]>,
  labels: Box<[String]>,
  colors: Box<[Color]>,
}

impl Default for AnchorTable {
  fn default() -> Self {
    Self::voc()
  }
}

impl AnchorTable {
  /// 校验表格与输出通道数一致：`锚框数 × (5 + 类别数) == 通道数`
  pub fn new(
    anchors: Vec<(f32, f32)>,
    labels: Vec<String>,
    colors: Vec<Color>,
  ) -> Result<Self, ParseError> {
    if anchors.is_empty() || labels.is_empty() {
      error!("锚框表或类别表为空");
      return Err(ParseError::configuration("锚框表与类别表不能为空"));
    }

    if labels.len() != colors.len() {
      error!(
        "类别数量 {} 与颜色数量 {} 不一致",
        labels.len(),
        colors.len()
      );
      return Err(ParseError::configuration(format!(
        "类别数量 {} 与颜色数量 {} 不一致",
        labels.len(),
        colors.len()
      )));
    }

    let channels = anchors.len() * (BOX_INFO_FEATURE_COUNT + labels.len());
    if channels != CHANNEL_COUNT {
      error!(
        "{} 个锚框 × (5 + {} 个类别) = {}, 期望通道数 {}",
        anchors.len(),
        labels.len(),
        channels,
        CHANNEL_COUNT
      );
      return Err(ParseError::configuration(format!(
        "锚框与类别组合需要 {} 个通道, 张量只有 {} 个",
        channels, CHANNEL_COUNT
      )));
    }

    if anchors
      .iter()
      .any(|&(w, h)| !(w.is_finite() && h.is_finite() && w > 0.0 && h > 0.0))
    {
      error!("锚框尺寸必须为正的有限值: {:?}", anchors);
      return Err(ParseError::configuration("锚框尺寸必须为正的有限值"));
    }

    Ok(Self {
      anchors: anchors.into_boxed_slice(),
      labels: labels.into_boxed_slice(),
      colors: colors.into_boxed_slice(),
    })
  }

  pub fn voc() -> Self {
    Self {
      anchors: VOC_ANCHORS.to_vec().into_boxed_slice(),
      labels: VOC_CLASSES.iter().map(|s| s.to_string()).collect(),
      colors: VOC_COLORS.to_vec().into_boxed_slice(),
    }
  }

  pub fn anchor_count(&self) -> usize {
    self.anchors.len()
  }

  pub fn class_count(&self) -> usize {
    self.labels.len()
  }

  /// 单个锚框在通道维度上占用的宽度
  pub fn anchor_stride(&self) -> usize {
    BOX_INFO_FEATURE_COUNT + self.class_count()
  }

  pub fn anchor(&self, index: usize) -> Option<(f32, f32)> {
    self.anchors.get(index).copied()
  }

  pub fn label(&self, class_id: usize) -> Option<&str> {
    self.labels.get(class_id).map(String::as_str)
  }

  pub fn color(&self, class_id: usize) -> Option<Color> {
    self.colors.get(class_id).copied()
  }
}

// 该文件是 TinyYolo （微型 YOLO 解码） 项目的一部分。
// src/model/tiny_yolo.rs - Tiny-YOLO 输出解析
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

use tracing::{debug, error};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::{
    AnchorTable, BoundingBox, Decoder, DetectItem, DetectResult, GRID_COLS, GRID_ROWS,
    NonMaxSuppressor, OutputTensor, ParseError, best_class,
  },
};

/// 输入 416×416 图像时每个网格单元的像素尺寸
pub const CELL_WIDTH: f32 = 32.0;
pub const CELL_HEIGHT: f32 = 32.0;

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.3;
pub const DEFAULT_OVERLAP_THRESHOLD: f32 = 0.45;
pub const DEFAULT_LIMIT: usize = 5;

const CONFIDENCE_CHANNEL: usize = 4;
const CLASS_CHANNEL_OFFSET: usize = 5;

pub fn sigmoid(x: f32) -> f32 {
  // 负半轴改用 e^x / (1 + e^x)，避免 e^-x 溢出后结果变为 0
  if x < 0.0 {
    let k = x.exp();
    k / (1.0 + k)
  } else {
    1.0 / (1.0 + (-x).exp())
  }
}

/// 网络输出的原始几何偏移
#[derive(Debug, Clone, Copy)]
struct RawBox {
  tx: f32,
  ty: f32,
  tw: f32,
  th: f32,
}

impl RawBox {
  fn read(tensor: &OutputTensor, row: usize, col: usize, base: usize) -> Result<Self, ParseError> {
    Ok(Self {
      tx: tensor.get(row, col, base)?,
      ty: tensor.get(row, col, base + 1)?,
      tw: tensor.get(row, col, base + 2)?,
      th: tensor.get(row, col, base + 3)?,
    })
  }
}

/// 映射到像素坐标后的中心点与尺寸
#[derive(Debug, Clone, Copy)]
struct CellBox {
  cx: f32,
  cy: f32,
  width: f32,
  height: f32,
}

impl CellBox {
  fn map(raw: RawBox, row: usize, col: usize, (anchor_w, anchor_h): (f32, f32)) -> Self {
    Self {
      cx: (col as f32 + sigmoid(raw.tx)) * CELL_WIDTH,
      cy: (row as f32 + sigmoid(raw.ty)) * CELL_HEIGHT,
      width: raw.tw.exp() * CELL_WIDTH * anchor_w,
      height: raw.th.exp() * CELL_HEIGHT * anchor_h,
    }
  }

  fn is_finite(&self) -> bool {
    self.cx.is_finite() && self.cy.is_finite() && self.width.is_finite() && self.height.is_finite()
  }

  fn to_top_left(self) -> BoundingBox {
    BoundingBox {
      x: self.cx - self.width / 2.0,
      y: self.cy - self.height / 2.0,
      width: self.width,
      height: self.height,
    }
  }
}

/// Tiny-YOLO (VOC) 输出解析器，构造后只读
#[derive(Debug, Clone)]
pub struct TinyYolo {
  table: AnchorTable,
  confidence_threshold: f32,
  suppressor: NonMaxSuppressor,
}

#[derive(Debug, Clone)]
pub struct TinyYoloBuilder {
  table: AnchorTable,
  confidence_threshold: f32,
  overlap_threshold: f32,
  limit: usize,
}

impl Default for TinyYoloBuilder {
  fn default() -> Self {
    Self {
      table: AnchorTable::voc(),
      confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
      overlap_threshold: DEFAULT_OVERLAP_THRESHOLD,
      limit: DEFAULT_LIMIT,
    }
  }
}

impl FromUrlWithScheme for TinyYoloBuilder {
  const SCHEME: &'static str = "tinyyolo";
}

impl FromUrl for TinyYoloBuilder {
  type Error = ParseError;

  /// `tinyyolo://voc?confidence=0.3&overlap=0.45&limit=5`，查询参数均可省略
  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI 方案不匹配: 期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ParseError::configuration(format!(
        "模型地址必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    let mut builder = TinyYoloBuilder::default();

    match url.host_str() {
      None | Some("") | Some("voc") => {}
      Some(other) => {
        return Err(ParseError::configuration(format!(
          "未知的锚框表: {}",
          other
        )));
      }
    }

    for (key, value) in url.query_pairs() {
      match &*key {
        "confidence" => builder.confidence_threshold = parse_query(&key, &value)?,
        "overlap" => builder.overlap_threshold = parse_query(&key, &value)?,
        "limit" => builder.limit = parse_query(&key, &value)?,
        other => {
          error!("未知的查询参数: {}", other);
          return Err(ParseError::configuration(format!(
            "未知的查询参数: {}",
            other
          )));
        }
      }
    }

    Ok(builder)
  }
}

fn parse_query<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ParseError> {
  value.parse().map_err(|_| {
    error!("查询参数 {} 的值无效: {}", key, value);
    ParseError::configuration(format!("查询参数 {} 的值无效: {}", key, value))
  })
}

impl TinyYoloBuilder {
  pub fn anchor_table(mut self, table: AnchorTable) -> Self {
    self.table = table;
    self
  }

  pub fn confidence_threshold(mut self, threshold: f32) -> Self {
    self.confidence_threshold = threshold;
    self
  }

  pub fn overlap_threshold(mut self, threshold: f32) -> Self {
    self.overlap_threshold = threshold;
    self
  }

  pub fn limit(mut self, limit: usize) -> Self {
    self.limit = limit;
    self
  }

  pub fn build(self) -> Result<TinyYolo, ParseError> {
    if !(0.0..=1.0).contains(&self.confidence_threshold) {
      error!("置信度阈值 {} 不在 [0, 1] 范围内", self.confidence_threshold);
      return Err(ParseError::configuration(format!(
        "置信度阈值 {} 不在 [0, 1] 范围内",
        self.confidence_threshold
      )));
    }

    let suppressor = NonMaxSuppressor::new(self.overlap_threshold, self.limit)?;

    debug!(
      "解析器配置: 置信度阈值 {}, 重叠阈值 {}, 最大结果数 {}",
      self.confidence_threshold, self.overlap_threshold, self.limit
    );

    Ok(TinyYolo {
      table: self.table,
      confidence_threshold: self.confidence_threshold,
      suppressor,
    })
  }
}

impl TinyYolo {
  pub fn builder() -> TinyYoloBuilder {
    TinyYoloBuilder::default()
  }

  pub fn confidence_threshold(&self) -> f32 {
    self.confidence_threshold
  }

  pub fn suppressor(&self) -> &NonMaxSuppressor {
    &self.suppressor
  }

  pub fn anchor_table(&self) -> &AnchorTable {
    &self.table
  }

  /// 遍历所有网格单元与锚框，返回按解码顺序排列的候选框
  pub fn parse_outputs(&self, tensor: &OutputTensor) -> Result<Vec<DetectItem>, ParseError> {
    let mut boxes = Vec::new();

    for row in 0..GRID_ROWS {
      for col in 0..GRID_COLS {
        for anchor in 0..self.table.anchor_count() {
          if let Some(item) = self.decode_anchor(tensor, row, col, anchor)? {
            boxes.push(item);
          }
        }
      }
    }

    debug!("解码得到 {} 个候选框", boxes.len());
    Ok(boxes)
  }

  pub fn filter_boxes(&self, candidates: Vec<DetectItem>) -> Vec<DetectItem> {
    self.suppressor.suppress(candidates)
  }

  fn decode_anchor(
    &self,
    tensor: &OutputTensor,
    row: usize,
    col: usize,
    anchor: usize,
  ) -> Result<Option<DetectItem>, ParseError> {
    let base = anchor * self.table.anchor_stride();

    // NaN 同样被丢弃
    let confidence = sigmoid(tensor.get(row, col, base + CONFIDENCE_CHANNEL)?);
    if !(confidence >= self.confidence_threshold) {
      return Ok(None);
    }

    let prior = self.table.anchor(anchor).ok_or(ParseError::Index {
      row,
      col,
      channel: base,
    })?;
    let raw = RawBox::read(tensor, row, col, base)?;
    let cell = CellBox::map(raw, row, col, prior);
    if !cell.is_finite() {
      debug!("丢弃几何量非有限的候选框: 行 {}, 列 {}, 锚框 {}", row, col, anchor);
      return Ok(None);
    }

    let logits = tensor.channels(
      row,
      col,
      base + CLASS_CHANNEL_OFFSET..base + self.table.anchor_stride(),
    )?;
    let Some((class_id, probability)) = best_class(logits) else {
      return Ok(None);
    };

    let top_score = confidence * probability;
    if !(top_score >= self.confidence_threshold) {
      return Ok(None);
    }

    let (Some(label), Some(color)) = (self.table.label(class_id), self.table.color(class_id))
    else {
      return Err(ParseError::Index {
        row,
        col,
        channel: base + CLASS_CHANNEL_OFFSET + class_id,
      });
    };

    Ok(Some(DetectItem {
      bbox: cell.to_top_left(),
      label: label.to_string(),
      confidence: top_score,
      class_id,
      color,
    }))
  }
}

impl Decoder for TinyYolo {
  type Input = OutputTensor;
  type Output = DetectResult;
  type Error = ParseError;

  fn decode(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    let candidates = self.parse_outputs(input)?;
    let items = self.filter_boxes(candidates);
    debug!("检测到 {} 个物体", items.len());
    Ok(DetectResult::from(items))
  }
}

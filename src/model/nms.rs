// 该文件是 TinyYolo （微型 YOLO 解码） 项目的一部分。
// src/model/nms.rs - 非极大值抑制
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

use crate::model::{BoundingBox, DetectItem, ParseError};

/// 计算两个边界框的 IoU，任一面积不为正时返回 0
pub fn iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
  let area_a = a.area();
  if !(area_a > 0.0) {
    return 0.0;
  }
  let area_b = b.area();
  if !(area_b > 0.0) {
    return 0.0;
  }

  let x1 = a.x.max(b.x);
  let y1 = a.y.max(b.y);
  let x2 = a.right().min(b.right());
  let y2 = a.bottom().min(b.bottom());

  let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
  intersection / (area_a + area_b - intersection)
}

/// 贪心非极大值抑制，与类别无关
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NonMaxSuppressor {
  overlap_threshold: f32,
  limit: usize,
}

impl NonMaxSuppressor {
  pub fn new(overlap_threshold: f32, limit: usize) -> Result<Self, ParseError> {
    if !(0.0..=1.0).contains(&overlap_threshold) {
      error!("重叠阈值 {} 不在 [0, 1] 范围内", overlap_threshold);
      return Err(ParseError::configuration(format!(
        "重叠阈值 {} 不在 [0, 1] 范围内",
        overlap_threshold
      )));
    }

    Ok(Self {
      overlap_threshold,
      limit,
    })
  }

  pub fn overlap_threshold(&self) -> f32 {
    self.overlap_threshold
  }

  pub fn limit(&self) -> usize {
    self.limit
  }

  /// 按置信度降序保留候选框，最多 `limit` 个
  ///
  /// 置信度相同的候选框保持解码顺序，先出现者优先。
  /// 与已保留框 IoU 超过阈值的候选框被抑制。
  pub fn suppress(&self, candidates: Vec<DetectItem>) -> Vec<DetectItem> {
    let mut order: Vec<usize> = (0..candidates.len()).collect();
    // sort_by 是稳定排序
    order.sort_by(|&a, &b| {
      candidates[b]
        .confidence
        .total_cmp(&candidates[a].confidence)
    });

    // 以候选框原始索引为键
    let mut active = vec![true; candidates.len()];
    let mut accepted = Vec::with_capacity(self.limit.min(candidates.len()));

    for (position, &index) in order.iter().enumerate() {
      if accepted.len() >= self.limit {
        break;
      }
      if !active[index] {
        continue;
      }

      accepted.push(index);
      if accepted.len() >= self.limit {
        break;
      }

      let kept = &candidates[index].bbox;
      for &other in &order[position + 1..] {
        if active[other] && iou(kept, &candidates[other].bbox) > self.overlap_threshold {
          active[other] = false;
        }
      }
    }

    debug!(
      "非极大值抑制: {} 个候选框, 保留 {} 个",
      candidates.len(),
      accepted.len()
    );

    let mut slots: Vec<Option<DetectItem>> = candidates.into_iter().map(Some).collect();
    accepted
      .into_iter()
      .filter_map(|index| slots[index].take())
      .collect()
  }
}

/// 按调用参数执行非极大值抑制，参数无效时立即失败
pub fn non_max_suppression(
  candidates: Vec<DetectItem>,
  overlap_threshold: f32,
  limit: usize,
) -> Result<Vec<DetectItem>, ParseError> {
  Ok(NonMaxSuppressor::new(overlap_threshold, limit)?.suppress(candidates))
}

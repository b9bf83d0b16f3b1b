// 该文件是 TinyYolo （微型 YOLO 解码） 项目的一部分。
// src/model/score.rs - 类别打分
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

/// 数值稳定的 softmax：先减去最大值再取指数
pub fn softmax(logits: &[f32]) -> Vec<f32> {
  let max_logit = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
  let exp: Vec<f32> = logits.iter().map(|&v| (v - max_logit).exp()).collect();
  let sum: f32 = exp.iter().sum();
  exp.into_iter().map(|v| v / sum).collect()
}

/// 返回概率最大的 (索引, 概率)，并列时取最小索引
pub fn argmax(probabilities: &[f32]) -> Option<(usize, f32)> {
  let mut best: Option<(usize, f32)> = None;
  for (index, &value) in probabilities.iter().enumerate() {
    match best {
      Some((_, best_value)) if value <= best_value => {}
      _ => best = Some((index, value)),
    }
  }
  best
}

pub fn best_class(logits: &[f32]) -> Option<(usize, f32)> {
  argmax(&softmax(logits))
}

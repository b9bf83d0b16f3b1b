// 该文件是 TinyYolo （微型 YOLO 解码） 项目的一部分。
// benches/decode_benchmark.rs - 解码性能测试
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

use divan::black_box;
use tinyyolo::model::{
  BoundingBox, Decoder, DetectItem, OutputTensor, TENSOR_SHAPE, TinyYolo, non_max_suppression,
  softmax,
};

fn main() {
  divan::main();
}

/// 确定性的伪随机张量，大约一半的锚框超过默认置信度阈值
fn synthetic_tensor() -> OutputTensor {
  let len = TENSOR_SHAPE.iter().product::<usize>();
  let data = (0..len)
    .map(|i| ((i as f32) * 0.618_034).sin() * 4.0)
    .collect();
  OutputTensor::new(&TENSOR_SHAPE, data).unwrap()
}

fn synthetic_candidates(count: usize) -> Vec<DetectItem> {
  (0..count)
    .map(|i| {
      let offset = i as f32;
      DetectItem {
        bbox: BoundingBox::new(
          (offset * 7.0) % 400.0,
          (offset * 11.0) % 400.0,
          40.0 + offset % 30.0,
          60.0 + offset % 20.0,
        ),
        label: "person".to_string(),
        confidence: 1.0 - (offset * 0.37) % 1.0,
        class_id: 14,
        color: [0, 0, 0],
      }
    })
    .collect()
}

#[divan::bench()]
fn decode_full_tensor(bencher: divan::Bencher) {
  let tensor = synthetic_tensor();
  let parser = TinyYolo::builder().build().unwrap();
  bencher.bench_local(|| parser.decode(black_box(&tensor)));
}

#[divan::bench()]
fn decode_empty_tensor(bencher: divan::Bencher) {
  let tensor = OutputTensor::zeros();
  let parser = TinyYolo::builder().build().unwrap();
  bencher.bench_local(|| parser.decode(black_box(&tensor)));
}

#[divan::bench()]
fn parse_outputs_only(bencher: divan::Bencher) {
  let tensor = synthetic_tensor();
  let parser = TinyYolo::builder().build().unwrap();
  bencher.bench_local(|| parser.parse_outputs(black_box(&tensor)));
}

#[divan::bench(args = [16, 128, 845])]
fn nms(bencher: divan::Bencher, count: usize) {
  let candidates = synthetic_candidates(count);
  bencher
    .with_inputs(|| candidates.clone())
    .bench_local_values(|candidates| non_max_suppression(candidates, 0.45, 5));
}

#[divan::bench()]
fn class_softmax(bencher: divan::Bencher) {
  let logits: Vec<f32> = (0..20).map(|i| (i as f32 * 0.3).cos() * 5.0).collect();
  bencher.bench_local(|| softmax(black_box(&logits)));
}

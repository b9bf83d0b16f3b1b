// 该文件是 TinyYolo （微型 YOLO 解码） 项目的一部分。
// src/task.rs - 解码任务
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

use std::{thread, time::Duration};

use anyhow::Context;
use tracing::{info, warn};

use crate::{model::Decoder, output::Render};

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error>;
}

pub struct OneShotTask;

impl<
  F,
  D,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Decoder<Input = F, Output = D, Error = ME>,
  O: Render<F, D, Error = RE>,
> Task<I, M, O> for OneShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let tensor = input.next().ok_or_else(|| anyhow::anyhow!("没有输入张量"))?;
    info!("输入张量获取成功，开始解码...");
    let now = std::time::Instant::now();
    let result = model.decode(&tensor)?;
    let elapsed = now.elapsed();
    info!("解码完成，耗时: {:.2?}", elapsed);
    output.render_result(&tensor, &result)?;
    info!("输出完成，耗时: {:.2?}", now.elapsed());

    Ok(())
  }
}

const WARMUP_TIMES: usize = 2;

pub struct RepeatShotTask {
  repeat_times: usize,
}

impl Default for RepeatShotTask {
  fn default() -> Self {
    Self { repeat_times: 1000 }
  }
}

impl RepeatShotTask {
  pub fn with_repeat_times(mut self, repeat_times: usize) -> Self {
    self.repeat_times = repeat_times;
    self
  }
}

impl<
  F,
  D,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Decoder<Input = F, Output = D, Error = ME>,
  O: Render<F, D, Error = RE>,
> Task<I, M, O> for RepeatShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let tensor = input.next().ok_or_else(|| anyhow::anyhow!("没有输入张量"))?;
    info!("输入张量获取成功，重复解码 {} 次...", self.repeat_times);
    let mut times = Vec::with_capacity(self.repeat_times);
    for i in 0..self.repeat_times {
      let now = std::time::Instant::now();
      let result = model.decode(&tensor)?;
      let elapsed = now.elapsed();
      info!("({})解码完成，耗时: {:.2?}", i, elapsed);
      output.render_result(&tensor, &result)?;
      times.push(elapsed);
    }

    // 前两次作为预热不计入平均
    let measured = &times[WARMUP_TIMES.min(times.len())..];
    if measured.is_empty() {
      warn!("重复次数不足 {}，无法统计平均解码时间", WARMUP_TIMES + 1);
    } else {
      warn!(
        "平均解码时间: {:.2?}",
        measured.iter().sum::<Duration>() / measured.len() as u32
      );
    }

    Ok(())
  }
}

#[derive(Default, Debug)]
pub struct ContinuousTask {
  frame_number: Option<usize>,
}

impl ContinuousTask {
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }
}

impl<
  F,
  D,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Decoder<Input = F, Output = D, Error = ME>,
  O: Render<F, D, Error = RE>,
> Task<I, M, O> for ContinuousTask
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let (tx, rx) = std::sync::mpsc::channel();

    ctrlc::set_handler(move || {
      info!("收到中断信号，准备退出...");
      let _ = tx.send(());
      thread::spawn(|| {
        thread::sleep(Duration::from_secs(30));
        warn!("强制退出程序");
        std::process::exit(1);
      });
    })
    .context("无法设置 Ctrl-C 处理器")?;

    self.run_until(input, model, output, || rx.try_recv().is_ok())
  }
}

impl ContinuousTask {
  fn run_until<F, D, ME, RE, I, M, O>(
    &self,
    input: I,
    model: M,
    output: O,
    interrupted: impl Fn() -> bool,
  ) -> anyhow::Result<()>
  where
    ME: std::error::Error + Sync + Send + 'static,
    RE: std::error::Error + Sync + Send + 'static,
    I: Iterator<Item = F>,
    M: Decoder<Input = F, Output = D, Error = ME>,
    O: Render<F, D, Error = RE>,
  {
    let mut frame_index = 0usize;
    let mut now = std::time::Instant::now();
    for tensor in input {
      frame_index = frame_index.wrapping_add(1);
      info!("处理第 {} 个张量", frame_index);
      let result = model.decode(&tensor)?;
      let elapsed_a = now.elapsed();
      output.render_result(&tensor, &result)?;
      let elapsed_b = now.elapsed();
      now = std::time::Instant::now();
      info!("解码完成，耗时: {:.2?} / {:.2?}", elapsed_a, elapsed_b);
      if self.frame_number.map(|n| frame_index >= n).unwrap_or(false) {
        info!("达到指定张量数 {}, 退出任务循环", frame_index);
        break;
      }
      if interrupted() {
        warn!("中断信号接收，退出任务循环");
        break;
      }
    }

    info!("任务完成，退出");
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use std::cell::RefCell;

  use super::*;
  use crate::model::{
    DetectResult, GRID_COLS, GRID_ROWS, OutputTensor, ParseError, TENSOR_SHAPE, TinyYolo,
  };

  #[derive(Default)]
  struct Collect {
    results: RefCell<Vec<DetectResult>>,
  }

  impl Render<OutputTensor, DetectResult> for &Collect {
    type Error = std::io::Error;

    fn render_result(&self, _input: &OutputTensor, result: &DetectResult) -> Result<(), Self::Error> {
      self.results.borrow_mut().push(result.clone());
      Ok(())
    }
  }

  fn tensor_with_object() -> OutputTensor {
    let mut data = vec![0.0f32; GRID_ROWS * GRID_COLS * 125];
    // (row 3, col 5, anchor 0): 置信度与 "person" 类别
    let base = (3 * GRID_COLS + 5) * 125;
    data[base + 4] = 8.0;
    data[base + 5 + 14] = 8.0;
    OutputTensor::new(&TENSOR_SHAPE, data).unwrap()
  }

  #[test]
  fn oneshot_decodes_first_tensor_only() {
    let collect = Collect::default();
    let parser = TinyYolo::builder().build().unwrap();
    let input = vec![tensor_with_object(), OutputTensor::zeros()].into_iter();
    OneShotTask.run_task(input, parser, &collect).unwrap();

    let results = collect.results.borrow();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].items[0].label, "person");
  }

  #[test]
  fn oneshot_without_input_fails() {
    let collect = Collect::default();
    let parser = TinyYolo::builder().build().unwrap();
    let input = Vec::<OutputTensor>::new().into_iter();
    assert!(OneShotTask.run_task(input, parser, &collect).is_err());
  }

  #[test]
  fn repeatshot_renders_every_repetition() {
    let collect = Collect::default();
    let parser = TinyYolo::builder().build().unwrap();
    let input = std::iter::once(tensor_with_object());
    RepeatShotTask::default()
      .with_repeat_times(5)
      .run_task(input, parser, &collect)
      .unwrap();

    let results = collect.results.borrow();
    assert_eq!(results.len(), 5);
    assert!(results.windows(2).all(|pair| pair[0] == pair[1]));
  }

  #[test]
  fn continuous_stops_at_frame_number() {
    let collect = Collect::default();
    let parser = TinyYolo::builder().build().unwrap();
    let input = std::iter::repeat_with(OutputTensor::zeros).take(10);
    ContinuousTask::default()
      .with_frame_number(Some(3))
      .run_until(input, parser, &collect, || false)
      .unwrap();
    assert_eq!(collect.results.borrow().len(), 3);
  }

  #[test]
  fn continuous_stops_when_interrupted() {
    let collect = Collect::default();
    let parser = TinyYolo::builder().build().unwrap();
    let input = std::iter::repeat_with(OutputTensor::zeros).take(10);
    ContinuousTask::default()
      .run_until(input, parser, &collect, || true)
      .unwrap();
    assert_eq!(collect.results.borrow().len(), 1);
  }

  #[test]
  fn continuous_drains_input() {
    let collect = Collect::default();
    let parser = TinyYolo::builder().build().unwrap();
    let input = vec![OutputTensor::zeros(), tensor_with_object()].into_iter();
    ContinuousTask::default()
      .run_until(input, parser, &collect, || false)
      .unwrap();

    let results = collect.results.borrow();
    assert_eq!(results.len(), 2);
    assert!(results[0].is_empty());
    assert_eq!(results[1].len(), 1);
  }

  #[test]
  fn decoder_error_propagates() {
    struct Broken;
    impl Decoder for Broken {
      type Input = OutputTensor;
      type Output = DetectResult;
      type Error = ParseError;

      fn decode(&self, _input: &OutputTensor) -> Result<DetectResult, ParseError> {
        Err(ParseError::configuration("broken"))
      }
    }

    let collect = Collect::default();
    let input = std::iter::once(OutputTensor::zeros());
    assert!(OneShotTask.run_task(input, Broken, &collect).is_err());
  }
}

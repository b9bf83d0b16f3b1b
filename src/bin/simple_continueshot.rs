// 该文件是 TinyYolo （微型 YOLO 解码） 项目的一部分。
// src/bin/simple_continueshot.rs - 连续解码
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

use anyhow::Result;
use clap::Parser;
use url::Url;

use tinyyolo::{
  FromUrl,
  task::{ContinuousTask, Task},
};
use tracing::info;

/// TinyYolo 解码参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 解析器地址，例如 tinyyolo://voc?confidence=0.3&overlap=0.45&limit=5
  #[arg(long, value_name = "MODEL", default_value = "tinyyolo://voc")]
  pub model: Url,
  /// 输入来源 (tensor://, json://, folder://)
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出路径 (log://, json://, folder://)
  #[arg(long, value_name = "OUTPUT", default_value = "log://")]
  pub output: Url,

  /// 最多处理的张量数量
  #[arg(long, value_name = "FRAME_NUMBER")]
  pub frame_number: Option<usize>,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("解析器配置: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let input = tinyyolo::input::InputWrapper::from_url(&args.input)?;
  let model = tinyyolo::model::TinyYoloBuilder::from_url(&args.model)?.build()?;
  let output = tinyyolo::output::OutputWrapper::from_url(&args.output)?;

  ContinuousTask::default()
    .with_frame_number(args.frame_number)
    .run_task(input, model, output)?;

  Ok(())
}

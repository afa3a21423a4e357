// 该文件是 Xunjing （寻景） 项目的一部分。
// src/main.rs - 项目主程序
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Xunjing Contributors

mod args;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use xunjing::{
  inference::Pipeline,
  input::{ImageData, ImageFileInput},
  model::GlipBuilder,
  output::{Draw, SaveImageFileOutput},
  task::{FailFastScan, IsolatedScan, Task},
};

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = args::Args::parse();

  info!("模型尺寸: {}", args.model_size);
  info!("推理设备: {}", args.device);
  info!("模型根目录: {}", args.root.display());
  info!("目标描述: {}", args.caption);
  info!("置信度阈值: {}", args.threshold);
  info!("视角数量: {}", args.images.len());

  // 尺寸与设备在读取任何文件之前校验
  let builder = GlipBuilder::new(&args.model_size, &args.device, &args.root)?;

  let images = args
    .images
    .iter()
    .map(|path| ImageFileInput::open(path).map(ImageFileInput::into_image_data))
    .collect::<Result<Vec<ImageData>, _>>()?;

  info!("正在加载模型...");
  let detector = builder.build()?;

  let draw = match &args.font {
    Some(path) => Draw::from_font_file(path)?,
    None => Draw::default(),
  };
  let output = SaveImageFileOutput::new(&args.output_dir).with_font(draw.font().cloned());
  let output = args.debug.then_some(&output);
  let pipeline = Pipeline::new(detector).with_draw(draw);

  let report = if args.isolated {
    let result = IsolatedScan::new(&args.caption)
      .with_score_threshold(args.threshold)
      .run_task(images, &pipeline, output)?;
    serde_json::to_string_pretty(&result)?
  } else {
    let result = FailFastScan::new(&args.caption)
      .with_score_threshold(args.threshold)
      .run_task(images, &pipeline, output)?;
    serde_json::to_string_pretty(&result)?
  };

  println!("{}", report);
  Ok(())
}

// 该文件是 Xunjing （寻景） 项目的一部分。
// src/bin/simple.rs - 单图推理测试代码
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

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use url::Url;

use xunjing::{
  FromUrl,
  inference::Pipeline,
  input::ImageFileInput,
  model::GlipBuilder,
  output::Draw,
};

/// 单张图像推理
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型地址，例如 glip://tiny/opt/GLIP?device=cpu
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 输入图像，例如 image:///tmp/view.jpg
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 描述文本，多个短语以逗号分隔
  #[arg(long, value_name = "TEXT")]
  pub caption: String,
  /// 置信度阈值
  #[arg(long, default_value = "0.5", value_name = "THRESHOLD")]
  pub threshold: f32,
  /// 标注图像保存路径
  #[arg(long, value_name = "OUTPUT")]
  pub output: Option<PathBuf>,
  /// 标签字体
  #[arg(long, value_name = "FILE")]
  pub font: Option<PathBuf>,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型地址: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("描述文本: {}", args.caption);

  let builder = GlipBuilder::from_url(&args.model)?;
  let image = ImageFileInput::from_url(&args.input)?.into_image_data();
  let detector = builder.build()?;

  let draw = match &args.font {
    Some(path) => Draw::from_font_file(path)?,
    None => Draw::default(),
  };
  let pipeline = Pipeline::new(detector).with_draw(draw);

  info!("开始推理...");
  let now = std::time::Instant::now();
  let (result, annotated) =
    pipeline.inference(&image, &args.caption, args.threshold, args.output.is_some())?;
  info!("推理完成，耗时: {:.2?}", now.elapsed());

  if let (Some(path), Some(annotated)) = (&args.output, annotated) {
    annotated.save(path)?;
    info!("保存标注图像到文件: {}", path.display());
  }

  println!("{}", serde_json::to_string_pretty(&result)?);
  Ok(())
}

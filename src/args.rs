// 该文件是 Xunjing （寻景） 项目的一部分。
// src/args.rs - 项目参数配置
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

use clap::Parser;

/// 在一组周边视角中寻找目标地点
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型尺寸（tiny 或 large）
  #[arg(long, default_value = "tiny", value_name = "SIZE")]
  pub model_size: String,

  /// 推理设备（cpu、cuda 或 cuda:N）
  #[arg(long, default_value = "cpu", value_name = "DEVICE")]
  pub device: String,

  /// GLIP 根目录，包含 configs/ 与 MODEL/
  #[arg(long, value_name = "DIR")]
  pub root: PathBuf,

  /// 目标地点描述
  #[arg(long, value_name = "TEXT")]
  pub caption: String,

  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, default_value = "0.5", value_name = "THRESHOLD")]
  pub threshold: f32,

  /// 为命中的视角保存标注图像
  #[arg(long)]
  pub debug: bool,

  /// 调试图像输出目录
  #[arg(long, default_value = xunjing::output::DEFAULT_OUTPUT_DIR, value_name = "DIR")]
  pub output_dir: PathBuf,

  /// 标签与标题使用的 TrueType 字体
  #[arg(long, value_name = "FILE")]
  pub font: Option<PathBuf>,

  /// 单个视角失败时继续扫描，并逐视角记录错误
  #[arg(long)]
  pub isolated: bool,

  /// 视角图像文件，按顺序扫描
  #[arg(value_name = "IMAGE")]
  pub images: Vec<PathBuf>,
}

// 该文件是 Xunjing （寻景） 项目的一部分。
// src/output.rs - 输出定义
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

use image::RgbImage;
use thiserror::Error;

/// 调试可视化输出，只产生副作用，不影响检测结果
pub trait Render {
  type Error;
  fn render_view(&self, view: usize, image: &RgbImage, caption: &str) -> Result<(), Self::Error>;
}

impl<R: Render + ?Sized> Render for &R {
  type Error = R::Error;

  fn render_view(&self, view: usize, image: &RgbImage, caption: &str) -> Result<(), Self::Error> {
    (**self).render_view(view, image, caption)
  }
}

#[derive(Error, Debug)]
pub enum RenderError {
  #[error("字体加载错误: {0}")]
  FontError(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

pub mod draw;
pub use self::draw::{Draw, class_color, label_text};

mod save_image_file;
pub use self::save_image_file::{DEFAULT_OUTPUT_DIR, SaveImageFileError, SaveImageFileOutput};

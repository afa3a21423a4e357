// 该文件是 Xunjing （寻景） 项目的一部分。
// src/output/save_image_file.rs - 保存调试图像
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

use std::path::{Path, PathBuf};

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_text_mut, text_size};
use thiserror::Error;
use tracing::info;

use crate::output::Render;

pub const DEFAULT_OUTPUT_DIR: &str = "../visual_output";

const TITLE_BAND_HEIGHT: u32 = 40;
const TITLE_FONT_SIZE: f32 = 20.0;
const TITLE_BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const TITLE_COLOR: Rgb<u8> = Rgb([0, 0, 0]);

#[derive(Error, Debug)]
pub enum SaveImageFileError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
}

/// 将命中的视角保存为 `glip_results_view_{i}.png`，顶部附带描述文本
pub struct SaveImageFileOutput {
  dir: PathBuf,
  font: Option<FontArc>,
}

impl Default for SaveImageFileOutput {
  fn default() -> Self {
    Self::new(DEFAULT_OUTPUT_DIR)
  }
}

impl SaveImageFileOutput {
  pub fn new(dir: impl Into<PathBuf>) -> Self {
    Self {
      dir: dir.into(),
      font: None,
    }
  }

  pub fn with_font(mut self, font: Option<FontArc>) -> Self {
    self.font = font;
    self
  }

  pub fn dir(&self) -> &Path {
    &self.dir
  }

  pub fn view_path(&self, view: usize) -> PathBuf {
    self.dir.join(format!("glip_results_view_{}.png", view))
  }

  fn with_title(&self, image: &RgbImage, caption: &str) -> RgbImage {
    let (width, height) = image.dimensions();
    let mut canvas = RgbImage::from_pixel(width, height + TITLE_BAND_HEIGHT, TITLE_BACKGROUND);
    image::imageops::replace(&mut canvas, image, 0, TITLE_BAND_HEIGHT as i64);

    if let Some(font) = &self.font {
      let scale = PxScale::from(TITLE_FONT_SIZE);
      let (text_w, text_h) = text_size(scale, font, caption);
      let x = ((width as i32 - text_w as i32) / 2).max(0);
      let y = ((TITLE_BAND_HEIGHT as i32 - text_h as i32) / 2).max(0);
      draw_text_mut(&mut canvas, TITLE_COLOR, x, y, scale, font, caption);
    }
    canvas
  }
}

impl Render for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn render_view(&self, view: usize, image: &RgbImage, caption: &str) -> Result<(), Self::Error> {
    if !self.dir.as_os_str().is_empty() {
      std::fs::create_dir_all(&self.dir)?;
    }

    let path = self.view_path(view);
    self.with_title(image, caption).save(&path)?;
    info!("保存调试图像到文件: {}", path.display());

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_view_path() {
    let output = SaveImageFileOutput::default();
    assert_eq!(
      output.view_path(3),
      Path::new("../visual_output/glip_results_view_3.png")
    );
  }

  #[test]
  fn test_render_view_writes_png_with_title_band() {
    let dir = tempfile::tempdir().unwrap();
    let output = SaveImageFileOutput::new(dir.path().join("nested"));
    let image = RgbImage::from_pixel(8, 6, Rgb([9, 8, 7]));

    output.render_view(1, &image, "kitchen").unwrap();

    let saved = image::open(output.view_path(1)).unwrap().to_rgb8();
    assert_eq!(saved.dimensions(), (8, 6 + TITLE_BAND_HEIGHT));
    assert_eq!(*saved.get_pixel(0, 0), TITLE_BACKGROUND);
    assert_eq!(*saved.get_pixel(4, TITLE_BAND_HEIGHT + 2), Rgb([9, 8, 7]));
  }
}

// 该文件是 Xunjing （寻景） 项目的一部分。
// src/output/draw.rs - 目标检测结果可视化
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

use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::{
  drawing::{draw_hollow_rect_mut, draw_text_mut},
  rect::Rect,
};
use tracing::warn;

use crate::{
  frame::BgrFrame,
  model::{DetectItem, DetectResult},
  output::RenderError,
};

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 16.0;
const LABEL_TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const COLOR_PALETTE: [u64; 3] = [(1 << 25) - 1, (1 << 15) - 1, (1 << 21) - 1];

/// 类别索引对应的 BGR 颜色，进程内保持不变
pub fn class_color(class_idx: u32) -> [u8; 3] {
  COLOR_PALETTE.map(|p| ((class_idx as u64 * p) % 255) as u8)
}

/// 检测结果的标签文本，分数保留两位小数
pub fn label_text(item: &DetectItem<'_>) -> String {
  format!("{}: {:.2}", item.label, item.score)
}

/// 检测框与标签绘制器
///
/// 没有字体时只绘制检测框。
#[derive(Clone)]
pub struct Draw {
  font: Option<FontArc>,
  font_scale: PxScale,
}

impl Default for Draw {
  fn default() -> Self {
    Self {
      font: None,
      font_scale: PxScale::from(LABEL_FONT_SIZE),
    }
  }
}

impl Draw {
  pub fn with_font(font: FontArc) -> Self {
    Self {
      font: Some(font),
      ..Self::default()
    }
  }

  pub fn from_font_file(path: impl AsRef<Path>) -> Result<Self, RenderError> {
    let data = std::fs::read(path.as_ref())?;
    let font = FontArc::try_from_vec(data).map_err(|e| RenderError::FontError(e.to_string()))?;
    Ok(Self::with_font(font))
  }

  pub fn font(&self) -> Option<&FontArc> {
    self.font.as_ref()
  }

  /// 在帧的副本上绘制结果，输入帧与结果都不会被修改
  pub fn draw_detection(&self, frame: &BgrFrame, result: &DetectResult) -> BgrFrame {
    let mut image = frame.to_rgb_image();
    self.draw_detections_on_image(&mut image, result);
    BgrFrame::from(&image)
  }

  pub fn draw_detections_on_image(&self, image: &mut RgbImage, result: &DetectResult) {
    if self.font.is_none() && !result.is_empty() {
      warn!("未加载字体，检测框不附带标签与分数，可通过 --font 指定字体");
    }
    for item in result.iter() {
      self.draw_bbox_with_label(image, &item);
    }
  }

  fn draw_bbox_with_label(&self, image: &mut RgbImage, item: &DetectItem<'_>) {
    let [b, g, r] = class_color(item.class_idx);
    let color = Rgb([r, g, b]);

    // 坐标向零取整，超出画布的部分收拢到画布外两像素处
    let (w, h) = (image.width() as i64, image.height() as i64);
    let clamp = |v: f32, max: i64| (v as i64).clamp(-2, max + 1);
    let x_min = clamp(item.bbox[0], w);
    let y_min = clamp(item.bbox[1], h);
    let x_max = clamp(item.bbox[2], w);
    let y_max = clamp(item.bbox[3], h);

    let (Ok(x_min), Ok(y_min), Ok(x_max), Ok(y_max)) = (
      i32::try_from(x_min),
      i32::try_from(y_min),
      i32::try_from(x_max),
      i32::try_from(y_max),
    ) else {
      return;
    };

    let width = x_max - x_min + 1;
    let height = y_max - y_min + 1;
    if width > 0 && height > 0 {
      let rect = Rect::at(x_min, y_min).of_size(width as u32, height as u32);
      draw_hollow_rect_mut(image, rect, color);

      // 第二层边框，线宽 2
      if width > 2 && height > 2 {
        let inner = Rect::at(x_min + 1, y_min + 1).of_size(width as u32 - 2, height as u32 - 2);
        draw_hollow_rect_mut(image, inner, color);
      }
    }

    if let Some(font) = &self.font {
      let label = label_text(item);
      // 文本基线贴在框的左上角
      let text_y = (y_min - self.font_scale.y as i32).max(0);
      draw_text_mut(
        image,
        LABEL_TEXT_COLOR,
        x_min,
        text_y,
        self.font_scale,
        font,
        &label,
      );
    }
  }
}

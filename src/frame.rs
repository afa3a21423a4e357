// 该文件是 Xunjing （寻景） 项目的一部分。
// src/frame.rs - BGR 帧定义
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

use image::{ImageBuffer, Rgb, RgbImage};

const BGR_CHANNELS: usize = 3;

/// HWC 排列、BGR 通道顺序的 8 位像素缓冲区，检测器的标准输入格式
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BgrFrame {
  width: u32,
  height: u32,
  data: Box<[u8]>,
}

impl BgrFrame {
  pub fn with_shape(height: usize, width: usize) -> Self {
    let data = vec![0u8; BGR_CHANNELS * height * width].into_boxed_slice();
    Self {
      width: width as u32,
      height: height as u32,
      data,
    }
  }

  pub fn height(&self) -> usize {
    self.height as usize
  }

  pub fn width(&self) -> usize {
    self.width as usize
  }

  pub fn channels(&self) -> usize {
    BGR_CHANNELS
  }

  pub fn as_bgr(&self) -> &[u8] {
    &self.data
  }

  /// 读取 (x, y) 处的 [b, g, r] 像素
  pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
    let idx = ((y as usize) * self.width() + x as usize) * BGR_CHANNELS;
    [self.data[idx], self.data[idx + 1], self.data[idx + 2]]
  }

  /// 交换回 RGB 通道顺序
  pub fn to_rgb_image(&self) -> RgbImage {
    let width = self.width;
    let data = &self.data;

    ImageBuffer::from_fn(self.width, self.height, |x, y| {
      let idx = ((y * width + x) as usize) * BGR_CHANNELS;
      Rgb([data[idx + 2], data[idx + 1], data[idx]])
    })
  }
}

impl AsMut<[u8]> for BgrFrame {
  fn as_mut(&mut self) -> &mut [u8] {
    &mut self.data
  }
}

impl From<&RgbImage> for BgrFrame {
  fn from(image: &RgbImage) -> Self {
    let mut frame = {
      let (width, height) = image.dimensions();
      BgrFrame::with_shape(height as usize, width as usize)
    };

    // 反转通道轴：RGB -> BGR
    let slice = frame.as_mut();
    for (dst, pixel) in slice.chunks_exact_mut(BGR_CHANNELS).zip(image.pixels()) {
      dst[0] = pixel[2];
      dst[1] = pixel[1];
      dst[2] = pixel[0];
    }
    frame
  }
}

impl From<RgbImage> for BgrFrame {
  fn from(image: RgbImage) -> Self {
    BgrFrame::from(&image)
  }
}

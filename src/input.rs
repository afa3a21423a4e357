// 该文件是 Xunjing （寻景） 项目的一部分。
// src/input.rs - 图像输入与解码
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

use base64::{Engine as _, engine::general_purpose::STANDARD};
use image::DynamicImage;
use thiserror::Error;
use tracing::debug;

use crate::frame::BgrFrame;

mod read_image_file;
pub use self::read_image_file::{ImageFileInput, ImageFileInputError};

const DATA_URI_PREFIX: &str = "data:image";

#[derive(Error, Debug)]
pub enum DecodeError {
  #[error("base64 编码无效: {0}")]
  InvalidBase64(#[from] base64::DecodeError),
  #[error("data URI 缺少逗号分隔的负载")]
  MalformedDataUri,
  #[error("图像数据为空")]
  EmptyData,
  #[error("图像解码错误: {0}")]
  ImageDecode(#[from] image::ImageError),
  #[error("不支持的通道数: {0}")]
  UnsupportedChannels(u8),
}

/// 待解码的图像数据
#[derive(Debug, Clone)]
pub enum ImageData {
  /// base64 字符串，可带 `data:image/...;base64,` 前缀
  Base64(String),
  /// 压缩后的图像字节（PNG、JPEG 等）
  Encoded(Vec<u8>),
  /// 已解码的位图
  Bitmap(DynamicImage),
}

impl From<&str> for ImageData {
  fn from(value: &str) -> Self {
    ImageData::Base64(value.to_string())
  }
}

impl From<String> for ImageData {
  fn from(value: String) -> Self {
    ImageData::Base64(value)
  }
}

impl From<Vec<u8>> for ImageData {
  fn from(value: Vec<u8>) -> Self {
    ImageData::Encoded(value)
  }
}

impl From<DynamicImage> for ImageData {
  fn from(value: DynamicImage) -> Self {
    ImageData::Bitmap(value)
  }
}

/// 去掉 data URI 前缀（截至第一个逗号，含逗号）
pub fn strip_data_uri(payload: &str) -> Result<&str, DecodeError> {
  if !payload.starts_with(DATA_URI_PREFIX) {
    return Ok(payload);
  }
  payload
    .split_once(',')
    .map(|(_, body)| body)
    .ok_or(DecodeError::MalformedDataUri)
}

/// 将图像数据解码为 BGR 帧
pub fn decode(input: &ImageData) -> Result<BgrFrame, DecodeError> {
  match input {
    ImageData::Base64(payload) => {
      let payload = strip_data_uri(payload)?;
      let bytes = STANDARD.decode(payload)?;
      decode_bytes(&bytes)
    }
    ImageData::Encoded(bytes) => decode_bytes(bytes),
    ImageData::Bitmap(image) => bitmap_to_frame(image),
  }
}

fn decode_bytes(bytes: &[u8]) -> Result<BgrFrame, DecodeError> {
  if bytes.is_empty() {
    return Err(DecodeError::EmptyData);
  }
  let image = image::load_from_memory(bytes)?;
  debug!(
    "图像解码完成: {}x{}, {:?}",
    image.width(),
    image.height(),
    image.color()
  );
  bitmap_to_frame(&image)
}

fn bitmap_to_frame(image: &DynamicImage) -> Result<BgrFrame, DecodeError> {
  // 灰度与带透明通道的图像统一转换为 RGB，再交换为 BGR
  match image {
    DynamicImage::ImageLuma8(_)
    | DynamicImage::ImageLumaA8(_)
    | DynamicImage::ImageRgb8(_)
    | DynamicImage::ImageRgba8(_)
    | DynamicImage::ImageLuma16(_)
    | DynamicImage::ImageLumaA16(_)
    | DynamicImage::ImageRgb16(_)
    | DynamicImage::ImageRgba16(_)
    | DynamicImage::ImageRgb32F(_)
    | DynamicImage::ImageRgba32F(_) => Ok(BgrFrame::from(image.to_rgb8())),
    other => Err(DecodeError::UnsupportedChannels(other.color().channel_count())),
  }
}

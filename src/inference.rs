// 该文件是 Xunjing （寻景） 项目的一部分。
// src/inference.rs - 单图推理入口
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
use tracing::{debug, error};

use crate::{
  caption::Caption,
  input::{DecodeError, ImageData, decode},
  model::{DetectResult, Detector, DetectorError, project},
  output::Draw,
};

#[derive(Error, Debug)]
pub enum InferenceError {
  #[error("图像解码失败: {0}")]
  Decode(#[from] DecodeError),
  #[error("检测失败: {0}")]
  Detector(#[from] DetectorError),
}

/// 解码 → 检测 → 后处理的单图流水线
///
/// 检测器句柄由调用方构造一次后交给流水线，流水线本身不保存任何跨调用状态。
pub struct Pipeline<D> {
  detector: D,
  draw: Draw,
}

impl<D: Detector> Pipeline<D> {
  pub fn new(detector: D) -> Self {
    Self {
      detector,
      draw: Draw::default(),
    }
  }

  pub fn with_draw(mut self, draw: Draw) -> Self {
    self.draw = draw;
    self
  }

  pub fn detector(&self) -> &D {
    &self.detector
  }

  pub fn draw(&self) -> &Draw {
    &self.draw
  }

  /// 对单张图像执行推理
  ///
  /// `need_draw` 为真时额外返回标注后的 RGB 图像。
  /// 失败时记录描述与阈值后原样返回错误，不产生部分结果。
  pub fn inference(
    &self,
    image_data: &ImageData,
    caption: &str,
    score_threshold: f32,
    need_draw: bool,
  ) -> Result<(DetectResult, Option<RgbImage>), InferenceError> {
    self
      .run(image_data, caption, score_threshold, need_draw)
      .inspect_err(|e| {
        error!(
          "推理失败 (caption: {:?}, threshold: {}): {}",
          caption, score_threshold, e
        )
      })
  }

  fn run(
    &self,
    image_data: &ImageData,
    caption: &str,
    score_threshold: f32,
    need_draw: bool,
  ) -> Result<(DetectResult, Option<RgbImage>), InferenceError> {
    let frame = decode(image_data)?;
    let caption = Caption::parse(caption);

    let raw = self.detector.detect(&frame, &caption)?;
    let result = project(&raw, &caption, score_threshold);
    debug!("推理完成: {} 个检测结果", result.len());

    let annotated = need_draw.then(|| self.draw.draw_detection(&frame, &result).to_rgb_image());
    Ok((result, annotated))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{frame::BgrFrame, model::RawDetection};
  use base64::{Engine as _, engine::general_purpose::STANDARD};
  use image::{DynamicImage, ImageFormat, Rgb};
  use std::{cell::Cell, io::Cursor};

  struct FixedDetector {
    detections: Vec<RawDetection>,
    calls: Cell<usize>,
  }

  impl Detector for FixedDetector {
    fn detect(&self, _: &BgrFrame, _: &Caption) -> Result<Vec<RawDetection>, DetectorError> {
      self.calls.set(self.calls.get() + 1);
      Ok(self.detections.clone())
    }
  }

  struct FailingDetector;

  impl Detector for FailingDetector {
    fn detect(&self, _: &BgrFrame, _: &Caption) -> Result<Vec<RawDetection>, DetectorError> {
      Err(DetectorError::Backend("设备不可用".to_string()))
    }
  }

  fn encoded_image() -> ImageData {
    let image = RgbImage::from_pixel(16, 16, Rgb([50, 60, 70]));
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(image)
      .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
      .unwrap();
    ImageData::from(STANDARD.encode(bytes))
  }

  fn fixed() -> FixedDetector {
    FixedDetector {
      detections: vec![
        RawDetection {
          bbox: [1.0, 1.0, 8.0, 8.0],
          class_index: 1,
          score: 0.8,
        },
        RawDetection {
          bbox: [2.0, 2.0, 4.0, 4.0],
          class_index: 5,
          score: 0.3,
        },
      ],
      calls: Cell::new(0),
    }
  }

  #[test]
  fn test_inference_without_draw() {
    let pipeline = Pipeline::new(fixed());
    let (result, annotated) = pipeline
      .inference(&encoded_image(), "kitchen", 0.5, false)
      .unwrap();

    assert_eq!(result.labels(), &["kitchen"]);
    assert_eq!(result.boxes(), &[[1.0, 1.0, 8.0, 8.0]]);
    assert!(annotated.is_none());
    assert_eq!(pipeline.detector().calls.get(), 1);
  }

  #[test]
  fn test_inference_with_draw_returns_rgb() {
    let pipeline = Pipeline::new(fixed());
    let (result, annotated) = pipeline
      .inference(&encoded_image(), "kitchen", 0.0, true)
      .unwrap();

    assert_eq!(result.labels(), &["kitchen", "object"]);
    let annotated = annotated.unwrap();
    assert_eq!(annotated.dimensions(), (16, 16));
    let [b, g, r] = crate::output::class_color(1);
    assert_eq!(*annotated.get_pixel(1, 1), Rgb([r, g, b]));
    assert_eq!(*annotated.get_pixel(15, 15), Rgb([50, 60, 70]));
  }

  #[test]
  fn test_malformed_payload_is_decode_error() {
    let pipeline = Pipeline::new(fixed());
    let err = pipeline
      .inference(&ImageData::from("%%%not-base64%%%"), "kitchen", 0.5, false)
      .unwrap_err();
    assert!(matches!(err, InferenceError::Decode(DecodeError::InvalidBase64(_))));
    assert_eq!(pipeline.detector().calls.get(), 0);
  }

  #[test]
  fn test_detector_failure_propagates() {
    let pipeline = Pipeline::new(FailingDetector);
    let err = pipeline
      .inference(&encoded_image(), "kitchen", 0.5, false)
      .unwrap_err();
    assert!(matches!(err, InferenceError::Detector(DetectorError::Backend(_))));
  }
}

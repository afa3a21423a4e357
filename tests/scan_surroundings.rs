// 该文件是 Xunjing （寻景） 项目的一部分。
// tests/scan_surroundings.rs - 扫描流程集成测试
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

use std::io::Cursor;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

use xunjing::{
  caption::Caption,
  frame::BgrFrame,
  inference::{InferenceError, Pipeline},
  input::{DecodeError, ImageData},
  model::{Detector, DetectorError, RawDetection},
  output::SaveImageFileOutput,
  task::{FailFastScan, ScanError, Task},
};

/// 图像中心像素为纯绿色时报告第一个短语
struct GreenPlaceDetector;

impl Detector for GreenPlaceDetector {
  fn detect(
    &self,
    frame: &BgrFrame,
    caption: &Caption,
  ) -> Result<Vec<RawDetection>, DetectorError> {
    let (cx, cy) = (frame.width() as u32 / 2, frame.height() as u32 / 2);
    let mut detections = vec![RawDetection {
      bbox: [0.0, 0.0, 2.0, 2.0],
      class_index: caption.phrases().len() as u32 + 1,
      score: 0.95,
    }];
    if frame.pixel(cx, cy) == [0, 255, 0] {
      detections.push(RawDetection {
        bbox: [1.0, 1.0, 6.0, 6.0],
        class_index: 1,
        score: 0.6,
      });
    }
    Ok(detections)
  }
}

fn base64_view(color: [u8; 3], data_uri: bool) -> ImageData {
  let image = RgbImage::from_pixel(8, 8, Rgb(color));
  let mut bytes = Vec::new();
  DynamicImage::ImageRgb8(image)
    .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
    .unwrap();
  let payload = STANDARD.encode(bytes);
  if data_uri {
    ImageData::from(format!("data:image/png;base64,{}", payload))
  } else {
    ImageData::from(payload)
  }
}

#[test]
fn test_target_found_only_in_second_view() {
  let pipeline = Pipeline::new(GreenPlaceDetector);
  let views = vec![
    base64_view([255, 0, 0], false),
    base64_view([0, 255, 0], true),
    base64_view([0, 0, 255], false),
  ];

  let result = FailFastScan::new("bookshelf")
    .run_task(views, &pipeline, None::<&SaveImageFileOutput>)
    .unwrap();

  assert_eq!(result.detected_mask, vec![false, true, false]);
  assert!(result.aggregate());
}

#[test]
fn test_threshold_hides_weak_match() {
  let pipeline = Pipeline::new(GreenPlaceDetector);
  let result = FailFastScan::new("bookshelf")
    .with_score_threshold(0.7)
    .run_task(
      vec![base64_view([0, 255, 0], false)],
      &pipeline,
      None::<&SaveImageFileOutput>,
    )
    .unwrap();

  assert_eq!(result.detected_mask, vec![false]);
  assert!(!result.aggregate());
}

#[test]
fn test_no_views() {
  let pipeline = Pipeline::new(GreenPlaceDetector);
  let result = FailFastScan::new("bookshelf")
    .run_task(Vec::new(), &pipeline, None::<&SaveImageFileOutput>)
    .unwrap();

  assert!(result.detected_mask.is_empty());
  assert!(!result.aggregate());
  assert_eq!(
    serde_json::to_value(&result).unwrap(),
    serde_json::json!({ "detected_mask": [], "aggregate": false })
  );
}

#[test]
fn test_debug_images_saved_for_matches() {
  let dir = tempfile::tempdir().unwrap();
  let output = SaveImageFileOutput::new(dir.path());
  let pipeline = Pipeline::new(GreenPlaceDetector);

  let result = FailFastScan::new("bookshelf")
    .run_task(
      vec![
        base64_view([0, 255, 0], false),
        base64_view([9, 9, 9], false),
      ],
      &pipeline,
      Some(&output),
    )
    .unwrap();

  assert_eq!(result.detected_mask, vec![true, false]);
  assert!(output.view_path(0).exists());
  assert!(!output.view_path(1).exists());
}

#[test]
fn test_malformed_view_aborts_scan() {
  let pipeline = Pipeline::new(GreenPlaceDetector);
  let err = FailFastScan::new("bookshelf")
    .run_task(
      vec![
        base64_view([0, 255, 0], false),
        ImageData::from("data:image/png;base64,@@@@"),
        base64_view([0, 255, 0], false),
      ],
      &pipeline,
      None::<&SaveImageFileOutput>,
    )
    .unwrap_err();

  assert!(matches!(
    err,
    ScanError::Inference {
      index: 1,
      source: InferenceError::Decode(DecodeError::InvalidBase64(_))
    }
  ));
}

#[test]
fn test_inference_rejects_malformed_base64() {
  let pipeline = Pipeline::new(GreenPlaceDetector);
  let err = pipeline
    .inference(&ImageData::from("****"), "bookshelf", 0.5, true)
    .unwrap_err();
  assert!(matches!(err, InferenceError::Decode(_)));

  // 失败后流水线仍可继续使用
  let (result, annotated) = pipeline
    .inference(&base64_view([0, 255, 0], false), "bookshelf", 0.5, true)
    .unwrap();
  assert_eq!(result.labels(), &["object", "bookshelf"]);
  assert!(annotated.is_some());
}

#[cfg(feature = "model_glip")]
#[test]
fn test_unsupported_model_size_before_loading() {
  use xunjing::model::{GlipBuilder, GlipError};

  let err = GlipBuilder::new("medium", "cpu", "/nonexistent/glip/root").unwrap_err();
  assert!(matches!(err, GlipError::UnsupportedModelSize(ref s) if s == "medium"));
}

// 该文件是 Xunjing （寻景） 项目的一部分。
// src/model.rs - 检测器接口与检测结果
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

use serde::Serialize;
use thiserror::Error;

use crate::{caption::Caption, frame::BgrFrame};

#[derive(Error, Debug)]
pub enum DetectorError {
  #[cfg(feature = "model_glip")]
  #[error("ONNX Runtime 错误: {0}")]
  Runtime(#[from] ort::Error),
  #[error("分词错误: {0}")]
  Tokenizer(String),
  #[error("模型输出无效: {0}")]
  InvalidOutput(String),
  #[error("检测器后端错误: {0}")]
  Backend(String),
}

/// 开放词表检测器
///
/// 返回的候选框未经阈值过滤，但已在检测器内部完成 top-k / NMS，
/// 并按置信度降序排列。同一 (帧, 描述, 权重) 输入的结果是确定的。
pub trait Detector {
  fn detect(&self, frame: &BgrFrame, caption: &Caption) -> Result<Vec<RawDetection>, DetectorError>;
}

impl<D: Detector + ?Sized> Detector for &D {
  fn detect(
    &self,
    frame: &BgrFrame,
    caption: &Caption,
  ) -> Result<Vec<RawDetection>, DetectorError> {
    (**self).detect(frame, caption)
  }
}

impl<D: Detector + ?Sized> Detector for Box<D> {
  fn detect(
    &self,
    frame: &BgrFrame,
    caption: &Caption,
  ) -> Result<Vec<RawDetection>, DetectorError> {
    (**self).detect(frame, caption)
  }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawDetection {
  pub bbox: [f32; 4], // [x1, y1, x2, y2]，像素坐标
  pub class_index: u32,
  pub score: f32,
}

/// 归一化后的检测结果，四个序列等长且下标一一对应
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DetectResult {
  boxes: Vec<[f32; 4]>,
  labels: Vec<String>,
  scores: Vec<f32>,
  class_idx: Vec<u32>,
}

/// [`DetectResult`] 中单个检测的视图
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectItem<'a> {
  pub bbox: &'a [f32; 4],
  pub label: &'a str,
  pub score: f32,
  pub class_idx: u32,
}

impl DetectResult {
  fn push(&mut self, detection: &RawDetection, label: &str) {
    self.boxes.push(detection.bbox);
    self.labels.push(label.to_string());
    self.scores.push(detection.score);
    self.class_idx.push(detection.class_index);
  }

  pub fn boxes(&self) -> &[[f32; 4]] {
    &self.boxes
  }

  pub fn labels(&self) -> &[String] {
    &self.labels
  }

  pub fn scores(&self) -> &[f32] {
    &self.scores
  }

  pub fn class_idx(&self) -> &[u32] {
    &self.class_idx
  }

  pub fn len(&self) -> usize {
    self.boxes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.boxes.is_empty()
  }

  pub fn contains_label(&self, label: &str) -> bool {
    self.labels.iter().any(|l| l == label)
  }

  pub fn iter(&self) -> impl Iterator<Item = DetectItem<'_>> {
    self
      .boxes
      .iter()
      .zip(&self.labels)
      .zip(&self.scores)
      .zip(&self.class_idx)
      .map(|(((bbox, label), score), class_idx)| DetectItem {
        bbox,
        label,
        score: *score,
        class_idx: *class_idx,
      })
  }
}

mod project;
pub use self::project::project;

#[cfg(feature = "model_glip")]
pub mod glip;
#[cfg(feature = "model_glip")]
pub use self::glip::{
  Device, GlipBuilder, GlipConfig, GlipDetector, GlipError, ModelFiles, ModelSize,
};

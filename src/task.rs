// 该文件是 Xunjing （寻景） 项目的一部分。
// src/task.rs - 周边视角扫描任务
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

use serde::{Serialize, Serializer, ser::SerializeStruct};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::{
  inference::{InferenceError, Pipeline},
  input::ImageData,
  model::Detector,
  output::Render,
};

pub const DEFAULT_SCORE_THRESHOLD: f32 = 0.5;

pub trait Task<I, D: Detector, O: Render>: Sized {
  type Output;
  type Error;
  fn run_task(
    self,
    images: I,
    pipeline: &Pipeline<D>,
    output: Option<&O>,
  ) -> Result<Self::Output, Self::Error>;
}

#[derive(Error, Debug)]
pub enum ScanError<E: std::error::Error + 'static> {
  #[error("视角 {index} 推理失败: {source}")]
  Inference {
    index: usize,
    #[source]
    source: InferenceError,
  },
  #[error("视角 {index} 调试图像输出失败: {source}")]
  Render {
    index: usize,
    #[source]
    source: E,
  },
}

/// 一次扫描的结果，`detected_mask` 与输入视角一一对应
///
/// 序列化时附带由 `detected_mask` 推导出的 `aggregate`。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanResult {
  pub detected_mask: Vec<bool>,
}

impl ScanResult {
  /// 任一视角命中即为真
  pub fn aggregate(&self) -> bool {
    self.detected_mask.iter().any(|&found| found)
  }
}

/// 逐视角记录错误的扫描结果，失败视角在 `detected_mask` 中为假
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IsolatedScanResult {
  pub detected_mask: Vec<bool>,
  pub errors: Vec<Option<String>>,
}

impl IsolatedScanResult {
  pub fn aggregate(&self) -> bool {
    self.detected_mask.iter().any(|&found| found)
  }

  pub fn failed(&self) -> usize {
    self.errors.iter().filter(|e| e.is_some()).count()
  }
}

impl Serialize for ScanResult {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let mut state = serializer.serialize_struct("ScanResult", 2)?;
    state.serialize_field("detected_mask", &self.detected_mask)?;
    state.serialize_field("aggregate", &self.aggregate())?;
    state.end()
  }
}

impl Serialize for IsolatedScanResult {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let mut state = serializer.serialize_struct("IsolatedScanResult", 3)?;
    state.serialize_field("detected_mask", &self.detected_mask)?;
    state.serialize_field("errors", &self.errors)?;
    state.serialize_field("aggregate", &self.aggregate())?;
    state.end()
  }
}

/// 逐个视角寻找目标
///
/// 任一视角解码或检测失败时立即中止，剩余视角不再处理。
#[derive(Debug, Clone)]
pub struct FailFastScan {
  target: String,
  score_threshold: f32,
}

impl FailFastScan {
  pub fn new(target: impl Into<String>) -> Self {
    Self {
      target: target.into(),
      score_threshold: DEFAULT_SCORE_THRESHOLD,
    }
  }

  pub fn with_score_threshold(mut self, score_threshold: f32) -> Self {
    self.score_threshold = score_threshold;
    self
  }
}

impl<I, D, O> Task<I, D, O> for FailFastScan
where
  I: IntoIterator<Item = ImageData>,
  D: Detector,
  O: Render,
  O::Error: std::error::Error + 'static,
{
  type Output = ScanResult;
  type Error = ScanError<O::Error>;

  fn run_task(
    self,
    images: I,
    pipeline: &Pipeline<D>,
    output: Option<&O>,
  ) -> Result<Self::Output, Self::Error> {
    info!("开始扫描周边视角，目标: {:?}", self.target);
    let mut result = ScanResult::default();

    for (index, image) in images.into_iter().enumerate() {
      let found = scan_view(
        index,
        &image,
        &self.target,
        self.score_threshold,
        pipeline,
        output,
      )
      .inspect_err(|e| error!("扫描中止于视角 {}: {}", index, e))?;
      result.detected_mask.push(found);
    }

    report_verdict(result.aggregate());
    Ok(result)
  }
}

/// 逐视角隔离错误的扫描模式
///
/// 与 [`FailFastScan`] 的可观察行为不同：单个视角失败不会中止扫描。
#[derive(Debug, Clone)]
pub struct IsolatedScan {
  target: String,
  score_threshold: f32,
}

impl IsolatedScan {
  pub fn new(target: impl Into<String>) -> Self {
    Self {
      target: target.into(),
      score_threshold: DEFAULT_SCORE_THRESHOLD,
    }
  }

  pub fn with_score_threshold(mut self, score_threshold: f32) -> Self {
    self.score_threshold = score_threshold;
    self
  }
}

impl<I, D, O> Task<I, D, O> for IsolatedScan
where
  I: IntoIterator<Item = ImageData>,
  D: Detector,
  O: Render,
  O::Error: std::error::Error + 'static,
{
  type Output = IsolatedScanResult;
  type Error = std::convert::Infallible;

  fn run_task(
    self,
    images: I,
    pipeline: &Pipeline<D>,
    output: Option<&O>,
  ) -> Result<Self::Output, Self::Error> {
    info!("开始扫描周边视角（隔离模式），目标: {:?}", self.target);
    let mut result = IsolatedScanResult::default();

    for (index, image) in images.into_iter().enumerate() {
      match scan_view(
        index,
        &image,
        &self.target,
        self.score_threshold,
        pipeline,
        output,
      ) {
        Ok(found) => {
          result.detected_mask.push(found);
          result.errors.push(None);
        }
        Err(e) => {
          warn!("视角 {} 处理失败，继续扫描: {}", index, e);
          result.detected_mask.push(false);
          result.errors.push(Some(e.to_string()));
        }
      }
    }

    if result.failed() > 0 {
      warn!("共 {} 个视角处理失败", result.failed());
    }
    report_verdict(result.aggregate());
    Ok(result)
  }
}

fn scan_view<D, O>(
  index: usize,
  image: &ImageData,
  target: &str,
  score_threshold: f32,
  pipeline: &Pipeline<D>,
  output: Option<&O>,
) -> Result<bool, ScanError<O::Error>>
where
  D: Detector,
  O: Render,
  O::Error: std::error::Error + 'static,
{
  let (result, annotated) = pipeline
    .inference(image, target, score_threshold, output.is_some())
    .map_err(|source| ScanError::Inference { index, source })?;

  if !result.contains_label(target) {
    return Ok(false);
  }

  info!("在视角 {} 中找到目标地点", index);
  if let (Some(output), Some(annotated)) = (output, annotated) {
    output
      .render_view(index, &annotated, target)
      .map_err(|source| ScanError::Render { index, source })?;
  }
  Ok(true)
}

fn report_verdict(found: bool) {
  if found {
    info!("在当前位置找到了合适的候选视角");
  } else {
    info!("在当前位置没有找到合适的候选视角");
  }
}

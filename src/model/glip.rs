// 该文件是 Xunjing （寻景） 项目的一部分。
// src/model/glip.rs - GLIP 检测器（ONNX Runtime 后端）
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

//! GLIP 的 ONNX 导出模型约定：
//!
//! - 输入 `images` `[1, 3, H, W]` f32（BGR，按配置做均值/方差归一化）
//! - 输入 `input_ids` / `attention_mask` / `token_type_ids` `[1, L]` i64
//! - 输入 `positive_map` `[P, L]` f32，每行对应一个短语
//! - 输出 `boxes` `[N, 4]`（缩放后图像坐标）、`scores` `[N]`、`labels` `[N]` i64
//!
//! 模型内部已完成 NMS 与 top-k，`labels` 从 1 开始对应短语行。

use std::{
  ops::Range,
  path::{Path, PathBuf},
  str::FromStr,
  sync::Mutex,
};

use image::imageops::FilterType;
use ndarray::{Array2, Array4};
use ort::{
  execution_providers::{CPUExecutionProvider, ExecutionProviderDispatch},
  session::{Session, builder::GraphOptimizationLevel},
  value::Value,
};
use serde::Deserialize;
use thiserror::Error;
use tokenizers::Tokenizer;
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  caption::Caption,
  frame::BgrFrame,
  model::{Detector, DetectorError, RawDetection},
};

const GLIP_SCHEME: &str = "glip";
const POSITIVE_MAP_EPS: f32 = 1e-6;

#[derive(Error, Debug)]
pub enum GlipError {
  #[error("不支持的模型尺寸: {0}")]
  UnsupportedModelSize(String),
  #[error("不支持的设备: {0}")]
  UnsupportedDevice(String),
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
  #[error("模型文件不存在: {0}")]
  ModelFileMissing(PathBuf),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("配置文件错误: {0}")]
  ConfigError(#[from] toml::de::Error),
  #[error("分词器加载错误: {0}")]
  TokenizerError(String),
  #[error("ONNX Runtime 错误: {0}")]
  RuntimeError(#[from] ort::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelSize {
  Tiny,
  Large,
}

impl FromStr for ModelSize {
  type Err = GlipError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "tiny" => Ok(ModelSize::Tiny),
      "large" => Ok(ModelSize::Large),
      other => Err(GlipError::UnsupportedModelSize(other.to_string())),
    }
  }
}

impl ModelSize {
  /// 按模型尺寸选择配置文件与权重文件
  pub fn files(&self, root: &Path) -> ModelFiles {
    let (config, weights) = match self {
      ModelSize::Tiny => (
        "configs/pretrain/glip_Swin_T_O365_GoldG.toml",
        "MODEL/glip_tiny_model_o365_goldg_cc_sbu.onnx",
      ),
      ModelSize::Large => (
        "configs/pretrain/glip_Swin_L.toml",
        "MODEL/glip_large_model.onnx",
      ),
    };
    ModelFiles {
      config: root.join(config),
      weights: root.join(weights),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelFiles {
  pub config: PathBuf,
  pub weights: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
  Cpu,
  Cuda(i32),
}

impl FromStr for Device {
  type Err = GlipError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let unsupported = || GlipError::UnsupportedDevice(s.to_string());
    match s {
      "cpu" => Ok(Device::Cpu),
      "cuda" => Ok(Device::Cuda(0)),
      _ => {
        let id = s.strip_prefix("cuda:").ok_or_else(unsupported)?;
        let id = id.parse::<i32>().map_err(|_| unsupported())?;
        if id < 0 {
          return Err(unsupported());
        }
        Ok(Device::Cuda(id))
      }
    }
  }
}

fn default_min_image_size() -> u32 {
  800
}

fn default_max_image_size() -> u32 {
  1333
}

fn default_pixel_mean() -> [f32; 3] {
  [103.53, 116.28, 123.675]
}

fn default_pixel_std() -> [f32; 3] {
  [57.375, 57.12, 58.395]
}

fn default_tokenizer() -> PathBuf {
  PathBuf::from("MODEL/bert-base-uncased/tokenizer.json")
}

fn default_max_query_len() -> usize {
  256
}

fn default_intra_threads() -> usize {
  4
}

/// 单个模型尺寸的预处理与运行配置
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GlipConfig {
  /// 缩放后短边长度
  #[serde(default = "default_min_image_size")]
  pub min_image_size: u32,
  /// 缩放后长边上限
  #[serde(default = "default_max_image_size")]
  pub max_image_size: u32,
  /// BGR 顺序
  #[serde(default = "default_pixel_mean")]
  pub pixel_mean: [f32; 3],
  #[serde(default = "default_pixel_std")]
  pub pixel_std: [f32; 3],
  /// 相对模型根目录
  #[serde(default = "default_tokenizer")]
  pub tokenizer: PathBuf,
  #[serde(default = "default_max_query_len")]
  pub max_query_len: usize,
  #[serde(default = "default_intra_threads")]
  pub intra_threads: usize,
}

impl Default for GlipConfig {
  fn default() -> Self {
    Self {
      min_image_size: default_min_image_size(),
      max_image_size: default_max_image_size(),
      pixel_mean: default_pixel_mean(),
      pixel_std: default_pixel_std(),
      tokenizer: default_tokenizer(),
      max_query_len: default_max_query_len(),
      intra_threads: default_intra_threads(),
    }
  }
}

impl GlipConfig {
  pub fn load(path: &Path) -> Result<Self, GlipError> {
    let text = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&text)?)
  }
}

/// GLIP 初始化入口
///
/// 模型尺寸与设备在构造时校验，不触碰文件系统；
/// 文件读取与会话创建都延后到 [`GlipBuilder::build`]。
#[derive(Debug, Clone)]
pub struct GlipBuilder {
  size: ModelSize,
  device: Device,
  root: PathBuf,
}

impl FromUrlWithScheme for GlipBuilder {
  const SCHEME: &'static str = GLIP_SCHEME;
}

impl FromUrl for GlipBuilder {
  type Error = GlipError;

  /// `glip://tiny/opt/GLIP?device=cuda:0`
  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(GlipError::ModelPathError(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    let size = url
      .host_str()
      .ok_or_else(|| GlipError::ModelPathError("缺少模型尺寸".to_string()))?;
    let device = url
      .query_pairs()
      .find(|(key, _)| key == "device")
      .map(|(_, value)| value.into_owned())
      .unwrap_or_else(|| "cpu".to_string());

    Self::new(size, &device, url.path())
  }
}

impl GlipBuilder {
  pub fn new(model_size: &str, device: &str, root: impl Into<PathBuf>) -> Result<Self, GlipError> {
    let size = model_size.parse::<ModelSize>()?;
    let device = device.parse::<Device>()?;

    #[cfg(not(feature = "cuda"))]
    if let Device::Cuda(_) = device {
      return Err(GlipError::UnsupportedDevice(format!(
        "{:?}（未启用 cuda 特性）",
        device
      )));
    }

    Ok(GlipBuilder {
      size,
      device,
      root: root.into(),
    })
  }

  pub fn size(&self) -> ModelSize {
    self.size
  }

  pub fn device(&self) -> Device {
    self.device
  }

  pub fn files(&self) -> ModelFiles {
    self.size.files(&self.root)
  }

  pub fn build(self) -> Result<GlipDetector, GlipError> {
    let files = self.files();
    for path in [&files.config, &files.weights] {
      if !path.exists() {
        error!("模型文件不存在: {}", path.display());
        return Err(GlipError::ModelFileMissing(path.clone()));
      }
    }

    info!("加载配置文件: {}", files.config.display());
    let config = GlipConfig::load(&files.config)?;
    debug!("模型配置: {:?}", config);

    let tokenizer_path = self.root.join(&config.tokenizer);
    info!("加载分词器: {}", tokenizer_path.display());
    let tokenizer =
      Tokenizer::from_file(&tokenizer_path).map_err(|e| GlipError::TokenizerError(e.to_string()))?;

    info!("创建 ONNX 推理会话: {}", files.weights.display());
    let session = Session::builder()?
      .with_execution_providers([self.execution_provider()?])?
      .with_optimization_level(GraphOptimizationLevel::Level3)?
      .with_intra_threads(config.intra_threads)?
      .commit_from_file(&files.weights)?;
    info!("模型加载完成");

    Ok(GlipDetector {
      session: Mutex::new(session),
      tokenizer,
      config,
    })
  }

  fn execution_provider(&self) -> Result<ExecutionProviderDispatch, GlipError> {
    match self.device {
      Device::Cpu => Ok(CPUExecutionProvider::default().build()),
      #[cfg(feature = "cuda")]
      Device::Cuda(id) => Ok(
        ort::execution_providers::CUDAExecutionProvider::default()
          .with_device_id(id)
          .build(),
      ),
      #[cfg(not(feature = "cuda"))]
      Device::Cuda(_) => Err(GlipError::UnsupportedDevice(format!("{:?}", self.device))),
    }
  }
}

/// GLIP 检测器句柄，进程内只构造一次并显式传递
///
/// ONNX 会话运行需要独占访问，检测调用在互斥锁内串行执行。
pub struct GlipDetector {
  session: Mutex<Session>,
  tokenizer: Tokenizer,
  config: GlipConfig,
}

impl std::fmt::Debug for GlipDetector {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("GlipDetector")
      .field("config", &self.config)
      .finish_non_exhaustive()
  }
}

impl GlipDetector {
  pub fn config(&self) -> &GlipConfig {
    &self.config
  }

  /// 缩放并归一化，返回张量与 (原图/缩放图) 比例
  fn preprocess(&self, frame: &BgrFrame) -> Result<(Array4<f32>, [f32; 2]), DetectorError> {
    let (width, height) = (frame.width() as u32, frame.height() as u32);
    if width == 0 || height == 0 {
      return Err(DetectorError::Backend("输入图像为空".to_string()));
    }

    let (ow, oh) = resized_shape(
      width,
      height,
      self.config.min_image_size,
      self.config.max_image_size,
    );
    debug!("图像缩放: {}x{} -> {}x{}", width, height, ow, oh);

    let resized = image::imageops::resize(&frame.to_rgb_image(), ow, oh, FilterType::Triangle);
    let mean = self.config.pixel_mean;
    let std = self.config.pixel_std;

    let mut input = Array4::<f32>::zeros((1, 3, oh as usize, ow as usize));
    for (x, y, pixel) in resized.enumerate_pixels() {
      // 写回 BGR 平面
      for (c, value) in [pixel[2], pixel[1], pixel[0]].into_iter().enumerate() {
        input[[0, c, y as usize, x as usize]] = (value as f32 - mean[c]) / std[c];
      }
    }

    let scale = [width as f32 / ow as f32, height as f32 / oh as f32];
    Ok((input, scale))
  }
}

impl Detector for GlipDetector {
  fn detect(
    &self,
    frame: &BgrFrame,
    caption: &Caption,
  ) -> Result<Vec<RawDetection>, DetectorError> {
    let (images, [sx, sy]) = self.preprocess(frame)?;

    let encoding = self
      .tokenizer
      .encode(caption.text(), true)
      .map_err(|e| DetectorError::Tokenizer(e.to_string()))?;
    let len = encoding.get_ids().len().min(self.config.max_query_len);
    let input_ids: Vec<i64> = encoding.get_ids()[..len].iter().map(|&id| id as i64).collect();
    let attention_mask: Vec<i64> = encoding.get_attention_mask()[..len]
      .iter()
      .map(|&m| m as i64)
      .collect();
    let token_type_ids = vec![0i64; len];

    // 没有短语时整段文本作为唯一短语
    let whole = [0..caption.text().len()];
    let spans = if caption.spans().is_empty() {
      &whole[..]
    } else {
      caption.spans()
    };
    let positive = positive_map(spans, &encoding.get_offsets()[..len]);

    let shape_err = |e: ndarray::ShapeError| DetectorError::InvalidOutput(e.to_string());
    let input_ids = Array2::from_shape_vec((1, len), input_ids).map_err(shape_err)?;
    let attention_mask = Array2::from_shape_vec((1, len), attention_mask).map_err(shape_err)?;
    let token_type_ids = Array2::from_shape_vec((1, len), token_type_ids).map_err(shape_err)?;

    let mut session = self
      .session
      .lock()
      .map_err(|_| DetectorError::Backend("ONNX 会话锁已失效".to_string()))?;

    debug!("执行模型推理");
    let outputs = session.run(ort::inputs![
      "images" => Value::from_array(images)?,
      "input_ids" => Value::from_array(input_ids)?,
      "attention_mask" => Value::from_array(attention_mask)?,
      "token_type_ids" => Value::from_array(token_type_ids)?,
      "positive_map" => Value::from_array(positive)?
    ])?;

    let (_, boxes) = outputs["boxes"].try_extract_tensor::<f32>()?;
    let (_, scores) = outputs["scores"].try_extract_tensor::<f32>()?;
    let (_, labels) = outputs["labels"].try_extract_tensor::<i64>()?;

    let n = scores.len();
    if boxes.len() != n * 4 || labels.len() != n {
      return Err(DetectorError::InvalidOutput(format!(
        "输出长度不一致: boxes={}, scores={}, labels={}",
        boxes.len(),
        n,
        labels.len()
      )));
    }

    let detections: Vec<RawDetection> = boxes
      .chunks_exact(4)
      .zip(scores)
      .zip(labels)
      .map(|((b, &score), &label)| RawDetection {
        bbox: [b[0] * sx, b[1] * sy, b[2] * sx, b[3] * sy],
        // 负数标签不在任何短语区间内
        class_index: u32::try_from(label).unwrap_or(0),
        score,
      })
      .collect();

    debug!("检测器返回 {} 个候选框", detections.len());
    Ok(detections)
  }
}

/// 短边缩放到 `min_size`，长边不超过 `max_size`
pub fn resized_shape(width: u32, height: u32, min_size: u32, max_size: u32) -> (u32, u32) {
  let (w, h) = (width as f32, height as f32);
  let (short, long) = (w.min(h), w.max(h));

  let mut size = min_size as f32;
  if long / short * size > max_size as f32 {
    size = (max_size as f32 * short / long).round();
  }

  if width < height {
    (size as u32, (size * h / w) as u32)
  } else {
    ((size * w / h) as u32, size as u32)
  }
}

/// 短语到 token 的对应矩阵，每行按 L1 归一化
///
/// token 的字节区间与短语区间有重叠即视为命中；特殊 token 的区间为空，不会命中。
pub fn positive_map(spans: &[Range<usize>], offsets: &[(usize, usize)]) -> Array2<f32> {
  let mut map = Array2::<f32>::zeros((spans.len(), offsets.len()));

  for (row, span) in spans.iter().enumerate() {
    for (col, &(start, end)) in offsets.iter().enumerate() {
      if end > start && start < span.end && end > span.start {
        map[[row, col]] = 1.0;
      }
    }
    let sum = map.row(row).sum();
    map.row_mut(row).mapv_inplace(|v| v / (sum + POSITIVE_MAP_EPS));
  }
  map
}

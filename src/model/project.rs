// 该文件是 Xunjing （寻景） 项目的一部分。
// src/model/project.rs - 检测结果后处理
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

use tracing::debug;

use crate::{
  caption::Caption,
  model::{DetectResult, RawDetection},
};

/// 按阈值过滤原始检测并映射标签
///
/// `score >= threshold` 的检测保留，顺序与检测器输出一致，不重新排序。
pub fn project(raw: &[RawDetection], caption: &Caption, threshold: f32) -> DetectResult {
  let mut result = DetectResult::default();

  for detection in raw.iter().filter(|d| d.score >= threshold) {
    result.push(detection, caption.label_for(detection.class_index));
  }

  debug!(
    "阈值 {:.2} 下保留 {}/{} 个检测",
    threshold,
    result.len(),
    raw.len()
  );
  result
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::caption::FALLBACK_LABEL;

  fn raw(class_index: u32, score: f32) -> RawDetection {
    RawDetection {
      bbox: [score, score, 10.0, 10.0],
      class_index,
      score,
    }
  }

  fn sample() -> Vec<RawDetection> {
    vec![
      raw(1, 0.92),
      raw(2, 0.71),
      raw(3, 0.70),
      raw(1, 0.55),
      raw(2, 0.10),
    ]
  }

  #[test]
  fn test_threshold_is_inclusive() {
    let caption = Caption::from_phrases(["door", "window"]);
    let result = project(&sample(), &caption, 0.70);
    assert_eq!(result.scores(), &[0.92, 0.71, 0.70]);
  }

  #[test]
  fn test_labels_follow_class_index() {
    let caption = Caption::from_phrases(["door", "window"]);
    let result = project(&sample(), &caption, 0.5);
    assert_eq!(result.labels(), &["door", "window", FALLBACK_LABEL, "door"]);
    assert_eq!(result.class_idx(), &[1, 2, 3, 1]);
  }

  #[test]
  fn test_order_is_preserved() {
    let unordered = vec![raw(1, 0.6), raw(2, 0.9), raw(1, 0.7)];
    let caption = Caption::parse("door");
    let result = project(&unordered, &caption, 0.0);
    assert_eq!(result.scores(), &[0.6, 0.9, 0.7]);
    assert_eq!(result.boxes()[1], [0.9, 0.9, 10.0, 10.0]);
  }

  #[test]
  fn test_sequences_have_equal_length() {
    let caption = Caption::parse("door, window");
    for threshold in [0.0, 0.3, 0.6, 0.95, 1.5] {
      let result = project(&sample(), &caption, threshold);
      let n = result.len();
      assert_eq!(result.boxes().len(), n);
      assert_eq!(result.labels().len(), n);
      assert_eq!(result.scores().len(), n);
      assert_eq!(result.class_idx().len(), n);
      assert_eq!(result.iter().count(), n);
    }
  }

  #[test]
  fn test_filtering_is_monotonic() {
    let caption = Caption::parse("door, window");
    let thresholds = [0.0, 0.1, 0.2, 0.55, 0.7, 0.71, 0.9, 1.0];
    for pair in thresholds.windows(2) {
      let low = project(&sample(), &caption, pair[0]).len();
      let high = project(&sample(), &caption, pair[1]).len();
      assert!(high <= low, "{} -> {}, {} > {}", pair[0], pair[1], high, low);
    }
  }

  #[test]
  fn test_empty_after_threshold() {
    let caption = Caption::parse("door");
    let result = project(&sample(), &caption, 0.99);
    assert!(result.is_empty());
    assert!(result.labels().is_empty());
    assert!(result.class_idx().is_empty());
  }

  #[test]
  fn test_serializes_as_plain_sequences() {
    let caption = Caption::parse("door");
    let result = project(&[raw(1, 0.5)], &caption, 0.5);
    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["labels"], serde_json::json!(["door"]));
    assert_eq!(json["class_idx"], serde_json::json!([1]));
    assert_eq!(json["boxes"], serde_json::json!([[0.5, 0.5, 10.0, 10.0]]));
    assert_eq!(json["scores"], serde_json::json!([0.5]));
  }
}

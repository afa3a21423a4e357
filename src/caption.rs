// 该文件是 Xunjing （寻景） 项目的一部分。
// src/caption.rs - 描述文本与短语索引
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

use std::ops::Range;

/// 类别索引无法映射到短语时使用的标签
pub const FALLBACK_LABEL: &str = "object";

const PHRASE_SEPARATOR: &str = ", ";
const DEFAULT_PLUS: u32 = 1;

/// 检测器查询文本，同时也是标签词表
///
/// 短语按顺序以 `", "` 连接，每个短语在文本中的字节区间被记录下来，
/// 供检测器构建短语到 token 的映射。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caption {
  text: String,
  phrases: Vec<String>,
  spans: Vec<Range<usize>>,
  plus: u32,
}

impl Caption {
  /// 按逗号拆分自由文本，去掉首尾空白与空短语
  pub fn parse(text: &str) -> Self {
    Self::from_phrases(text.split(','))
  }

  pub fn from_phrases<I, S>(phrases: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    let mut text = String::new();
    let mut kept = Vec::new();
    let mut spans = Vec::new();

    for phrase in phrases {
      let phrase = phrase.as_ref().trim();
      if phrase.is_empty() {
        continue;
      }
      if !text.is_empty() {
        text.push_str(PHRASE_SEPARATOR);
      }
      let start = text.len();
      text.push_str(phrase);
      spans.push(start..text.len());
      kept.push(phrase.to_string());
    }

    Caption {
      text,
      phrases: kept,
      spans,
      plus: DEFAULT_PLUS,
    }
  }

  /// 设置类别索引与短语下标之间的偏移，0 表示未定义
  pub fn with_plus(mut self, plus: u32) -> Self {
    self.plus = plus;
    self
  }

  pub fn text(&self) -> &str {
    &self.text
  }

  pub fn phrases(&self) -> &[String] {
    &self.phrases
  }

  /// 每个短语在 [`Caption::text`] 中的字节区间
  pub fn spans(&self) -> &[Range<usize>] {
    &self.spans
  }

  pub fn plus(&self) -> u32 {
    self.plus
  }

  pub fn phrase_index(&self) -> PhraseIndex {
    PhraseIndex {
      phrase_count: self.phrases.len(),
      plus: self.plus,
    }
  }

  /// 将检测器类别索引翻译为可读标签
  pub fn label_for(&self, class_index: u32) -> &str {
    self
      .phrase_index()
      .position(class_index)
      .and_then(|pos| self.phrases.get(pos))
      .map(String::as_str)
      .unwrap_or(FALLBACK_LABEL)
  }
}

/// 类别索引到短语下标的映射，合法区间为 `[1, phrase_count]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhraseIndex {
  phrase_count: usize,
  plus: u32,
}

impl PhraseIndex {
  pub fn new(phrase_count: usize, plus: u32) -> Self {
    Self { phrase_count, plus }
  }

  pub fn phrase_count(&self) -> usize {
    self.phrase_count
  }

  /// 区间内的类别索引返回 `class_index - plus`；没有短语、偏移未定义
  /// 或索引越界时返回 `None`
  pub fn position(&self, class_index: u32) -> Option<usize> {
    if self.phrase_count == 0 || self.plus == 0 {
      return None;
    }
    if class_index < 1 || class_index as usize > self.phrase_count {
      return None;
    }
    class_index
      .checked_sub(self.plus)
      .map(|pos| pos as usize)
  }
}

//! Lexicon-based sentiment scoring.

use std::collections::HashSet;
use std::fmt;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

use crate::tokenizer;

pub const DEFAULT_POSITIVE_THRESHOLD: f64 = 0.1;
pub const DEFAULT_NEGATIVE_THRESHOLD: f64 = -0.1;

lazy_static! {
    static ref POSITIVE_WORDS: HashSet<&'static str> = [
        "好", "优秀", "成功", "增长", "提升", "改善", "满意", "喜欢", "推荐", "积极", "good", "great", "success",
        "growth", "improve", "positive",
    ]
    .into_iter()
    .collect();
    static ref NEGATIVE_WORDS: HashSet<&'static str> = [
        "差", "失败", "下降", "问题", "困难", "不满", "批评", "负面", "糟糕", "消极", "bad", "poor", "failure",
        "decline", "problem", "negative",
    ]
    .into_iter()
    .collect();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
}

impl SentimentLabel {
    /// Chinese display label.
    pub fn label(&self) -> &'static str {
        match self {
            SentimentLabel::Positive => "正面",
            SentimentLabel::Negative => "负面",
            SentimentLabel::Neutral => "中性",
        }
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SentimentLabel::Positive => write!(f, "positive"),
            SentimentLabel::Negative => write!(f, "negative"),
            SentimentLabel::Neutral => write!(f, "neutral"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentResult {
    pub score: f64,
    pub label: SentimentLabel,
    pub positive_count: usize,
    pub negative_count: usize,
    pub total_sentiment_words: usize,
}

impl SentimentResult {
    pub fn neutral() -> Self {
        Self {
            score: 0.0,
            label: SentimentLabel::Neutral,
            positive_count: 0,
            negative_count: 0,
            total_sentiment_words: 0,
        }
    }
}

impl Default for SentimentResult {
    fn default() -> Self {
        SentimentResult::neutral()
    }
}

/// Counts lexicon hits and labels the balance with two thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SentimentScorer {
    pub positive_threshold: f64,
    pub negative_threshold: f64,
}

impl Default for SentimentScorer {
    fn default() -> Self {
        Self {
            positive_threshold: DEFAULT_POSITIVE_THRESHOLD,
            negative_threshold: DEFAULT_NEGATIVE_THRESHOLD,
        }
    }
}

impl SentimentScorer {
    pub fn new(positive_threshold: f64, negative_threshold: f64) -> Self {
        Self {
            positive_threshold,
            negative_threshold,
        }
    }

    pub fn label_for(&self, score: f64) -> SentimentLabel {
        if score > self.positive_threshold {
            SentimentLabel::Positive
        } else if score < self.negative_threshold {
            SentimentLabel::Negative
        } else {
            SentimentLabel::Neutral
        }
    }

    pub fn score_tokens<'a, I>(&self, tokens: I) -> SentimentResult
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut positive_count = 0;
        let mut negative_count = 0;
        for token in tokens {
            let token = token.trim();
            let lowered = token.to_ascii_lowercase();
            if POSITIVE_WORDS.contains(lowered.as_str()) {
                positive_count += 1;
            } else if NEGATIVE_WORDS.contains(lowered.as_str()) {
                negative_count += 1;
            }
        }

        let total = positive_count + negative_count;
        if total == 0 {
            return SentimentResult::neutral();
        }

        let score = (positive_count as f64 - negative_count as f64) / total as f64;
        SentimentResult {
            score,
            label: self.label_for(score),
            positive_count,
            negative_count,
            total_sentiment_words: total,
        }
    }

    pub fn score_text(&self, text: &str) -> SentimentResult {
        self.score_tokens(tokenizer::tokenize(text))
    }
}

//! Keyword frequency ranking over segmented text.

use std::collections::{HashMap, HashSet};

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

use crate::tokenizer::{self, TokenType};

pub const DEFAULT_RANKING_TOP_K: usize = 20;
pub const DEFAULT_SUMMARY_TOP_K: usize = 10;

lazy_static! {
    static ref STOPWORDS: HashSet<&'static str> = [
        "的", "了", "在", "是", "我", "有", "和", "就", "不", "人", "都", "一", "一个", "上", "也", "很", "到",
        "说", "要", "去", "你", "会", "着", "没有", "看", "好", "自己", "这", "我们", "他们", "这个", "那个",
        "以及", "因为", "所以", "但是", "如果", "可以", "已经", "the", "and", "of", "to", "in", "is", "for",
        "on", "with", "as", "by", "at", "an", "it", "this", "that", "are", "was", "be",
    ]
    .into_iter()
    .collect();
}

/// Whether `word` is in the fixed stop-word set (ASCII compared case-insensitively).
pub fn is_stopword(word: &str) -> bool {
    STOPWORDS.contains(word) || STOPWORDS.contains(word.to_ascii_lowercase().as_str())
}

/// A token and how often it occurs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordEntry {
    pub token: String,
    pub frequency: usize,
}

impl KeywordEntry {
    pub fn new(token: impl Into<String>, frequency: usize) -> Self {
        Self {
            token: token.into(),
            frequency,
        }
    }
}

/// Full keyword table, ranked by frequency descending with ties in first-occurrence order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrequencyTable {
    entries: Vec<KeywordEntry>,
}

impl FrequencyTable {
    /// Count the given tokens, skipping single characters, stop-words and non-word tokens.
    pub fn from_tokens<'a, I>(tokens: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut index: HashMap<&str, usize> = HashMap::new();
        let mut entries: Vec<KeywordEntry> = Vec::new();

        for token in tokens {
            let token = token.trim();
            if !is_keyword_candidate(token) {
                continue;
            }
            match index.get(token) {
                Some(&i) => entries[i].frequency += 1,
                None => {
                    index.insert(token, entries.len());
                    entries.push(KeywordEntry::new(token, 1));
                }
            }
        }

        // `sort_by` is stable, so equal counts keep first-occurrence order.
        entries.sort_by(|a, b| b.frequency.cmp(&a.frequency));
        Self { entries }
    }

    /// Segment `text` and rank its keywords.
    pub fn from_text(text: &str) -> Self {
        Self::from_tokens(tokenizer::tokenize(text))
    }

    pub fn entries(&self) -> &[KeywordEntry] {
        &self.entries
    }

    /// The `k` most frequent entries. The full table stays available.
    pub fn top_k(&self, k: usize) -> &[KeywordEntry] {
        &self.entries[..k.min(self.entries.len())]
    }

    /// Number of distinct tokens in the full table.
    pub fn unique_count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn frequency_of(&self, token: &str) -> Option<usize> {
        self.entries.iter().find(|e| e.token == token).map(|e| e.frequency)
    }
}

fn is_keyword_candidate(token: &str) -> bool {
    token.chars().count() > 1 && tokenizer::classify(token) == TokenType::Word && !is_stopword(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ranking_is_stable_on_ties() {
        let tokens = ["数据", "模型", "分析", "模型", "数据", "图表", "模型"];
        let table = FrequencyTable::from_tokens(tokens);

        let ranked: Vec<(&str, usize)> = table.entries().iter().map(|e| (e.token.as_str(), e.frequency)).collect();
        assert_eq!(ranked, vec![("模型", 3), ("数据", 2), ("分析", 1), ("图表", 1)]);
    }

    #[test]
    fn test_filters_short_stop_and_punctuation_tokens() {
        let tokens = ["的", "我们", "AI", "，", "……", "2023", "  ", "The", "增长"];
        let table = FrequencyTable::from_tokens(tokens);

        let words: Vec<&str> = table.entries().iter().map(|e| e.token.as_str()).collect();
        assert_eq!(words, vec!["AI", "增长"]);
    }

    #[test]
    fn test_top_k_does_not_truncate_table() {
        let tokens = ["苹果", "香蕉", "橘子", "葡萄", "苹果"];
        let table = FrequencyTable::from_tokens(tokens);

        assert_eq!(table.top_k(2).len(), 2);
        assert_eq!(table.top_k(2)[0], KeywordEntry::new("苹果", 2));
        assert_eq!(table.top_k(100).len(), 4);
        assert_eq!(table.unique_count(), 4);
        assert_eq!(table.frequency_of("葡萄"), Some(1));
        assert_eq!(table.frequency_of("西瓜"), None);
    }

    #[test]
    fn test_from_text() {
        let table = FrequencyTable::from_text("数据，数据，图表，数据。");
        assert_eq!(table.entries()[0].token, "数据");
        assert_eq!(table.entries()[0].frequency, 3);
    }

    #[test]
    fn test_empty() {
        let table = FrequencyTable::from_text("");
        assert!(table.is_empty());
        assert!(table.top_k(DEFAULT_SUMMARY_TOP_K).is_empty());
    }
}

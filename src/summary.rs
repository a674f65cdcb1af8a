//! Per-text structured summary built from the pattern extractor, keyword
//! ranker and sentiment scorer.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::keywords::{DEFAULT_RANKING_TOP_K, DEFAULT_SUMMARY_TOP_K, FrequencyTable, KeywordEntry};
use crate::patterns::{self, EntityBucket, PatternKind, PatternMatches};
use crate::sentiment::{SentimentResult, SentimentScorer};
use crate::tokenizer;

lazy_static! {
    static ref WHITESPACE_RUN: Regex = Regex::new(r"\s+").unwrap();
}

/// Collapse whitespace runs into single spaces and trim the ends.
pub fn preprocess(text: &str) -> String {
    WHITESPACE_RUN.replace_all(text, " ").trim().to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicStats {
    /// Length in characters, not bytes.
    pub text_length: usize,
    pub word_count: usize,
    pub sentence_count: usize,
    pub unique_keyword_count: usize,
}

/// Number of matches per extraction pattern.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionCounts {
    pub numbers_found: usize,
    pub percentages_found: usize,
    pub dates_found: usize,
    pub money_found: usize,
    pub emails_found: usize,
    pub phones_found: usize,
    pub urls_found: usize,
}

impl ExtractionCounts {
    pub fn from_matches(matches: &PatternMatches) -> Self {
        Self {
            numbers_found: matches.count(PatternKind::Numbers),
            percentages_found: matches.count(PatternKind::Percentages),
            dates_found: matches.count(PatternKind::Dates),
            money_found: matches.count(PatternKind::Money),
            emails_found: matches.count(PatternKind::Emails),
            phones_found: matches.count(PatternKind::Phones),
            urls_found: matches.count(PatternKind::Urls),
        }
    }

    pub fn get(&self, kind: PatternKind) -> usize {
        match kind {
            PatternKind::Numbers => self.numbers_found,
            PatternKind::Percentages => self.percentages_found,
            PatternKind::Dates => self.dates_found,
            PatternKind::Money => self.money_found,
            PatternKind::Emails => self.emails_found,
            PatternKind::Phones => self.phones_found,
            PatternKind::Urls => self.urls_found,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (PatternKind, usize)> + '_ {
        PatternKind::ALL.into_iter().map(move |kind| (kind, self.get(kind)))
    }
}

/// Everything the extractor found, before counting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawExtraction {
    pub patterns: PatternMatches,
    /// Ranked keywords, truncated to the ranking size.
    pub keywords: Vec<KeywordEntry>,
    pub sentences: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextSummary {
    pub basic_stats: BasicStats,
    pub data_extraction: ExtractionCounts,
    pub entities: EntityBucket,
    pub sentiment: SentimentResult,
    pub top_keywords: Vec<KeywordEntry>,
    pub raw_extracted: RawExtraction,
}

/// Builds a [`TextSummary`] for one text. Deterministic: the same input gives the same summary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SummaryBuilder {
    pub scorer: SentimentScorer,
    pub ranking_top_k: usize,
    pub summary_top_k: usize,
}

impl Default for SummaryBuilder {
    fn default() -> Self {
        Self {
            scorer: SentimentScorer::default(),
            ranking_top_k: DEFAULT_RANKING_TOP_K,
            summary_top_k: DEFAULT_SUMMARY_TOP_K,
        }
    }
}

impl SummaryBuilder {
    pub fn new(scorer: SentimentScorer, ranking_top_k: usize, summary_top_k: usize) -> Self {
        Self {
            scorer,
            ranking_top_k,
            summary_top_k,
        }
    }

    pub fn build(&self, text: &str) -> TextSummary {
        let matches = patterns::extract_patterns(text);
        let entities = patterns::extract_entities(text);

        // One segmentation pass feeds both the keyword table and the scorer.
        let tokens = tokenizer::tokenize(text);
        let table = FrequencyTable::from_tokens(tokens.iter().copied());
        let sentiment = self.scorer.score_tokens(tokens.iter().copied());

        let sentences: Vec<String> = tokenizer::split_sentences(text)
            .into_iter()
            .map(str::to_string)
            .collect();

        let basic_stats = BasicStats {
            text_length: text.chars().count(),
            word_count: tokenizer::word_count(text),
            sentence_count: sentences.len(),
            unique_keyword_count: table.unique_count(),
        };

        debug!(
            chars = basic_stats.text_length,
            tokens = tokens.len(),
            keywords = basic_stats.unique_keyword_count,
            entities = entities.total(),
            "built text summary"
        );

        TextSummary {
            basic_stats,
            data_extraction: ExtractionCounts::from_matches(&matches),
            entities,
            sentiment,
            top_keywords: table.top_k(self.summary_top_k).to_vec(),
            raw_extracted: RawExtraction {
                patterns: matches,
                keywords: table.top_k(self.ranking_top_k).to_vec(),
                sentences,
            },
        }
    }
}

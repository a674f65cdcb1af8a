//! Lexical extraction of numbers, dates, contact details and heuristic entities.
//!
//! Every function here is total: text without matches yields empty sequences.
//! The entity heuristics are suffix-anchored patterns and a fixed term list,
//! so false positives such as `"腾讯公司和阿里巴巴集团"` swallowing the
//! conjunction are expected.

use std::collections::BTreeMap;
use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Category recovered by one extraction pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternKind {
    Numbers,
    Percentages,
    Dates,
    Money,
    Emails,
    Phones,
    Urls,
}

impl PatternKind {
    pub const ALL: [PatternKind; 7] = [
        PatternKind::Numbers,
        PatternKind::Percentages,
        PatternKind::Dates,
        PatternKind::Money,
        PatternKind::Emails,
        PatternKind::Phones,
        PatternKind::Urls,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PatternKind::Numbers => "numbers",
            PatternKind::Percentages => "percentages",
            PatternKind::Dates => "dates",
            PatternKind::Money => "money",
            PatternKind::Emails => "emails",
            PatternKind::Phones => "phones",
            PatternKind::Urls => "urls",
        }
    }

    /// Key used for this category in the summary's count table, e.g. `numbers_found`.
    pub fn count_key(&self) -> String {
        format!("{}_found", self.name())
    }

    /// Display label used in charts and the terminal summary.
    pub fn label(&self) -> &'static str {
        match self {
            PatternKind::Numbers => "数字",
            PatternKind::Percentages => "百分比",
            PatternKind::Dates => "日期",
            PatternKind::Money => "金额",
            PatternKind::Emails => "邮箱",
            PatternKind::Phones => "电话",
            PatternKind::Urls => "网址",
        }
    }
}

impl fmt::Display for PatternKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl TryFrom<&str> for PatternKind {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        PatternKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| format!("Unknown pattern kind: {}", s))
    }
}

/// Heuristic entity category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityCategory {
    Persons,
    Organizations,
    Locations,
    Products,
    Technologies,
}

impl EntityCategory {
    pub const ALL: [EntityCategory; 5] = [
        EntityCategory::Persons,
        EntityCategory::Organizations,
        EntityCategory::Locations,
        EntityCategory::Products,
        EntityCategory::Technologies,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            EntityCategory::Persons => "persons",
            EntityCategory::Organizations => "organizations",
            EntityCategory::Locations => "locations",
            EntityCategory::Products => "products",
            EntityCategory::Technologies => "technologies",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EntityCategory::Persons => "人物",
            EntityCategory::Organizations => "组织",
            EntityCategory::Locations => "地点",
            EntityCategory::Products => "产品",
            EntityCategory::Technologies => "技术",
        }
    }
}

lazy_static! {
    static ref PATTERNS: Vec<(PatternKind, Regex)> = vec![
        (PatternKind::Numbers, Regex::new(r"\d+(?:\.\d+)?").unwrap()),
        (PatternKind::Percentages, Regex::new(r"\d+(?:\.\d+)?%").unwrap()),
        (
            PatternKind::Dates,
            Regex::new(r"\d{4}[-/]\d{1,2}[-/]\d{1,2}|\d{4}年(?:\d{1,2}月(?:\d{1,2}[日号])?)?").unwrap()
        ),
        (PatternKind::Money, Regex::new(r"[¥￥$€£]\d+(?:,\d{3})*(?:\.\d{2})?").unwrap()),
        (
            PatternKind::Emails,
            Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").unwrap()
        ),
        (PatternKind::Phones, Regex::new(r"\b\d{3,4}[-.]?\d{3,4}[-.]?\d{4}\b").unwrap()),
        (
            PatternKind::Urls,
            Regex::new(r"https?://(?:[a-zA-Z]|[0-9]|[$-_@.&+]|[!*\(\),]|(?:%[0-9a-fA-F][0-9a-fA-F]))+").unwrap()
        ),
    ];
    static ref PERSON_PATTERNS: Vec<Regex> = suffix_patterns(r"[A-Za-z\u4e00-\u9fff]{2,4}", &["先生", "女士", "博士", "教授"]);
    static ref ORGANIZATION_PATTERNS: Vec<Regex> =
        suffix_patterns(r"[A-Za-z\u4e00-\u9fff]+", &["公司", "集团", "大学", "研究院", "中心"]);
    static ref LOCATION_PATTERNS: Vec<Regex> = suffix_patterns(r"[A-Za-z\u4e00-\u9fff]+", &["市", "省", "县", "区"]);
    static ref PRODUCT_REGEX: Regex = Regex::new(r"《([^《》\n]{1,30})》|「([^「」\n]{1,30})」").unwrap();
    static ref TECHNOLOGY_REGEX: Regex = {
        let mut terms = TECHNOLOGY_TERMS.to_vec();
        // Longest first so the leftmost match prefers "深度学习" over "学习"-style prefixes.
        terms.sort_by_key(|t| std::cmp::Reverse(t.chars().count()));
        let alternation = terms.iter().map(|t| regex::escape(t)).collect::<Vec<_>>().join("|");
        Regex::new(&format!("(?:{})", alternation)).unwrap()
    };
}

const TECHNOLOGY_TERMS: &[&str] = &[
    "人工智能",
    "机器学习",
    "深度学习",
    "自然语言处理",
    "计算机视觉",
    "大模型",
    "大数据",
    "云计算",
    "区块链",
    "物联网",
    "元宇宙",
    "芯片",
    "5G",
    "AI",
    "AIGC",
    "GPT",
    "LLM",
    "Python",
    "Rust",
    "Java",
    "JavaScript",
    "Kubernetes",
    "Docker",
];

fn suffix_patterns(stem: &str, suffixes: &[&str]) -> Vec<Regex> {
    suffixes
        .iter()
        .map(|suffix| Regex::new(&format!("{}{}", stem, regex::escape(suffix))).unwrap())
        .collect()
}

/// Ordered matches per [`PatternKind`]; every kind is always present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatternMatches(BTreeMap<PatternKind, Vec<String>>);

impl PatternMatches {
    pub fn get(&self, kind: PatternKind) -> &[String] {
        self.0.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn count(&self, kind: PatternKind) -> usize {
        self.get(kind).len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PatternKind, &[String])> {
        self.0.iter().map(|(kind, matches)| (*kind, matches.as_slice()))
    }

    pub fn total(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }
}

/// Ordered entity names per [`EntityCategory`]. Duplicates are kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityBucket {
    pub persons: Vec<String>,
    pub organizations: Vec<String>,
    pub locations: Vec<String>,
    pub products: Vec<String>,
    pub technologies: Vec<String>,
}

impl EntityBucket {
    pub fn get(&self, category: EntityCategory) -> &[String] {
        match category {
            EntityCategory::Persons => &self.persons,
            EntityCategory::Organizations => &self.organizations,
            EntityCategory::Locations => &self.locations,
            EntityCategory::Products => &self.products,
            EntityCategory::Technologies => &self.technologies,
        }
    }

    fn get_mut(&mut self, category: EntityCategory) -> &mut Vec<String> {
        match category {
            EntityCategory::Persons => &mut self.persons,
            EntityCategory::Organizations => &mut self.organizations,
            EntityCategory::Locations => &mut self.locations,
            EntityCategory::Products => &mut self.products,
            EntityCategory::Technologies => &mut self.technologies,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityCategory, &[String])> {
        EntityCategory::ALL.into_iter().map(move |c| (c, self.get(c)))
    }

    pub fn total(&self) -> usize {
        self.iter().map(|(_, names)| names.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Apply every extraction pattern to `text`.
pub fn extract_patterns(text: &str) -> PatternMatches {
    let mut matches = BTreeMap::new();
    for (kind, regex) in PATTERNS.iter() {
        let found = regex.find_iter(text).map(|m| m.as_str().to_string()).collect();
        matches.insert(*kind, found);
    }
    PatternMatches(matches)
}

/// Collect heuristic entities from `text`.
///
/// Suffix patterns are applied one after another, so within a category all
/// `先生` matches precede all `女士` matches, and so on.
pub fn extract_entities(text: &str) -> EntityBucket {
    let mut bucket = EntityBucket::default();

    for (category, patterns) in [
        (EntityCategory::Persons, &*PERSON_PATTERNS),
        (EntityCategory::Organizations, &*ORGANIZATION_PATTERNS),
        (EntityCategory::Locations, &*LOCATION_PATTERNS),
    ] {
        let names = bucket.get_mut(category);
        for pattern in patterns {
            names.extend(pattern.find_iter(text).map(|m| m.as_str().to_string()));
        }
    }

    for caps in PRODUCT_REGEX.captures_iter(text) {
        if let Some(name) = caps.get(1).or_else(|| caps.get(2)) {
            bucket.products.push(name.as_str().trim().to_string());
        }
    }

    for m in TECHNOLOGY_REGEX.find_iter(text) {
        if is_standalone(text, m.start(), m.end()) {
            bucket.technologies.push(m.as_str().to_string());
        }
    }

    bucket
}

/// ASCII terms must not sit inside a longer ASCII word ("AI" in "MAIN").
fn is_standalone(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    let glued = |c: Option<char>| c.is_some_and(|c| c.is_ascii_alphanumeric());
    let term_is_ascii = text[start..end].is_ascii();
    !(term_is_ascii && (glued(before) || glued(after)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbers_and_percentages() {
        let text = "2023年，AI企业数量达到5000多家，同比增长25%。";
        let matches = extract_patterns(text);

        assert_eq!(matches.get(PatternKind::Numbers), ["2023", "5000", "25"]);
        assert_eq!(matches.get(PatternKind::Percentages), ["25%"]);
        assert_eq!(matches.get(PatternKind::Dates), ["2023年"]);
    }

    #[test]
    fn test_all_kinds_present_for_empty_text() {
        let matches = extract_patterns("");
        for kind in PatternKind::ALL {
            assert!(matches.get(kind).is_empty());
        }
        assert_eq!(matches.iter().count(), PatternKind::ALL.len());
        assert_eq!(matches.total(), 0);
    }

    #[test]
    fn test_dates_are_not_validated() {
        let matches = extract_patterns("会议定于2024-13-45举行，另见2024年3月8日。");
        assert_eq!(matches.get(PatternKind::Dates), ["2024-13-45", "2024年3月8日"]);
    }

    #[test]
    fn test_money_requires_currency_symbol() {
        let matches = extract_patterns("售价$1,299.00，成本800元，定金¥200");
        assert_eq!(matches.get(PatternKind::Money), ["$1,299.00", "¥200"]);
    }

    #[test]
    fn test_contacts_and_urls() {
        let text = "联系 support@example.com 或致电 010-1234-5678，官网 https://example.com/a?b=1";
        let matches = extract_patterns(text);

        assert_eq!(matches.get(PatternKind::Emails), ["support@example.com"]);
        assert_eq!(matches.get(PatternKind::Phones), ["010-1234-5678"]);
        assert_eq!(matches.get(PatternKind::Urls), ["https://example.com/a?b=1"]);
    }

    #[test]
    fn test_pattern_kind_names() {
        assert_eq!(PatternKind::Numbers.count_key(), "numbers_found");
        assert_eq!(PatternKind::try_from("urls"), Ok(PatternKind::Urls));
        assert!(PatternKind::try_from("colors").is_err());
        assert_eq!(serde_json::to_string(&PatternKind::Money).unwrap(), "\"money\"");
    }

    #[test]
    fn test_entity_suffix_heuristics() {
        let entities = extract_entities("张伟先生与李娜女士在北京市会见了华为公司的王教授。");

        assert_eq!(entities.persons.len(), 3);
        assert!(entities.persons[0].ends_with("先生"));
        assert!(entities.persons[1].ends_with("女士"));
        assert!(entities.persons[2].ends_with("教授"));
        assert_eq!(entities.organizations.len(), 1);
        assert!(entities.organizations[0].ends_with("华为公司"));
        assert_eq!(entities.locations.len(), 1);
        assert!(entities.locations[0].ends_with("北京市"));
    }

    #[test]
    fn test_products_and_technologies() {
        let entities = extract_entities("《三体》讲到人工智能，MAIN 函数里没有它，但 AI 和深度学习很火。");

        assert_eq!(entities.products, ["三体"]);
        assert_eq!(entities.technologies, ["人工智能", "AI", "深度学习"]);
    }

    #[test]
    fn test_entity_duplicates_kept() {
        let entities = extract_entities("上海市很大。上海市很美。");
        assert_eq!(entities.locations, ["上海市", "上海市"]);
        assert_eq!(entities.total(), 2);
    }

    #[test]
    fn test_no_entities() {
        let entities = extract_entities("");
        assert!(entities.is_empty());
        assert_eq!(entities.iter().count(), EntityCategory::ALL.len());
    }
}

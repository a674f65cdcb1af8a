//! Boundary conversion of structured-data payloads.
//!
//! Payloads arrive either as a locally built [`TextSummary`] or as loosely
//! shaped JSON from a provider or a file. Both are resolved here, once, into
//! the closed [`Payload`] representation the planner works on. JSON shapes
//! are recognized by key presence; anything else is rejected with an
//! [`InvalidPayloadError`] instead of being reflected over generically.

use std::collections::BTreeMap;

use itertools::Itertools;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::InvalidPayloadError;
use crate::patterns::EntityCategory;
use crate::sentiment::SentimentResult;
use crate::summary::TextSummary;

/// Top-level keys that mark a JSON object as a structured payload.
pub const RECOGNIZED_KEYS: [&str; 6] = ["entities", "metrics", "categories", "companies", "core_arguments", "keywords"];

const WEIGHT_KEYS: [&str; 6] = ["weight", "value", "proportion", "percentage", "count", "frequency"];
const TERM_KEYS: [&str; 4] = ["term", "word", "keyword", "token"];

lazy_static! {
    static ref QUANTITY_REGEX: Regex =
        Regex::new(r"^[¥￥$€£]?\s*([-+]?(?:\d{1,3}(?:,\d{3})+|\d+)(?:\.\d+)?)\s*(\D*)$").unwrap();
}

/// A number with the unit it was written with (`"5.49亿元"` is 5.49 and `亿元`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quantity {
    pub value: f64,
    pub unit: String,
}

impl Quantity {
    pub fn new(value: f64, unit: impl Into<String>) -> Self {
        Self {
            value,
            unit: unit.into(),
        }
    }

    pub fn parse(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_f64().filter(|v| v.is_finite()).map(|v| Quantity::new(v, "")),
            Value::String(s) => Self::parse_str(s),
            _ => None,
        }
    }

    pub fn parse_str(text: &str) -> Option<Self> {
        let caps = QUANTITY_REGEX.captures(text.trim())?;
        let value = caps[1].replace(',', "").parse::<f64>().ok()?;
        let unit = caps.get(2).map(|m| m.as_str().trim()).unwrap_or_default();
        Some(Quantity::new(value, unit))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metric {
    /// Parent key for metrics given as `name -> {sub-key -> value}`.
    pub group: Option<String>,
    pub name: String,
    pub display: String,
    pub quantity: Option<Quantity>,
}

impl Metric {
    pub fn point_id(&self) -> String {
        match &self.group {
            Some(group) => format!("metric:{}/{}", group, self.name),
            None => format!("metric:{}", self.name),
        }
    }

    pub fn label(&self) -> String {
        match &self.group {
            Some(group) => format!("{} · {}", group, self.name),
            None => self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Measure {
    /// Weights are shares of a whole.
    Proportion,
    /// Weights are independent counts.
    Count,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Category {
    pub name: String,
    pub items: Vec<String>,
    pub weight: Option<f64>,
}

impl Category {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            items: Vec::new(),
            weight: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryGroup {
    pub key: String,
    pub title: String,
    pub measure: Measure,
    pub categories: Vec<Category>,
}

impl CategoryGroup {
    pub fn point_id(&self, category: &Category) -> String {
        format!("category:{}:{}", self.key, category.name)
    }

    /// True when every category carries an explicit numeric weight.
    pub fn is_weighted(&self) -> bool {
        !self.categories.is_empty() && self.categories.iter().all(|c| c.weight.is_some())
    }
}

/// Values keyed by year, ordered by year.
pub type YearSeries = BTreeMap<String, Quantity>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Company {
    pub name: String,
    pub revenue: YearSeries,
    pub adjusted_profit: YearSeries,
    pub store_count: Option<Quantity>,
}

impl Company {
    pub fn point_id(&self, field: &str, year: Option<&str>) -> String {
        match year {
            Some(year) => format!("company:{}:{}:{}", self.name, field, year),
            None => format!("company:{}:{}", self.name, field),
        }
    }
}

/// A term with an explicit weight, e.g. a keyword frequency.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedTerm {
    pub term: String,
    pub weight: f64,
}

/// Closed internal form of every payload the planner accepts.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Payload {
    pub entities: Vec<String>,
    pub metrics: Vec<Metric>,
    pub category_groups: Vec<CategoryGroup>,
    pub companies: Vec<Company>,
    pub core_arguments: Vec<String>,
    pub keywords: Vec<RankedTerm>,
    pub sentiment: Option<SentimentResult>,
}

/// What a JSON value turned out to be.
#[derive(Debug, Clone, PartialEq)]
pub enum PayloadShape {
    Structured(Payload),
    /// `{content: string}`: free text the provider could not structure.
    Content(String),
    /// `{error: string}`: a failure captured upstream.
    Error(String),
}

/// Resolve a JSON value by key presence.
pub fn resolve(value: &Value) -> Result<PayloadShape, InvalidPayloadError> {
    let map = match value {
        Value::Object(map) => map,
        other => {
            return Err(InvalidPayloadError::new(format!(
                "expected a JSON object, found {}",
                json_kind(other)
            )));
        }
    };

    if let Some(error) = map.get("error") {
        return Ok(PayloadShape::Error(display_value(error)));
    }

    if !RECOGNIZED_KEYS.iter().any(|key| map.contains_key(*key)) {
        if let Some(Value::String(content)) = map.get("content") {
            return Ok(PayloadShape::Content(content.clone()));
        }
        if map.is_empty() {
            return Err(InvalidPayloadError::new("empty object"));
        }
        return Err(InvalidPayloadError::new(format!(
            "no recognized keys (found: {})",
            map.keys().join(", ")
        )));
    }

    Payload::from_map(map).map(PayloadShape::Structured)
}

impl Payload {
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
            && self.metrics.is_empty()
            && self.category_groups.iter().all(|g| g.categories.is_empty())
            && self.companies.is_empty()
            && self.core_arguments.is_empty()
            && self.keywords.is_empty()
            && self.sentiment.as_ref().is_none_or(|s| s.total_sentiment_words == 0)
    }

    fn from_map(map: &Map<String, Value>) -> Result<Self, InvalidPayloadError> {
        let mut payload = Payload::default();

        if let Some(entities) = map.get("entities") {
            parse_entities(entities, &mut payload)?;
        }
        if let Some(metrics) = map.get("metrics") {
            payload.metrics = parse_metrics(metrics)?;
        }
        if let Some(categories) = map.get("categories") {
            let categories = parse_categories(categories)?;
            if !categories.is_empty() {
                payload.category_groups.push(CategoryGroup {
                    key: "categories".to_string(),
                    title: "类别分布".to_string(),
                    measure: Measure::Proportion,
                    categories,
                });
            }
        }
        if let Some(companies) = map.get("companies") {
            payload.companies = parse_companies(companies)?;
        }
        if let Some(arguments) = map.get("core_arguments") {
            payload.core_arguments = parse_strings("core_arguments", arguments)?;
        }
        if let Some(keywords) = map.get("keywords") {
            parse_keywords(keywords, &mut payload)?;
        }

        debug!(
            entities = payload.entities.len(),
            metrics = payload.metrics.len(),
            category_groups = payload.category_groups.len(),
            companies = payload.companies.len(),
            "resolved structured payload"
        );
        Ok(payload)
    }

    /// Lift a local [`TextSummary`] into a payload. Every weight is a real count from the text.
    pub fn from_summary(summary: &TextSummary) -> Self {
        let stats = &summary.basic_stats;
        let mut metrics: Vec<Metric> = [
            ("文本长度", stats.text_length),
            ("词数", stats.word_count),
            ("句子数", stats.sentence_count),
            ("关键词数", stats.unique_keyword_count),
        ]
        .into_iter()
        .map(|(name, value)| Metric {
            group: None,
            name: name.to_string(),
            display: value.to_string(),
            quantity: Some(Quantity::new(value as f64, "")),
        })
        .collect();

        // Matched literals themselves, shown as text next to their counts.
        for (kind, values) in summary.raw_extracted.patterns.iter() {
            if values.is_empty() {
                continue;
            }
            metrics.push(Metric {
                group: None,
                name: kind.label().to_string(),
                display: values.iter().unique().take(5).join("、"),
                quantity: None,
            });
        }

        let entity_categories: Vec<Category> = summary
            .entities
            .iter()
            .filter(|(_, names)| !names.is_empty())
            .map(|(category, names)| Category {
                name: category.label().to_string(),
                items: names.iter().unique().cloned().collect(),
                weight: Some(names.len() as f64),
            })
            .collect();

        let extraction_categories: Vec<Category> = summary
            .data_extraction
            .iter()
            .filter(|(_, count)| *count > 0)
            .map(|(kind, count)| Category {
                name: kind.label().to_string(),
                items: Vec::new(),
                weight: Some(count as f64),
            })
            .collect();

        let mut category_groups = Vec::new();
        if !entity_categories.is_empty() {
            category_groups.push(CategoryGroup {
                key: "entity_distribution".to_string(),
                title: "实体类别分布".to_string(),
                measure: Measure::Proportion,
                categories: entity_categories,
            });
        }
        if !extraction_categories.is_empty() {
            category_groups.push(CategoryGroup {
                key: "data_extraction".to_string(),
                title: "数据提取统计".to_string(),
                measure: Measure::Count,
                categories: extraction_categories,
            });
        }

        Payload {
            entities: EntityCategory::ALL
                .iter()
                .flat_map(|c| summary.entities.get(*c))
                .unique()
                .cloned()
                .collect(),
            metrics,
            category_groups,
            companies: Vec::new(),
            core_arguments: summary.raw_extracted.sentences.clone(),
            keywords: summary
                .top_keywords
                .iter()
                .map(|k| RankedTerm {
                    term: k.token.clone(),
                    weight: k.frequency as f64,
                })
                .collect(),
            sentiment: Some(summary.sentiment.clone()),
        }
    }
}

fn parse_entities(value: &Value, payload: &mut Payload) -> Result<(), InvalidPayloadError> {
    match value {
        Value::Array(_) => {
            payload.entities = parse_strings("entities", value)?;
        }
        Value::Object(map) => {
            // `{category: [names...]}` also gives a genuine per-category count.
            let mut categories = Vec::new();
            for (category, names) in map {
                let names = parse_strings(&format!("entities.{}", category), names)?;
                if names.is_empty() {
                    continue;
                }
                payload.entities.extend(names.iter().cloned());
                categories.push(Category {
                    name: category.clone(),
                    weight: Some(names.len() as f64),
                    items: names,
                });
            }
            if !categories.is_empty() {
                payload.category_groups.push(CategoryGroup {
                    key: "entity_distribution".to_string(),
                    title: "实体类别分布".to_string(),
                    measure: Measure::Proportion,
                    categories,
                });
            }
        }
        Value::Null => {}
        other => return Err(wrong_type("entities", "a list or a mapping", other)),
    }
    payload.entities = payload.entities.iter().unique().cloned().collect();
    Ok(())
}

fn parse_metrics(value: &Value) -> Result<Vec<Metric>, InvalidPayloadError> {
    let mut metrics = Vec::new();
    match value {
        Value::Object(map) => {
            for (name, entry) in map {
                match entry {
                    Value::Null => {}
                    Value::Object(nested) => {
                        for (sub, inner) in nested {
                            if !inner.is_null() {
                                metrics.push(scalar_metric(Some(name), sub, inner));
                            }
                        }
                    }
                    other => metrics.push(scalar_metric(None, name, other)),
                }
            }
        }
        Value::Array(entries) => {
            for (i, entry) in entries.iter().enumerate() {
                let object = entry
                    .as_object()
                    .ok_or_else(|| wrong_type(&format!("metrics[{}]", i), "an object", entry))?;
                let name = object
                    .get("name")
                    .and_then(Value::as_str)
                    .ok_or_else(|| InvalidPayloadError::new(format!("metrics[{}] has no name", i)))?;
                let raw = object.get("value").unwrap_or(&Value::Null);
                let mut metric = scalar_metric(None, name, raw);
                if let (Some(unit), Some(quantity)) = (object.get("unit").and_then(Value::as_str), &mut metric.quantity)
                {
                    if quantity.unit.is_empty() {
                        quantity.unit = unit.to_string();
                        metric.display = format!("{}{}", metric.display, unit);
                    }
                }
                metrics.push(metric);
            }
        }
        Value::Null => {}
        other => return Err(wrong_type("metrics", "a mapping or a list", other)),
    }
    Ok(metrics)
}

fn scalar_metric(group: Option<&str>, name: &str, value: &Value) -> Metric {
    Metric {
        group: group.map(str::to_string),
        name: name.to_string(),
        display: display_value(value),
        quantity: Quantity::parse(value),
    }
}

fn parse_categories(value: &Value) -> Result<Vec<Category>, InvalidPayloadError> {
    let mut categories = Vec::new();
    match value {
        Value::Array(entries) => {
            for (i, entry) in entries.iter().enumerate() {
                match entry {
                    Value::String(name) => categories.push(Category::named(name.clone())),
                    Value::Object(object) => {
                        let name = object
                            .get("name")
                            .and_then(Value::as_str)
                            .ok_or_else(|| InvalidPayloadError::new(format!("categories[{}] has no name", i)))?;
                        categories.push(Category {
                            name: name.to_string(),
                            items: match object.get("items") {
                                Some(items) => parse_strings(&format!("categories[{}].items", i), items)?,
                                None => Vec::new(),
                            },
                            weight: find_weight(object),
                        });
                    }
                    other => return Err(wrong_type(&format!("categories[{}]", i), "a string or an object", other)),
                }
            }
        }
        Value::Object(map) => {
            for (name, entry) in map {
                let category = match entry {
                    Value::Array(_) => Category {
                        name: name.clone(),
                        items: parse_strings(&format!("categories.{}", name), entry)?,
                        weight: None,
                    },
                    Value::Object(object) => Category {
                        name: name.clone(),
                        items: match object.get("items") {
                            Some(items) => parse_strings(&format!("categories.{}.items", name), items)?,
                            None => Vec::new(),
                        },
                        weight: find_weight(object),
                    },
                    other => Category {
                        name: name.clone(),
                        items: Vec::new(),
                        weight: Quantity::parse(other).map(|q| q.value),
                    },
                };
                categories.push(category);
            }
        }
        Value::Null => {}
        other => return Err(wrong_type("categories", "a list or a mapping", other)),
    }
    Ok(categories)
}

fn find_weight(object: &Map<String, Value>) -> Option<f64> {
    WEIGHT_KEYS
        .iter()
        .find_map(|key| object.get(*key).and_then(Quantity::parse))
        .map(|q| q.value)
}

fn parse_companies(value: &Value) -> Result<Vec<Company>, InvalidPayloadError> {
    let entries = match value {
        Value::Array(entries) => entries,
        Value::Null => return Ok(Vec::new()),
        other => return Err(wrong_type("companies", "a list", other)),
    };

    let mut companies = Vec::with_capacity(entries.len());
    for (i, entry) in entries.iter().enumerate() {
        let object = entry
            .as_object()
            .ok_or_else(|| wrong_type(&format!("companies[{}]", i), "an object", entry))?;
        let name = object
            .get("name")
            .and_then(Value::as_str)
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| InvalidPayloadError::new(format!("companies[{}] has no name", i)))?;

        let financial = object.get("financial_data").and_then(Value::as_object);
        let series = |key: &str| -> Result<YearSeries, InvalidPayloadError> {
            match financial.and_then(|f| f.get(key)) {
                None | Some(Value::Null) => Ok(YearSeries::new()),
                Some(Value::Object(years)) => Ok(years
                    .iter()
                    .filter_map(|(year, v)| Quantity::parse(v).map(|q| (year.clone(), q)))
                    .collect()),
                Some(other) => Err(wrong_type(
                    &format!("companies[{}].financial_data.{}", i, key),
                    "a mapping of year to value",
                    other,
                )),
            }
        };

        companies.push(Company {
            name: name.to_string(),
            revenue: series("revenue")?,
            adjusted_profit: series("adjusted_profit")?,
            store_count: object
                .get("operational_data")
                .and_then(|o| o.get("store_count"))
                .and_then(Quantity::parse),
        });
    }
    Ok(companies)
}

fn parse_keywords(value: &Value, payload: &mut Payload) -> Result<(), InvalidPayloadError> {
    let entries = match value {
        Value::Array(entries) => entries,
        Value::Null => return Ok(()),
        other => return Err(wrong_type("keywords", "a list", other)),
    };

    let mut unweighted = Vec::new();
    for (i, entry) in entries.iter().enumerate() {
        match entry {
            Value::String(term) => unweighted.push(Category::named(term.clone())),
            Value::Array(pair) if pair.len() == 2 && pair[0].is_string() => {
                let term = display_value(&pair[0]);
                match Quantity::parse(&pair[1]) {
                    Some(q) => payload.keywords.push(RankedTerm { term, weight: q.value }),
                    None => unweighted.push(Category::named(term)),
                }
            }
            Value::Object(object) => {
                let term = TERM_KEYS
                    .iter()
                    .find_map(|key| object.get(*key).and_then(Value::as_str))
                    .ok_or_else(|| InvalidPayloadError::new(format!("keywords[{}] has no term", i)))?;
                match find_weight(object) {
                    Some(weight) => payload.keywords.push(RankedTerm {
                        term: term.to_string(),
                        weight,
                    }),
                    None => unweighted.push(Category::named(term)),
                }
            }
            other => return Err(wrong_type(&format!("keywords[{}]", i), "a string, pair or object", other)),
        }
    }

    // Keywords without magnitudes can only be listed, never plotted.
    if !unweighted.is_empty() {
        payload.category_groups.push(CategoryGroup {
            key: "keywords".to_string(),
            title: "关键词".to_string(),
            measure: Measure::Count,
            categories: unweighted,
        });
    }
    Ok(())
}

fn parse_strings(field: &str, value: &Value) -> Result<Vec<String>, InvalidPayloadError> {
    match value {
        Value::Array(entries) => entries
            .iter()
            .enumerate()
            .filter(|(_, v)| !v.is_null())
            .map(|(i, entry)| match entry {
                Value::String(s) => Ok(s.clone()),
                Value::Number(_) | Value::Bool(_) => Ok(display_value(entry)),
                Value::Object(object) => object
                    .get("name")
                    .or_else(|| object.get("text"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| wrong_type(&format!("{}[{}]", field, i), "a string", entry)),
                other => Err(wrong_type(&format!("{}[{}]", field, i), "a string", other)),
            })
            .collect(),
        Value::String(s) => Ok(vec![s.clone()]),
        Value::Null => Ok(Vec::new()),
        other => Err(wrong_type(field, "a list of strings", other)),
    }
}

fn wrong_type(field: &str, expected: &str, found: &Value) -> InvalidPayloadError {
    InvalidPayloadError::new(format!("`{}` must be {}, found {}", field, expected, json_kind(found)))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

/// Human-readable form of a JSON value; strings lose their quotes.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary::SummaryBuilder;
    use serde_json::json;

    #[test]
    fn test_quantity_parse() {
        assert_eq!(Quantity::parse_str("5.49亿元"), Some(Quantity::new(5.49, "亿元")));
        assert_eq!(Quantity::parse_str("25%"), Some(Quantity::new(25.0, "%")));
        assert_eq!(Quantity::parse_str("1,234"), Some(Quantity::new(1234.0, "")));
        assert_eq!(Quantity::parse_str("¥300"), Some(Quantity::new(300.0, "")));
        assert_eq!(Quantity::parse_str("约五千"), None);
        assert_eq!(Quantity::parse(&json!(14196)), Some(Quantity::new(14196.0, "")));
        assert_eq!(Quantity::parse(&json!(true)), None);
    }

    #[test]
    fn test_resolve_rejects_non_objects() {
        let err = resolve(&json!([1, 2, 3])).unwrap_err();
        assert!(err.message().contains("found a list"));
        assert!(resolve(&Value::Null).is_err());
        assert!(resolve(&json!({})).is_err());
    }

    #[test]
    fn test_resolve_wrappers() {
        assert_eq!(
            resolve(&json!({"error": "timeout", "kind": "timeout"})).unwrap(),
            PayloadShape::Error("timeout".to_string())
        );
        assert_eq!(
            resolve(&json!({"content": "纯文本回答"})).unwrap(),
            PayloadShape::Content("纯文本回答".to_string())
        );
    }

    #[test]
    fn test_unrecognized_keys_are_listed() {
        let err = resolve(&json!({"overall": "正面", "intensity": 7})).unwrap_err();
        assert_eq!(err.message(), "no recognized keys (found: overall, intensity)");
    }

    #[test]
    fn test_wrong_section_type_is_invalid() {
        let err = resolve(&json!({"metrics": "lots"})).unwrap_err();
        assert!(err.message().contains("`metrics` must be"));
    }

    #[test]
    fn test_metrics_flat_and_nested_keep_order() {
        let shape = resolve(&json!({
            "metrics": {
                "门店数": "14196家",
                "营收": {"2023": "92.94亿元", "2024": 323},
                "备注": null
            }
        }))
        .unwrap();
        let PayloadShape::Structured(payload) = shape else {
            panic!("expected structured payload");
        };
        let ids: Vec<String> = payload.metrics.iter().map(Metric::point_id).collect();
        assert_eq!(ids, vec!["metric:门店数", "metric:营收/2023", "metric:营收/2024"]);
        assert_eq!(payload.metrics[0].quantity, Some(Quantity::new(14196.0, "家")));
        assert_eq!(payload.metrics[1].display, "92.94亿元");
    }

    #[test]
    fn test_categories_weights() {
        let shape = resolve(&json!({
            "categories": [{"name": "零食", "proportion": "60%"}, {"name": "饮料", "value": 40}, "其他"]
        }))
        .unwrap();
        let PayloadShape::Structured(payload) = shape else {
            panic!("expected structured payload");
        };
        let group = &payload.category_groups[0];
        assert_eq!(group.categories[0].weight, Some(60.0));
        assert_eq!(group.categories[1].weight, Some(40.0));
        assert_eq!(group.categories[2].weight, None);
        assert!(!group.is_weighted());
    }

    #[test]
    fn test_companies() {
        let shape = resolve(&json!({
            "companies": [{
                "name": "万辰集团",
                "financial_data": {"revenue": {"2024": 323, "2022": "5.49亿元"}},
                "operational_data": {"store_count": 14196}
            }]
        }))
        .unwrap();
        let PayloadShape::Structured(payload) = shape else {
            panic!("expected structured payload");
        };
        let company = &payload.companies[0];
        assert_eq!(company.revenue.keys().collect::<Vec<_>>(), vec!["2022", "2024"]);
        assert!(company.adjusted_profit.is_empty());
        assert_eq!(company.store_count, Some(Quantity::new(14196.0, "")));
        assert_eq!(company.point_id("revenue", Some("2024")), "company:万辰集团:revenue:2024");
    }

    #[test]
    fn test_nameless_company_is_invalid() {
        assert!(resolve(&json!({"companies": [{"financial_data": {}}]})).is_err());
    }

    #[test]
    fn test_entity_mapping_adds_distribution() {
        let shape = resolve(&json!({"entities": {"persons": ["张伟", "李娜"], "locations": ["上海"], "products": []}}))
            .unwrap();
        let PayloadShape::Structured(payload) = shape else {
            panic!("expected structured payload");
        };
        assert_eq!(payload.entities, vec!["张伟", "李娜", "上海"]);
        let group = &payload.category_groups[0];
        assert_eq!(group.key, "entity_distribution");
        assert!(group.is_weighted());
        assert_eq!(group.categories.len(), 2);
    }

    #[test]
    fn test_keywords_split_by_weight() {
        let shape = resolve(&json!({"keywords": [["零食", 12], {"word": "门店", "count": 5}, "加盟"]})).unwrap();
        let PayloadShape::Structured(payload) = shape else {
            panic!("expected structured payload");
        };
        assert_eq!(payload.keywords.len(), 2);
        assert_eq!(payload.keywords[1].weight, 5.0);
        assert_eq!(payload.category_groups[0].categories[0].name, "加盟");
    }

    #[test]
    fn test_from_summary() {
        let summary = SummaryBuilder::default().build("2023年，AI企业数量达到5000多家，同比增长25%。");
        let payload = Payload::from_summary(&summary);

        assert_eq!(payload.metrics[0].name, "文本长度");
        assert!(payload.metrics.iter().any(|m| m.name == "百分比" && m.display == "25%"));
        assert_eq!(payload.core_arguments.len(), 1);
        assert!(payload.sentiment.is_some());
        let extraction = payload
            .category_groups
            .iter()
            .find(|g| g.key == "data_extraction")
            .unwrap();
        assert!(extraction.is_weighted());
        assert_eq!(extraction.measure, Measure::Count);
    }

    #[test]
    fn test_empty_summary_payload_is_empty() {
        let payload = Payload::from_summary(&TextSummary::default());
        assert!(payload.category_groups.is_empty());
        assert!(payload.core_arguments.is_empty());
        assert!(!payload.is_empty(), "basic stats are always present");
    }
}

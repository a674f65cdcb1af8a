//! Advisory scan for placeholder-looking numbers in chart configurations.
//!
//! Generated charts sometimes carry round "filler" values (10, 20, … 90)
//! that never appeared in the material they were built from. A value from
//! the suspicious list is flagged unless the same literal can be found in
//! the source text or in the payload the chart was planned from.

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::planner::VisualizationPlan;

pub const DEFAULT_SUSPICIOUS_VALUES: [f64; 9] = [10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0, 90.0];

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DataAuthenticityReport {
    pub has_virtual_data: bool,
    pub warnings: Vec<String>,
    pub source_text_length: usize,
    pub result_length: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticityChecker {
    pub suspicious_values: Vec<f64>,
}

impl Default for AuthenticityChecker {
    fn default() -> Self {
        Self {
            suspicious_values: DEFAULT_SUSPICIOUS_VALUES.to_vec(),
        }
    }
}

impl AuthenticityChecker {
    pub fn new(suspicious_values: Vec<f64>) -> Self {
        Self { suspicious_values }
    }

    /// Check every chart in `plan`. `payload_text` is the serialized payload, when there is one.
    pub fn check(&self, source_text: &str, payload_text: Option<&str>, plan: &VisualizationPlan) -> DataAuthenticityReport {
        let mut warnings = Vec::new();
        for chart in plan.charts() {
            warnings.extend(self.scan_config(&chart.chart_id, &chart.config, source_text, payload_text));
        }

        let result_length = serde_json::to_string(plan).map(|s| s.chars().count()).unwrap_or_default();
        if !warnings.is_empty() {
            warn!(count = warnings.len(), "charts contain untraceable placeholder values");
        }
        DataAuthenticityReport {
            has_virtual_data: !warnings.is_empty(),
            warnings,
            source_text_length: source_text.chars().count(),
            result_length,
        }
    }

    /// Warnings for one chart configuration. Only `series[*].data` is scanned.
    pub fn scan_config(&self, chart_id: &str, config: &Value, source_text: &str, payload_text: Option<&str>) -> Vec<String> {
        let mut values = Vec::new();
        if let Some(series) = config.get("series").and_then(Value::as_array) {
            for entry in series {
                if let Some(data) = entry.get("data") {
                    collect_numbers(data, &mut values);
                }
            }
        }

        let mut warnings = Vec::new();
        for value in values {
            if !self.is_suspicious(value) {
                continue;
            }
            let literal = format_literal(value);
            let traceable = contains_number(source_text, &literal)
                || payload_text.is_some_and(|payload| contains_number(payload, &literal));
            if !traceable {
                let warning = format!("图表 {} 包含疑似占位数值 {}，未在原始数据中找到", chart_id, literal);
                if !warnings.contains(&warning) {
                    warnings.push(warning);
                }
            }
        }
        warnings
    }

    fn is_suspicious(&self, value: f64) -> bool {
        self.suspicious_values.iter().any(|s| (s - value).abs() < 1e-9)
    }
}

fn collect_numbers(value: &Value, out: &mut Vec<f64>) {
    match value {
        Value::Number(n) => out.extend(n.as_f64()),
        Value::Array(items) => items.iter().for_each(|item| collect_numbers(item, out)),
        // Pie and radar data points carry their number under `value`.
        Value::Object(map) => {
            if let Some(inner) = map.get("value") {
                collect_numbers(inner, out);
            }
        }
        _ => {}
    }
}

fn format_literal(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// Whether `literal` occurs in `haystack` as a whole number, not inside a longer one.
/// Trailing zero decimals count as the same number (`30.0` matches `30`).
fn contains_number(haystack: &str, literal: &str) -> bool {
    let is_part = |c: Option<char>| c.is_some_and(|c| c.is_ascii_digit() || c == '.');
    haystack.match_indices(literal).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        !is_part(before) && !is_part(skip_zero_decimals(&haystack[start + literal.len()..]).chars().next())
    })
}

/// Strip a `.000` style suffix. Anything else is returned unchanged.
fn skip_zero_decimals(rest: &str) -> &str {
    let Some(fraction) = rest.strip_prefix('.') else {
        return rest;
    };
    let zeros = fraction.len() - fraction.trim_start_matches('0').len();
    if zeros == 0 { rest } else { &fraction[zeros..] }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::VisualizationPlanner;
    use serde_json::json;

    #[test]
    fn test_contains_number_respects_boundaries() {
        assert!(contains_number("增长了20%", "20"));
        assert!(!contains_number("2023年", "20"));
        assert!(!contains_number("1.20亿", "20"));
        assert!(contains_number("20", "20"));
    }

    #[test]
    fn test_zero_decimals_match_whole_number() {
        assert!(contains_number("\"proportion\":30.0}", "30"));
        assert!(contains_number("30.00%", "30"));
        assert!(contains_number("12.50", "12.5"));
        assert!(!contains_number("30.05", "30"));
        assert!(!contains_number("30.0.1", "30"));
        assert!(!contains_number("30.", "30"));

        let raw = r#"{"categories":[{"name":"甲","proportion":30.0},{"name":"乙","proportion":70.5}]}"#;
        let plan = VisualizationPlanner::default().plan_str(raw);
        let report = AuthenticityChecker::default().check("", Some(raw), &plan);
        assert!(!report.has_virtual_data, "{:?}", report.warnings);
    }

    #[test]
    fn test_flags_untraceable_placeholder() {
        let config = json!({"series": [{"data": [{"name": "A", "value": 30}, {"name": "B", "value": 70}]}]});
        let warnings = AuthenticityChecker::default().scan_config("share_pie", &config, "A 占三成", None);
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("30"));
    }

    #[test]
    fn test_traceable_value_is_not_flagged() {
        let config = json!({"series": [{"data": [30, 12.5]}]});
        let checker = AuthenticityChecker::default();
        assert!(checker.scan_config("c", &config, "占比30%", None).is_empty());
        assert!(checker.scan_config("c", &config, "", Some("{\"share\": 30}")).is_empty());
    }

    #[test]
    fn test_axis_values_are_ignored() {
        let config = json!({"yAxis": {"max": 90}, "series": [{"data": [1, 2]}]});
        assert!(AuthenticityChecker::default().scan_config("c", &config, "", None).is_empty());
    }

    #[test]
    fn test_report_over_plan() {
        let payload = json!({"categories": [{"name": "甲", "proportion": 40}, {"name": "乙", "proportion": 60}]});
        let plan = VisualizationPlanner::default().plan_value(&payload);

        let clean = AuthenticityChecker::default().check("甲乙", Some(&payload.to_string()), &plan);
        assert!(!clean.has_virtual_data);
        assert_eq!(clean.source_text_length, 2);
        assert!(clean.result_length > 0);

        let flagged = AuthenticityChecker::default().check("甲乙", None, &plan);
        assert!(flagged.has_virtual_data);
        assert_eq!(flagged.warnings.len(), 2);
    }

    #[test]
    fn test_custom_denylist() {
        let config = json!({"series": [{"data": [42]}]});
        let checker = AuthenticityChecker::new(vec![42.0]);
        assert_eq!(checker.scan_config("c", &config, "", None).len(), 1);
    }
}

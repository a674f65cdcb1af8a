//! ECharts-style option builders.
//!
//! Every option produced here is plain data: titles, axes, series values and
//! colors. No formatter callbacks or other executable fragments are embedded.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Series colors, picked per name by [`color_for`].
pub const CHART_PALETTE: &[&str] = &[
    "#5470C6", // Blue
    "#91CC75", // Green
    "#FAC858", // Yellow
    "#EE6666", // Red
    "#73C0DE", // Sky
    "#3BA272", // Teal
    "#FC8452", // Orange
    "#9A60B4", // Purple
    "#EA7CCC", // Pink
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Bar,
    Line,
    Pie,
    Scatter,
    Radar,
}

impl ChartKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChartKind::Bar => "bar",
            ChartKind::Line => "line",
            ChartKind::Pie => "pie",
            ChartKind::Scatter => "scatter",
            ChartKind::Radar => "radar",
        }
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Stable color for a series or category name (FNV-1a over the UTF-8 bytes).
pub fn color_for(name: &str) -> &'static str {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in name.as_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    CHART_PALETTE[(hash % CHART_PALETTE.len() as u64) as usize]
}

/// Integers are written without a trailing `.0`.
pub fn number(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        json!(value as i64)
    } else {
        json!(value)
    }
}

/// One named series over a shared category axis. `None` marks a missing point.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

fn title(text: &str) -> Value {
    json!({"text": text, "left": "center"})
}

/// Several series sharing one x axis, as bars or lines.
pub fn series_option(title_text: &str, kind: ChartKind, x_labels: &[String], y_name: &str, series: &[Series]) -> Value {
    let series: Vec<Value> = series
        .iter()
        .map(|s| {
            let data: Vec<Value> = s.values.iter().map(|v| v.map(number).unwrap_or(Value::Null)).collect();
            let mut entry = json!({
                "name": s.name,
                "type": kind.as_str(),
                "data": data,
                "itemStyle": {"color": color_for(&s.name)},
            });
            if kind == ChartKind::Line {
                entry["connectNulls"] = json!(false);
            }
            entry
        })
        .collect();

    json!({
        "title": title(title_text),
        "tooltip": {"trigger": "axis"},
        "legend": {"data": series.iter().map(|s| s["name"].clone()).collect::<Vec<_>>(), "top": "bottom"},
        "xAxis": {"type": "category", "data": x_labels},
        "yAxis": {"type": "value", "name": y_name},
        "series": series,
    })
}

/// One value per category, as a vertical bar chart or a pie.
pub fn category_option(title_text: &str, kind: ChartKind, items: &[(String, f64)], value_name: &str) -> Value {
    let data: Vec<Value> = items
        .iter()
        .map(|(name, value)| {
            json!({
                "name": name,
                "value": number(*value),
                "itemStyle": {"color": color_for(name)},
            })
        })
        .collect();

    match kind {
        ChartKind::Pie => json!({
            "title": title(title_text),
            "tooltip": {"trigger": "item"},
            "legend": {"orient": "vertical", "left": "left"},
            "series": [{
                "name": value_name,
                "type": "pie",
                "radius": "55%",
                "data": data,
            }],
        }),
        _ => json!({
            "title": title(title_text),
            "tooltip": {"trigger": "axis"},
            "xAxis": {"type": "category", "data": items.iter().map(|(name, _)| name).collect::<Vec<_>>()},
            "yAxis": {"type": "value", "name": value_name},
            "series": [{
                "name": value_name,
                "type": kind.as_str(),
                "data": data,
            }],
        }),
    }
}

/// Horizontal bars, largest first from the top.
pub fn ranking_option(title_text: &str, items: &[(String, f64)], value_name: &str) -> Value {
    json!({
        "title": title(title_text),
        "tooltip": {"trigger": "axis"},
        "grid": {"containLabel": true},
        "xAxis": {"type": "value", "name": value_name},
        "yAxis": {
            "type": "category",
            "inverse": true,
            "data": items.iter().map(|(name, _)| name).collect::<Vec<_>>(),
        },
        "series": [{
            "name": value_name,
            "type": "bar",
            "data": items.iter().map(|(_, v)| number(*v)).collect::<Vec<_>>(),
            "itemStyle": {"color": color_for(title_text)},
        }],
    })
}

/// Several profiles over the same set of dimensions.
pub fn radar_option(title_text: &str, indicators: &[String], profiles: &[(String, Vec<f64>)]) -> Value {
    json!({
        "title": title(title_text),
        "tooltip": {"trigger": "item"},
        "legend": {"data": profiles.iter().map(|(name, _)| name).collect::<Vec<_>>(), "top": "bottom"},
        "radar": {"indicator": indicators.iter().map(|name| json!({"name": name})).collect::<Vec<_>>()},
        "series": [{
            "type": "radar",
            "data": profiles
                .iter()
                .map(|(name, values)| json!({
                    "name": name,
                    "value": values.iter().map(|v| number(*v)).collect::<Vec<_>>(),
                    "itemStyle": {"color": color_for(name)},
                }))
                .collect::<Vec<_>>(),
        }],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_is_stable() {
        assert_eq!(color_for("万辰集团"), color_for("万辰集团"));
        assert!(CHART_PALETTE.contains(&color_for("")));
    }

    #[test]
    fn test_number_formatting() {
        assert_eq!(number(5000.0), json!(5000));
        assert_eq!(number(5.49), json!(5.49));
        assert_eq!(number(-3.0), json!(-3));
    }

    #[test]
    fn test_series_option_keeps_missing_points_null() {
        let years = vec!["2022".to_string(), "2023".to_string()];
        let option = series_option(
            "营收",
            ChartKind::Bar,
            &years,
            "亿元",
            &[Series {
                name: "A".to_string(),
                values: vec![None, Some(92.94)],
            }],
        );
        assert_eq!(option["series"][0]["data"], json!([null, 92.94]));
        assert_eq!(option["series"][0]["type"], "bar");
        assert_eq!(option["xAxis"]["data"], json!(["2022", "2023"]));
        assert!(option["series"][0].get("connectNulls").is_none());
    }

    #[test]
    fn test_pie_option() {
        let items = vec![("人名".to_string(), 3.0), ("地名".to_string(), 1.0)];
        let option = category_option("实体", ChartKind::Pie, &items, "数量");
        assert_eq!(option["series"][0]["type"], "pie");
        assert_eq!(option["series"][0]["data"][0]["value"], json!(3));
        assert!(option.get("xAxis").is_none());
    }

    #[test]
    fn test_radar_option() {
        let indicators = vec!["速度".to_string(), "成本".to_string(), "质量".to_string()];
        let option = radar_option("对比", &indicators, &[("甲".to_string(), vec![1.0, 2.0, 3.5])]);
        assert_eq!(option["radar"]["indicator"].as_array().unwrap().len(), 3);
        assert_eq!(option["series"][0]["data"][0]["value"], json!([1, 2, 3.5]));
    }

    #[test]
    fn test_kind_serialization() {
        assert_eq!(serde_json::to_string(&ChartKind::Radar).unwrap(), "\"radar\"");
        assert_eq!(ChartKind::Line.to_string(), "line");
    }
}

//! HTML rendering of visualization plans.
//!
//! Cards become escaped HTML blocks and charts become ECharts embeds whose
//! option object is the chart's `config`. A failure to render one item is
//! recorded and the remaining items are still rendered.
//!
//! # Example
//! ```rust
//! use infoviz::planner::VisualizationPlanner;
//! use infoviz::visualization::{HtmlRenderer, Renderer};
//!
//! let plan = VisualizationPlanner::default().plan_str(r#"{"entities": ["北京", "上海"]}"#);
//! let renderer = HtmlRenderer::default();
//! let html: Vec<String> = plan
//!     .visualizations
//!     .iter()
//!     .filter_map(|item| renderer.render_item(item).ok())
//!     .collect();
//! assert!(html.concat().contains("北京"));
//! ```

use std::collections::BTreeSet;

use html_escape::{encode_double_quoted_attribute, encode_text};
use serde_json::Value;
use tracing::warn;

use crate::planner::{AnalysisAngle, Card, Chart, VisualizationItem};

pub const ECHARTS_CDN: &str = "https://cdn.jsdelivr.net/npm/echarts@5/dist/echarts.min.js";

/// Accent colors, one per analysis angle.
const PALETTE: &[&str] = &[
    "#D2E3FC", // Light Blue
    "#C8E6C9", // Light Green
    "#FEF0C3", // Light Yellow
    "#FFDDBE", // Light Orange
    "#EADDFF", // Light Purple
    "#C4E9E4", // Light Teal
    "#FCE4EC", // Light Pink
    "#E8EAED", // Very Light Grey
    "#DDE8E8", // Pale Cyan
    "#F9DEDC", // Light Red
];

const VISUALIZATION_CSS: &str = r#"
<style>
body { font-family: -apple-system, "PingFang SC", "Microsoft YaHei", sans-serif; background: #fafafa; margin: 0; padding: 24px; }
.iv-header { margin-bottom: 16px; }
.iv-header h1 { font-size: 22px; margin: 0 0 4px 0; }
.iv-header .iv-meta { color: #666; font-size: 12px; }
.iv-section { margin-bottom: 32px; }
.iv-section h2 { font-size: 18px; border-bottom: 1px solid #e0e0e0; padding-bottom: 6px; }
.iv-grid { display: grid; grid-template-columns: repeat(auto-fill, minmax(420px, 1fr)); gap: 16px; }
.iv-card, .iv-chart-box {
  background: #fff;
  border-radius: 6px;
  border-left: 6px solid #E8EAED;
  box-shadow: 0 1px 3px rgba(0,0,0,0.12);
  padding: 12px 16px;
}
.iv-card h3, .iv-chart-box h3 { font-size: 15px; margin: 0 0 8px 0; }
.iv-card p { margin: 0 0 8px 0; line-height: 1.6; }
.iv-card ul { margin: 0 0 8px 0; padding-left: 20px; }
.iv-card .iv-insights li { color: #555; }
.iv-card.iv-error { border-left-color: #d93025; background: #fdecea; }
.iv-chart { width: 100%; }
.iv-legend { font-size: 13px; margin-bottom: 16px; }
.iv-legend-item { display: inline-block; margin-right: 8px; padding: 2px 6px; border-radius: 3px; }
.iv-errors { color: #d93025; font-size: 13px; }
</style>"#;

#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    #[error("Chart {chart_id} has an invalid configuration: {reason}")]
    InvalidConfig { chart_id: String, reason: String },

    #[error("Card {0} has no content")]
    EmptyCard(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Turns one visualization item into a displayable fragment.
pub trait Renderer {
    fn render_item(&self, item: &VisualizationItem) -> Result<String, RenderError>;
}

#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub page_title: String,
    pub echarts_src: String,
    pub chart_height: u32,
    pub show_legend: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            page_title: "文本分析可视化".to_string(),
            echarts_src: ECHARTS_CDN.to_string(),
            chart_height: 360,
            show_legend: true,
        }
    }
}

/// A rendered page plus the items that could not be rendered.
#[derive(Debug, Clone, Default)]
pub struct RenderOutcome {
    pub html: String,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct HtmlRenderer {
    pub options: RenderOptions,
}

impl HtmlRenderer {
    pub fn new(options: RenderOptions) -> Self {
        Self { options }
    }

    /// Render a full page with one section per named item set.
    pub fn render_page<'a, I>(&self, sections: I) -> RenderOutcome
    where
        I: IntoIterator<Item = (&'a str, &'a [VisualizationItem])>,
    {
        let mut body = String::new();
        let mut errors = Vec::new();
        let mut angles = BTreeSet::new();

        for (name, items) in sections {
            angles.extend(items.iter().map(VisualizationItem::angle));
            let (section_html, section_errors) = self.render_section(name, items);
            body.push_str(&section_html);
            errors.extend(section_errors);
        }

        let legend_html = if self.options.show_legend {
            build_legend_html(&angles)
        } else {
            String::new()
        };
        let errors_html = build_errors_html(&errors);

        let html = format!(
            r#"<!DOCTYPE html>
<html lang="zh-CN">
<head>
<meta charset="utf-8">
<title>{title}</title>
<script src="{src}"></script>
{css}
</head>
<body>
<div class="iv-header"><h1>{title}</h1></div>
{legend}
{errors}
{body}
</body>
</html>
"#,
            title = encode_text(&self.options.page_title),
            src = encode_double_quoted_attribute(&self.options.echarts_src),
            css = VISUALIZATION_CSS,
            legend = legend_html,
            errors = errors_html,
            body = body,
        );

        RenderOutcome { html, errors }
    }

    /// Render one item set. Items that fail are skipped and reported as `name/item_id: reason`.
    pub fn render_section(&self, name: &str, items: &[VisualizationItem]) -> (String, Vec<String>) {
        let mut fragments = Vec::with_capacity(items.len());
        let mut errors = Vec::new();

        for (index, item) in items.iter().enumerate() {
            let rendered = match item {
                VisualizationItem::Card(card) => self.render_card(card),
                VisualizationItem::Chart(chart) => self.render_chart(chart, &format!("iv-{}-{}", dom_key(name), index)),
            };
            match rendered {
                Ok(html) => fragments.push(html),
                Err(e) => {
                    warn!(section = name, item = item.id(), error = %e, "failed to render visualization item");
                    errors.push(format!("{}/{}: {}", name, item.id(), e));
                }
            }
        }

        let html = format!(
            r#"<div class="iv-section"><h2>{}</h2><div class="iv-grid">{}</div></div>"#,
            encode_text(&section_title(name)),
            fragments.join("\n")
        );
        (html, errors)
    }

    fn render_card(&self, card: &Card) -> Result<String, RenderError> {
        if card.title.trim().is_empty() && card.summary.trim().is_empty() && card.key_points.is_empty() {
            return Err(RenderError::EmptyCard(card.card_id.clone()));
        }

        let class = if card.is_error() { "iv-card iv-error" } else { "iv-card" };
        let mut html = format!(
            r#"<div class="{}" style="border-left-color:{}" data-id="{}"><h3>{}</h3>"#,
            class,
            angle_color(card.angle),
            encode_double_quoted_attribute(&card.card_id),
            encode_text(&card.title)
        );
        if !card.summary.is_empty() {
            html.push_str(&format!("<p>{}</p>", encode_text(&card.summary)));
        }
        html.push_str(&build_list_html(&card.key_points, "iv-key-points"));
        html.push_str(&build_list_html(&card.insights, "iv-insights"));
        html.push_str("</div>");
        Ok(html)
    }

    fn render_chart(&self, chart: &Chart, dom_id: &str) -> Result<String, RenderError> {
        let invalid = |reason: &str| RenderError::InvalidConfig {
            chart_id: chart.chart_id.clone(),
            reason: reason.to_string(),
        };
        let Value::Object(config) = &chart.config else {
            return Err(invalid("config is not an object"));
        };
        match config.get("series").and_then(Value::as_array) {
            Some(series) if !series.is_empty() => {}
            _ => return Err(invalid("no series")),
        }

        // `</` would end the script element early.
        let option_json = serde_json::to_string(&chart.config)?.replace("</", "<\\/");

        Ok(format!(
            r#"<div class="iv-chart-box" style="border-left-color:{color}" data-id="{id}"><h3>{title}</h3>
<div class="iv-chart" id="{dom_id}" style="height:{height}px"></div>
<script>
  (function() {{
    var chart = echarts.init(document.getElementById('{dom_id}'));
    chart.setOption({option});
    window.addEventListener('resize', function() {{ chart.resize(); }});
  }})();
</script></div>"#,
            color = angle_color(chart.angle),
            id = encode_double_quoted_attribute(&chart.chart_id),
            title = encode_text(&chart.title),
            dom_id = dom_id,
            height = self.options.chart_height,
            option = option_json,
        ))
    }
}

impl Renderer for HtmlRenderer {
    fn render_item(&self, item: &VisualizationItem) -> Result<String, RenderError> {
        match item {
            VisualizationItem::Card(card) => self.render_card(card),
            VisualizationItem::Chart(chart) => self.render_chart(chart, &format!("iv-{}", dom_key(&chart.chart_id))),
        }
    }
}

fn angle_color(angle: AnalysisAngle) -> &'static str {
    PALETTE[angle_index(angle) % PALETTE.len()]
}

fn angle_index(angle: AnalysisAngle) -> usize {
    match angle {
        AnalysisAngle::Overview => 0,
        AnalysisAngle::KeyFigures => 1,
        AnalysisAngle::Entities => 2,
        AnalysisAngle::TrendOverTime => 3,
        AnalysisAngle::CategoryComparison => 4,
        AnalysisAngle::MagnitudeRanking => 5,
        AnalysisAngle::Composition => 6,
        AnalysisAngle::Profile => 7,
        AnalysisAngle::SentimentBalance => 8,
        AnalysisAngle::Notice => 9,
    }
}

fn angle_label(angle: AnalysisAngle) -> &'static str {
    match angle {
        AnalysisAngle::Overview => "概览",
        AnalysisAngle::KeyFigures => "关键数据",
        AnalysisAngle::Entities => "实体",
        AnalysisAngle::TrendOverTime => "趋势",
        AnalysisAngle::CategoryComparison => "对比",
        AnalysisAngle::MagnitudeRanking => "排名",
        AnalysisAngle::Composition => "构成",
        AnalysisAngle::Profile => "画像",
        AnalysisAngle::SentimentBalance => "情感",
        AnalysisAngle::Notice => "提示",
    }
}

fn section_title(name: &str) -> String {
    match name {
        "local" => "本地分析".to_string(),
        "external" => "模型分析".to_string(),
        other => other.to_string(),
    }
}

/// ASCII-only key usable inside a DOM id.
fn dom_key(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect()
}

fn build_list_html(lines: &[String], class: &str) -> String {
    if lines.is_empty() {
        return String::new();
    }
    let items: String = lines
        .iter()
        .map(|line| format!("<li>{}</li>", encode_text(line)))
        .collect();
    format!(r#"<ul class="{}">{}</ul>"#, class, items)
}

fn build_legend_html(angles: &BTreeSet<AnalysisAngle>) -> String {
    if angles.is_empty() {
        return String::new();
    }
    let items: Vec<String> = angles
        .iter()
        .map(|angle| {
            format!(
                r#"<span class="iv-legend-item" style="background-color:{}">{}</span>"#,
                angle_color(*angle),
                angle_label(*angle)
            )
        })
        .collect();
    format!(
        r#"<div class="iv-legend">分析角度: {}</div>"#,
        items.join(" ")
    )
}

fn build_errors_html(errors: &[String]) -> String {
    if errors.is_empty() {
        return String::new();
    }
    let items: String = errors
        .iter()
        .map(|e| format!("<li>{}</li>", encode_text(e)))
        .collect();
    format!(r#"<div class="iv-errors"><strong>渲染失败:</strong><ul>{}</ul></div>"#, items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charts::ChartKind;
    use crate::planner::error_plan;
    use serde_json::json;

    fn card(id: &str, title: &str) -> VisualizationItem {
        VisualizationItem::Card(Card {
            card_id: id.to_string(),
            title: title.to_string(),
            summary: "营收<增长>".to_string(),
            key_points: vec!["A & B".to_string()],
            insights: vec![],
            angle: AnalysisAngle::Overview,
            data_points: vec![],
        })
    }

    fn chart(id: &str, config: Value) -> VisualizationItem {
        VisualizationItem::Chart(Chart {
            chart_id: id.to_string(),
            title: "营收对比".to_string(),
            chart_kind: ChartKind::Bar,
            config,
            angle: AnalysisAngle::CategoryComparison,
            data_points: vec![],
        })
    }

    #[test]
    fn test_card_is_escaped() {
        let html = HtmlRenderer::default().render_item(&card("summary_card", "概览")).unwrap();
        assert!(html.contains("营收&lt;增长&gt;"));
        assert!(html.contains("A &amp; B"));
        assert!(!html.contains("iv-insights"));
    }

    #[test]
    fn test_chart_embeds_option() {
        let config = json!({"title": {"text": "</script>"}, "series": [{"type": "bar", "data": [1, 2]}]});
        let html = HtmlRenderer::default().render_item(&chart("revenue_comparison", config)).unwrap();
        assert!(html.contains("echarts.init"));
        assert!(html.contains("\"data\":[1,2]"));
        assert!(html.contains("<\\/script>"));
        assert!(html.contains("id=\"iv-revenue-comparison\""));
    }

    #[test]
    fn test_invalid_chart_is_reported() {
        let err = HtmlRenderer::default()
            .render_item(&chart("broken", json!({"series": []})))
            .unwrap_err();
        assert!(matches!(err, RenderError::InvalidConfig { ref chart_id, .. } if chart_id == "broken"));
    }

    #[test]
    fn test_one_failure_does_not_stop_section() {
        let items = vec![
            chart("broken", json!("not an object")),
            card("summary_card", "概览"),
            chart("ok", json!({"series": [{"data": [5]}]})),
        ];
        let (html, errors) = HtmlRenderer::default().render_section("local", &items);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("local/broken:"));
        assert!(html.contains("data-id=\"summary_card\""));
        assert!(html.contains("data-id=\"ok\""));
        assert!(html.contains("本地分析"));
    }

    #[test]
    fn test_page_has_legend_and_errors() {
        let local = vec![card("summary_card", "概览")];
        let external = vec![chart("broken", json!({}))];
        let outcome = HtmlRenderer::default().render_page([("local", local.as_slice()), ("external", external.as_slice())]);
        assert_eq!(outcome.errors.len(), 1);
        assert!(outcome.html.starts_with("<!DOCTYPE html>"));
        assert!(outcome.html.contains(ECHARTS_CDN));
        assert!(outcome.html.contains("iv-legend"));
        assert!(outcome.html.contains("渲染失败"));
    }

    #[test]
    fn test_error_card_styling() {
        let plan = error_plan("bad payload");
        let html = HtmlRenderer::default().render_item(&plan.visualizations[0]).unwrap();
        assert!(html.contains("iv-card iv-error"));
    }

    #[test]
    fn test_empty_card_fails() {
        let item = VisualizationItem::Card(Card {
            card_id: "blank".to_string(),
            title: " ".to_string(),
            summary: String::new(),
            key_points: vec![],
            insights: vec![],
            angle: AnalysisAngle::Notice,
            data_points: vec![],
        });
        assert!(matches!(
            HtmlRenderer::default().render_item(&item),
            Err(RenderError::EmptyCard(_))
        ));
    }

    #[test]
    fn test_legend_empty() {
        assert_eq!(build_legend_html(&BTreeSet::new()), "");
    }

    #[test]
    fn test_options_default() {
        let options = RenderOptions::default();
        assert_eq!(options.chart_height, 360);
        assert!(options.show_legend);
    }
}

//! Visualization planner.
//!
//! Maps a [`Payload`] to an ordered list of cards and charts in two passes.
//! The claim pass walks the candidate visualizations in priority order
//! (charts before cards) and lets each one take only data points no earlier
//! item has used. The arrange pass then orders the survivors so the same
//! analysis angle is not shown twice in a row while another angle is still
//! waiting.

use std::collections::{BTreeSet, HashSet};

use itertools::Itertools;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::charts::{self, ChartKind, Series};
use crate::payload::{self, Company, Measure, Metric, Payload, PayloadShape, YearSeries};
use crate::summary::TextSummary;
use crate::tokenizer;

pub const DEFAULT_MAX_KEY_POINTS: usize = 5;
pub const DEFAULT_MAX_INSIGHTS: usize = 3;

const PLAN_DESCRIPTION: &str = "基于数据结构生成的可视化展示（卡片 + ECharts 图表）";
const ERROR_DESCRIPTION: &str = "数据无法解析，返回错误提示卡片";
const EMPTY_DESCRIPTION: &str = "输入为空，没有可视化内容";
const CONTENT_SUMMARY_CHARS: usize = 200;

lazy_static! {
    static ref YEAR_KEY_REGEX: Regex = Regex::new(r"^\d{4}年?$").unwrap();
    static ref CODE_FENCE_REGEX: Regex = Regex::new(r"(?s)^```[A-Za-z]*\s*\n?(.*?)\n?```$").unwrap();
}

/// Coarse label for what a visualization says about the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisAngle {
    Overview,
    KeyFigures,
    Entities,
    TrendOverTime,
    CategoryComparison,
    MagnitudeRanking,
    Composition,
    Profile,
    SentimentBalance,
    Notice,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Card {
    pub card_id: String,
    pub title: String,
    pub summary: String,
    pub key_points: Vec<String>,
    pub insights: Vec<String>,
    pub angle: AnalysisAngle,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub data_points: Vec<String>,
}

impl Card {
    pub fn is_error(&self) -> bool {
        self.card_id == "error_card"
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chart {
    pub chart_id: String,
    pub title: String,
    pub chart_kind: ChartKind,
    pub config: Value,
    pub angle: AnalysisAngle,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub data_points: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum VisualizationItem {
    Card(Card),
    Chart(Chart),
}

impl VisualizationItem {
    pub fn id(&self) -> &str {
        match self {
            VisualizationItem::Card(card) => &card.card_id,
            VisualizationItem::Chart(chart) => &chart.chart_id,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            VisualizationItem::Card(card) => &card.title,
            VisualizationItem::Chart(chart) => &chart.title,
        }
    }

    pub fn angle(&self) -> AnalysisAngle {
        match self {
            VisualizationItem::Card(card) => card.angle,
            VisualizationItem::Chart(chart) => chart.angle,
        }
    }

    /// Data points this item shows as its primary content.
    pub fn data_points(&self) -> &[String] {
        match self {
            VisualizationItem::Card(card) => &card.data_points,
            VisualizationItem::Chart(chart) => &chart.data_points,
        }
    }

    pub fn as_card(&self) -> Option<&Card> {
        match self {
            VisualizationItem::Card(card) => Some(card),
            VisualizationItem::Chart(_) => None,
        }
    }

    pub fn as_chart(&self) -> Option<&Chart> {
        match self {
            VisualizationItem::Chart(chart) => Some(chart),
            VisualizationItem::Card(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisualizationPlan {
    pub visualizations: Vec<VisualizationItem>,
    pub total_items: usize,
    pub description: String,
}

impl VisualizationPlan {
    fn new(visualizations: Vec<VisualizationItem>, description: &str) -> Self {
        Self {
            total_items: visualizations.len(),
            visualizations,
            description: description.to_string(),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), EMPTY_DESCRIPTION)
    }

    pub fn is_empty(&self) -> bool {
        self.visualizations.is_empty()
    }

    pub fn charts(&self) -> impl Iterator<Item = &Chart> {
        self.visualizations.iter().filter_map(VisualizationItem::as_chart)
    }

    pub fn cards(&self) -> impl Iterator<Item = &Card> {
        self.visualizations.iter().filter_map(VisualizationItem::as_card)
    }

    /// Some(message) when the plan is the single fallback error card.
    pub fn error(&self) -> Option<&str> {
        match self.visualizations.as_slice() {
            [VisualizationItem::Card(card)] if card.is_error() => Some(card.summary.as_str()),
            _ => None,
        }
    }
}

/// Used data points and ids for one planning run.
#[derive(Debug, Default)]
pub struct PlanningLedger {
    used_points: HashSet<String>,
    used_ids: HashSet<String>,
}

impl PlanningLedger {
    pub fn is_used(&self, point: &str) -> bool {
        self.used_points.contains(point)
    }

    pub fn claim<I>(&mut self, points: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.used_points.extend(points);
    }

    /// `base`, or `base_2`, `base_3`… if already taken in this run.
    pub fn unique_id(&mut self, base: &str) -> String {
        let mut candidate = base.to_string();
        let mut n = 2;
        while !self.used_ids.insert(candidate.clone()) {
            candidate = format!("{}_{}", base, n);
            n += 1;
        }
        candidate
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannerOptions {
    pub max_key_points: usize,
    pub max_insights: usize,
}

impl Default for PlannerOptions {
    fn default() -> Self {
        Self {
            max_key_points: DEFAULT_MAX_KEY_POINTS,
            max_insights: DEFAULT_MAX_INSIGHTS,
        }
    }
}

/// Plans are built fresh per call; nothing carries over between runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct VisualizationPlanner {
    pub options: PlannerOptions,
}

struct Candidate {
    title: String,
    line: String,
    points: Vec<String>,
}

impl VisualizationPlanner {
    pub fn new(options: PlannerOptions) -> Self {
        Self { options }
    }

    pub fn plan_summary(&self, summary: &TextSummary) -> VisualizationPlan {
        self.plan_payload(&Payload::from_summary(summary))
    }

    /// Plan raw payload text. Only blank input gives an empty plan.
    pub fn plan_str(&self, raw: &str) -> VisualizationPlan {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return VisualizationPlan::empty();
        }
        match serde_json::from_str::<Value>(strip_code_fence(trimmed)) {
            Ok(value) => self.plan_value(&value),
            Err(e) => {
                debug!(error = %e, "payload is not valid JSON");
                error_plan(&format!("无法解析 JSON：{}", e))
            }
        }
    }

    pub fn plan_value(&self, value: &Value) -> VisualizationPlan {
        match payload::resolve(value) {
            Ok(shape) => self.plan_shape(shape),
            Err(e) => error_plan(e.message()),
        }
    }

    pub fn plan_shape(&self, shape: PayloadShape) -> VisualizationPlan {
        match shape {
            PayloadShape::Structured(payload) => self.plan_payload(&payload),
            PayloadShape::Content(content) => self.content_plan(&content),
            PayloadShape::Error(message) => error_plan(&message),
        }
    }

    pub fn plan_payload(&self, payload: &Payload) -> VisualizationPlan {
        let mut ledger = PlanningLedger::default();

        let mut charts = Vec::new();
        self.company_charts(payload, &mut ledger, &mut charts);
        self.metric_trend_charts(payload, &mut ledger, &mut charts);
        self.metric_radar(payload, &mut ledger, &mut charts);
        self.metric_comparison(payload, &mut ledger, &mut charts);
        self.keyword_ranking(payload, &mut ledger, &mut charts);
        self.category_charts(payload, &mut ledger, &mut charts);
        self.sentiment_chart(payload, &mut ledger, &mut charts);

        let mut cards = Vec::new();
        cards.extend(self.summary_card(payload, &mut ledger));
        cards.extend(self.key_data_card(payload, &mut ledger));
        cards.extend(self.entity_card(payload, &mut ledger));

        let items: Vec<VisualizationItem> = cards
            .into_iter()
            .map(VisualizationItem::Card)
            .chain(charts.into_iter().map(VisualizationItem::Chart))
            .collect();

        if items.is_empty() {
            return error_plan("数据中没有可以可视化的内容");
        }

        let arranged = arrange(items);
        debug!(
            items = arranged.len(),
            order = %arranged.iter().map(VisualizationItem::id).join(","),
            "planned visualizations"
        );
        VisualizationPlan::new(arranged, PLAN_DESCRIPTION)
    }

    fn company_charts(&self, payload: &Payload, ledger: &mut PlanningLedger, out: &mut Vec<Chart>) {
        if let Some((years, series, points, unit)) =
            company_series(&payload.companies, ledger, "revenue", |c| &c.revenue)
        {
            let config = charts::series_option("公司营收对比分析", ChartKind::Bar, &years, &unit, &series);
            out.push(chart(
                ledger,
                "revenue_comparison",
                "公司营收对比分析",
                ChartKind::Bar,
                AnalysisAngle::CategoryComparison,
                config,
                points,
            ));
        }

        if let Some((years, series, points, unit)) =
            company_series(&payload.companies, ledger, "adjusted_profit", |c| &c.adjusted_profit)
        {
            // A single year is a comparison, not a trend.
            let (id, title, kind, angle) = if years.len() >= 2 {
                ("profit_trend", "净利润趋势分析", ChartKind::Line, AnalysisAngle::TrendOverTime)
            } else {
                ("profit_comparison", "净利润对比分析", ChartKind::Bar, AnalysisAngle::CategoryComparison)
            };
            let config = charts::series_option(title, kind, &years, &unit, &series);
            out.push(chart(ledger, id, title, kind, angle, config, points));
        }

        let stores: Vec<(String, f64, String)> = payload
            .companies
            .iter()
            .filter_map(|c| {
                let point = c.point_id("store_count", None);
                match &c.store_count {
                    Some(q) if !ledger.is_used(&point) => Some((c.name.clone(), q.value, point)),
                    _ => None,
                }
            })
            .sorted_by(|a, b| b.1.total_cmp(&a.1))
            .collect();
        if !stores.is_empty() {
            let items: Vec<(String, f64)> = stores.iter().map(|(name, v, _)| (name.clone(), *v)).collect();
            let config = charts::ranking_option("门店数量排行", &items, "门店数");
            out.push(chart(
                ledger,
                "store_count_ranking",
                "门店数量排行",
                ChartKind::Bar,
                AnalysisAngle::MagnitudeRanking,
                config,
                stores.into_iter().map(|(_, _, point)| point).collect(),
            ));
        }
    }

    fn metric_trend_charts(&self, payload: &Payload, ledger: &mut PlanningLedger, out: &mut Vec<Chart>) {
        for (group, metrics) in metric_groups(payload, ledger) {
            if metrics.len() < 2 || !metrics.iter().all(|m| YEAR_KEY_REGEX.is_match(&m.name)) {
                continue;
            }
            let metrics: Vec<&Metric> = metrics.into_iter().sorted_by(|a, b| a.name.cmp(&b.name)).collect();
            let years: Vec<String> = metrics.iter().map(|m| m.name.clone()).collect();
            let series = [Series {
                name: group.to_string(),
                values: metrics.iter().map(|m| m.quantity.as_ref().map(|q| q.value)).collect(),
            }];
            let unit = first_unit(metrics.iter().filter_map(|m| m.quantity.as_ref()).map(|q| q.unit.as_str()));
            let title = format!("{}变化趋势", group);
            let config = charts::series_option(&title, ChartKind::Line, &years, &unit, &series);
            out.push(chart(
                ledger,
                "metric_trend",
                &title,
                ChartKind::Line,
                AnalysisAngle::TrendOverTime,
                config,
                metrics.iter().map(|m| m.point_id()).collect(),
            ));
        }
    }

    fn metric_radar(&self, payload: &Payload, ledger: &mut PlanningLedger, out: &mut Vec<Chart>) {
        let groups: Vec<(&str, Vec<&Metric>)> = metric_groups(payload, ledger)
            .into_iter()
            .filter(|(_, metrics)| !metrics.iter().all(|m| YEAR_KEY_REGEX.is_match(&m.name)))
            .collect();
        let Some((_, first)) = groups.first() else {
            return;
        };

        // Only dimensions every profile has a number for.
        let indicators: Vec<String> = first
            .iter()
            .map(|m| m.name.clone())
            .filter(|name| groups.iter().all(|(_, metrics)| metrics.iter().any(|m| &m.name == name)))
            .collect();
        if indicators.len() < 3 {
            return;
        }

        let mut points = Vec::new();
        let mut profiles = Vec::new();
        for (group, metrics) in &groups {
            let mut values = Vec::with_capacity(indicators.len());
            for name in &indicators {
                if let Some(metric) = metrics.iter().find(|m| &m.name == name) {
                    if let Some(q) = &metric.quantity {
                        values.push(q.value);
                        points.push(metric.point_id());
                    }
                }
            }
            profiles.push((group.to_string(), values));
        }

        let config = charts::radar_option("多维指标对比", &indicators, &profiles);
        out.push(chart(
            ledger,
            "metric_radar",
            "多维指标对比",
            ChartKind::Radar,
            AnalysisAngle::Profile,
            config,
            points,
        ));
    }

    fn metric_comparison(&self, payload: &Payload, ledger: &mut PlanningLedger, out: &mut Vec<Chart>) {
        let numeric: Vec<&Metric> = payload
            .metrics
            .iter()
            .filter(|m| m.group.is_none() && m.quantity.is_some() && !ledger.is_used(&m.point_id()))
            .collect();

        // Only values written in the same unit share an axis.
        let units: Vec<&str> = numeric
            .iter()
            .filter_map(|m| m.quantity.as_ref())
            .map(|q| q.unit.as_str())
            .unique()
            .collect();
        let Some(unit) = units
            .iter()
            .copied()
            .rev()
            .max_by_key(|unit| numeric.iter().filter(|m| m.quantity.as_ref().is_some_and(|q| q.unit == *unit)).count())
        else {
            return;
        };
        let same_unit: Vec<&Metric> = numeric
            .into_iter()
            .filter(|m| m.quantity.as_ref().is_some_and(|q| q.unit == unit))
            .collect();
        if same_unit.len() < 2 {
            return;
        }
        if same_unit.iter().all(|m| m.quantity.as_ref().is_some_and(|q| q.value == 0.0)) {
            return;
        }

        let items: Vec<(String, f64)> = same_unit
            .iter()
            .filter_map(|m| m.quantity.as_ref().map(|q| (m.label(), q.value)))
            .collect();
        let value_name = if unit.is_empty() { "数值" } else { unit };
        let config = charts::category_option("关键指标对比", ChartKind::Bar, &items, value_name);
        out.push(chart(
            ledger,
            "metric_comparison",
            "关键指标对比",
            ChartKind::Bar,
            AnalysisAngle::MagnitudeRanking,
            config,
            same_unit.iter().map(|m| m.point_id()).collect(),
        ));
    }

    fn keyword_ranking(&self, payload: &Payload, ledger: &mut PlanningLedger, out: &mut Vec<Chart>) {
        let terms: Vec<(String, f64, String)> = payload
            .keywords
            .iter()
            .map(|k| (k.term.clone(), k.weight, format!("keyword:{}", k.term)))
            .filter(|(_, _, point)| !ledger.is_used(point))
            .unique_by(|(term, _, _)| term.clone())
            .collect();
        if terms.is_empty() {
            return;
        }
        let items: Vec<(String, f64)> = terms.iter().map(|(term, w, _)| (term.clone(), *w)).collect();
        let config = charts::ranking_option("关键词排行", &items, "权重");
        out.push(chart(
            ledger,
            "keyword_ranking",
            "关键词排行",
            ChartKind::Bar,
            AnalysisAngle::MagnitudeRanking,
            config,
            terms.into_iter().map(|(_, _, point)| point).collect(),
        ));
    }

    fn category_charts(&self, payload: &Payload, ledger: &mut PlanningLedger, out: &mut Vec<Chart>) {
        for group in &payload.category_groups {
            // Unweighted groups have nothing to plot; cards list them instead.
            if !group.is_weighted() {
                continue;
            }
            let entries: Vec<(String, f64, String)> = group
                .categories
                .iter()
                .filter_map(|c| c.weight.map(|w| (c.name.clone(), w, group.point_id(c))))
                .filter(|(_, _, point)| !ledger.is_used(point))
                .collect();
            if entries.len() != group.categories.len() {
                continue;
            }
            let items: Vec<(String, f64)> = entries.iter().map(|(name, w, _)| (name.clone(), *w)).collect();
            let points: Vec<String> = entries.into_iter().map(|(_, _, point)| point).collect();

            match group.measure {
                Measure::Proportion => {
                    let positive = items.iter().filter(|(_, w)| *w > 0.0).count();
                    if positive < 2 || items.iter().any(|(_, w)| *w < 0.0) {
                        continue;
                    }
                    let config = charts::category_option(&group.title, ChartKind::Pie, &items, "占比");
                    out.push(chart(
                        ledger,
                        &format!("{}_pie", group.key),
                        &group.title,
                        ChartKind::Pie,
                        AnalysisAngle::Composition,
                        config,
                        points,
                    ));
                }
                Measure::Count => {
                    let config = charts::category_option(&group.title, ChartKind::Bar, &items, "数量");
                    out.push(chart(
                        ledger,
                        &format!("{}_bar", group.key),
                        &group.title,
                        ChartKind::Bar,
                        AnalysisAngle::CategoryComparison,
                        config,
                        points,
                    ));
                }
            }
        }
    }

    fn sentiment_chart(&self, payload: &Payload, ledger: &mut PlanningLedger, out: &mut Vec<Chart>) {
        let Some(sentiment) = &payload.sentiment else {
            return;
        };
        // A one-sided balance is a single slice; the summary card states the label instead.
        if sentiment.positive_count == 0 || sentiment.negative_count == 0 || ledger.is_used("sentiment:positive") {
            return;
        }
        let items = vec![
            ("正面".to_string(), sentiment.positive_count as f64),
            ("负面".to_string(), sentiment.negative_count as f64),
        ];
        let config = charts::category_option("情感倾向分布", ChartKind::Pie, &items, "情感词数");
        out.push(chart(
            ledger,
            "sentiment_balance",
            "情感倾向分布",
            ChartKind::Pie,
            AnalysisAngle::SentimentBalance,
            config,
            vec![
                "sentiment:positive".to_string(),
                "sentiment:negative".to_string(),
                "sentiment:label".to_string(),
            ],
        ));
    }

    fn summary_card(&self, payload: &Payload, ledger: &mut PlanningLedger) -> Option<Card> {
        let mut points = Vec::new();

        let (summary, key_points) = {
            let arguments = self.take_unused(
                ledger,
                payload.core_arguments.iter().map(|a| (a.clone(), format!("argument:{}", a))),
                self.options.max_key_points,
                &mut points,
            );
            if arguments.is_empty() {
                let entities = self.take_unused(
                    ledger,
                    payload.entities.iter().map(|e| (e.clone(), format!("entity:{}", e))),
                    self.options.max_key_points,
                    &mut points,
                );
                ("识别出的主要实体与类别概览", entities)
            } else {
                ("原文的核心论点与关键发现", arguments)
            }
        };

        let mut insights = Vec::new();
        if let Some(sentiment) = &payload.sentiment {
            if sentiment.total_sentiment_words > 0 && !ledger.is_used("sentiment:label") {
                insights.push(format!(
                    "整体情感倾向：{}（得分 {:.2}）",
                    sentiment.label.label(),
                    sentiment.score
                ));
                points.push("sentiment:label".to_string());
            }
        }
        let remaining = self.options.max_insights.saturating_sub(insights.len());
        insights.extend(self.category_insights(payload, ledger, remaining, &mut points));

        if key_points.is_empty() && insights.is_empty() {
            return None;
        }
        ledger.claim(points.iter().cloned());
        Some(Card {
            card_id: ledger.unique_id("summary_card"),
            title: "核心摘要".to_string(),
            summary: summary.to_string(),
            key_points,
            insights,
            angle: AnalysisAngle::Overview,
            data_points: points,
        })
    }

    fn key_data_card(&self, payload: &Payload, ledger: &mut PlanningLedger) -> Option<Card> {
        let mut points = Vec::new();
        let key_points = self.take_unused(
            ledger,
            payload
                .metrics
                .iter()
                .map(|m| (format!("{}: {}", m.label(), m.display), m.point_id())),
            self.options.max_key_points,
            &mut points,
        );
        let insights = self.category_insights(payload, ledger, self.options.max_insights, &mut points);

        if key_points.is_empty() && insights.is_empty() {
            return None;
        }
        ledger.claim(points.iter().cloned());
        Some(Card {
            card_id: ledger.unique_id("key_data_card"),
            title: "关键数据".to_string(),
            summary: "核心数据指标和重要发现".to_string(),
            key_points,
            insights,
            angle: AnalysisAngle::KeyFigures,
            data_points: points,
        })
    }

    fn entity_card(&self, payload: &Payload, ledger: &mut PlanningLedger) -> Option<Card> {
        let mut points = Vec::new();
        let key_points = self.take_unused(
            ledger,
            payload.entities.iter().map(|e| (e.clone(), format!("entity:{}", e))),
            self.options.max_key_points,
            &mut points,
        );
        if key_points.is_empty() {
            return None;
        }
        ledger.claim(points.iter().cloned());
        Some(Card {
            card_id: ledger.unique_id("entity_card"),
            title: "主要实体".to_string(),
            summary: format!("共识别出 {} 个实体", payload.entities.len()),
            key_points,
            insights: Vec::new(),
            angle: AnalysisAngle::Entities,
            data_points: points,
        })
    }

    /// Earliest unused `(text, point)` pairs, at most `limit`. Points are recorded in `taken`.
    fn take_unused<I>(&self, ledger: &PlanningLedger, candidates: I, limit: usize, taken: &mut Vec<String>) -> Vec<String>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut texts = Vec::new();
        for (text, point) in candidates {
            if texts.len() >= limit {
                break;
            }
            if ledger.is_used(&point) || taken.contains(&point) {
                continue;
            }
            texts.push(text);
            taken.push(point);
        }
        texts
    }

    /// One line per unplotted category with items, then one line per group of bare names.
    fn category_insights(
        &self,
        payload: &Payload,
        ledger: &PlanningLedger,
        limit: usize,
        taken: &mut Vec<String>,
    ) -> Vec<String> {
        let mut candidates = Vec::new();
        for group in &payload.category_groups {
            let unused: Vec<_> = group
                .categories
                .iter()
                .map(|c| (c, group.point_id(c)))
                .filter(|(_, point)| !ledger.is_used(point) && !taken.contains(point))
                .collect();

            let mut bare = Vec::new();
            for (category, point) in unused {
                if category.items.is_empty() {
                    bare.push((category, point));
                } else {
                    candidates.push(Candidate {
                        title: category.name.clone(),
                        line: category.items.iter().take(3).join("、"),
                        points: vec![point],
                    });
                }
            }
            if !bare.is_empty() {
                let shown: Vec<_> = bare.into_iter().take(3).collect();
                let line = shown.iter().map(|(c, _)| c.name.as_str()).join("、");
                candidates.push(Candidate {
                    title: group.title.clone(),
                    line,
                    points: shown.into_iter().map(|(_, point)| point).collect(),
                });
            }
        }

        let mut insights = Vec::new();
        for candidate in candidates.into_iter().take(limit) {
            insights.push(format!("{}：{}", candidate.title, candidate.line));
            taken.extend(candidate.points);
        }
        insights
    }

    fn content_plan(&self, content: &str) -> VisualizationPlan {
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return error_plan("返回内容为空");
        }
        let summary: String = if trimmed.chars().count() > CONTENT_SUMMARY_CHARS {
            format!("{}…", trimmed.chars().take(CONTENT_SUMMARY_CHARS).collect::<String>())
        } else {
            trimmed.to_string()
        };
        let key_points = tokenizer::split_sentences(trimmed)
            .into_iter()
            .take(self.options.max_key_points)
            .map(str::to_string)
            .collect();
        let card = Card {
            card_id: "content_card".to_string(),
            title: "分析内容".to_string(),
            summary,
            key_points,
            insights: Vec::new(),
            angle: AnalysisAngle::Overview,
            data_points: vec!["content".to_string()],
        };
        VisualizationPlan::new(vec![VisualizationItem::Card(card)], PLAN_DESCRIPTION)
    }
}

fn chart(
    ledger: &mut PlanningLedger,
    base_id: &str,
    title: &str,
    chart_kind: ChartKind,
    angle: AnalysisAngle,
    config: Value,
    data_points: Vec<String>,
) -> Chart {
    ledger.claim(data_points.iter().cloned());
    Chart {
        chart_id: ledger.unique_id(base_id),
        title: title.to_string(),
        chart_kind,
        config,
        angle,
        data_points,
    }
}

/// Single error card standing in for a payload that could not be planned.
pub fn error_plan(message: &str) -> VisualizationPlan {
    let card = Card {
        card_id: "error_card".to_string(),
        title: "无法生成可视化".to_string(),
        summary: format!("错误：{}", message),
        key_points: Vec::new(),
        insights: vec!["请提供包含 entities、metrics、categories 或 companies 的 JSON 对象".to_string()],
        angle: AnalysisAngle::Notice,
        data_points: Vec::new(),
    };
    VisualizationPlan::new(vec![VisualizationItem::Card(card)], ERROR_DESCRIPTION)
}

/// Remove a surrounding Markdown code fence, if any.
pub fn strip_code_fence(text: &str) -> &str {
    match CODE_FENCE_REGEX.captures(text) {
        Some(caps) => caps.get(1).map_or(text, |m| m.as_str().trim()),
        None => text,
    }
}

type CompanySeries = (Vec<String>, Vec<Series>, Vec<String>, String);

/// Per-company series over the union of years, skipping points already used.
/// Years a company does not report stay `None`.
fn company_series(
    companies: &[Company],
    ledger: &PlanningLedger,
    field: &str,
    select: fn(&Company) -> &YearSeries,
) -> Option<CompanySeries> {
    let available = |company: &Company, year: &str| !ledger.is_used(&company.point_id(field, Some(year)));

    let years: Vec<String> = companies
        .iter()
        .flat_map(|c| select(c).keys().filter(move |year| available(c, year)))
        .cloned()
        .collect::<BTreeSet<String>>()
        .into_iter()
        .collect();
    if years.is_empty() {
        return None;
    }

    let mut series = Vec::new();
    let mut points = Vec::new();
    for company in companies {
        let values: Vec<Option<f64>> = years
            .iter()
            .map(|year| match select(company).get(year) {
                Some(q) if available(company, year) => {
                    points.push(company.point_id(field, Some(year)));
                    Some(q.value)
                }
                _ => None,
            })
            .collect();
        if values.iter().any(Option::is_some) {
            series.push(Series {
                name: company.name.clone(),
                values,
            });
        }
    }

    let unit = first_unit(companies.iter().flat_map(|c| select(c).values()).map(|q| q.unit.as_str()));
    Some((years, series, points, unit))
}

fn first_unit<'a, I>(units: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    units.into_iter().find(|u| !u.is_empty()).unwrap_or("数值").to_string()
}

/// Unused numeric grouped metrics, grouped by parent key in first-seen order.
fn metric_groups<'a>(payload: &'a Payload, ledger: &PlanningLedger) -> Vec<(&'a str, Vec<&'a Metric>)> {
    let mut groups: Vec<(&str, Vec<&Metric>)> = Vec::new();
    for metric in &payload.metrics {
        let Some(group) = metric.group.as_deref() else {
            continue;
        };
        if metric.quantity.is_none() || ledger.is_used(&metric.point_id()) {
            continue;
        }
        match groups.iter_mut().find(|(name, _)| *name == group) {
            Some((_, metrics)) => metrics.push(metric),
            None => groups.push((group, vec![metric])),
        }
    }
    groups
}

/// Greedy reorder: take the first item whose angle differs from the previous
/// one and has not been shown yet, else the first that merely differs, else
/// the next in line.
fn arrange(mut pending: Vec<VisualizationItem>) -> Vec<VisualizationItem> {
    let mut arranged = Vec::with_capacity(pending.len());
    let mut seen: HashSet<AnalysisAngle> = HashSet::new();
    let mut last: Option<AnalysisAngle> = None;

    while !pending.is_empty() {
        let pick = pending
            .iter()
            .position(|item| Some(item.angle()) != last && !seen.contains(&item.angle()))
            .or_else(|| pending.iter().position(|item| Some(item.angle()) != last))
            .unwrap_or(0);
        let item = pending.remove(pick);
        seen.insert(item.angle());
        last = Some(item.angle());
        arranged.push(item);
    }
    arranged
}

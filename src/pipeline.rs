//! End-to-end analysis of one text: local summary and provider call in
//! parallel, then planning, authenticity checks and report assembly.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::authenticity::{AuthenticityChecker, DataAuthenticityReport};
use crate::inference::{self, DEFAULT_TIMEOUT_SECS, ProviderError, ProviderResponse, TextInsightProvider};
use crate::io;
use crate::planner::{self, VisualizationItem, VisualizationPlan, VisualizationPlanner};
use crate::prompting::ExtractionType;
use crate::summary::{self, SummaryBuilder, TextSummary};

pub const LOCAL_KEY: &str = "local";
pub const EXTERNAL_KEY: &str = "external";
pub const DASHBOARD_KEY: &str = "dashboard";

/// A visualization set: either inline items or the path of a rendered artifact.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum VisualizationEntry {
    Artifact(PathBuf),
    Items(Vec<VisualizationItem>),
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub run_id: String,
    pub input_text: String,
    pub extraction_type: ExtractionType,
    pub local_analysis: TextSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_analysis: Option<Value>,
    pub visualizations: BTreeMap<String, VisualizationEntry>,
    pub authenticity: BTreeMap<String, DataAuthenticityReport>,
    pub errors: Vec<String>,
    pub processing_time: DateTime<Local>,
}

impl AnalysisReport {
    pub fn items(&self, key: &str) -> Option<&[VisualizationItem]> {
        match self.visualizations.get(key) {
            Some(VisualizationEntry::Items(items)) => Some(items),
            _ => None,
        }
    }

    /// Every inline visualization set, in key order.
    pub fn item_sets(&self) -> impl Iterator<Item = (&str, &[VisualizationItem])> {
        self.visualizations.iter().filter_map(|(key, entry)| match entry {
            VisualizationEntry::Items(items) => Some((key.as_str(), items.as_slice())),
            VisualizationEntry::Artifact(_) => None,
        })
    }

    pub fn record_artifact(&mut self, key: &str, path: PathBuf) {
        self.visualizations.insert(key.to_string(), VisualizationEntry::Artifact(path));
    }
}

/// Runs the local pipeline and, when configured, a text insight provider.
///
/// Each call to [`Analyzer::analyze`] plans with a fresh ledger, so
/// concurrent runs never see each other's data.
#[derive(Clone)]
pub struct Analyzer {
    builder: SummaryBuilder,
    planner: VisualizationPlanner,
    checker: AuthenticityChecker,
    provider: Option<Arc<dyn TextInsightProvider>>,
    /// Why no provider is configured, reported on every run.
    provider_error: Option<ProviderError>,
    extraction_type: ExtractionType,
    provider_timeout: Duration,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new(
            SummaryBuilder::default(),
            VisualizationPlanner::default(),
            AuthenticityChecker::default(),
        )
    }
}

impl Analyzer {
    pub fn new(builder: SummaryBuilder, planner: VisualizationPlanner, checker: AuthenticityChecker) -> Self {
        Self {
            builder,
            planner,
            checker,
            provider: None,
            provider_error: None,
            extraction_type: ExtractionType::default(),
            provider_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_provider(mut self, provider: Arc<dyn TextInsightProvider>) -> Self {
        self.provider = Some(provider);
        self.provider_error = None;
        self
    }

    /// Run local-only, recording `error` as the reason in every report.
    pub fn with_provider_error(mut self, error: ProviderError) -> Self {
        self.provider = None;
        self.provider_error = Some(error);
        self
    }

    pub fn with_extraction_type(mut self, extraction_type: ExtractionType) -> Self {
        self.extraction_type = extraction_type;
        self
    }

    /// Hard deadline for the provider call.
    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }

    pub fn planner(&self) -> &VisualizationPlanner {
        &self.planner
    }

    pub fn checker(&self) -> &AuthenticityChecker {
        &self.checker
    }

    pub async fn analyze(&self, text: &str) -> AnalysisReport {
        let run_id = Uuid::new_v4().to_string();
        let mut errors = Vec::new();
        if text.trim().is_empty() {
            errors.push("输入文本为空".to_string());
        }
        info!(run_id = %run_id, chars = text.chars().count(), extraction_type = %self.extraction_type, "starting analysis");

        let builder = self.builder;
        let local_text = text.to_string();
        let local = tokio::task::spawn_blocking(move || builder.build(&local_text));
        let (local, remote) = tokio::join!(local, self.call_provider(text));

        let summary = local.unwrap_or_else(|e| {
            warn!(run_id = %run_id, error = %e, "local analysis task failed");
            errors.push(format!("本地分析失败: {}", e));
            TextSummary::default()
        });

        let mut visualizations = BTreeMap::new();
        let mut authenticity = BTreeMap::new();

        let local_plan = self.planner.plan_summary(&summary);
        let summary_json = serde_json::to_string(&summary).unwrap_or_default();
        authenticity.insert(
            LOCAL_KEY.to_string(),
            self.checker.check(text, Some(&summary_json), &local_plan),
        );
        visualizations.insert(LOCAL_KEY.to_string(), VisualizationEntry::Items(local_plan.visualizations));

        let external_analysis = remote.map(|result| {
            if let Err(e) = &result {
                warn!(run_id = %run_id, kind = %e.kind, error = %e.message, "provider call failed, continuing local-only");
                errors.push(e.to_string());
            }
            inference::response_to_value(result)
        });

        if let Some(value) = &external_analysis {
            let plan = self.planner.plan_value(value);
            // Provider numbers must be traceable to the input text itself.
            authenticity.insert(EXTERNAL_KEY.to_string(), self.checker.check(text, None, &plan));
            visualizations.insert(EXTERNAL_KEY.to_string(), VisualizationEntry::Items(plan.visualizations));
        }

        debug!(run_id = %run_id, errors = errors.len(), "analysis finished");
        AnalysisReport {
            run_id,
            input_text: text.to_string(),
            extraction_type: self.extraction_type,
            local_analysis: summary,
            external_analysis,
            visualizations,
            authenticity,
            errors,
            processing_time: Local::now(),
        }
    }

    /// Analyze several texts concurrently. Reports come back in input order.
    pub async fn analyze_batch<S: AsRef<str>>(&self, texts: &[S]) -> Vec<AnalysisReport> {
        join_all(texts.iter().map(|text| self.analyze(text.as_ref()))).await
    }

    /// Analyze the text stored at `path`. An unreadable file is analyzed as empty
    /// text with the read error first in `errors`.
    pub async fn analyze_file(&self, path: &Path) -> AnalysisReport {
        match io::read_input(path) {
            Ok(raw) => self.analyze(&summary::preprocess(&raw)).await,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "input file not readable");
                let mut report = self.analyze("").await;
                report.errors.insert(0, format!("读取输入文件失败 {}: {}", path.display(), e));
                report
            }
        }
    }

    /// Plan the payload stored at `path`. An unreadable file gives an error plan.
    pub fn plan_payload_file(&self, path: &Path) -> (VisualizationPlan, DataAuthenticityReport) {
        match io::read_input(path) {
            Ok(raw) => self.plan_payload_text(&raw, ""),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "payload file not readable");
                let plan = planner::error_plan(&format!("读取数据文件失败 {}: {}", path.display(), e));
                (plan, DataAuthenticityReport::default())
            }
        }
    }

    /// Plan an externally supplied payload and check it against `source_text`.
    pub fn plan_payload_text(&self, raw: &str, source_text: &str) -> (VisualizationPlan, DataAuthenticityReport) {
        let plan = self.planner.plan_str(raw);
        let report = self.checker.check(source_text, Some(raw), &plan);
        (plan, report)
    }

    async fn call_provider(&self, text: &str) -> Option<Result<ProviderResponse, ProviderError>> {
        if let Some(error) = &self.provider_error {
            return Some(Err(error.clone()));
        }
        let provider = self.provider.as_ref()?;
        if text.trim().is_empty() {
            return None;
        }

        debug!(provider = %provider.name(), "calling text insight provider");
        match tokio::time::timeout(self.provider_timeout, provider.extract(text, self.extraction_type)).await {
            Ok(result) => Some(result),
            Err(_) => Some(Err(ProviderError::timeout(format!(
                "{} did not answer within {}s",
                provider.name(),
                self.provider_timeout.as_secs_f64()
            )))),
        }
    }
}

//! Turn unstructured Chinese text into a structured summary and a
//! de-duplicated sequence of chart and card descriptors, optionally
//! enriched by an LLM text insight provider.

pub mod authenticity;
pub mod charts;
pub mod config;
pub mod error;
pub mod inference;
pub mod io;
pub mod keywords;
pub mod patterns;
pub mod payload;
pub mod pipeline;
pub mod planner;
pub mod progress;
pub mod prompting;
pub mod sentiment;
pub mod summary;
pub mod tokenizer;
pub mod visualization;

pub use authenticity::{AuthenticityChecker, DataAuthenticityReport};
pub use config::{Config, ConfigError};
pub use error::InvalidPayloadError;
pub use inference::{ChatCompletionModel, ProviderError, ProviderErrorKind, ProviderKind, ProviderResponse, TextInsightProvider};
pub use pipeline::{AnalysisReport, Analyzer};
pub use planner::{AnalysisAngle, Card, Chart, VisualizationItem, VisualizationPlan, VisualizationPlanner};
pub use prompting::ExtractionType;
pub use sentiment::{SentimentLabel, SentimentResult, SentimentScorer};
pub use summary::{SummaryBuilder, TextSummary, preprocess};
pub use visualization::{HtmlRenderer, RenderError, Renderer};

/// Summarize `text` with default settings.
pub fn summarize(text: &str) -> TextSummary {
    SummaryBuilder::default().build(text)
}

/// Summarize `text` and plan visualizations for it with default settings.
pub fn visualize_text(text: &str) -> VisualizationPlan {
    VisualizationPlanner::default().plan_summary(&summarize(text))
}

//! Text insight providers backed by chat-completion language models.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::planner::strip_code_fence;
use crate::prompting::{ExtractionType, PromptTemplates, SYSTEM_PROMPT};

pub const DEFAULT_TEMPERATURE: f64 = 0.3;
pub const DEFAULT_MAX_TOKENS: u32 = 4000;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Which OpenAI-compatible service to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    DeepSeek,
    Qwen,
    OpenAI,
}

impl ProviderKind {
    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::DeepSeek => "deepseek-chat",
            ProviderKind::Qwen => "qwen-plus",
            ProviderKind::OpenAI => "gpt-4o-mini",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::DeepSeek => "https://api.deepseek.com",
            ProviderKind::Qwen => "https://dashscope.aliyuncs.com/compatible-mode",
            ProviderKind::OpenAI => "https://api.openai.com",
        }
    }

    /// Environment variable holding the API key.
    pub fn api_key_env(&self) -> &'static str {
        match self {
            ProviderKind::DeepSeek => "DEEPSEEK_API_KEY",
            ProviderKind::Qwen => "DASHSCOPE_API_KEY",
            ProviderKind::OpenAI => "OPENAI_API_KEY",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::DeepSeek => write!(f, "deepseek"),
            ProviderKind::Qwen => write!(f, "qwen"),
            ProviderKind::OpenAI => write!(f, "openai"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderErrorKind {
    Timeout,
    Auth,
    Http,
    Parse,
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderErrorKind::Timeout => write!(f, "timeout"),
            ProviderErrorKind::Auth => write!(f, "auth"),
            ProviderErrorKind::Http => write!(f, "http"),
            ProviderErrorKind::Parse => write!(f, "parse"),
        }
    }
}

/// A failed provider call, classified by cause.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Provider {kind} error: {message}")]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub message: String,
}

impl ProviderError {
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Timeout, message)
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Auth, message)
    }

    pub fn http(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Http, message)
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Parse, message)
    }

    /// The `{error, kind}` wrapper recorded in reports.
    pub fn to_value(&self) -> Value {
        json!({"error": self.message, "kind": self.kind})
    }
}

/// A successful provider reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderResponse {
    Structured(Value),
    /// Reply text that was not JSON.
    Content(String),
}

impl ProviderResponse {
    pub fn into_value(self) -> Value {
        match self {
            ProviderResponse::Structured(value) => value,
            ProviderResponse::Content(content) => json!({"content": content}),
        }
    }
}

/// Turn a provider call result into the JSON recorded in reports and fed to the planner.
pub fn response_to_value(result: Result<ProviderResponse, ProviderError>) -> Value {
    match result {
        Ok(response) => response.into_value(),
        Err(e) => e.to_value(),
    }
}

/// An external service that extracts structured insight from text.
#[async_trait]
pub trait TextInsightProvider: Send + Sync {
    fn name(&self) -> String;

    async fn extract(&self, text: &str, extraction_type: ExtractionType) -> Result<ProviderResponse, ProviderError>;
}

/// Parse reply content: JSON when it looks like JSON, otherwise a content wrapper.
pub fn parse_output(content: &str) -> Result<ProviderResponse, ProviderError> {
    let unfenced = strip_code_fence(content.trim());
    if unfenced.starts_with('{') || unfenced.starts_with('[') {
        serde_json::from_str(unfenced)
            .map(ProviderResponse::Structured)
            .map_err(|e| ProviderError::parse(format!("Failed to parse output as JSON: {}", e)))
    } else {
        Ok(ProviderResponse::Content(content.to_string()))
    }
}

/// Chat-completion client for DeepSeek, Qwen (DashScope compatible mode) and OpenAI.
#[derive(Debug, Clone)]
pub struct ChatCompletionModel {
    kind: ProviderKind,
    model_id: String,
    api_key: String,
    base_url: Url,
    temperature: f64,
    max_tokens: u32,
    timeout: Duration,
    templates: PromptTemplates,
    client: reqwest::Client,
}

impl ChatCompletionModel {
    pub fn new(kind: ProviderKind, api_key: Option<String>) -> Result<Self, ProviderError> {
        let api_key = api_key.filter(|k| !k.trim().is_empty()).ok_or_else(|| {
            ProviderError::auth(format!(
                "API key not provided. Set {} or pass --api-key.",
                kind.api_key_env()
            ))
        })?;
        let base_url = Url::parse(kind.default_base_url()).map_err(|e| ProviderError::http(e.to_string()))?;

        Ok(Self {
            kind,
            model_id: kind.default_model().to_string(),
            api_key,
            base_url,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            templates: PromptTemplates::default(),
            client: reqwest::Client::new(),
        })
    }

    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = base_url;
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_templates(mut self, templates: PromptTemplates) -> Self {
        self.templates = templates;
        self
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url.as_str().trim_end_matches('/'))
    }

    /// Send one prompt and return the reply content.
    pub async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        match tokio::time::timeout(self.timeout, self.send(prompt)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::timeout(format!(
                "no response from {} within {}s",
                self.kind,
                self.timeout.as_secs_f64()
            ))),
        }
    }

    async fn send(&self, prompt: &str) -> Result<String, ProviderError> {
        let request_body = json!({
            "model": self.model_id,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": prompt}
            ],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "stream": false
        });

        let url = self.endpoint();
        debug!(provider = %self.kind, model = %self.model_id, url = %url, "sending chat completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::timeout(e.to_string())
                } else {
                    ProviderError::http(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = format!("{} API error: {} - {}", self.kind, status, body.trim());
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::auth(message),
                _ => ProviderError::http(message),
            });
        }

        let response_json: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::parse(format!("invalid response body: {}", e)))?;
        response_json["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ProviderError::parse("response has no choices[0].message.content"))
    }
}

#[async_trait]
impl TextInsightProvider for ChatCompletionModel {
    fn name(&self) -> String {
        format!("{}:{}", self.kind, self.model_id)
    }

    async fn extract(&self, text: &str, extraction_type: ExtractionType) -> Result<ProviderResponse, ProviderError> {
        let prompt = self.templates.render(extraction_type, text);
        let content = self.complete(&prompt).await?;
        let parsed = parse_output(&content);
        if let Err(e) = &parsed {
            warn!(provider = %self.kind, error = %e, "provider reply could not be parsed");
        }
        parsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_creation_uses_presets() {
        let model = ChatCompletionModel::new(ProviderKind::DeepSeek, Some("test-api-key".to_string())).unwrap();
        assert_eq!(model.model_id, "deepseek-chat");
        assert_eq!(model.temperature, 0.3);
        assert_eq!(model.max_tokens, 4000);
        assert_eq!(model.timeout, Duration::from_secs(30));
        assert_eq!(model.endpoint(), "https://api.deepseek.com/v1/chat/completions");

        let qwen = ChatCompletionModel::new(ProviderKind::Qwen, Some("k".to_string())).unwrap();
        assert_eq!(
            qwen.endpoint(),
            "https://dashscope.aliyuncs.com/compatible-mode/v1/chat/completions"
        );
        assert_eq!(qwen.name(), "qwen:qwen-plus");
    }

    #[test]
    fn test_missing_api_key_is_auth_error() {
        let err = ChatCompletionModel::new(ProviderKind::Qwen, None).unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::Auth);
        assert!(err.message.contains("DASHSCOPE_API_KEY"));

        let err = ChatCompletionModel::new(ProviderKind::OpenAI, Some("  ".to_string())).unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::Auth);
    }

    #[test]
    fn test_parse_output_json() {
        let result = parse_output(r#"{"key": "value", "number": 42}"#).unwrap();
        let ProviderResponse::Structured(parsed) = result else {
            panic!("expected structured output");
        };
        assert_eq!(parsed["key"], "value");
        assert_eq!(parsed["number"], 42);
    }

    #[test]
    fn test_parse_output_fenced_json() {
        let result = parse_output("```json\n{\"entities\": [\"上海\"]}\n```").unwrap();
        assert_eq!(result.into_value()["entities"][0], "上海");
    }

    #[test]
    fn test_parse_output_plain_text() {
        let result = parse_output("这段文字整体偏正面。").unwrap();
        assert_eq!(result, ProviderResponse::Content("这段文字整体偏正面。".to_string()));
        assert_eq!(result.into_value(), json!({"content": "这段文字整体偏正面。"}));
    }

    #[test]
    fn test_parse_output_broken_json() {
        let err = parse_output("{\"entities\": [").unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::Parse);
    }

    #[test]
    fn test_error_wrapper() {
        let value = ProviderError::timeout("no response").to_value();
        assert_eq!(value, json!({"error": "no response", "kind": "timeout"}));
        assert_eq!(
            response_to_value(Err(ProviderError::auth("bad key"))),
            json!({"error": "bad key", "kind": "auth"})
        );
        assert_eq!(ProviderError::http("503").to_string(), "Provider http error: 503");
    }

    #[test]
    fn test_kind_serialization() {
        assert_eq!(serde_json::to_string(&ProviderKind::DeepSeek).unwrap(), "\"deepseek\"");
        let kind: ProviderKind = serde_json::from_str("\"openai\"").unwrap();
        assert_eq!(kind, ProviderKind::OpenAI);
    }
}

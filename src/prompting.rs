//! Prompts sent to the text insight provider, one per extraction type.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

pub const SYSTEM_PROMPT: &str = "你是一名数据分析助手，只输出 JSON。";

/// What the provider is asked to extract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionType {
    #[default]
    Comprehensive,
    Entities,
    Sentiment,
    Keywords,
}

impl ExtractionType {
    pub const ALL: [ExtractionType; 4] = [
        ExtractionType::Comprehensive,
        ExtractionType::Entities,
        ExtractionType::Sentiment,
        ExtractionType::Keywords,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionType::Comprehensive => "comprehensive",
            ExtractionType::Entities => "entities",
            ExtractionType::Sentiment => "sentiment",
            ExtractionType::Keywords => "keywords",
        }
    }
}

impl fmt::Display for ExtractionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for ExtractionType {
    type Error = String;

    fn try_from(value: &str) -> std::result::Result<Self, Self::Error> {
        match value.trim().to_lowercase().as_str() {
            "comprehensive" => Ok(ExtractionType::Comprehensive),
            "entities" => Ok(ExtractionType::Entities),
            "sentiment" => Ok(ExtractionType::Sentiment),
            "keywords" => Ok(ExtractionType::Keywords),
            _ => Err(format!(
                "Invalid extraction type: {} (expected one of: comprehensive, entities, sentiment, keywords)",
                value
            )),
        }
    }
}

/// Format of a prompt template file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatType {
    Yaml,
    Json,
}

impl FormatType {
    /// Guess from the file extension; anything but `.json` is read as YAML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => FormatType::Json,
            _ => FormatType::Yaml,
        }
    }
}

impl TryFrom<&str> for FormatType {
    type Error = String;

    fn try_from(value: &str) -> std::result::Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "yaml" | "yml" => Ok(FormatType::Yaml),
            "json" => Ok(FormatType::Json),
            _ => Err(format!("Invalid format type: {}", value)),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum PromptBuilderError {
    #[error("I/O error reading prompt file: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Prompt template for {0} is empty")]
    EmptyTemplate(ExtractionType),
}

pub type Result<T> = std::result::Result<T, PromptBuilderError>;

const COMPREHENSIVE_PROMPT: &str = "请分析以下文本，提取可用于可视化的结构化数据，并只返回一个 JSON 对象，可包含以下键：
- entities: 关键实体（人物、地点、组织、产品等）的字符串列表
- metrics: 指标名到数值的映射，可嵌套一层，例如 {\"营收\": {\"2023\": \"92.94亿元\"}}
- categories: 类别列表，每项为 {\"name\": 名称, \"proportion\": 原文给出的占比, \"items\": [成员]}
- companies: 公司列表，每项为 {\"name\": 名称, \"financial_data\": {\"revenue\": {年份: 数值}, \"adjusted_profit\": {年份: 数值}}, \"operational_data\": {\"store_count\": 数值}}
- core_arguments: 核心论点的字符串列表
- keywords: 关键词列表，每项为 {\"word\": 词, \"frequency\": 频次}
只填写原文中真实出现的数据，不要编造或估算数值，没有的键直接省略。";

const ENTITIES_PROMPT: &str = "请从以下文本中提取所有重要实体，包括人名、地名、组织名、产品名和其他重要名词。
以 JSON 对象返回，格式为 {\"entities\": {\"persons\": [...], \"locations\": [...], \"organizations\": [...], \"products\": [...], \"others\": [...]}}。";

const SENTIMENT_PROMPT: &str = "请分析以下文本的情感倾向，包括整体情感（正面/负面/中性）、情感强度（1-10分）、关键情感词汇和情感变化趋势。
以 JSON 对象返回分析结果；若能给出情感词的分类统计，请放在 {\"categories\": [{\"name\": 类别, \"count\": 次数}]} 中。";

const KEYWORDS_PROMPT: &str = "请从以下文本中提取关键词，包括高频词汇、重要概念、专业术语和主题词。
以 JSON 对象返回，格式为 {\"keywords\": [{\"word\": 词, \"frequency\": 在原文中的出现次数}]}。";

/// Instruction text per extraction type. The input text is appended when rendering.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PromptTemplates {
    pub comprehensive: String,
    pub entities: String,
    pub sentiment: String,
    pub keywords: String,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self {
            comprehensive: COMPREHENSIVE_PROMPT.to_string(),
            entities: ENTITIES_PROMPT.to_string(),
            sentiment: SENTIMENT_PROMPT.to_string(),
            keywords: KEYWORDS_PROMPT.to_string(),
        }
    }
}

impl PromptTemplates {
    pub fn template(&self, extraction_type: ExtractionType) -> &str {
        match extraction_type {
            ExtractionType::Comprehensive => &self.comprehensive,
            ExtractionType::Entities => &self.entities,
            ExtractionType::Sentiment => &self.sentiment,
            ExtractionType::Keywords => &self.keywords,
        }
    }

    /// Full user prompt for `text`.
    pub fn render(&self, extraction_type: ExtractionType, text: &str) -> String {
        format!("{}\n\n文本内容：\n{}", self.template(extraction_type).trim_end(), text)
    }

    fn validate(self) -> Result<Self> {
        for extraction_type in ExtractionType::ALL {
            if self.template(extraction_type).trim().is_empty() {
                return Err(PromptBuilderError::EmptyTemplate(extraction_type));
            }
        }
        Ok(self)
    }
}

/// Read prompt templates from a file (YAML or JSON). Missing keys keep the built-in prompts.
pub fn read_prompt_templates_from_file<P: AsRef<Path>>(prompt_path: P, format_type: FormatType) -> Result<PromptTemplates> {
    let content = fs::read_to_string(&prompt_path)?;
    let templates: PromptTemplates = match format_type {
        FormatType::Yaml => serde_yaml::from_str(&content)?,
        FormatType::Json => serde_json::from_str(&content)?,
    };
    templates.validate()
}

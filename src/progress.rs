use std::path::PathBuf;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::pipeline::{AnalysisReport, EXTERNAL_KEY, LOCAL_KEY};

// ANSI color codes
const BLUE: &str = "\x1b[94m";
const GREEN: &str = "\x1b[92m";
const YELLOW: &str = "\x1b[93m";
const RED: &str = "\x1b[91m";
const CYAN: &str = "\x1b[96m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

const APP_NAME: &str = "InfoViz";
const TOP_KEYWORDS_SHOWN: usize = 5;

/// Wraps `text` in an ANSI code when the terminal supports colors.
fn paint(code: &str, text: impl std::fmt::Display) -> String {
    if console::colors_enabled() {
        format!("{}{}{}", code, text, RESET)
    } else {
        text.to_string()
    }
}

/// Spinner shown while the provider call is in flight.
///
/// * `model_info` - Model identifier (optional)
/// * `chars` - Length of the text being analyzed (optional)
/// * `disable` - Whether to hide the spinner
pub fn create_analysis_spinner(model_info: Option<&str>, chars: Option<usize>, disable: bool) -> ProgressBar {
    let pb = ProgressBar::new_spinner().with_prefix(format_analysis_progress(model_info, chars));
    if let Ok(style) = ProgressStyle::with_template("{spinner} {prefix} [{elapsed}]") {
        pb.set_style(style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "✓"]));
    }

    if disable {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    } else {
        pb.enable_steady_tick(Duration::from_millis(100));
    }
    pb
}

/// Formats the spinner description.
pub fn format_analysis_progress(model_info: Option<&str>, chars: Option<usize>) -> String {
    let mut desc = match model_info {
        Some(model) => format!("{}: model={}", paint(&format!("{}{}", BLUE, BOLD), APP_NAME), paint(GREEN, model)),
        None => format!("{}: Analyzing", paint(&format!("{}{}", BLUE, BOLD), APP_NAME)),
    };
    if let Some(chars) = chars {
        desc.push_str(&format!(", text={} chars", paint(GREEN, chars)));
    }
    desc
}

/// Prints analysis completion message
pub fn print_analysis_complete(elapsed: Duration, chars: usize) {
    let secs = elapsed.as_secs_f64();
    let mut line = format!(
        "{} Analysis complete in {}",
        paint(GREEN, "✓"),
        paint(BOLD, format!("{:.2}s", secs))
    );
    if secs > 0.0 {
        line.push_str(&format!(" ({} chars/sec)", paint(BOLD, format!("{:.0}", chars as f64 / secs))));
    }
    println!("{}", line);
}

/// Prints the run summary for `report` followed by the artifacts written.
pub fn print_summary(report: &AnalysisReport, artifacts: &[PathBuf]) {
    println!("{}", format_summary(report, artifacts));
}

/// Human-readable run summary: statistics, extraction counts, entities,
/// sentiment, keywords, visualization counts, warnings and errors.
pub fn format_summary(report: &AnalysisReport, artifacts: &[PathBuf]) -> String {
    let summary = &report.local_analysis;
    let bullet = paint(CYAN, "•");
    let mut lines = vec![paint(BOLD, "=== 分析摘要 ===")];

    let stats = &summary.basic_stats;
    lines.push(format!(
        "{} 文本长度 {} 字符, 词数 {}, 句子数 {}, 不同关键词 {}",
        bullet,
        paint(BOLD, stats.text_length),
        paint(BOLD, stats.word_count),
        paint(BOLD, stats.sentence_count),
        paint(BOLD, stats.unique_keyword_count)
    ));

    let counts: Vec<String> = summary
        .data_extraction
        .iter()
        .filter(|(_, count)| *count > 0)
        .map(|(kind, count)| format!("{} {}", kind.label(), count))
        .collect();
    if !counts.is_empty() {
        lines.push(format!("{} 数据提取: {}", bullet, counts.join(", ")));
    }

    let entities: Vec<String> = summary
        .entities
        .iter()
        .filter(|(_, names)| !names.is_empty())
        .map(|(category, names)| format!("{} {}", category.label(), names.len()))
        .collect();
    if !entities.is_empty() {
        lines.push(format!("{} 实体: {}", bullet, entities.join(", ")));
    }

    let sentiment = &summary.sentiment;
    lines.push(format!(
        "{} 情感: {} (得分 {:.2}, 正面词 {}, 负面词 {})",
        bullet,
        paint(BOLD, sentiment.label.label()),
        sentiment.score,
        sentiment.positive_count,
        sentiment.negative_count
    ));

    if !summary.top_keywords.is_empty() {
        let keywords: Vec<String> = summary
            .top_keywords
            .iter()
            .take(TOP_KEYWORDS_SHOWN)
            .map(|k| format!("{}({})", k.token, k.frequency))
            .collect();
        lines.push(format!("{} 关键词: {}", bullet, keywords.join(" ")));
    }

    for (key, name) in [(LOCAL_KEY, "本地"), (EXTERNAL_KEY, "模型")] {
        if let Some(items) = report.items(key) {
            lines.push(format!("{} {}可视化: {} 项", bullet, name, paint(BOLD, items.len())));
        }
    }

    for warning in report.authenticity.values().flat_map(|r| r.warnings.iter()) {
        lines.push(format!("{} {}", paint(YELLOW, "!"), warning));
    }
    for error in &report.errors {
        lines.push(format!("{} {}", paint(RED, "✗"), error));
    }
    for path in artifacts {
        lines.push(format!("{} 已保存 {}", paint(GREEN, "✓"), paint(BLUE, path.display())));
    }

    lines.join("\n")
}

use std::fs::{self, File};
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use flate2::read::GzDecoder;
use thiserror::Error;
use tracing::info;

use crate::pipeline::AnalysisReport;
use crate::planner::VisualizationPlan;

pub const REPORT_PREFIX: &str = "analysis_result";
pub const DASHBOARD_PREFIX: &str = "dashboard";
pub const PLAN_PREFIX: &str = "visualization_plan";

#[derive(Error, Debug)]
pub enum IoError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported file type for: {0}")]
    UnsupportedFileType(String),

    #[error("File is not valid UTF-8 text: {0}")]
    NotUtf8(String),
}

/// Open a local file for reading, decompressing `.gz` files on the fly.
pub fn open_input(path: &Path) -> Result<Box<dyn Read>, IoError> {
    check_text_type(path)?;
    let file = File::open(path)?;
    if is_gzip(path) {
        Ok(Box::new(BufReader::new(GzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Read an input text file (plain or gzip-compressed) to a string.
pub fn read_input(path: &Path) -> Result<String, IoError> {
    let mut reader = open_input(path)?;
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    String::from_utf8(bytes).map_err(|_| IoError::NotUtf8(path.display().to_string()))
}

/// Save string to a file, creating parent directories.
pub fn save_str(path: &Path, data: &str) -> Result<(), IoError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    file.write_all(data.as_bytes())?;
    Ok(())
}

/// `dir/{prefix}_YYYYMMDD_HHMMSS.{extension}`
pub fn timestamped_path(dir: &Path, prefix: &str, time: &DateTime<Local>, extension: &str) -> PathBuf {
    dir.join(format!("{}_{}.{}", prefix, time.format("%Y%m%d_%H%M%S"), extension))
}

/// Write the report as pretty JSON, named after its processing time.
pub fn write_report(dir: &Path, report: &AnalysisReport) -> Result<PathBuf, IoError> {
    let path = timestamped_path(dir, REPORT_PREFIX, &report.processing_time, "json");
    save_str(&path, &serde_json::to_string_pretty(report)?)?;
    info!(path = %path.display(), "report written");
    Ok(path)
}

/// Write a rendered dashboard page next to the report it belongs to.
pub fn write_html(dir: &Path, time: &DateTime<Local>, html: &str) -> Result<PathBuf, IoError> {
    let path = timestamped_path(dir, DASHBOARD_PREFIX, time, "html");
    save_str(&path, html)?;
    info!(path = %path.display(), "dashboard written");
    Ok(path)
}

/// Write a standalone plan, as produced for an externally supplied payload.
pub fn write_plan(dir: &Path, time: &DateTime<Local>, plan: &VisualizationPlan) -> Result<PathBuf, IoError> {
    let path = timestamped_path(dir, PLAN_PREFIX, time, "json");
    save_str(&path, &serde_json::to_string_pretty(plan)?)?;
    info!(path = %path.display(), "plan written");
    Ok(path)
}

fn is_gzip(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("gz"))
}

/// Reject files whose extension names a non-text type. Unknown extensions are allowed.
fn check_text_type(path: &Path) -> Result<(), IoError> {
    // `notes.txt.gz` is judged by `notes.txt`.
    let inner = if is_gzip(path) {
        path.file_stem().map(PathBuf::from).unwrap_or_default()
    } else {
        path.to_path_buf()
    };
    match mime_guess::from_path(&inner).first() {
        Some(mime) if !is_textual(&mime) => Err(IoError::UnsupportedFileType(path.display().to_string())),
        _ => Ok(()),
    }
}

fn is_textual(mime: &mime_guess::Mime) -> bool {
    mime.type_() == mime_guess::mime::TEXT
        || matches!(mime.subtype().as_str(), "json" | "xml" | "x-yaml" | "yaml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use tempfile::tempdir;

    #[test]
    fn test_save_and_read_input() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("nested").join("input.txt");

        save_str(&file_path, "公司营收增长20%").expect("Failed to save data");
        let loaded = read_input(&file_path).expect("Failed to load string");
        assert_eq!(loaded, "公司营收增长20%");
    }

    #[test]
    fn test_read_gzip_input() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("input.txt.gz");

        let mut encoder = GzEncoder::new(File::create(&file_path).unwrap(), Compression::default());
        encoder.write_all("压缩的文本".as_bytes()).unwrap();
        encoder.finish().unwrap();

        assert_eq!(read_input(&file_path).unwrap(), "压缩的文本");
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = read_input(Path::new("nonexistent_file_123456789.txt"));
        assert!(matches!(result, Err(IoError::Io(_))));
    }

    #[test]
    fn test_rejects_binary_types() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("photo.png");
        fs::write(&file_path, [0x89, 0x50, 0x4e, 0x47]).unwrap();

        assert!(matches!(read_input(&file_path), Err(IoError::UnsupportedFileType(_))));
        assert!(check_text_type(Path::new("report.pdf.gz")).is_err());
        assert!(check_text_type(Path::new("payload.json")).is_ok());
        assert!(check_text_type(Path::new("notes")).is_ok());
    }

    #[test]
    fn test_invalid_utf8() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("bad.txt");
        fs::write(&file_path, [0xff, 0xfe, 0xfd]).unwrap();
        assert!(matches!(read_input(&file_path), Err(IoError::NotUtf8(_))));
    }

    #[test]
    fn test_timestamped_path() {
        let time = chrono::TimeZone::with_ymd_and_hms(&Local, 2024, 3, 5, 9, 7, 1).unwrap();
        let path = timestamped_path(Path::new("out"), REPORT_PREFIX, &time, "json");
        assert_eq!(path, Path::new("out/analysis_result_20240305_090701.json"));
    }

    #[test]
    fn test_write_plan() {
        let dir = tempdir().unwrap();
        let plan = crate::planner::error_plan("bad");
        let path = write_plan(dir.path(), &Local::now(), &plan).unwrap();

        let written: serde_json::Value = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(written["visualizations"][0]["card_id"], "error_card");
    }
}

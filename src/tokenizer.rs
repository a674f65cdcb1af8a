use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use jieba_rs::Jieba;
use lazy_static::lazy_static;
use once_cell::sync::OnceCell;
use regex::Regex;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum TokenizerError {
    #[error("Failed to open user dictionary {path}: {source}")]
    DictionaryIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid user dictionary {path}: {message}")]
    InvalidDictionary { path: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    Word,
    Number,
    Punctuation,
    Whitespace,
}

lazy_static! {
    static ref DIGITS_REGEX: Regex = Regex::new(r"^[0-9]+(?:\.[0-9]+)?$").unwrap();
    static ref SENTENCE_DELIMITER_REGEX: Regex = Regex::new(r"[。！？.!?]").unwrap();
}

static SEGMENTER: OnceCell<Segmenter> = OnceCell::new();

/// Dictionary-based word segmenter shared by the whole process.
///
/// Built once by [`initialize`] (or lazily by [`segmenter`]) and read-only
/// afterwards, so it can be used from any number of threads.
pub struct Segmenter {
    jieba: Jieba,
}

impl std::fmt::Debug for Segmenter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Segmenter").finish_non_exhaustive()
    }
}

impl Segmenter {
    fn load(user_dictionary: Option<&Path>) -> Result<Self, TokenizerError> {
        let mut jieba = Jieba::new();
        if let Some(path) = user_dictionary {
            let shown = path.display().to_string();
            let file = File::open(path).map_err(|source| TokenizerError::DictionaryIo {
                path: shown.clone(),
                source,
            })?;
            jieba
                .load_dict(&mut BufReader::new(file))
                .map_err(|e| TokenizerError::InvalidDictionary {
                    path: shown.clone(),
                    message: format!("{:?}", e),
                })?;
            info!(path = %shown, "loaded user dictionary");
        }
        Ok(Self { jieba })
    }

    /// Split `text` into word tokens. Concatenating the result gives back `text`.
    pub fn cut<'a>(&self, text: &'a str) -> Vec<&'a str> {
        self.jieba.cut(text, true)
    }
}

/// Build the process-wide segmenter. Repeated calls return the existing instance.
pub fn initialize() -> &'static Segmenter {
    SEGMENTER.get_or_init(|| {
        info!("initializing segmentation dictionary");
        // Loading the bundled dictionary cannot fail.
        Segmenter { jieba: Jieba::new() }
    })
}

/// Like [`initialize`], with extra entries from a jieba-format user dictionary.
///
/// The dictionary only takes effect if this is the first initialization.
pub fn initialize_with_dictionary(path: &Path) -> Result<&'static Segmenter, TokenizerError> {
    if let Some(existing) = SEGMENTER.get() {
        warn!(path = %path.display(), "segmenter already initialized, user dictionary ignored");
        return Ok(existing);
    }
    SEGMENTER.get_or_try_init(|| {
        info!("initializing segmentation dictionary");
        Segmenter::load(Some(path))
    })
}

/// Shared segmenter handle, initializing on first use.
pub fn segmenter() -> &'static Segmenter {
    if SEGMENTER.get().is_none() {
        debug!("segmenter requested before explicit initialization");
    }
    initialize()
}

/// Classify a segmented token.
pub fn classify(token: &str) -> TokenType {
    if token.trim().is_empty() {
        TokenType::Whitespace
    } else if DIGITS_REGEX.is_match(token) {
        TokenType::Number
    } else if token.chars().any(char::is_alphanumeric) {
        TokenType::Word
    } else {
        TokenType::Punctuation
    }
}

/// Segment `text` into tokens.
pub fn tokenize(text: &str) -> Vec<&str> {
    segmenter().cut(text)
}

/// Sentence fragments split on CJK and Latin sentence-final punctuation, empty fragments dropped.
pub fn split_sentences(text: &str) -> Vec<&str> {
    SENTENCE_DELIMITER_REGEX
        .split(text)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Whitespace-delimited word count.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_cut_covers_input() {
        let text = "人工智能技术正在快速发展。机器学习、深度学习不断突破。";
        let tokens = tokenize(text);

        assert!(tokens.len() > 1);
        assert_eq!(tokens.concat(), text);
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let first = initialize() as *const Segmenter;
        let second = initialize() as *const Segmenter;
        assert_eq!(first, second);
        assert_eq!(segmenter() as *const Segmenter, first);
    }

    #[test]
    fn test_dictionary_after_initialization_is_ignored() {
        initialize();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "量贩零食 10 n").unwrap();

        let result = initialize_with_dictionary(file.path());
        assert!(result.is_ok());
    }

    #[test]
    fn test_load_user_dictionary() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "量贩零食 100000 n").unwrap();

        let segmenter = Segmenter::load(Some(file.path())).unwrap();
        assert!(segmenter.cut("量贩零食门店").contains(&"量贩零食"));

        match Segmenter::load(Some(Path::new("/definitely/not/here.dict"))) {
            Err(TokenizerError::DictionaryIo { path, .. }) => assert!(path.ends_with("here.dict")),
            _ => panic!("expected a dictionary I/O error"),
        }
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify("学习"), TokenType::Word);
        assert_eq!(classify("Rust"), TokenType::Word);
        assert_eq!(classify("2023"), TokenType::Number);
        assert_eq!(classify("5.49"), TokenType::Number);
        assert_eq!(classify("，"), TokenType::Punctuation);
        assert_eq!(classify("……"), TokenType::Punctuation);
        assert_eq!(classify("  "), TokenType::Whitespace);
    }

    #[test]
    fn test_split_sentences() {
        let sentences = split_sentences("第一句。第二句！Third one? 。。  ");
        assert_eq!(sentences, vec!["第一句", "第二句", "Third one"]);
    }

    #[test]
    fn test_split_sentences_empty() {
        assert!(split_sentences("").is_empty());
        assert!(split_sentences("。！？").is_empty());
    }

    #[test]
    fn test_word_count() {
        assert_eq!(word_count("hello  world\nagain"), 3);
        assert_eq!(word_count(""), 0);
        assert_eq!(word_count("没有空格的中文句子"), 1);
    }
}

//! Text extraction: turns uploaded bytes into plain text.
//!
//! Each format is served by an ordered list of strategies. The first strategy
//! producing non-blank text wins; recoverable failures advance the chain,
//! anything else is returned to the caller as-is.

pub mod docx;
pub mod pdf;
pub mod plain;

use std::panic::{self, AssertUnwindSafe};

use thiserror::Error;
use tracing::{debug, warn};

use crate::extraction::docx::DocxStrategy;
use crate::extraction::pdf::{LopdfPageStrategy, PdfExtractStrategy};
use crate::extraction::plain::Utf8Strategy;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("No extractable text: {0}")]
    EmptyContent(String),

    #[error("Corrupt file: {0}")]
    CorruptFile(String),
}

impl ExtractionError {
    /// Stable kind code reported in batch failure lists.
    pub fn kind(&self) -> &'static str {
        match self {
            ExtractionError::UnsupportedFormat(_) => "UnsupportedFormat",
            ExtractionError::EmptyContent(_) => "EmptyContent",
            ExtractionError::CorruptFile(_) => "CorruptFile",
        }
    }

    /// Whether the next strategy in the chain may still succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ExtractionError::EmptyContent(_) | ExtractionError::CorruptFile(_)
        )
    }

    fn specificity(&self) -> u8 {
        match self {
            ExtractionError::EmptyContent(_) => 1,
            ExtractionError::CorruptFile(_) => 2,
            ExtractionError::UnsupportedFormat(_) => 3,
        }
    }
}

/// Format family a document is routed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentClass {
    Pdf,
    WordProcessing,
    PlainText,
}

impl DocumentClass {
    /// Routes on declared media type first, then file extension.
    /// Anything unrecognised is treated as plain text.
    pub fn detect(declared_type: &str, filename: &str) -> Self {
        let media = declared_type.to_ascii_lowercase();
        let name = filename.to_ascii_lowercase();

        if media == "application/pdf" || name.ends_with(".pdf") {
            DocumentClass::Pdf
        } else if media.contains("wordprocessingml") || name.ends_with(".docx") {
            DocumentClass::WordProcessing
        } else {
            DocumentClass::PlainText
        }
    }
}

/// A single way of reading text out of one or more format classes.
pub trait ExtractionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn supports(&self, class: DocumentClass) -> bool;

    /// Returns the raw text. Blank output is allowed; the chain decides what it means.
    fn try_extract(&self, bytes: &[u8]) -> Result<String, ExtractionError>;
}

/// Extraction outcome in the flat shape callers report on.
/// `success` implies `text` is non-blank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedDocument {
    pub text: String,
    pub success: bool,
    pub error: Option<ExtractionError>,
}

impl ExtractedDocument {
    /// Back to a `Result` for callers that propagate with `?`.
    pub fn into_result(self) -> Result<String, ExtractionError> {
        match (self.success, self.error) {
            (true, _) => Ok(self.text),
            (false, Some(e)) => Err(e),
            (false, None) => Err(ExtractionError::EmptyContent(
                "extraction reported no text".to_string(),
            )),
        }
    }
}

impl From<Result<String, ExtractionError>> for ExtractedDocument {
    fn from(result: Result<String, ExtractionError>) -> Self {
        match result {
            Ok(text) => Self {
                text,
                success: true,
                error: None,
            },
            Err(e) => Self {
                text: String::new(),
                success: false,
                error: Some(e),
            },
        }
    }
}

/// Ordered strategy chain. Construction order is priority order.
pub struct TextExtractor {
    strategies: Vec<Box<dyn ExtractionStrategy>>,
}

impl Default for TextExtractor {
    fn default() -> Self {
        Self::with_strategies(vec![
            Box::new(LopdfPageStrategy),
            Box::new(PdfExtractStrategy),
            Box::new(DocxStrategy),
            Box::new(Utf8Strategy),
        ])
    }
}

impl TextExtractor {
    pub fn with_strategies(strategies: Vec<Box<dyn ExtractionStrategy>>) -> Self {
        Self { strategies }
    }

    /// Never fails: every outcome, including a panicking parser, is folded into the result.
    pub fn extract(&self, bytes: &[u8], declared_type: &str, filename: &str) -> ExtractedDocument {
        self.try_extract(bytes, declared_type, filename).into()
    }

    /// Runs the chain for the document's class and returns trimmed text.
    pub fn try_extract(
        &self,
        bytes: &[u8],
        declared_type: &str,
        filename: &str,
    ) -> Result<String, ExtractionError> {
        let class = DocumentClass::detect(declared_type, filename);
        let mut captured: Option<ExtractionError> = None;

        for strategy in self.strategies.iter().filter(|s| s.supports(class)) {
            let error = match run_contained(strategy.as_ref(), bytes, filename) {
                Ok(text) if !text.trim().is_empty() => {
                    debug!(
                        filename,
                        strategy = strategy.name(),
                        chars = text.len(),
                        "Extraction succeeded"
                    );
                    return Ok(text.trim().to_string());
                }
                Ok(_) => ExtractionError::EmptyContent(format!(
                    "{} found no text in {filename}",
                    strategy.name()
                )),
                Err(e) if e.is_recoverable() => e,
                Err(e) => return Err(e),
            };

            debug!(filename, strategy = strategy.name(), error = %error, "Strategy failed, trying next");
            if captured
                .as_ref()
                .map_or(true, |c| error.specificity() > c.specificity())
            {
                captured = Some(error);
            }
        }

        Err(captured.unwrap_or_else(|| {
            ExtractionError::EmptyContent(format!("no extractable text in {filename}"))
        }))
    }
}

/// Third-party parsers can panic on malformed input. A panic becomes a
/// recoverable `CorruptFile` so the next strategy still gets its turn.
fn run_contained(
    strategy: &dyn ExtractionStrategy,
    bytes: &[u8],
    filename: &str,
) -> Result<String, ExtractionError> {
    panic::catch_unwind(AssertUnwindSafe(|| strategy.try_extract(bytes))).unwrap_or_else(|_| {
        warn!(filename, strategy = strategy.name(), "Strategy panicked");
        Err(ExtractionError::CorruptFile(format!(
            "{} panicked while reading {filename}",
            strategy.name()
        )))
    })
}

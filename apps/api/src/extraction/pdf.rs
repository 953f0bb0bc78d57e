use std::fmt::Display;
use std::panic::{self, AssertUnwindSafe};

use lopdf::Document;
use tracing::debug;

use super::{DocumentClass, ExtractionError, ExtractionStrategy};

/// Primary PDF strategy: reads the text layer page by page with lopdf.
/// A page that fails to decode is skipped; the rest of the document still counts.
pub struct LopdfPageStrategy;

impl ExtractionStrategy for LopdfPageStrategy {
    fn name(&self) -> &'static str {
        "lopdf"
    }

    fn supports(&self, class: DocumentClass) -> bool {
        class == DocumentClass::Pdf
    }

    fn try_extract(&self, bytes: &[u8]) -> Result<String, ExtractionError> {
        let doc = Document::load_mem(bytes)
            .map_err(|e| ExtractionError::CorruptFile(format!("lopdf could not open PDF: {e}")))?;

        let pages = doc.get_pages();
        Ok(join_readable_pages(
            pages.keys().map(|&number| (number, doc.extract_text(&[number]))),
        ))
    }
}

/// Fallback PDF strategy using pdf-extract, which copes with some font
/// encodings lopdf's text extraction does not.
pub struct PdfExtractStrategy;

impl ExtractionStrategy for PdfExtractStrategy {
    fn name(&self) -> &'static str {
        "pdf-extract"
    }

    fn supports(&self, class: DocumentClass) -> bool {
        class == DocumentClass::Pdf
    }

    fn try_extract(&self, bytes: &[u8]) -> Result<String, ExtractionError> {
        // pdf-extract panics on some malformed inputs instead of returning an error.
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            pdf_extract::extract_text_from_mem_by_pages(bytes)
        }));

        match outcome {
            Ok(Ok(pages)) => Ok(join_readable_pages(
                pages
                    .into_iter()
                    .enumerate()
                    .map(|(i, text)| (i as u32 + 1, Ok::<_, ExtractionError>(text))),
            )),
            Ok(Err(e)) => Err(ExtractionError::CorruptFile(format!(
                "pdf-extract could not read PDF: {e}"
            ))),
            Err(_) => Err(ExtractionError::CorruptFile(
                "pdf-extract aborted while reading PDF".to_string(),
            )),
        }
    }
}

/// Concatenates the pages that decoded, in page order, skipping failures and blank pages.
pub(crate) fn join_readable_pages<I, E>(pages: I) -> String
where
    I: IntoIterator<Item = (u32, Result<String, E>)>,
    E: Display,
{
    let mut readable = Vec::new();

    for (number, page) in pages {
        match page {
            Ok(text) if !text.trim().is_empty() => readable.push(text.trim().to_string()),
            Ok(_) => debug!(page = number, "PDF page has no text layer"),
            Err(e) => debug!(page = number, error = %e, "Skipping unreadable PDF page"),
        }
    }

    readable.join("\n")
}

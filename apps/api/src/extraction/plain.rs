use super::{DocumentClass, ExtractionError, ExtractionStrategy};

/// Plain text: strict UTF-8, leading BOM dropped.
pub struct Utf8Strategy;

impl ExtractionStrategy for Utf8Strategy {
    fn name(&self) -> &'static str {
        "utf8"
    }

    fn supports(&self, class: DocumentClass) -> bool {
        class == DocumentClass::PlainText
    }

    fn try_extract(&self, bytes: &[u8]) -> Result<String, ExtractionError> {
        let text = std::str::from_utf8(bytes).map_err(|e| {
            ExtractionError::UnsupportedFormat(format!("file is not UTF-8 text: {e}"))
        })?;
        Ok(text.trim_start_matches('\u{feff}').to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::TextExtractor;

    #[test]
    fn test_decodes_utf8_and_strips_bom() {
        let bytes = "\u{feff}Zoë Müller\nRust".as_bytes();
        assert_eq!(Utf8Strategy.try_extract(bytes).unwrap(), "Zoë Müller\nRust");
    }

    #[test]
    fn test_invalid_utf8_is_unsupported_format() {
        let err = Utf8Strategy.try_extract(&[0xc3, 0x28, 0xa0]).unwrap_err();
        assert_eq!(err.kind(), "UnsupportedFormat");
    }

    #[test]
    fn test_whitespace_only_file_is_empty_content() {
        let err = TextExtractor::default()
            .try_extract(b" \r\n\t", "text/plain", "empty.txt")
            .unwrap_err();
        assert_eq!(err.kind(), "EmptyContent");
    }
}

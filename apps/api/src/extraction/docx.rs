use docx_rs::{
    DocumentChild, Paragraph, ParagraphChild, RunChild, Table, TableCellContent, TableChild,
    TableRowChild,
};

use super::{DocumentClass, ExtractionError, ExtractionStrategy};

/// Word-processing documents: one output line per paragraph, table rows as `a | b | c`.
pub struct DocxStrategy;

impl ExtractionStrategy for DocxStrategy {
    fn name(&self) -> &'static str {
        "docx-rs"
    }

    fn supports(&self, class: DocumentClass) -> bool {
        class == DocumentClass::WordProcessing
    }

    fn try_extract(&self, bytes: &[u8]) -> Result<String, ExtractionError> {
        let docx = docx_rs::read_docx(bytes)
            .map_err(|e| ExtractionError::CorruptFile(format!("cannot open DOCX container: {e}")))?;

        let mut lines: Vec<String> = Vec::new();
        for child in &docx.document.children {
            match child {
                // Blank paragraphs become empty lines.
                DocumentChild::Paragraph(p) => lines.push(paragraph_text(p)),
                DocumentChild::Table(t) => lines.extend(table_rows(t)),
                _ => {}
            }
        }

        Ok(lines.join("\n"))
    }
}

fn paragraph_text(p: &Paragraph) -> String {
    let mut text = String::new();

    for child in &p.children {
        match child {
            ParagraphChild::Run(r) => {
                for run_child in &r.children {
                    match run_child {
                        RunChild::Text(t) => text.push_str(&t.text),
                        RunChild::Tab(_) => text.push('\t'),
                        RunChild::Break(_) => text.push('\n'),
                        _ => {}
                    }
                }
            }
            // Contact lines in resumes are often hyperlinks.
            ParagraphChild::Hyperlink(h) => {
                for child in &h.children {
                    if let ParagraphChild::Run(r) = child {
                        for run_child in &r.children {
                            if let RunChild::Text(t) = run_child {
                                text.push_str(&t.text);
                            }
                        }
                    }
                }
            }
            _ => {}
        }
    }

    text
}

fn table_rows(t: &Table) -> Vec<String> {
    let mut rows = Vec::new();

    for row in &t.rows {
        let TableChild::TableRow(r) = row;
        let cells: Vec<String> = r
            .cells
            .iter()
            .map(|cell| {
                let TableRowChild::TableCell(c) = cell;
                c.children
                    .iter()
                    .filter_map(|content| match content {
                        TableCellContent::Paragraph(p) => Some(paragraph_text(p)),
                        _ => None,
                    })
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect();

        if cells.iter().any(|c| !c.is_empty()) {
            rows.push(cells.join(" | "));
        }
    }

    rows
}

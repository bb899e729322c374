use anyhow::{Context, Result};
use std::path::Path;

use super::Segment;

/// Extract page-tagged text segments from a PDF file.
///
/// Falls back to a single untagged segment when per-page extraction fails
/// but whole-document extraction still works (some malformed editais).
pub fn parse(path: &Path) -> Result<Vec<Segment>> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read PDF file: {}", path.display()))?;

    match pdf_extract::extract_text_from_mem_by_pages(&bytes) {
        Ok(pages) => Ok(pages
            .iter()
            .enumerate()
            .map(|(i, text)| Segment {
                text: normalize_page_text(text),
                page_number: Some(i as i64 + 1),
            })
            .filter(|s| !s.text.is_empty())
            .collect()),
        Err(page_err) => {
            tracing::warn!("per-page PDF extraction failed ({page_err}), retrying whole-document");
            let text = pdf_extract::extract_text_from_mem(&bytes)
                .with_context(|| format!("Failed to extract text from PDF: {}", path.display()))?;
            Ok(vec![Segment {
                text: normalize_page_text(&text),
                page_number: None,
            }])
        }
    }
}

/// Compact the extractor's output for the chunker: blank lines go away,
/// runs of whitespace collapse to one space, and extraction artifacts
/// (NUL, BOM, soft hyphens) are dropped in the same pass.
fn normalize_page_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.lines() {
        let mut cleaned = String::new();
        let mut pending_space = false;
        for c in line.chars() {
            match c {
                '\u{0}' | '\u{FEFF}' | '\u{AD}' => {}
                c if c.is_whitespace() => pending_space = true,
                c => {
                    if pending_space && !cleaned.is_empty() {
                        cleaned.push(' ');
                    }
                    pending_space = false;
                    cleaned.push(c);
                }
            }
        }
        if !cleaned.is_empty() {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(&cleaned);
        }
    }
    out
}

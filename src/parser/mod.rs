mod chunker;
mod csv;
mod pdf;

use anyhow::Result;
use serde::Serialize;
use std::path::Path;

pub use chunker::{Chunker, NormalizedChunk, SectionHint};

/// An ordered slice of the source document as produced by the parser.
///
/// PDFs yield one segment per page; CSVs yield one segment per row-group
/// with no page number.
#[derive(Debug, Clone, Serialize)]
pub struct Segment {
    pub text: String,
    pub page_number: Option<i64>,
}

/// Parse a downloaded file into ordered segments.
///
/// The file type is inferred from the original file name, not from the
/// temporary path the download landed on.
pub fn parse(path: &Path, file_name: &str) -> Result<Vec<Segment>> {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    let segments = match extension.as_str() {
        "pdf" => pdf::parse(path)?,
        "csv" => csv::parse(path)?,
        _ => anyhow::bail!("unsupported file type: '{}' ({})", extension, file_name),
    };

    if segments.iter().all(|s| s.text.trim().is_empty()) {
        anyhow::bail!("no text extracted from {}", file_name);
    }

    Ok(segments)
}

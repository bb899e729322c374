use anyhow::{Context, Result};
use std::path::Path;

use super::Segment;

/// Logical rows folded into one segment. Editais exported as spreadsheets
/// carry one requirement per row; grouping keeps segments chunk-sized.
const ROWS_PER_SEGMENT: usize = 20;

/// Parse a CSV file into row-group segments with no page numbers.
///
/// The header row is prepended to every group so each segment stays
/// self-describing for retrieval.
pub fn parse(path: &Path) -> Result<Vec<Segment>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open CSV file: {}", path.display()))?;

    let header_line = match reader.headers() {
        Ok(headers) => headers.iter().collect::<Vec<_>>().join(" | "),
        Err(_) => String::new(),
    };

    let mut segments = Vec::new();
    let mut group: Vec<String> = Vec::new();

    for record in reader.records() {
        let record = record.context("Failed to read CSV record")?;
        let line = record
            .iter()
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .collect::<Vec<_>>()
            .join(" | ");
        if line.is_empty() {
            continue;
        }
        group.push(line);

        if group.len() == ROWS_PER_SEGMENT {
            segments.push(make_segment(&header_line, &group));
            group.clear();
        }
    }
    if !group.is_empty() {
        segments.push(make_segment(&header_line, &group));
    }

    Ok(segments)
}

fn make_segment(header: &str, rows: &[String]) -> Segment {
    let mut text = String::new();
    if !header.is_empty() {
        text.push_str(header);
        text.push('\n');
    }
    text.push_str(&rows.join("\n"));
    Segment {
        text,
        page_number: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(rows: usize) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "item,descricao,valor").unwrap();
        for i in 0..rows {
            writeln!(file, "{i},Serviço de limpeza {i},\"1.234,56\"").unwrap();
        }
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_groups_rows_into_segments() {
        let file = write_csv(45);
        let segments = parse(file.path()).unwrap();
        assert_eq!(segments.len(), 3); // 20 + 20 + 5
        assert!(segments.iter().all(|s| s.page_number.is_none()));
        assert!(segments[0].text.starts_with("item | descricao | valor"));
        assert!(segments[2].text.contains("Serviço de limpeza 44"));
    }

    #[test]
    fn test_small_csv_yields_single_segment() {
        let file = write_csv(5);
        let segments = parse(file.path()).unwrap();
        assert_eq!(segments.len(), 1);
    }

    #[test]
    fn test_empty_csv_yields_no_segments() {
        let file = write_csv(0);
        let segments = parse(file.path()).unwrap();
        assert!(segments.is_empty());
    }
}

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::Segment;

/// Heading-derived section tag on a chunk, used to match chunks to
/// checklist blocks during retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionHint {
    Documentos,
    Prazos,
    SessaoDisputa,
    Proposta,
    Pagamento,
    Modalidade,
    Analise,
    Edital,
}

impl SectionHint {
    /// Portuguese phrase appended to a block's retrieval query when the
    /// block carries this hint.
    pub fn query_phrase(self) -> &'static str {
        match self {
            Self::Documentos => "documentos de habilitação exigidos",
            Self::Prazos => "prazos e datas limites",
            Self::SessaoDisputa => "sessão pública de disputa de lances",
            Self::Proposta => "apresentação da proposta comercial",
            Self::Pagamento => "condições e forma de pagamento",
            Self::Modalidade => "modalidade da licitação e condições de participação",
            Self::Analise => "resumo geral do edital",
            Self::Edital => "identificação do edital e órgão licitante",
        }
    }
}

/// A retrieval-ready chunk of the document stream.
#[derive(Debug, Clone)]
pub struct NormalizedChunk {
    pub id: usize,
    pub text: String,
    /// Best-effort page of the first character this chunk covers.
    pub page_number: Option<i64>,
    pub section_hint: Option<SectionHint>,
    /// Filled by the embedder; empty until then.
    pub embedding: Vec<f32>,
}

/// Re-segments parser output into overlapping, section-tagged chunks.
///
/// Chunks run `min_chars..=max_chars` characters (the last may be shorter),
/// carry a suffix of the previous chunk as prefix overlap, and never break
/// mid-word or mid-number where avoidable.
pub struct Chunker {
    min_chars: usize,
    max_chars: usize,
    overlap_chars: usize,
    hint_patterns: Vec<(Regex, SectionHint)>,
}

/// Optional clause numbering ("10.2 -") and article ("DA", "DOS", ...)
/// before the keyword, anchored to a line start.
const HEADING_PREFIX: &str = r"(?im)^\s*(?:\d+[\d.]*\s*[-–.)]?\s*)?(?:D[AEO]S?\s+)?";

impl Chunker {
    pub fn new(min_chars: usize, max_chars: usize, overlap_chars: usize) -> Self {
        // Table order is the tie-break: the first matching pattern wins.
        let table: [(&str, SectionHint); 8] = [
            (r"(?:DOCUMENTA[ÇC][ÃA]O|HABILITA[ÇC][ÃA]O)", SectionHint::Documentos),
            (r"(?:PRAZOS?\b|IMPUGNA[ÇC][ÃA]O|ESCLARECIMENTOS?)", SectionHint::Prazos),
            (r"(?:SESS[ÃA]O|DISPUTA|LANCES)", SectionHint::SessaoDisputa),
            (r"PROPOSTAS?\b", SectionHint::Proposta),
            (r"(?:PAGAMENTO|DOTA[ÇC][ÃA]O)", SectionHint::Pagamento),
            (r"(?:MODALIDADE|PREG[ÃA]O|CONCORR[ÊE]NCIA)", SectionHint::Modalidade),
            (r"AN[ÁA]LISE", SectionHint::Analise),
            (r"(?:EDITAL|OBJETO)", SectionHint::Edital),
        ];
        let hint_patterns = table
            .into_iter()
            .map(|(pattern, hint)| {
                let re = Regex::new(&format!("{HEADING_PREFIX}{pattern}"))
                    .expect("valid heading pattern");
                (re, hint)
            })
            .collect();

        Self {
            min_chars,
            max_chars,
            overlap_chars,
            hint_patterns,
        }
    }

    /// Merge consecutive segments into overlapping chunks.
    pub fn chunk(&self, segments: &[Segment]) -> Vec<NormalizedChunk> {
        // One contiguous character stream; segment starts remembered for
        // page attribution.
        let mut chars: Vec<char> = Vec::new();
        let mut pages: Vec<(usize, Option<i64>)> = Vec::new();
        for segment in segments {
            let text = segment.text.trim();
            if text.is_empty() {
                continue;
            }
            if !chars.is_empty() {
                chars.push('\n');
            }
            pages.push((chars.len(), segment.page_number));
            chars.extend(text.chars());
        }

        let total = chars.len();
        if total == 0 {
            return Vec::new();
        }

        let mut chunks: Vec<NormalizedChunk> = Vec::new();
        let mut overlap: Vec<char> = Vec::new();
        let mut body_start = 0usize;

        loop {
            let budget = self.max_chars - overlap.len();
            let remaining = total - body_start;
            let body_end = if remaining <= budget {
                total
            } else {
                let lo = body_start + self.min_chars.saturating_sub(overlap.len()).max(1);
                let hi = body_start + budget;
                find_break(&chars, lo.min(hi), hi)
            };

            let chunk_chars: Vec<char> = overlap
                .iter()
                .chain(chars[body_start..body_end].iter())
                .copied()
                .collect();
            let text: String = chunk_chars.iter().collect();

            let first_covered = body_start.saturating_sub(overlap.len());
            let page_number = page_for_span(&pages, first_covered, body_end);
            let section_hint = self.detect_hint(&text);

            chunks.push(NormalizedChunk {
                id: chunks.len(),
                text,
                page_number,
                section_hint,
                embedding: Vec::new(),
            });

            if body_end >= total {
                break;
            }
            let keep = self.overlap_chars.min(chunk_chars.len());
            overlap = chunk_chars[chunk_chars.len() - keep..].to_vec();
            body_start = body_end;
        }

        chunks
    }

    fn detect_hint(&self, text: &str) -> Option<SectionHint> {
        self.hint_patterns
            .iter()
            .find(|(re, _)| re.is_match(text))
            .map(|(_, hint)| *hint)
    }
}

/// Pick a break position in `[lo, hi]`: sentence boundary first, then any
/// whitespace, then any non-mid-word position, then a hard cut at `hi`.
/// A position between two digits is never chosen unless unavoidable.
fn find_break(chars: &[char], lo: usize, hi: usize) -> usize {
    debug_assert!(lo <= hi && hi < chars.len());

    for p in (lo..=hi).rev() {
        if splits_number(chars, p) {
            continue;
        }
        if is_sentence_break(chars, p) {
            return p;
        }
    }
    for p in (lo..=hi).rev() {
        if splits_number(chars, p) {
            continue;
        }
        if chars[p - 1].is_whitespace() || chars[p].is_whitespace() {
            return p;
        }
    }
    for p in (lo..=hi).rev() {
        if splits_number(chars, p) {
            continue;
        }
        if !(chars[p - 1].is_alphanumeric() && chars[p].is_alphanumeric()) {
            return p;
        }
    }
    hi
}

fn is_sentence_break(chars: &[char], p: usize) -> bool {
    let before = chars[p - 1];
    before == '.' || before == ';' || (before == '\n' && chars[p].is_uppercase())
}

/// True when breaking at `p` would land inside a numeric token such as
/// "1.234,56" or "10/05/2024".
fn splits_number(chars: &[char], p: usize) -> bool {
    let joins = |c: char| c.is_ascii_digit() || matches!(c, '.' | ',' | '/');
    chars[p - 1].is_ascii_digit() && joins(chars[p])
        || joins(chars[p - 1]) && chars[p].is_ascii_digit()
}

/// Earliest known page among the segments covering `[start, end)`.
fn page_for_span(pages: &[(usize, Option<i64>)], start: usize, end: usize) -> Option<i64> {
    let mut candidate = None;
    for (i, (offset, page)) in pages.iter().enumerate() {
        let next_offset = pages.get(i + 1).map_or(usize::MAX, |(o, _)| *o);
        if *offset < end && next_offset > start {
            if page.is_some() {
                return *page;
            }
            candidate = *page;
        }
    }
    candidate
}

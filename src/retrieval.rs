use crate::parser::{NormalizedChunk, SectionHint};

/// Multiplier applied when a chunk's heading-derived hint matches one of
/// the block's hints.
const SECTION_HINT_BOOST: f32 = 1.15;

/// Retrieval knobs, read from settings once per job.
#[derive(Debug, Clone, Copy)]
pub struct RetrievalParams {
    pub top_k: usize,
    pub top_n_for_mmr: usize,
    pub mmr_lambda: f32,
}

#[derive(Clone, Copy)]
struct Scored<'a> {
    chunk: &'a NormalizedChunk,
    score: f32,
}

/// Select a diverse top-K of chunks for one block.
///
/// Chunks are scored by cosine similarity to the query vector, boosted when
/// their section hint matches the block, then re-ranked with Maximal
/// Marginal Relevance. Returned in MMR selection order.
pub fn retrieve_for_block<'a>(
    chunks: &'a [NormalizedChunk],
    query_vec: &[f32],
    block_hints: &[SectionHint],
    params: RetrievalParams,
) -> Vec<&'a NormalizedChunk> {
    if chunks.is_empty() {
        return Vec::new();
    }

    // Degenerate embeddings carry no signal; keep the document order.
    if chunks.iter().all(|c| is_zero(&c.embedding)) {
        return chunks.iter().take(params.top_k).collect();
    }

    let mut scored: Vec<Scored<'a>> = chunks
        .iter()
        .map(|chunk| {
            let mut score = cosine_similarity(query_vec, &chunk.embedding);
            if chunk
                .section_hint
                .is_some_and(|hint| block_hints.contains(&hint))
            {
                score *= SECTION_HINT_BOOST;
            }
            Scored { chunk, score }
        })
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.chunk.id.cmp(&b.chunk.id))
    });
    scored.truncate(params.top_n_for_mmr);

    mmr_select(&scored, params.mmr_lambda, params.top_k)
}

/// Greedy MMR: start from the highest-scoring candidate, then repeatedly
/// take the candidate maximising `λ·rel − (1−λ)·max_sim_to_selected`.
/// Ties fall back to the relevance ordering of the candidate list.
fn mmr_select<'a>(
    candidates: &[Scored<'a>],
    lambda: f32,
    k: usize,
) -> Vec<&'a NormalizedChunk> {
    let mut selected: Vec<Scored<'a>> = Vec::with_capacity(k.min(candidates.len()));
    let mut remaining: Vec<Scored<'a>> = candidates.to_vec();

    while selected.len() < k && !remaining.is_empty() {
        let best_idx = if selected.is_empty() {
            // Candidates arrive relevance-sorted; the head is the seed.
            0
        } else {
            let mut best = 0usize;
            let mut best_objective = f32::NEG_INFINITY;
            for (i, candidate) in remaining.iter().enumerate() {
                let max_sim = selected
                    .iter()
                    .map(|s| cosine_similarity(&candidate.chunk.embedding, &s.chunk.embedding))
                    .fold(f32::NEG_INFINITY, f32::max);
                let objective = lambda * candidate.score - (1.0 - lambda) * max_sim;
                // Strict '>' keeps the earlier candidate on ties, i.e. the
                // higher original score, then the lower chunk id.
                if objective > best_objective {
                    best_objective = objective;
                    best = i;
                }
            }
            best
        };
        selected.push(remaining.remove(best_idx));
    }

    selected.into_iter().map(|s| s.chunk).collect()
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

fn is_zero(v: &[f32]) -> bool {
    v.iter().all(|x| *x == 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: usize, embedding: Vec<f32>, hint: Option<SectionHint>) -> NormalizedChunk {
        NormalizedChunk {
            id,
            text: format!("chunk {id}"),
            page_number: None,
            section_hint: hint,
            embedding,
        }
    }

    fn params(k: usize, lambda: f32) -> RetrievalParams {
        RetrievalParams {
            top_k: k,
            top_n_for_mmr: 40,
            mmr_lambda: lambda,
        }
    }

    fn unit(angle_deg: f32) -> Vec<f32> {
        let rad = angle_deg.to_radians();
        vec![rad.cos(), rad.sin()]
    }

    #[test]
    fn test_cosine_basics() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
        // Mismatched or zero vectors score zero rather than poisoning ranks.
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_fewer_chunks_than_k_returns_all() {
        let chunks = vec![
            chunk(0, unit(0.0), None),
            chunk(1, unit(10.0), None),
            chunk(2, unit(20.0), None),
        ];
        let result = retrieve_for_block(&chunks, &unit(0.0), &[], params(12, 0.7));
        assert_eq!(result.len(), 3);
    }

    #[test]
    fn test_all_zero_vectors_keep_input_order() {
        let chunks: Vec<NormalizedChunk> =
            (0..5).map(|i| chunk(i, vec![0.0, 0.0], None)).collect();
        let result = retrieve_for_block(&chunks, &unit(0.0), &[], params(3, 0.7));
        let ids: Vec<usize> = result.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn test_lambda_one_is_topk_by_similarity() {
        let chunks = vec![
            chunk(0, unit(50.0), None),
            chunk(1, unit(5.0), None),
            chunk(2, unit(30.0), None),
            chunk(3, unit(10.0), None),
            chunk(4, unit(80.0), None),
        ];
        let result = retrieve_for_block(&chunks, &unit(0.0), &[], params(3, 1.0));
        let ids: Vec<usize> = result.iter().map(|c| c.id).collect();
        // Closest angles to the query first.
        assert_eq!(ids, vec![1, 3, 2]);
    }

    #[test]
    fn test_lambda_zero_greedy_diversity() {
        // Two tight groups near 0° and one outlier near 90°. Diversity-only
        // selection must alternate away from whatever is already picked.
        let chunks = vec![
            chunk(0, unit(0.0), None),
            chunk(1, unit(2.0), None),
            chunk(2, unit(90.0), None),
        ];
        let result = retrieve_for_block(&chunks, &unit(0.0), &[], params(2, 0.0));
        let ids: Vec<usize> = result.iter().map(|c| c.id).collect();
        // Seed is the most relevant (id 0); the next pick minimises the
        // maximum similarity to the seed, which is the 90° outlier.
        assert_eq!(ids, vec![0, 2]);
    }

    #[test]
    fn test_mmr_idempotence() {
        let chunks: Vec<NormalizedChunk> = (0..20)
            .map(|i| chunk(i, unit(i as f32 * 7.0), None))
            .collect();
        let p = params(8, 0.7);
        let first = retrieve_for_block(&chunks, &unit(0.0), &[], p);
        let first_ids: Vec<usize> = first.iter().map(|c| c.id).collect();

        let rerun_input: Vec<NormalizedChunk> = first.iter().map(|c| (*c).clone()).collect();
        let second = retrieve_for_block(&rerun_input, &unit(0.0), &[], p);
        let second_ids: Vec<usize> = second.iter().map(|c| c.id).collect();

        assert_eq!(first_ids, second_ids);
    }

    #[test]
    fn test_section_hint_boost_promotes_chunk() {
        // id 1 is slightly less similar but carries the matching hint.
        let chunks = vec![
            chunk(0, unit(10.0), None),
            chunk(1, unit(14.0), Some(SectionHint::Prazos)),
        ];
        let result = retrieve_for_block(
            &chunks,
            &unit(0.0),
            &[SectionHint::Prazos],
            params(2, 1.0),
        );
        assert_eq!(result[0].id, 1);

        // Without the hint match the order flips back.
        let result = retrieve_for_block(&chunks, &unit(0.0), &[], params(2, 1.0));
        assert_eq!(result[0].id, 0);
    }

    #[test]
    fn test_ties_break_by_chunk_id() {
        let chunks = vec![
            chunk(3, unit(15.0), None),
            chunk(1, unit(15.0), None),
            chunk(2, unit(15.0), None),
        ];
        let result = retrieve_for_block(&chunks, &unit(0.0), &[], params(3, 1.0));
        let ids: Vec<usize> = result.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_pool_truncated_before_mmr() {
        let chunks: Vec<NormalizedChunk> = (0..60)
            .map(|i| chunk(i, unit(i as f32), None))
            .collect();
        let p = RetrievalParams {
            top_k: 12,
            top_n_for_mmr: 40,
            mmr_lambda: 0.7,
        };
        let result = retrieve_for_block(&chunks, &unit(0.0), &[], p);
        assert_eq!(result.len(), 12);
        // Chunks beyond the 40 most relevant never appear.
        assert!(result.iter().all(|c| c.id < 40));
    }
}

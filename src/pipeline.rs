//! Checklist-synthesis pipeline: parse → chunk → embed → retrieve →
//! generate → merge → default → normalise, plus the PDF-native branch that
//! sends the raw file to the provider and skips the retrieval machinery.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde_json::Value;
use tracing::{debug, info};

use crate::checklist::blocks::{BlockSpec, BLOCKS, SYSTEM_PROMPT};
use crate::checklist::defaults::apply_defaults;
use crate::checklist::flatten::FlatBlock;
use crate::checklist::merge::merge_blocks;
use crate::checklist::normalize::normalize_checklist;
use crate::checklist::BlockKey;
use crate::config::Settings;
use crate::error::IngestError;
use crate::llm::{ChatProvider, EmbeddingProvider, FileChatProvider};
use crate::parser::{self, Chunker, NormalizedChunk, Segment};
use crate::retrieval::{retrieve_for_block, RetrievalParams};

/// Bounded fan-out for per-block LLM calls; results are still consumed in
/// the fixed merge order.
const MAX_CONCURRENT_BLOCKS: usize = 4;

pub struct Pipeline {
    settings: Settings,
    chat: Arc<dyn ChatProvider>,
    embedder: Arc<dyn EmbeddingProvider>,
    files: Arc<dyn FileChatProvider>,
}

impl Pipeline {
    pub fn new(
        settings: Settings,
        chat: Arc<dyn ChatProvider>,
        embedder: Arc<dyn EmbeddingProvider>,
        files: Arc<dyn FileChatProvider>,
    ) -> Self {
        Self {
            settings,
            chat,
            embedder,
            files,
        }
    }

    /// Parsed-text pipeline over the eight blocks.
    pub async fn run_text(
        &self,
        path: &Path,
        file_name: &str,
        dump_dir: Option<&Path>,
    ) -> Result<Value, IngestError> {
        let segments = parser::parse(path, file_name).map_err(IngestError::parse)?;
        info!(segments = segments.len(), "document parsed");
        if let Some(dir) = dump_dir {
            dump_segments(dir, &segments);
        }

        let chunker = Chunker::new(
            self.settings.chunk_min_chars,
            self.settings.chunk_max_chars,
            self.settings.chunk_overlap_chars,
        );
        let mut chunks = chunker.chunk(&segments);
        if chunks.is_empty() {
            return Err(IngestError::parse(anyhow::anyhow!(
                "chunker produced no chunks for {file_name}"
            )));
        }
        info!(chunks = chunks.len(), "document chunked");

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self
            .embedder
            .embed_batch(&texts)
            .await
            .map_err(IngestError::embed)?;
        if vectors.len() != chunks.len() {
            return Err(IngestError::embed(anyhow::anyhow!(
                "embedder returned {} vectors for {} chunks",
                vectors.len(),
                chunks.len()
            )));
        }
        for (chunk, vector) in chunks.iter_mut().zip(vectors) {
            chunk.embedding = vector;
        }

        let params = RetrievalParams {
            top_k: self.settings.top_k_retrieval,
            top_n_for_mmr: self.settings.top_n_for_mmr,
            mmr_lambda: self.settings.mmr_lambda,
        };

        let chunks = &chunks;
        let outcomes: Vec<Result<(BlockKey, FlatBlock, Value), IngestError>> =
            futures::stream::iter(BLOCKS.iter())
                .map(|block| self.generate_block(block, chunks, params))
                .buffered(MAX_CONCURRENT_BLOCKS)
                .collect()
                .await;

        let mut flats = Vec::with_capacity(BLOCKS.len());
        for outcome in outcomes {
            let (key, flat, raw) = outcome?;
            if let Some(dir) = dump_dir {
                dump_block(dir, key, &raw);
            }
            flats.push((key, flat));
        }

        Ok(finalize(flats))
    }

    async fn generate_block(
        &self,
        block: &'static BlockSpec,
        chunks: &[NormalizedChunk],
        params: RetrievalParams,
    ) -> Result<(BlockKey, FlatBlock, Value), IngestError> {
        let stage = block.key.as_str();

        let query_vec = self
            .embedder
            .embed_query(&block.search_query())
            .await
            .map_err(IngestError::embed)?;
        let retrieved = retrieve_for_block(chunks, &query_vec, block.hints, params);
        debug!(block = stage, retrieved = retrieved.len(), "retrieval complete");

        let user = block.user_prompt(&retrieved);
        let raw = self
            .chat
            .chat_structured(SYSTEM_PROMPT, &user, &block.schema_name(), &(block.schema)())
            .await
            .map_err(|e| IngestError::block(stage, e))?;

        let flat = (block.flatten)(&raw).map_err(|e| IngestError::block(stage, e))?;
        Ok((block.key, flat, raw))
    }

    /// PDF-native branch: upload the raw file once, then run the eight
    /// block questions against it. No chunking, no embeddings.
    pub async fn run_pdf_native(
        &self,
        path: &Path,
        file_name: &str,
        dump_dir: Option<&Path>,
    ) -> Result<Value, IngestError> {
        let file_ref = self
            .files
            .upload(path, file_name)
            .await
            .map_err(|e| IngestError::block("upload", e))?;
        info!(file_ref = %file_ref, "uploaded PDF for native processing");

        let mut flats = Vec::with_capacity(BLOCKS.len());
        for (i, block) in BLOCKS.iter().enumerate() {
            if i > 0 && self.settings.pdf_block_delay_secs > 0 {
                tokio::time::sleep(Duration::from_secs(self.settings.pdf_block_delay_secs)).await;
            }
            let stage = block.key.as_str();
            let raw = self
                .files
                .respond_with_file(
                    &file_ref,
                    SYSTEM_PROMPT,
                    block.instruction,
                    &block.schema_name(),
                    &(block.schema)(),
                )
                .await
                .map_err(|e| IngestError::block(stage, e))?;
            if let Some(dir) = dump_dir {
                dump_block(dir, block.key, &raw);
            }
            let flat = (block.flatten)(&raw).map_err(|e| IngestError::block(stage, e))?;
            flats.push((block.key, flat));
        }

        Ok(finalize(flats))
    }
}

/// Merge in block order, then default and normalise.
fn finalize(flats: Vec<(BlockKey, FlatBlock)>) -> Value {
    let mut checklist = merge_blocks(&flats);
    apply_defaults(&mut checklist);
    normalize_checklist(&mut checklist);
    checklist
}

fn dump_segments(dir: &Path, segments: &[Segment]) {
    let _ = std::fs::create_dir_all(dir);
    match serde_json::to_vec_pretty(segments) {
        Ok(payload) => {
            if let Err(e) = std::fs::write(dir.join("segments.json"), payload) {
                debug!(error = %e, "failed to dump parse segments");
            }
        }
        Err(e) => debug!(error = %e, "failed to serialise parse segments"),
    }
}

fn dump_block(dir: &Path, key: BlockKey, raw: &Value) {
    let _ = std::fs::create_dir_all(dir);
    let file = dir.join(format!("block_{}.json", key.as_str()));
    match serde_json::to_vec_pretty(raw) {
        Ok(payload) => {
            if let Err(e) = std::fs::write(file, payload) {
                debug!(error = %e, "failed to dump block response");
            }
        }
        Err(e) => debug!(error = %e, "failed to serialise block response"),
    }
}

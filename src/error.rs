use thiserror::Error;

/// Pipeline error, labelled by the stage that produced it.
///
/// Components bubble `anyhow` errors with context; the boundary into the
/// runner wraps them in the matching stage variant so the failure log and
/// the document status transition can name the offending stage. The
/// `{cause:#}` format keeps the full context chain in the message.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Required job field missing. The job is dropped without touching the
    /// document row.
    #[error("invalid job payload: {0}")]
    PayloadInvalid(String),

    /// Document row not found (or no longer claimable). Dropped silently.
    #[error("document not found: {0}")]
    DocumentAbsent(uuid::Uuid),

    #[error("download failed: {cause:#}")]
    Download { cause: anyhow::Error },

    #[error("parse failed: {cause:#}")]
    Parse { cause: anyhow::Error },

    #[error("embedding failed: {cause:#}")]
    Embed { cause: anyhow::Error },

    #[error("block generation failed for '{block}': {cause:#}")]
    BlockGenerate {
        block: &'static str,
        cause: anyhow::Error,
    },

    #[error("persistence failed: {cause:#}")]
    Persist { cause: anyhow::Error },
}

impl IngestError {
    pub fn download(cause: anyhow::Error) -> Self {
        Self::Download { cause }
    }

    pub fn parse(cause: anyhow::Error) -> Self {
        Self::Parse { cause }
    }

    pub fn embed(cause: anyhow::Error) -> Self {
        Self::Embed { cause }
    }

    pub fn block(block: &'static str, cause: anyhow::Error) -> Self {
        Self::BlockGenerate { block, cause }
    }

    pub fn persist(cause: anyhow::Error) -> Self {
        Self::Persist { cause }
    }

    /// Stage label used in structured failure logs.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::PayloadInvalid(_) => "payload",
            Self::DocumentAbsent(_) => "document_lookup",
            Self::Download { .. } => "download",
            Self::Parse { .. } => "parse",
            Self::Embed { .. } => "embed",
            Self::BlockGenerate { .. } => "block_generate",
            Self::Persist { .. } => "persist",
        }
    }

    /// Whether the failure should be recorded on the document row.
    ///
    /// Payload and lookup problems happen before the document is claimed,
    /// so there is nothing to mark `failed`.
    pub fn marks_document_failed(&self) -> bool {
        !matches!(self, Self::PayloadInvalid(_) | Self::DocumentAbsent(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_labels() {
        let e = IngestError::block("prazos", anyhow::anyhow!("bad json"));
        assert_eq!(e.stage(), "block_generate");
        assert!(e.to_string().contains("prazos"));

        let e = IngestError::download(anyhow::anyhow!("timeout"));
        assert_eq!(e.stage(), "download");
    }

    #[test]
    fn test_message_keeps_context_chain() {
        let cause = anyhow::anyhow!("connection refused").context("fetching presigned URL");
        let e = IngestError::download(cause);
        let message = e.to_string();
        assert!(message.contains("fetching presigned URL"));
        assert!(message.contains("connection refused"));
    }

    #[test]
    fn test_pre_claim_errors_do_not_fail_document() {
        assert!(!IngestError::PayloadInvalid("documentId".into()).marks_document_failed());
        assert!(!IngestError::DocumentAbsent(uuid::Uuid::nil()).marks_document_failed());
        assert!(IngestError::parse(anyhow::anyhow!("empty")).marks_document_failed());
    }
}

//! Durable FIFO job queue over Redis.
//!
//! Producers LPUSH onto `document:ingest`; the worker moves one message at
//! a time into a processing list with a blocking `BLMOVE` and removes it
//! with `LREM` only after the terminal database write. A worker crash
//! leaves the message in the processing list for redelivery; redelivered
//! jobs short-circuit on documents already `done`.

use anyhow::{Context, Result};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Direction};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const INGEST_QUEUE: &str = "document:ingest";
const PROCESSING_QUEUE: &str = "document:ingest:processing";
const POP_TIMEOUT_SECS: f64 = 30.0;

/// Payload of one ingestion job as pushed by the upload surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestJob {
    pub document_id: Uuid,
    pub user_id: Uuid,
    pub file_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_pdf_file: Option<bool>,
}

pub struct JobQueue {
    conn: ConnectionManager,
}

impl JobQueue {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).context("invalid REDIS_URL")?;
        let conn = ConnectionManager::new(client)
            .await
            .context("Failed to connect to Redis. Is it running?")?;
        Ok(Self { conn })
    }

    /// Block up to 30 seconds for the next job message. `None` on timeout.
    ///
    /// The raw message is returned so the exact payload can be acknowledged
    /// later; parsing happens at the caller so invalid payloads can still
    /// be acknowledged and dropped.
    pub async fn pop(&mut self) -> Result<Option<String>> {
        let raw: Option<String> = self
            .conn
            .blmove(
                INGEST_QUEUE,
                PROCESSING_QUEUE,
                Direction::Right,
                Direction::Left,
                POP_TIMEOUT_SECS,
            )
            .await
            .context("queue pop failed")?;
        Ok(raw)
    }

    /// Acknowledge a message after its job reached a terminal state.
    pub async fn ack(&mut self, raw: &str) -> Result<()> {
        let _removed: i64 = self
            .conn
            .lrem(PROCESSING_QUEUE, 1, raw)
            .await
            .context("queue ack failed")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_parses_camel_case() {
        let raw = r#"{
            "documentId": "8e38cbe0-3b89-44e0-a9cc-3a8a3e0c3c51",
            "userId": "f0631db3-6d86-4e11-8d4b-7a752e6b2d37",
            "fileUrl": "https://bucket.example/edital.pdf?sig=abc",
            "fileName": "edital.pdf",
            "usePdfFile": true
        }"#;
        let job: IngestJob = serde_json::from_str(raw).unwrap();
        assert_eq!(job.file_name.as_deref(), Some("edital.pdf"));
        assert_eq!(job.use_pdf_file, Some(true));
    }

    #[test]
    fn test_payload_optional_fields_default() {
        let raw = r#"{
            "documentId": "8e38cbe0-3b89-44e0-a9cc-3a8a3e0c3c51",
            "userId": "f0631db3-6d86-4e11-8d4b-7a752e6b2d37",
            "fileUrl": "https://bucket.example/edital.csv"
        }"#;
        let job: IngestJob = serde_json::from_str(raw).unwrap();
        assert!(job.file_name.is_none());
        assert!(job.use_pdf_file.is_none());
    }

    #[test]
    fn test_payload_missing_required_field_rejected() {
        let raw = r#"{ "documentId": "8e38cbe0-3b89-44e0-a9cc-3a8a3e0c3c51" }"#;
        assert!(serde_json::from_str::<IngestJob>(raw).is_err());
    }

    #[test]
    fn test_payload_malformed_uuid_rejected() {
        let raw = r#"{
            "documentId": "not-a-uuid",
            "userId": "f0631db3-6d86-4e11-8d4b-7a752e6b2d37",
            "fileUrl": "https://bucket.example/edital.pdf"
        }"#;
        assert!(serde_json::from_str::<IngestJob>(raw).is_err());
    }
}

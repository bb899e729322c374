//! Postgres repository for the two tables the worker writes.
//!
//! Expected schema (owned by the upload surface, reproduced here for
//! reference):
//!
//! ```sql
//! documents(id uuid PK, user_id uuid, file_name text, status text,
//!           storage_key text, created_at timestamptz)
//! checklists(id uuid PK, user_id uuid, file_name text, data jsonb,
//!            pontuacao int, orgao text, objeto text, valor_total text,
//!            document_id uuid UNIQUE REFERENCES documents(id),
//!            created_at timestamptz)
//! ```
//!
//! The UNIQUE index on `checklists.document_id` is the idempotency
//! guarantee under duplicate queue delivery; inserts go through
//! `ON CONFLICT DO NOTHING`.

use anyhow::{Context, Result};
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use uuid::Uuid;

/// Document lifecycle; transitions are strictly
/// `pending → processing → (done | failed)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentStatus {
    Pending,
    Processing,
    Done,
    Failed,
}

impl DocumentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "done" => Some(Self::Done),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Outcome of the atomic pending → processing claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    Claimed,
    NotFound,
    /// Redelivered job for a finished document; exit without mutation.
    AlreadyDone,
    /// Row exists but is `processing` or `failed`; never re-enter.
    Unclaimable(DocumentStatus),
}

/// New checklist row; scalar columns are extracted from the data tree.
#[derive(Debug, Clone)]
pub struct NewChecklist {
    pub user_id: Uuid,
    pub document_id: Uuid,
    pub file_name: String,
    pub data: Value,
}

pub struct Repository {
    pool: PgPool,
}

impl Repository {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .context("Failed to connect to Postgres. Is DATABASE_URL correct?")?;
        Ok(Self { pool })
    }

    /// Atomically claim a pending document for processing.
    pub async fn claim_document(&self, id: Uuid) -> Result<ClaimOutcome> {
        let updated =
            sqlx::query("UPDATE documents SET status = 'processing' WHERE id = $1 AND status = 'pending'")
                .bind(id)
                .execute(&self.pool)
                .await
                .context("failed to claim document")?;

        if updated.rows_affected() == 1 {
            return Ok(ClaimOutcome::Claimed);
        }

        match self.document_status(id).await? {
            None => Ok(ClaimOutcome::NotFound),
            Some(DocumentStatus::Done) => Ok(ClaimOutcome::AlreadyDone),
            Some(status) => Ok(ClaimOutcome::Unclaimable(status)),
        }
    }

    pub async fn document_status(&self, id: Uuid) -> Result<Option<DocumentStatus>> {
        let row = sqlx::query("SELECT status FROM documents WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("failed to read document status")?;

        match row {
            None => Ok(None),
            Some(row) => {
                let status: String = row.try_get("status")?;
                DocumentStatus::parse(&status)
                    .map(Some)
                    .with_context(|| format!("unknown document status '{status}'"))
            }
        }
    }

    pub async fn mark_document(&self, id: Uuid, status: DocumentStatus) -> Result<()> {
        sqlx::query("UPDATE documents SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to mark document {}", status.as_str()))?;
        Ok(())
    }

    /// Insert the checklist row for a document. Exactly one row may exist
    /// per document; duplicate deliveries fall through the UNIQUE index.
    pub async fn insert_checklist(&self, checklist: &NewChecklist) -> Result<()> {
        let scalars = ChecklistScalars::extract(&checklist.data);
        sqlx::query(
            "INSERT INTO checklists \
                 (id, user_id, file_name, data, pontuacao, orgao, objeto, valor_total, document_id, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, now()) \
             ON CONFLICT (document_id) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(checklist.user_id)
        .bind(&checklist.file_name)
        .bind(&checklist.data)
        .bind(scalars.pontuacao)
        .bind(scalars.orgao)
        .bind(scalars.objeto)
        .bind(scalars.valor_total)
        .bind(checklist.document_id)
        .execute(&self.pool)
        .await
        .context("failed to insert checklist")?;
        Ok(())
    }
}

/// Scalar columns denormalised from the checklist data for listing pages.
#[derive(Debug, Default, PartialEq)]
struct ChecklistScalars {
    pontuacao: Option<i32>,
    orgao: Option<String>,
    objeto: Option<String>,
    valor_total: Option<String>,
}

impl ChecklistScalars {
    fn extract(data: &Value) -> Self {
        Self {
            pontuacao: data
                .get("pontuacao")
                .and_then(Value::as_i64)
                .map(|p| p as i32),
            orgao: non_empty(data.pointer("/edital/orgao")),
            objeto: non_empty(data.pointer("/edital/objeto")),
            valor_total: non_empty(data.pointer("/edital/totalReais"))
                .or_else(|| non_empty(data.pointer("/edital/valorTotal"))),
        }
    }
}

fn non_empty(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

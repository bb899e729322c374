//! The job runner: one cooperative loop, one job at a time.
//!
//! The runner is the single catch point of the pipeline — any stage error
//! becomes a `failed` status transition plus one structured log record.
//! Queue messages are acknowledged only after the job reaches a terminal
//! state, so a crash mid-job causes redelivery; redelivered jobs
//! short-circuit when the document is already `done`.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use tracing::{error, info, warn};

use crate::config::Settings;
use crate::db::{ClaimOutcome, DocumentStatus, NewChecklist, Repository};
use crate::download::download_to_temp;
use crate::error::IngestError;
use crate::pipeline::Pipeline;
use crate::queue::{IngestJob, JobQueue, INGEST_QUEUE};

const DEFAULT_FILE_NAME: &str = "edital.pdf";

pub struct Runner {
    settings: Settings,
    queue: JobQueue,
    repo: Repository,
    pipeline: Pipeline,
    http: reqwest::Client,
}

impl Runner {
    pub fn new(settings: Settings, queue: JobQueue, repo: Repository, pipeline: Pipeline) -> Self {
        Self {
            settings,
            queue,
            repo,
            pipeline,
            http: reqwest::Client::new(),
        }
    }

    /// Consume jobs forever. Queue hiccups are logged and retried; only
    /// startup-grade failures propagate.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        info!(queue = INGEST_QUEUE, "worker started");
        loop {
            let raw = match self.queue.pop().await {
                Ok(Some(raw)) => raw,
                Ok(None) => continue,
                Err(e) => {
                    error!(error = %e, "queue pop failed; retrying");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    continue;
                }
            };

            self.handle_message(&raw).await;

            if let Err(e) = self.queue.ack(&raw).await {
                error!(error = %e, "failed to acknowledge job message");
            }
        }
    }

    async fn handle_message(&self, raw: &str) {
        let (document_id, outcome) = match parse_payload(raw) {
            Ok(job) => {
                let document_id = job.document_id;
                info!(document_id = %document_id, file = job.file_name.as_deref().unwrap_or(DEFAULT_FILE_NAME), "job received");
                (Some(document_id), self.process(job).await)
            }
            Err(e) => (None, Err(e)),
        };

        match outcome {
            Ok(()) => {
                if let Some(id) = document_id {
                    info!(document_id = %id, "job finished");
                }
            }
            Err(e) => {
                error!(
                    document_id = ?document_id,
                    stage = e.stage(),
                    error = %e,
                    "job failed"
                );
                if e.marks_document_failed()
                    && let Some(id) = document_id
                    && let Err(mark_err) =
                        self.repo.mark_document(id, DocumentStatus::Failed).await
                {
                    error!(document_id = %id, error = %mark_err, "failed to record failure status");
                }
            }
        }
    }

    async fn process(&self, job: IngestJob) -> Result<(), IngestError> {
        match self
            .repo
            .claim_document(job.document_id)
            .await
            .map_err(IngestError::persist)?
        {
            ClaimOutcome::Claimed => {}
            ClaimOutcome::NotFound => return Err(IngestError::DocumentAbsent(job.document_id)),
            ClaimOutcome::AlreadyDone => {
                info!(document_id = %job.document_id, "document already done; skipping redelivery");
                return Ok(());
            }
            ClaimOutcome::Unclaimable(status) => {
                warn!(
                    document_id = %job.document_id,
                    status = status.as_str(),
                    "document not claimable; dropping job"
                );
                return Ok(());
            }
        }

        let file_name = job
            .file_name
            .clone()
            .unwrap_or_else(|| DEFAULT_FILE_NAME.to_string());

        // The temp file is owned here; every return path below drops (and
        // deletes) it.
        let temp = download_to_temp(
            &self.http,
            &job.file_url,
            self.settings.max_download_bytes,
            Duration::from_secs(self.settings.download_timeout_secs),
        )
        .await
        .map_err(IngestError::download)?;

        let dump_dir = self.dump_dir_for(&job);
        let use_pdf_native = use_pdf_native(&job, &file_name, self.settings.use_pdf_as_file);

        let checklist = if use_pdf_native {
            self.pipeline
                .run_pdf_native(temp.path(), &file_name, dump_dir.as_deref())
                .await?
        } else {
            self.pipeline
                .run_text(temp.path(), &file_name, dump_dir.as_deref())
                .await?
        };

        // Checklist first, terminal status second: an observer that sees
        // `done` always finds the checklist row.
        self.repo
            .insert_checklist(&NewChecklist {
                user_id: job.user_id,
                document_id: job.document_id,
                file_name,
                data: checklist,
            })
            .await
            .map_err(IngestError::persist)?;

        self.repo
            .mark_document(job.document_id, DocumentStatus::Done)
            .await
            .context("document finished but status update failed")
            .map_err(IngestError::persist)?;

        Ok(())
    }

    fn dump_dir_for(&self, job: &IngestJob) -> Option<PathBuf> {
        self.settings.debug_dump_dir.as_ref().map(|dir| {
            PathBuf::from(dir)
                .join(job.user_id.to_string())
                .join(job.document_id.to_string())
        })
    }
}

/// Validate a raw queue message into a job.
///
/// Malformed JSON, missing fields and an empty `fileUrl` are all
/// payload-invalid: the message is logged and acknowledged without any
/// document mutation.
fn parse_payload(raw: &str) -> Result<IngestJob, IngestError> {
    let job: IngestJob =
        serde_json::from_str(raw).map_err(|e| IngestError::PayloadInvalid(e.to_string()))?;
    if job.file_url.is_empty() {
        return Err(IngestError::PayloadInvalid("empty fileUrl".into()));
    }
    Ok(job)
}

/// The payload flag wins; the environment default applies when absent.
/// Only PDFs can take the PDF-native branch.
fn use_pdf_native(job: &IngestJob, file_name: &str, env_default: bool) -> bool {
    let requested = job.use_pdf_file.unwrap_or(env_default);
    requested && file_name.to_lowercase().ends_with(".pdf")
}

pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "licitacheck")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Checklist-synthesis worker for Brazilian public-procurement notices", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Consume ingestion jobs from the durable queue and persist checklists
    #[command(long_about = "Consume ingestion jobs from the durable queue.\n\n\
        Requires DATABASE_URL (Postgres), REDIS_URL (queue) and OPENAI_API_KEY.\n\
        Jobs are JSON payloads on the 'document:ingest' list with documentId,\n\
        userId, fileUrl and optional fileName / usePdfFile fields.\n\
        Multiple workers may share the queue; each message is delivered to\n\
        exactly one of them at a time.")]
    Worker,

    /// Run the pipeline once over a local file and print the checklist JSON
    #[command(long_about = "Run the full pipeline over a local edital (PDF or CSV)\n\
        and print the normalised checklist JSON to stdout. No queue and no\n\
        database are involved; only OPENAI_API_KEY is required.")]
    Ingest {
        /// Path to a local PDF or CSV edital
        #[arg(required = true)]
        path: PathBuf,

        /// Send the raw PDF to the LLM instead of the parsed-text pipeline
        #[arg(long, default_value = "false")]
        pdf_native: bool,

        /// Write raw parse segments and block responses to this directory
        #[arg(long)]
        dump_dir: Option<PathBuf>,
    },
}

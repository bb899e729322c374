mod checklist;
mod cli;
mod config;
mod db;
mod download;
mod error;
mod llm;
mod parser;
mod pipeline;
mod queue;
mod retrieval;
mod runner;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Worker default is info; override with RUST_LOG as usual.
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Worker => {
            cli::commands::worker::run().await?;
        }
        Commands::Ingest {
            path,
            pdf_native,
            dump_dir,
        } => {
            cli::commands::ingest::run(path, pdf_native, dump_dir).await?;
        }
    }

    Ok(())
}

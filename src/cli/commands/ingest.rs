use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};

use crate::config::Settings;
use crate::llm::{OpenAiChat, OpenAiEmbedder, OpenAiFiles};
use crate::pipeline::Pipeline;

/// Run the pipeline once over a local file and print the checklist JSON.
pub async fn run(path: PathBuf, pdf_native: bool, dump_dir: Option<PathBuf>) -> Result<()> {
    let settings = Settings::from_env()?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .context("path has no usable file name")?
        .to_string();

    let pipeline = Pipeline::new(
        settings.clone(),
        Arc::new(OpenAiChat::new(&settings)?),
        Arc::new(OpenAiEmbedder::new(&settings)?),
        Arc::new(OpenAiFiles::new(&settings)?),
    );

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg}").unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner.set_message(if pdf_native {
        format!("processing {file_name} (PDF-native)")
    } else {
        format!("processing {file_name}")
    });

    let result = if pdf_native {
        pipeline
            .run_pdf_native(&path, &file_name, dump_dir.as_deref())
            .await
    } else {
        pipeline.run_text(&path, &file_name, dump_dir.as_deref()).await
    };
    spinner.finish_and_clear();

    let checklist = result.map_err(anyhow::Error::from)?;
    println!("{}", serde_json::to_string_pretty(&checklist)?);
    Ok(())
}

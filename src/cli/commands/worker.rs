use std::sync::Arc;

use anyhow::Result;

use crate::config::Settings;
use crate::db::Repository;
use crate::llm::{OpenAiChat, OpenAiEmbedder, OpenAiFiles};
use crate::pipeline::Pipeline;
use crate::queue::JobQueue;
use crate::runner::Runner;

/// Start the queue-consuming worker loop.
pub async fn run() -> Result<()> {
    let settings = Settings::from_env()?;

    let repo = Repository::connect(settings.require_database_url()?).await?;
    let queue = JobQueue::connect(&settings.redis_url).await?;

    let pipeline = Pipeline::new(
        settings.clone(),
        Arc::new(OpenAiChat::new(&settings)?),
        Arc::new(OpenAiEmbedder::new(&settings)?),
        Arc::new(OpenAiFiles::new(&settings)?),
    );

    Runner::new(settings, queue, repo, pipeline).run().await
}

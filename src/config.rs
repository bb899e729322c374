use anyhow::{Context, Result};

/// Process-wide settings, read once from the environment at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub redis_url: String,
    /// Required by the worker; the one-shot `ingest` command runs without it.
    pub database_url: Option<String>,
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub chat_model: String,
    pub embedding_model: String,

    pub chunk_min_chars: usize,
    pub chunk_max_chars: usize,
    pub chunk_overlap_chars: usize,

    pub top_k_retrieval: usize,
    pub top_n_for_mmr: usize,
    pub mmr_lambda: f32,

    /// Inter-block pause in PDF-native mode, seconds.
    pub pdf_block_delay_secs: u64,
    /// Default for the PDF-native branch when the job payload is silent.
    pub use_pdf_as_file: bool,

    pub max_download_bytes: u64,
    pub download_timeout_secs: u64,

    /// When set, raw parse segments and block responses are dumped under
    /// `<dir>/<user_id>/<document_id>/` for debugging.
    pub debug_dump_dir: Option<String>,
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_chat_model() -> String {
    "gpt-4o".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

impl Settings {
    /// Load settings from the environment. `.env` files are honoured by the
    /// caller (`dotenvy::dotenv()` in `main`).
    pub fn from_env() -> Result<Self> {
        let settings = Self {
            redis_url: env_or("REDIS_URL", default_redis_url),
            database_url: std::env::var("DATABASE_URL").ok().filter(|s| !s.is_empty()),
            openai_api_key: std::env::var("OPENAI_API_KEY")
                .context("OPENAI_API_KEY is required for embeddings and chat.")?,
            openai_base_url: env_or("OPENAI_BASE_URL", default_openai_base_url),
            chat_model: env_or("CHAT_MODEL", default_chat_model),
            embedding_model: env_or("EMBEDDING_MODEL", default_embedding_model),
            chunk_min_chars: env_parsed("CHUNK_MIN_CHARS", 800)?,
            chunk_max_chars: env_parsed("CHUNK_MAX_CHARS", 1200)?,
            chunk_overlap_chars: env_parsed("CHUNK_OVERLAP_CHARS", 150)?,
            top_k_retrieval: env_parsed("TOP_K_RETRIEVAL", 12)?,
            top_n_for_mmr: env_parsed("TOP_N_FOR_MMR", 40)?,
            mmr_lambda: env_parsed("MMR_LAMBDA", 0.7)?,
            pdf_block_delay_secs: env_parsed("PDF_BLOCK_DELAY_SEC", 0)?,
            use_pdf_as_file: env_bool("USE_PDF_AS_FILE", false)?,
            max_download_bytes: env_parsed("MAX_DOWNLOAD_BYTES", 100 * 1024 * 1024)?,
            download_timeout_secs: env_parsed("DOWNLOAD_TIMEOUT_SECS", 120)?,
            debug_dump_dir: std::env::var("DEBUG_DUMP_DIR").ok().filter(|s| !s.is_empty()),
        };

        // The legacy single-call path was retired; the block pipeline is the
        // only implementation of the v2 contract.
        if !env_bool("USE_CHECKLIST_BLOCKS", true)? {
            tracing::warn!(
                "USE_CHECKLIST_BLOCKS=false is no longer supported; running the block pipeline"
            );
        }

        settings.validate()?;
        Ok(settings)
    }

    /// Connection string for Postgres; the worker cannot run without one.
    pub fn require_database_url(&self) -> Result<&str> {
        self.database_url
            .as_deref()
            .context("DATABASE_URL is required. Point it at the Postgres instance.")
    }

    fn validate(&self) -> Result<()> {
        if self.chunk_min_chars == 0 || self.chunk_min_chars > self.chunk_max_chars {
            anyhow::bail!(
                "invalid chunk bounds: min {} must be in 1..=max {}",
                self.chunk_min_chars,
                self.chunk_max_chars
            );
        }
        if self.chunk_overlap_chars >= self.chunk_min_chars {
            anyhow::bail!(
                "chunk overlap {} must be smaller than the minimum chunk size {}",
                self.chunk_overlap_chars,
                self.chunk_min_chars
            );
        }
        if !(0.0..=1.0).contains(&self.mmr_lambda) {
            anyhow::bail!("MMR_LAMBDA must lie in [0, 1], got {}", self.mmr_lambda);
        }
        if self.top_k_retrieval == 0 || self.top_n_for_mmr < self.top_k_retrieval {
            anyhow::bail!(
                "TOP_N_FOR_MMR ({}) must be at least TOP_K_RETRIEVAL ({})",
                self.top_n_for_mmr,
                self.top_k_retrieval
            );
        }
        Ok(())
    }

    /// A settings value suitable for unit tests: local endpoints, spec
    /// defaults, no credentials required.
    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            redis_url: default_redis_url(),
            database_url: Some("postgres://localhost/licitacheck_test".into()),
            openai_api_key: "test-key".into(),
            openai_base_url: default_openai_base_url(),
            chat_model: default_chat_model(),
            embedding_model: default_embedding_model(),
            chunk_min_chars: 800,
            chunk_max_chars: 1200,
            chunk_overlap_chars: 150,
            top_k_retrieval: 12,
            top_n_for_mmr: 40,
            mmr_lambda: 0.7,
            pdf_block_delay_secs: 0,
            use_pdf_as_file: false,
            max_download_bytes: 100 * 1024 * 1024,
            download_timeout_secs: 120,
            debug_dump_dir: None,
        }
    }
}

fn env_or(name: &str, default: fn() -> String) -> String {
    match std::env::var(name) {
        Ok(v) if !v.is_empty() => v,
        _ => default(),
    }
}

fn env_parsed<T: std::str::FromStr>(name: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) if !raw.is_empty() => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid {name}={raw}: {e}")),
        _ => Ok(default),
    }
}

fn env_bool(name: &str, default: bool) -> Result<bool> {
    match std::env::var(name) {
        Ok(raw) if !raw.is_empty() => match raw.to_lowercase().as_str() {
            "1" | "true" | "yes" => Ok(true),
            "0" | "false" | "no" => Ok(false),
            other => anyhow::bail!("invalid {}={}: expected a boolean", name, other),
        },
        _ => Ok(default),
    }
}

//! Shared service bundle for a research run
//!
//! All collaborators are injected explicitly through trait objects; there
//! is no process-global state. Tests swap in the in-memory doubles from
//! `rishi-common`.

use rishi_common::config::AppConfig;
use rishi_common::corpus::{CorpusStore, SqliteCorpus};
use rishi_common::embeddings::{create_embedder, Embedder};
use rishi_common::errors::Result;
use rishi_common::llm::{ChatModel, OpenAiChat};
use rishi_common::vector::{QdrantIndex, VectorIndex};
use std::sync::Arc;

/// Everything a run needs to talk to the outside world
#[derive(Clone)]
pub struct ResearchServices {
    pub corpus: Arc<dyn CorpusStore>,
    pub index: Arc<dyn VectorIndex>,
    pub embedder: Arc<dyn Embedder>,
    /// Absent in degraded mode: ranking falls back to unfiltered
    /// retrieval and planning falls back to the fixed plan.
    pub chat: Option<Arc<dyn ChatModel>>,
    pub config: Arc<AppConfig>,
}

impl ResearchServices {
    /// Wire up production collaborators from configuration
    pub async fn from_config(config: AppConfig) -> Result<Self> {
        let corpus =
            SqliteCorpus::connect(&config.corpus.url, config.corpus.max_connections).await?;
        let index = QdrantIndex::new(&config.vector)?;
        let embedder = create_embedder(&config.embedding)?;

        let chat: Option<Arc<dyn ChatModel>> = match &config.chat.api_key {
            Some(key) => Some(Arc::new(OpenAiChat::new(&config.chat, key.clone())?)),
            None => {
                tracing::warn!(
                    "No chat api key configured; running in degraded mode \
                     (unfiltered retrieval, fallback planning)"
                );
                None
            }
        };

        Ok(Self {
            corpus: Arc::new(corpus),
            index: Arc::new(index),
            embedder,
            chat,
            config: Arc::new(config),
        })
    }

    pub fn new(
        corpus: Arc<dyn CorpusStore>,
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn Embedder>,
        chat: Option<Arc<dyn ChatModel>>,
        config: AppConfig,
    ) -> Self {
        Self {
            corpus,
            index,
            embedder,
            chat,
            config: Arc::new(config),
        }
    }
}

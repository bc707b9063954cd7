//! Application state shared by the CLI commands and the HTTP server.
//!
//! An [`Engine`] owns the chunk store for the life of the process. Opening
//! one builds the configured providers and, when persistent storage is on,
//! restores the snapshot if it was made with the active embedding model.
//! Any other snapshot is discarded whole and the store starts empty.

use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

use vaultsearch_core::embedding::{CompletionProvider, EmbeddingProvider};
use vaultsearch_core::gateway::EmbeddingGateway;
use vaultsearch_core::retriever::{Answer, Retriever};
use vaultsearch_core::snapshot;
use vaultsearch_core::store::memory::InMemoryStore;
use vaultsearch_core::store::ChunkStore;

use crate::completion::create_completion_provider;
use crate::config::Config;
use crate::embedding::create_embedding_provider;
use crate::snapshot::{Autosaver, SnapshotFile};

pub struct Engine {
    pub config: Arc<Config>,
    pub store: Arc<InMemoryStore>,
    pub retriever: Retriever,
    pub completion: Arc<dyn CompletionProvider>,
    /// `None` when persistent storage is disabled.
    pub autosaver: Option<Arc<Autosaver>>,
    /// Whether the store came from a snapshot.
    pub restored: bool,
}

impl Engine {
    pub fn open(config: &Config) -> Result<Self> {
        let embedder = create_embedding_provider(&config.embedding)?;
        let completion = create_completion_provider(&config.llm)?;
        Ok(Self::with_providers(config, embedder, completion))
    }

    /// Open with explicit providers instead of the configured ones.
    pub fn with_providers(
        config: &Config,
        embedder: Arc<dyn EmbeddingProvider>,
        completion: Arc<dyn CompletionProvider>,
    ) -> Self {
        let gateway = EmbeddingGateway::new(embedder);
        let retriever = Retriever::new(gateway)
            .with_chunking(config.chunking.params())
            .with_weights(config.retrieval.weights())
            .with_concurrency(config.embedding.concurrency);

        let autosaver = config
            .storage
            .use_persistent_storage
            .then(|| Arc::new(Autosaver::new(SnapshotFile::new(&config.storage.snapshot_path))));

        let restored_store = autosaver
            .as_ref()
            .and_then(|saver| restore(saver.file(), &retriever));
        let restored = restored_store.is_some();

        Self {
            config: Arc::new(config.clone()),
            store: Arc::new(restored_store.unwrap_or_default()),
            retriever,
            completion,
            autosaver,
            restored,
        }
    }

    pub fn model_name(&self) -> &str {
        self.retriever.model_name()
    }

    /// Write the snapshot now. `Ok(None)` when persistence is off or another
    /// save is in flight.
    pub async fn save(&self) -> Result<Option<usize>> {
        match &self.autosaver {
            Some(saver) => saver.save_now(self.store.as_ref(), self.model_name()).await,
            None => Ok(None),
        }
    }

    pub async fn answer(&self, question: &str) -> Result<Answer> {
        let retrieval = &self.config.retrieval;
        self.retriever
            .answer(
                self.store.as_ref(),
                self.completion.as_ref(),
                question,
                retrieval.context_length,
                &self.config.llm.model,
                retrieval.use_reranking,
            )
            .await
    }
}

fn restore(file: &SnapshotFile, retriever: &Retriever) -> Option<InMemoryStore> {
    let snap = file.load(retriever.model_name())?;
    let store = snapshot::load(snap, retriever.model_name())?;

    let dims = retriever.gateway().dims();
    if let Some(stored) = store.embedding_dims() {
        if stored != dims {
            warn!(
                stored,
                expected = dims,
                "snapshot dimension does not match the active model; starting empty"
            );
            return None;
        }
    }

    info!(
        chunks = store.len(),
        path = %file.path().display(),
        "loaded snapshot"
    );
    Some(store)
}

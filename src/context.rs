//! Application context.
//!
//! Everything a request needs, constructed once at startup and passed
//! explicitly to each component: configuration, the vector store adapter,
//! the project registry, and the embedding and completion providers.

use anyhow::Result;
use std::sync::Arc;

use codebase_assistant_core::completion::CompletionProvider;
use codebase_assistant_core::embedding::EmbeddingProvider;
use codebase_assistant_core::store::VectorDb;

use crate::config::Config;
use crate::embedding::create_provider;
use crate::llm::create_completion;
use crate::registry::ProjectRegistry;
use crate::sqlite_store::SqliteVectorDb;
use crate::vector_store::VectorStore;

pub struct AppContext {
    pub config: Config,
    pub store: VectorStore,
    pub registry: ProjectRegistry,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub completion: Arc<dyn CompletionProvider>,
}

impl AppContext {
    /// Wire up the SQLite store and the configured providers.
    pub async fn from_config(config: Config) -> Result<Self> {
        let db = SqliteVectorDb::open(&config.store.path, &config.store.collection).await?;
        let embedder = create_provider(&config.embedding)?;
        let completion = create_completion(&config.llm)?;
        Ok(Self::new(config, Arc::new(db), embedder, completion))
    }

    /// Assemble a context from explicit collaborators.
    pub fn new(
        config: Config,
        db: Arc<dyn VectorDb>,
        embedder: Arc<dyn EmbeddingProvider>,
        completion: Arc<dyn CompletionProvider>,
    ) -> Self {
        let registry = ProjectRegistry::new(config.registry.path.clone());
        let store = VectorStore::new(db, embedder.clone());
        Self {
            config,
            store,
            registry,
            embedder,
            completion,
        }
    }
}

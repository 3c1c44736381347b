use codeatlas_core::SearchIndex;
use codeatlas_ingest::LifecycleCoordinator;
use codeatlas_vector::EmbeddingProvider;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<LifecycleCoordinator>,
    pub search_index: Arc<dyn SearchIndex>,
    pub embeddings: Arc<dyn EmbeddingProvider>,
}

impl AppState {
    pub fn new(
        coordinator: Arc<LifecycleCoordinator>,
        search_index: Arc<dyn SearchIndex>,
        embeddings: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            coordinator,
            search_index,
            embeddings,
        }
    }
}

pub mod index;
pub mod provider;
pub mod rag;

pub use index::MemorySearchIndex;
pub use provider::{EmbeddingProvider, HashedEmbeddingProvider, HttpEmbeddingProvider};
pub use rag::MetaRag;

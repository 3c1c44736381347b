pub mod coordinator;
pub mod scanner;
pub mod source;
pub mod store;
pub mod summarizer;
pub mod worker;

pub use coordinator::LifecycleCoordinator;
pub use scanner::{BatchScanner, SourceRegistry};
pub use source::{filter_files, GitSourceOpener, LocalRepositorySource, SourceOpener};
pub use store::{MemoryDescriptorArchive, MemoryGraphFileStore, MemoryLifecycleStore};
pub use summarizer::Summarizer;
pub use worker::IngestWorker;

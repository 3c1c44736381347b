pub mod client;
pub mod extractor;
pub mod prompt;
pub mod summary;

pub use client::LlmClient;
pub use extractor::{is_ignorable, parse_extraction, LlmExtractionClient};
pub use summary::LlmSummaryClient;

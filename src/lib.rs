pub mod config;
pub mod database;
pub mod document;
pub mod pipeline;
pub mod providers;

// Re-export commonly used items
pub use config::Settings;
pub use database::Database;
pub use pipeline::{JobResult, JobStatus, ProcessingPipeline};
pub use providers::{EmbeddingProvider, VoyageProvider};

pub mod traits;
pub mod voyage;

pub use traits::{EmbeddingError, EmbeddingProvider};
pub use voyage::VoyageProvider;

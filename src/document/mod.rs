mod chunker;
mod extractor;

pub use chunker::{ChunkMetadata, TextChunk, TextChunker};
pub use extractor::{extract_text, DocumentFormat, ExtractError};

mod database;
mod models;

pub use database::{Database, DatabaseError};
pub use models::{ChunkRecord, Document, NewChunk};

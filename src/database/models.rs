use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One uploaded file, as stored in the `documents` table.
///
/// `processed` flips to true only after every chunk of the document has been
/// committed; on failure it stays false and the failure message is recorded
/// under the `error` metadata key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: i64,
    pub filename: String,
    pub file_type: String,
    pub file_size: i64,
    pub processed: bool,
    pub metadata: HashMap<String, serde_json::Value>,
    pub created_at: i64,
}

/// A chunk ready to be committed, produced by the pipeline after a
/// successful embedding batch.
#[derive(Debug, Clone)]
pub struct NewChunk {
    pub chunk_index: i64,
    pub content: String,
    pub embedding: Vec<f32>,
    pub metadata: HashMap<String, serde_json::Value>,
}

/// One committed chunk row, embedding decoded.
#[derive(Debug, Clone)]
pub struct ChunkRecord {
    pub id: i64,
    pub document_id: i64,
    pub chunk_index: i64,
    pub content: String,
    pub embedding: Vec<f32>,
    pub metadata: HashMap<String, serde_json::Value>,
    pub created_at: i64,
}

use chrono::Utc;
use log::info;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio_rusqlite::Connection;

use super::models::{ChunkRecord, Document, NewChunk};

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] tokio_rusqlite::Error),
    #[error("Database connection error: {0}")]
    Connection(String),
    #[error("Encoding error: {0}")]
    Encoding(String),
}

/// Relational store for documents and their chunks.
///
/// Each worker owns its own connection; nothing is shared across jobs beyond
/// the database file itself.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Connection>,
}

impl Database {
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| DatabaseError::Connection(e.to_string()))?;
            }
        }

        let conn = Connection::open(path.as_ref().to_path_buf())
            .await
            .map_err(|e| DatabaseError::Connection(e.to_string()))?;

        let db = Self {
            conn: Arc::new(conn),
        };
        db.initialize().await?;
        Ok(db)
    }

    async fn initialize(&self) -> Result<(), DatabaseError> {
        self.conn
            .call(|conn| {
                conn.execute_batch(
                    "CREATE TABLE IF NOT EXISTS documents (
                        id INTEGER PRIMARY KEY AUTOINCREMENT,
                        filename TEXT NOT NULL,
                        file_type TEXT NOT NULL,
                        file_size INTEGER NOT NULL,
                        processed INTEGER NOT NULL DEFAULT 0,
                        metadata TEXT,
                        created_at INTEGER NOT NULL
                    );
                    CREATE TABLE IF NOT EXISTS document_chunks (
                        id INTEGER PRIMARY KEY AUTOINCREMENT,
                        document_id INTEGER NOT NULL,
                        chunk_index INTEGER NOT NULL,
                        content TEXT NOT NULL,
                        embedding BLOB,
                        metadata TEXT,
                        created_at INTEGER NOT NULL
                    );
                    CREATE INDEX IF NOT EXISTS idx_chunks_document
                        ON document_chunks (document_id, chunk_index);",
                )
            })
            .await?;

        info!("Database initialized successfully");
        Ok(())
    }

    pub async fn insert_document(
        &self,
        filename: String,
        file_type: String,
        file_size: i64,
        metadata: HashMap<String, serde_json::Value>,
    ) -> Result<i64, DatabaseError> {
        let metadata_json = encode_metadata(&metadata)?;
        let created_at = Utc::now().timestamp_millis();

        let id = self
            .conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO documents (filename, file_type, file_size, processed, metadata, created_at)
                     VALUES (?1, ?2, ?3, 0, ?4, ?5)",
                    (&filename, &file_type, file_size, &metadata_json, created_at),
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;

        Ok(id)
    }

    pub async fn get_document(&self, id: i64) -> Result<Option<Document>, DatabaseError> {
        let row = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, filename, file_type, file_size, processed, metadata, created_at
                     FROM documents WHERE id = ?1",
                )?;
                let mut rows = stmt.query_map([id], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, bool>(4)?,
                        row.get::<_, Option<String>>(5)?,
                        row.get::<_, i64>(6)?,
                    ))
                })?;

                match rows.next() {
                    Some(row) => Ok(Some(row?)),
                    None => Ok(None),
                }
            })
            .await?;

        Ok(row.map(document_from_parts))
    }

    pub async fn list_documents(&self) -> Result<Vec<Document>, DatabaseError> {
        let raw = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, filename, file_type, file_size, processed, metadata, created_at
                     FROM documents ORDER BY created_at DESC",
                )?;

                let rows = stmt.query_map([], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, bool>(4)?,
                        row.get::<_, Option<String>>(5)?,
                        row.get::<_, i64>(6)?,
                    ))
                })?;

                let mut documents = Vec::new();
                for row in rows {
                    documents.push(row?);
                }

                Ok(documents)
            })
            .await?;

        Ok(raw.into_iter().map(document_from_parts).collect())
    }

    /// Writes every chunk of a document and flips its processed flag as one
    /// transaction. Either all chunks land together with `processed = true`,
    /// or nothing is visible.
    pub async fn commit_chunks(
        &self,
        document_id: i64,
        chunks: Vec<NewChunk>,
    ) -> Result<usize, DatabaseError> {
        let created_at = Utc::now().timestamp_millis();

        let mut rows = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let embedding = bincode::serialize(&chunk.embedding)
                .map_err(|e| DatabaseError::Encoding(e.to_string()))?;
            let metadata = encode_metadata(&chunk.metadata)?;
            rows.push((chunk.chunk_index, chunk.content, embedding, metadata));
        }

        let count = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                for (chunk_index, content, embedding, metadata) in &rows {
                    tx.execute(
                        "INSERT INTO document_chunks
                            (document_id, chunk_index, content, embedding, metadata, created_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                        (document_id, chunk_index, content, embedding, metadata, created_at),
                    )?;
                }
                tx.execute(
                    "UPDATE documents SET processed = 1 WHERE id = ?1",
                    [document_id],
                )?;
                tx.commit()?;
                Ok(rows.len())
            })
            .await?;

        Ok(count)
    }

    /// Records a failed run: clears the processed flag and merges the error
    /// message into the document's metadata, in its own transaction separate
    /// from any rolled-back chunk write.
    pub async fn record_failure(&self, document_id: i64, error: String) -> Result<(), DatabaseError> {
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;

                let metadata_json: Option<String> = {
                    let mut stmt =
                        tx.prepare("SELECT metadata FROM documents WHERE id = ?1")?;
                    let mut rows = stmt.query([document_id])?;
                    match rows.next()? {
                        Some(row) => row.get(0)?,
                        None => None,
                    }
                };

                let mut metadata: HashMap<String, serde_json::Value> = metadata_json
                    .as_deref()
                    .and_then(|raw| serde_json::from_str(raw).ok())
                    .unwrap_or_default();
                metadata.insert("error".to_string(), serde_json::Value::String(error));
                let updated = serde_json::to_string(&metadata)
                    .unwrap_or_else(|_| "{}".to_string());

                tx.execute(
                    "UPDATE documents SET processed = 0, metadata = ?1 WHERE id = ?2",
                    (&updated, document_id),
                )?;
                tx.commit()?;
                Ok(())
            })
            .await?;

        Ok(())
    }

    pub async fn chunk_count(&self, document_id: i64) -> Result<usize, DatabaseError> {
        let count = self
            .conn
            .call(move |conn| {
                conn.query_row(
                    "SELECT COUNT(*) FROM document_chunks WHERE document_id = ?1",
                    [document_id],
                    |row| row.get::<_, i64>(0),
                )
            })
            .await?;

        Ok(count as usize)
    }

    /// Returns a document's chunks in index order, embeddings decoded.
    pub async fn get_chunks(&self, document_id: i64) -> Result<Vec<ChunkRecord>, DatabaseError> {
        let raw = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, document_id, chunk_index, content, embedding, metadata, created_at
                     FROM document_chunks WHERE document_id = ?1 ORDER BY chunk_index",
                )?;

                let rows = stmt.query_map([document_id], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, Option<Vec<u8>>>(4)?,
                        row.get::<_, Option<String>>(5)?,
                        row.get::<_, i64>(6)?,
                    ))
                })?;

                let mut chunks = Vec::new();
                for row in rows {
                    chunks.push(row?);
                }

                Ok(chunks)
            })
            .await?;

        let mut chunks = Vec::with_capacity(raw.len());
        for (id, document_id, chunk_index, content, embedding, metadata, created_at) in raw {
            let embedding = match embedding {
                Some(bytes) => bincode::deserialize(&bytes)
                    .map_err(|e| DatabaseError::Encoding(e.to_string()))?,
                None => Vec::new(),
            };
            let metadata = metadata
                .as_deref()
                .and_then(|raw| serde_json::from_str(raw).ok())
                .unwrap_or_default();

            chunks.push(ChunkRecord {
                id,
                document_id,
                chunk_index,
                content,
                embedding,
                metadata,
                created_at,
            });
        }

        Ok(chunks)
    }
}

fn encode_metadata(
    metadata: &HashMap<String, serde_json::Value>,
) -> Result<String, DatabaseError> {
    serde_json::to_string(metadata).map_err(|e| DatabaseError::Encoding(e.to_string()))
}

type DocumentRow = (i64, String, String, i64, bool, Option<String>, i64);

fn document_from_parts(row: DocumentRow) -> Document {
    let (id, filename, file_type, file_size, processed, metadata_json, created_at) = row;
    let metadata = metadata_json
        .as_deref()
        .and_then(|raw| serde_json::from_str(raw).ok())
        .unwrap_or_default();

    Document {
        id,
        filename,
        file_type,
        file_size,
        processed,
        metadata,
        created_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn temp_db(name: &str) -> Database {
        let path = std::env::temp_dir().join(format!("doc_ingest_db_{}.db", name));
        std::fs::remove_file(&path).ok();
        Database::new(&path).await.unwrap()
    }

    fn sample_chunk(index: i64, content: &str) -> NewChunk {
        let mut metadata = HashMap::new();
        metadata.insert("word_start".to_string(), serde_json::json!(0));
        NewChunk {
            chunk_index: index,
            content: content.to_string(),
            embedding: vec![0.5; 4],
            metadata,
        }
    }

    #[tokio::test]
    async fn document_roundtrip() {
        let db = temp_db("roundtrip").await;
        let id = db
            .insert_document("a.txt".to_string(), "txt".to_string(), 42, HashMap::new())
            .await
            .unwrap();

        let doc = db.get_document(id).await.unwrap().unwrap();
        assert_eq!(doc.filename, "a.txt");
        assert_eq!(doc.file_type, "txt");
        assert_eq!(doc.file_size, 42);
        assert!(!doc.processed);
        assert!(doc.metadata.is_empty());

        assert!(db.get_document(id + 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn commit_chunks_sets_processed_and_preserves_order() {
        let db = temp_db("commit").await;
        let id = db
            .insert_document("b.txt".to_string(), "txt".to_string(), 10, HashMap::new())
            .await
            .unwrap();

        let written = db
            .commit_chunks(
                id,
                vec![sample_chunk(0, "first"), sample_chunk(1, "second")],
            )
            .await
            .unwrap();
        assert_eq!(written, 2);

        let doc = db.get_document(id).await.unwrap().unwrap();
        assert!(doc.processed);

        let chunks = db.get_chunks(id).await.unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].content, "first");
        assert_eq!(chunks[1].chunk_index, 1);
        assert_eq!(chunks[0].embedding, vec![0.5; 4]);
    }

    #[tokio::test]
    async fn record_failure_merges_error_into_metadata() {
        let db = temp_db("failure").await;
        let mut metadata = HashMap::new();
        metadata.insert("author".to_string(), serde_json::json!("someone"));
        let id = db
            .insert_document("c.pdf".to_string(), "pdf".to_string(), 10, metadata)
            .await
            .unwrap();

        db.record_failure(id, "boom".to_string()).await.unwrap();

        let doc = db.get_document(id).await.unwrap().unwrap();
        assert!(!doc.processed);
        assert_eq!(doc.metadata["error"], serde_json::json!("boom"));
        // Pre-existing metadata survives the merge.
        assert_eq!(doc.metadata["author"], serde_json::json!("someone"));
    }

    #[tokio::test]
    async fn chunk_count_is_per_document() {
        let db = temp_db("count").await;
        let first = db
            .insert_document("d.txt".to_string(), "txt".to_string(), 1, HashMap::new())
            .await
            .unwrap();
        let second = db
            .insert_document("e.txt".to_string(), "txt".to_string(), 1, HashMap::new())
            .await
            .unwrap();

        db.commit_chunks(first, vec![sample_chunk(0, "only")])
            .await
            .unwrap();

        assert_eq!(db.chunk_count(first).await.unwrap(), 1);
        assert_eq!(db.chunk_count(second).await.unwrap(), 0);
    }
}

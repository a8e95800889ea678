use anyhow::Result;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

use crate::config::Settings;
use crate::database::{Database, DatabaseError, Document, NewChunk};
use crate::document::{extract_text, DocumentFormat, ExtractError, TextChunker};
use crate::providers::{EmbeddingError, EmbeddingProvider};

/// Text shorter than this after trimming is not worth chunking.
const MIN_TEXT_LENGTH: usize = 10;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("document {0} not found")]
    DocumentNotFound(i64),
    #[error(transparent)]
    Extraction(#[from] ExtractError),
    #[error("insufficient content: {chars} characters extracted after trimming")]
    InsufficientContent { chars: usize },
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
    #[error("failed to persist results: {0}")]
    Persistence(#[from] DatabaseError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Success,
    Error,
}

/// Terminal result of one ingestion job, handed back to whatever delivered
/// the job (queue result channel, CLI output).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResult {
    pub document_id: i64,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunks_created: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobResult {
    fn success(document_id: i64, chunks_created: usize) -> Self {
        Self {
            document_id,
            status: JobStatus::Success,
            chunks_created: Some(chunks_created),
            error: None,
        }
    }

    fn failure(document_id: i64, error: String) -> Self {
        Self {
            document_id,
            status: JobStatus::Error,
            chunks_created: None,
            error: Some(error),
        }
    }
}

/// Runs one document end-to-end: extract, chunk, embed, persist.
///
/// Each job owns a database session and makes at most two commits: the
/// chunk-write transaction (together with the processed flag), or the
/// error-metadata transaction when a step fails.
pub struct ProcessingPipeline {
    db: Database,
    chunker: TextChunker,
    embeddings: Box<dyn EmbeddingProvider>,
    upload_dir: PathBuf,
}

impl ProcessingPipeline {
    pub fn new(
        db: Database,
        embeddings: Box<dyn EmbeddingProvider>,
        settings: &Settings,
    ) -> Result<Self> {
        let chunker = TextChunker::new(settings.chunk_size, settings.chunk_overlap)?;

        Ok(Self {
            db,
            chunker,
            embeddings,
            upload_dir: PathBuf::from(&settings.upload_dir),
        })
    }

    /// Processes one ingestion job. Never panics and never leaves the
    /// document in an intermediate state: the job ends with either all
    /// chunks committed and `processed = true`, or `processed = false` with
    /// the failure recorded under the document's `error` metadata key.
    pub async fn process_document(&self, document_id: i64) -> JobResult {
        info!("processing document {}", document_id);

        let document = match self.db.get_document(document_id).await {
            Ok(Some(document)) => document,
            Ok(None) => {
                warn!("document {} not found", document_id);
                return JobResult::failure(
                    document_id,
                    PipelineError::DocumentNotFound(document_id).to_string(),
                );
            }
            Err(e) => {
                error!("failed to load document {}: {}", document_id, e);
                return JobResult::failure(document_id, e.to_string());
            }
        };

        // Jobs are delivered at least once; a document that already finished
        // must not grow a duplicate set of chunks on redelivery.
        if document.processed {
            match self.db.chunk_count(document_id).await {
                Ok(existing) if existing > 0 => {
                    info!(
                        "document {} already processed ({} chunks), skipping",
                        document_id, existing
                    );
                    return JobResult::success(document_id, 0);
                }
                Ok(_) => {}
                Err(e) => {
                    error!("failed to count chunks for document {}: {}", document_id, e);
                    return JobResult::failure(document_id, e.to_string());
                }
            }
        }

        match self.run(&document).await {
            Ok(chunks_created) => {
                info!(
                    "document {} processed successfully ({} chunks)",
                    document_id, chunks_created
                );
                JobResult::success(document_id, chunks_created)
            }
            Err(e) => {
                error!("error processing document {}: {}", document_id, e);
                if let Err(record_err) =
                    self.db.record_failure(document_id, e.to_string()).await
                {
                    error!(
                        "failed to record error for document {}: {}",
                        document_id, record_err
                    );
                }
                JobResult::failure(document_id, e.to_string())
            }
        }
    }

    async fn run(&self, document: &Document) -> Result<usize, PipelineError> {
        // Resolve the format tag before touching the file.
        let format = DocumentFormat::from_tag(&document.file_type)?;
        let path = self.upload_dir.join(&document.filename);

        info!("extracting text from {}", path.display());
        let text = extract_text(&path, format)?;

        let trimmed_len = text.trim().chars().count();
        if trimmed_len < MIN_TEXT_LENGTH {
            return Err(PipelineError::InsufficientContent { chars: trimmed_len });
        }
        info!("extracted {} characters", text.len());

        let chunks = self.chunker.chunk_text(&text);
        info!("created {} chunks", chunks.len());

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = if texts.is_empty() {
            Vec::new()
        } else {
            self.embeddings.embed_batch(&texts).await?
        };
        info!("generated {} embeddings", embeddings.len());

        let records: Vec<NewChunk> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| {
                let mut metadata = HashMap::new();
                metadata.insert(
                    "word_start".to_string(),
                    serde_json::json!(chunk.metadata.word_start),
                );
                metadata.insert(
                    "word_end".to_string(),
                    serde_json::json!(chunk.metadata.word_end),
                );
                metadata.insert("length".to_string(), serde_json::json!(chunk.metadata.length));

                NewChunk {
                    chunk_index: chunk.index as i64,
                    content: chunk.content,
                    embedding,
                    metadata,
                }
            })
            .collect();

        let written = self.db.commit_chunks(document.id, records).await?;
        Ok(written)
    }
}

use std::env;

/// Worker settings, loaded once at startup from environment variables.
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_path: String,
    pub upload_dir: String,
    pub voyage_api_key: String,
    pub embedding_model: String,
    pub embedding_dimension: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub max_file_size: u64,
}

impl Settings {
    pub fn from_env() -> Self {
        let database_path = env::var("DATABASE_PATH")
            .unwrap_or_else(|_| "./data/documents.db".to_string());

        let upload_dir = env::var("UPLOAD_DIR")
            .unwrap_or_else(|_| "./storage/uploads".to_string());

        let voyage_api_key = env::var("VOYAGE_API_KEY").unwrap_or_default();

        let embedding_model = env::var("EMBEDDING_MODEL")
            .unwrap_or_else(|_| "voyage-2".to_string());

        let embedding_dimension = env::var("EMBEDDING_DIMENSION")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(1024);

        let chunk_size = env::var("CHUNK_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(1000);

        let chunk_overlap = env::var("CHUNK_OVERLAP")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(200);

        let max_file_size = env::var("MAX_FILE_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10_485_760); // 10 MiB

        Self {
            database_path,
            upload_dir,
            voyage_api_key,
            embedding_model,
            embedding_dimension,
            chunk_size,
            chunk_overlap,
            max_file_size,
        }
    }
}

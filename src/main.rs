use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use log::info;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use doc_ingest::config::Settings;
use doc_ingest::database::Database;
use doc_ingest::document::DocumentFormat;
use doc_ingest::pipeline::ProcessingPipeline;
use doc_ingest::providers::VoyageProvider;

#[derive(Parser, Debug)]
#[command(author, version, about = "Document ingestion worker for RAG", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register an uploaded file and create its document record
    Add {
        /// Path to the file to ingest
        path: PathBuf,
    },
    /// Run the ingestion pipeline for one document
    Process {
        /// Document identifier
        document_id: i64,
    },
    /// Show a document's processing state
    Status {
        /// Document identifier
        document_id: i64,
    },
    /// List all registered documents
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();
    let settings = Settings::from_env();
    let db = Database::new(&settings.database_path).await?;

    match args.command {
        Command::Add { path } => add_document(&db, &settings, &path).await,
        Command::Process { document_id } => process_document(db, &settings, document_id).await,
        Command::Status { document_id } => show_status(&db, document_id).await,
        Command::List => list_documents(&db).await,
    }
}

/// Validates and copies an upload into the configured upload directory, then
/// creates the document record the pipeline will later load by id.
async fn add_document(db: &Database, settings: &Settings, path: &Path) -> Result<()> {
    let format = DocumentFormat::from_path(path)
        .ok_or_else(|| anyhow!("unsupported file type: {}", path.display()))?;

    let file_size = fs::metadata(path)
        .with_context(|| format!("failed to read {}", path.display()))?
        .len();
    if file_size > settings.max_file_size {
        return Err(anyhow!(
            "file too large: {} bytes (max {})",
            file_size,
            settings.max_file_size
        ));
    }

    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow!("invalid file name: {}", path.display()))?
        .to_string();

    fs::create_dir_all(&settings.upload_dir)?;
    let stored_path = Path::new(&settings.upload_dir).join(&filename);
    fs::copy(path, &stored_path)
        .with_context(|| format!("failed to store upload at {}", stored_path.display()))?;

    let mut metadata = HashMap::new();
    metadata.insert(
        "original_path".to_string(),
        serde_json::json!(path.display().to_string()),
    );

    let id = db
        .insert_document(
            filename.clone(),
            format.as_tag().to_string(),
            file_size as i64,
            metadata,
        )
        .await?;

    info!("registered document {} ({})", id, filename);
    println!("{}", serde_json::json!({ "id": id, "filename": filename }));
    Ok(())
}

async fn process_document(db: Database, settings: &Settings, document_id: i64) -> Result<()> {
    let provider = VoyageProvider::new(
        settings.voyage_api_key.clone(),
        settings.embedding_model.clone(),
        settings.embedding_dimension,
    );
    let pipeline = ProcessingPipeline::new(db, Box::new(provider), settings)?;

    let result = pipeline.process_document(document_id).await;
    println!("{}", serde_json::to_string(&result)?);
    Ok(())
}

async fn show_status(db: &Database, document_id: i64) -> Result<()> {
    let document = db
        .get_document(document_id)
        .await?
        .ok_or_else(|| anyhow!("document {} not found", document_id))?;
    let chunks = db.chunk_count(document_id).await?;

    println!(
        "{}",
        serde_json::json!({
            "id": document.id,
            "filename": document.filename,
            "file_type": document.file_type,
            "processed": document.processed,
            "chunks": chunks,
            "error": document.metadata.get("error"),
        })
    );
    Ok(())
}

async fn list_documents(db: &Database) -> Result<()> {
    let documents = db.list_documents().await?;
    for document in documents {
        println!(
            "{:>6}  {:<30} {:<5} {:>10}  processed={}",
            document.id,
            document.filename,
            document.file_type,
            document.file_size,
            document.processed
        );
    }
    Ok(())
}

use std::fs;
use std::path::Path;

use docx_rs::{read_docx, DocumentChild, ParagraphChild, RunChild};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("unsupported document format: {0}")]
    UnsupportedFormat(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {message}")]
    Parse { path: String, message: String },
}

/// The closed set of document formats the worker accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Docx,
    PlainText,
    Markdown,
}

impl DocumentFormat {
    /// Resolves a stored format tag. Unknown tags are rejected here, before
    /// any file I/O happens.
    pub fn from_tag(tag: &str) -> Result<Self, ExtractError> {
        match tag.to_lowercase().as_str() {
            "pdf" => Ok(Self::Pdf),
            "docx" => Ok(Self::Docx),
            "txt" => Ok(Self::PlainText),
            "md" => Ok(Self::Markdown),
            other => Err(ExtractError::UnsupportedFormat(other.to_string())),
        }
    }

    /// Infers a format from a file extension, used when registering uploads.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        Self::from_tag(&ext).ok()
    }

    pub fn as_tag(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::PlainText => "txt",
            Self::Markdown => "md",
        }
    }
}

/// Extracts the full text of a document as a single string.
///
/// PDF pages and DOCX paragraphs that yield no text are skipped silently;
/// plain text and markdown files are read verbatim.
pub fn extract_text(path: &Path, format: DocumentFormat) -> Result<String, ExtractError> {
    match format {
        DocumentFormat::Pdf => extract_pdf(path),
        DocumentFormat::Docx => extract_docx(path),
        DocumentFormat::PlainText | DocumentFormat::Markdown => {
            fs::read_to_string(path).map_err(|e| io_error(path, e))
        }
    }
}

fn extract_pdf(path: &Path) -> Result<String, ExtractError> {
    let pages = pdf_extract::extract_text_by_pages(path).map_err(|e| ExtractError::Parse {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    let text: Vec<String> = pages
        .into_iter()
        .filter(|page| !page.trim().is_empty())
        .collect();

    Ok(text.join("\n\n"))
}

fn extract_docx(path: &Path) -> Result<String, ExtractError> {
    let bytes = fs::read(path).map_err(|e| io_error(path, e))?;
    let docx = read_docx(&bytes).map_err(|e| ExtractError::Parse {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    let mut paragraphs = Vec::new();
    for child in &docx.document.children {
        if let DocumentChild::Paragraph(paragraph) = child {
            let mut text = String::new();
            for para_child in &paragraph.children {
                if let ParagraphChild::Run(run) = para_child {
                    for run_child in &run.children {
                        if let RunChild::Text(t) = run_child {
                            text.push_str(&t.text);
                        }
                    }
                }
            }
            if !text.trim().is_empty() {
                paragraphs.push(text);
            }
        }
    }

    Ok(paragraphs.join("\n\n"))
}

fn io_error(path: &Path, source: std::io::Error) -> ExtractError {
    ExtractError::Io {
        path: path.display().to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_file(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn resolves_known_tags() {
        assert_eq!(DocumentFormat::from_tag("pdf").unwrap(), DocumentFormat::Pdf);
        assert_eq!(DocumentFormat::from_tag("DOCX").unwrap(), DocumentFormat::Docx);
        assert_eq!(DocumentFormat::from_tag("txt").unwrap(), DocumentFormat::PlainText);
        assert_eq!(DocumentFormat::from_tag("md").unwrap(), DocumentFormat::Markdown);
    }

    #[test]
    fn rejects_unknown_tag() {
        let err = DocumentFormat::from_tag("xlsx").unwrap_err();
        assert!(matches!(err, ExtractError::UnsupportedFormat(_)));
    }

    #[test]
    fn infers_format_from_extension() {
        assert_eq!(
            DocumentFormat::from_path(Path::new("report.PDF")),
            Some(DocumentFormat::Pdf)
        );
        assert_eq!(DocumentFormat::from_path(Path::new("notes.md")), Some(DocumentFormat::Markdown));
        assert_eq!(DocumentFormat::from_path(Path::new("archive.zip")), None);
        assert_eq!(DocumentFormat::from_path(Path::new("no_extension")), None);
    }

    #[test]
    fn plain_text_is_read_verbatim() {
        let path = temp_file("doc_ingest_extract_plain.txt", "hello\nworld\n");
        let text = extract_text(&path, DocumentFormat::PlainText).unwrap();
        assert_eq!(text, "hello\nworld\n");
        fs::remove_file(path).ok();
    }

    #[test]
    fn markdown_is_not_transformed() {
        let path = temp_file("doc_ingest_extract_md.md", "# Title\n\nSome *markdown* text.\n");
        let text = extract_text(&path, DocumentFormat::Markdown).unwrap();
        assert_eq!(text, "# Title\n\nSome *markdown* text.\n");
        fs::remove_file(path).ok();
    }

    #[test]
    fn missing_file_is_an_io_failure() {
        let path = Path::new("/nonexistent/doc_ingest_missing.txt");
        let err = extract_text(path, DocumentFormat::PlainText).unwrap_err();
        assert!(matches!(err, ExtractError::Io { .. }));
    }
}

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use lopdf::Document;
use tracing::debug;
use url::Url;
use walkdir::WalkDir;

use crate::config::PipelineConfig;
use crate::error::ExtractError;
use crate::models::Page;

const DOWNLOAD_FILE: &str = "downloaded_document.pdf";

/// External text-extraction capability: a document reference in, ordered
/// page text out. Fails with a not-found condition when the reference
/// resolves to nothing.
pub trait TextExtractor {
    fn extract(&self, document_ref: &str) -> Result<Vec<Page>, ExtractError>;
}

/// Extractor for PDF documents referenced by a filename under the documents
/// directory or by an http(s) URL. Remote documents are downloaded into the
/// temp directory with a bounded timeout before parsing.
pub struct PdfTextExtractor {
    documents_dir: PathBuf,
    temp_dir: PathBuf,
    fetch_timeout: Duration,
}

impl PdfTextExtractor {
    pub fn new(documents_dir: PathBuf, temp_dir: PathBuf, fetch_timeout: Duration) -> Self {
        Self {
            documents_dir,
            temp_dir,
            fetch_timeout,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            config.documents_dir.clone(),
            config.temp_dir.clone(),
            config.fetch_timeout,
        )
    }

    fn resolve(&self, document_ref: &str) -> Result<PathBuf, ExtractError> {
        if let Some(remote) = parse_remote(document_ref) {
            return self.download(&remote);
        }

        let local = self.documents_dir.join(document_ref);
        if !local.exists() {
            return Err(ExtractError::NotFound(local.display().to_string()));
        }
        Ok(local)
    }

    fn download(&self, url: &Url) -> Result<PathBuf, ExtractError> {
        tokio::task::block_in_place(|| self.download_blocking(url))
    }

    fn download_blocking(&self, url: &Url) -> Result<PathBuf, ExtractError> {
        fs::create_dir_all(&self.temp_dir)?;

        let client = reqwest::blocking::Client::builder()
            .timeout(self.fetch_timeout)
            .build()?;
        let response = client.get(url.clone()).send()?;
        if !response.status().is_success() {
            return Err(ExtractError::FetchStatus {
                url: url.to_string(),
                status: response.status(),
            });
        }

        let bytes = response.bytes()?;
        let local = self.temp_dir.join(DOWNLOAD_FILE);
        fs::write(&local, &bytes)?;
        debug!(url = %url, bytes = bytes.len(), "downloaded remote document");
        Ok(local)
    }
}

impl TextExtractor for PdfTextExtractor {
    fn extract(&self, document_ref: &str) -> Result<Vec<Page>, ExtractError> {
        let path = self.resolve(document_ref)?;
        extract_page_texts(&path)
    }
}

/// References that parse as http(s) URLs are remote; everything else is a
/// filename relative to the documents directory.
fn parse_remote(document_ref: &str) -> Option<Url> {
    let parsed = Url::parse(document_ref).ok()?;
    matches!(parsed.scheme(), "http" | "https").then_some(parsed)
}

/// Extracts per-page text from a PDF on disk. Page numbers are 1-based and
/// pages without readable text are skipped; a document with no readable text
/// at all is a parse error.
pub fn extract_page_texts(path: &Path) -> Result<Vec<Page>, ExtractError> {
    let document =
        Document::load(path).map_err(|error| ExtractError::PdfParse(error.to_string()))?;

    let mut pages = Vec::new();
    for (page_no, _page_id) in document.get_pages() {
        let text = document
            .extract_text(&[page_no])
            .map_err(|error| ExtractError::PdfParse(error.to_string()))?;

        if !text.trim().is_empty() {
            pages.push(Page {
                number: page_no,
                text,
            });
        }
    }

    if pages.is_empty() {
        return Err(ExtractError::PdfParse(format!(
            "pdf had no readable page text: {}",
            path.display()
        )));
    }

    Ok(pages)
}

/// Recursively lists the PDF documents under `folder`, as paths relative to
/// it, sorted. The relative form is exactly what `extract` accepts as a
/// local document reference.
pub fn available_documents(folder: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(folder)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
        })
        .filter_map(|entry| {
            entry
                .path()
                .strip_prefix(folder)
                .ok()
                .map(Path::to_path_buf)
        })
        .collect();

    files.sort_unstable();
    files
}

use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::models::{Chunk, Page};
use crate::normalize::clean_text;

#[derive(Debug, Clone, Copy)]
pub struct ChunkingConfig {
    pub chunk_chars: usize,
    pub overlap_chars: usize,
}

impl From<&PipelineConfig> for ChunkingConfig {
    fn from(value: &PipelineConfig) -> Self {
        Self {
            chunk_chars: value.chunk_size,
            overlap_chars: value.chunk_overlap,
        }
    }
}

/// Walks `text` with a fixed-size window, keeping `overlap_chars` characters
/// of trailing context between consecutive windows. Offsets are
/// character-based, so multi-byte text never splits inside a code point.
/// Blank windows are dropped; the final window is naturally shorter.
pub fn split_into_windows(text: &str, config: ChunkingConfig) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let step = config.chunk_chars.saturating_sub(config.overlap_chars).max(1);

    let mut windows = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + config.chunk_chars).min(chars.len());
        let window: String = chars[start..end].iter().collect();
        let trimmed = window.trim();
        if !trimmed.is_empty() {
            windows.push(trimmed.to_string());
        }
        start += step;
    }

    windows
}

/// Normalizes every page, windows it, and tags each window with the source
/// document and page number. Ids are assigned here, not in the window walk,
/// so output from any number of pages can be merged without collision.
pub fn assemble_chunks(pages: &[Page], source: &str, config: ChunkingConfig) -> Vec<Chunk> {
    let mut chunks = Vec::new();

    for page in pages {
        let cleaned = clean_text(&page.text);
        for content in split_into_windows(&cleaned, config) {
            chunks.push(Chunk {
                id: Uuid::new_v4(),
                content,
                source: source.to_string(),
                location: page.number,
            });
        }
    }

    chunks
}

//! Turns plain-text documents into ordered passages.
//!
//! Pages are separated by form feeds (`\x0c`), which is what most PDF text
//! extractors emit between pages. Each page is cut into chunks of at most
//! `chunk_size` characters with `chunk_overlap` characters carried over,
//! breaking at a paragraph, then a line, then a word boundary when one exists
//! in the second half of the window.

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::IngestConfig;
use crate::types::Passage;

const PAGE_BREAK: char = '\x0c';

#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { chunk_size: 512, chunk_overlap: 100 }
    }
}

impl From<&IngestConfig> for ChunkingConfig {
    fn from(cfg: &IngestConfig) -> Self {
        Self { chunk_size: cfg.chunk_size, chunk_overlap: cfg.chunk_overlap }
    }
}

#[derive(Default)]
pub struct DataProcessor {
    chunking_config: ChunkingConfig,
}

impl DataProcessor {
    pub fn new() -> Self { Self::default() }

    pub fn with_config(chunking_config: ChunkingConfig) -> Self { Self { chunking_config } }

    /// Read one file and chunk it; the file name becomes the source id.
    pub fn process_file(&self, file_path: &Path) -> Result<Vec<Passage>> {
        let content = self.read_file_content(file_path)?;
        let source_id = self.extract_source_id(file_path);
        let passages = self.process_text(&content, &source_id);
        tracing::info!(source = %source_id, passages = passages.len(), "chunked document");
        Ok(passages)
    }

    /// Chunk every `.txt` file under `data_dir`, one `(source_id, passages)` pair per file.
    ///
    /// The source id is the path relative to `data_dir` with `/` separators,
    /// so `a/notes.txt` and `b/notes.txt` stay distinct documents.
    pub fn process_directory(&self, data_dir: &Path) -> Result<Vec<(String, Vec<Passage>)>> {
        let files = self.list_txt_files(data_dir);
        if files.is_empty() {
            tracing::warn!("no .txt files found under {}", data_dir.display());
            return Ok(vec![]);
        }
        let mut documents = Vec::with_capacity(files.len());
        for (file_index, file_path) in files.iter().enumerate() {
            tracing::debug!("processing file {}/{}: {}", file_index + 1, files.len(), file_path.display());
            let source_id = relative_source_id(data_dir, file_path);
            let passages = self.process_text(&self.read_file_content(file_path)?, &source_id);
            tracing::info!(source = %source_id, passages = passages.len(), "chunked document");
            documents.push((source_id, passages));
        }
        Ok(documents)
    }

    /// Chunk already extracted text. Blank pages produce no passages, but
    /// still count towards page numbering.
    pub fn process_text(&self, content: &str, source_id: &str) -> Vec<Passage> {
        let mut passages = Vec::new();
        for (page_index, page) in content.split(PAGE_BREAK).enumerate() {
            if page.trim().is_empty() { continue; }
            let page_number = u32::try_from(page_index + 1).ok();
            for chunk in self.split_page(page) {
                let sequence_index = passages.len();
                passages.push(Passage::new(chunk, source_id, page_number, sequence_index));
            }
        }
        passages
    }

    fn read_file_content(&self, file_path: &Path) -> Result<String> {
        match fs::read_to_string(file_path) {
            Ok(content) => Ok(content),
            Err(_) => Ok(String::from_utf8_lossy(&fs::read(file_path)?).to_string()),
        }
    }

    fn extract_source_id(&self, file_path: &Path) -> String {
        file_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| file_path.to_string_lossy().to_string())
    }

    fn split_page(&self, page: &str) -> Vec<String> {
        let chars: Vec<char> = page.chars().collect();
        let size = self.chunking_config.chunk_size.max(1);
        let overlap = self.chunking_config.chunk_overlap.min(size - 1);
        let mut chunks = Vec::new();
        let mut start = 0;
        while start < chars.len() {
            let hard_end = (start + size).min(chars.len());
            let end = if hard_end == chars.len() { hard_end } else { Self::find_break(&chars, start, hard_end, size) };
            let chunk: String = chars[start..end].iter().collect();
            let chunk = chunk.trim();
            if !chunk.is_empty() { chunks.push(chunk.to_string()); }
            if end >= chars.len() { break; }
            let mut next = end.saturating_sub(overlap);
            if next <= start { next = end; }
            // don't start the overlap in the middle of a word
            while next < end && !chars[next - 1].is_whitespace() { next += 1; }
            start = next;
        }
        chunks
    }

    /// Exclusive end of the chunk starting at `start`.
    fn find_break(chars: &[char], start: usize, hard_end: usize, size: usize) -> usize {
        let min_end = start + (size / 2).max(1);
        let paragraph = (min_end..=hard_end).rev().find(|&p| p >= 2 && chars[p - 2] == '\n' && chars[p - 1] == '\n');
        let line = || (min_end..=hard_end).rev().find(|&p| chars[p - 1] == '\n');
        let word = || (min_end..=hard_end).rev().find(|&p| chars[p - 1].is_whitespace());
        paragraph.or_else(line).or_else(word).unwrap_or(hard_end)
    }

    fn list_txt_files(&self, root: &Path) -> Vec<PathBuf> {
        let mut txt_files = Vec::new();
        for entry in walkdir::WalkDir::new(root).into_iter().filter_map(|e| e.ok()).filter(|e| e.file_type().is_file()) {
            let path = entry.path(); if path.extension().and_then(|s| s.to_str()) == Some("txt") { txt_files.push(path.to_path_buf()); }
        }
        txt_files.sort(); txt_files
    }
}

fn relative_source_id(root: &Path, file_path: &Path) -> String {
    let relative = file_path.strip_prefix(root).unwrap_or(file_path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

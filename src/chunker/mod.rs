//! Language-aware text chunking with overlap (C3).


use thiserror::Error;

use crate::document::Document;
use crate::value::{Metadata, MetadataValue};

/// Errors returned while chunking a document.
#[derive(Debug, Error, PartialEq)]
pub enum ChunkerError {
    /// `chunk_size` must be greater than zero.
    #[error("chunk_size must be > 0")]
    InvalidChunkSize,

    /// `overlap` must be strictly less than `chunk_size`.
    #[error("overlap ({overlap}) must be less than chunk_size ({chunk_size})")]
    OverlapTooLarge { chunk_size: usize, overlap: usize },
}

/// A detected or explicitly chosen chunking language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    En,
    Ko,
    Ja,
    Zh,
    Th,
}

impl Language {
    /// Returns the chars-per-token ratio this language's adjustment uses.
    fn chars_per_token(self) -> f64 {
        match self {
            Language::En => 4.0,
            Language::Ko => 2.0,
            Language::Ja => 2.0,
            Language::Zh => 1.5,
            Language::Th => 2.0,
        }
    }

    fn is_fixed_window(self) -> bool {
        matches!(self, Language::Ko | Language::Ja | Language::Zh | Language::Th)
    }

    fn as_str(self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Ko => "ko",
            Language::Ja => "ja",
            Language::Zh => "zh",
            Language::Th => "th",
        }
    }
}

/// Detects a document's dominant language by scanning its first 500
/// characters for Unicode ranges. Defaults to [`Language::En`].
pub fn detect_language(text: &str) -> Language {
    for c in text.chars().take(500) {
        let cp = c as u32;
        if (0xAC00..=0xD7A3).contains(&cp) || (0x1100..=0x11FF).contains(&cp) {
            return Language::Ko;
        }
        if (0x3040..=0x309F).contains(&cp) || (0x30A0..=0x30FF).contains(&cp) {
            return Language::Ja;
        }
        if (0x4E00..=0x9FFF).contains(&cp) {
            return Language::Zh;
        }
        if (0x0E00..=0x0E7F).contains(&cp) {
            return Language::Th;
        }
    }
    Language::En
}

/// Chunking parameters.
#[derive(Debug, Clone)]
pub struct ChunkConfig {
    pub chunk_size: usize,
    pub overlap: usize,
    pub preserve_metadata: bool,
    pub language: Option<Language>,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            overlap: 200,
            preserve_metadata: true,
            language: None,
        }
    }
}

impl ChunkConfig {
    fn validate(&self) -> Result<(), ChunkerError> {
        if self.chunk_size == 0 {
            return Err(ChunkerError::InvalidChunkSize);
        }
        if self.overlap >= self.chunk_size {
            return Err(ChunkerError::OverlapTooLarge {
                chunk_size: self.chunk_size,
                overlap: self.overlap,
            });
        }
        Ok(())
    }
}

/// A single chunk of a parent document.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub content: String,
    pub metadata: Metadata,
}

/// Splits `document` into chunks per `config`.
pub fn chunk_document(document: &Document, config: &ChunkConfig) -> Result<Vec<Chunk>, ChunkerError> {
    config.validate()?;

    let language = config.language.unwrap_or_else(|| detect_language(&document.content));
    let cpt = language.chars_per_token();
    let adjusted = (config.chunk_size as f64 * 4.0 / cpt).round() as usize;
    let adjusted_overlap = (config.overlap as f64 * 4.0 / cpt).round() as usize;

    let content = &document.content;
    if content.chars().count() <= adjusted {
        return Ok(vec![build_chunk(document, content, 0, 1, language, config)]);
    }

    let segments = segment(content, language, adjusted);
    let bodies = assemble(&segments, adjusted, adjusted_overlap);
    let total = bodies.len();

    Ok(bodies
        .into_iter()
        .enumerate()
        .map(|(idx, body)| build_chunk(document, &body, idx, total, language, config))
        .collect())
}

/// Chunks a batch of documents. A single document's chunking failure is
/// logged and that document's full content is preserved as a single chunk
/// rather than dropping it from the output.
pub fn chunk_batch(documents: &[Document], config: &ChunkConfig) -> Vec<Chunk> {
    documents
        .iter()
        .flat_map(|doc| match chunk_document(doc, config) {
            Ok(chunks) => chunks,
            Err(err) => {
                tracing::warn!(document_id = %doc.id, error = %err, "chunking failed, preserving document whole");
                let language = config.language.unwrap_or_else(|| detect_language(&doc.content));
                vec![build_chunk(doc, &doc.content, 0, 1, language, config)]
            }
        })
        .collect()
}

fn build_chunk(
    document: &Document,
    body: &str,
    index: usize,
    total: usize,
    language: Language,
    config: &ChunkConfig,
) -> Chunk {
    let mut metadata = if config.preserve_metadata {
        document.metadata.clone()
    } else {
        Metadata::new()
    };

    metadata.insert("chunk_index".to_string(), MetadataValue::Int(index as i64));
    metadata.insert("total_chunks".to_string(), MetadataValue::Int(total as i64));
    metadata.insert(
        "parent_document_id".to_string(),
        MetadataValue::String(document.id.clone()),
    );
    metadata.insert(
        "language".to_string(),
        MetadataValue::String(language.as_str().to_string()),
    );

    Chunk {
        content: body.to_string(),
        metadata,
    }
}

/// Splits `content` into ordered units to be greedily reassembled into chunks.
fn segment(content: &str, language: Language, adjusted: usize) -> Vec<String> {
    if language.is_fixed_window() {
        let window = (adjusted / 10).max(1);
        return content
            .chars()
            .collect::<Vec<char>>()
            .chunks(window)
            .map(|c| c.iter().collect())
            .collect();
    }

    let paragraphs: Vec<&str> = content
        .split("\n\n")
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if paragraphs.len() > 1 {
        return paragraphs.into_iter().map(String::from).collect();
    }

    let sentences = split_sentences(content);
    if sentences.len() > 1 {
        return sentences;
    }

    content.split_whitespace().map(String::from).collect()
}

/// Terminal punctuation recognized as a sentence boundary when followed by
/// whitespace. Covers Latin, CJK, and Arabic terminators rather than just
/// ASCII `. ! ?`.
const SENTENCE_TERMINATORS: [char; 7] = ['.', '!', '?', '。', '！', '？', '؟'];

fn split_sentences(content: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = content.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        if SENTENCE_TERMINATORS.contains(&c) && chars.peek().is_some_and(|n| n.is_whitespace()) {
            sentences.push(current.trim().to_string());
            current.clear();
        }
    }
    if !current.trim().is_empty() {
        sentences.push(current.trim().to_string());
    }
    sentences.into_iter().filter(|s| !s.is_empty()).collect()
}

/// Greedily assembles segments into chunks no longer than `adjusted`
/// characters, seeding each new chunk with the last `overlap` characters of
/// the previous one.
fn assemble(segments: &[String], adjusted: usize, overlap: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for segment in segments {
        let joined_len = current.chars().count()
            + usize::from(!current.is_empty())
            + segment.chars().count();

        if !current.is_empty() && joined_len > adjusted {
            chunks.push(current.clone());
            current = tail(&current, overlap);
        }

        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(segment);
    }

    if !current.trim().is_empty() {
        chunks.push(current);
    }

    if chunks.is_empty() {
        chunks.push(String::new());
    }

    chunks
}

fn tail(s: &str, n: usize) -> String {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= n {
        return s.to_string();
    }
    chars[chars.len() - n..].iter().collect()
}

//! Sliding-window document chunking.
//!
//! Text is whitespace-normalized (every whitespace run collapsed to a single
//! space, then trimmed) and cut into windows of `size` characters whose start
//! offsets advance by `size - overlap`. Offsets count Unicode scalar values,
//! never bytes, so multi-byte text is never split inside a character.

use serde::{Deserialize, Serialize};

use crate::clauses::ClauseOntology;
use crate::error::ConfigError;
use crate::types::Chunk;

/// Chunk window configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Window length in characters.
    #[serde(default = "default_size")]
    pub size: usize,
    /// Characters shared between consecutive windows.
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

fn default_size() -> usize {
    800
}

fn default_overlap() -> usize {
    200
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            size: default_size(),
            overlap: default_overlap(),
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.size == 0 {
            return Err(ConfigError::Invalid {
                message: "chunking.size must be greater than zero".into(),
            });
        }
        if self.overlap >= self.size {
            return Err(ConfigError::Invalid {
                message: format!(
                    "chunking.overlap ({}) must be smaller than chunking.size ({})",
                    self.overlap, self.size
                ),
            });
        }
        Ok(())
    }
}

/// Splits normalized text into overlapping fixed-size windows.
#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    size: usize,
    overlap: usize,
}

impl Chunker {
    /// Build a chunker, rejecting `overlap >= size` (which would never advance).
    pub fn new(config: ChunkingConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            size: config.size,
            overlap: config.overlap,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split `text` into windows. Empty or whitespace-only input yields no windows.
    pub fn split(&self, text: &str) -> Vec<String> {
        let normalized = normalize_whitespace(text);
        if normalized.is_empty() {
            return Vec::new();
        }

        // Byte offset of every char boundary, plus the end of the string.
        let bounds: Vec<usize> = normalized
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(normalized.len()))
            .collect();
        let char_len = bounds.len() - 1;
        let step = self.size - self.overlap;

        let mut windows = Vec::with_capacity(char_len / step + 1);
        let mut start = 0;
        while start < char_len {
            let end = (start + self.size).min(char_len);
            windows.push(normalized[bounds[start]..bounds[end]].to_string());
            start += step;
        }
        windows
    }

    /// Chunk one document into records owned by `owner`, tagging each window
    /// against `ontology` when one is supplied.
    pub fn chunk_document(
        &self,
        owner: &str,
        text: &str,
        ontology: Option<&ClauseOntology>,
    ) -> Vec<Chunk> {
        self.split(text)
            .into_iter()
            .enumerate()
            .map(|(idx, window)| {
                let tag = ontology.and_then(|o| o.tag(&window).map(str::to_string));
                Chunk::new(owner, window, idx).with_clause_tag(tag)
            })
            .collect()
    }
}

/// Collapse every whitespace run to a single space and trim both ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

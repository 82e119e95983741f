//! Metadata store: chunk records kept in the same ordinal order as the vector index.

use std::path::Path;

use crate::error::IndexError;
use crate::persistence;
use crate::types::Chunk;

/// Parallel array of chunk records keyed by vector-index position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataStore {
    rows: Vec<Chunk>,
}

impl MetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: Vec<Chunk>) -> Self {
        Self { rows }
    }

    /// Append rows; returns the position of the first appended row.
    pub fn extend(&mut self, rows: impl IntoIterator<Item = Chunk>) -> usize {
        let first = self.rows.len();
        self.rows.extend(rows);
        first
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, position: usize) -> Result<&Chunk, IndexError> {
        self.rows.get(position).ok_or(IndexError::OutOfRange {
            position,
            len: self.rows.len(),
        })
    }

    pub fn rows(&self) -> &[Chunk] {
        &self.rows
    }

    /// Number of distinct owning documents.
    pub fn owner_count(&self) -> usize {
        let mut owners: Vec<&str> = self.rows.iter().map(|c| c.owner.as_str()).collect();
        owners.sort_unstable();
        owners.dedup();
        owners.len()
    }

    /// Read rows from a JSON Lines file in insertion order.
    pub fn load(path: &Path) -> std::io::Result<Self> {
        Ok(Self {
            rows: persistence::load_jsonl(path)?,
        })
    }

    /// Write rows as JSON Lines via write-then-rename.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        persistence::atomic_write_jsonl(path, &self.rows)
    }
}

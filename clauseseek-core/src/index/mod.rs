//! # Corpus index
//!
//! Pairs the [`VectorIndex`] with its [`MetadataStore`] and owns the on-disk
//! layout of an index directory:
//!
//! ```text
//! <dir>/CURRENT                       id of the active generation
//! <dir>/generations/<id>/vectors.idx   binary inner-product index
//! <dir>/generations/<id>/meta.jsonl    one chunk record per line, vector order
//! <dir>/generations/<id>/manifest.json build summary (provider, dimension, counts)
//! ```
//!
//! A save writes a complete new generation and then swaps `CURRENT` with a
//! single rename, so a loader always reads a vector file and metadata file
//! from the same build. Older generations are pruned after the swap.

pub mod metadata;
pub mod vector;

pub use metadata::MetadataStore;
pub use vector::{Hit, VectorIndex, dot_product, is_unit, l2_normalize};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::StartupError;
use crate::persistence;

pub const CURRENT_FILE: &str = "CURRENT";
pub const GENERATIONS_DIR: &str = "generations";
pub const VECTORS_FILE: &str = "vectors.idx";
pub const METADATA_FILE: &str = "meta.jsonl";
pub const MANIFEST_FILE: &str = "manifest.json";

/// Build summary written next to the index files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub run_id: uuid::Uuid,
    pub embedding_provider: String,
    pub dimensions: usize,
    pub chunk_count: usize,
    pub owner_count: usize,
    pub skipped: usize,
    pub built_at: DateTime<Utc>,
}

/// File locations of one index generation.
#[derive(Debug, Clone)]
pub struct IndexPaths {
    pub dir: PathBuf,
    pub vectors: PathBuf,
    pub metadata: PathBuf,
    pub manifest: PathBuf,
}

impl IndexPaths {
    /// Paths of generation `generation` under index directory `dir`.
    pub fn generation(dir: &Path, generation: &str) -> Self {
        let dir = dir.join(GENERATIONS_DIR).join(generation);
        Self {
            vectors: dir.join(VECTORS_FILE),
            metadata: dir.join(METADATA_FILE),
            manifest: dir.join(MANIFEST_FILE),
            dir,
        }
    }

    /// Paths of the generation `CURRENT` points at.
    pub fn current(dir: &Path) -> Result<Self, StartupError> {
        let pointer = dir.join(CURRENT_FILE);
        if !pointer.exists() {
            return Err(StartupError::MissingFile { path: pointer });
        }
        let content = std::fs::read_to_string(&pointer).map_err(|e| load_error(&pointer, e))?;
        let generation = content.trim();
        let valid = !generation.is_empty()
            && generation
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-');
        if !valid {
            return Err(load_error(
                &pointer,
                format!("invalid generation id {generation:?}"),
            ));
        }
        Ok(Self::generation(dir, generation))
    }
}

/// Vector index and metadata store, validated to be the same length.
#[derive(Debug, Clone)]
pub struct CorpusIndex {
    vectors: VectorIndex,
    metadata: MetadataStore,
    manifest: Option<IndexManifest>,
}

impl CorpusIndex {
    /// Pair an index with its metadata, enforcing the row-count invariant.
    pub fn new(vectors: VectorIndex, metadata: MetadataStore) -> Result<Self, StartupError> {
        if vectors.len() != metadata.len() {
            return Err(StartupError::RowCountMismatch {
                vectors: vectors.len(),
                rows: metadata.len(),
            });
        }
        Ok(Self {
            vectors,
            metadata,
            manifest: None,
        })
    }

    pub fn with_manifest(mut self, manifest: IndexManifest) -> Self {
        self.manifest = Some(manifest);
        self
    }

    pub fn vectors(&self) -> &VectorIndex {
        &self.vectors
    }

    pub fn metadata(&self) -> &MetadataStore {
        &self.metadata
    }

    pub fn manifest(&self) -> Option<&IndexManifest> {
        self.manifest.as_ref()
    }

    pub fn len(&self) -> usize {
        self.metadata.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
    }

    /// Load the current generation of a persisted index directory. A missing
    /// pointer, vector file or metadata file is fatal, as is a row-count
    /// mismatch; the manifest is optional.
    pub fn load(dir: &Path) -> Result<Self, StartupError> {
        let paths = IndexPaths::current(dir)?;
        for path in [&paths.vectors, &paths.metadata] {
            if !path.exists() {
                return Err(StartupError::MissingFile { path: path.clone() });
            }
        }

        let bytes = std::fs::read(&paths.vectors).map_err(|e| load_error(&paths.vectors, e))?;
        let vectors =
            VectorIndex::from_bytes(&bytes).map_err(|e| load_error(&paths.vectors, e))?;
        let metadata =
            MetadataStore::load(&paths.metadata).map_err(|e| load_error(&paths.metadata, e))?;
        let manifest: Option<IndexManifest> =
            persistence::load_json(&paths.manifest).map_err(|e| load_error(&paths.manifest, e))?;

        let mut index = Self::new(vectors, metadata)?;
        index.manifest = manifest;
        tracing::info!(
            dir = %paths.dir.display(),
            chunks = index.len(),
            dimension = index.vectors.dimension(),
            "Loaded corpus index"
        );
        Ok(index)
    }

    /// Write a new generation and make it current. The generation id is the
    /// manifest's `run_id`, or a fresh id without a manifest.
    pub fn save(&self, dir: &Path) -> std::io::Result<()> {
        let generation = self
            .manifest
            .as_ref()
            .map(|m| m.run_id)
            .unwrap_or_else(uuid::Uuid::new_v4)
            .to_string();
        let paths = IndexPaths::generation(dir, &generation);
        std::fs::create_dir_all(&paths.dir)?;

        let bytes = self.vectors.to_bytes().map_err(std::io::Error::other)?;
        self.metadata.save(&paths.metadata)?;
        persistence::atomic_write(&paths.vectors, &bytes)?;
        if let Some(manifest) = &self.manifest {
            persistence::atomic_write_json(&paths.manifest, manifest)?;
        }

        persistence::atomic_write(&dir.join(CURRENT_FILE), generation.as_bytes())?;
        prune_generations(dir, &generation);
        Ok(())
    }
}

/// Remove every generation except `keep`. Failures are logged, not fatal.
fn prune_generations(dir: &Path, keep: &str) {
    let entries = match std::fs::read_dir(dir.join(GENERATIONS_DIR)) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to list index generations");
            return;
        }
    };
    for entry in entries.flatten() {
        if entry.file_name() == keep {
            continue;
        }
        if let Err(e) = std::fs::remove_dir_all(entry.path()) {
            tracing::warn!(path = %entry.path().display(), error = %e, "Failed to prune index generation");
        }
    }
}

fn load_error(path: &Path, err: impl std::fmt::Display) -> StartupError {
    StartupError::Load {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Chunk;
    use tempfile::TempDir;

    fn corpus() -> CorpusIndex {
        let mut vectors = VectorIndex::build(2).unwrap();
        vectors.add(&[vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap();
        let metadata = MetadataStore::from_rows(vec![
            Chunk::new("a.txt", "alpha", 0),
            Chunk::new("b.txt", "beta", 0),
        ]);
        CorpusIndex::new(vectors, metadata).unwrap()
    }

    fn manifest() -> IndexManifest {
        IndexManifest {
            run_id: uuid::Uuid::new_v4(),
            embedding_provider: "local".into(),
            dimensions: 2,
            chunk_count: 2,
            owner_count: 2,
            skipped: 0,
            built_at: Utc::now(),
        }
    }

    #[test]
    fn test_new_rejects_row_mismatch() {
        let mut vectors = VectorIndex::build(2).unwrap();
        vectors.add(&[vec![1.0, 0.0]]).unwrap();
        let err = CorpusIndex::new(vectors, MetadataStore::new()).unwrap_err();
        assert!(matches!(
            err,
            StartupError::RowCountMismatch { vectors: 1, rows: 0 }
        ));
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let index = corpus().with_manifest(manifest());
        index.save(dir.path()).unwrap();

        let loaded = CorpusIndex::load(dir.path()).unwrap();
        assert_eq!(loaded.vectors(), index.vectors());
        assert_eq!(loaded.metadata(), index.metadata());
        assert_eq!(loaded.manifest().unwrap().chunk_count, 2);
    }

    #[test]
    fn test_load_without_manifest() {
        let dir = TempDir::new().unwrap();
        corpus().save(dir.path()).unwrap();
        let loaded = CorpusIndex::load(dir.path()).unwrap();
        assert!(loaded.manifest().is_none());
        assert_eq!(loaded.len(), 2);
    }

    #[test]
    fn test_load_missing_files() {
        let dir = TempDir::new().unwrap();
        let err = CorpusIndex::load(dir.path()).unwrap_err();
        match err {
            StartupError::MissingFile { path } => assert!(path.ends_with(CURRENT_FILE)),
            other => panic!("unexpected error: {other}"),
        }

        std::fs::write(dir.path().join(CURRENT_FILE), "gen-1").unwrap();
        match CorpusIndex::load(dir.path()).unwrap_err() {
            StartupError::MissingFile { path } => assert!(path.ends_with(VECTORS_FILE)),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_load_rejects_bad_pointer() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(CURRENT_FILE), "../elsewhere").unwrap();
        assert!(matches!(
            CorpusIndex::load(dir.path()),
            Err(StartupError::Load { .. })
        ));
    }

    #[test]
    fn test_load_detects_row_mismatch() {
        let dir = TempDir::new().unwrap();
        corpus().save(dir.path()).unwrap();
        // Drop one metadata row behind the index's back.
        let paths = IndexPaths::current(dir.path()).unwrap();
        let content = std::fs::read_to_string(&paths.metadata).unwrap();
        let first_line = content.lines().next().unwrap();
        std::fs::write(&paths.metadata, format!("{first_line}\n")).unwrap();

        let err = CorpusIndex::load(dir.path()).unwrap_err();
        assert!(matches!(
            err,
            StartupError::RowCountMismatch { vectors: 2, rows: 1 }
        ));
    }

    #[test]
    fn test_load_corrupt_vectors() {
        let dir = TempDir::new().unwrap();
        corpus().save(dir.path()).unwrap();
        std::fs::write(IndexPaths::current(dir.path()).unwrap().vectors, b"garbage").unwrap();
        assert!(matches!(
            CorpusIndex::load(dir.path()),
            Err(StartupError::Load { .. })
        ));
    }

    #[test]
    fn test_unpublished_generation_is_invisible() {
        let dir = TempDir::new().unwrap();
        let first = corpus().with_manifest(manifest());
        first.save(dir.path()).unwrap();

        // A rebuild that has written its files but not yet swapped the pointer.
        let mut vectors = VectorIndex::build(2).unwrap();
        vectors.add(&[vec![0.6, 0.8]]).unwrap();
        let staged = IndexPaths::generation(dir.path(), "staged");
        std::fs::create_dir_all(&staged.dir).unwrap();
        MetadataStore::from_rows(vec![Chunk::new("c.txt", "gamma", 0)])
            .save(&staged.metadata)
            .unwrap();
        std::fs::write(&staged.vectors, vectors.to_bytes().unwrap()).unwrap();

        let loaded = CorpusIndex::load(dir.path()).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.manifest().unwrap().run_id, first.manifest().unwrap().run_id);
    }

    #[test]
    fn test_save_swaps_generation_and_prunes_old() {
        let dir = TempDir::new().unwrap();
        corpus().with_manifest(manifest()).save(dir.path()).unwrap();

        let mut vectors = VectorIndex::build(2).unwrap();
        vectors.add(&[vec![0.6, 0.8]]).unwrap();
        let second = CorpusIndex::new(
            vectors,
            MetadataStore::from_rows(vec![Chunk::new("c.txt", "gamma", 0)]),
        )
        .unwrap()
        .with_manifest(manifest());
        second.save(dir.path()).unwrap();

        let loaded = CorpusIndex::load(dir.path()).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.metadata().get(0).unwrap().owner, "c.txt");

        let current = std::fs::read_to_string(dir.path().join(CURRENT_FILE)).unwrap();
        assert_eq!(current, second.manifest().unwrap().run_id.to_string());
        let generations: Vec<_> = std::fs::read_dir(dir.path().join(GENERATIONS_DIR))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(generations.len(), 1);
        assert_eq!(generations[0].to_string_lossy(), current);
    }
}

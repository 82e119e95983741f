//! Offline ingestion: documents in, index directory out.
//!
//! Per-document failures never abort a run. The document is recorded as
//! skipped, logged, and the remaining documents are processed. A run that
//! produces no chunks at all fails without writing anything.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

use crate::chunker::Chunker;
use crate::clauses::ClauseOntology;
use crate::embeddings::{Embedder, encode_in_batches};
use crate::error::IngestError;
use crate::extract::ExtractionChain;
use crate::index::{CorpusIndex, IndexManifest, MetadataStore, VectorIndex, is_unit};
use crate::types::Chunk;

/// Name of the skip log written next to the index files.
pub const INGEST_LOG_FILE: &str = "ingest.log";

/// A document left out of the index and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedDocument {
    pub owner: String,
    pub reason: String,
}

/// Summary of a completed ingestion run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestReport {
    pub documents: usize,
    pub chunks: usize,
    pub owners: usize,
    pub skipped: Vec<SkippedDocument>,
    pub index_dir: PathBuf,
}

/// Builds an index directory from a directory of source documents.
pub struct Ingestor {
    chunker: Chunker,
    ontology: ClauseOntology,
    extractors: ExtractionChain,
    embedder: Arc<dyn Embedder>,
    batch_size: usize,
}

impl Ingestor {
    pub fn new(chunker: Chunker, ontology: ClauseOntology, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            chunker,
            ontology,
            extractors: ExtractionChain::standard(),
            embedder,
            batch_size: 32,
        }
    }

    pub fn with_extractors(mut self, extractors: ExtractionChain) -> Self {
        self.extractors = extractors;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Ingest every file under `source_dir` and write the index to `index_dir`.
    pub async fn run(&self, source_dir: &Path, index_dir: &Path) -> Result<IngestReport, IngestError> {
        if !source_dir.is_dir() {
            return Err(IngestError::SourceMissing {
                path: source_dir.to_path_buf(),
            });
        }

        let root = source_dir.canonicalize()?;
        // The index may live inside the source tree (e.g. `ingest .`).
        let excluded = index_dir.canonicalize().ok();

        let mut documents = 0;
        let mut chunks: Vec<Chunk> = Vec::new();
        let mut skipped: Vec<SkippedDocument> = Vec::new();

        let walker = WalkDir::new(&root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| excluded.as_ref().is_none_or(|ex| !e.path().starts_with(ex)));
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(error = %e, "Unreadable directory entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            documents += 1;
            let owner = owner_name(&root, entry.path());

            match self.chunk_file(entry.path(), &owner) {
                Ok(doc_chunks) => {
                    tracing::debug!(owner = %owner, chunks = doc_chunks.len(), "Chunked document");
                    chunks.extend(doc_chunks);
                }
                Err(reason) => {
                    tracing::warn!(owner = %owner, reason = %reason, "Skipping document");
                    skipped.push(SkippedDocument { owner, reason });
                }
            }
        }

        if chunks.is_empty() {
            return Err(IngestError::NoChunks {
                documents,
                skipped: skipped.len(),
            });
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = encode_in_batches(self.embedder.as_ref(), &texts, self.batch_size)
            .await
            .map_err(|source| IngestError::Embedding {
                count: texts.len(),
                source,
            })?;
        let (chunks, embeddings) = drop_unembeddable(chunks, embeddings, &mut skipped);
        if chunks.is_empty() {
            return Err(IngestError::NoChunks {
                documents,
                skipped: skipped.len(),
            });
        }
        let dimension = embeddings
            .first()
            .map(Vec::len)
            .unwrap_or_else(|| self.embedder.dimensions());

        let mut vectors = VectorIndex::build(dimension)?;
        vectors.add(&embeddings)?;
        let metadata = MetadataStore::from_rows(chunks);
        let owners = metadata.owner_count();
        let chunk_count = metadata.len();

        let manifest = IndexManifest {
            run_id: uuid::Uuid::new_v4(),
            embedding_provider: self.embedder.provider_name().to_string(),
            dimensions: dimension,
            chunk_count,
            owner_count: owners,
            skipped: skipped.len(),
            built_at: Utc::now(),
        };
        let index = CorpusIndex::new(vectors, metadata)?.with_manifest(manifest);

        std::fs::create_dir_all(index_dir)?;
        index.save(index_dir)?;
        write_skip_log(&index_dir.join(INGEST_LOG_FILE), &skipped)?;

        tracing::info!(
            documents,
            chunks = chunk_count,
            owners,
            skipped = skipped.len(),
            index_dir = %index_dir.display(),
            "Ingestion complete"
        );

        Ok(IngestReport {
            documents,
            chunks: chunk_count,
            owners,
            skipped,
            index_dir: index_dir.to_path_buf(),
        })
    }

    /// Extract, chunk and tag one document. `Err` carries the skip reason.
    fn chunk_file(&self, path: &Path, owner: &str) -> Result<Vec<Chunk>, String> {
        let size = std::fs::metadata(path).map_err(|e| e.to_string())?.len();
        if size == 0 {
            return Err("empty file".into());
        }
        let text = self.extractors.extract(path).map_err(|e| e.to_string())?;
        let chunks = self.chunker.chunk_document(owner, &text, Some(&self.ontology));
        if chunks.is_empty() {
            return Err("no text extracted".into());
        }
        Ok(chunks)
    }
}

/// Document id: the path relative to the source root, `/`-separated.
fn owner_name(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Drop chunks whose embedding is not unit-length (no embeddable tokens).
/// A document left with no chunks is recorded as skipped.
fn drop_unembeddable(
    chunks: Vec<Chunk>,
    embeddings: Vec<Vec<f32>>,
    skipped: &mut Vec<SkippedDocument>,
) -> (Vec<Chunk>, Vec<Vec<f32>>) {
    let mut kept_chunks = Vec::with_capacity(chunks.len());
    let mut kept_vectors = Vec::with_capacity(embeddings.len());
    let mut dropped: Vec<String> = Vec::new();
    for (chunk, vector) in chunks.into_iter().zip(embeddings) {
        if is_unit(&vector) {
            kept_chunks.push(chunk);
            kept_vectors.push(vector);
        } else {
            tracing::debug!(
                owner = %chunk.owner,
                sequence_index = chunk.sequence_index,
                "Dropping chunk without embeddable text"
            );
            dropped.push(chunk.owner);
        }
    }
    dropped.dedup();
    for owner in dropped {
        if !kept_chunks.iter().any(|c| c.owner == owner) {
            tracing::warn!(owner = %owner, "Skipping document");
            skipped.push(SkippedDocument {
                owner,
                reason: "no embeddable text".into(),
            });
        }
    }
    (kept_chunks, kept_vectors)
}

/// Append `SKIP <owner>: <reason>` lines for this run.
fn write_skip_log(path: &Path, skipped: &[SkippedDocument]) -> std::io::Result<()> {
    if skipped.is_empty() {
        return Ok(());
    }
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    for doc in skipped {
        writeln!(file, "SKIP {}: {}", doc.owner, doc.reason)?;
    }
    Ok(())
}

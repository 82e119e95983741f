//! # clauseseek core
//!
//! Retrieval pipeline for contract and insurance-policy documents: chunking,
//! an exact inner-product vector index with its metadata store, two-stage
//! ranking, extractive answer composition and lexical risk tagging. Ingestion,
//! evaluation, the optional generative answer and the HTTP surface sit on top.

pub mod answer;
pub mod chunker;
pub mod clauses;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod eval;
pub mod extract;
pub mod generator;
pub mod index;
pub mod ingest;
pub mod persistence;
pub mod ranker;
pub mod risk;
pub mod server;
pub mod service;
pub mod types;

// Re-export commonly used types at the crate root.
pub use answer::compose_extractive_answer;
pub use chunker::{Chunker, ChunkingConfig};
pub use clauses::{ClauseOntology, ClauseType};
pub use config::{ClauseseekConfig, load_config};
pub use embeddings::{Embedder, EmbeddingConfig, LocalEmbedder, create_embedder};
pub use error::{ClauseseekError, Result, RetrievalError};
pub use eval::{EvalReport, evaluate};
pub use extract::{ExtractionChain, TextExtractor};
pub use generator::{Generator, GeneratorConfig, MockGenerator, create_generator};
pub use index::{CorpusIndex, MetadataStore, VectorIndex};
pub use ingest::{IngestReport, Ingestor, SkippedDocument};
pub use ranker::Retriever;
pub use risk::classify_risk;
pub use service::{Health, RetrievalService};
pub use types::{AskResponse, Chunk, Citation, QueryResult, RiskLevel};

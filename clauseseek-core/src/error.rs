//! Error types for the clauseseek core library.
//!
//! Uses `thiserror` for public API error types with structured error variants
//! covering the index, startup consistency, embedding, generation, retrieval,
//! extraction, ingestion and configuration domains.

use std::path::PathBuf;

/// Top-level error type for the clauseseek core library.
#[derive(Debug, thiserror::Error)]
pub enum ClauseseekError {
    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("Startup error: {0}")]
    Startup(#[from] StartupError),

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Generator error: {0}")]
    Generator(#[from] GeneratorError),

    #[error("Retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("Extraction error: {0}")]
    Extract(#[from] ExtractError),

    #[error("Ingestion error: {0}")]
    Ingest(#[from] IngestError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Evaluation error: {0}")]
    Eval(#[from] EvalError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from the vector index and metadata store.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IndexError {
    #[error("Dimension mismatch: index expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Index contains no vectors")]
    EmptyIndex,

    #[error("Position {position} out of range (store holds {len} rows)")]
    OutOfRange { position: usize, len: usize },

    #[error("Vector {index} of the batch is not unit-length (norm {norm})")]
    NotNormalized { index: usize, norm: f32 },

    #[error("{field} {value} does not fit the index file header")]
    HeaderOverflow { field: &'static str, value: usize },

    #[error("Corrupt index data: {message}")]
    Corrupt { message: String },
}

/// Errors detected while loading persisted index files at startup.
///
/// Any of these prevents the service from serving traffic.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Persisted index file missing: {path}")]
    MissingFile { path: PathBuf },

    #[error("Index/metadata mismatch: {vectors} vectors but {rows} metadata rows")]
    RowCountMismatch { vectors: usize, rows: usize },

    #[error("Failed to load {path}: {message}")]
    Load { path: PathBuf, message: String },

    #[error("Embedder produces {embedder}-dimensional vectors but the index holds {index}")]
    DimensionMismatch { index: usize, embedder: usize },
}

/// Errors from the embedding provider capability.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EmbeddingError {
    #[error("Embedding request failed: {message}")]
    Request { message: String },

    #[error("Embedding request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Embedding response parse error: {message}")]
    ResponseParse { message: String },

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Errors from the generative answer capability.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeneratorError {
    #[error("Generator request failed: {message}")]
    Request { message: String },

    #[error("Generator request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Generator response parse error: {message}")]
    ResponseParse { message: String },
}

/// Per-query retrieval errors, surfaced to the caller.
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("Question is empty")]
    MissingQuestion,

    #[error("Index contains no chunks")]
    EmptyIndex,

    #[error("Index and metadata were never loaded")]
    NotLoaded,

    #[error("Generative answers are disabled")]
    GeneratorDisabled,

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Generator(#[from] GeneratorError),
}

impl RetrievalError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }
}

/// Errors from document text extraction.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExtractError {
    #[error("{strategy}: unsupported document {path}")]
    Unsupported { strategy: String, path: PathBuf },

    #[error("{strategy}: {message}")]
    Failed { strategy: String, message: String },

    #[error("No extraction strategy succeeded for {path}: {}", attempts.join(" // "))]
    AllStrategiesFailed { path: PathBuf, attempts: Vec<String> },
}

/// Errors that abort an ingestion run as a whole.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Source directory not found: {path}")]
    SourceMissing { path: PathBuf },

    #[error("No chunks generated from {documents} documents ({skipped} skipped)")]
    NoChunks { documents: usize, skipped: usize },

    #[error("Embedding {count} chunks failed: {source}")]
    Embedding {
        count: usize,
        #[source]
        source: EmbeddingError,
    },

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Consistency(#[from] StartupError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Configuration parse error: {message}")]
    ParseError { message: String },
}

/// Errors from the offline evaluation job.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("Evaluation file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Invalid JSON on line {line} of {path}: {message}")]
    InvalidLine {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for results using `ClauseseekError`.
pub type Result<T> = std::result::Result<T, ClauseseekError>;

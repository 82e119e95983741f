//! Core data types shared across the retrieval pipeline.

use serde::{Deserialize, Serialize};

/// A bounded substring of a source document; the unit of indexing and retrieval.
///
/// Chunks are created during ingestion and never mutated afterwards. Their
/// ordinal position in the metadata store matches the position of their
/// embedding in the vector index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Source document identifier: its path relative to the ingestion root.
    pub owner: String,
    pub text: String,
    /// Ordinal of this chunk within its owning document.
    pub sequence_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clause_tag: Option<String>,
}

impl Chunk {
    pub fn new(owner: impl Into<String>, text: impl Into<String>, sequence_index: usize) -> Self {
        Self {
            owner: owner.into(),
            text: text.into(),
            sequence_index,
            clause_tag: None,
        }
    }

    pub fn with_clause_tag(mut self, tag: Option<String>) -> Self {
        self.clause_tag = tag;
        self
    }
}

/// A chunk returned by a search, paired with its raw inner-product score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub chunk: Chunk,
    pub score: f32,
}

/// Caller-facing view of a retrieved chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub owner: String,
    pub text: String,
    pub score: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clause_tag: Option<String>,
}

impl From<&QueryResult> for Citation {
    fn from(result: &QueryResult) -> Self {
        Self {
            owner: result.chunk.owner.clone(),
            text: result.chunk.text.clone(),
            score: result.score,
            clause_tag: result.chunk.clause_tag.clone(),
        }
    }
}

/// Coarse lexical risk salience of a composed answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "low"),
            RiskLevel::Medium => write!(f, "medium"),
            RiskLevel::High => write!(f, "high"),
        }
    }
}

/// Full result of an `ask` query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AskResponse {
    pub answer: String,
    pub risk: RiskLevel,
    pub citations: Vec<Citation>,
    /// Answer produced by the generative capability, when requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated: Option<String>,
}

//! Heuristic clause tagging.
//!
//! Each chunk is matched against an ordered ontology of clause types. The
//! first type with any signal occurring in the lowercased chunk text wins.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;

/// One clause category and the lexical signals that identify it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClauseType {
    pub id: String,
    pub signals: Vec<String>,
}

impl ClauseType {
    pub fn new(id: &str, signals: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            signals: signals.iter().map(|s| s.to_lowercase()).collect(),
        }
    }

    fn matches(&self, lowered: &str) -> bool {
        self.signals
            .iter()
            .filter(|s| !s.is_empty())
            .any(|s| lowered.contains(s.to_lowercase().as_str()))
    }
}

/// Ordered set of clause types. Evaluation order is list order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClauseOntology {
    pub clause_types: Vec<ClauseType>,
}

impl Default for ClauseOntology {
    fn default() -> Self {
        Self {
            clause_types: vec![
                ClauseType::new("termination", &["terminat", "cancel", "expiration of"]),
                ClauseType::new("renewal", &["renew", "extension of the term"]),
                ClauseType::new(
                    "payment",
                    &["payment", "late fee", "premium", "invoice", "pay rent"],
                ),
                ClauseType::new("indemnification", &["indemnif", "hold harmless"]),
                ClauseType::new("liability", &["liabilit", "liable", "damages"]),
                ClauseType::new("confidentiality", &["confidential", "non-disclosure"]),
                ClauseType::new("exclusions", &["exclusion", "excluded", "not cover"]),
                ClauseType::new(
                    "insurance_coverage",
                    &["coverage", "covered", "insured", "deductible"],
                ),
                ClauseType::new(
                    "governing_law",
                    &["governing law", "governed by", "jurisdiction"],
                ),
                ClauseType::new("dispute_resolution", &["arbitration", "dispute", "mediation"]),
            ],
        }
    }
}

impl ClauseOntology {
    /// Load an ontology from a JSON file shaped `{"clause_types": [{"id", "signals"}]}`.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path).map_err(|e| ConfigError::ParseError {
            message: format!("failed to read ontology {}: {}", path.display(), e),
        })?;
        serde_json::from_str(&data).map_err(|e| ConfigError::ParseError {
            message: format!("invalid ontology {}: {}", path.display(), e),
        })
    }

    /// Return the id of the first clause type whose signals appear in `text`.
    pub fn tag(&self, text: &str) -> Option<&str> {
        let lowered = text.to_lowercase();
        self.clause_types
            .iter()
            .find(|ct| ct.matches(&lowered))
            .map(|ct| ct.id.as_str())
    }
}

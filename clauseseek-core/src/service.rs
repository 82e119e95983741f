//! Process-wide retrieval service.
//!
//! Constructed once at startup and shared behind an `Arc`. The loaded index is
//! never mutated afterwards, so concurrent queries need no locking. Loading
//! happens before any request is accepted; a load failure stops startup.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use crate::answer::compose_extractive_answer;
use crate::config::RetrievalConfig;
use crate::embeddings::Embedder;
use crate::error::{RetrievalError, StartupError};
use crate::generator::{Generator, build_prompt};
use crate::index::CorpusIndex;
use crate::ranker::Retriever;
use crate::risk::classify_risk;
use crate::types::{AskResponse, Citation, QueryResult};

/// Liveness summary of the loaded corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    pub ok: bool,
    pub chunks: usize,
    pub owners: usize,
    pub dimensions: usize,
    pub generator: bool,
}

pub struct RetrievalService {
    index: Option<CorpusIndex>,
    embedder: Arc<dyn Embedder>,
    generator: Option<Arc<dyn Generator>>,
    defaults: RetrievalConfig,
    max_context_chars: usize,
}

impl RetrievalService {
    /// Wrap an already loaded index.
    pub fn new(
        index: CorpusIndex,
        embedder: Arc<dyn Embedder>,
        defaults: RetrievalConfig,
    ) -> Result<Self, StartupError> {
        let embedder_dims = embedder.dimensions();
        let index_dims = index.vectors().dimension();
        if embedder_dims > 0 && embedder_dims != index_dims {
            return Err(StartupError::DimensionMismatch {
                index: index_dims,
                embedder: embedder_dims,
            });
        }
        Ok(Self {
            index: Some(index),
            embedder,
            generator: None,
            defaults,
            max_context_chars: 16_000,
        })
    }

    /// Load the index directory and build the service. Fails fast on missing
    /// or inconsistent files.
    pub fn open(
        index_dir: &Path,
        embedder: Arc<dyn Embedder>,
        defaults: RetrievalConfig,
    ) -> Result<Self, StartupError> {
        let index = CorpusIndex::load(index_dir)?;
        Self::new(index, embedder, defaults)
    }

    /// A service without an index. Every query fails with `NotLoaded`.
    pub fn unloaded(embedder: Arc<dyn Embedder>, defaults: RetrievalConfig) -> Self {
        Self {
            index: None,
            embedder,
            generator: None,
            defaults,
            max_context_chars: 16_000,
        }
    }

    pub fn with_generator(
        mut self,
        generator: Option<Arc<dyn Generator>>,
        max_context_chars: usize,
    ) -> Self {
        self.generator = generator;
        self.max_context_chars = max_context_chars;
        self
    }

    pub fn defaults(&self) -> &RetrievalConfig {
        &self.defaults
    }

    pub fn is_loaded(&self) -> bool {
        self.index.is_some()
    }

    /// Top `k` chunks for `question`.
    pub async fn search(&self, question: &str, k: usize) -> Result<Vec<Citation>, RetrievalError> {
        let results = self.retrieve(question, k, k).await?;
        Ok(results.iter().map(Citation::from).collect())
    }

    /// Extractive answer, risk tag and citations for `question`.
    pub async fn ask(
        &self,
        question: &str,
        top_k: usize,
        return_k: usize,
    ) -> Result<AskResponse, RetrievalError> {
        let results = self.retrieve(question, top_k, return_k).await?;
        Ok(compose(question, &results))
    }

    /// `ask`, plus a generative answer grounded in the retrieved chunks.
    pub async fn ask_generative(
        &self,
        question: &str,
        top_k: usize,
        return_k: usize,
    ) -> Result<AskResponse, RetrievalError> {
        let generator = self
            .generator
            .as_ref()
            .ok_or(RetrievalError::GeneratorDisabled)?;
        let results = self.retrieve(question, top_k, return_k).await?;
        let mut response = compose(question, &results);

        let context = results
            .iter()
            .map(|r| format!("[{}] {}", r.chunk.owner, r.chunk.text))
            .collect::<Vec<_>>()
            .join("\n\n");
        let mut owners: Vec<&str> = Vec::new();
        for result in &results {
            if !owners.contains(&result.chunk.owner.as_str()) {
                owners.push(&result.chunk.owner);
            }
        }
        let extra = format!("Sources: {}", owners.join(", "));

        let prompt = build_prompt(question, &context, &extra, self.max_context_chars);
        let generated = generator.complete(&prompt).await?;
        tracing::info!(
            model = generator.model_name(),
            chars = generated.len(),
            "Generated answer"
        );
        response.generated = Some(generated);
        Ok(response)
    }

    /// Generative answer over caller-supplied contract text. No retrieval is
    /// performed, so this works without a loaded index.
    pub async fn ask_basic(
        &self,
        question: &str,
        contract_text: &str,
        extra: &str,
    ) -> Result<String, RetrievalError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(RetrievalError::MissingQuestion);
        }
        let generator = self
            .generator
            .as_ref()
            .ok_or(RetrievalError::GeneratorDisabled)?;
        let prompt = build_prompt(question, contract_text, extra, self.max_context_chars);
        let answer = generator.complete(&prompt).await?;
        tracing::info!(
            model = generator.model_name(),
            contract_chars = contract_text.len(),
            chars = answer.len(),
            "Generated basic answer"
        );
        Ok(answer)
    }

    pub fn health(&self) -> Health {
        match &self.index {
            Some(index) => Health {
                ok: true,
                chunks: index.len(),
                owners: index.metadata().owner_count(),
                dimensions: index.vectors().dimension(),
                generator: self.generator.is_some(),
            },
            None => Health {
                ok: false,
                chunks: 0,
                owners: 0,
                dimensions: 0,
                generator: self.generator.is_some(),
            },
        }
    }

    async fn retrieve(
        &self,
        question: &str,
        top_k: usize,
        return_k: usize,
    ) -> Result<Vec<QueryResult>, RetrievalError> {
        let question = question.trim();
        if question.chars().count() < self.defaults.min_question_chars {
            return Err(RetrievalError::invalid_argument(format!(
                "question must be at least {} characters",
                self.defaults.min_question_chars
            )));
        }
        if top_k == 0 || return_k == 0 {
            return Err(RetrievalError::invalid_argument(
                "result counts must be positive",
            ));
        }
        let index = self.index.as_ref().ok_or(RetrievalError::NotLoaded)?;
        Retriever::new(index, self.embedder.as_ref())
            .retrieve(question, top_k, return_k)
            .await
    }
}

fn compose(question: &str, results: &[QueryResult]) -> AskResponse {
    let answer = compose_extractive_answer(question, results);
    let risk = classify_risk(&answer);
    AskResponse {
        answer,
        risk,
        citations: results.iter().map(Citation::from).collect(),
        generated: None,
    }
}

//! Two-stage retrieval: gather `top_k` candidates, return the best `return_k`.

use crate::embeddings::Embedder;
use crate::error::RetrievalError;
use crate::index::CorpusIndex;
use crate::types::QueryResult;

/// Ranks chunks of a loaded corpus against a free-text query.
pub struct Retriever<'a> {
    index: &'a CorpusIndex,
    embedder: &'a dyn Embedder,
}

impl<'a> Retriever<'a> {
    pub fn new(index: &'a CorpusIndex, embedder: &'a dyn Embedder) -> Self {
        Self { index, embedder }
    }

    /// Embed `query`, search `top_k` candidates and keep the best `return_k`.
    ///
    /// `top_k` is raised to `return_k` when smaller. Zero for either count is
    /// rejected before the index is touched.
    pub async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        return_k: usize,
    ) -> Result<Vec<QueryResult>, RetrievalError> {
        if top_k == 0 {
            return Err(RetrievalError::invalid_argument("top_k must be positive"));
        }
        if return_k == 0 {
            return Err(RetrievalError::invalid_argument("return_k must be positive"));
        }
        if self.index.is_empty() {
            return Err(RetrievalError::EmptyIndex);
        }
        let top_k = top_k.max(return_k);

        let query_vector = self.embedder.encode_one(query).await?;
        let hits = self.index.vectors().search(&query_vector, top_k)?;

        let mut results = hits
            .into_iter()
            .map(|hit| {
                let chunk = self.index.metadata().get(hit.position)?.clone();
                Ok(QueryResult {
                    chunk,
                    score: hit.score,
                })
            })
            .collect::<Result<Vec<_>, RetrievalError>>()?;

        // Stable: equal scores keep index order.
        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results.truncate(return_k);

        tracing::debug!(
            candidates = top_k,
            returned = results.len(),
            top_score = results.first().map(|r| r.score),
            "Retrieved chunks"
        );
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::LocalEmbedder;
    use crate::index::{MetadataStore, VectorIndex};
    use crate::types::Chunk;

    const DIMS: usize = 256;

    async fn corpus(texts: &[(&str, &str)]) -> (CorpusIndex, LocalEmbedder) {
        let embedder = LocalEmbedder::new(DIMS);
        let mut vectors = VectorIndex::build(DIMS).unwrap();
        let rows: Vec<Chunk> = texts
            .iter()
            .enumerate()
            .map(|(i, (owner, text))| Chunk::new(*owner, *text, i))
            .collect();
        let embedded: Vec<Vec<f32>> = rows.iter().map(|c| embedder.embed_text(&c.text)).collect();
        vectors.add(&embedded).unwrap();
        let index = CorpusIndex::new(vectors, MetadataStore::from_rows(rows)).unwrap();
        (index, embedder)
    }

    #[tokio::test]
    async fn test_rejects_zero_counts() {
        let (index, embedder) = corpus(&[("a", "rent is due")]).await;
        let retriever = Retriever::new(&index, &embedder);
        assert!(matches!(
            retriever.retrieve("rent", 0, 5).await,
            Err(RetrievalError::InvalidArgument { .. })
        ));
        assert!(matches!(
            retriever.retrieve("rent", 5, 0).await,
            Err(RetrievalError::InvalidArgument { .. })
        ));
    }

    #[tokio::test]
    async fn test_zero_top_k_rejected_even_when_empty() {
        let (index, embedder) = corpus(&[]).await;
        let retriever = Retriever::new(&index, &embedder);
        assert!(matches!(
            retriever.retrieve("rent", 0, 1).await,
            Err(RetrievalError::InvalidArgument { .. })
        ));
    }

    #[tokio::test]
    async fn test_empty_index() {
        let (index, embedder) = corpus(&[]).await;
        let retriever = Retriever::new(&index, &embedder);
        assert!(matches!(
            retriever.retrieve("rent", 5, 5).await,
            Err(RetrievalError::EmptyIndex)
        ));
    }

    #[tokio::test]
    async fn test_top_k_clamped_to_return_k() {
        let (index, embedder) = corpus(&[
            ("a", "rent is due monthly"),
            ("b", "rent increases yearly"),
            ("c", "parking is free"),
        ])
        .await;
        let retriever = Retriever::new(&index, &embedder);
        let results = retriever.retrieve("rent", 1, 3).await.unwrap();
        assert_eq!(results.len(), 3);
    }

    #[tokio::test]
    async fn test_results_sorted_and_bounded() {
        let texts: Vec<(String, String)> = (0..20)
            .map(|i| (format!("doc{i}"), format!("clause {i} about rent and deposit {}", i % 3)))
            .collect();
        let refs: Vec<(&str, &str)> = texts.iter().map(|(o, t)| (o.as_str(), t.as_str())).collect();
        let (index, embedder) = corpus(&refs).await;
        let retriever = Retriever::new(&index, &embedder);

        let results = retriever.retrieve("rent deposit", 12, 5).await.unwrap();
        assert_eq!(results.len(), 5);
        assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[tokio::test]
    async fn test_query_dimension_mismatch_surfaces() {
        let (index, _) = corpus(&[("a", "rent is due")]).await;
        let wrong = LocalEmbedder::new(DIMS / 2);
        let retriever = Retriever::new(&index, &wrong);
        assert!(matches!(
            retriever.retrieve("rent", 5, 5).await,
            Err(RetrievalError::Index(_))
        ));
    }
}

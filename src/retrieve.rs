//! Over-fetching candidate retrieval against the vector store capability.

use std::sync::Arc;

use tracing::{debug, info};

use crate::candidate::Candidate;
use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::vectorstore::{FilterPredicate, VectorStore};

/// Requests an over-fetched candidate set from the vector store.
///
/// The default path fetches `n * overfetch_factor` candidates, passing any
/// derived [`FilterPredicate`] verbatim as a store-side filter. When the
/// caller supplied explicit drug/section filters, retrieval instead fetches
/// a wider unfiltered window, since those filters require content inspection
/// that store-side predicates cannot express, and all narrowing is deferred
/// to the post-filter stage.
///
/// Uses the embedding capability when one is configured; otherwise falls
/// back to the store's text-query path. That fallback is a degradation, not
/// an error. A store failure surfaces as a retrieval error, never as a
/// partial result.
pub struct CandidateRetriever {
    store: Arc<dyn VectorStore>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    overfetch_factor: usize,
}

impl CandidateRetriever {
    /// Create a retriever over the given store and optional embedder.
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Option<Arc<dyn EmbeddingProvider>>,
        overfetch_factor: usize,
    ) -> Self {
        Self { store, embedder, overfetch_factor }
    }

    /// Whether the embedding-vector query path is in use.
    pub fn using_embeddings(&self) -> bool {
        self.embedder.is_some()
    }

    /// Fetch candidates for an expanded query.
    ///
    /// `n` is the final requested result count; the actual fetch size is
    /// `n * overfetch_factor`, or `min(n * 2, corpus)` unfiltered when
    /// `explicit_filters` is set.
    ///
    /// # Errors
    ///
    /// Returns a retrieval error if the store fails, or an embedding error
    /// if a configured embedder fails to encode the query.
    pub async fn retrieve(
        &self,
        expanded_query: &str,
        filter: Option<&FilterPredicate>,
        n: usize,
        explicit_filters: bool,
    ) -> Result<Vec<Candidate>> {
        let (top_k, filter) = if explicit_filters {
            let corpus_size = self.store.count().await?;
            (n.saturating_mul(2).min(corpus_size), None)
        } else {
            (n.saturating_mul(self.overfetch_factor), filter)
        };

        debug!(top_k, explicit_filters, filtered = filter.is_some(), "fetching candidates");

        let candidates = match &self.embedder {
            Some(embedder) => {
                let embedding = embedder.encode(expanded_query).await?;
                self.store.query_embedding(&embedding, top_k, filter).await?
            }
            None => self.store.query_text(expanded_query, top_k, filter).await?,
        };

        info!(
            fetched = candidates.len(),
            top_k,
            using_embeddings = self.embedder.is_some(),
            "candidate retrieval complete"
        );

        Ok(candidates)
    }
}

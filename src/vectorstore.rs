//! Vector store capability trait and the store-side filter predicate.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::candidate::Candidate;
use crate::error::Result;

/// A single top-level filter over exactly one metadata field.
///
/// The external store supports only one predicate per query, never a
/// conjunction across fields, so the pipeline derives at most one and
/// defers everything else to post-retrieval filtering.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum FilterPredicate {
    /// Field equals a single value.
    Eq {
        /// Metadata field name.
        field: String,
        /// Required value.
        value: String,
    },
    /// Field value is a member of a set.
    In {
        /// Metadata field name.
        field: String,
        /// Accepted values.
        values: Vec<String>,
    },
}

impl FilterPredicate {
    /// The single metadata field this predicate constrains.
    pub fn field(&self) -> &str {
        match self {
            Self::Eq { field, .. } | Self::In { field, .. } => field,
        }
    }

    /// Evaluate the predicate against a chunk's metadata.
    pub fn matches(&self, metadata: &HashMap<String, String>) -> bool {
        match self {
            Self::Eq { field, value } => metadata.get(field).is_some_and(|v| v == value),
            Self::In { field, values } => {
                metadata.get(field).is_some_and(|v| values.iter().any(|candidate| candidate == v))
            }
        }
    }
}

/// The external vector store consumed by the pipeline.
///
/// Implementations return candidates ordered by ascending distance and must
/// honor a single top-level [`FilterPredicate`] when one is supplied. The
/// pipeline holds a store behind `Arc<dyn VectorStore>`, so independent
/// queries can run concurrently against a shared read-only handle.
///
/// # Example
///
/// ```rust,ignore
/// use gbm_rag::{InMemoryVectorStore, VectorStore};
///
/// let store = InMemoryVectorStore::new();
/// let candidates = store.query_text("temozolomide dosing", 15, None).await?;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Nearest-neighbor search by query embedding.
    async fn query_embedding(
        &self,
        embedding: &[f32],
        top_k: usize,
        filter: Option<&FilterPredicate>,
    ) -> Result<Vec<Candidate>>;

    /// Text-query fallback through the same store interface, used when no
    /// embedding capability is configured.
    async fn query_text(
        &self,
        text: &str,
        top_k: usize,
        filter: Option<&FilterPredicate>,
    ) -> Result<Vec<Candidate>>;

    /// Total number of chunks in the store.
    async fn count(&self) -> Result<usize>;

    /// Sample up to `limit` metadata records, for statistics and filter
    /// discovery. Not part of the core query path.
    async fn get_metadata(&self, limit: usize) -> Result<Vec<HashMap<String, String>>>;
}

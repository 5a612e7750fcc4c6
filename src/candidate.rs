//! Data types for retrieved candidates, scored results, and query responses.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::vectorstore::FilterPredicate;

/// A document chunk retrieved from the vector store, prior to re-ranking.
///
/// Candidates are immutable once fetched; every later stage produces a new
/// derived record rather than mutating in place, so results remain traceable
/// back to the original chunk ID.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candidate {
    /// Unique identifier of the chunk in the store.
    pub id: String,
    /// The text content of the chunk.
    pub content: String,
    /// Named string attributes: `clinical_topic`, `drugs`, `evidence_level`,
    /// `doc_type`, `toxicity_grades`, `laboratory_values`, `source`, and so on.
    pub metadata: HashMap<String, String>,
    /// Store-reported distance to the query (lower is closer).
    pub distance: f32,
}

impl Candidate {
    /// Similarity derived from the store's distance semantics (`1 - distance`).
    pub fn similarity(&self) -> f32 {
        1.0 - self.distance
    }

    /// Metadata field lookup, defaulting to the empty string.
    pub fn meta(&self, field: &str) -> &str {
        self.metadata.get(field).map_or("", String::as_str)
    }
}

/// A [`Candidate`] carrying the scores accumulated through reranking.
///
/// Prior to the cross-encoder stage, `final_score = base_score +
/// metadata_boost`. After cross-encoder refinement the ordering key is
/// `cross_encoder_score` exclusively; the metadata-derived scores are
/// retained for display, never re-mixed in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredCandidate {
    /// The underlying retrieved chunk.
    pub candidate: Candidate,
    /// Semantic similarity (`1 - distance`).
    pub base_score: f32,
    /// Additive boost accumulated from metadata rules.
    pub metadata_boost: f32,
    /// `base_score + metadata_boost`.
    pub final_score: f32,
    /// Fine-grained pairwise relevance, when the cross-encoder stage ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cross_encoder_score: Option<f32>,
}

/// Explicit retrieval filters supplied by the clinician.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExplicitFilters {
    /// Restrict results to documents mentioning this drug (any surface form).
    pub drug: Option<String>,
    /// Restrict results to content matching this document section.
    pub section: Option<String>,
}

impl ExplicitFilters {
    /// Whether either filter is set.
    pub fn is_active(&self) -> bool {
        self.drug.is_some() || self.section.is_some()
    }
}

/// The structured response from a pipeline query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    /// The raw clinician query.
    pub query: String,
    /// The synonym-expanded query actually sent to the store.
    pub expanded_query: String,
    /// The store-side predicate derived from the query, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_used: Option<FilterPredicate>,
    /// The drug filter in effect (explicit or none).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drug_filter: Option<String>,
    /// The section filter in effect (explicit or none).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_filter: Option<String>,
    /// Final ordered results, truncated to the requested count. May be
    /// empty: zero surviving candidates is a valid state, not an error.
    pub results: Vec<ScoredCandidate>,
    /// Whether the embedding capability was used for retrieval.
    pub using_embeddings: bool,
    /// Whether cross-encoder scores determined the final ordering (false
    /// when the scorer was absent or failed and truncation was used).
    pub using_cross_encoder: bool,
}

/// Corpus composition statistics sampled from store metadata.
///
/// Uses `BTreeMap` so display order is deterministic.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorpusStats {
    /// Total number of chunks in the store.
    pub total_chunks: usize,
    /// Chunk count per document type (sampled).
    pub doc_types: std::collections::BTreeMap<String, usize>,
    /// Chunk count per source (sampled).
    pub sources: std::collections::BTreeMap<String, usize>,
    /// Chunk count per drug mentioned in metadata (sampled).
    pub drugs: std::collections::BTreeMap<String, usize>,
}

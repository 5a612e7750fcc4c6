//! Error types for the `gbm-rag` crate.

use thiserror::Error;

/// Errors that can occur in the clinical retrieval pipeline.
///
/// Missing optional capabilities are deliberately *not* errors: an absent
/// embedding provider degrades retrieval to the text-query path, and an
/// absent (or failed) cross-encoder degrades reranking to plain truncation.
/// An empty result set is a valid response, not an error.
#[derive(Debug, Error)]
pub enum RagError {
    /// The vector store was unavailable or rejected the query/filter.
    #[error("Retrieval error ({backend}): {message}")]
    Retrieval {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// A configured embedding provider failed to encode a query.
    #[error("Embedding error ({provider}): {message}")]
    Embedding {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// A configured cross-encoder failed to score query/passage pairs.
    ///
    /// The pipeline never propagates this across its boundary; the
    /// cross-encoder stage catches it and falls back to truncation.
    #[error("Scoring error ({scorer}): {message}")]
    Scoring {
        /// The cross-encoder that produced the error.
        scorer: String,
        /// A description of the failure.
        message: String,
    },

    /// A configuration or lexicon validation error.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// A convenience result type for pipeline operations.
pub type Result<T> = std::result::Result<T, RagError>;

//! Configuration for the clinical retrieval pipeline.

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Tunable parameters for the retrieval re-ranking pipeline.
///
/// The pipeline fetches generously and then filters and reranks down. The
/// factors below control that buffer explicitly: if `overfetch_factor` is too
/// small relative to how aggressively post-filtering narrows results, relevant
/// documents can be silently excluded; too large and every stage pays for
/// candidates that are discarded anyway. The defaults match the behavior the
/// corpus was tuned against.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineConfig {
    /// Multiplier applied to the requested result count when querying the
    /// vector store, leaving a buffer for later filtering and reranking.
    pub overfetch_factor: usize,
    /// Multiplier applied to the requested count for the intermediate window
    /// kept after metadata reranking, before cross-encoder refinement.
    pub rerank_window_factor: usize,
    /// Maximum number of characters of candidate content paired with the
    /// query for cross-encoder scoring. Bounds per-pair payload size and
    /// respects the scorer's practical input-length limits.
    pub cross_encoder_max_chars: usize,
    /// Default maximum snippet length for highlighting, in bytes.
    pub snippet_max_length: usize,
    /// Number of metadata records sampled when computing corpus statistics.
    pub metadata_sample_limit: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            overfetch_factor: 3,
            rerank_window_factor: 2,
            cross_encoder_max_chars: 2000,
            snippet_max_length: 500,
            metadata_sample_limit: 1000,
        }
    }
}

impl PipelineConfig {
    /// Create a new builder for constructing a [`PipelineConfig`].
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }
}

/// Builder for constructing a validated [`PipelineConfig`].
#[derive(Debug, Clone, Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    /// Set the candidate over-fetch multiplier.
    pub fn overfetch_factor(mut self, factor: usize) -> Self {
        self.config.overfetch_factor = factor;
        self
    }

    /// Set the intermediate rerank window multiplier.
    pub fn rerank_window_factor(mut self, factor: usize) -> Self {
        self.config.rerank_window_factor = factor;
        self
    }

    /// Set the content prefix length for cross-encoder pairs.
    pub fn cross_encoder_max_chars(mut self, chars: usize) -> Self {
        self.config.cross_encoder_max_chars = chars;
        self
    }

    /// Set the default maximum snippet length for highlighting.
    pub fn snippet_max_length(mut self, length: usize) -> Self {
        self.config.snippet_max_length = length;
        self
    }

    /// Set the metadata sample size for corpus statistics.
    pub fn metadata_sample_limit(mut self, limit: usize) -> Self {
        self.config.metadata_sample_limit = limit;
        self
    }

    /// Build the [`PipelineConfig`], validating that parameters are usable.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if:
    /// - `overfetch_factor == 0` or `rerank_window_factor == 0`
    /// - `cross_encoder_max_chars == 0`
    /// - `snippet_max_length == 0`
    pub fn build(self) -> Result<PipelineConfig> {
        if self.config.overfetch_factor == 0 {
            return Err(RagError::Config("overfetch_factor must be greater than zero".to_string()));
        }
        if self.config.rerank_window_factor == 0 {
            return Err(RagError::Config(
                "rerank_window_factor must be greater than zero".to_string(),
            ));
        }
        if self.config.cross_encoder_max_chars == 0 {
            return Err(RagError::Config(
                "cross_encoder_max_chars must be greater than zero".to_string(),
            ));
        }
        if self.config.snippet_max_length == 0 {
            return Err(RagError::Config(
                "snippet_max_length must be greater than zero".to_string(),
            ));
        }
        Ok(self.config)
    }
}

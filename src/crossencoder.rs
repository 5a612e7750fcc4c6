//! Cross-encoder re-ranking with graceful degradation.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::candidate::ScoredCandidate;
use crate::error::Result;

/// Capability trait for joint query/passage relevance scoring.
///
/// Implementations score each `(query, passage)` pair together rather than
/// comparing independent embeddings, trading latency for precision. The
/// returned vector must be the same length as `pairs`, one score per pair,
/// higher meaning more relevant.
#[async_trait]
pub trait CrossEncoder: Send + Sync {
    /// Score each query/passage pair.
    async fn predict(&self, pairs: &[(&str, &str)]) -> Result<Vec<f32>>;
}

/// Final-stage reranker over an optional [`CrossEncoder`].
///
/// Without a scorer, or when the scorer fails, this stage degrades to a
/// plain truncation of the metadata-ranked input. It never returns an error:
/// an unavailable cross-encoder costs precision, not availability.
pub struct CrossEncoderReranker {
    scorer: Option<Arc<dyn CrossEncoder>>,
    max_chars: usize,
}

impl CrossEncoderReranker {
    /// Create a reranker; `max_chars` bounds the passage prefix sent to the
    /// scorer.
    pub fn new(scorer: Option<Arc<dyn CrossEncoder>>, max_chars: usize) -> Self {
        Self { scorer, max_chars }
    }

    /// Re-rank the window down to `n` results.
    ///
    /// Returns the ranked list and whether cross-encoder scores actually
    /// drove the ordering. The flag is `false` on the truncation path, so a
    /// degraded response is distinguishable from a scored one even when a
    /// scorer is configured.
    pub async fn rerank(
        &self,
        mut window: Vec<ScoredCandidate>,
        query: &str,
        n: usize,
    ) -> (Vec<ScoredCandidate>, bool) {
        let Some(scorer) = &self.scorer else {
            window.truncate(n);
            return (window, false);
        };
        if window.is_empty() {
            return (window, false);
        }

        // Long passages are clipped to a prefix; cross-encoder inputs are
        // token-bounded and the head of a chunk carries its topic.
        let prefixes: Vec<String> = window
            .iter()
            .map(|s| s.candidate.content.chars().take(self.max_chars).collect())
            .collect();
        let pairs: Vec<(&str, &str)> =
            prefixes.iter().map(|p| (query, p.as_str())).collect();

        match scorer.predict(&pairs).await {
            Ok(scores) if scores.len() == window.len() => {
                for (scored, score) in window.iter_mut().zip(&scores) {
                    scored.cross_encoder_score = Some(*score);
                }
                window.sort_by(|a, b| {
                    b.cross_encoder_score
                        .partial_cmp(&a.cross_encoder_score)
                        .unwrap_or(std::cmp::Ordering::Equal)
                });
                window.truncate(n);
                debug!(kept = window.len(), "cross-encoder rerank complete");
                (window, true)
            }
            Ok(scores) => {
                warn!(
                    expected = window.len(),
                    got = scores.len(),
                    "cross-encoder returned mismatched score count, keeping metadata order"
                );
                window.truncate(n);
                (window, false)
            }
            Err(error) => {
                warn!(%error, "cross-encoder scoring failed, keeping metadata order");
                window.truncate(n);
                (window, false)
            }
        }
    }
}

//! Metadata-driven re-ranking of retrieved candidates.

use std::sync::Arc;

use tracing::debug;

use crate::candidate::{Candidate, ScoredCandidate};
use crate::lexicon::ClinicalLexicon;

/// Boost when the candidate's topic category has a keyword hit in the query.
const TOPIC_MATCH_BOOST: f32 = 0.15;
/// Boost when the query mentions a drug family matching the candidate's metadata.
const DRUG_MATCH_BOOST: f32 = 0.10;
/// Boost when toxicity-grade metadata is present and the query asks about grading.
const TOXICITY_GRADE_BOOST: f32 = 0.08;
/// Boost when laboratory metadata is present and the query asks about monitoring.
const LAB_VALUES_BOOST: f32 = 0.08;
/// Boost for top-tier FDA-approved evidence.
const FDA_EVIDENCE_BOOST: f32 = 0.12;
/// Boost for clinical-trial evidence (mutually exclusive with the FDA boost).
const TRIAL_EVIDENCE_BOOST: f32 = 0.06;
/// Boost when the document type aligns with the query intent.
const DOC_TYPE_BOOST: f32 = 0.10;

/// Query terms that trigger the toxicity-grade-present boost.
const GRADING_TERMS: &[&str] = &["grade", "toxicity", "adverse"];
/// Query terms that trigger the lab-values-present boost.
const MONITORING_TERMS: &[&str] = &["lab", "cbc", "monitor", "platelets", "neutrophils"];
/// Query terms aligning with prescribing-information documents.
const PRESCRIBING_TERMS: &[&str] = &["dose", "administration", "prescribing"];
/// Query terms aligning with protocol documents.
const PROTOCOL_TERMS: &[&str] = &["protocol", "regimen", "treatment"];

/// Rescales similarity with additive metadata boosts and truncates to an
/// intermediate window.
///
/// `base_score = 1 - distance`; each boost rule fires at most once per
/// candidate and the rules are independent except where noted mutually
/// exclusive. Sorting is stable: candidates with equal final scores keep
/// their retrieval order.
#[derive(Debug, Clone)]
pub struct MetadataReranker {
    lexicon: Arc<ClinicalLexicon>,
}

impl MetadataReranker {
    /// Create a reranker over the given lexicon.
    pub fn new(lexicon: Arc<ClinicalLexicon>) -> Self {
        Self { lexicon }
    }

    /// Score, sort descending by final score, and truncate to `keep`.
    ///
    /// Empty input yields empty output; never errors.
    pub fn rerank(
        &self,
        candidates: Vec<Candidate>,
        query: &str,
        keep: usize,
    ) -> Vec<ScoredCandidate> {
        let query_lower = query.to_lowercase();

        let mut scored: Vec<ScoredCandidate> = candidates
            .into_iter()
            .map(|candidate| {
                let base_score = candidate.similarity();
                let metadata_boost = self.boost(&candidate, &query_lower);
                ScoredCandidate {
                    final_score: base_score + metadata_boost,
                    base_score,
                    metadata_boost,
                    candidate,
                    cross_encoder_score: None,
                }
            })
            .collect();

        // Stable sort: equal-score pairs retain retrieval order.
        scored.sort_by(|a, b| {
            b.final_score.partial_cmp(&a.final_score).unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(keep);

        debug!(kept = scored.len(), "metadata rerank complete");
        scored
    }

    /// Accumulate the additive boost for one candidate.
    fn boost(&self, candidate: &Candidate, query_lower: &str) -> f32 {
        let mut boost = 0.0;

        // Topic-match boost: candidate's topic category has at least one of
        // its boost keywords present in the query.
        let topic = candidate.meta("clinical_topic");
        if let Some(keywords) = self.lexicon.topic_boost_keywords(topic) {
            if keywords.iter().any(|k| query_lower.contains(k.as_str())) {
                boost += TOPIC_MATCH_BOOST;
            }
        }

        // Drug-match boost: first family mentioned in both the candidate's
        // drug metadata and the query.
        let drugs_meta = candidate.meta("drugs").to_lowercase();
        for family in &self.lexicon.drug_families {
            if family.mentioned_in(&drugs_meta) && family.mentioned_in(query_lower) {
                boost += DRUG_MATCH_BOOST;
                break;
            }
        }

        if !candidate.meta("toxicity_grades").is_empty()
            && GRADING_TERMS.iter().any(|t| query_lower.contains(t))
        {
            boost += TOXICITY_GRADE_BOOST;
        }

        if !candidate.meta("laboratory_values").is_empty()
            && MONITORING_TERMS.iter().any(|t| query_lower.contains(t))
        {
            boost += LAB_VALUES_BOOST;
        }

        // Evidence-level boost: top tier wins, first match only.
        let evidence = candidate.meta("evidence_level").to_lowercase();
        if evidence.contains("fda approved") {
            boost += FDA_EVIDENCE_BOOST;
        } else if evidence.contains("clinical trial") {
            boost += TRIAL_EVIDENCE_BOOST;
        }

        // Document-type boost, mutually exclusive branches.
        let doc_type = candidate.meta("doc_type").to_lowercase();
        if doc_type.contains("prescribing information")
            && PRESCRIBING_TERMS.iter().any(|t| query_lower.contains(t))
        {
            boost += DOC_TYPE_BOOST;
        } else if doc_type.contains("clinical protocol")
            && PROTOCOL_TERMS.iter().any(|t| query_lower.contains(t))
        {
            boost += DOC_TYPE_BOOST;
        }

        boost
    }
}

//! Post-retrieval filtering by drug mention and document section.

use std::sync::Arc;

use tracing::debug;

use crate::candidate::Candidate;
use crate::lexicon::ClinicalLexicon;

/// Discards candidates failing drug or section constraints that store-side
/// predicates cannot express.
///
/// A no-op when both filters are absent or the candidate list is empty.
/// Surviving candidates keep their retrieval order: this is a stable filter,
/// never a resort, and the output is always a subsequence of the input.
/// Never raises; empty input yields empty output.
#[derive(Debug, Clone)]
pub struct PostFilter {
    lexicon: Arc<ClinicalLexicon>,
}

impl PostFilter {
    /// Create a post-filter over the given lexicon.
    pub fn new(lexicon: Arc<ClinicalLexicon>) -> Self {
        Self { lexicon }
    }

    /// Apply drug and section filtering to a candidate list.
    ///
    /// When `drug_filter` is not supplied it is auto-detected from the query
    /// by scanning for known drug families (first match wins, fixed family
    /// precedence). A candidate passes the drug filter if its `drugs`
    /// metadata *or* its content mentions any surface form of the target
    /// family. The section filter matches a keyword table against content or
    /// the candidate's topic metadata; an unknown section name falls back to
    /// a direct substring match against content.
    pub fn filter(
        &self,
        candidates: Vec<Candidate>,
        query: &str,
        drug_filter: Option<&str>,
        section_filter: Option<&str>,
    ) -> Vec<Candidate> {
        if candidates.is_empty() || (drug_filter.is_none() && section_filter.is_none()) {
            return candidates;
        }

        let query_lower = query.to_lowercase();
        let drug_terms: Option<Vec<String>> = drug_filter
            .map(|drug| self.resolve_drug_terms(drug))
            .or_else(|| {
                self.lexicon.detect_drug(&query_lower).map(|family| family.terms.clone())
            });

        let before = candidates.len();
        let kept: Vec<Candidate> = candidates
            .into_iter()
            .filter(|candidate| {
                self.passes_drug(candidate, drug_terms.as_deref())
                    && self.passes_section(candidate, section_filter)
            })
            .collect();

        debug!(before, after = kept.len(), "post-filter applied");
        kept
    }

    /// Surface forms for a caller-supplied drug name; unknown drugs match
    /// on the supplied string alone.
    fn resolve_drug_terms(&self, drug: &str) -> Vec<String> {
        match self.lexicon.drug_family(drug) {
            Some(family) => family.terms.clone(),
            None => vec![drug.to_lowercase()],
        }
    }

    fn passes_drug(&self, candidate: &Candidate, drug_terms: Option<&[String]>) -> bool {
        let Some(terms) = drug_terms else {
            return true;
        };
        let drugs_meta = candidate.meta("drugs").to_lowercase();
        let content = candidate.content.to_lowercase();
        terms.iter().any(|t| drugs_meta.contains(t.as_str()) || content.contains(t.as_str()))
    }

    fn passes_section(&self, candidate: &Candidate, section_filter: Option<&str>) -> bool {
        let Some(section) = section_filter else {
            return true;
        };
        let content = candidate.content.to_lowercase();
        match self.lexicon.section(section) {
            Some(keywords) => {
                let topic = candidate.meta("clinical_topic").to_lowercase();
                keywords
                    .iter()
                    .any(|k| content.contains(k.as_str()) || topic.contains(k.as_str()))
            }
            // Unknown section name: direct substring match against content.
            None => content.contains(&section.to_lowercase()),
        }
    }
}

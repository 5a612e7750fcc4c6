//! Derives a single store-side metadata filter from query text.

use std::sync::Arc;

use crate::lexicon::ClinicalLexicon;
use crate::vectorstore::FilterPredicate;

/// Metadata field carrying the topic classification of each chunk.
const TOPIC_FIELD: &str = "clinical_topic";

/// Builds at most one [`FilterPredicate`] per query.
///
/// The store supports only a single top-level predicate over one field, so
/// precedence is fixed:
///
/// 1. A query mentioning a known drug family yields *no* predicate: drug
///    mentions in content do not map cleanly to a store-side equality check,
///    so drug matching is deferred to post-filtering. Deliberate: precision
///    over premature narrowing.
/// 2. Otherwise, topic categories with at least one keyword hit against the
///    query become an equality (one match) or set-membership (several
///    matches) predicate over the topic field.
/// 3. No matches yields no predicate.
#[derive(Debug, Clone)]
pub struct MetadataFilterBuilder {
    lexicon: Arc<ClinicalLexicon>,
}

impl MetadataFilterBuilder {
    /// Create a filter builder over the given lexicon.
    pub fn new(lexicon: Arc<ClinicalLexicon>) -> Self {
        Self { lexicon }
    }

    /// Derive the store-side predicate for a query, if any applies.
    ///
    /// Deterministic given the same query and lexicon.
    pub fn build_filter(&self, query: &str) -> Option<FilterPredicate> {
        let query_lower = query.to_lowercase();

        // Drug resolution is deferred to the post-filter stage.
        if self.lexicon.detect_drug(&query_lower).is_some() {
            return None;
        }

        let matched: Vec<&str> = self
            .lexicon
            .topics
            .iter()
            .filter(|topic| topic.keywords.iter().any(|k| query_lower.contains(k.as_str())))
            .map(|topic| topic.name.as_str())
            .collect();

        match matched.as_slice() {
            [] => None,
            [single] => Some(FilterPredicate::Eq {
                field: TOPIC_FIELD.to_string(),
                value: (*single).to_string(),
            }),
            many => Some(FilterPredicate::In {
                field: TOPIC_FIELD.to_string(),
                values: many.iter().map(|s| (*s).to_string()).collect(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> MetadataFilterBuilder {
        MetadataFilterBuilder::new(Arc::new(ClinicalLexicon::bundled().unwrap()))
    }

    #[test]
    fn drug_mention_defers_to_post_filter() {
        let builder = builder();
        assert_eq!(builder.build_filter("temozolomide dosing schedule"), None);
        assert_eq!(builder.build_filter("avastin side effects"), None);
        assert_eq!(builder.build_filter("TMZ toxicity"), None);
    }

    #[test]
    fn single_topic_yields_equality() {
        let predicate = builder().build_filter("infusion timing").unwrap();
        assert_eq!(
            predicate,
            FilterPredicate::Eq {
                field: "clinical_topic".to_string(),
                value: "administration".to_string(),
            }
        );
    }

    #[test]
    fn multiple_topics_yield_membership() {
        // "dose" hits dosing, "warning" hits contraindications.
        let predicate = builder().build_filter("dose warning").unwrap();
        match predicate {
            FilterPredicate::In { field, values } => {
                assert_eq!(field, "clinical_topic");
                assert_eq!(values, vec!["dosing".to_string(), "contraindications".to_string()]);
            }
            other => panic!("expected In predicate, got {other:?}"),
        }
    }

    #[test]
    fn no_keywords_yields_none() {
        assert_eq!(builder().build_filter("survival outcomes pediatric"), None);
    }

    #[test]
    fn predicate_spans_one_field_only() {
        // Even with many topic hits, the predicate stays on a single field.
        let predicate = builder().build_filter("dose monitoring warning interaction").unwrap();
        assert_eq!(predicate.field(), "clinical_topic");
    }
}

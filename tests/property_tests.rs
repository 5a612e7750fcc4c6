//! Property tests for the deterministic pipeline stages.

use std::collections::HashMap;
use std::sync::Arc;

use gbm_rag::{
    Candidate, ClinicalLexicon, MetadataFilterBuilder, PostFilter, QueryExpander,
    SnippetHighlighter,
};
use proptest::prelude::*;

fn lexicon() -> Arc<ClinicalLexicon> {
    Arc::new(ClinicalLexicon::bundled().unwrap())
}

fn candidate(id: usize, content: &str, drugs: &str) -> Candidate {
    let mut metadata = HashMap::new();
    if !drugs.is_empty() {
        metadata.insert("drugs".to_string(), drugs.to_string());
    }
    Candidate {
        id: id.to_string(),
        content: content.to_string(),
        metadata,
        distance: 0.5,
    }
}

proptest! {
    /// Expansion never produces fewer words than the input query.
    #[test]
    fn expansion_is_monotonic_in_word_count(query in "[a-zA-Z0-9 ?.,/-]{0,60}") {
        let expander = QueryExpander::new(lexicon());
        let expanded = expander.expand(&query);
        prop_assert!(
            expanded.split_whitespace().count() >= query.split_whitespace().count()
        );
    }

    /// A derived predicate always constrains exactly one metadata field.
    #[test]
    fn derived_filters_span_a_single_field(query in "[a-z ]{0,60}") {
        let builder = MetadataFilterBuilder::new(lexicon());
        if let Some(predicate) = builder.build_filter(&query) {
            prop_assert_eq!(predicate.field(), "clinical_topic");
        }
    }

    /// Any query mentioning a known drug surface form yields no predicate.
    #[test]
    fn drug_mentions_always_defer_filtering(
        prefix in "[a-z ]{0,20}",
        drug in prop::sample::select(vec!["tmz", "temozolomide", "temodar", "bevacizumab", "avastin"]),
        suffix in "[a-z ]{0,20}",
    ) {
        let builder = MetadataFilterBuilder::new(lexicon());
        let query = format!("{prefix}{drug}{suffix}");
        prop_assert!(builder.build_filter(&query).is_none());
    }

    /// Post-filter output is always an order-preserving subsequence of its
    /// input.
    #[test]
    fn post_filter_output_is_a_subsequence(
        contents in prop::collection::vec("[a-z ]{0,30}", 0..8),
        drug in prop::option::of(prop::sample::select(vec!["temozolomide", "bevacizumab", "unknown-drug"])),
        section in prop::option::of(prop::sample::select(vec!["dosing", "adverse_effects", "unlisted"])),
        query in "[a-z ]{0,30}",
    ) {
        let candidates: Vec<Candidate> = contents
            .iter()
            .enumerate()
            .map(|(i, c)| candidate(i, c, if i % 2 == 0 { "temozolomide" } else { "" }))
            .collect();
        let post_filter = PostFilter::new(lexicon());
        let kept = post_filter.filter(
            candidates.clone(),
            &query,
            drug.as_deref(),
            section.as_deref(),
        );

        prop_assert!(kept.len() <= candidates.len());
        let mut cursor = 0;
        for item in &kept {
            let position = candidates[cursor..]
                .iter()
                .position(|c| c == item)
                .map(|offset| cursor + offset);
            prop_assert!(position.is_some(), "kept item not found in order");
            cursor = position.unwrap() + 1;
        }
    }

    /// Accepted highlight spans never overlap and always fall on character
    /// boundaries, for any text and query.
    #[test]
    fn highlight_plan_spans_never_overlap(
        text in "[ -~]{0,200}",
        query in "[a-zA-Z0-9 ]{0,40}",
    ) {
        let highlighter = SnippetHighlighter::new(lexicon(), 500).unwrap();
        let spans = highlighter.plan(&text, &query);
        for span in &spans {
            prop_assert!(span.start < span.end);
            prop_assert!(span.end <= text.len());
            prop_assert!(text.is_char_boundary(span.start));
            prop_assert!(text.is_char_boundary(span.end));
        }
        for pair in spans.windows(2) {
            prop_assert!(pair[0].end <= pair[1].start, "overlapping spans: {:?}", pair);
        }
    }

    /// Snippets stay within the configured bound plus ellipsis markers.
    #[test]
    fn snippets_respect_the_length_bound(
        text in "[a-zA-Z0-9,\\. ]{0,1200}",
        query in "[a-z ]{0,30}",
    ) {
        let highlighter = SnippetHighlighter::new(lexicon(), 300).unwrap();
        let snippet = highlighter.snippet(&text, &query);
        if text.len() <= 300 {
            prop_assert_eq!(snippet, text);
        } else {
            prop_assert!(snippet.len() <= 300 + 6, "snippet too long: {}", snippet.len());
        }
    }
}

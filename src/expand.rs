//! Synonym-driven clinical query expansion.

use std::collections::HashSet;
use std::sync::Arc;

use crate::lexicon::ClinicalLexicon;

/// Punctuation stripped from token edges before synonym lookup.
const EDGE_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', '(', ')', '[', ']', '{', '}'];

/// Rewrites free-text queries using the lexicon's synonym table.
///
/// Each whitespace token is cleaned of surrounding punctuation and looked up
/// case-insensitively; a matched token is replaced by the transitive closure
/// of its synonym set, an unmatched token passes through unchanged. A query
/// with no matches is returned verbatim, avoiding whitespace artifacts on
/// pure passthrough.
///
/// The closure makes expansion idempotent at the term-set level: the synonym
/// table is not closed under lookup (a listed synonym can itself be a key
/// with a different set), so a single-level substitution would keep growing
/// the set on re-expansion. Following key references to a fixpoint up front
/// means every term an expanded query contains already expands to a subset
/// of that query's terms.
///
/// Pure function of the query and the lexicon; no side effects.
#[derive(Debug, Clone)]
pub struct QueryExpander {
    lexicon: Arc<ClinicalLexicon>,
}

impl QueryExpander {
    /// Create an expander over the given lexicon.
    pub fn new(lexicon: Arc<ClinicalLexicon>) -> Self {
        Self { lexicon }
    }

    /// Expand a query with clinical synonyms and related concepts.
    ///
    /// The output word count is always at least the input word count, and
    /// re-expanding an expanded query yields the same set of terms.
    pub fn expand(&self, query: &str) -> String {
        let mut expanded: Vec<String> = Vec::new();
        let mut matched = false;

        for word in query.split_whitespace() {
            let clean = word.trim_matches(EDGE_PUNCTUATION).to_lowercase();
            if self.lexicon.expand_term(&clean).is_some() {
                expanded.extend(self.closure(&clean));
                matched = true;
            } else {
                expanded.push(word.to_string());
            }
        }

        if matched { expanded.join(" ") } else { query.to_string() }
    }

    /// All synonyms reachable from `seed` by repeatedly following words that
    /// are themselves synonym-table keys. Breadth-first, first-seen order,
    /// deduplicated case-insensitively.
    fn closure(&self, seed: &str) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut keys: Vec<String> = vec![seed.to_string()];
        let mut visited: HashSet<String> = keys.iter().cloned().collect();

        let mut next = 0;
        while next < keys.len() {
            let key = keys[next].clone();
            next += 1;
            let Some(synonyms) = self.lexicon.expand_term(&key) else {
                continue;
            };
            for synonym in synonyms {
                if seen.insert(synonym.to_lowercase()) {
                    out.push(synonym.clone());
                }
                for word in synonym.split_whitespace() {
                    let word = word.trim_matches(EDGE_PUNCTUATION).to_lowercase();
                    if self.lexicon.expand_term(&word).is_some() && visited.insert(word.clone())
                    {
                        keys.push(word);
                    }
                }
            }
        }
        out
    }
}

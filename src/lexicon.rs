//! The clinical vocabulary backing every deterministic pipeline stage.
//!
//! All fixed dictionaries (drug synonyms, topic keywords, section keywords,
//! the highlight vocabulary) live in a [`ClinicalLexicon`] loaded from JSON
//! rather than in code, so they can be versioned, tested, and extended
//! independently of the pipeline logic. A default lexicon covering the two
//! GBM drugs ships with the crate; see [`ClinicalLexicon::bundled`].

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// A drug family: a canonical name plus the surface forms that identify it
/// in queries, metadata, and content (brand names, abbreviations).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DrugFamily {
    /// Canonical (generic) drug name.
    pub name: String,
    /// Lowercase surface forms, including the canonical name itself.
    pub terms: Vec<String>,
}

impl DrugFamily {
    /// Whether any surface form of this family occurs in `text` (expects
    /// lowercase input; matching is substring-based, as drug mentions embed
    /// freely in prose).
    pub fn mentioned_in(&self, text: &str) -> bool {
        self.terms.iter().any(|term| text.contains(term.as_str()))
    }
}

/// A clinical topic category with the query keywords that signal it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TopicCategory {
    /// Category label as stored in chunk metadata (`clinical_topic`).
    pub name: String,
    /// Lowercase keywords counted against the query.
    pub keywords: Vec<String>,
}

/// Externally loaded clinical vocabulary.
///
/// Field order inside `drug_families` and `topics` is significant: drug
/// detection uses first-match-wins precedence, and topic categories are
/// evaluated in listed order so derived set-membership filters are
/// deterministic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClinicalLexicon {
    /// Lexicon data version, independent of the crate version.
    pub version: String,
    /// Clinical term → ordered synonym/related-form list for query expansion.
    pub synonyms: HashMap<String, Vec<String>>,
    /// Known drug families in detection-precedence order.
    pub drug_families: Vec<DrugFamily>,
    /// Topic categories for filter derivation, in evaluation order.
    pub topics: Vec<TopicCategory>,
    /// Topic name → query keywords that trigger the topic-match rerank boost.
    pub topic_boosts: HashMap<String, Vec<String>>,
    /// Section name → content keywords for post-retrieval section filtering.
    pub section_keywords: HashMap<String, Vec<String>>,
    /// Always-highlight clinical vocabulary (lowercase).
    pub clinical_keywords: Vec<String>,
    /// Compound medical phrases extracted from queries as single terms.
    pub medical_phrases: Vec<String>,
    /// Words ignored when extracting query terms for highlighting.
    pub stopwords: Vec<String>,
}

/// The default lexicon shipped with the crate.
const BUNDLED_LEXICON: &str = include_str!("../data/lexicon.json");

impl ClinicalLexicon {
    /// Load the lexicon bundled with the crate.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if the bundled data fails validation;
    /// this indicates a packaging defect, not a caller mistake.
    pub fn bundled() -> Result<Self> {
        Self::from_json_str(BUNDLED_LEXICON)
    }

    /// Parse and validate a lexicon from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] on malformed JSON or failed validation.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let lexicon: Self = serde_json::from_str(json)
            .map_err(|e| RagError::Config(format!("failed to parse lexicon JSON: {e}")))?;
        lexicon.validate()?;
        Ok(lexicon)
    }

    /// Load and validate a lexicon from a JSON file on disk.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if the file cannot be read, parsed,
    /// or validated.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            RagError::Config(format!("failed to read lexicon file '{}': {e}", path.display()))
        })?;
        Self::from_json_str(&json)
    }

    /// Validate internal consistency: no empty synonym lists, keyword sets,
    /// or term lists, and boost categories must reference known topics.
    fn validate(&self) -> Result<()> {
        for (term, synonyms) in &self.synonyms {
            if synonyms.is_empty() {
                return Err(RagError::Config(format!("synonym list for '{term}' is empty")));
            }
        }
        for family in &self.drug_families {
            if family.terms.is_empty() {
                return Err(RagError::Config(format!(
                    "drug family '{}' has no terms",
                    family.name
                )));
            }
        }
        for topic in &self.topics {
            if topic.keywords.is_empty() {
                return Err(RagError::Config(format!(
                    "topic category '{}' has no keywords",
                    topic.name
                )));
            }
        }
        let topic_names: HashSet<&str> = self.topics.iter().map(|t| t.name.as_str()).collect();
        for name in self.topic_boosts.keys() {
            if !topic_names.contains(name.as_str()) {
                return Err(RagError::Config(format!(
                    "topic_boosts references unknown topic '{name}'"
                )));
            }
        }
        for (section, keywords) in &self.section_keywords {
            if keywords.is_empty() {
                return Err(RagError::Config(format!(
                    "section '{section}' has no keywords"
                )));
            }
        }
        Ok(())
    }

    /// Look up the synonym list for a cleaned, lowercase token.
    pub fn expand_term(&self, token: &str) -> Option<&[String]> {
        self.synonyms.get(token).map(Vec::as_slice)
    }

    /// Detect the first drug family mentioned in a lowercase query.
    ///
    /// Families are checked in lexicon order; the first with any surface
    /// form present wins.
    pub fn detect_drug(&self, query_lower: &str) -> Option<&DrugFamily> {
        self.drug_families.iter().find(|family| family.mentioned_in(query_lower))
    }

    /// Resolve a caller-supplied drug filter string to a known family.
    ///
    /// Matches the family name or any surface form, case-insensitively.
    pub fn drug_family(&self, drug: &str) -> Option<&DrugFamily> {
        let drug_lower = drug.to_lowercase();
        self.drug_families.iter().find(|family| {
            family.name == drug_lower || family.terms.iter().any(|t| *t == drug_lower)
        })
    }

    /// Keywords for a named section filter, if the section is known.
    pub fn section(&self, name: &str) -> Option<&[String]> {
        self.section_keywords.get(&name.to_lowercase()).map(Vec::as_slice)
    }

    /// Query keywords that trigger the rerank boost for a topic.
    pub fn topic_boost_keywords(&self, topic: &str) -> Option<&[String]> {
        self.topic_boosts.get(topic).map(Vec::as_slice)
    }

    /// Whether `word` is a stopword (expects lowercase input).
    pub fn is_stopword(&self, word: &str) -> bool {
        self.stopwords.iter().any(|s| s == word)
    }
}

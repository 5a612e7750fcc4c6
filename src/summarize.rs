//! Extractive summaries over ranked results.
//!
//! Purely extractive and deterministic: sentences are lifted verbatim from
//! result content and scored lexically, never paraphrased. The summary is an
//! aid for scanning results, not a substitute for reading the source chunks.

use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::candidate::ScoredCandidate;
use crate::error::{RagError, Result};
use crate::lexicon::ClinicalLexicon;

/// How many ranked results feed the summary.
const SOURCE_RESULTS: usize = 5;
/// Maximum sentences lifted into the summary body.
const SUMMARY_SENTENCES: usize = 4;
/// Maximum key facts retained.
const KEY_FACT_LIMIT: usize = 10;
/// Maximum warning sentences retained.
const WARNING_LIMIT: usize = 5;

/// The clinical intent detected from the query, used to focus sentence
/// selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClinicalCategory {
    /// Dose amounts, schedules, and regimens.
    Dosing,
    /// Adverse effects and toxicity grading.
    Toxicity,
    /// Contraindications and warnings.
    Contraindications,
    /// Route and timing of administration.
    Administration,
    /// No dominant focus detected.
    General,
}

impl ClinicalCategory {
    fn focus_terms(self) -> &'static [&'static str] {
        match self {
            Self::Dosing => &["dose", "dosing", "mg/m²", "mg/kg", "schedule", "regimen"],
            Self::Toxicity => {
                &["toxicity", "adverse", "grade", "thrombocytopenia", "neutropenia"]
            }
            Self::Contraindications => {
                &["contraindicated", "contraindication", "avoid", "warning", "caution"]
            }
            Self::Administration => {
                &["administer", "administration", "infusion", "oral", "intravenous"]
            }
            Self::General => &[],
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Dosing => "Dosing guidance",
            Self::Toxicity => "Toxicity guidance",
            Self::Contraindications => "Contraindication guidance",
            Self::Administration => "Administration guidance",
            Self::General => "Summary",
        }
    }
}

/// An extractive summary of a ranked result set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClinicalSummary {
    /// The detected query focus.
    pub category: ClinicalCategory,
    /// Category label plus the top-scoring sentences, verbatim.
    pub summary: String,
    /// Concrete values pulled from the results: doses, grades, thresholds,
    /// frequencies, and dose actions. First occurrence order, deduplicated.
    pub key_facts: Vec<String>,
    /// Sentences containing safety-critical language.
    pub warnings: Vec<String>,
    /// Heuristic confidence in `[0, 1]`, rounded to two decimals.
    pub confidence: f32,
}

/// Builds [`ClinicalSummary`] values from ranked results.
pub struct ClinicalSummarizer {
    lexicon: Arc<ClinicalLexicon>,
    entity_re: Regex,
    dose_re: Regex,
    grade_re: Regex,
    lab_re: Regex,
    frequency_re: Regex,
    action_re: Regex,
    warning_re: Regex,
}

impl ClinicalSummarizer {
    /// Create a summarizer over the given lexicon.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the internal patterns fail to
    /// compile.
    pub fn new(lexicon: Arc<ClinicalLexicon>) -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern)
                .map_err(|e| RagError::Config(format!("summary pattern: {e}")))
        };
        Ok(Self {
            lexicon,
            entity_re: compile(r"(?i)\b\d+(?:\.\d+)?\s*mg\b|\bgrade\s+[1-4]\b")?,
            dose_re: compile(r"(?i)\b\d+(?:\.\d+)?\s*mg/(?:m²|m2|kg)")?,
            grade_re: compile(r"(?i)\bgrade\s+[1-4](?:\s*(?:-|to)\s*[1-4])?\b")?,
            lab_re: compile(
                r"(?i)\b(?:platelets?|anc|neutrophils?)\s*(?:count\s*)?[<>]?\s*\d[\d,]*(?:\s*/\s*(?:μl|µl|ul|mm3|mm³))?",
            )?,
            frequency_re: compile(
                r"(?i)\b(?:daily|weekly|monthly|every\s+\d+\s+(?:days?|weeks?)|q\d+[hdw])\b",
            )?,
            action_re: compile(
                r"(?i)\b(?:hold|withhold|discontinue|reduce|modify|interrupt)\b",
            )?,
            warning_re: compile(
                r"(?i)contraindicated|black box warning|discontinue|grade\s+[34]|fatal|death|emergency|urgent",
            )?,
        })
    }

    /// Summarize the top results for a query.
    ///
    /// Empty input yields an empty summary with zero confidence.
    pub fn summarize(&self, query: &str, results: &[ScoredCandidate]) -> ClinicalSummary {
        let category = self.detect_category(query);
        let sources: Vec<&str> = results
            .iter()
            .take(SOURCE_RESULTS)
            .map(|r| r.candidate.content.as_str())
            .collect();

        if sources.is_empty() {
            return ClinicalSummary {
                category,
                summary: String::new(),
                key_facts: Vec::new(),
                warnings: Vec::new(),
                confidence: 0.0,
            };
        }

        let query_terms = self.query_terms(query);
        let summary = self.extract_summary(category, &query_terms, &sources);
        let key_facts = self.extract_key_facts(&sources);
        let warnings = self.extract_warnings(&sources);
        let confidence = self.confidence(&query_terms, results);

        debug!(
            ?category,
            facts = key_facts.len(),
            warnings = warnings.len(),
            confidence,
            "summary built"
        );
        ClinicalSummary { category, summary, key_facts, warnings, confidence }
    }

    fn detect_category(&self, query: &str) -> ClinicalCategory {
        let query_lower = query.to_lowercase();
        let candidates = [
            ClinicalCategory::Dosing,
            ClinicalCategory::Toxicity,
            ClinicalCategory::Contraindications,
            ClinicalCategory::Administration,
        ];
        let mut best = ClinicalCategory::General;
        let mut best_hits = 0;
        for category in candidates {
            let hits = category
                .focus_terms()
                .iter()
                .filter(|t| query_lower.contains(*t))
                .count();
            // Fixed category order breaks ties.
            if hits > best_hits {
                best_hits = hits;
                best = category;
            }
        }
        best
    }

    fn query_terms(&self, query: &str) -> Vec<String> {
        query
            .to_lowercase()
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
            .filter(|w| w.chars().count() > 2 && !self.lexicon.is_stopword(w))
            .collect()
    }

    fn extract_summary(
        &self,
        category: ClinicalCategory,
        query_terms: &[String],
        sources: &[&str],
    ) -> String {
        let focus = category.focus_terms();
        let mut scored: Vec<(i32, &str)> = Vec::new();
        for source in sources {
            for sentence in split_sentences(source) {
                if sentence.len() < 20 {
                    continue;
                }
                let lower = sentence.to_lowercase();
                let mut score = 0i32;
                score += 2 * query_terms.iter().filter(|t| lower.contains(t.as_str())).count()
                    as i32;
                score += 3 * focus.iter().filter(|t| lower.contains(*t)).count() as i32;
                if self.entity_re.is_match(sentence) {
                    score += 1;
                }
                if sentence.len() > 200 {
                    score -= 1;
                }
                if score > 0 && !scored.iter().any(|(_, s)| *s == sentence) {
                    scored.push((score, sentence));
                }
            }
        }
        // Stable sort: ties keep source order.
        scored.sort_by_key(|(score, _)| std::cmp::Reverse(*score));
        scored.truncate(SUMMARY_SENTENCES);

        if scored.is_empty() {
            return String::new();
        }
        let body: Vec<&str> = scored.iter().map(|(_, s)| *s).collect();
        format!("{}: {}", category.label(), body.join(". "))
    }

    fn extract_key_facts(&self, sources: &[&str]) -> Vec<String> {
        let mut facts: Vec<String> = Vec::new();
        let extractors =
            [&self.dose_re, &self.grade_re, &self.lab_re, &self.frequency_re, &self.action_re];
        for source in sources {
            for re in extractors {
                for m in re.find_iter(source) {
                    let fact = m.as_str().trim().to_string();
                    let lowered = fact.to_lowercase();
                    if !facts.iter().any(|f| f.to_lowercase() == lowered) {
                        facts.push(fact);
                    }
                }
            }
        }
        facts.truncate(KEY_FACT_LIMIT);
        facts
    }

    fn extract_warnings(&self, sources: &[&str]) -> Vec<String> {
        let mut warnings: Vec<String> = Vec::new();
        for source in sources {
            for sentence in split_sentences(source) {
                if self.warning_re.is_match(sentence)
                    && !warnings.iter().any(|w| w == sentence)
                {
                    warnings.push(sentence.to_string());
                }
            }
        }
        warnings.truncate(WARNING_LIMIT);
        warnings
    }

    fn confidence(&self, query_terms: &[String], results: &[ScoredCandidate]) -> f32 {
        if results.is_empty() {
            return 0.0;
        }
        let combined: String = results
            .iter()
            .take(SOURCE_RESULTS)
            .map(|r| r.candidate.content.to_lowercase())
            .collect::<Vec<_>>()
            .join(" ");
        let overlap =
            query_terms.iter().filter(|t| combined.contains(t.as_str())).count() as f32;

        let mut evidence = 0.0;
        let sampled = results.iter().take(SOURCE_RESULTS);
        let mut sampled_len = 0;
        for result in sampled {
            sampled_len += 1;
            let level = result.candidate.meta("evidence_level").to_lowercase();
            if level.contains("fda approved") {
                evidence += 0.3;
            } else if level.contains("guideline") {
                evidence += 0.25;
            } else if level.contains("clinical trial") {
                evidence += 0.2;
            }
            let doc_type = result.candidate.meta("doc_type").to_lowercase();
            if doc_type.contains("prescribing information") {
                evidence += 0.2;
            } else if doc_type.contains("clinical protocol") {
                evidence += 0.15;
            }
        }

        let raw = overlap * 0.1 + evidence / sampled_len as f32;
        (raw.clamp(0.0, 1.0) * 100.0).round() / 100.0
    }
}

fn split_sentences(text: &str) -> impl Iterator<Item = &str> {
    text.split(['.', '!', '?']).map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::Candidate;

    fn summarizer() -> ClinicalSummarizer {
        ClinicalSummarizer::new(Arc::new(ClinicalLexicon::bundled().unwrap())).unwrap()
    }

    fn result(content: &str, meta: &[(&str, &str)]) -> ScoredCandidate {
        ScoredCandidate {
            candidate: Candidate {
                id: "x".to_string(),
                content: content.to_string(),
                metadata: meta.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
                distance: 0.2,
            },
            base_score: 0.8,
            metadata_boost: 0.0,
            final_score: 0.8,
            cross_encoder_score: None,
        }
    }

    #[test]
    fn category_detected_from_query_focus() {
        let s = summarizer();
        assert_eq!(s.detect_category("temozolomide dose schedule"), ClinicalCategory::Dosing);
        assert_eq!(s.detect_category("grade 3 toxicity"), ClinicalCategory::Toxicity);
        assert_eq!(
            s.detect_category("when is bevacizumab contraindicated"),
            ClinicalCategory::Contraindications
        );
        assert_eq!(s.detect_category("survival outcomes"), ClinicalCategory::General);
    }

    #[test]
    fn empty_results_yield_empty_summary() {
        let summary = summarizer().summarize("temozolomide dose", &[]);
        assert!(summary.summary.is_empty());
        assert!(summary.key_facts.is_empty());
        assert!(summary.warnings.is_empty());
        assert_eq!(summary.confidence, 0.0);
    }

    #[test]
    fn summary_lifts_relevant_sentences_verbatim() {
        let results = vec![result(
            "Maintenance temozolomide is dosed at 150 mg/m² for cycle one. \
             The weather was unremarkable during the study period. \
             Dose escalation to 200 mg/m² follows if cycle one is tolerated.",
            &[],
        )];
        let summary = summarizer().summarize("temozolomide dose escalation", &results);
        assert!(summary.summary.starts_with("Dosing guidance:"));
        assert!(summary.summary.contains("150 mg/m²"));
        assert!(summary.summary.contains("200 mg/m²"));
        assert!(!summary.summary.contains("weather"));
    }

    #[test]
    fn key_facts_deduplicate_case_insensitively() {
        let results = vec![
            result("Give 150 mg/m² daily. Withhold for Grade 3 events.", &[]),
            result("give 150 MG/M² daily and withhold as needed.", &[]),
        ];
        let facts = summarizer().summarize("dose", &results).key_facts;
        let dose_count = facts.iter().filter(|f| f.to_lowercase() == "150 mg/m²").count();
        assert_eq!(dose_count, 1);
        assert!(facts.iter().any(|f| f.to_lowercase() == "grade 3"));
        assert!(facts.iter().any(|f| f.to_lowercase() == "withhold"));
    }

    #[test]
    fn warnings_capture_safety_sentences() {
        let results = vec![result(
            "Bevacizumab is contraindicated with recent hemorrhage. \
             Routine imaging follows each cycle. \
             Discontinue permanently for grade 4 hypertension.",
            &[],
        )];
        let warnings = summarizer().summarize("bevacizumab safety", &results).warnings;
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("contraindicated"));
        assert!(warnings[1].contains("Discontinue"));
    }

    #[test]
    fn evidence_metadata_raises_confidence() {
        let weak = vec![result("temozolomide dosing information here", &[])];
        let strong = vec![result(
            "temozolomide dosing information here",
            &[("evidence_level", "FDA approved"), ("doc_type", "Prescribing Information")],
        )];
        let s = summarizer();
        let low = s.summarize("temozolomide dosing", &weak).confidence;
        let high = s.summarize("temozolomide dosing", &strong).confidence;
        assert!(high > low);
        assert!(high <= 1.0);
    }

    #[test]
    fn confidence_is_rounded_to_two_decimals() {
        let results = vec![result("temozolomide dosing", &[("doc_type", "Clinical Protocol")])];
        let confidence = summarizer().summarize("temozolomide dosing", &results).confidence;
        assert!((confidence * 100.0).fract().abs() < 1e-4);
    }
}

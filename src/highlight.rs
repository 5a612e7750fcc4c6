//! Deterministic snippet extraction and clinical term highlighting.
//!
//! Highlighting is a pure function of the snippet text, the query, and the
//! lexicon: four detectors propose spans, overlaps are resolved by a fixed
//! priority order, and the surviving spans are rendered in one of three
//! output formats. No scoring model is involved, so identical inputs always
//! produce identical output.

use std::sync::Arc;

use regex::Regex;

use crate::error::{RagError, Result};
use crate::lexicon::ClinicalLexicon;

/// What a highlighted span represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanCategory {
    /// A query term or medical phrase from the query.
    QueryMatch,
    /// A dosage value with its unit, e.g. `150 mg/m²`.
    DosageValue,
    /// A CTCAE-style toxicity grade, e.g. `Grade 3`.
    ToxicityGrade,
    /// A domain term from the clinical vocabulary.
    ClinicalKeyword,
}

impl SpanCategory {
    /// Precedence when spans overlap; higher wins.
    pub fn priority(self) -> u8 {
        match self {
            Self::QueryMatch => 4,
            Self::DosageValue | Self::ToxicityGrade => 3,
            Self::ClinicalKeyword => 1,
        }
    }
}

/// A byte-offset span within a snippet. `start..end` always falls on UTF-8
/// character boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HighlightSpan {
    /// Byte offset of the first highlighted byte.
    pub start: usize,
    /// Byte offset one past the last highlighted byte.
    pub end: usize,
    /// What the span represents.
    pub category: SpanCategory,
}

impl HighlightSpan {
    fn overlaps(&self, other: &HighlightSpan) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Output rendering for highlighted snippets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HighlightFormat {
    /// ANSI escape sequences for terminal display.
    Terminal,
    /// `<mark class="...">` tags with the span text HTML-escaped.
    Markup,
    /// Plain-text emphasis markers, safe for any sink.
    PlainEmphasis,
}

/// Extracts a query-relevant snippet from chunk content and marks up the
/// clinically significant terms within it.
pub struct SnippetHighlighter {
    lexicon: Arc<ClinicalLexicon>,
    max_length: usize,
    dosage_re: Regex,
    grade_re: Regex,
    word_re: Regex,
}

impl SnippetHighlighter {
    /// Create a highlighter; `max_length` bounds the snippet in bytes.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the internal patterns fail to
    /// compile.
    pub fn new(lexicon: Arc<ClinicalLexicon>, max_length: usize) -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern)
                .map_err(|e| RagError::Config(format!("highlight pattern: {e}")))
        };
        Ok(Self {
            lexicon,
            max_length,
            dosage_re: compile(r"(?i)\b\d+(?:\.\d+)?\s*(?:mg/(?:m²|m2|kg)|mg\b)")?,
            grade_re: compile(r"(?i)\b(?:ctcae\s+grade|ctc\s+grade|grade)\s+[1-4]\b")?,
            word_re: compile(r"\w+")?,
        })
    }

    /// Truncate, plan, and render in one step.
    pub fn highlight(&self, content: &str, query: &str, format: HighlightFormat) -> String {
        let snippet = self.snippet(content, query);
        let spans = self.plan(&snippet, query);
        render(&snippet, &spans, format)
    }

    /// Extract the query-relevant window from chunk content.
    ///
    /// Content at or under the length bound is returned verbatim. Longer
    /// content is scanned with a sliding window scored by query-term hits;
    /// the winning window is then nudged back to the nearest sentence or
    /// paragraph break and trimmed to end on a sentence when one falls late
    /// enough in the snippet. Ellipses mark elided text on either side.
    pub fn snippet(&self, content: &str, query: &str) -> String {
        if content.len() <= self.max_length {
            return content.to_string();
        }

        let terms = self.query_terms(query);
        let window = self.max_length.saturating_sub(100).max(1);

        // Slide in 50-byte steps, snapped to character boundaries.
        let mut best_start = 0;
        let mut best_hits = usize::MAX; // sentinel: unset
        let mut pos = 0;
        while pos + window <= content.len() {
            let start = floor_boundary(content, pos);
            let end = floor_boundary(content, start + window);
            let slice = &content[start..end];
            let hits = terms.iter().filter(|t| find_ci(slice, t, 0).is_some()).count();
            if best_hits == usize::MAX || hits > best_hits {
                best_hits = hits;
                best_start = start;
            }
            pos += 50;
        }

        // Back up to a sentence or paragraph break within reach.
        let lookback = floor_boundary(content, best_start.saturating_sub(100));
        if let Some(break_at) = content[lookback..best_start].rfind(['.', '!', '?', '\n']) {
            let after = lookback + break_at + 1;
            best_start = floor_boundary(content, after);
            while best_start < content.len()
                && content.as_bytes()[best_start].is_ascii_whitespace()
            {
                best_start += 1;
            }
        }

        let end = floor_boundary(content, best_start + self.max_length);
        let mut snippet = content[best_start..end].to_string();

        // Prefer ending on a complete sentence when one lands late enough.
        if let Some(last_break) = snippet.rfind(['.', '!', '?']) {
            if last_break + 1 >= (self.max_length * 7) / 10 {
                snippet.truncate(last_break + 1);
            }
        }

        let truncated_tail = best_start + snippet.len() < content.len()
            && !snippet.ends_with(['.', '!', '?']);
        if best_start > 0 {
            snippet.insert_str(0, "...");
        }
        if truncated_tail {
            snippet.push_str("...");
        }
        snippet
    }

    /// Compute the final non-overlapping span set for a snippet.
    ///
    /// Detector proposals are resolved greedily in text order: a proposal is
    /// accepted outright when it touches nothing already accepted, replaces
    /// every overlapping accepted span when it outranks all of them, and is
    /// dropped otherwise. The result is pairwise non-overlapping and sorted
    /// by start offset.
    pub fn plan(&self, snippet: &str, query: &str) -> Vec<HighlightSpan> {
        let mut proposals = Vec::new();

        for term in self.query_terms(query) {
            collect_ci_spans(snippet, &term, SpanCategory::QueryMatch, &mut proposals);
        }
        for m in self.dosage_re.find_iter(snippet) {
            proposals.push(HighlightSpan {
                start: m.start(),
                end: m.end(),
                category: SpanCategory::DosageValue,
            });
        }
        for m in self.grade_re.find_iter(snippet) {
            proposals.push(HighlightSpan {
                start: m.start(),
                end: m.end(),
                category: SpanCategory::ToxicityGrade,
            });
        }
        for keyword in &self.lexicon.clinical_keywords {
            collect_ci_spans(snippet, keyword, SpanCategory::ClinicalKeyword, &mut proposals);
        }

        // Text order; at a tie, higher priority first, then longer span.
        proposals.sort_by_key(|s| {
            (s.start, std::cmp::Reverse(s.category.priority()), std::cmp::Reverse(s.end))
        });
        proposals.dedup();

        let mut accepted: Vec<HighlightSpan> = Vec::new();
        for span in proposals {
            let overlapping: Vec<usize> = accepted
                .iter()
                .enumerate()
                .filter(|(_, a)| a.overlaps(&span))
                .map(|(i, _)| i)
                .collect();
            if overlapping.is_empty() {
                accepted.push(span);
            } else if overlapping
                .iter()
                .all(|&i| span.category.priority() > accepted[i].category.priority())
            {
                for &i in overlapping.iter().rev() {
                    accepted.remove(i);
                }
                accepted.push(span);
            }
        }

        accepted.sort_by_key(|s| s.start);
        accepted
    }

    /// Query words minus stopwords and short tokens, plus any lexicon
    /// medical phrase the query contains. All lowercase.
    fn query_terms(&self, query: &str) -> Vec<String> {
        let mut terms: Vec<String> = Vec::new();
        for m in self.word_re.find_iter(query) {
            let word = m.as_str().to_lowercase();
            if word.chars().count() > 2
                && !self.lexicon.is_stopword(&word)
                && !terms.contains(&word)
            {
                terms.push(word);
            }
        }
        for phrase in &self.lexicon.medical_phrases {
            if find_ci(query, phrase, 0).is_some() && !terms.contains(phrase) {
                terms.push(phrase.clone());
            }
        }
        terms
    }
}

/// Case-insensitive (ASCII fold) byte search. Non-ASCII bytes must match
/// exactly, which keeps every reported offset on a character boundary.
fn find_ci(haystack: &str, needle: &str, from: usize) -> Option<usize> {
    let hay = haystack.as_bytes();
    let ndl = needle.as_bytes();
    if ndl.is_empty() || from + ndl.len() > hay.len() {
        return None;
    }
    (from..=hay.len() - ndl.len()).find(|&i| hay[i..i + ndl.len()].eq_ignore_ascii_case(ndl))
}

/// Whether `start..end` sits on word boundaries (no adjacent ASCII
/// alphanumeric byte on either side).
fn at_word_boundary(text: &str, start: usize, end: usize) -> bool {
    let bytes = text.as_bytes();
    let before = start == 0 || !bytes[start - 1].is_ascii_alphanumeric();
    let after = end == bytes.len() || !bytes[end].is_ascii_alphanumeric();
    before && after
}

/// All word-bounded case-insensitive occurrences of `needle` in `text`.
fn collect_ci_spans(
    text: &str,
    needle: &str,
    category: SpanCategory,
    out: &mut Vec<HighlightSpan>,
) {
    let mut from = 0;
    while let Some(start) = find_ci(text, needle, from) {
        let end = start + needle.len();
        if at_word_boundary(text, start, end) {
            out.push(HighlightSpan { start, end, category });
        }
        from = start + 1;
    }
}

/// Largest character boundary at or below `at`.
fn floor_boundary(text: &str, at: usize) -> usize {
    let mut i = at.min(text.len());
    while !text.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn render(snippet: &str, spans: &[HighlightSpan], format: HighlightFormat) -> String {
    let mut out = String::with_capacity(snippet.len() + spans.len() * 16);
    let mut cursor = 0;
    for span in spans {
        out.push_str(&snippet[cursor..span.start]);
        let inner = &snippet[span.start..span.end];
        match format {
            HighlightFormat::Terminal => {
                out.push_str(ansi_open(span.category));
                out.push_str(inner);
                out.push_str("\x1b[0m");
            }
            HighlightFormat::Markup => {
                out.push_str("<mark class=\"");
                out.push_str(css_class(span.category));
                out.push_str("\">");
                push_escaped(&mut out, inner);
                out.push_str("</mark>");
            }
            HighlightFormat::PlainEmphasis => {
                let marker = emphasis_marker(span.category);
                out.push_str(marker);
                out.push_str(inner);
                out.push_str(marker);
            }
        }
        cursor = span.end;
    }
    out.push_str(&snippet[cursor..]);
    out
}

fn ansi_open(category: SpanCategory) -> &'static str {
    match category {
        SpanCategory::QueryMatch => "\x1b[1;43;30m",
        SpanCategory::DosageValue => "\x1b[1;42;30m",
        SpanCategory::ToxicityGrade => "\x1b[1;41;37m",
        SpanCategory::ClinicalKeyword => "\x1b[1;36m",
    }
}

fn css_class(category: SpanCategory) -> &'static str {
    match category {
        SpanCategory::QueryMatch => "query-match",
        SpanCategory::DosageValue => "dosage",
        SpanCategory::ToxicityGrade => "toxicity-grade",
        SpanCategory::ClinicalKeyword => "clinical-keyword",
    }
}

fn emphasis_marker(category: SpanCategory) -> &'static str {
    match category {
        SpanCategory::QueryMatch => "**",
        SpanCategory::DosageValue => "***",
        SpanCategory::ToxicityGrade => "__",
        SpanCategory::ClinicalKeyword => "*",
    }
}

fn push_escaped(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            other => out.push(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn highlighter() -> SnippetHighlighter {
        SnippetHighlighter::new(Arc::new(ClinicalLexicon::bundled().unwrap()), 500).unwrap()
    }

    fn span_text<'a>(snippet: &'a str, span: &HighlightSpan) -> &'a str {
        &snippet[span.start..span.end]
    }

    fn assert_non_overlapping(spans: &[HighlightSpan]) {
        for pair in spans.windows(2) {
            assert!(pair[0].end <= pair[1].start, "overlap: {pair:?}");
        }
    }

    #[test]
    fn grade_and_lab_values_are_categorized() {
        let hl = highlighter();
        let snippet = "Grade 3 thrombocytopenia with platelets <50,000/μL requires a hold.";
        let spans = hl.plan(snippet, "thrombocytopenia platelets");
        assert_non_overlapping(&spans);

        let by_text: Vec<(&str, SpanCategory)> =
            spans.iter().map(|s| (span_text(snippet, s), s.category)).collect();
        assert!(by_text.contains(&("Grade 3", SpanCategory::ToxicityGrade)));
        assert!(by_text.contains(&("thrombocytopenia", SpanCategory::QueryMatch)));
        assert!(by_text.contains(&("platelets", SpanCategory::QueryMatch)));
        assert!(by_text.contains(&("50,000", SpanCategory::ClinicalKeyword)));
    }

    #[test]
    fn dosage_values_include_their_unit() {
        let hl = highlighter();
        let snippet = "Start at 150 mg/m² then escalate; bevacizumab at 10 mg/kg.";
        let spans = hl.plan(snippet, "");
        let dosages: Vec<&str> = spans
            .iter()
            .filter(|s| s.category == SpanCategory::DosageValue)
            .map(|s| span_text(snippet, s))
            .collect();
        assert_eq!(dosages, vec!["150 mg/m²", "10 mg/kg"]);
    }

    #[test]
    fn query_match_outranks_clinical_keyword() {
        let hl = highlighter();
        // "toxicity" is both a query term and a vocabulary keyword; the
        // query match must win and leave a single span.
        let snippet = "Dose-limiting toxicity was observed.";
        let spans = hl.plan(snippet, "toxicity");
        let toxicity: Vec<_> = spans
            .iter()
            .filter(|s| span_text(snippet, s).eq_ignore_ascii_case("toxicity"))
            .collect();
        assert_eq!(toxicity.len(), 1);
        assert_eq!(toxicity[0].category, SpanCategory::QueryMatch);
    }

    #[test]
    fn keyword_matching_respects_word_boundaries() {
        let hl = highlighter();
        // "anc" must not light up inside "balance".
        let snippet = "Check balance and ANC weekly.";
        let spans = hl.plan(snippet, "");
        let anc: Vec<&str> = spans
            .iter()
            .filter(|s| span_text(snippet, s).eq_ignore_ascii_case("anc"))
            .map(|s| span_text(snippet, s))
            .collect();
        assert_eq!(anc, vec!["ANC"]);
    }

    #[test]
    fn stopwords_and_short_tokens_never_match() {
        let hl = highlighter();
        let snippet = "What is the dose for the patient?";
        let spans = hl.plan(snippet, "what is the mg");
        assert!(
            spans
                .iter()
                .all(|s| !["What", "is", "the"].contains(&span_text(snippet, s)))
        );
    }

    #[test]
    fn short_content_is_returned_verbatim() {
        let hl = highlighter();
        let content = "Short chunk, no truncation needed.";
        assert_eq!(hl.snippet(content, "anything"), content);
    }

    #[test]
    fn truncation_centers_on_query_terms() {
        let hl = highlighter();
        let filler = "Routine follow-up notes with nothing of interest here. ".repeat(20);
        let content = format!(
            "{filler}Maintenance temozolomide 150 mg/m² on days 1-5 of each cycle. {filler}"
        );
        let snippet = hl.snippet(&content, "temozolomide dosing");
        assert!(snippet.len() <= 500 + 6);
        assert!(snippet.contains("temozolomide"));
        assert!(snippet.starts_with("..."));
    }

    #[test]
    fn snippet_starts_after_a_sentence_break() {
        let hl = highlighter();
        let filler = "Background information sentence that pads the document. ".repeat(20);
        let content = format!("{filler}Bevacizumab dosing is 10 mg/kg every two weeks. {filler}");
        let snippet = hl.snippet(&content, "bevacizumab");
        let body = snippet.trim_start_matches("...");
        assert!(
            body.starts_with(char::is_uppercase),
            "snippet should open on a sentence: {body:?}"
        );
    }

    #[test]
    fn plain_emphasis_round_trips_span_text() {
        let hl = highlighter();
        let out = hl.highlight("Take 150 mg daily.", "", HighlightFormat::PlainEmphasis);
        assert!(out.contains("***150 mg***"));
    }

    #[test]
    fn markup_escapes_span_text() {
        let snippet = "platelets & counts";
        let spans = vec![HighlightSpan {
            start: 0,
            end: snippet.len(),
            category: SpanCategory::QueryMatch,
        }];
        let out = render(snippet, &spans, HighlightFormat::Markup);
        assert_eq!(out, "<mark class=\"query-match\">platelets &amp; counts</mark>");
    }

    #[test]
    fn terminal_output_resets_after_each_span() {
        let hl = highlighter();
        let out = hl.highlight("Grade 4 neutropenia.", "", HighlightFormat::Terminal);
        assert!(out.contains("\x1b[1;41;37mGrade 4\x1b[0m"));
    }

    #[test]
    fn multibyte_content_never_splits_characters() {
        let hl = highlighter();
        let snippet = "Platelets <50,000/μL at 75 mg/m² μμμ";
        let spans = hl.plan(snippet, "platelets");
        assert_non_overlapping(&spans);
        for span in &spans {
            assert!(snippet.is_char_boundary(span.start));
            assert!(snippet.is_char_boundary(span.end));
        }
        // Rendering must not panic on any format.
        for format in [
            HighlightFormat::Terminal,
            HighlightFormat::Markup,
            HighlightFormat::PlainEmphasis,
        ] {
            let _ = render(snippet, &spans, format);
        }
    }
}

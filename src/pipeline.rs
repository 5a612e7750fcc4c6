//! Pipeline orchestration: expansion, filtering, retrieval, and reranking.

use std::fmt::Write as _;
use std::sync::Arc;

use tracing::info;

use crate::candidate::{CorpusStats, ExplicitFilters, QueryResponse};
use crate::config::PipelineConfig;
use crate::crossencoder::{CrossEncoder, CrossEncoderReranker};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::expand::QueryExpander;
use crate::filter::MetadataFilterBuilder;
use crate::highlight::{HighlightFormat, SnippetHighlighter};
use crate::lexicon::ClinicalLexicon;
use crate::postfilter::PostFilter;
use crate::rerank::MetadataReranker;
use crate::retrieve::CandidateRetriever;
use crate::summarize::{ClinicalSummarizer, ClinicalSummary};
use crate::vectorstore::VectorStore;

/// Result count for drug-specific lookups.
const DRUG_SPECIFIC_RESULTS: usize = 10;

/// The multi-stage clinical retrieval pipeline.
///
/// Stages run strictly in sequence per query; each stage fully consumes its
/// predecessor's output. The only suspension points are the external calls:
/// the vector store, the optional embedder, and the optional cross-encoder.
/// Independent queries share nothing mutable, so a pipeline handle can be
/// shared across tasks and queried concurrently.
///
/// # Example
///
/// ```rust,ignore
/// use gbm_rag::ClinicalQueryPipeline;
///
/// let pipeline = ClinicalQueryPipeline::builder().store(store).build()?;
/// let response = pipeline.query_clinical_data("tmz dose for gbm", 5, None).await?;
/// ```
pub struct ClinicalQueryPipeline {
    config: PipelineConfig,
    store: Arc<dyn VectorStore>,
    expander: QueryExpander,
    filter_builder: MetadataFilterBuilder,
    retriever: CandidateRetriever,
    post_filter: PostFilter,
    metadata_reranker: MetadataReranker,
    cross_reranker: CrossEncoderReranker,
    highlighter: SnippetHighlighter,
    summarizer: ClinicalSummarizer,
}

impl ClinicalQueryPipeline {
    /// Create a new builder.
    pub fn builder() -> ClinicalQueryPipelineBuilder {
        ClinicalQueryPipelineBuilder::default()
    }

    /// Run the full pipeline for one query.
    ///
    /// `n` is the requested result count; the response may hold fewer (or
    /// zero) results when filtering narrows the candidate set. Explicit
    /// filters switch retrieval to a wider unfiltered fetch and defer all
    /// narrowing to post-filtering.
    ///
    /// # Errors
    ///
    /// Returns a retrieval or embedding error when an external call fails.
    /// Cross-encoder failures never surface here; that stage degrades to
    /// truncation.
    pub async fn query_clinical_data(
        &self,
        query: &str,
        n: usize,
        filters: Option<ExplicitFilters>,
    ) -> Result<QueryResponse> {
        let filters = filters.unwrap_or_default();
        let explicit = filters.is_active();

        let expanded_query = self.expander.expand(query);
        let filter_used =
            if explicit { None } else { self.filter_builder.build_filter(query) };

        info!(
            query,
            expanded = expanded_query.as_str(),
            explicit,
            filtered = filter_used.is_some(),
            "pipeline query started"
        );

        let candidates = self
            .retriever
            .retrieve(&expanded_query, filter_used.as_ref(), n, explicit)
            .await?;
        let candidates = self.post_filter.filter(
            candidates,
            query,
            filters.drug.as_deref(),
            filters.section.as_deref(),
        );
        let window = self.metadata_reranker.rerank(
            candidates,
            query,
            n.saturating_mul(self.config.rerank_window_factor),
        );
        let (results, using_cross_encoder) =
            self.cross_reranker.rerank(window, query, n).await;

        info!(results = results.len(), using_cross_encoder, "pipeline query complete");

        Ok(QueryResponse {
            query: query.to_string(),
            expanded_query,
            filter_used,
            drug_filter: filters.drug,
            section_filter: filters.section,
            results,
            using_embeddings: self.retriever.using_embeddings(),
            using_cross_encoder,
        })
    }

    /// Retrieve drug-focused results, optionally narrowed to a topic.
    ///
    /// A convenience wrapper over [`query_clinical_data`] with an explicit
    /// drug filter, so brand names and abbreviations resolve through the
    /// lexicon.
    ///
    /// [`query_clinical_data`]: Self::query_clinical_data
    pub async fn drug_specific(
        &self,
        drug: &str,
        topic: Option<&str>,
    ) -> Result<QueryResponse> {
        let query = match topic {
            Some(topic) => format!("{drug} {topic}"),
            None => drug.to_string(),
        };
        let filters =
            ExplicitFilters { drug: Some(drug.to_string()), section: None };
        self.query_clinical_data(&query, DRUG_SPECIFIC_RESULTS, Some(filters)).await
    }

    /// Corpus composition statistics from a bounded metadata sample.
    ///
    /// `total_chunks` is exact; the per-field counts cover at most
    /// `metadata_sample_limit` records.
    ///
    /// # Errors
    ///
    /// Returns a retrieval error when the store fails.
    pub async fn stats(&self) -> Result<CorpusStats> {
        let total_chunks = self.store.count().await?;
        let sample = self.store.get_metadata(self.config.metadata_sample_limit).await?;

        let mut stats = CorpusStats { total_chunks, ..CorpusStats::default() };
        for record in &sample {
            if let Some(doc_type) = record.get("doc_type") {
                *stats.doc_types.entry(doc_type.clone()).or_default() += 1;
            }
            if let Some(source) = record.get("source") {
                *stats.sources.entry(source.clone()).or_default() += 1;
            }
            if let Some(drugs) = record.get("drugs") {
                for drug in drugs.split(',').map(str::trim).filter(|d| !d.is_empty()) {
                    *stats.drugs.entry(drug.to_string()).or_default() += 1;
                }
            }
        }
        Ok(stats)
    }

    /// Highlight a result's content for display, with snippet truncation.
    pub fn highlight(&self, content: &str, query: &str, format: HighlightFormat) -> String {
        self.highlighter.highlight(content, query, format)
    }

    /// Build an extractive summary over a response's results.
    pub fn summarize(&self, response: &QueryResponse) -> ClinicalSummary {
        self.summarizer.summarize(&response.query, &response.results)
    }

    /// Render a response as display text, one highlighted snippet per result.
    pub fn format_results(&self, response: &QueryResponse, format: HighlightFormat) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Query: {}", response.query);
        if response.expanded_query != response.query {
            let _ = writeln!(out, "Expanded: {}", response.expanded_query);
        }
        if let Some(drug) = &response.drug_filter {
            let _ = writeln!(out, "Drug filter: {drug}");
        }
        if let Some(section) = &response.section_filter {
            let _ = writeln!(out, "Section filter: {section}");
        }
        let _ = writeln!(
            out,
            "Retrieval: {} / rerank: {}",
            if response.using_embeddings { "embeddings" } else { "text" },
            if response.using_cross_encoder { "cross-encoder" } else { "metadata" },
        );

        if response.results.is_empty() {
            let _ = writeln!(out, "\nNo matching documents.");
            return out;
        }

        for (rank, result) in response.results.iter().enumerate() {
            let _ = writeln!(
                out,
                "\n[{}] {} (score {:.3}, base {:.3} + boost {:.3})",
                rank + 1,
                result.candidate.id,
                result.final_score,
                result.base_score,
                result.metadata_boost,
            );
            if let Some(score) = result.cross_encoder_score {
                let _ = writeln!(out, "    cross-encoder score: {score:.3}");
            }
            let source = result.candidate.meta("source");
            if !source.is_empty() {
                let _ = writeln!(out, "    source: {source}");
            }
            let snippet =
                self.highlighter.highlight(&result.candidate.content, &response.query, format);
            for line in snippet.lines() {
                let _ = writeln!(out, "    {line}");
            }
        }
        out
    }
}

/// Builder for [`ClinicalQueryPipeline`].
///
/// Only the vector store is required; the embedder and cross-encoder are
/// optional capabilities, the lexicon defaults to the bundled vocabulary,
/// and the configuration defaults to [`PipelineConfig::default`].
#[derive(Default)]
pub struct ClinicalQueryPipelineBuilder {
    store: Option<Arc<dyn VectorStore>>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    cross_encoder: Option<Arc<dyn CrossEncoder>>,
    lexicon: Option<Arc<ClinicalLexicon>>,
    config: Option<PipelineConfig>,
}

impl ClinicalQueryPipelineBuilder {
    /// Set the vector store (required).
    pub fn store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the optional embedding provider.
    pub fn embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Set the optional cross-encoder.
    pub fn cross_encoder(mut self, cross_encoder: Arc<dyn CrossEncoder>) -> Self {
        self.cross_encoder = Some(cross_encoder);
        self
    }

    /// Override the bundled lexicon.
    pub fn lexicon(mut self, lexicon: Arc<ClinicalLexicon>) -> Self {
        self.lexicon = Some(lexicon);
        self
    }

    /// Override the default configuration.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Build the pipeline.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when no store is set, or when the
    /// bundled lexicon or highlight patterns fail to load.
    pub fn build(self) -> Result<ClinicalQueryPipeline> {
        let store = self
            .store
            .ok_or_else(|| RagError::Config("a vector store is required".to_string()))?;
        let config = self.config.unwrap_or_default();
        let lexicon = match self.lexicon {
            Some(lexicon) => lexicon,
            None => Arc::new(ClinicalLexicon::bundled()?),
        };

        Ok(ClinicalQueryPipeline {
            expander: QueryExpander::new(lexicon.clone()),
            filter_builder: MetadataFilterBuilder::new(lexicon.clone()),
            retriever: CandidateRetriever::new(
                store.clone(),
                self.embedder,
                config.overfetch_factor,
            ),
            post_filter: PostFilter::new(lexicon.clone()),
            metadata_reranker: MetadataReranker::new(lexicon.clone()),
            cross_reranker: CrossEncoderReranker::new(
                self.cross_encoder,
                config.cross_encoder_max_chars,
            ),
            highlighter: SnippetHighlighter::new(lexicon.clone(), config.snippet_max_length)?,
            summarizer: ClinicalSummarizer::new(lexicon)?,
            store,
            config,
        })
    }
}

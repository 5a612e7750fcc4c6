//! Multi-stage retrieval re-ranking for glioblastoma clinical documents.
//!
//! This crate turns a clinician's free-text question into a ranked set of
//! document chunks drawn from an external vector store, specialized for the
//! GBM treatment corpus (temozolomide and bevacizumab protocols, prescribing
//! information, and monitoring guidance).
//!
//! A query moves through six stages:
//!
//! 1. [`QueryExpander`] rewrites the query with clinical synonyms.
//! 2. [`MetadataFilterBuilder`] derives at most one store-side predicate.
//! 3. [`CandidateRetriever`] over-fetches candidates from the store.
//! 4. [`PostFilter`] drops candidates failing drug or section constraints.
//! 5. [`MetadataReranker`] rescales similarity with metadata boosts.
//! 6. [`CrossEncoderReranker`] refines the final order, degrading to plain
//!    truncation when no scorer is available.
//!
//! [`SnippetHighlighter`] runs independently at display time, and
//! [`ClinicalSummarizer`] builds extractive summaries over ranked results.
//! External capabilities (the store, the embedder, the cross-encoder) are
//! trait objects injected at construction, so every stage tests in isolation
//! against substitutes.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use gbm_rag::{ClinicalQueryPipeline, InMemoryVectorStore};
//!
//! let store = Arc::new(InMemoryVectorStore::new());
//! let pipeline = ClinicalQueryPipeline::builder().store(store).build()?;
//! let response = pipeline
//!     .query_clinical_data("when to hold TMZ for thrombocytopenia", 5, None)
//!     .await?;
//! for result in &response.results {
//!     println!("{} {:.3}", result.candidate.id, result.final_score);
//! }
//! ```

pub mod candidate;
pub mod config;
pub mod crossencoder;
pub mod embedding;
pub mod error;
pub mod expand;
pub mod filter;
pub mod highlight;
pub mod inmemory;
pub mod lexicon;
pub mod pipeline;
pub mod postfilter;
pub mod rerank;
pub mod retrieve;
pub mod summarize;
pub mod vectorstore;

pub use candidate::{Candidate, CorpusStats, ExplicitFilters, QueryResponse, ScoredCandidate};
pub use config::{PipelineConfig, PipelineConfigBuilder};
pub use crossencoder::{CrossEncoder, CrossEncoderReranker};
pub use embedding::EmbeddingProvider;
pub use error::{RagError, Result};
pub use expand::QueryExpander;
pub use filter::MetadataFilterBuilder;
pub use highlight::{HighlightFormat, HighlightSpan, SnippetHighlighter, SpanCategory};
pub use inmemory::{Document, InMemoryVectorStore};
pub use lexicon::{ClinicalLexicon, DrugFamily, TopicCategory};
pub use pipeline::{ClinicalQueryPipeline, ClinicalQueryPipelineBuilder};
pub use postfilter::PostFilter;
pub use rerank::MetadataReranker;
pub use retrieve::CandidateRetriever;
pub use summarize::{ClinicalCategory, ClinicalSummarizer, ClinicalSummary};
pub use vectorstore::{FilterPredicate, VectorStore};

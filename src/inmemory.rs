//! In-memory vector store for tests, demos, and small corpora.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::candidate::Candidate;
use crate::error::Result;
use crate::vectorstore::{FilterPredicate, VectorStore};

/// A chunk held by the in-memory store.
#[derive(Debug, Clone)]
pub struct Document {
    /// Unique chunk identifier.
    pub id: String,
    /// Chunk text.
    pub content: String,
    /// Named string attributes.
    pub metadata: HashMap<String, String>,
    /// Precomputed embedding, when available. Chunks without one are
    /// invisible to embedding queries but still served by the text path.
    pub embedding: Option<Vec<f32>>,
}

/// A [`VectorStore`] backed by a `Vec` behind an async read/write lock.
///
/// Insertion order is preserved, which keeps equal-distance results
/// deterministic. Embedding queries rank by cosine distance; the text path
/// ranks by query-token overlap. Not built for large corpora: every query is
/// a linear scan.
#[derive(Default)]
pub struct InMemoryVectorStore {
    docs: RwLock<Vec<Document>>,
}

impl InMemoryVectorStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a single document.
    pub async fn insert(&self, doc: Document) {
        self.docs.write().await.push(doc);
    }

    /// Append a batch of documents, preserving their order.
    pub async fn insert_all(&self, docs: impl IntoIterator<Item = Document>) {
        self.docs.write().await.extend(docs);
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

fn rank(mut candidates: Vec<Candidate>, top_k: usize) -> Vec<Candidate> {
    candidates.sort_by(|a, b| {
        a.distance.partial_cmp(&b.distance).unwrap_or(std::cmp::Ordering::Equal)
    });
    candidates.truncate(top_k);
    candidates
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn query_embedding(
        &self,
        embedding: &[f32],
        top_k: usize,
        filter: Option<&FilterPredicate>,
    ) -> Result<Vec<Candidate>> {
        let docs = self.docs.read().await;
        let candidates = docs
            .iter()
            .filter(|doc| filter.is_none_or(|f| f.matches(&doc.metadata)))
            .filter_map(|doc| {
                let stored = doc.embedding.as_deref()?;
                Some(Candidate {
                    id: doc.id.clone(),
                    content: doc.content.clone(),
                    metadata: doc.metadata.clone(),
                    distance: 1.0 - cosine_similarity(embedding, stored),
                })
            })
            .collect();
        Ok(rank(candidates, top_k))
    }

    async fn query_text(
        &self,
        text: &str,
        top_k: usize,
        filter: Option<&FilterPredicate>,
    ) -> Result<Vec<Candidate>> {
        let query_tokens: Vec<String> =
            text.to_lowercase().split_whitespace().map(str::to_string).collect();
        let docs = self.docs.read().await;
        let candidates = docs
            .iter()
            .filter(|doc| filter.is_none_or(|f| f.matches(&doc.metadata)))
            .map(|doc| {
                let content_tokens: HashSet<String> = doc
                    .content
                    .to_lowercase()
                    .split_whitespace()
                    .map(str::to_string)
                    .collect();
                let overlap =
                    query_tokens.iter().filter(|t| content_tokens.contains(*t)).count();
                let distance = if query_tokens.is_empty() {
                    1.0
                } else {
                    1.0 - overlap as f32 / query_tokens.len() as f32
                };
                Candidate {
                    id: doc.id.clone(),
                    content: doc.content.clone(),
                    metadata: doc.metadata.clone(),
                    distance,
                }
            })
            .collect();
        Ok(rank(candidates, top_k))
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.docs.read().await.len())
    }

    async fn get_metadata(&self, limit: usize) -> Result<Vec<HashMap<String, String>>> {
        let docs = self.docs.read().await;
        Ok(docs.iter().take(limit).map(|doc| doc.metadata.clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, content: &str, topic: &str, embedding: Option<Vec<f32>>) -> Document {
        let mut metadata = HashMap::new();
        if !topic.is_empty() {
            metadata.insert("clinical_topic".to_string(), topic.to_string());
        }
        Document { id: id.to_string(), content: content.to_string(), metadata, embedding }
    }

    #[tokio::test]
    async fn embedding_query_orders_by_cosine_distance() {
        let store = InMemoryVectorStore::new();
        store
            .insert_all([
                doc("far", "", "", Some(vec![0.0, 1.0])),
                doc("near", "", "", Some(vec![1.0, 0.0])),
                doc("mid", "", "", Some(vec![1.0, 1.0])),
            ])
            .await;
        let results = store.query_embedding(&[1.0, 0.0], 3, None).await.unwrap();
        let ids: Vec<&str> = results.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["near", "mid", "far"]);
        assert!(results[0].distance < results[1].distance);
    }

    #[tokio::test]
    async fn filter_restricts_embedding_query() {
        let store = InMemoryVectorStore::new();
        store
            .insert_all([
                doc("a", "", "dosing", Some(vec![1.0])),
                doc("b", "", "toxicity", Some(vec![1.0])),
            ])
            .await;
        let filter = FilterPredicate::Eq {
            field: "clinical_topic".to_string(),
            value: "dosing".to_string(),
        };
        let results = store.query_embedding(&[1.0], 10, Some(&filter)).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "a");
    }

    #[tokio::test]
    async fn text_query_ranks_by_token_overlap() {
        let store = InMemoryVectorStore::new();
        store
            .insert_all([
                doc("none", "unrelated content entirely", "", None),
                doc("both", "temozolomide dosing schedule", "", None),
                doc("one", "temozolomide pharmacology", "", None),
            ])
            .await;
        let results = store.query_text("temozolomide dosing", 3, None).await.unwrap();
        let ids: Vec<&str> = results.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["both", "one", "none"]);
    }

    #[tokio::test]
    async fn results_bounded_by_top_k() {
        let store = InMemoryVectorStore::new();
        store
            .insert_all((0..10).map(|i| doc(&i.to_string(), "chunk", "", Some(vec![1.0]))))
            .await;
        let results = store.query_embedding(&[1.0], 4, None).await.unwrap();
        assert_eq!(results.len(), 4);
        assert_eq!(store.count().await.unwrap(), 10);
    }

    #[tokio::test]
    async fn equal_distances_keep_insertion_order() {
        let store = InMemoryVectorStore::new();
        store
            .insert_all([
                doc("first", "", "", Some(vec![1.0])),
                doc("second", "", "", Some(vec![1.0])),
                doc("third", "", "", Some(vec![1.0])),
            ])
            .await;
        let results = store.query_embedding(&[1.0], 3, None).await.unwrap();
        let ids: Vec<&str> = results.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn metadata_sample_respects_limit() {
        let store = InMemoryVectorStore::new();
        store
            .insert_all((0..5).map(|i| doc(&i.to_string(), "", "dosing", None)))
            .await;
        let sample = store.get_metadata(3).await.unwrap();
        assert_eq!(sample.len(), 3);
    }
}

//! Embedding provider capability for encoding query text.

use async_trait::async_trait;

use crate::error::Result;

/// An optional capability that encodes text into embedding vectors.
///
/// When no provider is configured the retriever degrades to the store's
/// text-query path; that degradation is not an error. The pipeline only
/// encodes one query at a time; corpus-side batch embedding belongs to the
/// ingestion tooling, which is out of scope here.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Encode a single text into an embedding vector.
    async fn encode(&self, text: &str) -> Result<Vec<f32>>;

    /// The fixed dimensionality of vectors produced by this provider.
    fn dimensions(&self) -> usize;
}

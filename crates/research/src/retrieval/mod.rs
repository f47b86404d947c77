//! Evidence retrieval adapters.
//!
//! Every adapter implements [`EvidenceRetriever`]. Callers go through
//! [`retrieve_guarded`], which applies the per-adapter deadline and turns
//! errors into an empty result so sibling retrievals keep running.

pub mod corpus;
pub mod searx;
pub mod web;

pub use corpus::{
    build_flat_index, load_corpus, CorpusCatalog, CorpusEntry, Embedder, FlatIndex, SimilarityIndex,
    VectorCorpusRetriever,
};
pub use searx::SearxSearch;
pub use web::{WebHit, WebRetriever, WebSearch};

use crate::types::{EvidenceItem, SourceKind};
use agrisearch_core::{AppError, AppResult};
use async_trait::async_trait;
use std::time::Duration;

/// A source of evidence items for a query.
#[async_trait]
pub trait EvidenceRetriever: Send + Sync {
    fn source_kind(&self) -> SourceKind;

    /// At most `k` items, best first.
    async fn retrieve(&self, query: &str, k: usize) -> AppResult<Vec<EvidenceItem>>;
}

/// Result of one guarded adapter call.
#[derive(Debug, Default)]
pub struct AdapterOutcome {
    pub items: Vec<EvidenceItem>,
    /// Set when the call failed or timed out
    pub error: Option<AppError>,
}

impl AdapterOutcome {
    pub fn timed_out(&self) -> bool {
        self.error.as_ref().is_some_and(AppError::is_timeout)
    }
}

/// Call an adapter under a deadline, absorbing any failure.
///
/// `k == 0` returns immediately without contacting the adapter.
pub async fn retrieve_guarded(
    retriever: &dyn EvidenceRetriever,
    query: &str,
    k: usize,
    deadline: Duration,
) -> AdapterOutcome {
    if k == 0 {
        return AdapterOutcome::default();
    }

    let source = retriever.source_kind();
    let result = match tokio::time::timeout(deadline, retriever.retrieve(query, k)).await {
        Ok(result) => result,
        Err(_) => Err(AppError::timeout(
            format!("{} retrieval", source.as_str()),
            deadline,
        )),
    };

    match result {
        Ok(mut items) => {
            items.truncate(k);
            AdapterOutcome { items, error: None }
        }
        Err(e) => {
            tracing::warn!(source = source.as_str(), error = %e, "Retrieval failed, continuing without it");
            AdapterOutcome {
                items: Vec::new(),
                error: Some(e),
            }
        }
    }
}

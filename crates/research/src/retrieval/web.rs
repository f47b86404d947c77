//! Web search retrieval.

use super::EvidenceRetriever;
use crate::types::{EvidenceItem, SourceKind, WebResult};
use agrisearch_core::AppResult;
use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One search engine hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebHit {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub snippet: String,
}

/// Web search and page fetch collaborator.
#[async_trait]
pub trait WebSearch: Send + Sync {
    /// Up to `k` hits, best first.
    async fn search(&self, query: &str, k: usize) -> AppResult<Vec<WebHit>>;

    /// Readable text of a page.
    async fn fetch(&self, url: &str) -> AppResult<String>;
}

/// Web adapter: search, then fetch every hit concurrently.
pub struct WebRetriever {
    search: Arc<dyn WebSearch>,
    fetch_content: bool,
}

impl WebRetriever {
    pub fn new(search: Arc<dyn WebSearch>) -> Self {
        Self {
            search,
            fetch_content: true,
        }
    }

    /// Use search snippets only, without fetching pages.
    pub fn snippets_only(mut self) -> Self {
        self.fetch_content = false;
        self
    }

    async fn hydrate(&self, rank: usize, hit: WebHit) -> EvidenceItem {
        let fetched = if self.fetch_content {
            match self.search.fetch(&hit.url).await {
                Ok(text) if !text.trim().is_empty() => Some(text),
                Ok(_) => {
                    tracing::debug!(url = %hit.url, "Fetched page was empty, using snippet");
                    None
                }
                Err(e) => {
                    tracing::debug!(url = %hit.url, error = %e, "Page fetch failed, using snippet");
                    None
                }
            }
        } else {
            None
        };

        let content_fetched = fetched.is_some();
        EvidenceItem::WebResult(WebResult {
            title: hit.title,
            text: fetched.unwrap_or_else(|| hit.snippet.clone()),
            locator: hit.url,
            snippet: hit.snippet,
            relevance_score: 1.0 / rank as f32,
            fetch_timestamp: Utc::now(),
            content_fetched,
        })
    }
}

#[async_trait]
impl EvidenceRetriever for WebRetriever {
    fn source_kind(&self) -> SourceKind {
        SourceKind::Web
    }

    async fn retrieve(&self, query: &str, k: usize) -> AppResult<Vec<EvidenceItem>> {
        let mut hits = self.search.search(query, k).await?;
        hits.truncate(k);

        // join_all preserves input order
        let items = join_all(
            hits.into_iter()
                .enumerate()
                .map(|(i, hit)| self.hydrate(i + 1, hit)),
        )
        .await;

        Ok(items)
    }
}

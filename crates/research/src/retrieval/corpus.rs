//! Vector corpus retrieval.

use super::EvidenceRetriever;
use crate::types::{DatabaseChunk, EvidenceItem, SourceKind};
use agrisearch_core::{AppError, AppResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Text to vector encoder.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn name(&self) -> &str;

    fn dimensions(&self) -> usize;

    async fn encode(&self, text: &str) -> AppResult<Vec<f32>>;
}

/// Nearest-neighbour search over stored vectors.
pub trait SimilarityIndex: Send + Sync {
    /// Up to `k` `(item_id, distance)` pairs, closest first.
    fn search(&self, vector: &[f32], k: usize) -> AppResult<Vec<(String, f32)>>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Exact squared-L2 scan over an in-memory vector list.
#[derive(Debug, Default)]
pub struct FlatIndex {
    dimensions: usize,
    ids: Vec<String>,
    vectors: Vec<Vec<f32>>,
}

impl FlatIndex {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            ids: Vec::new(),
            vectors: Vec::new(),
        }
    }

    pub fn insert(&mut self, id: impl Into<String>, vector: Vec<f32>) -> AppResult<()> {
        if vector.len() != self.dimensions {
            return Err(AppError::Retrieval(format!(
                "Vector has {} dimensions, index expects {}",
                vector.len(),
                self.dimensions
            )));
        }
        self.ids.push(id.into());
        self.vectors.push(vector);
        Ok(())
    }
}

impl SimilarityIndex for FlatIndex {
    fn search(&self, vector: &[f32], k: usize) -> AppResult<Vec<(String, f32)>> {
        if vector.len() != self.dimensions {
            return Err(AppError::Retrieval(format!(
                "Query vector has {} dimensions, index expects {}",
                vector.len(),
                self.dimensions
            )));
        }

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, stored)| (i, squared_l2(stored, vector)))
            .collect();

        // Stable sort keeps insertion order between equal distances
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(i, distance)| (self.ids[i].clone(), distance))
            .collect())
    }

    fn len(&self) -> usize {
        self.ids.len()
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// One line of a corpus JSONL file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusEntry {
    pub id: String,
    pub text: String,
    /// Source document path or URL
    pub source: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub source_domain: Option<String>,
    /// Precomputed embedding; encoded at load time when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl CorpusEntry {
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.source)
    }
}

/// Item metadata keyed by index id.
#[derive(Debug, Default)]
pub struct CorpusCatalog {
    entries: HashMap<String, CorpusEntry>,
}

impl CorpusCatalog {
    pub fn new(entries: impl IntoIterator<Item = CorpusEntry>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|mut e| {
                    // Vectors live in the index
                    e.embedding = None;
                    (e.id.clone(), e)
                })
                .collect(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&CorpusEntry> {
        self.entries.get(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Read corpus entries from a JSONL file. Blank lines are skipped.
pub fn load_corpus(path: &Path) -> AppResult<Vec<CorpusEntry>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        AppError::Retrieval(format!("Failed to read corpus at {:?}: {}", path, e))
    })?;

    let mut entries = Vec::new();
    for (line_no, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let entry: CorpusEntry = serde_json::from_str(line).map_err(|e| {
            AppError::Retrieval(format!(
                "Malformed corpus entry at {:?} line {}: {}",
                path,
                line_no + 1,
                e
            ))
        })?;
        entries.push(entry);
    }

    tracing::info!(entries = entries.len(), path = ?path, "Loaded corpus");
    Ok(entries)
}

/// Build a flat index from entries, encoding any without a stored vector.
pub async fn build_flat_index(
    entries: &[CorpusEntry],
    embedder: &dyn Embedder,
) -> AppResult<FlatIndex> {
    let mut index = FlatIndex::new(embedder.dimensions());
    let mut encoded = 0;

    for entry in entries {
        let vector = match &entry.embedding {
            Some(vector) => vector.clone(),
            None => {
                encoded += 1;
                embedder.encode(&entry.text).await?
            }
        };
        index.insert(entry.id.clone(), vector)?;
    }

    tracing::debug!(
        items = index.len(),
        encoded,
        embedder = embedder.name(),
        "Built flat similarity index"
    );
    Ok(index)
}

/// Corpus adapter: encode, search, then resolve ids against the catalog.
pub struct VectorCorpusRetriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn SimilarityIndex>,
    catalog: Arc<CorpusCatalog>,
}

impl VectorCorpusRetriever {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn SimilarityIndex>,
        catalog: Arc<CorpusCatalog>,
    ) -> Self {
        Self {
            embedder,
            index,
            catalog,
        }
    }

    fn to_evidence(&self, id: &str, distance: f32) -> Option<EvidenceItem> {
        let Some(entry) = self.catalog.get(id) else {
            tracing::debug!(id, "Index id missing from catalog, skipping");
            return None;
        };

        let similarity = 1.0 / (1.0 + distance);
        Some(EvidenceItem::DatabaseChunk(DatabaseChunk {
            title: entry.display_title().to_string(),
            locator: entry.source.clone(),
            text: entry.text.clone(),
            relevance_score: similarity,
            similarity_score: similarity,
            corpus_source_id: entry.id.clone(),
            source_domain: entry.source_domain.clone(),
        }))
    }
}

#[async_trait]
impl EvidenceRetriever for VectorCorpusRetriever {
    fn source_kind(&self) -> SourceKind {
        SourceKind::Database
    }

    async fn retrieve(&self, query: &str, k: usize) -> AppResult<Vec<EvidenceItem>> {
        if self.index.is_empty() {
            return Ok(Vec::new());
        }

        let vector = self.embedder.encode(query).await?;

        let index = Arc::clone(&self.index);
        let hits = tokio::task::spawn_blocking(move || index.search(&vector, k))
            .await
            .map_err(|e| AppError::Retrieval(format!("Similarity search task failed: {}", e)))??;

        Ok(hits
            .iter()
            .filter_map(|(id, distance)| self.to_evidence(id, *distance))
            .collect())
    }
}

//! Research pipeline type definitions.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

/// Where a query's text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryOrigin {
    Raw,
    Refined,
    Sub,
}

/// An immutable query string tagged with its origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Query {
    text: String,
    origin: QueryOrigin,
}

impl Query {
    pub fn new(text: impl Into<String>, origin: QueryOrigin) -> Self {
        Self {
            text: text.into(),
            origin,
        }
    }

    pub fn raw(text: impl Into<String>) -> Self {
        Self::new(text, QueryOrigin::Raw)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn origin(&self) -> QueryOrigin {
        self.origin
    }
}

/// One diversified rephrasing of the refined question, after routing.
#[derive(Debug, Clone, Serialize)]
pub struct SubQuery {
    /// 1-based position in canonical order
    pub index: usize,

    /// The refined query this was expanded from
    #[serde(skip)]
    pub parent: Arc<Query>,

    /// Sub-query text as produced by the expander
    pub text: String,

    /// Name of the specialization chosen by the router
    pub specialization_tag: String,

    /// Text actually sent to the retrievers
    pub enhanced_text: String,
}

/// Which collaborator an evidence item came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Database,
    Web,
}

impl SourceKind {
    /// Citation ID prefix for this source.
    pub fn citation_prefix(&self) -> &'static str {
        match self {
            Self::Database => "DB",
            Self::Web => "WEB",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Database => "database",
            Self::Web => "web",
        }
    }
}

/// A chunk retrieved from the vector corpus.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatabaseChunk {
    pub title: String,
    /// Source document path or URL recorded at indexing time
    pub locator: String,
    pub text: String,
    pub relevance_score: f32,
    /// `1 / (1 + distance)` from the similarity index
    pub similarity_score: f32,
    pub corpus_source_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_domain: Option<String>,
}

/// A page found by web search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WebResult {
    pub title: String,
    /// Page URL
    pub locator: String,
    /// Fetched page text, or the search snippet when fetching failed
    pub text: String,
    pub snippet: String,
    pub relevance_score: f32,
    pub fetch_timestamp: DateTime<Utc>,
    /// Whether `text` came from the fetched page rather than the snippet
    pub content_fetched: bool,
}

/// One retrieved unit of supporting text.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "source_kind", rename_all = "snake_case")]
pub enum EvidenceItem {
    #[serde(rename = "database")]
    DatabaseChunk(DatabaseChunk),
    #[serde(rename = "web")]
    WebResult(WebResult),
}

impl EvidenceItem {
    pub fn source_kind(&self) -> SourceKind {
        match self {
            Self::DatabaseChunk(_) => SourceKind::Database,
            Self::WebResult(_) => SourceKind::Web,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Self::DatabaseChunk(c) => &c.title,
            Self::WebResult(w) => &w.title,
        }
    }

    pub fn locator(&self) -> &str {
        match self {
            Self::DatabaseChunk(c) => &c.locator,
            Self::WebResult(w) => &w.locator,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Self::DatabaseChunk(c) => &c.text,
            Self::WebResult(w) => &w.text,
        }
    }

    pub fn relevance_score(&self) -> f32 {
        match self {
            Self::DatabaseChunk(c) => c.relevance_score,
            Self::WebResult(w) => w.relevance_score,
        }
    }
}

/// A recovered retrieval failure for one adapter call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalFailure {
    /// 1-based sub-query index
    pub subquery_index: usize,
    /// `None` when the whole task failed (panic or task deadline)
    pub source: Option<SourceKind>,
    pub reason: String,
    pub timed_out: bool,
}

/// The immutable result bundle returned by one retrieval task.
#[derive(Debug, Clone, Serialize)]
pub struct SubQueryEvidence {
    pub sub_query: SubQuery,
    /// Best-first, as returned by the corpus adapter
    pub database: Vec<EvidenceItem>,
    /// Best-first, as returned by the web adapter
    pub web: Vec<EvidenceItem>,
    pub failures: Vec<RetrievalFailure>,
}

impl SubQueryEvidence {
    /// An empty bundle for a sub-query whose task produced nothing.
    pub fn empty(sub_query: SubQuery) -> Self {
        Self {
            sub_query,
            database: Vec::new(),
            web: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn item_count(&self) -> usize {
        self.database.len() + self.web.len()
    }
}

/// A minted citation pointing at one evidence item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Citation {
    /// `DB-i-j` or `WEB-i-j`, both 1-based
    pub id: String,
    pub source_kind: SourceKind,
    pub subquery_index: usize,
    pub item_index: usize,
    pub title: String,
    pub locator: String,
}

/// Lifecycle states of one research run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineState {
    Configuring,
    Refining,
    Expanding,
    Retrieving,
    Aggregating,
    Synthesizing,
    Done,
    Failed,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Configuring => "CONFIGURING",
            Self::Refining => "REFINING",
            Self::Expanding => "EXPANDING",
            Self::Retrieving => "RETRIEVING",
            Self::Aggregating => "AGGREGATING",
            Self::Synthesizing => "SYNTHESIZING",
            Self::Done => "DONE",
            Self::Failed => "FAILED",
        }
    }
}

/// Wall-clock time spent per phase, in milliseconds.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PhaseTimings {
    pub refine_ms: u64,
    pub expand_ms: u64,
    pub retrieve_ms: u64,
    pub aggregate_ms: u64,
    pub synthesize_ms: u64,
    pub total_ms: u64,
}

/// Retrieval settings that were in force for a run.
#[derive(Debug, Clone, Serialize)]
pub struct ModeFlags {
    pub enable_db: bool,
    pub enable_web: bool,
    pub db_k: usize,
    pub web_k: usize,
    pub num_sub_queries_requested: usize,
    pub capacity_tier: String,
}

/// Everything a research run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub run_id: String,
    pub status: PipelineState,
    pub original_query: String,
    pub refined_query: String,
    pub sub_queries: Vec<SubQuery>,
    pub evidence_by_subquery: Vec<SubQueryEvidence>,
    pub citation_ledger: crate::ledger::CitationLedger,
    pub evidence_document: String,
    pub synthesized_answer: String,
    pub synthesis_degraded: bool,
    /// Citation IDs the model produced that are not in the ledger (stripped from the answer)
    pub unknown_citations: Vec<String>,
    pub failures: Vec<RetrievalFailure>,
    pub timings: PhaseTimings,
    pub mode_flags: ModeFlags,
    /// Where the evidence document was written, when a sink is configured
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_handle: Option<String>,
}

impl RunResult {
    pub fn total_database_items(&self) -> usize {
        self.evidence_by_subquery.iter().map(|e| e.database.len()).sum()
    }

    pub fn total_web_items(&self) -> usize {
        self.evidence_by_subquery.iter().map(|e| e.web.len()).sum()
    }
}

//! Scripted collaborator doubles for tests.

use crate::ledger::{assign_and_render, CitationLedger, ReportHeader};
use crate::retrieval::EvidenceRetriever;
use crate::types::{
    DatabaseChunk, EvidenceItem, Query, QueryOrigin, SourceKind, SubQuery, SubQueryEvidence,
    WebResult,
};
use agrisearch_core::{AppError, AppResult};
use agrisearch_llm::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use async_trait::async_trait;
use chrono::Utc;
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Responder = Arc<dyn Fn(&str) -> AppResult<String> + Send + Sync>;

fn responder(f: impl Fn(&str) -> AppResult<String> + Send + Sync + 'static) -> Responder {
    Arc::new(f)
}

/// Which prompt a completion request carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Refine,
    Expand,
    Synthesize,
}

impl CallKind {
    fn classify(prompt: &str) -> Self {
        if prompt.contains("Refined query:") {
            Self::Refine
        } else if prompt.contains("one per line, numbered") {
            Self::Expand
        } else {
            Self::Synthesize
        }
    }
}

/// A recorded completion request.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub kind: CallKind,
    pub request: LlmRequest,
}

/// Text-completion double that answers per prompt kind.
pub struct ScriptedLlm {
    refine: Responder,
    expand: Responder,
    synthesize: Responder,
    delay: Option<Duration>,
    synthesis_delay: Option<Duration>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedLlm {
    /// Refine echoes the query, expand fails, synthesize gives a plain answer.
    pub fn new() -> Self {
        Self {
            refine: responder(|prompt| Ok(original_query_line(prompt))),
            expand: responder(|_| Err(AppError::Llm("no expansion scripted".to_string()))),
            synthesize: responder(|_| Ok("Answer drawn from the research report.".to_string())),
            delay: None,
            synthesis_delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn on_refine(mut self, f: impl Fn(&str) -> AppResult<String> + Send + Sync + 'static) -> Self {
        self.refine = responder(f);
        self
    }

    pub fn on_expand(mut self, f: impl Fn(&str) -> AppResult<String> + Send + Sync + 'static) -> Self {
        self.expand = responder(f);
        self
    }

    pub fn on_synthesize(
        mut self,
        f: impl Fn(&str) -> AppResult<String> + Send + Sync + 'static,
    ) -> Self {
        self.synthesize = responder(f);
        self
    }

    pub fn failing_refine(self) -> Self {
        self.on_refine(|_| Err(AppError::Llm("refiner unavailable".to_string())))
    }

    pub fn failing_expand(self) -> Self {
        self.on_expand(|_| Err(AppError::Llm("expander unavailable".to_string())))
    }

    /// Delay every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Delay synthesis calls only.
    pub fn with_synthesis_delay(mut self, delay: Duration) -> Self {
        self.synthesis_delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, kind: CallKind) -> usize {
        self.calls().iter().filter(|c| c.kind == kind).count()
    }
}

fn original_query_line(prompt: &str) -> String {
    prompt
        .lines()
        .find_map(|l| l.strip_prefix("Original query: "))
        .unwrap_or_default()
        .to_string()
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        let kind = CallKind::classify(&request.prompt);
        self.calls.lock().unwrap().push(RecordedCall {
            kind,
            request: request.clone(),
        });

        let delay = match kind {
            CallKind::Synthesize => self.synthesis_delay.or(self.delay),
            _ => self.delay,
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let responder = match kind {
            CallKind::Refine => &self.refine,
            CallKind::Expand => &self.expand,
            CallKind::Synthesize => &self.synthesize,
        };

        Ok(LlmResponse {
            content: responder(&request.prompt)?,
            model: request.model.clone(),
            usage: LlmUsage::default(),
            done: true,
        })
    }

    async fn list_models(&self) -> AppResult<Vec<String>> {
        Ok(vec!["scripted".to_string()])
    }
}

type AsyncResponder =
    Arc<dyn Fn(String, usize) -> BoxFuture<'static, AppResult<Vec<EvidenceItem>>> + Send + Sync>;
type DelayFn = Arc<dyn Fn(&str) -> Duration + Send + Sync>;

/// Evidence retriever double with optional delays and call recording.
pub struct MockRetriever {
    kind: SourceKind,
    responder: AsyncResponder,
    delay: DelayFn,
    calls: AtomicUsize,
    queries: Mutex<Vec<String>>,
}

impl MockRetriever {
    fn with_responder(kind: SourceKind, responder: AsyncResponder) -> Self {
        Self {
            kind,
            responder,
            delay: Arc::new(|_: &str| Duration::ZERO),
            calls: AtomicUsize::new(0),
            queries: Mutex::new(Vec::new()),
        }
    }

    fn sync<F>(kind: SourceKind, f: F) -> Self
    where
        F: Fn(&str, usize) -> AppResult<Vec<EvidenceItem>> + Send + Sync + 'static,
    {
        Self::with_responder(
            kind,
            Arc::new(
                move |query: String, k: usize| -> BoxFuture<'static, AppResult<Vec<EvidenceItem>>> {
                    let result = f(&query, k);
                    Box::pin(async move { result })
                },
            ),
        )
    }

    pub fn database<F>(f: F) -> Self
    where
        F: Fn(&str, usize) -> AppResult<Vec<EvidenceItem>> + Send + Sync + 'static,
    {
        Self::sync(SourceKind::Database, f)
    }

    pub fn web<F>(f: F) -> Self
    where
        F: Fn(&str, usize) -> AppResult<Vec<EvidenceItem>> + Send + Sync + 'static,
    {
        Self::sync(SourceKind::Web, f)
    }

    pub fn database_async<F, Fut>(f: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<Vec<EvidenceItem>>> + Send + 'static,
    {
        Self::with_responder(
            SourceKind::Database,
            Arc::new(
                move |query: String, _k: usize| -> BoxFuture<'static, AppResult<Vec<EvidenceItem>>> {
                    Box::pin(f(query))
                },
            ),
        )
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Arc::new(move |_: &str| delay);
        self
    }

    pub fn with_delay_fn(mut self, f: impl Fn(&str) -> Duration + Send + Sync + 'static) -> Self {
        self.delay = Arc::new(f);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl EvidenceRetriever for MockRetriever {
    fn source_kind(&self) -> SourceKind {
        self.kind
    }

    async fn retrieve(&self, query: &str, k: usize) -> AppResult<Vec<EvidenceItem>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().unwrap().push(query.to_string());

        let delay = (self.delay)(query);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        (self.responder)(query.to_string(), k).await
    }
}

pub fn db_item(title: &str) -> EvidenceItem {
    EvidenceItem::DatabaseChunk(DatabaseChunk {
        title: title.to_string(),
        locator: format!("corpus/{}.txt", title.len()),
        text: format!("Corpus passage about {}", title),
        relevance_score: 0.5,
        similarity_score: 0.5,
        corpus_source_id: format!("chunk-{}", title.len()),
        source_domain: None,
    })
}

pub fn web_item(title: &str) -> EvidenceItem {
    EvidenceItem::WebResult(WebResult {
        title: title.to_string(),
        locator: format!("https://extension.example/{}", title.len()),
        text: format!("Web page about {}", title),
        snippet: format!("Snippet about {}", title),
        relevance_score: 1.0,
        fetch_timestamp: Utc::now(),
        content_fetched: true,
    })
}

/// A retrieval bundle for sub-query `index`.
pub fn evidence(
    index: usize,
    text: &str,
    database: Vec<EvidenceItem>,
    web: Vec<EvidenceItem>,
) -> SubQueryEvidence {
    SubQueryEvidence {
        sub_query: SubQuery {
            index,
            parent: Arc::new(Query::new("refined question", QueryOrigin::Refined)),
            text: text.to_string(),
            specialization_tag: "crop_specialist".to_string(),
            enhanced_text: text.to_string(),
        },
        database,
        web,
        failures: Vec::new(),
    }
}

/// A ledger holding `DB-1-1` through `DB-1-n`.
pub fn ledger_with_db_items(n: usize) -> CitationLedger {
    let items = (1..=n).map(|j| db_item(&format!("item {}", j))).collect();
    let header = ReportHeader {
        original_query: "q",
        refined_query: "q",
        generated_at: Utc::now(),
    };
    assign_and_render(&[evidence(1, "q", items, Vec::new())], &header).0
}

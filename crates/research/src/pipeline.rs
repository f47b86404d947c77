//! The research run orchestrator.
//!
//! CONFIGURING → REFINING → EXPANDING → RETRIEVING → AGGREGATING →
//! SYNTHESIZING → DONE. Only a configuration error stops a run; every
//! later failure is absorbed as an empty or degraded value.

use crate::config::ResearchConfig;
use crate::expander::SubQueryExpander;
use crate::ledger::{assign_and_render, strip_unknown_citations, ReportHeader};
use crate::refiner::QueryRefiner;
use crate::retrieval::EvidenceRetriever;
use crate::router::SpecializationRegistry;
use crate::scheduler::{FanOutScheduler, SourcePlan};
use crate::sink::EvidenceSink;
use crate::synthesizer::{degraded, AnswerSynthesizer, CapacityTier};
use crate::types::{
    ModeFlags, PhaseTimings, PipelineState, Query, QueryOrigin, RunResult, SourceKind,
};
use agrisearch_core::{AppError, AppResult};
use agrisearch_llm::LlmClient;
use agrisearch_prompt::PromptLibrary;
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

/// Shared, read-only collaborators for research runs.
///
/// Cheap to share: concurrent runs only read these handles.
pub struct ResearchPipeline {
    llm: Arc<dyn LlmClient>,
    prompts: Arc<PromptLibrary>,
    router: Arc<SpecializationRegistry>,
    database: Option<Arc<dyn EvidenceRetriever>>,
    web: Option<Arc<dyn EvidenceRetriever>>,
    sink: Option<Arc<dyn EvidenceSink>>,
}

impl ResearchPipeline {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        prompts: Arc<PromptLibrary>,
        router: Arc<SpecializationRegistry>,
    ) -> Self {
        Self {
            llm,
            prompts,
            router,
            database: None,
            web: None,
            sink: None,
        }
    }

    pub fn with_database(mut self, retriever: Arc<dyn EvidenceRetriever>) -> Self {
        self.database = Some(retriever);
        self
    }

    pub fn with_web(mut self, retriever: Arc<dyn EvidenceRetriever>) -> Self {
        self.web = Some(retriever);
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn EvidenceSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn router(&self) -> &SpecializationRegistry {
        &self.router
    }

    /// Answer one question.
    ///
    /// Only the per-run fields of `config` apply here: source toggles and
    /// `k` values, sub-query count, worker and timeout limits, model names,
    /// capacity hint and evidence size ceiling. The router, corpus, web
    /// endpoint, embedder and report sink were fixed when the pipeline was
    /// built, so `specializations`, `corpus_path`, `web_search_url`,
    /// `embedding_*`, `fetch_web_content`, `max_page_chars`, `report_dir` and
    /// `save_reports` are ignored.
    ///
    /// Returns `AppError::Config` before contacting any collaborator when
    /// the configuration cannot produce a run. Otherwise always returns a
    /// populated result.
    pub async fn run(&self, user_query: &str, config: &ResearchConfig) -> AppResult<RunResult> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let span = tracing::info_span!("research_run", run_id = %run_id);

        self.run_inner(run_id, user_query, config)
            .instrument(span)
            .await
    }

    async fn run_inner(
        &self,
        run_id: String,
        user_query: &str,
        config: &ResearchConfig,
    ) -> AppResult<RunResult> {
        let started = Instant::now();
        let mut timings = PhaseTimings::default();

        enter(PipelineState::Configuring);
        let sources = match self.plan_sources(user_query, config) {
            Ok(sources) => sources,
            Err(e) => {
                tracing::error!(state = PipelineState::Failed.as_str(), error = %e, "Research run rejected");
                return Err(e);
            }
        };
        let tier = CapacityTier::from_hint(config.capacity_hint());
        let mode_flags = ModeFlags {
            enable_db: sources.iter().any(|s| s.retriever.source_kind() == SourceKind::Database),
            enable_web: sources.iter().any(|s| s.retriever.source_kind() == SourceKind::Web),
            db_k: config.db_k,
            web_k: config.web_k,
            num_sub_queries_requested: config.num_sub_queries,
            capacity_tier: tier.as_str().to_string(),
        };

        enter(PipelineState::Refining);
        let phase = Instant::now();
        let refiner = QueryRefiner::new(
            Arc::clone(&self.llm),
            Arc::clone(&self.prompts),
            config.refine_model.as_str(),
            config.planning_timeout(),
        );
        let refined = Arc::new(Query::new(
            refiner.refine(user_query).await,
            QueryOrigin::Refined,
        ));
        timings.refine_ms = elapsed_ms(phase);

        enter(PipelineState::Expanding);
        let phase = Instant::now();
        let expander = SubQueryExpander::new(
            Arc::clone(&self.llm),
            Arc::clone(&self.prompts),
            config.expand_model.as_str(),
            config.planning_timeout(),
        );
        let sub_query_texts = expander
            .expand(refined.text(), config.num_sub_queries)
            .await;
        timings.expand_ms = elapsed_ms(phase);
        tracing::info!(count = sub_query_texts.len(), "Expanded into sub-queries");

        enter(PipelineState::Retrieving);
        let phase = Instant::now();
        let scheduler = FanOutScheduler::new(config.max_workers, config.task_timeout());
        let evidence = scheduler
            .dispatch(
                Arc::clone(&refined),
                &sub_query_texts,
                Arc::clone(&self.router),
                Arc::new(sources),
            )
            .await;
        timings.retrieve_ms = elapsed_ms(phase);

        enter(PipelineState::Aggregating);
        let phase = Instant::now();
        let header = ReportHeader {
            original_query: user_query,
            refined_query: refined.text(),
            generated_at: Utc::now(),
        };
        let (ledger, evidence_document) = assign_and_render(&evidence, &header);
        let failures: Vec<_> = evidence
            .iter()
            .flat_map(|e| e.failures.iter().cloned())
            .collect();
        timings.aggregate_ms = elapsed_ms(phase);
        tracing::info!(
            citations = ledger.len(),
            failures = failures.len(),
            "Aggregated evidence"
        );

        enter(PipelineState::Synthesizing);
        let phase = Instant::now();
        let synthesizer = AnswerSynthesizer::new(
            Arc::clone(&self.llm),
            Arc::clone(&self.prompts),
            config.synthesis_model.as_str(),
            tier,
            config.max_evidence_document_size,
        );
        let outcome = synthesizer
            .synthesize(user_query, &evidence_document, &ledger)
            .await;
        let mut synthesis_degraded = outcome.is_degraded();
        let (mut synthesized_answer, unknown_citations) =
            strip_unknown_citations(outcome.answer(), &ledger);
        if !unknown_citations.is_empty() {
            tracing::warn!(unknown = ?unknown_citations, "Removed citations not in the ledger");
        }
        if synthesized_answer.trim().is_empty() {
            tracing::warn!("Answer cited only unknown sources, falling back to the evidence");
            let fallback = degraded(
                user_query,
                &evidence_document,
                "answer cited only unknown sources",
            );
            synthesized_answer = fallback.answer().to_string();
            synthesis_degraded = true;
        }
        timings.synthesize_ms = elapsed_ms(phase);

        let document_handle = match &self.sink {
            Some(sink) => match sink.write(&run_id, &evidence_document).await {
                Ok(handle) => Some(handle),
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to save evidence document");
                    None
                }
            },
            None => None,
        };

        timings.total_ms = elapsed_ms(started);
        enter(PipelineState::Done);
        tracing::info!(
            total_ms = timings.total_ms,
            degraded = synthesis_degraded,
            "Research run complete"
        );

        Ok(RunResult {
            run_id,
            status: PipelineState::Done,
            original_query: user_query.to_string(),
            refined_query: refined.text().to_string(),
            sub_queries: evidence.iter().map(|e| e.sub_query.clone()).collect(),
            evidence_by_subquery: evidence,
            citation_ledger: ledger,
            evidence_document,
            synthesized_answer,
            synthesis_degraded,
            unknown_citations,
            failures,
            timings,
            mode_flags,
            document_handle,
        })
    }

    /// Validate and build the list of enabled, available sources.
    fn plan_sources(&self, user_query: &str, config: &ResearchConfig) -> AppResult<Vec<SourcePlan>> {
        config.validate()?;

        if user_query.trim().is_empty() {
            return Err(AppError::Config("Query cannot be empty".to_string()));
        }

        let mut sources = Vec::new();

        if config.enable_db {
            match &self.database {
                Some(retriever) => sources.push(SourcePlan {
                    retriever: Arc::clone(retriever),
                    k: config.db_k,
                    timeout: config.db_timeout(),
                }),
                None => tracing::warn!("Database retrieval enabled but no corpus is configured"),
            }
        }

        if config.enable_web {
            match &self.web {
                Some(retriever) => sources.push(SourcePlan {
                    retriever: Arc::clone(retriever),
                    k: config.web_k,
                    timeout: config.web_timeout(),
                }),
                None => tracing::warn!("Web retrieval enabled but no search endpoint is configured"),
            }
        }

        if sources.is_empty() {
            return Err(AppError::Config(
                "No enabled retrieval mode has a configured source".to_string(),
            ));
        }

        Ok(sources)
    }
}

fn enter(state: PipelineState) {
    tracing::info!(state = state.as_str(), "Pipeline state");
}

fn elapsed_ms(since: Instant) -> u64 {
    since.elapsed().as_millis() as u64
}

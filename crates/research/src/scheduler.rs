//! Bounded concurrent retrieval, one task per sub-query.

use crate::retrieval::{retrieve_guarded, EvidenceRetriever};
use crate::router::SpecializationRegistry;
use crate::types::{
    EvidenceItem, Query, RetrievalFailure, SourceKind, SubQuery, SubQueryEvidence,
};
use futures::future::join_all;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// One enabled retrieval source with its result count and deadline.
#[derive(Clone)]
pub struct SourcePlan {
    pub retriever: Arc<dyn EvidenceRetriever>,
    pub k: usize,
    pub timeout: Duration,
}

/// Runs sub-query retrieval on a bounded pool and joins on all of it.
#[derive(Debug, Clone)]
pub struct FanOutScheduler {
    max_workers: usize,
    task_timeout: Duration,
}

impl FanOutScheduler {
    pub fn new(max_workers: usize, task_timeout: Duration) -> Self {
        Self {
            max_workers: max_workers.max(1),
            task_timeout,
        }
    }

    /// Route and retrieve every sub-query.
    ///
    /// Returns one bundle per sub-query in canonical (index) order, whatever
    /// order the tasks completed in. A failed, panicked or expired task
    /// contributes an empty bundle.
    pub async fn dispatch(
        &self,
        parent: Arc<Query>,
        sub_queries: &[String],
        router: Arc<SpecializationRegistry>,
        sources: Arc<Vec<SourcePlan>>,
    ) -> Vec<SubQueryEvidence> {
        let semaphore = Arc::new(Semaphore::new(self.max_workers));
        let mut tasks = JoinSet::new();

        for (position, text) in sub_queries.iter().enumerate() {
            let index = position + 1;
            let text = text.clone();
            let parent = Arc::clone(&parent);
            let router = Arc::clone(&router);
            let sources = Arc::clone(&sources);
            let semaphore = Arc::clone(&semaphore);
            let task_timeout = self.task_timeout;

            tasks.spawn(async move {
                let sub_query = route(index, &text, parent, &router);

                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return (index, failed(sub_query, "worker pool closed", false));
                };

                tracing::debug!(index, tag = %sub_query.specialization_tag, "Retrieval task started");

                let work = AssertUnwindSafe(retrieve_for(&sub_query, &sources)).catch_unwind();
                let outcome = tokio::time::timeout(task_timeout, work).await;
                let evidence = match outcome {
                    Ok(Ok((database, web, failures))) => SubQueryEvidence {
                        sub_query,
                        database,
                        web,
                        failures,
                    },
                    Ok(Err(_)) => {
                        tracing::warn!(index, "Retrieval task panicked, using empty evidence");
                        failed(sub_query, "retrieval task panicked", false)
                    }
                    Err(_) => {
                        tracing::warn!(
                            index,
                            timeout_secs = task_timeout.as_secs(),
                            "Retrieval task timed out, using empty evidence"
                        );
                        failed(
                            sub_query,
                            &format!("retrieval task timed out after {}s", task_timeout.as_secs()),
                            true,
                        )
                    }
                };

                (index, evidence)
            });
        }

        // Barrier: collect every task into its canonical slot
        let mut slots: Vec<Option<SubQueryEvidence>> = vec![None; sub_queries.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, evidence)) => {
                    tracing::debug!(index, items = evidence.item_count(), "Retrieval task finished");
                    slots[index - 1] = Some(evidence);
                }
                Err(e) => tracing::warn!(error = %e, "Retrieval task did not complete"),
            }
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(position, slot)| {
                slot.unwrap_or_else(|| {
                    let index = position + 1;
                    let sub_query = route(index, &sub_queries[position], Arc::clone(&parent), &router);
                    failed(sub_query, "retrieval task did not complete", false)
                })
            })
            .collect()
    }
}

fn route(index: usize, text: &str, parent: Arc<Query>, router: &SpecializationRegistry) -> SubQuery {
    let route = router.route(text);
    SubQuery {
        index,
        parent,
        text: text.to_string(),
        specialization_tag: route.tag,
        enhanced_text: route.enhanced_query,
    }
}

fn failed(sub_query: SubQuery, reason: &str, timed_out: bool) -> SubQueryEvidence {
    let subquery_index = sub_query.index;
    let mut evidence = SubQueryEvidence::empty(sub_query);
    evidence.failures.push(RetrievalFailure {
        subquery_index,
        source: None,
        reason: reason.to_string(),
        timed_out,
    });
    evidence
}

type TaskOutput = (Vec<EvidenceItem>, Vec<EvidenceItem>, Vec<RetrievalFailure>);

/// Call every enabled source concurrently for one sub-query.
async fn retrieve_for(sub_query: &SubQuery, sources: &[SourcePlan]) -> TaskOutput {
    let outcomes = join_all(sources.iter().map(|plan| async move {
        let outcome = retrieve_guarded(
            plan.retriever.as_ref(),
            &sub_query.enhanced_text,
            plan.k,
            plan.timeout,
        )
        .await;
        (plan.retriever.source_kind(), outcome)
    }))
    .await;

    let mut database = Vec::new();
    let mut web = Vec::new();
    let mut failures = Vec::new();

    for (source, outcome) in outcomes {
        if let Some(error) = &outcome.error {
            failures.push(RetrievalFailure {
                subquery_index: sub_query.index,
                source: Some(source),
                reason: error.to_string(),
                timed_out: outcome.timed_out(),
            });
        }

        match source {
            SourceKind::Database => database.extend(outcome.items),
            SourceKind::Web => web.extend(outcome.items),
        }
    }

    (database, web, failures)
}

//! End-to-end tests of research runs against scripted collaborators.

mod pipeline;

use crate::config::ResearchConfig;
use crate::pipeline::ResearchPipeline;
use crate::router::SpecializationRegistry;
use crate::testing::{MockRetriever, ScriptedLlm};
use agrisearch_prompt::PromptLibrary;
use std::sync::Arc;

const RAW_QUERY: &str = "why are my tomato leaves curling";

fn build(
    llm: &Arc<ScriptedLlm>,
    database: Option<&Arc<MockRetriever>>,
    web: Option<&Arc<MockRetriever>>,
) -> ResearchPipeline {
    let mut pipeline = ResearchPipeline::new(
        llm.clone(),
        Arc::new(PromptLibrary::builtin()),
        Arc::new(SpecializationRegistry::agricultural()),
    );
    if let Some(database) = database {
        pipeline = pipeline.with_database(database.clone());
    }
    if let Some(web) = web {
        pipeline = pipeline.with_web(web.clone());
    }
    pipeline
}

fn config() -> ResearchConfig {
    ResearchConfig {
        num_sub_queries: 3,
        db_k: 1,
        web_k: 1,
        synthesis_capacity_hint: Some("small".to_string()),
        ..Default::default()
    }
}

/// Expansion output listing `items` as a numbered list.
fn numbered(items: &[&str]) -> String {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| format!("{}. {}", i + 1, item))
        .collect::<Vec<_>>()
        .join("\n")
}

//! Run-level behavior: planning fallbacks, configuration errors and
//! failure isolation.

use super::{build, config, numbered, RAW_QUERY};
use crate::config::{ResearchConfig, SpecializationProfile, SpecializationSettings};
use crate::sink::FileSink;
use crate::synthesizer::DEGRADED_MARKER;
use crate::testing::{db_item, web_item, CallKind, MockRetriever, ScriptedLlm};
use crate::types::{PipelineState, SourceKind};
use agrisearch_core::AppError;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_refiner_unavailable_keeps_raw_query() {
    let llm = Arc::new(ScriptedLlm::new().failing_refine());
    let db = Arc::new(MockRetriever::database(|q, _| Ok(vec![db_item(q)])));
    let pipeline = build(&llm, Some(&db), None);

    let cfg = ResearchConfig {
        enable_web: false,
        ..config()
    };
    let result = pipeline.run(RAW_QUERY, &cfg).await.unwrap();

    assert_eq!(result.status, PipelineState::Done);
    assert_eq!(result.refined_query, RAW_QUERY);
    // Expansion is unscripted, so the refined query is the only sub-query
    assert_eq!(result.sub_queries.len(), 1);
    assert_eq!(result.sub_queries[0].text, RAW_QUERY);
    assert_eq!(db.calls(), 1);
}

#[tokio::test]
async fn test_single_usable_expansion_line() {
    let llm = Arc::new(ScriptedLlm::new().on_expand(|_| {
        Ok("Here are the sub-queries:\n1. How does nitrogen rate affect maize yield?\n2. ok\n"
            .to_string())
    }));
    let db = Arc::new(MockRetriever::database(|q, _| Ok(vec![db_item(q)])));
    let pipeline = build(&llm, Some(&db), None);

    let cfg = ResearchConfig {
        enable_web: false,
        ..config()
    };
    let result = pipeline.run(RAW_QUERY, &cfg).await.unwrap();

    assert_eq!(result.sub_queries.len(), 1);
    assert_eq!(
        result.sub_queries[0].text,
        "How does nitrogen rate affect maize yield?"
    );
    assert_eq!(result.evidence_by_subquery.len(), 1);
}

#[tokio::test]
async fn test_expansion_failure_degrades_to_refined_query() {
    let llm = Arc::new(
        ScriptedLlm::new()
            .on_refine(|_| Ok("Causes of leaf curl in greenhouse tomatoes".to_string()))
            .failing_expand(),
    );
    let db = Arc::new(MockRetriever::database(|q, _| Ok(vec![db_item(q)])));
    let pipeline = build(&llm, Some(&db), None);

    let cfg = ResearchConfig {
        enable_web: false,
        ..config()
    };
    let result = pipeline.run(RAW_QUERY, &cfg).await.unwrap();

    assert_eq!(result.refined_query, "Causes of leaf curl in greenhouse tomatoes");
    assert_eq!(result.sub_queries.len(), 1);
    assert_eq!(result.sub_queries[0].text, result.refined_query);
    assert_eq!(result.sub_queries[0].index, 1);
    assert!(!result.citation_ledger.is_empty());
}

#[tokio::test]
async fn test_both_modes_disabled_is_rejected_before_any_call() {
    let llm = Arc::new(ScriptedLlm::new());
    let db = Arc::new(MockRetriever::database(|q, _| Ok(vec![db_item(q)])));
    let web = Arc::new(MockRetriever::web(|q, _| Ok(vec![web_item(q)])));
    let pipeline = build(&llm, Some(&db), Some(&web));

    let cfg = ResearchConfig {
        enable_db: false,
        enable_web: false,
        ..config()
    };
    let err = pipeline.run(RAW_QUERY, &cfg).await.unwrap_err();

    assert!(matches!(err, AppError::Config(_)));
    assert!(llm.calls().is_empty());
    assert_eq!(db.calls(), 0);
    assert_eq!(web.calls(), 0);
}

#[tokio::test]
async fn test_empty_query_is_rejected() {
    let llm = Arc::new(ScriptedLlm::new());
    let db = Arc::new(MockRetriever::database(|q, _| Ok(vec![db_item(q)])));
    let pipeline = build(&llm, Some(&db), None);

    let err = pipeline.run("   ", &config()).await.unwrap_err();

    assert!(matches!(err, AppError::Config(_)));
    assert!(llm.calls().is_empty());
}

#[tokio::test]
async fn test_enabled_mode_without_source_is_skipped() {
    let llm = Arc::new(ScriptedLlm::new());
    let db = Arc::new(MockRetriever::database(|q, _| Ok(vec![db_item(q)])));
    let pipeline = build(&llm, Some(&db), None);

    // Web is enabled in the config but no web retriever is wired
    let result = pipeline.run(RAW_QUERY, &config()).await.unwrap();

    assert!(result.mode_flags.enable_db);
    assert!(!result.mode_flags.enable_web);
    assert_eq!(result.total_web_items(), 0);
    assert_eq!(result.total_database_items(), 1);
}

#[tokio::test]
async fn test_no_wired_source_is_config_error() {
    let llm = Arc::new(ScriptedLlm::new());
    let pipeline = build(&llm, None, None);

    let err = pipeline.run(RAW_QUERY, &config()).await.unwrap_err();
    assert!(matches!(err, AppError::Config(_)));
}

#[tokio::test]
async fn test_disabled_web_is_never_called() {
    let llm = Arc::new(ScriptedLlm::new());
    let db = Arc::new(MockRetriever::database(|q, _| Ok(vec![db_item(q)])));
    let web = Arc::new(MockRetriever::web(|q, _| Ok(vec![web_item(q)])));
    let pipeline = build(&llm, Some(&db), Some(&web));

    let cfg = ResearchConfig {
        enable_web: false,
        ..config()
    };
    let result = pipeline.run(RAW_QUERY, &cfg).await.unwrap();

    assert_eq!(web.calls(), 0);
    assert!(!result.mode_flags.enable_web);
    assert!(result.citation_ledger.ids().iter().all(|id| id.starts_with("DB-")));
}

#[tokio::test]
async fn test_failed_source_on_one_sub_query_is_isolated() {
    let llm = Arc::new(ScriptedLlm::new().on_expand(|_| {
        Ok(numbered(&[
            "Which tomato varieties resist leaf curl virus?",
            "How does drought stress cause tomato leaf curl?",
            "Which whitefly controls limit leaf curl spread?",
        ]))
    }));
    let db = Arc::new(MockRetriever::database(|q, _| {
        if q.starts_with("How does drought") {
            Err(AppError::Retrieval("corpus offline".to_string()))
        } else {
            Ok(vec![db_item(q)])
        }
    }));
    let web = Arc::new(MockRetriever::web(|q, _| Ok(vec![web_item(q)])));
    let pipeline = build(&llm, Some(&db), Some(&web));

    let result = pipeline.run(RAW_QUERY, &config()).await.unwrap();

    assert_eq!(result.sub_queries.len(), 3);
    assert_eq!(
        result.citation_ledger.ids(),
        vec!["DB-1-1", "WEB-1-1", "WEB-2-1", "DB-3-1", "WEB-3-1"]
    );
    assert_eq!(result.failures.len(), 1);
    assert_eq!(result.failures[0].subquery_index, 2);
    assert_eq!(result.failures[0].source, Some(SourceKind::Database));
    assert!(!result.failures[0].timed_out);
}

#[tokio::test]
async fn test_panicking_task_yields_empty_bundle() {
    let llm = Arc::new(ScriptedLlm::new().on_expand(|_| {
        Ok(numbered(&[
            "Which tomato varieties resist leaf curl virus?",
            "How does drought stress cause tomato leaf curl?",
            "Which whitefly controls limit leaf curl spread?",
        ]))
    }));
    let db = Arc::new(MockRetriever::database(|q, _| {
        if q.starts_with("How does drought") {
            panic!("corpus index corrupted");
        }
        Ok(vec![db_item(q)])
    }));
    let pipeline = build(&llm, Some(&db), None);

    let cfg = ResearchConfig {
        enable_web: false,
        ..config()
    };
    let result = pipeline.run(RAW_QUERY, &cfg).await.unwrap();

    assert_eq!(result.evidence_by_subquery.len(), 3);
    assert_eq!(result.evidence_by_subquery[1].item_count(), 0);
    assert_eq!(result.citation_ledger.ids(), vec!["DB-1-1", "DB-3-1"]);
    assert_eq!(result.failures.len(), 1);
    assert_eq!(result.failures[0].subquery_index, 2);
    assert_eq!(result.failures[0].source, None);
}

#[tokio::test(start_paused = true)]
async fn test_synthesis_timeout_returns_degraded_answer() {
    let llm = Arc::new(
        ScriptedLlm::new()
            .on_synthesize(|_| Ok("too late".to_string()))
            .with_synthesis_delay(Duration::from_secs(301)),
    );
    let db = Arc::new(MockRetriever::database(|q, _| Ok(vec![db_item(q)])));
    let pipeline = build(&llm, Some(&db), None);

    let cfg = ResearchConfig {
        enable_web: false,
        synthesis_capacity_hint: Some("large".to_string()),
        ..config()
    };
    let result = pipeline.run(RAW_QUERY, &cfg).await.unwrap();

    assert_eq!(result.status, PipelineState::Done);
    assert!(result.synthesis_degraded);
    assert!(result.synthesized_answer.starts_with(DEGRADED_MARKER));
    assert!(!result.evidence_document.is_empty());
    assert!(result.evidence_document.contains("[DB-1-1]"));
    assert_eq!(result.mode_flags.capacity_tier, "large");
}

#[tokio::test]
async fn test_synthesis_request_uses_tier_context_window() {
    let llm = Arc::new(ScriptedLlm::new());
    let db = Arc::new(MockRetriever::database(|q, _| Ok(vec![db_item(q)])));
    let pipeline = build(&llm, Some(&db), None);

    let cfg = ResearchConfig {
        enable_web: false,
        synthesis_capacity_hint: Some("gemma3:27b".to_string()),
        ..config()
    };
    pipeline.run(RAW_QUERY, &cfg).await.unwrap();

    let calls = llm.calls();
    let synthesis = calls
        .iter()
        .find(|c| c.kind == CallKind::Synthesize)
        .unwrap();
    assert_eq!(synthesis.request.context_window, Some(8192));
    assert!(synthesis.request.prompt.contains("Only these IDs exist: DB-1-1"));
    assert_eq!(llm.count(CallKind::Refine), 1);
    assert_eq!(llm.count(CallKind::Expand), 1);
}

#[tokio::test]
async fn test_routing_matches_registry() {
    let llm = Arc::new(ScriptedLlm::new().on_expand(|_| {
        Ok(numbered(&[
            "Which fertilizers correct low soil pH?",
            "Which biological control agents suppress whitefly pests?",
        ]))
    }));
    let db = Arc::new(MockRetriever::database(|q, _| Ok(vec![db_item(q)])));
    let pipeline = build(&llm, Some(&db), None);

    let cfg = ResearchConfig {
        enable_web: false,
        ..config()
    };
    let result = pipeline.run(RAW_QUERY, &cfg).await.unwrap();

    let tags: Vec<_> = result
        .sub_queries
        .iter()
        .map(|s| s.specialization_tag.as_str())
        .collect();
    assert_eq!(tags, vec!["soil_expert", "pest_manager"]);

    for sub_query in &result.sub_queries {
        let route = pipeline.router().route(&sub_query.text);
        assert_eq!(route, pipeline.router().route(&sub_query.text));
        assert_eq!(route.tag, sub_query.specialization_tag);
        assert_eq!(route.enhanced_query, sub_query.enhanced_text);
    }

    // Retrievers see the enhanced text, not the bare sub-query
    let queries = db.queries();
    assert_eq!(queries.len(), 2);
    assert!(queries
        .iter()
        .all(|q| result.sub_queries.iter().any(|s| &s.enhanced_text == q)));
}

#[tokio::test]
async fn test_run_config_does_not_replace_built_router() {
    let llm = Arc::new(ScriptedLlm::new().on_expand(|_| {
        Ok(numbered(&[
            "Which fertilizers correct low soil pH?",
            "Which biological control agents suppress whitefly pests?",
        ]))
    }));
    let db = Arc::new(MockRetriever::database(|q, _| Ok(vec![db_item(q)])));
    let pipeline = build(&llm, Some(&db), None);

    let cfg = ResearchConfig {
        enable_web: false,
        specializations: Some(SpecializationSettings {
            default: "orchard_specialist".to_string(),
            profiles: vec![SpecializationProfile {
                name: "orchard_specialist".to_string(),
                focus: "fertilizers, whitefly, soil".to_string(),
                expertise: "orchards".to_string(),
            }],
        }),
        ..config()
    };
    let result = pipeline.run(RAW_QUERY, &cfg).await.unwrap();

    let tags: Vec<_> = result
        .sub_queries
        .iter()
        .map(|s| s.specialization_tag.as_str())
        .collect();
    assert_eq!(tags, vec!["soil_expert", "pest_manager"]);
}

#[tokio::test]
async fn test_single_worker_completes_every_sub_query() {
    let llm = Arc::new(ScriptedLlm::new().on_expand(|_| {
        Ok(numbered(&[
            "Which maize hybrids tolerate drought?",
            "How much nitrogen does maize need per hectare?",
            "When should maize be planted in sandy soils?",
        ]))
    }));
    let db = Arc::new(MockRetriever::database(|q, _| Ok(vec![db_item(q)])));
    let pipeline = build(&llm, Some(&db), None);

    let cfg = ResearchConfig {
        enable_web: false,
        max_workers: 1,
        ..config()
    };
    let result = pipeline.run(RAW_QUERY, &cfg).await.unwrap();

    assert_eq!(db.calls(), 3);
    assert_eq!(result.citation_ledger.ids(), vec!["DB-1-1", "DB-2-1", "DB-3-1"]);
}

#[tokio::test]
async fn test_sink_receives_evidence_document() {
    let temp = tempfile::TempDir::new().unwrap();
    let llm = Arc::new(ScriptedLlm::new());
    let db = Arc::new(MockRetriever::database(|q, _| Ok(vec![db_item(q)])));
    let pipeline =
        build(&llm, Some(&db), None).with_sink(Arc::new(FileSink::new(temp.path().join("reports"))));

    let cfg = ResearchConfig {
        enable_web: false,
        ..config()
    };
    let result = pipeline.run(RAW_QUERY, &cfg).await.unwrap();

    let handle = result.document_handle.as_deref().unwrap();
    assert!(handle.ends_with(&format!("{}.md", result.run_id)));
    assert_eq!(std::fs::read_to_string(handle).unwrap(), result.evidence_document);
}

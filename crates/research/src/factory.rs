//! Wiring of collaborators from configuration.

use crate::config::ResearchConfig;
use crate::embeddings::{OllamaEmbedder, TrigramEmbedder};
use crate::pipeline::ResearchPipeline;
use crate::retrieval::{
    build_flat_index, load_corpus, CorpusCatalog, Embedder, SearxSearch, VectorCorpusRetriever,
    WebRetriever,
};
use crate::router::SpecializationRegistry;
use crate::sink::FileSink;
use agrisearch_core::{AppConfig, AppError, AppResult};
use agrisearch_llm::{create_client, ProviderType};
use agrisearch_prompt::PromptLibrary;
use std::sync::Arc;

/// Create the embedder named by `research.embedding_provider`.
pub fn create_embedder(app: &AppConfig, research: &ResearchConfig) -> AppResult<Arc<dyn Embedder>> {
    match research.embedding_provider.as_str() {
        "ollama" => {
            let endpoint = app
                .get_provider_config("ollama")
                .and_then(|p| p.endpoint())
                .unwrap_or(ProviderType::Ollama.default_endpoint());
            let model = app.embedding_model().unwrap_or(&research.embedding_model);

            Ok(Arc::new(OllamaEmbedder::new(
                endpoint,
                model,
                research.embedding_dimensions,
            )))
        }

        "trigram" => Ok(Arc::new(TrigramEmbedder::new(research.embedding_dimensions))),

        other => Err(AppError::Config(format!(
            "Unknown embedding provider: '{}'. Supported providers: ollama, trigram",
            other
        ))),
    }
}

/// Build the specialization registry, preferring `research.yaml` profiles.
pub fn create_router(research: &ResearchConfig) -> AppResult<SpecializationRegistry> {
    match &research.specializations {
        Some(settings) => SpecializationRegistry::from_settings(settings),
        None => Ok(SpecializationRegistry::agricultural()),
    }
}

/// Assemble a pipeline with every collaborator the configuration enables.
pub async fn build_pipeline(app: &AppConfig, research: &ResearchConfig) -> AppResult<ResearchPipeline> {
    let api_key = app.resolve_api_key(&app.provider);
    let llm = create_client(&app.provider, app.provider_endpoint(), api_key.as_deref())?;
    let prompts = Arc::new(PromptLibrary::load(&app.workspace)?);
    let router = Arc::new(create_router(research)?);

    let mut pipeline = ResearchPipeline::new(llm, prompts, router);

    if research.enable_db {
        if let Some(corpus_path) = research.resolved_corpus_path(&app.workspace) {
            let embedder = create_embedder(app, research)?;
            let entries = load_corpus(&corpus_path)?;
            let index = build_flat_index(&entries, embedder.as_ref()).await?;
            let catalog = CorpusCatalog::new(entries);

            tracing::info!(
                items = catalog.len(),
                embedder = embedder.name(),
                "Vector corpus ready"
            );
            pipeline = pipeline.with_database(Arc::new(VectorCorpusRetriever::new(
                embedder,
                Arc::new(index),
                Arc::new(catalog),
            )));
        }
    }

    if research.enable_web {
        if let Some(url) = &research.web_search_url {
            let search = SearxSearch::new(url.as_str()).with_max_page_chars(research.max_page_chars);
            let mut retriever = WebRetriever::new(Arc::new(search));
            if !research.fetch_web_content {
                retriever = retriever.snippets_only();
            }
            pipeline = pipeline.with_web(Arc::new(retriever));
        }
    }

    if research.save_reports {
        pipeline = pipeline.with_sink(Arc::new(FileSink::new(
            research.resolved_report_dir(&app.workspace),
        )));
    }

    Ok(pipeline)
}

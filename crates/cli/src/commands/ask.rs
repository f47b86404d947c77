//! Ask command handler.
//!
//! Runs the full research pipeline for one question.

use agrisearch_core::{config::AppConfig, AppError, AppResult};
use agrisearch_research::{build_pipeline, load_research_config, ResearchConfig, RunResult};
use clap::Args;
use std::path::PathBuf;

/// Research a question and print a cited answer
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to research
    pub question: Option<String>,

    /// Read the question from a file
    #[arg(short, long, conflicts_with = "question")]
    pub file: Option<PathBuf>,

    /// Number of sub-queries to expand into
    #[arg(short = 'n', long)]
    pub sub_queries: Option<usize>,

    /// Corpus results per sub-query
    #[arg(long)]
    pub db_k: Option<usize>,

    /// Web results per sub-query
    #[arg(long)]
    pub web_k: Option<usize>,

    /// Skip corpus retrieval
    #[arg(long)]
    pub no_db: bool,

    /// Skip web retrieval
    #[arg(long)]
    pub no_web: bool,

    /// Synthesis capacity tier (small, medium, large, xlarge) or a model id
    #[arg(long)]
    pub capacity: Option<String>,

    /// Save the research report under the reports directory
    #[arg(long)]
    pub save_report: bool,

    /// Print the research report before the answer
    #[arg(long)]
    pub show_report: bool,

    /// Output the full run result as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    /// Execute the ask command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");
        tracing::debug!("Ask command options: {:?}", self);

        let question = self
            .get_question()?
            .ok_or_else(|| AppError::Config("No question provided".to_string()))?;

        config.validate()?;
        let research = self.apply_overrides(load_research_config(&config.workspace)?);
        let pipeline = build_pipeline(config, &research).await?;
        let result = pipeline.run(&question, &research).await?;

        if self.json {
            let json = serde_json::to_string_pretty(&result)
                .map_err(|e| AppError::Serialization(e.to_string()))?;
            println!("{}", json);
        } else {
            self.print_text(&result);
        }

        Ok(())
    }

    fn apply_overrides(&self, mut research: ResearchConfig) -> ResearchConfig {
        if let Some(n) = self.sub_queries {
            research.num_sub_queries = n;
        }
        if let Some(k) = self.db_k {
            research.db_k = k;
        }
        if let Some(k) = self.web_k {
            research.web_k = k;
        }
        if self.no_db {
            research.enable_db = false;
        }
        if self.no_web {
            research.enable_web = false;
        }
        if let Some(capacity) = &self.capacity {
            research.synthesis_capacity_hint = Some(capacity.clone());
        }
        if self.save_report {
            research.save_reports = true;
        }
        research
    }

    fn print_text(&self, result: &RunResult) {
        if self.show_report {
            println!("{}", result.evidence_document);
            println!("---\n");
        }

        println!("{}", result.synthesized_answer);

        // Run summary goes to stderr so stdout stays the answer
        eprintln!();
        eprintln!("Refined query: {}", result.refined_query);
        eprintln!(
            "Sub-queries: {} | database items: {} | web items: {} | citations: {}",
            result.sub_queries.len(),
            result.total_database_items(),
            result.total_web_items(),
            result.citation_ledger.len()
        );
        if !result.failures.is_empty() {
            eprintln!("Retrieval failures: {}", result.failures.len());
        }
        if result.synthesis_degraded {
            eprintln!("Answer is degraded: synthesis did not complete");
        }
        if let Some(handle) = &result.document_handle {
            eprintln!("Report saved to {}", handle);
        }
        eprintln!("Completed in {:.1}s", result.timings.total_ms as f64 / 1000.0);
    }

    /// Get the question text from the argument or a file.
    fn get_question(&self) -> AppResult<Option<String>> {
        if let Some(question) = &self.question {
            return Ok(Some(question.clone()));
        }

        match &self.file {
            Some(path) => {
                let text = std::fs::read_to_string(path)?;
                Ok(Some(text.trim().to_string()))
            }
            None => Ok(None),
        }
    }
}

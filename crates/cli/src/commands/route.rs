//! Route command handler.
//!
//! Shows the specialization a query is routed to without calling any model.

use agrisearch_core::{config::AppConfig, AppError, AppResult};
use agrisearch_research::{create_router, load_research_config};
use clap::Args;

/// Show which specialization a query routes to
#[derive(Args, Debug)]
pub struct RouteCommand {
    /// Query text to route
    pub query: String,

    /// List every specialization with its keywords
    #[arg(long)]
    pub list: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl RouteCommand {
    pub fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing route command");

        let research = load_research_config(&config.workspace)?;
        let router = create_router(&research)?;
        let route = router.route(&self.query);

        if self.json {
            let json = serde_json::to_string_pretty(&route)
                .map_err(|e| AppError::Serialization(e.to_string()))?;
            println!("{}", json);
            return Ok(());
        }

        println!("Specialization: {}", route.tag);
        println!("Score: {}", route.score);
        println!("Enhanced query: {}", route.enhanced_query);

        if self.list {
            println!();
            for specialization in router.specializations() {
                let marker = if specialization.name == router.default_specialization().name {
                    " (default)"
                } else {
                    ""
                };
                println!("{}{}", specialization.name, marker);
                println!("  focus: {}", specialization.focus);
                println!("  expertise: {}", specialization.expertise);
            }
        }

        Ok(())
    }
}

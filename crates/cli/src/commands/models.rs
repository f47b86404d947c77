//! Models command handler.

use agrisearch_core::{config::AppConfig, AppError, AppResult};
use agrisearch_llm::create_client;
use agrisearch_research::{load_research_config, CapacityTier};
use clap::Args;

/// List models available from the provider
#[derive(Args, Debug)]
pub struct ModelsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl ModelsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing models command");

        config.validate()?;

        let api_key = config.resolve_api_key(&config.provider);
        let client = create_client(
            &config.provider,
            config.provider_endpoint(),
            api_key.as_deref(),
        )?;
        let models = client.list_models().await?;

        let research = load_research_config(&config.workspace)?;
        let tier = CapacityTier::from_hint(research.capacity_hint());

        if self.json {
            let output = serde_json::json!({
                "provider": client.provider_name(),
                "models": models,
                "refineModel": research.refine_model,
                "expandModel": research.expand_model,
                "synthesisModel": research.synthesis_model,
                "synthesisTier": tier.as_str(),
            });
            let json = serde_json::to_string_pretty(&output)
                .map_err(|e| AppError::Serialization(e.to_string()))?;
            println!("{}", json);
            return Ok(());
        }

        println!("Provider: {}", client.provider_name());
        for model in &models {
            let mut roles = Vec::new();
            if *model == research.refine_model {
                roles.push("refine");
            }
            if *model == research.expand_model {
                roles.push("expand");
            }
            if *model == research.synthesis_model {
                roles.push("synthesis");
            }

            if roles.is_empty() {
                println!("  {}", model);
            } else {
                println!("  {} ({})", model, roles.join(", "));
            }
        }

        if !models.contains(&research.synthesis_model) {
            tracing::warn!(
                model = %research.synthesis_model,
                "Configured synthesis model is not available from the provider"
            );
        }
        println!(
            "Synthesis tier: {} ({}s timeout)",
            tier.as_str(),
            tier.timeout().as_secs()
        );

        Ok(())
    }
}

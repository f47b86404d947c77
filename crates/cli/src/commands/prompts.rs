//! Prompts command handler.
//!
//! Lists the prompts in use, with workspace overrides applied.

use agrisearch_core::{config::AppConfig, AppResult};
use agrisearch_prompt::PromptLibrary;
use clap::Args;

/// List or show the prompts in use
#[derive(Args, Debug)]
pub struct PromptsCommand {
    /// Print the full template of one prompt
    #[arg(long)]
    pub show: Option<String>,
}

impl PromptsCommand {
    pub fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing prompts command");

        let library = PromptLibrary::load(&config.workspace)?;

        if let Some(id) = &self.show {
            let prompt = library.get(id)?;
            println!("# {} ({})", prompt.title, prompt.id);
            if let Some(system) = &prompt.system {
                println!("\n## System\n\n{}", system);
            }
            println!("\n## Template\n\n{}", prompt.template);
            return Ok(());
        }

        for id in library.ids() {
            let prompt = library.get(&id)?;
            println!("{:<28} {}", prompt.id, prompt.title);
        }

        Ok(())
    }
}

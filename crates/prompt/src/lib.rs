//! Prompt system for agrisearch.
//!
//! This crate provides the instruction templates used by the research
//! pipeline:
//! - Built-in Handlebars templates for refining, expanding and synthesizing
//! - YAML overrides under `.agrisearch/prompts/<id>.yml`
//! - A `PromptLibrary` resolved once and shared by reference

pub mod builder;
pub mod loader;
pub mod templates;
pub mod types;

// Re-export main types
pub use builder::build_prompt;
pub use loader::{list_prompts, load_prompt, PromptLibrary};
pub use templates::{EXPAND_PROMPT_ID, REFINE_PROMPT_ID, SYNTHESIZE_PROMPT_ID};
pub use types::{BuiltPrompt, BuiltPromptMetadata, PromptDefinition, SamplingDefaults};

//! Text-completion integration crate for agrisearch.
//!
//! This crate provides a provider-agnostic abstraction over the
//! text-completion service used to refine questions, expand sub-queries
//! and synthesize cited answers.
//!
//! # Providers
//! - **Ollama**: Local LLM runtime (default)
//! - **OpenAI-compatible**: any server exposing `/v1/chat/completions`
//!
//! # Example
//! ```no_run
//! use agrisearch_llm::{LlmClient, LlmRequest, providers::OllamaClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new();
//! let request = LlmRequest::new("Why do tomato leaves curl?", "gemma3:1b")
//!     .with_temperature(0.1)
//!     .with_context_window(2048);
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;
pub mod types;

// Re-export main types
pub use client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
pub use factory::create_client;
pub use providers::{OllamaClient, OpenAiCompatibleClient};
pub use types::ProviderType;

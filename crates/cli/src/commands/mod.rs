//! Command handlers for the agrisearch CLI.
//!
//! This module organizes all CLI commands into separate submodules.

pub mod ask;
pub mod models;
pub mod prompts;
pub mod route;

// Re-export command types for convenience
pub use ask::AskCommand;
pub use models::ModelsCommand;
pub use prompts::PromptsCommand;
pub use route::RouteCommand;

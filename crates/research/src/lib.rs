//! Agricultural research pipeline.
//!
//! Turns one farmer question into a cited answer: refine the question,
//! expand it into sub-queries, route each to a specialization, retrieve
//! evidence from a vector corpus and the web in parallel, assign stable
//! citation IDs, render a research report and synthesize an answer that
//! may only cite IDs from that report.

pub mod completion;
pub mod config;
pub mod embeddings;
pub mod expander;
pub mod factory;
pub mod ledger;
pub mod pipeline;
pub mod refiner;
pub mod retrieval;
pub mod router;
pub mod scheduler;
pub mod sink;
pub mod synthesizer;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use config::{load_research_config, save_research_config, ResearchConfig};
pub use factory::{build_pipeline, create_embedder, create_router};
pub use ledger::{extract_citation_ids, CitationLedger};
pub use pipeline::ResearchPipeline;
pub use router::{Route, Specialization, SpecializationRegistry};
pub use sink::{EvidenceSink, FileSink};
pub use synthesizer::{CapacityTier, DEGRADED_MARKER};
pub use types::{
    Citation, EvidenceItem, PipelineState, RetrievalFailure, RunResult, SourceKind, SubQuery,
    SubQueryEvidence,
};

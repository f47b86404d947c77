//! Cited answer synthesis with capacity-aware deadlines.

use crate::completion::{complete_within, request_for};
use crate::ledger::CitationLedger;
use agrisearch_llm::LlmClient;
use agrisearch_prompt::{PromptLibrary, SYNTHESIZE_PROMPT_ID};
use regex::Regex;
use serde::Serialize;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

/// Marker that opens every degraded answer.
pub const DEGRADED_MARKER: &str = "[DEGRADED ANSWER]";

/// Characters of evidence included in a degraded answer.
const DEGRADED_EVIDENCE_CHARS: usize = 2000;

static PARAMETER_SIZE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+(?:\.\d+)?)\s*b\b").expect("valid parameter size regex")
});

/// Declared capacity of the synthesis model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CapacityTier {
    Small,
    Medium,
    Large,
    XLarge,
}

impl CapacityTier {
    /// Parse a tier name or a model id with a parameter-count suffix.
    ///
    /// `gemma3:1b` is small, up to 14B medium, up to 40B large, anything
    /// bigger xlarge. Unrecognized hints are medium.
    pub fn from_hint(hint: &str) -> Self {
        let hint = hint.trim().to_lowercase();
        match hint.as_str() {
            "small" | "s" => return Self::Small,
            "medium" | "m" => return Self::Medium,
            "large" | "l" => return Self::Large,
            "xlarge" | "x-large" | "xl" => return Self::XLarge,
            _ => {}
        }

        let billions = PARAMETER_SIZE
            .captures_iter(&hint)
            .last()
            .and_then(|caps| caps[1].parse::<f64>().ok());

        match billions {
            Some(b) if b <= 4.0 => Self::Small,
            Some(b) if b <= 14.0 => Self::Medium,
            Some(b) if b <= 40.0 => Self::Large,
            Some(_) => Self::XLarge,
            None => Self::Medium,
        }
    }

    /// Synthesis deadline. Larger tiers get longer budgets.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(match self {
            Self::Small => 60,
            Self::Medium => 120,
            Self::Large => 300,
            Self::XLarge => 600,
        })
    }

    pub fn context_window(&self) -> u32 {
        match self {
            Self::Small => 4096,
            Self::Medium | Self::Large => 8192,
            Self::XLarge => 16384,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
            Self::XLarge => "xlarge",
        }
    }
}

/// What synthesis produced.
#[derive(Debug, Clone, PartialEq)]
pub enum SynthesisOutcome {
    Answer(String),
    Degraded { answer: String, reason: String },
}

impl SynthesisOutcome {
    pub fn answer(&self) -> &str {
        match self {
            Self::Answer(answer) | Self::Degraded { answer, .. } => answer,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }
}

/// Composes the final cited answer from the evidence report.
pub struct AnswerSynthesizer {
    client: Arc<dyn LlmClient>,
    prompts: Arc<PromptLibrary>,
    model: String,
    tier: CapacityTier,
    max_document_size: usize,
}

impl AnswerSynthesizer {
    pub fn new(
        client: Arc<dyn LlmClient>,
        prompts: Arc<PromptLibrary>,
        model: impl Into<String>,
        tier: CapacityTier,
        max_document_size: usize,
    ) -> Self {
        Self {
            client,
            prompts,
            model: model.into(),
            tier,
            max_document_size,
        }
    }

    /// Never fails and never returns an empty answer.
    pub async fn synthesize(
        &self,
        original_query: &str,
        evidence_document: &str,
        ledger: &CitationLedger,
    ) -> SynthesisOutcome {
        let evidence = truncate_evidence(evidence_document, self.max_document_size);
        let citation_ids = if ledger.is_empty() {
            "(none)".to_string()
        } else {
            ledger.ids().join(", ")
        };

        let prompt = match self.prompts.render(
            SYNTHESIZE_PROMPT_ID,
            &[
                ("query", original_query),
                ("evidence", &evidence),
                ("citation_ids", &citation_ids),
            ],
        ) {
            Ok(prompt) => prompt,
            Err(e) => return degraded(original_query, evidence_document, &e.to_string()),
        };

        let mut request = request_for(&prompt, &self.model);
        if request.context_window.is_none() {
            request = request.with_context_window(self.tier.context_window());
        }

        let deadline = self.tier.timeout();
        tracing::info!(
            model = %self.model,
            tier = self.tier.as_str(),
            timeout_secs = deadline.as_secs(),
            evidence_bytes = evidence.len(),
            "Synthesizing answer"
        );

        match complete_within(self.client.as_ref(), &request, deadline, "synthesize answer").await {
            Ok(answer) if !answer.trim().is_empty() => SynthesisOutcome::Answer(answer),
            Ok(_) => {
                tracing::warn!("Synthesis returned an empty answer, degrading");
                degraded(original_query, evidence_document, "model returned an empty answer")
            }
            Err(e) => {
                tracing::warn!(error = %e, "Synthesis failed, degrading");
                degraded(original_query, evidence_document, &e.to_string())
            }
        }
    }
}

/// Cut the document to at most `max_bytes` on a char boundary, with a note.
pub fn truncate_evidence(document: &str, max_bytes: usize) -> String {
    if document.len() <= max_bytes {
        return document.to_string();
    }

    let mut end = max_bytes;
    while !document.is_char_boundary(end) {
        end -= 1;
    }

    format!(
        "{}\n\n[Note: evidence document truncated from {} to {} bytes. Later sub-queries and the citation index may be missing.]",
        &document[..end],
        document.len(),
        end
    )
}

/// The tagged fallback answer carrying a prefix of the evidence document.
pub(crate) fn degraded(
    original_query: &str,
    evidence_document: &str,
    reason: &str,
) -> SynthesisOutcome {
    let prefix: String = evidence_document.chars().take(DEGRADED_EVIDENCE_CHARS).collect();
    let truncated = prefix.len() < evidence_document.len();

    let answer = format!(
        "{} Answer synthesis did not complete ({}).\n\n\
         The evidence gathered for \"{}\" follows{}. Its citation IDs are valid references.\n\n{}",
        DEGRADED_MARKER,
        reason,
        original_query,
        if truncated { " (truncated)" } else { "" },
        prefix
    );

    SynthesisOutcome::Degraded {
        answer,
        reason: reason.to_string(),
    }
}

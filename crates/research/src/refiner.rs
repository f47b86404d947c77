//! Question normalization.

use crate::completion::{complete_within, request_for};
use agrisearch_llm::LlmClient;
use agrisearch_prompt::{PromptLibrary, REFINE_PROMPT_ID};
use std::sync::Arc;
use std::time::Duration;

/// Rewrites a raw user question into a clearer, searchable one.
///
/// `refine` never fails: any error, timeout or empty output yields the
/// raw question unchanged.
pub struct QueryRefiner {
    client: Arc<dyn LlmClient>,
    prompts: Arc<PromptLibrary>,
    model: String,
    timeout: Duration,
}

impl QueryRefiner {
    pub fn new(
        client: Arc<dyn LlmClient>,
        prompts: Arc<PromptLibrary>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            prompts,
            model: model.into(),
            timeout,
        }
    }

    pub async fn refine(&self, raw: &str) -> String {
        let prompt = match self.prompts.render(REFINE_PROMPT_ID, &[("query", raw)]) {
            Ok(prompt) => prompt,
            Err(e) => {
                tracing::warn!(error = %e, "Refine prompt unavailable, using raw query");
                return raw.to_string();
            }
        };

        let request = request_for(&prompt, &self.model);
        match complete_within(self.client.as_ref(), &request, self.timeout, "refine query").await {
            Ok(output) => match clean_refined(&output) {
                Some(refined) => {
                    tracing::debug!(refined = %refined, "Refined query");
                    refined
                }
                None => {
                    tracing::warn!("Refiner returned no usable text, using raw query");
                    raw.to_string()
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, "Query refinement failed, using raw query");
                raw.to_string()
            }
        }
    }
}

/// First non-empty line, without a leading label or wrapping quotes.
fn clean_refined(output: &str) -> Option<String> {
    let line = output.lines().map(str::trim).find(|l| !l.is_empty())?;

    let line = line
        .strip_prefix("Refined query:")
        .or_else(|| line.strip_prefix("Refined Query:"))
        .unwrap_or(line)
        .trim()
        .trim_matches(|c| c == '"' || c == '\'' || c == '`')
        .trim();

    if line.is_empty() {
        None
    } else {
        Some(line.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedLlm;

    fn refiner(llm: ScriptedLlm) -> QueryRefiner {
        QueryRefiner::new(
            Arc::new(llm),
            Arc::new(PromptLibrary::builtin()),
            "gemma3:1b",
            Duration::from_secs(5),
        )
    }

    #[test]
    fn test_clean_refined() {
        assert_eq!(
            clean_refined("Refined query: \"How to manage aphids on wheat\"\n").as_deref(),
            Some("How to manage aphids on wheat")
        );
        assert_eq!(
            clean_refined("\n\n  best maize spacing  \nextra line").as_deref(),
            Some("best maize spacing")
        );
        assert_eq!(clean_refined("   \n  "), None);
        assert_eq!(clean_refined("\"\""), None);
    }

    #[tokio::test]
    async fn test_refine_uses_model_output() {
        let refiner = refiner(ScriptedLlm::new().on_refine(|_| {
            Ok("Causes of crop wilting and mortality".to_string())
        }));
        assert_eq!(
            refiner.refine("my crops are dying").await,
            "Causes of crop wilting and mortality"
        );
    }

    #[tokio::test]
    async fn test_refine_falls_back_on_error() {
        let refiner = refiner(ScriptedLlm::new().failing_refine());
        assert_eq!(refiner.refine("my crops are dying").await, "my crops are dying");
    }

    #[tokio::test]
    async fn test_refine_falls_back_on_empty_output() {
        let refiner = refiner(ScriptedLlm::new().on_refine(|_| Ok("  \n".to_string())));
        assert_eq!(refiner.refine("my crops are dying").await, "my crops are dying");
    }

    #[tokio::test(start_paused = true)]
    async fn test_refine_falls_back_on_timeout() {
        let refiner = refiner(
            ScriptedLlm::new()
                .on_refine(|_| Ok("never seen".to_string()))
                .with_delay(Duration::from_secs(60)),
        );
        assert_eq!(refiner.refine("my crops are dying").await, "my crops are dying");
    }
}

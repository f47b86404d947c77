//! Bridging rendered prompts to the text-completion collaborator.

use agrisearch_core::{AppError, AppResult};
use agrisearch_llm::{LlmClient, LlmRequest};
use agrisearch_prompt::BuiltPrompt;
use std::time::Duration;

/// Build a request from a rendered prompt, applying its sampling defaults.
pub fn request_for(prompt: &BuiltPrompt, model: &str) -> LlmRequest {
    let mut request = LlmRequest::new(prompt.user.clone(), model);

    if let Some(system) = &prompt.system {
        request = request.with_system(system.clone());
    }
    if let Some(temperature) = prompt.sampling.temperature {
        request = request.with_temperature(temperature);
    }
    if let Some(top_p) = prompt.sampling.top_p {
        request = request.with_top_p(top_p);
    }
    if let Some(context_window) = prompt.sampling.context_window {
        request = request.with_context_window(context_window);
    }
    if let Some(max_tokens) = prompt.sampling.max_tokens {
        request = request.with_max_tokens(max_tokens);
    }

    request
}

/// Run one completion under a deadline and return the generated text.
pub async fn complete_within(
    client: &dyn LlmClient,
    request: &LlmRequest,
    deadline: Duration,
    operation: &str,
) -> AppResult<String> {
    let response = tokio::time::timeout(deadline, client.complete(request))
        .await
        .map_err(|_| AppError::timeout(operation, deadline))??;

    Ok(response.content)
}

//! Sub-query expansion and list parsing.

use crate::completion::{complete_within, request_for};
use agrisearch_llm::LlmClient;
use agrisearch_prompt::{PromptLibrary, EXPAND_PROMPT_ID};
use regex::Regex;
use std::collections::HashSet;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

/// Shortest sub-query kept, in characters.
const MIN_SUB_QUERY_CHARS: usize = 10;

static LIST_ITEM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\d{1,2}\s*[.):\-]|[-*•+])\s*(.+)$").expect("valid list item regex")
});

static ITEM_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:sub[- ]?query|query)\s*\d*\s*[:.\-]\s*").expect("valid label regex")
});

/// Breaks a refined question into focused sub-queries.
pub struct SubQueryExpander {
    client: Arc<dyn LlmClient>,
    prompts: Arc<PromptLibrary>,
    model: String,
    timeout: Duration,
}

impl SubQueryExpander {
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

    /// Returns between 1 and `desired_count` sub-queries, in canonical order.
    ///
    /// Falls back to `[refined]` when the call fails or nothing usable
    /// is parsed.
    pub async fn expand(&self, refined: &str, desired_count: usize) -> Vec<String> {
        let count = desired_count.to_string();
        let prompt = match self
            .prompts
            .render(EXPAND_PROMPT_ID, &[("query", refined), ("count", &count)])
        {
            Ok(prompt) => prompt,
            Err(e) => {
                tracing::warn!(error = %e, "Expand prompt unavailable, using refined query");
                return vec![refined.to_string()];
            }
        };

        let request = request_for(&prompt, &self.model);
        match complete_within(self.client.as_ref(), &request, self.timeout, "expand query").await {
            Ok(output) => {
                let sub_queries = parse_sub_queries(&output, refined, desired_count);
                tracing::debug!(count = sub_queries.len(), "Parsed sub-queries");
                sub_queries
            }
            Err(e) => {
                tracing::warn!(error = %e, "Sub-query expansion failed, using refined query");
                vec![refined.to_string()]
            }
        }
    }
}

/// Parse a numbered or bulleted list out of model output.
///
/// Deterministic for identical input. Never returns an empty list.
pub fn parse_sub_queries(output: &str, refined: &str, desired_count: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut sub_queries = Vec::new();

    for line in output.lines() {
        if sub_queries.len() >= desired_count {
            break;
        }

        let Some(candidate) = list_candidate(line.trim()) else {
            continue;
        };

        let cleaned = clean_item(candidate);
        if !is_usable(&cleaned) {
            continue;
        }

        if seen.insert(cleaned.to_lowercase()) {
            sub_queries.push(cleaned);
        }
    }

    if sub_queries.is_empty() {
        tracing::warn!("No usable sub-queries in expansion output, using refined query");
        return vec![refined.to_string()];
    }

    sub_queries
}

fn list_candidate(line: &str) -> Option<&str> {
    if line.is_empty() {
        return None;
    }

    let unbolded = line
        .strip_prefix("**")
        .or_else(|| line.strip_prefix("__"))
        .unwrap_or(line);
    if let Some(caps) = LIST_ITEM.captures(unbolded) {
        return caps.get(1).map(|m| m.as_str());
    }

    // Unnumbered questions still count as items
    if line.ends_with('?') && !line.starts_with('#') {
        return Some(line);
    }

    None
}

fn clean_item(item: &str) -> String {
    let without_markup: String = item
        .replace("**", "")
        .replace("__", "")
        .replace('`', "");
    let without_label = ITEM_LABEL.replace(without_markup.trim(), "");

    without_label
        .trim()
        .trim_matches(|c| c == '"' || c == '\'' || c == '“' || c == '”')
        .trim()
        .to_string()
}

fn is_usable(item: &str) -> bool {
    item.chars().count() > MIN_SUB_QUERY_CHARS && item.chars().any(char::is_alphabetic)
}

//! Built-in prompt templates used by the research pipeline.

use crate::types::{PromptDefinition, SamplingDefaults};

/// Question normalization prompt. Variables: `query`.
pub const REFINE_PROMPT_ID: &str = "research.refine";

/// Sub-query expansion prompt. Variables: `query`, `count`.
pub const EXPAND_PROMPT_ID: &str = "research.expand";

/// Cited answer synthesis prompt. Variables: `query`, `evidence`, `citation_ids`.
pub const SYNTHESIZE_PROMPT_ID: &str = "research.synthesize";

const REFINE_TEMPLATE: &str = "\
You are an expert agricultural query refiner. Rewrite the user's question so it is \
specific, clear and searchable.

Guidelines:
1. Make the query more specific and technical when appropriate
2. Add relevant agricultural context if missing
3. Fix grammar and spelling
4. Keep the core intent of the original question
5. Make it suitable for both database search and web search
6. Return only the refined query, nothing else

Original query: {{query}}

Refined query:";

const EXPAND_TEMPLATE: &str = "\
You are an expert at breaking agricultural questions down into focused research sub-queries.

Given the main query, generate {{count}} specific sub-queries that cover different aspects \
of the topic. Each sub-query must be:
1. Focused on one aspect
2. Suitable for database and web search
3. Relevant to agriculture
4. Different from the others

Main query: {{query}}

Generate exactly {{count}} sub-queries, one per line, numbered 1-{{count}}:";

const SYNTHESIZE_SYSTEM: &str = "\
You are an expert agricultural consultant who answers strictly from a supplied research report.";

const SYNTHESIZE_TEMPLATE: &str = "\
Answer the user's question using only the research report below.

CITATION RULES:
1. Every factual claim MUST carry at least one inline citation
2. Use the exact citation IDs from the report, for example [DB-1-2] or [WEB-2-1]
3. Only these IDs exist: {{citation_ids}}
4. Several citations may support one sentence, written as [DB-1-1][WEB-2-3]
5. Do not make any claim that no citation supports
6. If the report does not cover part of the question, say so plainly

Structure the answer in short sections and end with a \"References\" section listing the IDs used.

Research Report:
{{evidence}}

User's Original Question: {{query}}

Answer with inline citations:";

/// All built-in prompt definitions.
pub fn builtin_prompts() -> Vec<PromptDefinition> {
    vec![
        PromptDefinition {
            id: REFINE_PROMPT_ID.to_string(),
            title: "Refine research question".to_string(),
            api_version: "1.0".to_string(),
            system: None,
            template: REFINE_TEMPLATE.to_string(),
            sampling: SamplingDefaults {
                temperature: Some(0.1),
                top_p: Some(0.9),
                context_window: Some(2048),
                max_tokens: Some(256),
            },
        },
        PromptDefinition {
            id: EXPAND_PROMPT_ID.to_string(),
            title: "Expand into sub-queries".to_string(),
            api_version: "1.0".to_string(),
            system: None,
            template: EXPAND_TEMPLATE.to_string(),
            sampling: SamplingDefaults {
                temperature: Some(0.3),
                top_p: Some(0.9),
                context_window: Some(2048),
                max_tokens: Some(512),
            },
        },
        PromptDefinition {
            id: SYNTHESIZE_PROMPT_ID.to_string(),
            title: "Synthesize cited answer".to_string(),
            api_version: "1.0".to_string(),
            system: Some(SYNTHESIZE_SYSTEM.to_string()),
            template: SYNTHESIZE_TEMPLATE.to_string(),
            sampling: SamplingDefaults {
                temperature: Some(0.1),
                top_p: Some(0.9),
                context_window: None,
                max_tokens: None,
            },
        },
    ]
}

/// Look up a built-in prompt by id.
pub fn builtin_prompt(id: &str) -> Option<PromptDefinition> {
    builtin_prompts().into_iter().find(|p| p.id == id)
}

//! Citation assignment and the evidence report.
//!
//! IDs are minted single-threaded after the retrieval barrier, walking
//! sub-queries in canonical order and, within each, database items before
//! web items: `DB-{i}-{j}` / `WEB-{i}-{j}`, both 1-based.

use crate::types::{Citation, EvidenceItem, SourceKind, SubQueryEvidence};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

static CITATION_GROUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\[\]]+)\]").expect("valid citation group regex"));
static CITATION_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:DB|WEB)-\d+-\d+\b").expect("valid citation id regex"));
static SPACE_BEFORE_PUNCT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]+([.,;:!?])").expect("valid punctuation regex"));
static DANGLING_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[,;][ \t]*([,;)\]]|$)").expect("valid separator regex"));
static EMPTY_PARENS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]*\([ \t,;]*\)").expect("valid parentheses regex"));
// A list marker, or nothing, with at most stray separators around it
static EMPTY_LIST_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[\s,;]*(?:[-*+]|\d+[.)])?[\s,;]*$").expect("valid list line regex")
});

/// Run-scoped registry of minted citations, in mint order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CitationLedger {
    citations: Vec<Citation>,
    #[serde(skip)]
    by_id: HashMap<String, usize>,
}

impl CitationLedger {
    fn mint(&mut self, kind: SourceKind, subquery_index: usize, item_index: usize, item: &EvidenceItem) -> String {
        let id = format!("{}-{}-{}", kind.citation_prefix(), subquery_index, item_index);
        self.by_id.insert(id.clone(), self.citations.len());
        self.citations.push(Citation {
            id: id.clone(),
            source_kind: kind,
            subquery_index,
            item_index,
            title: item.title().to_string(),
            locator: item.locator().to_string(),
        });
        id
    }

    pub fn get(&self, id: &str) -> Option<&Citation> {
        self.by_id.get(id).map(|&i| &self.citations[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    /// IDs in mint order.
    pub fn ids(&self) -> Vec<&str> {
        self.citations.iter().map(|c| c.id.as_str()).collect()
    }

    pub fn citations(&self) -> &[Citation] {
        &self.citations
    }

    pub fn len(&self) -> usize {
        self.citations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.citations.is_empty()
    }
}

/// Header fields of the evidence report.
#[derive(Debug, Clone)]
pub struct ReportHeader<'a> {
    pub original_query: &'a str,
    pub refined_query: &'a str,
    pub generated_at: DateTime<Utc>,
}

/// Mint citation IDs and render the markdown evidence report.
///
/// `results` must already be in canonical sub-query order.
pub fn assign_and_render(
    results: &[SubQueryEvidence],
    header: &ReportHeader<'_>,
) -> (CitationLedger, String) {
    let mut ledger = CitationLedger::default();
    let mut doc = String::new();

    doc.push_str("# Agricultural Research Report\n\n");
    doc.push_str(&format!("**Original Query:** {}\n", header.original_query));
    doc.push_str(&format!("**Refined Query:** {}\n", header.refined_query));
    doc.push_str(&format!("**Generated:** {}\n", header.generated_at.format("%Y-%m-%d %H:%M:%S UTC")));
    doc.push_str(&format!("**Sub-queries:** {}\n\n", results.len()));
    doc.push_str("---\n\n");

    for result in results {
        let i = result.sub_query.index;
        doc.push_str(&format!("## Sub-query {}: {}\n\n", i, result.sub_query.text));
        doc.push_str(&format!("**Specialization:** {}\n\n", result.sub_query.specialization_tag));

        if result.item_count() == 0 {
            doc.push_str("_No evidence retrieved for this sub-query._\n\n");
        }

        if !result.database.is_empty() {
            doc.push_str("### Database Results\n\n");
            for (j, item) in result.database.iter().enumerate() {
                let id = ledger.mint(SourceKind::Database, i, j + 1, item);
                render_item(&mut doc, &id, item);
            }
        }

        if !result.web.is_empty() {
            doc.push_str("### Web Results\n\n");
            for (j, item) in result.web.iter().enumerate() {
                let id = ledger.mint(SourceKind::Web, i, j + 1, item);
                render_item(&mut doc, &id, item);
            }
        }

        doc.push_str("---\n\n");
    }

    doc.push_str("## Citation Index\n\n");
    if ledger.is_empty() {
        doc.push_str("_No citations._\n");
    }
    for (n, citation) in ledger.citations().iter().enumerate() {
        doc.push_str(&format!("{}. [{}] {} ({})\n", n + 1, citation.id, citation.title, citation.locator));
    }

    let database_total: usize = results.iter().map(|r| r.database.len()).sum();
    let web_total: usize = results.iter().map(|r| r.web.len()).sum();
    doc.push_str("\n## Summary Statistics\n\n");
    doc.push_str(&format!("- Sub-queries: {}\n", results.len()));
    doc.push_str(&format!("- Database results: {}\n", database_total));
    doc.push_str(&format!("- Web results: {}\n", web_total));
    doc.push_str(&format!("- Total citations: {}\n", ledger.len()));

    (ledger, doc)
}

fn render_item(doc: &mut String, id: &str, item: &EvidenceItem) {
    doc.push_str(&format!("#### [{}] {}\n\n", id, item.title()));
    match item {
        EvidenceItem::DatabaseChunk(chunk) => {
            doc.push_str(&format!("- **Source:** {}\n", chunk.locator));
            doc.push_str(&format!("- **Similarity:** {:.3}\n", chunk.similarity_score));
            if let Some(domain) = &chunk.source_domain {
                doc.push_str(&format!("- **Domain:** {}\n", domain));
            }
        }
        EvidenceItem::WebResult(web) => {
            doc.push_str(&format!("- **URL:** {}\n", web.locator));
            doc.push_str(&format!("- **Relevance:** {:.3}\n", web.relevance_score));
            doc.push_str(&format!("- **Retrieved:** {}\n", web.fetch_timestamp.to_rfc3339()));
        }
    }
    doc.push_str(&format!("\n{}\n\n", item.text().trim()));
    doc.push_str(&format!("Citation: [{}]\n\n", id));
}

/// Citation IDs referenced in `text`, in order of first appearance.
///
/// Recognizes `[DB-1-1]`, adjacent groups like `[DB-1-1][WEB-2-3]`, lists
/// inside one bracket like `[DB-1-1, WEB-2-3]` and bare IDs such as the
/// entries of a references list.
pub fn extract_citation_ids(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut ids = Vec::new();

    for id in CITATION_ID.find_iter(text) {
        if seen.insert(id.as_str()) {
            ids.push(id.as_str().to_string());
        }
    }

    ids
}

/// Remove citation IDs that are not in the ledger.
///
/// Returns the cleaned text and the distinct unknown IDs in order of
/// appearance. Brackets left empty are removed entirely, and a line that
/// held nothing but unknown IDs (a references list entry, say) is dropped.
pub fn strip_unknown_citations(text: &str, ledger: &CitationLedger) -> (String, Vec<String>) {
    let unknown: Vec<String> = extract_citation_ids(text)
        .into_iter()
        .filter(|id| !ledger.contains(id))
        .collect();

    if unknown.is_empty() {
        return (text.to_string(), unknown);
    }

    let lines: Vec<String> = text
        .split('\n')
        .filter_map(|line| {
            let cleaned = strip_line(line, ledger);
            if cleaned != line && EMPTY_LIST_LINE.is_match(&cleaned) {
                None
            } else {
                Some(cleaned)
            }
        })
        .collect();

    (lines.join("\n"), unknown)
}

fn strip_line(line: &str, ledger: &CitationLedger) -> String {
    let bracketed = CITATION_GROUP.replace_all(line, |caps: &regex::Captures<'_>| {
        let ids: Vec<&str> = CITATION_ID.find_iter(&caps[1]).map(|m| m.as_str()).collect();
        if ids.is_empty() {
            return caps[0].to_string();
        }

        let known: Vec<&str> = ids.iter().copied().filter(|id| ledger.contains(id)).collect();
        if known.len() == ids.len() {
            caps[0].to_string()
        } else if known.is_empty() {
            String::new()
        } else {
            format!("[{}]", known.join(", "))
        }
    });

    let bare = CITATION_ID.replace_all(&bracketed, |m: &regex::Captures<'_>| {
        if ledger.contains(&m[0]) {
            m[0].to_string()
        } else {
            String::new()
        }
    });

    if bare == line {
        return line.to_string();
    }

    let cleaned = DANGLING_SEPARATOR.replace_all(&bare, "$1");
    let cleaned = EMPTY_PARENS.replace_all(&cleaned, "");
    let cleaned = SPACE_BEFORE_PUNCT.replace_all(&cleaned, "$1");
    cleaned.trim_end().to_string()
}

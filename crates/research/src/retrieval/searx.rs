//! SearxNG-compatible web search client.
//!
//! Searches via `GET {base}/search?q=..&format=json` and fetches result
//! pages directly, reducing their HTML to plain text.

use super::web::{WebHit, WebSearch};
use agrisearch_core::{AppError, AppResult};
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;

const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) agrisearch/0.1";

static SCRIPT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script[^>]*>.*?</script>").expect("valid script regex"));
static STYLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<style[^>]*>.*?</style>").expect("valid style regex"));
static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid tag regex"));
static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));
static ENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#[xX][0-9a-fA-F]{1,6}|#[0-9]{1,7}|[a-zA-Z]+);").expect("valid entity regex")
});

#[derive(Debug, Deserialize)]
struct SearxResponse {
    #[serde(default)]
    results: Vec<SearxResult>,
}

#[derive(Debug, Deserialize)]
struct SearxResult {
    url: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
}

/// Web search against a SearxNG instance.
pub struct SearxSearch {
    client: reqwest::Client,
    base_url: String,
    max_page_chars: usize,
}

impl SearxSearch {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            max_page_chars: 2000,
        }
    }

    /// Cap on characters kept from each fetched page.
    pub fn with_max_page_chars(mut self, max_page_chars: usize) -> Self {
        self.max_page_chars = max_page_chars;
        self
    }
}

#[async_trait]
impl WebSearch for SearxSearch {
    async fn search(&self, query: &str, k: usize) -> AppResult<Vec<WebHit>> {
        let url = format!("{}/search", self.base_url);
        tracing::debug!(query, k, "Searching the web");

        let response = self
            .client
            .get(&url)
            .query(&[("q", query), ("format", "json")])
            .header("User-Agent", USER_AGENT)
            .send()
            .await
            .map_err(|e| AppError::Retrieval(format!("Web search request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Retrieval(format!(
                "Web search error: {}",
                response.status()
            )));
        }

        let body: SearxResponse = response
            .json()
            .await
            .map_err(|e| AppError::Retrieval(format!("Failed to parse search results: {}", e)))?;

        Ok(body
            .results
            .into_iter()
            .take(k)
            .map(|r| WebHit {
                title: if r.title.is_empty() { r.url.clone() } else { r.title },
                url: r.url,
                snippet: r.content,
            })
            .collect())
    }

    async fn fetch(&self, url: &str) -> AppResult<String> {
        let response = self
            .client
            .get(url)
            .header("User-Agent", USER_AGENT)
            .send()
            .await
            .map_err(|e| AppError::Retrieval(format!("Failed to fetch {}: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(AppError::Retrieval(format!(
                "HTTP error fetching {}: {}",
                url,
                response.status()
            )));
        }

        let html = response
            .text()
            .await
            .map_err(|e| AppError::Retrieval(format!("Failed to read {}: {}", url, e)))?;

        Ok(extract_page_text(&html, self.max_page_chars))
    }
}

/// Reduce HTML to collapsed plain text of at most `max_chars` characters.
pub fn extract_page_text(html: &str, max_chars: usize) -> String {
    let text = SCRIPT.replace_all(html, " ");
    let text = STYLE.replace_all(&text, " ");
    let text = TAG.replace_all(&text, " ");
    let text = decode_entities(&text);
    let text = WHITESPACE.replace_all(&text, " ");

    text.trim().chars().take(max_chars).collect()
}

/// Decode common named entities and numeric references in one pass.
/// Unrecognized entities are left as written.
fn decode_entities(text: &str) -> String {
    ENTITY
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let entity = &caps[1];
            let decoded = match entity {
                "nbsp" => Some(' '),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "amp" => Some('&'),
                _ => numeric_entity(entity),
            };
            decoded.map_or_else(|| caps[0].to_string(), |c| c.to_string())
        })
        .into_owned()
}

fn numeric_entity(entity: &str) -> Option<char> {
    let code = entity.strip_prefix('#')?;
    let value = match code.strip_prefix(['x', 'X']) {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => code.parse::<u32>().ok()?,
    };
    // NBSP reads as a plain space once whitespace is collapsed
    match char::from_u32(value)? {
        '\u{a0}' => Some(' '),
        c => Some(c),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_page_text() {
        let html = r#"<html><head><title>x</title><style>body { color: red; }</style>
            <script type="text/javascript">var a = "<p>";</script></head>
            <body><h1>Wheat   rust</h1><p>Stem rust &amp; leaf rust&nbsp;spread fast.</p></body></html>"#;

        assert_eq!(
            extract_page_text(html, 2000),
            "x Wheat rust Stem rust & leaf rust spread fast."
        );
    }

    #[test]
    fn test_decode_numeric_entities() {
        let html = "<p>It&#8217;s a grower&#x2019;s &#39;best&#39; bet &amp;lt; &copy; &#xZZ; &#1114112;</p>";

        assert_eq!(
            extract_page_text(html, 2000),
            "It\u{2019}s a grower\u{2019}s 'best' bet &lt; &copy; &#xZZ; &#1114112;"
        );
    }

    #[test]
    fn test_extract_page_text_caps_length() {
        let html = format!("<p>{}</p>", "é".repeat(50));
        assert_eq!(extract_page_text(&html, 10).chars().count(), 10);
    }

    #[test]
    fn test_base_url_trimmed() {
        let search = SearxSearch::new("http://localhost:8888/").with_max_page_chars(500);
        assert_eq!(search.base_url, "http://localhost:8888");
        assert_eq!(search.max_page_chars, 500);
    }

    #[test]
    fn test_parse_searx_response() {
        let body: SearxResponse = serde_json::from_str(
            r#"{"query":"q","results":[{"url":"https://a.org","title":"A","content":"snip"},{"url":"https://b.org"}]}"#,
        )
        .unwrap();

        assert_eq!(body.results.len(), 2);
        assert_eq!(body.results[1].title, "");
    }
}

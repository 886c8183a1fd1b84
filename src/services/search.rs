//! Web search via DuckDuckGo's HTML endpoint.
//!
//! The HTML-only page needs no JavaScript; result snippets are scraped with
//! CSS selectors and read back by [`summarize`].

use super::WebSearch;
use crate::error::{AssistantError, Result};
use async_trait::async_trait;
use regex::Regex;
use scraper::{Html, Selector};
use std::sync::LazyLock;
use tracing::{debug, trace};

#[allow(clippy::expect_used)]
static TRAILING_ELLIPSIS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\.\.\.|…)$").expect("valid trailing ellipsis regex"));

#[allow(clippy::expect_used)]
static INNER_ELLIPSIS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\.\.\.|…)\s").expect("valid inner ellipsis regex"));

/// DuckDuckGo HTML scraper.
pub struct DuckDuckGo {
    client: reqwest::Client,
    url: String,
}

impl DuckDuckGo {
    pub fn new(url: &str, client: reqwest::Client) -> Self {
        Self {
            client,
            url: url.to_owned(),
        }
    }
}

#[async_trait]
impl WebSearch for DuckDuckGo {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<String>> {
        trace!(query, "web search");
        let html = self
            .client
            .post(&self.url)
            .form(&[("q", query)])
            .header("Accept-Language", "en-US,en;q=0.9")
            .send()
            .await
            .map_err(|e| AssistantError::Service(format!("search request failed: {e}")))?
            .error_for_status()
            .map_err(|e| AssistantError::Service(format!("search HTTP error: {e}")))?
            .text()
            .await
            .map_err(|e| AssistantError::Service(format!("search response read failed: {e}")))?;

        parse_snippets(&html, max_results)
    }
}

/// Pull result snippets out of a results page, skipping ads.
pub(crate) fn parse_snippets(html: &str, max_results: usize) -> Result<Vec<String>> {
    let document = Html::parse_document(html);
    let result_sel = Selector::parse(".result:not(.result--ad), .web-result:not(.result--ad)")
        .map_err(|e| AssistantError::Service(format!("invalid result selector: {e:?}")))?;
    let snippet_sel = Selector::parse(".result__snippet")
        .map_err(|e| AssistantError::Service(format!("invalid snippet selector: {e:?}")))?;

    let mut snippets = Vec::new();
    for element in document.select(&result_sel) {
        let Some(snippet) = element.select(&snippet_sel).next() else {
            continue;
        };
        let text = snippet
            .text()
            .collect::<String>()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        if text.is_empty() {
            continue;
        }
        snippets.push(text);
        if snippets.len() >= max_results {
            break;
        }
    }
    debug!(count = snippets.len(), "search snippets parsed");
    Ok(snippets)
}

/// Spoken summary of the top results, or `None` when there are none.
///
/// Trailing ellipses are turned into full stops so the voice does not read
/// "dot dot dot".
pub fn summarize(snippets: &[String]) -> Option<String> {
    let summary = match snippets {
        [] => return None,
        [only] => format!("Here is what I found. {only}"),
        [first, second, ..] => format!("Here is what I found. {first} Also, {second}"),
    };
    let summary = TRAILING_ELLIPSIS.replace(&summary, ".");
    Some(INNER_ELLIPSIS.replace_all(&summary, ". ").into_owned())
}

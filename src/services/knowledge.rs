//! Encyclopedia summaries from the Wikipedia REST API.

use super::{Knowledge, KnowledgeBase};
use crate::error::{AssistantError, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

/// Number of sentences read back to the user.
const SUMMARY_SENTENCES: usize = 2;

#[derive(Deserialize)]
struct PageSummary {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    extract: String,
}

/// `GET {base}/page/summary/{title}` client.
pub struct Wikipedia {
    client: reqwest::Client,
    base_url: String,
}

impl Wikipedia {
    pub fn new(base_url: &str, client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
        }
    }
}

#[async_trait]
impl KnowledgeBase for Wikipedia {
    async fn lookup(&self, query: &str) -> Result<Knowledge> {
        let title = query.trim().replace(' ', "_");
        let url = format!(
            "{}/page/summary/{}?redirect=true",
            self.base_url,
            urlencoding::encode(&title)
        );
        debug!("knowledge lookup: {url}");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AssistantError::Service(format!("wikipedia: {e}")))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Knowledge::NotFound);
        }
        if !response.status().is_success() {
            return Err(AssistantError::Service(format!(
                "wikipedia: HTTP {}",
                response.status()
            )));
        }

        let page: PageSummary = response
            .json()
            .await
            .map_err(|e| AssistantError::Service(format!("wikipedia: bad response: {e}")))?;
        if page.kind == "disambiguation" {
            return Ok(Knowledge::Ambiguous);
        }
        let summary = first_sentences(&page.extract, SUMMARY_SENTENCES);
        if summary.is_empty() {
            Ok(Knowledge::NotFound)
        } else {
            Ok(Knowledge::Summary(summary))
        }
    }
}

/// The first `n` sentences of `text`.
fn first_sentences(text: &str, n: usize) -> String {
    let text = text.trim();
    let mut seen = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if !matches!(c, '.' | '?' | '!') {
            continue;
        }
        let at_boundary = chars.peek().is_none_or(|(_, next)| next.is_whitespace());
        if at_boundary {
            seen += 1;
            if seen == n {
                return text[..i + c.len_utf8()].to_owned();
            }
        }
    }
    text.to_owned()
}

//! Code-density page classifier.
//!
//! Fetches a post's linked page and labels it `CODE` or `NOTCODE` by how
//! much of the visible text sits inside `<code>`/`<pre>` blocks.

use std::time::Duration;

use async_trait::async_trait;
use linkboard_shared::{LinkboardError, Result};
use reqwest::Client;
use scraper::{Html, Selector};

use crate::Classify;

/// User-Agent string for page fetches.
const USER_AGENT: &str = concat!("linkboard/", env!("CARGO_PKG_VERSION"));

/// Pages with more than this share of code text are labeled `CODE`.
const CODE_PROPORTION_THRESHOLD: f64 = 0.07;

/// Pages with at least this much absolute code text are labeled `CODE`
/// regardless of proportion.
const CODE_LENGTH_THRESHOLD: usize = 300;

/// Classifies linked pages by fetching and measuring them.
pub struct PageClassifier {
    client: Client,
}

impl PageClassifier {
    /// Create a classifier whose page fetches time out after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(timeout)
            .build()
            .map_err(|e| LinkboardError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Classify for PageClassifier {
    async fn classify(&self, link_url: &str) -> Result<String> {
        if link_url.is_empty() {
            return Ok(String::new());
        }

        let response = self
            .client
            .get(link_url)
            .send()
            .await
            .map_err(|e| LinkboardError::Network(format!("{link_url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LinkboardError::Network(format!(
                "{link_url}: HTTP {status}"
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| LinkboardError::Network(format!("{link_url}: body read failed: {e}")))?;

        Ok(classify_html(&body))
    }
}

/// Measure a page's code density and produce the classification string:
/// the coarse label followed by a human-readable summary.
fn classify_html(html: &str) -> String {
    let doc = Html::parse_document(html);

    let all_len = selector_text_len(&doc, "body");
    // Nested <code> inside <pre> double-counts; the thresholds absorb it.
    let code_len = selector_text_len(&doc, "code") + selector_text_len(&doc, "pre");

    let proportion = if all_len == 0 {
        0.0
    } else {
        code_len as f64 / all_len as f64
    };

    let label = if proportion > CODE_PROPORTION_THRESHOLD || code_len > CODE_LENGTH_THRESHOLD {
        "CODE"
    } else {
        "NOTCODE"
    };

    format!(
        "{label} {:.1}% code ({code_len}/{all_len})",
        proportion * 100.0
    )
}

/// Total text length under every element matching `selector`.
fn selector_text_len(doc: &Html, selector: &str) -> usize {
    let sel = Selector::parse(selector).unwrap();
    doc.select(&sel)
        .map(|el| el.text().map(str::len).sum::<usize>())
        .sum()
}

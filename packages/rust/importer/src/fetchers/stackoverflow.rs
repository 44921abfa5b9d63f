//! Stack Overflow adapter (Stack Exchange search API).

use async_trait::async_trait;
use linkboard_shared::{Post, Result};
use reqwest::Client;
use serde::Deserialize;

use crate::Fetcher;
use crate::fetchers::{feed_client, get_json};

const BASE_URL: &str = "https://api.stackexchange.com";

/// Fetches recently active questions for one tag.
pub struct StackOverflow {
    site: String,
    endpoint: String,
    client: Client,
}

impl StackOverflow {
    pub fn new(tag: &str, page_size: u32) -> Result<Self> {
        Self::with_base_url(BASE_URL, tag, page_size)
    }

    /// Point the adapter at an alternate host (used by tests).
    pub fn with_base_url(base_url: &str, tag: &str, page_size: u32) -> Result<Self> {
        Ok(Self {
            site: format!("stackoverflow/{tag}"),
            endpoint: format!(
                "{base_url}/2.2/search?page=1&pagesize={page_size}\
                 &order=desc&sort=activity&tagged={tag}&site=stackoverflow"
            ),
            client: feed_client()?,
        })
    }
}

#[derive(Deserialize)]
struct SearchResult {
    items: Vec<Question>,
}

#[derive(Deserialize)]
struct Question {
    title: String,
    link: String,
    #[serde(default)]
    score: i64,
}

#[async_trait]
impl Fetcher for StackOverflow {
    async fn fetch(&self) -> Result<Vec<Post>> {
        let result: SearchResult = get_json(&self.client, &self.endpoint).await?;
        Ok(result
            .items
            .into_iter()
            .map(|q| Post {
                title: q.title,
                link_url: q.link,
                score: q.score,
                ..Post::default()
            })
            .collect())
    }

    fn site(&self) -> &str {
        &self.site
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn parses_question_items() {
        let server = MockServer::start().await;
        let payload = serde_json::json!({
            "items": [
                {"title": "How do I clone an Arc?", "link": "http://example.com/q/1", "score": 9},
            ]
        });
        Mock::given(method("GET"))
            .and(path("/2.2/search"))
            .and(query_param("tagged", "rust"))
            .and(query_param("pagesize", "5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(payload))
            .mount(&server)
            .await;

        let fetcher = StackOverflow::with_base_url(&server.uri(), "rust", 5).expect("build");
        assert_eq!(fetcher.site(), "stackoverflow/rust");

        let posts = fetcher.fetch().await.expect("fetch");
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].title, "How do I clone an Arc?");
        assert_eq!(posts[0].score, 9);
    }

    #[tokio::test]
    async fn non_200_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/2.2/search"))
            .respond_with(ResponseTemplate::new(400))
            .mount(&server)
            .await;

        let fetcher = StackOverflow::with_base_url(&server.uri(), "rust", 5).expect("build");
        assert!(fetcher.fetch().await.is_err());
    }
}

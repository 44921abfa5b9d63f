//! Hacker News feed adapter (via the hnify JSON gateway).

use async_trait::async_trait;
use linkboard_shared::{Post, Result};
use reqwest::Client;
use serde::Deserialize;

use crate::Fetcher;
use crate::fetchers::{feed_client, get_json};

const BASE_URL: &str = "https://hnify.herokuapp.com";

/// Fetches one of the Hacker News front-page feeds.
pub struct HackerNews {
    endpoint: String,
    client: Client,
}

impl HackerNews {
    /// The "top" feed.
    pub fn top() -> Result<Self> {
        Self::with_base_url(BASE_URL, "top")
    }

    /// The "newest" feed.
    pub fn newest() -> Result<Self> {
        Self::with_base_url(BASE_URL, "newest")
    }

    /// The "best" feed.
    pub fn best() -> Result<Self> {
        Self::with_base_url(BASE_URL, "best")
    }

    /// Point the adapter at an alternate gateway (used by tests).
    pub fn with_base_url(base_url: &str, feed: &str) -> Result<Self> {
        Ok(Self {
            endpoint: format!("{base_url}/get/{feed}"),
            client: feed_client()?,
        })
    }
}

#[derive(Deserialize)]
struct Feed {
    stories: Vec<Story>,
}

#[derive(Deserialize)]
struct Story {
    title: String,
    link: String,
    #[serde(default)]
    points: i64,
}

#[async_trait]
impl Fetcher for HackerNews {
    async fn fetch(&self) -> Result<Vec<Post>> {
        let feed: Feed = get_json(&self.client, &self.endpoint).await?;
        Ok(feed
            .stories
            .into_iter()
            .map(|s| Post {
                title: s.title,
                link_url: s.link,
                score: s.points,
                ..Post::default()
            })
            .collect())
    }

    fn site(&self) -> &str {
        "hackernews"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn parses_story_feed() {
        let server = MockServer::start().await;
        let payload = serde_json::json!({
            "stories": [
                {"title": "Show HN: linkboard", "link": "http://example.com/lb", "points": 120},
                {"title": "A story without points", "link": "http://example.com/np"},
            ]
        });
        Mock::given(method("GET"))
            .and(path("/get/top"))
            .respond_with(ResponseTemplate::new(200).set_body_json(payload))
            .mount(&server)
            .await;

        let fetcher = HackerNews::with_base_url(&server.uri(), "top").expect("build");
        let posts = fetcher.fetch().await.expect("fetch");

        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].title, "Show HN: linkboard");
        assert_eq!(posts[0].link_url, "http://example.com/lb");
        assert_eq!(posts[0].score, 120);
        assert_eq!(posts[1].score, 0);
    }

    #[tokio::test]
    async fn non_200_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/get/top"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let fetcher = HackerNews::with_base_url(&server.uri(), "top").expect("build");
        let err = fetcher.fetch().await.expect_err("must fail");
        assert!(err.to_string().contains("503"));
    }
}

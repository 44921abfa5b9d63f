//! Lobsters feed adapter.

use async_trait::async_trait;
use linkboard_shared::{Post, Result};
use reqwest::Client;
use serde::Deserialize;

use crate::Fetcher;
use crate::fetchers::{feed_client, get_json};

const BASE_URL: &str = "https://lobste.rs";

/// Fetches one of the Lobsters story feeds.
pub struct Lobsters {
    endpoint: String,
    client: Client,
}

impl Lobsters {
    /// The "hottest" feed.
    pub fn hottest() -> Result<Self> {
        Self::with_base_url(BASE_URL, "hottest")
    }

    /// The "newest" feed.
    pub fn newest() -> Result<Self> {
        Self::with_base_url(BASE_URL, "newest")
    }

    /// Point the adapter at an alternate host (used by tests).
    pub fn with_base_url(base_url: &str, feed: &str) -> Result<Self> {
        Ok(Self {
            endpoint: format!("{base_url}/{feed}.json"),
            client: feed_client()?,
        })
    }
}

#[derive(Deserialize)]
struct Story {
    title: String,
    url: String,
    #[serde(default)]
    score: i64,
}

#[async_trait]
impl Fetcher for Lobsters {
    async fn fetch(&self) -> Result<Vec<Post>> {
        let stories: Vec<Story> = get_json(&self.client, &self.endpoint).await?;
        Ok(stories
            .into_iter()
            .map(|s| Post {
                title: s.title,
                link_url: s.url,
                score: s.score,
                ..Post::default()
            })
            .collect())
    }

    fn site(&self) -> &str {
        "lobsters"
    }
}

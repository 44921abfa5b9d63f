//! Reddit subreddit adapter.
//!
//! A subreddit exposes several listings of the same pool of submissions, so
//! one fetch merges `hot`, `new` and `top` and collapses duplicates by link
//! URL before anything reaches the store.

use std::collections::HashMap;

use async_trait::async_trait;
use linkboard_shared::{Post, Result};
use reqwest::Client;
use serde::Deserialize;

use crate::Fetcher;
use crate::fetchers::{feed_client, get_json};

const BASE_URL: &str = "https://www.reddit.com";

/// Listings merged per fetch.
const LISTINGS: [&str; 3] = ["hot", "new", "top"];

/// Fetches submissions from a single subreddit.
pub struct Subreddit {
    name: String,
    site: String,
    base_url: String,
    client: Client,
}

impl Subreddit {
    pub fn new(name: &str) -> Result<Self> {
        Self::with_base_url(BASE_URL, name)
    }

    /// Point the adapter at an alternate host (used by tests).
    pub fn with_base_url(base_url: &str, name: &str) -> Result<Self> {
        Ok(Self {
            name: name.to_string(),
            site: format!("/r/{name}"),
            base_url: base_url.trim_end_matches('/').to_string(),
            client: feed_client()?,
        })
    }

    async fn fetch_listing(&self, listing: &str) -> Result<Vec<Post>> {
        let url = format!("{}/r/{}/{listing}.json", self.base_url, self.name);
        let feed: Listing = get_json(&self.client, &url).await?;
        Ok(feed
            .data
            .children
            .into_iter()
            .map(|child| Post {
                title: child.data.title,
                link_url: child.data.url,
                score: child.data.score,
                ..Post::default()
            })
            .collect())
    }
}

#[derive(Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Deserialize)]
struct ListingData {
    children: Vec<Child>,
}

#[derive(Deserialize)]
struct Child {
    data: Submission,
}

#[derive(Deserialize)]
struct Submission {
    title: String,
    url: String,
    #[serde(default)]
    score: i64,
}

#[async_trait]
impl Fetcher for Subreddit {
    async fn fetch(&self) -> Result<Vec<Post>> {
        let mut by_link: HashMap<String, Post> = HashMap::new();
        for listing in LISTINGS {
            for post in self.fetch_listing(listing).await? {
                by_link.insert(post.link_url.clone(), post);
            }
        }
        Ok(by_link.into_values().collect())
    }

    fn site(&self) -> &str {
        &self.site
    }
}

//! Built-in feed adapters.
//!
//! Each adapter wraps one external feed and turns its wire format into
//! candidate posts. Constructors take no endpoint; tests point an adapter at
//! a mock server via its `with_base_url` constructor.

mod hackernews;
mod lobsters;
mod reddit;
mod stackoverflow;

use std::time::Duration;

use linkboard_shared::{LinkboardError, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;

pub use hackernews::HackerNews;
pub use lobsters::Lobsters;
pub use reddit::Subreddit;
pub use stackoverflow::StackOverflow;

/// User-Agent string for feed requests.
const USER_AGENT: &str = concat!("linkboard/", env!("CARGO_PKG_VERSION"));

/// Timeout for a single feed request.
const FEED_TIMEOUT: Duration = Duration::from_secs(10);

/// Build the HTTP client shared by a fetcher's requests.
pub(crate) fn feed_client() -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(FEED_TIMEOUT)
        .build()
        .map_err(|e| LinkboardError::Network(format!("failed to build HTTP client: {e}")))
}

/// GET a feed URL and decode its JSON payload.
pub(crate) async fn get_json<T: DeserializeOwned>(client: &Client, url: &str) -> Result<T> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| LinkboardError::Network(format!("{url}: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(LinkboardError::Network(format!("{url}: HTTP {status}")));
    }

    response
        .json::<T>()
        .await
        .map_err(|e| LinkboardError::parse(format!("{url}: {e}")))
}

//! Multi-source feed importing for linkboard.
//!
//! A [`Fetcher`] wraps one external feed and produces candidate posts.
//! [`import`] pushes one fetcher's candidates through the store's
//! deduplicating submit; [`import_all`] fans out over any number of fetchers
//! concurrently, one task per fetcher, and collects per-site failures
//! without letting one feed's failure cancel the others.

pub mod fetchers;

use std::sync::Arc;

use async_trait::async_trait;
use linkboard_shared::{ImporterConfig, Post, Result};
use linkboard_storage::Storage;

pub use fetchers::{HackerNews, Lobsters, StackOverflow, Subreddit};

// ---------------------------------------------------------------------------
// Capability traits
// ---------------------------------------------------------------------------

/// A Fetcher fetches candidate posts from an external site.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch the feed's current list of candidate posts.
    async fn fetch(&self) -> Result<Vec<Post>>;

    /// Name of the site this fetcher fetches from.
    fn site(&self) -> &str;
}

/// The slice of the store the importer needs: deduplicating submission.
#[async_trait]
pub trait PostSink: Send + Sync {
    /// Submit a candidate, returning the canonical post and whether this
    /// call created it.
    async fn submit(&self, post: Post) -> Result<(Post, bool)>;
}

#[async_trait]
impl PostSink for Storage {
    async fn submit(&self, post: Post) -> Result<(Post, bool)> {
        Storage::submit(self, post).await
    }
}

/// Called once per successfully submitted item, whether newly created or
/// already existing. Invocations arrive concurrently from all fetcher tasks;
/// implementations serialize their own bookkeeping.
pub trait ImportObserver: Send + Sync {
    fn imported(&self, site: &str, post: &Post, created: bool);
}

// ---------------------------------------------------------------------------
// Import
// ---------------------------------------------------------------------------

/// Import posts fetched by `fetcher` into `sink`.
///
/// Candidates are submitted sequentially within this call (parallelism lives
/// across fetchers, not within one fetcher's batch). An item whose submit
/// fails is logged and skipped; the rest of the batch still runs, and the
/// first error is returned once the batch completes so the aggregate caller
/// sees the failure.
pub async fn import(
    sink: &dyn PostSink,
    fetcher: &dyn Fetcher,
    observer: Option<&dyn ImportObserver>,
) -> Result<()> {
    let posts = fetcher.fetch().await?;
    tracing::debug!(site = fetcher.site(), count = posts.len(), "fetched candidates");

    let mut first_err = None;
    for post in posts {
        let link_url = post.link_url.clone();
        match sink.submit(post).await {
            Ok((stored, created)) => {
                if let Some(obs) = observer {
                    obs.imported(fetcher.site(), &stored, created);
                }
            }
            Err(e) => {
                tracing::warn!(
                    site = fetcher.site(),
                    link_url = %link_url,
                    error = %e,
                    "submit failed, continuing with batch"
                );
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
        }
    }

    match first_err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Outcome of a fan-out import run.
#[derive(Debug)]
pub struct ImportSummary {
    /// Number of fetchers that ran.
    pub sites: usize,
    /// Per-site failures (site name, error message).
    pub failures: Vec<(String, String)>,
}

impl ImportSummary {
    /// Whether any fetcher failed.
    pub fn failed(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Run every fetcher concurrently, one task each, and wait for all of them.
///
/// A fetcher's failure is recorded and never cancels its siblings.
pub async fn import_all(
    sink: Arc<dyn PostSink>,
    fetchers: Vec<Arc<dyn Fetcher>>,
    observer: Option<Arc<dyn ImportObserver>>,
) -> ImportSummary {
    let sites = fetchers.len();

    let mut handles = Vec::new();
    for fetcher in fetchers {
        let sink = Arc::clone(&sink);
        let observer = observer.clone();
        handles.push(tokio::spawn(async move {
            let site = fetcher.site().to_string();
            match import(sink.as_ref(), fetcher.as_ref(), observer.as_deref()).await {
                Ok(()) => None,
                Err(e) => {
                    tracing::warn!(site = %site, error = %e, "import failed");
                    Some((site, e.to_string()))
                }
            }
        }));
    }

    let mut failures = Vec::new();
    for handle in handles {
        match handle.await {
            Ok(None) => {}
            Ok(Some(failure)) => failures.push(failure),
            Err(e) => failures.push(("task".into(), e.to_string())),
        }
    }

    ImportSummary { sites, failures }
}

/// Build the fetcher registry from configuration: the Hacker News and
/// Lobsters feeds, one fetcher per configured subreddit, and one per
/// configured Stack Overflow tag.
pub fn default_fetchers(config: &ImporterConfig) -> Result<Vec<Arc<dyn Fetcher>>> {
    let mut fetchers: Vec<Arc<dyn Fetcher>> = vec![
        Arc::new(HackerNews::top()?),
        Arc::new(HackerNews::newest()?),
        Arc::new(HackerNews::best()?),
        Arc::new(Lobsters::hottest()?),
        Arc::new(Lobsters::newest()?),
    ];

    for name in &config.subreddits {
        fetchers.push(Arc::new(Subreddit::new(name)?));
    }
    for tag in &config.stack_tags {
        fetchers.push(Arc::new(StackOverflow::new(tag, config.stack_page_size)?));
    }

    Ok(fetchers)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Mutex;

    use super::*;
    use linkboard_shared::LinkboardError;
    use uuid::Uuid;

    /// Fetcher double returning canned posts or a canned failure.
    struct StubFetcher {
        site: &'static str,
        posts: Vec<Post>,
        fail: bool,
    }

    #[async_trait]
    impl Fetcher for StubFetcher {
        async fn fetch(&self) -> Result<Vec<Post>> {
            if self.fail {
                return Err(LinkboardError::Network(format!("{}: unreachable", self.site)));
            }
            Ok(self.posts.clone())
        }

        fn site(&self) -> &str {
            self.site
        }
    }

    /// In-memory sink double: dedups by link, fails for chosen links.
    #[derive(Default)]
    struct MemorySink {
        submitted: Mutex<Vec<Post>>,
        fail_links: HashSet<String>,
    }

    #[async_trait]
    impl PostSink for MemorySink {
        async fn submit(&self, mut post: Post) -> Result<(Post, bool)> {
            if self.fail_links.contains(&post.link_url) {
                return Err(LinkboardError::SubmitRetriesExhausted {
                    link_url: post.link_url.clone(),
                });
            }
            let mut submitted = self.submitted.lock().unwrap();
            if !post.link_url.is_empty() {
                if let Some(existing) = submitted.iter().find(|p| p.link_url == post.link_url) {
                    return Ok((existing.clone(), false));
                }
            }
            post.id = submitted.len() as i64 + 1;
            submitted.push(post.clone());
            Ok((post, true))
        }
    }

    /// Observer double tallying invocations under a mutex.
    #[derive(Default)]
    struct CountingObserver {
        seen: Mutex<Vec<(String, i64, bool)>>,
    }

    impl ImportObserver for CountingObserver {
        fn imported(&self, site: &str, post: &Post, created: bool) {
            self.seen
                .lock()
                .unwrap()
                .push((site.to_string(), post.id, created));
        }
    }

    fn candidate(title: &str, link_url: &str) -> Post {
        Post {
            title: title.into(),
            link_url: link_url.into(),
            ..Post::default()
        }
    }

    #[tokio::test]
    async fn import_submits_batch_and_notifies_observer() {
        let sink = MemorySink::default();
        let observer = CountingObserver::default();
        let fetcher = StubFetcher {
            site: "mock",
            posts: vec![
                candidate("one", "http://example.com/1"),
                candidate("two", "http://example.com/2"),
            ],
            fail: false,
        };

        import(&sink, &fetcher, Some(&observer)).await.expect("import");

        assert_eq!(sink.submitted.lock().unwrap().len(), 2);
        let seen = observer.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen.iter().all(|(site, _, created)| site == "mock" && *created));
    }

    #[tokio::test]
    async fn import_reports_existing_posts_as_not_created() {
        let sink = MemorySink::default();
        let observer = CountingObserver::default();
        let fetcher = StubFetcher {
            site: "mock",
            posts: vec![
                candidate("first", "http://example.com/same"),
                candidate("second", "http://example.com/same"),
            ],
            fail: false,
        };

        import(&sink, &fetcher, Some(&observer)).await.expect("import");

        let seen = observer.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen[0].2);
        assert!(!seen[1].2);
        assert_eq!(seen[0].1, seen[1].1, "both observe the canonical id");
    }

    #[tokio::test]
    async fn import_propagates_fetch_failure() {
        let sink = MemorySink::default();
        let fetcher = StubFetcher {
            site: "down",
            posts: vec![],
            fail: true,
        };

        let err = import(&sink, &fetcher, None).await.expect_err("must fail");
        assert!(matches!(err, LinkboardError::Network(_)));
        assert!(sink.submitted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn import_continues_batch_past_failing_item() {
        let sink = MemorySink {
            fail_links: HashSet::from(["http://example.com/poison".to_string()]),
            ..MemorySink::default()
        };
        let fetcher = StubFetcher {
            site: "mock",
            posts: vec![
                candidate("ok-1", "http://example.com/1"),
                candidate("poison", "http://example.com/poison"),
                candidate("ok-2", "http://example.com/2"),
            ],
            fail: false,
        };

        let err = import(&sink, &fetcher, None).await.expect_err("surfaces failure");
        assert!(matches!(err, LinkboardError::SubmitRetriesExhausted { .. }));

        // The failing item never drops its siblings.
        let submitted = sink.submitted.lock().unwrap();
        assert_eq!(submitted.len(), 2);
    }

    #[tokio::test]
    async fn import_all_isolates_fetcher_failures() {
        let sink: Arc<dyn PostSink> = Arc::new(MemorySink::default());
        let observer = Arc::new(CountingObserver::default());

        let fetchers: Vec<Arc<dyn Fetcher>> = vec![
            Arc::new(StubFetcher {
                site: "a",
                posts: vec![candidate("a1", "http://a.example.com/1")],
                fail: false,
            }),
            Arc::new(StubFetcher {
                site: "b",
                posts: vec![],
                fail: true,
            }),
            Arc::new(StubFetcher {
                site: "c",
                posts: vec![candidate("c1", "http://c.example.com/1")],
                fail: false,
            }),
        ];

        let shared_observer: Arc<dyn ImportObserver> = observer.clone();
        let summary = import_all(Arc::clone(&sink), fetchers, Some(shared_observer)).await;

        assert_eq!(summary.sites, 3);
        assert!(summary.failed());
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].0, "b");

        let seen = observer.seen.lock().unwrap();
        let sites: HashSet<_> = seen.iter().map(|(site, _, _)| site.as_str()).collect();
        assert_eq!(sites, HashSet::from(["a", "c"]));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn cross_source_duplicate_links_converge_in_storage() {
        let tmp = std::env::temp_dir().join(format!("lb_import_{}.db", Uuid::now_v7()));
        let storage = Arc::new(Storage::open(&tmp).await.expect("open"));
        let observer = Arc::new(CountingObserver::default());

        // Two feeds carrying the same link race through the fan-out.
        let fetchers: Vec<Arc<dyn Fetcher>> = vec![
            Arc::new(StubFetcher {
                site: "feed-a",
                posts: vec![candidate("Shared story", "http://example.com/story")],
                fail: false,
            }),
            Arc::new(StubFetcher {
                site: "feed-b",
                posts: vec![candidate("Shared story again", "http://example.com/story")],
                fail: false,
            }),
        ];

        let sink: Arc<dyn PostSink> = storage.clone();
        let shared_observer: Arc<dyn ImportObserver> = observer.clone();
        let summary = import_all(sink, fetchers, Some(shared_observer)).await;
        assert!(!summary.failed());

        let posts = storage
            .list(&linkboard_shared::ListOptions::default())
            .await
            .expect("list");
        assert_eq!(posts.len(), 1, "one canonical row per link");

        let seen = observer.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        let created: Vec<bool> = seen.iter().map(|(_, _, c)| *c).collect();
        assert_eq!(created.iter().filter(|c| **c).count(), 1);
        assert!(seen.iter().all(|(_, id, _)| *id == posts[0].id));
    }
}

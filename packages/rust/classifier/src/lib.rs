//! Bounded-concurrency post classification for linkboard.
//!
//! A [`ClassifierPool`] pages through the stored posts and hands each one to
//! a fixed set of workers. A worker classifies the post's link through an
//! external [`Classify`] call and persists the result only when the coarse
//! label actually changed, so unchanged posts cost no write. The worker
//! count exists to cap outbound calls to the classify dependency.

pub mod page;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use linkboard_shared::{ListOptions, Post, Result, first_token};
use linkboard_storage::Storage;
use tokio::sync::{Mutex, mpsc};

pub use page::PageClassifier;

// ---------------------------------------------------------------------------
// Capability traits
// ---------------------------------------------------------------------------

/// Computes a classification string for a link URL.
///
/// The first whitespace-delimited token of the result is the coarse label;
/// the remainder is free-form detail.
#[async_trait]
pub trait Classify: Send + Sync {
    async fn classify(&self, link_url: &str) -> Result<String>;
}

/// The slice of the store the pool needs: paging and conditional updates.
#[async_trait]
pub trait PostStore: Send + Sync {
    async fn list(&self, opts: &ListOptions) -> Result<Vec<Post>>;
    async fn update(&self, post: &Post) -> Result<()>;
}

#[async_trait]
impl PostStore for Storage {
    async fn list(&self, opts: &ListOptions) -> Result<Vec<Post>> {
        Storage::list(self, opts).await
    }

    async fn update(&self, post: &Post) -> Result<()> {
        Storage::update(self, post).await
    }
}

// ---------------------------------------------------------------------------
// Pool
// ---------------------------------------------------------------------------

/// Summary of a completed classification run.
#[derive(Debug, Default)]
pub struct ClassifySummary {
    /// Coarse label → number of posts whose label changed to it.
    pub changes: HashMap<String, usize>,
}

/// Fixed-size pool of classify workers fed from a paginated store scan.
pub struct ClassifierPool {
    concurrency: usize,
    page_size: u32,
}

impl ClassifierPool {
    pub fn new(concurrency: usize, page_size: u32) -> Self {
        Self {
            concurrency: concurrency.max(1),
            page_size: page_size.max(1),
        }
    }

    /// Classify every stored post once and report the label change tally.
    ///
    /// The coordinator pages through `list` without waiting on the workers,
    /// pushing every post onto a shared queue; an empty page ends
    /// production. Closing the queue is the stop signal: each worker
    /// finishes its current item, drains what is left, and exits. The pool
    /// is joined before the tally is returned.
    pub async fn run(
        &self,
        store: Arc<dyn PostStore>,
        classify: Arc<dyn Classify>,
    ) -> Result<ClassifySummary> {
        let (queue_tx, queue_rx) = mpsc::unbounded_channel::<Post>();
        let queue_rx = Arc::new(Mutex::new(queue_rx));
        let tally = Arc::new(Mutex::new(HashMap::new()));

        let mut workers = Vec::new();
        for worker_id in 0..self.concurrency {
            let queue_rx = Arc::clone(&queue_rx);
            let store = Arc::clone(&store);
            let classify = Arc::clone(&classify);
            let tally = Arc::clone(&tally);
            workers.push(tokio::spawn(async move {
                loop {
                    let post = { queue_rx.lock().await.recv().await };
                    let Some(post) = post else { break };
                    process_post(store.as_ref(), classify.as_ref(), &tally, post).await;
                }
                tracing::debug!(worker_id, "classify worker exiting");
            }));
        }

        let mut paging_err = None;
        for page in 1u32.. {
            let opts = ListOptions {
                page: Some(page),
                per_page: Some(self.page_size),
                code_only: false,
            };
            match store.list(&opts).await {
                Ok(posts) if posts.is_empty() => break,
                Ok(posts) => {
                    tracing::debug!(page, count = posts.len(), "enqueued page for classification");
                    for post in posts {
                        // Send only fails when every worker already exited,
                        // which cannot happen while we hold the receiver.
                        let _ = queue_tx.send(post);
                    }
                }
                Err(e) => {
                    paging_err = Some(e);
                    break;
                }
            }
        }

        drop(queue_tx);
        for worker in workers {
            let _ = worker.await;
        }

        if let Some(e) = paging_err {
            return Err(e);
        }

        let changes = std::mem::take(&mut *tally.lock().await);
        Ok(ClassifySummary { changes })
    }
}

/// Classify one post and persist the result if its coarse label changed.
///
/// Failures here are per-item: they are logged and never stop the pool.
async fn process_post(
    store: &dyn PostStore,
    classify: &dyn Classify,
    tally: &Mutex<HashMap<String, usize>>,
    mut post: Post,
) {
    let classification = match classify.classify(&post.link_url).await {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(
                link_url = %post.link_url,
                error = %e,
                "classify failed, skipping post"
            );
            return;
        }
    };

    if first_token(&classification) == first_token(&post.classification) {
        tracing::debug!(post_id = post.id, "classification unchanged");
        return;
    }

    post.classification = classification;
    if let Err(e) = store.update(&post).await {
        tracing::warn!(post_id = post.id, error = %e, "failed to persist classification");
        return;
    }

    let coarse = first_token(&post.classification).to_string();
    *tally.lock().await.entry(coarse).or_insert(0) += 1;
    tracing::info!(
        post_id = post.id,
        classification = %post.classification,
        "post reclassified"
    );
}

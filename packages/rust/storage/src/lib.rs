//! libSQL storage layer for linkboard posts.
//!
//! The [`Storage`] struct wraps a libSQL database and enforces the one
//! invariant the rest of the system is built on: at most one persisted post
//! per non-empty link URL, backed by a partial unique index rather than
//! application-level checking, so racing concurrent writers cannot both
//! commit a row for the same link.

mod migrations;

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use libsql::{Connection, Database, Transaction, params};
use linkboard_shared::{LinkboardError, ListOptions, Post, Result};
use rand::Rng;

/// Total attempts a submit makes before giving up on a contested link.
const SUBMIT_MAX_ATTEMPTS: u32 = 3;

/// Upper bound in milliseconds for the randomized backoff between attempts.
const SUBMIT_MAX_BACKOFF_MS: u64 = 75;

/// How long a connection waits on the file lock before reporting busy.
const BUSY_TIMEOUT_MS: u64 = 5_000;

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    db: Database,
    conn: Connection,
}

impl Storage {
    /// Open or create a database at `path` and apply pending migrations.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                LinkboardError::Storage(format!("cannot create {}: {e}", parent.display()))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| LinkboardError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| LinkboardError::Storage(e.to_string()))?;
        configure_connection(&conn).await?;

        let storage = Self { db, conn };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    LinkboardError::Storage(format!(
                        "migration v{} failed: {e}",
                        migration.version
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Open a fresh connection for a write transaction.
    ///
    /// Submit attempts each run on their own connection so that concurrent
    /// submits through a single `Storage` handle contend on the real file
    /// lock, exactly like writers in separate processes.
    async fn write_conn(&self) -> Result<Connection> {
        let conn = self
            .db
            .connect()
            .map_err(|e| LinkboardError::Storage(e.to_string()))?;
        configure_connection(&conn).await?;
        Ok(conn)
    }

    // -----------------------------------------------------------------------
    // Post operations
    // -----------------------------------------------------------------------

    /// Get a post by id.
    pub async fn get(&self, id: i64) -> Result<Post> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, title, link_url, body, submitted_at, author_user_id, score, classification
                 FROM posts WHERE id = ?1",
                params![id],
            )
            .await
            .map_err(|e| LinkboardError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => row_to_post(&row),
            Ok(None) => Err(LinkboardError::NotFound { id }),
            Err(e) => Err(LinkboardError::Storage(e.to_string())),
        }
    }

    /// List a page of posts, most recently submitted first.
    ///
    /// The id tiebreak keeps pagination stable when timestamps collide, so
    /// walking consecutive pages never duplicates or skips a post.
    pub async fn list(&self, opts: &ListOptions) -> Result<Vec<Post>> {
        let sql = if opts.code_only {
            "SELECT id, title, link_url, body, submitted_at, author_user_id, score, classification
             FROM posts
             WHERE classification = 'CODE' OR classification LIKE 'CODE %'
             ORDER BY submitted_at DESC, id DESC
             LIMIT ?1 OFFSET ?2"
        } else {
            "SELECT id, title, link_url, body, submitted_at, author_user_id, score, classification
             FROM posts
             ORDER BY submitted_at DESC, id DESC
             LIMIT ?1 OFFSET ?2"
        };

        let mut rows = self
            .conn
            .query(
                sql,
                params![
                    i64::from(opts.per_page_or_default()),
                    i64::from(opts.offset())
                ],
            )
            .await
            .map_err(|e| LinkboardError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_post(&row)?);
        }
        Ok(results)
    }

    /// Submit a post, deduplicating on its link URL.
    ///
    /// Returns the canonical stored post and whether *this call* created it.
    /// A post with an empty link URL is inserted unconditionally. Otherwise
    /// each attempt runs in its own transaction: look for an existing row
    /// with the same link and hand it back unchanged, else insert. An insert
    /// that loses the race to a concurrent writer (the unique index rejects
    /// it) backs off for a random 0–75 ms and retries the whole check from
    /// scratch, up to [`SUBMIT_MAX_ATTEMPTS`] attempts.
    pub async fn submit(&self, mut post: Post) -> Result<(Post, bool)> {
        post.submitted_at = Utc::now();

        if post.link_url.is_empty() {
            let conn = self.write_conn().await?;
            let id = insert_post(&conn, &post)
                .await
                .map_err(|e| LinkboardError::Storage(e.to_string()))?;
            post.id = id;
            return Ok((post, true));
        }

        for attempt in 1..=SUBMIT_MAX_ATTEMPTS {
            let conn = self.write_conn().await?;
            let tx = conn
                .transaction()
                .await
                .map_err(|e| LinkboardError::Storage(e.to_string()))?;

            if let Some(existing) = query_post_by_link(&tx, &post.link_url).await? {
                // Someone already holds this link: the caller converges on
                // the canonical row, no write occurs.
                tx.commit()
                    .await
                    .map_err(|e| LinkboardError::Storage(e.to_string()))?;
                return Ok((existing, false));
            }

            match insert_post(&tx, &post).await {
                Ok(id) => {
                    tx.commit()
                        .await
                        .map_err(|e| LinkboardError::Storage(e.to_string()))?;
                    post.id = id;
                    return Ok((post, true));
                }
                Err(e) if is_submit_conflict(&e) => {
                    let _ = tx.rollback().await;
                    let delay = rand::thread_rng().gen_range(0..=SUBMIT_MAX_BACKOFF_MS);
                    tracing::debug!(
                        link_url = %post.link_url,
                        attempt,
                        delay_ms = delay,
                        "submit lost insert race, backing off"
                    );
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                }
                Err(e) => {
                    let _ = tx.rollback().await;
                    return Err(LinkboardError::Storage(e.to_string()));
                }
            }
        }

        Err(LinkboardError::SubmitRetriesExhausted {
            link_url: post.link_url,
        })
    }

    /// Overwrite the mutable columns of a post by id (last write wins).
    ///
    /// `id` and `submitted_at` are never rewritten.
    pub async fn update(&self, post: &Post) -> Result<()> {
        let affected = self
            .conn
            .execute(
                "UPDATE posts
                 SET title = ?1, link_url = ?2, body = ?3,
                     author_user_id = ?4, score = ?5, classification = ?6
                 WHERE id = ?7",
                params![
                    post.title.as_str(),
                    post.link_url.as_str(),
                    post.body.as_str(),
                    post.author_user_id,
                    post.score,
                    post.classification.as_str(),
                    post.id
                ],
            )
            .await
            .map_err(|e| LinkboardError::Storage(e.to_string()))?;

        if affected == 0 {
            return Err(LinkboardError::NotFound { id: post.id });
        }
        Ok(())
    }
}

/// Set per-connection pragmas: WAL so readers never block the writer, and a
/// busy timeout so a losing writer queues on the lock instead of failing.
async fn configure_connection(conn: &Connection) -> Result<()> {
    conn.query("PRAGMA journal_mode = WAL", params![])
        .await
        .map_err(|e| LinkboardError::Storage(e.to_string()))?;
    conn.query(
        &format!("PRAGMA busy_timeout = {BUSY_TIMEOUT_MS}"),
        params![],
    )
    .await
    .map_err(|e| LinkboardError::Storage(e.to_string()))?;
    Ok(())
}

/// Classify an insert failure as a lost submit race.
///
/// The canonical signal is the unique index rejecting the row. Under SQLite
/// a loser can also surface as a busy/locked report when its read snapshot
/// went stale behind the winning commit; both mean "a concurrent transaction
/// won, re-check and converge", so both take the retry path. Everything else
/// is a real storage failure and propagates.
fn is_submit_conflict(err: &libsql::Error) -> bool {
    let msg = err.to_string();
    msg.contains("UNIQUE constraint failed")
        || msg.contains("database is locked")
        || msg.contains("database table is locked")
}

/// Look up a post by its link URL inside the given transaction.
async fn query_post_by_link(tx: &Transaction, link_url: &str) -> Result<Option<Post>> {
    let mut rows = tx
        .query(
            "SELECT id, title, link_url, body, submitted_at, author_user_id, score, classification
             FROM posts WHERE link_url = ?1",
            params![link_url],
        )
        .await
        .map_err(|e| LinkboardError::Storage(e.to_string()))?;

    match rows.next().await {
        Ok(Some(row)) => Ok(Some(row_to_post(&row)?)),
        Ok(None) => Ok(None),
        Err(e) => Err(LinkboardError::Storage(e.to_string())),
    }
}

/// Insert a post row, returning the assigned id.
///
/// Returns the raw libsql error so the caller can classify conflicts.
async fn insert_post(conn: &Connection, post: &Post) -> std::result::Result<i64, libsql::Error> {
    conn.execute(
        "INSERT INTO posts (title, link_url, body, submitted_at, author_user_id, score, classification)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            post.title.as_str(),
            post.link_url.as_str(),
            post.body.as_str(),
            post.submitted_at.to_rfc3339(),
            post.author_user_id,
            post.score,
            post.classification.as_str()
        ],
    )
    .await?;
    Ok(conn.last_insert_rowid())
}

/// Convert a database row to a [`Post`].
fn row_to_post(row: &libsql::Row) -> Result<Post> {
    Ok(Post {
        id: row
            .get::<i64>(0)
            .map_err(|e| LinkboardError::Storage(e.to_string()))?,
        title: row
            .get::<String>(1)
            .map_err(|e| LinkboardError::Storage(e.to_string()))?,
        link_url: row
            .get::<String>(2)
            .map_err(|e| LinkboardError::Storage(e.to_string()))?,
        body: row
            .get::<String>(3)
            .map_err(|e| LinkboardError::Storage(e.to_string()))?,
        submitted_at: {
            let s: String = row
                .get(4)
                .map_err(|e| LinkboardError::Storage(e.to_string()))?;
            DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| LinkboardError::Storage(format!("invalid date: {e}")))?
        },
        author_user_id: row.get::<i64>(5).ok(),
        score: row
            .get::<i64>(6)
            .map_err(|e| LinkboardError::Storage(e.to_string()))?,
        classification: row
            .get::<String>(7)
            .map_err(|e| LinkboardError::Storage(e.to_string()))?,
    })
}

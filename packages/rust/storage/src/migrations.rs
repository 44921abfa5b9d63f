//! SQL migration definitions for the linkboard database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a set of SQL statements executed within a transaction.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: posts with link-URL uniqueness",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version   INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Submitted posts
CREATE TABLE IF NOT EXISTS posts (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    title          TEXT NOT NULL,
    link_url       TEXT NOT NULL DEFAULT '',
    body           TEXT NOT NULL DEFAULT '',
    submitted_at   TEXT NOT NULL,
    author_user_id INTEGER,
    score          INTEGER NOT NULL DEFAULT 0,
    classification TEXT NOT NULL DEFAULT ''
);

-- The dedup invariant: at most one post per non-empty link URL.
-- Empty links mean "no link" and are exempt.
CREATE UNIQUE INDEX IF NOT EXISTS idx_posts_link_url
    ON posts(link_url) WHERE link_url <> '';

CREATE INDEX IF NOT EXISTS idx_posts_submitted_at ON posts(submitted_at DESC);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}

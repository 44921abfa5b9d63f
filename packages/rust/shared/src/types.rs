//! Core domain types for linkboard posts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default number of posts per page when the caller does not ask for one.
pub const DEFAULT_PER_PAGE: u32 = 60;

// ---------------------------------------------------------------------------
// Post
// ---------------------------------------------------------------------------

/// A post: a link and short body submitted to and displayed on linkboard.
///
/// `id` and `submitted_at` are assigned by the store at creation and never
/// change afterwards. `link_url` is the dedup key: at most one stored post
/// carries a given non-empty link URL. The empty string means "no link" and
/// is exempt from uniqueness.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Post {
    /// Unique identifier, assigned by the store on creation.
    #[serde(default)]
    pub id: i64,

    /// Title of the post.
    pub title: String,

    /// URL of the link this post is about. Empty means no link.
    #[serde(default)]
    pub link_url: String,

    /// Body of the post.
    #[serde(default)]
    pub body: String,

    /// When the post was submitted, set by the store on creation.
    #[serde(default = "epoch")]
    pub submitted_at: DateTime<Utc>,

    /// User id of the post's author, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_user_id: Option<i64>,

    /// Score in points, maintained by external ranking logic.
    #[serde(default)]
    pub score: i64,

    /// Classification string. The first whitespace-delimited token is the
    /// coarse label (e.g. `CODE` / `NOTCODE`), the rest is free-form detail.
    #[serde(default)]
    pub classification: String,
}

fn epoch() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

// ---------------------------------------------------------------------------
// ListOptions
// ---------------------------------------------------------------------------

/// Paging and filtering options for listing posts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListOptions {
    /// 1-based page number. Defaults to 1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,

    /// Posts per page. Defaults to [`DEFAULT_PER_PAGE`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub per_page: Option<u32>,

    /// Only return posts whose coarse classification label is `CODE`.
    #[serde(default)]
    pub code_only: bool,
}

impl ListOptions {
    /// A single page with the default page size.
    pub fn page(page: u32) -> Self {
        Self {
            page: Some(page),
            ..Self::default()
        }
    }

    /// The requested page, defaulting to the first.
    pub fn page_or_default(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    /// The requested page size, defaulting to [`DEFAULT_PER_PAGE`].
    pub fn per_page_or_default(&self) -> u32 {
        self.per_page.unwrap_or(DEFAULT_PER_PAGE)
    }

    /// Row offset for the requested page.
    pub fn offset(&self) -> u32 {
        (self.page_or_default() - 1) * self.per_page_or_default()
    }
}

/// The first whitespace-delimited token of a classification string.
///
/// This is the coarse label used for change detection: a token-only string
/// is its own label, and the empty string has the empty label.
pub fn first_token(s: &str) -> &str {
    s.split_whitespace().next().unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_options_defaults() {
        let opts = ListOptions::default();
        assert_eq!(opts.page_or_default(), 1);
        assert_eq!(opts.per_page_or_default(), DEFAULT_PER_PAGE);
        assert_eq!(opts.offset(), 0);
    }

    #[test]
    fn list_options_offset_math() {
        let opts = ListOptions {
            page: Some(3),
            per_page: Some(25),
            code_only: false,
        };
        assert_eq!(opts.offset(), 50);
    }

    #[test]
    fn list_options_page_zero_clamps_to_first() {
        let opts = ListOptions {
            page: Some(0),
            ..ListOptions::default()
        };
        assert_eq!(opts.page_or_default(), 1);
        assert_eq!(opts.offset(), 0);
    }

    #[test]
    fn first_token_extraction() {
        assert_eq!(first_token("CODE 12.3% code (400/3200)"), "CODE");
        assert_eq!(first_token("NOTCODE"), "NOTCODE");
        assert_eq!(first_token(""), "");
        assert_eq!(first_token("  leading space"), "leading");
    }

    #[test]
    fn post_serialization_roundtrip() {
        let post = Post {
            id: 7,
            title: "A post".into(),
            link_url: "https://example.com/article".into(),
            body: "body text".into(),
            submitted_at: Utc::now(),
            author_user_id: Some(3),
            score: 12,
            classification: "CODE 9.1% code (300/3300)".into(),
        };

        let json = serde_json::to_string(&post).expect("serialize");
        let parsed: Post = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, post);
    }

    #[test]
    fn post_deserializes_sparse_candidate() {
        // Fetchers produce candidates with only title/link/score set.
        let json = r#"{"title": "t", "link_url": "http://x.com", "score": 5}"#;
        let post: Post = serde_json::from_str(json).expect("deserialize");
        assert_eq!(post.id, 0);
        assert_eq!(post.score, 5);
        assert!(post.classification.is_empty());
        assert!(post.author_user_id.is_none());
    }
}

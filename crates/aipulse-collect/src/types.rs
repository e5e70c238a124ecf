//! Ephemeral collection types shared by the source adapters and the pipeline.

use chrono::{DateTime, Utc};

use aipulse_core::SourceKind;

/// Popularity and activity signals attached to a fetched item.
///
/// Every field is optional: adapters fill in what their API exposes and leave
/// the rest `None`. The scorer treats missing signals as "unknown", never as
/// zero, where the distinction matters (growth rates get half credit).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceSignals {
    pub stars: Option<i64>,
    pub forks: Option<i64>,
    pub open_issues: Option<i64>,
    pub downloads: Option<i64>,
    pub likes: Option<i64>,
    pub citations: Option<i64>,
    /// Commits pushed in the trailing 30 days (GitHub only).
    pub commit_count_30d: Option<i64>,
    pub star_growth_per_day: Option<f64>,
    pub download_growth_per_day: Option<f64>,
    pub comment_count: Option<i64>,
    /// Whether the article is behind a paywall (Zenn only).
    pub is_premium: Option<bool>,
}

/// One candidate item fetched from a source API, before scoring, dedup and
/// persistence. The canonical identity is `url`.
///
/// `raw` carries source-specific keys preserved verbatim into `raw_data`:
/// - github: `full_name`, `language`, `license`, `topics`
/// - arxiv: `arxiv_id`, `authors`, `categories`
/// - huggingface: `model_id`, `pipeline_tag`, `library_name`
/// - zenn: `slug`, `username`, `article_type`
#[derive(Debug, Clone)]
pub struct RawItem {
    pub title: String,
    pub source: SourceKind,
    pub url: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub signals: SourceSignals,
    pub published_at: Option<DateTime<Utc>>,
    pub raw: serde_json::Map<String, serde_json::Value>,
}

impl RawItem {
    /// Minimal constructor; adapters fill in the rest field by field.
    #[must_use]
    pub fn new(source: SourceKind, title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            source,
            url: url.into(),
            description: None,
            tags: Vec::new(),
            signals: SourceSignals::default(),
            published_at: None,
            raw: serde_json::Map::new(),
        }
    }
}

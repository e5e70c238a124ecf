//! Database operations for the `items` table.
//!
//! Items are keyed by their canonical URL (`UNIQUE`). Inserts use
//! `ON CONFLICT (url) DO NOTHING`, so a duplicate-URL race between two runs
//! resolves to a silent skip rather than an error — the uniqueness constraint
//! is the source of truth for deduplication.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use aipulse_core::SourceKind;

use crate::DbError;

/// A row from the `items` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ItemRow {
    pub id: i64,
    pub public_id: Uuid,
    pub title: String,
    pub source: String,
    pub url: String,
    pub short_summary: Option<String>,
    pub summary: Option<String>,
    pub tags: Vec<String>,
    pub quality_score: f64,
    pub stars: Option<i64>,
    pub forks: Option<i64>,
    pub open_issues: Option<i64>,
    pub downloads: Option<i64>,
    pub likes: Option<i64>,
    pub citations: Option<i64>,
    pub trial_suggestion: Option<String>,
    pub raw_data: serde_json::Value,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An item about to be persisted by the collector.
#[derive(Debug, Clone)]
pub struct NewItem {
    pub title: String,
    pub source: SourceKind,
    pub url: String,
    pub short_summary: Option<String>,
    pub summary: Option<String>,
    pub tags: Vec<String>,
    pub quality_score: f64,
    pub stars: Option<i64>,
    pub forks: Option<i64>,
    pub open_issues: Option<i64>,
    pub downloads: Option<i64>,
    pub likes: Option<i64>,
    pub citations: Option<i64>,
    pub trial_suggestion: Option<String>,
    pub raw_data: serde_json::Value,
    pub published_at: Option<DateTime<Utc>>,
}

/// Result of an insert attempt against the unique-URL constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted { id: i64 },
    /// An item with the same URL already exists; nothing was written.
    DuplicateUrl,
}

const ITEM_COLUMNS: &str = "id, public_id, title, source, url, short_summary, summary, tags, \
     quality_score, stars, forks, open_issues, downloads, likes, citations, \
     trial_suggestion, raw_data, published_at, created_at, updated_at";

/// Inserts a new item unless its URL is already present.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails for any reason other than a
/// URL conflict.
pub async fn insert_item_if_new(pool: &PgPool, item: &NewItem) -> Result<InsertOutcome, DbError> {
    let inserted_id: Option<i64> = sqlx::query_scalar(
        "INSERT INTO items \
             (public_id, title, source, url, short_summary, summary, tags, quality_score, \
              stars, forks, open_issues, downloads, likes, citations, trial_suggestion, \
              raw_data, published_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17) \
         ON CONFLICT (url) DO NOTHING \
         RETURNING id",
    )
    .bind(Uuid::new_v4())
    .bind(&item.title)
    .bind(item.source.as_str())
    .bind(&item.url)
    .bind(&item.short_summary)
    .bind(&item.summary)
    .bind(&item.tags)
    .bind(item.quality_score)
    .bind(item.stars)
    .bind(item.forks)
    .bind(item.open_issues)
    .bind(item.downloads)
    .bind(item.likes)
    .bind(item.citations)
    .bind(&item.trial_suggestion)
    .bind(&item.raw_data)
    .bind(item.published_at)
    .fetch_optional(pool)
    .await?;

    Ok(match inserted_id {
        Some(id) => InsertOutcome::Inserted { id },
        None => InsertOutcome::DuplicateUrl,
    })
}

/// Fetches an item by its canonical URL.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_item_by_url(pool: &PgPool, url: &str) -> Result<Option<ItemRow>, DbError> {
    let row = sqlx::query_as::<_, ItemRow>(&format!(
        "SELECT {ITEM_COLUMNS} FROM items WHERE url = $1"
    ))
    .bind(url)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Counts all persisted items, optionally restricted to one source.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_items(pool: &PgPool, source: Option<SourceKind>) -> Result<i64, DbError> {
    let count = match source {
        Some(kind) => {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM items WHERE source = $1")
                .bind(kind.as_str())
                .fetch_one(pool)
                .await?
        }
        None => {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM items")
                .fetch_one(pool)
                .await?
        }
    };
    Ok(count)
}

/// Returns items whose long summary has not been produced yet, newest first.
///
/// Used by the deferred AI-enrichment pass after collection runs.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_items_missing_summary(
    pool: &PgPool,
    limit: i64,
) -> Result<Vec<ItemRow>, DbError> {
    let rows = sqlx::query_as::<_, ItemRow>(&format!(
        "SELECT {ITEM_COLUMNS} FROM items \
         WHERE summary IS NULL OR summary = '' \
         ORDER BY created_at DESC \
         LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Returns items ordered by staleness (`updated_at` ascending) for the
/// metadata enricher, optionally restricted to one source.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_items_for_refresh(
    pool: &PgPool,
    source: Option<SourceKind>,
    limit: i64,
) -> Result<Vec<ItemRow>, DbError> {
    let rows = match source {
        Some(kind) => {
            sqlx::query_as::<_, ItemRow>(&format!(
                "SELECT {ITEM_COLUMNS} FROM items \
                 WHERE source = $1 \
                 ORDER BY updated_at ASC \
                 LIMIT $2"
            ))
            .bind(kind.as_str())
            .bind(limit)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, ItemRow>(&format!(
                "SELECT {ITEM_COLUMNS} FROM items \
                 ORDER BY updated_at ASC \
                 LIMIT $1"
            ))
            .bind(limit)
            .fetch_all(pool)
            .await?
        }
    };

    Ok(rows)
}

/// AI-enrichment output applied to an item. Every field is fill-only-empty:
/// a value is written only when the stored column is currently NULL or empty,
/// so enrichment never overwrites earlier content.
#[derive(Debug, Clone, Default)]
pub struct EnrichmentPatch {
    pub short_summary: Option<String>,
    pub summary: Option<String>,
    pub tags: Option<Vec<String>>,
    pub trial_suggestion: Option<String>,
}

/// Applies an [`EnrichmentPatch`] to an item, filling only empty fields.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no item has the given `id`, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn update_item_enrichment(
    pool: &PgPool,
    id: i64,
    patch: &EnrichmentPatch,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE items SET \
             short_summary = CASE \
                 WHEN short_summary IS NULL OR short_summary = '' \
                 THEN COALESCE($2, short_summary) ELSE short_summary END, \
             summary = CASE \
                 WHEN summary IS NULL OR summary = '' \
                 THEN COALESCE($3, summary) ELSE summary END, \
             tags = CASE \
                 WHEN cardinality(tags) = 0 \
                 THEN COALESCE($4, tags) ELSE tags END, \
             trial_suggestion = CASE \
                 WHEN trial_suggestion IS NULL OR trial_suggestion = '' \
                 THEN COALESCE($5, trial_suggestion) ELSE trial_suggestion END, \
             updated_at = NOW() \
         WHERE id = $1",
    )
    .bind(id)
    .bind(&patch.short_summary)
    .bind(&patch.summary)
    .bind(&patch.tags)
    .bind(&patch.trial_suggestion)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// Refreshed popularity counters from a source API, plus a JSON patch merged
/// into `raw_data`. Counter fields are overwritten only when the refresh call
/// returned a value (`None` leaves the stored value untouched).
#[derive(Debug, Clone, Default)]
pub struct MetadataPatch {
    pub stars: Option<i64>,
    pub forks: Option<i64>,
    pub open_issues: Option<i64>,
    pub downloads: Option<i64>,
    pub likes: Option<i64>,
    pub citations: Option<i64>,
    pub raw_patch: Option<serde_json::Value>,
}

impl MetadataPatch {
    /// True when the patch would not change anything.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stars.is_none()
            && self.forks.is_none()
            && self.open_issues.is_none()
            && self.downloads.is_none()
            && self.likes.is_none()
            && self.citations.is_none()
            && self.raw_patch.is_none()
    }
}

/// Applies a [`MetadataPatch`] to an item. `raw_data` is merged
/// (`raw_data || patch`), never replaced, so unrelated keys survive.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no item has the given `id`, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn update_item_metadata(
    pool: &PgPool,
    id: i64,
    patch: &MetadataPatch,
) -> Result<(), DbError> {
    let raw_patch = patch
        .raw_patch
        .clone()
        .unwrap_or_else(|| serde_json::json!({}));

    let result = sqlx::query(
        "UPDATE items SET \
             stars = COALESCE($2, stars), \
             forks = COALESCE($3, forks), \
             open_issues = COALESCE($4, open_issues), \
             downloads = COALESCE($5, downloads), \
             likes = COALESCE($6, likes), \
             citations = COALESCE($7, citations), \
             raw_data = raw_data || $8, \
             updated_at = NOW() \
         WHERE id = $1",
    )
    .bind(id)
    .bind(patch.stars)
    .bind(patch.forks)
    .bind(patch.open_issues)
    .bind(patch.downloads)
    .bind(patch.likes)
    .bind(patch.citations)
    .bind(raw_patch)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_patch_is_empty_by_default() {
        assert!(MetadataPatch::default().is_empty());
    }

    #[test]
    fn metadata_patch_with_counter_is_not_empty() {
        let patch = MetadataPatch {
            stars: Some(42),
            ..MetadataPatch::default()
        };
        assert!(!patch.is_empty());
    }

    #[test]
    fn metadata_patch_with_raw_patch_is_not_empty() {
        let patch = MetadataPatch {
            raw_patch: Some(serde_json::json!({"stars": 42})),
            ..MetadataPatch::default()
        };
        assert!(!patch.is_empty());
    }
}

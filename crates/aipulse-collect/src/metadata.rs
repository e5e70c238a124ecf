//! Batched refresh of volatile popularity counters.
//!
//! Items are refreshed oldest-first in fixed-size batches; requests inside a
//! batch run concurrently and a sleep between batches is the only rate-limit
//! back-pressure. A failing item (404, timeout, 429, parse error) is counted
//! and skipped, never aborting the batch.

use std::str::FromStr;
use std::time::Duration;

use futures::future::join_all;
use sqlx::PgPool;

use aipulse_core::SourceKind;
use aipulse_db::{list_items_for_refresh, update_item_metadata, ItemRow, MetadataPatch};

use crate::error::CollectError;
use crate::sources::SourceClients;

/// Counts from an enrichment pass (metadata refresh or deferred AI summary).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichReport {
    pub updated: usize,
    pub failed: usize,
}

/// Splits `total` items into batch sizes: all `batch_size` except a smaller
/// tail. 25 items at batch size 10 become `[10, 10, 5]`.
#[must_use]
pub fn batch_sizes(total: usize, batch_size: usize) -> Vec<usize> {
    if batch_size == 0 {
        return Vec::new();
    }
    let mut sizes = Vec::with_capacity(total.div_ceil(batch_size));
    let mut remaining = total;
    while remaining > 0 {
        let size = remaining.min(batch_size);
        sizes.push(size);
        remaining -= size;
    }
    sizes
}

/// Refreshes popularity counters for the stalest items, optionally limited to
/// one source.
///
/// # Errors
///
/// Returns [`CollectError::Db`] only when the initial listing query fails;
/// per-item refresh failures are counted in the report instead.
pub async fn refresh_metadata(
    pool: &PgPool,
    clients: &SourceClients,
    source: Option<SourceKind>,
    limit: i64,
    batch_size: usize,
    delay: Duration,
) -> Result<EnrichReport, CollectError> {
    let items = list_items_for_refresh(pool, source, limit).await?;
    if items.is_empty() {
        return Ok(EnrichReport::default());
    }

    let batch_count = batch_sizes(items.len(), batch_size).len();
    tracing::info!(
        items = items.len(),
        batches = batch_count,
        "starting metadata refresh"
    );

    let mut report = EnrichReport::default();
    let mut batches = items.chunks(batch_size.max(1)).peekable();
    while let Some(batch) = batches.next() {
        let outcomes = join_all(batch.iter().map(|row| refresh_item(pool, clients, row))).await;
        for ok in outcomes {
            if ok {
                report.updated += 1;
            } else {
                report.failed += 1;
            }
        }

        if batches.peek().is_some() {
            tokio::time::sleep(delay).await;
        }
    }

    tracing::info!(
        updated = report.updated,
        failed = report.failed,
        "metadata refresh finished"
    );
    Ok(report)
}

/// Refreshes one item end to end. Returns `false` on any failure.
async fn refresh_item(pool: &PgPool, clients: &SourceClients, row: &ItemRow) -> bool {
    let patch = match build_patch(clients, row).await {
        Ok(patch) => patch,
        Err(e) => {
            tracing::warn!(id = row.id, url = %row.url, error = %e, "metadata fetch failed");
            return false;
        }
    };

    if patch.is_empty() {
        // The source responded but had nothing new; not a failure.
        return true;
    }

    match update_item_metadata(pool, row.id, &patch).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(id = row.id, error = %e, "metadata update failed");
            false
        }
    }
}

async fn build_patch(
    clients: &SourceClients,
    row: &ItemRow,
) -> Result<MetadataPatch, CollectError> {
    let kind = SourceKind::from_str(&row.source)
        .map_err(|e| CollectError::Api(e.to_string()))?;

    match kind {
        SourceKind::Github => {
            let (owner, repo) = github_repo_path(row)
                .ok_or_else(|| CollectError::Api(format!("no repo path for item {}", row.id)))?;
            let repo = clients.github.get_repo(&owner, &repo).await?;
            Ok(MetadataPatch {
                stars: repo.stargazers_count,
                forks: repo.forks_count,
                open_issues: repo.open_issues_count,
                raw_patch: repo
                    .pushed_at
                    .map(|t| serde_json::json!({ "pushed_at": t.to_rfc3339() })),
                ..MetadataPatch::default()
            })
        }
        SourceKind::Arxiv => {
            let arxiv_id = arxiv_id(row)
                .ok_or_else(|| CollectError::Api(format!("no arXiv id for item {}", row.id)))?;
            let citations = clients.arxiv.get_citation_count(&arxiv_id).await?;
            Ok(MetadataPatch {
                citations,
                ..MetadataPatch::default()
            })
        }
        SourceKind::Huggingface => {
            let model_id = raw_str(row, "model_id")
                .or_else(|| row.url.strip_prefix("https://huggingface.co/").map(str::to_owned))
                .ok_or_else(|| CollectError::Api(format!("no model id for item {}", row.id)))?;
            let model = clients.huggingface.get_model(&model_id).await?;
            Ok(MetadataPatch {
                downloads: model.downloads,
                likes: model.likes,
                ..MetadataPatch::default()
            })
        }
        SourceKind::Zenn => {
            let slug = raw_str(row, "slug")
                .or_else(|| row.url.rsplit('/').next().map(str::to_owned))
                .ok_or_else(|| CollectError::Api(format!("no slug for item {}", row.id)))?;
            let article = clients.zenn.get_article(&slug).await?;
            Ok(MetadataPatch {
                likes: article.liked_count,
                raw_patch: article
                    .comments_count
                    .map(|n| serde_json::json!({ "comments_count": n })),
                ..MetadataPatch::default()
            })
        }
    }
}

/// arXiv ID for a paper item, from `raw_data.arxiv_id` or the `/abs/` URL
/// segment, always without a version suffix.
fn arxiv_id(row: &ItemRow) -> Option<String> {
    raw_str(row, "arxiv_id")
        .or_else(|| {
            row.url
                .split_once("/abs/")
                .map(|(_, id)| crate::sources::strip_version(id.trim_end_matches('/')))
        })
        .filter(|id| !id.is_empty())
}

fn raw_str(row: &ItemRow, key: &str) -> Option<String> {
    row.raw_data
        .get(key)
        .and_then(serde_json::Value::as_str)
        .map(str::to_owned)
}

/// Owner/repo for a GitHub item, from `raw_data.full_name` or the URL path.
fn github_repo_path(row: &ItemRow) -> Option<(String, String)> {
    let full_name = raw_str(row, "full_name").or_else(|| {
        row.url
            .strip_prefix("https://github.com/")
            .map(str::to_owned)
    })?;
    let (owner, repo) = full_name.split_once('/')?;
    if owner.is_empty() || repo.is_empty() {
        return None;
    }
    Some((owner.to_owned(), repo.to_owned()))
}

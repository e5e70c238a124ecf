//! Deferred AI enrichment: fill in long summaries, tags, and trial
//! suggestions for items the collector saved with heuristics only.

use std::str::FromStr;

use sqlx::PgPool;

use aipulse_ai::TextEnricher;
use aipulse_core::SourceKind;
use aipulse_db::{list_items_missing_summary, update_item_enrichment, EnrichmentPatch, ItemRow};

use crate::error::CollectError;
use crate::metadata::EnrichReport;

/// Enriches up to `limit` items whose long summary is still empty. Each item
/// gets a summary, tags (when empty), and a trial suggestion from the AI
/// backend; only currently-empty columns are written.
///
/// A missing AI backend is not an error: the pass is simply a no-op.
///
/// # Errors
///
/// Returns [`CollectError::Db`] only when the initial listing query fails;
/// per-item failures are counted in the report instead.
pub async fn enrich_pending<A: TextEnricher>(
    pool: &PgPool,
    ai: &A,
    lang: &str,
    limit: i64,
) -> Result<EnrichReport, CollectError> {
    if !ai.is_available() {
        tracing::debug!("AI backend not configured, skipping deferred enrichment");
        return Ok(EnrichReport::default());
    }

    let items = list_items_missing_summary(pool, limit).await?;
    if items.is_empty() {
        return Ok(EnrichReport::default());
    }

    tracing::info!(items = items.len(), "starting deferred AI enrichment");

    let mut report = EnrichReport::default();
    for row in &items {
        if enrich_item(pool, ai, lang, row).await {
            report.updated += 1;
        } else {
            report.failed += 1;
        }
    }

    tracing::info!(
        updated = report.updated,
        failed = report.failed,
        "deferred AI enrichment finished"
    );
    Ok(report)
}

async fn enrich_item<A: TextEnricher>(
    pool: &PgPool,
    ai: &A,
    lang: &str,
    row: &ItemRow,
) -> bool {
    let Ok(kind) = SourceKind::from_str(&row.source) else {
        tracing::warn!(id = row.id, source = %row.source, "unknown source on stored item");
        return false;
    };

    let text = enrichment_text(row);

    let summary = match ai.summarize(&text, kind, lang).await {
        Ok(summary) => summary,
        Err(e) => {
            tracing::warn!(id = row.id, error = %e, "AI summary failed");
            return false;
        }
    };

    let tags = if row.tags.is_empty() {
        match ai.extract_tags(&text, lang).await {
            Ok(tags) if !tags.is_empty() => Some(tags),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(id = row.id, error = %e, "AI tag extraction failed");
                None
            }
        }
    } else {
        None
    };

    let trial_suggestion = match ai
        .suggest_trial(&text, tags.as_deref().unwrap_or(&row.tags), lang)
        .await
    {
        Ok(suggestion) => Some(suggestion),
        Err(e) => {
            tracing::warn!(id = row.id, error = %e, "AI trial suggestion failed");
            None
        }
    };

    let patch = EnrichmentPatch {
        short_summary: None,
        summary: Some(summary),
        tags,
        trial_suggestion,
    };

    match update_item_enrichment(pool, row.id, &patch).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(id = row.id, error = %e, "enrichment update failed");
            false
        }
    }
}

/// The richest text we have for a stored item: the preserved description,
/// falling back to the short summary, then the title.
fn enrichment_text(row: &ItemRow) -> String {
    if let Some(description) = row
        .raw_data
        .get("description")
        .and_then(serde_json::Value::as_str)
        .filter(|d| !d.trim().is_empty())
    {
        return format!("{}\n\n{description}", row.title);
    }
    if let Some(short) = row.short_summary.as_deref().filter(|s| !s.trim().is_empty()) {
        return format!("{}\n\n{short}", row.title);
    }
    row.title.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn row(raw_data: serde_json::Value, short_summary: Option<&str>) -> ItemRow {
        ItemRow {
            id: 1,
            public_id: Uuid::new_v4(),
            title: "acme/llm-kit".to_owned(),
            source: "github".to_owned(),
            url: "https://github.com/acme/llm-kit".to_owned(),
            short_summary: short_summary.map(str::to_owned),
            summary: None,
            tags: vec![],
            quality_score: 5.0,
            stars: None,
            forks: None,
            open_issues: None,
            downloads: None,
            likes: None,
            citations: None,
            trial_suggestion: None,
            raw_data,
            published_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn enrichment_text_prefers_preserved_description() {
        let row = row(
            serde_json::json!({"description": "Fast LLM serving."}),
            Some("short"),
        );
        assert_eq!(enrichment_text(&row), "acme/llm-kit\n\nFast LLM serving.");
    }

    #[test]
    fn enrichment_text_falls_back_to_short_summary_then_title() {
        let with_short = row(serde_json::json!({}), Some("A short line."));
        assert_eq!(enrichment_text(&with_short), "acme/llm-kit\n\nA short line.");

        let bare = row(serde_json::json!({}), None);
        assert_eq!(enrichment_text(&bare), "acme/llm-kit");
    }
}

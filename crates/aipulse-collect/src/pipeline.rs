//! Collection pipeline: fan out over sources, filter, score, enrich, persist,
//! and record one health outcome per (source, run).

use std::time::{Duration, Instant};

use futures::future::join_all;
use sqlx::PgPool;

use aipulse_ai::TextEnricher;
use aipulse_core::{SourceKind, SourceSettings, SourcesConfig};
use aipulse_db::{insert_item_if_new, record_health, HealthStatus, InsertOutcome, NewItem};

use crate::error::CollectError;
use crate::scorer;
use crate::sources::{expected_items, SourceClients};
use crate::summary::{heuristic_short_summary, heuristic_tags};
use crate::types::RawItem;

/// Outcome of collecting one source once.
#[derive(Debug, Clone)]
pub struct SourceReport {
    pub source: SourceKind,
    pub status: HealthStatus,
    pub fetched: usize,
    pub filtered: usize,
    pub saved: usize,
    pub duplicates: usize,
    pub duration_secs: f64,
    pub error: Option<String>,
}

/// Outcome of one full collection run across all enabled sources.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub reports: Vec<SourceReport>,
}

impl RunSummary {
    #[must_use]
    pub fn total_saved(&self) -> usize {
        self.reports.iter().map(|r| r.saved).sum()
    }
}

/// The collector: owns the source clients, per-source settings, the AI
/// enrichment backend, and the database pool.
pub struct Collector<A: TextEnricher> {
    pool: PgPool,
    clients: SourceClients,
    sources: SourcesConfig,
    ai: A,
    fetch_timeout: Duration,
    lang: String,
}

impl<A: TextEnricher> Collector<A> {
    pub fn new(
        pool: PgPool,
        clients: SourceClients,
        sources: SourcesConfig,
        ai: A,
        fetch_timeout_secs: u64,
        lang: impl Into<String>,
    ) -> Self {
        Self {
            pool,
            clients,
            sources,
            ai,
            fetch_timeout: Duration::from_secs(fetch_timeout_secs),
            lang: lang.into(),
        }
    }

    /// Collects all enabled sources concurrently. One source's failure never
    /// aborts its siblings; each gets its own report and health record.
    pub async fn run_all(&self) -> RunSummary {
        let enabled = self.sources.enabled_sources();
        tracing::info!(sources = enabled.len(), "starting collection run");

        let reports = join_all(
            enabled
                .into_iter()
                .map(|kind| self.collect_source(kind, self.sources.get(kind))),
        )
        .await;

        let summary = RunSummary { reports };
        tracing::info!(
            saved = summary.total_saved(),
            sources = summary.reports.len(),
            "collection run finished"
        );
        summary
    }

    /// Collects a single source (manual retry path).
    ///
    /// # Errors
    ///
    /// Returns [`CollectError::Api`] when the source is disabled in the
    /// per-source settings.
    pub async fn run_one(&self, kind: SourceKind) -> Result<SourceReport, CollectError> {
        let settings = self.sources.get(kind);
        if !settings.enabled {
            return Err(CollectError::Api(format!("source '{kind}' is disabled")));
        }
        Ok(self.collect_source(kind, settings).await)
    }

    async fn collect_source(&self, kind: SourceKind, settings: SourceSettings) -> SourceReport {
        let started = Instant::now();
        #[allow(clippy::cast_possible_truncation)]
        let expected = expected_items(kind) as i32;

        let fetched = tokio::time::timeout(self.fetch_timeout, self.clients.fetch(kind)).await;

        let items = match fetched {
            Ok(Ok(items)) => items,
            Ok(Err(e)) => {
                tracing::warn!(source = %kind, error = %e, "source fetch failed");
                return self
                    .finish(kind, HealthStatus::Failed, 0, 0, 0, 0, expected, started, Some(e.to_string()))
                    .await;
            }
            Err(_elapsed) => {
                let message = format!(
                    "fetch timed out after {} seconds",
                    self.fetch_timeout.as_secs()
                );
                tracing::warn!(source = %kind, "source fetch timed out");
                return self
                    .finish(kind, HealthStatus::Timeout, 0, 0, 0, 0, expected, started, Some(message))
                    .await;
            }
        };

        let fetched_count = items.len();
        let kept: Vec<RawItem> = items
            .into_iter()
            .filter(|item| passes_threshold(item, &settings))
            .collect();
        let filtered = fetched_count - kept.len();

        let mut saved = 0;
        let mut duplicates = 0;
        for item in kept {
            let new_item = self.build_new_item(item).await;
            match insert_item_if_new(&self.pool, &new_item).await {
                Ok(InsertOutcome::Inserted { .. }) => saved += 1,
                Ok(InsertOutcome::DuplicateUrl) => duplicates += 1,
                Err(e) => {
                    tracing::warn!(source = %kind, url = %new_item.url, error = %e, "item insert failed");
                }
            }
        }

        let status = if saved > 0 {
            HealthStatus::Success
        } else {
            HealthStatus::Partial
        };

        self.finish(
            kind,
            status,
            fetched_count,
            filtered,
            saved,
            duplicates,
            expected,
            started,
            None,
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn finish(
        &self,
        kind: SourceKind,
        status: HealthStatus,
        fetched: usize,
        filtered: usize,
        saved: usize,
        duplicates: usize,
        expected: i32,
        started: Instant,
        error: Option<String>,
    ) -> SourceReport {
        let duration_secs = started.elapsed().as_secs_f64();

        #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
        let collected = saved as i32;
        if let Err(e) = record_health(
            &self.pool,
            kind,
            status,
            collected,
            expected,
            duration_secs,
            error.as_deref(),
        )
        .await
        {
            tracing::warn!(source = %kind, error = %e, "failed to write health record");
        }

        tracing::info!(
            source = %kind,
            status = %status,
            fetched,
            filtered,
            saved,
            duplicates,
            duration_secs,
            "source collection finished"
        );

        SourceReport {
            source: kind,
            status,
            fetched,
            filtered,
            saved,
            duplicates,
            duration_secs,
            error,
        }
    }

    /// Scores and enriches a raw item into a persistable row. AI output is
    /// used when the backend is available; any enrichment failure falls back
    /// to heuristics so the item is never dropped.
    async fn build_new_item(&self, item: RawItem) -> NewItem {
        let quality_score = scorer::score(&item);
        let (short_summary, tags) = self.enrich(&item).await;

        let mut raw = item.raw;
        if let Some(description) = &item.description {
            // Preserved for the deferred AI summary pass.
            raw.insert("description".to_owned(), description.clone().into());
        }

        NewItem {
            title: item.title,
            source: item.source,
            url: item.url,
            short_summary: Some(short_summary),
            summary: None,
            tags,
            quality_score,
            stars: item.signals.stars,
            forks: item.signals.forks,
            open_issues: item.signals.open_issues,
            downloads: item.signals.downloads,
            likes: item.signals.likes,
            citations: item.signals.citations,
            trial_suggestion: None,
            raw_data: serde_json::Value::Object(raw),
            published_at: item.published_at,
        }
    }

    async fn enrich(&self, item: &RawItem) -> (String, Vec<String>) {
        if self.ai.is_available() {
            let text = item.description.as_deref().unwrap_or(&item.title);

            let short_summary = match self.ai.short_summarize(text, &self.lang).await {
                Ok(summary) if !summary.trim().is_empty() => Some(summary),
                Ok(_) => None,
                Err(e) => {
                    tracing::warn!(url = %item.url, error = %e, "AI short summary failed, using heuristic");
                    None
                }
            };
            let tags = match self.ai.extract_tags(text, &self.lang).await {
                Ok(tags) if !tags.is_empty() => Some(tags),
                Ok(_) => None,
                Err(e) => {
                    tracing::warn!(url = %item.url, error = %e, "AI tag extraction failed, using heuristic");
                    None
                }
            };

            return (
                short_summary.unwrap_or_else(|| heuristic_short_summary(item)),
                tags.unwrap_or_else(|| heuristic_tags(item)),
            );
        }

        (heuristic_short_summary(item), heuristic_tags(item))
    }
}

/// Hard pre-filter applied before scoring: the source-relevant signal must
/// meet the configured minimum. Unknown signals count as zero here.
fn passes_threshold(item: &RawItem, settings: &SourceSettings) -> bool {
    match item.source {
        SourceKind::Github => item.signals.stars.unwrap_or(0) >= settings.min_stars,
        SourceKind::Arxiv => item.signals.citations.unwrap_or(0) >= settings.min_citations,
        SourceKind::Huggingface => {
            item.signals.downloads.unwrap_or(0) >= settings.min_downloads
        }
        SourceKind::Zenn => item.signals.likes.unwrap_or(0) >= settings.min_likes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn github_item(stars: i64) -> RawItem {
        let mut item = RawItem::new(SourceKind::Github, "acme/x", "https://github.com/acme/x");
        item.signals.stars = Some(stars);
        item
    }

    #[test]
    fn threshold_is_inclusive_at_the_minimum() {
        let settings = SourceSettings {
            min_stars: 100,
            ..SourceSettings::default()
        };
        assert!(!passes_threshold(&github_item(99), &settings));
        assert!(passes_threshold(&github_item(100), &settings));
    }

    #[test]
    fn unknown_signal_fails_a_positive_threshold() {
        let settings = SourceSettings {
            min_stars: 1,
            ..SourceSettings::default()
        };
        let item = RawItem::new(SourceKind::Github, "acme/x", "https://github.com/acme/x");
        assert!(!passes_threshold(&item, &settings));
    }

    #[test]
    fn zero_threshold_passes_everything() {
        let settings = SourceSettings::default();
        let item = RawItem::new(SourceKind::Zenn, "t", "https://zenn.dev/a/articles/t");
        assert!(passes_threshold(&item, &settings));
    }

    #[test]
    fn run_summary_totals_saved_across_reports() {
        let summary = RunSummary {
            reports: vec![
                SourceReport {
                    source: SourceKind::Github,
                    status: HealthStatus::Success,
                    fetched: 20,
                    filtered: 5,
                    saved: 10,
                    duplicates: 5,
                    duration_secs: 1.0,
                    error: None,
                },
                SourceReport {
                    source: SourceKind::Zenn,
                    status: HealthStatus::Partial,
                    fetched: 8,
                    filtered: 8,
                    saved: 0,
                    duplicates: 0,
                    duration_secs: 0.5,
                    error: None,
                },
            ],
        };
        assert_eq!(summary.total_saved(), 10);
    }
}

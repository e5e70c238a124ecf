//! The append-only health ledger: one record per (source, collection run).
//!
//! Records are written once and never mutated. Dashboards and the manual
//! retry endpoint read them back as trailing-window summaries or raw history.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use aipulse_core::SourceKind;

use crate::DbError;

/// Outcome classification for one collection run of one source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// At least one item was saved.
    Success,
    /// The adapter responded but fewer items than expected survived.
    Partial,
    /// The adapter errored outright.
    Failed,
    /// The adapter did not respond within the fetch deadline.
    Timeout,
}

impl HealthStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            HealthStatus::Success => "success",
            HealthStatus::Partial => "partial",
            HealthStatus::Failed => "failed",
            HealthStatus::Timeout => "timeout",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(HealthStatus::Success),
            "partial" => Some(HealthStatus::Partial),
            "failed" => Some(HealthStatus::Failed),
            "timeout" => Some(HealthStatus::Timeout),
            _ => None,
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A row from the `health_records` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct HealthRecordRow {
    pub id: i64,
    pub source: String,
    pub status: String,
    pub items_collected: i32,
    pub items_expected: i32,
    pub duration_secs: f64,
    pub error_message: Option<String>,
    pub checked_at: DateTime<Utc>,
}

/// Derived view over a window of health records.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthSummary {
    /// Percentage of records with `success` status, 0.0–100.0.
    pub success_rate: f64,
    pub avg_duration_secs: f64,
    pub avg_items: f64,
    /// Status of the chronologically most recent record in the window.
    pub last_status: Option<HealthStatus>,
    pub record_count: usize,
}

/// Appends one health record for a collection run.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn record_health(
    pool: &PgPool,
    source: SourceKind,
    status: HealthStatus,
    items_collected: i32,
    items_expected: i32,
    duration_secs: f64,
    error_message: Option<&str>,
) -> Result<HealthRecordRow, DbError> {
    let row = sqlx::query_as::<_, HealthRecordRow>(
        "INSERT INTO health_records \
             (source, status, items_collected, items_expected, duration_secs, error_message) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         RETURNING id, source, status, items_collected, items_expected, \
                   duration_secs, error_message, checked_at",
    )
    .bind(source.as_str())
    .bind(status.as_str())
    .bind(items_collected)
    .bind(items_expected)
    .bind(duration_secs)
    .bind(error_message)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Returns the most recent `limit` records for a source, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn health_history(
    pool: &PgPool,
    source: SourceKind,
    limit: i64,
) -> Result<Vec<HealthRecordRow>, DbError> {
    let rows = sqlx::query_as::<_, HealthRecordRow>(
        "SELECT id, source, status, items_collected, items_expected, \
                duration_secs, error_message, checked_at \
         FROM health_records \
         WHERE source = $1 \
         ORDER BY checked_at DESC, id DESC \
         LIMIT $2",
    )
    .bind(source.as_str())
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Returns all records for a source since `since`, in chronological order.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn health_records_since(
    pool: &PgPool,
    source: SourceKind,
    since: DateTime<Utc>,
) -> Result<Vec<HealthRecordRow>, DbError> {
    let rows = sqlx::query_as::<_, HealthRecordRow>(
        "SELECT id, source, status, items_collected, items_expected, \
                duration_secs, error_message, checked_at \
         FROM health_records \
         WHERE source = $1 AND checked_at >= $2 \
         ORDER BY checked_at ASC, id ASC",
    )
    .bind(source.as_str())
    .bind(since)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Summarizes a window of health records. Pure; record order does not matter —
/// the last status is taken from the record with the greatest `checked_at`.
#[must_use]
pub fn summarize(records: &[HealthRecordRow]) -> HealthSummary {
    if records.is_empty() {
        return HealthSummary {
            success_rate: 0.0,
            avg_duration_secs: 0.0,
            avg_items: 0.0,
            last_status: None,
            record_count: 0,
        };
    }

    #[allow(clippy::cast_precision_loss)]
    let total = records.len() as f64;
    let successes = records
        .iter()
        .filter(|r| r.status == HealthStatus::Success.as_str())
        .count();
    let duration_sum: f64 = records.iter().map(|r| r.duration_secs).sum();
    let items_sum: i64 = records.iter().map(|r| i64::from(r.items_collected)).sum();

    let last = records
        .iter()
        .max_by_key(|r| (r.checked_at, r.id))
        .expect("non-empty window");

    #[allow(clippy::cast_precision_loss)]
    HealthSummary {
        success_rate: (successes as f64) / total * 100.0,
        avg_duration_secs: duration_sum / total,
        avg_items: (items_sum as f64) / total,
        last_status: HealthStatus::parse(&last.status),
        record_count: records.len(),
    }
}

/// The derived health flag surfaced to operators: the trailing-window success
/// rate must exceed `success_rate_threshold` (percent) AND the most recent
/// record must be a success.
#[must_use]
pub fn is_healthy(summary: &HealthSummary, success_rate_threshold: f64) -> bool {
    summary.success_rate > success_rate_threshold
        && summary.last_status == Some(HealthStatus::Success)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(id: i64, status: HealthStatus, collected: i32, minutes_ago: i64) -> HealthRecordRow {
        HealthRecordRow {
            id,
            source: "github".to_string(),
            status: status.as_str().to_string(),
            items_collected: collected,
            items_expected: 20,
            duration_secs: 2.0,
            error_message: None,
            checked_at: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    #[test]
    fn empty_window_summarizes_to_zero() {
        let summary = summarize(&[]);
        assert_eq!(summary.record_count, 0);
        assert!(summary.last_status.is_none());
        assert!((summary.success_rate - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn nine_of_ten_successes_is_ninety_percent() {
        let mut records: Vec<HealthRecordRow> = (0..9)
            .map(|i| record(i, HealthStatus::Success, 5, 100 - i))
            .collect();
        records.push(record(9, HealthStatus::Failed, 0, 1));

        let summary = summarize(&records);
        assert!(
            (summary.success_rate - 90.0).abs() < f64::EPSILON,
            "expected 90.0, got {}",
            summary.success_rate
        );
        // Last status is the chronologically last record's, not the most common.
        assert_eq!(summary.last_status, Some(HealthStatus::Failed));
    }

    #[test]
    fn last_status_uses_latest_checked_at_regardless_of_order() {
        let records = vec![
            record(2, HealthStatus::Failed, 0, 1),
            record(1, HealthStatus::Success, 5, 60),
        ];
        let summary = summarize(&records);
        assert_eq!(summary.last_status, Some(HealthStatus::Failed));
    }

    #[test]
    fn averages_cover_duration_and_items() {
        let records = vec![
            record(1, HealthStatus::Success, 10, 30),
            record(2, HealthStatus::Success, 20, 20),
        ];
        let summary = summarize(&records);
        assert!((summary.avg_items - 15.0).abs() < f64::EPSILON);
        assert!((summary.avg_duration_secs - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn healthy_requires_rate_above_threshold_and_last_success() {
        let summary = HealthSummary {
            success_rate: 90.0,
            avg_duration_secs: 1.0,
            avg_items: 5.0,
            last_status: Some(HealthStatus::Success),
            record_count: 10,
        };
        assert!(is_healthy(&summary, 80.0));

        let last_failed = HealthSummary {
            last_status: Some(HealthStatus::Failed),
            ..summary.clone()
        };
        assert!(!is_healthy(&last_failed, 80.0));

        let low_rate = HealthSummary {
            success_rate: 80.0,
            ..summary
        };
        // The threshold is strict: exactly 80% is not healthy.
        assert!(!is_healthy(&low_rate, 80.0));
    }

    #[test]
    fn status_parse_round_trips() {
        for status in [
            HealthStatus::Success,
            HealthStatus::Partial,
            HealthStatus::Failed,
            HealthStatus::Timeout,
        ] {
            assert_eq!(HealthStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(HealthStatus::parse("unknown"), None);
    }
}

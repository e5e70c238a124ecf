//! Per-source health: trailing-window summaries and raw ledger history.

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use aipulse_core::SourceKind;
use aipulse_db::{health_history, health_records_since, is_healthy, summarize, HealthRecordRow};

use super::{map_db_error, normalize_limit, parse_source, ApiError, ApiResponse, AppState, ResponseMeta};
use crate::middleware::RequestId;

/// Widest health window the API will compute: 30 days.
const MAX_WINDOW_HOURS: i64 = 720;

#[derive(Debug, Deserialize)]
pub(super) struct HealthWindowQuery {
    window_hours: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(super) struct SourceHealthData {
    pub source: SourceKind,
    pub window_hours: i64,
    pub healthy: bool,
    pub success_rate: f64,
    pub avg_duration_secs: f64,
    pub avg_items: f64,
    pub last_status: Option<String>,
    pub record_count: usize,
}

/// `GET /api/v1/sources/{source}/health?window_hours=` — derived health flag
/// plus the summary it was computed from.
pub(super) async fn source_health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(raw_source): Path<String>,
    Query(query): Query<HealthWindowQuery>,
) -> Result<Json<ApiResponse<SourceHealthData>>, ApiError> {
    let kind = parse_source(&req_id.0, &raw_source)?;
    let window_hours = query.window_hours.unwrap_or(24).clamp(1, MAX_WINDOW_HOURS);
    let since = Utc::now() - chrono::Duration::hours(window_hours);

    let records = health_records_since(&state.pool, kind, since)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let summary = summarize(&records);
    let healthy = is_healthy(&summary, state.config.health_success_rate_threshold);

    Ok(Json(ApiResponse {
        data: SourceHealthData {
            source: kind,
            window_hours,
            healthy,
            success_rate: summary.success_rate,
            avg_duration_secs: summary.avg_duration_secs,
            avg_items: summary.avg_items,
            last_status: summary.last_status.map(|s| s.as_str().to_string()),
            record_count: summary.record_count,
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

#[derive(Debug, Deserialize)]
pub(super) struct HistoryQuery {
    limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(super) struct HealthRecordData {
    pub id: i64,
    pub status: String,
    pub items_collected: i32,
    pub items_expected: i32,
    pub duration_secs: f64,
    pub error_message: Option<String>,
    pub checked_at: DateTime<Utc>,
}

impl From<&HealthRecordRow> for HealthRecordData {
    fn from(row: &HealthRecordRow) -> Self {
        Self {
            id: row.id,
            status: row.status.clone(),
            items_collected: row.items_collected,
            items_expected: row.items_expected,
            duration_secs: row.duration_secs,
            error_message: row.error_message.clone(),
            checked_at: row.checked_at,
        }
    }
}

/// `GET /api/v1/sources/{source}/history?limit=` — raw ledger records,
/// newest first.
pub(super) async fn source_history(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(raw_source): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<ApiResponse<Vec<HealthRecordData>>>, ApiError> {
    let kind = parse_source(&req_id.0, &raw_source)?;
    let limit = normalize_limit(query.limit);

    let rows = health_history(&state.pool, kind, limit)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: rows.iter().map(HealthRecordData::from).collect(),
        meta: ResponseMeta::new(req_id.0),
    }))
}

//! Manual pipeline triggers: full collection runs, single-source retries,
//! and on-demand metadata refresh.

use std::time::Duration;

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use aipulse_collect::{RunSummary, SourceReport};
use aipulse_core::SourceKind;

use super::{normalize_limit, parse_source, ApiError, ApiResponse, AppState, ResponseMeta};
use crate::middleware::RequestId;

#[derive(Debug, Serialize)]
pub(super) struct SourceReportData {
    pub source: SourceKind,
    pub status: String,
    pub fetched: usize,
    pub filtered: usize,
    pub saved: usize,
    pub duplicates: usize,
    pub duration_secs: f64,
    pub error: Option<String>,
}

impl From<&SourceReport> for SourceReportData {
    fn from(report: &SourceReport) -> Self {
        Self {
            source: report.source,
            status: report.status.as_str().to_string(),
            fetched: report.fetched,
            filtered: report.filtered,
            saved: report.saved,
            duplicates: report.duplicates,
            duration_secs: report.duration_secs,
            error: report.error.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct RunSummaryData {
    pub total_saved: usize,
    pub reports: Vec<SourceReportData>,
}

impl From<&RunSummary> for RunSummaryData {
    fn from(summary: &RunSummary) -> Self {
        Self {
            total_saved: summary.total_saved(),
            reports: summary.reports.iter().map(SourceReportData::from).collect(),
        }
    }
}

/// `POST /api/v1/collect` — run all enabled sources now.
pub(super) async fn trigger_run(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Json<ApiResponse<RunSummaryData>> {
    let summary = state.collector.run_all().await;
    Json(ApiResponse {
        data: RunSummaryData::from(&summary),
        meta: ResponseMeta::new(req_id.0),
    })
}

/// `POST /api/v1/collect/{source}` — retry a single source.
pub(super) async fn trigger_source(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(raw_source): Path<String>,
) -> Result<Json<ApiResponse<SourceReportData>>, ApiError> {
    let kind = parse_source(&req_id.0, &raw_source)?;

    match state.collector.run_one(kind).await {
        Ok(report) => Ok(Json(ApiResponse {
            data: SourceReportData::from(&report),
            meta: ResponseMeta::new(req_id.0),
        })),
        Err(e) => Err(ApiError::new(req_id.0, "bad_request", e.to_string())),
    }
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct MetadataRefreshRequest {
    pub source: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(super) struct MetadataRefreshData {
    pub updated: usize,
    pub failed: usize,
}

/// `POST /api/v1/enrich/metadata` — re-fetch live counters for stored items.
/// The body is optional; `{}` refreshes every source with the default limit.
pub(super) async fn refresh_metadata(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    body: Option<Json<MetadataRefreshRequest>>,
) -> Result<Json<ApiResponse<MetadataRefreshData>>, ApiError> {
    let request = body.map(|Json(r)| r).unwrap_or_default();

    let source = match &request.source {
        Some(raw) => Some(parse_source(&req_id.0, raw)?),
        None => None,
    };
    let limit = normalize_limit(request.limit);
    let delay = Duration::from_millis(state.config.enrich_batch_delay_ms);

    let report = aipulse_collect::refresh_metadata(
        &state.pool,
        &state.clients,
        source,
        limit,
        state.config.enrich_batch_size,
        delay,
    )
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "metadata refresh failed");
        ApiError::new(req_id.0.clone(), "internal_error", "metadata refresh failed")
    })?;

    Ok(Json(ApiResponse {
        data: MetadataRefreshData {
            updated: report.updated,
            failed: report.failed,
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

//! Scheduler introspection.

use axum::{extract::State, Extension, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{ApiResponse, AppState, ResponseMeta};
use crate::middleware::RequestId;
use crate::scheduler::JobInfo;

#[derive(Debug, Serialize)]
pub(super) struct SchedulerStatusData {
    pub running: bool,
    pub last_run_started_at: Option<DateTime<Utc>>,
    pub last_run_finished_at: Option<DateTime<Utc>>,
    pub last_run_saved: Option<usize>,
    pub last_incremental_success_at: Option<DateTime<Utc>>,
    pub incremental_interval_hours: u32,
    pub jobs: Vec<JobInfo>,
}

/// `GET /api/v1/scheduler/status` — running flag, last-run bookkeeping, and
/// the registered job list.
pub(super) async fn scheduler_status(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Json<ApiResponse<SchedulerStatusData>> {
    let snapshot = state.scheduler.snapshot().await;

    Json(ApiResponse {
        data: SchedulerStatusData {
            running: snapshot.running,
            last_run_started_at: snapshot.last_run_started_at,
            last_run_finished_at: snapshot.last_run_finished_at,
            last_run_saved: snapshot.last_run_saved,
            last_incremental_success_at: snapshot.last_incremental_success_at,
            incremental_interval_hours: state.config.incremental_interval_hours,
            jobs: snapshot.jobs,
        },
        meta: ResponseMeta::new(req_id.0),
    })
}

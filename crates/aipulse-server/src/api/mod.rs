mod collect;
mod sources;
mod status;

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use aipulse_ai::OpenAiClient;
use aipulse_collect::{Collector, SourceClients};
use aipulse_core::{AppConfig, SourceKind};

use crate::middleware::{request_id, RequestId};
use crate::scheduler::SchedulerState;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub collector: Arc<Collector<OpenAiClient>>,
    pub clients: Arc<SourceClients>,
    pub config: Arc<AppConfig>,
    pub scheduler: SchedulerState,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

pub(super) fn normalize_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(50).clamp(1, 200)
}

pub(super) fn map_db_error(request_id: String, error: &aipulse_db::DbError) -> ApiError {
    tracing::error!(error = %error, "database query failed");
    ApiError::new(request_id, "internal_error", "database query failed")
}

pub(super) fn parse_source(request_id: &str, raw: &str) -> Result<SourceKind, ApiError> {
    raw.parse().map_err(|_| {
        ApiError::new(
            request_id,
            "validation_error",
            format!("unknown source '{raw}'"),
        )
    })
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static("x-request-id"),
        ])
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/collect", post(collect::trigger_run))
        .route("/api/v1/collect/{source}", post(collect::trigger_source))
        .route("/api/v1/enrich/metadata", post(collect::refresh_metadata))
        .route("/api/v1/scheduler/status", get(status::scheduler_status))
        .route("/api/v1/sources/{source}/health", get(sources::source_health))
        .route(
            "/api/v1/sources/{source}/history",
            get(sources::source_history),
        )
        .layer(
            ServiceBuilder::new()
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let meta = ResponseMeta::new(req_id.0);

    match aipulse_db::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse {
                data: HealthData {
                    status: "ok",
                    database: "ok",
                },
                meta,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    data: HealthData {
                        status: "degraded",
                        database: "unavailable",
                    },
                    meta,
                }),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::collect::SourceReportData;
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use std::net::SocketAddr;
    use std::path::PathBuf;
    use tower::ServiceExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use aipulse_collect::sources::{ArxivClient, GithubClient, HuggingFaceClient, ZennClient};
    use aipulse_core::{Environment, SourceSettings, SourcesConfig};

    const USER_AGENT: &str = "aipulse-tests/0.1";

    fn test_config() -> AppConfig {
        AppConfig {
            database_url: "postgres://unused".to_string(),
            env: Environment::Test,
            bind_addr: "127.0.0.1:0".parse::<SocketAddr>().expect("addr"),
            log_level: "info".to_string(),
            sources_path: PathBuf::from("config/sources.yaml"),
            openai_api_key: None,
            openai_base_url: "https://api.openai.com/".to_string(),
            openai_model: "gpt-4o-mini".to_string(),
            github_token: None,
            db_max_connections: 5,
            db_min_connections: 1,
            db_acquire_timeout_secs: 5,
            fetch_timeout_secs: 5,
            fetch_user_agent: USER_AGENT.to_string(),
            incremental_interval_hours: 6,
            full_run_hour_utc: 3,
            watchdog_stale_hours: 2,
            enrich_batch_size: 10,
            enrich_batch_delay_ms: 0,
            enrich_lang: "en".to_string(),
            health_success_rate_threshold: 80.0,
        }
    }

    fn test_clients(base_url: &str) -> SourceClients {
        SourceClients {
            github: GithubClient::with_base_url(None, 5, USER_AGENT, base_url).expect("github"),
            arxiv: ArxivClient::with_base_urls(5, USER_AGENT, base_url, base_url).expect("arxiv"),
            huggingface: HuggingFaceClient::with_base_url(5, USER_AGENT, base_url).expect("hf"),
            zenn: ZennClient::with_base_url(5, USER_AGENT, base_url).expect("zenn"),
        }
    }

    fn github_only_sources() -> SourcesConfig {
        let mut sources = SourcesConfig::default();
        sources.set(SourceKind::Github, SourceSettings::default());
        for kind in [SourceKind::Arxiv, SourceKind::Huggingface, SourceKind::Zenn] {
            sources.set(
                kind,
                SourceSettings {
                    enabled: false,
                    ..SourceSettings::default()
                },
            );
        }
        sources
    }

    fn test_state(pool: sqlx::PgPool, base_url: &str) -> AppState {
        let ai = OpenAiClient::new(None, "gpt-4o-mini", 5).expect("ai client");
        let collector = Arc::new(Collector::new(
            pool.clone(),
            test_clients(base_url),
            github_only_sources(),
            ai,
            5,
            "en",
        ));

        AppState {
            pool,
            collector,
            clients: Arc::new(test_clients(base_url)),
            config: Arc::new(test_config()),
            scheduler: SchedulerState::new(),
        }
    }

    async fn mount_github_search(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/search/repositories"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "total_count": 1,
                "items": [{
                    "full_name": "acme/kept",
                    "html_url": "https://github.com/acme/kept",
                    "description": "An AI toolkit worth keeping.",
                    "stargazers_count": 500,
                    "forks_count": 4,
                    "open_issues_count": 1,
                    "topics": ["ai"],
                    "language": "Rust",
                    "created_at": "2025-01-01T00:00:00Z",
                    "pushed_at": "2025-08-01T00:00:00Z"
                }]
            })))
            .mount(server)
            .await;
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        serde_json::from_slice(&bytes).expect("json parse")
    }

    fn post(uri: &str) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .body(Body::empty())
            .expect("request")
    }

    #[test]
    fn normalize_limit_applies_defaults_and_bounds() {
        assert_eq!(normalize_limit(None), 50);
        assert_eq!(normalize_limit(Some(0)), 1);
        assert_eq!(normalize_limit(Some(1_000)), 200);
        assert_eq!(normalize_limit(Some(25)), 25);
    }

    #[test]
    fn api_error_validation_error_maps_to_bad_request() {
        let response = ApiError::new("req-1", "validation_error", "invalid input").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn api_error_unknown_code_maps_to_internal_error() {
        let response = ApiError::new("req-1", "boom", "something broke").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn source_report_data_is_serializable() {
        // Proves the type compiles and serde works — no DB needed.
        let report = SourceReportData {
            source: SourceKind::Github,
            status: "success".to_string(),
            fetched: 20,
            filtered: 3,
            saved: 10,
            duplicates: 7,
            duration_secs: 1.5,
            error: None,
        };
        let json = serde_json::to_string(&report).expect("serialize");
        assert!(json.contains("\"source\":\"github\""));
        assert!(json.contains("\"saved\":10"));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn health_returns_ok_when_database_is_reachable(pool: sqlx::PgPool) {
        let server = MockServer::start().await;
        let app = build_app(test_state(pool, &server.uri()));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/health")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["status"].as_str(), Some("ok"));
        assert!(json["meta"]["request_id"].is_string());
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn collect_run_saves_items_and_surfaces_health(pool: sqlx::PgPool) {
        let server = MockServer::start().await;
        mount_github_search(&server).await;
        let state = test_state(pool, &server.uri());

        let response = build_app(state.clone())
            .oneshot(post("/api/v1/collect"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["total_saved"].as_u64(), Some(1));
        assert_eq!(
            json["data"]["reports"].as_array().map(Vec::len),
            Some(1),
            "only github is enabled"
        );

        let response = build_app(state.clone())
            .oneshot(
                Request::builder()
                    .uri("/api/v1/sources/github/history?limit=5")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        let records = json["data"].as_array().expect("data array");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["status"].as_str(), Some("success"));

        let response = build_app(state)
            .oneshot(
                Request::builder()
                    .uri("/api/v1/sources/github/health?window_hours=24")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["healthy"].as_bool(), Some(true));
        assert_eq!(json["data"]["record_count"].as_u64(), Some(1));
        assert_eq!(json["data"]["last_status"].as_str(), Some("success"));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn collect_unknown_source_is_rejected(pool: sqlx::PgPool) {
        let server = MockServer::start().await;
        let app = build_app(test_state(pool, &server.uri()));

        let response = app
            .oneshot(post("/api/v1/collect/reddit"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"].as_str(), Some("validation_error"));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn collect_disabled_source_is_rejected(pool: sqlx::PgPool) {
        let server = MockServer::start().await;
        let app = build_app(test_state(pool, &server.uri()));

        let response = app
            .oneshot(post("/api/v1/collect/zenn"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"].as_str(), Some("bad_request"));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn scheduler_status_reports_idle_state(pool: sqlx::PgPool) {
        let server = MockServer::start().await;
        let app = build_app(test_state(pool, &server.uri()));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/scheduler/status")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["running"].as_bool(), Some(false));
        assert!(json["data"]["last_run_started_at"].is_null());
        assert_eq!(json["data"]["incremental_interval_hours"].as_u64(), Some(6));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn metadata_refresh_without_items_is_a_noop(pool: sqlx::PgPool) {
        let server = MockServer::start().await;
        let app = build_app(test_state(pool, &server.uri()));

        let response = app
            .oneshot(post("/api/v1/enrich/metadata"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["updated"].as_u64(), Some(0));
        assert_eq!(json["data"]["failed"].as_u64(), Some(0));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn metadata_refresh_rejects_unknown_source_in_body(pool: sqlx::PgPool) {
        let server = MockServer::start().await;
        let app = build_app(test_state(pool, &server.uri()));

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/api/v1/enrich/metadata")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"source": "reddit"}"#))
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

//! Live pipeline tests: a migrated Postgres database from `#[sqlx::test]`
//! plus wiremock-backed source clients.

use aipulse_ai::{AiError, TextEnricher};
use aipulse_collect::pipeline::Collector;
use aipulse_collect::sources::{
    ArxivClient, GithubClient, HuggingFaceClient, SourceClients, ZennClient,
};
use aipulse_core::{SourceKind, SourceSettings, SourcesConfig};
use aipulse_db::{count_items, get_item_by_url, health_history, HealthStatus};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const USER_AGENT: &str = "aipulse-tests/0.1";

/// Enricher stub: never available, so the pipeline exercises its heuristic
/// fallback path.
struct NoAi;

impl TextEnricher for NoAi {
    fn is_available(&self) -> bool {
        false
    }

    async fn summarize(
        &self,
        _text: &str,
        _source: SourceKind,
        _lang: &str,
    ) -> Result<String, AiError> {
        Err(AiError::Unavailable)
    }

    async fn short_summarize(&self, _text: &str, _lang: &str) -> Result<String, AiError> {
        Err(AiError::Unavailable)
    }

    async fn extract_tags(&self, _text: &str, _lang: &str) -> Result<Vec<String>, AiError> {
        Err(AiError::Unavailable)
    }

    async fn suggest_trial(
        &self,
        _text: &str,
        _tags: &[String],
        _lang: &str,
    ) -> Result<String, AiError> {
        Err(AiError::Unavailable)
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

fn github_only_sources(min_stars: i64) -> SourcesConfig {
    let mut sources = SourcesConfig::default();
    sources.set(
        SourceKind::Github,
        SourceSettings {
            enabled: true,
            min_stars,
            ..SourceSettings::default()
        },
    );
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

fn repo_json(full_name: &str, stars: i64, description: &str) -> serde_json::Value {
    serde_json::json!({
        "full_name": full_name,
        "html_url": format!("https://github.com/{full_name}"),
        "description": description,
        "stargazers_count": stars,
        "forks_count": 4,
        "open_issues_count": 1,
        "topics": ["ai"],
        "language": "Rust",
        "created_at": "2025-01-01T00:00:00Z",
        "pushed_at": "2025-08-01T00:00:00Z"
    })
}

async fn mount_github_search(server: &MockServer, repos: Vec<serde_json::Value>) {
    Mock::given(method("GET"))
        .and(path("/search/repositories"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "total_count": repos.len(),
            "items": repos
        })))
        .mount(server)
        .await;
}

#[sqlx::test(migrations = "../../migrations")]
async fn run_one_filters_saves_and_records_health(pool: sqlx::PgPool) {
    let server = MockServer::start().await;
    mount_github_search(
        &server,
        vec![
            repo_json("acme/kept", 150, "Meets the star threshold. Extra detail here."),
            repo_json("acme/dropped", 99, "One star below the threshold."),
        ],
    )
    .await;

    let collector = Collector::new(
        pool.clone(),
        test_clients(&server.uri()),
        github_only_sources(100),
        NoAi,
        5,
        "en",
    );

    let report = collector
        .run_one(SourceKind::Github)
        .await
        .expect("github is enabled");

    assert_eq!(report.status, HealthStatus::Success);
    assert_eq!(report.saved, 1, "threshold is min-1 out, min in");
    assert_eq!(report.filtered, 1);

    // Heuristic fallback guarantees a short summary when a description existed.
    let row = get_item_by_url(&pool, "https://github.com/acme/kept")
        .await
        .expect("query")
        .expect("item saved");
    assert_eq!(
        row.short_summary.as_deref(),
        Some("Meets the star threshold.")
    );
    assert!(row.quality_score > 0.0);
    assert_eq!(row.raw_data["description"], "Meets the star threshold. Extra detail here.");

    let history = health_history(&pool, SourceKind::Github, 10)
        .await
        .expect("history");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, "success");
    assert_eq!(history[0].items_collected, 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn second_identical_run_saves_nothing(pool: sqlx::PgPool) {
    let server = MockServer::start().await;
    mount_github_search(
        &server,
        vec![repo_json("acme/kept", 500, "A repo worth keeping around.")],
    )
    .await;

    let collector = Collector::new(
        pool.clone(),
        test_clients(&server.uri()),
        github_only_sources(0),
        NoAi,
        5,
        "en",
    );

    let first = collector.run_one(SourceKind::Github).await.expect("run");
    assert_eq!(first.saved, 1);

    let second = collector.run_one(SourceKind::Github).await.expect("run");
    assert_eq!(second.saved, 0);
    assert_eq!(second.duplicates, 1);
    assert_eq!(second.status, HealthStatus::Partial);

    let total = count_items(&pool, Some(SourceKind::Github)).await.expect("count");
    assert_eq!(total, 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn adapter_failure_records_failed_without_aborting(pool: sqlx::PgPool) {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search/repositories"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let collector = Collector::new(
        pool.clone(),
        test_clients(&server.uri()),
        github_only_sources(0),
        NoAi,
        5,
        "en",
    );

    let report = collector.run_one(SourceKind::Github).await.expect("run");
    assert_eq!(report.status, HealthStatus::Failed);
    assert!(report.error.is_some());

    let history = health_history(&pool, SourceKind::Github, 10)
        .await
        .expect("history");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, "failed");
    assert!(history[0].error_message.is_some());
}

#[sqlx::test(migrations = "../../migrations")]
async fn run_one_rejects_disabled_sources(pool: sqlx::PgPool) {
    let server = MockServer::start().await;
    let collector = Collector::new(
        pool,
        test_clients(&server.uri()),
        github_only_sources(0),
        NoAi,
        5,
        "en",
    );

    let result = collector.run_one(SourceKind::Zenn).await;
    assert!(result.is_err());
}

#[sqlx::test(migrations = "../../migrations")]
async fn run_all_skips_disabled_sources_entirely(pool: sqlx::PgPool) {
    let server = MockServer::start().await;
    mount_github_search(&server, vec![repo_json("acme/kept", 500, "Useful repo.")]).await;

    let collector = Collector::new(
        pool.clone(),
        test_clients(&server.uri()),
        github_only_sources(0),
        NoAi,
        5,
        "en",
    );

    let summary = collector.run_all().await;
    assert_eq!(summary.reports.len(), 1, "only github is enabled");
    assert_eq!(summary.total_saved(), 1);

    // Disabled sources get no health record at all.
    let zenn_history = health_history(&pool, SourceKind::Zenn, 10)
        .await
        .expect("history");
    assert!(zenn_history.is_empty());
}

#[sqlx::test(migrations = "../../migrations")]
async fn sibling_source_failure_does_not_abort_the_run(pool: sqlx::PgPool) {
    let server = MockServer::start().await;
    mount_github_search(&server, vec![repo_json("acme/kept", 500, "Useful repo.")]).await;
    Mock::given(method("GET"))
        .and(path("/api/articles"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let mut sources = github_only_sources(0);
    sources.set(SourceKind::Zenn, SourceSettings::default());

    let collector = Collector::new(
        pool.clone(),
        test_clients(&server.uri()),
        sources,
        NoAi,
        5,
        "en",
    );

    let summary = collector.run_all().await;
    assert_eq!(summary.reports.len(), 2);
    assert_eq!(summary.total_saved(), 1, "github item persists despite zenn failing");

    let github = health_history(&pool, SourceKind::Github, 10)
        .await
        .expect("history");
    assert_eq!(github[0].status, "success");

    let zenn = health_history(&pool, SourceKind::Zenn, 10)
        .await
        .expect("history");
    assert_eq!(zenn[0].status, "failed");
}

#[sqlx::test(migrations = "../../migrations")]
async fn metadata_refresh_updates_counters_in_batches(pool: sqlx::PgPool) {
    let server = MockServer::start().await;
    mount_github_search(
        &server,
        vec![repo_json("acme/kept", 500, "A repo worth keeping around.")],
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/kept"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(repo_json("acme/kept", 640, "A repo worth keeping around.")),
        )
        .mount(&server)
        .await;

    let clients = test_clients(&server.uri());
    let collector = Collector::new(
        pool.clone(),
        test_clients(&server.uri()),
        github_only_sources(0),
        NoAi,
        5,
        "en",
    );
    collector.run_one(SourceKind::Github).await.expect("run");

    let report = aipulse_collect::refresh_metadata(
        &pool,
        &clients,
        Some(SourceKind::Github),
        10,
        10,
        std::time::Duration::from_millis(0),
    )
    .await
    .expect("refresh");

    assert_eq!(report.updated, 1);
    assert_eq!(report.failed, 0);

    let row = get_item_by_url(&pool, "https://github.com/acme/kept")
        .await
        .expect("query")
        .expect("item exists");
    assert_eq!(row.stars, Some(640));
    assert_eq!(row.raw_data["pushed_at"], "2025-08-01T00:00:00+00:00");
}

#[sqlx::test(migrations = "../../migrations")]
async fn metadata_refresh_counts_per_item_failures(pool: sqlx::PgPool) {
    let server = MockServer::start().await;
    mount_github_search(
        &server,
        vec![repo_json("acme/gone", 500, "Will 404 on refresh.")],
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let clients = test_clients(&server.uri());
    let collector = Collector::new(
        pool.clone(),
        test_clients(&server.uri()),
        github_only_sources(0),
        NoAi,
        5,
        "en",
    );
    collector.run_one(SourceKind::Github).await.expect("run");

    let report = aipulse_collect::refresh_metadata(
        &pool,
        &clients,
        None,
        10,
        10,
        std::time::Duration::from_millis(0),
    )
    .await
    .expect("refresh");

    assert_eq!(report.updated, 0);
    assert_eq!(report.failed, 1);
}

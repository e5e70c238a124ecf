mod api;
mod middleware;
mod scheduler;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use aipulse_ai::OpenAiClient;
use aipulse_collect::{Collector, SourceClients};

use crate::api::{build_app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(aipulse_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = aipulse_db::PoolConfig::from_app_config(&config);
    let pool = aipulse_db::connect_pool(&config.database_url, pool_config).await?;
    aipulse_db::run_migrations(&pool).await?;

    let sources = aipulse_core::load_sources(&config.sources_path)?;
    let enricher = Arc::new(build_enricher(&config)?);
    let collector = Arc::new(Collector::new(
        pool.clone(),
        SourceClients::new(&config)?,
        sources,
        build_enricher(&config)?,
        config.fetch_timeout_secs,
        config.enrich_lang.clone(),
    ));
    let clients = Arc::new(SourceClients::new(&config)?);

    let scheduler_state = scheduler::SchedulerState::new();
    let _scheduler = scheduler::build_scheduler(
        Arc::clone(&collector),
        Arc::clone(&enricher),
        Arc::clone(&clients),
        pool.clone(),
        Arc::clone(&config),
        scheduler_state.clone(),
    )
    .await?;

    let app = build_app(AppState {
        pool,
        collector,
        clients,
        config: Arc::clone(&config),
        scheduler: scheduler_state,
    });

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

fn build_enricher(config: &aipulse_core::AppConfig) -> Result<OpenAiClient, aipulse_ai::AiError> {
    OpenAiClient::with_base_url(
        config.openai_api_key.as_deref(),
        &config.openai_model,
        config.fetch_timeout_secs,
        &config.openai_base_url,
    )
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}

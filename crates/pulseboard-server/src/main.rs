mod api;
mod middleware;
mod scheduler;

use std::sync::Arc;

use pulseboard_integrations::{build_http_client, IntegrationFactory, OAuthClients};
use pulseboard_llm::{LlmService, LlmSettings};
use tracing_subscriber::EnvFilter;

use crate::{
    api::{build_app, rate_limit_state, AppState},
    middleware::AuthState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = pulseboard_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = pulseboard_db::PoolConfig::from_app_config(&config);
    let pool = pulseboard_db::connect_pool(&config.database_url, pool_config).await?;
    let applied = pulseboard_db::run_migrations(&pool).await?;
    tracing::info!(applied, "database migrations up to date");

    let http = build_http_client(config.http_timeout_secs)?;
    let factory = Arc::new(IntegrationFactory::new(
        OAuthClients::from_app_config(&config),
        http,
    ));
    let llm = Arc::new(LlmService::new(&LlmSettings::from_app_config(&config))?);

    let _scheduler = scheduler::build_scheduler(
        pool.clone(),
        Arc::clone(&factory),
        config.sync_lookback_days,
    )
    .await?;

    let auth = AuthState::from_env(matches!(
        config.env,
        pulseboard_core::Environment::Development
    ))?;
    let state = AppState { pool, factory, llm };
    let app = build_app(state, auth, rate_limit_state(&config));

    tracing::info!(addr = %config.bind_addr, "pulseboard server listening");
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
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

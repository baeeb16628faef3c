//! Data stream and catalogue command handlers for the CLI.
//!
//! Called from `main` once the command is parsed. Handlers that touch a
//! stream go through the same factory and sync store as the server.

use chrono::{Duration, NaiveDate};
use pulseboard_core::{AppConfig, PlatformType, MAX_SYNC_RANGE_DAYS};
use pulseboard_integrations::{
    build_http_client, generate_oauth_state, IntegrationFactory, OAuthClients, PgSyncStore,
};
use pulseboard_llm::{LlmService, LlmSettings};
use uuid::Uuid;

fn factory(config: &AppConfig) -> anyhow::Result<IntegrationFactory> {
    let http = build_http_client(config.http_timeout_secs)?;
    Ok(IntegrationFactory::new(
        OAuthClients::from_app_config(config),
        http,
    ))
}

/// Resolve the sync window. `end` defaults to yesterday relative to
/// `today`; `start` defaults to `end`.
///
/// # Errors
///
/// Returns an error if the resolved start is after the resolved end, or if
/// the range spans more than [`MAX_SYNC_RANGE_DAYS`] days.
pub(crate) fn resolve_range(
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    today: NaiveDate,
) -> anyhow::Result<(NaiveDate, NaiveDate)> {
    let end = end.unwrap_or(today - Duration::days(1));
    let start = start.unwrap_or(end);
    if start > end {
        anyhow::bail!("--start {start} is after --end {end}");
    }
    if (end - start).num_days() >= MAX_SYNC_RANGE_DAYS {
        anyhow::bail!("--start {start} to --end {end} exceeds {MAX_SYNC_RANGE_DAYS} days");
    }
    Ok((start, end))
}

pub(crate) fn print_platforms() {
    for info in IntegrationFactory::platforms() {
        println!(
            "{:<18} {:<28} {}",
            info.platform_type.as_str(),
            info.name,
            info.description
        );
    }
}

pub(crate) fn print_providers(config: &AppConfig) -> anyhow::Result<()> {
    let service = LlmService::new(&LlmSettings::from_app_config(config))?;
    let providers = service.available_providers();
    if providers.is_empty() {
        println!("no AI providers configured");
    } else {
        for name in providers {
            println!("{name}");
        }
    }
    Ok(())
}

pub(crate) fn print_oauth_url(
    config: &AppConfig,
    platform: PlatformType,
    organization: Uuid,
) -> anyhow::Result<()> {
    let state = generate_oauth_state();
    let url = factory(config)?.authorization_url(platform, &state)?;
    println!("organization: {organization}");
    println!("state:        {state}");
    println!("{url}");
    Ok(())
}

/// Probe a stream's credentials without syncing anything.
///
/// # Errors
///
/// Returns an error if the stream does not exist, its config cannot be
/// decoded, or its platform is unsupported.
pub(crate) async fn run_test_connection(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    stream_id: Uuid,
) -> anyhow::Result<()> {
    let stream = pulseboard_db::get_data_stream(pool, stream_id).await?;
    let integration = factory(config)?.create_integration(
        &stream.platform_type,
        stream.organization_id,
        stream.integration_config()?,
    )?;

    if integration.test_connection().await {
        println!("{} ({}): connected", stream.name, stream.platform_type);
        Ok(())
    } else {
        anyhow::bail!("{} ({}): connection failed", stream.name, stream.platform_type)
    }
}

/// Sync one stream for `[start, end]` and print the outcome.
///
/// # Errors
///
/// Returns an error if the stream cannot be loaded or the sync fails; in the
/// latter case the stream has already been marked `error`.
pub(crate) async fn run_sync(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    stream_id: Uuid,
    start: NaiveDate,
    end: NaiveDate,
) -> anyhow::Result<()> {
    let stream = pulseboard_db::get_data_stream(pool, stream_id).await?;
    tracing::info!(
        data_stream_id = %stream.id,
        platform = %stream.platform_type,
        %start,
        %end,
        "syncing data stream"
    );

    let outcome = PgSyncStore::new(pool.clone())
        .sync_stream(&factory(config)?, &stream, start, end)
        .await?;

    println!(
        "synced {} day(s) for {} ({}): {} row(s) written, {} day(s) failed",
        outcome.days, stream.name, stream.platform_type, outcome.rows_written, outcome.failed_days
    );
    Ok(())
}

mod streams;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use pulseboard_core::PlatformType;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "pulseboard-cli")]
#[command(about = "Pulseboard command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,
    /// List supported marketing platforms
    Platforms,
    /// List AI providers with a configured API key
    Providers,
    /// Print the OAuth consent URL for connecting a platform
    OauthUrl {
        /// Platform storage key (facebook, linkedin, google_analytics)
        #[arg(long)]
        platform: PlatformType,
        /// Organization the connection is for
        #[arg(long)]
        organization: Uuid,
    },
    /// Probe a data stream's stored credentials
    TestConnection {
        /// Data stream id
        #[arg(long)]
        stream: Uuid,
    },
    /// Fetch and store daily metrics for a data stream
    Sync {
        /// Data stream id
        #[arg(long)]
        stream: Uuid,
        /// First day to sync (YYYY-MM-DD); defaults to the end date
        #[arg(long)]
        start: Option<NaiveDate>,
        /// Last day to sync (YYYY-MM-DD); defaults to yesterday (UTC)
        #[arg(long)]
        end: Option<NaiveDate>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("pulseboard-cli ready; run with --help for commands");
        return Ok(());
    };

    match command {
        Commands::Platforms => streams::print_platforms(),
        Commands::Providers => streams::print_providers(&load_config()?)?,
        Commands::OauthUrl {
            platform,
            organization,
        } => streams::print_oauth_url(&load_config()?, platform, organization)?,
        Commands::Migrate => {
            let pool = connect(&load_config()?).await?;
            let applied = pulseboard_db::run_migrations(&pool).await?;
            println!("applied {applied} migration(s)");
        }
        Commands::TestConnection { stream } => {
            let config = load_config()?;
            let pool = connect(&config).await?;
            streams::run_test_connection(&pool, &config, stream).await?;
        }
        Commands::Sync { stream, start, end } => {
            let (start, end) =
                streams::resolve_range(start, end, chrono::Utc::now().date_naive())?;
            let config = load_config()?;
            let pool = connect(&config).await?;
            streams::run_sync(&pool, &config, stream, start, end).await?;
        }
    }

    Ok(())
}

fn load_config() -> anyhow::Result<pulseboard_core::AppConfig> {
    Ok(pulseboard_core::load_app_config()?)
}

async fn connect(config: &pulseboard_core::AppConfig) -> anyhow::Result<sqlx::PgPool> {
    let pool_config = pulseboard_db::PoolConfig::from_app_config(config);
    Ok(pulseboard_db::connect_pool(&config.database_url, pool_config).await?)
}

#[cfg(test)]
mod tests;

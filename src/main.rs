use anyhow::{Context, Result};
use clap::Parser;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;

use newspush::checker::FeedChecker;
use newspush::config::Config;
use newspush::dedup::DedupCache;
use newspush::feed::HttpFeedFetcher;
use newspush::notify::DiscordPublisher;
use newspush::report::LogReporter;
use newspush::scheduler::Scheduler;
use newspush::storage::{Database, DatabaseError};

/// Get the config directory path (~/.config/newspush/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("newspush"))
}

#[derive(Parser, Debug)]
#[command(name = "newspush", about = "Push new RSS entries to Discord channels")]
struct Args {
    /// Config file (default: ~/.config/newspush/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Database file, overrides `database_path` from the config
    #[arg(long, value_name = "FILE")]
    database: Option<PathBuf>,

    /// Run once and exit instead of polling
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config_path = match args.config {
        Some(path) => path,
        None => get_config_dir()?.join("config.toml"),
    };
    let mut config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    if let Some(database) = &args.database {
        config.database_path = database
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?
            .to_string();
    }

    if config.source_count() == 0 {
        tracing::warn!(path = %config_path.display(), "No sources configured, nothing will be published");
    }

    let token = config.discord_token().ok_or_else(|| {
        anyhow::anyhow!("No Discord bot token: set DISCORD_TOKEN or discord_token in the config file")
    })?;

    let db = match Database::open(&config.database_path).await {
        Ok(db) => db,
        Err(DatabaseError::Locked) => {
            anyhow::bail!(
                "Database {} is locked; is another instance running?",
                config.database_path
            );
        }
        Err(e) => return Err(anyhow::anyhow!("Failed to open database: {}", e)),
    };
    let known = db
        .total_feed_checks()
        .await
        .context("Failed to read check records")?;
    tracing::info!(path = %config.database_path, records = known, "Opened database");

    let client = reqwest::Client::builder()
        .user_agent(concat!("newspush/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")?;
    let publisher = DiscordPublisher::new(client.clone(), &config.discord_api_base, token)
        .context("Invalid Discord API base URL")?;

    let capacity = NonZeroUsize::new(config.cache_capacity)
        .ok_or_else(|| anyhow::anyhow!("cache_capacity must be at least 1"))?;
    let interval = config.poll_interval();
    let checker = Arc::new(FeedChecker::new(
        Arc::new(config),
        Arc::new(HttpFeedFetcher::new(client)),
        Arc::new(publisher),
        DedupCache::new(Arc::new(db), capacity),
        Arc::new(LogReporter),
    ));
    let scheduler = Scheduler::new(checker, interval);

    if args.once {
        scheduler.trigger().await;
        return Ok(());
    }

    scheduler
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await;
    Ok(())
}

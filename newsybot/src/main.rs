/*
newsybot - main.rs
This binary runs the scheduled digest cycle and exposes the subscription commands.
*/

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use common::Config;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Notify;
use tokio::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use common::{init_db_pool, run_migrations};
use newsybot::commands;
use newsybot::news::scaleserp::ScaleSerpFetcher;
use newsybot::platform::discord::DiscordClient;
use newsybot::platform::TenantId;
use newsybot::{Categories, CycleScheduler, Distributor, NewsCycle, SubscriptionStore};

/// Attempts at reaching the chat platform before giving up at startup.
const READY_ATTEMPTS: u32 = 10;

#[derive(Parser, Debug)]
#[command(name = "newsybot", about = "Scheduled per-category news digests for chat servers")]
struct Args {
    /// Path to config.toml
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override log level (info, debug, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the scheduler until interrupted (default)
    Run,
    /// Run exactly one cycle now and exit
    Cycle,
    /// Subscribe a server to a category (alias: addcat)
    #[command(alias = "addcategory", alias = "addcat")]
    Subscribe { tenant: String, category: String },
    /// Unsubscribe a server from a category (alias: removecat)
    #[command(alias = "removecategory", alias = "removecat")]
    Unsubscribe { tenant: String, category: String },
    /// Show a server's categories
    List { tenant: String },
    /// Check that the chat platform answers
    Ping,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI args
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    // Load configuration with defaults
    let config = load_config(args.config).await?;

    // Canonical category list; an invalid list stops startup
    let categories = Categories::new(&config.news.categories)
        .context("invalid [news] categories in configuration")?;
    info!(categories = %categories.joined(), "categories loaded");

    // Initialize DB pool - resolve and log the absolute DB path before connecting
    let db_path_abs = match tokio::fs::canonicalize(&config.database.path).await {
        Ok(p) => p.to_string_lossy().to_string(),
        Err(_) => config.database.path.clone(),
    };
    info!(db_path = %db_path_abs, "resolved DB path");

    let acquire_timeout =
        Duration::from_secs(config.database.acquire_timeout_seconds.unwrap_or(10));
    let db_pool = match init_db_pool(&db_path_abs, acquire_timeout).await {
        Ok(p) => p,
        Err(e) => {
            error!(%e, db_path = %db_path_abs, "failed to initialize database pool");
            return Err(e);
        }
    };

    if config.auto_migrate() {
        info!("Auto-migrate enabled: running DB migrations");
        run_migrations(&db_pool).await?;
    }

    let store = SubscriptionStore::new(db_pool.clone(), categories.clone());

    // Dispatch the subcommand; `run` is the default
    match args.command.unwrap_or(Command::Run) {
        Command::Subscribe { tenant, category } => {
            println!("{}", commands::add_category(&store, &TenantId::new(tenant), &category).await);
        }
        Command::Unsubscribe { tenant, category } => {
            println!(
                "{}",
                commands::remove_category(&store, &TenantId::new(tenant), &category).await
            );
        }
        Command::List { tenant } => {
            println!("{}", commands::list_categories(&store, &TenantId::new(tenant)).await);
        }
        Command::Ping => {
            let discord = discord_client(&config)?;
            let start = Instant::now();
            discord.current_user().await.context("Discord did not answer")?;
            println!("{}", commands::pong(start.elapsed()));
        }
        Command::Cycle => {
            let discord = Arc::new(discord_client(&config)?);
            discord.wait_until_ready(READY_ATTEMPTS).await?;
            let cycle = build_cycle(&config, categories, store, discord)?;
            let report = cycle.run_once().await?;
            println!(
                "cycle done: {} categories with news, {} fetch failures, {} delivered, {} skipped, {} failed",
                report.categories_with_news,
                report.fetch_failures.len(),
                report.distribution.delivered(),
                report.distribution.skipped(),
                report.distribution.failed(),
            );
        }
        Command::Run => {
            let discord = Arc::new(discord_client(&config)?);
            let cycle = build_cycle(&config, categories, store, discord.clone())?;
            run_scheduler(&config, Arc::new(cycle), discord).await?;
        }
    }

    db_pool.close().await;
    Ok(())
}

async fn load_config(explicit: Option<PathBuf>) -> Result<Config> {
    let default_path = PathBuf::from("config.default.toml");

    let override_path = if let Some(p) = explicit {
        if !p.exists() {
            error!(path = ?p, "specified config file not found");
            return Err(anyhow::anyhow!("Config file not found: {}", p.display()));
        }
        Some(p)
    } else {
        let p = PathBuf::from("config.toml");
        if p.exists() {
            Some(p)
        } else {
            None
        }
    };

    let config = match Config::load_with_defaults(
        if default_path.exists() { Some(&default_path) } else { None },
        override_path.as_deref(),
    )
    .await
    {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(%e, "failed to load configuration");
            return Err(e);
        }
    };
    info!(default = ?default_path, override = ?override_path, "configuration loaded");
    Ok(config)
}

fn discord_client(config: &Config) -> Result<DiscordClient> {
    let api_url = common::validate_endpoint(config.discord.api_url(), "discord")?;
    let token = Config::secret_from_env(config.discord.token_env.as_deref(), "Discord token")?;
    Ok(DiscordClient::new(api_url.as_str(), token).with_timeout(config.discord.timeout()))
}

fn build_cycle(
    config: &Config,
    categories: Arc<Categories>,
    store: SubscriptionStore,
    discord: Arc<DiscordClient>,
) -> Result<NewsCycle> {
    let api_url = common::validate_endpoint(config.news.api_url(), "news search")?;
    let api_key =
        Config::secret_from_env(config.news.api_key_env.as_deref(), "News search API key")?;
    let fetcher = ScaleSerpFetcher::new(api_url.as_str(), api_key).with_defaults(
        config.news.language.clone().unwrap_or_else(|| "en".to_string()),
        config.news.search_type.clone().unwrap_or_else(|| "news".to_string()),
        config.news.timeout(),
    );

    let distributor = Distributor::new(
        discord,
        store,
        config.discord.channel_name(),
        config.discord.timeout(),
    )
    .with_defaults(config.discord.attachment_name(), config.discord.delivery_workers());

    Ok(
        NewsCycle::new(categories, Arc::new(fetcher), distributor)
            .with_defaults(config.news.fetch_workers(), config.news.timeout()),
    )
}

/// Start the scheduler, raise readiness once Discord accepts the bot, and run until CTRL-C.
/// Fails when Discord never becomes reachable so the process exits non-zero.
async fn run_scheduler(
    config: &Config,
    cycle: Arc<NewsCycle>,
    discord: Arc<DiscordClient>,
) -> Result<()> {
    // Prepare a shutdown notifier to signal the scheduler
    let shutdown_notify = Arc::new(Notify::new());

    let scheduler = CycleScheduler::new(cycle, config.scheduler.period(), shutdown_notify.clone());
    let worker = tokio::spawn(async move {
        scheduler
            .run_when_ready(async move { discord.wait_until_ready(READY_ATTEMPTS).await.map(|_| ()) })
            .await
    });
    tokio::pin!(worker);

    let outcome = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("ctrl-c received, notifying scheduler to shutdown");
            shutdown_notify.notify_waiters();
            match tokio::time::timeout(Duration::from_secs(20), &mut worker).await {
                Ok(res) => res,
                Err(_) => {
                    info!("Timed out waiting for scheduler to exit; continuing shutdown");
                    Ok(Ok(()))
                }
            }
        }
        res = &mut worker => res,
    };

    match outcome {
        Ok(Ok(())) => {
            info!("Shutdown complete");
            Ok(())
        }
        Ok(Err(e)) => {
            error!(%e, "could not connect to Discord; no cycle will run");
            Err(e).context("Discord never became ready")
        }
        Err(join_err) => {
            error!(%join_err, "scheduler task panicked");
            Err(join_err.into())
        }
    }
}

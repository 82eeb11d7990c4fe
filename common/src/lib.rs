/*!
common/src/lib.rs

Shared configuration types and DB helper functions for Newsybot.

This file provides:
- Config data structures (deserialized from TOML)
- An async loader for a TOML config file, with default + override merging
- Helpers to initialize and migrate an SQLite database
*/

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Database configuration section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the sqlite database file (e.g. "data/newsybot.db")
    pub path: String,
    /// Seconds to wait for a pooled connection before giving up
    pub acquire_timeout_seconds: Option<u64>,
}

/// Scheduler (cycle period) configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Fixed period between two cycles, in seconds (default: one day)
    pub period_seconds: Option<u64>,
}

impl SchedulerConfig {
    pub fn period(&self) -> Duration {
        Duration::from_secs(self.period_seconds.unwrap_or(86_400).max(1))
    }
}

/// News search provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsConfig {
    /// Fixed set of categories; each one is both a search query and a subscription key
    pub categories: Vec<String>,
    pub api_url: Option<String>,
    /// Name of the env var holding the provider API key
    pub api_key_env: Option<String>,
    pub language: Option<String>,
    pub search_type: Option<String>,
    pub timeout_seconds: Option<u64>,
    /// Max number of categories fetched concurrently
    pub fetch_workers: Option<usize>,
}

impl NewsConfig {
    pub fn api_url(&self) -> &str {
        self.api_url
            .as_deref()
            .unwrap_or("https://api.scaleserp.com/search")
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.unwrap_or(30))
    }

    pub fn fetch_workers(&self) -> usize {
        self.fetch_workers.unwrap_or(4).max(1)
    }
}

/// Chat platform (Discord) configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscordConfig {
    pub api_url: Option<String>,
    /// Name of the env var holding the bot token
    pub token_env: Option<String>,
    /// Delivery channel name, matched case-insensitively
    pub channel_name: Option<String>,
    pub attachment_name: Option<String>,
    pub timeout_seconds: Option<u64>,
    /// Max number of tenants delivered to concurrently
    pub delivery_workers: Option<usize>,
}

impl DiscordConfig {
    pub fn api_url(&self) -> &str {
        self.api_url.as_deref().unwrap_or("https://discord.com/api/v10")
    }

    pub fn channel_name(&self) -> &str {
        self.channel_name.as_deref().unwrap_or("newsybot")
    }

    pub fn attachment_name(&self) -> &str {
        self.attachment_name.as_deref().unwrap_or("news.txt")
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.unwrap_or(30))
    }

    pub fn delivery_workers(&self) -> usize {
        self.delivery_workers.unwrap_or(4).max(1)
    }
}

/// Admin / maintenance config
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdminConfig {
    pub auto_migrate: Option<bool>,
}

/// Top-level application configuration (deserialized from config.toml)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    pub news: NewsConfig,
    #[serde(default)]
    pub discord: DiscordConfig,
    pub admin: Option<AdminConfig>,
}

impl Config {
    /// Load configuration from a TOML file asynchronously.
    ///
    /// Example:
    ///   let cfg = Config::from_file("config.toml").await?;
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = tokio::fs::read_to_string(path.as_ref())
            .await
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let cfg: Config = toml::from_str(&data).context("Failed to parse TOML configuration")?;
        Ok(cfg)
    }

    /// Load configuration with an optional default file and an optional override file.
    /// If both are present, they are merged (override takes precedence).
    pub async fn load_with_defaults(
        default_path: Option<&Path>,
        override_path: Option<&Path>,
    ) -> Result<Self> {
        let mut config_value = toml::Value::Table(toml::map::Map::new());

        for (path, label) in [(default_path, "default"), (override_path, "override")] {
            let Some(path) = path else { continue };
            if !path.exists() {
                continue;
            }
            let data = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read {} config: {}", label, path.display()))?;
            let val: toml::Value = toml::from_str(&data)
                .with_context(|| format!("Failed to parse {} configuration", label))?;
            merge_toml(&mut config_value, val);
        }

        let cfg: Config = config_value
            .try_into()
            .context("Failed to parse merged configuration")?;
        Ok(cfg)
    }

    pub fn auto_migrate(&self) -> bool {
        self.admin
            .as_ref()
            .and_then(|a| a.auto_migrate)
            .unwrap_or(true)
    }

    /// Read a secret from the env var named in the configuration.
    pub fn secret_from_env(var_name: Option<&str>, what: &str) -> Result<String> {
        let var_name =
            var_name.ok_or_else(|| anyhow::anyhow!("Missing env var name for {}", what))?;
        std::env::var(var_name).with_context(|| format!("{} env var '{}' not set", what, var_name))
    }
}

fn merge_toml(a: &mut toml::Value, b: toml::Value) {
    match (a, b) {
        (toml::Value::Table(a_map), toml::Value::Table(b_map)) => {
            for (k, v) in b_map {
                if let Some(a_val) = a_map.get_mut(&k) {
                    merge_toml(a_val, v);
                } else {
                    a_map.insert(k, v);
                }
            }
        }
        (a_val, b_val) => *a_val = b_val,
    }
}

/// Run the SQL migrations found in the workspace `migrations` directory.
/// The caller provides the pool; the migrator records applied versions so this is
/// safe to call on every start.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::migrate!("../migrations")
        .run(pool)
        .await
        .context("Failed to run sqlx migrations")?;

    Ok(())
}

/// Initialize an SQLite connection pool.
///
/// This function will create the parent directory if necessary and return a configured
/// `SqlitePool`. Connections are handed out per operation and returned right after, so a
/// small pool is enough:
/// - max_connections: 5
/// - acquire timeout: `acquire_timeout` (callers usually pass the configured value)
///
/// Example:
///   let pool = init_db_pool("data/newsybot.db", Duration::from_secs(10)).await?;
pub async fn init_db_pool(path: &str, acquire_timeout: Duration) -> Result<SqlitePool> {
    // Make sure the parent directory exists so sqlite can create the file
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.with_context(|| {
                format!("Failed to create DB parent directory: {}", parent.display())
            })?;
        }
    }

    // WAL journal, file created on first use
    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", path))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .acquire_timeout(acquire_timeout)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to connect to sqlite database at path: {}", path))?;

    Ok(pool)
}

/// Migrated in-memory database, kept public for tests.
///
/// Every connection to `sqlite::memory:` is a distinct database, so the pool is pinned to a
/// single connection that is never recycled.
pub async fn init_memory_pool() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .acquire_timeout(Duration::from_secs(5))
        .connect("sqlite::memory:")
        .await
        .context("Failed to create in-memory sqlite pool")?;
    run_migrations(&pool).await?;
    Ok(pool)
}

/// Check that a configured endpoint is an absolute http(s) URL.
pub fn validate_endpoint(raw: &str, what: &str) -> Result<url::Url> {
    let parsed = url::Url::parse(raw).with_context(|| format!("Invalid {} URL: {}", what, raw))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => anyhow::bail!("Unsupported scheme '{}' for {} URL", other, what),
    }
}

//! CLI command handlers.
//!
//! Each handler opens the configured store, performs one operation and
//! closes it again so SQLite's sweeper and redb's file lock are released
//! before the process exits.

use anyhow::{Context, Result};
use std::path::Path;
use std::time::Duration;
use ttlkv::{AnyStorage, Config, Store, constants};

/// Logs go to stderr so values printed on stdout stay pipeable.
pub fn init_stderr_logging() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Loads `path`, or `./ttlkv.toml` if it exists, or the defaults.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    if let Some(path) = path {
        return Config::load_from(path)
            .with_context(|| format!("Failed to load config: {}", path.display()));
    }

    if Path::new(constants::CONFIG_FILE).exists() {
        return Config::load().context("Failed to load ttlkv.toml");
    }

    tracing::debug!("No {} found, using defaults", constants::CONFIG_FILE);
    Ok(Config::default())
}

fn open(config: &Config) -> Result<Store> {
    Store::from_config(config)
        .with_context(|| format!("Failed to open {} store", config.store.backend))
}

pub async fn set(config: &Config, key: &str, value: &str, ttl_secs: u64, hex: bool) -> Result<()> {
    let bytes = if hex {
        hex::decode(value).context("Value is not valid hex")?
    } else {
        value.as_bytes().to_vec()
    };

    let store = open(config)?;
    store
        .set(key, &bytes, Duration::from_secs(ttl_secs))
        .await
        .with_context(|| format!("Failed to set '{key}'"))?;
    store.close().await?;
    Ok(())
}

/// Prints the value of `key` and returns whether it was found.
///
/// A missing key prints nothing; the caller turns `false` into exit status 1.
pub async fn get(config: &Config, key: &str, hex: bool) -> Result<bool> {
    let store = open(config)?;
    let value = store.get(key).await;
    store.close().await?;

    let Some(value) = value.with_context(|| format!("Failed to get '{key}'"))? else {
        tracing::debug!(key, "Key not found");
        return Ok(false);
    };

    if hex {
        println!("{}", hex::encode(&value));
    } else {
        println!("{}", String::from_utf8_lossy(&value));
    }
    Ok(true)
}

pub async fn delete(config: &Config, key: &str) -> Result<()> {
    let store = open(config)?;
    store
        .delete(key)
        .await
        .with_context(|| format!("Failed to delete '{key}'"))?;
    store.close().await?;
    Ok(())
}

pub async fn reset(config: &Config) -> Result<()> {
    let store = open(config)?;
    store.reset().await.context("Failed to reset store")?;
    store.close().await?;
    println!("Removed all entries ({} backend)", config.store.backend);
    Ok(())
}

pub async fn gc(config: &Config) -> Result<()> {
    let store = open(config)?;
    let AnyStorage::Sqlite(sqlite) = store.backend() else {
        store.close().await?;
        anyhow::bail!(
            "gc is only supported by the sqlite backend (current: {})",
            config.store.backend
        );
    };

    let deleted = sqlite.gc().await.context("Expiry sweep failed")?;
    store.close().await?;
    println!("Deleted {deleted} expired entries");
    Ok(())
}

pub fn check(config: &Config) -> Result<()> {
    let result = config.validate()?;
    for warning in &result.warnings {
        eprintln!("warning: {warning}");
    }
    println!("Configuration OK ({} backend)", config.store.backend);
    Ok(())
}

//! `ttlkv` command-line interface.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use ttlkv::BackendKind;

#[derive(Parser)]
#[command(name = "ttlkv", version, about = "TTL-aware key-value store")]
struct Cli {
    /// Config file (defaults to ./ttlkv.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the backend selected in the config file
    #[arg(long, global = true, value_enum)]
    backend: Option<BackendKind>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Store a value
    Set {
        key: String,
        value: String,
        /// Seconds until the entry expires (0 = never)
        #[arg(long, default_value_t = 0)]
        ttl_secs: u64,
        /// Treat the value as hex-encoded bytes
        #[arg(long)]
        hex: bool,
    },
    /// Print a value
    ///
    /// Exits with status 1, printing nothing, when the key is absent or expired.
    Get {
        key: String,
        /// Print the value hex-encoded
        #[arg(long)]
        hex: bool,
    },
    /// Delete a key
    Delete { key: String },
    /// Remove every entry
    Reset,
    /// Run one expiry sweep (sqlite only)
    Gc,
    /// Validate the configuration and print warnings
    Check,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    commands::init_stderr_logging();

    let cli = Cli::parse();
    let mut config = commands::load_config(cli.config.as_deref())?;
    if let Some(backend) = cli.backend {
        config.store.backend = backend;
    }

    match cli.command {
        Command::Set {
            key,
            value,
            ttl_secs,
            hex,
        } => commands::set(&config, &key, &value, ttl_secs, hex).await?,
        Command::Get { key, hex } => {
            if !commands::get(&config, &key, hex).await? {
                return Ok(ExitCode::FAILURE);
            }
        },
        Command::Delete { key } => commands::delete(&config, &key).await?,
        Command::Reset => commands::reset(&config).await?,
        Command::Gc => commands::gc(&config).await?,
        Command::Check => commands::check(&config)?,
    }

    Ok(ExitCode::SUCCESS)
}

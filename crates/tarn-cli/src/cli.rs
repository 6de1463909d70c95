//! Tarn CLI - exercise a bounded connection pool from the terminal
//!
//! Usage:
//!   tarn run                                # 100 workers, min 5, max 10
//!   tarn run --workers 20 --max-size 4      # smaller crowd, tighter pool
//!   tarn run --config pool.toml             # sizes and timeouts from TOML
//!   tarn config                             # print the effective pool config

mod demo;
mod logging;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context as _, Result};
use clap::{Args, Parser, Subcommand};
use tarn_pool::PoolConfig;

#[derive(Parser)]
#[command(name = "tarn", about = "Bounded connection pool demo", version)]
struct Cli {
    /// Log pool internals at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true, env = "TARN_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Spawn workers that borrow, hold, and release connections, then wait for the reaper
    Run {
        #[command(flatten)]
        pool: PoolArgs,

        /// Number of concurrent workers
        #[arg(long, default_value_t = 100, env = "TARN_WORKERS")]
        workers: usize,

        /// Longest time a worker holds its connection, in milliseconds
        #[arg(long, default_value_t = 10_000, env = "TARN_MAX_HOLD_MS")]
        max_hold_ms: u64,

        /// Simulated connect latency, in milliseconds
        #[arg(long, default_value_t = 0, env = "TARN_CONNECT_DELAY_MS")]
        connect_delay_ms: u64,

        /// Idle-count polling interval after the workers finish, in milliseconds
        #[arg(long, default_value_t = 5000, env = "TARN_POLL_INTERVAL_MS")]
        poll_interval_ms: u64,

        /// Print each worker's report as JSON pool stats
        #[arg(long)]
        json: bool,
    },
    /// Print the pool configuration the flags resolve to
    Config {
        #[command(flatten)]
        pool: PoolArgs,
    },
}

#[derive(Args)]
struct PoolArgs {
    /// Load sizes and timeouts from a TOML file (overrides the flags below)
    #[arg(long, env = "TARN_CONFIG")]
    config: Option<PathBuf>,

    /// Idle connections kept for reuse
    #[arg(long, default_value_t = 5, env = "TARN_MIN_SIZE")]
    min_size: usize,

    /// Connections checked out at once
    #[arg(long, default_value_t = 10, env = "TARN_MAX_SIZE")]
    max_size: usize,

    /// Close idle connections after this many milliseconds
    #[arg(long, default_value_t = 20_000, env = "TARN_IDLE_TIMEOUT_MS")]
    idle_timeout_ms: u64,

    /// Bound on creating a connection or waiting for an idle one, in milliseconds
    #[arg(long, default_value_t = 5000, env = "TARN_CONNECT_TIMEOUT_MS")]
    connect_timeout_ms: u64,
}

impl PoolArgs {
    fn resolve(&self) -> Result<PoolConfig> {
        if let Some(path) = &self.config {
            return PoolConfig::from_toml_file(path)
                .with_context(|| format!("failed to load {}", path.display()));
        }

        anyhow::ensure!(self.max_size > 0, "--max-size must be greater than 0");
        anyhow::ensure!(
            self.min_size <= self.max_size,
            "--min-size ({}) cannot exceed --max-size ({})",
            self.min_size,
            self.max_size
        );
        let config = PoolConfig::new(self.min_size, self.max_size)
            .with_idle_timeout_ms(self.idle_timeout_ms)
            .with_connect_timeout_ms(self.connect_timeout_ms);
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut log_config = if cli.verbose {
        logging::LoggingConfig::verbose()
    } else {
        logging::LoggingConfig::default()
    };
    log_config.json = cli.log_json;
    logging::init(log_config)?;

    match cli.command {
        Command::Run {
            pool,
            workers,
            max_hold_ms,
            connect_delay_ms,
            poll_interval_ms,
            json,
        } => {
            let options = demo::DemoOptions {
                config: pool.resolve()?,
                workers,
                max_hold: Duration::from_millis(max_hold_ms),
                connect_delay: Duration::from_millis(connect_delay_ms),
                poll_interval: Duration::from_millis(poll_interval_ms),
                json,
            };
            demo::run(options).await
        }
        Command::Config { pool } => {
            println!("{}", serde_json::to_string_pretty(&pool.resolve()?)?);
            Ok(())
        }
    }
}

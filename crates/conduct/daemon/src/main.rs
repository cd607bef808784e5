//! conductd - operator tool for the conduct approval core
//!
//! Loads configuration, initializes logging and then either migrates the
//! schema, checks connectivity, or prints read-only views of a class or
//! student as JSON.

use anyhow::Context;
use clap::{Parser, Subcommand};
use conduct_engine::ConductEngine;
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod store;

use config::ConductConfig;

/// Conduct approval daemon CLI
#[derive(Parser)]
#[command(name = "conductd")]
#[command(about = "Conduct score approval core - operator tool", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "CONDUCT_CONFIG")]
    config: Option<String>,

    /// Log level, overrides the configuration file
    #[arg(long, env = "CONDUCT_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "CONDUCT_LOG_JSON")]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply pending schema migrations
    Migrate,
    /// Verify the storage backend is reachable and at the expected schema
    Check,
    /// Print the approval gates of a class for a term
    Status {
        #[arg(long)]
        class: String,
        #[arg(long)]
        term: String,
    },
    /// Print a student's term history, newest first
    History {
        #[arg(long)]
        student: String,
    },
    /// List submissions awaiting verification in a class
    Pending {
        #[arg(long)]
        class: String,
        #[arg(long)]
        term: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = ConductConfig::load(cli.config.as_deref())
        .with_context(|| format!("failed to load configuration {:?}", cli.config))?;
    if let Some(level) = cli.log_level.clone() {
        config.logging.level = level;
    }
    if cli.json {
        config.logging.json = true;
    }
    init_tracing(&config);

    match cli.command {
        Command::Migrate => match store::migrate(&config.storage).await? {
            Some(version) => println!("schema at version {version}"),
            None => println!("in-memory storage has no schema to migrate"),
        },
        Command::Check => {
            let store = store::open(&config.storage).await?;
            let mut tx = store.begin().await?;
            tx.commit().await?;
            println!("{} storage ok", store.backend_label());
        }
        Command::Status { class, term } => {
            let engine = engine(&config).await?;
            print_json(&engine.class_status(&class, &term).await?)?;
        }
        Command::History { student } => {
            let engine = engine(&config).await?;
            print_json(&engine.history(&student).await?)?;
        }
        Command::Pending { class, term } => {
            let engine = engine(&config).await?;
            print_json(&engine.pending_verifications(&class, &term).await?)?;
        }
    }
    Ok(())
}

fn init_tracing(config: &ConductConfig) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.level.clone().into());

    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn engine(config: &ConductConfig) -> anyhow::Result<ConductEngine> {
    let store = store::open(&config.storage).await?;
    tracing::debug!(
        backend = store.backend_label(),
        leader_tier_required = config.approval.leader_tier_required,
        "Engine ready"
    );
    Ok(ConductEngine::new(store, config.approval.clone()))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

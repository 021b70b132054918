//! drift CLI - notification-driven index synchronizer

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;

mod cmd;
mod config;
mod queue;

/// drift - keep the file index cache in sync with pushed storage events
#[derive(Parser)]
#[command(name = "drift")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Print decode diagnostics and a per-change audit line
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (default: ./drift.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Redis connection flags shared by subcommands
#[derive(clap::Args)]
struct ConnectionArgs {
    /// Redis host, overrides the config file
    #[arg(long)]
    host: Option<String>,

    /// Redis port
    #[arg(long)]
    port: Option<u16>,

    /// Redis password
    #[arg(long)]
    password: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Listen for change notifications and apply them to the file index
    Listen {
        /// Redis list the notifications are pushed onto
        list: String,

        #[command(flatten)]
        connection: ConnectionArgs,

        /// Prefix stripped from incoming paths (default: the storage root)
        #[arg(short, long)]
        prefix: Option<String>,

        /// Format of the path after the prefix is stripped
        #[arg(short, long)]
        format: Option<String>,

        /// Root directory holding user files
        #[arg(long)]
        storage_root: Option<PathBuf>,

        /// Directory holding the cache database
        #[arg(long)]
        cache_dir: Option<PathBuf>,
    },
    /// Report queue backlog metrics
    Metrics {
        /// Redis list the notifications are pushed onto
        list: String,

        #[command(flatten)]
        connection: ConnectionArgs,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing; verbose mode surfaces decode diagnostics
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();

    let settings = config::Settings::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Listen {
            list,
            connection,
            prefix,
            format,
            storage_root,
            cache_dir,
        } => cmd::listen::run(cmd::listen::ListenArgs {
            list,
            connection,
            prefix,
            format,
            storage_root,
            cache_dir,
            verbose: cli.verbose,
            settings,
        }),
        Commands::Metrics { list, connection } => cmd::metrics::run(&list, &connection, &settings),
    }
}

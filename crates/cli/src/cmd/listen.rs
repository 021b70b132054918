//! Listen for storage notifications and keep the file index in sync

use crate::config::Settings;
use crate::queue::RedisQueue;
use crate::ConnectionArgs;
use anyhow::{Context, Result};
use drift_core::{
    Change, ChangeDispatcher, ChangeKind, DiagnosticSink, EventDecoder, Flow, Listener,
    PathTemplate,
};
use drift_index::MountManager;
use owo_colors::OwoColorize;
use signal_hook::consts::{SIGINT, SIGTERM};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info};

pub struct ListenArgs {
    pub list: String,
    pub connection: ConnectionArgs,
    pub prefix: Option<String>,
    pub format: Option<String>,
    pub storage_root: Option<PathBuf>,
    pub cache_dir: Option<PathBuf>,
    pub verbose: bool,
    pub settings: Settings,
}

pub fn run(args: ListenArgs) -> Result<()> {
    let ListenArgs {
        list,
        connection,
        prefix,
        format,
        storage_root,
        cache_dir,
        verbose,
        settings,
    } = args;

    // 1. Resolve effective options: flag > config file > default
    let host = connection.host.unwrap_or(settings.redis.host);
    let port = connection.port.unwrap_or(settings.redis.port);
    let password = connection.password.or(settings.redis.password);
    let storage_root = storage_root.unwrap_or(settings.paths.storage_root);
    let cache_dir = cache_dir.unwrap_or(settings.paths.cache_dir);
    let format = format.unwrap_or(settings.paths.format);
    let prefix = prefix
        .or(settings.paths.prefix)
        .unwrap_or_else(|| storage_root.to_string_lossy().into_owned());

    // 2. Connect to the queue; a failure here is fatal to launch
    let queue = RedisQueue::connect(&host, port, password.as_deref())?;

    // 3. Build the decoder
    let template = PathTemplate::new(&format).context("Invalid path format")?;
    let diag: DiagnosticSink = Arc::new(|message: &str| debug!("{message}"));
    let decoder = EventDecoder::new(&prefix, template, diag);

    // 4. Open the index and wire the dispatcher
    std::fs::create_dir_all(&cache_dir)
        .with_context(|| format!("Failed to create cache directory {}", cache_dir.display()))?;
    let mounts = MountManager::open(&storage_root, &cache_dir)
        .context("Failed to open cache database")?;
    let dispatcher = ChangeDispatcher::new(mounts);

    // 5. Listen until signalled; dispatch failures are logged, not fatal
    let mut listener = Listener::new(queue, &*list, decoder);
    let shutdown = listener.shutdown_flag();
    signal_hook::flag::register(SIGTERM, Arc::clone(&shutdown))
        .context("Failed to register SIGTERM handler")?;
    signal_hook::flag::register(SIGINT, shutdown)
        .context("Failed to register SIGINT handler")?;

    info!("listening for change notifications on {list}");
    listener.listen(|change| {
        if verbose {
            print_change(&change);
        }
        if let Err(err) = dispatcher.apply(&change) {
            error!("{err}");
        }
        Flow::Continue
    })?;

    info!("listener stopped");
    Ok(())
}

/// Audit line for one applied change (verbose mode only)
fn print_change(change: &Change) {
    match (change.kind, change.target.as_deref()) {
        (ChangeKind::Renamed, Some(target)) => {
            println!("{} {} to {}", change.kind.cyan(), change.path, target);
        }
        _ => println!("{} {}", change.kind.cyan(), change.path),
    }
}

//! `huddle serve`.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use huddle_core::logging::init_subscriber;
use huddle_server::{HuddleServer, ServerConfig};
use huddle_settings::{
    HuddleSettings, StorageSettings, huddle_home, load_settings, load_settings_from_path,
};
use huddle_store::sqlite::ConnectionConfig;
use huddle_store::{MessageStore, SqliteMessageStore};
use tracing::{info, warn};

use crate::ServeArgs;

pub(crate) async fn run(args: ServeArgs) -> Result<()> {
    let mut settings = match &args.settings {
        Some(path) => load_settings_from_path(path),
        None => load_settings(),
    }
    .context("Failed to load settings")?;
    apply_args(&mut settings, &args);
    settings.validate().context("Invalid settings")?;

    init_subscriber(&settings.logging.level, settings.logging.format);
    let metrics =
        huddle_server::metrics::install_recorder().context("Failed to install metrics recorder")?;

    let store = open_store(&settings.storage, &huddle_home())?;
    let server =
        HuddleServer::new(ServerConfig::from_settings(&settings), store).with_metrics(metrics);
    let handle = server.listen().await.context("Failed to bind server")?;
    info!("huddle listening on http://{}", handle.addr());

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    info!("shutting down");
    let report = handle.shutdown(server.config().shutdown_timeout).await;
    if report.is_clean() {
        info!("shutdown complete");
    } else {
        warn!(
            sessions_remaining = report.sessions_remaining,
            listener_aborted = report.listener_aborted,
            "shutdown timed out"
        );
    }
    Ok(())
}

/// Command-line flags win over every settings layer.
fn apply_args(settings: &mut HuddleSettings, args: &ServeArgs) {
    if let Some(host) = &args.host {
        settings.server.host.clone_from(host);
    }
    if let Some(port) = args.port {
        settings.server.port = port;
    }
    if let Some(db_path) = &args.db_path {
        settings.storage.db_path.clone_from(db_path);
    }
}

fn open_store(storage: &StorageSettings, home: &Path) -> Result<Arc<dyn MessageStore>> {
    if storage.is_in_memory() {
        info!("using in-memory message store");
        let store = SqliteMessageStore::in_memory().context("Failed to open in-memory store")?;
        return Ok(Arc::new(store));
    }

    let path = storage.resolved_db_path(home);
    ensure_parent_dir(&path)?;
    let config = ConnectionConfig {
        pool_size: storage.pool_size,
        busy_timeout_ms: storage.busy_timeout_ms,
    };
    let store = SqliteMessageStore::open(&path, &config)
        .with_context(|| format!("Failed to open database: {}", path.display()))?;
    info!(path = %path.display(), "message store opened");
    Ok(Arc::new(store))
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    Ok(())
}

//! Configuration file watcher for hot reload.
//!
//! The parent directory is watched rather than the file itself so that
//! editors replacing the file through a rename are noticed too. Only valid
//! configurations are forwarded; a broken edit keeps the current pool.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::ProxyConfig;

/// A watcher that monitors the configuration file for changes.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<ProxyConfig>,
}

impl ConfigWatcher {
    /// Create a new ConfigWatcher.
    ///
    /// Returns the watcher and a receiver for configuration updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<ProxyConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching. Dropping the returned watcher stops it.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let ConfigWatcher { path, update_tx } = self;
        let dir = path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or(Path::new("."))
            .to_path_buf();

        let watched = path.clone();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| on_event(&watched, res, &update_tx),
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?path, "Config watcher started");
        Ok(watcher)
    }
}

fn on_event(path: &Path, res: notify::Result<Event>, tx: &mpsc::UnboundedSender<ProxyConfig>) {
    let event = match res {
        Ok(event) => event,
        Err(e) => {
            tracing::error!(error = %e, "Config watch error");
            return;
        }
    };

    if !(event.kind.is_modify() || event.kind.is_create()) || !touches(&event, path) {
        return;
    }

    match load_config(path) {
        Ok(config) => {
            tracing::info!(path = ?path, backends = config.backends.len(), "Config reloaded");
            let _ = tx.send(config);
        }
        Err(e) => {
            tracing::error!(path = ?path, error = %e, "Config reload rejected, keeping current pool");
        }
    }
}

fn touches(event: &Event, path: &Path) -> bool {
    event
        .paths
        .iter()
        .any(|p| p.file_name().is_some() && p.file_name() == path.file_name())
}

//! Configuration file watcher for hot reload.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::parse_config;
use crate::config::schema::ProxyConfig;

/// A watcher that monitors the configuration file for changes.
///
/// Only configurations that parse and validate are sent; a broken edit
/// leaves the running route table untouched.
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

    /// Start watching the file. The returned handle must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let mut reloader = Reloader::new(self.path.clone(), self.update_tx);

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                    reloader.reload();
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = ?e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}

/// Reloads the file on change events.
///
/// A single save usually fires several events; content identical to the
/// last reload is skipped so each edit is published once.
struct Reloader {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<ProxyConfig>,
    last_content: Option<String>,
}

impl Reloader {
    /// Seeded with the current file so the startup config is not resent.
    fn new(path: PathBuf, update_tx: mpsc::UnboundedSender<ProxyConfig>) -> Self {
        let last_content = fs::read_to_string(&path).ok();
        Self {
            path,
            update_tx,
            last_content,
        }
    }

    /// Returns whether a new configuration was sent.
    fn reload(&mut self) -> bool {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                tracing::error!(path = ?self.path, error = %e, "Failed to read config file");
                return false;
            }
        };

        if self.last_content.as_deref() == Some(content.as_str()) {
            tracing::debug!(path = ?self.path, "Config file unchanged, skipping reload");
            return false;
        }

        tracing::info!(path = ?self.path, "Config file change detected, reloading");
        let parsed = parse_config(&content);
        self.last_content = Some(content);

        match parsed {
            Ok(config) => self.update_tx.send(config).is_ok(),
            Err(e) => {
                tracing::error!(error = %e, "Failed to reload config, keeping current routes");
                false
            }
        }
    }
}

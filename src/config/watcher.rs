//! Configuration file watcher for hot reload.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::ControllerConfig;

/// A watcher that monitors the configuration file for changes.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<ControllerConfig>,
}

impl ConfigWatcher {
    /// Create a new ConfigWatcher.
    ///
    /// Returns the watcher and a receiver for configuration updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<ControllerConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                update_tx,
            },
            update_rx,
        )
    }

    /// Reload immediately (SIGHUP). Invalid files keep the current config.
    pub fn reload_now(&self) -> bool {
        reload(&self.path, &self.update_tx)
    }

    /// Start watching the file in a background thread.
    ///
    /// The returned watcher must be kept alive for as long as updates are wanted.
    pub fn run(&self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx.clone();
        let path = self.path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        tracing::info!("Config file change detected, reloading...");
                        reload(&path, &tx);
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}

fn reload(path: &Path, tx: &mpsc::UnboundedSender<ControllerConfig>) -> bool {
    match load_config(path) {
        Ok(config) => tx.send(config).is_ok(),
        Err(e) => {
            tracing::error!(
                "Failed to reload config: {}. Keeping current configuration.",
                e
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reload_now_publishes_valid_config() {
        let path = std::env::temp_dir().join(format!("sdn-balancer-watch-{}.toml", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[balancer]\nbackends = [{{ address = \"10.9.9.9\", weight = 2 }}]").unwrap();
        drop(file);

        let (watcher, mut rx) = ConfigWatcher::new(&path);
        assert!(watcher.reload_now());
        let config = rx.try_recv().unwrap();
        assert_eq!(config.balancer.backends[0].weight, 2);

        std::fs::write(&path, "[balancer]\nbackends = []\n").unwrap();
        assert!(!watcher.reload_now());
        assert!(rx.try_recv().is_err());

        let _ = std::fs::remove_file(&path);
    }
}

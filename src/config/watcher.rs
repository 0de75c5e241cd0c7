//! Hot reload of the gateway config file
//!
//! The parent directory is watched so editors that save through a temp file
//! and rename are still seen. Only events naming the config file count; a
//! burst of them is collapsed into one reload once the file has been quiet
//! for [`RELOAD_DEBOUNCE`].

use anyhow::{anyhow, Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::AppConfig;

/// Quiet period after the last event before the file is re-read
const RELOAD_DEBOUNCE: Duration = Duration::from_millis(100);

/// Watches the config file and yields each new valid config
pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::Receiver<AppConfig>,
}

/// True when `event` is a write or create touching `file_name`
fn is_config_event(event: &Event, file_name: &OsStr) -> bool {
    matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_))
        && event
            .paths
            .iter()
            .any(|p| p.file_name() == Some(file_name))
}

/// Read and validate the file; `None` when it should not be applied
async fn reload(path: &str, current: &AppConfig) -> Option<AppConfig> {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) => {
            warn!("Failed to read config file {} (keeping old config): {}", path, e);
            return None;
        },
    };

    // Truncated by an in-progress save; the write that follows triggers again
    if contents.trim().is_empty() {
        debug!("Config file is empty, waiting for the next write");
        return None;
    }

    let config = match AppConfig::parse(&contents) {
        Ok(config) => config,
        Err(e) => {
            warn!("⚠️  Invalid config (keeping old config): {:#}", e);
            return None;
        },
    };

    if config == *current {
        debug!("Config file rewritten without changes");
        return None;
    }

    info!(
        "📝 Configuration reloaded: playback {}:{}, {} feedback(s)",
        config.playback.host,
        config.playback.port,
        config.feedbacks.len()
    );
    Some(config)
}

/// Collapse event bursts into single reloads until the watcher goes away
async fn reload_loop(
    path: String,
    mut current: AppConfig,
    mut events: mpsc::UnboundedReceiver<()>,
    tx: mpsc::Sender<AppConfig>,
) {
    while events.recv().await.is_some() {
        loop {
            match tokio::time::timeout(RELOAD_DEBOUNCE, events.recv()).await {
                Ok(Some(())) => continue,
                Ok(None) => return,
                Err(_) => break,
            }
        }

        if let Some(config) = reload(&path, &current).await {
            current = config.clone();
            if tx.send(config).await.is_err() {
                debug!("Config receiver dropped, stopping reload task");
                return;
            }
        }
    }
}

fn split_path(config_path: &str) -> Result<(PathBuf, OsString)> {
    let path = Path::new(config_path);
    let file_name = path
        .file_name()
        .ok_or_else(|| anyhow!("Config path has no file name: {}", config_path))?
        .to_os_string();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok((dir, file_name))
}

impl ConfigWatcher {
    /// Load the config at `config_path` and start watching it
    pub async fn new(config_path: String) -> Result<(Self, Arc<AppConfig>)> {
        let initial_config = AppConfig::load(&config_path)
            .await
            .context("Failed to load initial config")?;

        let (dir, file_name) = split_path(&config_path)?;
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (tx, rx) = mpsc::channel(4);

        tokio::spawn(reload_loop(
            config_path.clone(),
            initial_config.clone(),
            event_rx,
            tx,
        ));

        // Runs on notify's own thread; only forwards a wake-up
        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            match res {
                Ok(event) if is_config_event(&event, &file_name) => {
                    debug!("Config file event: {:?}", event.kind);
                    let _ = event_tx.send(());
                },
                Ok(_) => {},
                Err(e) => error!("Watch error: {}", e),
            }
        })?;

        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch config directory: {}", dir.display()))?;

        info!("Config file watcher started for: {}", config_path);

        Ok((
            Self {
                _watcher: watcher,
                rx,
            },
            Arc::new(initial_config),
        ))
    }

    /// Wait for the next valid, changed config
    /// Returns None if the watcher has been closed
    pub async fn next_config(&mut self) -> Option<AppConfig> {
        self.rx.recv().await
    }
}

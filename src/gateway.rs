//! Gateway wiring: transport, snapshot store, host surface and poller
//!
//! Owns the one-way flow `device → poller → reconciler → surface` and the
//! reverse command path `action → transport → device`.

use anyhow::{Context, Result};
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

use crate::actions::{self, Action, DispatchError};
use crate::config::AppConfig;
use crate::drivers::{ConnectionStatus, HttpTransport, StatusReporter, Transport};
use crate::state::SnapshotStore;
use crate::surface::Surface;
use crate::sync::{PollOutcome, Poller, Reconciler};

pub struct Gateway {
    config: RwLock<AppConfig>,
    status: StatusReporter,
    transport: Arc<HttpTransport>,
    store: SnapshotStore,
    surface: Arc<Surface>,
    poller: Poller,
}

impl Gateway {
    /// Build the gateway from config; nothing runs until [`Gateway::start`]
    pub fn new(config: &AppConfig) -> Result<Self> {
        let status = StatusReporter::new();
        let playback = &config.playback;
        let transport = Arc::new(
            HttpTransport::new(
                &playback.host,
                playback.port,
                playback.request_timeout(),
                status.clone(),
            )
            .context("Failed to create playback transport")?,
        );

        let store = SnapshotStore::new();
        let surface = Arc::new(Surface::new(store.clone()));
        surface.replace_feedbacks(&config.feedbacks);

        let reconciler = Reconciler::new(store.clone(), surface.clone());
        let device: Arc<dyn Transport> = transport.clone();
        let poller = Poller::new(device, reconciler);

        Ok(Self {
            config: RwLock::new(config.clone()),
            status,
            transport,
            store,
            surface,
            poller,
        })
    }

    /// Start polling if enabled
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) {
        let config = self.config.read();
        info!("🔌 Playback device: {}", self.transport.base_url());
        if config.playback.enable_polling {
            self.poller.start(config.playback.poll_interval_ms);
        } else {
            info!("Status polling disabled by config");
        }
    }

    /// Apply a reloaded config: stop, retarget, re-register, restart
    pub fn update_config(&self, new_config: AppConfig) -> Result<()> {
        info!("🔄 Updating configuration (hot-reload)...");
        new_config.validate()?;

        self.poller.stop();

        let previous = self.config.read().playback.clone();
        let playback = &new_config.playback;
        if previous.target_changed(playback) {
            self.transport
                .reconfigure(&playback.host, playback.port, playback.request_timeout())?;
            info!("🔌 Playback device retargeted: {}", self.transport.base_url());
        }

        self.surface.replace_feedbacks(&new_config.feedbacks);

        let enable_polling = playback.enable_polling;
        let interval = playback.poll_interval_ms;
        *self.config.write() = new_config;

        if enable_polling {
            self.poller.start(interval);
        } else {
            info!("Status polling disabled by config");
        }

        info!("✅ Configuration updated successfully");
        Ok(())
    }

    /// Send one operator action to the device
    pub async fn execute(&self, action: &Action) -> Result<Value, DispatchError> {
        debug!("Executing action: {:?}", action);
        actions::execute(self.transport.as_ref(), action).await
    }

    /// Poll immediately, outside the timer cadence
    pub async fn poll_now(&self) -> PollOutcome {
        self.poller.poll_now().await
    }

    pub fn shutdown(&self) {
        self.poller.stop();
        info!("Gateway stopped");
    }

    pub fn config(&self) -> AppConfig {
        self.config.read().clone()
    }

    pub fn surface(&self) -> &Arc<Surface> {
        &self.surface
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    pub fn poller(&self) -> &Poller {
        &self.poller
    }

    pub fn status(&self) -> &StatusReporter {
        &self.status
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        self.status.current()
    }

    pub fn device_url(&self) -> String {
        self.transport.base_url()
    }
}

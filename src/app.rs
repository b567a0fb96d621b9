//! Application state
//!
//! [`AppState`] wires configuration, storage, the remote client, the
//! gateway and the settings together. `init` loads everything from storage
//! (and the backend, if any); `shutdown` writes out pending settings.

use crate::config::{Config, Settings, SettingsStore};
use crate::error::Result;
use crate::export::{export_graph_sql, graph_to_dot, DotConfig};
use crate::gateway::Gateway;
use crate::layout::{layout, LayoutConfig, PositionedNode};
use crate::model::{Relation, View};
use crate::remote::{HttpApi, RemoteApi};
use crate::storage::{SqliteStorage, Storage};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub struct AppState {
    config: Config,
    gateway: Gateway,
    settings: SettingsStore,
}

impl AppState {
    /// Open the configured store and backend, then load the graph
    pub async fn init(config: Config) -> Result<Self> {
        let storage: Arc<dyn Storage> = Arc::new(SqliteStorage::open_at(config.storage_path())?);
        let remote = build_remote(&config);
        Self::with_parts(config, remote, storage).await
    }

    /// Assemble from already-built parts and load the graph
    pub async fn with_parts(
        config: Config,
        remote: Option<Arc<dyn RemoteApi>>,
        storage: Arc<dyn Storage>,
    ) -> Result<Self> {
        let settings = SettingsStore::load(storage.clone())?;
        let mut gateway = Gateway::open(remote, storage)?;
        gateway.fetch_data().await?;
        debug!(
            source = %gateway.store().data_source(),
            views = gateway.store().views().len(),
            "state loaded"
        );
        Ok(Self {
            config,
            gateway,
            settings,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    pub fn gateway_mut(&mut self) -> &mut Gateway {
        &mut self.gateway
    }

    pub fn settings(&self) -> &Settings {
        self.settings.get()
    }

    pub fn settings_mut(&mut self) -> &mut SettingsStore {
        &mut self.settings
    }

    fn visible_graph(&self) -> (Vec<View>, Vec<Relation>) {
        let store = self.gateway.store();
        (
            store.visible_views().into_iter().cloned().collect(),
            store.visible_relations().into_iter().cloned().collect(),
        )
    }

    /// Positions for the visible graph using the current settings
    pub fn layout(&self) -> Vec<PositionedNode> {
        self.layout_with(&LayoutConfig::from(self.settings()))
    }

    pub fn layout_with(&self, config: &LayoutConfig) -> Vec<PositionedNode> {
        let (views, relations) = self.visible_graph();
        layout(&views, &relations, config)
    }

    pub fn export_sql(&self) -> String {
        let store = self.gateway.store();
        export_graph_sql(store.views(), store.relations())
    }

    pub fn export_dot(&self) -> String {
        let (views, relations) = self.visible_graph();
        graph_to_dot(&views, &relations, &DotConfig::from(self.settings()))
    }

    /// Write pending settings that have been quiet long enough
    pub fn tick(&mut self, now: Instant) -> Result<bool> {
        self.settings.poll(now)
    }

    pub fn shutdown(mut self) -> Result<()> {
        self.settings.flush()
    }
}

fn build_remote(config: &Config) -> Option<Arc<dyn RemoteApi>> {
    let api_root = config.api_root()?;
    match HttpApi::new(api_root, Duration::from_secs(config.remote.timeout_secs)) {
        Ok(api) => Some(Arc::new(api) as Arc<dyn RemoteApi>),
        Err(e) => {
            warn!(error = %e, "remote client unavailable, working locally");
            None
        }
    }
}

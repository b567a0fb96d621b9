//! Configuration for dbgraph
//!
//! Two layers live here:
//! - [`Config`]: where the backend and the local store are, read from
//!   `.dbgraph/config.toml` with environment overrides
//! - [`Settings`]: the user-facing display settings, persisted in local
//!   storage through the debounced [`SettingsStore`]

use crate::error::Result;
use crate::layout::LayoutDirection;
use crate::model::JoinType;
use crate::storage::{self, Storage, SETTINGS_KEY};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

pub const CONFIG_DIR: &str = ".dbgraph";
pub const BACKEND_URL_ENV: &str = "DBGRAPH_BACKEND_URL";
pub const STORAGE_PATH_ENV: &str = "DBGRAPH_STORAGE_PATH";

/// Quiet period before a settings change is written out
pub const SETTINGS_DEBOUNCE: Duration = Duration::from_millis(300);

/// Configuration structure
#[derive(Debug, Deserialize, Serialize, Default, Clone)]
pub struct Config {
    /// Remote API settings
    #[serde(default)]
    pub remote: RemoteConfig,

    /// Local storage settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Directory holding `.dbgraph/`, when a config file was found
    #[serde(skip)]
    pub root: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RemoteConfig {
    /// Backend origin, e.g. "http://localhost:8001". The API lives under `/api`.
    #[serde(default)]
    pub base_url: Option<String>,

    /// Per-request timeout in seconds
    /// Default: 30
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Default, Clone)]
pub struct StorageConfig {
    /// SQLite file for offline state
    /// Default: .dbgraph/local.db
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl Config {
    /// Load config from .dbgraph/config.toml, then apply environment overrides.
    /// Returns default config if the file doesn't exist or can't be parsed.
    pub fn load() -> Self {
        let mut config = std::env::current_dir()
            .ok()
            .and_then(|dir| Self::find_config_path(&dir))
            .map(|path| Self::load_file(&path))
            .unwrap_or_default();
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    fn load_file(path: &Path) -> Self {
        let mut config: Config = std::fs::read_to_string(path)
            .ok()
            .and_then(|contents| toml::from_str(&contents).ok())
            .unwrap_or_default();
        config.root = path.parent().and_then(Path::parent).map(Path::to_path_buf);
        config
    }

    /// Find config.toml by walking up directory tree
    fn find_config_path(start: &Path) -> Option<PathBuf> {
        let mut dir = start;

        loop {
            let config_path = dir.join(CONFIG_DIR).join("config.toml");
            if config_path.exists() {
                return Some(config_path);
            }

            match dir.parent() {
                Some(parent) => dir = parent,
                None => break,
            }
        }
        None
    }

    /// Apply overrides from an environment lookup
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(BACKEND_URL_ENV) {
            self.remote.base_url = Some(url);
        }
        if let Some(path) = lookup(STORAGE_PATH_ENV).filter(|p| !p.trim().is_empty()) {
            self.storage.path = Some(PathBuf::from(path));
        }
    }

    /// Backend origin, if one is actually configured
    pub fn backend_url(&self) -> Option<String> {
        let url = self.remote.base_url.as_deref()?.trim();
        if url.is_empty() || url == "undefined" || url == "null" {
            return None;
        }
        Some(url.trim_end_matches('/').to_string())
    }

    /// API root: backend origin + "/api"
    pub fn api_root(&self) -> Option<String> {
        self.backend_url().map(|url| format!("{}/api", url))
    }

    /// Resolved path of the local store
    pub fn storage_path(&self) -> PathBuf {
        let path = self
            .storage
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join("local.db"));
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path,
        }
    }
}

// ============================================================================
// Display settings
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

/// Edge colors per join type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JoinColors {
    #[serde(rename = "LEFT JOIN")]
    pub left: String,
    #[serde(rename = "RIGHT JOIN")]
    pub right: String,
    #[serde(rename = "INNER JOIN")]
    pub inner: String,
    #[serde(rename = "CROSS JOIN")]
    pub cross: String,
    #[serde(rename = "FULL JOIN")]
    pub full: String,
    #[serde(rename = "JOIN")]
    pub plain: String,
    #[serde(rename = "DEFAULT")]
    pub default: String,
}

impl Default for JoinColors {
    fn default() -> Self {
        Self {
            left: "#3B82F6".to_string(),
            right: "#8B5CF6".to_string(),
            inner: "#10B981".to_string(),
            cross: "#F59E0B".to_string(),
            full: "#EC4899".to_string(),
            plain: "#6366F1".to_string(),
            default: "#71717A".to_string(),
        }
    }
}

impl JoinColors {
    pub fn get(&self, join_type: JoinType) -> &str {
        let color = match join_type {
            JoinType::Left => &self.left,
            JoinType::Right => &self.right,
            JoinType::Inner => &self.inner,
            JoinType::Cross => &self.cross,
            JoinType::Full => &self.full,
            JoinType::Plain => &self.plain,
            JoinType::Default => &self.default,
        };
        if color.is_empty() {
            &self.default
        } else {
            color
        }
    }
}

/// Display settings. Stored values are merged over the defaults field by field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub show_view_id: bool,
    pub show_alias: bool,
    pub max_node_name_length: u32,
    pub node_size: String,
    pub join_colors: JoinColors,
    pub layout_direction: LayoutDirection,
    pub node_spacing: f64,
    pub level_spacing: f64,
    pub edge_style: String,
    pub edge_path_offset: f64,
    pub separate_parallel_edges: bool,
    pub show_edge_labels: bool,
    pub animated_edges: bool,
    pub theme: Theme,
    pub details_panel_width: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            show_view_id: true,
            show_alias: true,
            max_node_name_length: 20,
            node_size: "medium".to_string(),
            join_colors: JoinColors::default(),
            layout_direction: LayoutDirection::TB,
            node_spacing: 80.0,
            level_spacing: 120.0,
            edge_style: "smoothstep".to_string(),
            edge_path_offset: 20.0,
            separate_parallel_edges: true,
            show_edge_labels: true,
            animated_edges: false,
            theme: Theme::Light,
            details_panel_width: 380,
        }
    }
}

impl Settings {
    /// Merge a JSON object over these settings. Top-level keys replace,
    /// `joinColors` merges per key.
    pub fn apply_patch(&mut self, patch: &Value) -> Result<()> {
        let mut current = serde_json::to_value(&*self)?;
        if let (Some(target), Some(source)) = (current.as_object_mut(), patch.as_object()) {
            for (key, value) in source {
                match (key.as_str(), target.get_mut(key)) {
                    ("joinColors", Some(Value::Object(colors))) if value.is_object() => {
                        if let Some(incoming) = value.as_object() {
                            for (k, v) in incoming {
                                colors.insert(k.clone(), v.clone());
                            }
                        }
                    }
                    _ => {
                        target.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        *self = serde_json::from_value(current)?;
        Ok(())
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn toggle_theme(&mut self) {
        self.theme = match self.theme {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        };
    }

    pub fn join_color(&self, join_type: JoinType) -> &str {
        self.join_colors.get(join_type)
    }
}

/// Owns the live settings and coalesces writes to storage
pub struct SettingsStore {
    storage: Arc<dyn Storage>,
    settings: Settings,
    dirty_since: Option<Instant>,
}

impl SettingsStore {
    /// Load stored settings merged over defaults
    pub fn load(storage: Arc<dyn Storage>) -> Result<Self> {
        let settings = storage::read_json::<Settings>(storage.as_ref(), SETTINGS_KEY)?.unwrap_or_default();
        Ok(Self {
            storage,
            settings,
            dirty_since: None,
        })
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }

    /// Change the settings; the write happens on a later `poll` or `flush`
    pub fn update<F>(&mut self, now: Instant, change: F)
    where
        F: FnOnce(&mut Settings),
    {
        change(&mut self.settings);
        self.dirty_since = Some(now);
    }

    pub fn patch(&mut self, now: Instant, patch: &Value) -> Result<()> {
        self.settings.apply_patch(patch)?;
        self.dirty_since = Some(now);
        Ok(())
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty_since.is_some()
    }

    /// Write if the last change is older than the quiet period.
    /// Returns whether a write happened.
    pub fn poll(&mut self, now: Instant) -> Result<bool> {
        match self.dirty_since {
            Some(since) if now.saturating_duration_since(since) >= SETTINGS_DEBOUNCE => {
                self.flush()?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Write any pending change now
    pub fn flush(&mut self) -> Result<()> {
        if self.dirty_since.take().is_some() {
            storage::write_json(self.storage.as_ref(), SETTINGS_KEY, &self.settings)?;
            debug!("settings written");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.backend_url(), None);
        assert_eq!(config.remote.timeout_secs, 30);
        assert_eq!(config.storage_path(), PathBuf::from(".dbgraph/local.db"));
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[remote]
base_url = "http://localhost:8001/"

[storage]
path = "graph.db"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.backend_url().as_deref(), Some("http://localhost:8001"));
        assert_eq!(config.api_root().as_deref(), Some("http://localhost:8001/api"));
        assert_eq!(config.storage_path(), PathBuf::from("graph.db"));
    }

    #[test]
    fn test_placeholder_urls_mean_no_backend() {
        for url in ["", "   ", "undefined", "null"] {
            let mut config = Config::default();
            config.remote.base_url = Some(url.to_string());
            assert_eq!(config.backend_url(), None, "url {:?}", url);
        }
    }

    #[test]
    fn test_env_overrides_file() {
        let mut config: Config = toml::from_str("[remote]\nbase_url = \"http://file\"").unwrap();
        config.apply_env(|key| match key {
            BACKEND_URL_ENV => Some("http://env".to_string()),
            STORAGE_PATH_ENV => Some("/tmp/x.db".to_string()),
            _ => None,
        });
        assert_eq!(config.backend_url().as_deref(), Some("http://env"));
        assert_eq!(config.storage_path(), PathBuf::from("/tmp/x.db"));
    }

    #[test]
    fn test_config_found_in_parent_directory() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_dir = temp_dir.path().join(CONFIG_DIR);
        std::fs::create_dir_all(&config_dir).unwrap();
        std::fs::write(config_dir.join("config.toml"), "[storage]\npath = \"data/g.db\"\n").unwrap();
        let nested = temp_dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();

        let path = Config::find_config_path(&nested).unwrap();
        let config = Config::load_file(&path);
        assert_eq!(config.storage_path(), temp_dir.path().join("data/g.db"));
    }

    #[test]
    fn test_settings_merge_over_defaults() {
        let stored = json!({"nodeSpacing": 40, "joinColors": {"LEFT JOIN": "#000000"}});
        let settings: Settings = serde_json::from_value(stored).unwrap();
        assert_eq!(settings.node_spacing, 40.0);
        assert_eq!(settings.level_spacing, 120.0);
        assert_eq!(settings.join_colors.left, "#000000");
        assert_eq!(settings.join_colors.inner, "#10B981");
    }

    #[test]
    fn test_apply_patch_deep_merges_join_colors() {
        let mut settings = Settings::default();
        settings
            .apply_patch(&json!({"layoutDirection": "LR", "joinColors": {"JOIN": "#111111"}}))
            .unwrap();
        assert_eq!(settings.layout_direction, LayoutDirection::LR);
        assert_eq!(settings.join_colors.plain, "#111111");
        assert_eq!(settings.join_colors.left, "#3B82F6");
    }

    #[test]
    fn test_apply_patch_rejects_bad_types() {
        let mut settings = Settings::default();
        assert!(settings.apply_patch(&json!({"nodeSpacing": "wide"})).is_err());
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_toggle_theme_and_reset() {
        let mut settings = Settings::default();
        settings.toggle_theme();
        assert_eq!(settings.theme, Theme::Dark);
        settings.node_spacing = 1.0;
        settings.reset();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_join_color_falls_back_to_default() {
        let mut settings = Settings::default();
        settings.join_colors.cross = String::new();
        assert_eq!(settings.join_color(JoinType::Cross), "#71717A");
        assert_eq!(settings.join_color(JoinType::Left), "#3B82F6");
    }

    #[test]
    fn test_settings_store_debounces_writes() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let mut store = SettingsStore::load(storage.clone()).unwrap();
        let t0 = Instant::now();

        store.update(t0, |s| s.node_spacing = 10.0);
        store.update(t0 + Duration::from_millis(200), |s| s.node_spacing = 20.0);

        assert!(!store.poll(t0 + Duration::from_millis(400)).unwrap());
        assert_eq!(storage.get(SETTINGS_KEY).unwrap(), None);

        assert!(store.poll(t0 + Duration::from_millis(500)).unwrap());
        let reloaded = SettingsStore::load(storage).unwrap();
        assert_eq!(reloaded.get().node_spacing, 20.0);
    }

    #[test]
    fn test_settings_store_flush_writes_immediately() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let mut store = SettingsStore::load(storage.clone()).unwrap();
        store.patch(Instant::now(), &json!({"theme": "dark"})).unwrap();
        store.flush().unwrap();
        assert!(!store.is_dirty());

        let reloaded = SettingsStore::load(storage).unwrap();
        assert_eq!(reloaded.get().theme, Theme::Dark);
    }
}

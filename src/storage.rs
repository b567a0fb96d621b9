//! Local storage for offline state
//!
//! A small key/value store holding four entries: UI settings, the import
//! snapshot, the last imported SQL script and the full graph. The SQLite
//! implementation persists across sessions; [`MemoryStorage`] backs tests
//! and throwaway sessions.

use crate::error::StorageError;
use crate::model::{GraphData, GraphPayload, ImportSnapshot, Relation, View};
use crate::normalize::{normalize_relation, normalize_view};
use crate::schema::local_store;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel::sqlite::SqliteConnection;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, warn};

pub const SETTINGS_KEY: &str = "dbgraph_settings";
pub const ORIGINAL_IDS_KEY: &str = "dbgraph_original_ids";
pub const LAST_SQL_KEY: &str = "dbgraph_last_sql";
pub const GRAPH_DATA_KEY: &str = "dbgraph_graph_data";

pub type Result<T> = std::result::Result<T, StorageError>;

/// String key/value persistence
pub trait Storage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

// ============================================================================
// SQLite
// ============================================================================

type DbPool = Pool<ConnectionManager<SqliteConnection>>;
type DbConn = PooledConnection<ConnectionManager<SqliteConnection>>;

#[derive(Insertable)]
#[diesel(table_name = local_store)]
struct NewEntry<'a> {
    key: &'a str,
    value: &'a str,
    updated_at: &'a str,
}

/// SQLite-backed storage with a connection pool
pub struct SqliteStorage {
    pool: DbPool,
}

impl SqliteStorage {
    /// Open (and create if needed) the store at `path`
    pub fn open_at<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| StorageError::Connection(e.to_string()))?;
            }
        }

        let path_str = path.as_ref().to_string_lossy().to_string();
        let manager = ConnectionManager::<SqliteConnection>::new(&path_str);
        let pool = Pool::builder()
            .max_size(5)
            .build(manager)
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let storage = Self { pool };
        storage.init_schema()?;
        Ok(storage)
    }

    fn get_conn(&self) -> Result<DbConn> {
        self.pool.get().map_err(|e| StorageError::Connection(e.to_string()))
    }

    fn init_schema(&self) -> Result<()> {
        let mut conn = self.get_conn()?;
        diesel::sql_query(
            r#"
            CREATE TABLE IF NOT EXISTS local_store (
                key TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
        "#,
        )
        .execute(&mut conn)?;
        Ok(())
    }
}

impl Storage for SqliteStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.get_conn()?;
        let value = local_store::table
            .filter(local_store::key.eq(key))
            .select(local_store::value)
            .first::<String>(&mut conn)
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self.get_conn()?;
        let now = chrono::Local::now().to_rfc3339();
        let entry = NewEntry {
            key,
            value,
            updated_at: &now,
        };
        diesel::replace_into(local_store::table)
            .values(&entry)
            .execute(&mut conn)?;
        debug!(key, bytes = value.len(), "stored entry");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut conn = self.get_conn()?;
        diesel::delete(local_store::table.filter(local_store::key.eq(key))).execute(&mut conn)?;
        Ok(())
    }
}

// ============================================================================
// In-memory
// ============================================================================

/// Process-local storage, lost on exit
#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        entries.remove(key);
        Ok(())
    }
}

// ============================================================================
// Typed entries
// ============================================================================

/// Read a JSON entry. Unparsable content is treated as absent.
pub fn read_json<T: DeserializeOwned>(storage: &dyn Storage, key: &str) -> Result<Option<T>> {
    let Some(raw) = storage.get(key)? else {
        return Ok(None);
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            warn!(key, error = %e, "ignoring unreadable stored entry");
            Ok(None)
        }
    }
}

pub fn write_json<T: Serialize>(storage: &dyn Storage, key: &str, value: &T) -> crate::error::Result<()> {
    let json = serde_json::to_string(value)?;
    storage.set(key, &json)?;
    Ok(())
}

/// Load the offline graph, normalizing every record and skipping the ones
/// that cannot be normalized
pub fn load_graph(storage: &dyn Storage) -> Result<GraphData> {
    let payload: GraphPayload = read_json(storage, GRAPH_DATA_KEY)?.unwrap_or_default();

    let nodes: Vec<View> = payload
        .nodes
        .into_iter()
        .filter_map(|raw| match normalize_view(raw) {
            Ok(view) => Some(view),
            Err(e) => {
                warn!(error = %e, "dropping stored view");
                None
            }
        })
        .collect();

    let edges: Vec<Relation> = payload
        .edges
        .into_iter()
        .filter_map(|raw| match normalize_relation(raw) {
            Ok(rel) => Some(rel),
            Err(e) => {
                warn!(error = %e, "dropping stored relation");
                None
            }
        })
        .collect();

    Ok(GraphData { nodes, edges })
}

pub fn save_graph(storage: &dyn Storage, views: &[View], relations: &[Relation]) -> crate::error::Result<()> {
    #[derive(Serialize)]
    struct GraphRef<'a> {
        nodes: &'a [View],
        edges: &'a [Relation],
    }
    write_json(storage, GRAPH_DATA_KEY, &GraphRef { nodes: views, edges: relations })
}

pub fn load_snapshot(storage: &dyn Storage) -> Result<ImportSnapshot> {
    Ok(read_json(storage, ORIGINAL_IDS_KEY)?.unwrap_or_default())
}

pub fn save_snapshot(storage: &dyn Storage, snapshot: &ImportSnapshot) -> crate::error::Result<()> {
    write_json(storage, ORIGINAL_IDS_KEY, snapshot)
}

pub fn load_last_sql(storage: &dyn Storage) -> Result<String> {
    Ok(storage.get(LAST_SQL_KEY)?.unwrap_or_default())
}

pub fn save_last_sql(storage: &dyn Storage, sql: &str) -> Result<()> {
    storage.set(LAST_SQL_KEY, sql)
}

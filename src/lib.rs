//! dbgraph - Explore the view/relation graph of a reporting database
//!
//! Load `INSERT` statements for the `Report_View` and `Report_ViewRelation`
//! tables, inspect and edit the resulting graph, lay it out, find join paths
//! between views and export it back to SQL or DOT.
//!
//! # Overview
//!
//! A graph lives in a [`GraphStore`]. The [`Gateway`] keeps it in sync with an
//! optional remote backend and falls back to local storage whenever the
//! backend is unreachable. [`AppState`] wires the pieces together from a
//! [`Config`].
//!
//! | Entity | Key | Source table |
//! |--------|-----|--------------|
//! | [`View`] | `view_id` | `Report_View` |
//! | [`Relation`] | generated id | `Report_ViewRelation` |
//!
//! # Quick Start
//!
//! ```no_run
//! use dbgraph::{layout, parse_insert, EntityKind, LayoutConfig, ParsedInsert};
//!
//! let sql = "INSERT INTO Report_View (IdView, Name) VALUES(1, 'Orders')";
//! if let Some(ParsedInsert::View(view)) = parse_insert(sql, EntityKind::View) {
//!     println!("parsed view {} named {}", view.view_id, view.name);
//! }
//!
//! let positions = layout(&[], &[], &LayoutConfig::default());
//! assert!(positions.is_empty());
//! ```

pub mod app;
pub mod config;
pub mod error;
pub mod export;
pub mod gateway;
pub mod layout;
pub mod model;
pub mod normalize;
pub mod path;
pub mod remote;
pub mod schema;
pub mod sql;
pub mod storage;
pub mod store;

pub use app::AppState;
pub use config::{Config, JoinColors, Settings, SettingsStore, Theme};
pub use error::{GraphError, Result, StorageError};
pub use export::{export_graph_sql, export_relation_sql, export_view_sql, graph_to_dot, DotConfig, SqlForm};
pub use gateway::Gateway;
pub use layout::{layout, LayoutConfig, LayoutDirection, PositionedNode};
pub use model::{
    DataSource, EntityKind, GraphData, GraphPayload, ImportSnapshot, ImportSummary, JoinType,
    NewRelation, NewView, RawRelation, RawView, Relation, RelationUpdate, Stats, View, ViewUpdate,
};
pub use normalize::{normalize_relation, normalize_view, RelationRecord, ViewRecord};
pub use path::{find_path, PathResult};
pub use remote::{HttpApi, RemoteApi, RemoteError};
pub use sql::{parse_insert, ParsedInsert, ParsedRelation, ParsedView};
pub use storage::{MemoryStorage, SqliteStorage, Storage};
pub use store::{GraphStore, Selection};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_exports() {
        // Verify core types are re-exported from crate root
        let _ = GraphStore::new();
        let _ = LayoutDirection::default();
        assert_eq!(JoinType::classify("inner join"), JoinType::Inner);
    }
}

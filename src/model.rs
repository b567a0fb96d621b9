//! Canonical graph entities and the wire shapes around them
//!
//! `View` and `Relation` are the only shapes the rest of the crate works
//! with. Everything arriving from SQL, the remote API or local storage goes
//! through [`crate::normalize`] first.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

pub const DEFAULT_MIN_APP_VERSION: i64 = 0;
pub const DEFAULT_MAX_APP_VERSION: i64 = 999_999;
pub const DEFAULT_EDGE_WEIGHT: i64 = 10;

/// A graph node: one database view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct View {
    /// Join key used by relations, layout and pathfinding
    pub id: String,
    /// User-facing primary key
    pub view_id: i64,
    pub name: String,
    /// Fully-qualified alternate name
    pub name2: Option<String>,
    /// Display override
    pub alias: Option<String>,
    pub min_app_version: i64,
    pub max_app_version: i64,
    pub display_name: String,
}

impl View {
    /// Alias, else name, else `View_<view_id>`
    pub fn compute_display_name(view_id: i64, name: &str, alias: Option<&str>) -> String {
        match alias.filter(|a| !a.is_empty()) {
            Some(alias) => alias.to_string(),
            None if !name.is_empty() => name.to_string(),
            None => placeholder_name(view_id),
        }
    }
}

/// Name given to views that only exist because a relation referenced them
pub fn placeholder_name(view_id: i64) -> String {
    format!("View_{}", view_id)
}

/// A directed graph edge: one SQL join between two views
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    pub id: String,
    pub source: String,
    pub target: String,
    /// Raw SQL join clause
    pub relation: String,
    /// Alternate fully-qualified SQL
    pub relation2: Option<String>,
    pub edge_weight: i64,
    pub join_type: JoinType,
}

/// Join classification used for coloring and labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JoinType {
    #[serde(rename = "LEFT JOIN")]
    Left,
    #[serde(rename = "RIGHT JOIN")]
    Right,
    #[serde(rename = "INNER JOIN")]
    Inner,
    #[serde(rename = "CROSS JOIN")]
    Cross,
    #[serde(rename = "FULL JOIN")]
    Full,
    #[serde(rename = "JOIN")]
    Plain,
    #[serde(rename = "DEFAULT")]
    Default,
}

impl JoinType {
    pub const ALL: [JoinType; 7] = [
        JoinType::Left,
        JoinType::Right,
        JoinType::Inner,
        JoinType::Cross,
        JoinType::Full,
        JoinType::Plain,
        JoinType::Default,
    ];

    /// Classify a join clause. First match in priority order wins.
    pub fn classify(relation: &str) -> JoinType {
        if relation.is_empty() {
            return JoinType::Default;
        }
        let upper = relation.to_uppercase();
        if upper.contains("LEFT JOIN") {
            JoinType::Left
        } else if upper.contains("RIGHT JOIN") {
            JoinType::Right
        } else if upper.contains("INNER JOIN") {
            JoinType::Inner
        } else if upper.contains("CROSS JOIN") {
            JoinType::Cross
        } else if upper.contains("FULL JOIN") || upper.contains("FULL OUTER") {
            JoinType::Full
        } else if upper.contains("JOIN") {
            JoinType::Plain
        } else {
            JoinType::Default
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JoinType::Left => "LEFT JOIN",
            JoinType::Right => "RIGHT JOIN",
            JoinType::Inner => "INNER JOIN",
            JoinType::Cross => "CROSS JOIN",
            JoinType::Full => "FULL JOIN",
            JoinType::Plain => "JOIN",
            JoinType::Default => "DEFAULT",
        }
    }
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Wire shapes (remote API and local storage)
// ============================================================================

/// A view as found on the wire or in storage. Every field is optional and
/// numeric fields stay untyped until normalization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawView {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(default)]
    pub view_id: Value,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub name2: Option<String>,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_app_version: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_app_version: Option<Value>,
}

/// A relation as found on the wire or in storage. Accepts either
/// `source`/`target` or the SQL-side `id_view1`/`id_view2`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawRelation {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_view1: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_view2: Option<Value>,
    #[serde(default)]
    pub relation: Option<String>,
    #[serde(default)]
    pub relation2: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edge_weight: Option<Value>,
}

impl From<&View> for RawView {
    fn from(view: &View) -> Self {
        Self {
            id: Some(Value::String(view.id.clone())),
            view_id: Value::from(view.view_id),
            name: Some(view.name.clone()),
            name2: view.name2.clone(),
            alias: view.alias.clone(),
            min_app_version: Some(Value::from(view.min_app_version)),
            max_app_version: Some(Value::from(view.max_app_version)),
        }
    }
}

impl From<&Relation> for RawRelation {
    fn from(relation: &Relation) -> Self {
        Self {
            id: Some(Value::String(relation.id.clone())),
            source: Some(Value::String(relation.source.clone())),
            target: Some(Value::String(relation.target.clone())),
            id_view1: None,
            id_view2: None,
            relation: Some(relation.relation.clone()),
            relation2: relation.relation2.clone(),
            edge_weight: Some(Value::from(relation.edge_weight)),
        }
    }
}

/// `GET /graph-data` body, and the stored offline graph snapshot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphPayload {
    #[serde(default)]
    pub nodes: Vec<RawView>,
    #[serde(default)]
    pub edges: Vec<RawRelation>,
}

/// Canonical graph, as persisted for offline use
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphData {
    pub nodes: Vec<View>,
    pub edges: Vec<Relation>,
}

/// `GET /stats` body
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub views_count: usize,
    pub relations_count: usize,
}

/// Result of a bulk import, identical for the local and remote paths
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub views_created: usize,
    pub relations_created: usize,
    #[serde(default)]
    pub errors: Vec<String>,
}

/// Ids captured right after the most recent initial import
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSnapshot {
    #[serde(default)]
    pub views: Vec<i64>,
    #[serde(default)]
    pub relations: Vec<String>,
}

impl ImportSnapshot {
    pub fn capture(views: &[View], relations: &[Relation]) -> Self {
        Self {
            views: views.iter().map(|v| v.view_id).collect(),
            relations: relations.iter().map(|r| r.id.clone()).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty() && self.relations.is_empty()
    }
}

/// Which of the two entity kinds an id refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    View,
    Relation,
}

/// Where the currently held graph came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Server,
    Local,
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::Server => write!(f, "server"),
            DataSource::Local => write!(f, "local"),
        }
    }
}

// ============================================================================
// Mutation inputs
// ============================================================================

/// Body of `POST /views`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewView {
    pub view_id: i64,
    pub name: String,
    pub name2: Option<String>,
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_app_version: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_app_version: Option<i64>,
}

/// Body of `PUT /views/{view_id}`. `None` leaves a field untouched;
/// `Some(None)` clears a nullable one.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ViewUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name2: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_app_version: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_app_version: Option<i64>,
}

/// Body of `POST /relations`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewRelation {
    pub id_view1: i64,
    pub id_view2: i64,
    pub relation: String,
    pub relation2: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edge_weight: Option<i64>,
}

/// Body of `PUT /relations/{id}`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RelationUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relation2: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edge_weight: Option<i64>,
}

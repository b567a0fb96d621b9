//! Shape incoming records into canonical views and relations
//!
//! Records reach us from three places (SQL parse, remote API, local storage)
//! in three shapes. Each shape is a variant of [`ViewRecord`] /
//! [`RelationRecord`] and is resolved here, once.

use crate::error::{GraphError, Result};
use crate::model::{
    JoinType, RawRelation, RawView, Relation, View, DEFAULT_EDGE_WEIGHT, DEFAULT_MAX_APP_VERSION,
    DEFAULT_MIN_APP_VERSION,
};
use crate::sql::{coerce_int, ParsedRelation, ParsedView};
use serde_json::Value;

/// Every shape a view can arrive in
#[derive(Debug, Clone)]
pub enum ViewRecord {
    Parsed(ParsedView),
    Wire(RawView),
    Canonical(View),
}

/// Every shape a relation can arrive in. Parsed inserts carry no id, so the
/// caller supplies one.
#[derive(Debug, Clone)]
pub enum RelationRecord {
    Parsed { id: String, parsed: ParsedRelation },
    Wire(RawRelation),
    Canonical(Relation),
}

impl From<ParsedView> for ViewRecord {
    fn from(parsed: ParsedView) -> Self {
        ViewRecord::Parsed(parsed)
    }
}

impl From<RawView> for ViewRecord {
    fn from(raw: RawView) -> Self {
        ViewRecord::Wire(raw)
    }
}

impl From<View> for ViewRecord {
    fn from(view: View) -> Self {
        ViewRecord::Canonical(view)
    }
}

impl From<RawRelation> for RelationRecord {
    fn from(raw: RawRelation) -> Self {
        RelationRecord::Wire(raw)
    }
}

impl From<Relation> for RelationRecord {
    fn from(relation: Relation) -> Self {
        RelationRecord::Canonical(relation)
    }
}

/// Integer value of a JSON scalar, if it is (or spells) an integer
pub fn value_to_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => coerce_int(Some(s)),
        _ => None,
    }
}

pub fn to_int_or_default(value: Option<&Value>, default: i64) -> i64 {
    value.and_then(value_to_int).unwrap_or(default)
}

/// String form of an id given as text or number
fn value_to_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(match value_to_int(value) {
            Some(i) => i.to_string(),
            None => n.to_string(),
        }),
        _ => None,
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

/// Canonical view from any record shape
pub fn normalize_view(record: impl Into<ViewRecord>) -> Result<View> {
    match record.into() {
        ViewRecord::Parsed(parsed) => Ok(build_view(
            None,
            parsed.view_id,
            parsed.name,
            parsed.name2,
            parsed.alias,
            parsed.min_app_version,
            parsed.max_app_version,
        )),
        ViewRecord::Wire(raw) => {
            let view_id = value_to_int(&raw.view_id).ok_or_else(|| {
                GraphError::validation(format!("View record has no integer view_id ({})", raw.view_id))
            })?;
            Ok(build_view(
                raw.id.as_ref().and_then(value_to_id),
                view_id,
                raw.name.unwrap_or_default(),
                raw.name2,
                raw.alias,
                to_int_or_default(raw.min_app_version.as_ref(), DEFAULT_MIN_APP_VERSION),
                to_int_or_default(raw.max_app_version.as_ref(), DEFAULT_MAX_APP_VERSION),
            ))
        }
        ViewRecord::Canonical(view) => Ok(build_view(
            Some(view.id),
            view.view_id,
            view.name,
            view.name2,
            view.alias,
            view.min_app_version,
            view.max_app_version,
        )),
    }
}

fn build_view(
    id: Option<String>,
    view_id: i64,
    name: String,
    name2: Option<String>,
    alias: Option<String>,
    min_app_version: i64,
    max_app_version: i64,
) -> View {
    let name2 = non_empty(name2);
    let alias = non_empty(alias);
    let display_name = View::compute_display_name(view_id, &name, alias.as_deref());
    View {
        id: id.filter(|i| !i.is_empty()).unwrap_or_else(|| view_id.to_string()),
        view_id,
        name,
        name2,
        alias,
        min_app_version,
        max_app_version,
        display_name,
    }
}

/// Canonical relation from any record shape
pub fn normalize_relation(record: impl Into<RelationRecord>) -> Result<Relation> {
    match record.into() {
        RelationRecord::Parsed { id, parsed } => Ok(build_relation(
            id,
            parsed.id_view1.to_string(),
            parsed.id_view2.to_string(),
            parsed.relation,
            parsed.relation2,
            parsed.edge_weight.unwrap_or(DEFAULT_EDGE_WEIGHT),
        )),
        RelationRecord::Wire(raw) => {
            let id = raw
                .id
                .as_ref()
                .and_then(value_to_id)
                .ok_or_else(|| GraphError::validation("Relation record has no id"))?;
            let source = raw
                .source
                .as_ref()
                .or(raw.id_view1.as_ref())
                .and_then(value_to_id)
                .ok_or_else(|| GraphError::validation(format!("Relation {} has no source view", id)))?;
            let target = raw
                .target
                .as_ref()
                .or(raw.id_view2.as_ref())
                .and_then(value_to_id)
                .ok_or_else(|| GraphError::validation(format!("Relation {} has no target view", id)))?;
            Ok(build_relation(
                id,
                source,
                target,
                raw.relation.unwrap_or_default(),
                raw.relation2,
                to_int_or_default(raw.edge_weight.as_ref(), DEFAULT_EDGE_WEIGHT),
            ))
        }
        RelationRecord::Canonical(rel) => Ok(build_relation(
            rel.id,
            rel.source,
            rel.target,
            rel.relation,
            rel.relation2,
            rel.edge_weight,
        )),
    }
}

fn build_relation(
    id: String,
    source: String,
    target: String,
    relation: String,
    relation2: Option<String>,
    edge_weight: i64,
) -> Relation {
    let join_type = JoinType::classify(&relation);
    Relation {
        id,
        source,
        target,
        relation,
        relation2: non_empty(relation2),
        edge_weight,
        join_type,
    }
}

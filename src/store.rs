//! In-memory graph state
//!
//! [`GraphStore`] owns the canonical views and relations together with the
//! state that hangs off them: the import snapshot, the hidden set used for
//! filtering, the current selection and the pathfinding endpoints.
//! Everything derived (visible lists, search results, new items) is
//! computed on demand.

use crate::error::{GraphError, Result};
use crate::model::{
    DataSource, EntityKind, ImportSnapshot, NewRelation, NewView, Relation, RelationUpdate, Stats, View,
    ViewUpdate, DEFAULT_EDGE_WEIGHT, DEFAULT_MAX_APP_VERSION, DEFAULT_MIN_APP_VERSION,
};
use crate::normalize::{normalize_relation, normalize_view};
use crate::path::{find_path, PathResult};
use crate::sql::ParsedView;
use std::collections::{BTreeSet, HashMap, HashSet};

/// What the user currently has open, by identity
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub view: Option<i64>,
    pub relation: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GraphStore {
    views: Vec<View>,
    relations: Vec<Relation>,
    stats: Stats,
    data_source: DataSource,
    snapshot: ImportSnapshot,
    hidden: HashSet<i64>,
    filter_mode: bool,
    filter_selection: BTreeSet<i64>,
    selection: Selection,
    path_start: Option<String>,
    path_end: Option<String>,
    found_path: Option<PathResult>,
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphStore {
    pub fn new() -> Self {
        Self {
            views: Vec::new(),
            relations: Vec::new(),
            stats: Stats::default(),
            data_source: DataSource::Local,
            snapshot: ImportSnapshot::default(),
            hidden: HashSet::new(),
            filter_mode: false,
            filter_selection: BTreeSet::new(),
            selection: Selection::default(),
            path_start: None,
            path_end: None,
            found_path: None,
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn views(&self) -> &[View] {
        &self.views
    }

    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    pub fn stats(&self) -> Stats {
        self.stats
    }

    pub fn data_source(&self) -> DataSource {
        self.data_source
    }

    pub fn snapshot(&self) -> &ImportSnapshot {
        &self.snapshot
    }

    pub fn set_snapshot(&mut self, snapshot: ImportSnapshot) {
        self.snapshot = snapshot;
    }

    pub fn view(&self, view_id: i64) -> Option<&View> {
        self.views.iter().find(|v| v.view_id == view_id)
    }

    pub fn view_by_id(&self, id: &str) -> Option<&View> {
        self.views.iter().find(|v| v.id == id)
    }

    pub fn relation(&self, id: &str) -> Option<&Relation> {
        self.relations.iter().find(|r| r.id == id)
    }

    pub fn contains_view(&self, view_id: i64) -> bool {
        self.view(view_id).is_some()
    }

    /// Replace both collections. Stats default to the collection sizes.
    /// Selection, pathfinding and filter state pointing at entities that are
    /// gone is dropped.
    pub fn replace(&mut self, views: Vec<View>, relations: Vec<Relation>, source: DataSource, stats: Option<Stats>) {
        self.stats = stats.unwrap_or(Stats {
            views_count: views.len(),
            relations_count: relations.len(),
        });
        self.views = views;
        self.relations = relations;
        self.data_source = source;
        self.drop_stale_state();
    }

    fn drop_stale_state(&mut self) {
        let view_ids: HashSet<i64> = self.views.iter().map(|v| v.view_id).collect();

        if self.selection.view.is_some_and(|v| !view_ids.contains(&v)) {
            self.selection.view = None;
        }
        if let Some(id) = self.selection.relation.clone() {
            if self.relation(&id).is_none() {
                self.selection.relation = None;
            }
        }
        let endpoint_gone = |endpoint: &Option<String>| {
            endpoint
                .as_deref()
                .is_some_and(|id| self.view_by_id(id).is_none())
        };
        if endpoint_gone(&self.path_start) || endpoint_gone(&self.path_end) {
            self.clear_pathfinding();
        }
        self.hidden.retain(|id| view_ids.contains(id));
        self.filter_selection.retain(|id| view_ids.contains(id));
    }

    pub fn set_data_source(&mut self, source: DataSource) {
        self.data_source = source;
    }

    /// Local stats always reflect the collections
    fn refresh_stats(&mut self) {
        self.stats = Stats {
            views_count: self.views.len(),
            relations_count: self.relations.len(),
        };
    }

    // ------------------------------------------------------------------
    // Derived queries
    // ------------------------------------------------------------------

    /// Non-hidden views matching `query` against display name, name, alias
    /// or view id. An empty query matches everything.
    pub fn filtered_views(&self, query: &str) -> Vec<&View> {
        let query = query.to_lowercase();
        self.views
            .iter()
            .filter(|v| !self.hidden.contains(&v.view_id))
            .filter(|v| {
                query.is_empty()
                    || v.display_name.to_lowercase().contains(&query)
                    || v.name.to_lowercase().contains(&query)
                    || v.alias.as_deref().is_some_and(|a| a.to_lowercase().contains(&query))
                    || v.view_id.to_string().contains(&query)
            })
            .collect()
    }

    pub fn visible_views(&self) -> Vec<&View> {
        self.views.iter().filter(|v| !self.hidden.contains(&v.view_id)).collect()
    }

    /// Relations whose endpoints both exist and are not hidden
    pub fn visible_relations(&self) -> Vec<&Relation> {
        let visible: HashSet<&str> = self
            .views
            .iter()
            .filter(|v| !self.hidden.contains(&v.view_id))
            .map(|v| v.id.as_str())
            .collect();
        self.relations
            .iter()
            .filter(|r| visible.contains(r.source.as_str()) && visible.contains(r.target.as_str()))
            .collect()
    }

    /// Whether an entity was created after the last initial import.
    /// Views are identified by their view id, relations by their id.
    pub fn is_new(&self, kind: EntityKind, id: &str) -> bool {
        match kind {
            EntityKind::View => match id.parse::<i64>() {
                Ok(view_id) => self.is_new_view(view_id),
                Err(_) => true,
            },
            EntityKind::Relation => self.is_new_relation(id),
        }
    }

    pub fn is_new_view(&self, view_id: i64) -> bool {
        !self.snapshot.views.contains(&view_id)
    }

    pub fn is_new_relation(&self, id: &str) -> bool {
        !self.snapshot.relations.iter().any(|r| r == id)
    }

    pub fn new_views(&self) -> Vec<&View> {
        self.views.iter().filter(|v| self.is_new_view(v.view_id)).collect()
    }

    pub fn new_relations(&self) -> Vec<&Relation> {
        self.relations.iter().filter(|r| self.is_new_relation(&r.id)).collect()
    }

    pub fn next_view_id(&self) -> i64 {
        self.views.iter().map(|v| v.view_id).max().map_or(1, |max| max + 1)
    }

    // ------------------------------------------------------------------
    // Validated mutations (local path)
    // ------------------------------------------------------------------

    pub fn add_view(&mut self, data: &NewView) -> Result<&View> {
        check_new_view(data)?;
        if self.contains_view(data.view_id) {
            return Err(GraphError::validation(format!(
                "A view with id {} already exists",
                data.view_id
            )));
        }
        let view = normalize_view(ParsedView {
            view_id: data.view_id,
            name: data.name.clone(),
            name2: data.name2.clone(),
            alias: data.alias.clone(),
            min_app_version: data.min_app_version.unwrap_or(DEFAULT_MIN_APP_VERSION),
            max_app_version: data.max_app_version.unwrap_or(DEFAULT_MAX_APP_VERSION),
        })?;
        self.views.push(view);
        self.refresh_stats();
        Ok(&self.views[self.views.len() - 1])
    }

    /// Merge the given fields into an existing view and re-derive it
    pub fn update_view(&mut self, view_id: i64, update: &ViewUpdate) -> Result<&View> {
        check_view_update(update)?;
        let idx = self
            .views
            .iter()
            .position(|v| v.view_id == view_id)
            .ok_or_else(|| view_not_found(view_id))?;

        let mut merged = self.views[idx].clone();
        if let Some(name) = &update.name {
            merged.name = name.clone();
        }
        if let Some(name2) = &update.name2 {
            merged.name2 = name2.clone();
        }
        if let Some(alias) = &update.alias {
            merged.alias = alias.clone();
        }
        if let Some(min) = update.min_app_version {
            merged.min_app_version = min;
        }
        if let Some(max) = update.max_app_version {
            merged.max_app_version = max;
        }

        self.views[idx] = normalize_view(merged)?;
        Ok(&self.views[idx])
    }

    /// Remove a view and every relation touching it
    pub fn remove_view(&mut self, view_id: i64) -> Result<View> {
        let idx = self
            .views
            .iter()
            .position(|v| v.view_id == view_id)
            .ok_or_else(|| view_not_found(view_id))?;
        let removed = self.views.remove(idx);

        let dropped: Vec<String> = self
            .relations
            .iter()
            .filter(|r| r.source == removed.id || r.target == removed.id)
            .map(|r| r.id.clone())
            .collect();
        self.relations.retain(|r| r.source != removed.id && r.target != removed.id);

        self.forget_view(&removed);
        for id in &dropped {
            self.forget_relation(id);
        }
        self.refresh_stats();
        Ok(removed)
    }

    /// Add a relation between two existing views under the given id
    pub fn add_relation(&mut self, id: String, data: &NewRelation) -> Result<&Relation> {
        check_new_relation(data)?;
        let (source, target) = match (self.view(data.id_view1), self.view(data.id_view2)) {
            (Some(s), Some(t)) => (s.id.clone(), t.id.clone()),
            _ => return Err(GraphError::validation("One or both views do not exist")),
        };
        if self.relation(&id).is_some() {
            return Err(GraphError::validation(format!("Relation {} already exists", id)));
        }

        let relation = normalize_relation(Relation {
            id,
            source,
            target,
            relation: data.relation.clone(),
            relation2: data.relation2.clone(),
            edge_weight: data.edge_weight.unwrap_or(DEFAULT_EDGE_WEIGHT),
            join_type: crate::model::JoinType::Default,
        })?;
        self.relations.push(relation);
        self.refresh_stats();
        Ok(&self.relations[self.relations.len() - 1])
    }

    pub fn update_relation(&mut self, id: &str, update: &RelationUpdate) -> Result<&Relation> {
        check_relation_update(update)?;
        let idx = self
            .relations
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| relation_not_found(id))?;

        let mut merged = self.relations[idx].clone();
        if let Some(relation) = &update.relation {
            merged.relation = relation.clone();
        }
        if let Some(relation2) = &update.relation2 {
            merged.relation2 = relation2.clone();
        }
        if let Some(weight) = update.edge_weight {
            merged.edge_weight = weight;
        }

        self.relations[idx] = normalize_relation(merged)?;
        Ok(&self.relations[idx])
    }

    pub fn remove_relation(&mut self, id: &str) -> Result<Relation> {
        let idx = self
            .relations
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| relation_not_found(id))?;
        let removed = self.relations.remove(idx);
        self.forget_relation(id);
        self.refresh_stats();
        Ok(removed)
    }

    // ------------------------------------------------------------------
    // Import support
    // ------------------------------------------------------------------

    /// Add a parsed view unless its view id is taken. Returns whether it was added.
    pub(crate) fn insert_parsed_view(&mut self, parsed: ParsedView) -> Result<bool> {
        if self.contains_view(parsed.view_id) {
            return Ok(false);
        }
        self.views.push(normalize_view(parsed)?);
        Ok(true)
    }

    /// Make sure a view exists, creating a placeholder when needed.
    /// Returns the view's id and whether it was created.
    pub(crate) fn ensure_view(&mut self, view_id: i64) -> Result<(String, bool)> {
        if let Some(view) = self.view(view_id) {
            return Ok((view.id.clone(), false));
        }
        let view = normalize_view(ParsedView {
            view_id,
            name: crate::model::placeholder_name(view_id),
            name2: None,
            alias: None,
            min_app_version: DEFAULT_MIN_APP_VERSION,
            max_app_version: DEFAULT_MAX_APP_VERSION,
        })?;
        let id = view.id.clone();
        self.views.push(view);
        Ok((id, true))
    }

    pub(crate) fn push_relation(&mut self, relation: Relation) {
        self.relations.push(relation);
    }

    /// Recount after a batch of unchecked inserts
    pub(crate) fn finish_batch(&mut self) {
        self.refresh_stats();
    }

    // ------------------------------------------------------------------
    // Bulk removal
    // ------------------------------------------------------------------

    /// Drop everything: collections, snapshot, selection, pathfinding and filters
    pub fn clear(&mut self) {
        self.views.clear();
        self.relations.clear();
        self.refresh_stats();
        self.reset_ui_state();
    }

    /// Reset snapshot, selection, pathfinding and filters, keeping the collections
    pub fn reset_ui_state(&mut self) {
        self.snapshot = ImportSnapshot::default();
        self.selection = Selection::default();
        self.clear_pathfinding();
        self.clear_filters();
    }

    /// Remove every view and relation missing from the import snapshot,
    /// along with relations left dangling by the removed views
    pub fn remove_new_items(&mut self) -> (usize, usize) {
        let removed_ids: HashSet<String> = self.new_views().iter().map(|v| v.id.clone()).collect();
        let views_before = self.views.len();
        let relations_before = self.relations.len();

        let snapshot = &self.snapshot;
        self.views.retain(|v| snapshot.views.contains(&v.view_id));
        self.relations.retain(|r| {
            snapshot.relations.contains(&r.id) && !removed_ids.contains(&r.source) && !removed_ids.contains(&r.target)
        });

        self.clear_new_selection();
        self.refresh_stats();
        (views_before - self.views.len(), relations_before - self.relations.len())
    }

    /// Clear a selection that points at a view or relation created after
    /// the last import
    pub fn clear_new_selection(&mut self) {
        if self.selection.view.is_some_and(|v| self.is_new_view(v)) {
            self.selection.view = None;
        }
        if self
            .selection
            .relation
            .as_deref()
            .is_some_and(|r| self.is_new_relation(r))
        {
            self.selection.relation = None;
        }
    }

    // ------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn select_view(&mut self, view_id: Option<i64>) {
        self.selection.view = view_id;
    }

    pub fn select_relation(&mut self, id: Option<String>) {
        self.selection.relation = id;
    }

    /// Drop any selection or path endpoint referring to this view
    pub fn forget_view(&mut self, view: &View) {
        if self.selection.view == Some(view.view_id) {
            self.selection.view = None;
        }
        let id = Some(view.id.as_str());
        if self.path_start.as_deref() == id || self.path_end.as_deref() == id {
            self.clear_pathfinding();
        }
    }

    pub fn forget_relation(&mut self, id: &str) {
        if self.selection.relation.as_deref() == Some(id) {
            self.selection.relation = None;
        }
    }

    // ------------------------------------------------------------------
    // Hidden set and filtering
    // ------------------------------------------------------------------

    pub fn hidden(&self) -> &HashSet<i64> {
        &self.hidden
    }

    pub fn is_hidden(&self, view_id: i64) -> bool {
        self.hidden.contains(&view_id)
    }

    pub fn toggle_hidden(&mut self, view_id: i64) {
        if !self.hidden.remove(&view_id) {
            self.hidden.insert(view_id);
        }
    }

    pub fn filter_mode(&self) -> bool {
        self.filter_mode
    }

    pub fn set_filter_mode(&mut self, enabled: bool) {
        self.filter_mode = enabled;
    }

    pub fn filter_selection(&self) -> &BTreeSet<i64> {
        &self.filter_selection
    }

    pub fn toggle_for_filter(&mut self, view_id: i64) {
        if !self.filter_selection.remove(&view_id) {
            self.filter_selection.insert(view_id);
        }
    }

    /// Hide every view outside the filter selection, then leave filter mode
    pub fn apply_filter(&mut self) {
        self.hidden = self
            .views
            .iter()
            .map(|v| v.view_id)
            .filter(|id| !self.filter_selection.contains(id))
            .collect();
        self.filter_mode = false;
        self.filter_selection.clear();
    }

    pub fn clear_filters(&mut self) {
        self.hidden.clear();
        self.filter_selection.clear();
        self.filter_mode = false;
    }

    /// Hide every view that is neither `view_id` nor a direct neighbour of it
    pub fn show_only_connected(&mut self, view_id: i64) {
        let by_id: HashMap<&str, i64> = self.views.iter().map(|v| (v.id.as_str(), v.view_id)).collect();
        let mut connected: HashSet<i64> = HashSet::from([view_id]);
        for rel in &self.relations {
            if let (Some(&source), Some(&target)) = (by_id.get(rel.source.as_str()), by_id.get(rel.target.as_str())) {
                if source == view_id {
                    connected.insert(target);
                }
                if target == view_id {
                    connected.insert(source);
                }
            }
        }
        self.hidden = self
            .views
            .iter()
            .map(|v| v.view_id)
            .filter(|id| !connected.contains(id))
            .collect();
    }

    // ------------------------------------------------------------------
    // Pathfinding
    // ------------------------------------------------------------------

    pub fn path_endpoints(&self) -> (Option<&str>, Option<&str>) {
        (self.path_start.as_deref(), self.path_end.as_deref())
    }

    pub fn found_path(&self) -> Option<&PathResult> {
        self.found_path.as_ref()
    }

    /// Search between two view ids and remember the outcome
    pub fn find_path(&mut self, start: &str, end: &str) -> Option<&PathResult> {
        self.path_start = Some(start.to_string()).filter(|s| !s.is_empty());
        self.path_end = Some(end.to_string()).filter(|s| !s.is_empty());
        self.found_path = find_path(start, end, &self.views, &self.relations);
        self.found_path.as_ref()
    }

    pub fn clear_pathfinding(&mut self) {
        self.path_start = None;
        self.path_end = None;
        self.found_path = None;
    }
}

// ----------------------------------------------------------------------
// Input checks shared by the local and remote paths
// ----------------------------------------------------------------------

fn require(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(GraphError::validation(format!("{} is required", field)))
    } else {
        Ok(())
    }
}

pub(crate) fn check_new_view(data: &NewView) -> Result<()> {
    require(&data.name, "View name")
}

pub(crate) fn check_view_update(update: &ViewUpdate) -> Result<()> {
    if *update == ViewUpdate::default() {
        return Err(GraphError::validation("No fields to update"));
    }
    match &update.name {
        Some(name) => require(name, "View name"),
        None => Ok(()),
    }
}

pub(crate) fn check_new_relation(data: &NewRelation) -> Result<()> {
    require(&data.relation, "Relation")
}

pub(crate) fn check_relation_update(update: &RelationUpdate) -> Result<()> {
    if *update == RelationUpdate::default() {
        return Err(GraphError::validation("No fields to update"));
    }
    match &update.relation {
        Some(relation) => require(relation, "Relation"),
        None => Ok(()),
    }
}

fn view_not_found(view_id: i64) -> GraphError {
    GraphError::validation(format!("View {} not found", view_id))
}

fn relation_not_found(id: &str) -> GraphError {
    GraphError::validation(format!("Relation {} not found", id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::JoinType;

    fn new_view(view_id: i64, name: &str) -> NewView {
        NewView {
            view_id,
            name: name.to_string(),
            ..Default::default()
        }
    }

    fn new_relation(a: i64, b: i64, clause: &str) -> NewRelation {
        NewRelation {
            id_view1: a,
            id_view2: b,
            relation: clause.to_string(),
            ..Default::default()
        }
    }

    /// 1 -> 2 -> 3, plus an isolated 4
    fn sample() -> GraphStore {
        let mut store = GraphStore::new();
        for (id, name) in [(1, "Shop"), (2, "Order"), (3, "Line"), (4, "Audit")] {
            store.add_view(&new_view(id, name)).unwrap();
        }
        store
            .add_relation("r1".to_string(), &new_relation(1, 2, "LEFT JOIN Order ON 1=1"))
            .unwrap();
        store
            .add_relation("r2".to_string(), &new_relation(2, 3, "INNER JOIN Line ON 1=1"))
            .unwrap();
        store
    }

    #[test]
    fn test_add_view_rejects_duplicates() {
        let mut store = sample();
        let err = store.add_view(&new_view(1, "Again")).unwrap_err();
        assert!(err.is_validation());
        assert_eq!(store.views().len(), 4);
    }

    #[test]
    fn test_add_relation_requires_endpoints() {
        let mut store = sample();
        let err = store
            .add_relation("r9".to_string(), &new_relation(99, 1, "JOIN x"))
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(err.to_string(), "One or both views do not exist");
        assert_eq!(store.relations().len(), 2);
    }

    #[test]
    fn test_blank_names_and_clauses_are_rejected() {
        let mut store = sample();
        let err = store.add_view(&new_view(9, "  ")).unwrap_err();
        assert_eq!(err.to_string(), "View name is required");

        let blank_name = ViewUpdate {
            name: Some(String::new()),
            ..Default::default()
        };
        assert!(store.update_view(1, &blank_name).unwrap_err().is_validation());

        let err = store
            .add_relation("r9".to_string(), &new_relation(1, 4, ""))
            .unwrap_err();
        assert_eq!(err.to_string(), "Relation is required");

        let blank_clause = RelationUpdate {
            relation: Some(String::new()),
            ..Default::default()
        };
        assert!(store.update_relation("r1", &blank_clause).unwrap_err().is_validation());

        assert_eq!(store.views().len(), 4);
        assert_eq!(store.relations().len(), 2);
        assert_eq!(store.view(1).unwrap().name, "Shop");
    }

    #[test]
    fn test_relation_defaults() {
        let store = sample();
        let rel = store.relation("r1").unwrap();
        assert_eq!(rel.source, "1");
        assert_eq!(rel.target, "2");
        assert_eq!(rel.edge_weight, 10);
        assert_eq!(rel.join_type, JoinType::Left);
        assert_eq!(store.stats().relations_count, 2);
    }

    #[test]
    fn test_update_view_merges_and_rederives() {
        let mut store = sample();
        let update = ViewUpdate {
            alias: Some(Some("Botiga".to_string())),
            max_app_version: Some(500),
            ..Default::default()
        };
        let view = store.update_view(1, &update).unwrap();
        assert_eq!(view.name, "Shop");
        assert_eq!(view.display_name, "Botiga");
        assert_eq!(view.max_app_version, 500);

        let cleared = ViewUpdate {
            alias: Some(None),
            ..Default::default()
        };
        assert_eq!(store.update_view(1, &cleared).unwrap().display_name, "Shop");
    }

    #[test]
    fn test_update_missing_entities() {
        let mut store = sample();
        let rename = ViewUpdate {
            name: Some("x".to_string()),
            ..Default::default()
        };
        let reweigh = RelationUpdate {
            edge_weight: Some(1),
            ..Default::default()
        };
        assert!(store.update_view(42, &rename).unwrap_err().is_validation());
        assert!(store.update_relation("nope", &reweigh).unwrap_err().is_validation());
        assert!(store.update_view(1, &ViewUpdate::default()).unwrap_err().is_validation());
        assert!(store.remove_relation("nope").unwrap_err().is_validation());
        assert!(store.remove_view(42).unwrap_err().is_validation());
    }

    #[test]
    fn test_update_relation_reclassifies() {
        let mut store = sample();
        let update = RelationUpdate {
            relation: Some("CROSS JOIN Order".to_string()),
            edge_weight: Some(3),
            ..Default::default()
        };
        let rel = store.update_relation("r1", &update).unwrap();
        assert_eq!(rel.join_type, JoinType::Cross);
        assert_eq!(rel.edge_weight, 3);
    }

    #[test]
    fn test_remove_view_cascades() {
        let mut store = sample();
        store.select_view(Some(2));
        store.select_relation(Some("r2".to_string()));

        store.remove_view(2).unwrap();

        assert!(store.relations().iter().all(|r| r.source != "2" && r.target != "2"));
        assert!(store.relations().is_empty());
        assert_eq!(store.selection(), &Selection::default());
        assert_eq!(store.stats().views_count, 3);
    }

    #[test]
    fn test_filtered_views() {
        let mut store = sample();
        let update = ViewUpdate {
            alias: Some(Some("Linia".to_string())),
            ..Default::default()
        };
        store.update_view(3, &update).unwrap();

        fn names(views: Vec<&View>) -> Vec<i64> {
            views.iter().map(|v| v.view_id).collect()
        }
        assert_eq!(names(store.filtered_views("")), vec![1, 2, 3, 4]);
        assert_eq!(names(store.filtered_views("ORD")), vec![2]);
        assert_eq!(names(store.filtered_views("linia")), vec![3]);
        assert_eq!(names(store.filtered_views("4")), vec![4]);

        store.toggle_hidden(2);
        assert!(store.filtered_views("ord").is_empty());
        assert_eq!(names(store.filtered_views("")), vec![1, 3, 4]);
    }

    #[test]
    fn test_visible_relations_need_both_ends() {
        let mut store = sample();
        store.toggle_hidden(3);
        let visible: Vec<&str> = store.visible_relations().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(visible, vec!["r1"]);
        store.toggle_hidden(3);
        assert_eq!(store.visible_relations().len(), 2);
    }

    #[test]
    fn test_apply_filter_hides_unselected() {
        let mut store = sample();
        store.set_filter_mode(true);
        store.toggle_for_filter(1);
        store.toggle_for_filter(3);
        store.toggle_for_filter(3);
        store.toggle_for_filter(2);
        store.apply_filter();

        assert!(!store.filter_mode());
        assert!(store.filter_selection().is_empty());
        assert_eq!(store.hidden(), &HashSet::from([3, 4]));

        store.clear_filters();
        assert!(store.hidden().is_empty());
    }

    #[test]
    fn test_show_only_connected() {
        let mut store = sample();
        store.show_only_connected(2);
        assert_eq!(store.hidden(), &HashSet::from([4]));
        store.show_only_connected(4);
        assert_eq!(store.hidden(), &HashSet::from([1, 2, 3]));
    }

    #[test]
    fn test_is_new_against_snapshot() {
        let mut store = sample();
        store.set_snapshot(ImportSnapshot::capture(store.views(), store.relations()));
        assert!(!store.is_new(EntityKind::View, "1"));
        assert!(!store.is_new(EntityKind::Relation, "r2"));

        store.add_view(&new_view(5, "Fresh")).unwrap();
        store
            .add_relation("r3".to_string(), &new_relation(5, 1, "JOIN Shop"))
            .unwrap();
        assert!(store.is_new(EntityKind::View, "5"));
        assert!(store.is_new(EntityKind::Relation, "r3"));
        assert_eq!(store.new_views().len(), 1);
        assert_eq!(store.new_relations().len(), 1);
    }

    #[test]
    fn test_remove_new_items_drops_dangling_relations() {
        let mut store = sample();
        // Snapshot without view 3: r2 becomes dangling once 3 goes
        store.set_snapshot(ImportSnapshot {
            views: vec![1, 2, 4],
            relations: vec!["r1".to_string(), "r2".to_string()],
        });
        store.select_view(Some(3));

        let (views, relations) = store.remove_new_items();
        assert_eq!((views, relations), (1, 1));
        assert_eq!(store.relations().len(), 1);
        assert_eq!(store.selection().view, None);
    }

    #[test]
    fn test_replace_drops_state_for_missing_entities() {
        let mut store = sample();
        store.select_view(Some(3));
        store.select_relation(Some("r2".to_string()));
        store.find_path("1", "3");
        store.toggle_hidden(3);
        store.toggle_hidden(4);
        store.toggle_for_filter(3);

        let views: Vec<View> = store.views().iter().filter(|v| v.view_id != 3).cloned().collect();
        let relations: Vec<Relation> = store.relations().iter().filter(|r| r.id == "r1").cloned().collect();
        store.replace(views, relations, DataSource::Server, None);

        assert_eq!(store.selection(), &Selection::default());
        assert_eq!(store.path_endpoints(), (None, None));
        assert_eq!(store.found_path(), None);
        assert!(!store.is_hidden(3));
        assert!(store.is_hidden(4));
        assert!(store.filter_selection().is_empty());
        assert!(store.view_by_id("3").is_none());
        assert_eq!(store.view_by_id("1").map(|v| v.view_id), Some(1));
    }

    #[test]
    fn test_replace_keeps_state_for_surviving_entities() {
        let mut store = sample();
        store.select_view(Some(1));
        store.select_relation(Some("r1".to_string()));
        store.find_path("1", "2");

        let (views, relations) = (store.views().to_vec(), store.relations().to_vec());
        store.replace(views, relations, DataSource::Local, None);

        assert_eq!(store.selection().view, Some(1));
        assert_eq!(store.selection().relation.as_deref(), Some("r1"));
        assert_eq!(store.path_endpoints(), (Some("1"), Some("2")));
    }

    #[test]
    fn test_next_view_id() {
        assert_eq!(GraphStore::new().next_view_id(), 1);
        assert_eq!(sample().next_view_id(), 5);
    }

    #[test]
    fn test_find_path_is_remembered() {
        let mut store = sample();
        assert!(store.find_path("1", "3").unwrap().is_found());
        assert_eq!(store.path_endpoints(), (Some("1"), Some("3")));
        assert_eq!(store.find_path("1", "4"), Some(&PathResult::NotFound));

        store.clear_pathfinding();
        assert_eq!(store.found_path(), None);
        assert_eq!(store.path_endpoints(), (None, None));
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut store = sample();
        store.set_snapshot(ImportSnapshot::capture(store.views(), store.relations()));
        store.toggle_hidden(1);
        store.select_view(Some(1));
        store.find_path("1", "2");

        store.clear();
        assert!(store.views().is_empty());
        assert!(store.snapshot().is_empty());
        assert!(store.hidden().is_empty());
        assert_eq!(store.selection(), &Selection::default());
        assert_eq!(store.found_path(), None);
    }
}

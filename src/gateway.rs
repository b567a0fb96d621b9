//! Dual-mode persistence
//!
//! Every operation tries the remote API first when one is configured. If the
//! backend is unreachable or answers 5xx the same operation is replayed
//! against the local store; a 4xx is the backend rejecting the request and is
//! returned as [`GraphError::Validation`]. Local mutations write the whole
//! graph back to storage so the next session starts from the same state.

use crate::error::{GraphError, Result};
use crate::model::{
    DataSource, GraphPayload, ImportSnapshot, ImportSummary, JoinType, NewRelation, NewView, Relation,
    RelationUpdate, Stats, View, ViewUpdate, DEFAULT_EDGE_WEIGHT,
};
use crate::normalize::{normalize_relation, normalize_view};
use crate::remote::{RemoteApi, RemoteError};
use crate::sql::{classify_statement, parse_insert, split_statements, ParsedInsert, ParsedRelation};
use crate::storage::{self, Storage};
use crate::store::{check_new_relation, check_new_view, check_relation_update, check_view_update, GraphStore};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub struct Gateway {
    remote: Option<Arc<dyn RemoteApi>>,
    storage: Arc<dyn Storage>,
    store: GraphStore,
}

impl Gateway {
    /// Build a gateway, restoring the import snapshot from storage. The
    /// graph itself is loaded by [`Gateway::fetch_data`].
    pub fn open(remote: Option<Arc<dyn RemoteApi>>, storage: Arc<dyn Storage>) -> Result<Self> {
        let mut store = GraphStore::new();
        store.set_snapshot(storage::load_snapshot(storage.as_ref())?);
        Ok(Self { remote, storage, store })
    }

    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut GraphStore {
        &mut self.store
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    /// SQL text of the last initial import
    pub fn last_sql(&self) -> Result<String> {
        Ok(storage::load_last_sql(self.storage.as_ref())?)
    }

    pub fn stats(&self) -> Stats {
        self.store.stats()
    }

    /// Decide what a remote failure means: availability problems let the
    /// caller continue on the local path, anything else is surfaced
    fn remote_failure(&self, operation: &str, err: RemoteError) -> Result<()> {
        if err.is_availability_failure() {
            warn!(operation, error = %err, "remote unavailable, using local storage");
            Ok(())
        } else {
            Err(GraphError::validation(err.user_message()))
        }
    }

    /// Set both collections and mirror them to the offline snapshot
    fn apply_graph(&mut self, views: Vec<View>, relations: Vec<Relation>, source: DataSource, stats: Option<Stats>) -> Result<()> {
        storage::save_graph(self.storage.as_ref(), &views, &relations)?;
        if self.store.data_source() != source {
            info!(%source, "data source changed");
        }
        self.store.replace(views, relations, source, stats);
        Ok(())
    }

    /// Persist the store after a local mutation
    fn commit_local(&mut self) -> Result<()> {
        if self.store.data_source() != DataSource::Local {
            info!(source = %DataSource::Local, "data source changed");
        }
        self.store.set_data_source(DataSource::Local);
        storage::save_graph(self.storage.as_ref(), self.store.views(), self.store.relations())
    }

    fn save_snapshot(&mut self, snapshot: ImportSnapshot) -> Result<()> {
        storage::save_snapshot(self.storage.as_ref(), &snapshot)?;
        self.store.set_snapshot(snapshot);
        Ok(())
    }

    // ========================================================================
    // Loading
    // ========================================================================

    /// Load the graph from the backend, or from the offline snapshot when
    /// there is no reachable backend
    pub async fn fetch_data(&mut self) -> Result<()> {
        if let Some(remote) = self.remote.clone() {
            match tokio::try_join!(remote.graph_data(), remote.stats()) {
                Ok((payload, stats)) => {
                    let (views, relations) = normalize_payload(payload);
                    return self.apply_graph(views, relations, DataSource::Server, Some(stats));
                }
                Err(e) => self.remote_failure("fetch graph", e)?,
            }
        }

        let graph = storage::load_graph(self.storage.as_ref())?;
        self.apply_graph(graph.nodes, graph.edges, DataSource::Local, None)
    }

    // ========================================================================
    // Import
    // ========================================================================

    /// Bulk import of `INSERT` statements. An initial import also records
    /// the SQL text and snapshots the resulting ids.
    ///
    /// A 2xx whose summary cannot be read means the backend has already
    /// committed the import, so the graph is re-read instead of replaying
    /// the statements locally.
    pub async fn import_sql(&mut self, sql: &str, initial: bool) -> Result<ImportSummary> {
        if let Some(remote) = self.remote.clone() {
            let before = self.store.stats();
            let reported = match remote.import_sql(sql).await {
                Ok(summary) => Some(Some(summary)),
                Err(RemoteError::Decode(e)) => {
                    warn!(error = %e, "unreadable import summary, re-reading graph");
                    Some(None)
                }
                Err(e) => {
                    self.remote_failure("import sql", e)?;
                    None
                }
            };
            if let Some(reported) = reported {
                self.store.set_data_source(DataSource::Server);
                if initial {
                    storage::save_last_sql(self.storage.as_ref(), sql)?;
                }
                self.fetch_data().await?;
                if initial {
                    let snapshot = ImportSnapshot::capture(self.store.views(), self.store.relations());
                    self.save_snapshot(snapshot)?;
                }
                let after = self.store.stats();
                let summary = reported.unwrap_or_else(|| ImportSummary {
                    views_created: after.views_count.saturating_sub(before.views_count),
                    relations_created: after.relations_count.saturating_sub(before.relations_count),
                    errors: Vec::new(),
                });
                info!(
                    views = summary.views_created,
                    relations = summary.relations_created,
                    errors = summary.errors.len(),
                    "imported through remote"
                );
                return Ok(summary);
            }
        }

        let summary = self.import_local(sql)?;
        if initial {
            storage::save_last_sql(self.storage.as_ref(), sql)?;
        }
        self.commit_local()?;
        if initial {
            let snapshot = ImportSnapshot::capture(self.store.views(), self.store.relations());
            self.save_snapshot(snapshot)?;
        }
        info!(
            views = summary.views_created,
            relations = summary.relations_created,
            errors = summary.errors.len(),
            "imported locally"
        );
        Ok(summary)
    }

    fn import_local(&mut self, sql: &str) -> Result<ImportSummary> {
        let mut summary = ImportSummary::default();

        for statement in split_statements(sql) {
            let Some(kind) = classify_statement(statement) else {
                debug!(statement, "skipping statement for unknown table");
                continue;
            };
            match parse_insert(statement, kind) {
                Some(ParsedInsert::View(parsed)) => {
                    if self.store.insert_parsed_view(parsed)? {
                        summary.views_created += 1;
                    }
                }
                Some(ParsedInsert::Relation(parsed)) => match self.import_relation(parsed) {
                    Ok(placeholders) => {
                        summary.views_created += placeholders;
                        summary.relations_created += 1;
                    }
                    Err(e) => summary.errors.push(format!("Error creating relation: {}", e)),
                },
                None => {
                    debug!(statement, "unparsable statement");
                    summary.errors.push(format!("Could not parse statement: {}", preview(statement)));
                }
            }
        }

        self.store.finish_batch();
        Ok(summary)
    }

    /// Add a parsed relation, creating placeholder views for unknown
    /// endpoints. Returns how many placeholders were created.
    fn import_relation(&mut self, parsed: ParsedRelation) -> Result<usize> {
        let (source, source_created) = self.store.ensure_view(parsed.id_view1)?;
        let (target, target_created) = self.store.ensure_view(parsed.id_view2)?;

        let relation = normalize_relation(Relation {
            id: Uuid::new_v4().to_string(),
            source,
            target,
            relation: parsed.relation,
            relation2: parsed.relation2,
            edge_weight: parsed.edge_weight.unwrap_or(DEFAULT_EDGE_WEIGHT),
            join_type: JoinType::Default,
        })?;
        self.store.push_relation(relation);
        Ok(usize::from(source_created) + usize::from(target_created))
    }

    // ========================================================================
    // Views
    // ========================================================================

    pub async fn create_view(&mut self, view: &NewView) -> Result<()> {
        check_new_view(view)?;
        if let Some(remote) = self.remote.clone() {
            match remote.create_view(view).await {
                Ok(()) => return self.refresh_from_server().await,
                Err(e) => self.remote_failure("create view", e)?,
            }
        }

        self.store.add_view(view)?;
        self.commit_local()
    }

    pub async fn update_view(&mut self, view_id: i64, update: &ViewUpdate) -> Result<()> {
        check_view_update(update)?;
        if let Some(remote) = self.remote.clone() {
            match remote.update_view(view_id, update).await {
                Ok(()) => return self.refresh_from_server().await,
                Err(e) => self.remote_failure("update view", e)?,
            }
        }

        self.store.update_view(view_id, update)?;
        self.commit_local()
    }

    /// Delete a view and every relation touching it
    pub async fn delete_view(&mut self, view_id: i64) -> Result<()> {
        if let Some(remote) = self.remote.clone() {
            match remote.delete_view(view_id).await {
                Ok(()) => {
                    if let Some(view) = self.store.view(view_id).cloned() {
                        let touching: Vec<String> = self
                            .store
                            .relations()
                            .iter()
                            .filter(|r| r.source == view.id || r.target == view.id)
                            .map(|r| r.id.clone())
                            .collect();
                        self.store.forget_view(&view);
                        for id in &touching {
                            self.store.forget_relation(id);
                        }
                    }
                    return self.refresh_from_server().await;
                }
                Err(e) => self.remote_failure("delete view", e)?,
            }
        }

        self.store.remove_view(view_id)?;
        self.commit_local()
    }

    // ========================================================================
    // Relations
    // ========================================================================

    pub async fn create_relation(&mut self, relation: &NewRelation) -> Result<()> {
        check_new_relation(relation)?;
        if let Some(remote) = self.remote.clone() {
            match remote.create_relation(relation).await {
                Ok(()) => return self.refresh_from_server().await,
                Err(e) => self.remote_failure("create relation", e)?,
            }
        }

        self.store.add_relation(Uuid::new_v4().to_string(), relation)?;
        self.commit_local()
    }

    pub async fn update_relation(&mut self, id: &str, update: &RelationUpdate) -> Result<()> {
        check_relation_update(update)?;
        if let Some(remote) = self.remote.clone() {
            match remote.update_relation(id, update).await {
                Ok(()) => return self.refresh_from_server().await,
                Err(e) => self.remote_failure("update relation", e)?,
            }
        }

        self.store.update_relation(id, update)?;
        self.commit_local()
    }

    pub async fn delete_relation(&mut self, id: &str) -> Result<()> {
        if let Some(remote) = self.remote.clone() {
            match remote.delete_relation(id).await {
                Ok(()) => {
                    self.store.forget_relation(id);
                    return self.refresh_from_server().await;
                }
                Err(e) => self.remote_failure("delete relation", e)?,
            }
        }

        self.store.remove_relation(id)?;
        self.commit_local()
    }

    // ========================================================================
    // Bulk removal
    // ========================================================================

    /// Remove everything, including the import snapshot and the last SQL
    pub async fn clear_all(&mut self) -> Result<()> {
        if let Some(remote) = self.remote.clone() {
            match remote.clear_all().await {
                Ok(()) => {
                    self.reset_import_state()?;
                    return self.refresh_from_server().await;
                }
                Err(e) => self.remote_failure("clear all", e)?,
            }
        }

        self.reset_import_state()?;
        self.store.clear();
        self.commit_local()
    }

    fn reset_import_state(&mut self) -> Result<()> {
        self.store.reset_ui_state();
        storage::save_snapshot(self.storage.as_ref(), &ImportSnapshot::default())?;
        storage::save_last_sql(self.storage.as_ref(), "")?;
        Ok(())
    }

    /// Delete every view and relation created since the last initial import.
    /// Returns how many views and relations were removed.
    pub async fn clear_new_items(&mut self) -> Result<(usize, usize)> {
        if let Some(remote) = self.remote.clone() {
            let relation_ids: Vec<String> = self.store.new_relations().iter().map(|r| r.id.clone()).collect();
            let view_ids: Vec<i64> = self.store.new_views().iter().map(|v| v.view_id).collect();

            match delete_all(remote.as_ref(), &relation_ids, &view_ids).await {
                Ok(()) => {
                    self.store.clear_new_selection();
                    self.refresh_from_server().await?;
                    return Ok((view_ids.len(), relation_ids.len()));
                }
                Err(e) => self.remote_failure("clear new items", e)?,
            }
        }

        let removed = self.store.remove_new_items();
        self.commit_local()?;
        Ok(removed)
    }

    async fn refresh_from_server(&mut self) -> Result<()> {
        self.store.set_data_source(DataSource::Server);
        self.fetch_data().await
    }
}

/// Relations first so view cascades never race them
async fn delete_all(remote: &dyn RemoteApi, relation_ids: &[String], view_ids: &[i64]) -> std::result::Result<(), RemoteError> {
    let relations = relation_ids.iter().map(|id| remote.delete_relation(id));
    run_in_order(relations).await?;
    let views = view_ids.iter().map(|id| remote.delete_view(*id));
    run_in_order(views).await?;
    Ok(())
}

/// Run requests one after another, stopping at the first failure
async fn run_in_order<I, F>(requests: I) -> std::result::Result<(), RemoteError>
where
    I: IntoIterator<Item = F>,
    F: std::future::Future<Output = std::result::Result<(), RemoteError>>,
{
    for request in requests {
        request.await?;
    }
    Ok(())
}

/// Canonical collections from a server payload; malformed records are dropped
fn normalize_payload(payload: GraphPayload) -> (Vec<View>, Vec<Relation>) {
    let views = payload
        .nodes
        .into_iter()
        .filter_map(|raw| {
            normalize_view(raw)
                .map_err(|e| warn!(error = %e, "dropping server view"))
                .ok()
        })
        .collect();
    let relations = payload
        .edges
        .into_iter()
        .filter_map(|raw| {
            normalize_relation(raw)
                .map_err(|e| warn!(error = %e, "dropping server relation"))
                .ok()
        })
        .collect();
    (views, relations)
}

fn preview(statement: &str) -> String {
    const MAX: usize = 80;
    if statement.chars().count() <= MAX {
        statement.to_string()
    } else {
        format!("{}...", statement.chars().take(MAX).collect::<String>())
    }
}

//! Export functionality for dbgraph
//!
//! Supports:
//! - SQL statements in the exact import shape (INSERT and UPDATE forms)
//! - DOT format for Graphviz visualization, edges colored by join type

use crate::config::{JoinColors, Settings};
use crate::layout::LayoutDirection;
use crate::model::{Relation, View, DEFAULT_EDGE_WEIGHT};
use crate::sql::{RELATION_TABLE, VIEW_TABLE};
use std::fmt::Write;

/// Fixed trailing values of an exported relation insert:
/// MinAppVersion, MaxAppVersion, ChangeOwner
const RELATION_INSERT_TAIL: &str = "2000000, 999999999, 1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlForm {
    Insert,
    Update,
}

/// Single-quoted SQL literal, or NULL for missing or empty text
fn sql_string(value: Option<&str>) -> String {
    match value {
        Some(s) if !s.is_empty() => format!("'{}'", s.replace('\'', "''")),
        _ => "NULL".to_string(),
    }
}

pub fn export_view_sql(view: &View, form: SqlForm) -> String {
    let name = sql_string(Some(&view.name));
    let name2 = sql_string(view.name2.as_deref());
    let alias = sql_string(view.alias.as_deref());

    match form {
        SqlForm::Insert => format!(
            "INSERT INTO {} (IdView, Name, Name2, Alias, MinAppVersion, MaxAppVersion) VALUES({}, {}, {}, {}, {}, {});",
            VIEW_TABLE, view.view_id, name, name2, alias, view.min_app_version, view.max_app_version
        ),
        SqlForm::Update => format!(
            "UPDATE {} SET Name = {}, Name2 = {}, Alias = {}, MinAppVersion = {}, MaxAppVersion = {} WHERE IdView = {};",
            VIEW_TABLE, name, name2, alias, view.min_app_version, view.max_app_version, view.view_id
        ),
    }
}

/// Endpoint as the numeric view id, when the view is known
fn endpoint(id: &str, views: &[View]) -> String {
    views
        .iter()
        .find(|v| v.id == id)
        .map(|v| v.view_id.to_string())
        .unwrap_or_else(|| id.to_string())
}

/// Relation statement; endpoints are resolved to view ids through `views`
pub fn export_relation_sql(relation: &Relation, views: &[View], form: SqlForm) -> String {
    let clause = sql_string(Some(&relation.relation));
    let clause2 = sql_string(relation.relation2.as_deref());
    let weight = if relation.edge_weight == 0 {
        DEFAULT_EDGE_WEIGHT
    } else {
        relation.edge_weight
    };
    let id_view1 = endpoint(&relation.source, views);
    let id_view2 = endpoint(&relation.target, views);

    match form {
        SqlForm::Insert => format!(
            "INSERT INTO {} (IdView1, IdView2, Relation, Relation2, EdgeWeight, MinAppVersion, MaxAppVersion, ChangeOwner) VALUES({}, {}, {}, {}, {}, {});",
            RELATION_TABLE, id_view1, id_view2, clause, clause2, weight, RELATION_INSERT_TAIL
        ),
        SqlForm::Update => format!(
            "UPDATE {} SET Relation = {}, Relation2 = {}, EdgeWeight = {} WHERE IdView1 = {} AND IdView2 = {};",
            RELATION_TABLE, clause, clause2, weight, id_view1, id_view2
        ),
    }
}

/// Every view insert followed by every relation insert, one per line.
/// The output can be fed back into an import, except that a value holding
/// `;` does not survive: imports split statements on every `;`, quoted or
/// not.
pub fn export_graph_sql(views: &[View], relations: &[Relation]) -> String {
    let mut sql = String::new();
    for view in views {
        writeln!(sql, "{}", export_view_sql(view, SqlForm::Insert)).unwrap();
    }
    for relation in relations {
        writeln!(sql, "{}", export_relation_sql(relation, views, SqlForm::Insert)).unwrap();
    }
    sql
}

// ============================================================================
// DOT
// ============================================================================

/// Configuration for DOT export
#[derive(Debug, Clone)]
pub struct DotConfig {
    /// Title for the graph
    pub title: Option<String>,
    /// Prefix labels with the view id
    pub show_ids: bool,
    /// Show the join type on edges
    pub show_edge_labels: bool,
    /// Graph direction
    pub rankdir: LayoutDirection,
    pub colors: JoinColors,
}

impl Default for DotConfig {
    fn default() -> Self {
        Self {
            title: None,
            show_ids: true,
            show_edge_labels: true,
            rankdir: LayoutDirection::TB,
            colors: JoinColors::default(),
        }
    }
}

impl From<&Settings> for DotConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            title: None,
            show_ids: settings.show_view_id,
            show_edge_labels: settings.show_edge_labels,
            rankdir: settings.layout_direction,
            colors: settings.join_colors.clone(),
        }
    }
}

/// Escape a string for DOT labels
fn escape_dot(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

/// Truncate string to max length (char-aware)
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        format!("{}...", s.chars().take(max_len.saturating_sub(3)).collect::<String>())
    }
}

/// Convert the graph to DOT format
pub fn graph_to_dot(views: &[View], relations: &[Relation], config: &DotConfig) -> String {
    let mut dot = String::new();

    // Graph header
    writeln!(dot, "digraph ViewGraph {{").unwrap();
    writeln!(dot, "  rankdir={};", config.rankdir).unwrap();
    writeln!(dot, "  node [fontname=\"Arial\" fontsize=10 shape=\"box\" style=\"rounded\"];").unwrap();
    writeln!(dot, "  edge [fontname=\"Arial\" fontsize=9];").unwrap();

    if let Some(title) = &config.title {
        writeln!(dot, "  label=\"{}\";", escape_dot(title)).unwrap();
        writeln!(dot, "  labelloc=t;").unwrap();
        writeln!(dot, "  fontsize=14;").unwrap();
    }
    writeln!(dot).unwrap();

    // Nodes
    for view in views {
        let mut label = String::new();
        if config.show_ids {
            write!(label, "[{}] ", view.view_id).unwrap();
        }
        label.push_str(&truncate(&view.display_name, 40));

        writeln!(dot, "  \"{}\" [label=\"{}\"];", escape_dot(&view.id), escape_dot(&label)).unwrap();
    }

    writeln!(dot).unwrap();

    // Edges
    for relation in relations {
        let mut attrs = vec![format!("color=\"{}\"", config.colors.get(relation.join_type))];
        if config.show_edge_labels {
            attrs.push(format!("label=\"{}\"", relation.join_type));
        }

        writeln!(
            dot,
            "  \"{}\" -> \"{}\" [{}];",
            escape_dot(&relation.source),
            escape_dot(&relation.target),
            attrs.join(" ")
        )
        .unwrap();
    }

    writeln!(dot, "}}").unwrap();

    dot
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::JoinType;
    use crate::normalize::{normalize_relation, normalize_view, RelationRecord};
    use crate::sql::{parse_relation_insert, parse_view_insert, split_statements, ParsedView};
    use proptest::prelude::*;

    fn shop() -> View {
        normalize_view(ParsedView {
            view_id: 1234,
            name: "Shop".to_string(),
            name2: Some("DBCommon.Shop".to_string()),
            alias: Some("Botiga".to_string()),
            min_app_version: 0,
            max_app_version: 999999,
        })
        .unwrap()
    }

    fn order() -> View {
        normalize_view(ParsedView {
            view_id: 5678,
            name: "Order".to_string(),
            name2: None,
            alias: None,
            min_app_version: 0,
            max_app_version: 999999,
        })
        .unwrap()
    }

    fn shop_order() -> Relation {
        Relation {
            id: "r1".to_string(),
            source: "1234".to_string(),
            target: "5678".to_string(),
            relation: "LEFT JOIN Shop ON Shop.Id = Order.ShopId".to_string(),
            relation2: None,
            edge_weight: 10,
            join_type: JoinType::Left,
        }
    }

    #[test]
    fn test_view_insert_shape() {
        assert_eq!(
            export_view_sql(&shop(), SqlForm::Insert),
            "INSERT INTO Report_View (IdView, Name, Name2, Alias, MinAppVersion, MaxAppVersion) VALUES(1234, 'Shop', 'DBCommon.Shop', 'Botiga', 0, 999999);"
        );
    }

    #[test]
    fn test_view_update_shape() {
        assert_eq!(
            export_view_sql(&order(), SqlForm::Update),
            "UPDATE Report_View SET Name = 'Order', Name2 = NULL, Alias = NULL, MinAppVersion = 0, MaxAppVersion = 999999 WHERE IdView = 5678;"
        );
    }

    #[test]
    fn test_relation_insert_shape() {
        let views = vec![shop(), order()];
        assert_eq!(
            export_relation_sql(&shop_order(), &views, SqlForm::Insert),
            "INSERT INTO Report_ViewRelation (IdView1, IdView2, Relation, Relation2, EdgeWeight, MinAppVersion, MaxAppVersion, ChangeOwner) VALUES(1234, 5678, 'LEFT JOIN Shop ON Shop.Id = Order.ShopId', NULL, 10, 2000000, 999999999, 1);"
        );
    }

    #[test]
    fn test_relation_update_shape() {
        let mut rel = shop_order();
        rel.relation = "JOIN O ON O.Name = 'x'".to_string();
        rel.edge_weight = 0;
        assert_eq!(
            export_relation_sql(&rel, &[shop(), order()], SqlForm::Update),
            "UPDATE Report_ViewRelation SET Relation = 'JOIN O ON O.Name = ''x''', Relation2 = NULL, EdgeWeight = 10 WHERE IdView1 = 1234 AND IdView2 = 5678;"
        );
    }

    #[test]
    fn test_relation_export_reparses() {
        let views = vec![shop(), order()];
        let sql = export_relation_sql(&shop_order(), &views, SqlForm::Insert);
        let parsed = parse_relation_insert(&sql).unwrap();
        assert_eq!(parsed.id_view1, 1234);
        assert_eq!(parsed.edge_weight, Some(10));
        assert_eq!(parsed.change_owner, Some(1));

        let rel = normalize_relation(RelationRecord::Parsed {
            id: "r1".to_string(),
            parsed,
        })
        .unwrap();
        assert_eq!(rel, shop_order());
    }

    #[test]
    fn test_export_graph_sql_lists_views_first() {
        let sql = export_graph_sql(&[shop(), order()], &[shop_order()]);
        let lines: Vec<&str> = sql.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("INSERT INTO Report_View "));
        assert!(lines[2].starts_with("INSERT INTO Report_ViewRelation "));
    }

    #[test]
    fn test_export_graph_sql_splits_into_one_statement_per_entity() {
        let sql = export_graph_sql(&[shop(), order()], &[shop_order()]);
        assert_eq!(split_statements(&sql).len(), 3);

        // A `;` inside a quoted value cuts the statement short
        let mut rel = shop_order();
        rel.relation = "JOIN O ON O.Name = 'a;b'".to_string();
        let sql = export_graph_sql(&[shop(), order()], &[rel]);
        let statements = split_statements(&sql);
        assert_eq!(statements.len(), 4);
        assert!(parse_relation_insert(statements[2]).is_none());
    }

    #[test]
    fn test_graph_to_dot() {
        let dot = graph_to_dot(&[shop(), order()], &[shop_order()], &DotConfig::default());

        assert!(dot.contains("digraph ViewGraph"));
        assert!(dot.contains("rankdir=TB;"));
        assert!(dot.contains("\"1234\" [label=\"[1234] Botiga\"]"));
        assert!(dot.contains("\"1234\" -> \"5678\""));
        assert!(dot.contains("color=\"#3B82F6\""));
        assert!(dot.contains("label=\"LEFT JOIN\""));
    }

    #[test]
    fn test_dot_follows_settings() {
        let mut settings = Settings::default();
        settings.layout_direction = LayoutDirection::LR;
        settings.show_view_id = false;
        settings.show_edge_labels = false;
        let dot = graph_to_dot(&[order()], &[], &DotConfig::from(&settings));

        assert!(dot.contains("rankdir=LR;"));
        assert!(dot.contains("[label=\"Order\"]"));
    }

    #[test]
    fn test_escape_and_truncate() {
        assert_eq!(escape_dot("a\"b\nc"), "a\\\"b\\nc");
        assert_eq!(truncate("abcdef", 5), "ab...");
        assert_eq!(truncate("abc", 5), "abc");
    }

    proptest! {
        #[test]
        fn prop_view_export_reparses_to_same_view(
            view_id in any::<i32>(),
            name in "[A-Za-z0-9 ,()'\".]{0,12}[A-Za-z]",
            name2 in proptest::option::of("[A-Za-z0-9 ,()'.]{1,12}"),
            alias in proptest::option::of("[A-Za-z0-9 ,'()]{1,8}"),
            min in 0i64..1000,
            max in 0i64..1_000_000,
        ) {
            let original = normalize_view(ParsedView {
                view_id: view_id as i64,
                name,
                name2,
                alias,
                min_app_version: min,
                max_app_version: max,
            })
            .unwrap();

            let sql = export_view_sql(&original, SqlForm::Insert);
            let parsed = parse_view_insert(&sql);
            prop_assert!(parsed.is_some(), "rejected: {}", sql);
            let reparsed = normalize_view(parsed.unwrap()).unwrap();
            prop_assert_eq!(original, reparsed);
        }
    }
}

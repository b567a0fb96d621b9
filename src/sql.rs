//! Recognizer for the two `INSERT` statement shapes we import
//!
//! ```text
//! INSERT INTO Report_View (IdView, Name, ...) VALUES(1234, 'Shop', ...);
//! INSERT INTO Report_ViewRelation (IdView1, IdView2, Relation, ...) VALUES(1234, 5678, 'LEFT JOIN ...', ...);
//! ```
//!
//! This is not a SQL parser. Anything outside those two shapes is rejected
//! and every function here is pure.

use crate::model::{EntityKind, DEFAULT_MAX_APP_VERSION, DEFAULT_MIN_APP_VERSION};
use lazy_static::lazy_static;
use regex::Regex;

pub const VIEW_TABLE: &str = "Report_View";
pub const RELATION_TABLE: &str = "Report_ViewRelation";

lazy_static! {
    static ref VIEW_INSERT_RE: Regex =
        Regex::new(r"(?i)INSERT\s+INTO\s+Report_View\s*\(([^)]+)\)\s*VALUES\s*\(")
            .expect("view insert pattern");
    static ref RELATION_INSERT_RE: Regex =
        Regex::new(r"(?i)INSERT\s+INTO\s+Report_ViewRelation\s*\(([^)]+)\)\s*VALUES\s*\(")
            .expect("relation insert pattern");
}

/// A recognized `Report_View` insert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedView {
    pub view_id: i64,
    pub name: String,
    pub name2: Option<String>,
    pub alias: Option<String>,
    pub min_app_version: i64,
    pub max_app_version: i64,
}

/// A recognized `Report_ViewRelation` insert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRelation {
    pub id_view1: i64,
    pub id_view2: i64,
    pub relation: String,
    pub relation2: Option<String>,
    pub edge_weight: Option<i64>,
    pub min_app_version: Option<i64>,
    pub max_app_version: Option<i64>,
    pub change_owner: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedInsert {
    View(ParsedView),
    Relation(ParsedRelation),
}

/// Parse one statement as the given record kind. `None` when the statement
/// does not have the expected shape or lacks a required field.
pub fn parse_insert(sql: &str, kind: EntityKind) -> Option<ParsedInsert> {
    match kind {
        EntityKind::View => parse_view_insert(sql).map(ParsedInsert::View),
        EntityKind::Relation => parse_relation_insert(sql).map(ParsedInsert::Relation),
    }
}

enum ViewColumn {
    ViewId,
    Name,
    Name2,
    Alias,
    MinAppVersion,
    MaxAppVersion,
}

fn view_column(column: &str) -> Option<ViewColumn> {
    match column {
        "idview" | "viewid" => Some(ViewColumn::ViewId),
        "name" => Some(ViewColumn::Name),
        "name2" => Some(ViewColumn::Name2),
        "alias" => Some(ViewColumn::Alias),
        "minappversion" => Some(ViewColumn::MinAppVersion),
        "maxappversion" => Some(ViewColumn::MaxAppVersion),
        _ => None,
    }
}

enum RelationColumn {
    IdView1,
    IdView2,
    Relation,
    Relation2,
    EdgeWeight,
    MinAppVersion,
    MaxAppVersion,
    ChangeOwner,
}

fn relation_column(column: &str) -> Option<RelationColumn> {
    match column {
        "idview1" => Some(RelationColumn::IdView1),
        "idview2" => Some(RelationColumn::IdView2),
        "relation" => Some(RelationColumn::Relation),
        "relation2" => Some(RelationColumn::Relation2),
        "edgeweight" => Some(RelationColumn::EdgeWeight),
        "minappversion" => Some(RelationColumn::MinAppVersion),
        "maxappversion" => Some(RelationColumn::MaxAppVersion),
        "changeowner" => Some(RelationColumn::ChangeOwner),
        _ => None,
    }
}

/// Parse a `Report_View` insert
pub fn parse_view_insert(sql: &str) -> Option<ParsedView> {
    let (columns, values) = extract_insert(&VIEW_INSERT_RE, sql)?;

    let mut view_id = None;
    let mut name = None;
    let mut name2 = None;
    let mut alias = None;
    let mut min_app_version = None;
    let mut max_app_version = None;

    for (index, column) in columns.iter().enumerate() {
        let Some(field) = view_column(column) else {
            continue;
        };
        let value = values.get(index).and_then(|v| clean_sql_value(v));

        match field {
            // Identity column: a non-integer makes the whole record invalid
            ViewColumn::ViewId => view_id = Some(coerce_int(value.as_deref())?),
            ViewColumn::Name => name = value,
            ViewColumn::Name2 => name2 = value,
            ViewColumn::Alias => alias = value,
            ViewColumn::MinAppVersion => min_app_version = coerce_int(value.as_deref()),
            ViewColumn::MaxAppVersion => max_app_version = coerce_int(value.as_deref()),
        }
    }

    let view_id = view_id?;
    let name = name.filter(|n| !n.is_empty())?;

    Some(ParsedView {
        view_id,
        name,
        name2,
        alias,
        min_app_version: min_app_version.unwrap_or(DEFAULT_MIN_APP_VERSION),
        max_app_version: max_app_version.unwrap_or(DEFAULT_MAX_APP_VERSION),
    })
}

/// Parse a `Report_ViewRelation` insert
pub fn parse_relation_insert(sql: &str) -> Option<ParsedRelation> {
    let (columns, values) = extract_insert(&RELATION_INSERT_RE, sql)?;

    let mut id_view1 = None;
    let mut id_view2 = None;
    let mut relation = None;
    let mut relation2 = None;
    let mut edge_weight = None;
    let mut min_app_version = None;
    let mut max_app_version = None;
    let mut change_owner = None;

    for (index, column) in columns.iter().enumerate() {
        let Some(field) = relation_column(column) else {
            continue;
        };
        let value = values.get(index).and_then(|v| clean_sql_value(v));

        match field {
            RelationColumn::IdView1 => id_view1 = Some(coerce_int(value.as_deref())?),
            RelationColumn::IdView2 => id_view2 = Some(coerce_int(value.as_deref())?),
            RelationColumn::Relation => relation = value,
            RelationColumn::Relation2 => relation2 = value,
            RelationColumn::EdgeWeight => edge_weight = coerce_int(value.as_deref()),
            RelationColumn::MinAppVersion => min_app_version = coerce_int(value.as_deref()),
            RelationColumn::MaxAppVersion => max_app_version = coerce_int(value.as_deref()),
            RelationColumn::ChangeOwner => change_owner = coerce_int(value.as_deref()),
        }
    }

    Some(ParsedRelation {
        id_view1: id_view1?,
        id_view2: id_view2?,
        relation: relation.filter(|r| !r.is_empty())?,
        relation2,
        edge_weight,
        min_app_version,
        max_app_version,
        change_owner,
    })
}

/// Match the statement header and return (normalized column names, raw values)
fn extract_insert(re: &Regex, sql: &str) -> Option<(Vec<String>, Vec<String>)> {
    let caps = re.captures(sql)?;
    let columns = caps
        .get(1)?
        .as_str()
        .split(',')
        .map(|c| c.chars().filter(|ch| !ch.is_whitespace()).collect::<String>().to_lowercase())
        .collect();
    let rest = &sql[caps.get(0)?.end()..];
    let values = values_list(rest)?;
    Some((columns, split_sql_values(values)))
}

/// Everything up to the unquoted `)` that closes the VALUES list
fn values_list(rest: &str) -> Option<&str> {
    let mut quote: Option<char> = None;
    let mut depth = 0usize;

    for (i, c) in rest.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '\'' | '"' => quote = Some(c),
                '(' => depth += 1,
                ')' if depth == 0 => return Some(&rest[..i]),
                ')' => depth -= 1,
                _ => {}
            },
        }
    }
    None
}

/// Split a VALUES list on commas that sit outside quotes.
///
/// Quoted pieces are returned with their quotes; `''` inside a single-quoted
/// string stays part of that string.
pub fn split_sql_values(values: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut chars = values.chars().peekable();

    while let Some(c) = chars.next() {
        match quote {
            None if c == '\'' || c == '"' => {
                quote = Some(c);
                current.push(c);
            }
            Some(q) if c == q => {
                if q == '\'' && chars.peek() == Some(&'\'') {
                    chars.next();
                    current.push_str("''");
                } else {
                    quote = None;
                    current.push(c);
                }
            }
            None if c == ',' => {
                out.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }

    out.push(current.trim().to_string());
    out
}

/// Unquote one raw value. Bare `NULL` (any case) becomes `None`.
pub fn clean_sql_value(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("NULL") {
        return None;
    }

    let quoted = trimmed.len() >= 2
        && ((trimmed.starts_with('\'') && trimmed.ends_with('\''))
            || (trimmed.starts_with('"') && trimmed.ends_with('"')));

    if quoted {
        Some(trimmed[1..trimmed.len() - 1].replace("''", "'"))
    } else {
        Some(trimmed.to_string())
    }
}

/// Integer coercion: plain integers, or numeric text with no fractional part
pub fn coerce_int(value: Option<&str>) -> Option<i64> {
    let text = value?.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(n) = text.parse::<i64>() {
        return Some(n);
    }
    match text.parse::<f64>() {
        Ok(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Some(f as i64),
        _ => None,
    }
}

/// Split a pasted script into trimmed, non-blank statements
pub fn split_statements(sql: &str) -> Vec<&str> {
    sql.split(';').map(str::trim).filter(|s| !s.is_empty()).collect()
}

/// Decide which insert a statement is meant to be. Mentioning the relation
/// table always wins, since its name contains the view table's name.
pub fn classify_statement(statement: &str) -> Option<EntityKind> {
    let lower = statement.to_lowercase();
    if lower.contains(&RELATION_TABLE.to_lowercase()) {
        Some(EntityKind::Relation)
    } else if lower.contains(&VIEW_TABLE.to_lowercase()) {
        Some(EntityKind::View)
    } else {
        None
    }
}

//! Hierarchical auto-layout
//!
//! Levels come from a breadth-first walk over the undirected graph, seeded
//! with every view that has no incoming relation. Each level becomes a row
//! (`TB`) or a column (`LR`) centred on zero.

use crate::model::{Relation, View};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::fmt;
use std::str::FromStr;

pub const NODE_WIDTH: f64 = 180.0;
pub const NODE_HEIGHT: f64 = 80.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[allow(clippy::upper_case_acronyms)]
pub enum LayoutDirection {
    /// Levels stacked top to bottom
    #[default]
    TB,
    /// Levels left to right
    LR,
}

impl fmt::Display for LayoutDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutDirection::TB => write!(f, "TB"),
            LayoutDirection::LR => write!(f, "LR"),
        }
    }
}

impl FromStr for LayoutDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "TB" => Ok(LayoutDirection::TB),
            "LR" => Ok(LayoutDirection::LR),
            other => Err(format!("Unknown layout direction '{}' (expected TB or LR)", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutConfig {
    pub direction: LayoutDirection,
    pub node_spacing: f64,
    pub level_spacing: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            direction: LayoutDirection::TB,
            node_spacing: 80.0,
            level_spacing: 120.0,
        }
    }
}

impl From<&crate::config::Settings> for LayoutConfig {
    fn from(settings: &crate::config::Settings) -> Self {
        Self {
            direction: settings.layout_direction,
            node_spacing: settings.node_spacing,
            level_spacing: settings.level_spacing,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionedNode {
    pub id: String,
    pub level: usize,
    pub x: f64,
    pub y: f64,
}

/// BFS level of every node, keyed by node id
fn assign_levels(nodes: &[View], edges: &[Relation]) -> HashMap<String, usize> {
    let ids: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();

    // Outgoing first, then incoming, each in edge order
    let mut outgoing: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut incoming: HashMap<&str, Vec<&str>> = HashMap::new();
    for edge in edges {
        outgoing.entry(edge.source.as_str()).or_default().push(edge.target.as_str());
        incoming.entry(edge.target.as_str()).or_default().push(edge.source.as_str());
    }

    let has_parent: HashSet<&str> = edges
        .iter()
        .filter(|e| ids.contains(e.target.as_str()))
        .map(|e| e.target.as_str())
        .collect();

    let mut roots: Vec<&str> = nodes
        .iter()
        .map(|n| n.id.as_str())
        .filter(|id| !has_parent.contains(id))
        .collect();
    if roots.is_empty() {
        roots.push(nodes[0].id.as_str());
    }

    let mut levels: HashMap<String, usize> = HashMap::new();
    let mut queue: VecDeque<(&str, usize)> = VecDeque::new();
    for root in roots {
        if !levels.contains_key(root) {
            levels.insert(root.to_string(), 0);
            queue.push_back((root, 0));
        }
    }

    while let Some((node_id, level)) = queue.pop_front() {
        let neighbours = outgoing
            .get(node_id)
            .into_iter()
            .chain(incoming.get(node_id))
            .flatten();
        for &next in neighbours {
            if ids.contains(next) && !levels.contains_key(next) {
                levels.insert(next.to_string(), level + 1);
                queue.push_back((next, level + 1));
            }
        }
    }

    // Unreached nodes sit on the first level
    for node in nodes {
        levels.entry(node.id.clone()).or_insert(0);
    }
    levels
}

/// Position every node. Output follows input order and is fully
/// determined by the inputs.
pub fn layout(nodes: &[View], edges: &[Relation], config: &LayoutConfig) -> Vec<PositionedNode> {
    if nodes.is_empty() {
        return vec![];
    }

    let levels = assign_levels(nodes, edges);

    let mut by_level: BTreeMap<usize, Vec<&str>> = BTreeMap::new();
    for node in nodes {
        let level = levels.get(&node.id).copied().unwrap_or(0);
        by_level.entry(level).or_default().push(node.id.as_str());
    }

    let mut placed: HashMap<&str, (usize, f64, f64)> = HashMap::new();
    for (&level, ids) in &by_level {
        let count = ids.len() as f64;
        let level_offset = level as f64;
        match config.direction {
            LayoutDirection::TB => {
                let step = NODE_WIDTH + config.node_spacing;
                let start = -(count * step) / 2.0;
                let y = level_offset * (NODE_HEIGHT + config.level_spacing);
                for (idx, id) in ids.iter().enumerate() {
                    placed.insert(id, (level, start + idx as f64 * step, y));
                }
            }
            LayoutDirection::LR => {
                let step = NODE_HEIGHT + config.node_spacing;
                let start = -(count * step) / 2.0;
                let x = level_offset * (NODE_WIDTH + config.level_spacing);
                for (idx, id) in ids.iter().enumerate() {
                    placed.insert(id, (level, x, start + idx as f64 * step));
                }
            }
        }
    }

    nodes
        .iter()
        .filter_map(|node| {
            placed.get(node.id.as_str()).map(|&(level, x, y)| PositionedNode {
                id: node.id.clone(),
                level,
                x,
                y,
            })
        })
        .collect()
}

//! Shortest path between two views
//!
//! Unweighted breadth-first search over the undirected relation graph.
//! Ties between equally short paths go to the relation that appears first.

use crate::model::{Relation, View};
use std::collections::{HashMap, VecDeque};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathResult {
    /// View ids from start to end, and the relation ids walked between them
    Found { nodes: Vec<String>, edges: Vec<String> },
    NotFound,
}

impl PathResult {
    pub fn is_found(&self) -> bool {
        matches!(self, PathResult::Found { .. })
    }
}

/// Returns `None` when either id is empty or both are the same view
pub fn find_path(start: &str, end: &str, views: &[View], relations: &[Relation]) -> Option<PathResult> {
    if start.is_empty() || end.is_empty() || start == end {
        return None;
    }

    let mut adjacency: HashMap<&str, Vec<(&str, &str)>> =
        views.iter().map(|v| (v.id.as_str(), Vec::new())).collect();
    for rel in relations {
        if let Some(next) = adjacency.get_mut(rel.source.as_str()) {
            next.push((rel.target.as_str(), rel.id.as_str()));
        }
        if let Some(next) = adjacency.get_mut(rel.target.as_str()) {
            next.push((rel.source.as_str(), rel.id.as_str()));
        }
    }

    // node -> (previous node, relation used to get here)
    let mut came_from: HashMap<&str, Option<(&str, &str)>> = HashMap::new();
    came_from.insert(start, None);
    let mut queue: VecDeque<&str> = VecDeque::from([start]);

    while let Some(node) = queue.pop_front() {
        if node == end {
            return Some(rebuild(&came_from, end));
        }
        for &(next, via) in adjacency.get(node).into_iter().flatten() {
            if !came_from.contains_key(next) {
                came_from.insert(next, Some((node, via)));
                queue.push_back(next);
            }
        }
    }

    Some(PathResult::NotFound)
}

fn rebuild(came_from: &HashMap<&str, Option<(&str, &str)>>, end: &str) -> PathResult {
    let mut nodes = vec![end.to_string()];
    let mut edges = Vec::new();
    let mut current = end;
    while let Some(Some((prev, via))) = came_from.get(current) {
        nodes.push(prev.to_string());
        edges.push(via.to_string());
        current = prev;
    }
    nodes.reverse();
    edges.reverse();
    PathResult::Found { nodes, edges }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::JoinType;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn view(id: &str) -> View {
        View {
            id: id.to_string(),
            view_id: id.parse().unwrap_or(0),
            name: id.to_string(),
            name2: None,
            alias: None,
            min_app_version: 0,
            max_app_version: 999999,
            display_name: id.to_string(),
        }
    }

    fn rel(id: &str, source: &str, target: &str) -> Relation {
        Relation {
            id: id.to_string(),
            source: source.to_string(),
            target: target.to_string(),
            relation: "JOIN".to_string(),
            relation2: None,
            edge_weight: 10,
            join_type: JoinType::Plain,
        }
    }

    fn found(nodes: &[&str], edges: &[&str]) -> PathResult {
        PathResult::Found {
            nodes: nodes.iter().map(|s| s.to_string()).collect(),
            edges: edges.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_missing_or_equal_endpoints() {
        let views = vec![view("1")];
        assert_eq!(find_path("", "1", &views, &[]), None);
        assert_eq!(find_path("1", "", &views, &[]), None);
        assert_eq!(find_path("1", "1", &views, &[]), None);
    }

    #[test]
    fn test_direct_edge() {
        let views = vec![view("1"), view("2")];
        let rels = vec![rel("r", "1", "2")];
        assert_eq!(find_path("1", "2", &views, &rels), Some(found(&["1", "2"], &["r"])));
    }

    #[test]
    fn test_walks_edges_backwards() {
        let views = vec![view("1"), view("2"), view("3")];
        let rels = vec![rel("a", "2", "1"), rel("b", "3", "2")];
        assert_eq!(
            find_path("1", "3", &views, &rels),
            Some(found(&["1", "2", "3"], &["a", "b"]))
        );
    }

    #[test]
    fn test_prefers_shorter_route() {
        let views = vec![view("1"), view("2"), view("3"), view("4")];
        let rels = vec![rel("a", "1", "2"), rel("b", "2", "3"), rel("c", "3", "4"), rel("d", "1", "4")];
        assert_eq!(find_path("1", "4", &views, &rels), Some(found(&["1", "4"], &["d"])));
    }

    #[test]
    fn test_tie_goes_to_first_relation() {
        let views = vec![view("1"), view("2"), view("3"), view("4")];
        let rels = vec![rel("a", "1", "3"), rel("b", "1", "2"), rel("c", "2", "4"), rel("d", "3", "4")];
        assert_eq!(
            find_path("1", "4", &views, &rels),
            Some(found(&["1", "3", "4"], &["a", "d"]))
        );
    }

    #[test]
    fn test_disconnected_is_not_found() {
        let views = vec![view("1"), view("2"), view("3")];
        let rels = vec![rel("a", "1", "2")];
        assert_eq!(find_path("1", "3", &views, &rels), Some(PathResult::NotFound));
    }

    #[test]
    fn test_unknown_start_is_not_found() {
        let views = vec![view("1")];
        assert_eq!(find_path("9", "1", &views, &[]), Some(PathResult::NotFound));
    }

    /// Length of the shortest simple path by exhaustive search
    fn brute_force(start: &str, end: &str, rels: &[Relation]) -> Option<usize> {
        fn walk(node: &str, end: &str, rels: &[Relation], seen: &mut HashSet<String>, depth: usize, best: &mut Option<usize>) {
            if node == end {
                *best = Some(best.map_or(depth, |b| b.min(depth)));
                return;
            }
            for r in rels {
                let next = if r.source == node {
                    &r.target
                } else if r.target == node {
                    &r.source
                } else {
                    continue;
                };
                if seen.insert(next.clone()) {
                    walk(next, end, rels, seen, depth + 1, best);
                    seen.remove(next);
                }
            }
        }
        let mut best = None;
        let mut seen = HashSet::from([start.to_string()]);
        walk(start, end, rels, &mut seen, 0, &mut best);
        best
    }

    proptest! {
        #[test]
        fn prop_bfs_matches_brute_force(
            pairs in proptest::collection::vec((1u8..7, 1u8..7), 0..10),
            start in 1u8..7,
            end in 1u8..7,
        ) {
            prop_assume!(start != end);
            let views: Vec<View> = (1..7).map(|i| view(&i.to_string())).collect();
            let rels: Vec<Relation> = pairs
                .iter()
                .enumerate()
                .map(|(i, (a, b))| rel(&format!("r{}", i), &a.to_string(), &b.to_string()))
                .collect();
            let (s, e) = (start.to_string(), end.to_string());

            match (find_path(&s, &e, &views, &rels), brute_force(&s, &e, &rels)) {
                (Some(PathResult::Found { nodes, edges }), Some(best)) => {
                    prop_assert_eq!(edges.len(), best);
                    prop_assert_eq!(nodes.len(), edges.len() + 1);
                    prop_assert_eq!(nodes.first(), Some(&s));
                    prop_assert_eq!(nodes.last(), Some(&e));
                    for (i, edge_id) in edges.iter().enumerate() {
                        let r = rels.iter().find(|r| &r.id == edge_id).unwrap();
                        let (a, b) = (&nodes[i], &nodes[i + 1]);
                        prop_assert!((&r.source == a && &r.target == b) || (&r.source == b && &r.target == a));
                    }
                }
                (Some(PathResult::NotFound), None) => {}
                (got, expected) => prop_assert!(false, "bfs {:?} vs brute force {:?}", got, expected),
            }
        }
    }
}

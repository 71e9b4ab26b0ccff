use std::collections::{BTreeSet, HashSet};

use crate::model::{Diagram, Edge, EdgeKey};
use crate::scene::Owner;

/// Nodes and edges drawn with the highlight treatment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HighlightSet {
    pub nodes: BTreeSet<String>,
    pub edges: BTreeSet<EdgeKey>,
}

impl HighlightSet {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.nodes.contains(id)
    }

    pub fn contains_edge(&self, key: &EdgeKey) -> bool {
        self.edges.contains(key)
    }

    pub fn contains_owner(&self, owner: &Owner) -> bool {
        match owner {
            Owner::Node(id) => self.contains_node(id),
            Owner::Edge(key) => self.contains_edge(key),
        }
    }

    pub fn insert_node(&mut self, id: &str) {
        self.nodes.insert(id.to_string());
    }

    pub fn insert_edge(&mut self, key: EdgeKey) {
        self.edges.insert(key);
    }

    fn insert_hop(&mut self, edge: &Edge, node: &str) {
        self.insert_edge(edge.key());
        self.insert_node(node);
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.edges.clear();
    }
}

/// Highlight for a hovered edge: the edge and its two endpoints.
pub fn edge_highlight(key: &EdgeKey) -> HighlightSet {
    let mut set = HighlightSet::default();
    set.insert_node(&key.0);
    set.insert_node(&key.1);
    set.insert_edge(key.clone());
    set
}

/// Flow trace around a hovered node.
///
/// Upstream follows the first incoming edge (model order) until there is
/// none or a node repeats. Downstream follows a lone outgoing edge; at a
/// branch every outgoing edge and target is added and the walk stops.
/// `max_hops` bounds each direction independently.
pub fn trace_flow(diagram: &Diagram, start: &str, max_hops: Option<usize>) -> HighlightSet {
    let mut set = HighlightSet::default();
    if diagram.node(start).is_none() {
        return set;
    }
    set.insert_node(start);
    let limit = max_hops.unwrap_or(usize::MAX);

    let mut visited: HashSet<&str> = HashSet::from([start]);
    let mut current = start;
    for _ in 0..limit {
        let Some(edge) = diagram.incoming(current).next() else {
            break;
        };
        set.insert_hop(edge, &edge.from);
        if !visited.insert(edge.from.as_str()) {
            break;
        }
        current = edge.from.as_str();
    }

    let mut visited: HashSet<&str> = HashSet::from([start]);
    let mut current = start;
    for _ in 0..limit {
        let outgoing: Vec<&Edge> = diagram.outgoing(current).collect();
        match outgoing.as_slice() {
            [] => break,
            [edge] => {
                set.insert_hop(edge, &edge.to);
                if !visited.insert(edge.to.as_str()) {
                    break;
                }
                current = edge.to.as_str();
            }
            branch => {
                for edge in branch {
                    set.insert_hop(edge, &edge.to);
                }
                break;
            }
        }
    }
    set
}

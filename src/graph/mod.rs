//! Graph Build & Query Engine (C3/C4/C5): node/edge/graph types and the
//! frozen, read-only graph produced by [`builder::GraphBuilder`].

pub mod analytics;
pub mod builder;
pub mod cache_adapter;
pub mod queries;

use crate::symbol::Symbol;
use crate::types::{EdgeKind, Location};
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

/// A symbol placed in the graph, with degree counts maintained incrementally
/// during build.
#[derive(Debug, Clone)]
pub struct Node {
    pub symbol: Symbol,
    pub in_degree: u32,
    pub out_degree: u32,
}

impl Node {
    fn new(symbol: Symbol) -> Self {
        Self {
            symbol,
            in_degree: 0,
            out_degree: 0,
        }
    }
}

/// A directed, typed edge. Unique per `(from_id, to_id, kind)`.
#[derive(Debug, Clone)]
pub struct Edge {
    pub from_id: String,
    pub to_id: String,
    pub kind: EdgeKind,
    pub site_line: Option<u32>,
    pub site_col: Option<u32>,
}

/// Query result: a ranked or unordered set of symbols, possibly truncated by
/// a node budget or depth cap.
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    pub symbols: Vec<Symbol>,
    pub truncated: bool,
}

/// Result of a bounded BFS traversal.
#[derive(Debug, Clone, Default)]
pub struct TraversalResult {
    pub visited: Vec<String>,
    pub edges: Vec<Edge>,
    pub depth: usize,
    pub truncated: bool,
}

/// Result of a shortest-path query. `length == -1` means no path exists.
#[derive(Debug, Clone)]
pub struct PathResult {
    pub path: Vec<String>,
    pub length: i64,
}

/// A single reference site: the referencing symbol plus where, in its own
/// source, the reference occurs (spec.md §4.3 — references are reported as
/// locations, not bare symbols).
#[derive(Debug, Clone)]
pub struct ReferenceHit {
    pub symbol: Symbol,
    pub location: Location,
}

/// Result of a `FindReferences` query.
#[derive(Debug, Clone, Default)]
pub struct ReferenceResult {
    pub references: Vec<ReferenceHit>,
    pub truncated: bool,
}

/// The built, frozen symbol graph (§3). After [`builder::GraphBuilder::build`]
/// returns, a `Graph` accepts only read locks — no further mutation occurs.
#[derive(Debug)]
pub struct Graph {
    inner: DiGraph<Node, Edge>,
    node_index: HashMap<String, NodeIndex>,
    by_name: HashMap<String, Vec<String>>,
    by_file: HashMap<String, Vec<String>>,
    by_kind: HashMap<crate::types::SymbolKind, Vec<String>>,
}

impl Graph {
    pub(crate) fn empty() -> Self {
        Self {
            inner: DiGraph::new(),
            node_index: HashMap::new(),
            by_name: HashMap::new(),
            by_file: HashMap::new(),
            by_kind: HashMap::new(),
        }
    }

    pub fn node_count(&self) -> usize {
        self.inner.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    pub fn get_node(&self, id: &str) -> Option<&Node> {
        self.node_index.get(id).and_then(|&idx| self.inner.node_weight(idx))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.node_index.contains_key(id)
    }

    pub fn ids_by_name(&self, name: &str) -> &[String] {
        self.by_name.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn ids_by_file(&self, path: &str) -> &[String] {
        self.by_file.get(path).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn ids_by_kind(&self, kind: crate::types::SymbolKind) -> &[String] {
        self.by_kind.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn all_node_ids(&self) -> impl Iterator<Item = &String> {
        self.node_index.keys()
    }
}

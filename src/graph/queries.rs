//! Graph Queries (C4): structural queries over a frozen [`Graph`]
//! (spec.md §4.3).

use super::{Graph, PathResult, QueryResult, ReferenceHit, ReferenceResult, TraversalResult};
use crate::error::GraphError;
use crate::types::{EdgeKind, Location};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::{HashMap, HashSet, VecDeque};
use tokio_util::sync::CancellationToken;

pub const MAX_DEPTH_CAP: usize = 10;
pub const DEFAULT_NODE_BUDGET: usize = 1000;

pub struct GraphQueries<'g> {
    graph: &'g Graph,
}

impl<'g> GraphQueries<'g> {
    pub fn new(graph: &'g Graph) -> Self {
        Self { graph }
    }

    fn edges_of_kind(&self, id: &str, kind: EdgeKind, direction: Direction) -> Vec<String> {
        let Some(&idx) = self.graph.node_index.get(id) else {
            return Vec::new();
        };
        let mut out: Vec<String> = self
            .graph
            .inner
            .edges_directed(idx, direction)
            .filter(|e| e.weight().kind == kind)
            .map(|e| match direction {
                Direction::Outgoing => e.weight().to_id.clone(),
                Direction::Incoming => e.weight().from_id.clone(),
            })
            .collect();
        out.sort();
        out.dedup();
        out
    }

    fn to_result(&self, mut ids: Vec<String>, limit: Option<usize>) -> QueryResult {
        ids.sort();
        let truncated = limit.map(|l| ids.len() > l).unwrap_or(false);
        if let Some(limit) = limit {
            ids.truncate(limit);
        }
        QueryResult {
            symbols: ids.into_iter().filter_map(|id| self.graph.get_node(&id)).map(|n| n.symbol.clone()).collect(),
            truncated,
        }
    }

    /// Predecessors across `calls` edges.
    #[tracing::instrument(skip(self))]
    pub fn find_callers_by_id(&self, id: &str, limit: Option<usize>) -> QueryResult {
        let ids = self.edges_of_kind(id, EdgeKind::Calls, Direction::Incoming);
        self.to_result(ids, limit)
    }

    /// Successors across `calls` edges.
    #[tracing::instrument(skip(self))]
    pub fn find_callees_by_id(&self, id: &str, limit: Option<usize>) -> QueryResult {
        let ids = self.edges_of_kind(id, EdgeKind::Calls, Direction::Outgoing);
        self.to_result(ids, limit)
    }

    /// Successors across `implements` edges, in reverse (the types implementing `interface_id`).
    #[tracing::instrument(skip(self))]
    pub fn find_implementations_by_id(&self, interface_id: &str, limit: Option<usize>) -> QueryResult {
        let ids = self.edges_of_kind(interface_id, EdgeKind::Implements, Direction::Incoming);
        self.to_result(ids, limit)
    }

    /// Predecessors across `references` edges, with the call-site location
    /// of each reference (spec.md §4.3: referencing locations, not just
    /// symbols).
    #[tracing::instrument(skip(self))]
    pub fn find_references_by_id(&self, id: &str, limit: Option<usize>) -> ReferenceResult {
        let Some(&idx) = self.graph.node_index.get(id) else {
            return ReferenceResult::default();
        };

        let mut hits: Vec<(String, Option<u32>, Option<u32>)> = self
            .graph
            .inner
            .edges_directed(idx, Direction::Incoming)
            .filter(|e| e.weight().kind == EdgeKind::References)
            .map(|e| (e.weight().from_id.clone(), e.weight().site_line, e.weight().site_col))
            .collect();
        hits.sort();
        hits.dedup();

        let truncated = limit.map(|l| hits.len() > l).unwrap_or(false);
        if let Some(limit) = limit {
            hits.truncate(limit);
        }

        let references = hits
            .into_iter()
            .filter_map(|(from_id, site_line, site_col)| {
                let symbol = self.graph.get_node(&from_id)?.symbol.clone();
                let location = Location {
                    file_path: symbol.file_path.clone(),
                    line: site_line.unwrap_or(symbol.start_line),
                    col: site_col.unwrap_or(symbol.start_col),
                };
                Some(ReferenceHit { symbol, location })
            })
            .collect();

        ReferenceResult { references, truncated }
    }

    /// By-name variant: resolves through the name index; `limit` applies
    /// per match (spec.md §4.3).
    #[tracing::instrument(skip(self))]
    pub fn find_callers_by_name(&self, name: &str, limit: Option<usize>) -> HashMap<String, QueryResult> {
        self.graph
            .ids_by_name(name)
            .iter()
            .map(|id| (id.clone(), self.find_callers_by_id(id, limit)))
            .collect()
    }

    #[tracing::instrument(skip(self))]
    pub fn find_callees_by_name(&self, name: &str, limit: Option<usize>) -> QueryResult {
        // Deduplicated across all `from` symbols sharing this name, so two
        // overloads calling the same callee report it once.
        let mut ids = Vec::new();
        for from_id in self.graph.ids_by_name(name) {
            ids.extend(self.edges_of_kind(from_id, EdgeKind::Calls, Direction::Outgoing));
        }
        ids.sort();
        ids.dedup();
        self.to_result(ids, limit)
    }

    /// Bounded BFS over `calls` edges, forward.
    #[tracing::instrument(skip(self, cancel))]
    pub fn get_call_graph(
        &self,
        id: &str,
        max_depth: usize,
        node_budget: usize,
        cancel: &CancellationToken,
    ) -> Result<TraversalResult, GraphError> {
        self.bfs(id, max_depth, node_budget, Direction::Outgoing, cancel)
    }

    /// Bounded BFS over `calls` edges, reverse.
    #[tracing::instrument(skip(self, cancel))]
    pub fn get_reverse_call_graph(
        &self,
        id: &str,
        max_depth: usize,
        node_budget: usize,
        cancel: &CancellationToken,
    ) -> Result<TraversalResult, GraphError> {
        self.bfs(id, max_depth, node_budget, Direction::Incoming, cancel)
    }

    fn bfs(
        &self,
        id: &str,
        max_depth: usize,
        node_budget: usize,
        direction: Direction,
        cancel: &CancellationToken,
    ) -> Result<TraversalResult, GraphError> {
        if max_depth > MAX_DEPTH_CAP {
            return Err(GraphError::InvalidDepth {
                requested: max_depth,
                cap: MAX_DEPTH_CAP,
            });
        }
        let Some(&start_idx) = self.graph.node_index.get(id) else {
            return Ok(TraversalResult::default());
        };

        let mut visited = HashSet::new();
        let mut result_ids = Vec::new();
        let mut result_edges = Vec::new();
        let mut queue = VecDeque::new();
        let mut truncated = false;
        let mut reached_depth = 0usize;

        visited.insert(id.to_string());
        result_ids.push(id.to_string());
        queue.push_back((start_idx, id.to_string(), 0usize));

        while let Some((idx, _current_id, depth)) = queue.pop_front() {
            if cancel.is_cancelled() {
                truncated = true;
                break;
            }
            if depth >= max_depth {
                continue;
            }
            for edge in self.graph.inner.edges_directed(idx, direction) {
                if edge.weight().kind != EdgeKind::Calls {
                    continue;
                }
                let (next_id, next_idx) = match direction {
                    Direction::Outgoing => (edge.weight().to_id.clone(), edge.target()),
                    Direction::Incoming => (edge.weight().from_id.clone(), edge.source()),
                };
                result_edges.push(edge.weight().clone());
                if visited.contains(&next_id) {
                    continue;
                }
                if result_ids.len() >= node_budget {
                    truncated = true;
                    continue;
                }
                visited.insert(next_id.clone());
                result_ids.push(next_id.clone());
                reached_depth = reached_depth.max(depth + 1);
                queue.push_back((next_idx, next_id, depth + 1));
            }
        }

        Ok(TraversalResult {
            visited: result_ids,
            edges: result_edges,
            depth: reached_depth,
            truncated,
        })
    }

    /// BFS across any edge type; one shortest path, tie-broken by
    /// predecessor-insertion order.
    #[tracing::instrument(skip(self))]
    pub fn shortest_path(&self, from_id: &str, to_id: &str) -> PathResult {
        let (Some(&from_idx), Some(&to_idx)) =
            (self.graph.node_index.get(from_id), self.graph.node_index.get(to_id))
        else {
            return PathResult { path: Vec::new(), length: -1 };
        };

        if from_idx == to_idx {
            return PathResult {
                path: vec![from_id.to_string()],
                length: 0,
            };
        }

        let mut predecessor: HashMap<petgraph::graph::NodeIndex, petgraph::graph::NodeIndex> = HashMap::new();
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        visited.insert(from_idx);
        queue.push_back(from_idx);

        let mut found = false;
        'bfs: while let Some(idx) = queue.pop_front() {
            for edge in self.graph.inner.edges_directed(idx, Direction::Outgoing) {
                let next = edge.target();
                if visited.contains(&next) {
                    continue;
                }
                visited.insert(next);
                predecessor.insert(next, idx);
                if next == to_idx {
                    found = true;
                    break 'bfs;
                }
                queue.push_back(next);
            }
        }

        if !found {
            return PathResult { path: Vec::new(), length: -1 };
        }

        let mut path_idx = vec![to_idx];
        let mut current = to_idx;
        while let Some(&pred) = predecessor.get(&current) {
            path_idx.push(pred);
            current = pred;
        }
        path_idx.reverse();

        let path: Vec<String> = path_idx
            .into_iter()
            .map(|idx| self.graph.inner[idx].symbol.id.clone())
            .collect();
        let length = (path.len() - 1) as i64;
        PathResult { path, length }
    }
}

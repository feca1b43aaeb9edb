//! Graph Analytics (C5): hotspot ranking, dead-code detection, cyclic
//! dependency detection, and PageRank (spec.md §4.4). Each analytic emits a
//! [`TraceStep`] through the caller-supplied [`SharedMetricsSink`].

use super::Graph;
use crate::instrumentation::{SharedMetricsSink, TraceStep};
use crate::symbol::Symbol;
use crate::types::SymbolKind;
use petgraph::algo::tarjan_scc;
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::BinaryHeap;
use std::time::Instant;

/// Entry-point names excluded from dead-code reporting regardless of
/// in-degree (spec.md §4.4).
const ENTRY_POINT_NAMES: &[&str] = &["main", "init"];

#[derive(Debug, Clone)]
pub struct Hotspot {
    pub symbol: Symbol,
    pub score: u64,
}

#[derive(Debug, Clone)]
pub struct Scc {
    pub node_ids: Vec<String>,
    pub packages: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct PageRankEntry {
    pub symbol: Symbol,
    pub page_rank: f64,
    pub degree_score: u64,
}

pub struct GraphAnalytics<'g> {
    graph: &'g Graph,
    sink: SharedMetricsSink,
}

impl<'g> GraphAnalytics<'g> {
    pub fn new(graph: &'g Graph, sink: SharedMetricsSink) -> Self {
        Self { graph, sink }
    }

    /// Score = 2*in_degree + out_degree, top-`k` via a bounded min-heap.
    #[tracing::instrument(skip(self))]
    pub fn hotspots(&self, k: usize) -> Vec<Hotspot> {
        let start = Instant::now();

        #[derive(PartialEq, Eq)]
        struct Entry(u64, String);
        impl Ord for Entry {
            fn cmp(&self, other: &Self) -> std::cmp::Ordering {
                // Reverse on score so `BinaryHeap` (a max-heap) behaves as a
                // min-heap; ties broken by id so eviction order is stable.
                other.0.cmp(&self.0).then(other.1.cmp(&self.1))
            }
        }
        impl PartialOrd for Entry {
            fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
                Some(self.cmp(other))
            }
        }

        let mut heap: BinaryHeap<Entry> = BinaryHeap::new();
        for id in self.graph.all_node_ids() {
            let node = self.graph.get_node(id).expect("id came from all_node_ids");
            let score = 2 * node.in_degree as u64 + node.out_degree as u64;
            if heap.len() < k {
                heap.push(Entry(score, id.clone()));
            } else if let Some(min) = heap.peek() {
                if score > min.0 || (score == min.0 && id.as_str() < min.1.as_str()) {
                    heap.pop();
                    heap.push(Entry(score, id.clone()));
                }
            }
        }

        let mut out: Vec<Hotspot> = heap
            .into_iter()
            .map(|Entry(score, id)| Hotspot {
                symbol: self.graph.get_node(&id).unwrap().symbol.clone(),
                score,
            })
            .collect();
        out.sort_by(|a, b| b.score.cmp(&a.score).then(a.symbol.id.cmp(&b.symbol.id)));

        TraceStep {
            action: "hotspots",
            duration_millis: start.elapsed().as_millis() as u64,
            produced: out.len(),
        }
        .emit(&self.sink);
        out
    }

    /// Symbols with zero `calls`/`references` predecessors, excluding entry
    /// points, polymorphic interface-method targets, and (by default)
    /// exported symbols.
    #[tracing::instrument(skip(self))]
    pub fn dead_code(&self, include_exported: bool) -> Vec<Symbol> {
        let start = Instant::now();
        let interface_targets = self.interface_method_targets();

        let mut out = Vec::new();
        for id in self.graph.all_node_ids() {
            let node = self.graph.get_node(id).unwrap();
            let symbol = &node.symbol;
            if symbol.is_placeholder() {
                continue;
            }
            if !matches!(symbol.kind, SymbolKind::Function | SymbolKind::Method) {
                continue;
            }
            if ENTRY_POINT_NAMES.contains(&symbol.name.as_str())
                || symbol.name.starts_with("Test")
            {
                continue;
            }
            if interface_targets.contains(id.as_str()) {
                continue;
            }
            if symbol.exported && !include_exported {
                continue;
            }
            if node.in_degree == 0 {
                out.push(symbol.clone());
            }
        }
        out.sort_by(|a, b| a.id.cmp(&b.id));

        TraceStep {
            action: "dead_code",
            duration_millis: start.elapsed().as_millis() as u64,
            produced: out.len(),
        }
        .emit(&self.sink);
        out
    }

    /// Methods that belong to a type implementing some interface: callers
    /// may only ever reach them through the interface, so a zero in-degree
    /// doesn't mean dead code.
    fn interface_method_targets(&self) -> std::collections::HashSet<String> {
        let mut implementing_types = std::collections::HashSet::new();
        for id in self.graph.all_node_ids() {
            let idx = self.graph.node_index[id];
            if self
                .graph
                .inner
                .edges_directed(idx, Direction::Outgoing)
                .any(|e| e.weight().kind == crate::types::EdgeKind::Implements)
            {
                implementing_types.insert(idx);
            }
        }

        let mut targets = std::collections::HashSet::new();
        for type_idx in implementing_types {
            for edge in self.graph.inner.edges_directed(type_idx, Direction::Outgoing) {
                if edge.weight().kind == crate::types::EdgeKind::Contains {
                    targets.insert(edge.weight().to_id.clone());
                }
            }
        }
        targets
    }

    /// Strongly connected components of size >= `min_size`, reported with
    /// the distinct packages each spans (Tarjan SCC via petgraph).
    #[tracing::instrument(skip(self))]
    pub fn cyclic_dependencies(&self, min_size: usize) -> Vec<Scc> {
        let start = Instant::now();
        let components = tarjan_scc(&self.graph.inner);
        let mut out = Vec::new();
        for component in components {
            if component.len() < min_size.max(2) {
                continue;
            }
            let mut node_ids: Vec<String> = component
                .iter()
                .map(|&idx| self.graph.inner[idx].symbol.id.clone())
                .collect();
            node_ids.sort();
            let mut packages: Vec<String> = component
                .iter()
                .map(|&idx| self.graph.inner[idx].symbol.package.clone())
                .collect();
            packages.sort();
            packages.dedup();
            out.push(Scc { node_ids, packages });
        }
        out.sort_by(|a, b| a.node_ids.cmp(&b.node_ids));

        TraceStep {
            action: "cyclic_dependencies",
            duration_millis: start.elapsed().as_millis() as u64,
            produced: out.len(),
        }
        .emit(&self.sink);
        out
    }

    /// Power-iteration PageRank (damping 0.85) over `calls` edges, sink mass
    /// redistributed uniformly each iteration, stopping at L1 delta < 1e-6
    /// or 50 iterations.
    #[tracing::instrument(skip(self))]
    pub fn page_rank_top(&self, k: usize) -> Vec<PageRankEntry> {
        const DAMPING: f64 = 0.85;
        const MAX_ITERS: usize = 50;
        const EPSILON: f64 = 1e-6;

        let start = Instant::now();
        let ids: Vec<String> = self.graph.all_node_ids().cloned().collect();
        let n = ids.len();
        if n == 0 {
            TraceStep {
                action: "page_rank",
                duration_millis: start.elapsed().as_millis() as u64,
                produced: 0,
            }
            .emit(&self.sink);
            return Vec::new();
        }

        let index_of: std::collections::HashMap<&str, usize> =
            ids.iter().map(|id| id.as_str()).enumerate().map(|(i, id)| (id, i)).collect();

        let out_degree: Vec<usize> = ids
            .iter()
            .map(|id| {
                let idx = self.graph.node_index[id];
                self.graph
                    .inner
                    .edges_directed(idx, Direction::Outgoing)
                    .filter(|e| e.weight().kind == crate::types::EdgeKind::Calls)
                    .count()
            })
            .collect();

        let mut rank = vec![1.0 / n as f64; n];
        for _ in 0..MAX_ITERS {
            let sink_mass: f64 = (0..n).filter(|&i| out_degree[i] == 0).map(|i| rank[i]).sum();
            let mut next = vec![(1.0 - DAMPING) / n as f64 + DAMPING * sink_mass / n as f64; n];

            for (i, id) in ids.iter().enumerate() {
                if out_degree[i] == 0 {
                    continue;
                }
                let idx = self.graph.node_index[id];
                let share = rank[i] / out_degree[i] as f64;
                for edge in self.graph.inner.edges_directed(idx, Direction::Outgoing) {
                    if edge.weight().kind != crate::types::EdgeKind::Calls {
                        continue;
                    }
                    if let Some(&j) = index_of.get(edge.weight().to_id.as_str()) {
                        next[j] += DAMPING * share;
                    }
                }
            }

            let delta: f64 = rank.iter().zip(next.iter()).map(|(a, b)| (a - b).abs()).sum();
            rank = next;
            if delta < EPSILON {
                break;
            }
        }

        let mut entries: Vec<PageRankEntry> = ids
            .iter()
            .enumerate()
            .map(|(i, id)| {
                let node = self.graph.get_node(id).unwrap();
                PageRankEntry {
                    symbol: node.symbol.clone(),
                    page_rank: rank[i],
                    degree_score: 2 * node.in_degree as u64 + node.out_degree as u64,
                }
            })
            .collect();
        entries.sort_by(|a, b| {
            b.page_rank
                .partial_cmp(&a.page_rank)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.symbol.id.cmp(&b.symbol.id))
        });
        entries.truncate(k);

        TraceStep {
            action: "page_rank",
            duration_millis: start.elapsed().as_millis() as u64,
            produced: entries.len(),
        }
        .emit(&self.sink);
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::builder::GraphBuilder;
    use crate::instrumentation::noop_sink;
    use crate::symbol::{CallSite, ParseResult, Symbol};
    use tokio_util::sync::CancellationToken;

    fn func(id: &str, name: &str, exported: bool) -> Symbol {
        Symbol {
            id: id.to_string(),
            name: name.to_string(),
            kind: SymbolKind::Function,
            file_path: "a.go".to_string(),
            start_line: 1,
            end_line: 1,
            start_col: 0,
            end_col: 0,
            package: "main".to_string(),
            signature: String::new(),
            exported,
            language: "go".to_string(),
            parsed_at: 0,
            children: Vec::new(),
        }
    }

    #[test]
    fn cyclic_dependencies_detects_three_node_cycle() {
        // A -> B -> C -> A, spanning packages a/b/c
        let mut a = func("A", "A", true);
        a.package = "pkg_a".to_string();
        let mut b = func("B", "B", true);
        b.package = "pkg_b".to_string();
        let mut c = func("C", "C", true);
        c.package = "pkg_c".to_string();

        let result = ParseResult {
            file_path: "cycle.go".to_string(),
            language: "go".to_string(),
            symbols: vec![a, b, c],
            call_sites: vec![
                CallSite { from_id: "A".to_string(), callee_name: "B".to_string(), callee_package: None, line: 1, col: 0 },
                CallSite { from_id: "B".to_string(), callee_name: "C".to_string(), callee_package: None, line: 1, col: 0 },
                CallSite { from_id: "C".to_string(), callee_name: "A".to_string(), callee_package: None, line: 1, col: 0 },
            ],
            ..Default::default()
        };

        let output = GraphBuilder::new(0).build(&[result], &CancellationToken::new());
        let analytics = GraphAnalytics::new(&output.graph, noop_sink());
        let sccs = analytics.cyclic_dependencies(2);
        assert_eq!(sccs.len(), 1);
        assert_eq!(sccs[0].node_ids, vec!["A", "B", "C"]);
        assert_eq!(sccs[0].packages, vec!["pkg_a", "pkg_b", "pkg_c"]);
    }

    #[test]
    fn dead_code_skips_entry_points_and_exported_by_default() {
        let main_fn = func("Main", "main", false);
        let unused = func("Unused", "Unused", false);
        let unused_exported = func("Exported", "Exported", true);

        let result = ParseResult {
            file_path: "a.go".to_string(),
            language: "go".to_string(),
            symbols: vec![main_fn, unused, unused_exported],
            ..Default::default()
        };

        let output = GraphBuilder::new(0).build(&[result], &CancellationToken::new());
        let analytics = GraphAnalytics::new(&output.graph, noop_sink());

        let dead = analytics.dead_code(false);
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].name, "Unused");

        let dead_with_exported = analytics.dead_code(true);
        assert_eq!(dead_with_exported.len(), 2);
    }

    #[test]
    fn hotspots_ranks_by_weighted_degree() {
        let hub = func("Hub", "Hub", true);
        let caller_a = func("CallerA", "CallerA", true);
        let caller_b = func("CallerB", "CallerB", true);

        let result = ParseResult {
            file_path: "a.go".to_string(),
            language: "go".to_string(),
            symbols: vec![hub, caller_a, caller_b],
            call_sites: vec![
                CallSite { from_id: "CallerA".to_string(), callee_name: "Hub".to_string(), callee_package: None, line: 1, col: 0 },
                CallSite { from_id: "CallerB".to_string(), callee_name: "Hub".to_string(), callee_package: None, line: 1, col: 0 },
            ],
            ..Default::default()
        };

        let output = GraphBuilder::new(0).build(&[result], &CancellationToken::new());
        let analytics = GraphAnalytics::new(&output.graph, noop_sink());
        let top = analytics.hotspots(1);
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].symbol.id, "Hub");
        assert_eq!(top[0].score, 4); // 2*in_degree(2) + out_degree(0)
    }

    #[test]
    fn page_rank_top_converges_and_ranks_hub_highest() {
        let hub = func("Hub", "Hub", true);
        let caller_a = func("CallerA", "CallerA", true);
        let caller_b = func("CallerB", "CallerB", true);

        let result = ParseResult {
            file_path: "a.go".to_string(),
            language: "go".to_string(),
            symbols: vec![hub, caller_a, caller_b],
            call_sites: vec![
                CallSite { from_id: "CallerA".to_string(), callee_name: "Hub".to_string(), callee_package: None, line: 1, col: 0 },
                CallSite { from_id: "CallerB".to_string(), callee_name: "Hub".to_string(), callee_package: None, line: 1, col: 0 },
            ],
            ..Default::default()
        };

        let output = GraphBuilder::new(0).build(&[result], &CancellationToken::new());
        let analytics = GraphAnalytics::new(&output.graph, noop_sink());
        let top = analytics.page_rank_top(3);
        assert_eq!(top[0].symbol.id, "Hub");
        let total: f64 = top.iter().map(|e| e.page_rank).sum();
        assert!((total - 1.0).abs() < 1e-3);
    }
}

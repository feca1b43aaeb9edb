//! Graph Builder (C3): consumes [`ParseResult`]s and produces a frozen
//! [`Graph`] plus build statistics (spec.md §4.2).

use super::{Edge, Graph, Node};
use crate::symbol::{ParseResult, Symbol};
use crate::types::{EdgeKind, SymbolKind};
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Default)]
pub struct BuildStats {
    pub nodes: usize,
    pub edges: usize,
    pub placeholders: usize,
    pub call_edges_resolved: usize,
    pub call_edges_unresolved: usize,
    pub polymorphic_call_sites: usize,
    pub interface_edges: usize,
    pub duration_millis: u64,
}

#[derive(Debug, Clone)]
pub struct FileError {
    pub file_path: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct EdgeError {
    pub message: String,
}

pub struct BuildOutput {
    pub graph: Graph,
    pub file_errors: Vec<FileError>,
    pub edge_errors: Vec<EdgeError>,
    pub stats: BuildStats,
    pub incomplete: bool,
}

/// Approximate bytes per node, used against `memory_ceiling_bytes` as a
/// build-budget proxy (the core does not track heap allocator stats).
const APPROX_BYTES_PER_NODE: u64 = 512;

pub struct GraphBuilder {
    memory_ceiling_bytes: u64,
}

/// Mutable scratch state while the graph is under construction; consumed
/// into a frozen [`Graph`] once every pass completes (or the build budget is
/// exhausted).
struct BuildState {
    inner: DiGraph<Node, Edge>,
    node_index: HashMap<String, NodeIndex>,
    by_name: HashMap<String, Vec<String>>,
    by_file: HashMap<String, Vec<String>>,
    by_kind: HashMap<SymbolKind, Vec<String>>,
    edges_seen: std::collections::HashSet<(String, String, EdgeKind)>,
    /// Method-name sets per containing symbol, captured while the tree is
    /// still intact (nodes themselves store a children-stripped `Symbol`).
    methods_of: HashMap<String, std::collections::HashSet<String>>,
}

impl BuildState {
    fn new() -> Self {
        Self {
            inner: DiGraph::new(),
            node_index: HashMap::new(),
            by_name: HashMap::new(),
            by_file: HashMap::new(),
            by_kind: HashMap::new(),
            edges_seen: std::collections::HashSet::new(),
            methods_of: HashMap::new(),
        }
    }

    fn add_node(&mut self, symbol: Symbol) -> NodeIndex {
        if let Some(&idx) = self.node_index.get(&symbol.id) {
            return idx;
        }
        let id = symbol.id.clone();
        let name = symbol.name.clone();
        let file = symbol.file_path.clone();
        let kind = symbol.kind;
        let idx = self.inner.add_node(Node::new(symbol));
        self.node_index.insert(id.clone(), idx);
        self.by_name.entry(name).or_default().push(id.clone());
        self.by_file.entry(file).or_default().push(id.clone());
        self.by_kind.entry(kind).or_default().push(id);
        idx
    }

    fn ensure_placeholder(&mut self, id: &str, name: &str) -> NodeIndex {
        if let Some(&idx) = self.node_index.get(id) {
            return idx;
        }
        self.add_node(Symbol::placeholder(id.to_string(), name.to_string()))
    }

    fn add_edge(&mut self, from: NodeIndex, to: NodeIndex, edge: Edge) -> bool {
        let key = (edge.from_id.clone(), edge.to_id.clone(), edge.kind);
        if !self.edges_seen.insert(key) {
            return false;
        }
        self.inner.add_edge(from, to, edge);
        if let Some(node) = self.inner.node_weight_mut(to) {
            node.in_degree += 1;
        }
        if let Some(node) = self.inner.node_weight_mut(from) {
            node.out_degree += 1;
        }
        true
    }

    fn over_budget(&self, ceiling: u64) -> bool {
        ceiling > 0 && (self.inner.node_count() as u64) * APPROX_BYTES_PER_NODE > ceiling
    }

    fn into_graph(self) -> Graph {
        let mut graph = Graph::empty();
        graph.inner = self.inner;
        graph.node_index = self.node_index;
        graph.by_name = self.by_name;
        graph.by_file = self.by_file;
        graph.by_kind = self.by_kind;
        graph
    }
}

impl GraphBuilder {
    pub fn new(memory_ceiling_bytes: u64) -> Self {
        Self { memory_ceiling_bytes }
    }

    #[tracing::instrument(skip(self, parse_results, cancel), fields(files = parse_results.len()))]
    pub fn build(&self, parse_results: &[ParseResult], cancel: &CancellationToken) -> BuildOutput {
        let start = Instant::now();
        let mut state = BuildState::new();
        let mut file_errors = Vec::new();
        let mut edge_errors = Vec::new();
        let mut stats = BuildStats::default();
        let mut incomplete = false;

        // Pass 1: nodes + `contains` edges.
        'files: for result in parse_results {
            if cancel.is_cancelled() || state.over_budget(self.memory_ceiling_bytes) {
                incomplete = true;
                break 'files;
            }
            for symbol in &result.symbols {
                add_symbol_tree(&mut state, None, symbol);
            }
        }

        // Pass 2: imports.
        if !incomplete {
            for result in parse_results {
                if cancel.is_cancelled() || state.over_budget(self.memory_ceiling_bytes) {
                    incomplete = true;
                    break;
                }
                for import in &result.imports {
                    let Some(&from_idx) = state.node_index.get(&import.from_id) else {
                        file_errors.push(FileError {
                            file_path: result.file_path.clone(),
                            message: format!("import from unknown symbol '{}'", import.from_id),
                        });
                        continue;
                    };
                    let placeholder_id = format!("pkg:{}", import.imported_package);
                    let to_idx = state.ensure_placeholder(&placeholder_id, &import.imported_package);
                    state.add_edge(
                        from_idx,
                        to_idx,
                        Edge {
                            from_id: import.from_id.clone(),
                            to_id: placeholder_id,
                            kind: EdgeKind::Imports,
                            site_line: None,
                            site_col: None,
                        },
                    );
                }
            }
        }

        // Pass 3: calls, with over-approximation on ambiguous names.
        if !incomplete {
            for result in parse_results {
                if cancel.is_cancelled() || state.over_budget(self.memory_ceiling_bytes) {
                    incomplete = true;
                    break;
                }
                for call in &result.call_sites {
                    let Some(&from_idx) = state.node_index.get(&call.from_id) else {
                        edge_errors.push(EdgeError {
                            message: format!("call site from unknown symbol '{}'", call.from_id),
                        });
                        continue;
                    };

                    let candidates: Vec<String> = state
                        .by_name
                        .get(&call.callee_name)
                        .map(|ids| ids.clone())
                        .unwrap_or_default()
                        .into_iter()
                        .filter(|id| {
                            let node = &state.inner[state.node_index[id]];
                            node.symbol.kind.is_callable()
                                && call
                                    .callee_package
                                    .as_ref()
                                    .map(|pkg| &node.symbol.package == pkg)
                                    .unwrap_or(true)
                        })
                        .collect();

                    match candidates.len() {
                        0 => {
                            let placeholder_id = format!("ext:{}", call.callee_name);
                            let to_idx = state.ensure_placeholder(&placeholder_id, &call.callee_name);
                            state.add_edge(
                                from_idx,
                                to_idx,
                                Edge {
                                    from_id: call.from_id.clone(),
                                    to_id: placeholder_id,
                                    kind: EdgeKind::Calls,
                                    site_line: Some(call.line),
                                    site_col: Some(call.col),
                                },
                            );
                            stats.call_edges_unresolved += 1;
                        }
                        1 => {
                            let to_id = candidates[0].clone();
                            let to_idx = state.node_index[&to_id];
                            state.add_edge(
                                from_idx,
                                to_idx,
                                Edge {
                                    from_id: call.from_id.clone(),
                                    to_id,
                                    kind: EdgeKind::Calls,
                                    site_line: Some(call.line),
                                    site_col: Some(call.col),
                                },
                            );
                            stats.call_edges_resolved += 1;
                        }
                        _ => {
                            stats.polymorphic_call_sites += 1;
                            for to_id in candidates {
                                let to_idx = state.node_index[&to_id];
                                state.add_edge(
                                    from_idx,
                                    to_idx,
                                    Edge {
                                        from_id: call.from_id.clone(),
                                        to_id,
                                        kind: EdgeKind::Calls,
                                        site_line: Some(call.line),
                                        site_col: Some(call.col),
                                    },
                                );
                                stats.call_edges_resolved += 1;
                            }
                        }
                    }
                }
            }
        }

        // Pass 4: implements, via method-set superset, stable order by interface id.
        if !incomplete {
            let mut interface_ids: Vec<String> =
                state.by_kind.get(&SymbolKind::Interface).cloned().unwrap_or_default();
            interface_ids.sort();

            let concrete_ids: Vec<String> = state
                .by_kind
                .get(&SymbolKind::Struct)
                .cloned()
                .unwrap_or_default()
                .into_iter()
                .chain(state.by_kind.get(&SymbolKind::Class).cloned().unwrap_or_default())
                .collect();

            for type_id in concrete_ids {
                if cancel.is_cancelled() {
                    incomplete = true;
                    break;
                }
                let type_idx = state.node_index[&type_id];
                let empty = std::collections::HashSet::new();
                let type_methods = state.methods_of.get(&type_id).unwrap_or(&empty);

                for interface_id in &interface_ids {
                    let iface_idx = state.node_index[interface_id];
                    let iface_methods = state.methods_of.get(interface_id).unwrap_or(&empty);
                    if !iface_methods.is_empty() && iface_methods.is_subset(type_methods) {
                        if state.add_edge(
                            type_idx,
                            iface_idx,
                            Edge {
                                from_id: type_id.clone(),
                                to_id: interface_id.clone(),
                                kind: EdgeKind::Implements,
                                site_line: None,
                                site_col: None,
                            },
                        ) {
                            stats.interface_edges += 1;
                        }
                    }
                }
            }
        }

        // Pass 5: references.
        if !incomplete {
            for result in parse_results {
                if cancel.is_cancelled() {
                    incomplete = true;
                    break;
                }
                for reference in &result.references {
                    let Some(&from_idx) = state.node_index.get(&reference.from_id) else {
                        continue;
                    };
                    let Some(target_id) = state
                        .by_name
                        .get(&reference.target_name)
                        .and_then(|ids| ids.first())
                        .cloned()
                    else {
                        continue;
                    };
                    let to_idx = state.node_index[&target_id];
                    state.add_edge(
                        from_idx,
                        to_idx,
                        Edge {
                            from_id: reference.from_id.clone(),
                            to_id: target_id,
                            kind: EdgeKind::References,
                            site_line: Some(reference.line),
                            site_col: Some(reference.col),
                        },
                    );
                }
            }
        }

        stats.nodes = state.inner.node_count();
        stats.edges = state.inner.edge_count();
        stats.placeholders = state
            .inner
            .node_weights()
            .filter(|n| n.symbol.is_placeholder())
            .count();
        stats.duration_millis = start.elapsed().as_millis() as u64;

        crate::log_event!(
            "graph",
            "build complete",
            "{} node(s), {} edge(s){}",
            stats.nodes,
            stats.edges,
            if incomplete { ", incomplete (budget or cancellation)" } else { "" }
        );

        BuildOutput {
            graph: state.into_graph(),
            file_errors,
            edge_errors,
            stats,
            incomplete,
        }
    }
}

fn add_symbol_tree(state: &mut BuildState, parent_id: Option<&str>, symbol: &Symbol) {
    let id = symbol.id.clone();
    let own = Symbol {
        children: Vec::new(),
        ..symbol.clone()
    };
    let idx = state.add_node(own);

    if let Some(parent_id) = parent_id {
        if let Some(&parent_idx) = state.node_index.get(parent_id) {
            state.add_edge(
                parent_idx,
                idx,
                Edge {
                    from_id: parent_id.to_string(),
                    to_id: id.clone(),
                    kind: EdgeKind::Contains,
                    site_line: None,
                    site_col: None,
                },
            );
        }
        if symbol.kind == SymbolKind::Method {
            state
                .methods_of
                .entry(parent_id.to_string())
                .or_default()
                .insert(symbol.name.clone());
        }
    }

    for child in &symbol.children {
        add_symbol_tree(state, Some(&id), child);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::CallSite;

    fn func(id: &str, name: &str, file: &str, package: &str, line: u32) -> Symbol {
        Symbol {
            id: id.to_string(),
            name: name.to_string(),
            kind: SymbolKind::Function,
            file_path: file.to_string(),
            start_line: line,
            end_line: line,
            start_col: 0,
            end_col: 0,
            package: package.to_string(),
            signature: String::new(),
            exported: true,
            language: "go".to_string(),
            parsed_at: 0,
            children: Vec::new(),
        }
    }

    #[test]
    fn build_plus_find_callers_scenario() {
        // spec.md §8 scenario 1
        let a = ParseResult {
            file_path: "a.go".to_string(),
            language: "go".to_string(),
            symbols: vec![func("a.go:3:Main", "Main", "a.go", "main", 3)],
            call_sites: vec![CallSite {
                from_id: "a.go:3:Main".to_string(),
                callee_name: "Helper".to_string(),
                callee_package: None,
                line: 3,
                col: 10,
            }],
            ..Default::default()
        };
        let b = ParseResult {
            file_path: "b.go".to_string(),
            language: "go".to_string(),
            symbols: vec![func("b.go:1:Helper", "Helper", "b.go", "main", 1)],
            ..Default::default()
        };

        let builder = GraphBuilder::new(0);
        let output = builder.build(&[a, b], &CancellationToken::new());
        assert!(!output.incomplete);
        assert_eq!(output.stats.call_edges_resolved, 1);
        assert_eq!(output.stats.call_edges_unresolved, 0);
        assert_eq!(output.graph.node_count(), 2);
    }

    #[test]
    fn unresolved_call_creates_placeholder() {
        let a = ParseResult {
            file_path: "a.go".to_string(),
            language: "go".to_string(),
            symbols: vec![func("a.go:3:Main", "Main", "a.go", "main", 3)],
            call_sites: vec![CallSite {
                from_id: "a.go:3:Main".to_string(),
                callee_name: "Missing".to_string(),
                callee_package: None,
                line: 3,
                col: 10,
            }],
            ..Default::default()
        };

        let builder = GraphBuilder::new(0);
        let output = builder.build(&[a], &CancellationToken::new());
        assert_eq!(output.stats.call_edges_unresolved, 1);
        assert_eq!(output.stats.placeholders, 1);
        assert_eq!(output.graph.node_count(), 2);
    }

    #[test]
    fn polymorphic_name_resolution_scenario() {
        // spec.md §8 scenario 2 (simplified count check)
        let x = func("x/sub.go:1:Setup", "Setup", "x/sub.go", "x", 1);
        let y = func("y/sub.go:1:Setup", "Setup", "y/sub.go", "y", 1);
        let mut callers = Vec::new();
        for i in 0..3 {
            let id = format!("callers.go:{i}:CallX{i}");
            callers.push(func(&id, &format!("CallX{i}"), "callers.go", "main", i as u32));
        }
        for i in 0..2 {
            let id = format!("callers.go:{i}:CallY{i}");
            callers.push(func(&id, &format!("CallY{i}"), "callers.go", "main", i as u32));
        }

        let mut call_sites = Vec::new();
        for i in 0..3 {
            call_sites.push(CallSite {
                from_id: format!("callers.go:{i}:CallX{i}"),
                callee_name: "Setup".to_string(),
                callee_package: None,
                line: i as u32,
                col: 0,
            });
        }
        for i in 0..2 {
            call_sites.push(CallSite {
                from_id: format!("callers.go:{i}:CallY{i}"),
                callee_name: "Setup".to_string(),
                callee_package: None,
                line: i as u32,
                col: 0,
            });
        }

        let result = ParseResult {
            file_path: "mixed.go".to_string(),
            language: "go".to_string(),
            symbols: vec![x, y].into_iter().chain(callers).collect(),
            call_sites,
            ..Default::default()
        };

        let builder = GraphBuilder::new(0);
        let output = builder.build(&[result], &CancellationToken::new());
        assert_eq!(output.stats.polymorphic_call_sites, 5);
        assert_eq!(output.stats.call_edges_resolved, 10); // 5 sites * 2 candidates each
    }

    #[test]
    fn implements_pass_matches_superset_method_set() {
        let mut interface = func("Greeter", "Greeter", "", "main", 0);
        interface.kind = SymbolKind::Interface;
        interface.children = vec![Symbol {
            id: "Greeter.Greet".to_string(),
            name: "Greet".to_string(),
            kind: SymbolKind::Method,
            ..func("Greeter.Greet", "Greet", "", "main", 0)
        }];

        let mut concrete = func("Robot", "Robot", "robot.go", "main", 1);
        concrete.kind = SymbolKind::Struct;
        concrete.children = vec![Symbol {
            id: "Robot.Greet".to_string(),
            name: "Greet".to_string(),
            kind: SymbolKind::Method,
            ..func("Robot.Greet", "Greet", "robot.go", "main", 2)
        }];

        let result = ParseResult {
            file_path: "robot.go".to_string(),
            language: "go".to_string(),
            symbols: vec![interface, concrete],
            ..Default::default()
        };

        let builder = GraphBuilder::new(0);
        let output = builder.build(&[result], &CancellationToken::new());
        assert_eq!(output.stats.interface_edges, 1);
    }
}

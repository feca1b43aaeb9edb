//! Graph build and query throughput benchmarks.
//!
//! ## Build
//! - `GraphBuilder::build` scaling with symbol/call-site count
//!
//! ## Queries
//! - `find_callers_by_id` / `find_callees_by_id` latency
//! - `get_call_graph` traversal scaling with depth
//!
//! ## Analytics
//! - `page_rank_top` convergence cost on a dense graph

use aleutian_core::graph::analytics::GraphAnalytics;
use aleutian_core::graph::builder::GraphBuilder;
use aleutian_core::graph::queries::GraphQueries;
use aleutian_core::instrumentation::noop_sink;
use aleutian_core::symbol::{CallSite, ParseResult, Symbol};
use aleutian_core::types::SymbolKind;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tokio_util::sync::CancellationToken;

fn func(id: &str) -> Symbol {
    Symbol {
        id: id.to_string(),
        name: id.to_string(),
        kind: SymbolKind::Function,
        file_path: "gen.go".to_string(),
        start_line: 1,
        end_line: 1,
        start_col: 0,
        end_col: 0,
        package: "main".to_string(),
        signature: String::new(),
        exported: true,
        language: "go".to_string(),
        parsed_at: 0,
        children: Vec::new(),
    }
}

/// A chain `f0 -> f1 -> ... -> f(n-1)` plus a fan-in of every function into
/// `f0`, so both caller and callee lookups have real work to do.
fn generate_parse_result(n: usize) -> ParseResult {
    let symbols: Vec<Symbol> = (0..n).map(|i| func(&format!("f{i}"))).collect();
    let mut call_sites = Vec::new();
    for i in 0..n.saturating_sub(1) {
        call_sites.push(CallSite {
            from_id: format!("f{i}"),
            callee_name: format!("f{}", i + 1),
            callee_package: None,
            line: 1,
            col: 0,
        });
    }
    for i in 1..n {
        call_sites.push(CallSite {
            from_id: format!("f{i}"),
            callee_name: "f0".to_string(),
            callee_package: None,
            line: 2,
            col: 0,
        });
    }
    ParseResult {
        file_path: "gen.go".to_string(),
        language: "go".to_string(),
        symbols,
        call_sites,
        ..Default::default()
    }
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph_build");
    for size in [100usize, 1_000, 5_000] {
        let result = generate_parse_result(size);
        group.throughput(criterion::Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &result, |b, result| {
            b.iter(|| {
                let output = GraphBuilder::new(0).build(black_box(std::slice::from_ref(result)), &CancellationToken::new());
                black_box(output)
            });
        });
    }
    group.finish();
}

fn bench_queries(c: &mut Criterion) {
    let result = generate_parse_result(2_000);
    let graph = GraphBuilder::new(0).build(&[result], &CancellationToken::new()).graph;

    let mut group = c.benchmark_group("graph_queries");
    group.bench_function("find_callers_by_id", |b| {
        b.iter(|| GraphQueries::new(&graph).find_callers_by_id(black_box("f0"), None));
    });
    group.bench_function("find_callees_by_id", |b| {
        b.iter(|| GraphQueries::new(&graph).find_callees_by_id(black_box("f1000"), None));
    });
    for depth in [2usize, 5, 10] {
        group.bench_with_input(BenchmarkId::new("get_call_graph_depth", depth), &depth, |b, depth| {
            b.iter(|| {
                GraphQueries::new(&graph)
                    .get_call_graph(black_box("f0"), *depth, 10_000, &CancellationToken::new())
                    .unwrap()
            });
        });
    }
    group.finish();
}

fn bench_analytics(c: &mut Criterion) {
    let result = generate_parse_result(1_000);
    let graph = GraphBuilder::new(0).build(&[result], &CancellationToken::new()).graph;
    let sink = noop_sink();

    c.bench_function("page_rank_top", |b| {
        b.iter(|| GraphAnalytics::new(&graph, sink.clone()).page_rank_top(black_box(20)));
    });
}

criterion_group!(benches, bench_build, bench_queries, bench_analytics);
criterion_main!(benches);

//! Query Cache Adapter (C6): a bounded LRU in front of [`queries::GraphQueries`],
//! keyed by `(operation, node_id, depth, limit)` — `limit` is part of the key
//! because two calls differing only in `limit` are not interchangeable
//! (spec.md §9, resolved Open Question).

use super::queries::GraphQueries;
use super::{Graph, PathResult, QueryResult, ReferenceResult, TraversalResult};
use crate::instrumentation::SharedMetricsSink;
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    op: &'static str,
    node_id: String,
    depth: Option<usize>,
    limit: Option<usize>,
}

#[derive(Debug, Clone)]
enum CachedValue {
    Query(QueryResult),
    Traversal(TraversalResult),
    Path(PathResult),
    References(ReferenceResult),
    ByName(HashMap<String, QueryResult>),
}

/// Wraps a frozen [`Graph`] with a bounded, process-local LRU query cache.
/// Not durable: discarded along with the graph it caches (spec.md §4.5
/// Non-goals — no durable query cache).
pub struct QueryCacheAdapter {
    graph: Graph,
    capacity: usize,
    entries: Mutex<IndexMap<CacheKey, CachedValue>>,
    hits: AtomicU64,
    misses: AtomicU64,
    sink: SharedMetricsSink,
}

impl QueryCacheAdapter {
    pub fn new(graph: Graph, capacity: usize, sink: SharedMetricsSink) -> Self {
        Self {
            graph,
            capacity,
            entries: Mutex::new(IndexMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            sink,
        }
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn hit_count(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn miss_count(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    fn get_or_insert(&self, key: CacheKey, compute: impl FnOnce() -> CachedValue) -> CachedValue {
        {
            let mut entries = self.entries.lock();
            if let Some(value) = entries.shift_remove(&key) {
                // Move-to-end marks this entry as most recently used.
                entries.insert(key, value.clone());
                self.hits.fetch_add(1, Ordering::Relaxed);
                self.sink.record_count("cache_hit", 1);
                return value;
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        self.sink.record_count("cache_miss", 1);
        let value = compute();

        let mut entries = self.entries.lock();
        if entries.len() >= self.capacity {
            entries.shift_remove_index(0);
        }
        entries.insert(key, value.clone());
        value
    }

    #[tracing::instrument(skip(self))]
    pub fn find_callers_by_id(&self, id: &str, limit: Option<usize>) -> QueryResult {
        let key = CacheKey { op: "find_callers_by_id", node_id: id.to_string(), depth: None, limit };
        match self.get_or_insert(key, || {
            CachedValue::Query(GraphQueries::new(&self.graph).find_callers_by_id(id, limit))
        }) {
            CachedValue::Query(r) => r,
            _ => unreachable!("cache key op mismatch"),
        }
    }

    #[tracing::instrument(skip(self))]
    pub fn find_callees_by_id(&self, id: &str, limit: Option<usize>) -> QueryResult {
        let key = CacheKey { op: "find_callees_by_id", node_id: id.to_string(), depth: None, limit };
        match self.get_or_insert(key, || {
            CachedValue::Query(GraphQueries::new(&self.graph).find_callees_by_id(id, limit))
        }) {
            CachedValue::Query(r) => r,
            _ => unreachable!("cache key op mismatch"),
        }
    }

    #[tracing::instrument(skip(self))]
    pub fn find_implementations_by_id(&self, id: &str, limit: Option<usize>) -> QueryResult {
        let key = CacheKey { op: "find_implementations_by_id", node_id: id.to_string(), depth: None, limit };
        match self.get_or_insert(key, || {
            CachedValue::Query(GraphQueries::new(&self.graph).find_implementations_by_id(id, limit))
        }) {
            CachedValue::Query(r) => r,
            _ => unreachable!("cache key op mismatch"),
        }
    }

    #[tracing::instrument(skip(self))]
    pub fn find_references_by_id(&self, id: &str, limit: Option<usize>) -> ReferenceResult {
        let key = CacheKey { op: "find_references_by_id", node_id: id.to_string(), depth: None, limit };
        match self.get_or_insert(key, || {
            CachedValue::References(GraphQueries::new(&self.graph).find_references_by_id(id, limit))
        }) {
            CachedValue::References(r) => r,
            _ => unreachable!("cache key op mismatch"),
        }
    }

    #[tracing::instrument(skip(self))]
    pub fn find_callers_by_name(&self, name: &str, limit: Option<usize>) -> HashMap<String, QueryResult> {
        let key = CacheKey { op: "find_callers_by_name", node_id: name.to_string(), depth: None, limit };
        match self.get_or_insert(key, || {
            CachedValue::ByName(GraphQueries::new(&self.graph).find_callers_by_name(name, limit))
        }) {
            CachedValue::ByName(r) => r,
            _ => unreachable!("cache key op mismatch"),
        }
    }

    #[tracing::instrument(skip(self))]
    pub fn find_callees_by_name(&self, name: &str, limit: Option<usize>) -> QueryResult {
        let key = CacheKey { op: "find_callees_by_name", node_id: name.to_string(), depth: None, limit };
        match self.get_or_insert(key, || {
            CachedValue::Query(GraphQueries::new(&self.graph).find_callees_by_name(name, limit))
        }) {
            CachedValue::Query(r) => r,
            _ => unreachable!("cache key op mismatch"),
        }
    }

    #[tracing::instrument(skip(self, cancel))]
    pub fn get_reverse_call_graph(
        &self,
        id: &str,
        max_depth: usize,
        node_budget: usize,
        cancel: &CancellationToken,
    ) -> Result<TraversalResult, crate::error::GraphError> {
        let key = CacheKey {
            op: "get_reverse_call_graph",
            node_id: id.to_string(),
            depth: Some(max_depth),
            limit: Some(node_budget),
        };
        if max_depth > super::queries::MAX_DEPTH_CAP {
            return GraphQueries::new(&self.graph).get_reverse_call_graph(id, max_depth, node_budget, cancel);
        }
        match self.get_or_insert(key, || {
            CachedValue::Traversal(
                GraphQueries::new(&self.graph)
                    .get_reverse_call_graph(id, max_depth, node_budget, cancel)
                    .expect("depth already validated"),
            )
        }) {
            CachedValue::Traversal(r) => Ok(r),
            _ => unreachable!("cache key op mismatch"),
        }
    }

    #[tracing::instrument(skip(self, cancel))]
    pub fn get_call_graph(
        &self,
        id: &str,
        max_depth: usize,
        node_budget: usize,
        cancel: &CancellationToken,
    ) -> Result<TraversalResult, crate::error::GraphError> {
        let key = CacheKey {
            op: "get_call_graph",
            node_id: id.to_string(),
            depth: Some(max_depth),
            limit: Some(node_budget),
        };
        // Traversal results can fail validation (depth cap); compute outside
        // the cache on the fast-reject path so errors are never cached.
        if max_depth > super::queries::MAX_DEPTH_CAP {
            return GraphQueries::new(&self.graph).get_call_graph(id, max_depth, node_budget, cancel);
        }
        match self.get_or_insert(key, || {
            CachedValue::Traversal(
                GraphQueries::new(&self.graph)
                    .get_call_graph(id, max_depth, node_budget, cancel)
                    .expect("depth already validated"),
            )
        }) {
            CachedValue::Traversal(r) => Ok(r),
            _ => unreachable!("cache key op mismatch"),
        }
    }

    #[tracing::instrument(skip(self))]
    pub fn shortest_path(&self, from_id: &str, to_id: &str) -> PathResult {
        let key = CacheKey {
            op: "shortest_path",
            node_id: format!("{from_id}->{to_id}"),
            depth: None,
            limit: None,
        };
        match self.get_or_insert(key, || {
            CachedValue::Path(GraphQueries::new(&self.graph).shortest_path(from_id, to_id))
        }) {
            CachedValue::Path(r) => r,
            _ => unreachable!("cache key op mismatch"),
        }
    }

    pub fn invalidate_all(&self) {
        self.entries.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::builder::GraphBuilder;
    use crate::instrumentation::noop_sink;
    use crate::symbol::{CallSite, ParseResult, Symbol};
    use crate::types::SymbolKind;

    fn func(id: &str, name: &str) -> Symbol {
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
            exported: true,
            language: "go".to_string(),
            parsed_at: 0,
            children: Vec::new(),
        }
    }

    fn adapter() -> QueryCacheAdapter {
        let result = ParseResult {
            file_path: "a.go".to_string(),
            language: "go".to_string(),
            symbols: vec![func("A", "A"), func("B", "B")],
            call_sites: vec![CallSite {
                from_id: "A".to_string(),
                callee_name: "B".to_string(),
                callee_package: None,
                line: 1,
                col: 0,
            }],
            ..Default::default()
        };
        let graph = GraphBuilder::new(0).build(&[result], &CancellationToken::new()).graph;
        QueryCacheAdapter::new(graph, 4, noop_sink())
    }

    #[test]
    fn second_identical_query_is_a_cache_hit() {
        let cache = adapter();
        let _ = cache.find_callers_by_id("B", None);
        let _ = cache.find_callers_by_id("B", None);
        assert_eq!(cache.hit_count(), 1);
        assert_eq!(cache.miss_count(), 1);
    }

    #[test]
    fn different_limit_is_a_distinct_key() {
        let cache = adapter();
        let _ = cache.find_callers_by_id("B", None);
        let _ = cache.find_callers_by_id("B", Some(1));
        assert_eq!(cache.hit_count(), 0);
        assert_eq!(cache.miss_count(), 2);
    }

    #[test]
    fn capacity_eviction_drops_oldest_entry() {
        let result = ParseResult {
            file_path: "a.go".to_string(),
            language: "go".to_string(),
            symbols: vec![func("A", "A"), func("B", "B"), func("C", "C")],
            ..Default::default()
        };
        let graph = GraphBuilder::new(0).build(&[result], &CancellationToken::new()).graph;
        let cache = QueryCacheAdapter::new(graph, 2, noop_sink());

        let _ = cache.find_callers_by_id("A", None);
        let _ = cache.find_callers_by_id("B", None);
        let _ = cache.find_callers_by_id("C", None);
        // "A" was evicted to make room for "C"; re-querying it is a miss.
        let _ = cache.find_callers_by_id("A", None);
        assert_eq!(cache.miss_count(), 4);
    }

    #[test]
    fn references_by_id_are_cached() {
        let cache = adapter();
        let _ = cache.find_references_by_id("B", None);
        let _ = cache.find_references_by_id("B", None);
        assert_eq!(cache.hit_count(), 1);
        assert_eq!(cache.miss_count(), 1);
    }

    #[test]
    fn callers_by_name_are_cached() {
        let cache = adapter();
        let _ = cache.find_callers_by_name("B", None);
        let _ = cache.find_callers_by_name("B", None);
        assert_eq!(cache.hit_count(), 1);
        assert_eq!(cache.miss_count(), 1);
    }

    #[test]
    fn invalidate_all_clears_cache() {
        let cache = adapter();
        let _ = cache.find_callers_by_id("B", None);
        cache.invalidate_all();
        let _ = cache.find_callers_by_id("B", None);
        assert_eq!(cache.hit_count(), 0);
        assert_eq!(cache.miss_count(), 2);
    }
}

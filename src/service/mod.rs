//! Service / Graph Cache (C7): per-project-root graph lifecycle —
//! `Init`, `GetGraph`, and eviction (spec.md §4.6).

mod parser;
mod walk;

pub use parser::{LanguageParser, ParserRegistry};

use crate::config::{CacheConfig, GraphConfig, LspConfig};
use crate::error::{GraphError, LspError, ServiceError};
use crate::graph::analytics::{GraphAnalytics, Hotspot, PageRankEntry, Scc};
use crate::graph::builder::GraphBuilder;
use crate::graph::cache_adapter::QueryCacheAdapter;
use crate::graph::queries::MAX_DEPTH_CAP;
use crate::graph::{PathResult, QueryResult, ReferenceResult, TraversalResult};
use crate::index::SymbolIndex;
use crate::instrumentation::SharedMetricsSink;
use crate::lsp::{LspBroker, ServerState};
use crate::lsp::protocol::lsp_to_location;
use crate::symbol::Symbol;
use crate::types::{graph_id_for_root, validate_absolute_no_traversal, Location, Millis};
use parking_lot::{Mutex as SyncMutex, RwLock};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;

/// Upper bound on `limit` for any list-returning query (spec.md §6).
const MAX_LIMIT: usize = 1000;

fn validate_limit(limit: Option<usize>) -> Result<Option<usize>, GraphError> {
    match limit {
        Some(requested) if requested > MAX_LIMIT => Err(GraphError::InvalidLimit {
            requested,
            max: MAX_LIMIT,
        }),
        other => Ok(other),
    }
}

fn validate_min_size(min_size: usize) -> Result<usize, GraphError> {
    if min_size < 2 {
        return Err(GraphError::InvalidMinSize { requested: min_size });
    }
    Ok(min_size)
}

fn now_millis() -> Millis {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as Millis)
        .unwrap_or(0)
}

/// A graph built for one project root, frozen and ready to serve queries.
pub struct CachedGraph {
    pub graph_id: String,
    pub project_root: PathBuf,
    pub built_at: Millis,
    pub expires_at: Option<Millis>,
    pub languages_seen: Vec<String>,
    pub index: SymbolIndex,
    pub cache: QueryCacheAdapter,
}

/// Summary returned from `Init` (spec.md §4.6 step 10; `languages_seen` is a
/// supplemental field beyond the distilled summary shape).
#[derive(Debug, Clone)]
pub struct InitResponse {
    pub graph_id: String,
    pub is_refresh: bool,
    pub previous_id: Option<String>,
    pub files_parsed: usize,
    pub symbols_extracted: usize,
    pub edges_built: usize,
    pub parse_time_ms: u64,
    pub errors: Vec<String>,
    pub languages_seen: Vec<String>,
}

/// The service-level graph registry (C7): `{graphs, init_locks}` plus the
/// configuration that bounds `Init`.
pub struct ServiceCache {
    graphs: RwLock<HashMap<String, Arc<CachedGraph>>>,
    init_locks: SyncMutex<HashMap<PathBuf, Arc<AsyncMutex<()>>>>,
    cache_config: CacheConfig,
    graph_config: GraphConfig,
    parsers: ParserRegistry,
    sink: SharedMetricsSink,
    lsp: LspBroker,
    lsp_config: LspConfig,
}

impl ServiceCache {
    pub fn new(
        cache_config: CacheConfig,
        graph_config: GraphConfig,
        parsers: ParserRegistry,
        sink: SharedMetricsSink,
        lsp_config: LspConfig,
    ) -> Self {
        Self {
            graphs: RwLock::new(HashMap::new()),
            init_locks: SyncMutex::new(HashMap::new()),
            cache_config,
            graph_config,
            parsers,
            sink,
            lsp: LspBroker::new(lsp_config.clone()),
            lsp_config,
        }
    }

    fn lock_for(&self, project_root: &Path) -> Arc<AsyncMutex<()>> {
        self.init_locks
            .lock()
            .entry(project_root.to_path_buf())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    fn validate_root(&self, project_root: &Path) -> Result<PathBuf, ServiceError> {
        validate_absolute_no_traversal(project_root).map_err(|e| match e {
            crate::types::PathValidationError::Relative => ServiceError::RelativePath {
                path: project_root.to_path_buf(),
            },
            crate::types::PathValidationError::Traversal => ServiceError::PathTraversal {
                path: project_root.to_path_buf(),
            },
        })?;

        let resolved = std::fs::canonicalize(project_root).map_err(ServiceError::Io)?;

        if !self.cache_config.allowed_root_prefixes.is_empty()
            && !self
                .cache_config
                .allowed_root_prefixes
                .iter()
                .any(|prefix| resolved.starts_with(prefix))
        {
            return Err(ServiceError::NotAllowed { path: resolved });
        }
        Ok(resolved)
    }

    /// Walk, parse, build, and index a project, replacing any previous graph
    /// under the same `graph_id` (spec.md §4.6).
    #[tracing::instrument(skip(self, project_root, languages, excludes))]
    pub async fn init(
        &self,
        project_root: &Path,
        languages: &[String],
        excludes: &[String],
    ) -> Result<InitResponse, ServiceError> {
        let resolved = self.validate_root(project_root)?;

        let lock = self.lock_for(&resolved);
        let guard = lock.try_lock().map_err(|_| ServiceError::InitInProgress {
            path: resolved.clone(),
        })?;

        let timeout = std::time::Duration::from_secs(self.cache_config.init_timeout_secs);
        let result = tokio::time::timeout(timeout, self.init_inner(&resolved, languages, excludes)).await;
        drop(guard);

        match result {
            Ok(inner) => inner,
            Err(_) => Err(ServiceError::InitTimedOut {
                path: resolved,
                timeout_secs: self.cache_config.init_timeout_secs,
            }),
        }
    }

    async fn init_inner(
        &self,
        resolved: &Path,
        languages: &[String],
        excludes: &[String],
    ) -> Result<InitResponse, ServiceError> {
        let start = std::time::Instant::now();
        let graph_id = graph_id_for_root(resolved);
        let cancel = CancellationToken::new();

        let walked = walk::walk_project(
            resolved,
            languages,
            excludes,
            &self.parsers,
            self.cache_config.max_project_files,
            self.cache_config.max_project_bytes,
        )?;

        let mut parse_results = Vec::new();
        let mut errors = Vec::new();
        let mut languages_seen = std::collections::HashSet::new();
        for file in walked.files {
            match self.parsers.parse_file(&file.path, &file.language) {
                Ok(result) => {
                    languages_seen.insert(result.language.clone());
                    parse_results.push(result);
                }
                Err(e) => errors.push(format!("{}: {e}", file.path.display())),
            }
        }

        let builder = GraphBuilder::new(self.graph_config.memory_ceiling_bytes);
        let build_output = builder.build(&parse_results, &cancel);
        for e in &build_output.file_errors {
            errors.push(format!("{}: {}", e.file_path, e.message));
        }
        for e in &build_output.edge_errors {
            errors.push(e.message.clone());
        }

        let index = SymbolIndex::new(usize::MAX);
        let mut symbols_extracted = 0usize;
        for result in &parse_results {
            let flattened: Vec<_> = result.symbols.iter().flat_map(|s| s.flatten()).collect();
            let count = flattened.len();
            if let Err(e) = index.add_batch(flattened) {
                errors.push(format!("{}: {e}", result.file_path));
                continue;
            }
            symbols_extracted += count;
        }

        let cache = QueryCacheAdapter::new(
            build_output.graph,
            self.cache_config.query_cache_capacity,
            self.sink.clone(),
        );

        let built_at = now_millis();
        let expires_at = if self.cache_config.graph_ttl_secs > 0 {
            Some(built_at + self.cache_config.graph_ttl_secs * 1000)
        } else {
            None
        };

        let cached = Arc::new(CachedGraph {
            graph_id: graph_id.clone(),
            project_root: resolved.to_path_buf(),
            built_at,
            expires_at,
            languages_seen: languages_seen.into_iter().collect(),
            index,
            cache,
        });

        let previous_id;
        {
            let mut graphs = self.graphs.write();
            previous_id = graphs.insert(graph_id.clone(), cached.clone()).map(|_| graph_id.clone());
            evict_lru(&mut graphs, self.cache_config.max_cached_graphs);
        }

        crate::log_event!(
            "service",
            "graph initialized",
            "{graph_id}: {} file(s), {symbols_extracted} symbol(s), {} error(s)",
            parse_results.len(),
            errors.len()
        );

        Ok(InitResponse {
            graph_id,
            is_refresh: previous_id.is_some(),
            previous_id,
            files_parsed: parse_results.len(),
            symbols_extracted,
            edges_built: build_output.stats.edges,
            parse_time_ms: start.elapsed().as_millis() as u64,
            errors,
            languages_seen: cached.languages_seen.clone(),
        })
    }

    /// Fails with `NotInitialized`/`Expired`; never blocks building.
    #[tracing::instrument(skip(self))]
    pub fn get_graph(&self, graph_id: &str) -> Result<Arc<CachedGraph>, ServiceError> {
        let graphs = self.graphs.read();
        let entry = graphs.get(graph_id).cloned().ok_or_else(|| ServiceError::NotInitialized {
            graph_id: graph_id.to_string(),
        })?;
        if let Some(expires_at) = entry.expires_at {
            if now_millis() > expires_at {
                return Err(ServiceError::Expired {
                    graph_id: graph_id.to_string(),
                });
            }
        }
        Ok(entry)
    }

    pub fn cached_graph_count(&self) -> usize {
        self.graphs.read().len()
    }

    /// Predecessors across `calls` edges (spec.md §6 `FindCallers`).
    #[tracing::instrument(skip(self))]
    pub fn find_callers(&self, graph_id: &str, id: &str, limit: Option<usize>) -> Result<QueryResult, ServiceError> {
        let limit = validate_limit(limit)?;
        let cached = self.get_graph(graph_id)?;
        Ok(cached.cache.find_callers_by_id(id, limit))
    }

    /// Successors across `calls` edges (spec.md §6 `FindCallees`).
    #[tracing::instrument(skip(self))]
    pub fn find_callees(&self, graph_id: &str, id: &str, limit: Option<usize>) -> Result<QueryResult, ServiceError> {
        let limit = validate_limit(limit)?;
        let cached = self.get_graph(graph_id)?;
        Ok(cached.cache.find_callees_by_id(id, limit))
    }

    /// Types implementing the interface `id` (spec.md §6 `FindImplementations`).
    #[tracing::instrument(skip(self))]
    pub fn find_implementations(&self, graph_id: &str, id: &str, limit: Option<usize>) -> Result<QueryResult, ServiceError> {
        let limit = validate_limit(limit)?;
        let cached = self.get_graph(graph_id)?;
        Ok(cached.cache.find_implementations_by_id(id, limit))
    }

    /// Referencing locations of `id` (spec.md §6 `FindReferences`).
    #[tracing::instrument(skip(self))]
    pub fn find_references(&self, graph_id: &str, id: &str, limit: Option<usize>) -> Result<ReferenceResult, ServiceError> {
        let limit = validate_limit(limit)?;
        let cached = self.get_graph(graph_id)?;
        Ok(cached.cache.find_references_by_id(id, limit))
    }

    /// Looks up a symbol by id directly through the frozen graph, bypassing
    /// the query cache since this is already an O(1) map lookup (spec.md §6
    /// `GetSymbol`).
    #[tracing::instrument(skip(self))]
    pub fn get_symbol(&self, graph_id: &str, id: &str) -> Result<Option<Symbol>, ServiceError> {
        let cached = self.get_graph(graph_id)?;
        Ok(cached.cache.graph().get_node(id).map(|n| n.symbol.clone()))
    }

    /// Bounded forward BFS over `calls` edges (spec.md §6 `GetCallChain`).
    #[tracing::instrument(skip(self, cancel))]
    pub fn get_call_chain(
        &self,
        graph_id: &str,
        id: &str,
        max_depth: usize,
        node_budget: usize,
        cancel: &CancellationToken,
    ) -> Result<TraversalResult, ServiceError> {
        if max_depth > MAX_DEPTH_CAP {
            return Err(ServiceError::Graph(GraphError::InvalidDepth {
                requested: max_depth,
                cap: MAX_DEPTH_CAP,
            }));
        }
        let cached = self.get_graph(graph_id)?;
        Ok(cached.cache.get_call_graph(id, max_depth, node_budget, cancel)?)
    }

    /// Bounded reverse BFS over `calls` edges: who transitively ends up
    /// calling `id` (spec.md §6 `GetCallChain`, `reverse` direction).
    #[tracing::instrument(skip(self, cancel))]
    pub fn get_reverse_call_chain(
        &self,
        graph_id: &str,
        id: &str,
        max_depth: usize,
        node_budget: usize,
        cancel: &CancellationToken,
    ) -> Result<TraversalResult, ServiceError> {
        if max_depth > MAX_DEPTH_CAP {
            return Err(ServiceError::Graph(GraphError::InvalidDepth {
                requested: max_depth,
                cap: MAX_DEPTH_CAP,
            }));
        }
        let cached = self.get_graph(graph_id)?;
        Ok(cached.cache.get_reverse_call_graph(id, max_depth, node_budget, cancel)?)
    }

    /// Shortest path between two symbols (spec.md §6 `FindPath`).
    #[tracing::instrument(skip(self))]
    pub fn find_path(&self, graph_id: &str, from_id: &str, to_id: &str) -> Result<PathResult, ServiceError> {
        let cached = self.get_graph(graph_id)?;
        Ok(cached.cache.shortest_path(from_id, to_id))
    }

    /// Top-`k` symbols by weighted degree (spec.md §6 `FindHotspots`).
    #[tracing::instrument(skip(self))]
    pub fn find_hotspots(&self, graph_id: &str, limit: usize) -> Result<Vec<Hotspot>, ServiceError> {
        let limit = validate_limit(Some(limit))?.unwrap_or(MAX_LIMIT);
        let cached = self.get_graph(graph_id)?;
        let analytics = GraphAnalytics::new(cached.cache.graph(), self.sink.clone());
        Ok(analytics.hotspots(limit))
    }

    /// Top-`k` symbols by PageRank (spec.md §6 `FindImportant`).
    #[tracing::instrument(skip(self))]
    pub fn find_important(&self, graph_id: &str, limit: usize) -> Result<Vec<PageRankEntry>, ServiceError> {
        let limit = validate_limit(Some(limit))?.unwrap_or(MAX_LIMIT);
        let cached = self.get_graph(graph_id)?;
        let analytics = GraphAnalytics::new(cached.cache.graph(), self.sink.clone());
        Ok(analytics.page_rank_top(limit))
    }

    /// Symbols with no reachable callers (spec.md §6 `FindDeadCode`).
    #[tracing::instrument(skip(self))]
    pub fn find_dead_code(&self, graph_id: &str, include_exported: bool) -> Result<Vec<Symbol>, ServiceError> {
        let cached = self.get_graph(graph_id)?;
        let analytics = GraphAnalytics::new(cached.cache.graph(), self.sink.clone());
        Ok(analytics.dead_code(include_exported))
    }

    /// Strongly connected components of size >= `min_size` (spec.md §6 `FindCycles`).
    #[tracing::instrument(skip(self))]
    pub fn find_cycles(&self, graph_id: &str, min_size: usize) -> Result<Vec<Scc>, ServiceError> {
        let min_size = validate_min_size(min_size)?;
        let cached = self.get_graph(graph_id)?;
        let analytics = GraphAnalytics::new(cached.cache.graph(), self.sink.clone());
        Ok(analytics.cyclic_dependencies(min_size))
    }

    fn language_for_path(&self, path: &Path) -> Result<&str, ServiceError> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        self.parsers
            .language_for_extension(ext)
            .ok_or_else(|| ServiceError::Lsp(LspError::NotInstalled {
                language: ext.to_string(),
            }))
    }

    fn lsp_timeout(&self) -> Duration {
        Duration::from_secs(self.lsp_config.request_timeout_secs)
    }

    /// `textDocument/definition` proxied to the language server for `path`
    /// (spec.md §6 `LspDefinition`).
    #[tracing::instrument(skip(self))]
    pub async fn lsp_definition(
        &self,
        root: &Path,
        path: &Path,
        line: u32,
        col: u32,
    ) -> Result<Vec<Location>, ServiceError> {
        let language = self.language_for_path(path)?;
        let params = serde_json::json!({
            "textDocument": { "uri": crate::lsp::protocol::file_uri(path) },
            "position": { "line": line.saturating_sub(1), "character": col },
        });
        let response = self
            .lsp
            .request(root, language, "textDocument/definition", params, self.lsp_timeout())
            .await?;
        Ok(lsp_locations(&response))
    }

    /// `textDocument/references` proxied to the language server for `path`
    /// (spec.md §6 `LspReferences`).
    #[tracing::instrument(skip(self))]
    pub async fn lsp_references(
        &self,
        root: &Path,
        path: &Path,
        line: u32,
        col: u32,
    ) -> Result<Vec<Location>, ServiceError> {
        let language = self.language_for_path(path)?;
        let params = serde_json::json!({
            "textDocument": { "uri": crate::lsp::protocol::file_uri(path) },
            "position": { "line": line.saturating_sub(1), "character": col },
            "context": { "includeDeclaration": true },
        });
        let response = self
            .lsp
            .request(root, language, "textDocument/references", params, self.lsp_timeout())
            .await?;
        Ok(lsp_locations(&response))
    }

    /// `textDocument/hover` proxied to the language server for `path`
    /// (spec.md §6 `LspHover`).
    #[tracing::instrument(skip(self))]
    pub async fn lsp_hover(
        &self,
        root: &Path,
        path: &Path,
        line: u32,
        col: u32,
    ) -> Result<Option<String>, ServiceError> {
        let language = self.language_for_path(path)?;
        let params = serde_json::json!({
            "textDocument": { "uri": crate::lsp::protocol::file_uri(path) },
            "position": { "line": line.saturating_sub(1), "character": col },
        });
        let response = self
            .lsp
            .request(root, language, "textDocument/hover", params, self.lsp_timeout())
            .await?;
        Ok(response
            .get("result")
            .and_then(|r| r.get("contents"))
            .and_then(|c| c.as_str().map(str::to_string).or_else(|| c.get("value").and_then(|v| v.as_str()).map(str::to_string))))
    }

    /// `textDocument/rename` proxied to the language server for `path`
    /// (spec.md §6 `LspRename`). Returns the raw `WorkspaceEdit` — the
    /// core applies no edits of its own.
    #[tracing::instrument(skip(self))]
    pub async fn lsp_rename(
        &self,
        root: &Path,
        path: &Path,
        line: u32,
        col: u32,
        new_name: &str,
    ) -> Result<serde_json::Value, ServiceError> {
        let language = self.language_for_path(path)?;
        let params = serde_json::json!({
            "textDocument": { "uri": crate::lsp::protocol::file_uri(path) },
            "position": { "line": line.saturating_sub(1), "character": col },
            "newName": new_name,
        });
        let response = self
            .lsp
            .request(root, language, "textDocument/rename", params, self.lsp_timeout())
            .await?;
        Ok(response.get("result").cloned().unwrap_or(serde_json::Value::Null))
    }

    /// `workspace/symbol` proxied to the language server for `language`
    /// (spec.md §6 `LspWorkspaceSymbol`).
    #[tracing::instrument(skip(self))]
    pub async fn lsp_workspace_symbol(
        &self,
        root: &Path,
        language: &str,
        query: &str,
    ) -> Result<serde_json::Value, ServiceError> {
        let params = serde_json::json!({ "query": query });
        let response = self
            .lsp
            .request(root, language, "workspace/symbol", params, self.lsp_timeout())
            .await?;
        Ok(response.get("result").cloned().unwrap_or(serde_json::Value::Null))
    }

    /// Current lifecycle state of the `(root, language)` server (spec.md §6
    /// `LspStatus`).
    #[tracing::instrument(skip(self))]
    pub async fn lsp_status(&self, root: &Path, language: &str) -> ServerState {
        self.lsp.status(root, language).await
    }

    /// Shuts down every running language server (spec.md §6 `Close`).
    #[tracing::instrument(skip(self))]
    pub async fn close(&self) {
        self.lsp.shutdown_all().await;
    }
}

fn lsp_locations(response: &serde_json::Value) -> Vec<Location> {
    let Some(result) = response.get("result") else {
        return Vec::new();
    };
    let items: Vec<&serde_json::Value> = match result {
        serde_json::Value::Array(items) => items.iter().collect(),
        serde_json::Value::Null => Vec::new(),
        single => vec![single],
    };
    items.iter().filter_map(|v| lsp_to_location(v)).collect()
}

fn evict_lru(graphs: &mut HashMap<String, Arc<CachedGraph>>, max_cached_graphs: usize) {
    while graphs.len() > max_cached_graphs {
        let oldest = graphs
            .iter()
            .min_by_key(|(_, g)| g.built_at)
            .map(|(id, _)| id.clone());
        if let Some(id) = oldest {
            graphs.remove(&id);
        } else {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrumentation::noop_sink;
    use crate::symbol::ParseResult;
    use crate::types::SymbolKind;
    use std::sync::Arc as StdArc;
    use tempfile::TempDir;

    struct FakeGoParser;

    impl LanguageParser for FakeGoParser {
        fn language(&self) -> &str {
            "go"
        }
        fn file_extensions(&self) -> &[&str] {
            &["go"]
        }
        fn parse(&self, path: &Path, _contents: &str) -> Result<ParseResult, String> {
            let name = path.file_stem().unwrap().to_string_lossy().to_string();
            Ok(ParseResult {
                file_path: path.to_string_lossy().to_string(),
                language: "go".to_string(),
                symbols: vec![crate::symbol::Symbol {
                    id: format!("{}:1:{}", path.display(), name),
                    name,
                    kind: SymbolKind::Function,
                    file_path: path.to_string_lossy().to_string(),
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
                }],
                ..Default::default()
            })
        }
    }

    fn service() -> ServiceCache {
        let mut registry = ParserRegistry::new();
        registry.register(StdArc::new(FakeGoParser));
        ServiceCache::new(CacheConfig::default(), GraphConfig::default(), registry, noop_sink(), LspConfig::default())
    }

    #[tokio::test]
    async fn init_walks_parses_and_populates_index() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("main.go"), "package main").unwrap();
        std::fs::write(dir.path().join("helper.go"), "package main").unwrap();

        let svc = service();
        let response = svc.init(dir.path(), &["go".to_string()], &[]).await.unwrap();
        assert_eq!(response.files_parsed, 2);
        assert_eq!(response.symbols_extracted, 2);
        assert!(!response.is_refresh);
        assert_eq!(response.languages_seen, vec!["go".to_string()]);

        let cached = svc.get_graph(&response.graph_id).unwrap();
        assert_eq!(cached.index.stats().total_symbols, 2);
    }

    #[tokio::test]
    async fn init_twice_on_same_root_is_a_refresh() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("main.go"), "package main").unwrap();

        let svc = service();
        let first = svc.init(dir.path(), &["go".to_string()], &[]).await.unwrap();
        assert!(!first.is_refresh);
        let second = svc.init(dir.path(), &["go".to_string()], &[]).await.unwrap();
        assert!(second.is_refresh);
        assert_eq!(second.previous_id, Some(first.graph_id));
    }

    #[tokio::test]
    async fn get_graph_fails_when_not_initialized() {
        let svc = service();
        let err = svc.get_graph("deadbeefdeadbeef").unwrap_err();
        assert!(matches!(err, ServiceError::NotInitialized { .. }));
    }

    #[tokio::test]
    async fn init_rejects_relative_path() {
        let svc = service();
        let err = svc.init(Path::new("relative/path"), &[], &[]).await.unwrap_err();
        assert!(matches!(err, ServiceError::RelativePath { .. }));
    }

    #[tokio::test]
    async fn excludes_skip_matching_files() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("main.go"), "package main").unwrap();
        std::fs::create_dir(dir.path().join("vendor")).unwrap();
        std::fs::write(dir.path().join("vendor/dep.go"), "package vendor").unwrap();

        let svc = service();
        let response = svc
            .init(dir.path(), &["go".to_string()], &["vendor/**".to_string()])
            .await
            .unwrap();
        assert_eq!(response.files_parsed, 1);
    }

    #[tokio::test]
    async fn eviction_drops_oldest_graph_over_capacity() {
        let mut cache_config = CacheConfig::default();
        cache_config.max_cached_graphs = 1;
        let mut registry = ParserRegistry::new();
        registry.register(StdArc::new(FakeGoParser));
        let svc = ServiceCache::new(cache_config, GraphConfig::default(), registry, noop_sink(), LspConfig::default());

        let dir_a = TempDir::new().unwrap();
        std::fs::write(dir_a.path().join("a.go"), "package main").unwrap();
        let dir_b = TempDir::new().unwrap();
        std::fs::write(dir_b.path().join("b.go"), "package main").unwrap();

        let first = svc.init(dir_a.path(), &["go".to_string()], &[]).await.unwrap();
        svc.init(dir_b.path(), &["go".to_string()], &[]).await.unwrap();

        assert_eq!(svc.cached_graph_count(), 1);
        assert!(svc.get_graph(&first.graph_id).is_err());
    }

    #[tokio::test]
    async fn find_callers_dispatches_through_the_cache() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("main.go"), "package main").unwrap();

        let svc = service();
        let response = svc.init(dir.path(), &["go".to_string()], &[]).await.unwrap();
        let id = format!("{}:1:main", dir.path().join("main.go").display());

        let result = svc.find_callers(&response.graph_id, &id, None).unwrap();
        assert!(result.symbols.is_empty());
    }

    #[tokio::test]
    async fn find_callers_rejects_limit_over_max() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("main.go"), "package main").unwrap();

        let svc = service();
        let response = svc.init(dir.path(), &["go".to_string()], &[]).await.unwrap();
        let err = svc.find_callers(&response.graph_id, "nonexistent", Some(MAX_LIMIT + 1)).unwrap_err();
        assert!(matches!(err, ServiceError::Graph(GraphError::InvalidLimit { .. })));
    }

    #[tokio::test]
    async fn find_cycles_rejects_min_size_under_two() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("main.go"), "package main").unwrap();

        let svc = service();
        let response = svc.init(dir.path(), &["go".to_string()], &[]).await.unwrap();
        let err = svc.find_cycles(&response.graph_id, 1).unwrap_err();
        assert!(matches!(err, ServiceError::Graph(GraphError::InvalidMinSize { .. })));
    }

    #[tokio::test]
    async fn find_hotspots_and_get_symbol_dispatch() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("main.go"), "package main").unwrap();

        let svc = service();
        let response = svc.init(dir.path(), &["go".to_string()], &[]).await.unwrap();
        let id = format!("{}:1:main", dir.path().join("main.go").display());

        let hotspots = svc.find_hotspots(&response.graph_id, 10).unwrap();
        assert_eq!(hotspots.len(), 1);

        let symbol = svc.get_symbol(&response.graph_id, &id).unwrap();
        assert_eq!(symbol.unwrap().name, "main");
        assert!(svc.get_symbol(&response.graph_id, "nonexistent").unwrap().is_none());
    }

    #[tokio::test]
    async fn lsp_status_is_uninitialized_before_any_request() {
        let svc = service();
        let state = svc.lsp_status(Path::new("/tmp/proj"), "go").await;
        assert_eq!(state, ServerState::Uninitialized);
    }
}

//! Layered configuration for the code-intelligence core.
//!
//! Supports, in increasing precedence:
//! - Defaults
//! - `.aleutian/settings.toml`
//! - `CI_`-prefixed environment variables (double underscore separates
//!   nested levels, e.g. `CI_CACHE__GRAPH_TTL_SECS=0`)

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    #[serde(default)]
    pub indexing: IndexingConfig,
    #[serde(default)]
    pub graph: GraphConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub lsp: LspConfig,
    #[serde(default)]
    pub locks: LockConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct IndexingConfig {
    #[serde(default = "default_max_symbols")]
    pub max_symbols: usize,
    #[serde(default = "default_parallel_threads")]
    pub parallel_threads: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GraphConfig {
    #[serde(default = "default_max_depth_cap")]
    pub max_depth_cap: usize,
    #[serde(default = "default_node_budget")]
    pub node_budget_default: usize,
    #[serde(default = "default_memory_ceiling_bytes")]
    pub memory_ceiling_bytes: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_max_cached_graphs")]
    pub max_cached_graphs: usize,
    #[serde(default = "default_graph_ttl_secs")]
    pub graph_ttl_secs: u64,
    #[serde(default = "default_query_cache_capacity")]
    pub query_cache_capacity: usize,
    #[serde(default = "default_init_timeout_secs")]
    pub init_timeout_secs: u64,
    #[serde(default = "default_max_project_files")]
    pub max_project_files: usize,
    #[serde(default = "default_max_project_bytes")]
    pub max_project_bytes: u64,
    #[serde(default)]
    pub allowed_root_prefixes: Vec<PathBuf>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LspLanguageConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub file_extensions: Vec<String>,
    #[serde(default)]
    pub init_options: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LspConfig {
    #[serde(default)]
    pub languages: HashMap<String, LspLanguageConfig>,
    #[serde(default = "default_startup_timeout_secs")]
    pub startup_timeout_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LockConfig {
    #[serde(default = "default_lock_dir")]
    pub lock_dir: PathBuf,
    #[serde(default = "default_lock_ttl_secs")]
    pub lock_ttl_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub default: String,
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn default_max_symbols() -> usize {
    1_000_000
}
fn default_parallel_threads() -> usize {
    num_cpus::get()
}
fn default_max_depth_cap() -> usize {
    10
}
fn default_node_budget() -> usize {
    1000
}
fn default_memory_ceiling_bytes() -> u64 {
    512 * 1024 * 1024
}
fn default_max_cached_graphs() -> usize {
    16
}
fn default_graph_ttl_secs() -> u64 {
    0
}
fn default_query_cache_capacity() -> usize {
    4096
}
fn default_init_timeout_secs() -> u64 {
    30
}
fn default_max_project_files() -> usize {
    200_000
}
fn default_max_project_bytes() -> u64 {
    2 * 1024 * 1024 * 1024
}
fn default_startup_timeout_secs() -> u64 {
    30
}
fn default_request_timeout_secs() -> u64 {
    10
}
fn default_idle_timeout_secs() -> u64 {
    300
}
fn default_lock_dir() -> PathBuf {
    PathBuf::from(".aleutian/locks")
}
fn default_lock_ttl_secs() -> u64 {
    300
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            max_symbols: default_max_symbols(),
            parallel_threads: default_parallel_threads(),
        }
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            max_depth_cap: default_max_depth_cap(),
            node_budget_default: default_node_budget(),
            memory_ceiling_bytes: default_memory_ceiling_bytes(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_cached_graphs: default_max_cached_graphs(),
            graph_ttl_secs: default_graph_ttl_secs(),
            query_cache_capacity: default_query_cache_capacity(),
            init_timeout_secs: default_init_timeout_secs(),
            max_project_files: default_max_project_files(),
            max_project_bytes: default_max_project_bytes(),
            allowed_root_prefixes: Vec::new(),
        }
    }
}

impl Default for LspConfig {
    fn default() -> Self {
        Self {
            languages: HashMap::new(),
            startup_timeout_secs: default_startup_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            idle_timeout_secs: default_idle_timeout_secs(),
        }
    }
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            lock_dir: default_lock_dir(),
            lock_ttl_secs: default_lock_ttl_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            indexing: IndexingConfig::default(),
            graph: GraphConfig::default(),
            cache: CacheConfig::default(),
            lsp: LspConfig::default(),
            locks: LockConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Settings {
    /// Load configuration from defaults, `.aleutian/settings.toml` (searched
    /// from the current directory upward), then `CI_`-prefixed env vars.
    pub fn load() -> Result<Self, figment::Error> {
        let config_path =
            Self::find_workspace_config().unwrap_or_else(|| PathBuf::from(".aleutian/settings.toml"));

        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("CI_").map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
            .extract()
    }

    pub fn load_from(path: impl AsRef<std::path::Path>) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("CI_").map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
            .extract()
    }

    fn find_workspace_config() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;
        for ancestor in current.ancestors() {
            let dir = ancestor.join(".aleutian");
            if dir.is_dir() {
                return Some(dir.join("settings.toml"));
            }
        }
        None
    }

    pub fn save(&self, path: impl AsRef<std::path::Path>) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }
}

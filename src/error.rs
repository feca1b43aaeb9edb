//! Error types for the code-intelligence core.
//!
//! One `thiserror`-derived enum per subsystem, following the "structured
//! error + recovery suggestion" shape used throughout this crate, plus a
//! top-level [`CoreError`] that subsystem errors convert into at module
//! boundaries.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from the symbol index (C2).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IndexError {
    #[error("symbol is invalid: {reason}")]
    Invalid { reason: String },

    #[error("symbol id '{id}' already present in index")]
    Duplicate { id: String },

    #[error("adding {attempted} symbol(s) would exceed max_symbols ({max})")]
    CapacityExceeded { attempted: usize, max: usize },

    /// Aggregate error from `AddBatch`: one entry per offending index in the
    /// batch. The batch as a whole was rejected; the index is unchanged.
    #[error("batch rejected: {} offending item(s)", .0.len())]
    Batch(Vec<(usize, Box<IndexError>)>),
}

impl IndexError {
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::Invalid { .. } => vec!["Ensure id, name, and file_path are non-empty"],
            Self::Duplicate { .. } => vec!["Use a different id, or remove the existing symbol first"],
            Self::CapacityExceeded { .. } => vec!["Raise indexing.max_symbols, or index fewer files at once"],
            Self::Batch(_) => vec!["Inspect each offending index and fix the underlying symbol"],
        }
    }
}

/// Errors from the graph builder, queries, and analytics (C3/C4/C5).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error("node '{id}' not found in graph")]
    NodeNotFound { id: String },

    #[error("max_depth {requested} exceeds the configured cap of {cap}")]
    InvalidDepth { requested: usize, cap: usize },

    #[error("min_size {requested} must be >= 2")]
    InvalidMinSize { requested: usize },

    #[error("limit {requested} exceeds the maximum of {max}")]
    InvalidLimit { requested: usize, max: usize },

    #[error("build stopped early: {reason}")]
    BudgetExceeded { reason: String },
}

/// Errors from the service / graph cache (C7).
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("project_root '{path}' must be an absolute path")]
    RelativePath { path: PathBuf },

    #[error("project_root '{path}' contains a path-traversal ('..') segment")]
    PathTraversal { path: PathBuf },

    #[error("project_root '{path}' is not under an allowed prefix")]
    NotAllowed { path: PathBuf },

    #[error("an Init is already in progress for project_root '{path}'")]
    InitInProgress { path: PathBuf },

    #[error("project exceeds configured limits: {reason}")]
    ProjectTooLarge { reason: String },

    #[error("graph '{graph_id}' has not been initialized")]
    NotInitialized { graph_id: String },

    #[error("graph '{graph_id}' has expired")]
    Expired { graph_id: String },

    #[error("init for '{path}' timed out after {timeout_secs}s")]
    InitTimedOut { path: PathBuf, timeout_secs: u64 },

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Lsp(#[from] LspError),
}

/// Errors from the LSP broker (C8).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LspError {
    #[error("no language server configured or installed for '{language}'")]
    NotInstalled { language: String },

    #[error("'initialize' handshake failed for '{language}': {reason}")]
    InitializeFailed { language: String, reason: String },

    #[error("request '{method}' timed out after {timeout_secs}s")]
    RequestTimeout { method: String, timeout_secs: u64 },

    #[error("server for '{language}' crashed: {reason}")]
    ServerCrashed { language: String, reason: String },

    #[error("invalid response from server for '{language}': {reason}")]
    InvalidResponse { language: String, reason: String },

    #[error("server for '{language}' is not in 'ready' state (current: {state})")]
    NotRunning { language: String, state: String },

    #[error("server for '{language}' is already started")]
    AlreadyStarted { language: String },

    #[error("broker is closed, refusing to spawn '{language}'")]
    BrokerClosed { language: String },
}

impl LspError {
    /// Transient failures that the idempotent-operation retry policy (C8) covers.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ServerCrashed { .. } | Self::InvalidResponse { .. })
    }
}

/// Errors from the file-lock manager (C9).
#[derive(Error, Debug)]
pub enum LockError {
    #[error("'{path}' is locked by pid {holder_pid} ({reason})")]
    FileLocked {
        path: PathBuf,
        holder_pid: u32,
        reason: String,
    },

    #[error("'{path}' is not held by this manager")]
    LockNotHeld { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

/// Top-level error uniting every subsystem, for callers that cross module
/// boundaries (e.g. the CLI smoke harness).
#[derive(Error, Debug)]
pub enum CoreError {
    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Lsp(#[from] LspError),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error("operation cancelled")]
    Cancelled,
}

impl CoreError {
    /// Per-item errors, if this is a batch-style aggregate.
    pub fn offending(&self) -> Option<&[(usize, Box<IndexError>)]> {
        match self {
            CoreError::Index(IndexError::Batch(items)) => Some(items),
            _ => None,
        }
    }
}

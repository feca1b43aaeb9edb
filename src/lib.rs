pub mod config;
pub mod error;
pub mod graph;
pub mod index;
pub mod instrumentation;
pub mod lock;
pub mod logging;
pub mod lsp;
pub mod service;
pub mod symbol;
pub mod types;

pub use config::Settings;
pub use error::CoreError;
pub use graph::Graph;
pub use index::SymbolIndex;
pub use lock::FileLockManager;
pub use lsp::LspBroker;
pub use service::ServiceCache;
pub use symbol::Symbol;
pub use types::{EdgeKind, Location, SymbolKind};

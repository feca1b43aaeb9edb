//! Primitive identifiers and value types shared across the core.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Kind of a symbol, as reported by a language parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Function,
    Method,
    Type,
    Struct,
    Interface,
    Variable,
    Constant,
    Enum,
    Class,
    External,
}

impl SymbolKind {
    pub fn is_callable(&self) -> bool {
        matches!(self, SymbolKind::Function | SymbolKind::Method)
    }
}

/// Directed, typed relation between two nodes in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Contains,
    Calls,
    Imports,
    Implements,
    References,
}

/// A source location, 1-indexed line / 0-indexed column at the core boundary.
/// LSP's wire format is 0-indexed on both axes and addresses files by
/// `file://` URI rather than a bare path; `lsp::protocol::location_to_lsp`/
/// `lsp_to_location` convert at that boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub file_path: String,
    pub line: u32,
    pub col: u32,
}

/// Monotonic milliseconds since an arbitrary epoch, used for `parsed_at` and
/// cache bookkeeping. Never derived from wall-clock time inside library code;
/// callers stamp it at the boundary.
pub type Millis = u64;

/// Project identifier: first 16 hex chars of sha256(project_root).
pub fn graph_id_for_root(project_root: &std::path::Path) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(project_root.to_string_lossy().as_bytes());
    let digest = hasher.finalize();
    digest.iter().take(8).map(|b| format!("{b:02x}")).collect()
}

/// Absolute-path validation shared by the service cache (C7) and the
/// file-lock manager (C9): reject relative paths and `..` traversal.
pub fn validate_absolute_no_traversal(path: &std::path::Path) -> Result<(), PathValidationError> {
    if !path.is_absolute() {
        return Err(PathValidationError::Relative);
    }
    if path.components().any(|c| matches!(c, std::path::Component::ParentDir)) {
        return Err(PathValidationError::Traversal);
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathValidationError {
    Relative,
    Traversal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graph_id_is_stable_and_16_hex_chars() {
        let root = std::path::Path::new("/tmp/project");
        let a = graph_id_for_root(root);
        let b = graph_id_for_root(root);
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn rejects_relative_path() {
        let p = std::path::Path::new("relative/path");
        assert_eq!(
            validate_absolute_no_traversal(p),
            Err(PathValidationError::Relative)
        );
    }

    #[test]
    fn rejects_traversal() {
        let p = std::path::Path::new("/tmp/project/../etc");
        assert_eq!(
            validate_absolute_no_traversal(p),
            Err(PathValidationError::Traversal)
        );
    }

    #[test]
    fn accepts_clean_absolute_path() {
        let p = std::path::Path::new("/tmp/project/src/main.rs");
        assert!(validate_absolute_no_traversal(p).is_ok());
    }
}

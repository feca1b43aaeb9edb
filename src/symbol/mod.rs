//! Parse-result contract (C1) and the [`Symbol`] value type (§3).

use crate::types::SymbolKind;
use serde::{Deserialize, Serialize};

/// A named, located entity in source: the atom of the symbol index and the
/// graph. Immutable once constructed — readers get defensive copies of
/// collection results, never a mutable reference into the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symbol {
    pub id: String,
    pub name: String,
    pub kind: SymbolKind,
    pub file_path: String,
    pub start_line: u32,
    pub end_line: u32,
    pub start_col: u32,
    pub end_col: u32,
    pub package: String,
    pub signature: String,
    pub exported: bool,
    pub language: String,
    pub parsed_at: u64,
    pub children: Vec<Symbol>,
}

impl Symbol {
    /// A placeholder node standing in for an unresolved external reference
    /// (spec.md §3: `file_path == ""`, `kind == external`).
    pub fn placeholder(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: SymbolKind::External,
            file_path: String::new(),
            start_line: 0,
            end_line: 0,
            start_col: 0,
            end_col: 0,
            package: String::new(),
            signature: String::new(),
            exported: false,
            language: String::new(),
            parsed_at: 0,
            children: Vec::new(),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.file_path.is_empty() && self.kind == SymbolKind::External
    }

    /// Flatten this symbol and all descendants into a single owned vector,
    /// depth-first, parents before children.
    pub fn flatten(&self) -> Vec<Symbol> {
        let mut out = vec![self.without_children()];
        for child in &self.children {
            out.extend(child.flatten());
        }
        out
    }

    fn without_children(&self) -> Symbol {
        Symbol {
            children: Vec::new(),
            ..self.clone()
        }
    }
}

/// A raw, unresolved call site as reported by a parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallSite {
    pub from_id: String,
    pub callee_name: String,
    pub callee_package: Option<String>,
    pub line: u32,
    pub col: u32,
}

/// A declared import, prior to resolution against the package registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportDecl {
    pub from_id: String,
    pub imported_package: String,
}

/// A hint that a concrete type implements an interface, as reported by the
/// parser (used to seed the implements pass when the parser already knows
/// the relation, instead of inferring it from method-set comparison).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImplementsHint {
    pub type_id: String,
    pub interface_name: String,
}

/// A raw identifier reference, for the references pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceSite {
    pub from_id: String,
    pub target_name: String,
    pub line: u32,
    pub col: u32,
}

/// Per-file output of a language parser (C1). The graph builder (C3)
/// consumes a sequence of these; the core depends only on this shape, never
/// on a parser implementation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParseResult {
    pub file_path: String,
    pub language: String,
    pub symbols: Vec<Symbol>,
    pub imports: Vec<ImportDecl>,
    pub call_sites: Vec<CallSite>,
    pub implements_hints: Vec<ImplementsHint>,
    pub references: Vec<ReferenceSite>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(id: &str, kind: SymbolKind) -> Symbol {
        Symbol {
            id: id.to_string(),
            name: id.to_string(),
            kind,
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

    #[test]
    fn placeholder_has_empty_file_path_and_external_kind() {
        let p = Symbol::placeholder("ext:foo", "foo");
        assert!(p.is_placeholder());
        assert_eq!(p.file_path, "");
        assert_eq!(p.kind, SymbolKind::External);
    }

    #[test]
    fn flatten_is_depth_first_parent_before_children() {
        let mut parent = sym("p", SymbolKind::Type);
        parent.children.push(sym("c1", SymbolKind::Method));
        parent.children.push(sym("c2", SymbolKind::Method));

        let flat = parent.flatten();
        assert_eq!(flat.len(), 3);
        assert_eq!(flat[0].id, "p");
        assert_eq!(flat[1].id, "c1");
        assert_eq!(flat[2].id, "c2");
        assert!(flat.iter().all(|s| s.children.is_empty()));
    }
}

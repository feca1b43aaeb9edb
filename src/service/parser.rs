//! Parser contract (consumed, spec.md §6): the core depends only on this
//! trait boundary, never on a concrete language parser implementation.

use crate::symbol::ParseResult;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// A language parser, registered by the file extensions it claims.
pub trait LanguageParser: Send + Sync {
    fn language(&self) -> &str;
    fn file_extensions(&self) -> &[&str];
    fn parse(&self, path: &Path, contents: &str) -> Result<ParseResult, String>;
}

/// Maps file extensions to the parser that handles them.
#[derive(Default, Clone)]
pub struct ParserRegistry {
    by_extension: HashMap<String, Arc<dyn LanguageParser>>,
}

impl ParserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, parser: Arc<dyn LanguageParser>) {
        for ext in parser.file_extensions() {
            self.by_extension.insert(ext.to_string(), parser.clone());
        }
    }

    pub fn language_for_extension(&self, ext: &str) -> Option<&str> {
        self.by_extension.get(ext).map(|p| p.language())
    }

    pub fn supports_extension(&self, ext: &str) -> bool {
        self.by_extension.contains_key(ext)
    }

    pub fn parse_file(&self, path: &Path, language: &str) -> Result<ParseResult, String> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let parser = self
            .by_extension
            .get(ext)
            .filter(|p| p.language() == language)
            .ok_or_else(|| format!("no parser registered for language '{language}'"))?;
        let contents = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
        parser.parse(path, &contents)
    }
}

//! Symbol Index (C2): a concurrent, multi-axis in-memory index over symbols.
//!
//! Four maps — `by_id`, `by_name`, `by_file`, `by_kind` — are kept
//! synchronized behind a single reader-writer lock, per spec.md §4.1's
//! coherence requirement. Counters live inside the same guarded state so
//! they can never drift from the maps they describe.

mod search;

pub use search::SearchMatch;

use crate::error::IndexError;
use crate::symbol::Symbol;
use crate::types::SymbolKind;
use parking_lot::RwLock;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default, Clone)]
struct IndexState {
    by_id: HashMap<String, Symbol>,
    by_name: HashMap<String, Vec<String>>,
    by_file: HashMap<String, Vec<String>>,
    by_kind: HashMap<SymbolKind, Vec<String>>,
    insertion_order: Vec<String>,
}

impl IndexState {
    fn insert_unchecked(&mut self, symbol: Symbol) {
        let id = symbol.id.clone();
        self.by_name.entry(symbol.name.clone()).or_default().push(id.clone());
        self.by_file.entry(symbol.file_path.clone()).or_default().push(id.clone());
        self.by_kind.entry(symbol.kind).or_default().push(id.clone());
        self.insertion_order.push(id.clone());
        self.by_id.insert(id, symbol);
    }

    fn remove_id(&mut self, id: &str) {
        if let Some(symbol) = self.by_id.remove(id) {
            if let Some(v) = self.by_name.get_mut(&symbol.name) {
                v.retain(|x| x != id);
                if v.is_empty() {
                    self.by_name.remove(&symbol.name);
                }
            }
            if let Some(v) = self.by_file.get_mut(&symbol.file_path) {
                v.retain(|x| x != id);
                if v.is_empty() {
                    self.by_file.remove(&symbol.file_path);
                }
            }
            if let Some(v) = self.by_kind.get_mut(&symbol.kind) {
                v.retain(|x| x != id);
                if v.is_empty() {
                    self.by_kind.remove(&symbol.kind);
                }
            }
            self.insertion_order.retain(|x| x != id);
        }
    }
}

/// Aggregate, queryable statistics over the index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub total_symbols: usize,
    pub by_kind: HashMap<SymbolKind, usize>,
    pub by_file: HashMap<String, usize>,
}

/// A concurrent multi-axis symbol index (C2).
#[derive(Debug)]
pub struct SymbolIndex {
    state: RwLock<IndexState>,
    max_symbols: usize,
}

fn validate(symbol: &Symbol) -> Result<(), IndexError> {
    if symbol.id.is_empty() || symbol.name.is_empty() || symbol.file_path.is_empty() && !symbol.is_placeholder()
    {
        return Err(IndexError::Invalid {
            reason: "id, name, and file_path must be non-empty (unless the symbol is a placeholder)"
                .to_string(),
        });
    }
    Ok(())
}

impl SymbolIndex {
    pub fn new(max_symbols: usize) -> Self {
        Self {
            state: RwLock::new(IndexState::default()),
            max_symbols,
        }
    }

    /// Insert a single symbol. Fails fast without mutating state on any
    /// validation error.
    #[tracing::instrument(skip(self, symbol), fields(id = %symbol.id))]
    pub fn add(&self, symbol: Symbol) -> Result<(), IndexError> {
        validate(&symbol)?;
        let mut state = self.state.write();
        if state.by_id.contains_key(&symbol.id) {
            return Err(IndexError::Duplicate { id: symbol.id });
        }
        if state.by_id.len() + 1 > self.max_symbols {
            return Err(IndexError::CapacityExceeded {
                attempted: 1,
                max: self.max_symbols,
            });
        }
        state.insert_unchecked(symbol);
        Ok(())
    }

    /// Insert a batch of symbols atomically: either every symbol is
    /// inserted, or none are, and on rejection every offending index is
    /// reported (spec.md §4.1, §8 "Batch atomicity").
    #[tracing::instrument(skip(self, symbols), fields(batch_size = symbols.len()))]
    pub fn add_batch(&self, symbols: Vec<Symbol>) -> Result<(), IndexError> {
        let mut state = self.state.write();
        let mut offending = Vec::new();
        let mut seen_in_batch: HashMap<&str, usize> = HashMap::new();

        for (idx, symbol) in symbols.iter().enumerate() {
            if let Err(e) = validate(symbol) {
                offending.push((idx, Box::new(e)));
                continue;
            }
            if state.by_id.contains_key(&symbol.id) {
                offending.push((idx, Box::new(IndexError::Duplicate { id: symbol.id.clone() })));
                continue;
            }
            if let Some(&first_idx) = seen_in_batch.get(symbol.id.as_str()) {
                offending.push((
                    idx,
                    Box::new(IndexError::Duplicate {
                        id: format!("{} (collides with batch index {})", symbol.id, first_idx),
                    }),
                ));
                continue;
            }
            seen_in_batch.insert(symbol.id.as_str(), idx);
        }

        if state.by_id.len() + symbols.len() > self.max_symbols {
            offending.push((
                symbols.len().saturating_sub(1),
                Box::new(IndexError::CapacityExceeded {
                    attempted: symbols.len(),
                    max: self.max_symbols,
                }),
            ));
        }

        if !offending.is_empty() {
            crate::log_event!("index", "batch rejected", "{} offending item(s)", offending.len());
            return Err(IndexError::Batch(offending));
        }

        crate::debug_event!("index", "batch inserted", "{} symbol(s)", symbols.len());
        for symbol in symbols {
            state.insert_unchecked(symbol);
        }
        Ok(())
    }

    pub fn get_by_id(&self, id: &str) -> Option<Symbol> {
        self.state.read().by_id.get(id).cloned()
    }

    pub fn get_by_name(&self, name: &str) -> Vec<Symbol> {
        let state = self.state.read();
        state
            .by_name
            .get(name)
            .map(|ids| ids.iter().filter_map(|id| state.by_id.get(id).cloned()).collect())
            .unwrap_or_default()
    }

    pub fn get_by_file(&self, path: &str) -> Vec<Symbol> {
        let state = self.state.read();
        state
            .by_file
            .get(path)
            .map(|ids| ids.iter().filter_map(|id| state.by_id.get(id).cloned()).collect())
            .unwrap_or_default()
    }

    pub fn get_by_kind(&self, kind: SymbolKind) -> Vec<Symbol> {
        let state = self.state.read();
        state
            .by_kind
            .get(&kind)
            .map(|ids| ids.iter().filter_map(|id| state.by_id.get(id).cloned()).collect())
            .unwrap_or_default()
    }

    /// Case-insensitive ranked search: exact > prefix > substring > fuzzy
    /// (Levenshtein distance <= 2), tie-broken by insertion order. Honors
    /// cancellation between symbols scanned.
    #[tracing::instrument(skip(self, cancel))]
    pub fn search(&self, query: &str, limit: usize, cancel: &CancellationToken) -> Vec<Symbol> {
        let state = self.state.read();
        let candidates: Vec<(&String, &Symbol)> = state
            .insertion_order
            .iter()
            .filter_map(|id| state.by_id.get(id).map(|s| (id, s)))
            .collect();

        search::ranked_search(query, limit, candidates, cancel)
    }

    #[tracing::instrument(skip(self))]
    pub fn remove_by_file(&self, path: &str) -> usize {
        let mut state = self.state.write();
        let ids = state.by_file.get(path).cloned().unwrap_or_default();
        let removed = ids.len();
        for id in ids {
            state.remove_id(&id);
        }
        removed
    }

    pub fn clear(&self) {
        *self.state.write() = IndexState::default();
    }

    pub fn stats(&self) -> IndexStats {
        let state = self.state.read();
        IndexStats {
            total_symbols: state.by_id.len(),
            by_kind: state.by_kind.iter().map(|(k, v)| (*k, v.len())).collect(),
            by_file: state.by_file.iter().map(|(k, v)| (k.clone(), v.len())).collect(),
        }
    }

    /// Deep snapshot of the index structure (not of symbols, which are
    /// already immutable value types): mutations to one side never affect
    /// the other.
    pub fn clone_snapshot(&self) -> SymbolIndex {
        SymbolIndex {
            state: RwLock::new(self.state.read().clone()),
            max_symbols: self.max_symbols,
        }
    }
}

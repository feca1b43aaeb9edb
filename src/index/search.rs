//! Ranked fuzzy search backing [`super::SymbolIndex::search`].

use crate::symbol::Symbol;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Tier {
    Exact,
    Prefix,
    Substring,
    Fuzzy(u8),
}

#[derive(Debug, Clone)]
pub struct SearchMatch {
    pub symbol: Symbol,
    pub tier: &'static str,
}

/// Rank `candidates` against `query`, returning at most `limit` symbols in
/// exact > prefix > substring > fuzzy (Levenshtein <= 2) order, tie-broken
/// by insertion order (the order `candidates` is already in).
pub(super) fn ranked_search(
    query: &str,
    limit: usize,
    candidates: Vec<(&String, &Symbol)>,
    cancel: &CancellationToken,
) -> Vec<Symbol> {
    let query_lower = query.to_lowercase();
    let mut scored: Vec<(Tier, usize, Symbol)> = Vec::new();

    for (rank, (_, symbol)) in candidates.into_iter().enumerate() {
        if cancel.is_cancelled() {
            return Vec::new();
        }
        let name_lower = symbol.name.to_lowercase();
        let tier = if name_lower == query_lower {
            Some(Tier::Exact)
        } else if name_lower.starts_with(&query_lower) {
            Some(Tier::Prefix)
        } else if name_lower.contains(&query_lower) {
            Some(Tier::Substring)
        } else {
            let dist = levenshtein(&name_lower, &query_lower);
            if dist <= 2 {
                Some(Tier::Fuzzy(dist as u8))
            } else {
                None
            }
        };

        if let Some(tier) = tier {
            scored.push((tier, rank, symbol.clone()));
        }
    }

    scored.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));
    scored.into_iter().take(limit).map(|(_, _, s)| s).collect()
}

/// Classic O(n*m) edit-distance, iterative with a rolling two-row buffer.
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for i in 1..=a.len() {
        curr[0] = i;
        for j in 1..=b.len() {
            let cost = if a[i - 1] == b[j - 1] { 0 } else { 1 };
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levenshtein_identical_strings_is_zero() {
        assert_eq!(levenshtein("helper", "helper"), 0);
    }

    #[test]
    fn levenshtein_one_substitution() {
        assert_eq!(levenshtein("helper", "helpar"), 1);
    }

    #[test]
    fn levenshtein_insertion_and_deletion() {
        assert_eq!(levenshtein("helper", "helpers"), 1);
        assert_eq!(levenshtein("helper", "help"), 2);
    }
}

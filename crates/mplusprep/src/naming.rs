//! Mplus variable name validation and sanitizing.
//!
//! Mplus accepts names that start with a letter, continue with letters,
//! digits or underscores, and are at most eight characters long.

use std::collections::HashSet;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Longest name Mplus accepts.
pub const MAX_NAME_LEN: usize = 8;

/// Prefix of the positional placeholder used when nothing usable is left of a name.
pub const PLACEHOLDER_PREFIX: &str = "v";

static SYMBOL_GRAMMAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").expect("symbol grammar regex is valid"));

/// Whether `name` is a legal Mplus variable name.
pub fn is_legal(name: &str) -> bool {
    name.chars().count() <= MAX_NAME_LEN && SYMBOL_GRAMMAR.is_match(name)
}

/// Names that Mplus would reject, in column order.
pub fn find_illegal<S: AsRef<str>>(columns: &[S]) -> Vec<String> {
    columns
        .iter()
        .map(AsRef::as_ref)
        .filter(|name| !is_legal(name))
        .map(str::to_string)
        .collect()
}

/// Ordered, injective mapping from original column names to Mplus names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RenameMap(IndexMap<String, String>);

impl RenameMap {
    /// Generated name for `original`.
    pub fn get(&self, original: &str) -> Option<&str> {
        self.0.get(original).map(String::as_str)
    }

    /// All pairs, in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Pairs whose generated name differs from the original.
    pub fn changed(&self) -> impl Iterator<Item = (&str, &str)> {
        self.iter().filter(|(original, generated)| original != generated)
    }

    /// Generated names, in column order.
    pub fn generated(&self) -> impl Iterator<Item = &str> {
        self.0.values().map(String::as_str)
    }

    /// Number of mapped columns.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Build a rename map covering every column.
///
/// Characters outside `[A-Za-z0-9_]` are dropped; a name left empty or not
/// starting with a letter becomes `v<position>`; the result is cut to eight
/// characters and perturbed with digits until it is unused.
pub fn sanitize<S: AsRef<str>>(columns: &[S]) -> RenameMap {
    let mut allocator = NameAllocator::new();
    let map = columns
        .iter()
        .map(|c| {
            let original = c.as_ref();
            (original.to_string(), allocator.allocate(original))
        })
        .collect();
    RenameMap(map)
}

/// Per-call sanitizing state: the 1-based column counter and names handed out so far.
///
/// Mplus ignores case in variable names, so `used` holds lowercased keys.
struct NameAllocator {
    counter: usize,
    used: HashSet<String>,
}

impl NameAllocator {
    fn new() -> Self {
        Self {
            counter: 1,
            used: HashSet::new(),
        }
    }

    fn allocate(&mut self, original: &str) -> String {
        let stripped: String = original
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
            .collect();

        let base = if stripped.starts_with(|c: char| c.is_ascii_alphabetic()) {
            stripped
        } else {
            format!("{PLACEHOLDER_PREFIX}{}", self.counter)
        };

        let mut name = truncate(&base, MAX_NAME_LEN).to_string();
        if self.is_used(&name) {
            name = self.perturb(&name);
        }

        self.used.insert(name.to_ascii_lowercase());
        self.counter += 1;
        name
    }

    fn is_used(&self, name: &str) -> bool {
        self.used.contains(&name.to_ascii_lowercase())
    }

    /// First unused variant of `name`: the counter's last digit in the final
    /// position, then numeric suffixes 1, 2, ... A free variant exists among
    /// the first `used.len() + 1` suffixes.
    fn perturb(&self, name: &str) -> String {
        let first = format!("{}{}", truncate(name, MAX_NAME_LEN - 1), self.counter % 10);
        if !self.is_used(&first) {
            return first;
        }

        let mut k: usize = 1;
        loop {
            let suffix = k.to_string();
            let keep = MAX_NAME_LEN.saturating_sub(suffix.len()).max(1);
            let candidate = format!("{}{suffix}", truncate(name, keep));
            if !self.is_used(&candidate) {
                return candidate;
            }
            k += 1;
        }
    }
}

/// First `max` characters of an ASCII name.
fn truncate(name: &str, max: usize) -> &str {
    match name.char_indices().nth(max) {
        Some((idx, _)) => &name[..idx],
        None => name,
    }
}

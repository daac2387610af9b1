use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Statistics about an indexing run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    /// Number of files indexed
    pub files: usize,

    /// Number of snippets stored
    pub snippets: usize,

    /// Number of dependency edges produced
    pub edges: usize,

    /// Total lines of indexed source
    pub total_lines: usize,

    /// Time taken in milliseconds
    pub time_ms: u64,

    /// Files per language
    pub languages: HashMap<String, usize>,

    /// Per-file failures, as `<path>: <reason>`
    pub errors: Vec<String>,
}

impl IndexStats {
    pub fn new() -> Self {
        Self {
            files: 0,
            snippets: 0,
            edges: 0,
            total_lines: 0,
            time_ms: 0,
            languages: HashMap::new(),
            errors: Vec::new(),
        }
    }

    pub fn add_file(&mut self, language: &str, lines: usize) {
        self.files += 1;
        self.total_lines += lines;
        *self.languages.entry(language.to_string()).or_insert(0) += 1;
    }

    pub fn add_snippets(&mut self, snippets: usize, edges: usize) {
        self.snippets += snippets;
        self.edges += edges;
    }

    pub fn add_error(&mut self, error: String) {
        self.errors.push(error);
    }
}

impl Default for IndexStats {
    fn default() -> Self {
        Self::new()
    }
}

use crate::error::Result;
use snipgraph_chunker::{DependencyEdge, Snippet};

/// Persistence boundary for snippets and dependency edges.
///
/// Implementations are shared across indexing threads, so every method takes
/// `&self` and synchronizes internally. Edge queries return references in
/// insertion order.
pub trait GraphStore: Send + Sync {
    /// Insert or overwrite a snippet by id; existing edges are kept
    fn upsert_snippet(&self, snippet: &Snippet) -> Result<()>;

    /// Insert an edge; re-inserting an existing pair is a no-op.
    ///
    /// Fails with `StoreError::UnknownSnippet` if `snippet_id` is not stored.
    fn upsert_edge(&self, edge: &DependencyEdge) -> Result<()>;

    /// Atomically swap everything stored under `source` for `snippets` and `edges`.
    ///
    /// Readers observe either the old or the new set, never a mixture. Edges
    /// whose `snippet_id` is not among the stored snippets are skipped.
    fn replace_file(&self, source: &str, snippets: &[Snippet], edges: &[DependencyEdge])
        -> Result<()>;

    /// Remove all snippets whose source starts with `prefix`, plus their edges.
    ///
    /// Returns the number of snippets removed.
    fn delete_by_source_prefix(&self, prefix: &str) -> Result<usize>;

    fn get_snippet(&self, id: &str) -> Result<Option<Snippet>>;

    /// Snippets whose source starts with `prefix`, by source then start line
    fn get_snippets_by_source(&self, prefix: &str) -> Result<Vec<Snippet>>;

    /// Outgoing references of `id` (possibly dangling)
    fn get_direct_dependencies(&self, id: &str) -> Result<Vec<String>>;

    /// Ids of snippets that reference `id`
    fn get_direct_dependents(&self, id: &str) -> Result<Vec<String>>;

    /// All edges leaving any of `ids`
    fn get_dependencies_for(&self, ids: &[String]) -> Result<Vec<DependencyEdge>>;

    /// Ids of snippets under a source prefix, sorted
    fn list_snippet_ids(&self, source_prefix: &str) -> Result<Vec<String>>;

    fn snippet_count(&self) -> Result<usize>;

    fn edge_count(&self) -> Result<usize>;

    /// Drop edges whose `snippet_id` has no stored snippet, returning how many
    fn sweep_orphan_edges(&self) -> Result<usize>;
}

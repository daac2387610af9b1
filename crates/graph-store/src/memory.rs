use crate::error::{Result, StoreError};
use crate::store::GraphStore;
use snipgraph_chunker::{DependencyEdge, Snippet};
use std::collections::{BTreeMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
struct Tables {
    snippets: BTreeMap<String, Snippet>,
    /// Insertion-ordered edges; `edge_set` mirrors it for idempotent inserts
    edges: Vec<DependencyEdge>,
    edge_set: HashSet<DependencyEdge>,
}

impl Tables {
    fn insert_edge(&mut self, edge: &DependencyEdge) {
        if self.edge_set.insert(edge.clone()) {
            self.edges.push(edge.clone());
        }
    }

    fn retain_edges(&mut self, keep: impl Fn(&DependencyEdge) -> bool) -> usize {
        let before = self.edges.len();
        let edge_set = &mut self.edge_set;
        self.edges.retain(|edge| {
            let kept = keep(edge);
            if !kept {
                edge_set.remove(edge);
            }
            kept
        });
        before - self.edges.len()
    }

    fn delete_prefix(&mut self, prefix: &str) -> usize {
        let doomed: HashSet<String> = self
            .snippets
            .values()
            .filter(|snippet| snippet.source.starts_with(prefix))
            .map(|snippet| snippet.id.clone())
            .collect();

        self.snippets.retain(|id, _| !doomed.contains(id));
        self.retain_edges(|edge| !doomed.contains(&edge.snippet_id));
        doomed.len()
    }
}

/// In-process graph store with the same contract as the SQLite one.
///
/// Nothing is persisted; handy for tests and one-shot runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>> {
        self.tables.read().map_err(|_| StoreError::LockPoisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>> {
        self.tables.write().map_err(|_| StoreError::LockPoisoned)
    }
}

impl GraphStore for MemoryStore {
    fn upsert_snippet(&self, snippet: &Snippet) -> Result<()> {
        self.write()?
            .snippets
            .insert(snippet.id.clone(), snippet.clone());
        Ok(())
    }

    fn upsert_edge(&self, edge: &DependencyEdge) -> Result<()> {
        let mut tables = self.write()?;
        if !tables.snippets.contains_key(&edge.snippet_id) {
            return Err(StoreError::UnknownSnippet(edge.snippet_id.clone()));
        }
        tables.insert_edge(edge);
        Ok(())
    }

    fn replace_file(
        &self,
        source: &str,
        snippets: &[Snippet],
        edges: &[DependencyEdge],
    ) -> Result<()> {
        let mut tables = self.write()?;
        tables.delete_prefix(source);
        for snippet in snippets {
            tables.snippets.insert(snippet.id.clone(), snippet.clone());
        }
        for edge in edges {
            if tables.snippets.contains_key(&edge.snippet_id) {
                tables.insert_edge(edge);
            } else {
                log::debug!("Skipping edge from unknown snippet {}", edge.snippet_id);
            }
        }
        Ok(())
    }

    fn delete_by_source_prefix(&self, prefix: &str) -> Result<usize> {
        Ok(self.write()?.delete_prefix(prefix))
    }

    fn get_snippet(&self, id: &str) -> Result<Option<Snippet>> {
        Ok(self.read()?.snippets.get(id).cloned())
    }

    fn get_snippets_by_source(&self, prefix: &str) -> Result<Vec<Snippet>> {
        let mut found: Vec<Snippet> = self
            .read()?
            .snippets
            .values()
            .filter(|snippet| snippet.source.starts_with(prefix))
            .cloned()
            .collect();
        found.sort_by(|a, b| {
            (&a.source, a.start_line, &a.id).cmp(&(&b.source, b.start_line, &b.id))
        });
        Ok(found)
    }

    fn get_direct_dependencies(&self, id: &str) -> Result<Vec<String>> {
        Ok(self
            .read()?
            .edges
            .iter()
            .filter(|edge| edge.snippet_id == id)
            .map(|edge| edge.dependency_reference.clone())
            .collect())
    }

    fn get_direct_dependents(&self, id: &str) -> Result<Vec<String>> {
        Ok(self
            .read()?
            .edges
            .iter()
            .filter(|edge| edge.dependency_reference == id)
            .map(|edge| edge.snippet_id.clone())
            .collect())
    }

    fn get_dependencies_for(&self, ids: &[String]) -> Result<Vec<DependencyEdge>> {
        let tables = self.read()?;
        let edges = ids
            .iter()
            .flat_map(|id| tables.edges.iter().filter(move |edge| &edge.snippet_id == id))
            .cloned()
            .collect();
        Ok(edges)
    }

    fn list_snippet_ids(&self, source_prefix: &str) -> Result<Vec<String>> {
        // BTreeMap keys are already sorted
        Ok(self
            .read()?
            .snippets
            .values()
            .filter(|snippet| snippet.source.starts_with(source_prefix))
            .map(|snippet| snippet.id.clone())
            .collect())
    }

    fn snippet_count(&self) -> Result<usize> {
        Ok(self.read()?.snippets.len())
    }

    fn edge_count(&self) -> Result<usize> {
        Ok(self.read()?.edges.len())
    }

    fn sweep_orphan_edges(&self) -> Result<usize> {
        let mut tables = self.write()?;
        let live: HashSet<String> = tables.snippets.keys().cloned().collect();
        Ok(tables.retain_edges(|edge| live.contains(&edge.snippet_id)))
    }
}

use crate::error::Result;
use crate::ordering::presentation_order;
use serde::{Deserialize, Serialize};
use snipgraph_chunker::Snippet;
use snipgraph_store::GraphStore;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

/// Which edges the traversal follows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// What the seeds reference
    #[default]
    Dependencies,

    /// What references the seeds
    Dependents,
}

/// Measures snippet content against a context budget
pub trait Sizer: Send + Sync {
    fn size(&self, content: &str) -> usize;
}

/// Character count
#[derive(Debug, Default, Clone, Copy)]
pub struct CharSizer;

impl Sizer for CharSizer {
    fn size(&self, content: &str) -> usize {
        content.chars().count()
    }
}

/// Rough token estimate: one token per four bytes, at least one
#[derive(Debug, Default, Clone, Copy)]
pub struct TokenEstimateSizer;

impl Sizer for TokenEstimateSizer {
    fn size(&self, content: &str) -> usize {
        (content.len() / 4).max(1)
    }
}

/// Configurable choice of sizer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sizing {
    #[default]
    Chars,
    Tokens,
}

impl Sizing {
    #[must_use]
    pub fn sizer(self) -> &'static dyn Sizer {
        match self {
            Self::Chars => &CharSizer,
            Self::Tokens => &TokenEstimateSizer,
        }
    }
}

/// Budget-bounded breadth-first gathering of related snippets
pub struct ContextAssembler {
    store: Arc<dyn GraphStore>,
    sizer: &'static dyn Sizer,
}

impl ContextAssembler {
    /// Assembler measuring content in characters
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self {
            store,
            sizer: &CharSizer,
        }
    }

    #[must_use]
    pub fn with_sizing(mut self, sizing: Sizing) -> Self {
        self.sizer = sizing.sizer();
        self
    }

    /// Transitive neighbors of `seeds` in discovery (FIFO) order.
    ///
    /// Seeds are expanded but never returned. Ids without a stored snippet
    /// are skipped and not expanded. Collection stops at the first snippet
    /// that would bring the total size to `budget` or beyond; pass
    /// `usize::MAX` for no limit.
    pub fn assemble(
        &self,
        seeds: &[String],
        direction: Direction,
        budget: usize,
    ) -> Result<Vec<Snippet>> {
        let mut visited: HashSet<String> = seeds.iter().cloned().collect();
        let mut queue = VecDeque::new();

        for seed in seeds {
            self.enqueue_neighbors(seed, direction, &mut visited, &mut queue)?;
        }

        let mut result = Vec::new();
        let mut consumed = 0usize;

        while let Some(id) = queue.pop_front() {
            let Some(snippet) = self.store.get_snippet(&id)? else {
                log::debug!("Skipping dangling reference {id}");
                continue;
            };

            let total = consumed.saturating_add(self.sizer.size(&snippet.content));
            if total >= budget {
                log::debug!(
                    "Budget {budget} reached after {} snippets ({consumed} used)",
                    result.len()
                );
                break;
            }
            consumed = total;

            self.enqueue_neighbors(&id, direction, &mut visited, &mut queue)?;
            result.push(snippet);
        }

        Ok(result)
    }

    /// `assemble` followed by presentation ordering
    pub fn assemble_ordered(
        &self,
        seeds: &[String],
        direction: Direction,
        budget: usize,
    ) -> Result<Vec<Snippet>> {
        let snippets = self.assemble(seeds, direction, budget)?;
        self.order(snippets)
    }

    /// Sort snippets for display using the stored edges between them
    pub fn order(&self, snippets: Vec<Snippet>) -> Result<Vec<Snippet>> {
        let ids: Vec<String> = snippets.iter().map(|s| s.id.clone()).collect();
        let edges = self.store.get_dependencies_for(&ids)?;
        Ok(presentation_order(snippets, &edges))
    }

    fn enqueue_neighbors(
        &self,
        id: &str,
        direction: Direction,
        visited: &mut HashSet<String>,
        queue: &mut VecDeque<String>,
    ) -> Result<()> {
        let neighbors = match direction {
            Direction::Dependencies => self.store.get_direct_dependencies(id)?,
            Direction::Dependents => self.store.get_direct_dependents(id)?,
        };

        for neighbor in neighbors {
            if visited.insert(neighbor.clone()) {
                queue.push_back(neighbor);
            }
        }
        Ok(())
    }
}

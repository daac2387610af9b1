use crate::config::IndexerConfig;
use crate::error::{IndexerError, Result};
use crate::module_path::module_path;
use crate::scanner::{is_ignored_scope, FileScanner};
use crate::stats::IndexStats;
use crate::watcher::{FileEvent, FileWatcher};
use rayon::prelude::*;
use snipgraph_chunker::{
    Backend, Chunker, ChunkerError, ChunkerRegistry, ReferenceExtractor, SourceFile,
};
use snipgraph_graph::DependencyResolver;
use snipgraph_store::GraphStore;
use std::path::{Path, PathBuf, MAIN_SEPARATOR};
use std::sync::Arc;
use std::time::Instant;

/// What indexing a single file stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileIndexOutcome {
    pub path: PathBuf,
    pub module: String,
    pub language: String,
    pub lines: usize,
    pub snippets: usize,
    pub edges: usize,
}

/// Keeps the graph store in sync with a project tree
pub struct ProjectIndexer {
    root: PathBuf,
    source_base: Option<PathBuf>,
    registry: ChunkerRegistry,
    resolver: DependencyResolver,
    store: Arc<dyn GraphStore>,
}

impl ProjectIndexer {
    pub fn new(
        root: impl AsRef<Path>,
        config: &IndexerConfig,
        store: Arc<dyn GraphStore>,
    ) -> Result<Self> {
        let root = root.as_ref();
        let root = root
            .canonicalize()
            .map_err(|e| IndexerError::InvalidPath(format!("{}: {e}", root.display())))?;
        if !root.is_dir() {
            return Err(IndexerError::InvalidPath(format!(
                "{} is not a directory",
                root.display()
            )));
        }

        let source_base = config.source_dir.as_ref().map(|dir| root.join(dir));
        Ok(Self {
            root,
            source_base,
            registry: config.registry(),
            resolver: DependencyResolver::new(),
            store,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn store(&self) -> &Arc<dyn GraphStore> {
        &self.store
    }

    /// Tracked files some chunker can handle
    pub fn tracked_files(&self) -> Vec<PathBuf> {
        FileScanner::new(&self.root).scan(|path| self.registry.supports(path))
    }

    /// Chunk, resolve and store one file, replacing whatever it had before
    pub fn index_file(&self, path: impl AsRef<Path>) -> Result<FileIndexOutcome> {
        let path = self.absolute(path.as_ref());
        let backend = self
            .registry
            .backend_for(&path)
            .ok_or_else(|| ChunkerError::unsupported_language(path.display().to_string()))?;

        let module = module_path(&self.root, self.source_base.as_deref(), &path)?;
        let text = std::fs::read_to_string(&path)?;
        let source = path.to_string_lossy().into_owned();
        let file = SourceFile::new(&source, &module, &text);

        let (snippets, edges) = match backend {
            Backend::Native(analyzer) => {
                let snippets = analyzer.chunk(&file)?;
                let references = analyzer.extract(&file, &snippets)?;
                let edges = self.resolver.resolve(&snippets, &references);
                (snippets, edges)
            }
            Backend::External(parser) => {
                let output = parser.parse(&file)?;
                (output.snippets, output.edges)
            }
        };

        self.store.replace_file(&source, &snippets, &edges)?;
        log::info!(
            "Indexed {} ({} snippets, {} edges)",
            path.display(),
            snippets.len(),
            edges.len()
        );

        Ok(FileIndexOutcome {
            language: self
                .registry
                .label_for(&path)
                .unwrap_or_else(|| "unknown".to_string()),
            lines: text.lines().count(),
            snippets: snippets.len(),
            edges: edges.len(),
            module,
            path,
        })
    }

    /// Drop everything stored for a file, or for a whole directory.
    ///
    /// Returns the number of snippets removed.
    pub fn remove_file(&self, path: impl AsRef<Path>) -> Result<usize> {
        let path = self.absolute(path.as_ref());
        let source = path.to_string_lossy();
        let prefix = if self.registry.supports(&path) {
            source.into_owned()
        } else {
            format!("{}{MAIN_SEPARATOR}", source.trim_end_matches(MAIN_SEPARATOR))
        };

        let removed = self.store.delete_by_source_prefix(&prefix)?;
        if removed > 0 {
            log::info!("Removed {removed} snippets under {prefix}");
        }
        Ok(removed)
    }

    /// Fresh ingest of every tracked file.
    ///
    /// Per-file failures are logged and collected in `IndexStats::errors`.
    pub fn index_all(&self) -> Result<IndexStats> {
        let start = Instant::now();
        log::info!("Indexing project at {}", self.root.display());

        // Phase 1: forget the previous ingest
        let cleared = self.remove_file(&self.root)?;
        if cleared > 0 {
            log::debug!("Cleared {cleared} snippets from previous ingest");
        }

        // Phase 2: files are independent units, index them in parallel
        let files = self.tracked_files();
        let results: Vec<(PathBuf, Result<FileIndexOutcome>)> = files
            .par_iter()
            .map(|path| (path.clone(), self.index_file(path)))
            .collect();

        let mut stats = IndexStats::new();
        for (path, result) in results {
            match result {
                Ok(outcome) => {
                    stats.add_file(&outcome.language, outcome.lines);
                    stats.add_snippets(outcome.snippets, outcome.edges);
                }
                Err(e) => {
                    log::warn!("Skipping {}: {e}", path.display());
                    stats.add_error(format!("{}: {e}", path.display()));
                }
            }
        }

        stats.time_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        log::info!(
            "Indexing completed: {} files, {} snippets, {} edges in {} ms ({} errors)",
            stats.files,
            stats.snippets,
            stats.edges,
            stats.time_ms,
            stats.errors.len()
        );
        Ok(stats)
    }

    /// Apply one filesystem change to the store
    pub fn handle_event(&self, event: &FileEvent) -> Result<()> {
        match event {
            FileEvent::Created(path) | FileEvent::Modified(path) => self.refresh(path),
            FileEvent::Deleted(path) => self.remove_file(path).map(|_| ()),
            FileEvent::Moved { from, to } => {
                self.remove_file(from)?;
                self.refresh(to)
            }
        }
    }

    /// Watch the root and apply changes as they arrive, until the watch ends.
    ///
    /// Each event is handled on this thread; failures are logged and the
    /// loop continues.
    pub fn watch(&self) -> Result<()> {
        let watcher = FileWatcher::new(&self.root)?;
        while let Some(events) = watcher.recv() {
            for event in events {
                log::debug!("{event:?}");
                if let Err(e) = self.handle_event(&event) {
                    log::warn!("Failed to apply {event:?}: {e}");
                }
            }
        }
        Ok(())
    }

    fn refresh(&self, path: &Path) -> Result<()> {
        let path = self.absolute(path);
        if is_ignored_scope(&path, &self.root) {
            return Ok(());
        }

        if path.is_dir() {
            // A directory moved into the tree
            for file in FileScanner::new(&path).scan(|file| self.registry.supports(file)) {
                if let Err(e) = self.index_file(&file) {
                    log::warn!("Skipping {}: {e}", file.display());
                }
            }
            return Ok(());
        }

        if !self.registry.supports(&path) {
            log::debug!("No chunker for {}", path.display());
            return Ok(());
        }
        if !path.exists() {
            // Gone again before we got to it
            self.remove_file(&path)?;
            return Ok(());
        }

        self.index_file(&path).map(|_| ())
    }

    fn absolute(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use snipgraph_store::MemoryStore;
    use std::fs;
    use tempfile::TempDir;

    fn project(files: &[(&str, &str)]) -> (TempDir, ProjectIndexer) {
        let temp = TempDir::new().unwrap();
        for (name, text) in files {
            let path = temp.path().join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, text).unwrap();
        }
        let indexer = ProjectIndexer::new(
            temp.path(),
            &IndexerConfig::default(),
            Arc::new(MemoryStore::new()),
        )
        .unwrap();
        (temp, indexer)
    }

    #[test]
    fn test_index_file_stores_snippets_and_edges() {
        let (_temp, indexer) = project(&[("a.py", "def foo():\n    bar()\n\ndef bar():\n    pass\n")]);

        let outcome = indexer.index_file("a.py").unwrap();
        assert_eq!(outcome.module, "a");
        assert_eq!(outcome.language, "python");
        assert_eq!(outcome.snippets, 3);
        assert_eq!(outcome.lines, 5);

        let store = indexer.store();
        assert_eq!(store.get_direct_dependencies("a.foo").unwrap(), vec!["a.bar"]);
        assert!(store.get_direct_dependencies("a.bar").unwrap().is_empty());
    }

    #[test]
    fn test_unsupported_file_rejected() {
        let (_temp, indexer) = project(&[("notes.md", "# hi")]);
        assert!(matches!(
            indexer.index_file("notes.md"),
            Err(IndexerError::ChunkerError(ChunkerError::UnsupportedLanguage(_)))
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let (_temp, indexer) = project(&[]);
        assert!(matches!(
            indexer.index_file("ghost.py"),
            Err(IndexerError::IoError(_))
        ));
    }

    #[test]
    fn test_source_dir_module_paths() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("src/shop")).unwrap();
        fs::write(temp.path().join("src/shop/cart.py"), "def total():\n    pass\n").unwrap();

        let indexer = ProjectIndexer::new(
            temp.path(),
            &IndexerConfig::default().with_source_dir("src"),
            Arc::new(MemoryStore::new()),
        )
        .unwrap();
        let outcome = indexer.index_file("src/shop/cart.py").unwrap();

        assert_eq!(outcome.module, "shop.cart");
        assert!(indexer.store().get_snippet("shop.cart.total").unwrap().is_some());
    }

    #[test]
    fn test_remove_directory_spares_siblings() {
        let (_temp, indexer) = project(&[
            ("pkg/a.py", "def f():\n    pass\n"),
            ("pkg2/b.py", "def g():\n    pass\n"),
        ]);
        indexer.index_file("pkg/a.py").unwrap();
        indexer.index_file("pkg2/b.py").unwrap();

        let removed = indexer.remove_file("pkg").unwrap();
        assert_eq!(removed, 2);
        assert!(indexer.store().get_snippet("pkg.a.f").unwrap().is_none());
        assert!(indexer.store().get_snippet("pkg2.b.g").unwrap().is_some());
    }

    #[test]
    fn test_new_rejects_missing_root() {
        let temp = TempDir::new().unwrap();
        let result = ProjectIndexer::new(
            temp.path().join("nope"),
            &IndexerConfig::default(),
            Arc::new(MemoryStore::new()),
        );
        assert!(matches!(result, Err(IndexerError::InvalidPath(_))));
    }
}

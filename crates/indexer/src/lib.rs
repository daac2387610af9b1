//! # Snipgraph Indexer
//!
//! Keeps a snippet graph in sync with a project tree.
//!
//! ## Pipeline
//!
//! ```text
//! Project root
//!     │
//!     ├──> FileScanner (git ls-files, .gitignore-aware walk fallback)
//!     │      └─> tracked source files
//!     │
//!     ├──> per file, in parallel
//!     │      ├─ module path (relative to root or source_dir)
//!     │      ├─ Chunker + ReferenceExtractor, or external parser
//!     │      ├─ DependencyResolver
//!     │      └─ GraphStore::replace_file (atomic)
//!     │
//!     └──> FileWatcher
//!            └─> FileEvent → same per-file entry point / prefix delete
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use snipgraph_indexer::{IndexerConfig, ProjectIndexer};
//! use snipgraph_store::SqliteStore;
//! use std::sync::Arc;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(SqliteStore::open("/path/to/project/.snipgraph/graph.db")?);
//!     let indexer = ProjectIndexer::new("/path/to/project", &IndexerConfig::default(), store)?;
//!     let stats = indexer.index_all()?;
//!
//!     println!("Indexed {} files, {} snippets", stats.files, stats.snippets);
//!     Ok(())
//! }
//! ```

mod config;
mod error;
mod indexer;
mod module_path;
mod project;
mod scanner;
mod stats;
mod watcher;

pub use config::IndexerConfig;
pub use error::{IndexerError, Result};
pub use indexer::{FileIndexOutcome, ProjectIndexer};
pub use module_path::module_path;
pub use project::{project_manifest_dependencies, project_structure, ManifestDependencies};
pub use scanner::FileScanner;
pub use stats::IndexStats;
pub use watcher::{translate, FileEvent, FileWatcher};

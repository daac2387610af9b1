//! # Snipgraph Chunker
//!
//! Language-aware splitting of source files into addressable snippets, plus
//! extraction of the imports each snippet uses.
//!
//! ## Architecture
//!
//! ```text
//! Source text + module path
//!     │
//!     ├──> ChunkerRegistry (extension → backend)
//!     │    ├─> PythonAnalyzer   tree-sitter syntax tree
//!     │    ├─> ScriptAnalyzer   line scanner + import patterns
//!     │    └─> ExternalParser   out-of-process, JSON on stdout
//!     │
//!     ├──> Chunker::chunk
//!     │    └─> [file, _imports_, declarations...]
//!     │
//!     └──> ReferenceExtractor::extract
//!          ├─> imports (relative paths resolved)
//!          └─> per-snippet usages (whole-word match)
//! ```
//!
//! ## Example
//!
//! ```rust
//! use snipgraph_chunker::{Chunker, PythonAnalyzer, SourceFile};
//!
//! let text = "def foo():\n    bar()\n\ndef bar():\n    pass\n";
//! let file = SourceFile::new("/proj/a.py", "a", text);
//!
//! let snippets = PythonAnalyzer::new().chunk(&file).unwrap();
//! let ids: Vec<&str> = snippets.iter().map(|s| s.id.as_str()).collect();
//! assert_eq!(ids, ["a", "a.foo", "a.bar"]);
//! ```

mod chunker;
mod error;
mod external;
mod language;
mod python;
mod references;
mod script;
mod types;

pub use chunker::{Backend, Chunker, ChunkerRegistry, LanguageAnalyzer};
pub use error::{ChunkerError, Result};
pub use external::{parse_output, ExternalOutput, ExternalParser};
pub use language::Language;
pub use python::{resolve_relative_module, PythonAnalyzer};
pub use references::{collect_usages, contains_word, Import, ReferenceExtractor, References};
pub use script::{normalize_module_path, ScriptAnalyzer};
pub use types::{
    imports_id, snippet_id, DependencyEdge, Snippet, SnippetKind, SourceFile, EXPORTS_NAME,
    IMPORTS_NAME,
};

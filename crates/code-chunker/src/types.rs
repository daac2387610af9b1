use serde::{Deserialize, Serialize};
use std::fmt;

/// Synthetic name of the per-file import block
pub const IMPORTS_NAME: &str = "_imports_";

/// Synthetic name of a `module.exports` tail chunk
pub const EXPORTS_NAME: &str = "_exports_";

/// Build a snippet id from a module path and an optional name.
///
/// The whole-file snippet is addressed by the module path alone.
#[must_use]
pub fn snippet_id(module: &str, name: Option<&str>) -> String {
    match name {
        Some(name) => format!("{module}.{name}"),
        None => module.to_string(),
    }
}

/// Id of the import block snippet for a module
#[must_use]
pub fn imports_id(module: &str) -> String {
    snippet_id(module, Some(IMPORTS_NAME))
}

/// An addressable unit of source text
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Snippet {
    /// Stable id: `module` or `module.name`
    pub id: String,

    /// Absolute path of the originating file
    pub source: String,

    /// Namespace-style module path
    pub module: String,

    /// Declaration name (`None` for the whole-file snippet)
    pub name: Option<String>,

    /// Exact source text, including attached leading comments
    pub content: String,

    /// Start line (1-indexed)
    pub start_line: usize,

    /// End line (1-indexed, inclusive)
    pub end_line: usize,

    pub kind: SnippetKind,
}

impl Snippet {
    /// Create a snippet, deriving its id from `module` and `name`
    #[must_use]
    pub fn new(
        source: impl Into<String>,
        module: impl Into<String>,
        name: Option<String>,
        content: impl Into<String>,
        start_line: usize,
        end_line: usize,
        kind: SnippetKind,
    ) -> Self {
        let module = module.into();
        Self {
            id: snippet_id(&module, name.as_deref()),
            source: source.into(),
            module,
            name,
            content: content.into(),
            start_line,
            end_line,
            kind,
        }
    }

    /// The whole-file snippet for a source file
    #[must_use]
    pub fn whole_file(source: &str, module: &str, text: &str) -> Self {
        Self::new(
            source,
            module,
            None,
            text,
            1,
            text.lines().count().max(1),
            SnippetKind::File,
        )
    }

    /// Whether this is a named top-level declaration other files or siblings can reference
    #[must_use]
    pub fn is_declaration(&self) -> bool {
        self.kind.is_declaration()
    }
}

/// Kind of snippet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnippetKind {
    File,
    Imports,
    Function,
    Class,
    Variable,
    Type,
    Other,
}

impl SnippetKind {
    /// Get human-readable name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Imports => "imports",
            Self::Function => "function",
            Self::Class => "class",
            Self::Variable => "variable",
            Self::Type => "type",
            Self::Other => "other",
        }
    }

    /// Parse the stored representation; unknown values map to `Other`
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value {
            "file" => Self::File,
            "imports" => Self::Imports,
            "function" => Self::Function,
            "class" => Self::Class,
            "variable" => Self::Variable,
            "type" => Self::Type,
            _ => Self::Other,
        }
    }

    /// Check if this is a named declaration (vs file, import block or anonymous code)
    #[must_use]
    pub const fn is_declaration(self) -> bool {
        matches!(
            self,
            Self::Function | Self::Class | Self::Variable | Self::Type
        )
    }
}

impl fmt::Display for SnippetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Directed edge: `snippet_id` references `dependency_reference`.
///
/// The reference may be dangling (no stored snippet with that id yet).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub snippet_id: String,
    pub dependency_reference: String,
}

impl DependencyEdge {
    #[must_use]
    pub fn new(snippet_id: impl Into<String>, dependency_reference: impl Into<String>) -> Self {
        Self {
            snippet_id: snippet_id.into(),
            dependency_reference: dependency_reference.into(),
        }
    }

    #[must_use]
    pub fn is_self_edge(&self) -> bool {
        self.snippet_id == self.dependency_reference
    }
}

/// Borrowed view of one file handed to chunkers and extractors
#[derive(Debug, Clone, Copy)]
pub struct SourceFile<'a> {
    /// Absolute path, stored as the snippet `source`
    pub path: &'a str,

    /// Module path computed by the caller
    pub module: &'a str,

    pub text: &'a str,
}

impl<'a> SourceFile<'a> {
    #[must_use]
    pub const fn new(path: &'a str, module: &'a str, text: &'a str) -> Self {
        Self { path, module, text }
    }

    /// Build a snippet belonging to this file
    #[must_use]
    pub fn snippet(
        &self,
        name: Option<String>,
        content: impl Into<String>,
        start_line: usize,
        end_line: usize,
        kind: SnippetKind,
    ) -> Snippet {
        Snippet::new(
            self.path,
            self.module,
            name,
            content,
            start_line,
            end_line,
            kind,
        )
    }
}

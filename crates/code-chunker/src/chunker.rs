use crate::error::Result;
use crate::external::ExternalParser;
use crate::language::Language;
use crate::python::PythonAnalyzer;
use crate::references::ReferenceExtractor;
use crate::script::ScriptAnalyzer;
use crate::types::{Snippet, SourceFile};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Splits one file into snippets.
///
/// Output order: whole-file snippet, import block (if any), then declarations
/// in source order. Identical input always yields identical output.
pub trait Chunker: Send + Sync {
    fn chunk(&self, file: &SourceFile<'_>) -> Result<Vec<Snippet>>;
}

/// A language family implementation: chunking plus reference extraction
pub trait LanguageAnalyzer: Chunker + ReferenceExtractor {}

impl<T: Chunker + ReferenceExtractor> LanguageAnalyzer for T {}

/// What the registry resolved a path to
pub enum Backend<'a> {
    /// In-process chunker and extractor
    Native(&'a dyn LanguageAnalyzer),

    /// Out-of-process parser returning snippets and pre-resolved edges
    External(&'a ExternalParser),
}

/// Static extension -> implementation map built once at startup
pub struct ChunkerRegistry {
    native: HashMap<String, (Language, Arc<dyn LanguageAnalyzer>)>,
    external: HashMap<String, ExternalParser>,
}

impl ChunkerRegistry {
    /// Registry with the built-in language families
    #[must_use]
    pub fn new() -> Self {
        let python: Arc<dyn LanguageAnalyzer> = Arc::new(PythonAnalyzer::new());
        let script: Arc<dyn LanguageAnalyzer> = Arc::new(ScriptAnalyzer::new());

        let mut native = HashMap::new();
        for language in Language::ALL {
            let analyzer = match language {
                Language::Python => &python,
                Language::JavaScript | Language::TypeScript => &script,
            };
            for ext in language.extensions() {
                native.insert((*ext).to_string(), (language, Arc::clone(analyzer)));
            }
        }

        Self {
            native,
            external: HashMap::new(),
        }
    }

    /// Route an extension (with or without the leading dot) to an external parser.
    ///
    /// External parsers take precedence over built-in chunkers.
    #[must_use]
    pub fn with_external(mut self, extension: &str, parser: ExternalParser) -> Self {
        self.external.insert(normalize_extension(extension), parser);
        self
    }

    pub fn backend_for(&self, path: impl AsRef<Path>) -> Option<Backend<'_>> {
        let ext = extension_of(path.as_ref())?;

        if let Some(parser) = self.external.get(&ext) {
            return Some(Backend::External(parser));
        }
        self.native
            .get(&ext)
            .map(|(_, analyzer)| Backend::Native(analyzer.as_ref()))
    }

    pub fn supports(&self, path: impl AsRef<Path>) -> bool {
        self.backend_for(path).is_some()
    }

    /// Language name of the built-in chunker for `path`, or the bare
    /// extension when an external parser handles it
    pub fn label_for(&self, path: impl AsRef<Path>) -> Option<String> {
        let ext = extension_of(path.as_ref())?;
        if self.external.contains_key(&ext) {
            return Some(ext);
        }
        self.native
            .get(&ext)
            .map(|(language, _)| language.as_str().to_string())
    }
}

impl Default for ChunkerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize_extension(ext: &str) -> String {
    ext.trim_start_matches('.').to_lowercase()
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(normalize_extension)
}

/// Drop earlier snippets whose id is redefined later in the file.
///
/// The last binding of a top-level name wins, keeping ids unique per file.
pub(crate) fn dedup_by_id(snippets: Vec<Snippet>) -> Vec<Snippet> {
    let mut last_index: HashMap<String, usize> = HashMap::with_capacity(snippets.len());
    for (idx, snippet) in snippets.iter().enumerate() {
        last_index.insert(snippet.id.clone(), idx);
    }

    snippets
        .into_iter()
        .enumerate()
        .filter(|(idx, snippet)| last_index.get(&snippet.id) == Some(idx))
        .map(|(_, snippet)| snippet)
        .collect()
}

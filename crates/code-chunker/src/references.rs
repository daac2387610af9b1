use crate::error::Result;
use crate::types::{Snippet, SnippetKind, SourceFile};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One imported binding declared by a file
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Import {
    /// Namespace-style module path, relative imports already resolved
    pub module: String,

    /// Imported member (`None` for a bare module import)
    pub name: Option<String>,

    /// Identifier the importing code uses for this binding.
    ///
    /// `None` when the import binds nothing usable (side-effect imports, wildcards).
    pub local: Option<String>,
}

impl Import {
    /// `from module import name [as alias]` style binding
    pub fn member(
        module: impl Into<String>,
        name: impl Into<String>,
        alias: Option<String>,
    ) -> Self {
        let name = name.into();
        Self {
            module: module.into(),
            local: Some(alias.unwrap_or_else(|| name.clone())),
            name: Some(name),
        }
    }

    /// `import module [as alias]` style binding.
    ///
    /// Without an alias, code refers to the root of the dotted path.
    pub fn module(module: impl Into<String>, alias: Option<String>) -> Self {
        let module = module.into();
        let local = alias.or_else(|| module.split('.').next().map(str::to_string));
        Self {
            module,
            name: None,
            local,
        }
    }

    /// Import that binds no identifier
    pub fn side_effect(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            name: None,
            local: None,
        }
    }

    /// Dependency reference this import resolves to
    #[must_use]
    pub fn target(&self) -> String {
        match &self.name {
            Some(name) if self.module.is_empty() => name.clone(),
            Some(name) => format!("{}.{name}", self.module),
            None => self.module.clone(),
        }
    }
}

/// Imports of a file plus, per snippet id, the imports its text uses
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct References {
    pub imports: Vec<Import>,
    pub usages: BTreeMap<String, BTreeSet<Import>>,
}

impl References {
    /// Imports used by a snippet (empty if none recorded)
    pub fn used_by(&self, snippet_id: &str) -> impl Iterator<Item = &Import> {
        self.usages.get(snippet_id).into_iter().flatten()
    }
}

/// Extracts declared imports and per-snippet usages from source text.
///
/// Syntax-tree extractors and pattern-based fallbacks share this interface so
/// callers never need to know which strategy backs a language.
pub trait ReferenceExtractor: Send + Sync {
    /// All imports declared anywhere in the file
    fn imports(&self, file: &SourceFile<'_>) -> Result<Vec<Import>>;

    /// Imports plus the usage map for `snippets`
    fn extract(&self, file: &SourceFile<'_>, snippets: &[Snippet]) -> Result<References> {
        let imports = self.imports(file)?;
        let usages = collect_usages(&imports, snippets);
        Ok(References { imports, usages })
    }
}

/// Whole-word scan of each snippet for the local names of `imports`.
///
/// Textual containment only: shadowed names, strings and comments all count.
pub fn collect_usages(
    imports: &[Import],
    snippets: &[Snippet],
) -> BTreeMap<String, BTreeSet<Import>> {
    let mut usages = BTreeMap::new();

    for snippet in snippets {
        if snippet.kind == SnippetKind::Imports {
            continue;
        }

        let used: BTreeSet<Import> = imports
            .iter()
            .filter(|import| {
                import
                    .local
                    .as_deref()
                    .is_some_and(|local| contains_word(&snippet.content, local))
            })
            .cloned()
            .collect();

        if !used.is_empty() {
            usages.insert(snippet.id.clone(), used);
        }
    }

    usages
}

/// True when `word` occurs in `haystack` delimited by non-identifier characters
#[must_use]
pub fn contains_word(haystack: &str, word: &str) -> bool {
    if word.is_empty() {
        return false;
    }

    haystack.match_indices(word).any(|(start, _)| {
        let end = start + word.len();
        let before_ok = haystack[..start]
            .chars()
            .next_back()
            .map_or(true, |c| !is_ident_char(c));
        let after_ok = haystack[end..]
            .chars()
            .next()
            .map_or(true, |c| !is_ident_char(c));
        before_ok && after_ok
    })
}

pub(crate) fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_word_boundaries() {
        assert!(contains_word("foo()", "foo"));
        assert!(contains_word("x = a.foo + 1", "foo"));
        assert!(contains_word("foo", "foo"));
        assert!(!contains_word("foobar()", "foo"));
        assert!(!contains_word("my_foo()", "foo"));
        assert!(!contains_word("$foo", "foo"));
        assert!(contains_word("bar; foo_x; foo", "foo"));
        assert!(!contains_word("anything", ""));
    }

    #[test]
    fn test_import_targets() {
        assert_eq!(Import::member("a", "foo", None).target(), "a.foo");
        assert_eq!(Import::module("os.path", None).target(), "os.path");
        assert_eq!(
            Import::module("os.path", None).local.as_deref(),
            Some("os")
        );
        assert_eq!(
            Import::module("numpy", Some("np".into())).local.as_deref(),
            Some("np")
        );
        assert_eq!(
            Import::member("a", "foo", Some("f".into())).local.as_deref(),
            Some("f")
        );
        assert_eq!(Import::side_effect("styles").local, None);
    }

    #[test]
    fn test_collect_usages_skips_import_block() {
        let imports = vec![Import::member("a", "foo", None)];
        let snippets = vec![
            Snippet::new("b.py", "b", Some("_imports_".into()), "from a import foo", 1, 1, SnippetKind::Imports),
            Snippet::new("b.py", "b", Some("baz".into()), "def baz():\n    foo()", 3, 4, SnippetKind::Function),
            Snippet::new("b.py", "b", Some("qux".into()), "def qux():\n    food()", 6, 7, SnippetKind::Function),
        ];

        let usages = collect_usages(&imports, &snippets);
        assert_eq!(usages.len(), 1);
        assert!(usages["b.baz"].contains(&imports[0]));
    }
}

use snipgraph_chunker::{contains_word, DependencyEdge, References, Snippet, SnippetKind};
use std::collections::BTreeSet;

/// Turns one file's snippets and references into dependency edges.
///
/// Name-based and heuristic: an edge means "the text mentions it", not that
/// a type checker would agree. Targets may be dangling.
#[derive(Debug, Default, Clone, Copy)]
pub struct DependencyResolver;

impl DependencyResolver {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Edges for every snippet of a single file, self-edges removed, sorted
    #[must_use]
    pub fn resolve(&self, snippets: &[Snippet], references: &References) -> Vec<DependencyEdge> {
        // Phase 1: names other snippets in this file may mention
        let declarations: Vec<(&str, &str)> = snippets
            .iter()
            .filter(|s| s.is_declaration())
            .filter_map(|s| s.name.as_deref().map(|name| (name, s.id.as_str())))
            .collect();

        let imports_snippet = snippets
            .iter()
            .find(|s| s.kind == SnippetKind::Imports)
            .map(|s| s.id.as_str());

        // Phase 2: edges per snippet
        let mut edges = BTreeSet::new();
        for snippet in snippets {
            if snippet.kind == SnippetKind::Imports {
                continue;
            }

            for import in references.used_by(&snippet.id) {
                edges.insert(DependencyEdge::new(&snippet.id, import.target()));
            }

            for (name, id) in &declarations {
                if *id != snippet.id && contains_word(&snippet.content, name) {
                    edges.insert(DependencyEdge::new(&snippet.id, *id));
                }
            }

            if let Some(imports_id) = imports_snippet {
                edges.insert(DependencyEdge::new(&snippet.id, imports_id));
            }
        }

        edges
            .into_iter()
            .filter(|edge| !edge.is_self_edge())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use snipgraph_chunker::{Chunker, PythonAnalyzer, ReferenceExtractor, SourceFile};

    fn resolve_python(path: &str, module: &str, text: &str) -> Vec<DependencyEdge> {
        let analyzer = PythonAnalyzer::new();
        let file = SourceFile::new(path, module, text);
        let snippets = analyzer.chunk(&file).unwrap();
        let references = analyzer.extract(&file, &snippets).unwrap();
        DependencyResolver::new().resolve(&snippets, &references)
    }

    fn has_edge(edges: &[DependencyEdge], from: &str, to: &str) -> bool {
        edges.contains(&DependencyEdge::new(from, to))
    }

    #[test]
    fn test_intra_file_edge_is_directional() {
        let edges = resolve_python("/p/a.py", "a", "def foo():\n    bar()\n\ndef bar():\n    pass\n");
        assert!(has_edge(&edges, "a.foo", "a.bar"));
        assert!(!has_edge(&edges, "a.bar", "a.foo"));
    }

    #[test]
    fn test_imported_usage_edge() {
        let edges = resolve_python("/p/b.py", "b", "from a import foo\n\ndef baz():\n    foo()\n");
        assert!(has_edge(&edges, "b.baz", "a.foo"));
    }

    #[test]
    fn test_implicit_imports_edge_for_every_snippet() {
        let text = "import os\n\nLIMIT = 3\n\ndef run():\n    return os.getcwd()\n\nclass Job:\n    pass\n";
        let edges = resolve_python("/p/job.py", "job", text);

        for id in ["job", "job.LIMIT", "job.run", "job.Job"] {
            assert!(has_edge(&edges, id, "job._imports_"), "{id}");
        }
        assert!(edges.iter().all(|e| e.snippet_id != "job._imports_"));
        assert!(has_edge(&edges, "job.run", "os"));
    }

    #[test]
    fn test_no_imports_edge_without_import_block() {
        let edges = resolve_python("/p/c.py", "c", "def f():\n    return 1\n");
        assert!(edges.iter().all(|e| !e.dependency_reference.ends_with("_imports_")));
    }

    #[test]
    fn test_no_self_edges_for_recursion() {
        let edges = resolve_python("/p/r.py", "r", "def fact(n):\n    return n * fact(n - 1)\n");
        assert!(edges.iter().all(|e| !e.is_self_edge()));
        assert!(!has_edge(&edges, "r.fact", "r.fact"));
    }

    #[test]
    fn test_whole_word_matching_only() {
        let edges = resolve_python("/p/w.py", "w", "def run():\n    runner()\n\ndef runner():\n    pass\n");
        assert!(has_edge(&edges, "w.run", "w.runner"));
        assert!(!has_edge(&edges, "w.runner", "w.run"));
    }

    #[test]
    fn test_edges_are_a_set() {
        let edges = resolve_python(
            "/p/d.py",
            "d",
            "from a import foo\n\ndef baz():\n    foo()\n    foo()\n    helper()\n    helper()\n\ndef helper():\n    pass\n",
        );
        let baz: Vec<&str> = edges
            .iter()
            .filter(|e| e.snippet_id == "d.baz")
            .map(|e| e.dependency_reference.as_str())
            .collect();
        assert_eq!(baz, vec!["a.foo", "d._imports_", "d.helper"]);
    }
}

use crate::chunker::{dedup_by_id, Chunker};
use crate::error::{ChunkerError, Result};
use crate::references::{is_ident_char, Import, ReferenceExtractor};
use crate::types::{Snippet, SnippetKind, SourceFile, IMPORTS_NAME};
use tree_sitter::{Node, Parser, Tree};

/// Syntax-tree chunker and import extractor for Python sources.
///
/// A fresh parser is built per call, so one analyzer can be shared across
/// indexing threads.
#[derive(Debug, Default, Clone, Copy)]
pub struct PythonAnalyzer;

impl PythonAnalyzer {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn parse(&self, text: &str) -> Result<Tree> {
        let language: tree_sitter::Language = tree_sitter_python::LANGUAGE.into();
        let mut parser = Parser::new();
        parser
            .set_language(&language)
            .map_err(|e| ChunkerError::tree_sitter(format!("Failed to set language: {e}")))?;

        parser
            .parse(text, None)
            .ok_or_else(|| ChunkerError::parse("Failed to parse source code"))
    }
}

impl Chunker for PythonAnalyzer {
    fn chunk(&self, file: &SourceFile<'_>) -> Result<Vec<Snippet>> {
        let mut snippets = vec![Snippet::whole_file(file.path, file.module, file.text)];

        let tree = match self.parse(file.text) {
            Ok(tree) if !tree.root_node().has_error() => tree,
            Ok(_) => {
                log::warn!("Syntax errors in {}, indexing whole file only", file.path);
                return Ok(snippets);
            }
            Err(e) => {
                log::warn!("Failed to parse {}: {e}", file.path);
                return Ok(snippets);
            }
        };

        snippets.extend(top_level_snippets(file, tree.root_node()));
        Ok(dedup_by_id(snippets))
    }
}

impl ReferenceExtractor for PythonAnalyzer {
    fn imports(&self, file: &SourceFile<'_>) -> Result<Vec<Import>> {
        let tree = self.parse(file.text)?;
        let mut imports = Vec::new();
        collect_imports(tree.root_node(), file.text.as_bytes(), file.module, &mut imports);
        Ok(imports)
    }
}

fn is_import(node: Node<'_>) -> bool {
    matches!(
        node.kind(),
        "import_statement" | "import_from_statement" | "future_import_statement"
    )
}

fn is_docstring(node: Node<'_>) -> bool {
    node.kind() == "expression_statement"
        && node.named_child_count() == 1
        && node.named_child(0).is_some_and(|child| child.kind() == "string")
}

fn node_text<'a>(node: Node<'_>, src: &'a [u8]) -> &'a str {
    node.utf8_text(src).unwrap_or_default()
}

/// Import block first, then one snippet per remaining top-level statement
fn top_level_snippets(file: &SourceFile<'_>, root: Node<'_>) -> Vec<Snippet> {
    let src = file.text.as_bytes();

    let mut import_nodes: Vec<Node<'_>> = Vec::new();
    let mut import_comments: Vec<Node<'_>> = Vec::new();
    let mut import_block_open = true;
    let mut seen_statement = false;

    let mut pending: Vec<Node<'_>> = Vec::new();
    let mut previous_end_row = None;
    let mut declarations = Vec::new();

    let mut cursor = root.walk();
    for node in root.named_children(&mut cursor) {
        if node.kind() == "comment" {
            // Trailing comments share a line with the statement before them
            if !matches!(previous_end_row, Some(row) if node.start_position().row <= row) {
                pending.push(node);
            }
            continue;
        }
        let comments = std::mem::take(&mut pending);
        previous_end_row = Some(node.end_position().row);

        if is_import(node) {
            if import_block_open {
                if import_nodes.is_empty() {
                    import_comments = adjacent_comments(&comments, node.start_position().row);
                }
                import_nodes.push(node);
            }
            seen_statement = true;
            continue;
        }

        let module_docstring = !seen_statement && is_docstring(node);
        if !module_docstring {
            import_block_open = false;
        }
        seen_statement = true;

        declarations.push(declaration_snippet(file, src, node, &comments));
    }

    let mut snippets = Vec::with_capacity(declarations.len() + 1);
    if let (Some(first), Some(last)) = (import_nodes.first(), import_nodes.last()) {
        let start = import_comments.first().copied().unwrap_or(*first);
        snippets.push(file.snippet(
            Some(IMPORTS_NAME.to_string()),
            file.text[line_start_byte(start)..last.end_byte()].to_string(),
            start.start_position().row + 1,
            last.end_position().row + 1,
            SnippetKind::Imports,
        ));
    }
    snippets.extend(declarations);
    snippets
}

/// Span starts at the first attached comment, so content is the exact source
/// text of `start_line..=end_line`.
fn declaration_snippet(
    file: &SourceFile<'_>,
    src: &[u8],
    node: Node<'_>,
    comments: &[Node<'_>],
) -> Snippet {
    let node_line = node.start_position().row + 1;
    let (name, kind) = match classify(node, src) {
        (Some(name), kind) if kind != SnippetKind::Other => (name, kind),
        _ => (format!("line{node_line}"), SnippetKind::Other),
    };

    let start = comments.first().copied().unwrap_or(node);
    file.snippet(
        Some(name),
        file.text[line_start_byte(start)..node.end_byte()].to_string(),
        start.start_position().row + 1,
        node.end_position().row + 1,
        kind,
    )
}

fn line_start_byte(node: Node<'_>) -> usize {
    node.start_byte() - node.start_position().column
}

fn classify(node: Node<'_>, src: &[u8]) -> (Option<String>, SnippetKind) {
    let field_text = |node: Node<'_>, field: &str| {
        node.child_by_field_name(field)
            .map(|child| node_text(child, src).to_string())
    };

    match node.kind() {
        "function_definition" => (field_text(node, "name"), SnippetKind::Function),
        "class_definition" => (field_text(node, "name"), SnippetKind::Class),
        "decorated_definition" => node
            .child_by_field_name("definition")
            .map_or((None, SnippetKind::Other), |def| classify(def, src)),
        "expression_statement" => {
            let assignment = node
                .named_child(0)
                .filter(|child| node.named_child_count() == 1 && child.kind() == "assignment");
            let target = assignment
                .and_then(|assignment| assignment.child_by_field_name("left"))
                .filter(|left| left.kind() == "identifier");
            match target {
                Some(left) => (Some(node_text(left, src).to_string()), SnippetKind::Variable),
                None => (None, SnippetKind::Other),
            }
        }
        "type_alias_statement" => {
            let name = node
                .child_by_field_name("left")
                .map(|left| leading_identifier(node_text(left, src)))
                .filter(|name| !name.is_empty());
            (name, SnippetKind::Type)
        }
        _ => (None, SnippetKind::Other),
    }
}

fn leading_identifier(text: &str) -> String {
    text.chars().take_while(|c| is_ident_char(*c)).collect()
}

/// The run of comments ending on the line right above `row`
fn adjacent_comments<'t>(comments: &[Node<'t>], row: usize) -> Vec<Node<'t>> {
    let mut expected = row;
    let mut run: Vec<Node<'t>> = comments
        .iter()
        .rev()
        .take_while(|comment| {
            let adjacent = comment.end_position().row + 1 == expected;
            if adjacent {
                expected = comment.start_position().row;
            }
            adjacent
        })
        .copied()
        .collect();
    run.reverse();
    run
}

fn collect_imports(node: Node<'_>, src: &[u8], module: &str, out: &mut Vec<Import>) {
    match node.kind() {
        "import_statement" => {
            let mut cursor = node.walk();
            for name in node.children_by_field_name("name", &mut cursor) {
                match name.kind() {
                    "dotted_name" => out.push(Import::module(node_text(name, src), None)),
                    "aliased_import" => {
                        let Some(target) = name.child_by_field_name("name") else {
                            continue;
                        };
                        let alias = name
                            .child_by_field_name("alias")
                            .map(|alias| node_text(alias, src).to_string());
                        out.push(Import::module(node_text(target, src), alias));
                    }
                    _ => {}
                }
            }
        }
        "import_from_statement" => {
            let Some(module_node) = node.child_by_field_name("module_name") else {
                return;
            };
            let resolved = if module_node.kind() == "relative_import" {
                relative_import_module(module_node, src, module)
            } else {
                node_text(module_node, src).to_string()
            };

            let mut cursor = node.walk();
            for name in node.children_by_field_name("name", &mut cursor) {
                match name.kind() {
                    "dotted_name" => {
                        out.push(Import::member(resolved.clone(), node_text(name, src), None));
                    }
                    "aliased_import" => {
                        let Some(target) = name.child_by_field_name("name") else {
                            continue;
                        };
                        let alias = name
                            .child_by_field_name("alias")
                            .map(|alias| node_text(alias, src).to_string());
                        out.push(Import::member(resolved.clone(), node_text(target, src), alias));
                    }
                    _ => {}
                }
            }

            let mut cursor = node.walk();
            let wildcard = node
                .children(&mut cursor)
                .any(|child| child.kind() == "wildcard_import");
            if wildcard {
                out.push(Import::side_effect(resolved));
            }
        }
        // __future__ imports never name project code
        "future_import_statement" => {}
        _ => {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                collect_imports(child, src, module, out);
            }
        }
    }
}

fn relative_import_module(node: Node<'_>, src: &[u8], importing_module: &str) -> String {
    let mut level = 0;
    let mut tail = None;

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "import_prefix" => level = node_text(child, src).matches('.').count(),
            "dotted_name" => tail = Some(node_text(child, src)),
            _ => {}
        }
    }

    resolve_relative_module(importing_module, level, tail)
}

/// Resolve a `from .x import y` module against the importing module.
///
/// One dot names the importing module's package; every extra dot climbs one
/// more level.
#[must_use]
pub fn resolve_relative_module(importing_module: &str, level: usize, tail: Option<&str>) -> String {
    let mut segments: Vec<&str> = importing_module
        .split('.')
        .filter(|segment| !segment.is_empty())
        .collect();
    segments.truncate(segments.len().saturating_sub(level.max(1)));
    if let Some(tail) = tail {
        segments.extend(tail.split('.').filter(|segment| !segment.is_empty()));
    }
    segments.join(".")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn chunk(module: &str, text: &str) -> Vec<Snippet> {
        let path = format!("/proj/{}.py", module.replace('.', "/"));
        PythonAnalyzer::new()
            .chunk(&SourceFile::new(&path, module, text))
            .unwrap()
    }

    fn ids(snippets: &[Snippet]) -> Vec<&str> {
        snippets.iter().map(|s| s.id.as_str()).collect()
    }

    #[test]
    fn test_functions_become_snippets() {
        let snippets = chunk("a", "def foo():\n    bar()\n\ndef bar():\n    pass\n");
        assert_eq!(ids(&snippets), vec!["a", "a.foo", "a.bar"]);
        assert_eq!(snippets[1].kind, SnippetKind::Function);
        assert_eq!((snippets[1].start_line, snippets[1].end_line), (1, 2));
        assert_eq!((snippets[2].start_line, snippets[2].end_line), (4, 5));
        assert_eq!(snippets[2].content, "def bar():\n    pass");
    }

    #[test]
    fn test_import_block_with_leading_comment() {
        let text = "\"\"\"Module doc.\"\"\"\n# deps\nimport os\nfrom a import foo\n\nx: int = 3\n";
        let snippets = chunk("b", text);
        assert_eq!(ids(&snippets), vec!["b", "b._imports_", "b.line1", "b.x"]);

        let imports = &snippets[1];
        assert_eq!(imports.kind, SnippetKind::Imports);
        assert_eq!((imports.start_line, imports.end_line), (2, 4));
        assert_eq!(imports.content, "# deps\nimport os\nfrom a import foo");

        assert_eq!(snippets[2].kind, SnippetKind::Other);
        assert_eq!(snippets[3].kind, SnippetKind::Variable);
        assert_eq!(snippets[3].start_line, 6);
    }

    #[test]
    fn test_late_imports_are_not_part_of_block() {
        let snippets = chunk("m", "import os\nX = 1\nimport sys\n");
        let imports = snippets.iter().find(|s| s.kind == SnippetKind::Imports).unwrap();
        assert_eq!(imports.content, "import os");
        assert_eq!(ids(&snippets), vec!["m", "m._imports_", "m.X"]);
    }

    #[test]
    fn test_comments_attach_to_next_declaration() {
        let text = "def a():\n    pass\n\n# helper\n# second line\n@decorate\ndef b():\n    pass\n";
        let snippets = chunk("m", text);
        let b = snippets.iter().find(|s| s.id == "m.b").unwrap();
        assert_eq!(b.kind, SnippetKind::Function);
        assert_eq!((b.start_line, b.end_line), (4, 8));
        assert!(b.content.starts_with("# helper\n# second line\n@decorate\n"));
    }

    #[test]
    fn test_span_includes_attached_comments() {
        let text = "X = 1  # trailing\n# about f\n\ndef f():\n    pass\n";
        let snippets = chunk("m", text);
        assert_eq!(ids(&snippets), vec!["m", "m.X", "m.f"]);

        let f = &snippets[2];
        assert_eq!((f.start_line, f.end_line), (2, 5));
        assert_eq!(f.content, "# about f\n\ndef f():\n    pass");
    }

    #[test]
    fn test_classes_and_other_statements() {
        let text = "class Point:\n    x = 0\n\nif __name__ == '__main__':\n    main()\n";
        let snippets = chunk("m", text);
        assert_eq!(ids(&snippets), vec!["m", "m.Point", "m.line4"]);
        assert_eq!(snippets[1].kind, SnippetKind::Class);
        assert_eq!(snippets[2].kind, SnippetKind::Other);
    }

    #[test]
    fn test_malformed_source_yields_file_snippet_only() {
        let snippets = chunk("bad", "def foo(:\n    pass\n");
        assert_eq!(snippets.len(), 1);
        assert_eq!(snippets[0].kind, SnippetKind::File);
        assert_eq!(snippets[0].content, "def foo(:\n    pass\n");
    }

    #[test]
    fn test_imports_resolved() {
        let text = "import os.path\nimport numpy as np\nfrom a import foo, bar as b\nfrom . import sibling\nfrom ..core.util import helper\nfrom x import *\nfrom __future__ import annotations\n\ndef f():\n    from lazy import thing\n";
        let imports = PythonAnalyzer::new()
            .imports(&SourceFile::new("/p/pkg/sub/mod.py", "pkg.sub.mod", text))
            .unwrap();

        assert_eq!(
            imports,
            vec![
                Import::module("os.path", None),
                Import::module("numpy", Some("np".into())),
                Import::member("a", "foo", None),
                Import::member("a", "bar", Some("b".into())),
                Import::member("pkg.sub", "sibling", None),
                Import::member("pkg.core.util", "helper", None),
                Import::side_effect("x"),
                Import::member("lazy", "thing", None),
            ]
        );
    }

    #[test]
    fn test_resolve_relative_module() {
        assert_eq!(resolve_relative_module("pkg.sub.mod", 1, Some("x")), "pkg.sub.x");
        assert_eq!(resolve_relative_module("pkg.sub.mod", 2, None), "pkg");
        assert_eq!(resolve_relative_module("mod", 3, Some("x")), "x");
        assert_eq!(resolve_relative_module("mod", 1, None), "");
    }

    #[test]
    fn test_redefinition_keeps_last() {
        let snippets = chunk("m", "def f():\n    return 1\n\ndef f():\n    return 2\n");
        assert_eq!(ids(&snippets), vec!["m", "m.f"]);
        assert_eq!(snippets[1].start_line, 4);
    }
}

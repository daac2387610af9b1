use crate::chunker::{dedup_by_id, Chunker};
use crate::error::Result;
use crate::references::{Import, ReferenceExtractor};
use crate::types::{Snippet, SnippetKind, SourceFile, EXPORTS_NAME, IMPORTS_NAME};
use once_cell::sync::Lazy;
use regex::Regex;

/// Top-level declaration keyword, optionally behind export/async modifiers
static DECLARATION_START: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:export\s+)?(?:default\s+)?(?:declare\s+)?(?:abstract\s+)?(?:async\s+)?(?:function\b|class\b|(?:var|let|const|interface|type|enum)\s)",
    )
    .expect("declaration start pattern is valid")
});

static DECLARATION_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:export\s+)?(?:default\s+)?(?:declare\s+)?(?:abstract\s+)?(?:async\s+)?(?:(function)(?:\s*\*\s*|\s+)|(class|var|let|const|interface|type|enum)\s+)([A-Za-z_$][\w$]*)",
    )
    .expect("declaration name pattern is valid")
});

static IMPORT_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^import(?:\s|\{|\*|"|')"#).expect("import start pattern is valid"));

static MODULE_EXPORTS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bmodule\.exports\b").expect("module.exports pattern is valid"));

static FROM_CLAUSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\bfrom\s*["'][^"']*["']"#).expect("from clause pattern is valid"));

static BINDING_IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?m)^[ \t]*import\s+(?:type\s+)?(?:(?:\*\s+as\s+)?([A-Za-z_$][\w$]*)\s*,?\s*)?(?:\{([^}]*)\})?\s*from\s*["']([^"']+)["']"#,
    )
    .expect("binding import pattern is valid")
});

static SIDE_EFFECT_IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^[ \t]*import\s*["']([^"']+)["']"#).expect("side-effect import pattern is valid")
});

const SCRIPT_EXTENSIONS: &[&str] = &[".ts", ".tsx", ".mts", ".cts", ".js", ".jsx", ".mjs", ".cjs"];

/// Line-scanning chunker with pattern-based import extraction for
/// JavaScript and TypeScript.
///
/// Used where no syntax tree is available; shares the `ReferenceExtractor`
/// interface with the tree-based Python path.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScriptAnalyzer;

impl ScriptAnalyzer {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

/// Chunk under construction: first line index, name and kind
struct OpenChunk {
    start: usize,
    end: usize,
    name: Option<String>,
    kind: SnippetKind,
}

impl OpenChunk {
    fn declaration(start: usize, line: &str) -> Self {
        let (name, kind) = match DECLARATION_NAME.captures(line) {
            Some(caps) => {
                let keyword = caps
                    .get(1)
                    .or_else(|| caps.get(2))
                    .map_or("", |m| m.as_str());
                (
                    caps.get(3).map(|m| m.as_str().to_string()),
                    keyword_kind(keyword),
                )
            }
            None => (None, SnippetKind::Other),
        };
        Self {
            start,
            end: start,
            name,
            kind,
        }
    }

    fn exports(start: usize) -> Self {
        Self {
            start,
            end: start,
            name: Some(EXPORTS_NAME.to_string()),
            kind: SnippetKind::Other,
        }
    }

    fn is_exports(&self) -> bool {
        self.name.as_deref() == Some(EXPORTS_NAME)
    }
}

fn keyword_kind(keyword: &str) -> SnippetKind {
    match keyword {
        "function" => SnippetKind::Function,
        "class" => SnippetKind::Class,
        "var" | "let" | "const" => SnippetKind::Variable,
        "interface" | "type" | "enum" => SnippetKind::Type,
        _ => SnippetKind::Other,
    }
}

fn is_top_level(line: &str) -> bool {
    !line.is_empty() && !line.starts_with(char::is_whitespace)
}

/// Closing brackets and chained calls continue the statement above them
fn is_continuation(trimmed: &str) -> bool {
    trimmed.starts_with(['}', ')', ']', '.'])
}

/// Whether `line` leaves a `/*` comment open, ignoring string literals
fn opens_block_comment(line: &str) -> bool {
    let mut open = false;
    let mut quote: Option<char> = None;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if open {
            if c == '*' && chars.next_if_eq(&'/').is_some() {
                open = false;
            }
            continue;
        }
        match (quote, c) {
            (Some(_), '\\') => {
                chars.next();
            }
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'' | '`') => quote = Some(c),
            (None, '/') if chars.peek() == Some(&'/') => return false,
            (None, '/') => open = chars.next_if_eq(&'*').is_some(),
            (None, _) => {}
        }
    }
    open
}

fn import_complete(line: &str) -> bool {
    FROM_CLAUSE.is_match(line)
        || SIDE_EFFECT_IMPORT.is_match(line)
        || line.contains("require(")
        || line.trim_end().ends_with(';')
}

struct Scanner<'f, 'a> {
    file: &'f SourceFile<'a>,
    lines: Vec<&'a str>,
    snippets: Vec<Snippet>,
    current: Option<OpenChunk>,
    /// Comment (and interleaved blank) lines not yet claimed by a chunk
    pending: Option<(usize, usize)>,
    /// First line of the latest top-level statement, held comments included
    statement_start: Option<usize>,
    imports: Option<(usize, usize)>,
    in_import: bool,
    in_block_comment: bool,
    seen_declaration: bool,
}

impl<'f, 'a> Scanner<'f, 'a> {
    fn new(file: &'f SourceFile<'a>) -> Self {
        Self {
            file,
            lines: file.text.lines().collect(),
            snippets: Vec::new(),
            current: None,
            pending: None,
            statement_start: None,
            imports: None,
            in_import: false,
            in_block_comment: false,
            seen_declaration: false,
        }
    }

    fn run(mut self) -> Vec<Snippet> {
        for idx in 0..self.lines.len() {
            self.scan_line(idx);
        }
        self.pending = None;
        self.close_current();

        let mut out = Vec::with_capacity(self.snippets.len() + 1);
        if let Some(imports) = self.imports_snippet() {
            out.push(imports);
        }
        out.append(&mut self.snippets);
        out
    }

    fn scan_line(&mut self, idx: usize) {
        let line = self.lines[idx];
        let trimmed = line.trim();

        if self.in_block_comment {
            self.hold(idx);
            if trimmed.contains("*/") {
                self.in_block_comment = false;
            }
            return;
        }
        if trimmed.starts_with("//") || trimmed.starts_with("/*") {
            self.hold(idx);
        } else {
            self.scan_code(idx, line, trimmed);
        }
        self.in_block_comment = opens_block_comment(trimmed);
    }

    fn scan_code(&mut self, idx: usize, line: &str, trimmed: &str) {
        if self.in_import {
            self.claim_for_imports(idx);
            self.in_import = !import_complete(trimmed);
            return;
        }

        if trimmed.is_empty() {
            if self.pending.is_some() {
                self.hold(idx);
            } else if let Some(current) = self.current.as_mut() {
                current.end = idx;
            }
            return;
        }

        if is_top_level(line) {
            if !self.seen_declaration && IMPORT_START.is_match(line) {
                self.claim_for_imports(idx);
                self.in_import = !import_complete(trimmed);
                return;
            }
            if DECLARATION_START.is_match(line) {
                self.seen_declaration = true;
                self.open(OpenChunk::declaration(idx, line));
                return;
            }
            if !is_continuation(trimmed) {
                self.statement_start = Some(self.pending.map_or(idx, |(start, _)| start));
            }
        }
        if MODULE_EXPORTS.is_match(trimmed) {
            self.enter_exports(idx);
            return;
        }

        match self.current.as_mut() {
            Some(current) => {
                current.end = idx;
                self.pending = None;
            }
            None => self.pending = None,
        }
    }

    fn hold(&mut self, idx: usize) {
        self.pending = Some(match self.pending {
            Some((start, _)) => (start, idx),
            None => (idx, idx),
        });
    }

    fn claim_for_imports(&mut self, idx: usize) {
        let start = self.pending.take().map_or(idx, |(start, _)| start);
        self.imports = Some(match self.imports {
            Some((first, _)) => (first, idx),
            None => (start, idx),
        });
        self.statement_start = None;
    }

    /// Close the running chunk and start `chunk`, handing it held comments
    fn open(&mut self, mut chunk: OpenChunk) {
        self.close_current();
        if let Some((start, _)) = self.pending.take() {
            chunk.start = start;
        }
        self.statement_start = Some(chunk.start);
        self.current = Some(chunk);
    }

    /// Move the statement holding a `module.exports` line into the
    /// `_exports_` chunk, which then runs to the next declaration or end of file
    fn enter_exports(&mut self, idx: usize) {
        let start = self.statement_start.unwrap_or(idx);
        match self.current.as_mut() {
            Some(current) if current.is_exports() => {}
            // Assigned from inside the running declaration
            Some(current) if start <= current.start => {
                current.name = Some(EXPORTS_NAME.to_string());
                current.kind = SnippetKind::Other;
            }
            _ => {
                if let Some(current) = self.current.as_mut() {
                    current.end = current.end.min(start.saturating_sub(1));
                }
                self.close_current();
                self.current = Some(OpenChunk::exports(start));
            }
        }

        self.pending = None;
        if let Some(current) = self.current.as_mut() {
            current.end = idx;
        }
    }

    fn close_current(&mut self) {
        let Some(chunk) = self.current.take() else {
            return;
        };
        let Some(name) = chunk.name else {
            log::debug!(
                "Dropping unnamed declaration at {}:{}",
                self.file.path,
                chunk.start + 1
            );
            return;
        };

        let mut end = chunk.end;
        while end > chunk.start && self.lines[end].trim().is_empty() {
            end -= 1;
        }

        let content = self.lines[chunk.start..=end].join("\n");
        self.snippets.push(self.file.snippet(
            Some(name),
            content,
            chunk.start + 1,
            end + 1,
            chunk.kind,
        ));
    }

    fn imports_snippet(&self) -> Option<Snippet> {
        let (first, last) = self.imports?;
        Some(self.file.snippet(
            Some(IMPORTS_NAME.to_string()),
            self.lines[first..=last].join("\n"),
            first + 1,
            last + 1,
            SnippetKind::Imports,
        ))
    }
}

impl Chunker for ScriptAnalyzer {
    fn chunk(&self, file: &SourceFile<'_>) -> Result<Vec<Snippet>> {
        let mut snippets = vec![Snippet::whole_file(file.path, file.module, file.text)];
        snippets.extend(Scanner::new(file).run());
        Ok(dedup_by_id(snippets))
    }
}

impl ReferenceExtractor for ScriptAnalyzer {
    fn imports(&self, file: &SourceFile<'_>) -> Result<Vec<Import>> {
        let mut found: Vec<(usize, Vec<Import>)> = Vec::new();

        for caps in BINDING_IMPORT.captures_iter(file.text) {
            let (Some(whole), Some(path)) = (caps.get(0), caps.get(3)) else {
                continue;
            };
            let module = normalize_module_path(file.module, path.as_str());
            let mut imports = Vec::new();

            if let Some(local) = caps.get(1) {
                imports.push(Import::module(
                    module.clone(),
                    Some(local.as_str().to_string()),
                ));
            }
            if let Some(names) = caps.get(2) {
                imports.extend(named_bindings(names.as_str()).map(|(name, alias)| {
                    Import::member(module.clone(), name, alias)
                }));
            }
            found.push((whole.start(), imports));
        }

        for caps in SIDE_EFFECT_IMPORT.captures_iter(file.text) {
            let (Some(whole), Some(path)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let module = normalize_module_path(file.module, path.as_str());
            found.push((whole.start(), vec![Import::side_effect(module)]));
        }

        found.sort_by_key(|(offset, _)| *offset);
        Ok(found.into_iter().flat_map(|(_, imports)| imports).collect())
    }
}

/// `a, b as c, type D` -> `(a, None), (b, Some(c)), (D, None)`
fn named_bindings(list: &str) -> impl Iterator<Item = (String, Option<String>)> + '_ {
    list.split(',').filter_map(|item| {
        let item = item.trim();
        let item = item.strip_prefix("type ").map_or(item, str::trim);
        if item.is_empty() {
            return None;
        }
        let mut parts = item.split_whitespace();
        let name = parts.next()?.to_string();
        let alias = match (parts.next(), parts.next()) {
            (Some("as"), Some(alias)) => Some(alias.to_string()),
            _ => None,
        };
        Some((name, alias))
    })
}

/// Rewrite a relative import path against the importing module.
///
/// `./x` resolves next to the importing file, each `../` climbs one more
/// package. The script extension is dropped and separators become dots.
/// Package imports are returned unchanged.
#[must_use]
pub fn normalize_module_path(importing_module: &str, import_path: &str) -> String {
    if !(import_path.starts_with("./") || import_path.starts_with("../")) {
        return import_path.to_string();
    }

    let mut segments: Vec<&str> = importing_module
        .split('.')
        .filter(|segment| !segment.is_empty())
        .collect();
    segments.pop();

    let stripped = SCRIPT_EXTENSIONS
        .iter()
        .find_map(|ext| import_path.strip_suffix(ext))
        .unwrap_or(import_path);

    for part in stripped.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            part => segments.push(part),
        }
    }
    segments.join(".")
}

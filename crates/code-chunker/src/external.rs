use crate::error::{ChunkerError, Result};
use crate::types::{DependencyEdge, Snippet, SnippetKind, SourceFile, IMPORTS_NAME};
use serde::Deserialize;
use std::collections::HashMap;
use std::io::Read;
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;
use wait_timeout::ChildExt;

/// How long a parser may run on one file before it is killed
pub const DEFAULT_PARSER_TIMEOUT: Duration = Duration::from_secs(30);

/// Out-of-process parser for grammars without a built-in chunker.
///
/// The command is run with the file path appended as the last argument and
/// must print `{"chunks": [...], "dependencies": [...]}` on stdout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalParser {
    command: Vec<String>,
    timeout: Duration,
}

/// Snippets plus pre-resolved edges reported by an external parser
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalOutput {
    pub snippets: Vec<Snippet>,
    pub edges: Vec<DependencyEdge>,
}

#[derive(Debug, Deserialize)]
struct RawOutput {
    #[serde(default)]
    chunks: Vec<RawChunk>,
    #[serde(default)]
    dependencies: Vec<RawDependency>,
}

#[derive(Debug, Deserialize)]
struct RawChunk {
    id: Option<String>,
    module: Option<String>,
    name: Option<String>,
    content: String,
    start_line: usize,
    end_line: usize,
    #[serde(rename = "type", alias = "kind")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct RawDependency {
    snippet_id: String,
    #[serde(alias = "dependency_reference")]
    dependency_name: String,
}

impl ExternalParser {
    #[must_use]
    pub fn new(command: Vec<String>) -> Self {
        Self {
            command,
            timeout: DEFAULT_PARSER_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run the parser on `file` and re-key its output onto `file.module`.
    ///
    /// A parser still running after the timeout is killed and reported as an
    /// external parser error.
    pub fn parse(&self, file: &SourceFile<'_>) -> Result<ExternalOutput> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| ChunkerError::external("empty parser command"))?;

        log::debug!("Running external parser {program} on {}", file.path);
        let mut child = Command::new(program)
            .args(args)
            .arg(file.path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ChunkerError::external(format!("failed to spawn {program}: {e}")))?;

        // Drain both pipes while waiting so a chatty parser cannot fill them and stall
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let status = match child.wait_timeout(self.timeout)? {
            Some(status) => status,
            None => {
                let _ = child.kill();
                let _ = child.wait();
                log::warn!(
                    "External parser {program} timed out after {:?} on {}",
                    self.timeout,
                    file.path
                );
                return Err(ChunkerError::external(format!(
                    "{program} timed out after {:?} on {}",
                    self.timeout, file.path
                )));
            }
        };

        let stdout = collect(stdout);
        if !status.success() {
            return Err(ChunkerError::external(format!(
                "{program} exited with {status} for {}: {}",
                file.path,
                String::from_utf8_lossy(&collect(stderr)).trim()
            )));
        }

        parse_output(file, &String::from_utf8_lossy(&stdout))
    }
}

fn drain(mut pipe: impl Read + Send + 'static) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        buf
    })
}

fn collect(reader: Option<thread::JoinHandle<Vec<u8>>>) -> Vec<u8> {
    reader
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default()
}

/// Decode parser JSON and rewrite ids onto the caller's module path
pub fn parse_output(file: &SourceFile<'_>, json: &str) -> Result<ExternalOutput> {
    let raw: RawOutput = serde_json::from_str(json)
        .map_err(|e| ChunkerError::external(format!("invalid parser output: {e}")))?;

    let mut renamed: HashMap<String, String> = HashMap::new();
    let mut foreign_modules: Vec<String> = Vec::new();
    let mut snippets = Vec::with_capacity(raw.chunks.len());

    for chunk in raw.chunks {
        let kind = SnippetKind::parse(&chunk.kind);
        let name = match kind {
            SnippetKind::File => None,
            SnippetKind::Imports => Some(IMPORTS_NAME.to_string()),
            _ => match chunk.name.filter(|name| !name.is_empty()) {
                Some(name) => Some(name),
                None => {
                    log::debug!("Dropping unnamed {kind} chunk from {}", file.path);
                    continue;
                }
            },
        };

        let snippet = file.snippet(
            name,
            unescape_newlines(&chunk.content),
            chunk.start_line,
            chunk.end_line,
            kind,
        );
        if let Some(id) = chunk.id {
            renamed.insert(id, snippet.id.clone());
        }
        if let Some(module) = chunk.module.filter(|m| m != file.module) {
            if !foreign_modules.contains(&module) {
                foreign_modules.push(module);
            }
        }
        snippets.push(snippet);
    }

    let rekey = |reference: &str| -> String {
        if let Some(id) = renamed.get(reference) {
            return id.clone();
        }
        for module in &foreign_modules {
            if let Some(rest) = reference.strip_prefix(module.as_str()) {
                if rest.is_empty() || rest.starts_with('.') {
                    return format!("{}{rest}", file.module);
                }
            }
        }
        reference.to_string()
    };

    let mut edges: Vec<DependencyEdge> = raw
        .dependencies
        .iter()
        .map(|dep| DependencyEdge::new(rekey(&dep.snippet_id), rekey(&dep.dependency_name)))
        .filter(|edge| !edge.is_self_edge())
        .collect();
    edges.sort();
    edges.dedup();

    Ok(ExternalOutput { snippets, edges })
}

/// Parsers escape newlines inside `content`; restore them
fn unescape_newlines(content: &str) -> String {
    content.replace("\\r\\n", "\n").replace("\\n", "\n")
}

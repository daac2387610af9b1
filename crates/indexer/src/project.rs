use crate::error::Result;
use snipgraph_chunker::SnippetKind;
use snipgraph_store::GraphStore;
use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// Runtime and development dependencies declared in project manifests
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestDependencies {
    pub runtime: BTreeSet<String>,
    pub dev: BTreeSet<String>,
}

impl ManifestDependencies {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.runtime.is_empty() && self.dev.is_empty()
    }

    /// `# Project dependencies:` and `# Dev dependencies:` bullet lists
    #[must_use]
    pub fn to_markdown(&self) -> String {
        let mut out = String::from("# Project dependencies:\n");
        for dependency in &self.runtime {
            let _ = writeln!(out, "- {dependency}");
        }
        out.push_str("\n# Dev dependencies:\n");
        for dependency in &self.dev {
            let _ = writeln!(out, "- {dependency}");
        }
        out
    }
}

/// Tracked files, each followed by the names of its stored snippets.
///
/// Test files (`.test.` / `.test-` in the name) are listed without snippets.
pub fn project_structure(root: &Path, files: &[PathBuf], store: &dyn GraphStore) -> Result<String> {
    let mut out = String::from("# Project structure:\n");

    for file in files {
        let relative = file.strip_prefix(root).unwrap_or(file);
        let _ = writeln!(out, "- {}", relative.display());

        let name = relative.to_string_lossy();
        if name.contains(".test.") || name.contains(".test-") {
            continue;
        }

        let source = file.to_string_lossy();
        for snippet in store.get_snippets_by_source(&source)? {
            // Prefix lookup also matches longer paths
            if snippet.source != source || snippet.kind == SnippetKind::File {
                continue;
            }
            if let Some(name) = &snippet.name {
                let _ = writeln!(out, "  - {name}");
            }
        }
    }

    Ok(out)
}

/// Collect dependencies from every tracked `pyproject.toml` and `package.json`.
///
/// Unreadable or malformed manifests are logged and skipped.
#[must_use]
pub fn project_manifest_dependencies(files: &[PathBuf]) -> ManifestDependencies {
    let mut deps = ManifestDependencies::default();

    for file in files {
        let name = file.file_name().and_then(|name| name.to_str());
        let parsed = match name {
            Some("pyproject.toml") => read_pyproject(file, &mut deps),
            Some("package.json") => read_package_json(file, &mut deps),
            _ => continue,
        };
        if let Err(e) = parsed {
            log::warn!("Skipping manifest {}: {e}", file.display());
        }
    }

    deps
}

fn read_pyproject(path: &Path, deps: &mut ManifestDependencies) -> Result<()> {
    let manifest: toml::Table = std::fs::read_to_string(path)?.parse()?;

    let Some(project) = manifest.get("project").and_then(toml::Value::as_table) else {
        return Ok(());
    };
    let strings = |key: &str| -> Vec<String> {
        project
            .get(key)
            .and_then(toml::Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(toml::Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    };

    deps.runtime.extend(strings("dependencies"));
    deps.dev.extend(strings("dev-dependencies"));
    Ok(())
}

fn read_package_json(path: &Path, deps: &mut ManifestDependencies) -> Result<()> {
    let manifest: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(path)?)?;

    let entries = |key: &str| -> Vec<String> {
        manifest
            .get(key)
            .and_then(serde_json::Value::as_object)
            .map(|map| {
                map.iter()
                    .map(|(name, version)| {
                        let version = version
                            .as_str()
                            .map_or_else(|| version.to_string(), str::to_string);
                        format!("{name}: {version}")
                    })
                    .collect()
            })
            .unwrap_or_default()
    };

    deps.runtime.extend(entries("dependencies"));
    deps.dev.extend(entries("devDependencies"));
    Ok(())
}

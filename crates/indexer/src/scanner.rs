use ignore::WalkBuilder;
use std::path::{Component, Path, PathBuf};
use std::process::Command;

/// Enumerates the tracked files of a project
pub struct FileScanner {
    root: PathBuf,
}

impl FileScanner {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Tracked files accepted by `accept`, sorted.
    ///
    /// Asks `git ls-files` first; outside a repository (or without git) falls
    /// back to a `.gitignore`-aware directory walk.
    pub fn scan(&self, accept: impl Fn(&Path) -> bool) -> Vec<PathBuf> {
        let candidates = match self.git_files() {
            Some(files) => files,
            None => self.walk(),
        };

        let mut files: Vec<PathBuf> = candidates
            .into_iter()
            .filter(|path| !is_ignored_scope(path, &self.root))
            .filter(|path| !is_oversized(path))
            .filter(|path| accept(path))
            .collect();
        files.sort();
        files.dedup();

        log::info!("Found {} source files", files.len());
        files
    }

    fn git_files(&self) -> Option<Vec<PathBuf>> {
        let output = Command::new("git")
            .args(["ls-files", "--cached", "--others", "--exclude-standard", "-z"])
            .current_dir(&self.root)
            .output();

        let output = match output {
            Ok(output) if output.status.success() => output,
            Ok(_) => {
                log::debug!("{} is not a git work tree", self.root.display());
                return None;
            }
            Err(e) => {
                log::debug!("git unavailable ({e}), walking {}", self.root.display());
                return None;
            }
        };

        let listing = String::from_utf8_lossy(&output.stdout);
        let files = listing
            .split('\0')
            .filter(|line| !line.is_empty())
            .map(|relative| self.root.join(relative))
            // Deleted but still tracked
            .filter(|path| path.is_file())
            .collect();
        Some(files)
    }

    fn walk(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();

        let root = self.root.clone();
        let mut builder = WalkBuilder::new(&self.root);
        builder
            .hidden(true)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            // Honour .gitignore even when the root is not a repository
            .require_git(false);
        builder.filter_entry(move |entry| !is_ignored_scope(entry.path(), &root));

        for result in builder.build() {
            match result {
                Ok(entry) => {
                    if entry.file_type().is_some_and(|kind| kind.is_file()) {
                        files.push(entry.into_path());
                    }
                }
                Err(e) => log::warn!("Failed to read entry: {e}"),
            }
        }
        files
    }
}

/// True when any component of `path` below `root` is a vendored, generated
/// or tooling directory
pub(crate) fn is_ignored_scope(path: &Path, root: &Path) -> bool {
    let Ok(relative) = path.strip_prefix(root) else {
        return false;
    };
    relative.components().any(|component| match component {
        Component::Normal(name) => {
            let lowered = name.to_string_lossy().to_lowercase();
            IGNORED_SCOPES.iter().any(|ignored| *ignored == lowered)
        }
        _ => false,
    })
}

fn is_oversized(path: &Path) -> bool {
    match path.metadata() {
        Ok(meta) if meta.len() > MAX_FILE_SIZE_BYTES => {
            log::debug!(
                "Skipping large file {} ({} bytes > {})",
                path.display(),
                meta.len(),
                MAX_FILE_SIZE_BYTES
            );
            true
        }
        _ => false,
    }
}

const IGNORED_SCOPES: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    ".idea",
    ".vscode",
    ".iml",
    ".snipgraph",
    "node_modules",
    ".next",
    ".webpack",
    ".serverless",
    "build",
    "dist",
    "coverage",
    "target",
    ".venv",
    "venv",
    ".tox",
    ".mypy_cache",
    ".pytest_cache",
    "__pycache__",
];

const MAX_FILE_SIZE_BYTES: u64 = 1_048_576; // 1 MB

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn skips_ignored_directories() {
        let temp = tempdir().unwrap();
        let deps = temp.path().join("node_modules").join("left-pad");
        fs::create_dir_all(&deps).unwrap();
        fs::write(deps.join("index.js"), b"function pad() {}").unwrap();
        fs::write(temp.path().join("app.js"), b"function main() {}").unwrap();

        let files = FileScanner::new(temp.path()).scan(|_| true);

        assert_eq!(files, vec![temp.path().join("app.js")]);
    }

    #[test]
    fn honours_gitignore_without_repository() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("generated")).unwrap();
        fs::write(temp.path().join("generated").join("out.py"), b"x = 1").unwrap();
        fs::write(temp.path().join("main.py"), b"x = 2").unwrap();
        fs::write(temp.path().join(".gitignore"), b"/generated\n").unwrap();

        let files = FileScanner::new(temp.path()).scan(|_| true);

        assert!(files.iter().all(|p| !p.to_string_lossy().contains("generated")));
        assert!(files.iter().any(|p| p.ends_with("main.py")));
        assert!(files.iter().all(|p| !p.ends_with(".gitignore")));
    }

    #[test]
    fn filter_selects_supported_files() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("b.py"), b"").unwrap();
        fs::write(temp.path().join("a.py"), b"").unwrap();
        fs::write(temp.path().join("notes.md"), b"").unwrap();

        let files = FileScanner::new(temp.path())
            .scan(|p| p.extension().is_some_and(|ext| ext == "py"));

        assert_eq!(
            files,
            vec![temp.path().join("a.py"), temp.path().join("b.py")]
        );
    }

    #[test]
    fn ignored_scope_is_relative_to_root() {
        let root = Path::new("/work/build");
        assert!(!is_ignored_scope(Path::new("/work/build/src/a.py"), root));
        assert!(is_ignored_scope(Path::new("/work/build/src/__pycache__/a.py"), root));
    }
}

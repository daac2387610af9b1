use crate::error::{IndexerError, Result};
use std::path::{Component, Path};

/// Dotted module path for `file`.
///
/// Relative to `source_base` when the file lives under it, otherwise relative
/// to `root`. Separators become `.` and the extension is dropped, so
/// `<root>/pkg/util.py` maps to `pkg.util`.
pub fn module_path(root: &Path, source_base: Option<&Path>, file: &Path) -> Result<String> {
    let relative = source_base
        .and_then(|base| file.strip_prefix(base).ok())
        .or_else(|| file.strip_prefix(root).ok())
        .ok_or_else(|| {
            IndexerError::InvalidPath(format!(
                "{} is outside {}",
                file.display(),
                root.display()
            ))
        })?;

    let mut segments: Vec<String> = relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();

    let Some(last) = segments.pop() else {
        return Err(IndexerError::InvalidPath(format!(
            "{} has no file name",
            file.display()
        )));
    };
    let stem = match Path::new(&last).file_stem() {
        Some(stem) => stem.to_string_lossy().into_owned(),
        None => last.clone(),
    };
    segments.push(stem);

    Ok(segments.join("."))
}

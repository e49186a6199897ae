//! Path helpers for extension roots
//!
//! Manifest entries are untrusted relative paths. Everything that turns one
//! into a filesystem path goes through [`safe_path_join`] so a manifest can
//! never point a check outside the extension directory.

use std::fs;
use std::path::{Component, Path, PathBuf};

/// Join `relative` onto `base`, rejecting absolute paths and any path that
/// still climbs out of `base` after normalisation
pub fn safe_path_join(base: &Path, relative: &Path) -> crate::Result<PathBuf> {
    let normalized = normalize_path(relative);

    let escapes = normalized.is_absolute()
        || normalized.components().any(|c| {
            matches!(
                c,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        });

    if escapes {
        return Err(crate::UtilError::PathOperation(format!(
            "Unsafe path join attempted: {} + {}",
            base.display(),
            relative.display()
        )));
    }

    Ok(base.join(normalized))
}

/// Lexically normalise a path (`a/./b/../c` becomes `a/c`)
pub fn normalize_path(path: &Path) -> PathBuf {
    path_clean::clean(path)
}

/// Render `path` relative to `root` with forward slashes, falling back to the
/// full path when it is not under `root`
pub fn relative_display(root: &Path, path: &Path) -> String {
    match path.strip_prefix(root) {
        Ok(relative) => relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"),
        Err(_) => path.display().to_string(),
    }
}

/// Read a file as text, replacing invalid UTF-8 sequences
pub fn read_text_lossy(path: &Path) -> crate::Result<String> {
    let bytes = fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

//! Path helpers: display normalization and module-path derivation.

use std::path::{Component, Path};

/// Directory names that are never descended into, regardless of gitignore
/// state. Vendored dependencies, caches, and build output.
pub const DEFAULT_SKIP_DIRS: &[&str] = &[
    "__pycache__",
    ".git",
    ".venv",
    "venv",
    "node_modules",
    ".tox",
    ".pytest_cache",
    "build",
    "dist",
    ".eggs",
];

/// Normalizes a path for display.
///
/// - Converts backslashes to forward slashes
/// - Strips a leading "./" prefix
#[must_use]
pub fn normalize_display_path(path: &Path) -> String {
    let s = path.to_string_lossy();
    let clean = s.trim_start_matches(r"\\?\");
    let normalized = clean.replace('\\', "/");
    normalized
        .strip_prefix("./")
        .unwrap_or(&normalized)
        .to_owned()
}

/// Derives the dotted module path for a `.py` file relative to the project
/// root. A trailing `.__init__` is stripped so package directories carry the
/// directory's module path. Returns `None` for paths outside the root or
/// with non-UTF-8 components.
#[must_use]
pub fn module_path_for_file(root: &Path, file: &Path) -> Option<String> {
    let rel = file.strip_prefix(root).ok()?;
    let mut segments = Vec::new();
    for component in rel.components() {
        match component {
            Component::Normal(part) => segments.push(part.to_str()?),
            _ => return None,
        }
    }
    let last = segments.pop()?;
    let stem = last.strip_suffix(".py")?;
    let mut dotted = segments.join(".");
    if stem != "__init__" {
        if !dotted.is_empty() {
            dotted.push('.');
        }
        dotted.push_str(stem);
    }
    if dotted.is_empty() {
        // A bare `__init__.py` at the root has no module path of its own.
        None
    } else {
        Some(dotted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn module_path_basic() {
        let root = PathBuf::from("/proj");
        assert_eq!(
            module_path_for_file(&root, &root.join("a.py")).as_deref(),
            Some("a")
        );
        assert_eq!(
            module_path_for_file(&root, &root.join("pkg/sub/mod.py")).as_deref(),
            Some("pkg.sub.mod")
        );
    }

    #[test]
    fn module_path_strips_init() {
        let root = PathBuf::from("/proj");
        assert_eq!(
            module_path_for_file(&root, &root.join("pkg/__init__.py")).as_deref(),
            Some("pkg")
        );
        assert_eq!(module_path_for_file(&root, &root.join("__init__.py")), None);
    }

    #[test]
    fn module_path_rejects_foreign_files() {
        let root = PathBuf::from("/proj");
        assert_eq!(module_path_for_file(&root, Path::new("/other/a.py")), None);
        assert_eq!(module_path_for_file(&root, &root.join("a.txt")), None);
    }

    #[test]
    fn display_path_strips_dot_slash() {
        assert_eq!(normalize_display_path(Path::new("./src/a.py")), "src/a.py");
    }
}

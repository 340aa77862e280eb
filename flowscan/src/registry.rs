//! Project module registry.
//!
//! Walks a project root, maps every `.py` file to its dotted module path,
//! and maintains the reverse and short-name indexes used during import and
//! call-site resolution.

use crate::error::EngineError;
use crate::utils::{module_path_for_file, DEFAULT_SKIP_DIRS};
use ignore::WalkBuilder;
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Registry of all Python modules under a project root.
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    /// Project root the registry was built from.
    root: PathBuf,
    /// Dotted module path -> file. `BTreeMap` so iteration is deterministic.
    modules: BTreeMap<String, PathBuf>,
    /// File -> dotted module path.
    file_to_module: FxHashMap<PathBuf, String>,
    /// Last dotted segment -> files carrying it (many-to-one when ambiguous).
    short_names: FxHashMap<String, Vec<PathBuf>>,
}

impl ModuleRegistry {
    /// Walks `root` and indexes every `.py` file, skipping the default
    /// vendored/cache directories plus any caller-supplied excludes.
    ///
    /// Fails only when the root itself is unreadable; unreadable individual
    /// files are logged and skipped.
    pub fn scan(root: &Path, extra_excludes: &[String]) -> Result<Self, EngineError> {
        // An unreadable or missing root is the one fatal case.
        std::fs::read_dir(root).map_err(|source| EngineError::ProjectRoot {
            root: root.to_path_buf(),
            source,
        })?;

        let mut registry = Self {
            root: root.to_path_buf(),
            ..Self::default()
        };

        let excludes: Vec<String> = DEFAULT_SKIP_DIRS
            .iter()
            .map(|&s| s.to_owned())
            .chain(extra_excludes.iter().cloned())
            .collect();
        let root_for_filter = root.to_path_buf();

        let walker = WalkBuilder::new(root)
            .hidden(false)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .filter_entry(move |entry| {
                if entry.path() == root_for_filter {
                    return true;
                }
                if !entry.file_type().is_some_and(|ft| ft.is_dir()) {
                    return true;
                }
                entry
                    .file_name()
                    .to_str()
                    .is_none_or(|name| !excludes.iter().any(|ex| ex == name))
            })
            .build();

        for result in walker {
            let entry = match result {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::warn!("walk error under {}: {err}", root.display());
                    continue;
                }
            };
            let path = entry.path();
            if entry.file_type().is_some_and(|ft| ft.is_dir()) {
                continue;
            }
            if path.extension().is_none_or(|ext| ext != "py") {
                continue;
            }
            let Some(module) = module_path_for_file(root, path) else {
                continue;
            };
            registry.insert(module, path.to_path_buf());
        }

        Ok(registry)
    }

    fn insert(&mut self, module: String, file: PathBuf) {
        let short = module.rsplit('.').next().unwrap_or(&module).to_owned();
        self.short_names.entry(short).or_default().push(file.clone());
        self.file_to_module.insert(file.clone(), module.clone());
        self.modules.insert(module, file);
    }

    /// Project root this registry was built from.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// All modules, sorted by dotted path.
    pub fn modules(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.modules.iter().map(|(m, p)| (m.as_str(), p.as_path()))
    }

    /// Number of indexed modules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// True when no modules were found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// File for a dotted module path.
    #[must_use]
    pub fn file_of(&self, module: &str) -> Option<&Path> {
        self.modules.get(module).map(PathBuf::as_path)
    }

    /// Dotted module path for a file.
    #[must_use]
    pub fn module_of(&self, file: &Path) -> Option<&str> {
        self.file_to_module.get(file).map(String::as_str)
    }

    /// True when `module` is a project module.
    #[must_use]
    pub fn contains(&self, module: &str) -> bool {
        self.modules.contains_key(module)
    }

    /// True when `fqn` begins with a project module followed by more
    /// segments, i.e. it plausibly names a symbol defined in the project.
    #[must_use]
    pub fn covers_fqn(&self, fqn: &str) -> bool {
        let mut prefix = fqn;
        while let Some(idx) = prefix.rfind('.') {
            prefix = &prefix[..idx];
            if self.contains(prefix) {
                return true;
            }
        }
        false
    }

    /// Resolves a short (last-segment) name. Ambiguous short names fall back
    /// to a full-path match against `hint` and otherwise fail.
    #[must_use]
    pub fn resolve_short_name(&self, name: &str, hint: Option<&Path>) -> Option<&Path> {
        let files = self.short_names.get(name)?;
        match files.as_slice() {
            [only] => Some(only.as_path()),
            many => hint.and_then(|h| many.iter().find(|f| f.as_path() == h).map(PathBuf::as_path)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(root: &Path, rel: &str, text: &str) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, text).unwrap();
    }

    #[test]
    fn scan_maps_dotted_paths() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path();
        write(root, "a.py", "");
        write(root, "pkg/__init__.py", "");
        write(root, "pkg/mod.py", "");

        let registry = ModuleRegistry::scan(root, &[]).unwrap();
        assert!(registry.contains("a"));
        assert!(registry.contains("pkg"));
        assert!(registry.contains("pkg.mod"));
        assert_eq!(registry.module_of(&root.join("pkg/mod.py")), Some("pkg.mod"));
    }

    #[test]
    fn scan_skips_vendored_dirs() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path();
        write(root, "main.py", "");
        write(root, ".venv/lib.py", "");
        write(root, "node_modules/x.py", "");
        write(root, "__pycache__/c.py", "");

        let registry = ModuleRegistry::scan(root, &[]).unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.contains("main"));
    }

    #[test]
    fn scan_fails_on_missing_root() {
        let err = ModuleRegistry::scan(Path::new("/definitely/not/here"), &[]).unwrap_err();
        assert!(matches!(err, EngineError::ProjectRoot { .. }));
    }

    #[test]
    fn short_names_disambiguate_by_hint() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path();
        write(root, "a/util.py", "");
        write(root, "b/util.py", "");

        let registry = ModuleRegistry::scan(root, &[]).unwrap();
        // Ambiguous without a hint.
        assert!(registry.resolve_short_name("util", None).is_none());
        let hinted = registry
            .resolve_short_name("util", Some(&root.join("a/util.py")))
            .unwrap();
        assert!(hinted.ends_with("a/util.py"));
    }

    #[test]
    fn covers_fqn_checks_module_prefixes() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path();
        write(root, "pkg/mod.py", "");

        let registry = ModuleRegistry::scan(root, &[]).unwrap();
        assert!(registry.covers_fqn("pkg.mod.func"));
        assert!(registry.covers_fqn("pkg.mod.Class.method"));
        assert!(!registry.covers_fqn("other.mod.func"));
    }
}

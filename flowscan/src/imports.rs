//! Per-file import extraction and the shared import-map cache.
//!
//! Each file gets an alias table mapping the names visible in that file to
//! fully qualified targets. Wildcard imports are recorded as markers only;
//! they never participate in resolution.

use crate::parser::ParsedModule;
use dashmap::DashMap;
use ruff_python_ast::Stmt;
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Alias table for one file.
#[derive(Debug, Clone, Default)]
pub struct ImportMap {
    /// `alias -> fully qualified name`. Later bindings win.
    aliases: FxHashMap<String, String>,
    /// Modules named in `from x import *` statements. Resolution never uses
    /// these; they exist so diagnostics can tell "unknown" from "hidden
    /// behind a wildcard".
    wildcard_from: Vec<String>,
}

impl ImportMap {
    /// Looks up an alias.
    #[must_use]
    pub fn resolve(&self, alias: &str) -> Option<&str> {
        self.aliases.get(alias).map(String::as_str)
    }

    /// True when the file has at least one wildcard import.
    #[must_use]
    pub fn has_wildcard(&self) -> bool {
        !self.wildcard_from.is_empty()
    }

    /// Modules imported via `from x import *`.
    #[must_use]
    pub fn wildcard_modules(&self) -> &[String] {
        &self.wildcard_from
    }

    /// Number of explicit aliases.
    #[must_use]
    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    /// True when no aliases were recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }

    fn bind(&mut self, alias: &str, fqn: String) {
        self.aliases.insert(alias.to_owned(), fqn);
    }
}

/// Resolves a relative import level + module against the importing module's
/// package. `level` is the number of leading dots. Returns `None` when the
/// import climbs above the package root.
fn resolve_relative(current_module: &str, level: u32, module: Option<&str>) -> Option<String> {
    let parts: Vec<&str> = current_module.split('.').collect();
    // `from . import x` inside `pkg.mod` resolves against `pkg`: the first
    // dot strips the module's own segment.
    let level = level as usize;
    if level > parts.len() {
        return None;
    }
    let mut base: Vec<&str> = parts[..parts.len() - level].to_vec();
    if let Some(module) = module {
        base.extend(module.split('.'));
    }
    if base.is_empty() {
        None
    } else {
        Some(base.join("."))
    }
}

/// Extracts the import map for a parsed file. `current_module` anchors
/// relative imports.
#[must_use]
pub fn extract_imports(parsed: &ParsedModule, current_module: &str) -> ImportMap {
    let mut map = ImportMap::default();
    extract_from_stmts(&parsed.module.body, current_module, &mut map);
    map
}

fn extract_from_stmts(stmts: &[Stmt], current_module: &str, map: &mut ImportMap) {
    for stmt in stmts {
        match stmt {
            Stmt::Import(import) => {
                for alias in &import.names {
                    let target = alias.name.to_string();
                    match &alias.asname {
                        // `import a.b as x` binds x -> a.b
                        Some(asname) => map.bind(asname.as_str(), target),
                        // `import a.b` binds a.b -> a.b (and the root `a`
                        // is what actually appears in attribute targets).
                        None => {
                            let root = target.split('.').next().unwrap_or(&target).to_owned();
                            if root != target {
                                map.bind(&root, root.clone());
                            }
                            let alias = target.clone();
                            map.bind(&alias, target);
                        }
                    }
                }
            }
            Stmt::ImportFrom(import) => {
                let base = if import.level > 0 {
                    resolve_relative(
                        current_module,
                        import.level,
                        import.module.as_ref().map(ruff_python_ast::Identifier::as_str),
                    )
                } else {
                    import.module.as_ref().map(|m| m.to_string())
                };
                let Some(base) = base else { continue };

                for alias in &import.names {
                    if alias.name.as_str() == "*" {
                        map.wildcard_from.push(base.clone());
                        continue;
                    }
                    let fqn = format!("{base}.{}", alias.name);
                    let bound = alias
                        .asname
                        .as_ref()
                        .map_or_else(|| alias.name.to_string(), |a| a.to_string());
                    map.bind(&bound, fqn);
                }
            }
            // Imports inside conditional blocks still bind names at module
            // scope; walk one level into the common containers.
            Stmt::If(if_stmt) => {
                extract_from_stmts(&if_stmt.body, current_module, map);
                for clause in &if_stmt.elif_else_clauses {
                    extract_from_stmts(&clause.body, current_module, map);
                }
            }
            Stmt::Try(try_stmt) => {
                extract_from_stmts(&try_stmt.body, current_module, map);
                for handler in &try_stmt.handlers {
                    let ruff_python_ast::ExceptHandler::ExceptHandler(h) = handler;
                    extract_from_stmts(&h.body, current_module, map);
                }
                extract_from_stmts(&try_stmt.orelse, current_module, map);
            }
            _ => {}
        }
    }
}

/// Thread-safe cache of per-file import maps. The first requester extracts;
/// later requesters read the published map.
#[derive(Debug, Default)]
pub struct ImportMapCache {
    maps: DashMap<PathBuf, Arc<ImportMap>>,
}

impl ImportMapCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the import map for `file`, extracting it on first use.
    pub fn get_or_extract(
        &self,
        file: &Path,
        parsed: &ParsedModule,
        current_module: &str,
    ) -> Arc<ImportMap> {
        if let Some(map) = self.maps.get(file) {
            return Arc::clone(&map);
        }
        let map = Arc::new(extract_imports(parsed, current_module));
        self.maps
            .entry(file.to_path_buf())
            .or_insert(map)
            .value()
            .clone()
    }

    /// Cached map for `file`, if already extracted.
    #[must_use]
    pub fn get(&self, file: &Path) -> Option<Arc<ImportMap>> {
        self.maps.get(file).map(|m| Arc::clone(&m))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;
    use std::path::Path;

    fn imports_of(source: &str, module: &str) -> ImportMap {
        let parsed = parse_source(source, Path::new("test.py")).unwrap();
        extract_imports(&parsed, module)
    }

    #[test]
    fn plain_and_aliased_imports() {
        let map = imports_of("import os\nimport numpy as np\nimport os.path\n", "m");
        assert_eq!(map.resolve("os"), Some("os"));
        assert_eq!(map.resolve("np"), Some("numpy"));
        assert_eq!(map.resolve("os.path"), Some("os.path"));
    }

    #[test]
    fn from_imports() {
        let map = imports_of("from a.b import c\nfrom a.b import c as d\n", "m");
        // Later binding wins for `c` itself; `d` aliases the same target.
        assert_eq!(map.resolve("c"), Some("a.b.c"));
        assert_eq!(map.resolve("d"), Some("a.b.c"));
    }

    #[test]
    fn wildcard_records_marker_only() {
        let map = imports_of("from x import *\n", "m");
        assert!(map.is_empty());
        assert!(map.has_wildcard());
        assert_eq!(map.wildcard_modules(), ["x"]);
    }

    #[test]
    fn relative_imports_resolve_against_package() {
        let map = imports_of("from . import sibling\nfrom ..top import thing\n", "pkg.sub.mod");
        assert_eq!(map.resolve("sibling"), Some("pkg.sub.sibling"));
        assert_eq!(map.resolve("thing"), Some("pkg.top.thing"));
    }

    #[test]
    fn relative_import_above_root_is_dropped() {
        let map = imports_of("from ....nowhere import x\n", "pkg.mod");
        assert_eq!(map.resolve("x"), None);
    }

    #[test]
    fn later_binding_wins() {
        let map = imports_of("from a import f\nfrom b import f\n", "m");
        assert_eq!(map.resolve("f"), Some("b.f"));
    }

    #[test]
    fn conditional_imports_are_visible() {
        let map = imports_of(
            "try:\n    import ujson as json\nexcept ImportError:\n    import json\n",
            "m",
        );
        assert!(map.resolve("json").is_some());
    }

    #[test]
    fn cache_extracts_once() {
        let parsed = parse_source("import os\n", Path::new("f.py")).unwrap();
        let cache = ImportMapCache::new();
        let first = cache.get_or_extract(Path::new("f.py"), &parsed, "m");
        let second = cache.get_or_extract(Path::new("f.py"), &parsed, "m");
        assert!(Arc::ptr_eq(&first, &second));
        assert!(cache.get(Path::new("f.py")).is_some());
    }
}

//! Standard-library module catalog.
//!
//! The catalog answers "does stdlib module `m` exist, and does it have
//! member `x`?" plus function return types where known. Module indexes come
//! from a [`StdlibProvider`]; the default provider is a bundled manifest so
//! the engine works offline. A provider that fetches per-module indexes from
//! a URL template is a drop-in replacement. Provider failures disable
//! stdlib resolution with a warning; they never fail the build.

use dashmap::DashMap;
use rustc_hash::FxHashSet;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Manifest of available stdlib modules.
#[derive(Debug, Clone, Deserialize)]
pub struct StdlibManifest {
    /// Module names present in the catalog.
    pub modules: Vec<String>,
}

/// Per-module member index.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StdlibModule {
    /// Function name -> return type FQN where known.
    #[serde(default)]
    pub functions: BTreeMap<String, Option<String>>,
    /// Class names defined by the module.
    #[serde(default)]
    pub classes: Vec<String>,
    /// Plain attributes (submodule handles, constants).
    #[serde(default)]
    pub attributes: Vec<String>,
}

impl StdlibModule {
    /// True when the module defines `member` as a function, class, or
    /// attribute.
    #[must_use]
    pub fn has_member(&self, member: &str) -> bool {
        self.functions.contains_key(member)
            || self.classes.iter().any(|c| c == member)
            || self.attributes.iter().any(|a| a == member)
    }
}

/// Source of stdlib module indexes. May perform I/O; the catalog never
/// calls it while holding a lock.
pub trait StdlibProvider: Send + Sync {
    /// Lists the modules this provider can serve.
    fn manifest(&self) -> anyhow::Result<StdlibManifest>;
    /// Fetches one module's member index. `Ok(None)` means the module is
    /// not in the catalog.
    fn module(&self, name: &str) -> anyhow::Result<Option<StdlibModule>>;
}

/// Shape of the bundled catalog file: module name -> member index.
#[derive(Debug, Deserialize)]
struct BundledFile {
    modules: BTreeMap<String, StdlibModule>,
}

/// Offline provider backed by a JSON catalog compiled into the binary.
#[derive(Debug)]
pub struct BundledStdlibProvider {
    file: BundledFile,
}

impl BundledStdlibProvider {
    /// Parses the bundled catalog.
    pub fn new() -> anyhow::Result<Self> {
        let file: BundledFile = serde_json::from_str(include_str!("../../data/stdlib_manifest.json"))?;
        Ok(Self { file })
    }
}

impl StdlibProvider for BundledStdlibProvider {
    fn manifest(&self) -> anyhow::Result<StdlibManifest> {
        Ok(StdlibManifest {
            modules: self.file.modules.keys().cloned().collect(),
        })
    }

    fn module(&self, name: &str) -> anyhow::Result<Option<StdlibModule>> {
        Ok(self.file.modules.get(name).cloned())
    }
}

/// Platform aliases: lookups for the aliased name are served by the
/// canonical module.
fn canonical_module(name: &str) -> &str {
    match name {
        "os.path" | "ntpath" => "posixpath",
        other => other,
    }
}

/// Lazy, cached stdlib catalog.
pub struct StdlibCatalog {
    provider: Box<dyn StdlibProvider>,
    /// `None` when the manifest could not be loaded: resolution disabled.
    available: Option<FxHashSet<String>>,
    /// Per-module cache; `None` entries are negative results.
    cache: DashMap<String, Option<Arc<StdlibModule>>>,
}

impl std::fmt::Debug for StdlibCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StdlibCatalog")
            .field("enabled", &self.available.is_some())
            .field("cached_modules", &self.cache.len())
            .finish()
    }
}

impl StdlibCatalog {
    /// Builds the catalog over a provider. Manifest failure degrades to a
    /// disabled catalog.
    #[must_use]
    pub fn new(provider: Box<dyn StdlibProvider>) -> Self {
        let available = match provider.manifest() {
            Ok(manifest) => Some(manifest.modules.into_iter().collect()),
            Err(err) => {
                tracing::warn!("stdlib manifest unavailable, stdlib resolution disabled: {err}");
                None
            }
        };
        Self {
            provider,
            available,
            cache: DashMap::new(),
        }
    }

    /// Catalog with the bundled offline provider.
    #[must_use]
    pub fn bundled() -> Self {
        match BundledStdlibProvider::new() {
            Ok(provider) => Self::new(Box::new(provider)),
            Err(err) => {
                tracing::warn!("bundled stdlib catalog failed to parse: {err}");
                Self {
                    provider: Box::new(DisabledProvider),
                    available: None,
                    cache: DashMap::new(),
                }
            }
        }
    }

    /// True when the manifest loaded and lookups can succeed.
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.available.is_some()
    }

    /// True when `name` (or its platform alias) is a catalogued module.
    #[must_use]
    pub fn has_module(&self, name: &str) -> bool {
        self.available
            .as_ref()
            .is_some_and(|set| set.contains(canonical_module(name)))
    }

    /// True when some dotted prefix of `fqn` is a catalogued module.
    #[must_use]
    pub fn covers_fqn(&self, fqn: &str) -> bool {
        let Some(available) = self.available.as_ref() else {
            return false;
        };
        let mut prefix = fqn;
        loop {
            if available.contains(canonical_module(prefix)) {
                return true;
            }
            match prefix.rfind('.') {
                Some(idx) => prefix = &prefix[..idx],
                None => return false,
            }
        }
    }

    /// Fetches (and caches) a module index.
    #[must_use]
    pub fn module(&self, name: &str) -> Option<Arc<StdlibModule>> {
        if !self.has_module(name) {
            return None;
        }
        let canonical = canonical_module(name).to_owned();
        if let Some(cached) = self.cache.get(&canonical) {
            return cached.clone();
        }
        // Provider I/O happens outside any lock; a racing double-fetch is
        // harmless and last-write-wins.
        let fetched = match self.provider.module(&canonical) {
            Ok(module) => module.map(Arc::new),
            Err(err) => {
                tracing::warn!("stdlib module {canonical} failed to load: {err}");
                None
            }
        };
        self.cache.insert(canonical, fetched.clone());
        fetched
    }

    /// True when `module.member` exists in the catalog.
    #[must_use]
    pub fn member_exists(&self, module: &str, member: &str) -> bool {
        self.module(module).is_some_and(|m| m.has_member(member))
    }

    /// Return type of `module.func`, where the catalog knows it.
    #[must_use]
    pub fn function_return_type(&self, module: &str, func: &str) -> Option<String> {
        self.module(module)?.functions.get(func)?.clone()
    }
}

/// Provider used when even the bundled catalog is unusable.
struct DisabledProvider;

impl StdlibProvider for DisabledProvider {
    fn manifest(&self) -> anyhow::Result<StdlibManifest> {
        anyhow::bail!("stdlib catalog disabled")
    }

    fn module(&self, _name: &str) -> anyhow::Result<Option<StdlibModule>> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_catalog_knows_core_modules() {
        let catalog = StdlibCatalog::bundled();
        assert!(catalog.enabled());
        assert!(catalog.has_module("os"));
        assert!(catalog.has_module("sys"));
        assert!(catalog.member_exists("os", "system"));
        assert!(catalog.member_exists("html", "escape"));
    }

    #[test]
    fn platform_alias_routes_os_path() {
        let catalog = StdlibCatalog::bundled();
        assert!(catalog.has_module("os.path"));
        assert!(catalog.member_exists("os.path", "join"));
        assert_eq!(
            catalog.function_return_type("os.path", "join").as_deref(),
            Some("builtins.str")
        );
    }

    #[test]
    fn covers_fqn_walks_prefixes() {
        let catalog = StdlibCatalog::bundled();
        assert!(catalog.covers_fqn("os.system"));
        assert!(catalog.covers_fqn("urllib.parse.quote"));
        assert!(!catalog.covers_fqn("myapp.thing"));
    }

    #[test]
    fn failing_provider_disables_catalog() {
        struct Broken;
        impl StdlibProvider for Broken {
            fn manifest(&self) -> anyhow::Result<StdlibManifest> {
                anyhow::bail!("network down")
            }
            fn module(&self, _: &str) -> anyhow::Result<Option<StdlibModule>> {
                anyhow::bail!("network down")
            }
        }
        let catalog = StdlibCatalog::new(Box::new(Broken));
        assert!(!catalog.enabled());
        assert!(!catalog.has_module("os"));
        assert!(catalog.module("os").is_none());
    }
}

//! Known third-party framework and common-library FQN prefixes.
//!
//! A hit here means a call target lives outside the project but is a name we
//! can still classify, so resolution treats it as a valid external endpoint
//! instead of a failure.

/// Classification for a framework-prefix hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameworkInfo {
    /// Human-readable framework name.
    pub name: &'static str,
    /// Coarse category (web, orm, testing, stdlib, http, data).
    pub category: &'static str,
}

/// Prefix table. Longest-prefix wins so `sqlalchemy.orm.` can override a
/// plain `sqlalchemy.` entry if both are present.
const PREFIXES: &[(&str, FrameworkInfo)] = &[
    ("django.", FrameworkInfo { name: "Django", category: "web" }),
    ("flask.", FrameworkInfo { name: "Flask", category: "web" }),
    ("fastapi.", FrameworkInfo { name: "FastAPI", category: "web" }),
    ("starlette.", FrameworkInfo { name: "Starlette", category: "web" }),
    ("tornado.", FrameworkInfo { name: "Tornado", category: "web" }),
    ("sqlalchemy.", FrameworkInfo { name: "SQLAlchemy", category: "orm" }),
    ("peewee.", FrameworkInfo { name: "Peewee", category: "orm" }),
    ("pydantic.", FrameworkInfo { name: "Pydantic", category: "data" }),
    ("pytest.", FrameworkInfo { name: "pytest", category: "testing" }),
    ("unittest.", FrameworkInfo { name: "unittest", category: "testing" }),
    ("requests.", FrameworkInfo { name: "Requests", category: "http" }),
    ("httpx.", FrameworkInfo { name: "HTTPX", category: "http" }),
    ("urllib3.", FrameworkInfo { name: "urllib3", category: "http" }),
    ("numpy.", FrameworkInfo { name: "NumPy", category: "data" }),
    ("pandas.", FrameworkInfo { name: "pandas", category: "data" }),
    ("yaml.", FrameworkInfo { name: "PyYAML", category: "data" }),
    ("json.", FrameworkInfo { name: "json", category: "stdlib" }),
    ("os.", FrameworkInfo { name: "os", category: "stdlib" }),
    ("sys.", FrameworkInfo { name: "sys", category: "stdlib" }),
    ("re.", FrameworkInfo { name: "re", category: "stdlib" }),
    ("subprocess.", FrameworkInfo { name: "subprocess", category: "stdlib" }),
    ("logging.", FrameworkInfo { name: "logging", category: "stdlib" }),
];

/// Static catalog of framework prefixes.
#[derive(Debug, Default)]
pub struct FrameworkCatalog;

impl FrameworkCatalog {
    /// Builds the catalog.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Longest-prefix lookup of `fqn` against the table. The bare module
    /// name itself (e.g. `flask`) also hits.
    #[must_use]
    pub fn lookup(&self, fqn: &str) -> Option<FrameworkInfo> {
        let mut best: Option<(&str, FrameworkInfo)> = None;
        for (prefix, info) in PREFIXES {
            let bare = &prefix[..prefix.len() - 1];
            if fqn == bare || fqn.starts_with(prefix) {
                match best {
                    Some((current, _)) if current.len() >= prefix.len() => {}
                    _ => best = Some((prefix, *info)),
                }
            }
        }
        best.map(|(_, info)| info)
    }

    /// True when `fqn` is covered by a known framework prefix.
    #[must_use]
    pub fn is_known(&self, fqn: &str) -> bool {
        self.lookup(fqn).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_hits() {
        let catalog = FrameworkCatalog::new();
        assert_eq!(catalog.lookup("flask.request").unwrap().name, "Flask");
        assert_eq!(catalog.lookup("django.db.models.Model").unwrap().category, "web");
        assert!(catalog.is_known("os.system"));
        assert!(catalog.is_known("flask"));
    }

    #[test]
    fn misses_unknown_roots() {
        let catalog = FrameworkCatalog::new();
        assert!(!catalog.is_known("myapp.views.index"));
        // Prefix match is segment-accurate: `osmium.x` must not hit `os.`.
        assert!(!catalog.is_known("osmium.x"));
    }
}

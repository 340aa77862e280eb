//! Variable-binding scopes.
//!
//! One scope per module and one per function; function scope shadows module
//! scope. Scopes are appended to during the assignment-extraction pass and
//! read-only afterwards.

use super::TypeInfo;
use dashmap::DashMap;
use rustc_hash::FxHashMap;

/// A variable bound at module or function scope.
#[derive(Debug, Clone)]
pub struct VariableBinding {
    /// Variable name.
    pub name: String,
    /// Inferred (or pending) type.
    pub type_info: TypeInfo,
    /// Textual summary of the right-hand side, for diagnostics.
    pub assigned_from: String,
    /// 1-indexed assignment line.
    pub line: usize,
}

/// Bindings for one scope. Later assignments to the same name win, matching
/// the textual-order semantics of the extraction pass.
#[derive(Debug, Default)]
pub struct VariableScope {
    bindings: FxHashMap<String, VariableBinding>,
}

impl VariableScope {
    /// Empty scope.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds (or rebinds) a variable.
    pub fn bind(&mut self, binding: VariableBinding) {
        self.bindings.insert(binding.name.clone(), binding);
    }

    /// Looks up a variable.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&VariableBinding> {
        self.bindings.get(name)
    }

    /// Number of bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// True when no variables are bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Iterates bindings in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = &VariableBinding> {
        self.bindings.values()
    }

    /// Mutable iteration, used only by placeholder resolution.
    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut VariableBinding> {
        self.bindings.values_mut()
    }
}

/// All scopes in the project, keyed by module path and function FQN.
/// Concurrent inserts during extraction; plain reads afterwards.
#[derive(Debug, Default)]
pub struct ScopeSet {
    module_scopes: DashMap<String, VariableScope>,
    function_scopes: DashMap<String, VariableScope>,
}

impl ScopeSet {
    /// Empty scope set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes a module scope.
    pub fn insert_module_scope(&self, module: &str, scope: VariableScope) {
        self.module_scopes.insert(module.to_owned(), scope);
    }

    /// Publishes a function scope.
    pub fn insert_function_scope(&self, fqn: &str, scope: VariableScope) {
        self.function_scopes.insert(fqn.to_owned(), scope);
    }

    /// Looks up `name` with function scope shadowing module scope.
    #[must_use]
    pub fn lookup(
        &self,
        module: &str,
        function_fqn: Option<&str>,
        name: &str,
    ) -> Option<VariableBinding> {
        if let Some(fqn) = function_fqn {
            if let Some(scope) = self.function_scopes.get(fqn) {
                if let Some(binding) = scope.lookup(name) {
                    return Some(binding.clone());
                }
            }
        }
        self.module_scopes
            .get(module)
            .and_then(|scope| scope.lookup(name).cloned())
    }

    /// Total number of bindings across all scopes. Bounds the placeholder
    /// fixed-point iteration.
    #[must_use]
    pub fn total_bindings(&self) -> usize {
        let modules: usize = self.module_scopes.iter().map(|s| s.len()).sum();
        let functions: usize = self.function_scopes.iter().map(|s| s.len()).sum();
        modules + functions
    }

    /// Runs `f` over every scope mutably. Placeholder resolution only.
    pub(crate) fn for_each_scope_mut(&self, mut f: impl FnMut(&mut VariableScope)) {
        for mut entry in self.module_scopes.iter_mut() {
            f(entry.value_mut());
        }
        for mut entry in self.function_scopes.iter_mut() {
            f(entry.value_mut());
        }
    }

    /// Runs `f` over the module scope belonging to `module`, if present.
    #[must_use]
    pub fn module_lookup(&self, module: &str, name: &str) -> Option<VariableBinding> {
        self.module_scopes
            .get(module)
            .and_then(|scope| scope.lookup(name).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infer::{TypeInfo, TypeSource};

    fn binding(name: &str, fqn: &str) -> VariableBinding {
        VariableBinding {
            name: name.to_owned(),
            type_info: TypeInfo::known(fqn, 0.95, TypeSource::Assignment),
            assigned_from: String::new(),
            line: 1,
        }
    }

    #[test]
    fn function_scope_shadows_module_scope() {
        let scopes = ScopeSet::new();
        let mut module = VariableScope::new();
        module.bind(binding("x", "builtins.int"));
        scopes.insert_module_scope("m", module);

        let mut function = VariableScope::new();
        function.bind(binding("x", "builtins.str"));
        scopes.insert_function_scope("m.f", function);

        let shadowed = scopes.lookup("m", Some("m.f"), "x").unwrap();
        assert_eq!(shadowed.type_info.known_fqn(), Some("builtins.str"));

        let module_level = scopes.lookup("m", None, "x").unwrap();
        assert_eq!(module_level.type_info.known_fqn(), Some("builtins.int"));
    }

    #[test]
    fn rebinding_wins() {
        let mut scope = VariableScope::new();
        scope.bind(binding("x", "builtins.int"));
        scope.bind(binding("x", "builtins.str"));
        assert_eq!(scope.len(), 1);
        assert_eq!(scope.lookup("x").unwrap().type_info.known_fqn(), Some("builtins.str"));
    }
}

//! Class-attribute extraction.
//!
//! Collects `self.x = ...` assignments from `__init__` and class-level
//! annotated assignments into a per-class attribute record, together with
//! the class's method FQNs. This pass runs after placeholder resolution, so
//! pending ascriptions are resolved eagerly against the finished return and
//! scope tables.

use super::assignments::classify_rhs;
use super::{expr_to_dotted, ReturnTypeTable, TypeNameResolver};
use crate::infer::{ScopeSet, TypeInfo, TypeRef, TypeSource};
use crate::parser::ParsedModule;
use dashmap::DashMap;
use ruff_python_ast::{Expr, Stmt};
use rustc_hash::FxHashMap;

/// One attribute on a class.
#[derive(Debug, Clone)]
pub struct ClassAttribute {
    /// Attribute name (without `self.`).
    pub name: String,
    /// Inferred type.
    pub type_info: TypeInfo,
    /// 1-indexed line of the defining assignment.
    pub line: usize,
}

/// A class's attributes and method FQNs.
#[derive(Debug, Clone, Default)]
pub struct ClassAttributes {
    /// FQN of the class.
    pub class_fqn: String,
    /// Attribute name -> record.
    pub attributes: FxHashMap<String, ClassAttribute>,
    /// FQNs of the class's methods.
    pub methods: Vec<String>,
}

impl ClassAttributes {
    /// Looks up an attribute.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&ClassAttribute> {
        self.attributes.get(name)
    }

    /// True when the class defines `method` (by last segment).
    #[must_use]
    pub fn has_method(&self, method: &str) -> bool {
        self.methods
            .iter()
            .any(|fqn| fqn.rsplit('.').next() == Some(method))
    }
}

/// Append-only registry of class attribute records, keyed by class FQN.
#[derive(Debug, Default)]
pub struct ClassAttrRegistry {
    classes: DashMap<String, ClassAttributes>,
}

impl ClassAttrRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes a class record.
    pub fn insert(&self, record: ClassAttributes) {
        self.classes.insert(record.class_fqn.clone(), record);
    }

    /// Fetches a class record.
    #[must_use]
    pub fn get(&self, class_fqn: &str) -> Option<ClassAttributes> {
        self.classes.get(class_fqn).map(|r| r.value().clone())
    }

    /// Number of classes recorded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// True when empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Iterates class FQNs (arbitrary order).
    #[must_use]
    pub fn class_fqns(&self) -> Vec<String> {
        self.classes.iter().map(|e| e.key().clone()).collect()
    }
}

/// Extracts class attributes for one parsed file.
pub fn extract_class_attributes(
    parsed: &ParsedModule,
    module: &str,
    resolver: &TypeNameResolver<'_>,
    returns: &ReturnTypeTable,
    scopes: &ScopeSet,
    registry: &ClassAttrRegistry,
) {
    walk(&parsed.module.body, parsed, module, None, resolver, returns, scopes, registry);
}

#[allow(clippy::too_many_arguments)]
fn walk(
    stmts: &[Stmt],
    parsed: &ParsedModule,
    module: &str,
    outer: Option<&str>,
    resolver: &TypeNameResolver<'_>,
    returns: &ReturnTypeTable,
    scopes: &ScopeSet,
    registry: &ClassAttrRegistry,
) {
    for stmt in stmts {
        let Stmt::ClassDef(class_def) = stmt else {
            continue;
        };
        let local_name = match outer {
            Some(outer) => format!("{outer}.{}", class_def.name),
            None => class_def.name.to_string(),
        };
        let class_fqn = format!("{module}.{local_name}");
        let mut record = ClassAttributes {
            class_fqn: class_fqn.clone(),
            ..ClassAttributes::default()
        };

        for body_stmt in &class_def.body {
            match body_stmt {
                Stmt::FunctionDef(func) => {
                    record.methods.push(format!("{class_fqn}.{}", func.name));
                    if func.name.as_str() == "__init__" {
                        collect_self_assignments(
                            &func.body,
                            parsed,
                            module,
                            &class_fqn,
                            resolver,
                            returns,
                            scopes,
                            &mut record,
                        );
                    }
                }
                // Class-level annotated attribute: `x: int = 0`.
                Stmt::AnnAssign(assign) => {
                    let Expr::Name(target) = &*assign.target else {
                        continue;
                    };
                    let Some(name) = expr_to_dotted(&assign.annotation) else {
                        continue;
                    };
                    let Some(fqn) = resolver.resolve(&name) else {
                        continue;
                    };
                    record.attributes.insert(
                        target.id.to_string(),
                        ClassAttribute {
                            name: target.id.to_string(),
                            type_info: TypeInfo::known(fqn, 0.95, TypeSource::Annotation),
                            line: parsed.line_of(assign),
                        },
                    );
                }
                _ => {}
            }
        }

        registry.insert(record);

        // Nested classes.
        walk(
            &class_def.body,
            parsed,
            module,
            Some(&local_name),
            resolver,
            returns,
            scopes,
            registry,
        );
    }
}

#[allow(clippy::too_many_arguments)]
fn collect_self_assignments(
    stmts: &[Stmt],
    parsed: &ParsedModule,
    module: &str,
    class_fqn: &str,
    resolver: &TypeNameResolver<'_>,
    returns: &ReturnTypeTable,
    scopes: &ScopeSet,
    record: &mut ClassAttributes,
) {
    for stmt in stmts {
        match stmt {
            Stmt::Assign(assign) => {
                for target in &assign.targets {
                    let Some(attr) = self_attribute_name(target) else {
                        continue;
                    };
                    let classified = classify_rhs(&assign.value, resolver);
                    let resolved = resolve_eagerly(classified, module, class_fqn, returns, scopes);
                    record.attributes.insert(
                        attr.clone(),
                        ClassAttribute {
                            name: attr,
                            type_info: resolved,
                            line: parsed.line_of(assign),
                        },
                    );
                }
            }
            // `__init__` bodies commonly branch; descend one level of the
            // usual containers.
            Stmt::If(if_stmt) => {
                collect_self_assignments(
                    &if_stmt.body,
                    parsed,
                    module,
                    class_fqn,
                    resolver,
                    returns,
                    scopes,
                    record,
                );
                for clause in &if_stmt.elif_else_clauses {
                    collect_self_assignments(
                        &clause.body,
                        parsed,
                        module,
                        class_fqn,
                        resolver,
                        returns,
                        scopes,
                        record,
                    );
                }
            }
            Stmt::Try(try_stmt) => {
                collect_self_assignments(
                    &try_stmt.body,
                    parsed,
                    module,
                    class_fqn,
                    resolver,
                    returns,
                    scopes,
                    record,
                );
            }
            _ => {}
        }
    }
}

/// `self.x` target -> `x`.
fn self_attribute_name(target: &Expr) -> Option<String> {
    let Expr::Attribute(attr) = target else {
        return None;
    };
    let Expr::Name(base) = &*attr.value else {
        return None;
    };
    (base.id.as_str() == "self").then(|| attr.attr.to_string())
}

/// This pass runs after placeholder resolution, so pending ascriptions are
/// resolved here against the finished tables instead of being re-queued.
fn resolve_eagerly(
    info: TypeInfo,
    module: &str,
    class_fqn: &str,
    returns: &ReturnTypeTable,
    scopes: &ScopeSet,
) -> TypeInfo {
    match &info.type_ref {
        TypeRef::PendingCall(callee) => match returns.get(callee) {
            Some(ret) if ret.known_fqn().is_some() => TypeInfo {
                type_ref: ret.type_ref.clone(),
                confidence: info.confidence * ret.confidence,
                source: TypeSource::ReturnType,
            },
            _ => TypeInfo::unknown(),
        },
        TypeRef::PendingVar(name) => {
            // The variable lives in __init__'s scope.
            let init_fqn = format!("{class_fqn}.__init__");
            match scopes.lookup(module, Some(&init_fqn), name) {
                Some(binding) if binding.type_info.known_fqn().is_some() => binding.type_info,
                _ => TypeInfo::unknown(),
            }
        }
        _ => info,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::BuiltinCatalog;
    use crate::imports::extract_imports;
    use crate::parser::parse_source;
    use rustc_hash::FxHashSet;
    use std::path::Path;

    fn run(source: &str, classes: &[&str]) -> ClassAttrRegistry {
        let parsed = parse_source(source, Path::new("t.py")).unwrap();
        let builtins = BuiltinCatalog::new();
        let imports = extract_imports(&parsed, "m");
        let class_set: FxHashSet<String> = classes.iter().map(|&s| s.to_owned()).collect();
        let resolver = TypeNameResolver {
            module: "m",
            imports: &imports,
            builtins: &builtins,
            classes: &class_set,
        };
        let registry = ClassAttrRegistry::new();
        let returns = ReturnTypeTable::new();
        let scopes = ScopeSet::new();
        extract_class_attributes(&parsed, "m", &resolver, &returns, &scopes, &registry);
        registry
    }

    #[test]
    fn init_assignments_become_attributes() {
        let registry = run(
            "class Service:\n    def __init__(self):\n        self.name = \"svc\"\n        self.repo = Repo()\n",
            &["m.Repo"],
        );
        let record = registry.get("m.Service").unwrap();
        assert_eq!(
            record.attribute("name").unwrap().type_info.known_fqn(),
            Some("builtins.str")
        );
        assert_eq!(
            record.attribute("repo").unwrap().type_info.known_fqn(),
            Some("m.Repo")
        );
        assert!(record.has_method("__init__"));
    }

    #[test]
    fn class_level_annotations_are_attributes() {
        let registry = run("class Config:\n    timeout: int = 30\n", &[]);
        let record = registry.get("m.Config").unwrap();
        assert_eq!(
            record.attribute("timeout").unwrap().type_info.known_fqn(),
            Some("builtins.int")
        );
    }

    #[test]
    fn methods_are_fqn_qualified() {
        let registry = run("class A:\n    def save(self):\n        pass\n", &[]);
        let record = registry.get("m.A").unwrap();
        assert_eq!(record.methods, ["m.A.save"]);
        assert!(record.has_method("save"));
    }

    #[test]
    fn unresolvable_pending_types_become_unknown() {
        let registry = run(
            "class S:\n    def __init__(self):\n        self.client = make_client()\n",
            &[],
        );
        let record = registry.get("m.S").unwrap();
        let info = &record.attribute("client").unwrap().type_info;
        assert!(!info.type_ref.is_placeholder());
    }
}

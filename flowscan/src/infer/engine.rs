//! The inference engine: strategies over dotted receiver expressions.
//!
//! Targets arrive as dotted text (`u.save`, `self.repo.fetch`, `C().build`).
//! A closed strategy set is selected from the target's shape; chains
//! evaluate left to right carrying a type and a multiplicative confidence.

use super::{ScopeSet, TypeInfo, TypeSource};
use crate::catalog::{BuiltinCatalog, FrameworkCatalog, StdlibCatalog};
use crate::extract::{ClassAttrRegistry, ReturnTypeTable};
use crate::imports::ImportMap;
use rustc_hash::FxHashSet;

/// Maximum number of chain segments evaluated before giving up.
pub const MAX_CHAIN_DEPTH: usize = 12;
/// A chain step below this confidence aborts the whole chain.
pub const MIN_CONFIDENCE: f64 = 0.3;
/// Confidence of the fluent-interface guess (unknown method on a user class
/// returns the receiver's own type).
pub const FLUENT_CONFIDENCE: f64 = 0.6;

/// Inference strategies. Closed set; selection is purely shape-driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// A bare name.
    Identifier,
    /// `self.attr`.
    SelfRef,
    /// `obj.attr` (no call).
    AttrAccess,
    /// `obj.method()` result.
    InstanceCall,
    /// Anything longer.
    Chain,
}

impl Strategy {
    /// Picks the strategy for a parsed target.
    #[must_use]
    fn select(segments: &[Segment]) -> Strategy {
        match segments {
            [_] => Strategy::Identifier,
            [first, _] if first.name == "self" && !first.is_call => Strategy::SelfRef,
            [first, ..] if first.name == "self" && !first.is_call => Strategy::Chain,
            [_, last] if last.is_call => Strategy::InstanceCall,
            [_, _] => Strategy::AttrAccess,
            _ => Strategy::Chain,
        }
    }
}

/// One dotted segment; `is_call` when the segment carried `()`.
#[derive(Debug, Clone)]
struct Segment {
    name: String,
    is_call: bool,
}

fn parse_segments(target: &str) -> Vec<Segment> {
    target
        .split('.')
        .map(|part| {
            let is_call = part.ends_with("()");
            Segment {
                name: part.trim_end_matches("()").to_owned(),
                is_call,
            }
        })
        .collect()
}

/// Context for one inference query.
#[derive(Debug, Clone, Copy)]
pub struct InferCtx<'a> {
    /// Module containing the expression.
    pub module: &'a str,
    /// Enclosing function FQN, if inside one.
    pub function_fqn: Option<&'a str>,
    /// Enclosing class FQN, when the function is a method.
    pub class_fqn: Option<&'a str>,
    /// The file's import map.
    pub imports: &'a ImportMap,
}

/// The engine. Borrow-only: all tables are built by earlier passes.
pub struct TypeEngine<'a> {
    /// Variable scopes.
    pub scopes: &'a ScopeSet,
    /// Class attribute records.
    pub classes: &'a ClassAttrRegistry,
    /// Function return types.
    pub returns: &'a ReturnTypeTable,
    /// FQNs of every indexed function.
    pub functions: &'a FxHashSet<String>,
    /// FQNs of every indexed class.
    pub class_index: &'a FxHashSet<String>,
    /// Builtin catalog.
    pub builtins: &'a BuiltinCatalog,
    /// Framework prefix catalog.
    pub frameworks: &'a FrameworkCatalog,
    /// Stdlib catalog.
    pub stdlib: &'a StdlibCatalog,
}

impl TypeEngine<'_> {
    /// Infers the type of a dotted target expression.
    #[must_use]
    pub fn infer_target(&self, ctx: &InferCtx<'_>, target: &str) -> Option<TypeInfo> {
        let segments = parse_segments(target);
        if segments.is_empty() || segments.len() > MAX_CHAIN_DEPTH {
            return None;
        }
        match Strategy::select(&segments) {
            Strategy::Identifier => self.identifier(ctx, &segments[0]),
            Strategy::SelfRef => self.self_attr(ctx, &segments[1].name),
            Strategy::AttrAccess | Strategy::InstanceCall | Strategy::Chain => {
                self.chain(ctx, &segments)
            }
        }
    }

    /// Infers the receiver of `target` (everything before the last dot) and
    /// yields the FQN the final segment would have on that type. This is
    /// what call-site resolution consumes for chains.
    #[must_use]
    pub fn resolve_method_fqn(
        &self,
        ctx: &InferCtx<'_>,
        target: &str,
    ) -> Option<(String, TypeInfo)> {
        let segments = parse_segments(target);
        if segments.len() < 2 || segments.len() > MAX_CHAIN_DEPTH {
            return None;
        }
        let (last, receiver) = segments.split_last()?;
        let receiver_info = if receiver.len() == 1 {
            self.identifier(ctx, &receiver[0])?
        } else {
            self.chain(ctx, receiver)?
        };
        let fqn = format!("{}.{}", receiver_info.known_fqn()?, last.name);
        Some((fqn, receiver_info))
    }

    /// Identifier strategy: function scope, module scope, `self`, class
    /// names, then imports.
    fn identifier(&self, ctx: &InferCtx<'_>, segment: &Segment) -> Option<TypeInfo> {
        let name = segment.name.as_str();
        if segment.is_call {
            return self.call_result(ctx, name);
        }
        if name == "self" {
            let class = ctx.class_fqn?;
            return Some(TypeInfo::known(class, 1.0, TypeSource::Heuristic));
        }
        if let Some(binding) = self.scopes.lookup(ctx.module, ctx.function_fqn, name) {
            if binding.type_info.known_fqn().is_some() {
                return Some(binding.type_info);
            }
        }
        // A class name used as a value (e.g. `User.objects`).
        let local_class = format!("{}.{name}", ctx.module);
        if self.class_index.contains(&local_class) {
            return Some(TypeInfo::known(local_class, 0.9, TypeSource::Heuristic));
        }
        if let Some(mapped) = ctx.imports.resolve(name) {
            if self.class_index.contains(mapped) {
                return Some(TypeInfo::known(mapped, 0.9, TypeSource::Heuristic));
            }
            // A module handle or external name; carry the FQN forward.
            return Some(TypeInfo::known(mapped, 0.85, TypeSource::Assignment));
        }
        None
    }

    /// Result type of calling a bare name: constructor, builtin conversion,
    /// or a function with an extracted return type.
    fn call_result(&self, ctx: &InferCtx<'_>, name: &str) -> Option<TypeInfo> {
        let local_class = format!("{}.{name}", ctx.module);
        if self.class_index.contains(&local_class) {
            return Some(TypeInfo::known(local_class, 0.95, TypeSource::Assignment));
        }
        if let Some(mapped) = ctx.imports.resolve(name) {
            if self.class_index.contains(mapped) {
                return Some(TypeInfo::known(mapped, 0.95, TypeSource::Assignment));
            }
        }
        if let Some(fqn) = self.builtins.call_return_type(name) {
            return Some(TypeInfo::known(fqn, 0.9, TypeSource::Builtin));
        }
        let local_func = format!("{}.{name}", ctx.module);
        if let Some(ret) = self.returns.get(&local_func) {
            if ret.known_fqn().is_some() {
                return Some(ret);
            }
        }
        None
    }

    /// `self.x` via the enclosing class's attribute record.
    fn self_attr(&self, ctx: &InferCtx<'_>, attr: &str) -> Option<TypeInfo> {
        let class = ctx.class_fqn?;
        let record = self.classes.get(class)?;
        let attribute = record.attribute(attr)?;
        attribute
            .type_info
            .known_fqn()
            .is_some()
            .then(|| attribute.type_info.clone())
    }

    /// Chain strategy: evaluate left to right, multiplying confidences.
    fn chain(&self, ctx: &InferCtx<'_>, segments: &[Segment]) -> Option<TypeInfo> {
        let mut current = self.identifier(ctx, &segments[0])?;
        for segment in &segments[1..] {
            if current.confidence < MIN_CONFIDENCE {
                return None;
            }
            current = if segment.is_call {
                self.method_step(&current, &segment.name)?
            } else {
                self.attr_step(ctx, &current, &segment.name)?
            };
        }
        (current.confidence >= MIN_CONFIDENCE).then_some(current)
    }

    /// One attribute-access step on a known receiver type.
    fn attr_step(&self, ctx: &InferCtx<'_>, base: &TypeInfo, attr: &str) -> Option<TypeInfo> {
        let base_fqn = base.known_fqn()?;
        // `self` already resolved to the class; its attributes come from the
        // class record.
        if self.class_index.contains(base_fqn) || ctx.class_fqn == Some(base_fqn) {
            let record = self.classes.get(base_fqn)?;
            let attribute = record.attribute(attr)?;
            let fqn = attribute.type_info.known_fqn()?;
            return Some(TypeInfo::known(
                fqn,
                base.confidence * attribute.type_info.confidence,
                TypeSource::Heuristic,
            ));
        }
        // A stdlib module handle: `os` -> `os.path`.
        if self.stdlib.has_module(base_fqn) {
            let member = format!("{base_fqn}.{attr}");
            if self.stdlib.has_module(&member) || self.stdlib.member_exists(base_fqn, attr) {
                return Some(TypeInfo::known(
                    member,
                    base.confidence * 0.9,
                    TypeSource::Heuristic,
                ));
            }
        }
        None
    }

    /// One method-call step on a known receiver type.
    fn method_step(&self, base: &TypeInfo, method: &str) -> Option<TypeInfo> {
        let base_fqn = base.known_fqn()?;

        if let Some(ret) = self.builtins.method_return_type(base_fqn, method) {
            return Some(TypeInfo::known(
                ret,
                base.confidence * 0.9,
                TypeSource::Builtin,
            ));
        }

        if self.class_index.contains(base_fqn) {
            let method_fqn = format!("{base_fqn}.{method}");
            if let Some(ret) = self.returns.get(&method_fqn) {
                if let Some(fqn) = ret.known_fqn() {
                    return Some(TypeInfo::known(
                        fqn,
                        base.confidence * ret.confidence,
                        TypeSource::ReturnType,
                    ));
                }
            }
            // Fluent-interface guess: unknown methods of a user class are
            // assumed to return the receiver, at decaying confidence.
            return Some(TypeInfo::known(
                base_fqn,
                base.confidence * FLUENT_CONFIDENCE,
                TypeSource::Heuristic,
            ));
        }

        if self.stdlib.has_module(base_fqn) {
            if let Some(ret) = self.stdlib.function_return_type(base_fqn, method) {
                return Some(TypeInfo::known(
                    ret,
                    base.confidence * 0.9,
                    TypeSource::ReturnType,
                ));
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{BuiltinCatalog, FrameworkCatalog, StdlibCatalog};
    use crate::extract::{ClassAttrRegistry, ClassAttribute, ClassAttributes, ReturnTypeTable};
    use crate::imports::ImportMap;
    use crate::infer::{ScopeSet, VariableBinding, VariableScope};
    use rustc_hash::FxHashMap;

    struct Fixture {
        scopes: ScopeSet,
        classes: ClassAttrRegistry,
        returns: ReturnTypeTable,
        functions: FxHashSet<String>,
        class_index: FxHashSet<String>,
        builtins: BuiltinCatalog,
        frameworks: FrameworkCatalog,
        stdlib: StdlibCatalog,
        imports: ImportMap,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                scopes: ScopeSet::new(),
                classes: ClassAttrRegistry::new(),
                returns: ReturnTypeTable::new(),
                functions: FxHashSet::default(),
                class_index: FxHashSet::default(),
                builtins: BuiltinCatalog::new(),
                frameworks: FrameworkCatalog::new(),
                stdlib: StdlibCatalog::bundled(),
                imports: ImportMap::default(),
            }
        }

        fn engine(&self) -> TypeEngine<'_> {
            TypeEngine {
                scopes: &self.scopes,
                classes: &self.classes,
                returns: &self.returns,
                functions: &self.functions,
                class_index: &self.class_index,
                builtins: &self.builtins,
                frameworks: &self.frameworks,
                stdlib: &self.stdlib,
            }
        }

        fn ctx<'a>(&'a self, function: Option<&'a str>, class: Option<&'a str>) -> InferCtx<'a> {
            InferCtx {
                module: "m",
                function_fqn: function,
                class_fqn: class,
                imports: &self.imports,
            }
        }
    }

    fn bind(scope: &mut VariableScope, name: &str, fqn: &str) {
        scope.bind(VariableBinding {
            name: name.to_owned(),
            type_info: TypeInfo::known(fqn, 0.95, TypeSource::Assignment),
            assigned_from: String::new(),
            line: 1,
        });
    }

    #[test]
    fn identifier_resolves_through_scopes() {
        let mut fx = Fixture::new();
        let mut scope = VariableScope::new();
        bind(&mut scope, "u", "m.User");
        fx.scopes.insert_function_scope("m.go", scope);
        fx.class_index.insert("m.User".to_owned());

        let engine = fx.engine();
        let info = engine.infer_target(&fx.ctx(Some("m.go"), None), "u").unwrap();
        assert_eq!(info.known_fqn(), Some("m.User"));
    }

    #[test]
    fn instance_call_uses_builtin_method_typing() {
        let mut fx = Fixture::new();
        let mut scope = VariableScope::new();
        bind(&mut scope, "s", "builtins.str");
        fx.scopes.insert_function_scope("m.f", scope);

        let engine = fx.engine();
        let info = engine
            .infer_target(&fx.ctx(Some("m.f"), None), "s.upper()")
            .unwrap();
        assert_eq!(info.known_fqn(), Some("builtins.str"));
        assert!(info.confidence < 0.95);
    }

    #[test]
    fn self_attribute_reads_class_record() {
        let mut fx = Fixture::new();
        let mut attrs = FxHashMap::default();
        attrs.insert(
            "repo".to_owned(),
            ClassAttribute {
                name: "repo".to_owned(),
                type_info: TypeInfo::known("m.Repo", 0.95, TypeSource::Assignment),
                line: 3,
            },
        );
        fx.classes.insert(ClassAttributes {
            class_fqn: "m.Service".to_owned(),
            attributes: attrs,
            methods: vec!["m.Service.run".to_owned()],
        });
        fx.class_index.insert("m.Service".to_owned());
        fx.class_index.insert("m.Repo".to_owned());

        let engine = fx.engine();
        let ctx = fx.ctx(Some("m.Service.run"), Some("m.Service"));
        let info = engine.infer_target(&ctx, "self.repo").unwrap();
        assert_eq!(info.known_fqn(), Some("m.Repo"));

        // And the chained method resolves onto Repo.
        let (fqn, _) = engine.resolve_method_fqn(&ctx, "self.repo.save").unwrap();
        assert_eq!(fqn, "m.Repo.save");
    }

    #[test]
    fn constructor_chain_with_fluent_fallback() {
        let mut fx = Fixture::new();
        fx.class_index.insert("m.Query".to_owned());

        let engine = fx.engine();
        let ctx = fx.ctx(None, None);
        // Query().filter() -> fluent guess keeps Query at 0.6 decay.
        let info = engine.infer_target(&ctx, "Query().filter()").unwrap();
        assert_eq!(info.known_fqn(), Some("m.Query"));
        assert!(info.confidence < 0.6);

        let (fqn, _) = engine.resolve_method_fqn(&ctx, "Query().filter().all").unwrap();
        assert_eq!(fqn, "m.Query.all");
    }

    #[test]
    fn chain_aborts_below_confidence_floor() {
        let mut fx = Fixture::new();
        fx.class_index.insert("m.Q".to_owned());
        let engine = fx.engine();
        let ctx = fx.ctx(None, None);
        // Each fluent step multiplies by 0.6: three steps fall under 0.3.
        let info = engine.infer_target(&ctx, "Q().a().b().c()");
        assert!(info.is_none());
    }

    #[test]
    fn depth_cap_rejects_absurd_chains() {
        let fx = Fixture::new();
        let engine = fx.engine();
        let target = format!("x{}", ".y".repeat(13));
        assert!(engine.infer_target(&fx.ctx(None, None), &target).is_none());
    }

    #[test]
    fn stdlib_module_chain() {
        let mut fx = Fixture::new();
        let parsed = crate::parser::parse_source("import os\n", std::path::Path::new("t.py")).unwrap();
        fx.imports = crate::imports::extract_imports(&parsed, "m");

        let engine = fx.engine();
        let ctx = fx.ctx(None, None);
        let info = engine.infer_target(&ctx, "os.path").unwrap();
        assert_eq!(info.known_fqn(), Some("os.path"));
    }
}

//! Call-site resolution.
//!
//! Turns a dotted target string inside a caller into an FQN, or a
//! categorized failure. The order of attempts mirrors the shapes a Python
//! call can take: call chains, `self` receivers, bare names, then
//! `base.rest` via variable types, imports, the local module, ORM shapes,
//! and the stdlib.

use crate::imports::ImportMap;
use crate::infer::{InferCtx, TypeEngine, TypeInfo};
use crate::registry::ModuleRegistry;

/// Why a call site could not be resolved. Exactly one category per failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FailureReason {
    /// Target lives in an external package we do not model.
    ExternalFramework,
    /// Target has an ORM call shape with no static counterpart.
    OrmPattern,
    /// An attribute or call chain whose receiver type is unknown.
    AttributeChain,
    /// A method call through a variable whose type is unknown.
    VariableMethod,
    /// A `super()` dispatch; the static target is ambiguous.
    SuperCall,
    /// A bare name with no import, builtin, or module-local match.
    NotInImports,
    /// Everything else.
    Unknown,
}

impl FailureReason {
    /// Stable snake_case label for diagnostics.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FailureReason::ExternalFramework => "external_framework",
            FailureReason::OrmPattern => "orm_pattern",
            FailureReason::AttributeChain => "attribute_chain",
            FailureReason::VariableMethod => "variable_method",
            FailureReason::SuperCall => "super_call",
            FailureReason::NotInImports => "not_in_imports",
            FailureReason::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of resolving one target.
#[derive(Debug, Clone)]
pub enum Resolution {
    /// The target resolved to `fqn`.
    Resolved {
        /// Resolved FQN.
        fqn: String,
        /// Receiver type when inference was involved.
        inferred: Option<TypeInfo>,
    },
    /// The target did not resolve.
    Unresolved {
        /// Best candidate FQN, when one was formed.
        candidate: Option<String>,
        /// Failure category.
        reason: FailureReason,
    },
}

impl Resolution {
    fn resolved(fqn: impl Into<String>) -> Self {
        Resolution::Resolved {
            fqn: fqn.into(),
            inferred: None,
        }
    }

    fn failed(reason: FailureReason) -> Self {
        Resolution::Unresolved {
            candidate: None,
            reason,
        }
    }

    fn failed_with(candidate: String, reason: FailureReason) -> Self {
        Resolution::Unresolved {
            candidate: Some(candidate),
            reason,
        }
    }
}

/// Everything resolution needs about the caller's surroundings.
pub struct ResolveCtx<'a> {
    /// Module containing the call.
    pub module: &'a str,
    /// FQN of the calling function.
    pub caller_fqn: &'a str,
    /// Enclosing class, when the caller is a method.
    pub class_fqn: Option<&'a str>,
    /// The file's import map.
    pub imports: &'a ImportMap,
    /// The inference engine over the finished tables.
    pub engine: &'a TypeEngine<'a>,
    /// Project module registry.
    pub registry: &'a ModuleRegistry,
    /// ORM call shapes (data-driven, e.g. `.objects.filter`).
    pub orm_patterns: &'a [String],
}

impl ResolveCtx<'_> {
    fn infer_ctx(&self) -> InferCtx<'_> {
        InferCtx {
            module: self.module,
            function_fqn: Some(self.caller_fqn),
            class_fqn: self.class_fqn,
            imports: self.imports,
        }
    }

    /// True when `fqn` is an acceptable endpoint outside the project:
    /// builtins, a known framework prefix, or a stdlib module.
    #[must_use]
    pub fn is_external_fqn(&self, fqn: &str) -> bool {
        fqn.starts_with("builtins.")
            || self.engine.frameworks.is_known(fqn)
            || self.engine.stdlib.covers_fqn(fqn)
    }

    /// True when `fqn` names something the project defines: an indexed
    /// function, class, or class method.
    fn is_project_fqn(&self, fqn: &str) -> bool {
        self.engine.functions.contains(fqn) || self.engine.class_index.contains(fqn)
    }

    fn orm_shaped(&self, target: &str) -> bool {
        self.orm_patterns
            .iter()
            .any(|pattern| target.contains(pattern.as_str()))
    }
}

/// Resolves one dotted call target.
#[must_use]
pub fn resolve_target(ctx: &ResolveCtx<'_>, target: &str) -> Resolution {
    if target.starts_with("super().") || target == "super" {
        return Resolution::failed(FailureReason::SuperCall);
    }
    if target.contains(").") {
        return resolve_chain(ctx, target);
    }
    if let Some(rest) = target.strip_prefix("self.") {
        if rest.contains('.') {
            return resolve_chain(ctx, target);
        }
        return resolve_self_method(ctx, rest);
    }
    if !target.contains('.') {
        return resolve_bare(ctx, target);
    }
    resolve_dotted(ctx, target)
}

/// Call chains (`C().m`, `self.repo.save`): infer the receiver, then place
/// the final segment on its type.
fn resolve_chain(ctx: &ResolveCtx<'_>, target: &str) -> Resolution {
    let infer_ctx = ctx.infer_ctx();
    let Some((fqn, receiver)) = ctx.engine.resolve_method_fqn(&infer_ctx, target) else {
        return Resolution::failed(FailureReason::AttributeChain);
    };
    if ctx.is_project_fqn(&fqn) || ctx.is_external_fqn(&fqn) || method_of_known_class(ctx, &fqn) {
        return Resolution::Resolved {
            fqn,
            inferred: Some(receiver),
        };
    }
    // The receiver type is solid even though the method is unknown
    // (fluent interfaces, dynamic attributes): resolve optimistically.
    if receiver.confidence >= 0.7 {
        return Resolution::Resolved {
            fqn,
            inferred: Some(receiver),
        };
    }
    Resolution::failed_with(fqn, FailureReason::AttributeChain)
}

/// `self.helper()`: the method lives on the class, or at module level for
/// functions promoted out of the class.
fn resolve_self_method(ctx: &ResolveCtx<'_>, method: &str) -> Resolution {
    if let Some(class) = ctx.class_fqn {
        let candidate = format!("{class}.{method}");
        if ctx.engine.functions.contains(&candidate) {
            return Resolution::resolved(candidate);
        }
    }
    let candidate = format!("{}.{method}", ctx.module);
    if ctx.engine.functions.contains(&candidate) {
        return Resolution::resolved(candidate);
    }
    let best = match ctx.class_fqn {
        Some(class) => format!("{class}.{method}"),
        None => candidate,
    };
    Resolution::failed_with(best, FailureReason::Unknown)
}

/// Bare names: builtin, imported, or module-local.
fn resolve_bare(ctx: &ResolveCtx<'_>, target: &str) -> Resolution {
    if let Some(fqn) = ctx.engine.builtins.fqn(target) {
        return Resolution::resolved(fqn);
    }
    if let Some(mapped) = ctx.imports.resolve(target) {
        if ctx.is_project_fqn(mapped)
            || ctx.registry.covers_fqn(mapped)
            || ctx.registry.contains(mapped)
        {
            return Resolution::resolved(mapped);
        }
        if ctx.is_external_fqn(mapped) {
            return Resolution::resolved(mapped);
        }
        return Resolution::failed_with(mapped.to_owned(), FailureReason::ExternalFramework);
    }
    let local = format!("{}.{target}", ctx.module);
    if ctx.is_project_fqn(&local) {
        return Resolution::resolved(local);
    }
    Resolution::failed(FailureReason::NotInImports)
}

/// `base.rest`: variable-typed method, imported module member, module-local
/// qualified name, ORM shape, or stdlib.
fn resolve_dotted(ctx: &ResolveCtx<'_>, target: &str) -> Resolution {
    let Some((base, rest)) = target.split_once('.') else {
        return Resolution::failed(FailureReason::Unknown);
    };

    // Variable-based method resolution.
    if let Some(binding) = ctx
        .engine
        .scopes
        .lookup(ctx.module, Some(ctx.caller_fqn), base)
    {
        if let Some(type_fqn) = binding.type_info.known_fqn() {
            // `u.repo.save` through a typed variable is a chain; the engine
            // picks the variable up from scope itself.
            if rest.contains('.') {
                return resolve_chain(ctx, target);
            }
            let type_fqn = type_fqn.to_owned();
            return resolve_on_type(ctx, &type_fqn, rest, &binding.type_info);
        }
        // The receiver is a local variable whose type never resolved.
        return Resolution::failed(FailureReason::VariableMethod);
    }

    // Import-based: `I[base].rest`.
    if let Some(mapped) = ctx.imports.resolve(base) {
        let fqn = format!("{mapped}.{rest}");
        if ctx.engine.frameworks.is_known(&fqn) {
            return Resolution::resolved(fqn);
        }
        if ctx.orm_shaped(&fqn) {
            return Resolution::resolved(fqn);
        }
        if ctx.engine.stdlib.covers_fqn(&fqn) {
            return Resolution::resolved(fqn);
        }
        if ctx.is_project_fqn(&fqn) || method_of_known_class(ctx, &fqn) {
            return Resolution::resolved(fqn);
        }
        if ctx.registry.covers_fqn(&fqn) {
            // Inside a project module, but nothing indexed by that name.
            return Resolution::failed_with(fqn, FailureReason::Unknown);
        }
        return Resolution::failed_with(fqn, FailureReason::ExternalFramework);
    }

    // Module-local qualified name (`Class.method` in the same module).
    let local = format!("{}.{target}", ctx.module);
    if ctx.is_project_fqn(&local) || method_of_known_class(ctx, &local) {
        return Resolution::resolved(local);
    }

    // ORM shape with an unknown model base.
    if ctx.orm_shaped(target) {
        return Resolution::failed(FailureReason::OrmPattern);
    }

    // Stdlib used without an import in this file (star imports, builtins
    // shims): accept the name as-is when the catalog covers it.
    if ctx.engine.stdlib.covers_fqn(target) {
        return Resolution::resolved(target);
    }

    Resolution::failed(FailureReason::NotInImports)
}

/// Method placement on a known receiver type, trying the type itself, then
/// module-level placement, then an optimistic fallback.
fn resolve_on_type(
    ctx: &ResolveCtx<'_>,
    type_fqn: &str,
    rest: &str,
    binding: &TypeInfo,
) -> Resolution {
    let candidate = format!("{type_fqn}.{rest}");

    if ctx.engine.builtins.is_builtin_type(type_fqn) {
        return Resolution::Resolved {
            fqn: candidate,
            inferred: Some(binding.clone()),
        };
    }
    if ctx.engine.functions.contains(&candidate) || method_of_known_class(ctx, &candidate) {
        return Resolution::Resolved {
            fqn: candidate,
            inferred: Some(binding.clone()),
        };
    }
    if ctx.engine.frameworks.is_known(type_fqn) || ctx.engine.stdlib.member_exists(type_fqn, rest) {
        return Resolution::Resolved {
            fqn: candidate,
            inferred: Some(binding.clone()),
        };
    }
    // Methods stored at module level: `pkg.mod.Class` -> try `pkg.mod.rest`.
    if let Some(module_of_type) = type_fqn.rsplit_once('.').map(|(module, _)| module) {
        let module_level = format!("{module_of_type}.{rest}");
        if ctx.engine.functions.contains(&module_level) {
            return Resolution::Resolved {
                fqn: module_level,
                inferred: Some(binding.clone()),
            };
        }
    }
    if binding.confidence >= 0.7 {
        return Resolution::Resolved {
            fqn: candidate,
            inferred: Some(binding.clone()),
        };
    }
    Resolution::failed_with(candidate, FailureReason::VariableMethod)
}

/// True when `fqn` is a method recorded on an indexed class.
fn method_of_known_class(ctx: &ResolveCtx<'_>, fqn: &str) -> bool {
    let Some((class_fqn, method)) = fqn.rsplit_once('.') else {
        return false;
    };
    ctx.engine
        .classes
        .get(class_fqn)
        .is_some_and(|record| record.has_method(method))
}

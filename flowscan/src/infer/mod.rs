//! Type inference for method-call resolution.
//!
//! The engine answers "what type does this receiver expression have?" so the
//! call-graph builder can turn `obj.save()` into `pkg.models.User.save`.
//! Types flow from annotations, constructor calls, and return-type
//! extraction; everything else is a confidence-weighted heuristic.

mod engine;
mod placeholder;
mod scope;

pub use engine::{InferCtx, Strategy, TypeEngine};
pub use placeholder::resolve_placeholders;
pub use scope::{ScopeSet, VariableBinding, VariableScope};

/// A type reference. `PendingCall`/`PendingVar` are deferred ascriptions
/// produced during extraction and rewritten to `Known` or `Unknown` by the
/// placeholder-resolution pass; they never survive the build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRef {
    /// A fully qualified type name.
    Known(String),
    /// The (qualified) callee whose return type will be this type.
    PendingCall(String),
    /// Another variable whose type will be this type.
    PendingVar(String),
    /// Could not be determined.
    Unknown,
}

impl TypeRef {
    /// The FQN when resolved.
    #[must_use]
    pub fn known_fqn(&self) -> Option<&str> {
        match self {
            TypeRef::Known(fqn) => Some(fqn),
            _ => None,
        }
    }

    /// True for `PendingCall`/`PendingVar`.
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        matches!(self, TypeRef::PendingCall(_) | TypeRef::PendingVar(_))
    }
}

/// Where a type ascription came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeSource {
    /// An explicit annotation.
    Annotation,
    /// A function's extracted return type.
    ReturnType,
    /// The right-hand side of an assignment.
    Assignment,
    /// A structural guess (fluent interface, chain step).
    Heuristic,
    /// A builtin function or type.
    Builtin,
}

/// A type with its provenance and a confidence in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeInfo {
    /// The type itself.
    pub type_ref: TypeRef,
    /// Confidence, multiplicative along inference chains.
    pub confidence: f64,
    /// Provenance.
    pub source: TypeSource,
}

impl TypeInfo {
    /// A resolved type.
    #[must_use]
    pub fn known(fqn: impl Into<String>, confidence: f64, source: TypeSource) -> Self {
        Self {
            type_ref: TypeRef::Known(fqn.into()),
            confidence,
            source,
        }
    }

    /// An unknown type.
    #[must_use]
    pub fn unknown() -> Self {
        Self {
            type_ref: TypeRef::Unknown,
            confidence: 0.0,
            source: TypeSource::Heuristic,
        }
    }

    /// The FQN when resolved.
    #[must_use]
    pub fn known_fqn(&self) -> Option<&str> {
        self.type_ref.known_fqn()
    }

    /// Copy with confidence scaled by `factor`.
    #[must_use]
    pub fn decayed(&self, factor: f64) -> Self {
        Self {
            type_ref: self.type_ref.clone(),
            confidence: self.confidence * factor,
            source: self.source,
        }
    }
}

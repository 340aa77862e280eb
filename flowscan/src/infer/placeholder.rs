//! Placeholder resolution.
//!
//! Rewrites `PendingCall`/`PendingVar` ascriptions to `Known` or `Unknown`
//! using the return-type table and the scopes themselves, iterating to a
//! fixed point. The iteration count is bounded by the number of bindings, so
//! reference cycles terminate and collapse to `Unknown`.

use super::{ScopeSet, TypeInfo, TypeRef, TypeSource};
use crate::extract::ReturnTypeTable;

/// Runs placeholder resolution over the return table and all scopes.
/// Returns the number of bindings that were still pending and got demoted to
/// `Unknown`.
pub fn resolve_placeholders(scopes: &ScopeSet, returns: &ReturnTypeTable) -> usize {
    resolve_return_table(returns);
    resolve_scopes(scopes, returns);
    demote_remaining(scopes, returns)
}

/// The return table can reference itself (`def f(): return g()`), so it is
/// resolved first, to its own fixed point.
fn resolve_return_table(returns: &ReturnTypeTable) {
    let bound = returns.len() + 1;
    for _ in 0..bound {
        let changed = returns.rewrite(|_, info| {
            let TypeRef::PendingCall(callee) = &info.type_ref else {
                return None;
            };
            let ret = returns.get(callee)?;
            let fqn = ret.known_fqn()?;
            Some(TypeInfo::known(
                fqn,
                info.confidence * ret.confidence,
                TypeSource::ReturnType,
            ))
        });
        if changed == 0 {
            break;
        }
    }
}

fn resolve_scopes(scopes: &ScopeSet, returns: &ReturnTypeTable) {
    let bound = scopes.total_bindings() + 1;
    for _ in 0..bound {
        let mut changed = 0usize;
        scopes.for_each_scope_mut(|scope| {
            // Two-phase per scope: read the candidates, then rewrite, so a
            // `b = a` chain inside one scope settles over iterations rather
            // than observing half-updated state.
            let resolutions: Vec<(String, TypeInfo)> = scope
                .iter()
                .filter_map(|binding| {
                    let next = match &binding.type_info.type_ref {
                        TypeRef::PendingCall(callee) => {
                            let ret = returns.get(callee)?;
                            let fqn = ret.known_fqn()?;
                            TypeInfo::known(
                                fqn,
                                binding.type_info.confidence * ret.confidence,
                                TypeSource::ReturnType,
                            )
                        }
                        TypeRef::PendingVar(source_var) => {
                            let source = scope.lookup(source_var)?;
                            let fqn = source.type_info.known_fqn()?;
                            TypeInfo::known(
                                fqn,
                                binding.type_info.confidence * source.type_info.confidence,
                                source.type_info.source,
                            )
                        }
                        _ => return None,
                    };
                    Some((binding.name.clone(), next))
                })
                .collect();
            changed += resolutions.len();
            for (name, info) in resolutions {
                for binding in scope.iter_mut() {
                    if binding.name == name {
                        binding.type_info = info.clone();
                    }
                }
            }
        });
        if changed == 0 {
            break;
        }
    }
}

/// Anything still pending after the fixed point is unresolvable (cycles,
/// unknown callees): demote to `Unknown` so no placeholder escapes the
/// build.
fn demote_remaining(scopes: &ScopeSet, returns: &ReturnTypeTable) -> usize {
    let mut demoted = 0usize;
    returns.rewrite(|_, info| {
        info.type_ref.is_placeholder().then(TypeInfo::unknown)
    });
    scopes.for_each_scope_mut(|scope| {
        for binding in scope.iter_mut() {
            if binding.type_info.type_ref.is_placeholder() {
                binding.type_info = TypeInfo::unknown();
                demoted += 1;
            }
        }
    });
    demoted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infer::{VariableBinding, VariableScope};

    fn pending_call(name: &str, callee: &str) -> VariableBinding {
        VariableBinding {
            name: name.to_owned(),
            type_info: TypeInfo {
                type_ref: TypeRef::PendingCall(callee.to_owned()),
                confidence: 0.7,
                source: TypeSource::Assignment,
            },
            assigned_from: String::new(),
            line: 1,
        }
    }

    fn pending_var(name: &str, source: &str) -> VariableBinding {
        VariableBinding {
            name: name.to_owned(),
            type_info: TypeInfo {
                type_ref: TypeRef::PendingVar(source.to_owned()),
                confidence: 0.9,
                source: TypeSource::Assignment,
            },
            assigned_from: String::new(),
            line: 2,
        }
    }

    #[test]
    fn pending_call_resolves_through_return_table() {
        let returns = ReturnTypeTable::new();
        returns.insert("m.make", TypeInfo::known("m.User", 0.9, TypeSource::ReturnType));

        let scopes = ScopeSet::new();
        let mut scope = VariableScope::new();
        scope.bind(pending_call("u", "m.make"));
        scopes.insert_function_scope("m.go", scope);

        resolve_placeholders(&scopes, &returns);

        let binding = scopes.lookup("x", Some("m.go"), "u").unwrap();
        assert_eq!(binding.type_info.known_fqn(), Some("m.User"));
        assert!((binding.type_info.confidence - 0.63).abs() < 1e-9);
    }

    #[test]
    fn pending_var_follows_same_scope() {
        let returns = ReturnTypeTable::new();
        let scopes = ScopeSet::new();
        let mut scope = VariableScope::new();
        scope.bind(VariableBinding {
            name: "a".to_owned(),
            type_info: TypeInfo::known("m.User", 0.95, TypeSource::Assignment),
            assigned_from: String::new(),
            line: 1,
        });
        scope.bind(pending_var("b", "a"));
        scope.bind(pending_var("c", "b"));
        scopes.insert_function_scope("m.f", scope);

        resolve_placeholders(&scopes, &returns);

        let c = scopes.lookup("x", Some("m.f"), "c").unwrap();
        assert_eq!(c.type_info.known_fqn(), Some("m.User"));
    }

    #[test]
    fn cycles_collapse_to_unknown() {
        let returns = ReturnTypeTable::new();
        returns.insert(
            "m.f",
            TypeInfo {
                type_ref: TypeRef::PendingCall("m.g".to_owned()),
                confidence: 0.7,
                source: TypeSource::ReturnType,
            },
        );
        returns.insert(
            "m.g",
            TypeInfo {
                type_ref: TypeRef::PendingCall("m.f".to_owned()),
                confidence: 0.7,
                source: TypeSource::ReturnType,
            },
        );

        let scopes = ScopeSet::new();
        let mut scope = VariableScope::new();
        scope.bind(pending_call("x", "m.f"));
        scopes.insert_function_scope("m.main", scope);

        let demoted = resolve_placeholders(&scopes, &returns);
        assert_eq!(demoted, 1);

        assert_eq!(returns.pending_count(), 0);
        let binding = scopes.lookup("m", Some("m.main"), "x").unwrap();
        assert_eq!(binding.type_info.type_ref, TypeRef::Unknown);
    }
}

//! Variable-assignment extraction.
//!
//! Records a [`VariableBinding`] for every assignment at module scope and
//! inside each function, classifying the right-hand side into a known type,
//! a pending ascription, or unknown.

use super::{expr_to_dotted, TypeNameResolver};
use crate::infer::{ScopeSet, TypeInfo, TypeRef, TypeSource, VariableBinding, VariableScope};
use crate::parser::ParsedModule;
use ruff_python_ast::{self as ast, Expr, Stmt};
use ruff_text_size::Ranged;

/// Extracts bindings for one parsed file into the shared scope set.
pub fn extract_assignments(
    parsed: &ParsedModule,
    module: &str,
    resolver: &TypeNameResolver<'_>,
    scopes: &ScopeSet,
) {
    let mut module_scope = VariableScope::new();
    walk_module_level(&parsed.module.body, parsed, module, None, resolver, scopes, &mut module_scope);
    scopes.insert_module_scope(module, module_scope);
}

#[allow(clippy::too_many_arguments)]
fn walk_module_level(
    stmts: &[Stmt],
    parsed: &ParsedModule,
    module: &str,
    class: Option<&str>,
    resolver: &TypeNameResolver<'_>,
    scopes: &ScopeSet,
    module_scope: &mut VariableScope,
) {
    for stmt in stmts {
        match stmt {
            Stmt::FunctionDef(func) => {
                let fqn = match class {
                    Some(class) => format!("{module}.{class}.{}", func.name),
                    None => format!("{module}.{}", func.name),
                };
                let mut scope = VariableScope::new();
                bind_parameter_annotations(func, resolver, parsed, &mut scope);
                walk_function_body(&func.body, parsed, resolver, &mut scope);
                scopes.insert_function_scope(&fqn, scope);
                // Nested defs publish their own scopes.
                collect_nested_functions(&func.body, parsed, module, class, resolver, scopes);
            }
            Stmt::ClassDef(class_def) => {
                let nested = match class {
                    Some(outer) => format!("{outer}.{}", class_def.name),
                    None => class_def.name.to_string(),
                };
                walk_module_level(
                    &class_def.body,
                    parsed,
                    module,
                    Some(&nested),
                    resolver,
                    scopes,
                    module_scope,
                );
            }
            Stmt::Assign(_) | Stmt::AnnAssign(_) if class.is_none() => {
                if let Some(binding) = classify_stmt(stmt, parsed, resolver) {
                    module_scope.bind(binding);
                }
            }
            _ => {}
        }
    }
}

fn collect_nested_functions(
    stmts: &[Stmt],
    parsed: &ParsedModule,
    module: &str,
    class: Option<&str>,
    resolver: &TypeNameResolver<'_>,
    scopes: &ScopeSet,
) {
    for stmt in stmts {
        if let Stmt::FunctionDef(func) = stmt {
            let fqn = match class {
                Some(class) => format!("{module}.{class}.{}", func.name),
                None => format!("{module}.{}", func.name),
            };
            let mut scope = VariableScope::new();
            bind_parameter_annotations(func, resolver, parsed, &mut scope);
            walk_function_body(&func.body, parsed, resolver, &mut scope);
            scopes.insert_function_scope(&fqn, scope);
            collect_nested_functions(&func.body, parsed, module, class, resolver, scopes);
        }
    }
}

/// Annotated parameters seed the function scope: `def f(u: User)` makes `u`
/// a `User` inside `f`.
fn bind_parameter_annotations(
    func: &ast::StmtFunctionDef,
    resolver: &TypeNameResolver<'_>,
    parsed: &ParsedModule,
    scope: &mut VariableScope,
) {
    let all_params = func
        .parameters
        .posonlyargs
        .iter()
        .chain(&func.parameters.args)
        .chain(&func.parameters.kwonlyargs);
    for param in all_params {
        let Some(annotation) = &param.parameter.annotation else {
            continue;
        };
        let Some(name) = expr_to_dotted(annotation) else {
            continue;
        };
        let Some(fqn) = resolver.resolve(&name) else {
            continue;
        };
        scope.bind(VariableBinding {
            name: param.parameter.name.to_string(),
            type_info: TypeInfo::known(fqn, 0.95, TypeSource::Annotation),
            assigned_from: name,
            line: parsed.line_of(&param.parameter),
        });
    }
}

fn walk_function_body(
    stmts: &[Stmt],
    parsed: &ParsedModule,
    resolver: &TypeNameResolver<'_>,
    scope: &mut VariableScope,
) {
    for stmt in stmts {
        match stmt {
            Stmt::Assign(_) | Stmt::AnnAssign(_) => {
                if let Some(binding) = classify_stmt(stmt, parsed, resolver) {
                    scope.bind(binding);
                }
            }
            Stmt::If(if_stmt) => {
                walk_function_body(&if_stmt.body, parsed, resolver, scope);
                for clause in &if_stmt.elif_else_clauses {
                    walk_function_body(&clause.body, parsed, resolver, scope);
                }
            }
            Stmt::For(for_stmt) => {
                walk_function_body(&for_stmt.body, parsed, resolver, scope);
                walk_function_body(&for_stmt.orelse, parsed, resolver, scope);
            }
            Stmt::While(while_stmt) => {
                walk_function_body(&while_stmt.body, parsed, resolver, scope);
            }
            Stmt::With(with_stmt) => {
                walk_function_body(&with_stmt.body, parsed, resolver, scope);
            }
            Stmt::Try(try_stmt) => {
                walk_function_body(&try_stmt.body, parsed, resolver, scope);
                for handler in &try_stmt.handlers {
                    let ast::ExceptHandler::ExceptHandler(h) = handler;
                    walk_function_body(&h.body, parsed, resolver, scope);
                }
                walk_function_body(&try_stmt.orelse, parsed, resolver, scope);
                walk_function_body(&try_stmt.finalbody, parsed, resolver, scope);
            }
            // Nested defs are handled by collect_nested_functions.
            _ => {}
        }
    }
}

fn classify_stmt(
    stmt: &Stmt,
    parsed: &ParsedModule,
    resolver: &TypeNameResolver<'_>,
) -> Option<VariableBinding> {
    match stmt {
        Stmt::Assign(assign) => {
            let Expr::Name(target) = assign.targets.first()? else {
                return None;
            };
            Some(make_binding(
                target.id.as_str(),
                &assign.value,
                parsed.line_of(assign),
                parsed,
                resolver,
            ))
        }
        Stmt::AnnAssign(assign) => {
            let Expr::Name(target) = &*assign.target else {
                return None;
            };
            let line = parsed.line_of(assign);
            // The annotation is authoritative when it resolves.
            if let Some(name) = expr_to_dotted(&assign.annotation) {
                if let Some(fqn) = resolver.resolve(&name) {
                    return Some(VariableBinding {
                        name: target.id.to_string(),
                        type_info: TypeInfo::known(fqn, 0.95, TypeSource::Annotation),
                        assigned_from: name,
                        line,
                    });
                }
            }
            let value = assign.value.as_deref()?;
            Some(make_binding(target.id.as_str(), value, line, parsed, resolver))
        }
        _ => None,
    }
}

fn make_binding(
    name: &str,
    value: &Expr,
    line: usize,
    parsed: &ParsedModule,
    resolver: &TypeNameResolver<'_>,
) -> VariableBinding {
    let assigned_from = parsed.snippet(value.range()).to_owned();
    VariableBinding {
        name: name.to_owned(),
        type_info: classify_rhs(value, resolver),
        assigned_from,
        line,
    }
}

/// Classifies a right-hand side into a type ascription.
pub(crate) fn classify_rhs(value: &Expr, resolver: &TypeNameResolver<'_>) -> TypeInfo {
    match value {
        Expr::StringLiteral(_) | Expr::FString(_) => {
            TypeInfo::known("builtins.str", 0.95, TypeSource::Annotation)
        }
        Expr::BytesLiteral(_) => TypeInfo::known("builtins.bytes", 0.95, TypeSource::Annotation),
        Expr::BooleanLiteral(_) => TypeInfo::known("builtins.bool", 0.95, TypeSource::Annotation),
        Expr::NumberLiteral(num) => {
            let fqn = match &num.value {
                ast::Number::Int(_) => "builtins.int",
                ast::Number::Float(_) => "builtins.float",
                ast::Number::Complex { .. } => "builtins.complex",
            };
            TypeInfo::known(fqn, 0.95, TypeSource::Annotation)
        }
        Expr::List(_) | Expr::ListComp(_) => {
            TypeInfo::known("builtins.list", 0.95, TypeSource::Annotation)
        }
        Expr::Dict(_) | Expr::DictComp(_) => {
            TypeInfo::known("builtins.dict", 0.95, TypeSource::Annotation)
        }
        Expr::Set(_) | Expr::SetComp(_) => {
            TypeInfo::known("builtins.set", 0.95, TypeSource::Annotation)
        }
        Expr::Tuple(_) => TypeInfo::known("builtins.tuple", 0.95, TypeSource::Annotation),
        Expr::Call(call) => {
            let Some(callee) = expr_to_dotted(&call.func) else {
                return TypeInfo::unknown();
            };
            // Constructor of a known class.
            if let Some(class_fqn) = resolver.resolves_to_class(&callee) {
                return TypeInfo::known(class_fqn, 0.95, TypeSource::Assignment);
            }
            // Builtin conversion with a fixed result type.
            if !callee.contains('.') {
                if let Some(fqn) = resolver.builtins.call_return_type(&callee) {
                    return TypeInfo::known(fqn, 0.9, TypeSource::Builtin);
                }
            }
            // Some other call: defer to its return type.
            let qualified = resolver
                .resolve(&callee)
                .unwrap_or_else(|| format!("{}.{callee}", resolver.module));
            TypeInfo {
                type_ref: TypeRef::PendingCall(qualified),
                confidence: 0.7,
                source: TypeSource::Assignment,
            }
        }
        Expr::Name(name) => TypeInfo {
            type_ref: TypeRef::PendingVar(name.id.to_string()),
            confidence: 0.9,
            source: TypeSource::Assignment,
        },
        _ => TypeInfo::unknown(),
    }
}

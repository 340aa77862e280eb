//! Return-type extraction.
//!
//! For every function: an explicit annotation wins; otherwise, if every
//! `return` yields a constructor call of one class, that class is the return
//! type; otherwise a single consistent call expression leaves a pending
//! ascription for the placeholder pass; anything else stays unknown.

use super::{expr_to_dotted, TypeNameResolver};
use crate::infer::{TypeInfo, TypeRef, TypeSource};
use crate::parser::ParsedModule;
use dashmap::DashMap;
use ruff_python_ast::{self as ast, Expr, Stmt};

/// Function FQN -> extracted return type. Shared across extraction workers.
#[derive(Debug, Default)]
pub struct ReturnTypeTable {
    map: DashMap<String, TypeInfo>,
}

impl ReturnTypeTable {
    /// Empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a function's return type.
    pub fn insert(&self, fqn: &str, info: TypeInfo) {
        self.map.insert(fqn.to_owned(), info);
    }

    /// Looks up a function's return type.
    #[must_use]
    pub fn get(&self, fqn: &str) -> Option<TypeInfo> {
        self.map.get(fqn).map(|r| r.value().clone())
    }

    /// Number of recorded return types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// True when nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Rewrites every entry through `f`. Placeholder resolution only.
    pub(crate) fn rewrite(&self, mut f: impl FnMut(&str, &TypeInfo) -> Option<TypeInfo>) -> usize {
        let mut changed = 0;
        let keys: Vec<String> = self.map.iter().map(|e| e.key().clone()).collect();
        for key in keys {
            let Some(current) = self.get(&key) else { continue };
            if let Some(next) = f(&key, &current) {
                self.map.insert(key, next);
                changed += 1;
            }
        }
        changed
    }

    /// Snapshot of entries with placeholder types, for diagnostics.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.map
            .iter()
            .filter(|e| e.value().type_ref.is_placeholder())
            .count()
    }
}

/// Extracts return types for every function in a parsed file.
pub fn extract_return_types(
    parsed: &ParsedModule,
    module: &str,
    resolver: &TypeNameResolver<'_>,
    table: &ReturnTypeTable,
) {
    walk_stmts(&parsed.module.body, module, None, resolver, table);
}

fn walk_stmts(
    stmts: &[Stmt],
    module: &str,
    class: Option<&str>,
    resolver: &TypeNameResolver<'_>,
    table: &ReturnTypeTable,
) {
    for stmt in stmts {
        match stmt {
            Stmt::FunctionDef(func) => {
                let fqn = match class {
                    Some(class) => format!("{module}.{class}.{}", func.name),
                    None => format!("{module}.{}", func.name),
                };
                if let Some(info) = return_type_of(func, resolver) {
                    table.insert(&fqn, info);
                }
                // Nested defs are functions in their own right.
                walk_stmts(&func.body, module, class, resolver, table);
            }
            Stmt::ClassDef(class_def) => {
                let nested = match class {
                    Some(outer) => format!("{outer}.{}", class_def.name),
                    None => class_def.name.to_string(),
                };
                walk_stmts(&class_def.body, module, Some(&nested), resolver, table);
            }
            _ => {}
        }
    }
}

fn return_type_of(func: &ast::StmtFunctionDef, resolver: &TypeNameResolver<'_>) -> Option<TypeInfo> {
    // 1. Explicit annotation.
    if let Some(annotation) = &func.returns {
        if let Some(name) = annotation_name(annotation) {
            if let Some(fqn) = resolver.resolve(&name) {
                return Some(TypeInfo::known(fqn, 0.95, TypeSource::Annotation));
            }
        }
    }

    // 2. Inspect the return statements themselves.
    let mut returns = Vec::new();
    collect_returns(&func.body, &mut returns);
    if returns.is_empty() {
        return None;
    }

    let mut callees = Vec::new();
    for value in &returns {
        match value {
            Expr::Call(call) => callees.push(expr_to_dotted(&call.func)?),
            _ => return None,
        }
    }

    // All returns call the same constructor -> that class.
    let first = &callees[0];
    if callees.iter().all(|c| c == first) {
        if let Some(class_fqn) = resolver.resolves_to_class(first) {
            return Some(TypeInfo::known(class_fqn, 0.9, TypeSource::ReturnType));
        }
        // A single consistent call: defer to the callee's return type.
        let qualified = resolver
            .resolve(first)
            .unwrap_or_else(|| format!("{}.{first}", resolver.module));
        return Some(TypeInfo {
            type_ref: TypeRef::PendingCall(qualified),
            confidence: 0.7,
            source: TypeSource::ReturnType,
        });
    }

    None
}

/// Collects `return` value expressions, not descending into nested defs.
fn collect_returns<'a>(stmts: &'a [Stmt], out: &mut Vec<&'a Expr>) {
    for stmt in stmts {
        match stmt {
            Stmt::Return(ret) => {
                if let Some(value) = &ret.value {
                    out.push(value);
                }
            }
            Stmt::If(if_stmt) => {
                collect_returns(&if_stmt.body, out);
                for clause in &if_stmt.elif_else_clauses {
                    collect_returns(&clause.body, out);
                }
            }
            Stmt::For(for_stmt) => {
                collect_returns(&for_stmt.body, out);
                collect_returns(&for_stmt.orelse, out);
            }
            Stmt::While(while_stmt) => {
                collect_returns(&while_stmt.body, out);
                collect_returns(&while_stmt.orelse, out);
            }
            Stmt::With(with_stmt) => collect_returns(&with_stmt.body, out),
            Stmt::Try(try_stmt) => {
                collect_returns(&try_stmt.body, out);
                for handler in &try_stmt.handlers {
                    let ast::ExceptHandler::ExceptHandler(h) = handler;
                    collect_returns(&h.body, out);
                }
                collect_returns(&try_stmt.orelse, out);
                collect_returns(&try_stmt.finalbody, out);
            }
            _ => {}
        }
    }
}

/// Dotted name of an annotation expression, unwrapping `Optional[X]`-style
/// subscripts to their base.
fn annotation_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Subscript(sub) => expr_to_dotted(&sub.value),
        Expr::StringLiteral(lit) => Some(lit.value.to_str().to_owned()),
        other => expr_to_dotted(other),
    }
}

//! Call-site extraction.
//!
//! Walks a function body and records every call expression with its dotted
//! target text, receiver, location, and argument snippets. Resolution to
//! FQNs happens later in the call-graph builder.

use super::expr_to_dotted;
use crate::parser::ParsedModule;
use ruff_python_ast::{self as ast, Expr, Stmt};
use ruff_text_size::Ranged;

/// An unresolved call site as it appears in source.
#[derive(Debug, Clone)]
pub struct RawCall {
    /// Dotted text of the callee (`os.system`, `self.repo.save`, `C().m`).
    pub target: String,
    /// Receiver text: everything before the last dot, empty for bare calls.
    pub object: String,
    /// 1-indexed line.
    pub line: usize,
    /// 0-indexed column.
    pub col: usize,
    /// Source snippets of the positional arguments.
    pub args: Vec<String>,
}

/// Extracts every call inside `func`, in textual order. Nested function
/// bodies are skipped; they get their own extraction.
#[must_use]
pub fn extract_calls(func: &ast::StmtFunctionDef, parsed: &ParsedModule) -> Vec<RawCall> {
    let mut out = Vec::new();
    walk_body(&func.body, parsed, &mut out);
    out
}

fn walk_body(stmts: &[Stmt], parsed: &ParsedModule, out: &mut Vec<RawCall>) {
    for stmt in stmts {
        walk_stmt(stmt, parsed, out);
    }
}

fn walk_stmt(stmt: &Stmt, parsed: &ParsedModule, out: &mut Vec<RawCall>) {
    match stmt {
        Stmt::Expr(expr_stmt) => walk_expr(&expr_stmt.value, parsed, out),
        Stmt::Assign(assign) => walk_expr(&assign.value, parsed, out),
        Stmt::AnnAssign(assign) => {
            if let Some(value) = &assign.value {
                walk_expr(value, parsed, out);
            }
        }
        Stmt::AugAssign(assign) => walk_expr(&assign.value, parsed, out),
        Stmt::Return(ret) => {
            if let Some(value) = &ret.value {
                walk_expr(value, parsed, out);
            }
        }
        Stmt::If(if_stmt) => {
            walk_expr(&if_stmt.test, parsed, out);
            walk_body(&if_stmt.body, parsed, out);
            for clause in &if_stmt.elif_else_clauses {
                if let Some(test) = &clause.test {
                    walk_expr(test, parsed, out);
                }
                walk_body(&clause.body, parsed, out);
            }
        }
        Stmt::While(while_stmt) => {
            walk_expr(&while_stmt.test, parsed, out);
            walk_body(&while_stmt.body, parsed, out);
            walk_body(&while_stmt.orelse, parsed, out);
        }
        Stmt::For(for_stmt) => {
            walk_expr(&for_stmt.iter, parsed, out);
            walk_body(&for_stmt.body, parsed, out);
            walk_body(&for_stmt.orelse, parsed, out);
        }
        Stmt::With(with_stmt) => {
            for item in &with_stmt.items {
                walk_expr(&item.context_expr, parsed, out);
            }
            walk_body(&with_stmt.body, parsed, out);
        }
        Stmt::Try(try_stmt) => {
            walk_body(&try_stmt.body, parsed, out);
            for handler in &try_stmt.handlers {
                let ast::ExceptHandler::ExceptHandler(h) = handler;
                walk_body(&h.body, parsed, out);
            }
            walk_body(&try_stmt.orelse, parsed, out);
            walk_body(&try_stmt.finalbody, parsed, out);
        }
        Stmt::Assert(assert_stmt) => walk_expr(&assert_stmt.test, parsed, out),
        Stmt::Raise(raise_stmt) => {
            if let Some(exc) = &raise_stmt.exc {
                walk_expr(exc, parsed, out);
            }
        }
        _ => {}
    }
}

fn walk_expr(expr: &Expr, parsed: &ParsedModule, out: &mut Vec<RawCall>) {
    if let Expr::Call(call) = expr {
        if let Some(target) = expr_to_dotted(&call.func) {
            let object = target
                .rfind('.')
                .map(|idx| target[..idx].to_owned())
                .unwrap_or_default();
            out.push(RawCall {
                object,
                line: parsed.line_of(call),
                col: parsed.col_of(call),
                args: call
                    .arguments
                    .args
                    .iter()
                    .map(|arg| parsed.snippet(arg.range()).to_owned())
                    .collect(),
                target,
            });
        }
        // Arguments and receiver can contain further calls.
        walk_expr(&call.func, parsed, out);
        for arg in &call.arguments.args {
            walk_expr(arg, parsed, out);
        }
        for kw in &call.arguments.keywords {
            walk_expr(&kw.value, parsed, out);
        }
        return;
    }
    match expr {
        Expr::Attribute(attr) => walk_expr(&attr.value, parsed, out),
        Expr::BinOp(binop) => {
            walk_expr(&binop.left, parsed, out);
            walk_expr(&binop.right, parsed, out);
        }
        Expr::BoolOp(boolop) => {
            for value in &boolop.values {
                walk_expr(value, parsed, out);
            }
        }
        Expr::UnaryOp(unary) => walk_expr(&unary.operand, parsed, out),
        Expr::Compare(cmp) => {
            walk_expr(&cmp.left, parsed, out);
            for comparator in &cmp.comparators {
                walk_expr(comparator, parsed, out);
            }
        }
        Expr::Subscript(sub) => {
            walk_expr(&sub.value, parsed, out);
            walk_expr(&sub.slice, parsed, out);
        }
        Expr::FString(fstring) => {
            for part in &fstring.value {
                if let ruff_python_ast::FStringPart::FString(f) = part {
                    for element in &f.elements {
                        if let ruff_python_ast::InterpolatedStringElement::Interpolation(interp) =
                            element
                        {
                            walk_expr(&interp.expression, parsed, out);
                        }
                    }
                }
            }
        }
        Expr::Tuple(tuple) => {
            for elt in &tuple.elts {
                walk_expr(elt, parsed, out);
            }
        }
        Expr::List(list) => {
            for elt in &list.elts {
                walk_expr(elt, parsed, out);
            }
        }
        Expr::Dict(dict) => {
            for item in &dict.items {
                if let Some(key) = &item.key {
                    walk_expr(key, parsed, out);
                }
                walk_expr(&item.value, parsed, out);
            }
        }
        Expr::If(ifexp) => {
            walk_expr(&ifexp.test, parsed, out);
            walk_expr(&ifexp.body, parsed, out);
            walk_expr(&ifexp.orelse, parsed, out);
        }
        Expr::Await(await_expr) => walk_expr(&await_expr.value, parsed, out),
        Expr::Starred(starred) => walk_expr(&starred.value, parsed, out),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;
    use std::path::Path;

    fn calls_of(source: &str) -> Vec<RawCall> {
        let parsed = parse_source(source, Path::new("t.py")).unwrap();
        let Stmt::FunctionDef(func) = &parsed.module.body[0] else {
            panic!("expected function");
        };
        extract_calls(func, &parsed)
    }

    #[test]
    fn bare_and_attribute_calls() {
        let calls = calls_of("def f(x):\n    input()\n    os.system(x)\n");
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].target, "input");
        assert_eq!(calls[0].object, "");
        assert_eq!(calls[1].target, "os.system");
        assert_eq!(calls[1].object, "os");
        assert_eq!(calls[1].args, ["x"]);
        assert_eq!(calls[1].line, 3);
    }

    #[test]
    fn nested_calls_are_all_recorded() {
        let calls = calls_of("def f():\n    sink(src())\n");
        let targets: Vec<_> = calls.iter().map(|c| c.target.as_str()).collect();
        assert_eq!(targets, ["sink", "src"]);
        assert_eq!(calls[0].args, ["src()"]);
    }

    #[test]
    fn chained_calls_keep_their_shape() {
        let calls = calls_of("def f():\n    QuerySet().filter().first()\n");
        let targets: Vec<_> = calls.iter().map(|c| c.target.as_str()).collect();
        assert!(targets.contains(&"QuerySet().filter().first"));
        assert!(targets.contains(&"QuerySet"));
    }

    #[test]
    fn self_calls_record_receiver() {
        let calls = calls_of("def f(self):\n    self.helper(1)\n");
        assert_eq!(calls[0].target, "self.helper");
        assert_eq!(calls[0].object, "self");
        assert_eq!(calls[0].args, ["1"]);
    }
}

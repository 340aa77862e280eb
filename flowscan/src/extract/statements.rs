//! Statement lowering.
//!
//! Flattens a function body into a textually ordered sequence of simple
//! statements, each with its defined variable, used variables, and call
//! target. This is the input shape for def-use chains and taint analysis;
//! nested function bodies are excluded because they are analyzed as their
//! own functions.

use super::{collect_names, expr_to_dotted};
use crate::utils::LineIndex;
use ruff_python_ast::{self as ast, Expr, Stmt};
use ruff_text_size::Ranged;
use smallvec::SmallVec;

/// Coarse statement classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// A plain (non-call) assignment.
    Assignment,
    /// A call, possibly with its result assigned.
    Call,
    /// A `return` statement.
    Return,
    /// An `if` test.
    Branch,
    /// A `for`/`while` header.
    Loop,
    /// Anything else that reads variables (`assert`, `raise`, ...).
    Other,
}

/// One lowered simple statement.
#[derive(Debug, Clone)]
pub struct Statement {
    /// 1-indexed source line.
    pub line: usize,
    /// Classification.
    pub kind: StatementKind,
    /// Variable defined here, if any.
    pub def: Option<String>,
    /// Variables read here.
    pub uses: SmallVec<[String; 4]>,
    /// Dotted text of the callee when this statement calls something.
    pub call_target: Option<String>,
}

/// Lowers a function body into a flat statement sequence.
#[must_use]
pub fn lower_function(func: &ast::StmtFunctionDef, line_index: &LineIndex) -> Vec<Statement> {
    let mut out = Vec::new();
    lower_body(&func.body, line_index, &mut out);
    out
}

fn lower_body(stmts: &[Stmt], line_index: &LineIndex, out: &mut Vec<Statement>) {
    for stmt in stmts {
        lower_stmt(stmt, line_index, out);
    }
}

#[allow(clippy::too_many_lines)]
fn lower_stmt(stmt: &Stmt, line_index: &LineIndex, out: &mut Vec<Statement>) {
    let line = line_index.line_of(stmt.range().start());
    match stmt {
        Stmt::Assign(assign) => {
            let def = assign_target_name(&assign.targets);
            out.push(lower_value_stmt(line, def, &assign.value));
        }
        Stmt::AnnAssign(assign) => {
            let def = name_of(&assign.target);
            match &assign.value {
                Some(value) => out.push(lower_value_stmt(line, def, value)),
                None => out.push(Statement {
                    line,
                    kind: StatementKind::Other,
                    def,
                    uses: SmallVec::new(),
                    call_target: None,
                }),
            }
        }
        Stmt::AugAssign(assign) => {
            let def = name_of(&assign.target);
            let mut statement = lower_value_stmt(line, def, &assign.value);
            // `x += y` both reads and writes x.
            if let Some(name) = name_of(&assign.target) {
                if !statement.uses.contains(&name) {
                    statement.uses.push(name);
                }
            }
            out.push(statement);
        }
        Stmt::Expr(expr_stmt) => {
            if let Expr::Call(call) = &*expr_stmt.value {
                out.push(call_statement(line, None, call));
            }
        }
        Stmt::Return(ret) => {
            let mut uses = SmallVec::new();
            let mut call_target = None;
            if let Some(value) = &ret.value {
                collect_names(value, &mut uses);
                if let Expr::Call(call) = &**value {
                    call_target = expr_to_dotted(&call.func);
                }
            }
            out.push(Statement {
                line,
                kind: StatementKind::Return,
                def: None,
                uses,
                call_target,
            });
        }
        Stmt::If(if_stmt) => {
            let mut uses = SmallVec::new();
            collect_names(&if_stmt.test, &mut uses);
            out.push(Statement {
                line,
                kind: StatementKind::Branch,
                def: None,
                uses,
                call_target: call_in_expr(&if_stmt.test),
            });
            lower_body(&if_stmt.body, line_index, out);
            for clause in &if_stmt.elif_else_clauses {
                if let Some(test) = &clause.test {
                    let mut uses = SmallVec::new();
                    collect_names(test, &mut uses);
                    out.push(Statement {
                        line: line_index.line_of(test.range().start()),
                        kind: StatementKind::Branch,
                        def: None,
                        uses,
                        call_target: call_in_expr(test),
                    });
                }
                lower_body(&clause.body, line_index, out);
            }
        }
        Stmt::While(while_stmt) => {
            let mut uses = SmallVec::new();
            collect_names(&while_stmt.test, &mut uses);
            out.push(Statement {
                line,
                kind: StatementKind::Loop,
                def: None,
                uses,
                call_target: call_in_expr(&while_stmt.test),
            });
            lower_body(&while_stmt.body, line_index, out);
            lower_body(&while_stmt.orelse, line_index, out);
        }
        Stmt::For(for_stmt) => {
            let mut uses = SmallVec::new();
            collect_names(&for_stmt.iter, &mut uses);
            out.push(Statement {
                line,
                kind: StatementKind::Loop,
                def: name_of(&for_stmt.target),
                uses,
                call_target: call_in_expr(&for_stmt.iter),
            });
            lower_body(&for_stmt.body, line_index, out);
            lower_body(&for_stmt.orelse, line_index, out);
        }
        Stmt::With(with_stmt) => {
            for item in &with_stmt.items {
                let mut uses = SmallVec::new();
                collect_names(&item.context_expr, &mut uses);
                let call_target = call_in_expr(&item.context_expr);
                let def = item.optional_vars.as_deref().and_then(name_of);
                out.push(Statement {
                    line: line_index.line_of(item.context_expr.range().start()),
                    kind: if call_target.is_some() {
                        StatementKind::Call
                    } else {
                        StatementKind::Other
                    },
                    def,
                    uses,
                    call_target,
                });
            }
            lower_body(&with_stmt.body, line_index, out);
        }
        Stmt::Try(try_stmt) => {
            lower_body(&try_stmt.body, line_index, out);
            for handler in &try_stmt.handlers {
                let ast::ExceptHandler::ExceptHandler(h) = handler;
                lower_body(&h.body, line_index, out);
            }
            lower_body(&try_stmt.orelse, line_index, out);
            lower_body(&try_stmt.finalbody, line_index, out);
        }
        Stmt::Assert(assert_stmt) => {
            let mut uses = SmallVec::new();
            collect_names(&assert_stmt.test, &mut uses);
            out.push(Statement {
                line,
                kind: StatementKind::Other,
                def: None,
                uses,
                call_target: call_in_expr(&assert_stmt.test),
            });
        }
        Stmt::Raise(raise_stmt) => {
            let mut uses = SmallVec::new();
            if let Some(exc) = &raise_stmt.exc {
                collect_names(exc, &mut uses);
            }
            out.push(Statement {
                line,
                kind: StatementKind::Other,
                def: None,
                uses,
                call_target: None,
            });
        }
        // Nested functions and classes are analyzed on their own.
        _ => {}
    }
}

/// Lowers `def = value` where the value decides the statement kind: a call
/// RHS makes this a Call statement (taint decays through it), anything else
/// a plain Assignment (taint copies through it).
fn lower_value_stmt(line: usize, def: Option<String>, value: &Expr) -> Statement {
    if let Expr::Call(call) = value {
        return call_statement(line, def, call);
    }
    let mut uses = SmallVec::new();
    collect_names(value, &mut uses);
    Statement {
        line,
        kind: StatementKind::Assignment,
        def,
        uses,
        call_target: call_in_expr(value),
    }
}

fn call_statement(line: usize, def: Option<String>, call: &ast::ExprCall) -> Statement {
    let mut uses = SmallVec::new();
    collect_names(&call.func, &mut uses);
    for arg in &call.arguments.args {
        collect_names(arg, &mut uses);
    }
    for kw in &call.arguments.keywords {
        collect_names(&kw.value, &mut uses);
    }
    Statement {
        line,
        kind: StatementKind::Call,
        def,
        uses,
        call_target: expr_to_dotted(&call.func),
    }
}

/// First call target inside an arbitrary expression, if any.
fn call_in_expr(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Call(call) => expr_to_dotted(&call.func),
        Expr::BinOp(binop) => call_in_expr(&binop.left).or_else(|| call_in_expr(&binop.right)),
        Expr::Compare(cmp) => call_in_expr(&cmp.left),
        Expr::UnaryOp(unary) => call_in_expr(&unary.operand),
        Expr::Await(await_expr) => call_in_expr(&await_expr.value),
        _ => None,
    }
}

fn assign_target_name(targets: &[Expr]) -> Option<String> {
    targets.first().and_then(name_of)
}

fn name_of(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Name(name) => Some(name.id.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;
    use std::path::Path;

    fn lower(source: &str) -> Vec<Statement> {
        let parsed = parse_source(source, Path::new("t.py")).unwrap();
        let Stmt::FunctionDef(func) = &parsed.module.body[0] else {
            panic!("expected function");
        };
        lower_function(func, &parsed.line_index)
    }

    #[test]
    fn assignment_vs_call_kinds() {
        let stmts = lower("def f():\n    x = input()\n    y = x\n    eval(y)\n");
        assert_eq!(stmts.len(), 3);

        assert_eq!(stmts[0].kind, StatementKind::Call);
        assert_eq!(stmts[0].def.as_deref(), Some("x"));
        assert_eq!(stmts[0].call_target.as_deref(), Some("input"));
        assert_eq!(stmts[0].line, 2);

        assert_eq!(stmts[1].kind, StatementKind::Assignment);
        assert_eq!(stmts[1].uses.as_slice(), ["x"]);

        assert_eq!(stmts[2].kind, StatementKind::Call);
        assert_eq!(stmts[2].def, None);
        assert_eq!(stmts[2].uses.as_slice(), ["y"]);
    }

    #[test]
    fn branches_and_loops_flatten_in_order() {
        let stmts = lower(
            "def f(n):\n    if n:\n        a = n\n    for i in range(n):\n        b = i\n",
        );
        let kinds: Vec<_> = stmts.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            [
                StatementKind::Branch,
                StatementKind::Assignment,
                StatementKind::Loop,
                StatementKind::Assignment,
            ]
        );
        // Textual order is preserved.
        let lines: Vec<_> = stmts.iter().map(|s| s.line).collect();
        assert!(lines.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn method_receiver_is_a_use() {
        let stmts = lower("def f(x):\n    y = x.upper()\n");
        assert_eq!(stmts[0].kind, StatementKind::Call);
        assert_eq!(stmts[0].call_target.as_deref(), Some("x.upper"));
        assert!(stmts[0].uses.contains(&"x".to_owned()));
    }

    #[test]
    fn with_items_lower_to_calls() {
        let stmts = lower("def f(p):\n    with open(p) as fh:\n        data = fh.read()\n");
        assert_eq!(stmts[0].kind, StatementKind::Call);
        assert_eq!(stmts[0].def.as_deref(), Some("fh"));
        assert_eq!(stmts[0].call_target.as_deref(), Some("open"));
        assert_eq!(stmts[1].def.as_deref(), Some("data"));
    }

    #[test]
    fn nested_functions_are_excluded() {
        let stmts = lower("def f():\n    def g():\n        x = input()\n    return 1\n");
        assert_eq!(stmts.len(), 1);
        assert_eq!(stmts[0].kind, StatementKind::Return);
    }

    #[test]
    fn augmented_assignment_reads_its_target() {
        let stmts = lower("def f(x):\n    acc = \"\"\n    acc += x\n");
        assert_eq!(stmts[1].def.as_deref(), Some("acc"));
        assert!(stmts[1].uses.contains(&"acc".to_owned()));
        assert!(stmts[1].uses.contains(&"x".to_owned()));
    }
}

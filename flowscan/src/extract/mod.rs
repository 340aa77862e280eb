//! Extraction passes over parsed files.
//!
//! Each extractor is a pure per-file job: statements, return types, variable
//! assignments, and class attributes. All of them work from the same parsed
//! tree and publish into concurrent tables, so the builder can run them in
//! parallel over files within a pass.

mod assignments;
mod attributes;
mod calls;
mod returns;
mod statements;

pub use assignments::extract_assignments;
pub use attributes::{extract_class_attributes, ClassAttrRegistry, ClassAttribute, ClassAttributes};
pub use calls::{extract_calls, RawCall};
pub use returns::{extract_return_types, ReturnTypeTable};
pub use statements::{lower_function, Statement, StatementKind};

use crate::catalog::BuiltinCatalog;
use crate::imports::ImportMap;
use ruff_python_ast::Expr;
use rustc_hash::FxHashSet;
use smallvec::SmallVec;

/// Renders an expression as a dotted target string, the textual form used
/// for call targets and receivers. Calls render as `name()` so chained
/// targets like `C().build` keep their shape without dragging arguments
/// along. Returns `None` for expressions with no dotted form (literals,
/// subscripts, lambdas).
#[must_use]
pub fn expr_to_dotted(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Name(name) => Some(name.id.to_string()),
        Expr::Attribute(attr) => {
            let base = expr_to_dotted(&attr.value)?;
            Some(format!("{base}.{}", attr.attr))
        }
        Expr::Call(call) => {
            let base = expr_to_dotted(&call.func)?;
            Some(format!("{base}()"))
        }
        _ => None,
    }
}

/// Collects every identifier read inside `expr` into `out`.
pub fn collect_names(expr: &Expr, out: &mut SmallVec<[String; 4]>) {
    match expr {
        Expr::Name(name) => {
            let id = name.id.to_string();
            if !out.contains(&id) {
                out.push(id);
            }
        }
        Expr::Attribute(attr) => collect_names(&attr.value, out),
        Expr::Call(call) => {
            collect_names(&call.func, out);
            for arg in &call.arguments.args {
                collect_names(arg, out);
            }
            for kw in &call.arguments.keywords {
                collect_names(&kw.value, out);
            }
        }
        Expr::BinOp(binop) => {
            collect_names(&binop.left, out);
            collect_names(&binop.right, out);
        }
        Expr::BoolOp(boolop) => {
            for value in &boolop.values {
                collect_names(value, out);
            }
        }
        Expr::UnaryOp(unary) => collect_names(&unary.operand, out),
        Expr::Compare(cmp) => {
            collect_names(&cmp.left, out);
            for comparator in &cmp.comparators {
                collect_names(comparator, out);
            }
        }
        Expr::Subscript(sub) => {
            collect_names(&sub.value, out);
            collect_names(&sub.slice, out);
        }
        Expr::FString(fstring) => {
            for part in &fstring.value {
                if let ruff_python_ast::FStringPart::FString(f) = part {
                    for element in &f.elements {
                        if let ruff_python_ast::InterpolatedStringElement::Interpolation(interp) =
                            element
                        {
                            collect_names(&interp.expression, out);
                        }
                    }
                }
            }
        }
        Expr::Tuple(tuple) => {
            for elt in &tuple.elts {
                collect_names(elt, out);
            }
        }
        Expr::List(list) => {
            for elt in &list.elts {
                collect_names(elt, out);
            }
        }
        Expr::Set(set) => {
            for elt in &set.elts {
                collect_names(elt, out);
            }
        }
        Expr::Dict(dict) => {
            for item in &dict.items {
                if let Some(key) = &item.key {
                    collect_names(key, out);
                }
                collect_names(&item.value, out);
            }
        }
        Expr::If(ifexp) => {
            collect_names(&ifexp.test, out);
            collect_names(&ifexp.body, out);
            collect_names(&ifexp.orelse, out);
        }
        Expr::Starred(starred) => collect_names(&starred.value, out),
        Expr::Await(await_expr) => collect_names(&await_expr.value, out),
        _ => {}
    }
}

/// Resolves a type *name* (annotation text, constructor callee) to an FQN
/// using builtins, the file's imports, and the project class index.
pub struct TypeNameResolver<'a> {
    /// Module containing the name.
    pub module: &'a str,
    /// The file's import map.
    pub imports: &'a ImportMap,
    /// Builtin catalog.
    pub builtins: &'a BuiltinCatalog,
    /// FQNs of every class indexed in the project.
    pub classes: &'a FxHashSet<String>,
}

impl TypeNameResolver<'_> {
    /// Resolves `name` to a type FQN, or `None` when nothing claims it.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<String> {
        if let Some(bare) = builtin_type_fqn(name) {
            return Some(bare.to_owned());
        }
        if let Some((base, rest)) = name.split_once('.') {
            if let Some(mapped) = self.imports.resolve(base) {
                return Some(format!("{mapped}.{rest}"));
            }
            let local = format!("{}.{name}", self.module);
            if self.classes.contains(&local) {
                return Some(local);
            }
            return Some(name.to_owned());
        }
        if let Some(mapped) = self.imports.resolve(name) {
            return Some(mapped.to_owned());
        }
        let local = format!("{}.{name}", self.module);
        if self.classes.contains(&local) {
            return Some(local);
        }
        None
    }

    /// True when `name` resolves to an indexed project class.
    #[must_use]
    pub fn resolves_to_class(&self, name: &str) -> Option<String> {
        let fqn = self.resolve(name)?;
        self.classes.contains(&fqn).then_some(fqn)
    }
}

/// FQN for a builtin type name used in annotations and constructors.
#[must_use]
fn builtin_type_fqn(name: &str) -> Option<&'static str> {
    Some(match name {
        "str" => "builtins.str",
        "int" => "builtins.int",
        "float" => "builtins.float",
        "bool" => "builtins.bool",
        "bytes" => "builtins.bytes",
        "list" | "List" => "builtins.list",
        "dict" | "Dict" => "builtins.dict",
        "set" | "Set" => "builtins.set",
        "tuple" | "Tuple" => "builtins.tuple",
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;
    use std::path::Path;

    fn first_expr(source: &str) -> Expr {
        let parsed = parse_source(source, Path::new("t.py")).unwrap();
        match parsed.module.body.into_iter().next().unwrap() {
            ruff_python_ast::Stmt::Expr(e) => *e.value,
            other => panic!("expected expression statement, got {other:?}"),
        }
    }

    #[test]
    fn dotted_rendering() {
        assert_eq!(expr_to_dotted(&first_expr("os.system")).as_deref(), Some("os.system"));
        assert_eq!(
            expr_to_dotted(&first_expr("User().save")).as_deref(),
            Some("User().save")
        );
        assert_eq!(expr_to_dotted(&first_expr("a[0]")), None);
    }

    #[test]
    fn name_collection_walks_nested_expressions() {
        let mut names = SmallVec::new();
        collect_names(&first_expr("f(x) + g(y, key=z)"), &mut names);
        assert!(names.contains(&"x".to_owned()));
        assert!(names.contains(&"y".to_owned()));
        assert!(names.contains(&"z".to_owned()));
    }

    #[test]
    fn fstring_interpolations_are_uses() {
        let mut names = SmallVec::new();
        collect_names(&first_expr("f\"hello {user}\""), &mut names);
        assert_eq!(names.as_slice(), ["user"]);
    }
}

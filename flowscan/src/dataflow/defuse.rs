//! Def-use chains.
//!
//! Folded over a function's statement sequence in textual order: for every
//! variable, the line it was (last) defined and every line that reads it.

use crate::extract::Statement;
use std::collections::BTreeMap;

/// Definition and uses of one variable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefUse {
    /// Line of the (most recent) definition, 0 when only ever read.
    pub defined_at: usize,
    /// Lines reading the variable, in textual order.
    pub used_at: Vec<usize>,
}

/// Per-function def-use chain.
#[derive(Debug, Clone, Default)]
pub struct DefUseChain {
    vars: BTreeMap<String, DefUse>,
}

impl DefUseChain {
    /// Builds the chain from a statement sequence.
    #[must_use]
    pub fn build(statements: &[Statement]) -> Self {
        let mut vars: BTreeMap<String, DefUse> = BTreeMap::new();
        for stmt in statements {
            for used in &stmt.uses {
                vars.entry(used.clone()).or_default().used_at.push(stmt.line);
            }
            if let Some(def) = &stmt.def {
                vars.entry(def.clone()).or_default().defined_at = stmt.line;
            }
        }
        Self { vars }
    }

    /// Looks up a variable.
    #[must_use]
    pub fn get(&self, var: &str) -> Option<&DefUse> {
        self.vars.get(var)
    }

    /// Number of tracked variables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// True when no variables were seen.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Iterates variables in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &DefUse)> {
        self.vars.iter().map(|(name, du)| (name.as_str(), du))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;
    use ruff_python_ast::Stmt;
    use std::path::Path;

    fn chain_of(source: &str) -> DefUseChain {
        let parsed = parse_source(source, Path::new("t.py")).unwrap();
        let Stmt::FunctionDef(func) = &parsed.module.body[0] else {
            panic!("expected function");
        };
        DefUseChain::build(&crate::extract::lower_function(func, &parsed.line_index))
    }

    #[test]
    fn tracks_defs_and_uses() {
        let chain = chain_of("def f():\n    x = input()\n    y = x\n    eval(y)\n");
        let x = chain.get("x").unwrap();
        assert_eq!(x.defined_at, 2);
        assert_eq!(x.used_at, [3]);
        let y = chain.get("y").unwrap();
        assert_eq!(y.defined_at, 3);
        assert_eq!(y.used_at, [4]);
    }

    #[test]
    fn redefinition_updates_def_line() {
        let chain = chain_of("def f():\n    x = 1\n    x = 2\n    print(x)\n");
        assert_eq!(chain.get("x").unwrap().defined_at, 3);
        assert_eq!(chain.get("x").unwrap().used_at, [4]);
    }

    #[test]
    fn empty_statement_list_is_empty_chain() {
        let chain = DefUseChain::build(&[]);
        assert!(chain.is_empty());
    }
}

//! Python builtin functions and builtin-type method typing.

use rustc_hash::FxHashSet;

/// Builtin function names. Bare calls to these resolve to `builtins.<name>`.
const BUILTIN_NAMES: &[&str] = &[
    "abs", "all", "any", "ascii", "bin", "bool", "bytearray", "bytes", "callable", "chr",
    "classmethod", "compile", "complex", "delattr", "dict", "dir", "divmod", "enumerate", "eval",
    "exec", "filter", "float", "format", "frozenset", "getattr", "globals", "hasattr", "hash",
    "help", "hex", "id", "input", "int", "isinstance", "issubclass", "iter", "len", "list",
    "locals", "map", "max", "memoryview", "min", "next", "object", "oct", "open", "ord", "pow",
    "print", "property", "range", "repr", "reversed", "round", "set", "setattr", "slice",
    "sorted", "staticmethod", "str", "sum", "super", "tuple", "type", "vars", "zip",
];

/// Catalog of Python builtins with method-level return typing for the
/// builtin container and string types.
#[derive(Debug)]
pub struct BuiltinCatalog {
    names: FxHashSet<&'static str>,
}

impl Default for BuiltinCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl BuiltinCatalog {
    /// Builds the catalog.
    #[must_use]
    pub fn new() -> Self {
        Self {
            names: BUILTIN_NAMES.iter().copied().collect(),
        }
    }

    /// True when `name` is a Python builtin function.
    #[must_use]
    pub fn is_builtin(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// FQN for a builtin function name.
    #[must_use]
    pub fn fqn(&self, name: &str) -> Option<String> {
        self.is_builtin(name).then(|| format!("builtins.{name}"))
    }

    /// True when `fqn` names one of the builtin value types.
    #[must_use]
    pub fn is_builtin_type(&self, fqn: &str) -> bool {
        matches!(
            fqn,
            "builtins.str"
                | "builtins.bytes"
                | "builtins.int"
                | "builtins.float"
                | "builtins.bool"
                | "builtins.list"
                | "builtins.dict"
                | "builtins.set"
                | "builtins.tuple"
        )
    }

    /// Return type of calling `method` on an instance of the builtin type
    /// `type_fqn`. Only the common, unambiguous methods are mapped.
    #[must_use]
    pub fn method_return_type(&self, type_fqn: &str, method: &str) -> Option<&'static str> {
        match type_fqn {
            "builtins.str" => match method {
                "upper" | "lower" | "strip" | "lstrip" | "rstrip" | "title" | "capitalize"
                | "casefold" | "replace" | "format" | "join" | "zfill" | "ljust" | "rjust"
                | "center" | "expandtabs" | "swapcase" | "translate" | "removeprefix"
                | "removesuffix" => Some("builtins.str"),
                "split" | "rsplit" | "splitlines" => Some("builtins.list"),
                "partition" | "rpartition" => Some("builtins.tuple"),
                "encode" => Some("builtins.bytes"),
                "startswith" | "endswith" | "isdigit" | "isalpha" | "isalnum" | "isspace"
                | "isupper" | "islower" => Some("builtins.bool"),
                "find" | "rfind" | "index" | "rindex" | "count" => Some("builtins.int"),
                _ => None,
            },
            "builtins.bytes" => match method {
                "decode" => Some("builtins.str"),
                "hex" => Some("builtins.str"),
                "split" => Some("builtins.list"),
                _ => None,
            },
            "builtins.list" => match method {
                "copy" => Some("builtins.list"),
                "pop" => None,
                "count" | "index" => Some("builtins.int"),
                _ => None,
            },
            "builtins.dict" => match method {
                "keys" | "values" | "items" => Some("builtins.list"),
                "copy" => Some("builtins.dict"),
                _ => None,
            },
            "builtins.set" => match method {
                "union" | "intersection" | "difference" | "copy" => Some("builtins.set"),
                _ => None,
            },
            "builtins.int" | "builtins.float" => match method {
                "bit_length" => Some("builtins.int"),
                "is_integer" => Some("builtins.bool"),
                "hex" => Some("builtins.str"),
                _ => None,
            },
            _ => None,
        }
    }

    /// Return type of a builtin *function* call, for the conversions whose
    /// result type is fixed.
    #[must_use]
    pub fn call_return_type(&self, name: &str) -> Option<&'static str> {
        match name {
            "str" | "repr" | "format" | "input" | "hex" | "oct" | "bin" | "ascii" | "chr" => {
                Some("builtins.str")
            }
            "int" | "len" | "ord" | "id" | "hash" => Some("builtins.int"),
            "float" => Some("builtins.float"),
            "bool" | "isinstance" | "issubclass" | "callable" | "hasattr" | "any" | "all" => {
                Some("builtins.bool")
            }
            "list" | "sorted" | "dir" => Some("builtins.list"),
            "dict" | "vars" | "globals" | "locals" => Some("builtins.dict"),
            "set" | "frozenset" => Some("builtins.set"),
            "tuple" | "divmod" => Some("builtins.tuple"),
            "bytes" | "bytearray" => Some("builtins.bytes"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_builtins() {
        let catalog = BuiltinCatalog::new();
        assert!(catalog.is_builtin("eval"));
        assert!(catalog.is_builtin("input"));
        assert!(!catalog.is_builtin("os"));
        assert_eq!(catalog.fqn("len").as_deref(), Some("builtins.len"));
    }

    #[test]
    fn str_methods_are_typed() {
        let catalog = BuiltinCatalog::new();
        assert_eq!(
            catalog.method_return_type("builtins.str", "upper"),
            Some("builtins.str")
        );
        assert_eq!(
            catalog.method_return_type("builtins.str", "split"),
            Some("builtins.list")
        );
        assert_eq!(catalog.method_return_type("builtins.str", "nope"), None);
    }

    #[test]
    fn conversion_calls_are_typed() {
        let catalog = BuiltinCatalog::new();
        assert_eq!(catalog.call_return_type("input"), Some("builtins.str"));
        assert_eq!(catalog.call_return_type("len"), Some("builtins.int"));
        assert_eq!(catalog.call_return_type("print"), None);
    }
}

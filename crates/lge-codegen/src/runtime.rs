//! Primitives every module declares. Their bodies live in the native runtime
//! library that compiled programs link against.

use lge_ast::ast::TypeKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeFn {
    pub name: &'static str,
    pub params: &'static [TypeKind],
    pub ret: TypeKind,
}

use TypeKind::{Char, Float, Int, Str};

/// Declared in this order, ahead of any user function.
pub const RUNTIME_FUNCTIONS: &[RuntimeFn] = &[
    RuntimeFn { name: "str_print", params: &[Str], ret: Int },
    RuntimeFn { name: "str_read", params: &[Int], ret: Str },
    RuntimeFn { name: "str_len", params: &[Str], ret: Int },
    RuntimeFn { name: "str_at", params: &[Str, Int], ret: Char },
    RuntimeFn { name: "str_sub", params: &[Str, Int, Int], ret: Str },
    RuntimeFn { name: "str_find", params: &[Str, Str], ret: Int },
    RuntimeFn { name: "int_to_str", params: &[Int], ret: Str },
    RuntimeFn { name: "str_to_int", params: &[Str], ret: Int },
    RuntimeFn { name: "float_to_str", params: &[Float], ret: Str },
    RuntimeFn { name: "str_to_float", params: &[Str], ret: Float },
    RuntimeFn { name: "str_cmp", params: &[Str, Str], ret: Int },
];

pub fn lookup(name: &str) -> Option<&'static RuntimeFn> {
    RUNTIME_FUNCTIONS.iter().find(|f| f.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_has_unique_names() {
        for (i, f) in RUNTIME_FUNCTIONS.iter().enumerate() {
            assert!(RUNTIME_FUNCTIONS[..i].iter().all(|g| g.name != f.name), "{}", f.name);
        }
        assert_eq!(RUNTIME_FUNCTIONS.len(), 11);
    }

    #[test]
    fn lookup_finds_str_at() {
        let f = lookup("str_at").unwrap();
        assert_eq!(f.params, &[Str, Int]);
        assert_eq!(f.ret, Char);
        assert!(lookup("printf").is_none());
    }
}

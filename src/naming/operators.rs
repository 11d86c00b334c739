//! Operator and conversion-function names.

use super::case::underscore;
use crate::decl::{TypeBase, TypeRef};

/// How an operator is bound when it is a free function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorForm {
    /// `self OP other`
    Binary,
    /// `self OP= other; return self;`
    Compound,
    /// `OP self`
    Unary,
    /// Not expressible as a free-function wrapper.
    Other,
}

/// The symbol of an operator function name: `operator+=` to `+=`.
pub fn operator_symbol(name: &str) -> Option<&str> {
    let rest = name.strip_prefix("operator")?;
    let symbol = rest.trim();
    let first = symbol.chars().next()?;
    if first.is_alphanumeric() || first == '_' {
        // `operator new`, `operator delete`, conversions.
        return None;
    }
    Some(symbol)
}

/// Target name for an operator. `arity` counts operands other than the object itself,
/// so a member `operator-()` and a free `operator-(const T&)` both have arity 0.
pub fn operator_name(symbol: &str, arity: usize) -> Option<String> {
    let name = match (symbol, arity) {
        ("=", _) => "assign",
        ("+=", _) => "assign_plus",
        ("-=", _) => "assign_minus",
        ("*=", _) => "assign_multiply",
        ("/=", _) => "assign_divide",
        ("%=", _) => "assign_modulus",
        ("&=", _) => "assign_and",
        ("|=", _) => "assign_or",
        ("^=", _) => "assign_xor",
        ("<<=", _) => "assign_left_shift",
        (">>=", _) => "assign_right_shift",
        ("&&", _) => "logical_and",
        ("||", _) => "logical_or",
        ("()", _) => "call",
        ("[]", _) => "[]",
        ("->", _) => "arrow",
        ("->*", _) => return None,
        ("++", 0) => "increment",
        ("++", _) => "increment_post",
        ("--", 0) => "decrement",
        ("--", _) => "decrement_post",
        ("*", 0) => "dereference",
        ("-", 0) => "-@",
        ("+", 0) => "+@",
        ("&", 0) => return None,
        (",", _) => return None,
        (
            "+" | "-" | "*" | "/" | "%" | "&" | "|" | "^" | "~" | "<<" | ">>" | "==" | "!=" | "<"
            | ">" | "<=" | ">=" | "!" | "<=>",
            _,
        ) => symbol,
        _ => return None,
    };
    Some(name.to_string())
}

pub fn operator_form(symbol: &str, arity: usize) -> OperatorForm {
    match symbol {
        "+=" | "-=" | "*=" | "/=" | "%=" | "&=" | "|=" | "^=" | "<<=" | ">>=" => {
            OperatorForm::Compound
        }
        "~" | "!" => OperatorForm::Unary,
        "+" | "-" | "*" if arity == 0 => OperatorForm::Unary,
        "+" | "-" | "*" | "/" | "%" | "&" | "|" | "^" | "<<" | ">>" | "==" | "!=" | "<" | ">"
        | "<=" | ">=" | "&&" | "||" | "<=>" => OperatorForm::Binary,
        _ => OperatorForm::Other,
    }
}

/// Target name of a conversion function to `target`: `to_i`, `to_f`, `to_s`, or
/// `to_` plus the last segment of the type name.
pub fn conversion_name(target: &TypeRef) -> String {
    let decayed = target.decayed();
    match &decayed.base {
        TypeBase::Builtin(b) if decayed.indirections.is_empty() => {
            let suffix = match b.as_str() {
                "int" => "i",
                "long" => "l",
                "long long" => "i64",
                "short" => "i16",
                "unsigned int" => "u",
                "unsigned long" => "ul",
                "unsigned long long" => "u64",
                "unsigned short" => "u16",
                "float" => "f32",
                "double" => "f",
                "long double" => "ld",
                "bool" => "bool",
                "char" | "signed char" => "char",
                "unsigned char" => "uchar",
                "size_t" | "std::size_t" => "size",
                other => return format!("to_{}", underscore(other.rsplit("::").next().unwrap_or(other))),
            };
            format!("to_{suffix}")
        }
        TypeBase::Builtin(_) if decayed.is_char_base() && decayed.pointer_depth() == 1 => "to_s".to_string(),
        TypeBase::Named(path) => {
            if path.without_args() == "std::string" || path.without_args() == "string" {
                return "to_s".to_string();
            }
            let last = path.last().map(|s| s.name.as_str()).unwrap_or_default();
            let mut name = format!("to_{}", underscore(last));
            if decayed.pointer_depth() > 0 {
                name.push_str("_ptr");
            }
            name
        }
        _ => format!("to_{}", underscore(&decayed.render()).replace(|c: char| !c.is_alphanumeric() && c != '_', "_")),
    }
}

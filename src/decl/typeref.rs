//! C++ type spellings.
//!
//! [`TypeRef::parse`] turns a spelling such as `const std::vector<Ns::Item*>&` or
//! `void (*)(int, void*)` into a structured value. Names are kept as written; the
//! qualifier rewrites them in place and [`TypeRef::render`] prints the result with a
//! fixed spacing so that two spellings of the same type render identically.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Cannot parse type '{spelling}': {reason}")]
pub struct TypeParseError {
    pub spelling: String,
    pub reason: String,
}

/// Builtin keyword types. Order matters only for rendering multi-word builtins.
const BUILTIN_WORDS: &[&str] = &[
    "void", "bool", "char", "wchar_t", "char8_t", "char16_t", "char32_t", "short", "int",
    "long", "signed", "unsigned", "float", "double", "__int128", "auto",
];

/// Library typedefs that always denote fundamental scalars.
const BUILTIN_TYPEDEFS: &[&str] = &[
    "size_t", "ssize_t", "ptrdiff_t", "intptr_t", "uintptr_t", "intmax_t", "uintmax_t",
    "int8_t", "int16_t", "int32_t", "int64_t", "uint8_t", "uint16_t", "uint32_t", "uint64_t",
    "int_least8_t", "int_least16_t", "int_least32_t", "int_least64_t", "uint_least8_t",
    "uint_least16_t", "uint_least32_t", "uint_least64_t", "int_fast8_t", "int_fast16_t",
    "int_fast32_t", "int_fast64_t", "uint_fast8_t", "uint_fast16_t", "uint_fast32_t",
    "uint_fast64_t", "nullptr_t",
];

pub fn is_builtin_typedef(name: &str) -> bool {
    let name = name.strip_prefix("::").unwrap_or(name);
    let name = name.strip_prefix("std::").unwrap_or(name);
    BUILTIN_TYPEDEFS.contains(&name)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NameSegment {
    pub name: String,
    pub args: Option<Vec<TemplateArg>>,
}

impl NameSegment {
    pub fn plain(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: None,
        }
    }
}

/// A possibly qualified name such as `::a::B<int>::c`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NamePath {
    pub global: bool,
    pub segments: Vec<NameSegment>,
}

impl NamePath {
    pub fn from_qualified(name: &str) -> Self {
        let global = name.starts_with("::");
        let segments = name
            .trim_start_matches("::")
            .split("::")
            .filter(|s| !s.is_empty())
            .map(NameSegment::plain)
            .collect();
        Self { global, segments }
    }

    /// Segment names without template arguments.
    pub fn names(&self) -> Vec<&str> {
        self.segments.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn last(&self) -> Option<&NameSegment> {
        self.segments.last()
    }

    /// Template arguments attached to the last segment, if any.
    pub fn template_args(&self) -> Option<&[TemplateArg]> {
        self.segments.last().and_then(|s| s.args.as_deref())
    }

    pub fn without_args(&self) -> String {
        self.names().join("::")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TemplateArg {
    Type(TypeRef),
    /// A non-type argument (expression) as written.
    Value(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionSig {
    pub ret: TypeRef,
    pub params: Vec<TypeRef>,
    pub is_variadic: bool,
    /// `const` qualifier of a member function type.
    pub is_const: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeBase {
    Builtin(String),
    Named(NamePath),
    Function(Box<FunctionSig>),
    /// Could not be parsed; rendered verbatim.
    Opaque(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Indirection {
    Pointer { is_const: bool },
    LValueRef,
    RValueRef,
    MemberPointer { class: NamePath },
}

/// A type as used by a parameter, return value, field, base or template argument.
///
/// Indirections are listed innermost first: `const int* const&` is
/// `[Pointer { is_const: true }, LValueRef]` over a const `int`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeRef {
    pub spelling: String,
    pub base: TypeBase,
    pub is_const: bool,
    pub is_volatile: bool,
    pub indirections: Vec<Indirection>,
    pub array_dims: Vec<Option<String>>,
    /// Qualified spelling with typedef names kept, used in generated code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualified: Option<String>,
    /// Qualified spelling with every typedef expanded, used for equality.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical: Option<String>,
    /// Declaration named by the base type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved: Option<crate::types::DeclId>,
    /// Every declaration reachable from this type, through template arguments
    /// and typedef chains.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub refs: Vec<crate::types::DeclId>,
    /// True when the type reaches an incomplete declaration through a pointer,
    /// reference or template argument.
    #[serde(default)]
    pub incomplete: bool,
    /// Preferred typedef spelling, when one names exactly this type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

impl TypeRef {
    fn with_base(spelling: &str, base: TypeBase) -> Self {
        Self {
            spelling: spelling.to_string(),
            base,
            is_const: false,
            is_volatile: false,
            indirections: Vec::new(),
            array_dims: Vec::new(),
            qualified: None,
            canonical: None,
            resolved: None,
            refs: Vec::new(),
            incomplete: false,
            alias: None,
        }
    }

    pub fn builtin(name: &str) -> Self {
        Self::with_base(name, TypeBase::Builtin(name.to_string()))
    }

    pub fn named(path: NamePath) -> Self {
        let mut ty = Self::with_base("", TypeBase::Named(path));
        ty.spelling = ty.render();
        ty
    }

    pub fn parse(spelling: &str) -> Result<TypeRef, TypeParseError> {
        let tokens = tokenize(spelling).map_err(|reason| TypeParseError {
            spelling: spelling.to_string(),
            reason,
        })?;
        let mut parser = TypeParser { tokens, pos: 0 };
        let mut ty = parser.parse_type().map_err(|reason| TypeParseError {
            spelling: spelling.to_string(),
            reason,
        })?;
        if parser.pos != parser.tokens.len() {
            return Err(TypeParseError {
                spelling: spelling.to_string(),
                reason: format!("unexpected '{}'", parser.tokens[parser.pos]),
            });
        }
        ty.spelling = spelling.trim().to_string();
        Ok(ty)
    }

    /// Parse, falling back to an opaque type that renders as written.
    pub fn parse_lossy(spelling: &str) -> TypeRef {
        Self::parse(spelling)
            .unwrap_or_else(|_| Self::with_base(spelling, TypeBase::Opaque(spelling.trim().to_string())))
    }

    pub fn is_opaque(&self) -> bool {
        matches!(self.base, TypeBase::Opaque(_))
    }

    pub fn is_void(&self) -> bool {
        self.indirections.is_empty()
            && self.array_dims.is_empty()
            && matches!(&self.base, TypeBase::Builtin(b) if b == "void")
    }

    pub fn is_bool(&self) -> bool {
        self.indirections.is_empty()
            && self.array_dims.is_empty()
            && matches!(&self.base, TypeBase::Builtin(b) if b == "bool")
    }

    /// Builtin scalar or character type, excluding `void`.
    pub fn is_fundamental_base(&self) -> bool {
        match &self.base {
            TypeBase::Builtin(b) => b != "void" && b != "auto",
            _ => false,
        }
    }

    pub fn is_char_base(&self) -> bool {
        matches!(&self.base, TypeBase::Builtin(b) if b == "char" || b == "wchar_t")
    }

    pub fn pointer_depth(&self) -> usize {
        self.indirections
            .iter()
            .filter(|i| matches!(i, Indirection::Pointer { .. }))
            .count()
    }

    pub fn is_reference(&self) -> bool {
        matches!(
            self.indirections.last(),
            Some(Indirection::LValueRef | Indirection::RValueRef)
        )
    }

    pub fn is_rvalue_reference(&self) -> bool {
        matches!(self.indirections.last(), Some(Indirection::RValueRef))
    }

    pub fn is_indirect(&self) -> bool {
        !self.indirections.is_empty()
    }

    /// Function pointer or function type (not a member function pointer).
    pub fn is_function_pointer(&self) -> bool {
        matches!(self.base, TypeBase::Function(_))
            && !self
                .indirections
                .iter()
                .any(|i| matches!(i, Indirection::MemberPointer { .. }))
    }

    pub fn is_member_function_pointer(&self) -> bool {
        matches!(self.base, TypeBase::Function(_))
            && matches!(self.indirections.first(), Some(Indirection::MemberPointer { .. }))
    }

    /// The named path of the base type, if it is a named type.
    pub fn name_path(&self) -> Option<&NamePath> {
        match &self.base {
            TypeBase::Named(path) => Some(path),
            _ => None,
        }
    }

    /// Base type without cv, indirections or arrays.
    pub fn value_type(&self) -> TypeRef {
        let mut ty = Self::with_base("", self.base.clone());
        ty.spelling = ty.render();
        ty
    }

    /// Same type with top-level reference and const removed (`const T&` to `T`).
    pub fn decayed(&self) -> TypeRef {
        let mut ty = self.clone();
        if ty.is_reference() {
            ty.indirections.pop();
        }
        if ty.indirections.is_empty() {
            ty.is_const = false;
        } else if let Some(Indirection::Pointer { is_const }) = ty.indirections.last_mut() {
            *is_const = false;
        }
        ty.qualified = None;
        ty.canonical = None;
        ty.spelling = ty.render();
        ty
    }

    /// Spelling for generated code: qualified when resolved, as written otherwise.
    pub fn emitted(&self) -> String {
        self.qualified.clone().unwrap_or_else(|| self.render())
    }

    /// Visit every name path, including those nested in template arguments,
    /// function signatures and member pointers.
    pub fn visit_names_mut(&mut self, f: &mut dyn FnMut(&mut NamePath)) {
        match &mut self.base {
            TypeBase::Named(path) => visit_path_mut(path, f),
            TypeBase::Function(sig) => {
                sig.ret.visit_names_mut(f);
                for p in &mut sig.params {
                    p.visit_names_mut(f);
                }
            }
            TypeBase::Builtin(_) | TypeBase::Opaque(_) => {}
        }
        for ind in &mut self.indirections {
            if let Indirection::MemberPointer { class } = ind {
                visit_path_mut(class, f);
            }
        }
    }

    pub fn visit_names(&self, f: &mut dyn FnMut(&NamePath)) {
        match &self.base {
            TypeBase::Named(path) => visit_path(path, f),
            TypeBase::Function(sig) => {
                sig.ret.visit_names(f);
                for p in &sig.params {
                    p.visit_names(f);
                }
            }
            TypeBase::Builtin(_) | TypeBase::Opaque(_) => {}
        }
        for ind in &self.indirections {
            if let Indirection::MemberPointer { class } = ind {
                visit_path(class, f);
            }
        }
    }

    /// Visit every non-type template argument expression.
    pub fn visit_values_mut(&mut self, f: &mut dyn FnMut(&mut String)) {
        match &mut self.base {
            TypeBase::Named(path) => {
                for seg in &mut path.segments {
                    for arg in seg.args.iter_mut().flatten() {
                        match arg {
                            TemplateArg::Type(t) => t.visit_values_mut(f),
                            TemplateArg::Value(v) => f(v),
                        }
                    }
                }
            }
            TypeBase::Function(sig) => {
                sig.ret.visit_values_mut(f);
                for p in &mut sig.params {
                    p.visit_values_mut(f);
                }
            }
            TypeBase::Builtin(_) | TypeBase::Opaque(_) => {}
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_into(&mut out);
        out
    }

    fn render_into(&self, out: &mut String) {
        if let TypeBase::Function(sig) = &self.base {
            sig.ret.render_into(out);
            if !self.indirections.is_empty() {
                out.push('(');
                render_indirections(&self.indirections, out);
                out.push(')');
            }
            render_params(sig, out);
            return;
        }
        if self.is_const {
            out.push_str("const ");
        }
        if self.is_volatile {
            out.push_str("volatile ");
        }
        match &self.base {
            TypeBase::Builtin(b) => out.push_str(b),
            TypeBase::Named(path) => render_path(path, out),
            TypeBase::Opaque(s) => out.push_str(s),
            TypeBase::Function(_) => {}
        }
        render_indirections(&self.indirections, out);
        for dim in &self.array_dims {
            out.push('[');
            if let Some(d) = dim {
                out.push_str(d);
            }
            out.push(']');
        }
    }
}

fn visit_path_mut(path: &mut NamePath, f: &mut dyn FnMut(&mut NamePath)) {
    f(path);
    for seg in &mut path.segments {
        for arg in seg.args.iter_mut().flatten() {
            if let TemplateArg::Type(t) = arg {
                t.visit_names_mut(f);
            }
        }
    }
}

fn visit_path(path: &NamePath, f: &mut dyn FnMut(&NamePath)) {
    f(path);
    for seg in &path.segments {
        for arg in seg.args.iter().flatten() {
            if let TemplateArg::Type(t) = arg {
                t.visit_names(f);
            }
        }
    }
}

fn render_indirections(indirections: &[Indirection], out: &mut String) {
    for ind in indirections {
        match ind {
            Indirection::Pointer { is_const } => {
                out.push('*');
                if *is_const {
                    out.push_str(" const");
                }
            }
            Indirection::LValueRef => out.push('&'),
            Indirection::RValueRef => out.push_str("&&"),
            Indirection::MemberPointer { class } => {
                render_path(class, out);
                out.push_str("::*");
            }
        }
    }
}

fn render_params(sig: &FunctionSig, out: &mut String) {
    out.push('(');
    let mut parts: Vec<String> = sig.params.iter().map(TypeRef::render).collect();
    if sig.is_variadic {
        parts.push("...".to_string());
    }
    out.push_str(&parts.join(", "));
    out.push(')');
    if sig.is_const {
        out.push_str(" const");
    }
}

pub fn render_path(path: &NamePath, out: &mut String) {
    if path.global {
        out.push_str("::");
    }
    for (i, seg) in path.segments.iter().enumerate() {
        if i > 0 {
            out.push_str("::");
        }
        out.push_str(&seg.name);
        if let Some(args) = &seg.args {
            out.push('<');
            let rendered: Vec<String> = args.iter().map(TemplateArg::render).collect();
            out.push_str(&rendered.join(", "));
            out.push('>');
        }
    }
}

impl TemplateArg {
    pub fn render(&self) -> String {
        match self {
            TemplateArg::Type(t) => t.render(),
            TemplateArg::Value(v) => v.clone(),
        }
    }

    /// Parse a single template argument as written.
    pub fn parse(text: &str) -> TemplateArg {
        let text = text.trim();
        if looks_like_value(text) {
            return TemplateArg::Value(normalize_expr(text));
        }
        match TypeRef::parse(text) {
            Ok(t) => TemplateArg::Type(t),
            Err(_) => TemplateArg::Value(normalize_expr(text)),
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl fmt::Display for NamePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        render_path(self, &mut out);
        f.write_str(&out)
    }
}

fn looks_like_value(text: &str) -> bool {
    let first = text.chars().next().unwrap_or(' ');
    first.is_ascii_digit()
        || matches!(first, '-' | '+' | '(' | '\'' | '"' | '!' | '~')
        || text == "true"
        || text == "false"
        || text == "nullptr"
        || text.contains(|c: char| matches!(c, '+' | '/' | '%' | '|' | '^' | '?' | '.'))
}

/// Collapse whitespace in an expression so equal expressions compare equal.
pub fn normalize_expr(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Tok {
    Ident(String),
    Literal(String),
    Punct(&'static str),
}

impl fmt::Display for Tok {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tok::Ident(s) | Tok::Literal(s) => f.write_str(s),
            Tok::Punct(p) => f.write_str(p),
        }
    }
}

const PUNCTS: &[&str] = &[
    "...", "::", "&&", "->", "<", ">", ",", "*", "&", "(", ")", "[", "]", "=", "+", "-", "/",
    "%", "|", "^", "!", "~", "?", ":", ".", "{", "}",
];

fn tokenize(text: &str) -> Result<Vec<Tok>, String> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    'outer: while i < bytes.len() {
        let c = bytes[i] as char;
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c.is_ascii_alphabetic() || c == '_' {
            let start = i;
            while i < bytes.len() && ((bytes[i] as char).is_ascii_alphanumeric() || bytes[i] == b'_') {
                i += 1;
            }
            tokens.push(Tok::Ident(text[start..i].to_string()));
            continue;
        }
        if c.is_ascii_digit() {
            let start = i;
            while i < bytes.len()
                && ((bytes[i] as char).is_ascii_alphanumeric() || bytes[i] == b'.' || bytes[i] == b'\'')
            {
                i += 1;
            }
            tokens.push(Tok::Literal(text[start..i].to_string()));
            continue;
        }
        if c == '"' || c == '\'' {
            let start = i;
            i += 1;
            while i < bytes.len() && bytes[i] as char != c {
                if bytes[i] == b'\\' {
                    i += 1;
                }
                i += 1;
            }
            i = (i + 1).min(bytes.len());
            tokens.push(Tok::Literal(text[start..i].to_string()));
            continue;
        }
        for p in PUNCTS {
            if text[i..].starts_with(p) {
                tokens.push(Tok::Punct(p));
                i += p.len();
                continue 'outer;
            }
        }
        return Err(format!("unexpected character '{c}'"));
    }
    Ok(tokens)
}

struct TypeParser {
    tokens: Vec<Tok>,
    pos: usize,
}

impl TypeParser {
    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Tok> {
        self.tokens.get(self.pos + offset)
    }

    fn is_punct(&self, p: &str) -> bool {
        matches!(self.peek(), Some(Tok::Punct(q)) if *q == p)
    }

    fn eat_punct(&mut self, p: &str) -> bool {
        if self.is_punct(p) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, p: &str) -> Result<(), String> {
        if self.eat_punct(p) {
            Ok(())
        } else {
            Err(format!(
                "expected '{p}', found '{}'",
                self.peek().map(|t| t.to_string()).unwrap_or_default()
            ))
        }
    }

    fn parse_type(&mut self) -> Result<TypeRef, String> {
        let mut is_const = false;
        let mut is_volatile = false;
        let mut builtin: Vec<String> = Vec::new();
        let mut named: Option<NamePath> = None;

        loop {
            match self.peek().cloned() {
                Some(Tok::Ident(word)) => match word.as_str() {
                    "const" => {
                        is_const = true;
                        self.pos += 1;
                    }
                    "volatile" => {
                        is_volatile = true;
                        self.pos += 1;
                    }
                    "struct" | "class" | "enum" | "union" | "typename" => self.pos += 1,
                    w if BUILTIN_WORDS.contains(&w) && named.is_none() => {
                        builtin.push(word.clone());
                        self.pos += 1;
                    }
                    _ if named.is_none() && builtin.is_empty() => {
                        named = Some(self.parse_name_path()?);
                    }
                    _ => break,
                },
                Some(Tok::Punct("::")) if named.is_none() && builtin.is_empty() => {
                    named = Some(self.parse_name_path()?);
                }
                _ => break,
            }
        }

        let base = match (named, builtin.is_empty()) {
            (Some(path), true) => {
                let plain = path.segments.iter().all(|s| s.args.is_none());
                if plain && is_builtin_typedef(&path.without_args()) {
                    TypeBase::Builtin(path.to_string())
                } else {
                    TypeBase::Named(path)
                }
            }
            (None, false) => TypeBase::Builtin(normalize_builtin(&builtin)),
            (None, true) => return Err("missing type name".to_string()),
            (Some(_), false) => return Err("mixed builtin and named type".to_string()),
        };

        let mut ty = TypeRef::with_base("", base);
        ty.is_const = is_const;
        ty.is_volatile = is_volatile;
        self.parse_declarator(ty)
    }

    /// Pointer/reference operators, optional declarator name, arrays, and
    /// parenthesized function declarators.
    fn parse_declarator(&mut self, mut ty: TypeRef) -> Result<TypeRef, String> {
        self.parse_ptr_ops(&mut ty.indirections)?;

        if self.is_punct("(") {
            if self.starts_inner_declarator() {
                self.pos += 1;
                let mut inner = Vec::new();
                self.parse_ptr_ops(&mut inner)?;
                if matches!(self.peek(), Some(Tok::Ident(_))) {
                    self.pos += 1;
                }
                self.expect_punct(")")?;
                let sig = self.parse_function_params(ty)?;
                let mut fty = TypeRef::with_base("", TypeBase::Function(Box::new(sig)));
                fty.indirections = inner;
                return Ok(fty);
            }
            let sig = self.parse_function_params(ty)?;
            return Ok(TypeRef::with_base("", TypeBase::Function(Box::new(sig))));
        }

        if matches!(self.peek(), Some(Tok::Ident(_))) {
            self.pos += 1;
        }
        while self.eat_punct("[") {
            let mut dim = String::new();
            while let Some(tok) = self.peek() {
                if matches!(tok, Tok::Punct("]")) {
                    break;
                }
                dim.push_str(&tok.to_string());
                self.pos += 1;
            }
            self.expect_punct("]")?;
            ty.array_dims.push(if dim.is_empty() { None } else { Some(dim) });
        }
        Ok(ty)
    }

    fn starts_inner_declarator(&self) -> bool {
        match self.peek_at(1) {
            Some(Tok::Punct("*")) | Some(Tok::Punct("&")) | Some(Tok::Punct("&&")) => true,
            Some(Tok::Ident(_)) | Some(Tok::Punct("::")) => {
                // `(Class::*)` member pointer
                let mut i = self.pos + 1;
                while let Some(tok) = self.tokens.get(i) {
                    match tok {
                        Tok::Ident(_) | Tok::Punct("::") => i += 1,
                        Tok::Punct("*") => return matches!(self.tokens.get(i - 1), Some(Tok::Punct("::"))),
                        _ => return false,
                    }
                }
                false
            }
            _ => false,
        }
    }

    fn parse_ptr_ops(&mut self, out: &mut Vec<Indirection>) -> Result<(), String> {
        loop {
            if self.eat_punct("*") {
                let mut is_const = false;
                while let Some(Tok::Ident(w)) = self.peek() {
                    match w.as_str() {
                        "const" => is_const = true,
                        "volatile" | "__restrict" | "restrict" | "__restrict__" => {}
                        _ => break,
                    }
                    self.pos += 1;
                }
                out.push(Indirection::Pointer { is_const });
            } else if self.eat_punct("&&") {
                out.push(Indirection::RValueRef);
            } else if self.eat_punct("&") {
                out.push(Indirection::LValueRef);
            } else if self.member_pointer_ahead() {
                let mut segments = Vec::new();
                let global = self.eat_punct("::");
                while let Some(Tok::Ident(name)) = self.peek().cloned() {
                    self.pos += 1;
                    segments.push(NameSegment::plain(name));
                    self.expect_punct("::")?;
                    if self.eat_punct("*") {
                        break;
                    }
                }
                out.push(Indirection::MemberPointer {
                    class: NamePath { global, segments },
                });
            } else {
                return Ok(());
            }
        }
    }

    fn member_pointer_ahead(&self) -> bool {
        let mut i = self.pos;
        let mut saw_scope = false;
        while let Some(tok) = self.tokens.get(i) {
            match tok {
                Tok::Ident(_) => i += 1,
                Tok::Punct("::") => {
                    saw_scope = true;
                    i += 1;
                }
                Tok::Punct("*") => return saw_scope && matches!(self.tokens.get(i - 1), Some(Tok::Punct("::"))),
                _ => return false,
            }
        }
        false
    }

    fn parse_function_params(&mut self, ret: TypeRef) -> Result<FunctionSig, String> {
        self.expect_punct("(")?;
        let mut params = Vec::new();
        let mut is_variadic = false;
        if !self.eat_punct(")") {
            loop {
                if self.eat_punct("...") {
                    is_variadic = true;
                } else {
                    let mut p = self.parse_type()?;
                    p.spelling = p.render();
                    if !(p.is_void() && params.is_empty() && self.is_punct(")")) {
                        params.push(p);
                    }
                }
                if self.eat_punct(")") {
                    break;
                }
                self.expect_punct(",")?;
            }
        }
        let mut is_const = false;
        while let Some(Tok::Ident(w)) = self.peek() {
            match w.as_str() {
                "const" => is_const = true,
                "noexcept" | "volatile" => {}
                _ => break,
            }
            self.pos += 1;
        }
        let mut ret = ret;
        ret.spelling = ret.render();
        Ok(FunctionSig {
            ret,
            params,
            is_variadic,
            is_const,
        })
    }

    fn parse_name_path(&mut self) -> Result<NamePath, String> {
        let global = self.eat_punct("::");
        let mut segments = Vec::new();
        loop {
            let name = match self.peek().cloned() {
                Some(Tok::Ident(name)) => name,
                other => {
                    return Err(format!(
                        "expected identifier, found '{}'",
                        other.map(|t| t.to_string()).unwrap_or_default()
                    ));
                }
            };
            self.pos += 1;
            let args = if self.is_punct("<") {
                Some(self.parse_template_args()?)
            } else {
                None
            };
            segments.push(NameSegment { name, args });
            // Stop before `Class::*`, which belongs to a member pointer.
            if self.is_punct("::") && !matches!(self.peek_at(1), Some(Tok::Punct("*"))) {
                self.pos += 1;
                if matches!(self.peek(), Some(Tok::Ident(w)) if w == "template") {
                    self.pos += 1;
                }
                continue;
            }
            break;
        }
        Ok(NamePath { global, segments })
    }

    fn parse_template_args(&mut self) -> Result<Vec<TemplateArg>, String> {
        self.expect_punct("<")?;
        let mut args = Vec::new();
        if self.eat_punct(">") {
            return Ok(args);
        }
        loop {
            let start = self.pos;
            let mut depth = 0usize;
            while let Some(tok) = self.peek() {
                match tok {
                    Tok::Punct("<") | Tok::Punct("(") | Tok::Punct("[") => depth += 1,
                    Tok::Punct(")") | Tok::Punct("]") => depth = depth.saturating_sub(1),
                    Tok::Punct(">") if depth == 0 => break,
                    Tok::Punct(">") => depth -= 1,
                    Tok::Punct(",") if depth == 0 => break,
                    _ => {}
                }
                self.pos += 1;
            }
            let slice = &self.tokens[start..self.pos];
            if slice.is_empty() {
                return Err("empty template argument".to_string());
            }
            args.push(template_arg_from_tokens(slice));
            if self.eat_punct(">") {
                return Ok(args);
            }
            self.expect_punct(",")?;
        }
    }
}

fn template_arg_from_tokens(tokens: &[Tok]) -> TemplateArg {
    let text = join_tokens(tokens);
    if looks_like_value(&text) {
        return TemplateArg::Value(text);
    }
    let mut parser = TypeParser {
        tokens: tokens.to_vec(),
        pos: 0,
    };
    match parser.parse_type() {
        Ok(mut ty) if parser.pos == tokens.len() => {
            ty.spelling = ty.render();
            TemplateArg::Type(ty)
        }
        _ => TemplateArg::Value(text),
    }
}

/// Re-join tokens with the spacing an expression would be written with.
fn join_tokens(tokens: &[Tok]) -> String {
    let mut out = String::new();
    let mut prev_word = false;
    for tok in tokens {
        let word = matches!(tok, Tok::Ident(_) | Tok::Literal(_));
        if word && prev_word {
            out.push(' ');
        }
        out.push_str(&tok.to_string());
        prev_word = word;
    }
    out
}

fn normalize_builtin(words: &[String]) -> String {
    let signed = words.iter().any(|w| w == "signed");
    let unsigned = words.iter().any(|w| w == "unsigned");
    let longs = words.iter().filter(|w| *w == "long").count();
    let has = |name: &str| words.iter().any(|w| w == name);

    let core = if has("char") {
        "char"
    } else if has("short") {
        "short"
    } else if has("double") {
        if longs > 0 {
            return "long double".to_string();
        }
        "double"
    } else if longs == 2 {
        "long long"
    } else if longs == 1 {
        "long"
    } else if has("int") || signed || unsigned {
        "int"
    } else {
        return words.join(" ");
    };

    if unsigned {
        format!("unsigned {core}")
    } else if signed && core == "char" {
        "signed char".to_string()
    } else {
        core.to_string()
    }
}

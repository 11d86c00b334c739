//! tree-sitter-cpp header reader
//!
//! Turns a header into the raw declaration tree. Only declarations are read; function
//! bodies, initializer expressions and preprocessor logic are skipped. Annotation macros
//! (export and deprecation macros from the configuration) are blanked out before parsing
//! and re-attached to the declaration they precede.

use crate::ast::{
    Access, DeclarationProvider, RawBase, RawDecl, RawHeader, RawKind, RawLocation, RawParam,
    RawTemplateParam, TemplateParamKind,
};
use crate::error::{ProviderError, ProviderResult};
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, trace, warn};
use tree_sitter::{Node, Parser};

/// Macro values that can be bound as constants.
static LITERAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(?:[-+]?(?:0[xX][0-9a-fA-F']+|[0-9][0-9a-zA-Z'.+-]*)|"(?:[^"\\]|\\.)*"|'(?:[^'\\]|\\.)+')$"#)
        .expect("valid literal regex")
});

/// `class EXPORT_ME Foo {` or `struct API Foo : Base`: an unknown macro between the
/// class key and the name.
static ANNOTATED_RECORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:class|struct|union)\s+([A-Za-z_][A-Za-z0-9_]*)\s+([A-Za-z_][A-Za-z0-9_]*)\s*(?:final\s*)?[:{]")
        .expect("valid record annotation regex")
});

/// Words that can never name a variable.
const KEYWORDS: &[&str] = &[
    "class", "struct", "union", "enum", "namespace", "template", "typename", "public",
    "private", "protected", "virtual", "friend", "using", "typedef", "operator", "return",
    "const", "static", "inline", "extern", "constexpr", "final", "override", "explicit",
];

pub struct CppHeaderParser {
    parser: Parser,
    annotations: Option<Regex>,
}

impl std::fmt::Debug for CppHeaderParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CppHeaderParser")
            .field("language", &"C++")
            .field("annotations", &self.annotations.as_ref().map(Regex::as_str))
            .finish()
    }
}

impl CppHeaderParser {
    pub fn new() -> ProviderResult<Self> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_cpp::LANGUAGE.into())
            .map_err(|e| ProviderError::ParserInit {
                reason: format!("Failed to set C++ language: {e}"),
            })?;
        Ok(Self {
            parser,
            annotations: None,
        })
    }

    /// Treat these macro names (and an optional argument list after them) as
    /// annotations of the following declaration.
    pub fn with_annotation_macros(mut self, macros: &[String]) -> ProviderResult<Self> {
        if macros.is_empty() {
            self.annotations = None;
            return Ok(self);
        }
        let names: Vec<String> = macros.iter().map(|m| regex::escape(m)).collect();
        let pattern = format!(r"\b(?:{})\b(?:\s*\((?:[^()]|\([^()]*\))*\))?", names.join("|"));
        self.annotations = Some(Regex::new(&pattern).map_err(|e| ProviderError::ParserInit {
            reason: format!("invalid annotation macro list: {e}"),
        })?);
        Ok(self)
    }

    /// Parse header text. `path` is only recorded.
    pub fn parse_source(&mut self, path: &Path, code: &str) -> ProviderResult<RawHeader> {
        let (prepared, mut annotations) = match &self.annotations {
            Some(regex) => strip_annotations(code, regex),
            None => (code.to_string(), Vec::new()),
        };
        let (prepared, record_tags) = strip_record_annotations(&prepared);
        annotations.extend(record_tags);
        annotations.sort_by_key(|a| a.offset);
        let tree = self
            .parser
            .parse(&prepared, None)
            .ok_or_else(|| ProviderError::NoTree {
                path: path.to_path_buf(),
            })?;
        let root = tree.root_node();
        if root.has_error() {
            warn!(
                "[cpp] {} has syntax errors; unparsable regions are skipped",
                path.display()
            );
        }

        let mut reader = Reader {
            code: &prepared,
            annotations: &annotations,
            macros: Vec::new(),
        };
        let mut decls = Vec::new();
        reader.items(root, &Scope::namespace(), &mut decls);
        decls.append(&mut reader.macros);
        debug!("[cpp] {} top-level declarations in {}", decls.len(), path.display());
        Ok(RawHeader {
            path: path.to_path_buf(),
            decls,
        })
    }
}

impl DeclarationProvider for CppHeaderParser {
    fn provide(&mut self, path: &Path) -> ProviderResult<RawHeader> {
        let code = std::fs::read_to_string(path).map_err(|source| ProviderError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        self.parse_source(path, &code)
    }

    fn name(&self) -> &'static str {
        "cpp"
    }
}

#[derive(Debug, Clone)]
struct Annotation {
    offset: usize,
    text: String,
}

/// Replace annotation macros with spaces, keeping byte offsets and line numbers.
fn strip_annotations(code: &str, regex: &Regex) -> (String, Vec<Annotation>) {
    let mut out = code.to_string();
    let mut found = Vec::new();
    for m in regex.find_iter(code) {
        let line_start = code[..m.start()].rfind('\n').map_or(0, |i| i + 1);
        if code[line_start..].trim_start().starts_with('#') {
            continue;
        }
        let blank: String = m
            .as_str()
            .bytes()
            .map(|b| if b == b'\n' { '\n' } else { ' ' })
            .collect();
        out.replace_range(m.range(), &blank);
        found.push(Annotation {
            offset: m.start(),
            text: squeeze(m.as_str()),
        });
    }
    (out, found)
}

/// Blank the macro in `class MACRO Name {`, keeping it as an annotation of the record.
fn strip_record_annotations(code: &str) -> (String, Vec<Annotation>) {
    let mut out = code.to_string();
    let mut found = Vec::new();
    for caps in ANNOTATED_RECORD.captures_iter(code) {
        let (Some(tag), Some(name)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        if name.as_str() == "final" || KEYWORDS.contains(&tag.as_str()) {
            continue;
        }
        let line_start = code[..tag.start()].rfind('\n').map_or(0, |i| i + 1);
        if code[line_start..].trim_start().starts_with(['#', '/']) {
            continue;
        }
        trace!("[cpp] treating '{}' as an annotation of {}", tag.as_str(), name.as_str());
        out.replace_range(tag.range(), &" ".repeat(tag.len()));
        found.push(Annotation {
            offset: tag.start(),
            text: tag.as_str().to_string(),
        });
    }
    (out, found)
}

/// Where a declaration sits.
#[derive(Debug, Clone)]
struct Scope {
    /// Name of the enclosing record; `None` in a namespace.
    class: Option<String>,
}

impl Scope {
    fn namespace() -> Self {
        Self { class: None }
    }

    fn record(name: &str) -> Self {
        Self {
            class: Some(name.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct TemplateInfo {
    params: Vec<RawTemplateParam>,
    variadic: bool,
}

/// Declaration specifiers shared by every declarator of one declaration.
#[derive(Debug, Default)]
struct Specifiers<'t> {
    ty: Option<Node<'t>>,
    /// `const`, `volatile` and the type, in source order.
    spelling: String,
    is_static: bool,
    is_inline: bool,
    is_explicit: bool,
    is_constexpr: bool,
    attributes: Vec<String>,
}

/// A declarator taken apart.
#[derive(Debug, Clone, Copy)]
struct Parts<'t> {
    /// The declarator without its initializer.
    core: Node<'t>,
    name: Option<Node<'t>>,
    function: Option<Node<'t>>,
    cast: Option<Node<'t>>,
    value: Option<Node<'t>>,
}

struct Reader<'a> {
    code: &'a str,
    annotations: &'a [Annotation],
    macros: Vec<RawDecl>,
}

impl<'a> Reader<'a> {
    fn text(&self, node: Node<'_>) -> &'a str {
        &self.code[node.byte_range()]
    }

    /// Text of `outer` with `inner` cut out.
    fn text_without(&self, outer: Node<'_>, inner: Node<'_>) -> String {
        format!(
            "{}{}",
            &self.code[outer.start_byte()..inner.start_byte()],
            &self.code[inner.end_byte()..outer.end_byte()]
        )
    }

    fn annotations_in(&self, start: usize, end: usize) -> Vec<String> {
        self.annotations
            .iter()
            .filter(|a| a.offset >= start && a.offset < end)
            .map(|a| a.text.clone())
            .collect()
    }

    /// Read the items of a translation unit, namespace body or linkage block.
    fn items(&mut self, list: Node<'_>, scope: &Scope, out: &mut Vec<RawDecl>) {
        let mut lead = list.start_byte();
        for child in named_children(list) {
            self.item(child, lead, scope, Access::Public, None, out);
            if child.kind() != "comment" {
                lead = child.end_byte();
            }
        }
    }

    /// Read a class body, tracking access sections.
    fn members(&mut self, body: Node<'_>, scope: &Scope, default: Access, out: &mut Vec<RawDecl>) {
        let mut access = default;
        let mut lead = body.start_byte();
        for child in named_children(body) {
            if child.kind() == "access_specifier" {
                access = parse_access(self.text(child)).unwrap_or(access);
            } else {
                self.item(child, lead, scope, access, None, out);
            }
            if child.kind() != "comment" {
                lead = child.end_byte();
            }
        }
    }

    fn item(
        &mut self,
        node: Node<'_>,
        lead: usize,
        scope: &Scope,
        access: Access,
        template: Option<&TemplateInfo>,
        out: &mut Vec<RawDecl>,
    ) {
        match node.kind() {
            "namespace_definition" => self.namespace(node, out),
            "linkage_specification" => {
                if let Some(body) = node.child_by_field_name("body") {
                    if body.kind() == "declaration_list" {
                        self.items(body, scope, out);
                    } else {
                        self.item(body, lead, scope, access, None, out);
                    }
                }
            }
            "preproc_if" | "preproc_ifdef" | "preproc_elif" | "preproc_elifdef" => {
                // Only the first branch is read.
                let skip = ["name", "condition", "alternative"]
                    .iter()
                    .filter_map(|f| node.child_by_field_name(f))
                    .map(|n| n.id())
                    .collect::<Vec<_>>();
                let mut inner_lead = lead;
                for child in named_children(node) {
                    if skip.contains(&child.id()) {
                        continue;
                    }
                    if child.kind() == "access_specifier" {
                        continue;
                    }
                    self.item(child, inner_lead, scope, access, None, out);
                    inner_lead = child.end_byte();
                }
            }
            "preproc_def" => self.macro_constant(node),
            "template_declaration" => self.template(node, lead, scope, access, out),
            "class_specifier" | "struct_specifier" | "union_specifier" => {
                self.record(node, lead, access, template, out)
            }
            "enum_specifier" => self.enumeration(node, lead, access, out),
            "declaration" | "field_declaration" | "function_definition" => {
                self.declaration(node, lead, scope, access, template, out)
            }
            "type_definition" => self.typedef(node, lead, scope, access, out),
            "alias_declaration" => {
                if template.is_some() {
                    trace!("[cpp] skipping alias template at line {}", line(node));
                    return;
                }
                let (Some(name), Some(ty)) = (node.child_by_field_name("name"), node.child_by_field_name("type"))
                else {
                    return;
                };
                let mut decl = RawDecl::new(RawKind::Typedef, self.text(name)).with_type(squeeze(self.text(ty)));
                decl.access = access;
                decl.location = Some(location(node));
                out.push(decl);
            }
            "using_declaration" => {
                if scope.class.is_none() || has_token(node, "namespace") {
                    return;
                }
                let Some(target) = named_children(node).into_iter().next() else {
                    return;
                };
                let target = squeeze(self.text(target)).replace(' ', "");
                let name = target.rsplit("::").next().unwrap_or_default().to_string();
                let mut decl = RawDecl::new(RawKind::UsingDeclaration, name);
                decl.target = Some(target);
                decl.access = access;
                decl.location = Some(location(node));
                out.push(decl);
            }
            "ERROR" => warn!("[cpp] skipping unparsable region at line {}", line(node)),
            kind => trace!("[cpp] ignoring {kind} at line {}", line(node)),
        }
    }

    fn namespace(&mut self, node: Node<'_>, out: &mut Vec<RawDecl>) {
        let name = node
            .child_by_field_name("name")
            .map(|n| squeeze(self.text(n)).replace(' ', ""))
            .unwrap_or_default();
        let mut decl = RawDecl::new(RawKind::Namespace, name);
        decl.is_inline = has_token(node, "inline");
        decl.location = Some(location(node));
        if let Some(body) = node.child_by_field_name("body") {
            self.items(body, &Scope::namespace(), &mut decl.children);
        }
        out.push(decl);
    }

    fn macro_constant(&mut self, node: Node<'_>) {
        let (Some(name), Some(value)) = (node.child_by_field_name("name"), node.child_by_field_name("value"))
        else {
            return;
        };
        let value = self.text(value).trim();
        let bare = value.trim_start_matches('(').trim_end_matches(')').trim();
        if !LITERAL.is_match(bare) {
            trace!("[cpp] macro {} is not a literal", self.text(name));
            return;
        }
        let mut decl = RawDecl::new(RawKind::Macro, self.text(name)).with_value(value);
        decl.location = Some(location(node));
        self.macros.push(decl);
    }

    fn template(&mut self, node: Node<'_>, lead: usize, scope: &Scope, access: Access, out: &mut Vec<RawDecl>) {
        let Some(list) = node.child_by_field_name("parameters") else {
            return;
        };
        let info = self.template_params(list);
        for child in named_children(node) {
            if child.id() == list.id() || child.kind() == "comment" {
                continue;
            }
            if child.kind() == "template_declaration" {
                // Members of a class template defined out of line.
                trace!("[cpp] skipping nested template at line {}", line(child));
                continue;
            }
            self.item(child, lead, scope, access, Some(&info), out);
        }
    }

    fn template_params(&self, list: Node<'_>) -> TemplateInfo {
        let mut info = TemplateInfo::default();
        for param in named_children(list) {
            let field = |name: &str| param.child_by_field_name(name).map(|n| squeeze(self.text(n)));
            match param.kind() {
                "type_parameter_declaration" => info.params.push(RawTemplateParam {
                    kind: TemplateParamKind::Type,
                    name: named_children(param)
                        .into_iter()
                        .rfind(|c| c.kind() == "type_identifier")
                        .map(|n| self.text(n).to_string())
                        .unwrap_or_default(),
                    ty: None,
                    default: None,
                }),
                "optional_type_parameter_declaration" => info.params.push(RawTemplateParam {
                    kind: TemplateParamKind::Type,
                    name: field("name").unwrap_or_default(),
                    ty: None,
                    default: field("default_type"),
                }),
                "variadic_type_parameter_declaration" | "variadic_parameter_declaration" => {
                    info.variadic = true;
                    info.params.push(RawTemplateParam {
                        kind: TemplateParamKind::Type,
                        name: named_children(param)
                            .into_iter()
                            .rfind(|c| matches!(c.kind(), "type_identifier" | "identifier"))
                            .map(|n| self.text(n).to_string())
                            .unwrap_or_default(),
                        ty: None,
                        default: None,
                    });
                }
                "parameter_declaration" | "optional_parameter_declaration" => {
                    let spec = self.specifiers(param);
                    let (name, suffix) = match param.child_by_field_name("declarator") {
                        Some(d) => self.name_and_suffix(d),
                        None => (String::new(), String::new()),
                    };
                    info.params.push(RawTemplateParam {
                        kind: TemplateParamKind::NonType,
                        name,
                        ty: Some(squeeze(&format!("{} {suffix}", spec.spelling))),
                        default: field("default_value"),
                    });
                }
                "template_template_parameter_declaration" => info.params.push(RawTemplateParam {
                    kind: TemplateParamKind::Template,
                    name: named_children(param)
                        .into_iter()
                        .filter(|c| c.kind() != "template_parameter_list")
                        .find_map(|c| {
                            named_children(c)
                                .into_iter()
                                .rfind(|n| n.kind() == "type_identifier")
                                .or_else(|| (c.kind() == "type_identifier").then_some(c))
                        })
                        .map(|n| self.text(n).to_string())
                        .unwrap_or_default(),
                    ty: None,
                    default: None,
                }),
                _ => {}
            }
        }
        info
    }

    fn record(
        &mut self,
        node: Node<'_>,
        lead: usize,
        access: Access,
        template: Option<&TemplateInfo>,
        out: &mut Vec<RawDecl>,
    ) {
        let (kind, default_access) = match node.kind() {
            "class_specifier" => (RawKind::Class, Access::Private),
            "struct_specifier" => (RawKind::Struct, Access::Public),
            _ => (RawKind::Union, Access::Public),
        };
        let mut specialization = None;
        let name = match node.child_by_field_name("name") {
            Some(n) if n.kind() == "template_type" => {
                let Some(base) = n.child_by_field_name("name") else { return };
                let args = n
                    .child_by_field_name("arguments")
                    .map(|a| {
                        named_children(a)
                            .into_iter()
                            .filter(|c| c.kind() != "comment")
                            .map(|c| squeeze(self.text(c)))
                            .collect::<Vec<_>>()
                    })
                    .unwrap_or_default();
                specialization = Some(args);
                self.text(base).to_string()
            }
            Some(n) => squeeze(self.text(n)).replace(' ', ""),
            None => String::new(),
        };
        self.record_named(node, name, specialization, kind, default_access, lead, access, template, out);
    }

    #[allow(clippy::too_many_arguments)]
    fn record_named(
        &mut self,
        node: Node<'_>,
        name: String,
        specialization: Option<Vec<String>>,
        kind: RawKind,
        default_access: Access,
        lead: usize,
        access: Access,
        template: Option<&TemplateInfo>,
        out: &mut Vec<RawDecl>,
    ) {
        let body = node.child_by_field_name("body");
        if name.is_empty() && body.is_none() {
            return;
        }
        let kind = match (template, &specialization) {
            (Some(t), None) if !t.params.is_empty() => RawKind::ClassTemplate,
            (Some(t), Some(_)) if !t.params.is_empty() => {
                debug!("[cpp] skipping partial specialization of {name}");
                return;
            }
            _ => kind,
        };

        let mut decl = RawDecl::new(kind, name.clone());
        decl.access = access;
        decl.is_definition = body.is_some();
        decl.location = Some(location(node));
        decl.specialization_args = specialization;
        if let Some(t) = template {
            decl.template_params = t.params.clone();
            decl.is_variadic = t.variadic;
        }

        let head_end = body.map_or(node.end_byte(), |b| b.start_byte());
        decl.attributes = self.annotations_in(lead, head_end);
        for child in named_children(node) {
            match child.kind() {
                "attribute_declaration" | "attribute_specifier" | "ms_declspec_modifier" => {
                    decl.attributes.push(squeeze(self.text(child)))
                }
                "base_class_clause" => decl.bases = self.bases(child, default_access),
                _ => {}
            }
        }

        if let Some(body) = body {
            let scope = Scope::record(&name);
            self.members(body, &scope, default_access, &mut decl.children);
        }
        out.push(decl);
    }

    fn bases(&self, clause: Node<'_>, default: Access) -> Vec<RawBase> {
        let mut bases = Vec::new();
        let mut pending = None;
        for child in named_children(clause) {
            match child.kind() {
                "access_specifier" => pending = parse_access(self.text(child)),
                "type_identifier" | "qualified_type_identifier" | "template_type" | "qualified_identifier" => {
                    bases.push(RawBase {
                        ty: squeeze(self.text(child)),
                        access: pending.take().unwrap_or(default),
                    })
                }
                _ => {}
            }
        }
        bases
    }

    fn enumeration(&mut self, node: Node<'_>, lead: usize, access: Access, out: &mut Vec<RawDecl>) {
        let name = node
            .child_by_field_name("name")
            .map(|n| squeeze(self.text(n)).replace(' ', ""))
            .unwrap_or_default();
        self.enumeration_named(node, name, lead, access, out);
    }

    fn enumeration_named(&mut self, node: Node<'_>, name: String, lead: usize, access: Access, out: &mut Vec<RawDecl>) {
        let body = node.child_by_field_name("body");
        let mut decl = RawDecl::new(RawKind::Enum, name);
        decl.access = access;
        decl.is_scoped = has_token(node, "class") || has_token(node, "struct");
        decl.is_definition = body.is_some();
        decl.ty = node.child_by_field_name("base").map(|b| squeeze(self.text(b)));
        decl.location = Some(location(node));
        let head_end = body.map_or(node.end_byte(), |b| b.start_byte());
        decl.attributes = self.annotations_in(lead, head_end);
        for child in named_children(node) {
            if matches!(child.kind(), "attribute_declaration" | "attribute_specifier") {
                decl.attributes.push(squeeze(self.text(child)));
            }
        }
        if let Some(body) = body {
            for enumerator in named_children(body) {
                if enumerator.kind() != "enumerator" {
                    continue;
                }
                let Some(name) = enumerator.child_by_field_name("name") else {
                    continue;
                };
                let mut constant = RawDecl::new(RawKind::EnumConstant, self.text(name));
                constant.value = enumerator
                    .child_by_field_name("value")
                    .map(|v| squeeze(self.text(v)));
                constant.location = Some(location(enumerator));
                decl.children.push(constant);
            }
        }
        out.push(decl);
    }

    /// Specifiers and qualifiers of a declaration, parameter or typedef.
    fn specifiers<'t>(&self, node: Node<'t>) -> Specifiers<'t> {
        let mut spec = Specifiers {
            ty: node.child_by_field_name("type"),
            ..Specifiers::default()
        };
        let type_id = spec.ty.map(|t| t.id());
        let mut words: Vec<String> = Vec::new();
        for child in all_children(node) {
            if Some(child.id()) == type_id {
                words.push(self.type_spelling(child));
                continue;
            }
            match child.kind() {
                "type_qualifier" => match self.text(child) {
                    "constexpr" => spec.is_constexpr = true,
                    q @ ("const" | "volatile") => words.push(q.to_string()),
                    _ => {}
                },
                "storage_class_specifier" => match self.text(child) {
                    "static" => spec.is_static = true,
                    "inline" => spec.is_inline = true,
                    _ => {}
                },
                "explicit_function_specifier" => spec.is_explicit = true,
                "attribute_declaration" | "attribute_specifier" | "ms_declspec_modifier" => {
                    spec.attributes.push(squeeze(self.text(child)))
                }
                _ => {}
            }
        }
        spec.spelling = words.join(" ");
        spec
    }

    /// A type specifier as written; an inline record definition is named.
    fn type_spelling(&self, ty: Node<'_>) -> String {
        match ty.kind() {
            "class_specifier" | "struct_specifier" | "union_specifier" | "enum_specifier"
                if ty.child_by_field_name("body").is_some() =>
            {
                ty.child_by_field_name("name")
                    .map(|n| squeeze(self.text(n)))
                    .unwrap_or_default()
            }
            _ => squeeze(self.text(ty)),
        }
    }

    fn declaration(
        &mut self,
        node: Node<'_>,
        lead: usize,
        scope: &Scope,
        access: Access,
        template: Option<&TemplateInfo>,
        out: &mut Vec<RawDecl>,
    ) {
        let spec = self.specifiers(node);
        let declarators = fields(node, "declarator");

        if let Some(ty) = spec.ty {
            let defines = ty.child_by_field_name("body").is_some();
            if matches!(
                ty.kind(),
                "class_specifier" | "struct_specifier" | "union_specifier" | "enum_specifier"
            ) && (defines || declarators.is_empty())
            {
                self.item(ty, lead, scope, access, template, out);
            }
        }

        for declarator in declarators {
            let parts = self.parts(declarator);
            let decl = if let Some(cast) = parts.cast {
                self.conversion(node, cast, &spec)
            } else if let Some(function) = parts.function {
                self.function(node, parts, function, &spec, scope, template)
            } else if template.is_some() {
                trace!("[cpp] skipping variable template at line {}", line(node));
                None
            } else {
                self.variable(node, parts, &spec, scope)
            };
            if let Some(mut decl) = decl {
                decl.access = access;
                decl.location = Some(location(node));
                let mut attributes = self.annotations_in(lead, node.end_byte());
                attributes.extend(spec.attributes.iter().cloned());
                decl.attributes = attributes;
                out.push(decl);
            }
        }
    }

    fn function(
        &self,
        node: Node<'_>,
        parts: Parts<'_>,
        function: Node<'_>,
        spec: &Specifiers<'_>,
        scope: &Scope,
        template: Option<&TemplateInfo>,
    ) -> Option<RawDecl> {
        let name_node = parts.name?;
        let name = self.declarator_name(name_node);
        if name_node.kind() == "template_function" {
            trace!("[cpp] skipping explicit function specialization {name}");
            return None;
        }
        let last = name.rsplit("::").next().unwrap_or(&name);

        let kind = if last.starts_with('~') {
            RawKind::Destructor
        } else if spec.ty.is_none() {
            let is_constructor = match &scope.class {
                Some(class) => last == class,
                None => name
                    .rsplit("::")
                    .nth(1)
                    .is_some_and(|owner| owner == last || owner.starts_with(&format!("{last}<"))),
            };
            if !is_constructor {
                trace!("[cpp] skipping untyped declaration {name}");
                return None;
            }
            RawKind::Constructor
        } else {
            match template {
                Some(t) if t.params.is_empty() => {
                    trace!("[cpp] skipping explicit function specialization {name}");
                    return None;
                }
                Some(_) => RawKind::FunctionTemplate,
                None if scope.class.is_some() => RawKind::Method,
                None => RawKind::Function,
            }
        };

        let mut decl = RawDecl::new(kind, name);
        if matches!(kind, RawKind::Method | RawKind::Function | RawKind::FunctionTemplate) {
            let trailing = all_children(function)
                .into_iter()
                .find(|c| c.kind() == "trailing_return_type")
                .and_then(|t| named_children(t).into_iter().next());
            decl.return_type = Some(match trailing {
                Some(t) => squeeze(self.text(t)),
                None => squeeze(&format!(
                    "{} {}",
                    spec.spelling,
                    self.text_without(parts.core, function)
                )),
            });
        }
        if let Some(list) = function.child_by_field_name("parameters") {
            let (params, variadic) = self.params(list);
            decl.params = params;
            decl.is_variadic = variadic;
        }
        if let Some(t) = template {
            decl.template_params = t.params.clone();
            decl.is_variadic |= t.variadic;
        }
        decl.is_const = all_children(function)
            .into_iter()
            .any(|c| c.kind() == "type_qualifier" && self.text(c) == "const");
        decl.is_static = spec.is_static;
        decl.is_inline = spec.is_inline || node.kind() == "function_definition";
        decl.is_explicit = spec.is_explicit;
        decl.is_deleted = has_token(node, "delete_method_clause");
        decl.is_pure_virtual = has_token(node, "pure_virtual_clause")
            || node
                .child_by_field_name("default_value")
                .is_some_and(|v| self.text(v).trim() == "0");
        Some(decl)
    }

    fn conversion(&self, node: Node<'_>, cast: Node<'_>, spec: &Specifiers<'_>) -> Option<RawDecl> {
        let mut function = cast.child_by_field_name("declarator")?;
        while function.kind() != "abstract_function_declarator" {
            function = function
                .child_by_field_name("declarator")
                .or_else(|| first_declarator(function))?;
        }
        let params = function.child_by_field_name("parameters")?;
        let name = squeeze(&self.code[cast.start_byte()..params.start_byte()]);
        let mut decl = RawDecl::new(RawKind::Conversion, name);
        decl.is_const = all_children(function)
            .into_iter()
            .any(|c| c.kind() == "type_qualifier" && self.text(c) == "const");
        decl.is_explicit = spec.is_explicit;
        decl.is_deleted = has_token(node, "delete_method_clause");
        decl.is_inline = node.kind() == "function_definition";
        Some(decl)
    }

    fn variable(&self, node: Node<'_>, parts: Parts<'_>, spec: &Specifiers<'_>, scope: &Scope) -> Option<RawDecl> {
        let name_node = parts.name?;
        let name = self.declarator_name(name_node);
        // Error recovery can turn a misread class or macro into a declarator.
        if node.has_error() || name_node.kind() == "type_identifier" || KEYWORDS.contains(&name.as_str()) {
            trace!("[cpp] skipping unreadable variable '{name}' at line {}", line(node));
            return None;
        }
        let kind = if scope.class.is_some() {
            RawKind::Field
        } else {
            RawKind::Variable
        };
        let suffix = self.text_without(parts.core, name_node);
        let mut decl = RawDecl::new(kind, name).with_type(squeeze(&format!("{} {suffix}", spec.spelling)));
        decl.value = parts
            .value
            .or_else(|| node.child_by_field_name("default_value"))
            .map(|v| squeeze(self.text(v)));
        decl.is_static = spec.is_static;
        decl.is_const = spec.is_constexpr;
        decl.is_inline = spec.is_inline;
        Some(decl)
    }

    fn typedef(&mut self, node: Node<'_>, lead: usize, scope: &Scope, access: Access, out: &mut Vec<RawDecl>) {
        let spec = self.specifiers(node);
        let declarators = fields(node, "declarator");
        let mut spelling = spec.spelling.clone();

        if let Some(ty) = spec.ty.filter(|t| t.child_by_field_name("body").is_some()) {
            let named = ty.child_by_field_name("name").is_some();
            let first = declarators
                .first()
                .filter(|d| d.kind() == "type_identifier")
                .map(|d| self.text(*d).to_string());
            match (named, first) {
                (true, _) => self.item(ty, lead, scope, access, None, out),
                // `typedef struct { ... } Name;` names the record itself.
                (false, Some(first)) => {
                    match ty.kind() {
                        "enum_specifier" => self.enumeration_named(ty, first.clone(), lead, access, out),
                        kind => {
                            let (raw, default_access) = match kind {
                                "class_specifier" => (RawKind::Class, Access::Private),
                                "union_specifier" => (RawKind::Union, Access::Public),
                                _ => (RawKind::Struct, Access::Public),
                            };
                            self.record_named(ty, first.clone(), None, raw, default_access, lead, access, None, out);
                        }
                    }
                    let qualifiers = spelling.trim_end().to_string();
                    spelling = squeeze(&format!("{qualifiers} {first}"));
                }
                (false, None) => return,
            }
        }

        for declarator in declarators {
            let parts = self.parts(declarator);
            let Some(name_node) = parts.name else { continue };
            let name = self.text(name_node).to_string();
            let suffix = self.text_without(parts.core, name_node);
            let ty = squeeze(&format!("{spelling} {suffix}"));
            if ty == name {
                // `typedef struct Foo Foo;`
                continue;
            }
            let mut decl = RawDecl::new(RawKind::Typedef, name).with_type(ty);
            decl.access = access;
            decl.location = Some(location(node));
            decl.attributes = spec.attributes.clone();
            out.push(decl);
        }
    }

    /// Parameters of a function declarator and whether it is variadic.
    fn params(&self, list: Node<'_>) -> (Vec<RawParam>, bool) {
        let mut params = Vec::new();
        let mut variadic = false;
        for child in all_children(list) {
            match child.kind() {
                "..." | "variadic_parameter_declaration" => variadic = true,
                "parameter_declaration" | "optional_parameter_declaration" => {
                    let spec = self.specifiers(child);
                    let declarator = child.child_by_field_name("declarator");
                    let (name, suffix) = match declarator {
                        Some(d) => self.name_and_suffix(d),
                        None => (String::new(), String::new()),
                    };
                    let ty = squeeze(&format!("{} {suffix}", spec.spelling));
                    if ty == "void" && declarator.is_none() {
                        continue;
                    }
                    params.push(RawParam {
                        name,
                        ty,
                        default: child
                            .child_by_field_name("default_value")
                            .map(|v| squeeze(self.text(v))),
                    });
                }
                _ => {}
            }
        }
        (params, variadic)
    }

    fn name_and_suffix(&self, declarator: Node<'_>) -> (String, String) {
        let parts = self.parts(declarator);
        match parts.name {
            Some(name) => (
                self.text(name).to_string(),
                self.text_without(parts.core, name),
            ),
            None => (String::new(), self.text(parts.core).to_string()),
        }
    }

    /// Split a declarator into its name, its function part and its initializer.
    fn parts<'t>(&self, declarator: Node<'t>) -> Parts<'t> {
        let (core, value) = if declarator.kind() == "init_declarator" {
            match declarator.child_by_field_name("declarator") {
                Some(inner) => (inner, declarator.child_by_field_name("value")),
                None => (declarator, None),
            }
        } else {
            (declarator, None)
        };
        let mut parts = Parts {
            core,
            name: None,
            function: None,
            cast: None,
            value,
        };

        let mut current = Some(core);
        while let Some(node) = current {
            current = match node.kind() {
                "function_declarator" => {
                    let inner = node.child_by_field_name("declarator");
                    if inner.is_some_and(|i| i.kind() == "parenthesized_declarator") {
                        // Function pointer: the name sits inside the parentheses.
                        inner
                    } else {
                        if parts.function.is_none() {
                            parts.function = Some(node);
                        }
                        inner
                    }
                }
                "pointer_declarator" | "array_declarator" | "attributed_declarator" => {
                    node.child_by_field_name("declarator").or_else(|| first_declarator(node))
                }
                "reference_declarator" | "parenthesized_declarator" => first_declarator(node),
                "operator_cast" => {
                    parts.cast = Some(node);
                    parts.name = Some(node);
                    None
                }
                "identifier" | "field_identifier" | "type_identifier" | "qualified_identifier"
                | "operator_name" | "destructor_name" | "template_function" => {
                    parts.name = Some(node);
                    None
                }
                _ => None,
            };
        }
        parts
    }

    /// Declarator name with operator spellings normalized (`operator +` to `operator+`).
    fn declarator_name(&self, node: Node<'_>) -> String {
        let text = squeeze(self.text(node));
        match find_operator(&text) {
            Some(at) => {
                let (scope, op) = text.split_at(at);
                let symbol = op["operator".len()..].trim();
                let joined = if symbol.starts_with(char::is_alphabetic) {
                    format!("operator {symbol}")
                } else {
                    format!("operator{}", symbol.replace(' ', ""))
                };
                format!("{}{joined}", scope.replace(' ', ""))
            }
            None => text.replace(' ', ""),
        }
    }
}

fn named_children(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).collect()
}

fn all_children(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    node.children(&mut cursor).collect()
}

fn fields<'t>(node: Node<'t>, field: &str) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.children_by_field_name(field, &mut cursor).collect()
}

fn first_declarator(node: Node<'_>) -> Option<Node<'_>> {
    named_children(node)
        .into_iter()
        .find(|c| !matches!(c.kind(), "type_qualifier" | "comment" | "attribute_declaration"))
}

fn has_token(node: Node<'_>, kind: &str) -> bool {
    all_children(node).iter().any(|c| c.kind() == kind)
}

fn parse_access(text: &str) -> Option<Access> {
    match text.trim().trim_end_matches(':').trim() {
        "public" => Some(Access::Public),
        "protected" => Some(Access::Protected),
        "private" => Some(Access::Private),
        _ => None,
    }
}

fn line(node: Node<'_>) -> usize {
    node.start_position().row + 1
}

fn location(node: Node<'_>) -> RawLocation {
    let start = node.start_position();
    RawLocation {
        line: start.row as u32 + 1,
        column: start.column as u32 + 1,
    }
}

/// Collapse whitespace runs.
fn squeeze(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Byte offset of the `operator` keyword in a declarator name.
fn find_operator(text: &str) -> Option<usize> {
    text.match_indices("operator").map(|(at, _)| at).find(|&at| {
        let before = text[..at].chars().next_back();
        let after = text[at + "operator".len()..].chars().next();
        matches!(before, None | Some(':') | Some(' '))
            && !after.is_some_and(|c| c.is_alphanumeric() || c == '_')
    })
}

//! Declaration Collector: merges provider trees into one [`DeclGraph`].
//!
//! Headers are added in include order. Namespaces reopened by later headers are merged,
//! a forward declaration is upgraded in place when its definition arrives, and an
//! out-of-line member (`Outer::Inner::f`) is attached to the scope it names. A
//! declaration whose scope cannot be found is kept under the root, excluded, and reported.

use crate::ast::{RawDecl, RawHeader, RawKind};
use crate::decl::{
    Attributes, Base, DeclFlags, DeclGraph, DeclKind, Declaration, Deprecation, FilterVerdict,
    Param, Specialization, TemplateArg, TemplateParam, TypeRef,
};
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::filter::rules::Rules;
use crate::qualify::{Lookup, Resolver};
use crate::template::qualify_arg;
use crate::types::{DeclId, HeaderId, Location};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::{debug, trace, warn};

/// Standard deprecation spellings, with an optional quoted message.
static DEPRECATED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^\s*(?:\[\[\s*(?:gnu::)?deprecated|__attribute__\s*\(\(\s*(?:__)?deprecated(?:__)?|__declspec\s*\(\s*deprecated|(?:__)?deprecated(?:__)?)\b\s*(?:\(\s*"((?:[^"\\]|\\.)*)"\s*\))?"#,
    )
    .expect("valid deprecation regex")
});

static LEADING_IDENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_]*)").expect("valid identifier regex"));

static QUOTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""((?:[^"\\]|\\.)*)""#).expect("valid string regex"));

pub struct Collector<'r> {
    graph: DeclGraph,
    rules: &'r Rules,
    diagnostics: Diagnostics,
}

impl<'r> Collector<'r> {
    pub fn new(rules: &'r Rules) -> Self {
        Self {
            graph: DeclGraph::new(),
            rules,
            diagnostics: Diagnostics::new(),
        }
    }

    /// Add one header's tree. Must be called in include order.
    pub fn add_header(&mut self, header: RawHeader) -> HeaderId {
        let id = self.graph.add_header(header.path.clone());
        debug!(
            "[collector] {} top-level declarations from {}",
            header.decls.len(),
            header.path.display()
        );
        for raw in &header.decls {
            self.collect(DeclId::ROOT, raw, id);
        }
        id
    }

    /// Link specializations and typedefs, detect alias cycles, and hand over the graph.
    pub fn finish(mut self) -> (DeclGraph, Diagnostics) {
        self.link_specializations();
        self.link_aliases();
        (self.graph, self.diagnostics)
    }

    fn collect(&mut self, parent: DeclId, raw: &RawDecl, header: HeaderId) {
        if raw.kind == RawKind::Namespace && raw.name.contains("::") {
            // `namespace A::B { ... }`
            let mut scope = parent;
            for segment in raw.name.split("::").filter(|s| !s.is_empty()) {
                scope = self.namespace_scope(scope, raw, segment, header);
            }
            for child in &raw.children {
                self.collect(scope, child, header);
            }
            return;
        }
        let (parent, name) = match self.split_out_of_line(parent, raw, header) {
            Some(found) => found,
            None => return,
        };

        match raw.kind {
            RawKind::Namespace => self.collect_namespace(parent, raw, &name, header),
            RawKind::Class | RawKind::Struct | RawKind::Union | RawKind::ClassTemplate => {
                self.collect_record(parent, raw, &name, header)
            }
            _ => {
                if self.is_redeclaration(parent, raw, &name) {
                    trace!("[collector] skipping redeclaration of {name}");
                    return;
                }
                let decl = self.build(parent, raw, name, header);
                let id = self.graph.insert(parent, decl);
                self.note_unparsable(id);
                for child in &raw.children {
                    self.collect(id, child, header);
                }
            }
        }
    }

    /// Resolve a qualified declarator name against the graph built so far.
    /// Returns `None` when the declaration was placed (excluded) under the root.
    fn split_out_of_line(
        &mut self,
        parent: DeclId,
        raw: &RawDecl,
        header: HeaderId,
    ) -> Option<(DeclId, String)> {
        let Some((scope, last)) = split_scope(&raw.name) else {
            return Some((parent, raw.name.clone()));
        };
        let resolver = Resolver::new(&self.graph, self.rules);
        let path = TypeRef::parse(scope).ok().and_then(|t| t.name_path().cloned());
        let found = match path.map(|p| resolver.resolve_path(&p, parent)) {
            Some(Lookup::Decl(id)) if self.graph.get(id).kind.is_scope() => Some(id),
            _ => None,
        };
        if let Some(scope_id) = found {
            return Some((scope_id, last.to_string()));
        }

        let mut decl = self.build(DeclId::ROOT, raw, raw.name.clone(), header);
        decl.verdict = FilterVerdict::ExcludeStructural;
        let id = self.graph.insert(DeclId::ROOT, decl);
        warn!("[collector] no enclosing scope '{scope}' for {}", raw.name);
        self.diagnostics.warn(
            DiagnosticKind::UnresolvedParent,
            Some(id),
            &raw.name,
            format!("enclosing scope '{scope}' is not declared in the processed headers"),
        );
        None
    }

    fn collect_namespace(&mut self, parent: DeclId, raw: &RawDecl, name: &str, header: HeaderId) {
        if name.is_empty() {
            // Anonymous namespaces have internal linkage.
            trace!("[collector] skipping anonymous namespace");
            return;
        }
        let id = self.namespace_scope(parent, raw, name, header);
        for child in &raw.children {
            self.collect(id, child, header);
        }
    }

    fn namespace_scope(&mut self, parent: DeclId, raw: &RawDecl, name: &str, header: HeaderId) -> DeclId {
        match self.graph.find_child(parent, name, DeclKind::Namespace) {
            Some(existing) => existing,
            None => {
                let decl = self.build(parent, raw, name.to_string(), header);
                self.graph.insert(parent, decl)
            }
        }
    }

    fn collect_record(&mut self, parent: DeclId, raw: &RawDecl, name: &str, header: HeaderId) {
        let name = match &raw.specialization_args {
            Some(args) => {
                // Arguments are spelled as seen from the enclosing scope.
                let resolver = Resolver::new(&self.graph, self.rules);
                let args: Vec<String> = args
                    .iter()
                    .map(|a| qualify_arg(&resolver, &TemplateArg::parse(a), parent).render())
                    .collect();
                format!("{name}<{}>", args.join(", "))
            }
            None => name.to_string(),
        };
        let existing = self
            .graph
            .members_named(parent, &name)
            .into_iter()
            .find(|id| self.graph.get(*id).kind.is_record());

        let id = match existing {
            Some(id) if !self.graph.get(id).is_definition() && raw.is_definition => {
                debug!("[collector] completing forward declaration of {name}");
                let completed = self.build(parent, raw, name.clone(), header);
                let decl = self.graph.get_mut(id);
                decl.kind = completed.kind;
                decl.flags = completed.flags;
                decl.bases = completed.bases;
                decl.attributes = completed.attributes;
                decl.access = completed.access;
                decl.header = completed.header;
                decl.location = completed.location;
                if decl.template_params.is_empty() {
                    decl.template_params = completed.template_params;
                }
                id
            }
            Some(id) => {
                if raw.is_definition && self.graph.get(id).is_definition() {
                    trace!("[collector] {name} already defined");
                }
                // Merge attributes of redeclarations (a later `[[deprecated]] class X;`).
                let extra = self.parse_attributes(&raw.attributes);
                let decl = self.graph.get_mut(id);
                if decl.attributes.deprecated.is_none() {
                    decl.attributes.deprecated = extra.deprecated;
                }
                if !raw.is_definition || decl.children.is_empty() {
                    id
                } else {
                    return;
                }
            }
            None => {
                let decl = self.build(parent, raw, name, header);
                self.graph.insert(parent, decl)
            }
        };
        self.note_unparsable(id);
        for child in &raw.children {
            self.collect(id, child, header);
        }
    }

    /// A function re-declared with the same signature (e.g. an out-of-line definition of
    /// a member declared in its class) is not added twice.
    fn is_redeclaration(&self, parent: DeclId, raw: &RawDecl, name: &str) -> bool {
        if !matches!(
            raw.kind,
            RawKind::Function
                | RawKind::Method
                | RawKind::FunctionTemplate
                | RawKind::Constructor
                | RawKind::Variable
                | RawKind::Typedef
        ) {
            return false;
        }
        let spellings: Vec<String> = raw
            .params
            .iter()
            .map(|p| TypeRef::parse_lossy(&p.ty).render())
            .collect();
        self.graph.members_named(parent, name).into_iter().any(|id| {
            let d = self.graph.get(id);
            match raw.kind {
                RawKind::Variable | RawKind::Typedef => {
                    matches!(d.kind, DeclKind::Variable | DeclKind::Field | DeclKind::Typedef)
                }
                _ => {
                    d.kind.is_callable()
                        && d.is_const() == raw.is_const
                        && d.is_variadic() == raw.is_variadic
                        && d.params.len() == spellings.len()
                        && d.params.iter().zip(&spellings).all(|(p, s)| p.ty.render() == *s)
                }
            }
        })
    }

    fn build(&self, parent: DeclId, raw: &RawDecl, name: String, header: HeaderId) -> Declaration {
        let in_record = self.graph.get(parent).kind.is_record();
        let kind = match raw.kind {
            RawKind::Namespace => DeclKind::Namespace,
            RawKind::Class | RawKind::ClassTemplate => DeclKind::Class,
            RawKind::Struct => DeclKind::Struct,
            RawKind::Union => DeclKind::Union,
            RawKind::Function | RawKind::FunctionTemplate | RawKind::Method => {
                if in_record {
                    DeclKind::Method
                } else {
                    DeclKind::Function
                }
            }
            RawKind::Constructor => DeclKind::Constructor,
            RawKind::Destructor => DeclKind::Destructor,
            RawKind::Conversion => DeclKind::Conversion,
            RawKind::Field | RawKind::Variable => {
                if in_record {
                    DeclKind::Field
                } else {
                    DeclKind::Variable
                }
            }
            RawKind::Enum => DeclKind::Enum,
            RawKind::EnumConstant => DeclKind::EnumConstant,
            RawKind::Typedef => DeclKind::Typedef,
            RawKind::UsingDeclaration => DeclKind::UsingDeclaration,
            RawKind::Macro => DeclKind::Macro,
        };

        let name = if kind == DeclKind::UsingDeclaration && name.is_empty() {
            raw.target
                .as_deref()
                .and_then(|t| t.rsplit("::").next())
                .unwrap_or_default()
                .to_string()
        } else {
            name
        };

        let mut decl = Declaration::new(kind, name, header);
        decl.access = raw.access;
        decl.attributes = self.parse_attributes(&raw.attributes);
        decl.flags = raw_flags(raw);
        decl.ty = raw.ty.as_deref().map(TypeRef::parse_lossy);
        decl.return_type = match (kind, raw.return_type.as_deref()) {
            (_, Some(ret)) => Some(TypeRef::parse_lossy(ret)),
            (DeclKind::Conversion, None) => conversion_target(&decl.name).map(TypeRef::parse_lossy),
            (DeclKind::Method | DeclKind::Function, None) => Some(TypeRef::builtin("void")),
            _ => None,
        };
        decl.params = raw
            .params
            .iter()
            .map(|p| Param {
                name: p.name.clone(),
                ty: TypeRef::parse_lossy(&p.ty),
                default: p.default.as_ref().map(|d| d.trim().to_string()),
                classification: Default::default(),
            })
            .collect();
        decl.bases = raw
            .bases
            .iter()
            .map(|b| Base {
                ty: TypeRef::parse_lossy(&b.ty),
                access: b.access,
            })
            .collect();
        decl.template_params = raw
            .template_params
            .iter()
            .map(|p| TemplateParam {
                kind: p.kind,
                name: p.name.clone(),
                ty: p.ty.clone(),
                default: p.default.clone(),
            })
            .collect();
        decl.specialization = raw.specialization_args.as_ref().map(|args| Specialization {
            template: None,
            args: args.iter().map(|a| TemplateArg::parse(a)).collect(),
        });
        decl.value = raw.value.clone();
        decl.using_target = raw.target.clone();
        decl.location = raw
            .location
            .map(|l| Location::new(header, l.line, l.column));
        decl
    }

    fn parse_attributes(&self, raw: &[String]) -> Attributes {
        let mut attrs = Attributes::default();
        for text in raw {
            attrs.raw.push(text.clone());
            if let Some(caps) = DEPRECATED.captures(text) {
                attrs.deprecated = Some(Deprecation {
                    message: caps.get(1).map(|m| m.as_str().to_string()),
                });
                continue;
            }
            let Some(ident) = LEADING_IDENT.captures(text).and_then(|c| c.get(1)) else {
                continue;
            };
            let ident = ident.as_str();
            if self.rules.deprecation_macros.iter().any(|m| m == ident) {
                attrs.deprecated = Some(Deprecation {
                    message: QUOTED
                        .captures(text)
                        .and_then(|c| c.get(1))
                        .map(|m| m.as_str().to_string()),
                });
            } else if !matches!(ident, "__attribute__" | "__declspec" | "alignas") {
                attrs.export_tags.push(ident.to_string());
            }
        }
        attrs
    }

    fn note_unparsable(&mut self, id: DeclId) {
        let decl = self.graph.get(id);
        let bad: Vec<String> = decl
            .type_refs()
            .into_iter()
            .filter(|t| t.is_opaque())
            .map(|t| t.spelling.clone())
            .collect();
        if bad.is_empty() {
            return;
        }
        let name = decl.display_name().to_string();
        for spelling in bad {
            self.diagnostics.note(
                DiagnosticKind::UnparsableType,
                Some(id),
                &name,
                format!("type '{spelling}' is kept as written"),
            );
        }
    }

    /// Point every full or partial specialization at its primary template.
    fn link_specializations(&mut self) {
        let pending: Vec<DeclId> = self
            .graph
            .iter()
            .filter(|d| d.specialization.as_ref().is_some_and(|s| s.template.is_none()))
            .map(|d| d.id)
            .collect();
        for id in pending {
            let decl = self.graph.get(id);
            let base = decl.name.split('<').next().unwrap_or_default().to_string();
            let parent = decl.parent.unwrap_or(DeclId::ROOT);
            let primary = self
                .graph
                .members_named(parent, &base)
                .into_iter()
                .find(|c| self.graph.get(*c).is_template() && self.graph.get(*c).specialization.is_none());
            match primary {
                Some(primary) => {
                    if let Some(spec) = self.graph.get_mut(id).specialization.as_mut() {
                        spec.template = Some(primary);
                    }
                }
                None => {
                    let name = self.graph.get(id).display_name().to_string();
                    self.diagnostics.note(
                        DiagnosticKind::UnknownTemplate,
                        Some(id),
                        &name,
                        format!("primary template '{base}' is not visible"),
                    );
                }
            }
        }
    }

    /// Record the target of each typedef without collapsing it, and exclude typedefs
    /// whose chain loops back on itself.
    fn link_aliases(&mut self) {
        let typedefs: Vec<DeclId> = self
            .graph
            .iter()
            .filter(|d| d.kind == DeclKind::Typedef)
            .map(|d| d.id)
            .collect();
        let targets: Vec<(DeclId, Option<DeclId>)> = {
            let resolver = Resolver::new(&self.graph, self.rules);
            typedefs
                .iter()
                .map(|&id| {
                    let target = self
                        .graph
                        .get(id)
                        .ty
                        .as_ref()
                        .filter(|t| !t.is_indirect())
                        .and_then(|t| t.name_path())
                        .and_then(|path| {
                            // Resolve from the enclosing scope so `typedef struct X X;`
                            // does not find itself.
                            let scope = self.graph.enclosing_scope(id);
                            match resolver.resolve_path(path, scope) {
                                Lookup::Decl(target) => Some(target),
                                _ => None,
                            }
                        });
                    (id, target)
                })
                .collect()
        };
        for (id, target) in &targets {
            self.graph.get_mut(*id).alias_of = target.filter(|t| t != id);
        }

        let mut cyclic = HashSet::new();
        for &start in &typedefs {
            let mut seen = vec![start];
            let mut cur = self.graph.get(start).alias_of;
            while let Some(next) = cur {
                if self.graph.get(next).kind != DeclKind::Typedef {
                    break;
                }
                if seen.contains(&next) {
                    cyclic.extend(seen.iter().copied().skip_while(|s| *s != next));
                    break;
                }
                seen.push(next);
                cur = self.graph.get(next).alias_of;
            }
        }
        let mut cyclic: Vec<DeclId> = cyclic.into_iter().collect();
        cyclic.sort();
        for id in cyclic {
            let decl = self.graph.get_mut(id);
            decl.verdict = FilterVerdict::ExcludeStructural;
            decl.alias_of = None;
            let name = decl.qualified_name.clone();
            warn!("[collector] alias cycle through {name}");
            self.diagnostics.warn(
                DiagnosticKind::AliasCycle,
                Some(id),
                &name,
                "typedef chain refers back to itself",
            );
        }
    }
}

fn raw_flags(raw: &RawDecl) -> DeclFlags {
    let mut flags = DeclFlags::empty();
    flags.set(DeclFlags::STATIC, raw.is_static);
    flags.set(DeclFlags::CONST, raw.is_const);
    flags.set(DeclFlags::DELETED, raw.is_deleted);
    flags.set(DeclFlags::PURE_VIRTUAL, raw.is_pure_virtual);
    flags.set(DeclFlags::DEFINITION, raw.is_definition);
    flags.set(DeclFlags::INLINE, raw.is_inline);
    flags.set(DeclFlags::SCOPED, raw.is_scoped);
    flags.set(DeclFlags::EXPLICIT, raw.is_explicit);
    flags.set(DeclFlags::VARIADIC, raw.is_variadic);
    flags
}

/// `"Outer::Inner::f"` to `("Outer::Inner", "f")`. Template arguments in the scope
/// part are not split.
fn split_scope(name: &str) -> Option<(&str, &str)> {
    if name.starts_with("operator") {
        return None;
    }
    let mut depth = 0usize;
    let bytes = name.as_bytes();
    let mut split = None;
    let mut i = 0;
    while i + 1 < bytes.len() {
        match bytes[i] {
            b'<' => depth += 1,
            b'>' => depth = depth.saturating_sub(1),
            b':' if depth == 0 && bytes[i + 1] == b':' => {
                split = Some(i);
                i += 1;
            }
            _ => {}
        }
        i += 1;
    }
    let at = split?;
    let scope = &name[..at];
    let last = &name[at + 2..];
    (!scope.is_empty() && !last.is_empty()).then_some((scope, last))
}

/// Target type of a conversion function named `operator T`.
fn conversion_target(name: &str) -> Option<&str> {
    let target = name.strip_prefix("operator")?.trim();
    (!target.is_empty()).then_some(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Access;

    fn collect(headers: Vec<Vec<RawDecl>>) -> (DeclGraph, Diagnostics) {
        let rules = Rules {
            deprecation_macros: vec!["MY_DEPRECATED".to_string()],
            ..Rules::default()
        };
        let mut collector = Collector::new(&rules);
        for (i, decls) in headers.into_iter().enumerate() {
            collector.add_header(RawHeader {
                path: format!("h{i}.hpp").into(),
                decls,
            });
        }
        collector.finish()
    }

    fn find<'g>(graph: &'g DeclGraph, qualified: &str) -> &'g Declaration {
        let id = graph.lookup(qualified)[0];
        graph.get(id)
    }

    #[test]
    fn test_namespaces_merge_across_headers() {
        let (graph, _) = collect(vec![
            vec![RawDecl::new(RawKind::Namespace, "Tests")
                .with_children(vec![RawDecl::new(RawKind::Class, "A")])],
            vec![RawDecl::new(RawKind::Namespace, "Tests")
                .with_children(vec![RawDecl::new(RawKind::Class, "B")])],
        ]);
        assert_eq!(graph.lookup("Tests").len(), 1);
        assert_eq!(find(&graph, "Tests").children.len(), 2);
    }

    #[test]
    fn test_forward_declaration_completed() {
        let (graph, _) = collect(vec![vec![
            RawDecl::new(RawKind::Class, "Widget").forward(),
            RawDecl::new(RawKind::Class, "Widget")
                .with_children(vec![RawDecl::new(RawKind::Field, "x").with_type("int")]),
        ]]);
        assert_eq!(graph.lookup("Widget").len(), 1);
        let widget = find(&graph, "Widget");
        assert!(widget.is_definition());
        assert_eq!(widget.children.len(), 1);
        assert_eq!(graph.get(widget.children[0]).kind, DeclKind::Field);
    }

    #[test]
    fn test_out_of_line_member_attached() {
        let (graph, diags) = collect(vec![vec![
            RawDecl::new(RawKind::Namespace, "Outer").with_children(vec![RawDecl::new(
                RawKind::Class,
                "Inner",
            )]),
            RawDecl::new(RawKind::Function, "Outer::Inner::helper").with_return("int"),
            RawDecl::new(RawKind::Function, "Missing::fn").with_return("int"),
        ]]);
        let helper = find(&graph, "Outer::Inner::helper");
        assert_eq!(helper.kind, DeclKind::Method);
        assert!(helper.verdict.is_included());

        let orphan = find(&graph, "Missing::fn");
        assert_eq!(orphan.verdict, FilterVerdict::ExcludeStructural);
        assert_eq!(orphan.parent, Some(DeclId::ROOT));
        assert!(diags.iter().any(|d| d.kind == DiagnosticKind::UnresolvedParent));
    }

    #[test]
    fn test_deprecation_spellings() {
        let (graph, _) = collect(vec![vec![
            RawDecl::new(RawKind::Function, "a").with_attribute("[[deprecated]]"),
            RawDecl::new(RawKind::Function, "b").with_attribute("[[deprecated(\"use c\")]]"),
            RawDecl::new(RawKind::Function, "c").with_attribute("__attribute__((deprecated))"),
            RawDecl::new(RawKind::Function, "d").with_attribute("__declspec(deprecated)"),
            RawDecl::new(RawKind::Function, "e").with_attribute("MY_DEPRECATED(\"old\")"),
            RawDecl::new(RawKind::Function, "f").with_attribute("MY_EXPORT"),
        ]]);
        for name in ["a", "b", "c", "d", "e"] {
            assert!(find(&graph, name).attributes.deprecated.is_some(), "{name}");
        }
        let b = find(&graph, "b").attributes.deprecated.clone().unwrap();
        assert_eq!(b.message.as_deref(), Some("use c"));
        let e = find(&graph, "e").attributes.deprecated.clone().unwrap();
        assert_eq!(e.message.as_deref(), Some("old"));
        let f = find(&graph, "f");
        assert!(f.attributes.deprecated.is_none());
        assert_eq!(f.attributes.export_tags, vec!["MY_EXPORT".to_string()]);
    }

    #[test]
    fn test_kinds_follow_scope() {
        let (graph, _) = collect(vec![vec![
            RawDecl::new(RawKind::Struct, "S").with_children(vec![
                RawDecl::new(RawKind::Function, "m").with_return("void"),
                RawDecl::new(RawKind::Variable, "count").with_type("int").statik(),
                RawDecl::new(RawKind::Conversion, "operator bool").constant(),
                RawDecl::new(RawKind::Field, "hidden")
                    .with_type("int")
                    .with_access(Access::Private),
            ]),
            RawDecl::new(RawKind::Variable, "global").with_type("int"),
        ]]);
        assert_eq!(find(&graph, "S::m").kind, DeclKind::Method);
        assert_eq!(find(&graph, "S::count").kind, DeclKind::Field);
        assert_eq!(find(&graph, "global").kind, DeclKind::Variable);
        let conv = find(&graph, "S::operator bool");
        assert_eq!(conv.return_type.as_ref().unwrap().render(), "bool");
        assert_eq!(find(&graph, "S::hidden").access, Access::Private);
    }

    #[test]
    fn test_alias_chain_kept_and_cycles_excluded() {
        let (graph, diags) = collect(vec![vec![
            RawDecl::new(RawKind::Class, "Real"),
            RawDecl::new(RawKind::Typedef, "First").with_type("Real"),
            RawDecl::new(RawKind::Typedef, "Second").with_type("First"),
            RawDecl::new(RawKind::Typedef, "LoopA").with_type("LoopB"),
            RawDecl::new(RawKind::Typedef, "LoopB").with_type("LoopA"),
        ]]);
        let real = graph.lookup("Real")[0];
        let first = graph.lookup("First")[0];
        assert_eq!(find(&graph, "First").alias_of, Some(real));
        assert_eq!(find(&graph, "Second").alias_of, Some(first));
        assert_eq!(find(&graph, "LoopA").verdict, FilterVerdict::ExcludeStructural);
        assert_eq!(find(&graph, "LoopB").verdict, FilterVerdict::ExcludeStructural);
        assert!(diags.iter().any(|d| d.kind == DiagnosticKind::AliasCycle));
    }

    #[test]
    fn test_specialization_linked_to_primary() {
        let (graph, _) = collect(vec![vec![
            RawDecl::new(RawKind::ClassTemplate, "Traits").with_template_param("T", None),
            {
                let mut spec = RawDecl::new(RawKind::Struct, "Traits");
                spec.specialization_args = Some(vec!["int".to_string()]);
                spec
            },
        ]]);
        let primary = graph.lookup("Traits")[0];
        let spec = find(&graph, "Traits<int>");
        assert_eq!(spec.specialization.as_ref().unwrap().template, Some(primary));
        assert!(spec.is_full_specialization());
    }

    #[test]
    fn test_specialization_args_qualified() {
        let (graph, _) = collect(vec![vec![RawDecl::new(RawKind::Namespace, "Tests").with_children(vec![
            RawDecl::new(RawKind::ClassTemplate, "TypeTraits").with_template_param("T", None),
            RawDecl::new(RawKind::Class, "lowercase_type"),
            {
                let mut spec = RawDecl::new(RawKind::Struct, "TypeTraits");
                spec.specialization_args = Some(vec!["lowercase_type".to_string()]);
                spec
            },
        ])]]);
        let spec = find(&graph, "Tests::TypeTraits<Tests::lowercase_type>");
        assert!(spec.is_full_specialization());
        assert!(graph.lookup("Tests::TypeTraits<lowercase_type>").is_empty());
    }

    #[test]
    fn test_variadic_overload_is_not_a_redeclaration() {
        let (graph, _) = collect(vec![vec![
            RawDecl::new(RawKind::Function, "print_formatted").with_param("text", "const char*"),
            {
                let mut variadic = RawDecl::new(RawKind::Function, "print_formatted")
                    .with_param("format", "const char*");
                variadic.is_variadic = true;
                variadic
            },
            RawDecl::new(RawKind::Function, "print_formatted").with_param("other", "const char *"),
        ]]);
        let overloads = graph.lookup("print_formatted");
        assert_eq!(overloads.len(), 2);
        assert_eq!(overloads.iter().filter(|id| graph.get(**id).is_variadic()).count(), 1);
    }

    #[test]
    fn test_split_scope() {
        assert_eq!(split_scope("A::B::f"), Some(("A::B", "f")));
        assert_eq!(split_scope("Box<std::pair<int, int>>::get"), Some(("Box<std::pair<int, int>>", "get")));
        assert_eq!(split_scope("plain"), None);
    }
}

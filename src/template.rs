//! Template Instantiation Engine.
//!
//! Class templates are bound through the concrete instantiations a header names:
//! namespace-scope typedefs, explicit full specializations, uses in parameter, field
//! and base types, and configured requests. Each distinct instantiation (keyed by
//! its canonical spelling) becomes one synthetic class declaration placed in the
//! template's scope, just before the declaration that first needed it.
//!
//! Members of an instantiation can name further instantiations, so discovery runs
//! in rounds until nothing new appears.

use crate::ast::TemplateParamKind;
use crate::decl::typeref::normalize_expr;
use crate::decl::{
    DeclFlags, DeclGraph, DeclKind, Declaration, Indirection, NamePath, NameSegment, Specialization,
    TemplateArg, TypeBase, TypeRef,
};
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::filter::rules::Rules;
use crate::qualify::{Lookup, Resolver, merge_alias};
use crate::types::DeclId;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, trace};

/// Where an instantiation was first discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstantiationSource {
    Alias,
    Specialization,
    Implicit,
    Requested,
}

#[derive(Debug, Clone)]
pub struct Instantiation {
    pub template: DeclId,
    /// Synthetic class, or the explicit specialization standing in for it.
    pub decl: DeclId,
    /// Canonical spelling, e.g. `Tests::Matrix<int, 2, 2>`.
    pub key: String,
    /// Arguments qualified for generated code, defaults filled in.
    pub args: Vec<TemplateArg>,
    pub source: InstantiationSource,
}

impl Instantiation {
    pub fn is_synthetic(&self) -> bool {
        self.source != InstantiationSource::Specialization
    }
}

/// Every instantiation found so far, plus where each synthetic class is emitted.
#[derive(Debug, Clone, Default)]
pub struct Instantiations {
    items: Vec<Instantiation>,
    by_key: HashMap<String, usize>,
    by_decl: HashMap<DeclId, usize>,
    names: BTreeMap<DeclId, String>,
    /// Synthetic classes emitted right before a declaration of the same scope.
    before: HashMap<DeclId, Vec<DeclId>>,
    /// Synthetic classes emitted after every other member of a scope.
    trailing: HashMap<DeclId, Vec<DeclId>>,
    scanned: HashSet<DeclId>,
    seeded: bool,
}

impl Instantiations {
    pub fn iter(&self) -> impl Iterator<Item = &Instantiation> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Instantiation> {
        self.by_key.get(key).map(|i| &self.items[*i])
    }

    pub fn for_decl(&self, decl: DeclId) -> Option<&Instantiation> {
        self.by_decl.get(&decl).map(|i| &self.items[*i])
    }

    /// Synthetic instantiations of `template`, in discovery order.
    pub fn of_template(&self, template: DeclId) -> impl Iterator<Item = &Instantiation> {
        self.items
            .iter()
            .filter(move |i| i.template == template && i.is_synthetic())
    }

    /// Target names fixed by configuration.
    pub fn names(&self) -> &BTreeMap<DeclId, String> {
        &self.names
    }

    /// Members of `scope` in emission order, synthetic classes slotted in.
    pub fn ordered_children(&self, graph: &DeclGraph, scope: DeclId) -> Vec<DeclId> {
        let mut out = Vec::new();
        for &child in graph.children(scope) {
            if graph.get(child).is_synthetic() {
                continue;
            }
            out.extend(self.before.get(&child).into_iter().flatten().copied());
            out.push(child);
        }
        out.extend(self.trailing.get(&scope).into_iter().flatten().copied());
        out
    }

    fn register(&mut self, inst: Instantiation) {
        let index = self.items.len();
        self.by_key.insert(inst.key.clone(), index);
        self.by_decl.insert(inst.decl, index);
        self.items.push(inst);
    }

    fn place(&mut self, graph: &DeclGraph, decl: DeclId, scope: DeclId, anchor: DeclId) {
        // A nested instantiation goes before the instantiation that needed it.
        if graph.get(anchor).is_synthetic() {
            for list in self.before.values_mut().chain(self.trailing.values_mut()) {
                if let Some(pos) = list.iter().position(|d| *d == anchor) {
                    list.insert(pos, decl);
                    return;
                }
            }
        }
        let sibling = std::iter::once(anchor)
            .chain(graph.ancestors(anchor))
            .find(|d| graph.parent(*d) == Some(scope) && !graph.get(*d).is_synthetic());
        match sibling {
            Some(sibling) => self.before.entry(sibling).or_default().push(decl),
            None => self.trailing.entry(scope).or_default().push(decl),
        }
    }
}

/// One instantiation wanted by some declaration, already qualified and keyed.
#[derive(Debug, Clone)]
struct Candidate {
    template: DeclId,
    key: String,
    args: Vec<TemplateArg>,
    /// Declaration whose position and header the instantiation takes.
    anchor: DeclId,
    source: InstantiationSource,
    name: Option<String>,
}

pub struct TemplateEngine<'r> {
    rules: &'r Rules,
}

impl<'r> TemplateEngine<'r> {
    pub fn new(rules: &'r Rules) -> Self {
        Self { rules }
    }

    /// Run one discovery round and create the synthetic classes it finds.
    /// Returns the new declarations; an empty result means the fixed point is reached.
    pub fn step(
        &self,
        graph: &mut DeclGraph,
        registry: &mut Instantiations,
        diagnostics: &mut Diagnostics,
    ) -> Vec<DeclId> {
        let scan_ids: Vec<DeclId> = graph
            .ids()
            .filter(|id| !registry.scanned.contains(id))
            .collect();

        let (candidates, specialization_types) = {
            let resolver = Resolver::new(graph, self.rules);
            let mut candidates = Vec::new();
            let mut specialization_types = Vec::new();
            if !registry.seeded {
                specialization_types = self.seed_specializations(&resolver, registry);
                self.requested(&resolver, &mut candidates, diagnostics);
            }
            for &id in &scan_ids {
                self.scan(&resolver, registry, id, &mut candidates);
            }
            (candidates, specialization_types)
        };
        registry.seeded = true;
        registry.scanned.extend(scan_ids);
        for (id, ty) in specialization_types {
            graph.get_mut(id).ty = Some(ty);
        }

        let mut created = Vec::new();
        for candidate in candidates {
            if registry.by_key.contains_key(&candidate.key) {
                continue;
            }
            let id = self.instantiate(graph, registry, candidate);
            created.push(id);
        }
        debug!("[template] {} new instantiations", created.len());
        created
    }

    /// Explicit full specializations stand in for their instantiation. They also
    /// get a type, so a typedef naming them lends them its name.
    fn seed_specializations(
        &self,
        resolver: &Resolver<'_>,
        registry: &mut Instantiations,
    ) -> Vec<(DeclId, TypeRef)> {
        let graph = resolver.graph();
        let mut types = Vec::new();
        for decl in graph.iter() {
            if !decl.kind.is_record() || !decl.is_full_specialization() || decl.is_synthetic() {
                continue;
            }
            let Some(template) = decl.specialization.as_ref().and_then(|s| s.template) else {
                continue;
            };
            let Some(spec) = &decl.specialization else { continue };
            let context = graph.enclosing_scope(decl.id);
            let Some((key, args)) = self.prepare(resolver, template, &spec.args, context) else {
                continue;
            };
            if decl.ty.is_none() {
                types.push((decl.id, instantiation_type(resolver, template, &args)));
            }
            trace!("[template] specialization {} stands for {key}", decl.qualified_name);
            registry.register(Instantiation {
                template,
                decl: decl.id,
                key,
                args,
                source: InstantiationSource::Specialization,
            });
        }
        types
    }

    fn requested(&self, resolver: &Resolver<'_>, out: &mut Vec<Candidate>, diagnostics: &mut Diagnostics) {
        for request in &self.rules.instantiate {
            let template = match resolver.resolve_qualified(&request.template, DeclId::ROOT) {
                Lookup::Decl(t) if is_class_template(resolver.graph().get(t)) => t,
                _ => {
                    diagnostics.warn(
                        DiagnosticKind::UnknownTemplate,
                        None,
                        &request.template,
                        "configured instantiation names no class template",
                    );
                    continue;
                }
            };
            let args: Vec<TemplateArg> = request.args.iter().map(|a| TemplateArg::parse(a)).collect();
            match self.prepare(resolver, template, &args, DeclId::ROOT) {
                Some((key, args)) => out.push(Candidate {
                    template,
                    key,
                    args,
                    anchor: template,
                    source: InstantiationSource::Requested,
                    name: request.name.clone(),
                }),
                None => diagnostics.warn(
                    DiagnosticKind::UnknownTemplate,
                    Some(template),
                    &request.template,
                    format!("cannot instantiate with <{}>", request.args.join(", ")),
                ),
            }
        }
    }

    /// Collect the instantiations named by the types of one declaration.
    fn scan(&self, resolver: &Resolver<'_>, registry: &Instantiations, id: DeclId, out: &mut Vec<Candidate>) {
        let graph = resolver.graph();
        let decl = graph.get(id);

        if decl.is_synthetic() {
            let Some(inst) = registry.for_decl(id) else { return };
            let template = graph.get(inst.template);
            let bindings: HashMap<String, TemplateArg> = template
                .template_params
                .iter()
                .map(|p| p.name.clone())
                .zip(inst.args.iter().cloned())
                .collect();
            let mut members: Vec<DeclId> = vec![inst.template];
            members.extend(graph.children(inst.template).iter().copied().filter(|c| {
                let c = graph.get(*c);
                c.is_public() && c.verdict.is_included() && !c.is_template()
            }));
            for member in members {
                let m = graph.get(member);
                let types: Vec<&TypeRef> = if member == inst.template {
                    m.bases.iter().map(|b| &b.ty).collect()
                } else {
                    m.type_refs()
                };
                for ty in types {
                    let concrete = substitute(ty, &bindings);
                    self.uses(resolver, &concrete, member, id, InstantiationSource::Implicit, out);
                }
            }
            return;
        }

        if !decl.verdict.is_included()
            || !decl.is_public()
            || graph.in_template(id)
            || graph.has_excluded_ancestor(id)
        {
            return;
        }
        let source = if decl.kind == DeclKind::Typedef {
            InstantiationSource::Alias
        } else {
            InstantiationSource::Implicit
        };
        for ty in decl.type_refs() {
            self.uses(resolver, ty, id, id, source, out);
        }
    }

    /// Every concrete `Template<args>` inside `ty`, innermost first.
    fn uses(
        &self,
        resolver: &Resolver<'_>,
        ty: &TypeRef,
        context: DeclId,
        anchor: DeclId,
        source: InstantiationSource,
        out: &mut Vec<Candidate>,
    ) {
        let mut found: Vec<(NamePath, Vec<TemplateArg>)> = Vec::new();
        ty.visit_names(&mut |path: &NamePath| {
            for (i, seg) in path.segments.iter().enumerate() {
                if let Some(args) = &seg.args {
                    let prefix = NamePath {
                        global: path.global,
                        segments: path.segments[..=i]
                            .iter()
                            .map(|s| NameSegment::plain(s.name.clone()))
                            .collect(),
                    };
                    found.push((prefix, args.clone()));
                }
            }
        });
        found.reverse();

        for (prefix, args) in found {
            let Lookup::Decl(template) = resolver.resolve_path(&prefix, context) else {
                continue;
            };
            if !is_class_template(resolver.graph().get(template)) {
                continue;
            }
            if let Some((key, args)) = self.prepare(resolver, template, &args, context) {
                out.push(Candidate {
                    template,
                    key,
                    args,
                    anchor,
                    source,
                    name: None,
                });
            }
        }
    }

    /// Qualify the written arguments, fill defaults and compute the canonical key.
    /// `None` for dependent arguments or an arity the template cannot take.
    fn prepare(
        &self,
        resolver: &Resolver<'_>,
        template: DeclId,
        written: &[TemplateArg],
        context: DeclId,
    ) -> Option<(String, Vec<TemplateArg>)> {
        let graph = resolver.graph();
        let params = &graph.get(template).template_params;
        if written.len() > params.len() {
            return None;
        }
        let visible = visible_params(graph, context);
        if written.iter().any(|a| mentions_any(&a.render(), &visible)) {
            return None;
        }

        let qualified: Vec<TemplateArg> = written
            .iter()
            .map(|arg| qualify_arg(resolver, arg, context))
            .collect();
        let args = fill_defaults(resolver, template, &qualified)?;

        let canonical: Vec<String> = args
            .iter()
            .map(|arg| match arg {
                TemplateArg::Type(t) => resolver.canonical_type(t, template).render(),
                TemplateArg::Value(v) => normalize_expr(v),
            })
            .collect();
        let key = format!("{}<{}>", resolver.path_of(template), canonical.join(", "));
        Some((key, args))
    }

    fn instantiate(&self, graph: &mut DeclGraph, registry: &mut Instantiations, candidate: Candidate) -> DeclId {
        let template = graph.get(candidate.template).clone();
        let anchor = graph.get(candidate.anchor);
        let (header, location) = (anchor.header, anchor.location);
        let scope = template.parent.unwrap_or(DeclId::ROOT);

        let rendered: Vec<String> = candidate.args.iter().map(TemplateArg::render).collect();
        let mut decl = Declaration::new(template.kind, format!("{}<{}>", template.name, rendered.join(", ")), header);
        decl.flags = DeclFlags::SYNTHETIC | DeclFlags::DEFINITION;
        decl.access = template.access;
        decl.attributes = template.attributes.clone();
        decl.location = location;
        decl.specialization = Some(Specialization {
            template: Some(candidate.template),
            args: candidate.args.clone(),
        });
        let ty = {
            let resolver = Resolver::new(graph, self.rules);
            instantiation_type(&resolver, candidate.template, &candidate.args)
        };
        decl.ty = Some(ty);

        let id = graph.insert(scope, decl);
        let order = graph.get(candidate.anchor).order;
        graph.get_mut(id).order = order;
        debug!(
            "[template] {} ({:?}) from {}",
            candidate.key,
            candidate.source,
            graph.get(candidate.anchor).display_name()
        );

        registry.place(graph, id, scope, candidate.anchor);
        if let Some(name) = candidate.name {
            registry.names.insert(id, name);
        }
        registry.register(Instantiation {
            template: candidate.template,
            decl: id,
            key: candidate.key,
            args: candidate.args,
            source: candidate.source,
        });
        id
    }
}

/// Complete qualified arguments with the template's defaults, each default seeing
/// the arguments before it. `None` when a parameter is left without a value.
pub(crate) fn fill_defaults(
    resolver: &Resolver<'_>,
    template: DeclId,
    written: &[TemplateArg],
) -> Option<Vec<TemplateArg>> {
    let params = &resolver.graph().get(template).template_params;
    let mut bindings: HashMap<String, TemplateArg> = HashMap::new();
    let mut args = Vec::with_capacity(params.len());
    for (i, param) in params.iter().enumerate() {
        let arg = match written.get(i) {
            Some(arg) => arg.clone(),
            None => {
                let default = param.default.as_deref()?;
                let parsed = match param.kind {
                    TemplateParamKind::NonType => TemplateArg::Value(normalize_expr(default)),
                    _ => TemplateArg::parse(default),
                };
                substitute_arg(&qualify_arg(resolver, &parsed, template), &bindings)
            }
        };
        bindings.insert(param.name.clone(), arg.clone());
        args.push(arg);
    }
    Some(args)
}

pub(crate) fn is_class_template(decl: &Declaration) -> bool {
    decl.kind.is_record() && decl.is_template() && decl.specialization.is_none() && decl.is_definition()
}

/// `Template<args>` spelled from the template's durable path.
fn instantiation_type(resolver: &Resolver<'_>, template: DeclId, args: &[TemplateArg]) -> TypeRef {
    let mut path = resolver.path_of(template);
    if let Some(last) = path.segments.last_mut() {
        last.args = Some(args.to_vec());
    }
    TypeRef::named(path)
}

/// Names of every template parameter in scope at `id`.
fn visible_params(graph: &DeclGraph, id: DeclId) -> Vec<String> {
    std::iter::once(id)
        .chain(graph.ancestors(id))
        .flat_map(|d| graph.get(d).template_params.iter().map(|p| p.name.clone()))
        .collect()
}

pub(crate) fn mentions_any(text: &str, names: &[String]) -> bool {
    !names.is_empty()
        && text
            .split(|c: char| !(c.is_alphanumeric() || c == '_'))
            .any(|word| names.iter().any(|n| n == word))
}

pub(crate) fn qualify_arg(resolver: &Resolver<'_>, arg: &TemplateArg, context: DeclId) -> TemplateArg {
    match arg {
        TemplateArg::Type(t) => TemplateArg::Type(bare(resolver.qualify_type(t, context))),
        TemplateArg::Value(v) => TemplateArg::Value(normalize_expr(&resolver.qualify_expr(v, context))),
    }
}

/// Drop annotations so equal types compare equal.
fn bare(mut ty: TypeRef) -> TypeRef {
    ty.qualified = None;
    ty.canonical = None;
    ty.resolved = None;
    ty.refs.clear();
    ty.incomplete = false;
    ty.alias = None;
    ty.spelling = ty.render();
    ty
}

/// Replace template parameters in `ty` with bound arguments.
pub fn substitute(ty: &TypeRef, bindings: &HashMap<String, TemplateArg>) -> TypeRef {
    let mut out = match &ty.base {
        TypeBase::Named(path) => match single_name(path).and_then(|n| bindings.get(n)) {
            Some(TemplateArg::Type(arg)) => merge_alias(arg, ty),
            _ => {
                let mut t = ty.clone();
                t.base = TypeBase::Named(substitute_path(path, bindings));
                t
            }
        },
        TypeBase::Function(sig) => {
            let mut sig = (**sig).clone();
            sig.ret = substitute(&sig.ret, bindings);
            sig.params = sig.params.iter().map(|p| substitute(p, bindings)).collect();
            let mut t = ty.clone();
            t.base = TypeBase::Function(Box::new(sig));
            t
        }
        TypeBase::Builtin(_) | TypeBase::Opaque(_) => ty.clone(),
    };
    for ind in &mut out.indirections {
        if let Indirection::MemberPointer { class } = ind {
            *class = substitute_path(class, bindings);
        }
    }
    for dim in out.array_dims.iter_mut().flatten() {
        *dim = substitute_expr(dim, bindings);
    }
    bare(out)
}

pub fn substitute_arg(arg: &TemplateArg, bindings: &HashMap<String, TemplateArg>) -> TemplateArg {
    match arg {
        TemplateArg::Type(t) => {
            // A lone non-type parameter parses as a type name.
            let plain = t.indirections.is_empty() && !t.is_const && t.array_dims.is_empty();
            if let (true, Some(TemplateArg::Value(v))) = (
                plain,
                t.name_path().and_then(single_name).and_then(|n| bindings.get(n)),
            ) {
                return TemplateArg::Value(v.clone());
            }
            TemplateArg::Type(substitute(t, bindings))
        }
        TemplateArg::Value(v) => TemplateArg::Value(substitute_expr(v, bindings)),
    }
}

fn single_name(path: &NamePath) -> Option<&str> {
    match path.segments.as_slice() {
        [seg] if !path.global && seg.args.is_none() => Some(seg.name.as_str()),
        _ => None,
    }
}

fn substitute_path(path: &NamePath, bindings: &HashMap<String, TemplateArg>) -> NamePath {
    let mut segments = Vec::with_capacity(path.segments.len());
    for (i, seg) in path.segments.iter().enumerate() {
        // `T::value_type` with `T = Ns::Box<int>` becomes `Ns::Box<int>::value_type`.
        if i == 0 && !path.global && seg.args.is_none() && path.segments.len() > 1 {
            if let Some(TemplateArg::Type(arg)) = bindings.get(&seg.name) {
                if let (TypeBase::Named(p), true) = (&arg.base, arg.indirections.is_empty()) {
                    segments.extend(p.segments.iter().cloned());
                    continue;
                }
            }
        }
        let args = seg
            .args
            .as_ref()
            .map(|args| args.iter().map(|a| substitute_arg(a, bindings)).collect());
        segments.push(NameSegment {
            name: seg.name.clone(),
            args,
        });
    }
    NamePath {
        global: path.global,
        segments,
    }
}

/// Replace whole identifiers bound to an argument inside an expression.
fn substitute_expr(expr: &str, bindings: &HashMap<String, TemplateArg>) -> String {
    let mut out = String::with_capacity(expr.len());
    let mut word = String::new();
    let flush = |word: &mut String, out: &mut String| {
        if word.is_empty() {
            return;
        }
        let qualified_member = out.ends_with("::") || out.ends_with('.');
        match bindings.get(word.as_str()) {
            Some(arg) if !qualified_member && !word.starts_with(|c: char| c.is_ascii_digit()) => {
                let text = arg.render();
                if text.chars().all(|c| c.is_alphanumeric() || c == '_' || c == ':') {
                    out.push_str(&text);
                } else {
                    out.push('(');
                    out.push_str(&text);
                    out.push(')');
                }
            }
            _ => out.push_str(word),
        }
        word.clear();
    };
    for c in expr.chars() {
        if c.is_alphanumeric() || c == '_' {
            word.push(c);
        } else {
            flush(&mut word, &mut out);
            out.push(c);
        }
    }
    flush(&mut word, &mut out);
    out
}

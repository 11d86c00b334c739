//! Name resolution and qualification.
//!
//! Every name is resolved by walking the scope chain of the declaration that uses it,
//! innermost scope first, and descending through real scope members one whole segment
//! at a time. Qualified spellings are then rebuilt from the resolved declaration's
//! durable scope chain, so inline namespaces never appear and a segment is never
//! matched inside a longer identifier.

use crate::decl::{
    DeclGraph, DeclKind, Indirection, NamePath, NameSegment, TemplateArg, TypeBase, TypeRef,
};
use crate::filter::rules::Rules;
use crate::template::{fill_defaults, is_class_template, mentions_any, qualify_arg, substitute};
use crate::types::DeclId;
use std::collections::{BTreeMap, HashMap, HashSet};

const MAX_DEPTH: usize = 16;

const EXPR_KEYWORDS: &[&str] = &[
    "true", "false", "nullptr", "NULL", "this", "sizeof", "alignof", "static_cast",
    "dynamic_cast", "reinterpret_cast", "const_cast", "const", "volatile", "unsigned", "signed",
    "int", "long", "short", "char", "bool", "float", "double", "void", "new", "delete",
    "operator", "typename", "decltype", "noexcept", "auto", "template",
];

/// Outcome of looking up a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Decl(DeclId),
    /// A template parameter, or a name dependent on one.
    TemplateParam,
    /// Under a namespace configured as external (e.g. `std`).
    External,
    Unresolved,
}

pub struct Resolver<'g> {
    graph: &'g DeclGraph,
    rules: &'g Rules,
}

impl<'g> Resolver<'g> {
    pub fn new(graph: &'g DeclGraph, rules: &'g Rules) -> Self {
        Self { graph, rules }
    }

    pub fn graph(&self) -> &'g DeclGraph {
        self.graph
    }

    /// Resolve `path` as seen from the declaration `context`.
    pub fn resolve_path(&self, path: &NamePath, context: DeclId) -> Lookup {
        self.resolve_inner(path, context, 0)
    }

    fn resolve_inner(&self, path: &NamePath, context: DeclId, depth: usize) -> Lookup {
        if depth >= MAX_DEPTH {
            return Lookup::Unresolved;
        }
        let Some(first) = path.segments.first() else {
            return Lookup::Unresolved;
        };
        if !path.global && self.graph.template_param_owner(context, &first.name).is_some() {
            return Lookup::TemplateParam;
        }
        let names = path.names();
        let scopes = if path.global {
            vec![DeclId::ROOT]
        } else {
            self.graph.scope_chain(context)
        };
        for scope in scopes {
            if let Some(found) = self.descend(scope, &names, depth) {
                return Lookup::Decl(found);
            }
        }
        if self.rules.is_external(&path.without_args()) {
            Lookup::External
        } else {
            Lookup::Unresolved
        }
    }

    pub fn resolve_qualified(&self, name: &str, context: DeclId) -> Lookup {
        self.resolve_path(&NamePath::from_qualified(name), context)
    }

    fn descend(&self, start: DeclId, names: &[&str], depth: usize) -> Option<DeclId> {
        let mut current = start;
        for (i, name) in names.iter().enumerate() {
            let mut candidates = self.member_lookup(current, name, depth);
            // A constructor shares its class's name but never names a type.
            candidates.retain(|c| self.graph.get(*c).kind != DeclKind::Constructor);
            if candidates.is_empty() && self.is_injected_name(current, name) {
                candidates.push(current);
            }
            let last = i + 1 == names.len();
            let chosen = if last {
                // `typedef struct Foo Foo;` names the record, not the alias.
                let kind_of = |c: &DeclId| self.graph.get(*c).kind;
                candidates
                    .iter()
                    .find(|c| kind_of(c).is_type() && kind_of(c) != DeclKind::Typedef)
                    .or_else(|| candidates.iter().find(|c| kind_of(c).is_type() || kind_of(c) == DeclKind::Namespace))
                    .or_else(|| candidates.first())
                    .copied()
            } else {
                candidates.iter().copied().find(|c| {
                    let kind = self.graph.get(*c).kind;
                    kind.is_scope() || kind.is_type()
                })
            }?;
            current = if last {
                chosen
            } else {
                self.scope_of(chosen, depth)?
            };
        }
        Some(current)
    }

    /// Inside a class, the class's own name refers to the class.
    fn is_injected_name(&self, scope: DeclId, name: &str) -> bool {
        let decl = self.graph.get(scope);
        decl.kind.is_record() && decl.name.split('<').next() == Some(name)
    }

    /// The scope to continue a lookup in after `decl`; typedefs are followed.
    fn scope_of(&self, decl: DeclId, depth: usize) -> Option<DeclId> {
        let d = self.graph.get(decl);
        match d.kind {
            DeclKind::Typedef if depth < MAX_DEPTH => {
                let target = d.alias_of.or_else(|| {
                    let path = d.ty.as_ref()?.name_path()?.clone();
                    match self.resolve_inner(&path, decl, depth + 1) {
                        Lookup::Decl(t) => Some(t),
                        _ => None,
                    }
                })?;
                self.scope_of(target, depth + 1)
            }
            _ => Some(decl),
        }
    }

    /// Members named `name` in `scope`, then in its base classes.
    fn member_lookup(&self, scope: DeclId, name: &str, depth: usize) -> Vec<DeclId> {
        let found = self.graph.members_named(scope, name);
        if !found.is_empty() || depth >= MAX_DEPTH {
            return found;
        }
        let decl = self.graph.get(scope);
        if !decl.kind.is_record() {
            return found;
        }
        for base in &decl.bases {
            let target = base.ty.resolved.or_else(|| {
                let path = base.ty.name_path()?;
                // Base names are looked up from the scope enclosing the class.
                match self.resolve_inner(path, self.graph.enclosing_scope(scope), depth + 1) {
                    Lookup::Decl(t) if t != scope => Some(t),
                    _ => None,
                }
            });
            if let Some(target) = target.and_then(|t| self.scope_of(t, depth + 1)) {
                let inherited = self.member_lookup(target, name, depth + 1);
                if !inherited.is_empty() {
                    return inherited;
                }
            }
        }
        found
    }

    /// Durable path of a declaration: real scope names from outermost to innermost.
    pub fn path_of(&self, decl: DeclId) -> NamePath {
        let segments = self
            .path_owners(decl)
            .into_iter()
            .map(|id| NameSegment::plain(self.graph.get(id).name.clone()))
            .collect();
        NamePath {
            global: false,
            segments,
        }
    }

    /// Declarations behind each segment of [`Self::path_of`], outermost first.
    fn path_owners(&self, decl: DeclId) -> Vec<DeclId> {
        let mut owners = vec![decl];
        for ancestor in self.graph.ancestors(decl) {
            let a = self.graph.get(ancestor);
            let transparent = match a.kind {
                DeclKind::Root => true,
                DeclKind::Namespace => a.is_inline(),
                DeclKind::Enum => !a.is_scoped(),
                _ => a.name.is_empty(),
            };
            if !transparent {
                owners.push(ancestor);
            }
        }
        owners.reverse();
        owners
    }

    /// [`Self::path_of`] as seen from `context`: a class template enclosing `context`
    /// is spelled with its own parameters, e.g. `cv::Affine3<T>::Vec3Type`.
    pub fn dependent_path_of(&self, decl: DeclId, context: DeclId) -> NamePath {
        let mut path = self.path_of(decl);
        let enclosing: Vec<DeclId> = std::iter::once(context)
            .chain(self.graph.ancestors(context))
            .collect();
        for (seg, owner) in path.segments.iter_mut().zip(self.path_owners(decl)) {
            let o = self.graph.get(owner);
            if o.is_template() && o.kind.is_record() && enclosing.contains(&owner) {
                seg.args = Some(
                    o.template_params
                        .iter()
                        .map(|p| TemplateArg::Type(TypeRef::named(NamePath::from_qualified(&p.name))))
                        .collect(),
                );
            }
        }
        path
    }

    /// Qualified form of `path`, keeping the template arguments written on it.
    pub fn qualify_path(&self, path: &NamePath, context: DeclId) -> Option<NamePath> {
        let Lookup::Decl(decl) = self.resolve_path(path, context) else {
            return None;
        };
        // Inside a class template its injected name refers to the current instantiation.
        let mut qualified = self.dependent_path_of(decl, context);
        let n = qualified.segments.len();
        let m = path.segments.len();
        for k in 0..n.min(m) {
            let orig = &path.segments[m - 1 - k];
            let new = &mut qualified.segments[n - 1 - k];
            if new.name == orig.name && orig.args.is_some() {
                new.args = orig.args.clone();
            }
        }
        Some(qualified)
    }

    /// Fully qualify every name in a type, including template arguments.
    pub fn qualify_type(&self, ty: &TypeRef, context: DeclId) -> TypeRef {
        let mut out = ty.clone();
        out.visit_names_mut(&mut |path: &mut NamePath| {
            if let Some(q) = self.qualify_path(path, context) {
                *path = q;
            }
        });
        out.visit_values_mut(&mut |value: &mut String| {
            *value = self.qualify_expr(value, context);
        });
        out.spelling = out.render();
        out
    }

    /// Qualify identifiers inside an expression such as a default argument.
    pub fn qualify_expr(&self, expr: &str, context: DeclId) -> String {
        let chars: Vec<char> = expr.chars().collect();
        let mut out = String::with_capacity(expr.len());
        let mut i = 0;
        while i < chars.len() {
            let c = chars[i];
            if c == '"' || c == '\'' {
                let start = i;
                i += 1;
                while i < chars.len() && chars[i] != c {
                    if chars[i] == '\\' {
                        i += 1;
                    }
                    i += 1;
                }
                i = (i + 1).min(chars.len());
                out.extend(&chars[start..i]);
                continue;
            }
            if c.is_ascii_digit() {
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '.' || chars[i] == '\'') {
                    out.push(chars[i]);
                    i += 1;
                }
                continue;
            }
            let starts_chain = c.is_ascii_alphabetic()
                || c == '_'
                || (c == ':' && chars.get(i + 1) == Some(&':') && chars.get(i + 2).is_some_and(|n| n.is_ascii_alphabetic() || *n == '_'));
            if !starts_chain {
                out.push(c);
                i += 1;
                continue;
            }
            let start = i;
            loop {
                if chars.get(i) == Some(&':') && chars.get(i + 1) == Some(&':') {
                    i += 2;
                }
                let ident_start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                if i == ident_start {
                    break;
                }
                if !(chars.get(i) == Some(&':') && chars.get(i + 1) == Some(&':')) {
                    break;
                }
            }
            let chain: String = chars[start..i].iter().collect();
            let member_access = out.trim_end().ends_with('.') || out.trim_end().ends_with("->");
            if member_access || EXPR_KEYWORDS.contains(&chain.as_str()) {
                out.push_str(&chain);
                continue;
            }
            match self.resolve_qualified(&chain, context) {
                Lookup::Decl(decl) => out.push_str(&self.qualify_chain(&chain, decl, context)),
                _ => out.push_str(&chain),
            }
        }
        out
    }

    /// Spelling of a resolved `A::B::c` chain. A chain that continues through a
    /// typedef keeps the typedef and the rest as written, since the typedef's target
    /// may carry template arguments the chain does not spell.
    fn qualify_chain(&self, chain: &str, decl: DeclId, context: DeclId) -> String {
        let path = NamePath::from_qualified(chain);
        for k in 1..path.segments.len() {
            let prefix = NamePath {
                global: path.global,
                segments: path.segments[..k].to_vec(),
            };
            if let Lookup::Decl(found) = self.resolve_path(&prefix, context) {
                if self.graph.get(found).kind == DeclKind::Typedef {
                    let rest: Vec<&str> = path.segments[k..].iter().map(|s| s.name.as_str()).collect();
                    return format!("{}::{}", self.dependent_path_of(found, context), rest.join("::"));
                }
            }
        }
        self.dependent_path_of(decl, context).to_string()
    }

    /// Qualified type with every typedef expanded. Two spellings of the same type
    /// produce the same canonical rendering.
    pub fn canonical_type(&self, ty: &TypeRef, context: DeclId) -> TypeRef {
        self.canonical_inner(ty, context, 0)
    }

    fn canonical_inner(&self, ty: &TypeRef, context: DeclId, depth: usize) -> TypeRef {
        let mut out = self.qualify_type(ty, context);
        if depth >= MAX_DEPTH {
            return out;
        }
        let member = match &ty.base {
            TypeBase::Named(path) => self.instantiation_member(path, context, depth),
            _ => None,
        };
        if let Some(expanded) = member {
            out = merge_alias(&expanded, ty);
        } else if let TypeBase::Named(path) = &ty.base {
            if let Lookup::Decl(decl) = self.resolve_path(path, context) {
                let d = self.graph.get(decl);
                if d.kind == DeclKind::Typedef && !self.graph.in_template(decl) {
                    if let Some(underlying) = &d.ty {
                        let expanded = self.canonical_inner(underlying, decl, depth + 1);
                        out = merge_alias(&expanded, ty);
                    }
                }
            }
        }
        // Template arguments are canonical too, defaults included.
        if let TypeBase::Named(path) = &mut out.base {
            self.fill_default_args(path, context);
            for seg in &mut path.segments {
                for arg in seg.args.iter_mut().flatten() {
                    match arg {
                        TemplateArg::Type(t) => *t = self.canonical_inner(t, context, depth + 1),
                        TemplateArg::Value(v) => *v = crate::decl::typeref::normalize_expr(v),
                    }
                }
            }
        }
        out.spelling = out.render();
        out
    }

    /// Append the defaults a class template use leaves out: `Matrix<int, 2>` is
    /// `Matrix<int, 2, 1>` when the last parameter defaults to `1`.
    fn fill_default_args(&self, path: &mut NamePath, context: DeclId) {
        for i in 0..path.segments.len() {
            let Some(written) = path.segments[i].args.clone() else {
                continue;
            };
            let prefix = NamePath {
                global: path.global,
                segments: path.segments[..=i]
                    .iter()
                    .map(|s| NameSegment::plain(s.name.clone()))
                    .collect(),
            };
            let Lookup::Decl(template) = self.resolve_path(&prefix, context) else {
                continue;
            };
            let t = self.graph.get(template);
            if !is_class_template(t) || written.len() >= t.template_params.len() {
                continue;
            }
            if let Some(args) = fill_defaults(self, template, &written) {
                path.segments[i].args = Some(args);
            }
        }
    }

    /// Expansion of a member typedef named through an instantiation, such as
    /// `Tests::DataType<float>::channel_type`. A matching explicit specialization
    /// is used when one exists, otherwise the primary template with its
    /// parameters bound.
    fn instantiation_member(&self, path: &NamePath, context: DeclId, depth: usize) -> Option<TypeRef> {
        let n = path.segments.len();
        if n < 2 {
            return None;
        }
        let owner = &path.segments[n - 2];
        let written = owner.args.as_ref()?;
        let prefix = NamePath {
            global: path.global,
            segments: path.segments[..n - 1]
                .iter()
                .map(|s| NameSegment::plain(s.name.clone()))
                .collect(),
        };
        let Lookup::Decl(template) = self.resolve_path(&prefix, context) else {
            return None;
        };
        let t = self.graph.get(template);
        if !is_class_template(t) {
            return None;
        }
        let visible: Vec<String> = std::iter::once(context)
            .chain(self.graph.ancestors(context))
            .flat_map(|d| self.graph.get(d).template_params.iter().map(|p| p.name.clone()))
            .collect();
        if written.iter().any(|a| mentions_any(&a.render(), &visible)) {
            return None;
        }
        let qualified: Vec<TemplateArg> = written.iter().map(|a| qualify_arg(self, a, context)).collect();
        let args = fill_defaults(self, template, &qualified)?;
        let canonical: Vec<String> = args
            .iter()
            .map(|arg| match arg {
                TemplateArg::Type(a) => self.canonical_inner(a, context, depth + 1).render(),
                TemplateArg::Value(v) => crate::decl::typeref::normalize_expr(v),
            })
            .collect();
        let member = &path.segments[n - 1].name;
        let typedef_in = |scope: DeclId| {
            self.graph
                .members_named(scope, member)
                .into_iter()
                .find(|c| self.graph.get(*c).kind == DeclKind::Typedef)
        };

        let scope = t.parent.unwrap_or(DeclId::ROOT);
        let specialization = self
            .graph
            .members_named(scope, &format!("{}<{}>", t.name, canonical.join(", ")))
            .into_iter()
            .find(|c| self.graph.get(*c).kind.is_record());
        if let Some(spec) = specialization {
            let typedef = typedef_in(spec)?;
            let underlying = self.graph.get(typedef).ty.as_ref()?;
            return Some(self.canonical_inner(underlying, typedef, depth + 1));
        }

        let typedef = typedef_in(template)?;
        let underlying = self.graph.get(typedef).ty.as_ref()?;
        let bindings: HashMap<String, TemplateArg> = t
            .template_params
            .iter()
            .map(|p| p.name.clone())
            .zip(args)
            .collect();
        let concrete = substitute(underlying, &bindings);
        Some(self.canonical_inner(&concrete, template, depth + 1))
    }

    /// Every declaration `ty` depends on, through template arguments and typedefs.
    pub fn references(&self, ty: &TypeRef, context: DeclId) -> Vec<DeclId> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        self.collect_refs(ty, context, &mut out, &mut seen, 0);
        out
    }

    fn collect_refs(
        &self,
        ty: &TypeRef,
        context: DeclId,
        out: &mut Vec<DeclId>,
        seen: &mut HashSet<DeclId>,
        depth: usize,
    ) {
        if depth > MAX_DEPTH {
            return;
        }
        let mut paths = Vec::new();
        ty.visit_names(&mut |p: &NamePath| paths.push(p.clone()));
        for path in paths {
            if let Lookup::Decl(decl) = self.resolve_path(&path, context) {
                if !seen.insert(decl) {
                    continue;
                }
                out.push(decl);
                let d = self.graph.get(decl);
                if d.kind == DeclKind::Typedef {
                    if let Some(underlying) = &d.ty {
                        self.collect_refs(underlying, decl, out, seen, depth + 1);
                    }
                }
            }
        }
    }

    /// Name of the first incomplete type `ty` reaches through a pointer, reference
    /// or template argument. By-value uses of an incomplete type are fine.
    pub fn incomplete_reason(&self, ty: &TypeRef, context: DeclId) -> Option<String> {
        self.incomplete_inner(ty, context, ty.is_indirect(), 0)
    }

    fn incomplete_inner(&self, ty: &TypeRef, context: DeclId, indirect: bool, depth: usize) -> Option<String> {
        if depth > MAX_DEPTH {
            return None;
        }
        let indirect = indirect || ty.is_indirect();
        match &ty.base {
            TypeBase::Builtin(_) => None,
            TypeBase::Opaque(text) => Some(text.clone()),
            TypeBase::Function(sig) => std::iter::once(&sig.ret)
                .chain(sig.params.iter())
                .find_map(|t| self.incomplete_inner(t, context, false, depth + 1)),
            TypeBase::Named(path) => {
                for seg in &path.segments {
                    for arg in seg.args.iter().flatten() {
                        if let TemplateArg::Type(t) = arg {
                            // Any incomplete argument poisons the instantiation.
                            if let Some(reason) = self.incomplete_inner(t, context, true, depth + 1) {
                                return Some(reason);
                            }
                        }
                    }
                }
                match self.resolve_path(path, context) {
                    Lookup::TemplateParam | Lookup::External => None,
                    Lookup::Unresolved => indirect.then(|| path.to_string()),
                    Lookup::Decl(decl) => {
                        let d = self.graph.get(decl);
                        match d.kind {
                            DeclKind::Typedef => d
                                .ty
                                .as_ref()
                                .and_then(|u| self.incomplete_inner(u, decl, indirect, depth + 1)),
                            kind if kind.is_record() => {
                                let complete = d.is_definition() || self.has_definition(&d.qualified_name);
                                (!complete && indirect).then(|| d.qualified_name.clone())
                            }
                            _ => None,
                        }
                    }
                }
            }
        }
    }

    fn has_definition(&self, qualified: &str) -> bool {
        self.graph
            .lookup(qualified)
            .iter()
            .any(|id| self.graph.get(*id).kind.is_record() && self.graph.get(*id).is_definition())
    }
}

/// Substitute an expanded typedef into a use site: `const Alias&` where
/// `Alias = Foo*` becomes `Foo* const&`.
pub(crate) fn merge_alias(expanded: &TypeRef, use_site: &TypeRef) -> TypeRef {
    let mut out = expanded.clone();
    if use_site.is_const {
        if let Some(Indirection::Pointer { is_const }) = out.indirections.last_mut() {
            *is_const = true;
        } else {
            out.is_const = true;
        }
    }
    out.is_volatile |= use_site.is_volatile;
    out.indirections.extend(use_site.indirections.iter().cloned());
    out.array_dims.extend(use_site.array_dims.iter().cloned());
    out
}

/// Namespace-scope typedefs that name a template instantiation, keyed by the
/// instantiation's canonical spelling. Typedefs inside templates never enter it.
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    entries: BTreeMap<String, DeclId>,
}

impl AliasTable {
    pub fn build(graph: &DeclGraph) -> Self {
        let mut entries = BTreeMap::new();
        for decl in graph.iter() {
            if decl.kind != DeclKind::Typedef || graph.in_template(decl.id) {
                continue;
            }
            let parent_kind = decl.parent.map(|p| graph.get(p).kind);
            if !matches!(parent_kind, Some(DeclKind::Root | DeclKind::Namespace)) {
                continue;
            }
            let Some(ty) = &decl.ty else { continue };
            let is_instantiation = ty.name_path().and_then(NamePath::template_args).is_some();
            if !is_instantiation || ty.is_indirect() || ty.is_const {
                continue;
            }
            if let Some(canonical) = &ty.canonical {
                entries.entry(canonical.clone()).or_insert(decl.id);
            }
        }
        Self { entries }
    }

    pub fn get(&self, canonical: &str) -> Option<DeclId> {
        self.entries.get(canonical).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Fill `qualified`, `canonical`, `resolved`, `refs` and `incomplete` on every type
/// in the graph, then the preferred `alias` once the alias table is known.
pub fn annotate(graph: &mut DeclGraph, rules: &Rules) -> AliasTable {
    annotate_ids(graph, rules, graph.ids().collect());
    let aliases = AliasTable::build(graph);
    apply_aliases(graph, &aliases);
    aliases
}

/// Annotate only the given declarations (used for synthetic instantiations).
pub fn annotate_ids(graph: &mut DeclGraph, rules: &Rules, ids: Vec<DeclId>) {
    let updates: Vec<(DeclId, Vec<TypeRef>)> = {
        let resolver = Resolver::new(graph, rules);
        ids.iter()
            .map(|&id| {
                let decl = graph.get(id);
                let annotated = decl
                    .type_refs()
                    .into_iter()
                    .map(|ty| annotate_type(&resolver, ty, id))
                    .collect();
                (id, annotated)
            })
            .collect()
    };
    for (id, annotated) in updates {
        let decl = graph.get_mut(id);
        for (slot, ty) in decl.type_refs_mut().into_iter().zip(annotated) {
            *slot = ty;
        }
    }
}

fn annotate_type(resolver: &Resolver<'_>, ty: &TypeRef, context: DeclId) -> TypeRef {
    let mut out = ty.clone();
    out.qualified = Some(resolver.qualify_type(ty, context).render());
    out.canonical = Some(resolver.canonical_type(ty, context).render());
    out.resolved = ty.name_path().and_then(|p| match resolver.resolve_path(p, context) {
        Lookup::Decl(d) => Some(d),
        _ => None,
    });
    out.refs = resolver.references(ty, context);
    out.incomplete = resolver.incomplete_reason(ty, context).is_some();
    out
}

pub fn apply_aliases(graph: &mut DeclGraph, aliases: &AliasTable) {
    if aliases.is_empty() {
        return;
    }
    let ids: Vec<DeclId> = graph.ids().collect();
    for id in ids {
        let own_alias = graph.get(id).kind == DeclKind::Typedef;
        let names: Vec<Option<String>> = graph
            .get(id)
            .type_refs()
            .iter()
            .map(|ty| {
                let key = ty.canonical.as_ref()?;
                let alias = aliases.get(key)?;
                (!own_alias || alias != id).then(|| graph.get(alias).qualified_name.clone())
            })
            .collect();
        for (ty, alias) in graph.get_mut(id).type_refs_mut().into_iter().zip(names) {
            if alias.is_some() {
                ty.alias = alias;
            }
        }
    }
}

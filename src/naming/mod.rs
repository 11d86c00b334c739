//! Overload & Naming Resolver.
//!
//! Groups same-name callables per scope into [`OverloadSet`]s, flags members that need
//! an explicit signature, detects true ambiguity, and derives the target identifier and
//! scope handle of every declaration. User renames are applied last.

pub mod case;
pub mod operators;

use crate::decl::{DeclGraph, DeclKind, Declaration, FilterVerdict, Indirection, TypeRef};
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::filter::rules::Rules;
use crate::qualify::{Lookup, Resolver};
use crate::types::DeclId;
use case::{camelize, underscore, upcase_first};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, warn};

/// Callables sharing a name within one scope, including members a class pulls in
/// from its bases through `using Base::name;`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverloadSet {
    pub scope: DeclId,
    pub name: String,
    pub members: Vec<DeclId>,
}

impl OverloadSet {
    pub fn needs_explicit_signature(&self) -> bool {
        self.members.len() > 1
    }
}

/// Names and handles for every declaration, computed once per pipeline run.
#[derive(Debug, Clone, Default)]
pub struct Naming {
    targets: HashMap<DeclId, String>,
    handles: HashMap<DeclId, String>,
    explicit: HashSet<DeclId>,
    sets: Vec<OverloadSet>,
}

impl Naming {
    /// Target-language identifier.
    pub fn target(&self, id: DeclId) -> Option<&str> {
        self.targets.get(&id).map(String::as_str)
    }

    /// C++ variable holding the registered module, class or enum.
    pub fn handle(&self, id: DeclId) -> Option<&str> {
        self.handles.get(&id).map(String::as_str)
    }

    pub fn needs_explicit_signature(&self, id: DeclId) -> bool {
        self.explicit.contains(&id)
    }

    pub fn overload_sets(&self) -> &[OverloadSet] {
        &self.sets
    }

    pub fn overload_set_of(&self, id: DeclId) -> Option<&OverloadSet> {
        self.sets.iter().find(|s| s.members.contains(&id))
    }
}

pub struct NamingResolver<'r> {
    rules: &'r Rules,
    overrides: BTreeMap<DeclId, String>,
}

impl<'r> NamingResolver<'r> {
    pub fn new(rules: &'r Rules) -> Self {
        Self {
            rules,
            overrides: BTreeMap::new(),
        }
    }

    /// Fixed target names, e.g. the `name` of a configured instantiation.
    pub fn with_overrides(mut self, overrides: BTreeMap<DeclId, String>) -> Self {
        self.overrides = overrides;
        self
    }

    /// Build overload sets, exclude truly ambiguous members, and name everything.
    pub fn resolve(&self, graph: &mut DeclGraph, diagnostics: &mut Diagnostics) -> Naming {
        let sets = self.overload_sets(graph);
        self.exclude_ambiguous(graph, &sets, diagnostics);

        let mut naming = Naming::default();
        for set in &sets {
            if set.needs_explicit_signature() {
                // Members inherited through `using` are emitted with their own class.
                naming.explicit.extend(
                    set.members
                        .iter()
                        .copied()
                        .filter(|m| graph.get(*m).parent == Some(set.scope)),
                );
            }
        }
        naming.sets = sets;

        for decl in graph.iter() {
            if let Some(target) = self.target_name(decl) {
                naming.targets.insert(decl.id, target);
            }
        }
        naming.handles = assign_handles(graph);
        debug!(
            "[naming] {} targets, {} overload sets needing signatures",
            naming.targets.len(),
            naming.sets.iter().filter(|s| s.needs_explicit_signature()).count()
        );
        naming
    }

    pub fn overload_sets(&self, graph: &DeclGraph) -> Vec<OverloadSet> {
        let resolver = Resolver::new(graph, self.rules);
        let mut sets = Vec::new();
        for scope in std::iter::once(DeclId::ROOT).chain(graph.ids()) {
            let scope_decl = graph.get(scope);
            if !scope_decl.kind.is_scope() {
                continue;
            }
            let mut by_name: BTreeMap<String, Vec<DeclId>> = BTreeMap::new();
            for &child in graph.children(scope) {
                let decl = graph.get(child);
                if matches!(decl.kind, DeclKind::Function | DeclKind::Method | DeclKind::Constructor) {
                    by_name.entry(decl.name.clone()).or_default().push(child);
                }
            }
            if scope_decl.kind.is_record() {
                for &child in graph.children(scope) {
                    let using = graph.get(child);
                    if using.kind != DeclKind::UsingDeclaration {
                        continue;
                    }
                    let Some(target) = &using.using_target else { continue };
                    let inherited = match resolver.resolve_qualified(target, scope) {
                        Lookup::Decl(found) => {
                            let base = graph.get(found).parent.unwrap_or(DeclId::ROOT);
                            graph
                                .children(base)
                                .iter()
                                .copied()
                                .filter(|c| graph.get(*c).name == using.name && graph.get(*c).kind.is_callable())
                                .collect::<Vec<_>>()
                        }
                        _ => Vec::new(),
                    };
                    if !inherited.is_empty() {
                        let entry = by_name.entry(using.name.clone()).or_default();
                        for id in inherited {
                            if !entry.contains(&id) {
                                entry.push(id);
                            }
                        }
                    }
                }
            }
            for (name, mut members) in by_name {
                members.sort_by_key(|m| graph.get(*m).order);
                sets.push(OverloadSet {
                    scope,
                    name,
                    members,
                });
            }
        }
        sets
    }

    /// Members whose parameter lists are identical after erasure cannot be told apart
    /// by any explicit signature.
    fn exclude_ambiguous(&self, graph: &mut DeclGraph, sets: &[OverloadSet], diagnostics: &mut Diagnostics) {
        for set in sets.iter().filter(|s| s.needs_explicit_signature()) {
            let mut seen: HashMap<(Vec<String>, bool), DeclId> = HashMap::new();
            let mut clashes = Vec::new();
            for &member in &set.members {
                let decl = graph.get(member);
                if decl.parent != Some(set.scope) || !decl.verdict.is_included() || decl.is_template() {
                    continue;
                }
                let key = erasure_key(decl);
                match seen.get(&key) {
                    Some(first) => clashes.push((*first, member)),
                    None => {
                        seen.insert(key, member);
                    }
                }
            }
            for (first, second) in clashes {
                for id in [first, second] {
                    let decl = graph.get_mut(id);
                    if decl.verdict == FilterVerdict::ExcludeStructural {
                        continue;
                    }
                    decl.verdict = FilterVerdict::ExcludeStructural;
                    let name = decl.qualified_name.clone();
                    warn!("[naming] ambiguous overload {name}");
                    diagnostics.error(
                        DiagnosticKind::AmbiguousOverload,
                        Some(id),
                        &name,
                        "parameter list is identical to another overload after erasure",
                    );
                }
            }
        }
    }

    fn target_name(&self, decl: &Declaration) -> Option<String> {
        if let Some(name) = self.overrides.get(&decl.id) {
            return Some(name.clone());
        }
        let derived = match decl.kind {
            DeclKind::Root | DeclKind::Destructor | DeclKind::UsingDeclaration => return None,
            DeclKind::Namespace => camelize(&decl.name),
            DeclKind::Class | DeclKind::Struct | DeclKind::Union => {
                if decl.name.is_empty() {
                    return None;
                }
                record_target(decl)
            }
            DeclKind::Enum => {
                if decl.name.is_empty() {
                    return None;
                }
                camelize(&decl.name)
            }
            DeclKind::Typedef => camelize(&decl.name),
            DeclKind::EnumConstant | DeclKind::Macro => upcase_first(&decl.name),
            // Module-level variables can only be bound as constants.
            DeclKind::Variable => upcase_first(&decl.name),
            DeclKind::Field => {
                if is_constant(decl) {
                    upcase_first(&decl.name)
                } else if decl.is_static() {
                    // Class-level attributes read like constants: `StaticFieldOne`.
                    camelize(&decl.name)
                } else {
                    underscore(&decl.name)
                }
            }
            DeclKind::Constructor => "initialize".to_string(),
            DeclKind::Conversion => match &decl.return_type {
                Some(ret) => operators::conversion_name(ret),
                None => format!("to_{}", underscore(decl.name.trim_start_matches("operator").trim())),
            },
            DeclKind::Function | DeclKind::Method => self.callable_target(decl)?,
        };

        let mapped = match decl.kind {
            DeclKind::Namespace
            | DeclKind::Class
            | DeclKind::Struct
            | DeclKind::Union
            | DeclKind::Enum
            | DeclKind::Typedef => self.rules.rename_types.map(&decl.qualified_name, &decl.name),
            _ => self.rules.rename_methods.map(&decl.qualified_name, &decl.name),
        };
        Some(mapped.unwrap_or(derived))
    }

    fn callable_target(&self, decl: &Declaration) -> Option<String> {
        let explicit_params = decl.params.len();
        if decl.is_operator() {
            let symbol = operators::operator_symbol(&decl.name)?;
            // A free operator's first parameter is the object.
            let arity = if decl.kind == DeclKind::Function {
                explicit_params.saturating_sub(1)
            } else {
                explicit_params
            };
            return operators::operator_name(symbol, arity);
        }

        let base = underscore(&decl.name);
        let returns_bool = decl.return_type.as_ref().is_some_and(TypeRef::is_bool);
        if !returns_bool {
            return Some(base);
        }
        for prefix in &self.rules.predicate_prefixes {
            let marker = format!("{}_", underscore(prefix));
            if let Some(rest) = base.strip_prefix(&marker) {
                if !rest.is_empty() {
                    return Some(format!("{rest}?"));
                }
            }
        }
        if explicit_params == 0 {
            Some(format!("{base}?"))
        } else {
            Some(base)
        }
    }
}

/// Specializations and instantiations prefer the typedef that names them.
fn record_target(decl: &Declaration) -> String {
    if decl.specialization.is_some() {
        if let Some(alias) = decl.ty.as_ref().and_then(|t| t.alias.as_deref()) {
            let last = alias.rsplit("::").next().unwrap_or(alias);
            return camelize(last);
        }
        return instantiation_target(&decl.name);
    }
    camelize(&decl.name)
}

/// `Matx<unsigned char, 2, 1>` to `MatxUnsignedChar21`. Only the last scope segment
/// of each argument contributes, so `TypeTraits<Tests::lowercase_type>` becomes
/// `TypeTraitsLowercaseType`.
fn instantiation_target(name: &str) -> String {
    let Some((base, args)) = name.split_once('<') else {
        return camelize(name);
    };
    let args = args.strip_suffix('>').unwrap_or(args);
    let mut out = camelize(last_segment(base.trim()));
    for arg in split_top_level(args) {
        out.push_str(&camelize(last_segment(arg.trim())));
    }
    out
}

/// Text after the last `::` outside angle brackets.
fn last_segment(text: &str) -> &str {
    let mut depth = 0i32;
    let mut start = 0;
    let bytes = text.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'<' | b'(' => depth += 1,
            b'>' | b')' => depth -= 1,
            b':' if depth == 0 && bytes.get(i + 1) == Some(&b':') => start = i + 2,
            _ => {}
        }
    }
    text.get(start..).unwrap_or(text)
}

fn split_top_level(args: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in args.char_indices() {
        match c {
            '<' | '(' => depth += 1,
            '>' | ')' => depth -= 1,
            ',' if depth == 0 => {
                out.push(&args[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    out.push(&args[start..]);
    out
}

/// Static const members, const variables and enumerators bind as constants.
pub fn is_constant(decl: &Declaration) -> bool {
    match decl.kind {
        DeclKind::EnumConstant | DeclKind::Macro => true,
        DeclKind::Field => decl.is_static() && is_const_value(decl),
        DeclKind::Variable => is_const_value(decl),
        _ => false,
    }
}

fn is_const_value(decl: &Declaration) -> bool {
    decl.is_const()
        || decl.ty.as_ref().is_some_and(|t| match t.indirections.last() {
            Some(Indirection::Pointer { is_const }) => *is_const,
            Some(_) => t.is_const && t.pointer_depth() == 0,
            None => t.is_const,
        })
}

/// Parameter types with typedefs expanded and top-level const removed, plus the
/// method's own const qualifier.
fn erasure_key(decl: &Declaration) -> (Vec<String>, bool) {
    let mut params: Vec<String> = decl
        .params
        .iter()
        .map(|p| {
            let mut ty = TypeRef::parse(p.ty.canonical.as_deref().unwrap_or(&p.ty.spelling))
                .unwrap_or_else(|_| p.ty.clone());
            if ty.indirections.is_empty() {
                ty.is_const = false;
            } else if let Some(Indirection::Pointer { is_const }) = ty.indirections.last_mut() {
                *is_const = false;
            }
            if !ty.array_dims.is_empty() {
                ty.array_dims.clear();
                ty.indirections.push(Indirection::Pointer { is_const: false });
            }
            ty.render()
        })
        .collect();
    if decl.is_variadic() {
        params.push("...".to_string());
    }
    (params, decl.is_const())
}

/// `rb_m` / `rb_c` plus the camelized qualified name, unique across the graph.
fn assign_handles(graph: &DeclGraph) -> HashMap<DeclId, String> {
    let mut handles = HashMap::new();
    let mut used: HashSet<String> = HashSet::new();
    for decl in graph.iter() {
        let prefix = match decl.kind {
            DeclKind::Namespace => "rb_m",
            DeclKind::Class | DeclKind::Struct | DeclKind::Union | DeclKind::Enum => "rb_c",
            _ => continue,
        };
        if decl.name.is_empty() {
            continue;
        }
        let stem = camelize(&decl.qualified_name);
        let mut handle = format!("{prefix}{stem}");
        let mut n = 2;
        while !used.insert(handle.clone()) {
            handle = format!("{prefix}{stem}{n}");
            n += 1;
        }
        handles.insert(decl.id, handle);
    }
    handles
}

//! Emission planning.
//!
//! Walks each header's declarations in source order (with synthetic instantiations
//! slotted in) and records what to register and where. Containers are always planned
//! before their members, and a class is always registered after its base when both
//! live in the same unit.

use super::{
    ArgKind, ArgSpec, BindingEmission, Builder, ClassEmission, EmitOp, EnumEmission,
    FunctionEmission, HandleDecl, Lambda, Member, UnitPlan,
};
use crate::decl::typeref::{normalize_expr, render_path};
use crate::decl::{
    Classification, DeclFlags, DeclGraph, DeclKind, Declaration, Indirection, NamePath,
    TemplateArg, TemplateParam, TypeBase, TypeRef,
};
use crate::filter::rules::Rules;
use crate::naming::case::{camelize, underscore};
use crate::naming::operators::{OperatorForm, operator_form, operator_symbol};
use crate::naming::{Naming, is_constant};
use crate::qualify::{Lookup, Resolver};
use crate::template::{Instantiations, mentions_any, substitute};
use crate::types::{DeclId, HeaderId};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::Path;
use tracing::{debug, trace};

const MAX_DEPTH: usize = 16;

#[derive(Debug, Clone, Default)]
pub struct EmitOptions {
    /// Prefix for the header spelling in `#include <...>`, e.g. `opencv2/`.
    pub include_prefix: Option<String>,
}

/// Per-unit state while planning.
#[derive(Debug)]
struct Unit {
    header: HeaderId,
    /// Classes whose handle is assigned earlier in this unit.
    defined: HashSet<DeclId>,
    ipp: BTreeSet<String>,
    sstream: bool,
}

/// The class whose members are being listed.
struct Owner<'d> {
    decl: &'d Declaration,
    /// Spelling of the class in generated code.
    cpp: String,
    /// Template parameters in scope when planning a builder.
    params: Vec<String>,
}

pub struct Planner<'a> {
    graph: &'a DeclGraph,
    naming: &'a Naming,
    instantiations: &'a Instantiations,
    resolver: Resolver<'a>,
    options: EmitOptions,
    builders: BTreeMap<DeclId, Builder>,
}

impl<'a> Planner<'a> {
    pub fn new(
        graph: &'a DeclGraph,
        naming: &'a Naming,
        instantiations: &'a Instantiations,
        rules: &'a Rules,
        options: EmitOptions,
    ) -> Self {
        let mut planner = Self {
            graph,
            naming,
            instantiations,
            resolver: Resolver::new(graph, rules),
            options,
            builders: BTreeMap::new(),
        };
        planner.builders = planner.plan_builders();
        planner
    }

    /// One plan per header, in header order.
    pub fn plan(&self) -> Vec<UnitPlan> {
        (0..self.graph.headers().len())
            .map(|i| self.plan_unit(HeaderId(i as u32)))
            .collect()
    }

    pub fn plan_unit(&self, header: HeaderId) -> UnitPlan {
        let stem = self.stem(header);
        let mut unit = Unit {
            header,
            defined: HashSet::new(),
            ipp: BTreeSet::new(),
            sstream: false,
        };
        let mut emissions = self.plan_scope(DeclId::ROOT, &mut unit);
        emissions.extend(self.plan_wrappers(&mut unit));

        let builders: Vec<Builder> = self
            .builders
            .values()
            .filter(|b| self.graph.get(b.template).header == header)
            .cloned()
            .collect();
        if !builders.is_empty() {
            unit.ipp.insert(stem.clone());
        }

        let mut handles: Vec<HandleDecl> = emissions
            .iter()
            .filter_map(|e| {
                let handle = e.handle.clone()?;
                let ty = match &e.op {
                    EmitOp::Module { .. } => "Rice::Module".to_string(),
                    EmitOp::Class(class) => format!("Rice::Data_Type<{}>", class.cpp),
                    EmitOp::Enum(en) => format!("Rice::Enum<{}>", en.cpp),
                    _ => return None,
                };
                Some(HandleDecl {
                    qualified: self.graph.get(e.decl).qualified_name.clone(),
                    ty,
                    handle,
                })
            })
            .collect();
        handles.sort();
        handles.dedup_by(|a, b| a.handle == b.handle);

        debug!(
            "[emit] {stem}: {} statements, {} builders",
            emissions.len(),
            builders.len()
        );
        UnitPlan {
            header,
            include: self.include(header),
            init: format!("Init_{}", camelize(&stem)),
            stem,
            handles,
            ipp_includes: unit.ipp.into_iter().collect(),
            builders,
            emissions,
            needs_sstream: unit.sstream,
        }
    }

    fn stem(&self, header: HeaderId) -> String {
        self.graph
            .header_path(header)
            .and_then(Path::file_stem)
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("header{}", header.0))
    }

    fn include(&self, header: HeaderId) -> String {
        let file = self
            .graph
            .header_path(header)
            .and_then(Path::file_name)
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        match &self.options.include_prefix {
            Some(prefix) => format!("{}/{file}", prefix.trim_end_matches('/')),
            None => file,
        }
    }

    fn plan_scope(&self, scope: DeclId, unit: &mut Unit) -> Vec<BindingEmission> {
        let mut out = Vec::new();
        for child in self.instantiations.ordered_children(self.graph, scope) {
            let decl = self.graph.get(child);
            if !decl.verdict.is_included() || !decl.is_public() {
                continue;
            }
            match decl.kind {
                DeclKind::Namespace if decl.is_inline() => {
                    out.extend(self.plan_scope(child, unit));
                }
                DeclKind::Namespace => {
                    let inner = self.plan_scope(child, unit);
                    if inner.is_empty() {
                        continue;
                    }
                    let Some(name) = self.naming.target(child) else {
                        continue;
                    };
                    out.push(BindingEmission {
                        decl: child,
                        handle: self.naming.handle(child).map(str::to_string),
                        op: EmitOp::Module {
                            name: name.to_string(),
                            parent: self.module_of(child),
                        },
                    });
                    out.extend(inner);
                }
                kind if kind.is_record() => {
                    if decl.header != unit.header || !self.is_bound(child) {
                        continue;
                    }
                    let Some(class) = self.plan_class(decl, unit) else {
                        continue;
                    };
                    unit.defined.insert(child);
                    out.push(BindingEmission {
                        decl: child,
                        handle: self.naming.handle(child).map(str::to_string),
                        op: EmitOp::Class(class),
                    });
                    out.extend(self.plan_scope(child, unit));
                }
                DeclKind::Enum if decl.header == unit.header => {
                    out.extend(self.plan_enum(decl, unit));
                }
                DeclKind::Function if decl.header == unit.header && !decl.is_operator() => {
                    out.extend(self.plan_function(decl));
                }
                DeclKind::Variable | DeclKind::Macro if decl.header == unit.header => {
                    let Some(name) = self.naming.target(child) else {
                        continue;
                    };
                    let value = match decl.kind {
                        DeclKind::Macro => decl.name.clone(),
                        _ => self.cpp_name(child),
                    };
                    out.push(BindingEmission {
                        decl: child,
                        handle: None,
                        op: EmitOp::Constant {
                            scope: self.constant_scope(child, unit),
                            name: name.to_string(),
                            value,
                        },
                    });
                }
                _ => {}
            }
        }
        out
    }

    /// Records that get their own registration statement.
    fn is_bound(&self, id: DeclId) -> bool {
        let decl = self.graph.get(id);
        decl.kind.is_record()
            && !decl.name.is_empty()
            && decl.verdict.is_included()
            && decl.is_public()
            && decl.is_definition()
            && !self.graph.in_template(id)
            && !self.graph.has_excluded_ancestor(id)
    }

    fn plan_class(&self, decl: &Declaration, unit: &mut Unit) -> Option<ClassEmission> {
        let name = self.naming.target(decl.id)?.to_string();
        let cpp = self.cpp_name(decl.id);
        let members = match self
            .instantiations
            .for_decl(decl.id)
            .filter(|inst| inst.is_synthetic())
        {
            Some(inst) => match self.builders.get(&inst.template) {
                Some(builder) => {
                    unit.ipp
                        .insert(self.stem(self.graph.get(inst.template).header));
                    vec![Member::Define {
                        function: builder.function.clone(),
                        class: cpp.clone(),
                        args: inst.args.iter().map(TemplateArg::render).collect(),
                    }]
                }
                None => Vec::new(),
            },
            None => self.members(&Owner {
                decl,
                cpp: cpp.clone(),
                params: Vec::new(),
            }),
        };
        Some(ClassEmission {
            parent: self.parent_expr(decl.id, unit),
            base: self.base_of(decl),
            cpp,
            name,
            members,
        })
    }

    fn plan_enum(&self, decl: &Declaration, unit: &Unit) -> Vec<BindingEmission> {
        let enumerators: Vec<&Declaration> = self
            .graph
            .children(decl.id)
            .iter()
            .map(|c| self.graph.get(*c))
            .filter(|c| c.kind == DeclKind::EnumConstant && c.verdict.is_included())
            .collect();

        if decl.name.is_empty() {
            // Anonymous enumerators become constants of the enclosing scope.
            let scope = self.constant_scope(decl.id, unit);
            return enumerators
                .into_iter()
                .filter_map(|c| {
                    Some(BindingEmission {
                        decl: c.id,
                        handle: None,
                        op: EmitOp::Constant {
                            scope: scope.clone(),
                            name: self.naming.target(c.id)?.to_string(),
                            value: format!("(int){}", self.cpp_name(c.id)),
                        },
                    })
                })
                .collect();
        }

        let Some(name) = self.naming.target(decl.id) else {
            return Vec::new();
        };
        let cpp = self.cpp_name(decl.id);
        let values = enumerators
            .into_iter()
            .filter_map(|c| Some((self.naming.target(c.id)?.to_string(), format!("{cpp}::{}", c.name))))
            .collect();
        vec![BindingEmission {
            decl: decl.id,
            handle: self.naming.handle(decl.id).map(str::to_string),
            op: EmitOp::Enum(EnumEmission {
                cpp,
                name: name.to_string(),
                parent: self.parent_expr(decl.id, unit),
                values,
            }),
        }]
    }

    fn plan_function(&self, decl: &Declaration) -> Option<BindingEmission> {
        if decl.is_template() || decl.is_deleted() {
            return None;
        }
        let name = self.naming.target(decl.id)?.to_string();
        Some(BindingEmission {
            decl: decl.id,
            handle: None,
            op: EmitOp::Function(FunctionEmission {
                module: self.module_of(decl.id),
                name,
                signature: self
                    .naming
                    .needs_explicit_signature(decl.id)
                    .then(|| self.signature(decl, None)),
                pointer: format!("&{}", self.cpp_name(decl.id)),
                args: self.args(decl, None),
                return_buffer: decl.return_classification == Classification::Buffer,
            }),
        })
    }

    /// Non-member operators grouped by the class they are attached to.
    fn plan_wrappers(&self, unit: &mut Unit) -> Vec<BindingEmission> {
        let mut groups: Vec<(DeclId, Vec<Member>)> = Vec::new();
        for decl in self.graph.iter() {
            if decl.kind != DeclKind::Function
                || decl.header != unit.header
                || !decl.is_operator()
                || !decl.verdict.is_included()
                || self.graph.in_template(decl.id)
                || self.graph.has_excluded_ancestor(decl.id)
            {
                continue;
            }
            let Some((class, member)) = self.operator_wrapper(decl, unit) else {
                trace!("[emit] no wrapper for {}", decl.display_name());
                continue;
            };
            match groups.iter_mut().find(|(c, _)| *c == class) {
                Some((_, members)) => members.push(member),
                None => groups.push((class, vec![member])),
            }
        }
        groups
            .into_iter()
            .map(|(class, members)| BindingEmission {
                decl: class,
                handle: None,
                op: EmitOp::Wrappers {
                    target: self.class_ref(class, unit),
                    members,
                },
            })
            .collect()
    }

    fn operator_wrapper(&self, decl: &Declaration, unit: &mut Unit) -> Option<(DeclId, Member)> {
        let symbol = operator_symbol(&decl.name)?;
        let first = decl.params.first()?;

        if symbol == "<<" && decl.params.len() == 2 && first.ty.spelling.contains("ostream") {
            let shown = &decl.params[1];
            let class = self.wrapped_class(&shown.ty, decl.id)?;
            unit.sstream = true;
            return Some((
                class,
                Member::Lambda(Lambda {
                    name: "inspect".to_string(),
                    params: format!("{} self", self.spell(&shown.ty, None)),
                    ret: Some("std::string".to_string()),
                    body: vec![
                        "std::ostringstream stream;".to_string(),
                        "stream << self;".to_string(),
                        "return stream.str();".to_string(),
                    ],
                }),
            ));
        }

        let class = self.wrapped_class(&first.ty, decl.id)?;
        let name = self.naming.target(decl.id)?.to_string();
        let arity = decl.params.len() - 1;
        let ret = decl
            .return_type
            .as_ref()
            .map(|r| self.spell(r, None))
            .unwrap_or_else(|| "void".to_string());
        let this = format!("{} self", self.spell(&first.ty, None));
        let other = || format!("{this}, {} other", self.spell(&decl.params[1].ty, None));
        let (params, body) = match (operator_form(symbol, arity), arity) {
            (OperatorForm::Binary, 1) => (other(), vec![format!("return self {symbol} other;")]),
            (OperatorForm::Compound, 1) => (
                other(),
                vec![format!("self {symbol} other;"), "return self;".to_string()],
            ),
            (OperatorForm::Unary, 0) => (this, vec![format!("return {symbol}self;")]),
            _ => return None,
        };
        Some((
            class,
            Member::Lambda(Lambda {
                name,
                params,
                ret: Some(ret),
                body,
            }),
        ))
    }

    fn wrapped_class(&self, ty: &TypeRef, context: DeclId) -> Option<DeclId> {
        self.record_of(ty, context).filter(|id| self.is_bound(*id))
    }

    fn plan_builders(&self) -> BTreeMap<DeclId, Builder> {
        let mut out = BTreeMap::new();
        let mut used = HashSet::new();
        for decl in self.graph.iter() {
            let is_class_template = decl.kind.is_record()
                && decl.is_template()
                && decl.specialization.is_none()
                && decl.is_definition();
            if !is_class_template
                || !decl.verdict.is_included()
                || self.graph.has_excluded_ancestor(decl.id)
                || self.instantiations.of_template(decl.id).next().is_none()
            {
                continue;
            }
            let params: Vec<String> = decl.template_params.iter().map(|p| p.name.clone()).collect();
            let mut path = self.resolver.path_of(decl.id);
            if let Some(last) = path.segments.last_mut() {
                last.args = Some(
                    params
                        .iter()
                        .map(|p| TemplateArg::Type(TypeRef::named(NamePath::from_qualified(p))))
                        .collect(),
                );
            }
            let owner = Owner {
                decl,
                cpp: path.to_string(),
                params,
            };
            let members = self.members(&owner);
            if members.is_empty() {
                debug!("[emit] {} has nothing to register", decl.qualified_name);
                continue;
            }
            let mut function = format!("{}_builder", decl.name);
            if !used.insert(function.clone()) {
                function = format!("{}_builder", decl.qualified_name.replace("::", "_"));
                used.insert(function.clone());
            }
            out.insert(
                decl.id,
                Builder {
                    template: decl.id,
                    function,
                    params: decl.template_params.iter().map(TemplateParam::declaration).collect(),
                    members,
                },
            );
        }
        out
    }

    fn members(&self, owner: &Owner<'_>) -> Vec<Member> {
        let graph = self.graph;
        let id = owner.decl.id;
        let is_abstract = graph
            .children(id)
            .iter()
            .any(|c| graph.get(*c).flags.contains(DeclFlags::PURE_VIRTUAL));
        let declares_constructor = graph
            .children(id)
            .iter()
            .any(|c| graph.get(*c).kind == DeclKind::Constructor);

        let mut members = Vec::new();
        if !is_abstract && !declares_constructor {
            members.push(Member::Constructor {
                class: owner.cpp.clone(),
                params: Vec::new(),
                args: Vec::new(),
            });
        }
        for &child in graph.children(id) {
            let m = graph.get(child);
            if !m.verdict.is_included() || !m.is_public() || m.is_deleted() || m.is_template() {
                continue;
            }
            match m.kind {
                DeclKind::Constructor => {
                    let moves = m.params.len() == 1 && m.params[0].ty.is_rvalue_reference();
                    if !is_abstract && !moves {
                        members.push(Member::Constructor {
                            class: owner.cpp.clone(),
                            params: m.params.iter().map(|p| self.spell(&p.ty, Some(owner))).collect(),
                            args: self.args(m, Some(owner)),
                        });
                    }
                }
                DeclKind::Method if is_iterator_method(m) => {
                    members.extend(self.iterator(m, owner));
                }
                DeclKind::Method => {
                    members.extend(self.method(m, owner));
                    members.extend(self.index_setter(m, owner));
                }
                DeclKind::Conversion => members.extend(self.conversion(m, owner)),
                DeclKind::Field => members.extend(self.field(m, owner)),
                _ => {}
            }
        }
        members
    }

    fn method(&self, m: &Declaration, owner: &Owner<'_>) -> Option<Member> {
        Some(Member::Method {
            name: self.naming.target(m.id)?.to_string(),
            signature: self
                .naming
                .needs_explicit_signature(m.id)
                .then(|| self.signature(m, Some(owner))),
            pointer: format!("&{}::{}", owner.cpp, m.name),
            args: self.args(m, Some(owner)),
            return_buffer: m.return_classification == Classification::Buffer,
            singleton: m.is_static(),
        })
    }

    /// `begin`/`rbegin` with a matching `end`/`rend` become an iterator.
    fn iterator(&self, m: &Declaration, owner: &Owner<'_>) -> Option<Member> {
        let (end, base) = match m.name.as_str() {
            "begin" => ("end", "each"),
            "rbegin" => ("rend", "each_reverse"),
            _ => return None,
        };
        let siblings: Vec<&Declaration> = self
            .graph
            .children(owner.decl.id)
            .iter()
            .map(|c| self.graph.get(*c))
            .filter(|d| d.kind == DeclKind::Method && d.params.is_empty() && d.is_public())
            .filter(|d| d.verdict.is_included())
            .collect();
        if !siblings.iter().any(|d| d.name == end && d.is_const() == m.is_const()) {
            return None;
        }
        let has_mutable = siblings.iter().any(|d| d.name == m.name && !d.is_const());
        let name = if m.is_const() && has_mutable {
            format!("{base}_const")
        } else {
            base.to_string()
        };
        let ret = m
            .return_type
            .as_ref()
            .map(|r| self.spell(r, Some(owner)))
            .unwrap_or_else(|| "void".to_string());
        let constness = if m.is_const() { " const" } else { "" };
        Some(Member::Iterator {
            name,
            signature: format!("{ret}({}::*)(){constness}", owner.cpp),
            begin: format!("&{}::{}", owner.cpp, m.name),
            end: format!("&{}::{end}", owner.cpp),
        })
    }

    /// A non-const `operator[]` returning a mutable reference also gets `[]=`.
    fn index_setter(&self, m: &Declaration, owner: &Owner<'_>) -> Option<Member> {
        if m.name != "operator[]" || m.is_const() || m.params.len() != 1 {
            return None;
        }
        let ret = m.return_type.as_ref()?;
        if !matches!(ret.indirections.last(), Some(Indirection::LValueRef)) {
            return None;
        }
        let mut value = ret.clone();
        value.indirections.pop();
        let mutable = match value.indirections.last() {
            Some(Indirection::Pointer { is_const }) => !is_const,
            Some(_) => false,
            None => !value.is_const,
        };
        if !mutable {
            return None;
        }
        let spelled = self.spell(ret, Some(owner));
        let spelled = spelled.trim_end_matches('&').trim_end();
        let value_param = if value.indirections.is_empty() {
            format!("const {spelled}& value")
        } else {
            format!("{spelled} const& value")
        };
        Some(Member::Lambda(Lambda {
            name: "[]=".to_string(),
            params: format!(
                "{}& self, {} index, {value_param}",
                owner.cpp,
                self.spell(&m.params[0].ty, Some(owner))
            ),
            ret: None,
            body: vec!["self[index] = value;".to_string()],
        }))
    }

    fn conversion(&self, m: &Declaration, owner: &Owner<'_>) -> Option<Member> {
        let ret = self.spell(m.return_type.as_ref()?, Some(owner));
        let constness = if m.is_const() { "const " } else { "" };
        Some(Member::Lambda(Lambda {
            name: self.naming.target(m.id)?.to_string(),
            params: format!("{constness}{}& self", owner.cpp),
            ret: Some(ret),
            body: vec!["return self;".to_string()],
        }))
    }

    fn field(&self, m: &Declaration, owner: &Owner<'_>) -> Option<Member> {
        let name = self.naming.target(m.id)?.to_string();
        if m.is_static() && is_constant(m) {
            return Some(Member::Constant {
                name,
                value: format!("{}::{}", owner.cpp, m.name),
            });
        }
        Some(Member::Attr {
            name,
            pointer: format!("&{}::{}", owner.cpp, m.name),
            read_only: self.read_only(m),
            singleton: m.is_static(),
        })
    }

    /// Const, reference and array fields, and fields of a class type that cannot be
    /// assigned, are exposed read-only.
    fn read_only(&self, field: &Declaration) -> bool {
        let Some(ty) = &field.ty else {
            return false;
        };
        let canonical = self.canonical(ty, field.id);
        if field.is_const() || ty.is_reference() || !canonical.array_dims.is_empty() {
            return true;
        }
        match canonical.indirections.last() {
            Some(Indirection::Pointer { is_const }) => return *is_const,
            Some(_) => return true,
            None if canonical.is_const => return true,
            None => {}
        }
        self.record_of(ty, field.id)
            .is_some_and(|record| !self.assignable(record, 0))
    }

    fn assignable(&self, record: DeclId, depth: usize) -> bool {
        if depth >= MAX_DEPTH {
            return true;
        }
        let own = self.members_source(record);
        let graph = self.graph;
        for &child in graph.children(own) {
            let c = graph.get(child);
            let blocked = match c.kind {
                DeclKind::Method => {
                    c.name == "operator="
                        && (c.is_deleted() || !c.is_public())
                        && !c.params.first().is_some_and(|p| p.ty.is_rvalue_reference())
                }
                // Const and reference members delete the implicit assignment.
                DeclKind::Field => {
                    !c.is_static()
                        && c.ty.as_ref().is_some_and(|t| {
                            t.is_reference() || (t.is_const && t.indirections.is_empty())
                        })
                }
                _ => false,
            };
            if blocked {
                return false;
            }
        }
        graph.get(own).bases.iter().all(|base| {
            self.record_of(&base.ty, own)
                .is_none_or(|b| self.assignable(b, depth + 1))
        })
    }

    fn copyable(&self, ty: &TypeRef, context: DeclId) -> bool {
        match self.record_of(ty, context) {
            Some(record) => self.copy_constructible(record, 0),
            None => true,
        }
    }

    fn copy_constructible(&self, record: DeclId, depth: usize) -> bool {
        if depth >= MAX_DEPTH {
            return true;
        }
        let own = self.members_source(record);
        let graph = self.graph;
        let name = graph.get(own).name.clone();
        let blocked = graph.children(own).iter().map(|c| graph.get(*c)).any(|c| {
            c.kind == DeclKind::Constructor
                && (c.is_deleted() || !c.is_public())
                && c.params.len() == 1
                && matches!(c.params[0].ty.indirections.last(), Some(Indirection::LValueRef))
                && c.params[0]
                    .ty
                    .name_path()
                    .and_then(NamePath::last)
                    .is_some_and(|seg| seg.name == name)
        });
        if blocked {
            return false;
        }
        graph.get(own).bases.iter().all(|base| {
            self.record_of(&base.ty, own)
                .is_none_or(|b| self.copy_constructible(b, depth + 1))
        })
    }

    /// Declaration holding the members of `record`: the template for an instantiation.
    fn members_source(&self, record: DeclId) -> DeclId {
        self.instantiations
            .for_decl(record)
            .filter(|inst| inst.is_synthetic())
            .map_or(record, |inst| inst.template)
    }

    fn signature(&self, m: &Declaration, owner: Option<&Owner<'_>>) -> String {
        let ret = m
            .return_type
            .as_ref()
            .map(|r| self.spell(r, owner))
            .unwrap_or_else(|| "void".to_string());
        let params = m
            .params
            .iter()
            .map(|p| self.spell(&p.ty, owner))
            .collect::<Vec<_>>()
            .join(", ");
        match owner {
            Some(owner) if !m.is_static() => {
                let constness = if m.is_const() { " const" } else { "" };
                format!("{ret}({}::*)({params}){constness}", owner.cpp)
            }
            _ => format!("{ret}(*)({params})"),
        }
    }

    fn args(&self, m: &Declaration, owner: Option<&Owner<'_>>) -> Vec<ArgSpec> {
        m.params
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let name = if p.name.is_empty() {
                    format!("arg_{i}")
                } else {
                    underscore(&p.name)
                };
                let kind = match p.classification {
                    Classification::Buffer => ArgKind::Buffer,
                    Classification::Dependent => p
                        .ty
                        .name_path()
                        .and_then(NamePath::last)
                        .map_or(ArgKind::Arg, |seg| ArgKind::Dependent(seg.name.clone())),
                    _ => ArgKind::Arg,
                };
                let default = p
                    .default
                    .as_deref()
                    .and_then(|value| self.default_value(&p.ty, value, m.id, owner));
                ArgSpec {
                    name,
                    kind,
                    default,
                }
            })
            .collect()
    }

    fn default_value(
        &self,
        ty: &TypeRef,
        value: &str,
        context: DeclId,
        owner: Option<&Owner<'_>>,
    ) -> Option<String> {
        // The runtime copies defaults, so non-copyable classes lose theirs.
        if !self.copyable(ty, context) {
            return None;
        }
        let value = self.resolver.qualify_expr(&normalize_expr(value), context);
        if !self.canonical(ty, context).array_dims.is_empty() {
            return Some(value);
        }
        let spelled = ty.alias.clone().unwrap_or_else(|| self.spell(ty, owner));
        if value == "{}" {
            let decayed = spelled.trim_start_matches("const ").trim_end_matches('&').trim_end();
            return Some(format!("static_cast<{spelled}>({decayed}{{}})"));
        }
        Some(format!("static_cast<{spelled}>({value})"))
    }

    fn base_of(&self, decl: &Declaration) -> Option<String> {
        let inst = self
            .instantiations
            .for_decl(decl.id)
            .filter(|inst| inst.is_synthetic());
        let (source, bindings) = match inst {
            Some(inst) => {
                let template = self.graph.get(inst.template);
                let bindings: HashMap<String, TemplateArg> = template
                    .template_params
                    .iter()
                    .map(|p| p.name.clone())
                    .zip(inst.args.iter().cloned())
                    .collect();
                (template, Some(bindings))
            }
            None => (decl, None),
        };
        for base in source.bases.iter().filter(|b| b.access == crate::ast::Access::Public) {
            let ty = match &bindings {
                Some(bindings) => substitute(&base.ty, bindings),
                None => base.ty.clone(),
            };
            let Some(record) = self.record_of(&ty, source.id) else {
                continue;
            };
            if !self.is_bound(record) {
                trace!("[emit] omitting base {} of {}", ty.spelling, decl.qualified_name);
                continue;
            }
            return Some(ty.alias.clone().unwrap_or_else(|| self.cpp_name(record)));
        }
        None
    }

    /// The record a by-value use of `ty` names, looking through typedefs and
    /// instantiations.
    fn record_of(&self, ty: &TypeRef, context: DeclId) -> Option<DeclId> {
        let value = self.canonical(ty, context).decayed();
        if value.is_indirect() || !value.array_dims.is_empty() {
            return None;
        }
        if let Some(inst) = self.instantiations.get(&value.render()) {
            return Some(inst.decl);
        }
        let path = value.name_path()?;
        let Lookup::Decl(mut id) = self.resolver.resolve_path(path, DeclId::ROOT) else {
            return None;
        };
        for _ in 0..MAX_DEPTH {
            match self.graph.get(id).alias_of {
                Some(target) if self.graph.get(id).kind == DeclKind::Typedef => id = target,
                _ => break,
            }
        }
        self.graph.get(id).kind.is_record().then_some(id)
    }

    fn canonical(&self, ty: &TypeRef, context: DeclId) -> TypeRef {
        match &ty.canonical {
            Some(canonical) => TypeRef::parse_lossy(canonical),
            None => self.resolver.canonical_type(ty, context),
        }
    }

    /// Spelling of a type in generated code. Inside a builder, names under a class
    /// template get their parameters and a `typename` where they are dependent.
    fn spell(&self, ty: &TypeRef, owner: Option<&Owner<'_>>) -> String {
        let emitted = ty.emitted();
        let Some(owner) = owner.filter(|o| !o.params.is_empty()) else {
            return emitted;
        };
        let mut parsed = TypeRef::parse_lossy(&emitted);
        parsed.visit_names_mut(&mut |path: &mut NamePath| self.complete_template_args(path));
        mark_dependent(&mut parsed, &owner.params);
        parsed.render()
    }

    /// `Tests::Container::iterator` inside the template becomes
    /// `Tests::Container<T>::iterator`.
    fn complete_template_args(&self, path: &mut NamePath) {
        let n = path.segments.len();
        let mut prefix = String::new();
        for seg in path.segments.iter_mut().take(n.saturating_sub(1)) {
            if !prefix.is_empty() {
                prefix.push_str("::");
            }
            prefix.push_str(&seg.name);
            if seg.args.is_some() {
                continue;
            }
            let template = self
                .graph
                .lookup(&prefix)
                .iter()
                .map(|id| self.graph.get(*id))
                .find(|d| d.kind.is_record() && d.is_template() && d.specialization.is_none());
            if let Some(template) = template {
                seg.args = Some(
                    template
                        .template_params
                        .iter()
                        .map(|p| TemplateArg::Type(TypeRef::named(NamePath::from_qualified(&p.name))))
                        .collect(),
                );
            }
        }
    }

    /// Qualified C++ spelling of a declaration.
    fn cpp_name(&self, id: DeclId) -> String {
        self.resolver.path_of(id).to_string()
    }

    /// Handle of the nearest enclosing module.
    fn module_of(&self, id: DeclId) -> Option<String> {
        self.graph
            .ancestors(id)
            .into_iter()
            .map(|a| self.graph.get(a))
            .find(|a| (a.kind == DeclKind::Namespace && !a.is_inline()) || a.kind == DeclKind::Root)
            .filter(|a| a.kind == DeclKind::Namespace)
            .and_then(|a| self.naming.handle(a.id))
            .map(str::to_string)
    }

    /// The module or class a declaration is registered under; `None` at the root.
    fn parent_expr(&self, id: DeclId, unit: &Unit) -> Option<String> {
        for ancestor in self.graph.ancestors(id) {
            let a = self.graph.get(ancestor);
            match a.kind {
                DeclKind::Root => return None,
                DeclKind::Namespace if a.is_inline() => continue,
                DeclKind::Namespace => return self.naming.handle(ancestor).map(str::to_string),
                kind if kind.is_record() => return Some(self.class_ref(ancestor, unit)),
                _ => continue,
            }
        }
        None
    }

    fn constant_scope(&self, id: DeclId, unit: &Unit) -> String {
        self.parent_expr(id, unit)
            .unwrap_or_else(|| "Class(rb_cObject)".to_string())
    }

    /// A class registered in this unit is referenced by handle, any other one by
    /// looking up its registered type.
    fn class_ref(&self, id: DeclId, unit: &Unit) -> String {
        match (unit.defined.contains(&id), self.naming.handle(id)) {
            (true, Some(handle)) => handle.to_string(),
            _ => format!("Data_Type<{}>()", self.cpp_name(id)),
        }
    }
}

/// Prefix `typename` to every qualified name that depends on `params`, including
/// names nested in template arguments:
/// `Point_<typename Tests::DataType<_Tp>::channel_type>`.
fn mark_dependent(ty: &mut TypeRef, params: &[String]) {
    let replacement = match &mut ty.base {
        TypeBase::Named(path) => {
            for seg in &mut path.segments {
                for arg in seg.args.iter_mut().flatten() {
                    if let TemplateArg::Type(inner) = arg {
                        mark_dependent(inner, params);
                    }
                }
            }
            is_dependent_path(path, params).then(|| {
                let mut text = String::from("typename ");
                render_path(path, &mut text);
                text
            })
        }
        TypeBase::Function(sig) => {
            mark_dependent(&mut sig.ret, params);
            for p in &mut sig.params {
                mark_dependent(p, params);
            }
            None
        }
        TypeBase::Builtin(_) | TypeBase::Opaque(_) => None,
    };
    if let Some(text) = replacement {
        ty.base = TypeBase::Opaque(text);
    }
}

/// A name below a template parameter or below a template use that mentions one.
fn is_dependent_path(path: &NamePath, params: &[String]) -> bool {
    let n = path.segments.len();
    n > 1
        && path.segments[..n - 1].iter().enumerate().any(|(i, seg)| {
            (i == 0 && params.contains(&seg.name))
                || seg
                    .args
                    .iter()
                    .flatten()
                    .any(|arg| mentions_any(&arg.render(), params))
        })
}

/// Iterator accessors. Only `begin` and `rbegin` produce a registration; the
/// `c`-prefixed forms duplicate the const overloads.
fn is_iterator_method(m: &Declaration) -> bool {
    m.params.is_empty()
        && matches!(
            m.name.as_str(),
            "begin" | "end" | "rbegin" | "rend" | "cbegin" | "cend" | "crbegin" | "crend"
        )
}

//! Filter Engine: one [`FilterVerdict`] per declaration.
//!
//! Rules apply in priority order: variadic, deprecated, unexported, skip rule,
//! transitive skip, incomplete type, safe-bool conversion. Transitive skips and the
//! demotion of classes whose every member is excluded feed each other, so both are
//! iterated until no verdict changes.

pub mod rules;

use crate::decl::{DeclGraph, DeclKind, Declaration, FilterVerdict, TypeRef};
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::types::DeclId;
use rules::Rules;
use std::collections::BTreeMap;
use tracing::debug;

/// Verdict counts after a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterStats {
    pub counts: BTreeMap<FilterVerdict, usize>,
    pub rounds: usize,
}

impl FilterStats {
    pub fn excluded(&self) -> usize {
        self.counts
            .iter()
            .filter(|(v, _)| !v.is_included())
            .map(|(_, n)| n)
            .sum()
    }
}

pub struct FilterEngine<'r> {
    rules: &'r Rules,
}

impl<'r> FilterEngine<'r> {
    pub fn new(rules: &'r Rules) -> Self {
        Self { rules }
    }

    /// Compute every verdict. Safe to run again after new declarations are added;
    /// structural verdicts set by earlier stages are kept.
    pub fn run(&self, graph: &mut DeclGraph, diagnostics: &mut Diagnostics) -> FilterStats {
        let ids: Vec<DeclId> = graph.ids().collect();
        let sticky: Vec<bool> = ids
            .iter()
            .map(|id| graph.get(*id).verdict == FilterVerdict::ExcludeStructural)
            .collect();

        let base: Vec<FilterVerdict> = ids
            .iter()
            .zip(&sticky)
            .map(|(id, sticky)| {
                if *sticky {
                    FilterVerdict::ExcludeStructural
                } else {
                    self.classify(graph, *id, diagnostics)
                }
            })
            .collect();
        for (id, verdict) in ids.iter().zip(&base) {
            graph.get_mut(*id).verdict = *verdict;
        }

        let mut rounds = 0;
        loop {
            rounds += 1;
            let mut changed = false;
            for id in &ids {
                let verdict = graph.get(*id).verdict;
                if !matches!(verdict, FilterVerdict::Include | FilterVerdict::ExcludeIncompleteType) {
                    continue;
                }
                if let Some(blocker) = self.transitive_blocker(graph, *id) {
                    let name = graph.get(*id).display_name().to_string();
                    let reason = format!(
                        "uses '{}' which is excluded",
                        graph.get(blocker).display_name()
                    );
                    debug!("[filter] {name}: {reason}");
                    diagnostics.note(DiagnosticKind::Unsupported, Some(*id), &name, reason);
                    graph.get_mut(*id).verdict = FilterVerdict::ExcludeTransitiveSkip;
                    changed = true;
                }
            }
            for id in &ids {
                if self.should_demote(graph, *id) {
                    debug!(
                        "[filter] {}: every member is excluded",
                        graph.get(*id).display_name()
                    );
                    graph.get_mut(*id).verdict = FilterVerdict::ExcludeSkipRule;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }

        let mut stats = FilterStats {
            rounds,
            ..FilterStats::default()
        };
        for id in &ids {
            *stats.counts.entry(graph.get(*id).verdict).or_default() += 1;
        }
        debug!(
            "[filter] {} declarations, {} excluded, {} rounds",
            ids.len(),
            stats.excluded(),
            rounds
        );
        stats
    }

    /// Verdict from the declaration's own properties (every rule except the
    /// transitive one, which needs the verdicts of other declarations).
    pub fn classify(&self, graph: &DeclGraph, id: DeclId, diagnostics: &mut Diagnostics) -> FilterVerdict {
        let decl = graph.get(id);
        if decl.kind == DeclKind::Root {
            return FilterVerdict::Include;
        }
        if decl.is_variadic() || has_variadic_signature(decl) {
            return FilterVerdict::ExcludeVariadic;
        }
        if decl.attributes.deprecated.is_some() {
            return FilterVerdict::ExcludeDeprecated;
        }
        if self.is_unexported(decl) {
            return FilterVerdict::ExcludeUnexported;
        }
        if self.matches_skip_rule(decl) {
            return FilterVerdict::ExcludeSkipRule;
        }
        if let Some(ty) = self.incomplete_type(decl) {
            diagnostics.note(
                DiagnosticKind::UnresolvedType,
                Some(id),
                decl.display_name(),
                format!("'{}' refers to an incomplete type", ty.emitted()),
            );
            return FilterVerdict::ExcludeIncompleteType;
        }
        if is_safe_bool(graph, decl) {
            diagnostics.note(
                DiagnosticKind::SafeBool,
                Some(id),
                decl.display_name(),
                "safe-bool conversion operator",
            );
            return FilterVerdict::ExcludeStructural;
        }
        FilterVerdict::Include
    }

    fn is_unexported(&self, decl: &Declaration) -> bool {
        !self.rules.export_macros.is_empty()
            && decl.kind == DeclKind::Function
            && !decl
                .attributes
                .export_tags
                .iter()
                .any(|tag| self.rules.export_macros.contains(tag))
    }

    fn matches_skip_rule(&self, decl: &Declaration) -> bool {
        let (name, qualified) = (decl.name.as_str(), decl.qualified_name.as_str());
        // Trailing underscore marks an internal method.
        let internal = decl.kind == DeclKind::Method && name.ends_with('_') && !decl.is_operator();
        internal
            || self.rules.skip_symbols.matches(name, qualified)
            || (decl.kind.is_callable() && self.rules.skip_functions.matches(name, qualified))
    }

    fn incomplete_type<'d>(&self, decl: &'d Declaration) -> Option<&'d TypeRef> {
        if decl.kind.is_record() && !decl.is_synthetic() {
            return None;
        }
        decl.type_refs().into_iter().find(|t| t.incomplete)
    }

    /// First excluded declaration reachable from the types this declaration uses.
    fn transitive_blocker(&self, graph: &DeclGraph, id: DeclId) -> Option<DeclId> {
        let decl = graph.get(id);
        // A class with an excluded base is still bound, just without the base.
        // Instantiations carry their own type, which names the template and arguments.
        let types: Vec<&TypeRef> = if decl.kind.is_record() {
            decl.ty.iter().filter(|_| decl.is_synthetic()).collect()
        } else {
            decl.type_refs()
        };
        types
            .into_iter()
            .flat_map(|t| t.refs.iter().copied())
            .find(|r| *r != id && is_blocked(graph, *r))
    }

    /// A concrete class with public members, all of them excluded, has nothing to bind.
    fn should_demote(&self, graph: &DeclGraph, id: DeclId) -> bool {
        let decl = graph.get(id);
        if !decl.kind.is_record()
            || !decl.verdict.is_included()
            || decl.is_template()
            || decl.is_synthetic()
        {
            return false;
        }
        let mut candidates = graph
            .children(id)
            .iter()
            .map(|c| graph.get(*c))
            .filter(|c| c.is_public() && is_bindable_member(c.kind))
            .peekable();
        candidates.peek().is_some() && candidates.all(|c| !c.verdict.is_included())
    }
}

fn is_bindable_member(kind: DeclKind) -> bool {
    matches!(
        kind,
        DeclKind::Method
            | DeclKind::Constructor
            | DeclKind::Conversion
            | DeclKind::Field
            | DeclKind::Variable
            | DeclKind::Enum
            | DeclKind::Class
            | DeclKind::Struct
            | DeclKind::Union
    )
}

/// True when `id` or one of its scopes carries a verdict that poisons its uses.
fn is_blocked(graph: &DeclGraph, id: DeclId) -> bool {
    std::iter::once(id)
        .chain(graph.ancestors(id))
        .any(|d| graph.get(d).verdict.propagates())
}

fn has_variadic_signature(decl: &Declaration) -> bool {
    decl.kind.is_callable()
        && decl.params.iter().any(|p| p.ty.spelling.trim() == "...")
}

/// `operator bool_type() const` where `bool_type` is a non-public member typedef
/// to a pointer to member that nothing else uses.
fn is_safe_bool(graph: &DeclGraph, decl: &Declaration) -> bool {
    if decl.kind != DeclKind::Conversion {
        return false;
    }
    let Some(ret) = &decl.return_type else {
        return false;
    };
    let is_member_pointer = |t: &TypeRef| {
        t.indirections
            .iter()
            .any(|i| matches!(i, crate::decl::Indirection::MemberPointer { .. }))
    };
    if is_member_pointer(ret) {
        return true;
    }
    let Some(alias) = ret.resolved else {
        return false;
    };
    let typedef = graph.get(alias);
    if typedef.kind != DeclKind::Typedef
        || typedef.parent != decl.parent
        || typedef.is_public()
        || !typedef.ty.as_ref().is_some_and(is_member_pointer)
    {
        return false;
    }
    // Used nowhere except conversion operators.
    !graph.iter().any(|other| {
        other.id != decl.id
            && other.kind != DeclKind::Conversion
            && other.id != alias
            && other.type_refs().iter().any(|t| t.refs.contains(&alias))
    })
}

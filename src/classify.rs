//! Buffer/Opaque Classifier.
//!
//! Decides how each parameter and return value crosses into Ruby: pointers to
//! fundamental scalars and any double pointer are raw buffers, function pointers are
//! callbacks, `char*` is a string, everything else keeps object semantics.

use crate::decl::{Classification, DeclGraph, Indirection, TypeBase, TypeRef};
use crate::filter::rules::Rules;
use crate::qualify::{Lookup, Resolver};
use crate::types::DeclId;
use tracing::debug;

/// Classify one type as seen from `context`.
pub fn classify_type(resolver: &Resolver<'_>, ty: &TypeRef, context: DeclId) -> Classification {
    // Typedefs are looked through: `ProcessCallback` is a function pointer.
    let canonical = ty
        .canonical
        .as_deref()
        .map(TypeRef::parse_lossy)
        .unwrap_or_else(|| resolver.canonical_type(ty, context));

    if canonical.is_function_pointer() && !canonical.is_reference() {
        return Classification::Callback;
    }
    if !matches!(canonical.indirections.last(), Some(Indirection::Pointer { .. })) {
        return Classification::Object;
    }
    if canonical.pointer_depth() >= 2 {
        return Classification::Buffer;
    }
    match &canonical.base {
        TypeBase::Builtin(_) if canonical.is_char_base() => Classification::String,
        TypeBase::Builtin(name) if name != "auto" => Classification::Buffer,
        TypeBase::Named(path) => match resolver.resolve_path(path, context) {
            Lookup::TemplateParam if path.segments.len() == 1 => Classification::Dependent,
            _ => Classification::Object,
        },
        _ => Classification::Object,
    }
}

/// Classify every parameter and return value in the graph.
pub fn classify_all(graph: &mut DeclGraph, rules: &Rules) -> usize {
    let updates: Vec<(DeclId, Vec<Classification>, Classification)> = {
        let resolver = Resolver::new(graph, rules);
        graph
            .iter()
            .filter(|d| d.kind.is_callable() || !d.params.is_empty())
            .map(|d| {
                let params = d
                    .params
                    .iter()
                    .map(|p| classify_type(&resolver, &p.ty, d.id))
                    .collect();
                let ret = d
                    .return_type
                    .as_ref()
                    .map(|r| match classify_type(&resolver, r, d.id) {
                        // A returned function pointer is just a value.
                        Classification::Callback => Classification::Object,
                        c => c,
                    })
                    .unwrap_or_default();
                (d.id, params, ret)
            })
            .collect()
    };

    let mut buffers = 0;
    for (id, params, ret) in updates {
        let decl = graph.get_mut(id);
        for (param, class) in decl.params.iter_mut().zip(params) {
            buffers += usize::from(class == Classification::Buffer);
            param.classification = class;
        }
        buffers += usize::from(ret == Classification::Buffer);
        decl.return_classification = ret;
    }
    debug!("[classify] {buffers} buffer parameters and returns");
    buffers
}

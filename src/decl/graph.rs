use super::{DeclKind, Declaration};
use crate::types::{DeclId, HeaderId};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Arena of declarations. Identity is the index; nothing is ever removed.
#[derive(Debug, Clone)]
pub struct DeclGraph {
    decls: Vec<Declaration>,
    headers: Vec<PathBuf>,
    by_qualified: HashMap<String, Vec<DeclId>>,
}

impl Default for DeclGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl DeclGraph {
    pub fn new() -> Self {
        let root = Declaration::new(DeclKind::Root, "", HeaderId(0));
        Self {
            decls: vec![root],
            headers: Vec::new(),
            by_qualified: HashMap::new(),
        }
    }

    pub fn add_header(&mut self, path: impl Into<PathBuf>) -> HeaderId {
        self.headers.push(path.into());
        HeaderId((self.headers.len() - 1) as u32)
    }

    pub fn headers(&self) -> &[PathBuf] {
        &self.headers
    }

    pub fn header_path(&self, id: HeaderId) -> Option<&Path> {
        self.headers.get(id.index()).map(PathBuf::as_path)
    }

    /// Attach `decl` under `parent`, computing its durable qualified name.
    pub fn insert(&mut self, parent: DeclId, mut decl: Declaration) -> DeclId {
        let id = DeclId(self.decls.len() as u32);
        decl.id = id;
        decl.parent = Some(parent);
        decl.order = id.0;
        let prefix = self.scope_prefix(parent);
        decl.qualified_name = match (prefix.is_empty(), decl.name.is_empty()) {
            (_, true) => prefix,
            (true, false) => decl.name.clone(),
            (false, false) => format!("{prefix}::{}", decl.name),
        };
        if !decl.qualified_name.is_empty() {
            self.by_qualified
                .entry(decl.qualified_name.clone())
                .or_default()
                .push(id);
        }
        self.decls[parent.index()].children.push(id);
        self.decls.push(decl);
        id
    }

    /// Prefix that children of `scope` are qualified with. Inline namespaces and
    /// unscoped enums do not contribute a segment.
    pub fn scope_prefix(&self, scope: DeclId) -> String {
        let decl = self.get(scope);
        match decl.kind {
            DeclKind::Root => String::new(),
            DeclKind::Namespace if decl.is_inline() => {
                decl.parent.map(|p| self.scope_prefix(p)).unwrap_or_default()
            }
            DeclKind::Enum if !decl.is_scoped() => {
                decl.parent.map(|p| self.scope_prefix(p)).unwrap_or_default()
            }
            _ => decl.qualified_name.clone(),
        }
    }

    pub fn root(&self) -> &Declaration {
        &self.decls[0]
    }

    pub fn get(&self, id: DeclId) -> &Declaration {
        &self.decls[id.index()]
    }

    pub fn get_mut(&mut self, id: DeclId) -> &mut Declaration {
        &mut self.decls[id.index()]
    }

    pub fn len(&self) -> usize {
        self.decls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decls.len() <= 1
    }

    pub fn ids(&self) -> impl Iterator<Item = DeclId> + use<> {
        (1..self.decls.len() as u32).map(DeclId)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Declaration> {
        self.decls.iter().skip(1)
    }

    pub fn children(&self, id: DeclId) -> &[DeclId] {
        &self.decls[id.index()].children
    }

    pub fn parent(&self, id: DeclId) -> Option<DeclId> {
        self.decls[id.index()].parent
    }

    /// Ancestors from the direct parent up to and including the root.
    pub fn ancestors(&self, id: DeclId) -> Vec<DeclId> {
        let mut out = Vec::new();
        let mut cur = self.parent(id);
        while let Some(p) = cur {
            out.push(p);
            cur = self.parent(p);
        }
        out
    }

    /// Scopes searched for names used inside `id`, innermost first.
    pub fn scope_chain(&self, id: DeclId) -> Vec<DeclId> {
        let mut chain = Vec::new();
        if self.get(id).kind.is_scope() {
            chain.push(id);
        }
        chain.extend(
            self.ancestors(id)
                .into_iter()
                .filter(|a| self.get(*a).kind.is_scope()),
        );
        chain
    }

    /// Nearest enclosing namespace, class or root.
    pub fn enclosing_scope(&self, id: DeclId) -> DeclId {
        self.ancestors(id)
            .into_iter()
            .find(|a| self.get(*a).kind.is_scope())
            .unwrap_or(DeclId::ROOT)
    }

    pub fn lookup(&self, qualified: &str) -> &[DeclId] {
        self.by_qualified
            .get(qualified.trim_start_matches("::"))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Direct members named `name`, looking through inline namespaces and
    /// unscoped enums the way C++ name lookup does.
    pub fn members_named(&self, scope: DeclId, name: &str) -> Vec<DeclId> {
        let mut out = Vec::new();
        self.collect_members(scope, name, &mut out);
        out
    }

    fn collect_members(&self, scope: DeclId, name: &str, out: &mut Vec<DeclId>) {
        for &child in self.children(scope) {
            let decl = self.get(child);
            if decl.name == name {
                out.push(child);
            }
            let transparent = (decl.kind == DeclKind::Namespace && decl.is_inline())
                || (decl.kind == DeclKind::Enum && !decl.is_scoped());
            if transparent {
                self.collect_members(child, name, out);
            }
        }
    }

    /// First member of `scope` with `name` and `kind`.
    pub fn find_child(&self, scope: DeclId, name: &str, kind: DeclKind) -> Option<DeclId> {
        self.children(scope)
            .iter()
            .copied()
            .find(|c| self.get(*c).name == name && self.get(*c).kind == kind)
    }

    /// True if `id` or any enclosing declaration is a template.
    pub fn in_template(&self, id: DeclId) -> bool {
        self.get(id).is_template() || self.ancestors(id).iter().any(|a| self.get(*a).is_template())
    }

    /// The template whose parameter `name` is visible from `id`.
    pub fn template_param_owner(&self, id: DeclId, name: &str) -> Option<DeclId> {
        std::iter::once(id)
            .chain(self.ancestors(id))
            .find(|d| self.get(*d).template_params.iter().any(|p| p.name == name))
    }

    /// True if `id` sits below a declaration that will not be emitted.
    pub fn has_excluded_ancestor(&self, id: DeclId) -> bool {
        self.ancestors(id)
            .iter()
            .any(|a| !self.get(*a).verdict.is_included())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decl::DeclFlags;

    fn ns(name: &str) -> Declaration {
        Declaration::new(DeclKind::Namespace, name, HeaderId(0))
    }

    #[test]
    fn test_qualified_names_skip_inline_namespaces() {
        let mut graph = DeclGraph::new();
        let outer = graph.insert(DeclId::ROOT, ns("Outer"));
        let mut v1 = ns("v1");
        v1.flags |= DeclFlags::INLINE;
        let v1 = graph.insert(outer, v1);
        let thing = graph.insert(v1, Declaration::new(DeclKind::Class, "Thing", HeaderId(0)));

        assert_eq!(graph.get(thing).qualified_name, "Outer::Thing");
        assert_eq!(graph.members_named(outer, "Thing"), vec![thing]);
        assert_eq!(graph.lookup("::Outer::Thing"), &[thing]);
    }

    #[test]
    fn test_unscoped_enumerators_qualified_by_enclosing_scope() {
        let mut graph = DeclGraph::new();
        let outer = graph.insert(DeclId::ROOT, ns("Outer"));
        let color = graph.insert(outer, Declaration::new(DeclKind::Enum, "Color", HeaderId(0)));
        let red = graph.insert(color, Declaration::new(DeclKind::EnumConstant, "Red", HeaderId(0)));

        let mut scoped = Declaration::new(DeclKind::Enum, "Mode", HeaderId(0));
        scoped.flags |= DeclFlags::SCOPED;
        let mode = graph.insert(outer, scoped);
        let fast = graph.insert(mode, Declaration::new(DeclKind::EnumConstant, "Fast", HeaderId(0)));

        assert_eq!(graph.get(red).qualified_name, "Outer::Red");
        assert_eq!(graph.get(fast).qualified_name, "Outer::Mode::Fast");
        assert_eq!(graph.members_named(outer, "Red"), vec![red]);
        assert!(graph.members_named(outer, "Fast").is_empty());
    }

    #[test]
    fn test_scope_chain() {
        let mut graph = DeclGraph::new();
        let a = graph.insert(DeclId::ROOT, ns("A"));
        let c = graph.insert(a, Declaration::new(DeclKind::Class, "C", HeaderId(0)));
        let m = graph.insert(c, Declaration::new(DeclKind::Method, "m", HeaderId(0)));
        assert_eq!(graph.scope_chain(m), vec![c, a, DeclId::ROOT]);
        assert_eq!(graph.enclosing_scope(m), c);
    }
}

//! The declaration model shared by every pipeline stage.

mod graph;
pub mod typeref;

pub use graph::DeclGraph;
pub use typeref::{
    FunctionSig, Indirection, NamePath, NameSegment, TemplateArg, TypeBase, TypeParseError,
    TypeRef,
};

use crate::ast::{Access, TemplateParamKind};
use crate::types::{DeclId, HeaderId, Location};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeclKind {
    /// The synthetic scope owning top-level declarations.
    Root,
    Namespace,
    Class,
    Struct,
    Union,
    Function,
    Method,
    Constructor,
    Destructor,
    Conversion,
    Field,
    Variable,
    Enum,
    EnumConstant,
    Typedef,
    UsingDeclaration,
    Macro,
}

impl DeclKind {
    pub fn is_record(self) -> bool {
        matches!(self, DeclKind::Class | DeclKind::Struct | DeclKind::Union)
    }

    /// Kinds that own named members.
    pub fn is_scope(self) -> bool {
        matches!(
            self,
            DeclKind::Root | DeclKind::Namespace | DeclKind::Class | DeclKind::Struct | DeclKind::Union
        )
    }

    pub fn is_callable(self) -> bool {
        matches!(
            self,
            DeclKind::Function | DeclKind::Method | DeclKind::Constructor | DeclKind::Conversion
        )
    }

    /// Kinds that name a type and can therefore be referenced from a [`TypeRef`].
    pub fn is_type(self) -> bool {
        self.is_record() || matches!(self, DeclKind::Enum | DeclKind::Typedef)
    }
}

impl fmt::Display for DeclKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeclKind::Root => "root",
            DeclKind::Namespace => "namespace",
            DeclKind::Class => "class",
            DeclKind::Struct => "struct",
            DeclKind::Union => "union",
            DeclKind::Function => "function",
            DeclKind::Method => "method",
            DeclKind::Constructor => "constructor",
            DeclKind::Destructor => "destructor",
            DeclKind::Conversion => "conversion",
            DeclKind::Field => "field",
            DeclKind::Variable => "variable",
            DeclKind::Enum => "enum",
            DeclKind::EnumConstant => "enum constant",
            DeclKind::Typedef => "typedef",
            DeclKind::UsingDeclaration => "using declaration",
            DeclKind::Macro => "macro",
        };
        f.write_str(name)
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DeclFlags: u16 {
        const STATIC       = 1 << 0;
        const CONST        = 1 << 1;
        const DELETED      = 1 << 2;
        const PURE_VIRTUAL = 1 << 3;
        /// Complete definition seen (as opposed to a forward declaration).
        const DEFINITION   = 1 << 4;
        const INLINE       = 1 << 5;
        const SCOPED       = 1 << 6;
        const EXPLICIT     = 1 << 7;
        const VARIADIC     = 1 << 8;
        /// Created by the template engine rather than read from a header.
        const SYNTHETIC    = 1 << 9;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Deprecation {
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Attributes {
    pub deprecated: Option<Deprecation>,
    /// Annotation macros found on the declaration, e.g. `MY_EXPORT`.
    pub export_tags: Vec<String>,
    pub raw: Vec<String>,
}

/// How a parameter or return value crosses the binding boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Classification {
    #[default]
    Object,
    Buffer,
    Callback,
    /// `char*`-like values, marshalled as strings.
    String,
    /// Pointer to a template parameter: a buffer exactly when the argument is fundamental.
    Dependent,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: TypeRef,
    pub default: Option<String>,
    pub classification: Classification,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Base {
    pub ty: TypeRef,
    pub access: Access,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemplateParam {
    pub kind: TemplateParamKind,
    pub name: String,
    pub ty: Option<String>,
    pub default: Option<String>,
}

impl TemplateParam {
    /// Spelling used in a generated `template<...>` header.
    pub fn declaration(&self) -> String {
        match self.kind {
            TemplateParamKind::Type => format!("typename {}", self.name),
            TemplateParamKind::NonType => {
                format!("{} {}", self.ty.as_deref().unwrap_or("int"), self.name)
            }
            TemplateParamKind::Template => {
                format!("template<typename...> class {}", self.name)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Specialization {
    /// The primary template, when it is visible.
    pub template: Option<DeclId>,
    pub args: Vec<TemplateArg>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FilterVerdict {
    #[default]
    Include,
    ExcludeDeprecated,
    ExcludeUnexported,
    ExcludeSkipRule,
    ExcludeVariadic,
    ExcludeIncompleteType,
    ExcludeTransitiveSkip,
    /// Structural problem: no resolvable parent, alias cycle, safe-bool
    /// conversion, or an ambiguous overload.
    ExcludeStructural,
}

impl FilterVerdict {
    pub fn is_included(self) -> bool {
        self == FilterVerdict::Include
    }

    /// Verdicts that make every use of the declaration's type unusable.
    pub fn propagates(self) -> bool {
        !matches!(
            self,
            FilterVerdict::Include | FilterVerdict::ExcludeIncompleteType
        )
    }
}

impl fmt::Display for FilterVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FilterVerdict::Include => "Include",
            FilterVerdict::ExcludeDeprecated => "ExcludeDeprecated",
            FilterVerdict::ExcludeUnexported => "ExcludeUnexported",
            FilterVerdict::ExcludeSkipRule => "ExcludeSkipRule",
            FilterVerdict::ExcludeVariadic => "ExcludeVariadic",
            FilterVerdict::ExcludeIncompleteType => "ExcludeIncompleteType",
            FilterVerdict::ExcludeTransitiveSkip => "ExcludeTransitiveSkip",
            FilterVerdict::ExcludeStructural => "ExcludeStructural",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct Declaration {
    pub id: DeclId,
    pub kind: DeclKind,
    pub name: String,
    /// Durable qualified name (inline namespaces omitted), e.g. `Outer::Inner::X`.
    pub qualified_name: String,
    pub parent: Option<DeclId>,
    pub children: Vec<DeclId>,
    pub access: Access,
    pub attributes: Attributes,
    pub flags: DeclFlags,
    /// Field, variable and typedef type.
    pub ty: Option<TypeRef>,
    pub return_type: Option<TypeRef>,
    pub return_classification: Classification,
    pub params: Vec<Param>,
    pub bases: Vec<Base>,
    pub template_params: Vec<TemplateParam>,
    pub specialization: Option<Specialization>,
    pub value: Option<String>,
    /// `Base::name` of a class-scope using-declaration.
    pub using_target: Option<String>,
    /// Resolved target of a typedef, when it names a declaration.
    pub alias_of: Option<DeclId>,
    pub header: HeaderId,
    pub location: Option<Location>,
    pub verdict: FilterVerdict,
    /// Position in collection order, used as a stable sort key.
    pub order: u32,
}

impl Declaration {
    pub fn new(kind: DeclKind, name: impl Into<String>, header: HeaderId) -> Self {
        Self {
            id: DeclId::ROOT,
            kind,
            name: name.into(),
            qualified_name: String::new(),
            parent: None,
            children: Vec::new(),
            access: Access::Public,
            attributes: Attributes::default(),
            flags: DeclFlags::DEFINITION,
            ty: None,
            return_type: None,
            return_classification: Classification::Object,
            params: Vec::new(),
            bases: Vec::new(),
            template_params: Vec::new(),
            specialization: None,
            value: None,
            using_target: None,
            alias_of: None,
            header,
            location: None,
            verdict: FilterVerdict::Include,
            order: 0,
        }
    }

    pub fn is_template(&self) -> bool {
        !self.template_params.is_empty()
    }

    pub fn is_full_specialization(&self) -> bool {
        self.specialization.is_some() && self.template_params.is_empty()
    }

    pub fn is_static(&self) -> bool {
        self.flags.contains(DeclFlags::STATIC)
    }

    pub fn is_const(&self) -> bool {
        self.flags.contains(DeclFlags::CONST)
    }

    pub fn is_deleted(&self) -> bool {
        self.flags.contains(DeclFlags::DELETED)
    }

    pub fn is_definition(&self) -> bool {
        self.flags.contains(DeclFlags::DEFINITION)
    }

    pub fn is_inline(&self) -> bool {
        self.flags.contains(DeclFlags::INLINE)
    }

    pub fn is_scoped(&self) -> bool {
        self.flags.contains(DeclFlags::SCOPED)
    }

    pub fn is_variadic(&self) -> bool {
        self.flags.contains(DeclFlags::VARIADIC)
    }

    pub fn is_synthetic(&self) -> bool {
        self.flags.contains(DeclFlags::SYNTHETIC)
    }

    pub fn is_public(&self) -> bool {
        self.access == Access::Public
    }

    pub fn is_operator(&self) -> bool {
        if self.kind == DeclKind::Conversion {
            return true;
        }
        self.name.starts_with("operator")
            && self
                .name
                .chars()
                .nth(8)
                .is_none_or(|c| !(c.is_alphanumeric() || c == '_'))
    }

    /// Every type this declaration mentions, in a fixed order.
    pub fn type_refs(&self) -> Vec<&TypeRef> {
        let mut refs = Vec::new();
        refs.extend(self.ty.iter());
        refs.extend(self.return_type.iter());
        refs.extend(self.params.iter().map(|p| &p.ty));
        refs.extend(self.bases.iter().map(|b| &b.ty));
        refs
    }

    pub fn type_refs_mut(&mut self) -> Vec<&mut TypeRef> {
        let mut refs = Vec::new();
        refs.extend(self.ty.iter_mut());
        refs.extend(self.return_type.iter_mut());
        refs.extend(self.params.iter_mut().map(|p| &mut p.ty));
        refs.extend(self.bases.iter_mut().map(|b| &mut b.ty));
        refs
    }

    pub fn display_name(&self) -> &str {
        if self.qualified_name.is_empty() {
            &self.name
        } else {
            &self.qualified_name
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_detection() {
        let op = Declaration::new(DeclKind::Method, "operator+=", HeaderId(0));
        assert!(op.is_operator());
        let not_op = Declaration::new(DeclKind::Method, "operatorCount", HeaderId(0));
        assert!(!not_op.is_operator());
        let conv = Declaration::new(DeclKind::Conversion, "operator int", HeaderId(0));
        assert!(conv.is_operator());
    }

    #[test]
    fn test_verdict_propagation() {
        assert!(FilterVerdict::ExcludeSkipRule.propagates());
        assert!(FilterVerdict::ExcludeDeprecated.propagates());
        assert!(!FilterVerdict::ExcludeIncompleteType.propagates());
        assert!(!FilterVerdict::Include.propagates());
    }

    #[test]
    fn test_template_param_declaration() {
        let p = TemplateParam {
            kind: TemplateParamKind::NonType,
            name: "Rows".to_string(),
            ty: Some("int".to_string()),
            default: None,
        };
        assert_eq!(p.declaration(), "int Rows");
    }
}

//! Declaration/type provider interface.
//!
//! A provider turns one header into a [`RawHeader`]: a plain tree of declarations whose
//! types are carried as C++ spellings. Everything semantic (qualification, completeness,
//! alias chains) is computed later from the collected graph, so providers stay simple.

mod json;

pub use json::JsonProvider;

use crate::error::ProviderResult;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Produces the raw declaration tree for a header.
pub trait DeclarationProvider {
    fn provide(&mut self, path: &Path) -> ProviderResult<RawHeader>;

    /// Short name used in logs.
    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawHeader {
    pub path: PathBuf,
    #[serde(default)]
    pub decls: Vec<RawDecl>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RawKind {
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
    ClassTemplate,
    FunctionTemplate,
    Macro,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    #[default]
    Public,
    Protected,
    Private,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawParam {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBase {
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub access: Access,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateParamKind {
    #[default]
    Type,
    NonType,
    Template,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTemplateParam {
    #[serde(default)]
    pub kind: TemplateParamKind,
    pub name: String,
    /// Declared type of a non-type parameter.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub ty: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLocation {
    pub line: u32,
    #[serde(default)]
    pub column: u32,
}

/// One declaration as reported by a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDecl {
    pub kind: RawKind,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub access: Access,
    /// Raw attribute and annotation-macro spellings, e.g. `deprecated("msg")`, `MY_EXPORT`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<String>,
    #[serde(default)]
    pub is_variadic: bool,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub is_const: bool,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default)]
    pub is_pure_virtual: bool,
    /// False for forward declarations.
    #[serde(default = "default_true")]
    pub is_definition: bool,
    #[serde(default)]
    pub is_inline: bool,
    #[serde(default)]
    pub is_scoped: bool,
    #[serde(default)]
    pub is_explicit: bool,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub ty: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<RawParam>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bases: Vec<RawBase>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub template_params: Vec<RawTemplateParam>,
    /// Arguments of an explicit full specialization (`template<> struct X<int>`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specialization_args: Option<Vec<String>>,
    /// Enumerator, variable or macro value as written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// `Base::name` for `using Base::name;` inside a class.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<RawLocation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<RawDecl>,
}

fn default_true() -> bool {
    true
}

impl RawDecl {
    pub fn new(kind: RawKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            access: Access::Public,
            attributes: Vec::new(),
            is_variadic: false,
            is_static: false,
            is_const: false,
            is_deleted: false,
            is_pure_virtual: false,
            is_definition: true,
            is_inline: false,
            is_scoped: false,
            is_explicit: false,
            ty: None,
            return_type: None,
            params: Vec::new(),
            bases: Vec::new(),
            template_params: Vec::new(),
            specialization_args: None,
            value: None,
            target: None,
            location: None,
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<RawDecl>) -> Self {
        self.children = children;
        self
    }

    pub fn with_type(mut self, ty: impl Into<String>) -> Self {
        self.ty = Some(ty.into());
        self
    }

    pub fn with_return(mut self, ty: impl Into<String>) -> Self {
        self.return_type = Some(ty.into());
        self
    }

    pub fn with_param(mut self, name: &str, ty: &str) -> Self {
        self.params.push(RawParam {
            name: name.to_string(),
            ty: ty.to_string(),
            default: None,
        });
        self
    }

    pub fn with_default_param(mut self, name: &str, ty: &str, default: &str) -> Self {
        self.params.push(RawParam {
            name: name.to_string(),
            ty: ty.to_string(),
            default: Some(default.to_string()),
        });
        self
    }

    pub fn with_access(mut self, access: Access) -> Self {
        self.access = access;
        self
    }

    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attributes.push(attribute.into());
        self
    }

    pub fn with_base(mut self, ty: &str) -> Self {
        self.bases.push(RawBase {
            ty: ty.to_string(),
            access: Access::Public,
        });
        self
    }

    pub fn with_template_param(mut self, name: &str, default: Option<&str>) -> Self {
        self.template_params.push(RawTemplateParam {
            kind: TemplateParamKind::Type,
            name: name.to_string(),
            ty: None,
            default: default.map(str::to_string),
        });
        self
    }

    pub fn with_non_type_param(mut self, name: &str, ty: &str, default: Option<&str>) -> Self {
        self.template_params.push(RawTemplateParam {
            kind: TemplateParamKind::NonType,
            name: name.to_string(),
            ty: Some(ty.to_string()),
            default: default.map(str::to_string),
        });
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn forward(mut self) -> Self {
        self.is_definition = false;
        self
    }

    pub fn constant(mut self) -> Self {
        self.is_const = true;
        self
    }

    pub fn statik(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn deleted(mut self) -> Self {
        self.is_deleted = true;
        self
    }

    pub fn at(mut self, line: u32) -> Self {
        self.location = Some(RawLocation { line, column: 1 });
        self
    }
}

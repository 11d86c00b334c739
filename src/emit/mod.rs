//! Code Emitter.
//!
//! [`plan`] walks the resolved graph and produces, per header, an ordered list of
//! [`BindingEmission`]s plus the shared template builders. [`render`] prints a plan as
//! Rice registration code. Order and grouping are decided entirely by the planner.

pub mod plan;
pub mod render;

pub use plan::{EmitOptions, Planner};
pub use render::{GeneratedUnit, render_aggregate, render_unit};

use crate::types::{DeclId, HeaderId};

/// How a parameter is described to the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgKind {
    Arg,
    Buffer,
    /// Pointer to a template parameter; the runtime picks `ArgBuffer` when the
    /// argument is fundamental.
    Dependent(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgSpec {
    pub name: String,
    pub kind: ArgKind,
    /// Rendered default, e.g. `static_cast<int>(10)`.
    pub default: Option<String>,
}

/// A generated wrapper body registered as a method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lambda {
    pub name: String,
    pub params: String,
    pub ret: Option<String>,
    pub body: Vec<String>,
}

/// One chained registration call on a class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Member {
    Constructor {
        class: String,
        params: Vec<String>,
        args: Vec<ArgSpec>,
    },
    Method {
        name: String,
        signature: Option<String>,
        pointer: String,
        args: Vec<ArgSpec>,
        return_buffer: bool,
        singleton: bool,
    },
    Attr {
        name: String,
        pointer: String,
        read_only: bool,
        singleton: bool,
    },
    Constant {
        name: String,
        value: String,
    },
    Iterator {
        name: String,
        signature: String,
        begin: String,
        end: String,
    },
    Lambda(Lambda),
    /// Apply a template builder: `define(&F<Data_Type<T>, args...>)`.
    Define {
        function: String,
        class: String,
        args: Vec<String>,
    },
}

impl Member {
    /// Calls with explicit template arguments need `template` inside a builder.
    pub fn has_template_args(&self) -> bool {
        match self {
            Member::Method { signature, .. } => signature.is_some(),
            Member::Iterator { .. } => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassEmission {
    pub cpp: String,
    pub name: String,
    /// Enclosing module or class expression; `None` at the root.
    pub parent: Option<String>,
    pub base: Option<String>,
    pub members: Vec<Member>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumEmission {
    pub cpp: String,
    pub name: String,
    pub parent: Option<String>,
    /// Target name and C++ value of each enumerator.
    pub values: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionEmission {
    /// Owning module handle; `None` for global functions.
    pub module: Option<String>,
    pub name: String,
    pub signature: Option<String>,
    pub pointer: String,
    pub args: Vec<ArgSpec>,
    pub return_buffer: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmitOp {
    Module { name: String, parent: Option<String> },
    Class(ClassEmission),
    Enum(EnumEmission),
    Constant { scope: String, name: String, value: String },
    Function(FunctionEmission),
    /// Wrappers for non-member operators, attached to an already registered class.
    Wrappers { target: String, members: Vec<Member> },
}

/// One registration statement, tied to the declaration it binds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingEmission {
    pub decl: DeclId,
    /// Handle assigned by the statement, if any.
    pub handle: Option<String>,
    pub op: EmitOp,
}

/// A scope handle declared at file scope.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct HandleDecl {
    pub qualified: String,
    pub ty: String,
    pub handle: String,
}

/// Member registrations shared by every instantiation of one class template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Builder {
    pub template: DeclId,
    pub function: String,
    /// `typename T`, `int Rows`, ...
    pub params: Vec<String>,
    pub members: Vec<Member>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitPlan {
    pub header: HeaderId,
    pub stem: String,
    /// Spelling inside `#include <...>`.
    pub include: String,
    pub init: String,
    pub handles: Vec<HandleDecl>,
    /// Stems whose `-rb.ipp` builders this unit uses.
    pub ipp_includes: Vec<String>,
    pub builders: Vec<Builder>,
    pub emissions: Vec<BindingEmission>,
    pub needs_sstream: bool,
}

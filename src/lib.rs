//! Rice binding generator.
//!
//! Reads C and C++ headers and writes the C++ registration code that exposes their
//! namespaces, classes, enums and functions to Ruby through Rice.

pub mod ast;
pub mod classify;
pub mod collector;
pub mod config;
pub mod decl;
pub mod diagnostics;
pub mod discovery;
pub mod emit;
pub mod error;
pub mod exit_code;
pub mod filter;
pub mod naming;
pub mod output;
pub mod parsing;
pub mod pipeline;
pub mod qualify;
pub mod template;
pub mod types;

pub use ast::{DeclarationProvider, JsonProvider, RawDecl, RawHeader, RawKind};
pub use config::Settings;
pub use decl::{DeclGraph, DeclKind, Declaration, FilterVerdict, TypeRef};
pub use diagnostics::{Diagnostic, Diagnostics, ExclusionReport};
pub use error::{
    ConfigError, ConfigResult, GenerateError, GenerateResult, ProviderError, ProviderResult,
};
pub use exit_code::ExitCode;
pub use filter::rules::Rules;
pub use output::OutputWriter;
pub use parsing::{CppHeaderParser, ProviderFactory};
pub use pipeline::{Generation, Generator};
pub use types::{DeclId, HeaderId, Location};

//! Header readers.
//!
//! [`cpp::CppHeaderParser`] reads C++ headers with tree-sitter; the JSON provider lives in
//! [`crate::ast`]. [`ProviderFactory`] picks one per the configured [`ProviderKind`].
//!
//! [`ProviderKind`]: crate::config::ProviderKind

pub mod cpp;
pub mod factory;

pub use cpp::CppHeaderParser;
pub use factory::ProviderFactory;

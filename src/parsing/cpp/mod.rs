//! C++ header reader

pub mod parser;

pub use parser::CppHeaderParser;

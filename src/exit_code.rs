//! Exit codes for CLI operations following Unix conventions.
//!
//! - `0`: success, every unit written
//! - `1`: general error
//! - `2`: output written, but emission errors were reported (e.g. an ambiguous overload)
//! - `5`: file I/O error
//! - `6`: configuration error

use crate::error::{GenerateError, ProviderError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    Success = 0,

    GeneralError = 1,

    /// Units were written but some declarations could not be emitted (code 2)
    EmissionErrors = 2,

    /// File I/O error (code 5)
    IoError = 5,

    /// Configuration error (code 6)
    ConfigError = 6,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code as i32
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        std::process::ExitCode::from(code as u8)
    }
}

impl ExitCode {
    /// Map a run error to the exit code scripts can branch on.
    pub fn from_error(error: &GenerateError) -> Self {
        match error {
            GenerateError::Config(_) => ExitCode::ConfigError,
            GenerateError::Provider(ProviderError::FileRead { .. })
            | GenerateError::FileWrite { .. }
            | GenerateError::Discovery { .. } => ExitCode::IoError,
            _ => ExitCode::GeneralError,
        }
    }

    /// Exit code of a completed run.
    pub fn from_run(has_errors: bool) -> Self {
        if has_errors {
            ExitCode::EmissionErrors
        } else {
            ExitCode::Success
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, ExitCode::Success)
    }

    pub fn description(&self) -> &str {
        match self {
            ExitCode::Success => "Success",
            ExitCode::GeneralError => "General error",
            ExitCode::EmissionErrors => "Generated with emission errors",
            ExitCode::IoError => "I/O error",
            ExitCode::ConfigError => "Configuration error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use std::path::PathBuf;

    #[test]
    fn test_exit_code_values() {
        assert_eq!(ExitCode::Success as u8, 0);
        assert_eq!(ExitCode::GeneralError as u8, 1);
        assert_eq!(ExitCode::EmissionErrors as u8, 2);
        assert_eq!(ExitCode::IoError as u8, 5);
        assert_eq!(ExitCode::ConfigError as u8, 6);
    }

    #[test]
    fn test_from_error() {
        let config = GenerateError::Config(ConfigError::Invalid {
            reason: "bad".to_string(),
        });
        assert_eq!(ExitCode::from_error(&config), ExitCode::ConfigError);

        let write = GenerateError::FileWrite {
            path: PathBuf::from("out.cpp"),
            source: std::io::Error::other("disk full"),
        };
        assert_eq!(ExitCode::from_error(&write), ExitCode::IoError);

        let parse = GenerateError::Provider(ProviderError::NoTree {
            path: PathBuf::from("a.hpp"),
        });
        assert_eq!(ExitCode::from_error(&parse), ExitCode::GeneralError);
        assert_eq!(ExitCode::from_error(&GenerateError::NoInput), ExitCode::GeneralError);
    }

    #[test]
    fn test_from_run() {
        assert!(ExitCode::from_run(false).is_success());
        assert_eq!(ExitCode::from_run(true), ExitCode::EmissionErrors);
        assert_eq!(ExitCode::EmissionErrors.description(), "Generated with emission errors");
    }
}

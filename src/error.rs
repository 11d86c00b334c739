//! Error types for the binding generator
//!
//! Only failures that stop a run are modelled here. Structural problems inside a
//! header (an alias cycle, a declaration without a resolvable parent, an ambiguous
//! overload set) are reported as [`Diagnostic`](crate::diagnostics::Diagnostic)s
//! and scoped to the affected declaration instead.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or validating the rule configuration.
///
/// Any of these aborts the run before a single file is emitted.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid skip/rename pattern '{pattern}': {reason}")]
    InvalidRegex { pattern: String, reason: String },

    #[error("Conflicting rename entries for '{from}': '{first}' and '{second}'")]
    ConflictingRename {
        from: String,
        first: String,
        second: String,
    },

    #[error("Failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Failed to write configuration file '{path}': {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Configuration file '{path}' already exists. Use --force to overwrite")]
    AlreadyExists { path: PathBuf },

    #[error("Invalid configuration: {reason}")]
    Invalid { reason: String },
}

/// Errors raised by a declaration provider while producing the raw tree.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Malformed declaration tree in '{path}': {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Failed to initialize C++ parser: {reason}")]
    ParserInit { reason: String },

    #[error("Parser produced no tree for '{path}'")]
    NoTree { path: PathBuf },
}

/// Top level error for a generator run.
#[derive(Error, Debug)]
pub enum GenerateError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Failed to write file '{path}': {source}")]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to walk input directory '{path}': {reason}")]
    Discovery { path: PathBuf, reason: String },

    #[error("No headers to process")]
    NoInput,
}

impl ConfigError {
    pub fn status_code(&self) -> &'static str {
        match self {
            Self::InvalidRegex { .. } => "INVALID_PATTERN",
            Self::ConflictingRename { .. } => "CONFLICTING_RENAME",
            Self::Load(_) => "CONFIG_LOAD_ERROR",
            Self::Serialize(_) => "CONFIG_SERIALIZE_ERROR",
            Self::Write { .. } => "CONFIG_WRITE_ERROR",
            Self::AlreadyExists { .. } => "CONFIG_EXISTS",
            Self::Invalid { .. } => "CONFIG_ERROR",
        }
    }
}

impl GenerateError {
    /// Get a stable status code for this error type.
    pub fn status_code(&self) -> &'static str {
        match self {
            Self::Config(e) => e.status_code(),
            Self::Provider(ProviderError::FileRead { .. }) => "FILE_READ_ERROR",
            Self::Provider(ProviderError::Json { .. }) => "DECLARATION_TREE_ERROR",
            Self::Provider(ProviderError::ParserInit { .. }) => "PARSER_INIT_ERROR",
            Self::Provider(ProviderError::NoTree { .. }) => "PARSE_ERROR",
            Self::FileWrite { .. } => "FILE_WRITE_ERROR",
            Self::Discovery { .. } => "DISCOVERY_ERROR",
            Self::NoInput => "NO_INPUT",
        }
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::Config(ConfigError::InvalidRegex { .. }) => vec![
                "Regex entries are written between slashes, e.g. \"/^cv::detail::.*/\"",
                "Escape literal characters such as '(' or '+' inside the pattern",
            ],
            Self::Config(ConfigError::ConflictingRename { .. }) => {
                vec!["Remove one of the duplicate rename entries"]
            }
            Self::Config(ConfigError::AlreadyExists { .. }) => {
                vec!["Run 'ricegen init --force' to overwrite the existing file"]
            }
            Self::Config(_) => vec!["Check ricegen.toml and RICEGEN_* environment variables"],
            Self::Provider(ProviderError::FileRead { .. }) => vec![
                "Check that the file exists and you have read permissions",
                "Headers are resolved relative to the configured input directory",
            ],
            Self::Provider(ProviderError::Json { .. }) => {
                vec!["Regenerate the declaration tree with a matching provider version"]
            }
            Self::FileWrite { .. } => {
                vec!["Check that the output directory exists and is writable"]
            }
            Self::NoInput => vec![
                "Pass headers on the command line",
                "Or set 'input' and 'match' in ricegen.toml",
            ],
            _ => vec![],
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;
pub type ProviderResult<T> = Result<T, ProviderError>;
pub type GenerateResult<T> = Result<T, GenerateError>;

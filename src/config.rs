//! Configuration module for the binding generator.
//!
//! Settings are layered, lowest priority first:
//! - Default values
//! - TOML configuration file (`ricegen.toml` or `--config <path>`)
//! - Environment variable overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `RICEGEN_` and use double underscores
//! to separate nested levels:
//! - `RICEGEN_OUTPUT__DIR=ext` sets `output.dir`
//! - `RICEGEN_RULES__MAX_INSTANTIATION_ROUNDS=64` sets `rules.max_instantiation_rounds`

use crate::error::{ConfigError, ConfigResult};
use crate::filter::rules::{NameMapper, Rules, SkipRules};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "ricegen.toml";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Project name; when set, an aggregate `Init_<Project>` unit is generated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,

    #[serde(default)]
    pub input: InputConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub rules: RulesConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Parse headers with tree-sitter-cpp
    #[default]
    Cpp,
    /// Read `<header>.json` declaration trees
    Json,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct InputConfig {
    /// Directory headers are discovered in and resolved against
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,

    /// Explicit header list, in include order
    #[serde(default)]
    pub headers: Vec<PathBuf>,

    /// Header extensions picked up when walking `dir`
    #[serde(default = "default_extensions", rename = "match")]
    pub extensions: Vec<String>,

    #[serde(default)]
    pub provider: ProviderKind,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,

    /// Extension of generated source units
    #[serde(default = "default_source_extension")]
    pub extension: String,

    /// Prefix for the generated `#include <...>` of each header
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_prefix: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct RenameEntry {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct InstantiationRequest {
    /// Qualified template name, e.g. `Tests::Box`
    pub template: String,
    pub args: Vec<String>,
    /// Target class name; derived from the template and arguments when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RulesConfig {
    /// Declarations to skip: names, qualified names or `/regex/`
    #[serde(default)]
    pub skip_symbols: Vec<String>,

    /// Functions and methods to skip, matched like `skip_symbols`
    #[serde(default)]
    pub skip_functions: Vec<String>,

    /// When non-empty, free functions must carry one of these annotation macros
    #[serde(default)]
    pub export_macros: Vec<String>,

    /// Additional macro names that mark a declaration deprecated
    #[serde(default)]
    pub deprecation_macros: Vec<String>,

    #[serde(default)]
    pub rename_methods: Vec<RenameEntry>,

    #[serde(default)]
    pub rename_types: Vec<RenameEntry>,

    #[serde(default)]
    pub instantiate: Vec<InstantiationRequest>,

    /// Boolean functions starting with one of these words get a `?` suffix
    #[serde(default = "default_predicate_prefixes")]
    pub predicate_prefixes: Vec<String>,

    /// Namespaces whose types are assumed complete without a visible definition
    #[serde(default = "default_external_namespaces")]
    pub external_namespaces: Vec<String>,

    /// Upper bound on template discovery passes
    #[serde(default = "default_max_instantiation_rounds")]
    pub max_instantiation_rounds: usize,
}

fn default_version() -> u32 {
    1
}
fn default_extensions() -> Vec<String> {
    vec!["h".to_string(), "hpp".to_string()]
}
fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}
fn default_source_extension() -> String {
    "cpp".to_string()
}
fn default_predicate_prefixes() -> Vec<String> {
    vec!["is".to_string()]
}
fn default_external_namespaces() -> Vec<String> {
    vec!["std".to_string()]
}
fn default_max_instantiation_rounds() -> usize {
    32
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            project: None,
            input: InputConfig::default(),
            output: OutputConfig::default(),
            rules: RulesConfig::default(),
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            dir: None,
            headers: Vec::new(),
            extensions: default_extensions(),
            provider: ProviderKind::default(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            extension: default_source_extension(),
            include_prefix: None,
        }
    }
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            skip_symbols: Vec::new(),
            skip_functions: Vec::new(),
            export_macros: Vec::new(),
            deprecation_macros: Vec::new(),
            rename_methods: Vec::new(),
            rename_types: Vec::new(),
            instantiate: Vec::new(),
            predicate_prefixes: default_predicate_prefixes(),
            external_namespaces: default_external_namespaces(),
            max_instantiation_rounds: default_max_instantiation_rounds(),
        }
    }
}

impl Settings {
    /// Load configuration from `ricegen.toml` in the working directory and the environment
    pub fn load() -> ConfigResult<Self> {
        Self::load_from(CONFIG_FILE_NAME)
    }

    /// Load configuration from a specific file, still honouring `RICEGEN_*` overrides
    pub fn load_from(path: impl AsRef<Path>) -> ConfigResult<Self> {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("RICEGEN_").map(|key| {
                key.as_str()
                    .to_lowercase()
                    .replace("__", ".")
                    .into()
            }))
            .extract()
            .map_err(|e| ConfigError::Load(Box::new(e)))
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), content).map_err(|source| ConfigError::Write {
            path: path.as_ref().to_path_buf(),
            source,
        })
    }

    /// Validate and compile the rule section. Any error here aborts the run
    /// before anything is emitted.
    pub fn compile_rules(&self) -> ConfigResult<Rules> {
        let rules = &self.rules;
        if rules.max_instantiation_rounds == 0 {
            return Err(ConfigError::Invalid {
                reason: "rules.max_instantiation_rounds must be at least 1".to_string(),
            });
        }
        for request in &rules.instantiate {
            if request.args.is_empty() {
                return Err(ConfigError::Invalid {
                    reason: format!("instantiation of '{}' has no arguments", request.template),
                });
            }
        }
        Ok(Rules {
            skip_symbols: SkipRules::compile(&rules.skip_symbols)?,
            skip_functions: SkipRules::compile(&rules.skip_functions)?,
            export_macros: rules.export_macros.clone(),
            deprecation_macros: rules.deprecation_macros.clone(),
            rename_methods: NameMapper::compile(&rules.rename_methods)?,
            rename_types: NameMapper::compile(&rules.rename_types)?,
            instantiate: rules.instantiate.clone(),
            predicate_prefixes: rules.predicate_prefixes.clone(),
            external_namespaces: rules.external_namespaces.clone(),
            max_instantiation_rounds: rules.max_instantiation_rounds,
        })
    }

    /// Macro names the header reader should treat as annotations rather than code.
    pub fn annotation_macros(&self) -> Vec<String> {
        let mut macros = self.rules.export_macros.clone();
        macros.extend(self.rules.deprecation_macros.iter().cloned());
        macros.sort();
        macros.dedup();
        macros
    }

    /// Write a commented default configuration file
    pub fn init_config_file(dir: impl AsRef<Path>, force: bool) -> ConfigResult<PathBuf> {
        let config_path = dir.as_ref().join(CONFIG_FILE_NAME);
        if config_path.exists() && !force {
            return Err(ConfigError::AlreadyExists { path: config_path });
        }

        let template = r#"# ricegen configuration
version = 1

# Project name. When set, an aggregate Init_<Project>() unit is generated.
# project = "my_extension"

[input]
# Directory headers are discovered in
# dir = "include"

# Explicit header list, processed in this order
headers = []

# Extensions picked up when walking input.dir
match = ["h", "hpp"]

# "cpp" parses headers with tree-sitter, "json" reads <header>.json trees
provider = "cpp"

[output]
dir = "."
extension = "cpp"

[rules]
# Names, qualified names or /regex/ patterns
skip_symbols = []
skip_functions = []

# When set, free functions must carry one of these macros to be bound
export_macros = []

# Extra macros meaning "deprecated"
deprecation_macros = []

# Boolean functions starting with these words get a trailing '?'
predicate_prefixes = ["is"]

# Types under these namespaces are assumed complete
external_namespaces = ["std"]

max_instantiation_rounds = 32

# [[rules.rename_methods]]
# from = "/^get(\\w+)$/"
# to = "\\1"

# [[rules.instantiate]]
# template = "Tests::Box"
# args = ["double"]
# name = "BoxDouble"
"#;

        std::fs::write(&config_path, template).map_err(|source| ConfigError::Write {
            path: config_path.clone(),
            source,
        })?;
        Ok(config_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.version, 1);
        assert_eq!(settings.input.extensions, vec!["h", "hpp"]);
        assert_eq!(settings.output.extension, "cpp");
        assert_eq!(settings.rules.predicate_prefixes, vec!["is"]);
        assert_eq!(settings.rules.max_instantiation_rounds, 32);
    }

    #[test]
    fn test_load_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("custom.toml");

        let toml_content = r#"
project = "filtering"

[input]
headers = ["filtering.hpp"]
provider = "json"

[rules]
skip_symbols = ["Outer::SkippedClass", "/^Outer::internal/"]
export_macros = ["MY_EXPORT"]

[[rules.rename_types]]
from = "Outer::MyClass"
to = "Renamed"
"#;
        fs::write(&config_path, toml_content).unwrap();

        let settings = Settings::load_from(&config_path).unwrap();
        assert_eq!(settings.project.as_deref(), Some("filtering"));
        assert_eq!(settings.input.provider, ProviderKind::Json);
        assert_eq!(settings.rules.skip_symbols.len(), 2);
        // Untouched sections keep their defaults
        assert_eq!(settings.rules.external_namespaces, vec!["std"]);

        let rules = settings.compile_rules().unwrap();
        assert!(rules.skip_symbols.matches("internalHelper", "Outer::internalHelper"));
        assert_eq!(
            rules.rename_types.map("Outer::MyClass", "MyClass").as_deref(),
            Some("Renamed")
        );
    }

    #[test]
    fn test_invalid_regex_aborts_compile() {
        let mut settings = Settings::default();
        settings.rules.skip_symbols = vec!["/[a-/".to_string()];
        assert!(matches!(
            settings.compile_rules(),
            Err(ConfigError::InvalidRegex { .. })
        ));
    }

    #[test]
    fn test_save_and_reload() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("saved.toml");

        let mut settings = Settings::default();
        settings.rules.export_macros = vec!["API".to_string()];
        settings.save(&path).unwrap();

        let loaded = Settings::load_from(&path).unwrap();
        assert_eq!(loaded.rules.export_macros, vec!["API"]);
    }

    #[test]
    fn test_init_config_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = Settings::init_config_file(temp_dir.path(), false).unwrap();
        assert!(path.exists());

        // The template must itself be a valid configuration
        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.rules.max_instantiation_rounds, 32);

        assert!(matches!(
            Settings::init_config_file(temp_dir.path(), false),
            Err(ConfigError::AlreadyExists { .. })
        ));
        assert!(Settings::init_config_file(temp_dir.path(), true).is_ok());
    }
}

//! Provider factory with configuration-based instantiation.
//!
//! Providers hold a parser and are not shared between threads, so the pipeline asks
//! the factory for a fresh one per worker.

use super::CppHeaderParser;
use crate::ast::{DeclarationProvider, JsonProvider};
use crate::config::{ProviderKind, Settings};
use crate::error::ProviderResult;

#[derive(Debug, Clone)]
pub struct ProviderFactory {
    kind: ProviderKind,
    annotation_macros: Vec<String>,
}

impl ProviderFactory {
    pub fn new(kind: ProviderKind, annotation_macros: Vec<String>) -> Self {
        Self {
            kind,
            annotation_macros,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.input.provider, settings.annotation_macros())
    }

    pub fn kind(&self) -> ProviderKind {
        self.kind
    }

    /// Creates a provider of the configured kind.
    #[must_use = "Provider creation may fail and should be handled"]
    pub fn create(&self) -> ProviderResult<Box<dyn DeclarationProvider>> {
        match self.kind {
            ProviderKind::Cpp => {
                let parser = CppHeaderParser::new()?.with_annotation_macros(&self.annotation_macros)?;
                Ok(Box::new(parser))
            }
            ProviderKind::Json => Ok(Box::new(JsonProvider::new())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_providers() {
        let cpp = ProviderFactory::new(ProviderKind::Cpp, vec!["MY_EXPORT".to_string()]);
        assert_eq!(cpp.create().unwrap().name(), "cpp");

        let json = ProviderFactory::new(ProviderKind::Json, Vec::new());
        assert_eq!(json.create().unwrap().name(), "json");
    }

    #[test]
    fn test_from_settings_collects_annotation_macros() {
        let mut settings = Settings::default();
        settings.rules.export_macros = vec!["API".to_string()];
        settings.rules.deprecation_macros = vec!["OLD".to_string(), "API".to_string()];
        let factory = ProviderFactory::from_settings(&settings);
        assert_eq!(factory.kind(), ProviderKind::Cpp);
        assert_eq!(factory.annotation_macros, vec!["API".to_string(), "OLD".to_string()]);
    }
}

//! Provider that reads pre-parsed declaration trees from JSON.
//!
//! Useful when the headers are parsed by an external front end (a libclang dump, a
//! build-system export). The JSON file sits next to the header as `<header>.json`,
//! or is the input path itself when it already ends in `.json`.

use super::{DeclarationProvider, RawDecl, RawHeader};
use crate::error::{ProviderError, ProviderResult};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Default)]
pub struct JsonProvider;

impl JsonProvider {
    pub fn new() -> Self {
        Self
    }

    fn tree_path(path: &Path) -> PathBuf {
        if path.extension().is_some_and(|ext| ext == "json") {
            return path.to_path_buf();
        }
        let mut name = path.as_os_str().to_os_string();
        name.push(".json");
        PathBuf::from(name)
    }

    /// Parse a tree from a string. The header path is recorded as given.
    pub fn parse_str(path: &Path, text: &str) -> ProviderResult<RawHeader> {
        let decls: Vec<RawDecl> =
            serde_json::from_str(text).map_err(|source| ProviderError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(RawHeader {
            path: path.to_path_buf(),
            decls,
        })
    }
}

impl DeclarationProvider for JsonProvider {
    fn provide(&mut self, path: &Path) -> ProviderResult<RawHeader> {
        let tree = Self::tree_path(path);
        debug!("reading declaration tree {}", tree.display());
        let text = std::fs::read_to_string(&tree).map_err(|source| ProviderError::FileRead {
            path: tree.clone(),
            source,
        })?;
        let header_path = if tree == path {
            path.with_extension("")
        } else {
            path.to_path_buf()
        };
        Self::parse_str(&header_path, &text)
    }

    fn name(&self) -> &'static str {
        "json"
    }
}

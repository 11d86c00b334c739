//! Header discovery
//!
//! Headers come from an explicit list (kept in the order given) or from walking the
//! input directory. A walk:
//! - respects .gitignore and `.ricegenignore` files
//! - skips hidden files and directories
//! - keeps only the configured extensions
//! - returns paths sorted, so runs over the same tree are reproducible

use crate::config::InputConfig;
use crate::error::{GenerateError, GenerateResult};
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const IGNORE_FILE_NAME: &str = ".ricegenignore";

/// Finds the headers a run processes.
#[derive(Debug)]
pub struct HeaderWalker {
    extensions: Vec<String>,
}

impl HeaderWalker {
    pub fn new(extensions: &[String]) -> Self {
        Self {
            extensions: extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_string())
                .collect(),
        }
    }

    /// Walk `root` and return every matching header, sorted.
    pub fn walk(&self, root: &Path) -> GenerateResult<Vec<PathBuf>> {
        if !root.is_dir() {
            return Err(GenerateError::Discovery {
                path: root.to_path_buf(),
                reason: "not a directory".to_string(),
            });
        }

        let mut builder = WalkBuilder::new(root);
        builder
            .hidden(true)
            .git_ignore(true)
            .git_exclude(true)
            .follow_links(false)
            .require_git(false);
        builder.add_custom_ignore_filename(IGNORE_FILE_NAME);

        let mut headers: Vec<PathBuf> = builder
            .build()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_some_and(|ft| ft.is_file()))
            .map(|entry| entry.into_path())
            .filter(|path| self.matches(path))
            .collect();
        headers.sort();
        debug!("[discovery] {} headers under {}", headers.len(), root.display());
        Ok(headers)
    }

    fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|e| e == ext))
    }
}

/// Resolve the run's header list.
///
/// Command-line headers win over configured ones; relative entries are resolved
/// against `input.dir`. With no explicit list, `input.dir` is walked.
pub fn discover_headers(input: &InputConfig, explicit: &[PathBuf]) -> GenerateResult<Vec<PathBuf>> {
    let listed = if explicit.is_empty() { &input.headers } else { explicit };
    let headers = if !listed.is_empty() {
        listed
            .iter()
            .map(|header| match &input.dir {
                Some(dir) if header.is_relative() && !header.exists() => dir.join(header),
                _ => header.clone(),
            })
            .collect()
    } else if let Some(dir) = &input.dir {
        HeaderWalker::new(&input.extensions).walk(dir)?
    } else {
        Vec::new()
    };

    if headers.is_empty() {
        return Err(GenerateError::NoInput);
    }
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn extensions() -> Vec<String> {
        vec!["h".to_string(), "hpp".to_string()]
    }

    #[test]
    fn test_walk_filters_extensions_and_sorts() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir(root.join("nested")).unwrap();
        fs::write(root.join("zeta.hpp"), "struct Z {};").unwrap();
        fs::write(root.join("alpha.h"), "struct A {};").unwrap();
        fs::write(root.join("nested/beta.hpp"), "struct B {};").unwrap();
        fs::write(root.join("source.cpp"), "int main() {}").unwrap();

        let headers = HeaderWalker::new(&extensions()).walk(root).unwrap();
        let names: Vec<_> = headers
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(names, vec!["alpha.h", "nested/beta.hpp", "zeta.hpp"]);
    }

    #[test]
    fn test_walk_skips_hidden_and_ignored() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir(root.join("detail")).unwrap();
        fs::write(root.join(".hidden.hpp"), "").unwrap();
        fs::write(root.join("visible.hpp"), "").unwrap();
        fs::write(root.join("detail/impl.hpp"), "").unwrap();
        fs::write(root.join(IGNORE_FILE_NAME), "detail/\n").unwrap();

        let headers = HeaderWalker::new(&[".hpp".to_string()]).walk(root).unwrap();
        assert_eq!(headers.len(), 1);
        assert!(headers[0].ends_with("visible.hpp"));
    }

    #[test]
    fn test_explicit_headers_keep_order() {
        let temp_dir = TempDir::new().unwrap();
        let input = InputConfig {
            dir: Some(temp_dir.path().to_path_buf()),
            ..InputConfig::default()
        };
        let explicit = vec![PathBuf::from("b.hpp"), PathBuf::from("a.hpp")];
        let headers = discover_headers(&input, &explicit).unwrap();
        assert_eq!(
            headers,
            vec![temp_dir.path().join("b.hpp"), temp_dir.path().join("a.hpp")]
        );
    }

    #[test]
    fn test_no_input_is_an_error() {
        let err = discover_headers(&InputConfig::default(), &[]).unwrap_err();
        assert!(matches!(err, GenerateError::NoInput));
    }

    #[test]
    fn test_missing_directory() {
        let err = HeaderWalker::new(&extensions())
            .walk(Path::new("/definitely/not/here"))
            .unwrap_err();
        assert_eq!(err.status_code(), "DISCOVERY_ERROR");
    }
}

//! Compiled rule configuration: skip patterns and rename tables.
//!
//! Patterns are written either literally (`Outer::Foo`, `foo`) or as a regex between
//! slashes (`/^cv::detail::.*/`). Rename targets may reference regex groups with `\1`.

use crate::config::{InstantiationRequest, RenameEntry};
use crate::error::{ConfigError, ConfigResult};
use regex::Regex;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub enum Pattern {
    Literal(String),
    Regex(Regex),
}

impl Pattern {
    pub fn parse(text: &str) -> ConfigResult<Self> {
        let trimmed = text.trim();
        if trimmed.len() >= 2 && trimmed.starts_with('/') && trimmed.ends_with('/') {
            let inner = &trimmed[1..trimmed.len() - 1];
            return Regex::new(inner)
                .map(Pattern::Regex)
                .map_err(|e| ConfigError::InvalidRegex {
                    pattern: text.to_string(),
                    reason: e.to_string(),
                });
        }
        Ok(Pattern::Literal(trimmed.trim_start_matches("::").to_string()))
    }

    /// Literal patterns match the simple name, the qualified name, or anything
    /// nested below or instantiated from the qualified name.
    pub fn matches(&self, name: &str, qualified: &str) -> bool {
        match self {
            Pattern::Literal(lit) => {
                lit == name
                    || lit == qualified
                    || qualified
                        .strip_prefix(lit.as_str())
                        .is_some_and(|rest| rest.starts_with('<') || rest.starts_with("::"))
            }
            Pattern::Regex(re) => re.is_match(name) || re.is_match(qualified),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SkipRules {
    patterns: Vec<Pattern>,
}

impl SkipRules {
    pub fn compile(entries: &[String]) -> ConfigResult<Self> {
        let patterns = entries
            .iter()
            .map(|e| Pattern::parse(e))
            .collect::<ConfigResult<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    pub fn matches(&self, name: &str, qualified: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(name, qualified))
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// Maps C++ names to target-language names.
#[derive(Debug, Clone, Default)]
pub struct NameMapper {
    literals: HashMap<String, String>,
    regexes: Vec<(Regex, String)>,
}

impl NameMapper {
    pub fn compile(entries: &[RenameEntry]) -> ConfigResult<Self> {
        let mut mapper = NameMapper::default();
        for entry in entries {
            match Pattern::parse(&entry.from)? {
                Pattern::Literal(from) => {
                    if let Some(first) = mapper.literals.get(&from) {
                        if *first != entry.to {
                            return Err(ConfigError::ConflictingRename {
                                from,
                                first: first.clone(),
                                second: entry.to.clone(),
                            });
                        }
                    }
                    mapper.literals.insert(from, entry.to.clone());
                }
                Pattern::Regex(re) => mapper.regexes.push((re, entry.to.clone())),
            }
        }
        Ok(mapper)
    }

    /// Look up a replacement, trying the qualified name before the simple one.
    pub fn map(&self, qualified: &str, name: &str) -> Option<String> {
        for key in [qualified, name] {
            if let Some(to) = self.literals.get(key) {
                return Some(to.clone());
            }
        }
        for key in [qualified, name] {
            for (re, to) in &self.regexes {
                if let Some(caps) = re.captures(key) {
                    return Some(expand_backrefs(to, &caps));
                }
            }
        }
        None
    }

    /// Merge `other` into `self`; entries from `other` win.
    pub fn merge(&mut self, other: NameMapper) {
        self.literals.extend(other.literals);
        let mut regexes = other.regexes;
        regexes.append(&mut self.regexes);
        self.regexes = regexes;
    }

    pub fn is_empty(&self) -> bool {
        self.literals.is_empty() && self.regexes.is_empty()
    }
}

fn expand_backrefs(template: &str, caps: &regex::Captures<'_>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(d) = chars.peek().and_then(|d| d.to_digit(10)) {
                chars.next();
                if let Some(m) = caps.get(d as usize) {
                    out.push_str(m.as_str());
                }
                continue;
            }
        }
        out.push(c);
    }
    out
}

/// Everything the pipeline needs from the configuration, validated.
#[derive(Debug, Clone, Default)]
pub struct Rules {
    pub skip_symbols: SkipRules,
    pub skip_functions: SkipRules,
    pub export_macros: Vec<String>,
    pub deprecation_macros: Vec<String>,
    pub rename_methods: NameMapper,
    pub rename_types: NameMapper,
    pub instantiate: Vec<InstantiationRequest>,
    pub predicate_prefixes: Vec<String>,
    pub external_namespaces: Vec<String>,
    pub max_instantiation_rounds: usize,
}

impl Rules {
    /// Names under an external namespace, or exactly an external name.
    pub fn is_external(&self, qualified: &str) -> bool {
        let qualified = qualified.trim_start_matches("::");
        self.external_namespaces.iter().any(|ns| {
            qualified
                .strip_prefix(ns.as_str())
                .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(from: &str, to: &str) -> RenameEntry {
        RenameEntry {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    #[test]
    fn test_literal_pattern_matching() {
        let p = Pattern::parse("Outer::Skipped").unwrap();
        assert!(p.matches("Skipped", "Outer::Skipped"));
        assert!(p.matches("Skipped<int>", "Outer::Skipped<int>"));
        assert!(p.matches("method", "Outer::Skipped::method"));
        assert!(!p.matches("SkippedToo", "Outer::SkippedToo"));

        let simple = Pattern::parse("skippedByName").unwrap();
        assert!(simple.matches("skippedByName", "Outer::skippedByName"));
    }

    #[test]
    fn test_regex_pattern_matching() {
        let p = Pattern::parse("/^cv::detail::/").unwrap();
        assert!(p.matches("Impl", "cv::detail::Impl"));
        assert!(!p.matches("Impl", "cv::Impl"));
    }

    #[test]
    fn test_invalid_regex_is_config_error() {
        let err = Pattern::parse("/(unclosed/").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRegex { .. }));
    }

    #[test]
    fn test_name_mapper_backrefs() {
        let mapper = NameMapper::compile(&[
            entry("Outer::Thing", "RubyThing"),
            entry("/^get(\\w+)$/", "fetch_\\1"),
        ])
        .unwrap();
        assert_eq!(mapper.map("Outer::Thing", "Thing").as_deref(), Some("RubyThing"));
        assert_eq!(mapper.map("A::getValue", "getValue").as_deref(), Some("fetch_Value"));
        assert_eq!(mapper.map("A::other", "other"), None);
    }

    #[test]
    fn test_conflicting_literal_renames() {
        let err = NameMapper::compile(&[entry("foo", "bar"), entry("foo", "baz")]).unwrap_err();
        assert!(matches!(err, ConfigError::ConflictingRename { .. }));
        // Repeating the same mapping is harmless.
        assert!(NameMapper::compile(&[entry("foo", "bar"), entry("foo", "bar")]).is_ok());
    }

    #[test]
    fn test_merge_prefers_other() {
        let mut base = NameMapper::compile(&[entry("a", "one")]).unwrap();
        base.merge(NameMapper::compile(&[entry("a", "two")]).unwrap());
        assert_eq!(base.map("a", "a").as_deref(), Some("two"));
    }

    #[test]
    fn test_external_namespaces() {
        let rules = Rules {
            external_namespaces: vec!["std".to_string()],
            ..Rules::default()
        };
        assert!(rules.is_external("std::string"));
        assert!(rules.is_external("::std::vector<int>"));
        assert!(!rules.is_external("stdx::thing"));
    }
}

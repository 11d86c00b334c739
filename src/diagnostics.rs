//! Diagnostics collected during a run.
//!
//! Structural and emission problems never abort the run; they are recorded here
//! against the declaration they affect, together with the final list of excluded
//! declarations that the CLI prints (and optionally writes as JSON).

use crate::decl::{DeclGraph, FilterVerdict};
use crate::types::DeclId;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Note,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    UnresolvedParent,
    AliasCycle,
    UnresolvedType,
    UnparsableType,
    SafeBool,
    AmbiguousOverload,
    InstantiationLimit,
    UnknownTemplate,
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    #[serde(skip)]
    pub decl: Option<DeclId>,
    pub name: String,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Note => "note",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{level}: {}: {}", self.name, self.message)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(
        &mut self,
        severity: Severity,
        kind: DiagnosticKind,
        decl: Option<DeclId>,
        name: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.items.push(Diagnostic {
            severity,
            kind,
            decl,
            name: name.into(),
            message: message.into(),
        });
    }

    pub fn note(&mut self, kind: DiagnosticKind, decl: Option<DeclId>, name: &str, message: impl Into<String>) {
        self.push(Severity::Note, kind, decl, name, message);
    }

    pub fn warn(&mut self, kind: DiagnosticKind, decl: Option<DeclId>, name: &str, message: impl Into<String>) {
        self.push(Severity::Warning, kind, decl, name, message);
    }

    pub fn error(&mut self, kind: DiagnosticKind, decl: Option<DeclId>, name: &str, message: impl Into<String>) {
        self.push(Severity::Error, kind, decl, name, message);
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.items.extend(other.items);
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Reason recorded for a declaration, if any.
    pub fn reason_for(&self, decl: DeclId) -> Option<&str> {
        self.items
            .iter()
            .find(|d| d.decl == Some(decl))
            .map(|d| d.message.as_str())
    }

    /// Stable order: severity (errors first), then name, then message.
    pub fn sort(&mut self) {
        self.items.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then_with(|| a.name.cmp(&b.name))
                .then_with(|| a.message.cmp(&b.message))
        });
        self.items.dedup();
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExclusionEntry {
    pub name: String,
    pub kind: String,
    pub verdict: FilterVerdict,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Every excluded declaration with its verdict.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExclusionReport {
    pub excluded: Vec<ExclusionEntry>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ExclusionReport {
    pub fn build(graph: &DeclGraph, diagnostics: &Diagnostics) -> Self {
        let mut excluded: Vec<ExclusionEntry> = graph
            .iter()
            .filter(|d| !d.verdict.is_included() && !graph.has_excluded_ancestor(d.id))
            .map(|d| ExclusionEntry {
                name: d.display_name().to_string(),
                kind: d.kind.to_string(),
                verdict: d.verdict,
                header: graph
                    .header_path(d.header)
                    .map(|p| p.display().to_string()),
                line: d.location.map(|l| l.line),
                reason: diagnostics.reason_for(d.id).map(str::to_string),
            })
            .collect();
        excluded.sort_by(|a, b| {
            a.header
                .cmp(&b.header)
                .then_with(|| a.line.cmp(&b.line))
                .then_with(|| a.name.cmp(&b.name))
        });
        Self {
            excluded,
            diagnostics: diagnostics.iter().cloned().collect(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sorting_puts_errors_first() {
        let mut diags = Diagnostics::new();
        diags.note(DiagnosticKind::UnresolvedType, None, "b", "unresolved");
        diags.error(DiagnosticKind::AmbiguousOverload, None, "a", "ambiguous");
        diags.note(DiagnosticKind::UnresolvedType, None, "b", "unresolved");
        diags.sort();
        assert_eq!(diags.len(), 2);
        assert_eq!(diags.iter().next().unwrap().severity, Severity::Error);
        assert!(diags.has_errors());
    }

    #[test]
    fn test_display() {
        let mut diags = Diagnostics::new();
        diags.warn(DiagnosticKind::AliasCycle, None, "Ns::A", "alias cycle through Ns::B");
        assert_eq!(
            diags.iter().next().unwrap().to_string(),
            "warning: Ns::A: alias cycle through Ns::B"
        );
    }
}

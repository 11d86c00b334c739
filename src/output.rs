//! Writing generated units to disk.
//!
//! Each header produces `<stem>-rb.<ext>` and `<stem>-rb.hpp`, plus `<stem>-rb.ipp`
//! when it defines class templates. Files whose content is already up to date are left
//! untouched, so build systems do not rebuild them.

use crate::diagnostics::ExclusionReport;
use crate::emit::GeneratedUnit;
use crate::error::{GenerateError, GenerateResult};
use crate::pipeline::Generation;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Files touched by a write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteSummary {
    pub written: Vec<PathBuf>,
    pub unchanged: Vec<PathBuf>,
}

impl WriteSummary {
    pub fn total(&self) -> usize {
        self.written.len() + self.unchanged.len()
    }
}

#[derive(Debug, Clone)]
pub struct OutputWriter {
    dir: PathBuf,
    extension: String,
}

impl OutputWriter {
    pub fn new(dir: impl Into<PathBuf>, extension: &str) -> Self {
        Self {
            dir: dir.into(),
            extension: extension.trim_start_matches('.').to_string(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the source unit for `stem`.
    pub fn source_path(&self, stem: &str) -> PathBuf {
        self.dir.join(format!("{stem}-rb.{}", self.extension))
    }

    /// Write every unit and the aggregate, in unit order.
    pub fn write(&self, generation: &Generation) -> GenerateResult<WriteSummary> {
        let mut summary = WriteSummary::default();
        for unit in &generation.units {
            self.write_unit(unit, &mut summary)?;
        }
        if let Some((project, source)) = &generation.aggregate {
            self.write_file(&self.source_path(project), source, &mut summary)?;
        }
        info!(
            "[output] {} files written, {} unchanged in {}",
            summary.written.len(),
            summary.unchanged.len(),
            self.dir.display()
        );
        Ok(summary)
    }

    fn write_unit(&self, unit: &GeneratedUnit, summary: &mut WriteSummary) -> GenerateResult<()> {
        self.write_file(&self.source_path(&unit.stem), &unit.cpp, summary)?;
        self.write_file(&self.dir.join(format!("{}-rb.hpp", unit.stem)), &unit.hpp, summary)?;
        if let Some(ipp) = &unit.ipp {
            self.write_file(&self.dir.join(format!("{}-rb.ipp", unit.stem)), ipp, summary)?;
        }
        Ok(())
    }

    fn write_file(&self, path: &Path, content: &str, summary: &mut WriteSummary) -> GenerateResult<()> {
        if std::fs::read_to_string(path).is_ok_and(|existing| existing == content) {
            debug!("[output] {} is up to date", path.display());
            summary.unchanged.push(path.to_path_buf());
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| GenerateError::FileWrite {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(path, content).map_err(|source| GenerateError::FileWrite {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("[output] wrote {}", path.display());
        summary.written.push(path.to_path_buf());
        Ok(())
    }
}

/// Write the exclusion report as pretty JSON.
pub fn write_report(path: &Path, report: &ExclusionReport) -> GenerateResult<()> {
    let json = report.to_json().map_err(|e| GenerateError::FileWrite {
        path: path.to_path_buf(),
        source: std::io::Error::other(e),
    })?;
    std::fs::write(path, json).map_err(|source| GenerateError::FileWrite {
        path: path.to_path_buf(),
        source,
    })
}

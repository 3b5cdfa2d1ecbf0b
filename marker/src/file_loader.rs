//! Builds a [`Catalog`] from a directory of test artifacts.
//!
//! - `NAME.sh` with `NAME.out` (exact, preferred) or `NAME.reg` (template) is a script unit.
//!   Names starting with `substitution_test_` are Basic when they contain `basic` and Advanced
//!   otherwise; any other name is Advanced when the number before its first `-` is 100 or more,
//!   and Basic when it is lower or not a number.
//! - `NAME.session` with `NAME.reg` or `NAME.out` is a Scripted unit: every line of the session
//!   file is piped to an interactive subject.
//!
//! Artifacts without a companion are skipped with a warning.

use code_runner::Invocation;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use util::mark_allocator::Category;

use crate::error::MarkerError;
use crate::types::{Catalog, CatalogProvider, ExpectedOutput, TestUnit};

const SUBSTITUTION_PREFIX: &str = "substitution_test_";
const ADVANCED_FROM: u32 = 100;

/// Category of a script unit, from its name.
pub fn classify_script(name: &str) -> Category {
    if name.starts_with(SUBSTITUTION_PREFIX) {
        return if name.contains("basic") {
            Category::Basic
        } else {
            Category::Advanced
        };
    }
    match name.split('-').next().and_then(|n| n.trim().parse::<u32>().ok()) {
        Some(number) if number >= ADVANCED_FROM => Category::Advanced,
        _ => Category::Basic,
    }
}

fn read(path: &Path) -> Result<String, MarkerError> {
    fs::read_to_string(path)
        .map_err(|e| MarkerError::IoError(format!("Failed to read {}: {e}", path.display())))
}

/// Catalog provider backed by one directory.
#[derive(Debug, Clone)]
pub struct DirectoryCatalog {
    dir: PathBuf,
}

impl DirectoryCatalog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `.out` wins over `.reg` when both exist.
    fn expected_for(&self, stem: &str) -> Result<Option<ExpectedOutput>, MarkerError> {
        let out = self.dir.join(format!("{stem}.out"));
        if out.is_file() {
            return Ok(Some(ExpectedOutput::Exact(read(&out)?)));
        }
        let reg = self.dir.join(format!("{stem}.reg"));
        if reg.is_file() {
            return Ok(Some(ExpectedOutput::Template(read(&reg)?)));
        }
        Ok(None)
    }

    /// Artifact paths are absolute so a unit can run from any working directory.
    fn artifacts(&self) -> Result<Vec<PathBuf>, MarkerError> {
        if !self.dir.is_dir() {
            return Err(MarkerError::IoError(format!(
                "Test directory not found: {}",
                self.dir.display()
            )));
        }
        let root = fs::canonicalize(&self.dir).map_err(|e| {
            MarkerError::IoError(format!("Failed to resolve {}: {e}", self.dir.display()))
        })?;
        let mut paths = Vec::new();
        for entry in fs::read_dir(&root)? {
            let path = entry?.path();
            if path.is_file() {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }
}

impl CatalogProvider for DirectoryCatalog {
    fn load(&self) -> Result<Catalog, MarkerError> {
        let mut catalog = Catalog::new();

        for path in self.artifacts()? {
            let (Some(stem), Some(ext)) = (
                path.file_stem().and_then(|s| s.to_str()),
                path.extension().and_then(|s| s.to_str()),
            ) else {
                continue;
            };

            let (category, invocation) = match ext {
                "sh" => (classify_script(stem), Invocation::Script(path.clone())),
                "session" => {
                    let commands = read(&path)?.lines().map(str::to_string).collect();
                    (Category::Scripted, Invocation::Session(commands))
                }
                _ => continue,
            };

            match self.expected_for(stem)? {
                Some(expected) => {
                    debug!(unit = stem, %category, kind = expected.kind(), "discovered unit");
                    catalog.insert(TestUnit::new(stem, category, invocation, expected));
                }
                None => warn!("No .out or .reg file found for {}", path.display()),
            }
        }

        Ok(catalog)
    }

    fn describe(&self) -> String {
        self.dir.display().to_string()
    }
}

//! Per-invocation launch settings.
//!
//! A [`LaunchContext`] describes the working directory and environment a subject process starts
//! with. It is applied to the child's [`Command`] only; the harness process environment is never
//! touched.

use std::collections::BTreeMap;
use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::process::Command;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchContext {
    pub working_dir: Option<PathBuf>,
    pub env: BTreeMap<String, String>,
    /// Directories searched before the inherited `PATH`.
    pub path_prefix: Vec<PathBuf>,
}

impl LaunchContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_path_prefix(mut self, dir: impl Into<PathBuf>) -> Self {
        self.path_prefix.push(dir.into());
        self
    }

    /// Layers `overrides` on top of `self`: a working directory or variable set in `overrides`
    /// wins, path prefixes from `overrides` come first.
    pub fn merged_with(&self, overrides: &LaunchContext) -> LaunchContext {
        let mut env = self.env.clone();
        env.extend(overrides.env.clone());
        let mut path_prefix = overrides.path_prefix.clone();
        path_prefix.extend(self.path_prefix.iter().cloned());
        LaunchContext {
            working_dir: overrides
                .working_dir
                .clone()
                .or_else(|| self.working_dir.clone()),
            env,
            path_prefix,
        }
    }

    /// The `PATH` value a child should see, if this context changes it.
    pub fn search_path(&self) -> Option<OsString> {
        if self.path_prefix.is_empty() {
            return None;
        }
        let inherited = self
            .env
            .get("PATH")
            .map(OsString::from)
            .or_else(|| env::var_os("PATH"))
            .unwrap_or_default();
        let mut dirs: Vec<PathBuf> = self.path_prefix.clone();
        dirs.extend(env::split_paths(&inherited));
        env::join_paths(dirs).ok()
    }

    pub(crate) fn apply(&self, command: &mut Command) {
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }
        command.envs(&self.env);
        if let Some(path) = self.search_path() {
            command.env("PATH", path);
        }
    }

    pub fn working_dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }
}

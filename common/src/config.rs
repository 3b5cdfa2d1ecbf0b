//! Process-level settings of the grader.
//!
//! Values come from the environment, optionally seeded from a `.env` file. The result is a plain
//! value handed to whoever needs it; nothing is stored globally.

use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    /// Shell under test.
    pub subject: PathBuf,
    /// Directory holding the test artifacts.
    pub tests_dir: PathBuf,
    /// Optional JSON file with scoring and execution settings.
    pub config_path: Option<PathBuf>,
    /// Run a single category (`basic`, `advanced`, `scripted`).
    pub only_category: Option<String>,
    /// Run a single unit by name.
    pub only_test: Option<String>,
    pub memory_safety: bool,
    pub verbose: bool,
    /// Where to write the JSON score summary, if anywhere.
    pub json_report: Option<PathBuf>,
    pub log_level: String,
    pub log_file: String,
    pub log_to_stdout: bool,
}

fn flag(raw: Option<String>) -> bool {
    matches!(
        raw.as_deref().map(str::trim).map(str::to_ascii_lowercase).as_deref(),
        Some("1" | "true" | "yes" | "on")
    )
}

fn non_empty(raw: Option<String>) -> Option<String> {
    raw.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl HarnessConfig {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            subject: non_empty(lookup("GRADER_SUBJECT"))
                .unwrap_or_else(|| "./minibash".into())
                .into(),
            tests_dir: non_empty(lookup("GRADER_TESTS_DIR"))
                .unwrap_or_else(|| "tests".into())
                .into(),
            config_path: non_empty(lookup("GRADER_CONFIG")).map(PathBuf::from),
            only_category: non_empty(lookup("GRADER_ONLY_CATEGORY")),
            only_test: non_empty(lookup("GRADER_ONLY_TEST")),
            memory_safety: flag(lookup("GRADER_MEMORY_SAFETY")),
            verbose: flag(lookup("GRADER_VERBOSE")),
            json_report: non_empty(lookup("GRADER_JSON_REPORT")).map(PathBuf::from),
            log_level: non_empty(lookup("LOG_LEVEL")).unwrap_or_else(|| "info".into()),
            log_file: non_empty(lookup("LOG_FILE")).unwrap_or_else(|| "logs/grader.log".into()),
            log_to_stdout: flag(lookup("LOG_TO_STDOUT")),
        }
    }
}

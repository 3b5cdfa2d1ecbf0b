use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Point budgets for the scored categories.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ScoringOptions {
    /// Functional budget shared by the Basic and Advanced pools.
    #[serde(default = "default_total_points")]
    pub total_points: u32,

    /// Share of `total_points` given to the Basic pool (0.0–1.0). Advanced gets the rest.
    #[serde(default = "default_basic_ratio")]
    pub basic_ratio: f64,

    /// Flat award for every Scripted unit, added on top of `total_points`.
    #[serde(default = "default_scripted_points_per_unit")]
    pub scripted_points_per_unit: u32,

    /// Budget of the memory-safety pool, added on top of everything else.
    #[serde(default = "default_memory_safety_points")]
    pub memory_safety_points: u32,
}

impl Default for ScoringOptions {
    fn default() -> Self {
        Self {
            total_points: default_total_points(),
            basic_ratio: default_basic_ratio(),
            scripted_points_per_unit: default_scripted_points_per_unit(),
            memory_safety_points: default_memory_safety_points(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ExecutionLimits {
    /// Wall-clock limit for a subject run with a script argument.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Wall-clock limit for a piped interactive session.
    #[serde(default = "default_session_timeout_secs")]
    pub session_timeout_secs: u64,

    /// Wall-clock limit for a run wrapped by the leak detector.
    #[serde(default = "default_leak_timeout_secs")]
    pub leak_timeout_secs: u64,

    /// How long to keep reading pipes after the subject was killed.
    #[serde(default = "default_drain_millis")]
    pub drain_millis: u64,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            session_timeout_secs: default_session_timeout_secs(),
            leak_timeout_secs: default_leak_timeout_secs(),
            drain_millis: default_drain_millis(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LeakCheckOptions {
    /// Program that wraps the subject invocation.
    #[serde(default = "default_detector")]
    pub detector: String,

    /// Arguments passed to the detector before the subject path.
    #[serde(default = "default_detector_args")]
    pub args: Vec<String>,
}

impl Default for LeakCheckOptions {
    fn default() -> Self {
        Self {
            detector: default_detector(),
            args: default_detector_args(),
        }
    }
}

/// Markers around a pattern block inside an expected-output template.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct TemplateOptions {
    #[serde(default = "default_open_delimiter")]
    pub open_delimiter: String,
    #[serde(default = "default_close_delimiter")]
    pub close_delimiter: String,
}

impl Default for TemplateOptions {
    fn default() -> Self {
        Self {
            open_delimiter: default_open_delimiter(),
            close_delimiter: default_close_delimiter(),
        }
    }
}

/// Shape rule for a unit whose output length depends on scheduler timing.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct TimingRule {
    /// Units whose name contains this text use the rule.
    pub unit: String,
    /// Fixed lines that must open both the expected and the actual output.
    #[serde(default)]
    pub leading_lines: Vec<String>,
    /// First value of the consecutive numeric sequence.
    #[serde(default = "default_timing_base")]
    pub base: i64,
    /// Accepted shortfall of numeric lines.
    #[serde(default = "default_timing_tolerance")]
    pub below: usize,
    /// Accepted surplus of numeric lines.
    #[serde(default = "default_timing_tolerance")]
    pub above: usize,
}

impl TimingRule {
    pub fn applies_to(&self, unit_name: &str) -> bool {
        !self.unit.is_empty() && unit_name.contains(&self.unit)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct TimingOptions {
    #[serde(default = "default_timing_rules")]
    pub rules: Vec<TimingRule>,
}

impl Default for TimingOptions {
    fn default() -> Self {
        Self {
            rules: default_timing_rules(),
        }
    }
}

impl TimingOptions {
    pub fn rule_for(&self, unit_name: &str) -> Option<&TimingRule> {
        self.rules.iter().find(|r| r.applies_to(unit_name))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ExecutionConfig {
    #[serde(default)]
    pub scoring: ScoringOptions,

    #[serde(default)]
    pub execution: ExecutionLimits,

    #[serde(default)]
    pub leak_check: LeakCheckOptions,

    #[serde(default)]
    pub template: TemplateOptions,

    #[serde(default)]
    pub timing: TimingOptions,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self::default_config()
    }
}

impl ExecutionConfig {
    pub fn default_config() -> Self {
        ExecutionConfig {
            scoring: ScoringOptions::default(),
            execution: ExecutionLimits::default(),
            leak_check: LeakCheckOptions::default(),
            template: TemplateOptions::default(),
            timing: TimingOptions::default(),
        }
    }

    /// Reads a JSON config; missing sections and fields fall back to their defaults.
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let file_contents = fs::read_to_string(path)
            .map_err(|_| format!("Failed to read config file at {path:?}"))?;
        let cfg = Self::from_json(&file_contents)?;
        debug!(?path, "loaded execution config");
        Ok(cfg)
    }

    pub fn from_json(raw: &str) -> Result<Self, String> {
        let cfg: ExecutionConfig =
            serde_json::from_str(raw).map_err(|e| format!("Invalid config JSON format: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Checks the values a run cannot start without.
    pub fn validate(&self) -> Result<(), String> {
        let ratio = self.scoring.basic_ratio;
        if !(0.0..=1.0).contains(&ratio) {
            return Err(format!("basic_ratio must be between 0.0 and 1.0 (got {ratio})"));
        }
        if self.execution.timeout_secs == 0
            || self.execution.session_timeout_secs == 0
            || self.execution.leak_timeout_secs == 0
        {
            return Err("timeouts must be at least one second".to_string());
        }
        if self.template.open_delimiter.is_empty() || self.template.close_delimiter.is_empty() {
            return Err("template delimiters must not be empty".to_string());
        }
        if self.leak_check.detector.trim().is_empty() {
            return Err("leak_check.detector must not be empty".to_string());
        }
        Ok(())
    }
}

//Default Functions

fn default_total_points() -> u32 {
    100
}

fn default_basic_ratio() -> f64 {
    0.7
}

fn default_scripted_points_per_unit() -> u32 {
    1
}

fn default_memory_safety_points() -> u32 {
    15
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_session_timeout_secs() -> u64 {
    10
}

fn default_leak_timeout_secs() -> u64 {
    120
}

fn default_drain_millis() -> u64 {
    500
}

fn default_detector() -> String {
    "valgrind".to_string()
}

fn default_detector_args() -> Vec<String> {
    vec![
        "--leak-check=full".to_string(),
        "--show-leak-kinds=definite,possible".to_string(),
    ]
}

fn default_open_delimiter() -> String {
    "$re:".to_string()
}

fn default_close_delimiter() -> String {
    "$".to_string()
}

fn default_timing_base() -> i64 {
    1
}

fn default_timing_tolerance() -> usize {
    3
}

fn default_timing_rules() -> Vec<TimingRule> {
    vec![TimingRule {
        unit: "while-complex".to_string(),
        leading_lines: vec!["Starting".to_string()],
        base: default_timing_base(),
        below: default_timing_tolerance(),
        above: default_timing_tolerance(),
    }]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let cfg = ExecutionConfig::default_config();
        assert_eq!(cfg.scoring.total_points, 100);
        assert_eq!(cfg.scoring.basic_ratio, 0.7);
        assert_eq!(cfg.scoring.scripted_points_per_unit, 1);
        assert_eq!(cfg.execution.timeout_secs, 30);
        assert_eq!(cfg.template.open_delimiter, "$re:");
        assert_eq!(cfg.template.close_delimiter, "$");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let cfg = ExecutionConfig::from_json(r#"{ "scoring": { "total_points": 50 } }"#)
            .expect("partial config should parse");
        assert_eq!(cfg.scoring.total_points, 50);
        assert_eq!(cfg.scoring.basic_ratio, 0.7);
        assert_eq!(cfg.leak_check.detector, "valgrind");
        assert_eq!(cfg.timing.rules.len(), 1);
    }

    #[test]
    fn test_ratio_out_of_range_rejected() {
        let err = ExecutionConfig::from_json(r#"{ "scoring": { "basic_ratio": 1.5 } }"#)
            .expect_err("ratio above 1.0 must be rejected");
        assert!(err.contains("basic_ratio"), "got: {err}");
    }

    #[test]
    fn test_malformed_json_rejected() {
        let err = ExecutionConfig::from_json("{ not json").unwrap_err();
        assert!(err.starts_with("Invalid config JSON format"));
    }

    #[test]
    fn test_timing_rule_lookup() {
        let timing = TimingOptions::default();
        assert!(timing.rule_for("105-while-complex").is_some());
        assert!(timing.rule_for("001-comment").is_none());
    }

    #[test]
    fn test_from_file_round_trips_saved_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut cfg = ExecutionConfig::default_config();
        cfg.scoring.memory_safety_points = 20;
        fs::write(&path, serde_json::to_string_pretty(&cfg).unwrap()).unwrap();

        let loaded = ExecutionConfig::from_file(&path).unwrap();
        assert_eq!(loaded, cfg);
    }
}

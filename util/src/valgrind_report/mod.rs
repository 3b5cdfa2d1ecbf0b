use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static DEFINITELY_LOST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"definitely lost:\s*([0-9,]+)\s*bytes").expect("valid regex"));
static POSSIBLY_LOST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"possibly lost:\s*([0-9,]+)\s*bytes").expect("valid regex"));

const NO_LEAKS_MARKER: &str = "no leaks are possible";
const BANNER_MARKERS: [&str; 2] = ["Memcheck, a memory error detector", "Using Valgrind-"];

/// Judgement on one leak-checked run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum LeakVerdict {
    Clean,
    Leaking { definitely_lost: u64, possibly_lost: u64 },
    /// The detector banner never appeared; scored as leaking.
    Unavailable,
}

impl LeakVerdict {
    pub fn is_clean(&self) -> bool {
        matches!(self, LeakVerdict::Clean)
    }

    pub fn bytes_leaked(&self) -> u64 {
        match self {
            LeakVerdict::Leaking {
                definitely_lost,
                possibly_lost,
            } => definitely_lost + possibly_lost,
            _ => 0,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            LeakVerdict::Clean => "no leaks".to_string(),
            LeakVerdict::Leaking {
                definitely_lost,
                possibly_lost,
            } => format!(
                "leak: {definitely_lost} bytes definitely lost, {possibly_lost} bytes possibly lost"
            ),
            LeakVerdict::Unavailable => "leak check unavailable (no detector banner)".to_string(),
        }
    }
}

fn lost_bytes(re: &Regex, line: &str) -> Option<u64> {
    re.captures(line)
        .and_then(|cap| cap[1].replace(',', "").parse::<u64>().ok())
}

pub struct ValgrindProcessor;

impl ValgrindProcessor {
    /// Classifies the combined text of one leak-checked run.
    pub fn classify(report: &str) -> LeakVerdict {
        let mut banner = false;
        for line in report.lines() {
            if line.contains(NO_LEAKS_MARKER) {
                return LeakVerdict::Clean;
            }
            if let Some(bytes) = lost_bytes(&DEFINITELY_LOST, line).filter(|b| *b > 0) {
                return LeakVerdict::Leaking {
                    definitely_lost: bytes,
                    possibly_lost: lost_bytes(&POSSIBLY_LOST, report).unwrap_or(0),
                };
            }
            if let Some(bytes) = lost_bytes(&POSSIBLY_LOST, line).filter(|b| *b > 0) {
                return LeakVerdict::Leaking {
                    definitely_lost: 0,
                    possibly_lost: bytes,
                };
            }
            if BANNER_MARKERS.iter().any(|m| line.contains(m)) {
                banner = true;
            }
        }

        if banner {
            LeakVerdict::Clean
        } else {
            LeakVerdict::Unavailable
        }
    }

    /// Classifies every `(unit name, report text)` pair into a [`ValgrindReport`].
    pub fn process_report(task_contents: &[(String, String)]) -> ValgrindReport {
        let mut report = ValgrindReport::new();
        for (name, content) in task_contents {
            report.record(name.clone(), Self::classify(content));
        }
        report
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValgrindTask {
    pub name: String,
    pub clean: bool,
    pub bytes_leaked: u64,
    pub verdict: LeakVerdict,
}

/// Leak results of a memory-safety sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValgrindReport {
    pub generated_at: String,
    pub total_leaks: u64,
    pub tasks: Vec<ValgrindTask>,
}

impl Default for ValgrindReport {
    fn default() -> Self {
        Self::new()
    }
}

impl ValgrindReport {
    pub fn new() -> Self {
        Self {
            generated_at: Utc::now().to_rfc3339(),
            total_leaks: 0,
            tasks: Vec::new(),
        }
    }

    pub fn record(&mut self, name: String, verdict: LeakVerdict) {
        self.total_leaks += verdict.bytes_leaked();
        self.tasks.push(ValgrindTask {
            name,
            clean: verdict.is_clean(),
            bytes_leaked: verdict.bytes_leaked(),
            verdict,
        });
    }

    pub fn total_checked(&self) -> usize {
        self.tasks.len()
    }

    pub fn clean_count(&self) -> usize {
        self.tasks.iter().filter(|t| t.clean).count()
    }

    pub fn unavailable_count(&self) -> usize {
        self.tasks
            .iter()
            .filter(|t| t.verdict == LeakVerdict::Unavailable)
            .count()
    }

    pub fn to_json(&self) -> Result<String, String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize Valgrind report: {}", e))
    }
}

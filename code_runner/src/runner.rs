//! How the subject is launched for one test unit.

use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use util::execution_config::ExecutionLimits;

use crate::{OutputStreams, RunOutput};

/// What to execute for a test unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Invocation {
    /// Run the subject with this script as its only argument.
    Script(PathBuf),
    /// Pipe these command lines into an interactive subject session.
    Session(Vec<String>),
}

/// Runs the subject with a script path as positional argument; validates stdout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptedRunner {
    pub script: PathBuf,
}

/// Feeds command lines to the subject's stdin; validates the combined stdout and stderr.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellSessionRunner {
    pub commands: Vec<String>,
}

impl ShellSessionRunner {
    /// Command lines actually sent: blanks and `#` comments are dropped.
    pub fn script(&self) -> String {
        let lines: Vec<&str> = self
            .commands
            .iter()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty() && !c.starts_with('#'))
            .collect();
        let mut script = lines.join("\n");
        script.push('\n');
        script
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Runner {
    Scripted(ScriptedRunner),
    ShellSession(ShellSessionRunner),
}

impl Runner {
    pub fn for_invocation(invocation: &Invocation) -> Self {
        match invocation {
            // The subject starts in the script's directory, so a relative path would no longer
            // point at the script.
            Invocation::Script(script) => Runner::Scripted(ScriptedRunner {
                script: std::path::absolute(script).unwrap_or_else(|_| script.clone()),
            }),
            Invocation::Session(commands) => Runner::ShellSession(ShellSessionRunner {
                commands: commands.clone(),
            }),
        }
    }

    /// Arguments passed to the subject after its own path.
    pub fn args(&self) -> Vec<OsString> {
        match self {
            Runner::Scripted(r) => vec![r.script.clone().into_os_string()],
            Runner::ShellSession(_) => Vec::new(),
        }
    }

    pub fn stdin_payload(&self) -> Option<String> {
        match self {
            Runner::Scripted(_) => None,
            Runner::ShellSession(r) => Some(r.script()),
        }
    }

    /// Scripts run from their own directory so relative paths inside them resolve.
    pub fn default_working_dir(&self) -> Option<&Path> {
        match self {
            Runner::Scripted(r) => r.script.parent().filter(|p| !p.as_os_str().is_empty()),
            Runner::ShellSession(_) => None,
        }
    }

    /// Sessions are judged on both streams together, so they share one pipe.
    pub fn streams(&self) -> OutputStreams {
        match self {
            Runner::Scripted(_) => OutputStreams::Separate,
            Runner::ShellSession(_) => OutputStreams::Merged,
        }
    }

    pub fn timeout(&self, limits: &ExecutionLimits) -> Duration {
        match self {
            Runner::Scripted(_) => Duration::from_secs(limits.timeout_secs),
            Runner::ShellSession(_) => Duration::from_secs(limits.session_timeout_secs),
        }
    }

    /// The text a validator judges for this kind of run.
    pub fn captured(&self, output: &RunOutput) -> String {
        match self {
            Runner::Scripted(_) => output.stdout.clone(),
            Runner::ShellSession(_) => output.combined.trim().to_string(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Runner::Scripted(_) => "script",
            Runner::ShellSession(_) => "session",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_runner_args_and_dir() {
        let runner = Runner::for_invocation(&Invocation::Script(PathBuf::from(
            "/tests/001-comment.sh",
        )));
        assert_eq!(runner.args(), vec![OsString::from("/tests/001-comment.sh")]);
        assert_eq!(runner.default_working_dir(), Some(Path::new("/tests")));
        assert!(runner.stdin_payload().is_none());
        assert_eq!(runner.kind(), "script");
    }

    #[test]
    fn test_relative_script_is_made_absolute() {
        let runner = Runner::for_invocation(&Invocation::Script(PathBuf::from("tests/x.sh")));
        let args = runner.args();
        let script = Path::new(&args[0]);
        assert!(script.is_absolute());
        assert!(script.ends_with("tests/x.sh"));
        assert_eq!(runner.default_working_dir(), script.parent());
    }

    #[test]
    fn test_session_filters_blank_and_comment_lines() {
        let runner = Runner::for_invocation(&Invocation::Session(vec![
            "# setup".to_string(),
            "x=5".to_string(),
            "   ".to_string(),
            "  echo $x  ".to_string(),
        ]));
        assert_eq!(runner.stdin_payload().as_deref(), Some("x=5\necho $x\n"));
        assert!(runner.args().is_empty());
        assert_eq!(runner.streams(), OutputStreams::Merged);
    }

    #[test]
    fn test_timeouts_follow_runner_kind() {
        let limits = ExecutionLimits::default();
        let script = Runner::for_invocation(&Invocation::Script(PathBuf::from("a.sh")));
        let session = Runner::for_invocation(&Invocation::Session(vec![]));
        assert_eq!(script.timeout(&limits), Duration::from_secs(limits.timeout_secs));
        assert_eq!(
            session.timeout(&limits),
            Duration::from_secs(limits.session_timeout_secs)
        );
    }
}

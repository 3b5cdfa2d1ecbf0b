//! Runs the subject shell for one test unit under a wall-clock limit.
//!
//! The engine captures stdout, stderr and their interleaving, salvages whatever was produced
//! when a run has to be killed, and can re-run an invocation wrapped by a leak detector.

use std::borrow::Cow;
use std::ffi::{OsStr, OsString};
use std::io;
use std::os::fd::OwnedFd;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::unix::pipe;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, warn};
use util::execution_config::{ExecutionConfig, ExecutionLimits, LeakCheckOptions};

pub mod launch_context;
pub mod runner;

pub use launch_context::LaunchContext;
pub use runner::{Invocation, Runner, ScriptedRunner, ShellSessionRunner};

/// How a subject process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Exited,
    /// Killed after its deadline.
    TimedOut(Duration),
    /// The process could not be started.
    LaunchFailed(String),
}

/// How the child's stdout and stderr are wired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStreams {
    /// One pipe each, read concurrently.
    Separate,
    /// Both descriptors share one pipe, so the text keeps the order the subject wrote it in.
    Merged,
}

/// Everything observed from one subject process.
///
/// With [`OutputStreams::Merged`] the subject has a single output stream: `stdout` and
/// `combined` hold the same text and `stderr` stays empty.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub status: RunStatus,
    pub stdout: String,
    pub stderr: String,
    /// Stdout and stderr in the order the chunks arrived.
    pub combined: String,
    pub exit_code: Option<i32>,
    pub elapsed: Duration,
}

impl RunOutput {
    fn launch_failed(message: String, elapsed: Duration) -> Self {
        Self {
            status: RunStatus::LaunchFailed(message),
            stdout: String::new(),
            stderr: String::new(),
            combined: String::new(),
            exit_code: None,
            elapsed,
        }
    }

    pub fn timed_out(&self) -> bool {
        matches!(self.status, RunStatus::TimedOut(_))
    }
}

type SharedBuf = Arc<Mutex<Vec<u8>>>;

fn append(buf: &SharedBuf, bytes: &[u8]) {
    let mut guard = buf.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    guard.extend_from_slice(bytes);
}

fn take_string(buf: &SharedBuf) -> String {
    let guard = buf.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    String::from_utf8_lossy(&guard).into_owned()
}

/// Copies a pipe into its own buffer and the shared combined buffer until EOF.
async fn pump<R: AsyncRead + Unpin>(mut pipe: R, own: SharedBuf, combined: SharedBuf) {
    let mut chunk = [0u8; 4096];
    loop {
        match pipe.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                append(&own, &chunk[..n]);
                append(&combined, &chunk[..n]);
            }
        }
    }
}

/// A single pipe whose write end is handed to the child as both stdout and stderr.
fn shared_pipe() -> io::Result<(pipe::Receiver, Stdio, Stdio)> {
    let (reader, writer) = io::pipe()?;
    let writer_err = writer.try_clone()?;
    let reader = pipe::Receiver::from_owned_fd(OwnedFd::from(reader))?;
    Ok((reader, Stdio::from(writer), Stdio::from(writer_err)))
}

/// Sends SIGKILL to every process in the subject's group.
fn kill_group(pgid: Option<u32>) -> io::Result<()> {
    let Some(pgid) = pgid.and_then(|id| libc::pid_t::try_from(id).ok()) else {
        return Ok(());
    };
    // SAFETY: killpg only takes integer arguments.
    if unsafe { libc::killpg(pgid, libc::SIGKILL) } == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

/// Kills the subject together with everything it started, then reaps it.
async fn terminate(child: &mut Child, pgid: Option<u32>, command_line: &str) {
    if let Err(e) = kill_group(pgid) {
        warn!(command = %command_line, "killpg failed: {e}");
    }
    if let Err(e) = child.kill().await {
        warn!(command = %command_line, "kill failed: {e}");
    }
}

/// Renders a command line for log output.
pub fn describe_command(program: &OsStr, args: &[OsString]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(OsString::as_os_str))
        .map(|part| shell_escape::escape(Cow::Owned(part.to_string_lossy().into_owned())))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Spawns `program` in its own process group, feeds `stdin`, and waits at most `limit` for it
/// to exit. On timeout the whole group is killed.
///
/// After a normal exit the pipe readers may use what is left of `limit` to reach EOF; after a
/// kill they get `drain`. Readers still blocked after that (a background grandchild holding the
/// pipe) are abandoned, the group is killed, and the bytes already read are kept.
pub async fn run_process(
    program: &OsStr,
    args: &[OsString],
    stdin: Option<String>,
    streams: OutputStreams,
    context: &LaunchContext,
    limit: Duration,
    drain: Duration,
) -> RunOutput {
    let started = Instant::now();
    let command_line = describe_command(program, args);

    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .process_group(0)
        .kill_on_drop(true);
    let merged_reader = match streams {
        OutputStreams::Separate => {
            command.stdout(Stdio::piped()).stderr(Stdio::piped());
            None
        }
        OutputStreams::Merged => match shared_pipe() {
            Ok((reader, out, err)) => {
                command.stdout(out).stderr(err);
                Some(reader)
            }
            Err(e) => {
                error!(command = %command_line, "failed to create output pipe: {e}");
                return RunOutput::launch_failed(
                    format!("failed to create output pipe: {e}"),
                    started.elapsed(),
                );
            }
        },
    };
    context.apply(&mut command);

    debug!(command = %command_line, cwd = ?context.working_dir(), "spawning subject");

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(e) => {
            error!(command = %command_line, "failed to launch: {e}");
            return RunOutput::launch_failed(
                format!("failed to launch {}: {e}", Path::new(program).display()),
                started.elapsed(),
            );
        }
    };
    // The command still owns the child's ends of a shared pipe; EOF never comes while they live.
    drop(command);
    let pgid = child.id();

    let stdout_buf: SharedBuf = Arc::default();
    let stderr_buf: SharedBuf = Arc::default();
    let combined_buf: SharedBuf = Arc::default();

    let mut readers: Vec<JoinHandle<()>> = Vec::new();
    if let Some(pipe) = merged_reader {
        readers.push(tokio::spawn(pump(
            pipe,
            stdout_buf.clone(),
            combined_buf.clone(),
        )));
    }
    if let Some(pipe) = child.stdout.take() {
        readers.push(tokio::spawn(pump(
            pipe,
            stdout_buf.clone(),
            combined_buf.clone(),
        )));
    }
    if let Some(pipe) = child.stderr.take() {
        readers.push(tokio::spawn(pump(
            pipe,
            stderr_buf.clone(),
            combined_buf.clone(),
        )));
    }

    if let (Some(payload), Some(mut pipe)) = (stdin, child.stdin.take()) {
        // A subject that exits early closes its end; the broken pipe is not an error here.
        tokio::spawn(async move {
            let _ = pipe.write_all(payload.as_bytes()).await;
            let _ = pipe.shutdown().await;
        });
    }

    let (status, exit_code) = match timeout(limit, child.wait()).await {
        Ok(Ok(exit)) => (RunStatus::Exited, exit.code()),
        Ok(Err(e)) => {
            error!(command = %command_line, "failed waiting for subject: {e}");
            (RunStatus::LaunchFailed(format!("failed waiting for subject: {e}")), None)
        }
        Err(_) => {
            warn!(command = %command_line, ?limit, "subject timed out; killing");
            terminate(&mut child, pgid, &command_line).await;
            (RunStatus::TimedOut(limit), None)
        }
    };

    let drain_window = match status {
        RunStatus::Exited => limit.saturating_sub(started.elapsed()).max(drain),
        _ => drain,
    };
    let drain_deadline = Instant::now() + drain_window;
    let mut abandoned = false;
    for mut reader in readers {
        let left = drain_deadline.saturating_duration_since(Instant::now());
        if timeout(left, &mut reader).await.is_err() {
            warn!(command = %command_line, "output pipe still open; keeping partial output");
            reader.abort();
            abandoned = true;
        }
    }
    // A reader only blocks while some group member still holds the pipe.
    if abandoned && status == RunStatus::Exited {
        if let Err(e) = kill_group(pgid) {
            warn!(command = %command_line, "killpg failed: {e}");
        }
    }

    RunOutput {
        status,
        stdout: take_string(&stdout_buf),
        stderr: take_string(&stderr_buf),
        combined: take_string(&combined_buf),
        exit_code,
        elapsed: started.elapsed(),
    }
}

/// Launches the subject shell for test units.
#[derive(Debug, Clone)]
pub struct ExecutionEngine {
    subject: PathBuf,
    context: LaunchContext,
    limits: ExecutionLimits,
    leak_check: LeakCheckOptions,
}

/// Paths with a directory part are made absolute so a per-unit working directory does not
/// change what gets executed; bare names are left for `PATH` lookup.
fn resolve_subject(subject: PathBuf) -> PathBuf {
    if subject.components().count() > 1 {
        std::fs::canonicalize(&subject).unwrap_or(subject)
    } else {
        subject
    }
}

impl ExecutionEngine {
    pub fn new(subject: impl Into<PathBuf>, config: &ExecutionConfig) -> Self {
        Self {
            subject: resolve_subject(subject.into()),
            context: LaunchContext::default(),
            limits: config.execution.clone(),
            leak_check: config.leak_check.clone(),
        }
    }

    /// Launch settings applied to every invocation, beneath any per-unit settings.
    pub fn with_context(mut self, context: LaunchContext) -> Self {
        self.context = context;
        self
    }

    fn context_for(&self, runner: &Runner, overrides: &LaunchContext) -> LaunchContext {
        let mut base = self.context.clone();
        if base.working_dir.is_none() {
            base.working_dir = runner.default_working_dir().map(Path::to_path_buf);
        }
        base.merged_with(overrides)
    }

    fn drain(&self) -> Duration {
        Duration::from_millis(self.limits.drain_millis)
    }

    /// Runs one invocation of the subject.
    pub async fn run(&self, invocation: &Invocation, overrides: &LaunchContext) -> RunOutput {
        let runner = Runner::for_invocation(invocation);
        let context = self.context_for(&runner, overrides);
        let limit = runner.timeout(&self.limits);
        debug!(kind = runner.kind(), ?limit, "running invocation");
        run_process(
            self.subject.as_os_str(),
            &runner.args(),
            runner.stdin_payload(),
            runner.streams(),
            &context,
            limit,
            self.drain(),
        )
        .await
    }

    /// Runs the same invocation as `detector [args..] subject [script]`.
    ///
    /// The detector's report ends up in the returned output; the caller classifies it.
    pub async fn run_leak_checked(
        &self,
        invocation: &Invocation,
        overrides: &LaunchContext,
    ) -> RunOutput {
        let runner = Runner::for_invocation(invocation);
        let context = self.context_for(&runner, overrides);

        let mut args: Vec<OsString> = self.leak_check.args.iter().map(OsString::from).collect();
        args.push(self.subject.clone().into_os_string());
        args.extend(runner.args());

        run_process(
            OsStr::new(&self.leak_check.detector),
            &args,
            runner.stdin_payload(),
            runner.streams(),
            &context,
            Duration::from_secs(self.limits.leak_timeout_secs),
            self.drain(),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_command_quotes_spaces() {
        let line = describe_command(
            OsStr::new("/bin/sh"),
            &[OsString::from("my script.sh"), OsString::from("plain")],
        );
        assert_eq!(line, "/bin/sh 'my script.sh' plain");
    }

    #[test]
    fn test_bare_subject_name_is_not_resolved() {
        assert_eq!(resolve_subject(PathBuf::from("sh")), PathBuf::from("sh"));
    }

    #[test]
    fn test_subject_path_is_canonicalized() {
        let dir = tempfile::tempdir().unwrap();
        let subject = dir.path().join("minibash");
        std::fs::write(&subject, "").unwrap();
        let resolved = resolve_subject(subject.clone());
        assert!(resolved.is_absolute());
        assert!(resolved.ends_with("minibash"));
    }
}

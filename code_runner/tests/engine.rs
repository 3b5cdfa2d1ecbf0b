use code_runner::{ExecutionEngine, Invocation, LaunchContext, RunStatus, Runner};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use util::execution_config::ExecutionConfig;
use util::valgrind_report::{LeakVerdict, ValgrindProcessor};

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, body).expect("Failed to write script");
    path
}

fn quick_config() -> ExecutionConfig {
    let mut config = ExecutionConfig::default_config();
    config.execution.timeout_secs = 1;
    config.execution.session_timeout_secs = 1;
    config.execution.leak_timeout_secs = 5;
    config.execution.drain_millis = 200;
    config
}

#[tokio::test]
async fn test_script_stdout_is_captured() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(dir.path(), "001-echo.sh", "echo hello\necho oops 1>&2\nexit 3\n");

    let engine = ExecutionEngine::new("/bin/sh", &quick_config());
    let output = engine
        .run(&Invocation::Script(script), &LaunchContext::new())
        .await;

    assert_eq!(output.status, RunStatus::Exited);
    assert_eq!(output.stdout, "hello\n");
    assert_eq!(output.stderr, "oops\n");
    assert_eq!(output.exit_code, Some(3));
}

#[tokio::test]
async fn test_script_runs_in_its_own_directory() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("data.txt"), "from data\n").unwrap();
    let script = write_script(dir.path(), "002-cat.sh", "cat data.txt\n");

    let engine = ExecutionEngine::new("/bin/sh", &quick_config());
    let output = engine
        .run(&Invocation::Script(script), &LaunchContext::new())
        .await;

    assert_eq!(output.stdout, "from data\n");
}

#[tokio::test]
async fn test_timeout_kills_and_keeps_partial_output() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(dir.path(), "003-hang.sh", "echo before\nsleep 5\necho after\n");

    let engine = ExecutionEngine::new("/bin/sh", &quick_config());
    let output = engine
        .run(&Invocation::Script(script), &LaunchContext::new())
        .await;

    assert!(output.timed_out(), "status was {:?}", output.status);
    assert_eq!(output.status, RunStatus::TimedOut(Duration::from_secs(1)));
    assert_eq!(output.stdout, "before\n");
    assert!(output.elapsed < Duration::from_secs(4));
}

#[tokio::test]
async fn test_missing_subject_is_launch_failure() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(dir.path(), "004-any.sh", "echo hi\n");

    let engine = ExecutionEngine::new(dir.path().join("no-such-shell"), &quick_config());
    let output = engine
        .run(&Invocation::Script(script), &LaunchContext::new())
        .await;

    match output.status {
        RunStatus::LaunchFailed(message) => assert!(message.contains("no-such-shell")),
        other => panic!("expected launch failure, got {other:?}"),
    }
    assert!(output.stdout.is_empty());
}

#[tokio::test]
async fn test_session_captures_combined_output() {
    let invocation = Invocation::Session(vec![
        "# comment".to_string(),
        "echo first".to_string(),
        "".to_string(),
        "echo second 1>&2".to_string(),
    ]);

    let engine = ExecutionEngine::new("/bin/sh", &quick_config());
    let output = engine.run(&invocation, &LaunchContext::new()).await;

    assert_eq!(output.status, RunStatus::Exited);
    let runner = Runner::for_invocation(&invocation);
    assert_eq!(runner.captured(&output), "first\nsecond");
}

#[tokio::test]
async fn test_session_keeps_write_order_across_streams() {
    let mut commands = Vec::new();
    let mut written = Vec::new();
    for i in 0..200 {
        if i % 2 == 0 {
            commands.push(format!("echo out{i}"));
            written.push(format!("out{i}"));
        } else {
            commands.push(format!("echo err{i} 1>&2"));
            written.push(format!("err{i}"));
        }
    }
    let invocation = Invocation::Session(commands);

    let engine = ExecutionEngine::new("/bin/sh", &quick_config());
    let output = engine.run(&invocation, &LaunchContext::new()).await;

    assert_eq!(output.status, RunStatus::Exited);
    assert!(output.stderr.is_empty());
    let runner = Runner::for_invocation(&invocation);
    assert_eq!(runner.captured(&output), written.join("\n"));
}

#[cfg(target_os = "linux")]
/// Running means present in `/proc` and not a zombie.
fn is_running(pid: u32) -> bool {
    fs::read_to_string(format!("/proc/{pid}/stat"))
        .ok()
        .and_then(|stat| {
            stat.rsplit_once(')')
                .map(|(_, rest)| !rest.trim_start().starts_with('Z'))
        })
        .unwrap_or(false)
}

#[cfg(target_os = "linux")]
async fn wait_until_gone(pid: u32) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while is_running(pid) {
        if Instant::now() > deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    true
}

#[cfg(target_os = "linux")]
fn read_pid(path: &Path) -> u32 {
    fs::read_to_string(path)
        .expect("pid file written")
        .trim()
        .parse()
        .expect("numeric pid")
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_timeout_kills_everything_the_subject_started() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(
        dir.path(),
        "006-spawn.sh",
        "sleep 7777 &\necho $! > sleeper.pid\necho before\nsleep 7777\n",
    );

    let engine = ExecutionEngine::new("/bin/sh", &quick_config());
    let output = engine
        .run(&Invocation::Script(script), &LaunchContext::new())
        .await;

    assert!(output.timed_out(), "status was {:?}", output.status);
    assert_eq!(output.stdout, "before\n");
    let sleeper = read_pid(&dir.path().join("sleeper.pid"));
    assert!(wait_until_gone(sleeper).await, "process {sleeper} outlived the unit");
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_background_job_holding_output_is_killed_after_exit() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(
        dir.path(),
        "007-detach.sh",
        "sleep 7777 &\necho $! > sleeper.pid\necho done\n",
    );

    let engine = ExecutionEngine::new("/bin/sh", &quick_config());
    let output = engine
        .run(&Invocation::Script(script), &LaunchContext::new())
        .await;

    assert_eq!(output.status, RunStatus::Exited);
    assert_eq!(output.stdout, "done\n");
    let sleeper = read_pid(&dir.path().join("sleeper.pid"));
    assert!(wait_until_gone(sleeper).await, "process {sleeper} outlived the unit");
}

#[tokio::test]
async fn test_launch_context_env_reaches_subject() {
    let invocation = Invocation::Session(vec!["echo $GRADER_UNIT_TAG".to_string()]);
    let engine = ExecutionEngine::new("/bin/sh", &quick_config())
        .with_context(LaunchContext::new().with_env("GRADER_UNIT_TAG", "base"));

    let output = engine.run(&invocation, &LaunchContext::new()).await;
    assert_eq!(output.stdout, "base\n");

    let overridden = engine
        .run(&invocation, &LaunchContext::new().with_env("GRADER_UNIT_TAG", "unit"))
        .await;
    assert_eq!(overridden.stdout, "unit\n");
}

#[tokio::test]
async fn test_leak_checked_run_wraps_subject() {
    let dir = tempfile::tempdir().unwrap();
    let detector = write_script(
        dir.path(),
        "fake-detector.sh",
        "echo '==7== Memcheck, a memory error detector' 1>&2\n\
         \"$@\"\n\
         echo '==7== All heap blocks were freed -- no leaks are possible' 1>&2\n",
    );
    let script = write_script(dir.path(), "005-echo.sh", "echo wrapped\n");

    let mut config = quick_config();
    config.leak_check.detector = "/bin/sh".to_string();
    config.leak_check.args = vec![detector.to_string_lossy().into_owned()];

    let engine = ExecutionEngine::new("/bin/sh", &config);
    let output = engine
        .run_leak_checked(&Invocation::Script(script), &LaunchContext::new())
        .await;

    assert_eq!(output.status, RunStatus::Exited);
    assert!(output.combined.contains("wrapped"));
    assert_eq!(ValgrindProcessor::classify(&output.combined), LeakVerdict::Clean);
}

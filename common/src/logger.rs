use std::fs;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Splits `logs/grader.log` into the directory and file name used by the daily appender.
fn log_location(log_file: &str) -> (&Path, &str) {
    let path = Path::new(log_file);
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("logs"));
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("grader.log");
    (dir, name)
}

/// Installs the global subscriber: a daily rolling file plus, optionally, stdout.
///
/// Keep the returned guard alive until exit or buffered lines are lost.
pub fn init_logger(log_level: &str, log_file: &str, log_to_stdout: bool) -> WorkerGuard {
    let (dir, name) = log_location(log_file);
    fs::create_dir_all(dir).ok();

    let file_appender = rolling::daily(dir, name);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(true);

    let stdout_layer = log_to_stdout.then(|| {
        fmt::layer()
            .with_writer(std::io::stdout)
            .with_ansi(true)
            .with_target(true)
    });

    let env_filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();

    guard
}

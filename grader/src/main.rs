use colored::Colorize;
use common::config::HarnessConfig;
use common::logger::init_logger;
use marker::report::ConsoleSink;
use std::process::ExitCode;
use tracing::error;

#[tokio::main]
async fn main() -> ExitCode {
    // Load configuration and initialize logging
    let config = HarnessConfig::from_env();
    let _log_guard = init_logger(&config.log_level, &config.log_file, config.log_to_stdout);

    let mut sink = ConsoleSink::new(config.verbose);
    let result = grader::grade(&config, &mut sink).await;

    if let Err(e) = &result {
        error!("grading aborted: {e}");
        eprintln!("{} {e}", "error:".red().bold());
    }

    ExitCode::from(grader::exit_status(&result))
}

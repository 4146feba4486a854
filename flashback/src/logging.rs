use chrono::Local;
use log::{debug, error, info, warn};
use rustrc::client::CommandOutput;
use std::fmt::Display;
use std::io::Write;

/// Log to stderr, `info` and up unless `RUST_LOG` says otherwise.
pub fn init_logging() {
    let env = env_logger::Env::default().default_filter_or("info");

    // A second init (tests, embedding) keeps the first logger.
    let _ = env_logger::Builder::from_env(env)
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {} - {}",
                Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .try_init();
}

pub fn log_success<T: Display, U: Display>(operation: T, target: U) {
    info!("Successfully {}: {}", operation, target);
}

pub fn log_failure<T: Display, U: Display, E: Display>(operation: T, target: U, error: &E) {
    error!("Failed to {}: {}. Error: {}", operation, target, error);
}

pub fn log_output(output: &CommandOutput) {
    if !output.stdout.is_empty() {
        debug!("Stdout: {}", output.stdout_lossy());
    }
    if !output.stderr.is_empty() {
        warn!("Stderr: {}", output.stderr_lossy());
    }
}

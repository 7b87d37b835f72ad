use std::fs;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initializes logging: console output always, plus a daily-rolling JSON file
/// under `log_dir` when one is given.
pub fn init_logging(log_dir: Option<&str>) {
    // Respect RUST_LOG if set; otherwise default to info for our crate
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("firehose_nozzle=info,info"));

    // Console output goes to stderr so stdout carries only records and stats
    let console_layer = fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr);

    let file_layer = log_dir.and_then(|dir| {
        if let Err(e) = fs::create_dir_all(dir) {
            eprintln!("Failed to create log directory '{}': {}", dir, e);
            return None;
        }
        let file_appender = tracing_appender::rolling::daily(dir, "nozzle.log");
        let (non_blocking_writer, guard) = tracing_appender::non_blocking(file_appender);
        // The guard must outlive the process for buffered lines to flush
        std::mem::forget(guard);
        Some(fmt::layer().json().with_writer(non_blocking_writer))
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .init();
}

use std::fs::OpenOptions;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Env var holding the stderr filter directives (defaults to `info`)
pub const LOG_FILTER_ENV: &str = "INKWELL_LOG";

/// Env var naming a file that receives DEBUG-level logs
pub const LOG_FILE_ENV: &str = "INKWELL_LOG_FILE";

pub fn init_tracing() {
    let filter = std::env::var(LOG_FILTER_ENV).unwrap_or_else(|_| "info".to_string());
    init_tracing_with_filter(&filter);
}

/// Install the global subscriber: a stderr layer filtered by `directives`,
/// plus a DEBUG file layer when `INKWELL_LOG_FILE` is set. Calling this
/// twice is harmless; the second call is ignored.
pub fn init_tracing_with_filter(directives: &str) {
    let env_filter = EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(env_filter);

    let registry = tracing_subscriber::registry().with(stderr_layer);

    let file_layer = std::env::var(LOG_FILE_ENV).ok().and_then(|log_path| {
        match OpenOptions::new().create(true).append(true).open(&log_path) {
            Ok(file) => {
                eprintln!("File logging enabled: {}", log_path);
                Some(
                    fmt::layer()
                        .with_writer(file)
                        .with_ansi(false)
                        .with_target(true)
                        .with_thread_ids(true)
                        .with_filter(tracing_subscriber::filter::LevelFilter::DEBUG),
                )
            }
            Err(e) => {
                eprintln!("Failed to open log file {}: {}", log_path, e);
                None
            }
        }
    });

    let _ = registry.with(file_layer).try_init();
}

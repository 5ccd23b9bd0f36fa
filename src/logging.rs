use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::LogConfig;

const LOG_FILE_PREFIX: &str = "oversessions.log";

/// Install the global subscriber.
///
/// Logs go to the console, and also to a daily file when `config.dir` is
/// set. Keep the returned guard alive for the life of the process so the
/// file writer flushes.
pub fn init_logging(config: &LogConfig) -> Option<WorkerGuard> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("{},hyper=warn,reqwest=warn", config.level))
    });

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr);

    let (file_layer, guard) = match &config.dir {
        Some(dir) => {
            if let Err(e) = std::fs::create_dir_all(dir) {
                eprintln!("Warning: Failed to create log directory {}: {}", dir, e);
            }
            let file_appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
            let layer = fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .with_ansi(false)
                .with_writer(file_writer)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    tracing::info!("oversessions version: {}", env!("CARGO_PKG_VERSION"));
    if let Some(dir) = &config.dir {
        tracing::info!("Logging initialized, log directory: {}", dir);
    }

    guard
}

use crate::modules::logger::LocalTimer;
use crate::modules::settings::cli::SETTINGS;
use crate::modules::settings::dir::DATA_DIR_MANAGER;
use std::sync::OnceLock;
use tracing::level_filters::LevelFilter;
use tracing::Level;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;

pub static LOG_WORKER_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

#[derive(Debug)]
pub enum FileLoggerError {
    Appender(InitError),
    Subscriber(tracing::dispatcher::SetGlobalDefaultError),
}

impl std::fmt::Display for FileLoggerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileLoggerError::Appender(e) => write!(f, "rolling file appender: {}", e),
            FileLoggerError::Subscriber(e) => write!(f, "{}", e),
        }
    }
}

pub fn setup_file_logger(level: Level) -> Result<(), FileLoggerError> {
    let with_ansi = SETTINGS.gateway_ansi_logs;

    let (server_nonb, server_guard) = server_log_writer().map_err(FileLoggerError::Appender)?;
    // Keeps the background writer alive for the whole process.
    let _ = LOG_WORKER_GUARD.set(server_guard);

    let server_layer = fmt::layer()
        .with_timer(LocalTimer)
        .with_ansi(with_ansi)
        .with_level(true)
        .with_writer(server_nonb)
        .with_target(true);

    let subscriber = tracing_subscriber::registry()
        .with(LevelFilter::from_level(level))
        .with(server_layer);

    tracing::subscriber::set_global_default(subscriber).map_err(FileLoggerError::Subscriber)
}

fn server_log_writer() -> Result<(NonBlocking, WorkerGuard), InitError> {
    let rolling = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("gateway")
        .max_log_files(SETTINGS.gateway_max_server_log_files)
        .build(DATA_DIR_MANAGER.log_dir.clone())?;
    Ok(tracing_appender::non_blocking(rolling))
}

//! Logging setup, span naming and secret redaction.
//!
//! Structured spans are emitted around the operations that talk to the
//! network: a chat stream, a backend API call, realtime session setup.
//! Use the helpers in [`spans`] for consistent names. Wrap credentials in
//! [`RedactedString`](redact::RedactedString) before they can reach a log line.

pub mod redact;
pub mod spans;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LoggingConfig;

/// Keeps the non-blocking file writer alive; drop it on shutdown to flush.
pub type LogGuard = tracing_appender::non_blocking::WorkerGuard;

/// Initialise the global tracing subscriber.
///
/// Console output goes to stderr so stdout stays clean for transcript text.
/// `RUST_LOG` wins over `config.level`. When `config.file` is set a daily
/// rotated file is written under [`crate::app_dirs::logs_dir`] and the
/// returned guard must be held for the lifetime of the process.
pub fn init_logging(config: &LoggingConfig) -> Option<LogGuard> {
    let filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level))
    };

    let console = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    if config.file {
        let appender = tracing_appender::rolling::daily(crate::app_dirs::logs_dir(), "devochat.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let file = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(writer);
        let result = tracing_subscriber::registry()
            .with(filter())
            .with(console)
            .with(file)
            .try_init();
        if result.is_err() {
            tracing::debug!("tracing subscriber already initialised");
        }
        return Some(guard);
    }

    if tracing_subscriber::registry()
        .with(filter())
        .with(console)
        .try_init()
        .is_err()
    {
        tracing::debug!("tracing subscriber already initialised");
    }
    None
}

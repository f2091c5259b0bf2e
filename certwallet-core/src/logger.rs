use std::sync::{Arc, OnceLock};

/// Trait representing a sink for the log records of this crate.
///
/// Implemented by the host application and registered once with [`set_logger`].
/// With the `ffi` feature it is exported via `UniFFI` for use in foreign languages.
///
/// # Examples
///
/// ```rust
/// use certwallet_core::logger::{LogLevel, Logger};
///
/// struct StderrLogger;
///
/// impl Logger for StderrLogger {
///     fn log(&self, level: LogLevel, message: String) {
///         eprintln!("[{level:?}] {message}");
///     }
/// }
/// ```
///
/// ## Kotlin
///
/// ```kotlin
/// object WalletLogger : Logger {
///     override fun log(level: LogLevel, message: String) {
///         Timber.tag("certwallet").log(level.toPriority(), message)
///     }
/// }
///
/// setLogger(WalletLogger) // once, at application start
/// ```
#[cfg_attr(feature = "ffi", uniffi::export(with_foreign))]
pub trait Logger: Sync + Send {
    /// Logs a message at the specified log level.
    fn log(&self, level: LogLevel, message: String);
}

/// Severity of a forwarded log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum LogLevel {
    /// Very low priority, often extremely detailed messages.
    Trace,
    /// Task lifecycle and other debugging information.
    Debug,
    /// Informational messages.
    Info,
    /// Failures the coordinator recovered from.
    Warn,
    /// Errors.
    Error,
}

/// Forwards `log` records to the registered [`Logger`].
struct ForeignLogger;

impl log::Log for ForeignLogger {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        if !should_forward(record.level(), record.module_path()) {
            return;
        }

        if let Some(logger) = LOGGER_INSTANCE.get() {
            logger.log(log_level(record.level()), format!("{}", record.args()));
        } else {
            eprintln!("Logger not set: {}", record.args());
        }
    }

    fn flush(&self) {}
}

/// Debug and trace records are only forwarded when they come from this crate.
fn should_forward(level: log::Level, module_path: Option<&str>) -> bool {
    let is_own_record = module_path.is_some_and(|path| path.starts_with("certwallet"));
    let is_debug_or_trace = level == log::Level::Debug || level == log::Level::Trace;
    is_own_record || !is_debug_or_trace
}

const fn log_level(level: log::Level) -> LogLevel {
    match level {
        log::Level::Error => LogLevel::Error,
        log::Level::Warn => LogLevel::Warn,
        log::Level::Info => LogLevel::Info,
        log::Level::Debug => LogLevel::Debug,
        log::Level::Trace => LogLevel::Trace,
    }
}

static LOGGER_INSTANCE: OnceLock<Arc<dyn Logger>> = OnceLock::new();

/// Sets the global logger.
///
/// Only the first call has an effect; later calls print a notice and return.
#[cfg_attr(feature = "ffi", uniffi::export)]
pub fn set_logger(logger: Arc<dyn Logger>) {
    if LOGGER_INSTANCE.set(logger).is_err() {
        println!("Logger already set");
        return;
    }

    if let Err(e) = init_logger() {
        eprintln!("Failed to set logger: {e}");
    }
}

fn init_logger() -> Result<(), log::SetLoggerError> {
    static LOGGER: ForeignLogger = ForeignLogger;
    log::set_logger(&LOGGER)?;
    log::set_max_level(log::LevelFilter::Trace);
    Ok(())
}

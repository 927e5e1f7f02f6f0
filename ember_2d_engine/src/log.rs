//! Internal logging system for Ember2D Engine
//!
//! The engine and its renderer backends log through one pluggable sink:
//! a `Logger` installed on the engine singleton receives every entry, and
//! `DefaultLogger` prints them colored to the console. ERROR entries carry
//! their call site so device loss and swapchain failures are traceable.

use colored::*;
use std::time::SystemTime;
use chrono::{DateTime, Local};

/// Sink that receives every engine log entry
///
/// Implement this to redirect engine output (capture buffer in tests,
/// file sink, in-game console).
///
/// # Example
///
/// ```no_run
/// use ember_2d_engine::ember2d::log::{Logger, LogEntry};
///
/// struct StderrLogger;
///
/// impl Logger for StderrLogger {
///     fn log(&self, entry: &LogEntry) {
///         eprintln!("[{:?}] {}", entry.severity, entry.message);
///     }
/// }
/// ```
pub trait Logger: Send + Sync {
    /// Process one entry
    fn log(&self, entry: &LogEntry);
}

/// One log message with its metadata
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub severity: LogSeverity,

    /// When the message was logged
    pub timestamp: SystemTime,

    /// Emitting subsystem (e.g. "ember2d::Engine", "ember2d::vulkan")
    pub source: String,

    pub message: String,

    /// Call-site file, present on detailed ERROR entries
    pub file: Option<&'static str>,

    /// Call-site line, present on detailed ERROR entries
    pub line: Option<u32>,
}

/// Severity attached to every log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogSeverity {
    /// Per-frame noise, off in release builds
    Trace,

    /// Development diagnostics (swapchain recreation, cache compiles)
    Debug,

    /// Lifecycle events worth keeping in release logs
    Info,

    /// Something is off but the frame can continue
    Warn,

    /// Failures, logged with file:line
    Error,
}

/// Console logger used when no custom logger is installed
///
/// Colors: Trace gris (bright_black), Debug cyan, Info vert (green),
/// Warn jaune (yellow), Error rouge gras (red + bold).
///
/// Prints `[timestamp] [SEVERITY] [source] message`, with ` (file:line)`
/// appended for detailed ERROR entries.
pub struct DefaultLogger;

impl Logger for DefaultLogger {
    fn log(&self, entry: &LogEntry) {
        let datetime: DateTime<Local> = entry.timestamp.into();
        let timestamp = datetime.format("%Y-%m-%d %H:%M:%S%.3f");

        // Severity strings padded to equal width
        let severity_str = match entry.severity {
            LogSeverity::Trace => "TRACE".bright_black(),
            LogSeverity::Debug => "DEBUG".cyan(),
            LogSeverity::Info => "INFO ".green(),
            LogSeverity::Warn => "WARN ".yellow(),
            LogSeverity::Error => "ERROR".red().bold(),
        };

        let source = entry.source.bright_blue();

        if let (Some(file), Some(line)) = (entry.file, entry.line) {
            println!(
                "[{}] [{}] [{}] {} ({}:{})",
                timestamp, severity_str, source, entry.message, file, line
            );
        } else {
            println!("[{}] [{}] [{}] {}", timestamp, severity_str, source, entry.message);
        }
    }
}

// ===== LOG MACROS =====

/// Log a TRACE message (per-frame verbosity)
///
/// # Example
///
/// ```no_run
/// use ember_2d_engine::engine_trace;
///
/// engine_trace!("ember2d::Engine", "Entering frame loop");
/// ```
#[macro_export]
macro_rules! engine_trace {
    ($source:expr, $($arg:tt)*) => {
        $crate::ember2d::Engine::log(
            $crate::ember2d::log::LogSeverity::Trace,
            $source,
            format!($($arg)*)
        )
    };
}

/// Log a DEBUG message (development diagnostics)
///
/// # Example
///
/// ```no_run
/// use ember_2d_engine::engine_debug;
///
/// # let count = 3;
/// engine_debug!("ember2d::Engine", "Initialized with {} subsystems", count);
/// ```
#[macro_export]
macro_rules! engine_debug {
    ($source:expr, $($arg:tt)*) => {
        $crate::ember2d::Engine::log(
            $crate::ember2d::log::LogSeverity::Debug,
            $source,
            format!($($arg)*)
        )
    };
}

/// Log an INFO message (lifecycle events)
///
/// # Example
///
/// ```no_run
/// use ember_2d_engine::engine_info;
///
/// engine_info!("ember2d::Engine", "Graphics backend initialized successfully");
/// ```
#[macro_export]
macro_rules! engine_info {
    ($source:expr, $($arg:tt)*) => {
        $crate::ember2d::Engine::log(
            $crate::ember2d::log::LogSeverity::Info,
            $source,
            format!($($arg)*)
        )
    };
}

/// Log a WARN message (recoverable problems)
///
/// # Example
///
/// ```no_run
/// use ember_2d_engine::engine_warn;
///
/// # let fps = 24;
/// engine_warn!("ember2d::Engine", "Performance warning: {} FPS", fps);
/// ```
#[macro_export]
macro_rules! engine_warn {
    ($source:expr, $($arg:tt)*) => {
        $crate::ember2d::Engine::log(
            $crate::ember2d::log::LogSeverity::Warn,
            $source,
            format!($($arg)*)
        )
    };
}

/// Log an ERROR message, capturing the call site with file!/line!
///
/// # Example
///
/// ```no_run
/// use ember_2d_engine::engine_error;
///
/// # let error = "surface lost";
/// engine_error!("ember2d::Engine", "Failed to initialize: {}", error);
/// ```
#[macro_export]
macro_rules! engine_error {
    ($source:expr, $($arg:tt)*) => {
        $crate::ember2d::Engine::log_detailed(
            $crate::ember2d::log::LogSeverity::Error,
            $source,
            format!($($arg)*),
            file!(),
            line!()
        )
    };
}

/// Log an ERROR message and produce a `BackendError` with the same text
///
/// Evaluates to the error value, so it slots into `map_err`/`ok_or_else`
/// closures and `Err(...)` expressions.
///
/// # Example
///
/// ```no_run
/// use ember_2d_engine::engine_err;
///
/// # fn wait_idle() -> Result<(), i32> { Ok(()) }
/// # fn demo() -> ember_2d_engine::ember2d::Result<()> {
/// wait_idle().map_err(|e| engine_err!("ember2d::vulkan", "Wait idle failed: {:?}", e))?;
/// # Ok(())
/// # }
/// ```
#[macro_export]
macro_rules! engine_err {
    ($source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::ember2d::Engine::log_detailed(
            $crate::ember2d::log::LogSeverity::Error,
            $source,
            message.clone(),
            file!(),
            line!()
        );
        $crate::ember2d::Error::BackendError(message)
    }};
}

/// Log an ERROR message and return early with `Err(BackendError)`
///
/// # Example
///
/// ```no_run
/// use ember_2d_engine::engine_bail;
///
/// # fn choose(formats: &[u32]) -> ember_2d_engine::ember2d::Result<u32> {
/// if formats.is_empty() {
///     engine_bail!("ember2d::vulkan", "Surface reports no formats");
/// }
/// # Ok(formats[0])
/// # }
/// ```
#[macro_export]
macro_rules! engine_bail {
    ($source:expr, $($arg:tt)*) => {
        return Err($crate::engine_err!($source, $($arg)*))
    };
}

#[cfg(test)]
#[path = "log_tests.rs"]
mod tests;

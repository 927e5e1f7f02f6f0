//! Unit tests for log.rs
//!
//! Covers LogSeverity ordering, LogEntry construction and cloning, the
//! DefaultLogger output branches, and the error-producing macros.

use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};
use crate::ember2d::{Engine, Error, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;
use serial_test::serial;

fn plain_entry(severity: LogSeverity, message: &str) -> LogEntry {
    LogEntry {
        severity,
        timestamp: SystemTime::now(),
        source: "ember2d::test".to_string(),
        message: message.to_string(),
        file: None,
        line: None,
    }
}

fn located_entry(severity: LogSeverity, message: &str, file: &'static str, line: u32) -> LogEntry {
    LogEntry {
        file: Some(file),
        line: Some(line),
        ..plain_entry(severity, message)
    }
}

// ============================================================================
// LOG SEVERITY TESTS
// ============================================================================

#[test]
fn test_severity_sorts_from_trace_to_error() {
    let mut severities = [
        LogSeverity::Error,
        LogSeverity::Trace,
        LogSeverity::Warn,
        LogSeverity::Debug,
        LogSeverity::Info,
    ];
    severities.sort();

    assert_eq!(
        severities,
        [
            LogSeverity::Trace,
            LogSeverity::Debug,
            LogSeverity::Info,
            LogSeverity::Warn,
            LogSeverity::Error,
        ]
    );
}

#[test]
fn test_severity_comparisons() {
    assert!(LogSeverity::Trace < LogSeverity::Error);
    assert!(LogSeverity::Warn > LogSeverity::Info);
    assert_eq!(LogSeverity::Debug, LogSeverity::Debug);
    assert_ne!(LogSeverity::Warn, LogSeverity::Error);
}

#[test]
fn test_severity_debug_names() {
    let rendered: Vec<String> = [
        LogSeverity::Trace,
        LogSeverity::Debug,
        LogSeverity::Info,
        LogSeverity::Warn,
        LogSeverity::Error,
    ]
    .iter()
    .map(|severity| format!("{:?}", severity))
    .collect();

    assert_eq!(rendered, ["Trace", "Debug", "Info", "Warn", "Error"]);
}

// ============================================================================
// LOG ENTRY TESTS
// ============================================================================

#[test]
fn test_entry_without_call_site() {
    let entry = plain_entry(LogSeverity::Info, "graphics created");

    assert_eq!(entry.severity, LogSeverity::Info);
    assert_eq!(entry.source, "ember2d::test");
    assert_eq!(entry.message, "graphics created");
    assert!(entry.file.is_none());
    assert!(entry.line.is_none());
}

#[test]
fn test_entry_with_call_site() {
    let entry = located_entry(LogSeverity::Error, "fence timed out", "vulkan_frame.rs", 58);

    assert_eq!(entry.severity, LogSeverity::Error);
    assert_eq!(entry.file, Some("vulkan_frame.rs"));
    assert_eq!(entry.line, Some(58));
}

#[test]
fn test_entry_clone_keeps_every_field() {
    let original = located_entry(LogSeverity::Warn, "suboptimal swapchain", "vulkan.rs", 610);
    let copy = original.clone();

    assert_eq!(copy.severity, original.severity);
    assert_eq!(copy.source, original.source);
    assert_eq!(copy.message, original.message);
    assert_eq!(copy.file, original.file);
    assert_eq!(copy.line, original.line);
}

#[test]
fn test_entry_timestamps_advance() {
    let first = plain_entry(LogSeverity::Info, "frame 1");
    std::thread::sleep(std::time::Duration::from_millis(10));
    let second = plain_entry(LogSeverity::Info, "frame 2");

    assert!(second.timestamp > first.timestamp);
}

// ============================================================================
// DEFAULT LOGGER TESTS
// ============================================================================

#[test]
fn test_default_logger_prints_every_severity() {
    // Exercises each color branch; output goes to the test console
    let logger = DefaultLogger;
    for severity in [
        LogSeverity::Trace,
        LogSeverity::Debug,
        LogSeverity::Info,
        LogSeverity::Warn,
        LogSeverity::Error,
    ] {
        logger.log(&plain_entry(severity, "console output check"));
    }
}

#[test]
fn test_default_logger_prints_call_site() {
    // The file:line suffix branch
    DefaultLogger.log(&located_entry(
        LogSeverity::Error,
        "swapchain acquire failed",
        "vulkan.rs",
        601,
    ));
}

#[test]
fn test_default_logger_is_send_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<DefaultLogger>();
}

// ============================================================================
// LOGGER TRAIT TESTS
// ============================================================================

/// Counts calls without looking at the entry
struct TallyLogger {
    calls: Arc<AtomicUsize>,
}

impl Logger for TallyLogger {
    fn log(&self, _entry: &LogEntry) {
        self.calls.fetch_add(1, Ordering::Relaxed);
    }
}

#[test]
fn test_logger_works_as_trait_object() {
    let calls = Arc::new(AtomicUsize::new(0));
    let boxed: Box<dyn Logger> = Box::new(TallyLogger {
        calls: calls.clone(),
    });

    boxed.log(&plain_entry(LogSeverity::Info, "first"));
    boxed.log(&plain_entry(LogSeverity::Debug, "second"));

    assert_eq!(calls.load(Ordering::Relaxed), 2);
}

// ============================================================================
// ERROR MACRO TESTS
// ============================================================================

/// Captures entries so the error macros' logging side effect is observable
struct CapturingLogger {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl Logger for CapturingLogger {
    fn log(&self, entry: &LogEntry) {
        self.entries.lock().unwrap().push(entry.clone());
    }
}

fn install_capturing_logger() -> Arc<Mutex<Vec<LogEntry>>> {
    let entries = Arc::new(Mutex::new(Vec::new()));
    Engine::set_logger(CapturingLogger {
        entries: entries.clone(),
    });
    entries
}

#[test]
#[serial]
fn test_engine_err_macro_produces_backend_error() {
    let entries = install_capturing_logger();

    let error = crate::engine_err!("ember2d::test", "device lost: {}", 7);

    match error {
        Error::BackendError(msg) => assert_eq!(msg, "device lost: 7"),
        other => panic!("Expected BackendError, got {:?}", other),
    }

    // The macro logs before producing the error
    {
        let captured = entries.lock().unwrap();
        assert_eq!(captured.len(), 1);
        assert_eq!(captured[0].severity, LogSeverity::Error);
        assert_eq!(captured[0].message, "device lost: 7");
        assert!(captured[0].file.is_some());
        assert!(captured[0].line.is_some());
    }

    Engine::reset_logger();
}

#[test]
#[serial]
fn test_engine_err_macro_in_map_err() {
    let entries = install_capturing_logger();

    let result: Result<()> =
        Err("boom").map_err(|e| crate::engine_err!("ember2d::test", "operation failed: {}", e));

    assert!(result.is_err());
    {
        let captured = entries.lock().unwrap();
        assert_eq!(captured.len(), 1);
        assert!(captured[0].message.contains("boom"));
    }

    Engine::reset_logger();
}

#[test]
#[serial]
fn test_engine_bail_macro_returns_early() {
    let entries = install_capturing_logger();

    fn fallible(fail: bool) -> Result<u32> {
        if fail {
            crate::engine_bail!("ember2d::test", "bailing out");
        }
        Ok(99)
    }

    assert_eq!(fallible(false).unwrap(), 99);

    match fallible(true) {
        Err(Error::BackendError(msg)) => assert_eq!(msg, "bailing out"),
        other => panic!("Expected BackendError, got {:?}", other),
    }

    // Only the failing call logs
    {
        let captured = entries.lock().unwrap();
        assert_eq!(captured.len(), 1);
    }

    Engine::reset_logger();
}

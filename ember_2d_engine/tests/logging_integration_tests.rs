//! Integration tests for the engine logging system
//!
//! Exercises logger installation, the log macros, and call-site capture
//! the way the graphics backends use them. No GPU required.
//!
//! Run with: cargo test --test logging_integration_tests

use ember_2d_engine::ember2d::log::{LogEntry, LogSeverity, Logger};
use ember_2d_engine::ember2d::Engine;
use ember_2d_engine::{engine_err, engine_info, engine_warn};
use serial_test::serial;
use std::sync::{Arc, Mutex};

// ============================================================================
// TEST LOGGER IMPLEMENTATION
// ============================================================================

/// Logger that records every entry it receives
struct CapturingLogger {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl CapturingLogger {
    fn install() -> Arc<Mutex<Vec<LogEntry>>> {
        let entries = Arc::new(Mutex::new(Vec::new()));
        Engine::set_logger(CapturingLogger { entries: entries.clone() });
        entries
    }
}

impl Logger for CapturingLogger {
    fn log(&self, entry: &LogEntry) {
        self.entries.lock().unwrap().push(entry.clone());
    }
}

// ============================================================================
// LOGGING TESTS
// ============================================================================

#[test]
#[serial]
fn test_integration_custom_logger_receives_entries() {
    let entries = CapturingLogger::install();

    Engine::log(
        LogSeverity::Info,
        "ember2d::vulkan",
        "Using device: llvmpipe".to_string(),
    );
    Engine::log(
        LogSeverity::Warn,
        "ember2d::vulkan",
        "Swapchain suboptimal, recreating".to_string(),
    );

    let captured = entries.lock().unwrap();
    assert_eq!(captured.len(), 2);

    assert_eq!(captured[0].severity, LogSeverity::Info);
    assert_eq!(captured[0].source, "ember2d::vulkan");
    assert_eq!(captured[0].message, "Using device: llvmpipe");
    // Plain logs carry no call site
    assert_eq!(captured[0].file, None);
    assert_eq!(captured[0].line, None);

    assert_eq!(captured[1].severity, LogSeverity::Warn);
    assert_eq!(captured[1].message, "Swapchain suboptimal, recreating");

    drop(captured);
    Engine::reset_logger();
}

#[test]
#[serial]
fn test_integration_detailed_log_keeps_location() {
    let entries = CapturingLogger::install();

    Engine::log_detailed(
        LogSeverity::Error,
        "ember2d::vulkan",
        "failed to acquire swap chain image".to_string(),
        "vulkan.rs",
        601,
    );

    let captured = entries.lock().unwrap();
    assert_eq!(captured.len(), 1);
    let entry = &captured[0];
    assert_eq!(entry.severity, LogSeverity::Error);
    assert_eq!(entry.source, "ember2d::vulkan");
    assert_eq!(entry.message, "failed to acquire swap chain image");
    assert_eq!(entry.file, Some("vulkan.rs"));
    assert_eq!(entry.line, Some(601));

    drop(captured);
    Engine::reset_logger();
}

#[test]
#[serial]
fn test_integration_reset_detaches_custom_logger() {
    let entries = CapturingLogger::install();

    Engine::log(LogSeverity::Debug, "ember2d", "before reset".to_string());
    assert_eq!(entries.lock().unwrap().len(), 1);

    Engine::reset_logger();

    // Goes to the default logger now, not to the capture buffer
    Engine::log(LogSeverity::Debug, "ember2d", "after reset".to_string());
    assert_eq!(entries.lock().unwrap().len(), 1);
}

#[test]
#[serial]
fn test_integration_all_severities_pass_through() {
    let entries = CapturingLogger::install();

    let severities = [
        LogSeverity::Trace,
        LogSeverity::Debug,
        LogSeverity::Info,
        LogSeverity::Warn,
        LogSeverity::Error,
    ];
    for severity in severities {
        Engine::log(severity, "ember2d::frame", format!("{:?} level", severity));
    }

    let captured = entries.lock().unwrap();
    assert_eq!(captured.len(), severities.len());
    for (entry, severity) in captured.iter().zip(severities) {
        assert_eq!(entry.severity, severity);
        assert_eq!(entry.source, "ember2d::frame");
    }

    drop(captured);
    Engine::reset_logger();
}

#[test]
#[serial]
fn test_integration_log_macros_from_consumer() {
    // Verify the exported macros work from outside the crate
    let entries = CapturingLogger::install();

    engine_info!("app::startup", "Window created: {}x{}", 800, 600);
    engine_warn!("app::startup", "No preferred present mode");
    let err = engine_err!("app::startup", "Device lost: {}", "code 4");

    // The error macro both logs and produces an Error value
    assert_eq!(format!("{}", err), "Backend error: Device lost: code 4");

    let captured = entries.lock().unwrap();
    assert_eq!(captured.len(), 3);

    assert_eq!(captured[0].severity, LogSeverity::Info);
    assert_eq!(captured[0].message, "Window created: 800x600");

    assert_eq!(captured[1].severity, LogSeverity::Warn);

    // Errors carry their call site location
    assert_eq!(captured[2].severity, LogSeverity::Error);
    assert_eq!(captured[2].message, "Device lost: code 4");
    assert!(captured[2].file.is_some());
    assert!(captured[2].line.is_some());

    drop(captured);
    Engine::reset_logger();
}

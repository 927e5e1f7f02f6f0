//! Unit tests for validation message filtering and grouping
//!
//! The callback itself needs a live messenger, but its filter predicates
//! and the message tracker are plain logic.

use ash::vk;

use super::{
    category_passes, severity_passes, DebugMessageFilter, DebugSeverity, MessageTracker,
    ValidationStats,
};

// ============================================================================
// Severity Filter
// ============================================================================

#[test]
fn test_errors_only_filter() {
    let filter = DebugSeverity::ErrorsOnly;

    assert!(severity_passes(
        filter,
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
    ));
    assert!(!severity_passes(
        filter,
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
    ));
    assert!(!severity_passes(
        filter,
        vk::DebugUtilsMessageSeverityFlagsEXT::INFO
    ));
    assert!(!severity_passes(
        filter,
        vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
    ));
}

#[test]
fn test_errors_and_warnings_filter() {
    let filter = DebugSeverity::ErrorsAndWarnings;

    assert!(severity_passes(
        filter,
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
    ));
    assert!(severity_passes(
        filter,
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
    ));
    assert!(!severity_passes(
        filter,
        vk::DebugUtilsMessageSeverityFlagsEXT::INFO
    ));
}

#[test]
fn test_all_filter_passes_everything() {
    let filter = DebugSeverity::All;

    assert!(severity_passes(
        filter,
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
    ));
    assert!(severity_passes(
        filter,
        vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
    ));
}

// ============================================================================
// Category Filter
// ============================================================================

#[test]
fn test_category_filter_routes_by_type() {
    let filter = DebugMessageFilter {
        show_validation: true,
        show_performance: false,
        show_general: false,
    };

    assert!(category_passes(
        &filter,
        vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
    ));
    assert!(!category_passes(
        &filter,
        vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE
    ));
    assert!(!category_passes(
        &filter,
        vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
    ));
}

#[test]
fn test_default_filter_shows_all_categories() {
    let filter = DebugMessageFilter::default();

    assert!(category_passes(
        &filter,
        vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
    ));
    assert!(category_passes(
        &filter,
        vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE
    ));
    assert!(category_passes(
        &filter,
        vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
    ));
}

// ============================================================================
// Message Tracker
// ============================================================================

#[test]
fn test_message_tracker_counts_repeats() {
    let mut tracker = MessageTracker::new();

    assert_eq!(tracker.track_message("a"), 1);
    assert_eq!(tracker.track_message("a"), 2);
    assert_eq!(tracker.track_message("a"), 3);
}

#[test]
fn test_message_tracker_keys_by_content() {
    let mut tracker = MessageTracker::new();

    tracker.track_message("first");
    assert_eq!(tracker.track_message("second"), 1);
    assert_eq!(tracker.track_message("first"), 2);
}

// ============================================================================
// Statistics
// ============================================================================

#[test]
fn test_total_sums_all_severities() {
    let stats = ValidationStats {
        errors: 1,
        warnings: 2,
        info: 3,
        verbose: 4,
    };

    assert_eq!(stats.total(), 10);
}

#[test]
fn test_empty_stats_total_is_zero() {
    assert_eq!(ValidationStats::default().total(), 0);
}

/// Vulkan validation messenger
///
/// Callback installed when validation is enabled. Messages are filtered,
/// counted, and routed into the engine log; identical messages carry a
/// repetition counter so a chatty layer does not flood the output.

use ash::vk;
use colored::*;
use rustc_hash::FxHashMap;
use std::ffi::CStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use ember_2d_engine::{engine_error, engine_info, engine_trace, engine_warn};

const LOG_SOURCE: &str = "ember2d::vulkan::validation";

/// Configuration the callback consults on every message
static ACTIVE_CONFIG: Mutex<Option<DebugConfig>> = Mutex::new(None);

/// Per-severity counters bumped by the callback
static MESSAGE_COUNTS: ValidationStatsTracker = ValidationStatsTracker::new();

/// How many times each distinct message text has fired
static REPEAT_TRACKER: Mutex<Option<MessageTracker>> = Mutex::new(None);

/// Minimum severity a message must have to reach the log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugSeverity {
    ErrorsOnly,
    ErrorsAndWarnings,
    All,
}

/// Which message categories reach the log
#[derive(Debug, Clone, Copy)]
pub struct DebugMessageFilter {
    pub show_validation: bool,
    pub show_performance: bool,
    pub show_general: bool,
}

impl Default for DebugMessageFilter {
    fn default() -> Self {
        Self {
            show_validation: true,
            show_performance: true,
            show_general: true,
        }
    }
}

/// What the installed callback lets through
#[derive(Clone)]
pub struct DebugConfig {
    pub severity: DebugSeverity,
    pub message_filter: DebugMessageFilter,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            severity: DebugSeverity::ErrorsAndWarnings,
            message_filter: DebugMessageFilter::default(),
        }
    }
}

/// Counts of validation messages seen since the messenger was installed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationStats {
    pub errors: u32,
    pub warnings: u32,
    pub info: u32,
    pub verbose: u32,
}

impl ValidationStats {
    pub fn total(&self) -> u32 {
        self.errors + self.warnings + self.info + self.verbose
    }
}

/// Atomic counter per severity bucket, indexable from the callback
struct ValidationStatsTracker {
    counts: [AtomicU32; 4],
}

impl ValidationStatsTracker {
    const ERROR: usize = 0;
    const WARNING: usize = 1;
    const INFO: usize = 2;
    const VERBOSE: usize = 3;

    const fn new() -> Self {
        Self {
            counts: [
                AtomicU32::new(0),
                AtomicU32::new(0),
                AtomicU32::new(0),
                AtomicU32::new(0),
            ],
        }
    }

    fn bump(&self, bucket: usize) {
        self.counts[bucket].fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> ValidationStats {
        let load = |bucket: usize| self.counts[bucket].load(Ordering::Relaxed);
        ValidationStats {
            errors: load(Self::ERROR),
            warnings: load(Self::WARNING),
            info: load(Self::INFO),
            verbose: load(Self::VERBOSE),
        }
    }

    fn reset(&self) {
        for counter in &self.counts {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// Occurrence counts keyed by message text
struct MessageTracker {
    messages: FxHashMap<String, u32>,
}

impl MessageTracker {
    fn new() -> Self {
        Self {
            messages: FxHashMap::default(),
        }
    }

    fn track_message(&mut self, message: &str) -> u32 {
        let seen = self.messages.entry(message.to_string()).or_default();
        *seen += 1;
        *seen
    }
}

/// Install the callback configuration and reset counters
pub fn init_debug_config(config: DebugConfig) {
    MESSAGE_COUNTS.reset();
    *REPEAT_TRACKER.lock().unwrap() = Some(MessageTracker::new());
    *ACTIVE_CONFIG.lock().unwrap() = Some(config);
}

/// Tear down the callback configuration
///
/// Late messages arriving after this (the messenger is destroyed right
/// after) are silently dropped.
pub fn cleanup_debug_config() {
    *ACTIVE_CONFIG.lock().unwrap() = None;
    *REPEAT_TRACKER.lock().unwrap() = None;
}

/// Snapshot of the per-severity message counters
pub fn get_validation_stats() -> ValidationStats {
    MESSAGE_COUNTS.snapshot()
}

/// Print a summary of validation messages seen this run
pub fn print_validation_stats_report() {
    let stats = get_validation_stats();

    if stats.total() == 0 {
        println!("{}", "Vulkan validation: no messages".green());
        return;
    }

    println!("{}", "=== Vulkan validation summary ===".bright_blue().bold());

    let rows: [(ColoredString, u32); 4] = [
        ("Errors:".red().bold(), stats.errors),
        ("Warnings:".yellow().bold(), stats.warnings),
        ("Info:".cyan(), stats.info),
        ("Verbose:".bright_black(), stats.verbose),
    ];
    for (label, count) in rows {
        if count > 0 {
            println!("  {} {}", label, count);
        }
    }

    println!("  {} {}", "Total:".white().bold(), stats.total());

    let tracker_guard = REPEAT_TRACKER.lock().unwrap();
    if let Some(tracker) = tracker_guard.as_ref() {
        let repeated = tracker.messages.values().filter(|&&seen| seen > 1).count();
        if repeated > 0 {
            println!("  {} message(s) appeared more than once", repeated);
        }
    }
}

fn severity_passes(filter: DebugSeverity, severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> bool {
    use vk::DebugUtilsMessageSeverityFlagsEXT as Sev;
    match filter {
        DebugSeverity::ErrorsOnly => severity.contains(Sev::ERROR),
        DebugSeverity::ErrorsAndWarnings => severity.intersects(Sev::ERROR | Sev::WARNING),
        DebugSeverity::All => true,
    }
}

fn category_passes(
    filter: &DebugMessageFilter,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
) -> bool {
    use vk::DebugUtilsMessageTypeFlagsEXT as Ty;
    if message_type.contains(Ty::VALIDATION) {
        filter.show_validation
    } else if message_type.contains(Ty::PERFORMANCE) {
        filter.show_performance
    } else {
        filter.show_general
    }
}

/// Messenger entry point handed to `DebugUtilsMessengerCreateInfoEXT`
///
/// Called by the validation layers when they have something to report.
/// Messages that pass the configured filters are counted and forwarded to
/// the engine log at a matching severity.
pub unsafe extern "system" fn vulkan_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::os::raw::c_void,
) -> vk::Bool32 {
    use vk::DebugUtilsMessageSeverityFlagsEXT as Sev;
    use vk::DebugUtilsMessageTypeFlagsEXT as Ty;

    let data = *p_callback_data;
    let id_name = if data.p_message_id_name.is_null() {
        "Unknown"
    } else {
        CStr::from_ptr(data.p_message_id_name)
            .to_str()
            .unwrap_or("Invalid UTF-8")
    };
    let message = if data.p_message.is_null() {
        "No message"
    } else {
        CStr::from_ptr(data.p_message)
            .to_str()
            .unwrap_or("Invalid UTF-8")
    };

    let config = {
        let guard = ACTIVE_CONFIG.lock().unwrap();
        match guard.as_ref() {
            Some(cfg) => cfg.clone(),
            None => return vk::FALSE, // Messenger outlived the configuration
        }
    };

    if !severity_passes(config.severity, message_severity)
        || !category_passes(&config.message_filter, message_type)
    {
        return vk::FALSE;
    }

    let category = if message_type.contains(Ty::VALIDATION) {
        "Validation"
    } else if message_type.contains(Ty::PERFORMANCE) {
        "Performance"
    } else {
        "General"
    };

    let occurrence_count = {
        let mut guard = REPEAT_TRACKER.lock().unwrap();
        match guard.as_mut() {
            Some(tracker) => tracker.track_message(message),
            None => 1,
        }
    };

    let repeat_indicator = if occurrence_count > 1 {
        format!(" [×{}]", occurrence_count)
    } else {
        String::new()
    };

    let line = format!("[{}]{} {}: {}", category, repeat_indicator, id_name, message);

    if message_severity.contains(Sev::ERROR) {
        MESSAGE_COUNTS.bump(ValidationStatsTracker::ERROR);
        engine_error!(LOG_SOURCE, "{}", line);
    } else if message_severity.contains(Sev::WARNING) {
        MESSAGE_COUNTS.bump(ValidationStatsTracker::WARNING);
        engine_warn!(LOG_SOURCE, "{}", line);
    } else if message_severity.contains(Sev::INFO) {
        MESSAGE_COUNTS.bump(ValidationStatsTracker::INFO);
        engine_info!(LOG_SOURCE, "{}", line);
    } else {
        MESSAGE_COUNTS.bump(ValidationStatsTracker::VERBOSE);
        engine_trace!(LOG_SOURCE, "{}", line);
    }

    vk::FALSE // Don't abort the Vulkan call that triggered the message
}

#[cfg(test)]
#[path = "debug_tests.rs"]
mod tests;

//! Error types for the Ember2D engine
//!
//! This module defines the error types used throughout the engine,
//! including rendering, initialization, and format translation.

use std::fmt;

/// Result type for Ember2D engine operations
pub type Ember2dResult<T> = Result<T, Ember2dError>;

/// Ember2D engine errors
#[derive(Debug, Clone)]
pub enum Ember2dError {
    /// Backend-specific error (Vulkan, etc.)
    BackendError(String),

    /// Out of GPU memory
    OutOfMemory,

    /// Invalid resource (texture, buffer, shader, etc.)
    InvalidResource(String),

    /// Initialization failed (engine, graphics backend, subsystems)
    InitializationFailed(String),

    /// A vertex data format or pixel format the backend does not translate
    UnsupportedFormat(String),
}

impl fmt::Display for Ember2dError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ember2dError::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Ember2dError::OutOfMemory => write!(f, "Out of GPU memory"),
            Ember2dError::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Ember2dError::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Ember2dError::UnsupportedFormat(msg) => write!(f, "Unsupported format: {}", msg),
        }
    }
}

impl std::error::Error for Ember2dError {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;

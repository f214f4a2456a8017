//! Error types for the Vega3D GPU memory subsystem
//!
//! This module defines the error types used throughout the subsystem,
//! covering backend failures, allocator exhaustion and resource misuse.

use std::fmt;

/// Result type for GPU memory operations
pub type Result<T> = std::result::Result<T, Error>;

/// GPU memory subsystem errors
#[derive(Debug, Clone)]
pub enum Error {
    /// Backend-specific error (Vulkan, OpenGL, etc.)
    BackendError(String),

    /// Out of GPU memory
    OutOfMemory,

    /// Invalid resource (buffer, block, handle, etc.)
    InvalidResource(String),

    /// Initialization failed (device, allocator, context)
    InitializationFailed(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;

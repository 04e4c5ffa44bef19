//! Error types for native window operations
//!
//! This module defines the errors a NativeWindow implementation may report
//! from connection management, configuration, and the buffer queue.

use std::fmt;

/// Result type for native window operations
pub type WindowResult<T> = Result<T, WindowError>;

/// Native window errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowError {
    /// The producer side of the buffer queue is not connected
    Disconnected,

    /// A producer is already connected to the buffer queue
    AlreadyConnected,

    /// No buffer is available to dequeue
    NoBufferAvailable,

    /// The window could not allocate backing storage
    NoMemory,

    /// The request is not valid in the window's current state
    InvalidOperation(String),

    /// A host I/O error, carrying the OS errno
    Io(i32),
}

impl fmt::Display for WindowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WindowError::Disconnected => write!(f, "window not connected"),
            WindowError::AlreadyConnected => write!(f, "window already connected"),
            WindowError::NoBufferAvailable => write!(f, "no buffer available"),
            WindowError::NoMemory => write!(f, "window out of memory"),
            WindowError::InvalidOperation(msg) => write!(f, "invalid operation: {}", msg),
            WindowError::Io(errno) => write!(f, "I/O error: errno {}", errno),
        }
    }
}

impl std::error::Error for WindowError {}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;

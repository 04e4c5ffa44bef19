//! Error types for the Vulkan WSI layer
//!
//! This module defines the error taxonomy surfaced to applications and the
//! per-swapchain present result with its worst-first aggregation ordering.

use std::fmt;

use aurora_window::wsi_warn;

/// Result type for WSI operations
pub type WsiResult<T> = Result<T, WsiError>;

/// Vulkan WSI layer errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WsiError {
    /// The host allocator failed
    OutOfHostMemory,

    /// The device allocator failed
    OutOfDeviceMemory,

    /// The logical device was lost
    DeviceLost,

    /// The surface is no longer usable
    SurfaceLost,

    /// The surface already has an active swapchain that the caller did not
    /// name as `old_swapchain`
    NativeWindowInUse,

    /// Native window setup or reconfiguration failed
    InitializationFailed(String),

    /// The swapchain has been superseded and must be recreated
    OutOfDate,

    /// A count-bounded enumeration was given a buffer smaller than the
    /// available set; the buffer holds a prefix of the results
    Incomplete,
}

impl fmt::Display for WsiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WsiError::OutOfHostMemory => write!(f, "out of host memory"),
            WsiError::OutOfDeviceMemory => write!(f, "out of device memory"),
            WsiError::DeviceLost => write!(f, "device lost"),
            WsiError::SurfaceLost => write!(f, "surface lost"),
            WsiError::NativeWindowInUse => write!(f, "native window already in use"),
            WsiError::InitializationFailed(msg) => write!(f, "initialization failed: {}", msg),
            WsiError::OutOfDate => write!(f, "swapchain out of date"),
            WsiError::Incomplete => write!(f, "enumeration incomplete"),
        }
    }
}

impl std::error::Error for WsiError {}

/// Per-swapchain outcome of a present operation.
///
/// `Suboptimal` is a success value: the image was queued, but the
/// swapchain no longer matches the surface exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentResult {
    Success,
    Suboptimal,
    OutOfHostMemory,
    OutOfDeviceMemory,
    OutOfDate,
    SurfaceLost,
    DeviceLost,
}

impl PresentResult {
    /// Aggregation ordering for multi-swapchain presents, worst first.
    const WORST_TO_BEST: [PresentResult; 6] = [
        PresentResult::DeviceLost,
        PresentResult::SurfaceLost,
        PresentResult::OutOfDate,
        PresentResult::OutOfDeviceMemory,
        PresentResult::OutOfHostMemory,
        PresentResult::Suboptimal,
    ];

    /// The worse of two present results.
    pub fn worst(a: PresentResult, b: PresentResult) -> PresentResult {
        for result in Self::WORST_TO_BEST {
            if a == result || b == result {
                return result;
            }
        }
        PresentResult::Success
    }

    /// Whether this result reports a failure (the image was not queued)
    pub fn is_error(self) -> bool {
        !matches!(self, PresentResult::Success | PresentResult::Suboptimal)
    }
}

impl From<WsiError> for PresentResult {
    fn from(err: WsiError) -> PresentResult {
        match err {
            WsiError::OutOfHostMemory => PresentResult::OutOfHostMemory,
            WsiError::OutOfDeviceMemory => PresentResult::OutOfDeviceMemory,
            WsiError::DeviceLost => PresentResult::DeviceLost,
            WsiError::SurfaceLost => PresentResult::SurfaceLost,
            WsiError::OutOfDate => PresentResult::OutOfDate,
            // The remaining kinds have no slot in the present ranking and
            // should not be reported by queue-level driver calls.
            other => {
                wsi_warn!("aurora::wsi", "unrankable present error {}; reporting surface loss", other);
                PresentResult::SurfaceLost
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;

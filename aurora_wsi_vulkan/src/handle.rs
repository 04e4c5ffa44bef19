//! Opaque handles for surfaces and swapchains
//!
//! Handles are 64-bit values packing a slot index and a generation, so a
//! handle kept across a destroy is detected as stale instead of aliasing
//! whatever object now occupies the slot. Raw value 0 is the null handle.

use slotmap::{new_key_type, Key, KeyData};

new_key_type! {
    /// Storage key for a Surface
    pub(crate) struct SurfaceKey;

    /// Storage key for a Swapchain
    pub(crate) struct SwapchainKey;
}

/// Opaque surface handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceHandle(u64);

/// Opaque swapchain handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SwapchainHandle(u64);

macro_rules! handle_impl {
    ($handle:ident, $key:ident) => {
        impl $handle {
            /// The null handle
            pub const NULL: $handle = $handle(0);

            pub fn is_null(self) -> bool {
                self.0 == 0
            }

            /// The raw 64-bit value, for crossing ABI boundaries
            pub fn as_raw(self) -> u64 {
                self.0
            }

            /// Reconstruct a handle from its raw value. A garbage value is
            /// safe: it will simply fail the table lookup.
            pub fn from_raw(raw: u64) -> $handle {
                $handle(raw)
            }

            pub(crate) fn key(self) -> Option<$key> {
                if self.is_null() {
                    None
                } else {
                    Some($key::from(KeyData::from_ffi(self.0)))
                }
            }

            pub(crate) fn from_key(key: $key) -> $handle {
                $handle(key.data().as_ffi())
            }
        }

        impl Default for $handle {
            fn default() -> $handle {
                $handle::NULL
            }
        }
    };
}

handle_impl!(SurfaceHandle, SurfaceKey);
handle_impl!(SwapchainHandle, SwapchainKey);

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "handle_tests.rs"]
mod tests;

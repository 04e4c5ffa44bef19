/*!
# Aurora WSI - Vulkan layer

Vulkan window system integration over the Aurora native window API.

This crate bridges the Vulkan swapchain contract (`VK_KHR_swapchain` and
friends) to a [`aurora_window::NativeWindow`] buffer queue. It creates
swapchains atop surfaces, binds native buffers as presentable `vk::Image`s,
moves synchronization fences through acquire and present with single-owner
discipline, and correlates present IDs with after-the-fact compositor
timestamps.

The driver side (image creation, fence signalling, gralloc usage queries)
is reached through the [`GpuDriver`] trait; the Ash library provides the
Vulkan vocabulary types.
*/

// Internal modules
mod device;
mod driver;
mod error;
mod handle;
mod surface;
mod swapchain;
mod timing;
mod transform;

// Test doubles (no window system or GPU required)
#[cfg(test)]
mod mock_window;

// Public API
pub use device::{PresentInfo, PresentRegion, SwapchainCreateInfo, WsiDevice};
pub use driver::{GpuDriver, SwapchainImageCreateInfo, SwapchainImageUsage};
pub use error::{PresentResult, WsiError, WsiResult};
pub use handle::{SurfaceHandle, SwapchainHandle};
pub use timing::RefreshCycleDuration;

// Re-export the Vulkan vocabulary used in the public API
pub use ash::vk;

//! Driver dispatch trait
//!
//! The WSI layer does not talk to the GPU itself; it forwards to the
//! driver's swapchain entry points through this trait. Fence ownership at
//! this seam is part of the contract and is spelled out per method.

use std::os::fd::OwnedFd;

use ash::vk;
use aurora_window::{BufferUsage, WindowBuffer};

use crate::error::WsiResult;

/// Bit-encoded swapchain image usage passed to the driver's gralloc query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SwapchainImageUsage(u32);

impl SwapchainImageUsage {
    pub const NONE: SwapchainImageUsage = SwapchainImageUsage(0);
    /// The image is presented front-buffered (shared with the compositor)
    pub const FRONT_BUFFER: SwapchainImageUsage = SwapchainImageUsage(0x1);

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: SwapchainImageUsage) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOrAssign for SwapchainImageUsage {
    fn bitor_assign(&mut self, rhs: SwapchainImageUsage) {
        self.0 |= rhs.0;
    }
}

/// Parameters for creating a `vk::Image` bound to a native window buffer.
///
/// This is the flattened equivalent of an image create-info with a chained
/// native-buffer struct: the buffer carries the platform handle, stride,
/// format and allocation usage the driver needs to import the allocation.
pub struct SwapchainImageCreateInfo<'a> {
    pub format: vk::Format,
    pub extent: vk::Extent2D,
    pub usage: vk::ImageUsageFlags,
    pub sharing_mode: vk::SharingMode,
    pub queue_family_indices: &'a [u32],
    pub swapchain_usage: SwapchainImageUsage,
    /// The native buffer the image is bound to
    pub buffer: &'a WindowBuffer,
}

/// Driver swapchain entry points.
///
/// Implementations wrap a device dispatch table; tests use a recording
/// mock.
pub trait GpuDriver: Send + Sync {
    /// Create a `vk::Image` bound to a native window buffer.
    fn create_image(&self, info: &SwapchainImageCreateInfo<'_>) -> WsiResult<vk::Image>;

    /// Destroy an image previously created with [`create_image`].
    ///
    /// [`create_image`]: GpuDriver::create_image
    fn destroy_image(&self, image: vk::Image);

    /// Import an acquire fence for an image and arrange for `semaphore`
    /// and `signal_fence` to signal once it fires.
    ///
    /// The passed fence is consumed, success or failure. Relying on that
    /// avoids a close/close race with drivers that close on their error
    /// paths.
    fn acquire_image(
        &self,
        image: vk::Image,
        fence: Option<OwnedFd>,
        semaphore: vk::Semaphore,
        signal_fence: vk::Fence,
    ) -> WsiResult<()>;

    /// Queue a signal operation behind `wait_semaphores` and return a
    /// fresh release fence for the image. The caller owns the fence.
    fn queue_signal_release_image(
        &self,
        queue: vk::Queue,
        wait_semaphores: &[vk::Semaphore],
        image: vk::Image,
    ) -> WsiResult<Option<OwnedFd>>;

    /// Gralloc usage the driver requires for swapchain buffers of this
    /// format and image usage. `None` means the entry point is not
    /// implemented by this driver.
    fn swapchain_gralloc_usage(
        &self,
        format: vk::Format,
        image_usage: vk::ImageUsageFlags,
    ) -> Option<WsiResult<BufferUsage>> {
        let _ = (format, image_usage);
        None
    }

    /// Extended gralloc usage query that also considers the swapchain
    /// image usage (front-buffering). Preferred over
    /// [`swapchain_gralloc_usage`] when implemented.
    ///
    /// [`swapchain_gralloc_usage`]: GpuDriver::swapchain_gralloc_usage
    fn swapchain_gralloc_usage2(
        &self,
        format: vk::Format,
        image_usage: vk::ImageUsageFlags,
        swapchain_usage: SwapchainImageUsage,
    ) -> Option<WsiResult<BufferUsage>> {
        let _ = (format, image_usage, swapchain_usage);
        None
    }
}

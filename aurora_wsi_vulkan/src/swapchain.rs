//! Swapchain and per-image slot state
//!
//! A swapchain owns N image slots, each binding a native window buffer to
//! a `vk::Image`. Slots track whether their buffer is currently dequeued
//! and, while it is, the fence that guards it.

use std::os::fd::OwnedFd;
use std::sync::Arc;

use ash::vk;
use aurora_window::{fence, NativeWindow, WindowBuffer};

use crate::driver::GpuDriver;
use crate::handle::SurfaceKey;
use crate::timing::TimingLedger;

/// Per-buffer state
pub(crate) struct ImageSlot {
    /// The bound image; null once destroyed
    pub image: vk::Image,
    /// Strong reference to the native buffer; cleared on release
    pub buffer: Option<Arc<WindowBuffer>>,
    /// Only present while the buffer is dequeued. We own the descriptor
    /// and must dispose of it: dropped when the queued image supersedes
    /// it, or passed on e.g. to `NativeWindow::cancel_buffer`.
    pub dequeue_fence: Option<OwnedFd>,
    pub dequeued: bool,
}

impl ImageSlot {
    pub fn new() -> ImageSlot {
        ImageSlot {
            image: vk::Image::null(),
            buffer: None,
            dequeue_fence: None,
            dequeued: false,
        }
    }
}

/// A fixed set of presentable images rotated through acquire/render/present
pub(crate) struct Swapchain {
    /// The surface this swapchain was created over
    pub surface: SurfaceKey,
    pub images: Vec<ImageSlot>,
    pub present_mode: vk::PresentModeKHR,
    /// Sticky: set by the first timing hint or timing query
    pub frame_timestamps_enabled: bool,
    /// Refresh period bounds snapshotted from the window at creation
    pub min_refresh_duration: u64,
    pub max_refresh_duration: u64,
    pub timing: TimingLedger,
}

impl Swapchain {
    pub fn new(
        surface: SurfaceKey,
        num_images: u32,
        present_mode: vk::PresentModeKHR,
        window: &dyn NativeWindow,
    ) -> Swapchain {
        let (min_rdur, max_rdur) = window.refresh_cycle_period();
        Swapchain {
            surface,
            images: (0..num_images).map(|_| ImageSlot::new()).collect(),
            present_mode,
            frame_timestamps_enabled: false,
            min_refresh_duration: min_rdur as u64,
            max_refresh_duration: max_rdur as u64,
            timing: TimingLedger::new(),
        }
    }

    pub fn num_images(&self) -> u32 {
        self.images.len() as u32
    }
}

/// Release one image slot: dispose of the dequeued buffer and its fences,
/// destroy the bound image, and drop the buffer reference.
///
/// `window` is the surface's window while the swapchain is still active on
/// it, `None` once the swapchain is orphaned. A release fence may only be
/// supplied for a dequeued slot.
pub(crate) fn release_swapchain_image(
    driver: &dyn GpuDriver,
    window: Option<&dyn NativeWindow>,
    mut release_fence: Option<OwnedFd>,
    slot: &mut ImageSlot,
) {
    debug_assert!(
        release_fence.is_none() || slot.dequeued,
        "release fence supplied for a non-dequeued image"
    );

    if slot.dequeued {
        if release_fence.is_some() {
            // Coming from a present: the application's execution
            // dependency chain from acquire to present covers the dequeue
            // fence, so it can simply be dropped.
            slot.dequeue_fence = None;
        } else {
            // Coming from destruction or an error path with no fresh
            // fence. The dequeue fence should have signalled long ago for
            // an idle image; for in-flight rendering it is the best
            // approximation of a release fence we have.
            release_fence = slot.dequeue_fence.take();
        }

        if let Some(window) = window {
            if let Some(buffer) = &slot.buffer {
                let _ = window.cancel_buffer(buffer, release_fence.take());
            }
        } else if let Some(fence_fd) = release_fence.take() {
            let _ = fence::wait_forever_and_close(fence_fd);
        }

        slot.dequeued = false;
    }

    if slot.image != vk::Image::null() {
        driver.destroy_image(slot.image);
        slot.image = vk::Image::null();
    }

    slot.buffer = None;
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "swapchain_tests.rs"]
mod tests;

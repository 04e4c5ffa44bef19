//! Surface objects and the fixed surface query tables
//!
//! A surface binds the WSI layer to one native window. The window
//! connection is owned here; the swapchain currently driving the window is
//! tracked by handle, and handle equality (not object identity) is the
//! activeness predicate.

use std::sync::Arc;

use ash::vk;
use aurora_window::{wsi_error, NativeWindow, WindowQuery};

use crate::error::{WsiError, WsiResult};
use crate::handle::SwapchainHandle;
use crate::transform;

/// A binding of the WSI layer to one native window
pub(crate) struct Surface {
    /// The window; shared with whoever created it
    pub window: Arc<dyn NativeWindow>,
    /// Handle of the swapchain currently authoritative over the window;
    /// null when none
    pub active_swapchain: SwapchainHandle,
}

/// Surface formats every window supports
pub(crate) const SUPPORTED_FORMATS: [vk::SurfaceFormatKHR; 3] = [
    vk::SurfaceFormatKHR {
        format: vk::Format::R8G8B8A8_UNORM,
        color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
    },
    vk::SurfaceFormatKHR {
        format: vk::Format::R8G8B8A8_SRGB,
        color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
    },
    vk::SurfaceFormatKHR {
        format: vk::Format::R5G6B5_UNORM_PACK16,
        color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
    },
];

/// Present modes every window supports
pub(crate) const SUPPORTED_PRESENT_MODES: [vk::PresentModeKHR; 4] = [
    vk::PresentModeKHR::MAILBOX,
    vk::PresentModeKHR::FIFO,
    vk::PresentModeKHR::SHARED_DEMAND_REFRESH,
    vk::PresentModeKHR::SHARED_CONTINUOUS_REFRESH,
];

/// Capabilities of a surface, partly from live window state
pub(crate) fn surface_capabilities(
    window: &dyn NativeWindow,
) -> WsiResult<vk::SurfaceCapabilitiesKHR> {
    let width = window.query(WindowQuery::DefaultWidth).map_err(|err| {
        wsi_error!("aurora::wsi::surface", "default width query failed: {}", err);
        WsiError::InitializationFailed(format!("width query failed: {}", err))
    })?;
    let height = window.query(WindowQuery::DefaultHeight).map_err(|err| {
        wsi_error!("aurora::wsi::surface", "default height query failed: {}", err);
        WsiError::InitializationFailed(format!("height query failed: {}", err))
    })?;
    let transform_hint = window.query(WindowQuery::TransformHint).map_err(|err| {
        wsi_error!("aurora::wsi::surface", "transform hint query failed: {}", err);
        WsiError::InitializationFailed(format!("transform hint query failed: {}", err))
    })?;

    Ok(vk::SurfaceCapabilitiesKHR {
        min_image_count: 2,
        max_image_count: 3,
        current_extent: vk::Extent2D {
            width: width as u32,
            height: height as u32,
        },
        min_image_extent: vk::Extent2D { width: 1, height: 1 },
        max_image_extent: vk::Extent2D {
            width: 4096,
            height: 4096,
        },
        max_image_array_layers: 1,
        supported_transforms: transform::supported_transforms(),
        current_transform: transform::native_to_vk(
            aurora_window::WindowTransform::from_bits(transform_hint as u32),
        ),
        // Window composition is a compositor property, not something the
        // buffer queue can change.
        supported_composite_alpha: vk::CompositeAlphaFlagsKHR::INHERIT,
        supported_usage_flags: vk::ImageUsageFlags::TRANSFER_SRC
            | vk::ImageUsageFlags::TRANSFER_DST
            | vk::ImageUsageFlags::SAMPLED
            | vk::ImageUsageFlags::STORAGE
            | vk::ImageUsageFlags::COLOR_ATTACHMENT
            | vk::ImageUsageFlags::INPUT_ATTACHMENT,
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "surface_tests.rs"]
mod tests;

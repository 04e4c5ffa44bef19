//! Transform codec between Vulkan and native window transforms
//!
//! Vulkan transforms are an optional horizontal mirror followed by a
//! clockwise 0/90/180/270-degree rotation. Native transforms are a
//! horizontal flip, a vertical flip, and a 90-degree rotation, optional
//! but always in that order. The two encodings are isomorphic, but only
//! the pure rotations are wired up here; flip and flip-and-rotate wait on
//! test coverage, and compositors are not observed to produce them.

use ash::vk;
use aurora_window::WindowTransform;

/// The transforms [`native_to_vk`] can report and swapchain creation
/// accepts as a pre-transform.
pub(crate) fn supported_transforms() -> vk::SurfaceTransformFlagsKHR {
    vk::SurfaceTransformFlagsKHR::IDENTITY
        | vk::SurfaceTransformFlagsKHR::ROTATE_90
        | vk::SurfaceTransformFlagsKHR::ROTATE_180
        | vk::SurfaceTransformFlagsKHR::ROTATE_270
        | vk::SurfaceTransformFlagsKHR::INHERIT
}

/// Translate a native transform to its Vulkan equivalent.
///
/// Combinations containing a bare flip or the inverse-display bit map to
/// identity.
pub(crate) fn native_to_vk(native: WindowTransform) -> vk::SurfaceTransformFlagsKHR {
    match native {
        WindowTransform::NONE => vk::SurfaceTransformFlagsKHR::IDENTITY,
        WindowTransform::ROT_90 => vk::SurfaceTransformFlagsKHR::ROTATE_90,
        WindowTransform::ROT_180 => vk::SurfaceTransformFlagsKHR::ROTATE_180,
        WindowTransform::ROT_270 => vk::SurfaceTransformFlagsKHR::ROTATE_270,
        _ => vk::SurfaceTransformFlagsKHR::IDENTITY,
    }
}

/// The native transform that cancels a Vulkan pre-transform.
///
/// A pre-transform declares the rotation the application applied while
/// rendering; the window wants the transform the compositor should apply
/// during composition. Requesting the inverse makes the two cancel, so the
/// compositor ends up presenting the buffer untransformed.
pub(crate) fn invert_vk_to_native(transform: vk::SurfaceTransformFlagsKHR) -> WindowTransform {
    match transform {
        vk::SurfaceTransformFlagsKHR::ROTATE_90 => WindowTransform::ROT_270,
        vk::SurfaceTransformFlagsKHR::ROTATE_180 => WindowTransform::ROT_180,
        vk::SurfaceTransformFlagsKHR::ROTATE_270 => WindowTransform::ROT_90,
        // IDENTITY, INHERIT, and anything unsupported
        _ => WindowTransform::NONE,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "transform_tests.rs"]
mod tests;

//! The WSI device: surface and swapchain lifecycle, acquire and present
//!
//! `WsiDevice` is the entry object for the whole layer. It owns the
//! surface and swapchain tables and drives the native window and the GPU
//! driver through their trait seams. Operations take `&mut self`; the
//! layer performs no internal locking, so callers serialize access to one
//! device (distinct devices are independent).

use std::os::fd::AsFd;
use std::sync::Arc;

use ash::vk;
use aurora_window::{
    fence, wsi_debug, wsi_error, wsi_warn, BufferRect, BufferUsage, DataSpace, NativeWindow,
    PixelFormat, ScalingMode, WindowApi, WindowError, WindowQuery,
};
use slotmap::SlotMap;

use crate::driver::{GpuDriver, SwapchainImageCreateInfo, SwapchainImageUsage};
use crate::error::{PresentResult, WsiError, WsiResult};
use crate::handle::{SurfaceHandle, SurfaceKey, SwapchainHandle, SwapchainKey};
use crate::surface::{self, Surface};
use crate::swapchain::{release_swapchain_image, Swapchain};
use crate::timing::RefreshCycleDuration;
use crate::transform;

const LOG_SOURCE: &str = "aurora::wsi";

/// Parameters for [`WsiDevice::create_swapchain`]
#[derive(Debug, Clone)]
pub struct SwapchainCreateInfo {
    pub surface: SurfaceHandle,
    pub min_image_count: u32,
    pub image_format: vk::Format,
    pub image_color_space: vk::ColorSpaceKHR,
    pub image_extent: vk::Extent2D,
    pub image_array_layers: u32,
    pub image_usage: vk::ImageUsageFlags,
    pub image_sharing_mode: vk::SharingMode,
    pub queue_family_indices: Vec<u32>,
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
    pub composite_alpha: vk::CompositeAlphaFlagsKHR,
    pub present_mode: vk::PresentModeKHR,
    /// The surface's current swapchain, to be superseded; null when the
    /// surface has none
    pub old_swapchain: SwapchainHandle,
}

impl Default for SwapchainCreateInfo {
    fn default() -> SwapchainCreateInfo {
        SwapchainCreateInfo {
            surface: SurfaceHandle::NULL,
            min_image_count: 2,
            image_format: vk::Format::R8G8B8A8_UNORM,
            image_color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            image_extent: vk::Extent2D { width: 0, height: 0 },
            image_array_layers: 1,
            image_usage: vk::ImageUsageFlags::COLOR_ATTACHMENT,
            image_sharing_mode: vk::SharingMode::EXCLUSIVE,
            queue_family_indices: Vec::new(),
            pre_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
            composite_alpha: vk::CompositeAlphaFlagsKHR::INHERIT,
            present_mode: vk::PresentModeKHR::FIFO,
            old_swapchain: SwapchainHandle::NULL,
        }
    }
}

/// Damage hint for one swapchain in a present
#[derive(Debug, Clone, Copy)]
pub struct PresentRegion<'a> {
    /// Changed areas in top-left-origin image coordinates
    pub rectangles: &'a [vk::RectLayerKHR],
}

/// Parameters for [`WsiDevice::queue_present`].
///
/// `regions` and `times`, when given, run parallel to `swapchains`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PresentInfo<'a> {
    pub wait_semaphores: &'a [vk::Semaphore],
    pub swapchains: &'a [SwapchainHandle],
    pub image_indices: &'a [u32],
    pub regions: Option<&'a [PresentRegion<'a>]>,
    pub times: Option<&'a [vk::PresentTimeGOOGLE]>,
}

/// The Vulkan WSI layer for one logical device
pub struct WsiDevice {
    driver: Arc<dyn GpuDriver>,
    surfaces: SlotMap<SurfaceKey, Surface>,
    swapchains: SlotMap<SwapchainKey, Swapchain>,
    /// Reused damage-rectangle conversion buffer
    scratch_rects: Vec<BufferRect>,
}

fn window_init_error(what: &str, err: WindowError) -> WsiError {
    wsi_error!(LOG_SOURCE, "{} failed: {}", what, err);
    WsiError::InitializationFailed(format!("{} failed: {}", what, err))
}

/// Copy a fixed result set into a count-bounded caller buffer.
///
/// With no buffer, reports the available count. With one, fills as much as
/// fits and reports `Incomplete` when that was not everything.
fn copy_bounded<T: Copy>(available: &[T], count: &mut u32, out: Option<&mut [T]>) -> WsiResult<()> {
    match out {
        Some(out) => {
            let n = available.len().min(*count as usize).min(out.len());
            out[..n].copy_from_slice(&available[..n]);
            *count = n as u32;
            if n < available.len() {
                Err(WsiError::Incomplete)
            } else {
                Ok(())
            }
        }
        None => {
            *count = available.len() as u32;
            Ok(())
        }
    }
}

/// Detach a swapchain from its surface: release every slot that is not
/// dequeued, clear the timing ledger, and null the surface's active
/// handle. No-op if the swapchain is not the active one.
fn orphan_swapchain(
    driver: &dyn GpuDriver,
    surfaces: &mut SlotMap<SurfaceKey, Surface>,
    swapchains: &mut SlotMap<SwapchainKey, Swapchain>,
    key: SwapchainKey,
) {
    let Some(swapchain) = swapchains.get_mut(key) else {
        return;
    };
    let Some(surface) = surfaces.get_mut(swapchain.surface) else {
        return;
    };
    if surface.active_swapchain != SwapchainHandle::from_key(key) {
        return;
    }
    for slot in &mut swapchain.images {
        if !slot.dequeued {
            release_swapchain_image(driver, None, None, slot);
        }
    }
    surface.active_swapchain = SwapchainHandle::NULL;
    swapchain.timing.clear();
}

impl WsiDevice {
    pub fn new(driver: Arc<dyn GpuDriver>) -> WsiDevice {
        WsiDevice {
            driver,
            surfaces: SlotMap::with_key(),
            swapchains: SlotMap::with_key(),
            scratch_rects: Vec::new(),
        }
    }

    // ----- surfaces -----

    /// Bind a native window as a presentation surface.
    ///
    /// Connects to the window's buffer queue; the returned handle is valid
    /// until [`destroy_surface`].
    ///
    /// [`destroy_surface`]: WsiDevice::destroy_surface
    pub fn create_surface(&mut self, window: Arc<dyn NativeWindow>) -> WsiResult<SurfaceHandle> {
        window.api_connect(WindowApi::Egl).map_err(|err| {
            wsi_error!(LOG_SOURCE, "api_connect failed: {}", err);
            WsiError::InitializationFailed(format!("api_connect failed: {}", err))
        })?;
        let key = self.surfaces.insert(Surface {
            window,
            active_swapchain: SwapchainHandle::NULL,
        });
        Ok(SurfaceHandle::from_key(key))
    }

    /// Release a surface and disconnect from its window.
    ///
    /// Destroying a surface that still has an active swapchain is a caller
    /// error; it is logged and the surface goes away regardless.
    pub fn destroy_surface(&mut self, handle: SurfaceHandle) {
        let Some(surface) = handle.key().and_then(|key| self.surfaces.remove(key)) else {
            return;
        };
        let _ = surface.window.api_disconnect(WindowApi::Egl);
        if !surface.active_swapchain.is_null() {
            wsi_debug!(
                LOG_SOURCE,
                "destroyed surface {:#x} has active swapchain {:#x}",
                handle.as_raw(),
                surface.active_swapchain.as_raw()
            );
        }
    }

    fn surface(&self, handle: SurfaceHandle) -> WsiResult<&Surface> {
        handle
            .key()
            .and_then(|key| self.surfaces.get(key))
            .ok_or(WsiError::SurfaceLost)
    }

    /// Whether presentation to this surface is supported from the given
    /// queue family. Every queue family can present.
    pub fn surface_support(&self, handle: SurfaceHandle, _queue_family: u32) -> WsiResult<bool> {
        self.surface(handle)?;
        Ok(true)
    }

    pub fn surface_capabilities(
        &self,
        handle: SurfaceHandle,
    ) -> WsiResult<vk::SurfaceCapabilitiesKHR> {
        surface::surface_capabilities(self.surface(handle)?.window.as_ref())
    }

    /// Enumerate supported surface formats into a count-bounded buffer.
    pub fn surface_formats(
        &self,
        handle: SurfaceHandle,
        count: &mut u32,
        formats: Option<&mut [vk::SurfaceFormatKHR]>,
    ) -> WsiResult<()> {
        self.surface(handle)?;
        copy_bounded(&surface::SUPPORTED_FORMATS, count, formats)
    }

    /// Enumerate supported present modes into a count-bounded buffer.
    pub fn surface_present_modes(
        &self,
        handle: SurfaceHandle,
        count: &mut u32,
        modes: Option<&mut [vk::PresentModeKHR]>,
    ) -> WsiResult<()> {
        self.surface(handle)?;
        copy_bounded(&surface::SUPPORTED_PRESENT_MODES, count, modes)
    }

    // ----- swapchain lifecycle -----

    fn swapchain_key(&self, handle: SwapchainHandle) -> Option<SwapchainKey> {
        handle.key().filter(|key| self.swapchains.contains_key(*key))
    }

    fn is_active(&self, key: SwapchainKey) -> bool {
        let swapchain = &self.swapchains[key];
        self.surfaces
            .get(swapchain.surface)
            .map_or(false, |surface| {
                surface.active_swapchain == SwapchainHandle::from_key(key)
            })
    }

    /// Create a swapchain over a surface.
    ///
    /// Supersedes `old_swapchain` (which must name the surface's current
    /// swapchain), resets and reconfigures the window, binds one image per
    /// buffer, and installs the new swapchain as the surface's active one.
    /// Creation is all-or-nothing: any failure rolls back to the state
    /// before the call (apart from the orphaning of `old_swapchain`).
    pub fn create_swapchain(
        &mut self,
        create_info: &SwapchainCreateInfo,
    ) -> WsiResult<SwapchainHandle> {
        wsi_debug!(
            LOG_SOURCE,
            "create_swapchain: surface={:#x} min_image_count={} format={:?} extent={}x{} \
             usage={:?} pre_transform={:?} present_mode={:?} old_swapchain={:#x}",
            create_info.surface.as_raw(),
            create_info.min_image_count,
            create_info.image_format,
            create_info.image_extent.width,
            create_info.image_extent.height,
            create_info.image_usage,
            create_info.pre_transform,
            create_info.present_mode,
            create_info.old_swapchain.as_raw()
        );

        if create_info.image_array_layers != 1 {
            wsi_debug!(
                LOG_SOURCE,
                "image_array_layers={} not supported",
                create_info.image_array_layers
            );
        }
        if create_info.image_color_space != vk::ColorSpaceKHR::SRGB_NONLINEAR {
            wsi_debug!(
                LOG_SOURCE,
                "image_color_space={:?} not supported",
                create_info.image_color_space
            );
        }
        if !transform::supported_transforms().contains(create_info.pre_transform) {
            wsi_debug!(
                LOG_SOURCE,
                "pre_transform={:?} not supported",
                create_info.pre_transform
            );
        }
        if !surface::SUPPORTED_PRESENT_MODES.contains(&create_info.present_mode) {
            wsi_debug!(
                LOG_SOURCE,
                "present_mode={:?} not supported",
                create_info.present_mode
            );
        }

        let surface_key = create_info
            .surface
            .key()
            .filter(|key| self.surfaces.contains_key(*key))
            .ok_or(WsiError::SurfaceLost)?;

        if self.surfaces[surface_key].active_swapchain != create_info.old_swapchain {
            wsi_debug!(
                LOG_SOURCE,
                "surface {:#x} already has active swapchain {:#x} but old_swapchain={:#x}",
                create_info.surface.as_raw(),
                self.surfaces[surface_key].active_swapchain.as_raw(),
                create_info.old_swapchain.as_raw()
            );
            return Err(WsiError::NativeWindowInUse);
        }
        if let Some(old_key) = create_info
            .old_swapchain
            .key()
            .filter(|key| self.swapchains.contains_key(*key))
        {
            orphan_swapchain(
                self.driver.as_ref(),
                &mut self.surfaces,
                &mut self.swapchains,
                old_key,
            );
        }

        let window = self.surfaces[surface_key].window.clone();

        // -- Reset the native window --
        // A previous user may have changed its state, which would skew
        // queries like MIN_UNDEQUEUED_BUFFERS. Disconnecting orphans any
        // previously queued buffers; a buffer count of zero is the only
        // state in which dequeueing every buffer is legal.
        if let Err(err) = window.api_disconnect(WindowApi::Egl) {
            wsi_warn!(LOG_SOURCE, "api_disconnect failed during reset: {}", err);
        }
        if let Err(err) = window.api_connect(WindowApi::Egl) {
            wsi_warn!(LOG_SOURCE, "api_connect failed during reset: {}", err);
        }
        window
            .set_buffer_count(0)
            .map_err(|err| window_init_error("set_buffer_count(0)", err))?;
        window
            .set_swap_interval(1)
            .map_err(|err| window_init_error("set_swap_interval(1)", err))?;
        window
            .set_shared_buffer_mode(false)
            .map_err(|err| window_init_error("set_shared_buffer_mode(false)", err))?;
        window
            .set_auto_refresh(false)
            .map_err(|err| window_init_error("set_auto_refresh(false)", err))?;

        // -- Configure the native window --

        let native_format = if create_info.image_format == vk::Format::R8G8B8A8_UNORM
            || create_info.image_format == vk::Format::R8G8B8A8_SRGB
        {
            PixelFormat::Rgba8888
        } else if create_info.image_format == vk::Format::R5G6B5_UNORM_PACK16 {
            PixelFormat::Rgb565
        } else {
            wsi_debug!(
                LOG_SOURCE,
                "unsupported swapchain format {:?}, defaulting to RGBA_8888",
                create_info.image_format
            );
            PixelFormat::Rgba8888
        };
        window
            .set_buffers_format(native_format)
            .map_err(|err| window_init_error("set_buffers_format", err))?;
        window
            .set_buffers_data_space(DataSpace::SrgbLinear)
            .map_err(|err| window_init_error("set_buffers_data_space", err))?;
        window
            .set_buffers_dimensions(create_info.image_extent.width, create_info.image_extent.height)
            .map_err(|err| window_init_error("set_buffers_dimensions", err))?;

        // The pre-transform declares the rotation the application applied
        // while rendering; the window wants the transform the compositor
        // should apply during composition. Requesting the inverse makes
        // the two cancel, so the buffer reaches the display untransformed.
        window
            .set_buffers_transform(transform::invert_vk_to_native(create_info.pre_transform))
            .map_err(|err| window_init_error("set_buffers_transform", err))?;
        window
            .set_scaling_mode(ScalingMode::ScaleToWindow)
            .map_err(|err| window_init_error("set_scaling_mode", err))?;

        let query_value = window
            .query(WindowQuery::MinUndequeuedBuffers)
            .map_err(|err| window_init_error("MIN_UNDEQUEUED_BUFFERS query", err))?;
        if query_value < 0 {
            wsi_error!(LOG_SOURCE, "MIN_UNDEQUEUED_BUFFERS query returned {}", query_value);
            return Err(WsiError::InitializationFailed(format!(
                "MIN_UNDEQUEUED_BUFFERS query returned {}",
                query_value
            )));
        }
        let mut min_undequeued_buffers = query_value as u32;
        // The query assumes fifo; in mailbox mode the queue keeps one
        // extra buffer undequeued.
        if create_info.present_mode == vk::PresentModeKHR::MAILBOX {
            min_undequeued_buffers += 1;
        }

        let num_images = create_info.min_image_count.saturating_sub(1) + min_undequeued_buffers;
        window
            .set_buffer_count(num_images as usize)
            .map_err(|err| window_init_error("set_buffer_count", err))?;

        let mut swapchain_usage = SwapchainImageUsage::NONE;
        if create_info.present_mode == vk::PresentModeKHR::SHARED_DEMAND_REFRESH
            || create_info.present_mode == vk::PresentModeKHR::SHARED_CONTINUOUS_REFRESH
        {
            swapchain_usage |= SwapchainImageUsage::FRONT_BUFFER;
            window
                .set_shared_buffer_mode(true)
                .map_err(|err| window_init_error("set_shared_buffer_mode(true)", err))?;
        }
        if create_info.present_mode == vk::PresentModeKHR::SHARED_CONTINUOUS_REFRESH {
            window
                .set_auto_refresh(true)
                .map_err(|err| window_init_error("set_auto_refresh(true)", err))?;
        }

        let gralloc_usage = if let Some(result) = self.driver.swapchain_gralloc_usage2(
            create_info.image_format,
            create_info.image_usage,
            swapchain_usage,
        ) {
            result.map_err(|err| {
                wsi_error!(LOG_SOURCE, "gralloc usage v2 query failed: {}", err);
                WsiError::InitializationFailed(format!("gralloc usage v2 query failed: {}", err))
            })?
        } else if let Some(result) = self
            .driver
            .swapchain_gralloc_usage(create_info.image_format, create_info.image_usage)
        {
            result.map_err(|err| {
                wsi_error!(LOG_SOURCE, "gralloc usage query failed: {}", err);
                WsiError::InitializationFailed(format!("gralloc usage query failed: {}", err))
            })?
        } else {
            BufferUsage::HW_RENDER | BufferUsage::HW_TEXTURE
        };
        window
            .set_usage(gralloc_usage)
            .map_err(|err| window_init_error("set_usage", err))?;

        let swap_interval = if create_info.present_mode == vk::PresentModeKHR::MAILBOX {
            0
        } else {
            1
        };
        window
            .set_swap_interval(swap_interval)
            .map_err(|err| window_init_error("set_swap_interval", err))?;

        // -- Dequeue all buffers and create an image for each --
        // Whatever the outcome, every buffer dequeued here must go back to
        // the window before returning: this pass only exists to learn the
        // buffers' identity so the driver can bind images to them, and the
        // application's first acquire expects a full free pool.

        let mut swapchain = Swapchain::new(
            surface_key,
            num_images,
            create_info.present_mode,
            window.as_ref(),
        );
        let mut result: WsiResult<()> = Ok(());
        for i in 0..num_images as usize {
            let buffer = match window.dequeue_buffer() {
                Ok((buffer, fence_fd)) => {
                    let slot = &mut swapchain.images[i];
                    slot.buffer = Some(buffer.clone());
                    slot.dequeue_fence = fence_fd;
                    slot.dequeued = true;
                    buffer
                }
                Err(err) => {
                    wsi_error!(LOG_SOURCE, "dequeue_buffer[{}] failed: {}", i, err);
                    result = Err(WsiError::InitializationFailed(format!(
                        "dequeue_buffer failed: {}",
                        err
                    )));
                    break;
                }
            };

            let image_info = SwapchainImageCreateInfo {
                format: create_info.image_format,
                extent: vk::Extent2D {
                    width: buffer.width,
                    height: buffer.height,
                },
                usage: create_info.image_usage,
                sharing_mode: create_info.image_sharing_mode,
                queue_family_indices: &create_info.queue_family_indices,
                swapchain_usage,
                buffer: &buffer,
            };
            match self.driver.create_image(&image_info) {
                Ok(image) => swapchain.images[i].image = image,
                Err(err) => {
                    wsi_debug!(LOG_SOURCE, "create_image with native buffer failed: {}", err);
                    result = Err(err);
                    break;
                }
            }
        }

        // -- Cancel the dequeued buffers, returning them to the queue --
        // On failure, also destroy the images created so far; on success
        // the strong buffer references stay with the slots.
        for slot in &mut swapchain.images {
            if slot.dequeued {
                if let Some(buffer) = slot.buffer.clone() {
                    let _ = window.cancel_buffer(&buffer, slot.dequeue_fence.take());
                }
                slot.dequeued = false;
            }
            if result.is_err() && slot.image != vk::Image::null() {
                self.driver.destroy_image(slot.image);
                slot.image = vk::Image::null();
            }
        }

        result?;

        let key = self.swapchains.insert(swapchain);
        let handle = SwapchainHandle::from_key(key);
        self.surfaces[surface_key].active_swapchain = handle;
        Ok(handle)
    }

    /// Destroy a swapchain.
    ///
    /// Works on orphaned swapchains too; only an active swapchain still
    /// talks to its window here.
    pub fn destroy_swapchain(&mut self, handle: SwapchainHandle) {
        let Some(mut swapchain) = handle.key().and_then(|key| self.swapchains.remove(key)) else {
            return;
        };
        let active = self
            .surfaces
            .get(swapchain.surface)
            .map_or(false, |surface| surface.active_swapchain == handle);
        wsi_debug!(
            LOG_SOURCE,
            "destroy_swapchain: {:#x} present_mode={:?} active={}",
            handle.as_raw(),
            swapchain.present_mode,
            active
        );
        let window = if active {
            Some(self.surfaces[swapchain.surface].window.clone())
        } else {
            None
        };

        if swapchain.frame_timestamps_enabled {
            if let Some(window) = &window {
                window.enable_frame_timestamps(false);
            }
        }
        for slot in &mut swapchain.images {
            release_swapchain_image(self.driver.as_ref(), window.as_deref(), None, slot);
        }
        if active {
            self.surfaces[swapchain.surface].active_swapchain = SwapchainHandle::NULL;
        }
    }

    /// Enumerate the swapchain's images into a count-bounded buffer.
    pub fn swapchain_images(
        &self,
        handle: SwapchainHandle,
        count: &mut u32,
        images: Option<&mut [vk::Image]>,
    ) -> WsiResult<()> {
        let key = self.swapchain_key(handle).ok_or(WsiError::OutOfDate)?;
        if !self.is_active(key) {
            wsi_warn!(
                LOG_SOURCE,
                "enumerating images of non-active swapchain {:#x}; only dequeued image handles are valid",
                handle.as_raw()
            );
        }
        let image_handles: Vec<vk::Image> =
            self.swapchains[key].images.iter().map(|slot| slot.image).collect();
        copy_bounded(&image_handles, count, images)
    }

    // ----- frame rotation -----

    /// Dequeue the next presentable image.
    ///
    /// On success the returned index's slot holds the dequeued buffer, and
    /// `semaphore`/`signal_fence` will signal once the image is safe to
    /// render into. Only infinite timeouts are supported.
    pub fn acquire_next_image(
        &mut self,
        handle: SwapchainHandle,
        timeout_ns: u64,
        semaphore: vk::Semaphore,
        signal_fence: vk::Fence,
    ) -> WsiResult<u32> {
        let key = self.swapchain_key(handle).ok_or(WsiError::OutOfDate)?;
        if !self.is_active(key) {
            return Err(WsiError::OutOfDate);
        }
        if timeout_ns != u64::MAX {
            wsi_warn!(
                LOG_SOURCE,
                "non-infinite acquire timeouts are not implemented; waiting forever"
            );
        }
        let window = self.surfaces[self.swapchains[key].surface].window.clone();

        let (buffer, fence_fd) = window.dequeue_buffer().map_err(|err| {
            wsi_error!(LOG_SOURCE, "dequeue_buffer failed: {}", err);
            WsiError::InitializationFailed(format!("dequeue_buffer failed: {}", err))
        })?;

        let swapchain = &mut self.swapchains[key];
        let Some(index) = swapchain.images.iter().position(|slot| {
            slot.buffer
                .as_ref()
                .map_or(false, |bound| Arc::ptr_eq(bound, &buffer))
        }) else {
            wsi_error!(LOG_SOURCE, "dequeue_buffer returned unrecognized buffer");
            let _ = window.cancel_buffer(&buffer, fence_fd);
            return Err(WsiError::OutOfDate);
        };

        let slot = &mut swapchain.images[index];
        slot.dequeued = true;
        slot.dequeue_fence = fence_fd;

        // Hand the driver its own copy of the dequeue fence; if the dup
        // fails, stall until the fence signals and pass none. Either way
        // the driver owns the fence it is given.
        let mut fence_clone = None;
        if let Some(fence_fd) = &slot.dequeue_fence {
            match fence::dup(fence_fd.as_fd()) {
                Ok(clone) => fence_clone = Some(clone),
                Err(err) => {
                    wsi_error!(LOG_SOURCE, "fence dup failed, stalling until signalled: {}", err);
                    let _ = fence::wait_forever(fence_fd.as_fd());
                }
            }
        }

        if let Err(err) = self
            .driver
            .acquire_image(slot.image, fence_clone, semaphore, signal_fence)
        {
            // The driver consumed its fence even on failure; hand the
            // original back with the buffer.
            let fence_fd = slot.dequeue_fence.take();
            slot.dequeued = false;
            let _ = window.cancel_buffer(&buffer, fence_fd);
            return Err(err);
        }

        Ok(index as u32)
    }

    /// Queue one or more rendered images for presentation.
    ///
    /// Per-swapchain outcomes are written to `results` (when given) and
    /// aggregated worst-first into the return value. A failing swapchain
    /// is orphaned and must be recreated; presenting on a superseded
    /// swapchain reports [`PresentResult::OutOfDate`].
    pub fn queue_present(
        &mut self,
        queue: vk::Queue,
        present_info: &PresentInfo<'_>,
        mut results: Option<&mut [PresentResult]>,
    ) -> PresentResult {
        if present_info
            .regions
            .map_or(false, |regions| regions.len() != present_info.swapchains.len())
        {
            wsi_debug!(LOG_SOURCE, "present regions count != swapchain count");
        }
        if present_info
            .times
            .map_or(false, |times| times.len() != present_info.swapchains.len())
        {
            wsi_debug!(LOG_SOURCE, "present times count != swapchain count");
        }

        let mut final_result = PresentResult::Success;
        for (sc_index, (&handle, &image_index)) in present_info
            .swapchains
            .iter()
            .zip(present_info.image_indices)
            .enumerate()
        {
            let swapchain_result = self.present_one(
                queue,
                present_info.wait_semaphores,
                handle,
                image_index,
                present_info.regions.and_then(|regions| regions.get(sc_index)),
                present_info.times.and_then(|times| times.get(sc_index)),
            );

            if let Some(results) = results.as_deref_mut() {
                if let Some(out) = results.get_mut(sc_index) {
                    *out = swapchain_result;
                }
            }
            final_result = PresentResult::worst(final_result, swapchain_result);
        }
        final_result
    }

    fn present_one(
        &mut self,
        queue: vk::Queue,
        wait_semaphores: &[vk::Semaphore],
        handle: SwapchainHandle,
        image_index: u32,
        region: Option<&PresentRegion<'_>>,
        time: Option<&vk::PresentTimeGOOGLE>,
    ) -> PresentResult {
        let Some(key) = self.swapchain_key(handle) else {
            // Stale handle: the swapchain is gone along with its slots.
            return PresentResult::OutOfDate;
        };
        if image_index as usize >= self.swapchains[key].images.len() {
            wsi_error!(LOG_SOURCE, "present of out-of-range image index {}", image_index);
            return PresentResult::OutOfDate;
        }

        let mut swapchain_result = PresentResult::Success;
        let image = self.swapchains[key].images[image_index as usize].image;

        let mut release_fence =
            match self
                .driver
                .queue_signal_release_image(queue, wait_semaphores, image)
            {
                Ok(fence_fd) => fence_fd,
                Err(err) => {
                    wsi_error!(LOG_SOURCE, "queue_signal_release_image failed: {}", err);
                    swapchain_result = PresentResult::from(err);
                    None
                }
            };

        let surface_key = self.swapchains[key].surface;
        let active_window = self
            .surfaces
            .get(surface_key)
            .filter(|surface| surface.active_swapchain == handle)
            .map(|surface| surface.window.clone());

        if let Some(window) = active_window {
            if swapchain_result == PresentResult::Success {
                if let Some(region) = region {
                    self.apply_damage_hint(window.as_ref(), region);
                }
                if let Some(time) = time {
                    let swapchain = &mut self.swapchains[key];
                    if !swapchain.frame_timestamps_enabled {
                        wsi_debug!(LOG_SOURCE, "enabling frame timestamp collection");
                        window.enable_frame_timestamps(true);
                        swapchain.frame_timestamps_enabled = true;
                    }
                    // Remember the present ID so the compositor's report
                    // can be correlated back to this present.
                    swapchain.timing.insert(time);
                    if time.desired_present_time != 0 {
                        wsi_debug!(
                            LOG_SOURCE,
                            "setting buffer timestamp {}",
                            time.desired_present_time
                        );
                        let _ = window.set_buffers_timestamp(time.desired_present_time as i64);
                    }
                }

                let slot = &mut self.swapchains[key].images[image_index as usize];
                if let Some(buffer) = slot.buffer.clone() {
                    // queue_buffer consumes the fence even on failure
                    if let Err(err) = window.queue_buffer(&buffer, release_fence.take()) {
                        wsi_error!(LOG_SOURCE, "queue_buffer failed: {}", err);
                        swapchain_result =
                            PresentResult::worst(swapchain_result, PresentResult::OutOfDate);
                    }
                }
                let slot = &mut self.swapchains[key].images[image_index as usize];
                slot.dequeue_fence = None;
                slot.dequeued = false;
            }
            if swapchain_result.is_error() {
                let slot = &mut self.swapchains[key].images[image_index as usize];
                release_swapchain_image(
                    self.driver.as_ref(),
                    Some(window.as_ref()),
                    release_fence.take(),
                    slot,
                );
                orphan_swapchain(
                    self.driver.as_ref(),
                    &mut self.surfaces,
                    &mut self.swapchains,
                    key,
                );
            }
        } else {
            let slot = &mut self.swapchains[key].images[image_index as usize];
            release_swapchain_image(self.driver.as_ref(), None, release_fence.take(), slot);
            swapchain_result = PresentResult::OutOfDate;
        }

        swapchain_result
    }

    /// Convert a damage hint to the window's coordinate convention and
    /// submit it, reusing the scratch rectangle buffer.
    fn apply_damage_hint(&mut self, window: &dyn NativeWindow, region: &PresentRegion<'_>) {
        let rect_count = region.rectangles.len();
        if self.scratch_rects.len() < rect_count {
            self.scratch_rects.resize(rect_count, BufferRect::default());
        }
        for (rect, out) in region.rectangles.iter().zip(&mut self.scratch_rects) {
            if rect.layer > 0 {
                wsi_debug!(
                    LOG_SOURCE,
                    "ignoring invalid damage layer {}; using layer 0 instead",
                    rect.layer
                );
            }
            // Flip from top-left-origin rectangles to the window's
            // bottom-left convention.
            out.left = rect.offset.x;
            out.top = rect.offset.y + rect.extent.height as i32;
            out.right = rect.offset.x + rect.extent.width as i32;
            out.bottom = rect.offset.y;
        }
        let _ = window.set_surface_damage(&self.scratch_rects[..rect_count]);
    }

    // ----- status and timing -----

    /// Whether the swapchain still matches its surface.
    pub fn swapchain_status(&self, handle: SwapchainHandle) -> WsiResult<()> {
        let key = self.swapchain_key(handle).ok_or(WsiError::OutOfDate)?;
        if self.is_active(key) {
            Ok(())
        } else {
            Err(WsiError::OutOfDate)
        }
    }

    /// The display refresh period bounds snapshotted at creation.
    pub fn refresh_cycle_duration(
        &self,
        handle: SwapchainHandle,
    ) -> WsiResult<RefreshCycleDuration> {
        let key = self.swapchain_key(handle).ok_or(WsiError::OutOfDate)?;
        let swapchain = &self.swapchains[key];
        Ok(RefreshCycleDuration {
            min_refresh_duration: swapchain.min_refresh_duration,
            max_refresh_duration: swapchain.max_refresh_duration,
        })
    }

    /// Completed present timings, each reported exactly once.
    ///
    /// With no buffer, runs the timestamp back-search and reports how many
    /// records are ready; with one, drains up to `count` ready records
    /// into it. The first call turns window timestamp collection on, and
    /// it stays on.
    pub fn past_presentation_timing(
        &mut self,
        handle: SwapchainHandle,
        count: &mut u32,
        timings: Option<&mut [vk::PastPresentationTimingGOOGLE]>,
    ) -> WsiResult<()> {
        let key = self.swapchain_key(handle).ok_or(WsiError::OutOfDate)?;
        let window = self
            .surfaces
            .get(self.swapchains[key].surface)
            .map(|surface| surface.window.clone())
            .ok_or(WsiError::SurfaceLost)?;

        let swapchain = &mut self.swapchains[key];
        if !swapchain.frame_timestamps_enabled {
            wsi_debug!(LOG_SOURCE, "enabling frame timestamp collection");
            window.enable_frame_timestamps(true);
            swapchain.frame_timestamps_enabled = true;
        }

        match timings {
            Some(out) => {
                let capacity = (*count as usize).min(out.len());
                let drained = swapchain.timing.drain_ready(capacity);
                out[..drained.len()].copy_from_slice(&drained);
                *count = drained.len() as u32;
                Ok(())
            }
            None => {
                let refresh_duration = swapchain.min_refresh_duration;
                *count = swapchain.timing.count_ready(window.as_ref(), refresh_duration);
                Ok(())
            }
        }
    }
}

// ===== TEST SUPPORT =====

#[cfg(test)]
impl WsiDevice {
    /// Slot state snapshot: (dequeued, holds a fence, holds an image)
    pub(crate) fn slot_state(&self, handle: SwapchainHandle, index: usize) -> (bool, bool, bool) {
        let key = self.swapchain_key(handle).expect("live swapchain");
        let slot = &self.swapchains[key].images[index];
        (
            slot.dequeued,
            slot.dequeue_fence.is_some(),
            slot.image != vk::Image::null(),
        )
    }

    pub(crate) fn swapchain_is_active(&self, handle: SwapchainHandle) -> bool {
        self.swapchain_key(handle).map_or(false, |key| self.is_active(key))
    }

    pub(crate) fn timing_ledger_len(&self, handle: SwapchainHandle) -> usize {
        let key = self.swapchain_key(handle).expect("live swapchain");
        self.swapchains[key].timing.len()
    }

    pub(crate) fn num_images(&self, handle: SwapchainHandle) -> u32 {
        let key = self.swapchain_key(handle).expect("live swapchain");
        self.swapchains[key].num_images()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "device_tests.rs"]
mod tests;

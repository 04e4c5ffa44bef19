//! Mock native window and driver for unit tests (no window system or GPU
//! required)
//!
//! `MockWindow` services a configurable buffer pool and records every call
//! so tests can assert on the exact configuration sequence; `MockDriver`
//! tracks image lifetimes and fence traffic through the driver seam.

use std::collections::{HashMap, VecDeque};
use std::os::fd::OwnedFd;
use std::sync::{Arc, Mutex};

use ash::vk;
use ash::vk::Handle;
use aurora_window::{
    BufferRect, BufferUsage, DataSpace, FrameTimestamps, NativeWindow, PixelFormat, ScalingMode,
    WindowApi, WindowBuffer, WindowError, WindowQuery, WindowResult, WindowTransform,
};

use crate::driver::{GpuDriver, SwapchainImageCreateInfo, SwapchainImageUsage};
use crate::error::{WsiError, WsiResult};

// ============================================================================
// Mock window
// ============================================================================

struct WindowState {
    connected: bool,
    buffers: Vec<Arc<WindowBuffer>>,
    free: VecDeque<usize>,
    calls: Vec<String>,

    min_undequeued: i32,
    default_width: i32,
    default_height: i32,
    transform_hint: u32,
    refresh_period: (i64, i64),
    timestamps: HashMap<u32, FrameTimestamps>,

    width: u32,
    height: u32,
    format: PixelFormat,
    usage: BufferUsage,
    frame_timestamps_enabled: bool,
    next_handle: u64,

    next_dequeue_fences: VecDeque<OwnedFd>,
    dequeues: u32,
    fail_dequeue_at: Option<u32>,
    fail_queue: bool,
}

/// Recording NativeWindow double backed by an in-memory buffer pool
pub struct MockWindow {
    state: Mutex<WindowState>,
}

impl MockWindow {
    pub fn new() -> Arc<MockWindow> {
        Arc::new(MockWindow {
            state: Mutex::new(WindowState {
                connected: false,
                buffers: Vec::new(),
                free: VecDeque::new(),
                calls: Vec::new(),
                min_undequeued: 2,
                default_width: 1920,
                default_height: 1080,
                transform_hint: 0,
                refresh_period: (16_666_666, 16_666_667),
                timestamps: HashMap::new(),
                width: 0,
                height: 0,
                format: PixelFormat::Rgba8888,
                usage: BufferUsage::NONE,
                frame_timestamps_enabled: false,
                next_handle: 0x1000,
                next_dequeue_fences: VecDeque::new(),
                dequeues: 0,
                fail_dequeue_at: None,
                fail_queue: false,
            }),
        })
    }

    // ----- test configuration -----

    pub fn set_min_undequeued(&self, value: i32) {
        self.state.lock().unwrap().min_undequeued = value;
    }

    pub fn set_transform_hint(&self, hint: WindowTransform) {
        self.state.lock().unwrap().transform_hint = hint.bits();
    }

    pub fn set_refresh_period(&self, min: i64, max: i64) {
        self.state.lock().unwrap().refresh_period = (min, max);
    }

    /// Canned compositor report for the frame `frames_ago` back
    pub fn set_frame_timestamps(&self, frames_ago: u32, ts: FrameTimestamps) {
        self.state.lock().unwrap().timestamps.insert(frames_ago, ts);
    }

    /// Attach this fence to the next dequeue
    pub fn push_dequeue_fence(&self, fence: OwnedFd) {
        self.state.lock().unwrap().next_dequeue_fences.push_back(fence);
    }

    /// Fail the Nth dequeue from now (0 = the next one)
    pub fn fail_dequeue_at(&self, nth: u32) {
        let mut state = self.state.lock().unwrap();
        let at = state.dequeues + nth;
        state.fail_dequeue_at = Some(at);
    }

    pub fn fail_next_queue(&self, fail: bool) {
        self.state.lock().unwrap().fail_queue = fail;
    }

    /// Swap every pooled buffer for a fresh allocation, so subsequent
    /// dequeues return buffers no swapchain has seen.
    pub fn replace_buffers(&self) {
        let mut state = self.state.lock().unwrap();
        let count = state.buffers.len();
        rebuild_buffers(&mut state, count);
    }

    // ----- test inspection -----

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn call_count(&self, prefix: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }

    pub fn free_buffers(&self) -> usize {
        self.state.lock().unwrap().free.len()
    }

    pub fn timestamps_enabled(&self) -> bool {
        self.state.lock().unwrap().frame_timestamps_enabled
    }
}

fn rebuild_buffers(state: &mut WindowState, count: usize) {
    let mut buffers = Vec::with_capacity(count);
    for _ in 0..count {
        let handle = state.next_handle;
        state.next_handle += 1;
        buffers.push(Arc::new(WindowBuffer {
            width: state.width,
            height: state.height,
            stride: state.width,
            format: state.format,
            usage: state.usage,
            handle,
        }));
    }
    state.buffers = buffers;
    state.free = (0..count).collect();
}

impl NativeWindow for MockWindow {
    fn api_connect(&self, api: WindowApi) -> WindowResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("api_connect({:?})", api));
        if state.connected {
            return Err(WindowError::AlreadyConnected);
        }
        state.connected = true;
        Ok(())
    }

    fn api_disconnect(&self, api: WindowApi) -> WindowResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("api_disconnect({:?})", api));
        if !state.connected {
            return Err(WindowError::Disconnected);
        }
        state.connected = false;
        Ok(())
    }

    fn query(&self, what: WindowQuery) -> WindowResult<i32> {
        let state = self.state.lock().unwrap();
        Ok(match what {
            WindowQuery::MinUndequeuedBuffers => state.min_undequeued,
            WindowQuery::DefaultWidth => state.default_width,
            WindowQuery::DefaultHeight => state.default_height,
            WindowQuery::TransformHint => state.transform_hint as i32,
        })
    }

    fn set_swap_interval(&self, interval: i32) -> WindowResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("set_swap_interval({})", interval));
        Ok(())
    }

    fn set_buffer_count(&self, count: usize) -> WindowResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("set_buffer_count({})", count));
        rebuild_buffers(&mut state, count);
        Ok(())
    }

    fn set_buffers_format(&self, format: PixelFormat) -> WindowResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("set_buffers_format({:?})", format));
        state.format = format;
        Ok(())
    }

    fn set_buffers_data_space(&self, data_space: DataSpace) -> WindowResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("set_buffers_data_space({:?})", data_space));
        Ok(())
    }

    fn set_buffers_dimensions(&self, width: u32, height: u32) -> WindowResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("set_buffers_dimensions({},{})", width, height));
        state.width = width;
        state.height = height;
        Ok(())
    }

    fn set_buffers_transform(&self, transform: WindowTransform) -> WindowResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("set_buffers_transform({})", transform.bits()));
        Ok(())
    }

    fn set_scaling_mode(&self, mode: ScalingMode) -> WindowResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("set_scaling_mode({:?})", mode));
        Ok(())
    }

    fn set_usage(&self, usage: BufferUsage) -> WindowResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("set_usage({})", usage));
        state.usage = usage;
        Ok(())
    }

    fn set_shared_buffer_mode(&self, enabled: bool) -> WindowResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("set_shared_buffer_mode({})", enabled));
        Ok(())
    }

    fn set_auto_refresh(&self, enabled: bool) -> WindowResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("set_auto_refresh({})", enabled));
        Ok(())
    }

    fn dequeue_buffer(&self) -> WindowResult<(Arc<WindowBuffer>, Option<OwnedFd>)> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("dequeue_buffer".to_string());
        if state.fail_dequeue_at == Some(state.dequeues) {
            state.fail_dequeue_at = None;
            return Err(WindowError::NoBufferAvailable);
        }
        state.dequeues += 1;
        let Some(index) = state.free.pop_front() else {
            return Err(WindowError::NoBufferAvailable);
        };
        let buffer = state.buffers[index].clone();
        let fence = state.next_dequeue_fences.pop_front();
        Ok((buffer, fence))
    }

    fn queue_buffer(
        &self,
        buffer: &Arc<WindowBuffer>,
        release_fence: Option<OwnedFd>,
    ) -> WindowResult<()> {
        // The fence is consumed here, success or failure
        drop(release_fence);
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("queue_buffer({:#x})", buffer.handle));
        if state.fail_queue {
            state.fail_queue = false;
            return Err(WindowError::InvalidOperation("queue rejected".to_string()));
        }
        if let Some(index) = state.buffers.iter().position(|b| Arc::ptr_eq(b, buffer)) {
            state.free.push_back(index);
            Ok(())
        } else {
            Err(WindowError::InvalidOperation("unknown buffer".to_string()))
        }
    }

    fn cancel_buffer(
        &self,
        buffer: &Arc<WindowBuffer>,
        release_fence: Option<OwnedFd>,
    ) -> WindowResult<()> {
        drop(release_fence);
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("cancel_buffer({:#x})", buffer.handle));
        if let Some(index) = state.buffers.iter().position(|b| Arc::ptr_eq(b, buffer)) {
            state.free.push_front(index);
        }
        Ok(())
    }

    fn set_surface_damage(&self, rects: &[BufferRect]) -> WindowResult<()> {
        let mut state = self.state.lock().unwrap();
        let formatted: Vec<String> = rects
            .iter()
            .map(|r| format!("{{{},{},{},{}}}", r.left, r.top, r.right, r.bottom))
            .collect();
        state
            .calls
            .push(format!("set_surface_damage([{}])", formatted.join(",")));
        Ok(())
    }

    fn enable_frame_timestamps(&self, enabled: bool) {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("enable_frame_timestamps({})", enabled));
        state.frame_timestamps_enabled = enabled;
    }

    fn refresh_cycle_period(&self) -> (i64, i64) {
        self.state.lock().unwrap().refresh_period
    }

    fn frame_timestamps(&self, frames_ago: u32) -> WindowResult<FrameTimestamps> {
        let state = self.state.lock().unwrap();
        state
            .timestamps
            .get(&frames_ago)
            .copied()
            .ok_or_else(|| WindowError::InvalidOperation("no timestamps that far back".to_string()))
    }

    fn set_buffers_timestamp(&self, timestamp: i64) -> WindowResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("set_buffers_timestamp({})", timestamp));
        Ok(())
    }
}

// ============================================================================
// Mock driver
// ============================================================================

struct DriverState {
    next_image: u64,
    created: u32,
    destroyed: u32,
    acquires: u32,
    acquire_fences_received: u32,
    signals: u32,
    release_fences: VecDeque<OwnedFd>,
    fail_create_at: Option<u32>,
    fail_acquire: bool,
    fail_signal: Option<WsiError>,
    gralloc_v1: Option<BufferUsage>,
    gralloc_v2: Option<BufferUsage>,
    gralloc_v2_usage_seen: Option<SwapchainImageUsage>,
}

/// Recording GpuDriver double
pub struct MockDriver {
    state: Mutex<DriverState>,
}

impl MockDriver {
    pub fn new() -> Arc<MockDriver> {
        Arc::new(MockDriver {
            state: Mutex::new(DriverState {
                next_image: 0x8000_0000,
                created: 0,
                destroyed: 0,
                acquires: 0,
                acquire_fences_received: 0,
                signals: 0,
                release_fences: VecDeque::new(),
                fail_create_at: None,
                fail_acquire: false,
                fail_signal: None,
                gralloc_v1: None,
                gralloc_v2: None,
                gralloc_v2_usage_seen: None,
            }),
        })
    }

    // ----- test configuration -----

    /// Fail the Nth create_image from now (0 = the next one)
    pub fn fail_create_at(&self, nth: u32) {
        let mut state = self.state.lock().unwrap();
        let at = state.created + nth;
        state.fail_create_at = Some(at);
    }

    pub fn fail_next_acquire(&self, fail: bool) {
        self.state.lock().unwrap().fail_acquire = fail;
    }

    pub fn fail_next_signal(&self, err: WsiError) {
        self.state.lock().unwrap().fail_signal = Some(err);
    }

    /// Produce this fence from the next queue_signal_release_image
    pub fn push_release_fence(&self, fence: OwnedFd) {
        self.state.lock().unwrap().release_fences.push_back(fence);
    }

    pub fn set_gralloc_v1(&self, usage: BufferUsage) {
        self.state.lock().unwrap().gralloc_v1 = Some(usage);
    }

    pub fn set_gralloc_v2(&self, usage: BufferUsage) {
        self.state.lock().unwrap().gralloc_v2 = Some(usage);
    }

    // ----- test inspection -----

    pub fn images_created(&self) -> u32 {
        self.state.lock().unwrap().created
    }

    pub fn images_destroyed(&self) -> u32 {
        self.state.lock().unwrap().destroyed
    }

    pub fn live_images(&self) -> u32 {
        let state = self.state.lock().unwrap();
        state.created - state.destroyed
    }

    pub fn acquires(&self) -> u32 {
        self.state.lock().unwrap().acquires
    }

    pub fn acquire_fences_received(&self) -> u32 {
        self.state.lock().unwrap().acquire_fences_received
    }

    pub fn signals(&self) -> u32 {
        self.state.lock().unwrap().signals
    }

    pub fn gralloc_v2_usage_seen(&self) -> Option<SwapchainImageUsage> {
        self.state.lock().unwrap().gralloc_v2_usage_seen
    }
}

impl GpuDriver for MockDriver {
    fn create_image(&self, info: &SwapchainImageCreateInfo<'_>) -> WsiResult<vk::Image> {
        let mut state = self.state.lock().unwrap();
        if state.fail_create_at == Some(state.created) {
            return Err(WsiError::OutOfDeviceMemory);
        }
        // The buffer must already carry a platform handle the driver can
        // import
        assert!(info.buffer.handle != 0, "image created against an empty buffer");
        state.created += 1;
        let image = vk::Image::from_raw(state.next_image);
        state.next_image += 1;
        Ok(image)
    }

    fn destroy_image(&self, _image: vk::Image) {
        self.state.lock().unwrap().destroyed += 1;
    }

    fn acquire_image(
        &self,
        _image: vk::Image,
        fence: Option<OwnedFd>,
        _semaphore: vk::Semaphore,
        _signal_fence: vk::Fence,
    ) -> WsiResult<()> {
        // The fence is consumed here, success or failure
        let had_fence = fence.is_some();
        drop(fence);
        let mut state = self.state.lock().unwrap();
        if had_fence {
            state.acquire_fences_received += 1;
        }
        if state.fail_acquire {
            state.fail_acquire = false;
            return Err(WsiError::DeviceLost);
        }
        state.acquires += 1;
        Ok(())
    }

    fn queue_signal_release_image(
        &self,
        _queue: vk::Queue,
        _wait_semaphores: &[vk::Semaphore],
        _image: vk::Image,
    ) -> WsiResult<Option<OwnedFd>> {
        let mut state = self.state.lock().unwrap();
        if let Some(err) = state.fail_signal.take() {
            return Err(err);
        }
        state.signals += 1;
        Ok(state.release_fences.pop_front())
    }

    fn swapchain_gralloc_usage(
        &self,
        _format: vk::Format,
        _image_usage: vk::ImageUsageFlags,
    ) -> Option<WsiResult<BufferUsage>> {
        self.state.lock().unwrap().gralloc_v1.map(Ok)
    }

    fn swapchain_gralloc_usage2(
        &self,
        _format: vk::Format,
        _image_usage: vk::ImageUsageFlags,
        swapchain_usage: SwapchainImageUsage,
    ) -> Option<WsiResult<BufferUsage>> {
        let mut state = self.state.lock().unwrap();
        if state.gralloc_v2.is_some() {
            state.gralloc_v2_usage_seen = Some(swapchain_usage);
        }
        state.gralloc_v2.map(Ok)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "mock_window_tests.rs"]
mod tests;

//! NativeWindow trait and buffer-queue vocabulary types
//!
//! A NativeWindow is the producer end of a compositor buffer queue. The WSI
//! layer drives it through this trait: connect, configure, dequeue buffers
//! to render into, and queue them for composition. Concrete implementations
//! live with the platform integration; tests use recording mocks.

use std::fmt;
use std::ops::BitOr;
use std::os::fd::OwnedFd;
use std::sync::Arc;

use crate::error::WindowResult;
use crate::transform::WindowTransform;

/// Producer APIs that can connect to a window's buffer queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowApi {
    Egl,
    Cpu,
    Media,
    Camera,
}

/// Integer-valued window state queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowQuery {
    /// Number of buffers the consumer requires to stay undequeued
    MinUndequeuedBuffers,
    /// Default buffer width in pixels
    DefaultWidth,
    /// Default buffer height in pixels
    DefaultHeight,
    /// Transform the compositor would prefer buffers pre-rotated by
    TransformHint,
}

/// Pixel formats the buffer queue can allocate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 32-bit RGBA, 8 bits per channel
    Rgba8888,
    /// 16-bit packed RGB 5:6:5
    Rgb565,
}

/// Color data spaces a buffer's contents can be tagged with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSpace {
    Unknown,
    Srgb,
    SrgbLinear,
}

/// How the compositor scales buffers that do not match the window size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalingMode {
    Freeze,
    ScaleToWindow,
    ScaleCrop,
}

/// Bit-encoded buffer allocation usage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BufferUsage(u64);

impl BufferUsage {
    pub const NONE: BufferUsage = BufferUsage(0);
    /// The GPU renders into the buffer
    pub const HW_RENDER: BufferUsage = BufferUsage(1 << 9);
    /// The GPU samples the buffer as a texture
    pub const HW_TEXTURE: BufferUsage = BufferUsage(1 << 8);

    pub const fn from_bits(bits: u64) -> BufferUsage {
        BufferUsage(bits)
    }

    pub const fn bits(self) -> u64 {
        self.0
    }
}

impl BitOr for BufferUsage {
    type Output = BufferUsage;

    fn bitor(self, rhs: BufferUsage) -> BufferUsage {
        BufferUsage(self.0 | rhs.0)
    }
}

impl fmt::Display for BufferUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// A rectangle in the window's coordinate convention: origin at the
/// bottom-left, `top > bottom`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BufferRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

/// Per-frame timestamps reported back by the compositor.
///
/// All values are nanoseconds on the compositor's clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameTimestamps {
    /// The time the producer asked the frame to be presented at
    pub desired_present_time: i64,
    /// When rendering into the frame's buffer finished
    pub render_complete_time: i64,
    /// When the compositor latched the frame for composition
    pub composition_latch_time: i64,
    /// When the frame actually reached the display
    pub actual_present_time: i64,
}

/// A buffer owned by the window's queue.
///
/// The WSI layer holds strong references to buffers only while they are
/// dequeued (or bound to a live swapchain image); identity is reference
/// identity, compared with `Arc::ptr_eq`.
#[derive(Debug)]
pub struct WindowBuffer {
    pub width: u32,
    pub height: u32,
    /// Row stride in pixels
    pub stride: u32,
    pub format: PixelFormat,
    pub usage: BufferUsage,
    /// Opaque platform handle for the backing allocation
    pub handle: u64,
}

/// The producer/consumer buffer queue the WSI layer drives.
///
/// Fence ownership rules: `dequeue_buffer` transfers a freshly-owned fence
/// to the caller; `queue_buffer` and `cancel_buffer` consume the fence they
/// are given unconditionally, success or failure.
pub trait NativeWindow: Send + Sync {
    // ----- connection -----

    /// Connect a producer API to the buffer queue
    fn api_connect(&self, api: WindowApi) -> WindowResult<()>;

    /// Disconnect a producer API; outstanding dequeued buffers are orphaned
    fn api_disconnect(&self, api: WindowApi) -> WindowResult<()>;

    // ----- configuration -----

    /// Query an integer window property
    fn query(&self, what: WindowQuery) -> WindowResult<i32>;

    /// Presentation interval in refresh cycles: 0 = replace pending
    /// buffers (mailbox), 1 = queue behind them (fifo)
    fn set_swap_interval(&self, interval: i32) -> WindowResult<()>;

    /// Resize the buffer pool. 0 restores the queue default; dequeueing
    /// every buffer is only legal immediately after that reset.
    fn set_buffer_count(&self, count: usize) -> WindowResult<()>;

    fn set_buffers_format(&self, format: PixelFormat) -> WindowResult<()>;

    fn set_buffers_data_space(&self, data_space: DataSpace) -> WindowResult<()>;

    fn set_buffers_dimensions(&self, width: u32, height: u32) -> WindowResult<()>;

    /// Transform the compositor should apply to queued buffers
    fn set_buffers_transform(&self, transform: WindowTransform) -> WindowResult<()>;

    fn set_scaling_mode(&self, mode: ScalingMode) -> WindowResult<()>;

    /// Usage bits buffers must be allocated with
    fn set_usage(&self, usage: BufferUsage) -> WindowResult<()>;

    /// Front-buffer rendering: producer and consumer share one buffer
    fn set_shared_buffer_mode(&self, enabled: bool) -> WindowResult<()>;

    /// Recomposite the shared buffer every refresh without explicit queues
    fn set_auto_refresh(&self, enabled: bool) -> WindowResult<()>;

    // ----- buffer rotation -----

    /// Dequeue a free buffer for rendering.
    ///
    /// The returned fence (if any) signals when the consumer is done
    /// reading the buffer; the caller owns it.
    fn dequeue_buffer(&self) -> WindowResult<(Arc<WindowBuffer>, Option<OwnedFd>)>;

    /// Queue a dequeued buffer for composition.
    ///
    /// `release_fence` signals when the producer's writes are complete.
    /// The fence is consumed, success or failure.
    fn queue_buffer(
        &self,
        buffer: &Arc<WindowBuffer>,
        release_fence: Option<OwnedFd>,
    ) -> WindowResult<()>;

    /// Return a dequeued buffer without presenting it.
    ///
    /// The fence is consumed, success or failure.
    fn cancel_buffer(
        &self,
        buffer: &Arc<WindowBuffer>,
        release_fence: Option<OwnedFd>,
    ) -> WindowResult<()>;

    // ----- hints and timing -----

    /// Regions of the next queued buffer that differ from the previous one
    fn set_surface_damage(&self, rects: &[BufferRect]) -> WindowResult<()>;

    /// Start or stop collecting per-frame timestamps
    fn enable_frame_timestamps(&self, enabled: bool);

    /// Shortest and longest display refresh periods, in nanoseconds
    fn refresh_cycle_period(&self) -> (i64, i64);

    /// Timestamps for the frame queued `frames_ago` frames before the most
    /// recent one. Fails when the history does not reach that far back.
    fn frame_timestamps(&self, frames_ago: u32) -> WindowResult<FrameTimestamps>;

    /// Desired presentation time stamped on the next queued buffer
    fn set_buffers_timestamp(&self, timestamp: i64) -> WindowResult<()>;
}

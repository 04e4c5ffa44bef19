/*!
# Aurora Window

Native window and buffer-queue abstraction for the Aurora WSI layer.

This crate provides the platform-agnostic API the WSI layer drives: the
`NativeWindow` producer/consumer buffer-queue trait and its vocabulary
types, the native transform algebra, fence-descriptor utilities, and the
logging subsystem shared by the whole workspace.

Backend implementations (a compositor client, a test double, etc.) provide
concrete types that implement the `NativeWindow` trait.
*/

// Error types for window operations
pub mod error;

// Fence descriptor utilities (dup, wait, ownership rules)
pub mod fence;

// Logging system (Logger trait, severities, macros)
pub mod log;

// Native transform bits and composition algebra
pub mod transform;

// NativeWindow trait and buffer-queue vocabulary types
pub mod window;

// Re-export the common types at the crate root
pub use error::{WindowError, WindowResult};
pub use transform::WindowTransform;
pub use window::*;

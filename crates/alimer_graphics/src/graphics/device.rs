//! Backend-agnostic device interface
//!
//! Applications talk to a `GraphicsDevice` once per logical frame:
//!
//! ```text
//! if device.begin_frame()? {
//!     // record work into the frame's command buffer
//!     device.end_frame()?;
//!     device.present(vertical_sync)?;
//! }
//! ```
//!
//! `begin_frame` returning `Ok(false)` means "skip rendering this frame", for example while
//! the window is minimized or right after the swapchain had to be rebuilt.

use super::capabilities::GraphicsDeviceCapabilities;
use super::error::GraphicsResult;
use super::types::{BackendType, Color, Extent2D};

/// A logical GPU device bound to one backend
pub trait GraphicsDevice {
    /// Backend this device runs on
    fn backend_type(&self) -> BackendType;

    /// Adapter capabilities captured at creation
    fn capabilities(&self) -> &GraphicsDeviceCapabilities;

    /// Start a frame
    ///
    /// # Returns
    /// `Ok(true)` when a backbuffer was acquired and recording may begin, `Ok(false)` when
    /// the caller should skip the frame.
    fn begin_frame(&mut self) -> GraphicsResult<bool>;

    /// Finish recording and submit the frame's work
    fn end_frame(&mut self) -> GraphicsResult<()>;

    /// Present the submitted frame
    ///
    /// # Arguments
    /// * `vertical_sync` - Presentation mode for subsequent frames; a change rebuilds the
    ///   swapchain after this present
    fn present(&mut self, vertical_sync: bool) -> GraphicsResult<()>;

    /// Clear the current backbuffer
    fn clear(&mut self, color: Color) -> GraphicsResult<()>;

    /// Block until the GPU is idle
    fn wait_for_gpu(&self) -> GraphicsResult<()>;

    /// Notify the device that the window changed size
    fn resize(&mut self, extent: Extent2D) -> GraphicsResult<()>;

    /// Number of frames completed so far
    fn frame_count(&self) -> u64;
}

//! # Alimer Graphics
//!
//! A cross-backend GPU device layer. One logical [`GraphicsDevice`] API is exposed while the
//! work is carried by a backend implementation; Vulkan is the complete one.
//!
//! ## Features
//!
//! - **Adapter selection**: scores every suitable physical device against a power preference
//! - **Device construction**: graphics/compute/copy queue resolution with shared-family fallback
//! - **Frame lifecycle**: per-image fences, command pools, acquire/release semaphores
//! - **Deferred destruction**: resources are released only once the GPU is done with them
//! - **Swapchain recovery**: transparent recreation on suboptimal/out-of-date presentation
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use alimer_graphics::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     alimer_graphics::foundation::logging::init();
//!
//!     let descriptor = DeviceDescriptor::default()
//!         .with_application_name("Headless")
//!         .with_headless(true);
//!     let device = BackendRegistry::create_device(&descriptor, None)?;
//!
//!     log::info!("Running on {}", device.capabilities().adapter_name);
//!     device.wait_for_gpu()?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod foundation;
pub mod config;
pub mod graphics;
pub mod backends;

/// Common imports for device users
pub mod prelude {
    pub use crate::{
        config::{Config, ConfigError},
        graphics::{
            AdapterType, BackendRegistry, BackendType, Color, DeviceDescriptor, Extent2D,
            GraphicsDevice, GraphicsDeviceCapabilities, GraphicsError, GraphicsFeatures,
            GraphicsLimits, GraphicsResult, LoadAction, PixelFormat, PowerPreference,
            SwapchainDescriptor,
        },
        backends::vulkan::{SurfaceSource, VulkanGraphicsDevice},
    };
}

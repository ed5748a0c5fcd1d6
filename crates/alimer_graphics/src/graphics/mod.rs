//! Backend-neutral graphics interface
//!
//! Types here are what the rest of an engine sees. Backend modules translate them to native
//! objects.

pub mod capabilities;
pub mod descriptor;
pub mod device;
pub mod error;
pub mod format;
pub mod registry;
pub mod types;

pub use capabilities::{GraphicsDeviceCapabilities, GraphicsFeatures, GraphicsLimits};
pub use descriptor::{DeviceDescriptor, SwapchainDescriptor};
pub use device::GraphicsDevice;
pub use error::{GraphicsError, GraphicsResult, ProbeError};
pub use format::PixelFormat;
pub use registry::{BackendCapabilities, BackendRegistry};
pub use types::{AdapterType, BackendType, Color, Extent2D, LoadAction, PowerPreference};

//! Graphics error types

use ash::vk;
use thiserror::Error;

use super::types::BackendType;

/// Errors produced by device, swapchain and frame operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphicsError {
    /// No physical device passed the suitability filter
    #[error("No suitable graphics adapter found")]
    NoSuitableAdapter,

    /// The logical device could not be created
    #[error("Device creation failed: {0:?}")]
    DeviceCreationFailed(vk::Result),

    /// The swapchain could not be created or its images retrieved
    #[error("Swapchain creation failed: {0:?}")]
    SwapchainCreationFailed(vk::Result),

    /// The presentation surface is gone
    #[error("Presentation surface lost")]
    SurfaceLost,

    /// Device or host memory allocation failed
    #[error("Allocation failed: {0:?}")]
    AllocationFailed(vk::Result),

    /// The device was lost; nothing created from it is usable anymore
    #[error("Device lost")]
    DeviceLost,

    /// Loader, instance or allocator setup failed
    #[error("Initialization failed: {0}")]
    Initialization(String),

    /// The requested backend cannot run on this machine
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(BackendType),

    /// Invalid operation attempted
    #[error("Invalid operation: {reason}")]
    InvalidOperation {
        /// Description of why the operation is invalid
        reason: String,
    },

    /// Any other native API failure
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),
}

impl GraphicsError {
    /// Classify a native result code
    pub fn from_vk(result: vk::Result) -> Self {
        match result {
            vk::Result::ERROR_DEVICE_LOST => Self::DeviceLost,
            vk::Result::ERROR_SURFACE_LOST_KHR => Self::SurfaceLost,
            vk::Result::ERROR_OUT_OF_HOST_MEMORY
            | vk::Result::ERROR_OUT_OF_DEVICE_MEMORY
            | vk::Result::ERROR_OUT_OF_POOL_MEMORY => Self::AllocationFailed(result),
            other => Self::Api(other),
        }
    }

    /// Whether the device must be torn down after this error
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::DeviceLost | Self::NoSuitableAdapter | Self::DeviceCreationFailed(_) | Self::Initialization(_)
        )
    }
}

impl From<vk::Result> for GraphicsError {
    fn from(result: vk::Result) -> Self {
        Self::from_vk(result)
    }
}

/// Result type for graphics operations
pub type GraphicsResult<T> = Result<T, GraphicsError>;

/// Why a backend probe failed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    /// The native loader library could not be opened
    #[error("Graphics loader unavailable: {0}")]
    LoaderUnavailable(String),

    /// The loader is older than the minimum supported API
    #[error("Unsupported instance API version {found:#x}")]
    UnsupportedApiVersion {
        /// Version reported by the loader
        found: u32,
    },

    /// A throwaway instance could not be created
    #[error("Test instance creation failed: {0:?}")]
    InstanceCreationFailed(vk::Result),

    /// The backend exists only as a placeholder
    #[error("{0} backend is not implemented")]
    NotImplemented(BackendType),
}

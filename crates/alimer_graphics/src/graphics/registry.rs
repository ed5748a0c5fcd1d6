//! Backend availability and device factory
//!
//! Probing a backend loads its driver and creates a throwaway instance, which is slow and
//! only needs to happen once per process. Results are cached per backend.

use std::sync::OnceLock;

use super::descriptor::DeviceDescriptor;
use super::device::GraphicsDevice;
use super::error::{GraphicsError, GraphicsResult, ProbeError};
use super::types::BackendType;
use crate::backends::vulkan::{self, SurfaceSource, VulkanGraphicsDevice};

/// What a successful probe learned about a backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendCapabilities {
    /// Backend that was probed
    pub backend: BackendType,
    /// Highest API version the loader supports, packed the Vulkan way
    pub api_version: u32,
    /// Whether validation layers can be enabled
    pub validation_available: bool,
}

static VULKAN_PROBE: OnceLock<Result<BackendCapabilities, ProbeError>> = OnceLock::new();

/// Process-wide registry of graphics backends
pub struct BackendRegistry;

impl BackendRegistry {
    /// Probe a backend, caching the result for the life of the process
    pub fn probe(backend: BackendType) -> Result<BackendCapabilities, ProbeError> {
        match backend {
            BackendType::Vulkan => VULKAN_PROBE.get_or_init(vulkan::probe).clone(),
            other => Err(ProbeError::NotImplemented(other)),
        }
    }

    /// Whether a backend can create devices on this machine
    pub fn is_available(backend: BackendType) -> bool {
        Self::probe(backend).is_ok()
    }

    /// All usable backends in preference order
    pub fn available_backends() -> Vec<BackendType> {
        BackendType::ALL
            .into_iter()
            .filter(|backend| Self::is_available(*backend))
            .collect()
    }

    /// The most preferred usable backend
    pub fn default_backend() -> Option<BackendType> {
        Self::available_backends().into_iter().next()
    }

    /// Create a device on the default backend
    ///
    /// # Arguments
    /// * `descriptor` - Device settings
    /// * `surface` - Window to present to, `None` for headless
    pub fn create_device(
        descriptor: &DeviceDescriptor,
        surface: Option<&mut dyn SurfaceSource>,
    ) -> GraphicsResult<Box<dyn GraphicsDevice>> {
        let backend = Self::default_backend().ok_or(GraphicsError::BackendUnavailable(BackendType::Vulkan))?;
        Self::create_device_with(backend, descriptor, surface)
    }

    /// Create a device on a specific backend
    pub fn create_device_with(
        backend: BackendType,
        descriptor: &DeviceDescriptor,
        surface: Option<&mut dyn SurfaceSource>,
    ) -> GraphicsResult<Box<dyn GraphicsDevice>> {
        if let Err(err) = Self::probe(backend) {
            log::error!("{} backend unavailable: {}", backend, err);
            return Err(GraphicsError::BackendUnavailable(backend));
        }

        match backend {
            BackendType::Vulkan => Ok(Box::new(VulkanGraphicsDevice::new(descriptor, surface)?)),
            other => Err(GraphicsError::BackendUnavailable(other)),
        }
    }
}

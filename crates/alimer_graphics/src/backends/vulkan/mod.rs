//! Vulkan backend
//!
//! Layering, bottom to top:
//!
//! - [`instance`], [`surface`], [`adapter`], [`queue`], [`extensions`]: loader and physical
//!   device discovery
//! - [`device`]: the logical device and allocator, implementing [`DeviceApi`]
//! - [`sync`], [`command_pool`], [`frame`]: recyclable primitives and per-image frame slots
//! - [`swapchain`], [`render_pass_cache`]: presentation and cached render targets
//! - [`graphics_device`]: the [`crate::graphics::GraphicsDevice`] implementation

pub mod adapter;
pub mod api;
pub mod command_pool;
pub mod device;
pub mod extensions;
pub mod frame;
pub mod graphics_device;
pub mod instance;
pub mod queue;
pub mod render_pass_cache;
pub mod surface;
pub mod swapchain;
pub mod sync;

#[cfg(test)]
pub(crate) mod testing;

pub use adapter::Adapter;
pub use api::{DeviceApi, QueueSubmit};
pub use command_pool::CommandPool;
pub use device::{DeviceQueues, LogicalDevice};
pub use frame::{DeferredRelease, PerFrame, ResourceKind};
pub use graphics_device::{FrameRenderer, VulkanGraphicsDevice};
pub use instance::VulkanInstance;
pub use render_pass_cache::{AttachmentKey, RenderPassCache, RenderPassKey};
pub use surface::{RawWindowTarget, Surface, SurfaceSource};
pub use swapchain::{BackBuffer, SwapchainManager, SwapchainState};
pub use sync::{FencePool, SemaphorePool, SemaphoreRecycler};

use ash::vk;

use crate::graphics::{BackendCapabilities, BackendType, ProbeError};

/// Check that a usable Vulkan loader is present
///
/// Loads the loader, checks it reports at least Vulkan 1.1 and creates (then destroys) a
/// bare instance. Prefer [`crate::graphics::BackendRegistry::probe`], which caches the result.
pub fn probe() -> Result<BackendCapabilities, ProbeError> {
    let entry = unsafe { ash::Entry::load() }.map_err(|e| ProbeError::LoaderUnavailable(e.to_string()))?;

    let api_version = instance::loader_version(&entry);
    if api_version < vk::API_VERSION_1_1 {
        return Err(ProbeError::UnsupportedApiVersion { found: api_version });
    }

    let app_info = vk::ApplicationInfo::builder()
        .application_name(c"Alimer")
        .engine_name(c"Alimer")
        .api_version(api_version);
    let create_info = vk::InstanceCreateInfo::builder().application_info(&app_info);

    let instance =
        unsafe { entry.create_instance(&create_info, None) }.map_err(ProbeError::InstanceCreationFailed)?;
    unsafe { instance.destroy_instance(None) };

    let capabilities = BackendCapabilities {
        backend: BackendType::Vulkan,
        api_version,
        validation_available: instance::validation_layer_available(&entry),
    };
    log::debug!(
        "Vulkan backend available, loader version {}",
        adapter::version_string(api_version)
    );
    Ok(capabilities)
}

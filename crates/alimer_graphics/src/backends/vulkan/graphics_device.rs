//! Vulkan implementation of [`GraphicsDevice`]
//!
//! [`VulkanGraphicsDevice`] wires instance, surface, adapter, logical device and the
//! presentation path together. The presentation path itself lives in [`FrameRenderer`],
//! which is generic over [`DeviceApi`] like the rest of the frame machinery.

use std::sync::Arc;

use ash::vk;

use super::adapter::{enumerate_adapters, select_adapter, Adapter};
use super::api::DeviceApi;
use super::device::LogicalDevice;
use super::frame::{DeferredRelease, PerFrame};
use super::instance::VulkanInstance;
use super::render_pass_cache::{AttachmentKey, RenderPassCache, RenderPassKey};
use super::surface::{Surface, SurfaceSource};
use super::swapchain::SwapchainManager;
use crate::graphics::{
    BackendType, Color, DeviceDescriptor, Extent2D, GraphicsDevice, GraphicsDeviceCapabilities, GraphicsError,
    GraphicsResult, LoadAction,
};

/// Swapchain plus the render pass and framebuffer caches that draw into it
pub struct FrameRenderer<D: DeviceApi> {
    device: Arc<D>,
    swapchain: SwapchainManager<D>,
    cache: RenderPassCache<D>,
    // Swapchain generation the cached framebuffers were built against
    framebuffer_generation: u64,
}

impl<D: DeviceApi> FrameRenderer<D> {
    /// Wrap a swapchain manager
    pub fn new(device: Arc<D>, swapchain: SwapchainManager<D>) -> Self {
        Self {
            cache: RenderPassCache::new(device.clone()),
            framebuffer_generation: swapchain.generation(),
            device,
            swapchain,
        }
    }

    /// Framebuffers reference backbuffer views, so they go whenever the swapchain is rebuilt
    fn sync_framebuffers(&mut self) {
        let current = self.swapchain.generation();
        if current != self.framebuffer_generation {
            self.cache.clear_framebuffers();
            self.framebuffer_generation = current;
        }
    }

    /// Acquire the next backbuffer; `Ok(false)` means skip the frame
    pub fn begin_frame(&mut self) -> GraphicsResult<bool> {
        let result = self.swapchain.begin_frame();
        self.sync_framebuffers();
        result
    }

    /// End recording and submit
    pub fn end_frame(&mut self) -> GraphicsResult<()> {
        self.swapchain.end_frame()
    }

    /// Present, switching presentation mode first if `vertical_sync` changed
    pub fn present(&mut self, vertical_sync: bool) -> GraphicsResult<()> {
        self.swapchain.set_vertical_sync(vertical_sync);
        let result = self.swapchain.present();
        self.sync_framebuffers();
        result
    }

    /// Record a clear of the current backbuffer, and of the depth buffer when there is one
    pub fn clear_backbuffer(&mut self, color: Color) -> GraphicsResult<()> {
        if !self.swapchain.is_frame_active() {
            return Err(GraphicsError::InvalidOperation {
                reason: "Clear outside of a frame, call begin_frame first".to_string(),
            });
        }
        let back_buffer = *self.swapchain.current_back_buffer().ok_or_else(|| GraphicsError::InvalidOperation {
            reason: "No backbuffer acquired".to_string(),
        })?;

        self.swapchain.transition_back_buffer(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);

        let depth = self.swapchain.depth_attachment();
        let key = RenderPassKey {
            colors: vec![AttachmentKey::new(self.swapchain.surface_format().format, LoadAction::Clear)],
            depth_stencil: depth.map(|(_, format)| AttachmentKey::new(format, LoadAction::Clear)),
        };
        let render_pass = self.cache.get_render_pass(&key)?;

        let mut attachments = vec![back_buffer.view];
        attachments.extend(depth.map(|(view, _)| view));
        let extent = self.swapchain.extent();
        let framebuffer = self.cache.get_framebuffer(render_pass, &attachments, extent)?;

        let mut clear_values = vec![vk::ClearValue {
            color: vk::ClearColorValue {
                float32: color.to_array(),
            },
        }];
        if depth.is_some() {
            clear_values.push(vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue { depth: 1.0, stencil: 0 },
            });
        }

        let command_buffer = self.swapchain.command_buffer();
        self.device
            .cmd_begin_render_pass(command_buffer, render_pass, framebuffer, extent, &clear_values);
        self.device.cmd_end_render_pass(command_buffer);
        Ok(())
    }

    /// Request a new backbuffer size
    pub fn resize(&mut self, extent: Extent2D) {
        self.swapchain.resize(extent);
    }

    /// Queue a resource for release once the current frame completes
    pub fn defer_release(&mut self, release: DeferredRelease<D::Allocation>) -> GraphicsResult<()> {
        self.swapchain.defer_release(release)
    }

    /// Swapchain manager
    pub fn swapchain(&self) -> &SwapchainManager<D> {
        &self.swapchain
    }

    /// Mutable swapchain manager
    pub fn swapchain_mut(&mut self) -> &mut SwapchainManager<D> {
        &mut self.swapchain
    }

    /// Render pass and framebuffer cache
    pub fn cache(&self) -> &RenderPassCache<D> {
        &self.cache
    }

    /// Tear down frames, recycled semaphores and the swapchain
    pub fn destroy_swapchain(&mut self) {
        self.swapchain.destroy();
    }

    /// Destroy cached render passes, then framebuffers
    pub fn clear_caches(&mut self) {
        self.cache.clear_render_passes();
        self.cache.clear_framebuffers();
    }
}

/// Vulkan device
///
/// Fields are declared in teardown order; `Drop` handles the parts that need an explicit
/// sequence before the logical device and instance go.
pub struct VulkanGraphicsDevice {
    renderer: Option<FrameRenderer<LogicalDevice>>,
    surface: Option<Surface>,
    device: Arc<LogicalDevice>,
    adapter: Adapter,
    capabilities: GraphicsDeviceCapabilities,
    instance: VulkanInstance,
}

impl VulkanGraphicsDevice {
    /// Create a device
    ///
    /// # Arguments
    /// * `descriptor` - Device and swapchain settings
    /// * `surface` - Window to present to; ignored when the descriptor is headless
    pub fn new(descriptor: &DeviceDescriptor, surface: Option<&mut dyn SurfaceSource>) -> GraphicsResult<Self> {
        descriptor.validate().map_err(GraphicsError::Initialization)?;

        let mut source = if descriptor.headless { None } else { surface };
        if !descriptor.headless && source.is_none() {
            log::info!("No surface source given, creating a headless device");
        }

        let surface_extensions = match &source {
            Some(source) => source.required_instance_extensions()?,
            None => Vec::new(),
        };
        let instance = VulkanInstance::new(
            &descriptor.application_name,
            &surface_extensions,
            descriptor.enable_validation,
        )?;

        let surface = match source.as_deref_mut() {
            Some(source) => Some(Surface::new(instance.entry(), instance.instance(), source)?),
            None => None,
        };

        let adapters = enumerate_adapters(
            instance.instance(),
            surface.as_ref().map(|surface| (surface.loader(), surface.handle())),
        )?;
        let adapter = select_adapter(adapters, descriptor.power_preference)?;
        let capabilities = adapter.capabilities();

        let device = Arc::new(LogicalDevice::new(&instance, &adapter, surface.is_none())?);

        let renderer = match (&surface, &source) {
            (Some(surface), Some(source)) => {
                let mut swapchain_descriptor = descriptor.swapchain.clone();
                if swapchain_descriptor.extent.is_empty() {
                    swapchain_descriptor.extent = source.framebuffer_extent();
                }
                let swapchain = SwapchainManager::new(
                    device.clone(),
                    surface.handle(),
                    device.queues().graphics,
                    device.graphics_family(),
                    swapchain_descriptor,
                )?;
                Some(FrameRenderer::new(device.clone(), swapchain))
            }
            _ => None,
        };

        Ok(Self {
            renderer,
            surface,
            device,
            adapter,
            capabilities,
            instance,
        })
    }

    /// Record a clear of the current backbuffer
    pub fn clear_backbuffer(&mut self, color: Color) -> GraphicsResult<()> {
        self.renderer_mut()?.clear_backbuffer(color)
    }

    /// Queue a resource for release once the GPU is done with the current frame
    ///
    /// Headless devices have no frames; the device is drained and the resource released
    /// immediately.
    pub fn defer_release(&mut self, release: DeferredRelease<vk_mem::Allocation>) -> GraphicsResult<()> {
        match &mut self.renderer {
            Some(renderer) => renderer.defer_release(release),
            None => {
                self.device.device_wait_idle().map_err(GraphicsError::from_vk)?;
                release.release(self.device.as_ref());
                Ok(())
            }
        }
    }

    /// Extra fence from the current frame's pool
    pub fn request_fence(&mut self) -> GraphicsResult<vk::Fence> {
        self.current_frame()?.request_fence()
    }

    /// Extra semaphore from the current frame's pool
    pub fn request_semaphore(&mut self) -> GraphicsResult<vk::Semaphore> {
        self.current_frame()?.request_semaphore()
    }

    /// Primary command buffer of the current frame, null outside a frame
    pub fn command_buffer(&self) -> vk::CommandBuffer {
        self.renderer
            .as_ref()
            .map_or(vk::CommandBuffer::null(), |renderer| renderer.swapchain().command_buffer())
    }

    /// Logical device
    pub fn logical_device(&self) -> &Arc<LogicalDevice> {
        &self.device
    }

    /// Selected adapter
    pub fn adapter(&self) -> &Adapter {
        &self.adapter
    }

    /// Instance
    pub fn instance(&self) -> &VulkanInstance {
        &self.instance
    }

    /// Swapchain manager, `None` when headless
    pub fn swapchain(&self) -> Option<&SwapchainManager<LogicalDevice>> {
        self.renderer.as_ref().map(FrameRenderer::swapchain)
    }

    /// Whether the device presents to a surface
    pub fn is_headless(&self) -> bool {
        self.renderer.is_none()
    }

    fn renderer_mut(&mut self) -> GraphicsResult<&mut FrameRenderer<LogicalDevice>> {
        self.renderer.as_mut().ok_or_else(|| GraphicsError::InvalidOperation {
            reason: "Headless device has no backbuffer".to_string(),
        })
    }

    fn current_frame(&mut self) -> GraphicsResult<&mut PerFrame<LogicalDevice>> {
        self.renderer_mut()?
            .swapchain_mut()
            .current_frame_mut()
            .ok_or_else(|| GraphicsError::InvalidOperation {
                reason: "No frame slot available".to_string(),
            })
    }
}

impl GraphicsDevice for VulkanGraphicsDevice {
    fn backend_type(&self) -> BackendType {
        BackendType::Vulkan
    }

    fn capabilities(&self) -> &GraphicsDeviceCapabilities {
        &self.capabilities
    }

    fn begin_frame(&mut self) -> GraphicsResult<bool> {
        match &mut self.renderer {
            Some(renderer) => renderer.begin_frame(),
            None => Ok(false),
        }
    }

    fn end_frame(&mut self) -> GraphicsResult<()> {
        match &mut self.renderer {
            Some(renderer) => renderer.end_frame(),
            None => Ok(()),
        }
    }

    fn present(&mut self, vertical_sync: bool) -> GraphicsResult<()> {
        match &mut self.renderer {
            Some(renderer) => renderer.present(vertical_sync),
            None => Ok(()),
        }
    }

    fn clear(&mut self, color: Color) -> GraphicsResult<()> {
        self.clear_backbuffer(color)
    }

    fn wait_for_gpu(&self) -> GraphicsResult<()> {
        self.device.device_wait_idle().map_err(GraphicsError::from_vk)
    }

    fn resize(&mut self, extent: Extent2D) -> GraphicsResult<()> {
        if let Some(renderer) = &mut self.renderer {
            renderer.resize(extent);
        }
        Ok(())
    }

    fn frame_count(&self) -> u64 {
        self.renderer
            .as_ref()
            .map_or(0, |renderer| renderer.swapchain().frame_count())
    }
}

impl Drop for VulkanGraphicsDevice {
    fn drop(&mut self) {
        if let Err(err) = self.device.device_wait_idle() {
            log::warn!("Wait idle failed during device teardown: {:?}", err);
        }

        if let Some(renderer) = &mut self.renderer {
            renderer.destroy_swapchain();
        }
        if let Some(surface) = &mut self.surface {
            surface.destroy();
        }
        if let Some(renderer) = &mut self.renderer {
            renderer.clear_caches();
        }
        self.renderer = None;

        if Arc::strong_count(&self.device) > 1 {
            log::warn!("Logical device still referenced at teardown");
        }
        // Remaining fields drop in order: allocator and device, then messenger and instance.
    }
}

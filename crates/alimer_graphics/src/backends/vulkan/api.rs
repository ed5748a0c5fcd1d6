//! Device command surface used by the frame machinery
//!
//! Pools, frames, the swapchain manager and the render pass cache only ever talk to the GPU
//! through [`DeviceApi`]. [`super::LogicalDevice`] implements it with `ash`; tests implement
//! it with a recording fake so lifecycle rules can be checked without a driver.
//!
//! Every method mirrors one native call. Destroy calls on null handles are the caller's bug,
//! not something implementations need to tolerate.

use ash::prelude::VkResult;
use ash::vk;

/// One command buffer submission with optional wait/signal semaphores
///
/// Null semaphores are left out of the native submit.
#[derive(Debug, Clone, Copy)]
pub struct QueueSubmit {
    /// Command buffer to execute
    pub command_buffer: vk::CommandBuffer,
    /// Semaphore to wait on before `wait_stage`
    pub wait_semaphore: vk::Semaphore,
    /// Pipeline stage that waits
    pub wait_stage: vk::PipelineStageFlags,
    /// Semaphore signaled on completion
    pub signal_semaphore: vk::Semaphore,
}

/// Native device operations
pub trait DeviceApi {
    /// Memory allocation handle returned by the allocator
    type Allocation;

    // Synchronization

    /// Create a fence, optionally already signaled
    fn create_fence(&self, signaled: bool) -> VkResult<vk::Fence>;
    /// Destroy a fence
    fn destroy_fence(&self, fence: vk::Fence);
    /// Wait until all fences are signaled or `timeout` nanoseconds pass
    fn wait_for_fences(&self, fences: &[vk::Fence], timeout: u64) -> VkResult<()>;
    /// Return fences to the unsignaled state
    fn reset_fences(&self, fences: &[vk::Fence]) -> VkResult<()>;
    /// Create a binary semaphore
    fn create_semaphore(&self) -> VkResult<vk::Semaphore>;
    /// Destroy a semaphore
    fn destroy_semaphore(&self, semaphore: vk::Semaphore);
    /// Block until the whole device is idle
    fn device_wait_idle(&self) -> VkResult<()>;

    // Command buffers

    /// Create a command pool for a queue family
    fn create_command_pool(
        &self,
        queue_family_index: u32,
        flags: vk::CommandPoolCreateFlags,
    ) -> VkResult<vk::CommandPool>;
    /// Reset a command pool, recycling every buffer allocated from it
    fn reset_command_pool(&self, pool: vk::CommandPool) -> VkResult<()>;
    /// Destroy a command pool
    fn destroy_command_pool(&self, pool: vk::CommandPool);
    /// Allocate one command buffer
    fn allocate_command_buffer(
        &self,
        pool: vk::CommandPool,
        level: vk::CommandBufferLevel,
    ) -> VkResult<vk::CommandBuffer>;
    /// Free command buffers back to their pool
    fn free_command_buffers(&self, pool: vk::CommandPool, buffers: &[vk::CommandBuffer]);
    /// Begin recording
    fn begin_command_buffer(
        &self,
        buffer: vk::CommandBuffer,
        flags: vk::CommandBufferUsageFlags,
    ) -> VkResult<()>;
    /// End recording
    fn end_command_buffer(&self, buffer: vk::CommandBuffer) -> VkResult<()>;
    /// Submit work to a queue, signaling `fence` on completion
    fn queue_submit(&self, queue: vk::Queue, submit: &QueueSubmit, fence: vk::Fence) -> VkResult<()>;

    // Recording

    /// Record a full-subresource image layout transition
    fn cmd_image_barrier(
        &self,
        buffer: vk::CommandBuffer,
        image: vk::Image,
        aspect: vk::ImageAspectFlags,
        old_layout: vk::ImageLayout,
        new_layout: vk::ImageLayout,
    );
    /// Begin an inline render pass over the whole framebuffer
    fn cmd_begin_render_pass(
        &self,
        buffer: vk::CommandBuffer,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        extent: vk::Extent2D,
        clear_values: &[vk::ClearValue],
    );
    /// End the current render pass
    fn cmd_end_render_pass(&self, buffer: vk::CommandBuffer);

    // Resources

    /// Create a 2D view covering one mip level and layer
    fn create_image_view(
        &self,
        image: vk::Image,
        format: vk::Format,
        aspect: vk::ImageAspectFlags,
    ) -> VkResult<vk::ImageView>;
    /// Create a device-local image backed by the allocator
    fn create_allocated_image(&self, info: &vk::ImageCreateInfo) -> VkResult<(vk::Image, Self::Allocation)>;
    /// Create a render pass
    fn create_render_pass(&self, info: &vk::RenderPassCreateInfo) -> VkResult<vk::RenderPass>;
    /// Create a framebuffer
    fn create_framebuffer(&self, info: &vk::FramebufferCreateInfo) -> VkResult<vk::Framebuffer>;
    /// Destroy a buffer not owned by the allocator
    fn destroy_buffer(&self, buffer: vk::Buffer);
    /// Destroy a buffer together with its allocation
    fn destroy_allocated_buffer(&self, buffer: vk::Buffer, allocation: Self::Allocation);
    /// Destroy an image not owned by the allocator
    fn destroy_image(&self, image: vk::Image);
    /// Destroy an image together with its allocation
    fn destroy_allocated_image(&self, image: vk::Image, allocation: Self::Allocation);
    /// Free raw device memory
    fn free_memory(&self, memory: vk::DeviceMemory);
    /// Destroy an image view
    fn destroy_image_view(&self, view: vk::ImageView);
    /// Destroy a sampler
    fn destroy_sampler(&self, sampler: vk::Sampler);
    /// Destroy a render pass
    fn destroy_render_pass(&self, render_pass: vk::RenderPass);
    /// Destroy a framebuffer
    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer);
    /// Destroy a pipeline
    fn destroy_pipeline(&self, pipeline: vk::Pipeline);

    /// Attach a debug name to an object; a no-op without debug utils
    fn set_object_name(&self, _object_type: vk::ObjectType, _handle: u64, _name: &str) {}

    // Presentation

    /// Surface capabilities for the device's adapter
    fn surface_capabilities(&self, surface: vk::SurfaceKHR) -> VkResult<vk::SurfaceCapabilitiesKHR>;
    /// Surface formats for the device's adapter
    fn surface_formats(&self, surface: vk::SurfaceKHR) -> VkResult<Vec<vk::SurfaceFormatKHR>>;
    /// Present modes for the device's adapter
    fn surface_present_modes(&self, surface: vk::SurfaceKHR) -> VkResult<Vec<vk::PresentModeKHR>>;
    /// Create a swapchain
    fn create_swapchain(&self, info: &vk::SwapchainCreateInfoKHR) -> VkResult<vk::SwapchainKHR>;
    /// Destroy a swapchain
    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR);
    /// Images owned by a swapchain
    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>>;
    /// Acquire the next image; the flag reports a suboptimal swapchain
    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        timeout: u64,
        semaphore: vk::Semaphore,
    ) -> VkResult<(u32, bool)>;
    /// Present an image; the flag reports a suboptimal swapchain
    fn queue_present(
        &self,
        queue: vk::Queue,
        swapchain: vk::SwapchainKHR,
        image_index: u32,
        wait_semaphore: vk::Semaphore,
    ) -> VkResult<bool>;
}

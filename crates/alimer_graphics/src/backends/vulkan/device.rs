//! Logical device, queues and memory allocator
//!
//! [`LogicalDevice`] is the production [`DeviceApi`]: every trait method is a thin wrapper over
//! one `ash` call. It owns the allocator, and its drop order is fixed: leak check, allocator,
//! device.

use std::ffi::{CStr, CString};

use ash::extensions::ext::DebugUtils;
use ash::extensions::khr;
use ash::prelude::VkResult;
use ash::vk;
use vk_mem::Alloc;

use super::adapter::{version_string, Adapter};
use super::api::{DeviceApi, QueueSubmit};
use super::extensions::{select_device_extensions, select_features};
use super::instance::VulkanInstance;
use super::queue::{plan_queue_allocation, QueuePlan};
use crate::graphics::{GraphicsError, GraphicsResult};

/// Access mask and pipeline stage that produce or consume an image in a layout
pub fn layout_access(layout: vk::ImageLayout) -> (vk::AccessFlags, vk::PipelineStageFlags) {
    match layout {
        vk::ImageLayout::UNDEFINED => (vk::AccessFlags::empty(), vk::PipelineStageFlags::TOP_OF_PIPE),
        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL => (
            vk::AccessFlags::COLOR_ATTACHMENT_READ | vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
        ),
        vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL => (
            vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS,
        ),
        vk::ImageLayout::PRESENT_SRC_KHR => (vk::AccessFlags::empty(), vk::PipelineStageFlags::BOTTOM_OF_PIPE),
        vk::ImageLayout::TRANSFER_DST_OPTIMAL => (vk::AccessFlags::TRANSFER_WRITE, vk::PipelineStageFlags::TRANSFER),
        vk::ImageLayout::TRANSFER_SRC_OPTIMAL => (vk::AccessFlags::TRANSFER_READ, vk::PipelineStageFlags::TRANSFER),
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL => {
            (vk::AccessFlags::SHADER_READ, vk::PipelineStageFlags::FRAGMENT_SHADER)
        }
        _ => (
            vk::AccessFlags::MEMORY_READ | vk::AccessFlags::MEMORY_WRITE,
            vk::PipelineStageFlags::ALL_COMMANDS,
        ),
    }
}

/// The three device queues
#[derive(Debug, Clone, Copy)]
pub struct DeviceQueues {
    /// Graphics and present queue
    pub graphics: vk::Queue,
    /// Compute queue; may alias the graphics family
    pub compute: vk::Queue,
    /// Transfer queue; may alias the graphics or compute family
    pub copy: vk::Queue,
}

/// Logical device wrapper with RAII cleanup
pub struct LogicalDevice {
    device: ash::Device,
    physical_device: vk::PhysicalDevice,
    allocator: Option<vk_mem::Allocator>,
    surface_loader: khr::Surface,
    swapchain_loader: Option<khr::Swapchain>,
    debug_utils: Option<DebugUtils>,
    queues: DeviceQueues,
    queue_plan: QueuePlan,
    enabled_extensions: Vec<&'static CStr>,
    enabled_features: vk::PhysicalDeviceFeatures,
}

impl LogicalDevice {
    /// Create the device, its queues and the allocator on an adapter
    pub fn new(instance: &VulkanInstance, adapter: &Adapter, headless: bool) -> GraphicsResult<Self> {
        let raw_instance = instance.instance();
        let queue_plan = plan_queue_allocation(&adapter.queue_families, &adapter.queue_indices)
            .ok_or(GraphicsError::NoSuitableAdapter)?;

        let priorities: Vec<Vec<f32>> = queue_plan
            .requests
            .iter()
            .map(|request| vec![request.priority; request.count as usize])
            .collect();
        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = queue_plan
            .requests
            .iter()
            .zip(&priorities)
            .map(|(request, priorities)| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(request.family)
                    .queue_priorities(priorities)
                    .build()
            })
            .collect();

        let enabled_extensions = select_device_extensions(
            &adapter.extensions,
            adapter.api_version(),
            headless,
            instance.has_surface_capabilities2(),
        );
        let extension_ptrs: Vec<_> = enabled_extensions.iter().map(|ext| ext.as_ptr()).collect();

        let mut multiview_features = vk::PhysicalDeviceMultiviewFeatures::default();
        let mut features = vk::PhysicalDeviceFeatures2::builder();
        if adapter.extensions.multiview {
            features = features.push_next(&mut multiview_features);
        }
        unsafe { raw_instance.get_physical_device_features2(adapter.physical_device, &mut features) };
        features.features = select_features(&features.features);
        let enabled_features = features.features;

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&extension_ptrs)
            .push_next(&mut features);

        let device = unsafe { raw_instance.create_device(adapter.physical_device, &create_info, None) }
            .map_err(GraphicsError::DeviceCreationFailed)?;

        let queues = unsafe {
            DeviceQueues {
                graphics: device.get_device_queue(queue_plan.graphics_family, 0),
                compute: device.get_device_queue(queue_plan.compute_family, queue_plan.compute_index),
                copy: device.get_device_queue(queue_plan.copy_family, queue_plan.copy_index),
            }
        };

        log::info!(
            "Created VkDevice using '{}' adapter with API version: {}",
            adapter.name(),
            version_string(adapter.api_version())
        );
        for ext in &enabled_extensions {
            log::info!("Device extension '{}'", ext.to_string_lossy());
        }

        let mut allocator_info =
            vk_mem::AllocatorCreateInfo::new(raw_instance, &device, adapter.physical_device);
        if adapter.extensions.supports_dedicated_allocation() {
            allocator_info = allocator_info.flags(vk_mem::AllocatorCreateFlags::KHR_DEDICATED_ALLOCATION);
        }
        let allocator = match vk_mem::Allocator::new(allocator_info) {
            Ok(allocator) => allocator,
            Err(e) => {
                unsafe { device.destroy_device(None) };
                return Err(GraphicsError::Initialization(format!("Cannot create allocator: {:?}", e)));
            }
        };

        let swapchain_loader = (!headless).then(|| khr::Swapchain::new(raw_instance, &device));

        Ok(Self {
            physical_device: adapter.physical_device,
            allocator: Some(allocator),
            surface_loader: khr::Surface::new(instance.entry(), raw_instance),
            swapchain_loader,
            debug_utils: instance.debug_utils().cloned(),
            queues,
            queue_plan,
            enabled_extensions,
            enabled_features,
            device,
        })
    }

    /// Raw `ash` device
    pub fn raw(&self) -> &ash::Device {
        &self.device
    }

    /// Adapter the device was created on
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// Device queues
    pub fn queues(&self) -> DeviceQueues {
        self.queues
    }

    /// Queue families and indices the queues were taken from
    pub fn queue_plan(&self) -> &QueuePlan {
        &self.queue_plan
    }

    /// Graphics queue family index
    pub fn graphics_family(&self) -> u32 {
        self.queue_plan.graphics_family
    }

    /// Extensions enabled at creation
    pub fn enabled_extensions(&self) -> &[&'static CStr] {
        &self.enabled_extensions
    }

    /// Core features enabled at creation
    pub fn enabled_features(&self) -> &vk::PhysicalDeviceFeatures {
        &self.enabled_features
    }

    /// Bytes currently allocated through the allocator
    pub fn allocated_bytes(&self) -> u64 {
        let Some(allocator) = &self.allocator else {
            return 0;
        };
        match unsafe { allocator.calculate_statistics() } {
            Ok(stats) => stats.total.statistics.allocationBytes,
            Err(e) => {
                log::warn!("Failed to query allocator statistics: {:?}", e);
                0
            }
        }
    }

    fn allocator(&self) -> VkResult<&vk_mem::Allocator> {
        self.allocator.as_ref().ok_or(vk::Result::ERROR_INITIALIZATION_FAILED)
    }

    fn swapchain_loader(&self) -> VkResult<&khr::Swapchain> {
        self.swapchain_loader.as_ref().ok_or(vk::Result::ERROR_EXTENSION_NOT_PRESENT)
    }
}

impl Drop for LogicalDevice {
    fn drop(&mut self) {
        let leaked = self.allocated_bytes();
        if leaked > 0 {
            log::error!("Total device memory leaked: {} bytes", leaked);
        }
        drop(self.allocator.take());

        unsafe { self.device.destroy_device(None) };
    }
}

impl DeviceApi for LogicalDevice {
    type Allocation = vk_mem::Allocation;

    fn create_fence(&self, signaled: bool) -> VkResult<vk::Fence> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let info = vk::FenceCreateInfo::builder().flags(flags);
        unsafe { self.device.create_fence(&info, None) }
    }

    fn destroy_fence(&self, fence: vk::Fence) {
        unsafe { self.device.destroy_fence(fence, None) }
    }

    fn wait_for_fences(&self, fences: &[vk::Fence], timeout: u64) -> VkResult<()> {
        unsafe { self.device.wait_for_fences(fences, true, timeout) }
    }

    fn reset_fences(&self, fences: &[vk::Fence]) -> VkResult<()> {
        unsafe { self.device.reset_fences(fences) }
    }

    fn create_semaphore(&self) -> VkResult<vk::Semaphore> {
        unsafe { self.device.create_semaphore(&vk::SemaphoreCreateInfo::default(), None) }
    }

    fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        unsafe { self.device.destroy_semaphore(semaphore, None) }
    }

    fn device_wait_idle(&self) -> VkResult<()> {
        unsafe { self.device.device_wait_idle() }
    }

    fn create_command_pool(
        &self,
        queue_family_index: u32,
        flags: vk::CommandPoolCreateFlags,
    ) -> VkResult<vk::CommandPool> {
        let info = vk::CommandPoolCreateInfo::builder()
            .queue_family_index(queue_family_index)
            .flags(flags);
        unsafe { self.device.create_command_pool(&info, None) }
    }

    fn reset_command_pool(&self, pool: vk::CommandPool) -> VkResult<()> {
        unsafe { self.device.reset_command_pool(pool, vk::CommandPoolResetFlags::empty()) }
    }

    fn destroy_command_pool(&self, pool: vk::CommandPool) {
        unsafe { self.device.destroy_command_pool(pool, None) }
    }

    fn allocate_command_buffer(
        &self,
        pool: vk::CommandPool,
        level: vk::CommandBufferLevel,
    ) -> VkResult<vk::CommandBuffer> {
        let info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(pool)
            .level(level)
            .command_buffer_count(1);
        let buffers = unsafe { self.device.allocate_command_buffers(&info) }?;
        buffers.into_iter().next().ok_or(vk::Result::ERROR_OUT_OF_POOL_MEMORY)
    }

    fn free_command_buffers(&self, pool: vk::CommandPool, buffers: &[vk::CommandBuffer]) {
        unsafe { self.device.free_command_buffers(pool, buffers) }
    }

    fn begin_command_buffer(
        &self,
        buffer: vk::CommandBuffer,
        flags: vk::CommandBufferUsageFlags,
    ) -> VkResult<()> {
        let info = vk::CommandBufferBeginInfo::builder().flags(flags);
        unsafe { self.device.begin_command_buffer(buffer, &info) }
    }

    fn end_command_buffer(&self, buffer: vk::CommandBuffer) -> VkResult<()> {
        unsafe { self.device.end_command_buffer(buffer) }
    }

    fn queue_submit(&self, queue: vk::Queue, submit: &QueueSubmit, fence: vk::Fence) -> VkResult<()> {
        let command_buffers = [submit.command_buffer];
        let wait_semaphores = [submit.wait_semaphore];
        let wait_stages = [submit.wait_stage];
        let signal_semaphores = [submit.signal_semaphore];

        let mut info = vk::SubmitInfo::builder().command_buffers(&command_buffers);
        if submit.wait_semaphore != vk::Semaphore::null() {
            info = info.wait_semaphores(&wait_semaphores).wait_dst_stage_mask(&wait_stages);
        }
        if submit.signal_semaphore != vk::Semaphore::null() {
            info = info.signal_semaphores(&signal_semaphores);
        }

        unsafe { self.device.queue_submit(queue, &[info.build()], fence) }
    }

    fn cmd_image_barrier(
        &self,
        buffer: vk::CommandBuffer,
        image: vk::Image,
        aspect: vk::ImageAspectFlags,
        old_layout: vk::ImageLayout,
        new_layout: vk::ImageLayout,
    ) {
        let (src_access, src_stage) = layout_access(old_layout);
        let (dst_access, dst_stage) = layout_access(new_layout);

        let barrier = vk::ImageMemoryBarrier::builder()
            .old_layout(old_layout)
            .new_layout(new_layout)
            .src_access_mask(src_access)
            .dst_access_mask(dst_access)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(image)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: aspect,
                base_mip_level: 0,
                level_count: vk::REMAINING_MIP_LEVELS,
                base_array_layer: 0,
                layer_count: vk::REMAINING_ARRAY_LAYERS,
            })
            .build();

        unsafe {
            self.device.cmd_pipeline_barrier(
                buffer,
                src_stage,
                dst_stage,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[barrier],
            );
        }
    }

    fn cmd_begin_render_pass(
        &self,
        buffer: vk::CommandBuffer,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        extent: vk::Extent2D,
        clear_values: &[vk::ClearValue],
    ) {
        let info = vk::RenderPassBeginInfo::builder()
            .render_pass(render_pass)
            .framebuffer(framebuffer)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            })
            .clear_values(clear_values);
        unsafe { self.device.cmd_begin_render_pass(buffer, &info, vk::SubpassContents::INLINE) }
    }

    fn cmd_end_render_pass(&self, buffer: vk::CommandBuffer) {
        unsafe { self.device.cmd_end_render_pass(buffer) }
    }

    fn create_image_view(
        &self,
        image: vk::Image,
        format: vk::Format,
        aspect: vk::ImageAspectFlags,
    ) -> VkResult<vk::ImageView> {
        let info = vk::ImageViewCreateInfo::builder()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .components(vk::ComponentMapping {
                r: vk::ComponentSwizzle::IDENTITY,
                g: vk::ComponentSwizzle::IDENTITY,
                b: vk::ComponentSwizzle::IDENTITY,
                a: vk::ComponentSwizzle::IDENTITY,
            })
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: aspect,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            });
        unsafe { self.device.create_image_view(&info, None) }
    }

    fn create_allocated_image(&self, info: &vk::ImageCreateInfo) -> VkResult<(vk::Image, vk_mem::Allocation)> {
        let alloc_info = vk_mem::AllocationCreateInfo {
            usage: vk_mem::MemoryUsage::AutoPreferDevice,
            ..Default::default()
        };
        unsafe { self.allocator()?.create_image(info, &alloc_info) }
    }

    fn create_render_pass(&self, info: &vk::RenderPassCreateInfo) -> VkResult<vk::RenderPass> {
        unsafe { self.device.create_render_pass(info, None) }
    }

    fn create_framebuffer(&self, info: &vk::FramebufferCreateInfo) -> VkResult<vk::Framebuffer> {
        unsafe { self.device.create_framebuffer(info, None) }
    }

    fn destroy_buffer(&self, buffer: vk::Buffer) {
        unsafe { self.device.destroy_buffer(buffer, None) }
    }

    fn destroy_allocated_buffer(&self, buffer: vk::Buffer, mut allocation: vk_mem::Allocation) {
        match self.allocator() {
            Ok(allocator) => unsafe { allocator.destroy_buffer(buffer, &mut allocation) },
            Err(_) => log::error!("Allocator already destroyed, leaking buffer {:?}", buffer),
        }
    }

    fn destroy_image(&self, image: vk::Image) {
        unsafe { self.device.destroy_image(image, None) }
    }

    fn destroy_allocated_image(&self, image: vk::Image, mut allocation: vk_mem::Allocation) {
        match self.allocator() {
            Ok(allocator) => unsafe { allocator.destroy_image(image, &mut allocation) },
            Err(_) => log::error!("Allocator already destroyed, leaking image {:?}", image),
        }
    }

    fn free_memory(&self, memory: vk::DeviceMemory) {
        unsafe { self.device.free_memory(memory, None) }
    }

    fn destroy_image_view(&self, view: vk::ImageView) {
        unsafe { self.device.destroy_image_view(view, None) }
    }

    fn destroy_sampler(&self, sampler: vk::Sampler) {
        unsafe { self.device.destroy_sampler(sampler, None) }
    }

    fn destroy_render_pass(&self, render_pass: vk::RenderPass) {
        unsafe { self.device.destroy_render_pass(render_pass, None) }
    }

    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer) {
        unsafe { self.device.destroy_framebuffer(framebuffer, None) }
    }

    fn destroy_pipeline(&self, pipeline: vk::Pipeline) {
        unsafe { self.device.destroy_pipeline(pipeline, None) }
    }

    fn set_object_name(&self, object_type: vk::ObjectType, handle: u64, name: &str) {
        let Some(debug_utils) = &self.debug_utils else {
            return;
        };
        let Ok(name) = CString::new(name) else {
            return;
        };

        let info = vk::DebugUtilsObjectNameInfoEXT::builder()
            .object_type(object_type)
            .object_handle(handle)
            .object_name(&name);
        if let Err(e) = unsafe { debug_utils.set_debug_utils_object_name(self.device.handle(), &info) } {
            log::trace!("Failed to name object {:#x}: {:?}", handle, e);
        }
    }

    fn surface_capabilities(&self, surface: vk::SurfaceKHR) -> VkResult<vk::SurfaceCapabilitiesKHR> {
        unsafe {
            self.surface_loader
                .get_physical_device_surface_capabilities(self.physical_device, surface)
        }
    }

    fn surface_formats(&self, surface: vk::SurfaceKHR) -> VkResult<Vec<vk::SurfaceFormatKHR>> {
        unsafe { self.surface_loader.get_physical_device_surface_formats(self.physical_device, surface) }
    }

    fn surface_present_modes(&self, surface: vk::SurfaceKHR) -> VkResult<Vec<vk::PresentModeKHR>> {
        unsafe {
            self.surface_loader
                .get_physical_device_surface_present_modes(self.physical_device, surface)
        }
    }

    fn create_swapchain(&self, info: &vk::SwapchainCreateInfoKHR) -> VkResult<vk::SwapchainKHR> {
        unsafe { self.swapchain_loader()?.create_swapchain(info, None) }
    }

    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
        if let Ok(loader) = self.swapchain_loader() {
            unsafe { loader.destroy_swapchain(swapchain, None) }
        }
    }

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>> {
        unsafe { self.swapchain_loader()?.get_swapchain_images(swapchain) }
    }

    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        timeout: u64,
        semaphore: vk::Semaphore,
    ) -> VkResult<(u32, bool)> {
        unsafe {
            self.swapchain_loader()?
                .acquire_next_image(swapchain, timeout, semaphore, vk::Fence::null())
        }
    }

    fn queue_present(
        &self,
        queue: vk::Queue,
        swapchain: vk::SwapchainKHR,
        image_index: u32,
        wait_semaphore: vk::Semaphore,
    ) -> VkResult<bool> {
        let wait_semaphores = [wait_semaphore];
        let swapchains = [swapchain];
        let image_indices = [image_index];
        let info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);
        unsafe { self.swapchain_loader()?.queue_present(queue, &info) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_present_transition_waits_on_color_output() {
        let (src_access, src_stage) = layout_access(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
        let (dst_access, dst_stage) = layout_access(vk::ImageLayout::PRESENT_SRC_KHR);

        assert!(src_access.contains(vk::AccessFlags::COLOR_ATTACHMENT_WRITE));
        assert_eq!(src_stage, vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT);
        assert!(dst_access.is_empty());
        assert_eq!(dst_stage, vk::PipelineStageFlags::BOTTOM_OF_PIPE);
    }

    #[test]
    fn test_undefined_source_has_no_access() {
        let (access, stage) = layout_access(vk::ImageLayout::UNDEFINED);
        assert!(access.is_empty());
        assert_eq!(stage, vk::PipelineStageFlags::TOP_OF_PIPE);
    }

    #[test]
    fn test_unknown_layout_is_conservative() {
        let (access, stage) = layout_access(vk::ImageLayout::GENERAL);
        assert!(access.contains(vk::AccessFlags::MEMORY_READ | vk::AccessFlags::MEMORY_WRITE));
        assert_eq!(stage, vk::PipelineStageFlags::ALL_COMMANDS);
    }
}

//! Recording fake device for driver-free tests

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};

use ash::prelude::VkResult;
use ash::vk::{self, Handle};

use super::api::{DeviceApi, QueueSubmit};

/// Summary of the last swapchain create call
#[derive(Debug, Clone, Copy)]
pub(crate) struct SwapchainRequest {
    pub min_image_count: u32,
    pub format: vk::Format,
    pub color_space: vk::ColorSpaceKHR,
    pub extent: vk::Extent2D,
    pub present_mode: vk::PresentModeKHR,
    pub usage: vk::ImageUsageFlags,
    pub composite_alpha: vk::CompositeAlphaFlagsKHR,
    pub old_swapchain: vk::SwapchainKHR,
}

pub(crate) struct MockState {
    next_handle: u64,
    created: HashMap<&'static str, usize>,
    destroyed: HashMap<&'static str, usize>,
    pub calls: Vec<&'static str>,
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
    pub acquire_script: VecDeque<VkResult<(u32, bool)>>,
    pub present_script: VecDeque<VkResult<bool>>,
    pub reset_fences_result: VkResult<()>,
    pub wait_fences_result: VkResult<()>,
    pub submit_result: VkResult<()>,
    pub begin_command_buffer_result: VkResult<()>,
    /// Waiting on an unsignaled fence fails with `TIMEOUT` instead of succeeding
    pub strict_fences: bool,
    /// Hand destroyed swapchain handles out again, like drivers are allowed to
    pub reuse_swapchain_handles: bool,
    unsignaled_fences: HashSet<vk::Fence>,
    freed_swapchains: Vec<vk::SwapchainKHR>,
    pub swapchain_requests: Vec<SwapchainRequest>,
    pub submits: Vec<QueueSubmit>,
    pub object_names: Vec<String>,
    pub render_pass_attachments: Vec<u32>,
    swapchain_image_counts: HashMap<vk::SwapchainKHR, u32>,
    next_image: u32,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            next_handle: 0x1000,
            created: HashMap::new(),
            destroyed: HashMap::new(),
            calls: Vec::new(),
            capabilities: vk::SurfaceCapabilitiesKHR {
                min_image_count: 2,
                max_image_count: 3,
                current_extent: vk::Extent2D { width: 800, height: 600 },
                min_image_extent: vk::Extent2D { width: 1, height: 1 },
                max_image_extent: vk::Extent2D { width: 4096, height: 4096 },
                max_image_array_layers: 1,
                supported_transforms: vk::SurfaceTransformFlagsKHR::IDENTITY,
                current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
                supported_composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
                supported_usage_flags: vk::ImageUsageFlags::COLOR_ATTACHMENT
                    | vk::ImageUsageFlags::TRANSFER_SRC,
            },
            formats: vec![vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            }],
            present_modes: vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX],
            acquire_script: VecDeque::new(),
            present_script: VecDeque::new(),
            reset_fences_result: Ok(()),
            wait_fences_result: Ok(()),
            submit_result: Ok(()),
            begin_command_buffer_result: Ok(()),
            strict_fences: false,
            reuse_swapchain_handles: false,
            unsignaled_fences: HashSet::new(),
            freed_swapchains: Vec::new(),
            swapchain_requests: Vec::new(),
            submits: Vec::new(),
            object_names: Vec::new(),
            render_pass_attachments: Vec::new(),
            swapchain_image_counts: HashMap::new(),
            next_image: 0,
        }
    }
}

impl MockState {
    fn handle<T: Handle>(&mut self, kind: &'static str) -> T {
        self.next_handle += 1;
        *self.created.entry(kind).or_default() += 1;
        self.calls.push(kind);
        T::from_raw(self.next_handle)
    }

    fn destroy(&mut self, kind: &'static str) {
        *self.destroyed.entry(kind).or_default() += 1;
        self.calls.push(kind);
    }
}

/// Fake device; allocations are plain ids
#[derive(Default)]
pub(crate) struct MockDevice {
    state: Mutex<MockState>,
}

impl MockDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    pub fn created(&self, kind: &str) -> usize {
        self.state().created.get(kind).copied().unwrap_or(0)
    }

    pub fn destroyed(&self, kind: &str) -> usize {
        self.state().destroyed.get(kind).copied().unwrap_or(0)
    }

    /// Objects of `kind` created but not yet destroyed
    pub fn live(&self, kind: &str) -> usize {
        self.created(kind) - self.destroyed(kind)
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    pub fn is_signaled(&self, fence: vk::Fence) -> bool {
        !self.state().unsignaled_fences.contains(&fence)
    }
}

impl DeviceApi for MockDevice {
    type Allocation = u64;

    fn create_fence(&self, signaled: bool) -> VkResult<vk::Fence> {
        let mut state = self.state();
        let fence: vk::Fence = state.handle("fence");
        if !signaled {
            state.unsignaled_fences.insert(fence);
        }
        Ok(fence)
    }

    fn destroy_fence(&self, fence: vk::Fence) {
        let mut state = self.state();
        state.unsignaled_fences.remove(&fence);
        state.destroy("fence");
    }

    fn wait_for_fences(&self, fences: &[vk::Fence], _timeout: u64) -> VkResult<()> {
        let mut state = self.state();
        state.calls.push("wait_for_fences");
        state.wait_fences_result?;
        if state.strict_fences && fences.iter().any(|fence| state.unsignaled_fences.contains(fence)) {
            return Err(vk::Result::TIMEOUT);
        }
        Ok(())
    }

    fn reset_fences(&self, fences: &[vk::Fence]) -> VkResult<()> {
        let mut state = self.state();
        state.calls.push("reset_fences");
        state.reset_fences_result?;
        state.unsignaled_fences.extend(fences.iter().copied());
        Ok(())
    }

    fn create_semaphore(&self) -> VkResult<vk::Semaphore> {
        Ok(self.state().handle("semaphore"))
    }

    fn destroy_semaphore(&self, _semaphore: vk::Semaphore) {
        self.state().destroy("semaphore");
    }

    fn device_wait_idle(&self) -> VkResult<()> {
        self.state().calls.push("device_wait_idle");
        Ok(())
    }

    fn create_command_pool(&self, _family: u32, _flags: vk::CommandPoolCreateFlags) -> VkResult<vk::CommandPool> {
        Ok(self.state().handle("command_pool"))
    }

    fn reset_command_pool(&self, _pool: vk::CommandPool) -> VkResult<()> {
        self.state().calls.push("reset_command_pool");
        Ok(())
    }

    fn destroy_command_pool(&self, _pool: vk::CommandPool) {
        self.state().destroy("command_pool");
    }

    fn allocate_command_buffer(
        &self,
        _pool: vk::CommandPool,
        _level: vk::CommandBufferLevel,
    ) -> VkResult<vk::CommandBuffer> {
        Ok(self.state().handle("command_buffer"))
    }

    fn free_command_buffers(&self, _pool: vk::CommandPool, buffers: &[vk::CommandBuffer]) {
        let mut state = self.state();
        for _ in buffers {
            state.destroy("command_buffer");
        }
    }

    fn begin_command_buffer(&self, _buffer: vk::CommandBuffer, _flags: vk::CommandBufferUsageFlags) -> VkResult<()> {
        let mut state = self.state();
        state.calls.push("begin_command_buffer");
        state.begin_command_buffer_result
    }

    fn end_command_buffer(&self, _buffer: vk::CommandBuffer) -> VkResult<()> {
        self.state().calls.push("end_command_buffer");
        Ok(())
    }

    fn queue_submit(&self, _queue: vk::Queue, submit: &QueueSubmit, fence: vk::Fence) -> VkResult<()> {
        let mut state = self.state();
        state.calls.push("queue_submit");
        state.submit_result?;
        state.submits.push(*submit);
        // work completes immediately
        state.unsignaled_fences.remove(&fence);
        Ok(())
    }

    fn cmd_image_barrier(
        &self,
        _buffer: vk::CommandBuffer,
        _image: vk::Image,
        _aspect: vk::ImageAspectFlags,
        _old_layout: vk::ImageLayout,
        _new_layout: vk::ImageLayout,
    ) {
        self.state().calls.push("cmd_image_barrier");
    }

    fn cmd_begin_render_pass(
        &self,
        _buffer: vk::CommandBuffer,
        _render_pass: vk::RenderPass,
        _framebuffer: vk::Framebuffer,
        _extent: vk::Extent2D,
        _clear_values: &[vk::ClearValue],
    ) {
        self.state().calls.push("cmd_begin_render_pass");
    }

    fn cmd_end_render_pass(&self, _buffer: vk::CommandBuffer) {
        self.state().calls.push("cmd_end_render_pass");
    }

    fn create_image_view(
        &self,
        _image: vk::Image,
        _format: vk::Format,
        _aspect: vk::ImageAspectFlags,
    ) -> VkResult<vk::ImageView> {
        Ok(self.state().handle("image_view"))
    }

    fn create_allocated_image(&self, _info: &vk::ImageCreateInfo) -> VkResult<(vk::Image, u64)> {
        let mut state = self.state();
        let image: vk::Image = state.handle("allocated_image");
        let allocation = image.as_raw();
        Ok((image, allocation))
    }

    fn create_render_pass(&self, info: &vk::RenderPassCreateInfo) -> VkResult<vk::RenderPass> {
        let mut state = self.state();
        state.render_pass_attachments.push(info.attachment_count);
        Ok(state.handle("render_pass"))
    }

    fn create_framebuffer(&self, _info: &vk::FramebufferCreateInfo) -> VkResult<vk::Framebuffer> {
        Ok(self.state().handle("framebuffer"))
    }

    fn destroy_buffer(&self, _buffer: vk::Buffer) {
        self.state().destroy("buffer");
    }

    fn destroy_allocated_buffer(&self, _buffer: vk::Buffer, _allocation: u64) {
        self.state().destroy("allocated_buffer");
    }

    fn destroy_image(&self, _image: vk::Image) {
        self.state().destroy("image");
    }

    fn destroy_allocated_image(&self, _image: vk::Image, _allocation: u64) {
        self.state().destroy("allocated_image");
    }

    fn free_memory(&self, _memory: vk::DeviceMemory) {
        self.state().destroy("memory");
    }

    fn destroy_image_view(&self, _view: vk::ImageView) {
        self.state().destroy("image_view");
    }

    fn destroy_sampler(&self, _sampler: vk::Sampler) {
        self.state().destroy("sampler");
    }

    fn destroy_render_pass(&self, _render_pass: vk::RenderPass) {
        self.state().destroy("render_pass");
    }

    fn destroy_framebuffer(&self, _framebuffer: vk::Framebuffer) {
        self.state().destroy("framebuffer");
    }

    fn destroy_pipeline(&self, _pipeline: vk::Pipeline) {
        self.state().destroy("pipeline");
    }

    fn set_object_name(&self, _object_type: vk::ObjectType, _handle: u64, name: &str) {
        self.state().object_names.push(name.to_string());
    }

    fn surface_capabilities(&self, _surface: vk::SurfaceKHR) -> VkResult<vk::SurfaceCapabilitiesKHR> {
        Ok(self.state().capabilities)
    }

    fn surface_formats(&self, _surface: vk::SurfaceKHR) -> VkResult<Vec<vk::SurfaceFormatKHR>> {
        Ok(self.state().formats.clone())
    }

    fn surface_present_modes(&self, _surface: vk::SurfaceKHR) -> VkResult<Vec<vk::PresentModeKHR>> {
        Ok(self.state().present_modes.clone())
    }

    fn create_swapchain(&self, info: &vk::SwapchainCreateInfoKHR) -> VkResult<vk::SwapchainKHR> {
        let mut state = self.state();
        state.swapchain_requests.push(SwapchainRequest {
            min_image_count: info.min_image_count,
            format: info.image_format,
            color_space: info.image_color_space,
            extent: info.image_extent,
            present_mode: info.present_mode,
            usage: info.image_usage,
            composite_alpha: info.composite_alpha,
            old_swapchain: info.old_swapchain,
        });
        let swapchain = match state.freed_swapchains.pop() {
            Some(reused) if state.reuse_swapchain_handles => {
                *state.created.entry("swapchain").or_default() += 1;
                state.calls.push("swapchain");
                reused
            }
            _ => state.handle("swapchain"),
        };
        state.swapchain_image_counts.insert(swapchain, info.min_image_count);
        state.next_image = 0;
        Ok(swapchain)
    }

    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
        let mut state = self.state();
        state.freed_swapchains.push(swapchain);
        state.destroy("swapchain");
    }

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>> {
        let mut state = self.state();
        let count = state
            .swapchain_image_counts
            .get(&swapchain)
            .copied()
            .ok_or(vk::Result::ERROR_INITIALIZATION_FAILED)?;
        let base = 0x9000 + swapchain.as_raw() * 16;
        state.calls.push("swapchain_images");
        Ok((0..u64::from(count)).map(|i| vk::Image::from_raw(base + i)).collect())
    }

    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        _timeout: u64,
        _semaphore: vk::Semaphore,
    ) -> VkResult<(u32, bool)> {
        let mut state = self.state();
        state.calls.push("acquire_next_image");
        if let Some(scripted) = state.acquire_script.pop_front() {
            return scripted;
        }
        let count = state.swapchain_image_counts.get(&swapchain).copied().unwrap_or(1);
        let index = state.next_image % count;
        state.next_image += 1;
        Ok((index, false))
    }

    fn queue_present(
        &self,
        _queue: vk::Queue,
        _swapchain: vk::SwapchainKHR,
        _image_index: u32,
        _wait_semaphore: vk::Semaphore,
    ) -> VkResult<bool> {
        let mut state = self.state();
        state.calls.push("queue_present");
        state.present_script.pop_front().unwrap_or(Ok(false))
    }
}

//! Per-frame resource tracking and deferred destruction
//!
//! There is one [`PerFrame`] per swapchain image. A slot is only reused after its fence
//! signals, so anything queued for release while the slot was recording can be destroyed at
//! that point without racing the GPU.
//!
//! Teardown order inside a slot matters: deferred releases are purged first because they may
//! have been referenced by buffers from the slot's command pool.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use ash::vk;

use super::api::DeviceApi;
use super::command_pool::CommandPool;
use super::sync::{FencePool, SemaphorePool, WAIT_FOREVER};
use crate::graphics::{GraphicsError, GraphicsResult};

/// Kind tag of a deferred release, for logging and statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum ResourceKind {
    Buffer,
    Image,
    DeviceMemory,
    ImageView,
    Sampler,
    RenderPass,
    Framebuffer,
    Pipeline,
}

/// A resource waiting for the GPU to finish with it
///
/// Buffers and images may carry the allocator allocation that backs them; those are released
/// through the allocator instead of the raw destroy call.
pub enum DeferredRelease<A> {
    /// Buffer, optionally allocator-owned
    Buffer {
        /// Native handle
        buffer: vk::Buffer,
        /// Backing allocation
        allocation: Option<A>,
    },
    /// Image, optionally allocator-owned
    Image {
        /// Native handle
        image: vk::Image,
        /// Backing allocation
        allocation: Option<A>,
    },
    /// Raw device memory
    DeviceMemory(vk::DeviceMemory),
    /// Image view
    ImageView(vk::ImageView),
    /// Sampler
    Sampler(vk::Sampler),
    /// Render pass
    RenderPass(vk::RenderPass),
    /// Framebuffer
    Framebuffer(vk::Framebuffer),
    /// Pipeline
    Pipeline(vk::Pipeline),
}

impl<A> DeferredRelease<A> {
    /// Kind tag of this entry
    pub const fn kind(&self) -> ResourceKind {
        match self {
            Self::Buffer { .. } => ResourceKind::Buffer,
            Self::Image { .. } => ResourceKind::Image,
            Self::DeviceMemory(_) => ResourceKind::DeviceMemory,
            Self::ImageView(_) => ResourceKind::ImageView,
            Self::Sampler(_) => ResourceKind::Sampler,
            Self::RenderPass(_) => ResourceKind::RenderPass,
            Self::Framebuffer(_) => ResourceKind::Framebuffer,
            Self::Pipeline(_) => ResourceKind::Pipeline,
        }
    }

    /// Destroy the resource through the matching native path
    pub fn release<D: DeviceApi<Allocation = A>>(self, device: &D) {
        match self {
            Self::Buffer { buffer, allocation: Some(allocation) } => {
                device.destroy_allocated_buffer(buffer, allocation);
            }
            Self::Buffer { buffer, allocation: None } => device.destroy_buffer(buffer),
            Self::Image { image, allocation: Some(allocation) } => {
                device.destroy_allocated_image(image, allocation);
            }
            Self::Image { image, allocation: None } => device.destroy_image(image),
            Self::DeviceMemory(memory) => device.free_memory(memory),
            Self::ImageView(view) => device.destroy_image_view(view),
            Self::Sampler(sampler) => device.destroy_sampler(sampler),
            Self::RenderPass(render_pass) => device.destroy_render_pass(render_pass),
            Self::Framebuffer(framebuffer) => device.destroy_framebuffer(framebuffer),
            Self::Pipeline(pipeline) => device.destroy_pipeline(pipeline),
        }
    }
}

impl<A> fmt::Debug for DeferredRelease<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DeferredRelease").field(&self.kind()).finish()
    }
}

/// Resources belonging to one swapchain image
pub struct PerFrame<D: DeviceApi> {
    device: Arc<D>,
    fence: vk::Fence,
    command_pool: Option<CommandPool<D>>,
    primary_command_buffer: vk::CommandBuffer,
    acquire_semaphore: vk::Semaphore,
    release_semaphore: vk::Semaphore,
    fence_pool: Option<FencePool<D>>,
    semaphore_pool: Option<SemaphorePool<D>>,
    deferred_releases: VecDeque<DeferredRelease<D::Allocation>>,
}

impl<D: DeviceApi> PerFrame<D> {
    /// Create the slot's fence (signaled), command pool and release semaphore
    pub fn new(device: Arc<D>, graphics_family: u32) -> GraphicsResult<Self> {
        let mut frame = Self {
            device: device.clone(),
            fence: vk::Fence::null(),
            command_pool: None,
            primary_command_buffer: vk::CommandBuffer::null(),
            acquire_semaphore: vk::Semaphore::null(),
            release_semaphore: vk::Semaphore::null(),
            fence_pool: Some(FencePool::new(device.clone())),
            semaphore_pool: Some(SemaphorePool::new(device.clone())),
            deferred_releases: VecDeque::new(),
        };

        // Partially built frames tear themselves down on error through Drop.
        frame.fence = device.create_fence(true).map_err(GraphicsError::from_vk)?;
        frame.command_pool = Some(CommandPool::new(device.clone(), graphics_family)?);
        frame.release_semaphore = device.create_semaphore().map_err(GraphicsError::from_vk)?;
        Ok(frame)
    }

    /// Wait for the slot's previous submission, then recycle everything it used
    ///
    /// The fence is left signaled; [`Self::reset_fence`] unsignals it right before the next
    /// submit.
    pub fn wait_and_reset(&mut self) -> GraphicsResult<()> {
        if self.fence != vk::Fence::null() {
            self.device
                .wait_for_fences(&[self.fence], WAIT_FOREVER)
                .map_err(GraphicsError::from_vk)?;
        }

        if let Some(pool) = self.fence_pool.as_mut() {
            pool.wait(WAIT_FOREVER)?;
            pool.reset()?;
        }
        if let Some(pool) = self.semaphore_pool.as_mut() {
            pool.reset();
        }

        self.purge();

        if let Some(pool) = self.command_pool.as_mut() {
            pool.reset()?;
        }
        self.primary_command_buffer = vk::CommandBuffer::null();
        Ok(())
    }

    /// Unsignal the fence ahead of the submit that will signal it again
    pub fn reset_fence(&self) -> GraphicsResult<()> {
        if self.fence == vk::Fence::null() {
            return Ok(());
        }
        self.device.reset_fences(&[self.fence]).map_err(GraphicsError::from_vk)
    }

    /// Replace the fence with a new signaled one after a submit that never happened
    pub fn restore_fence(&mut self) -> GraphicsResult<()> {
        let fence = self.device.create_fence(true).map_err(GraphicsError::from_vk)?;
        let previous = std::mem::replace(&mut self.fence, fence);
        if previous != vk::Fence::null() {
            self.device.destroy_fence(previous);
        }
        Ok(())
    }

    /// Get the primary command buffer in the recording state
    pub fn begin_primary(&mut self) -> GraphicsResult<vk::CommandBuffer> {
        let pool = self.command_pool.as_mut().ok_or_else(|| GraphicsError::InvalidOperation {
            reason: "Frame has been torn down".to_string(),
        })?;
        self.primary_command_buffer = pool.request_command_buffer(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT)?;
        Ok(self.primary_command_buffer)
    }

    /// Primary command buffer of the current use, null before [`Self::begin_primary`]
    pub fn primary_command_buffer(&self) -> vk::CommandBuffer {
        self.primary_command_buffer
    }

    /// Fence signaled when the slot's submission completes
    pub fn fence(&self) -> vk::Fence {
        self.fence
    }

    /// Semaphore the current image's acquire signals
    pub fn acquire_semaphore(&self) -> vk::Semaphore {
        self.acquire_semaphore
    }

    /// Semaphore the submission signals for present
    pub fn release_semaphore(&self) -> vk::Semaphore {
        self.release_semaphore
    }

    /// Install a new acquire semaphore, returning the previous one for recycling
    pub fn replace_acquire_semaphore(&mut self, semaphore: vk::Semaphore) -> vk::Semaphore {
        std::mem::replace(&mut self.acquire_semaphore, semaphore)
    }

    /// Extra fence for auxiliary submissions this frame
    pub fn request_fence(&mut self) -> GraphicsResult<vk::Fence> {
        match self.fence_pool.as_mut() {
            Some(pool) => pool.request_fence(),
            None => Err(GraphicsError::InvalidOperation {
                reason: "Frame has been torn down".to_string(),
            }),
        }
    }

    /// Extra semaphore for auxiliary submissions this frame
    pub fn request_semaphore(&mut self) -> GraphicsResult<vk::Semaphore> {
        match self.semaphore_pool.as_mut() {
            Some(pool) => pool.request_semaphore(),
            None => Err(GraphicsError::InvalidOperation {
                reason: "Frame has been torn down".to_string(),
            }),
        }
    }

    /// Queue a resource for destruction once this slot's work completes
    pub fn defer_release(&mut self, release: DeferredRelease<D::Allocation>) {
        self.deferred_releases.push_back(release);
    }

    /// Resources waiting for destruction
    pub fn pending_releases(&self) -> usize {
        self.deferred_releases.len()
    }

    /// Destroy every queued resource in FIFO order
    pub fn purge(&mut self) {
        while let Some(release) = self.deferred_releases.pop_front() {
            log::trace!("Releasing deferred {:?}", release.kind());
            release.release(self.device.as_ref());
        }
    }

    /// Destroy everything the slot owns; calling it again does nothing
    pub fn teardown(&mut self) {
        self.purge();

        if self.fence != vk::Fence::null() {
            self.device.destroy_fence(self.fence);
            self.fence = vk::Fence::null();
        }

        if let Some(mut pool) = self.command_pool.take() {
            pool.destroy();
        }
        self.primary_command_buffer = vk::CommandBuffer::null();

        if self.acquire_semaphore != vk::Semaphore::null() {
            self.device.destroy_semaphore(self.acquire_semaphore);
            self.acquire_semaphore = vk::Semaphore::null();
        }

        if self.release_semaphore != vk::Semaphore::null() {
            self.device.destroy_semaphore(self.release_semaphore);
            self.release_semaphore = vk::Semaphore::null();
        }

        self.fence_pool = None;
        self.semaphore_pool = None;
    }
}

impl<D: DeviceApi> Drop for PerFrame<D> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::vulkan::testing::MockDevice;
    use ash::vk::Handle;

    fn frame(device: &Arc<MockDevice>) -> PerFrame<MockDevice> {
        PerFrame::new(device.clone(), 0).unwrap()
    }

    #[test]
    fn test_purge_uses_matching_destroy_path() {
        let device = Arc::new(MockDevice::new());
        let mut frame = frame(&device);

        frame.defer_release(DeferredRelease::Buffer { buffer: vk::Buffer::from_raw(1), allocation: Some(7) });
        frame.defer_release(DeferredRelease::Buffer { buffer: vk::Buffer::from_raw(2), allocation: None });
        frame.defer_release(DeferredRelease::Image { image: vk::Image::from_raw(3), allocation: Some(8) });
        frame.defer_release(DeferredRelease::Image { image: vk::Image::from_raw(4), allocation: None });
        frame.defer_release(DeferredRelease::DeviceMemory(vk::DeviceMemory::from_raw(5)));
        frame.defer_release(DeferredRelease::ImageView(vk::ImageView::from_raw(6)));
        frame.defer_release(DeferredRelease::Sampler(vk::Sampler::from_raw(7)));
        frame.defer_release(DeferredRelease::RenderPass(vk::RenderPass::from_raw(8)));
        frame.defer_release(DeferredRelease::Framebuffer(vk::Framebuffer::from_raw(9)));
        frame.defer_release(DeferredRelease::Pipeline(vk::Pipeline::from_raw(10)));
        assert_eq!(frame.pending_releases(), 10);

        device.clear_calls();
        frame.purge();

        assert_eq!(frame.pending_releases(), 0);
        assert_eq!(
            device.state().calls,
            vec![
                "allocated_buffer",
                "buffer",
                "allocated_image",
                "image",
                "memory",
                "image_view",
                "sampler",
                "render_pass",
                "framebuffer",
                "pipeline",
            ]
        );
    }

    #[test]
    fn test_teardown_order_and_idempotence() {
        let device = Arc::new(MockDevice::new());
        let mut frame = frame(&device);
        frame.wait_and_reset().unwrap();
        frame.begin_primary().unwrap();
        let acquire = device.create_semaphore().unwrap();
        assert_eq!(frame.replace_acquire_semaphore(acquire), vk::Semaphore::null());
        frame.defer_release(DeferredRelease::Sampler(vk::Sampler::from_raw(99)));
        device.clear_calls();

        frame.teardown();
        frame.teardown();

        assert_eq!(
            device.state().calls,
            vec!["sampler", "fence", "command_buffer", "command_pool", "semaphore", "semaphore"]
        );
        assert_eq!(device.live("fence"), 0);
        assert_eq!(device.live("semaphore"), 0);
        assert_eq!(device.live("command_pool"), 0);
    }

    #[test]
    fn test_wait_and_reset_purges_after_fence() {
        let device = Arc::new(MockDevice::new());
        let mut frame = frame(&device);
        frame.defer_release(DeferredRelease::ImageView(vk::ImageView::from_raw(42)));
        device.clear_calls();

        frame.wait_and_reset().unwrap();

        let calls = device.state().calls.clone();
        let wait = calls.iter().position(|c| *c == "wait_for_fences").unwrap();
        let view = calls.iter().position(|c| *c == "image_view").unwrap();
        let reset = calls.iter().position(|c| *c == "reset_command_pool").unwrap();
        assert!(wait < view && view < reset);
        assert_eq!(frame.pending_releases(), 0);
    }

    #[test]
    fn test_fence_stays_signaled_until_submit() {
        let device = Arc::new(MockDevice::new());
        device.state().strict_fences = true;
        let mut frame = frame(&device);

        frame.wait_and_reset().unwrap();
        frame.begin_primary().unwrap();
        assert!(device.is_signaled(frame.fence()));
        // an abandoned use leaves the slot reusable
        frame.wait_and_reset().unwrap();

        frame.reset_fence().unwrap();
        assert!(!device.is_signaled(frame.fence()));
        assert_eq!(frame.wait_and_reset(), Err(GraphicsError::from_vk(vk::Result::TIMEOUT)));
    }

    #[test]
    fn test_restore_fence_replaces_unsignaled_fence() {
        let device = Arc::new(MockDevice::new());
        device.state().strict_fences = true;
        let mut frame = frame(&device);
        let old = frame.fence();

        frame.reset_fence().unwrap();
        frame.restore_fence().unwrap();

        assert_ne!(frame.fence(), old);
        assert!(device.is_signaled(frame.fence()));
        assert_eq!(device.live("fence"), 1);
        frame.wait_and_reset().unwrap();
    }

    #[test]
    fn test_auxiliary_pools_recycle_per_use() {
        let device = Arc::new(MockDevice::new());
        let mut frame = frame(&device);
        let semaphores_before = device.created("semaphore");

        frame.request_fence().unwrap();
        frame.request_semaphore().unwrap();
        frame.wait_and_reset().unwrap();
        frame.request_fence().unwrap();
        frame.request_semaphore().unwrap();

        // one frame fence plus one pooled fence
        assert_eq!(device.created("fence"), 2);
        assert_eq!(device.created("semaphore"), semaphores_before + 1);
    }

    #[test]
    fn test_torn_down_frame_rejects_work() {
        let device = Arc::new(MockDevice::new());
        let mut frame = frame(&device);
        frame.teardown();
        assert!(frame.begin_primary().is_err());
        assert!(frame.request_fence().is_err());
    }
}

//! Per-frame command pool
//!
//! The pool is transient: everything recorded from it lives for one use of its frame slot.
//! Resetting the native pool recycles all of its buffers at once, after which
//! [`CommandPool::request_command_buffer`] hands the same buffers out again.

use std::sync::Arc;

use ash::vk;

use super::api::DeviceApi;
use crate::graphics::{GraphicsError, GraphicsResult};

/// Transient command pool with recyclable primary buffers
pub struct CommandPool<D: DeviceApi> {
    device: Arc<D>,
    pool: vk::CommandPool,
    primary_buffers: Vec<vk::CommandBuffer>,
    active_primary_count: usize,
}

impl<D: DeviceApi> CommandPool<D> {
    /// Create a transient pool on a queue family
    pub fn new(device: Arc<D>, queue_family_index: u32) -> GraphicsResult<Self> {
        let pool = device
            .create_command_pool(queue_family_index, vk::CommandPoolCreateFlags::TRANSIENT)
            .map_err(GraphicsError::from_vk)?;

        Ok(Self {
            device,
            pool,
            primary_buffers: Vec::new(),
            active_primary_count: 0,
        })
    }

    /// Recycle every buffer allocated from the pool
    ///
    /// Must only be called once the GPU has finished with the pool's buffers.
    pub fn reset(&mut self) -> GraphicsResult<()> {
        self.device.reset_command_pool(self.pool).map_err(GraphicsError::from_vk)?;
        self.active_primary_count = 0;
        Ok(())
    }

    /// Hand out a primary buffer in the recording state
    ///
    /// Reuses a buffer from before the last reset when one is free.
    pub fn request_command_buffer(&mut self, usage: vk::CommandBufferUsageFlags) -> GraphicsResult<vk::CommandBuffer> {
        let buffer = if let Some(&buffer) = self.primary_buffers.get(self.active_primary_count) {
            buffer
        } else {
            let buffer = self
                .device
                .allocate_command_buffer(self.pool, vk::CommandBufferLevel::PRIMARY)
                .map_err(GraphicsError::from_vk)?;
            self.primary_buffers.push(buffer);
            buffer
        };

        self.device.begin_command_buffer(buffer, usage).map_err(GraphicsError::from_vk)?;
        self.active_primary_count += 1;
        Ok(buffer)
    }

    /// Primary buffers handed out since the last reset
    pub fn active_count(&self) -> usize {
        self.active_primary_count
    }

    /// Native pool handle
    pub fn handle(&self) -> vk::CommandPool {
        self.pool
    }

    /// Free the buffers, then the pool; safe to call twice
    pub fn destroy(&mut self) {
        if !self.primary_buffers.is_empty() {
            self.device.free_command_buffers(self.pool, &self.primary_buffers);
            self.primary_buffers.clear();
        }
        if self.pool != vk::CommandPool::null() {
            self.device.destroy_command_pool(self.pool);
            self.pool = vk::CommandPool::null();
        }
        self.active_primary_count = 0;
    }
}

impl<D: DeviceApi> Drop for CommandPool<D> {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::vulkan::testing::MockDevice;

    #[test]
    fn test_reset_reuses_buffers() {
        let device = Arc::new(MockDevice::new());
        let mut pool = CommandPool::new(device.clone(), 0).unwrap();

        let a = pool.request_command_buffer(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT).unwrap();
        pool.reset().unwrap();
        let b = pool.request_command_buffer(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT).unwrap();

        assert_eq!(a, b);
        assert_eq!(device.created("command_buffer"), 1);
        assert_eq!(pool.active_count(), 1);
    }

    #[test]
    fn test_requested_buffers_are_begun() {
        let device = Arc::new(MockDevice::new());
        let mut pool = CommandPool::new(device.clone(), 0).unwrap();
        pool.request_command_buffer(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT).unwrap();
        pool.request_command_buffer(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT).unwrap();

        let begins = device.state().calls.iter().filter(|c| **c == "begin_command_buffer").count();
        assert_eq!(begins, 2);
        assert_eq!(device.created("command_buffer"), 2);
    }

    #[test]
    fn test_destroy_frees_then_destroys() {
        let device = Arc::new(MockDevice::new());
        let mut pool = CommandPool::new(device.clone(), 0).unwrap();
        pool.request_command_buffer(vk::CommandBufferUsageFlags::empty()).unwrap();
        device.clear_calls();

        pool.destroy();
        pool.destroy();

        assert_eq!(device.state().calls, vec!["command_buffer", "command_pool"]);
        assert_eq!(device.live("command_pool"), 0);
    }
}

//! Recyclable synchronization primitives
//!
//! Creating fences and semaphores every frame is wasteful, so each frame slot owns pools that
//! hand out primitives and take them all back at once:
//!
//! ```text
//! frame N:   request() -> f0, request() -> f1          (two fences created)
//! reuse:     wait(), reset()                           (active count back to 0)
//! frame N+k: request() -> f0                           (reused, nothing created)
//! ```
//!
//! Pools grow to the peak number of primitives a frame ever needed and never shrink;
//! everything is destroyed when the pool is dropped.
//!
//! Acquire semaphores follow a different pattern: which one is in use depends on which image
//! the presentation engine hands back, so they go through a [`SemaphoreRecycler`] free list
//! instead.

use std::sync::{Arc, Mutex, PoisonError};

use ash::vk;

use super::api::DeviceApi;
use crate::graphics::{GraphicsError, GraphicsResult};

/// Timeout sentinel meaning "wait forever"
pub const WAIT_FOREVER: u64 = u64::MAX;

/// Pool of fences reused across frames
pub struct FencePool<D: DeviceApi> {
    device: Arc<D>,
    fences: Vec<vk::Fence>,
    active_count: usize,
}

impl<D: DeviceApi> FencePool<D> {
    /// Create an empty pool
    pub fn new(device: Arc<D>) -> Self {
        Self {
            device,
            fences: Vec::new(),
            active_count: 0,
        }
    }

    /// Hand out an unsignaled fence, creating one only when every pooled fence is active
    pub fn request_fence(&mut self) -> GraphicsResult<vk::Fence> {
        if let Some(&fence) = self.fences.get(self.active_count) {
            self.active_count += 1;
            return Ok(fence);
        }

        let fence = self.device.create_fence(false).map_err(GraphicsError::from_vk)?;
        self.fences.push(fence);
        self.active_count += 1;
        Ok(fence)
    }

    /// Block until every active fence is signaled; no-op when none are active
    pub fn wait(&self, timeout: u64) -> GraphicsResult<()> {
        if self.active_count == 0 {
            return Ok(());
        }

        self.device
            .wait_for_fences(&self.fences[..self.active_count], timeout)
            .map_err(GraphicsError::from_vk)
    }

    /// Unsignal the active fences and make them available again
    ///
    /// The active count only rewinds when the native reset succeeds.
    pub fn reset(&mut self) -> GraphicsResult<()> {
        if self.active_count == 0 {
            return Ok(());
        }

        self.device
            .reset_fences(&self.fences[..self.active_count])
            .map_err(GraphicsError::from_vk)?;
        self.active_count = 0;
        Ok(())
    }

    /// Fences handed out since the last reset
    pub fn active_count(&self) -> usize {
        self.active_count
    }

    /// Fences owned by the pool
    pub fn capacity(&self) -> usize {
        self.fences.len()
    }
}

impl<D: DeviceApi> Drop for FencePool<D> {
    fn drop(&mut self) {
        if let Err(err) = self.wait(WAIT_FOREVER) {
            log::warn!("Fence pool wait failed during teardown: {}", err);
        }
        if let Err(err) = self.reset() {
            log::warn!("Fence pool reset failed during teardown: {}", err);
        }
        for fence in self.fences.drain(..) {
            self.device.destroy_fence(fence);
        }
    }
}

/// Pool of binary semaphores reused across frames
pub struct SemaphorePool<D: DeviceApi> {
    device: Arc<D>,
    semaphores: Vec<vk::Semaphore>,
    active_count: usize,
}

impl<D: DeviceApi> SemaphorePool<D> {
    /// Create an empty pool
    pub fn new(device: Arc<D>) -> Self {
        Self {
            device,
            semaphores: Vec::new(),
            active_count: 0,
        }
    }

    /// Hand out a semaphore, creating one only when every pooled semaphore is active
    pub fn request_semaphore(&mut self) -> GraphicsResult<vk::Semaphore> {
        if let Some(&semaphore) = self.semaphores.get(self.active_count) {
            self.active_count += 1;
            return Ok(semaphore);
        }

        let semaphore = self.device.create_semaphore().map_err(GraphicsError::from_vk)?;
        self.semaphores.push(semaphore);
        self.active_count += 1;
        Ok(semaphore)
    }

    /// Make every semaphore available again
    pub fn reset(&mut self) {
        self.active_count = 0;
    }

    /// Semaphores handed out since the last reset
    pub fn active_count(&self) -> usize {
        self.active_count
    }

    /// Semaphores owned by the pool
    pub fn capacity(&self) -> usize {
        self.semaphores.len()
    }
}

impl<D: DeviceApi> Drop for SemaphorePool<D> {
    fn drop(&mut self) {
        self.reset();
        for semaphore in self.semaphores.drain(..) {
            self.device.destroy_semaphore(semaphore);
        }
    }
}

/// Free list of semaphores used for swapchain image acquisition
///
/// Safe to share between threads; the list is behind a mutex.
pub struct SemaphoreRecycler<D: DeviceApi> {
    device: Arc<D>,
    free: Mutex<Vec<vk::Semaphore>>,
}

impl<D: DeviceApi> SemaphoreRecycler<D> {
    /// Create an empty recycler
    pub fn new(device: Arc<D>) -> Self {
        Self {
            device,
            free: Mutex::new(Vec::new()),
        }
    }

    /// Pop a recycled semaphore or create a new one
    pub fn request(&self) -> GraphicsResult<vk::Semaphore> {
        let recycled = self.free.lock().unwrap_or_else(PoisonError::into_inner).pop();
        match recycled {
            Some(semaphore) => Ok(semaphore),
            None => self.device.create_semaphore().map_err(GraphicsError::from_vk),
        }
    }

    /// Return an unsignaled semaphore to the free list
    pub fn recycle(&self, semaphore: vk::Semaphore) {
        if semaphore != vk::Semaphore::null() {
            self.free.lock().unwrap_or_else(PoisonError::into_inner).push(semaphore);
        }
    }

    /// Semaphores waiting for reuse
    pub fn len(&self) -> usize {
        self.free.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether the free list is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Destroy every semaphore on the free list
    pub fn clear(&self) {
        let drained: Vec<_> = self.free.lock().unwrap_or_else(PoisonError::into_inner).drain(..).collect();
        for semaphore in drained {
            self.device.destroy_semaphore(semaphore);
        }
    }
}

impl<D: DeviceApi> Drop for SemaphoreRecycler<D> {
    fn drop(&mut self) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::vulkan::testing::MockDevice;

    #[test]
    fn test_fence_pool_reuses_after_reset() {
        let device = Arc::new(MockDevice::new());
        let mut pool = FencePool::new(device.clone());

        let first: Vec<_> = (0..3).map(|_| pool.request_fence().unwrap()).collect();
        pool.reset().unwrap();
        let second: Vec<_> = (0..3).map(|_| pool.request_fence().unwrap()).collect();

        assert_eq!(first, second);
        assert_eq!(device.created("fence"), 3);
        assert_eq!(pool.capacity(), 3);
    }

    #[test]
    fn test_fence_pool_grows_past_peak() {
        let device = Arc::new(MockDevice::new());
        let mut pool = FencePool::new(device.clone());

        pool.request_fence().unwrap();
        pool.reset().unwrap();
        pool.request_fence().unwrap();
        pool.request_fence().unwrap();

        assert_eq!(device.created("fence"), 2);
        assert_eq!(pool.active_count(), 2);
    }

    #[test]
    fn test_fence_wait_noop_when_idle() {
        let device = Arc::new(MockDevice::new());
        let mut pool = FencePool::new(device.clone());

        pool.wait(WAIT_FOREVER).unwrap();
        assert!(!device.state().calls.contains(&"wait_for_fences"));

        pool.request_fence().unwrap();
        pool.wait(1_000).unwrap();
        assert!(device.state().calls.contains(&"wait_for_fences"));
    }

    #[test]
    fn test_fence_reset_failure_keeps_active() {
        let device = Arc::new(MockDevice::new());
        let mut pool = FencePool::new(device.clone());
        pool.request_fence().unwrap();

        device.state().reset_fences_result = Err(vk::Result::ERROR_DEVICE_LOST);
        assert_eq!(pool.reset(), Err(GraphicsError::DeviceLost));
        assert_eq!(pool.active_count(), 1);

        device.state().reset_fences_result = Ok(());
    }

    #[test]
    fn test_fence_pool_drop_destroys_all() {
        let device = Arc::new(MockDevice::new());
        {
            let mut pool = FencePool::new(device.clone());
            pool.request_fence().unwrap();
            pool.request_fence().unwrap();
        }
        assert_eq!(device.live("fence"), 0);
        assert_eq!(device.destroyed("fence"), 2);
    }

    #[test]
    fn test_semaphore_pool_reset_does_not_destroy() {
        let device = Arc::new(MockDevice::new());
        let mut pool = SemaphorePool::new(device.clone());

        for _ in 0..4 {
            pool.request_semaphore().unwrap();
        }
        pool.reset();
        for _ in 0..4 {
            pool.request_semaphore().unwrap();
        }

        assert_eq!(device.created("semaphore"), 4);
        assert_eq!(device.destroyed("semaphore"), 0);
        drop(pool);
        assert_eq!(device.destroyed("semaphore"), 4);
    }

    #[test]
    fn test_recycler_pops_before_creating() {
        let device = Arc::new(MockDevice::new());
        let recycler = SemaphoreRecycler::new(device.clone());

        let a = recycler.request().unwrap();
        recycler.recycle(a);
        assert_eq!(recycler.len(), 1);

        let b = recycler.request().unwrap();
        assert_eq!(a, b);
        assert!(recycler.is_empty());
        assert_eq!(device.created("semaphore"), 1);

        recycler.recycle(vk::Semaphore::null());
        assert!(recycler.is_empty());
    }

    #[test]
    fn test_recycler_drop_destroys_free_list() {
        let device = Arc::new(MockDevice::new());
        let recycler = SemaphoreRecycler::new(device.clone());
        let a = recycler.request().unwrap();
        let b = recycler.request().unwrap();
        recycler.recycle(a);
        recycler.recycle(b);
        drop(recycler);
        assert_eq!(device.live("semaphore"), 0);
    }
}

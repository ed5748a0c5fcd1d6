//! Swapchain creation, recreation and the acquire/submit/present cycle
//!
//! The manager owns the swapchain, its backbuffers, an optional depth buffer and one
//! [`PerFrame`] per swapchain image. Frame slots are indexed by the image the presentation
//! engine hands back, so at most `image_count` frames are ever in flight.
//!
//! # State machine
//!
//! ```text
//! Uninitialized -> Created -> Presenting <-> Recreating -> Destroyed
//! ```
//!
//! Recreation happens on window resize, on a vertical sync change, and whenever acquire or
//! present reports `VK_SUBOPTIMAL_KHR` / `VK_ERROR_OUT_OF_DATE_KHR`. Callers never see those
//! two codes; they just get a skipped frame at worst.

use std::sync::Arc;

use ash::vk::{self, Handle};

use super::api::{DeviceApi, QueueSubmit};
use super::frame::{DeferredRelease, PerFrame};
use super::sync::{SemaphoreRecycler, WAIT_FOREVER};
use crate::graphics::{Extent2D, GraphicsError, GraphicsResult, SwapchainDescriptor};

/// Lifecycle state of a [`SwapchainManager`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapchainState {
    /// No native swapchain yet
    Uninitialized,
    /// Swapchain exists, no frame presented since creation
    Created,
    /// Frames are being acquired and presented
    Presenting,
    /// Being rebuilt
    Recreating,
    /// Torn down
    Destroyed,
}

/// Image count for a request, 0 meaning automatic
///
/// Automatic is `min + 1`; the result is always within the surface's bounds
/// (`max == 0` means unbounded).
pub fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR, requested: u32) -> u32 {
    let desired = if requested == 0 {
        capabilities.min_image_count + 1
    } else {
        requested.max(capabilities.min_image_count)
    };

    if capabilities.max_image_count > 0 {
        desired.min(capabilities.max_image_count)
    } else {
        desired
    }
}

/// Pick a surface format, preferring an exact match for `preferred`
///
/// A lone `UNDEFINED` entry means the surface takes anything; BGRA8 UNORM is used then.
pub fn choose_surface_format(
    formats: &[vk::SurfaceFormatKHR],
    preferred: vk::Format,
) -> Option<vk::SurfaceFormatKHR> {
    match formats {
        [] => None,
        [only] if only.format == vk::Format::UNDEFINED => Some(vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_UNORM,
            color_space: only.color_space,
        }),
        _ => formats
            .iter()
            .find(|candidate| candidate.format == preferred)
            .or_else(|| formats.first())
            .copied(),
    }
}

/// Swapchain extent for a requested size
///
/// A degenerate request follows the surface's current extent; anything else is clamped to
/// the surface bounds.
pub fn choose_extent(capabilities: &vk::SurfaceCapabilitiesKHR, requested: Extent2D) -> vk::Extent2D {
    let follows_surface = capabilities.current_extent.width != u32::MAX;
    if requested.is_empty() && follows_surface {
        return capabilities.current_extent;
    }

    let (width, height) = if requested.is_empty() {
        (capabilities.min_image_extent.width.max(1), capabilities.min_image_extent.height.max(1))
    } else {
        (requested.width, requested.height)
    };

    vk::Extent2D {
        width: width.clamp(capabilities.min_image_extent.width, capabilities.max_image_extent.width),
        height: height.clamp(capabilities.min_image_extent.height, capabilities.max_image_extent.height),
    }
}

/// FIFO with vertical sync, otherwise mailbox, then immediate, then FIFO
pub fn choose_present_mode(modes: &[vk::PresentModeKHR], vertical_sync: bool) -> vk::PresentModeKHR {
    if vertical_sync {
        return vk::PresentModeKHR::FIFO;
    }

    [vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::IMMEDIATE]
        .into_iter()
        .find(|mode| modes.contains(mode))
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

/// First supported of inherit, opaque, post-multiplied, pre-multiplied
pub fn choose_composite_alpha(supported: vk::CompositeAlphaFlagsKHR) -> vk::CompositeAlphaFlagsKHR {
    [
        vk::CompositeAlphaFlagsKHR::INHERIT,
        vk::CompositeAlphaFlagsKHR::OPAQUE,
        vk::CompositeAlphaFlagsKHR::POST_MULTIPLIED,
        vk::CompositeAlphaFlagsKHR::PRE_MULTIPLIED,
    ]
    .into_iter()
    .find(|mode| supported.contains(*mode))
    .unwrap_or(vk::CompositeAlphaFlagsKHR::OPAQUE)
}

/// Identity when supported, otherwise whatever the surface currently uses
pub fn choose_pre_transform(capabilities: &vk::SurfaceCapabilitiesKHR) -> vk::SurfaceTransformFlagsKHR {
    if capabilities.supported_transforms.contains(vk::SurfaceTransformFlagsKHR::IDENTITY) {
        vk::SurfaceTransformFlagsKHR::IDENTITY
    } else {
        capabilities.current_transform
    }
}

/// Color attachment, plus transfer source/destination when the surface allows them
pub fn choose_image_usage(capabilities: &vk::SurfaceCapabilitiesKHR) -> vk::ImageUsageFlags {
    let optional = vk::ImageUsageFlags::TRANSFER_SRC | vk::ImageUsageFlags::TRANSFER_DST;
    vk::ImageUsageFlags::COLOR_ATTACHMENT | (capabilities.supported_usage_flags & optional)
}

fn swapchain_error(result: vk::Result) -> GraphicsError {
    match GraphicsError::from_vk(result) {
        GraphicsError::Api(code) => GraphicsError::SwapchainCreationFailed(code),
        other => other,
    }
}

/// One swapchain image with its view and tracked layout
#[derive(Debug, Clone, Copy)]
pub struct BackBuffer {
    /// Image owned by the swapchain
    pub image: vk::Image,
    /// Color view
    pub view: vk::ImageView,
    /// Layout the image was last transitioned to
    pub layout: vk::ImageLayout,
}

struct DepthBuffer<A> {
    image: vk::Image,
    allocation: A,
    view: vk::ImageView,
    format: vk::Format,
}

enum AcquireOutcome {
    Acquired { index: u32, suboptimal: bool },
    OutOfDate,
}

/// Owns the swapchain and drives the frame cycle
pub struct SwapchainManager<D: DeviceApi> {
    device: Arc<D>,
    surface: vk::SurfaceKHR,
    queue: vk::Queue,
    queue_family: u32,
    descriptor: SwapchainDescriptor,
    state: SwapchainState,
    handle: vk::SwapchainKHR,
    surface_format: vk::SurfaceFormatKHR,
    present_mode: vk::PresentModeKHR,
    extent: vk::Extent2D,
    back_buffers: Vec<BackBuffer>,
    depth: Option<DepthBuffer<D::Allocation>>,
    frames: Vec<PerFrame<D>>,
    recycler: SemaphoreRecycler<D>,
    image_index: u32,
    frame_active: bool,
    submitted: bool,
    recreate_pending: bool,
    frame_count: u64,
    generation: u64,
}

impl<D: DeviceApi> SwapchainManager<D> {
    /// Create the manager and its first swapchain
    ///
    /// # Arguments
    /// * `queue` - Queue used for both submission and present
    /// * `queue_family` - Family of `queue`; frame command pools are created on it
    pub fn new(
        device: Arc<D>,
        surface: vk::SurfaceKHR,
        queue: vk::Queue,
        queue_family: u32,
        descriptor: SwapchainDescriptor,
    ) -> GraphicsResult<Self> {
        let mut manager = Self {
            recycler: SemaphoreRecycler::new(device.clone()),
            device,
            surface,
            queue,
            queue_family,
            descriptor,
            state: SwapchainState::Uninitialized,
            handle: vk::SwapchainKHR::null(),
            surface_format: vk::SurfaceFormatKHR::default(),
            present_mode: vk::PresentModeKHR::FIFO,
            extent: vk::Extent2D::default(),
            back_buffers: Vec::new(),
            depth: None,
            frames: Vec::new(),
            image_index: 0,
            frame_active: false,
            submitted: false,
            recreate_pending: false,
            frame_count: 0,
            generation: 0,
        };

        manager.update_swapchain()?;
        Ok(manager)
    }

    /// Create or recreate the swapchain from the current surface state
    ///
    /// The previous swapchain is handed to the driver as `oldSwapchain` and destroyed after
    /// the new one exists. A zero-sized surface leaves everything untouched and marks the
    /// swapchain for recreation.
    pub fn update_swapchain(&mut self) -> GraphicsResult<()> {
        let old_swapchain = self.handle;
        if old_swapchain != vk::SwapchainKHR::null() {
            self.device.device_wait_idle().map_err(GraphicsError::from_vk)?;
            self.state = SwapchainState::Recreating;
        }

        let capabilities = self.device.surface_capabilities(self.surface).map_err(GraphicsError::from_vk)?;
        let formats = self.device.surface_formats(self.surface).map_err(GraphicsError::from_vk)?;
        let present_modes = self.device.surface_present_modes(self.surface).map_err(GraphicsError::from_vk)?;

        let extent = choose_extent(&capabilities, self.descriptor.extent);
        if extent.width == 0 || extent.height == 0 {
            log::debug!("Surface has zero extent, deferring swapchain creation");
            self.recreate_pending = true;
            return Ok(());
        }

        let surface_format = choose_surface_format(&formats, self.descriptor.color_format.to_vk())
            .ok_or(GraphicsError::SwapchainCreationFailed(vk::Result::ERROR_FORMAT_NOT_SUPPORTED))?;
        let present_mode = choose_present_mode(&present_modes, self.descriptor.vertical_sync);
        let image_count = choose_image_count(&capabilities, self.descriptor.image_count);

        let create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(self.surface)
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(choose_image_usage(&capabilities))
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(choose_pre_transform(&capabilities))
            .composite_alpha(choose_composite_alpha(capabilities.supported_composite_alpha))
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);

        let swapchain = self.device.create_swapchain(&create_info).map_err(swapchain_error)?;

        if old_swapchain != vk::SwapchainKHR::null() {
            self.release_swapchain_resources();
            self.device.destroy_swapchain(old_swapchain);
        }

        self.handle = swapchain;
        self.generation += 1;
        self.surface_format = surface_format;
        self.present_mode = present_mode;
        self.extent = extent;
        self.recreate_pending = false;
        self.frame_active = false;
        self.submitted = false;
        self.image_index = 0;

        self.create_back_buffers()?;
        self.create_depth_buffer()?;
        self.frames = (0..self.back_buffers.len())
            .map(|_| PerFrame::new(self.device.clone(), self.queue_family))
            .collect::<GraphicsResult<Vec<_>>>()?;

        self.state = SwapchainState::Created;
        log::info!(
            "Swapchain ready: {}x{} {:?} {:?}, {} images",
            extent.width,
            extent.height,
            surface_format.format,
            present_mode,
            self.back_buffers.len()
        );
        Ok(())
    }

    fn create_back_buffers(&mut self) -> GraphicsResult<()> {
        let images = self.device.swapchain_images(self.handle).map_err(swapchain_error)?;

        self.back_buffers.clear();
        for (i, image) in images.into_iter().enumerate() {
            let view = self
                .device
                .create_image_view(image, self.surface_format.format, vk::ImageAspectFlags::COLOR)
                .map_err(GraphicsError::from_vk)?;
            self.device
                .set_object_name(vk::ObjectType::IMAGE, image.as_raw(), &format!("Back Buffer {i}"));
            self.back_buffers.push(BackBuffer {
                image,
                view,
                layout: vk::ImageLayout::UNDEFINED,
            });
        }
        Ok(())
    }

    fn create_depth_buffer(&mut self) -> GraphicsResult<()> {
        if !self.descriptor.has_depth() {
            return Ok(());
        }

        let format = self.descriptor.depth_stencil_format;
        let info = vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::TYPE_2D)
            .format(format.to_vk())
            .extent(vk::Extent3D {
                width: self.extent.width,
                height: self.extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let (image, allocation) = self
            .device
            .create_allocated_image(&info)
            .map_err(GraphicsError::AllocationFailed)?;
        let view = match self.device.create_image_view(image, format.to_vk(), format.aspect_mask()) {
            Ok(view) => view,
            Err(err) => {
                self.device.destroy_allocated_image(image, allocation);
                return Err(GraphicsError::from_vk(err));
            }
        };
        self.device.set_object_name(vk::ObjectType::IMAGE, image.as_raw(), "Depth Buffer");

        self.depth = Some(DepthBuffer {
            image,
            allocation,
            view,
            format: format.to_vk(),
        });
        Ok(())
    }

    /// Tear down frames, views and the depth buffer of the current swapchain
    fn release_swapchain_resources(&mut self) {
        // The depth buffer goes through the first frame's deferred queue, purged by teardown.
        if let Some(depth) = self.depth.take() {
            let release_view = DeferredRelease::ImageView(depth.view);
            let release_image = DeferredRelease::Image {
                image: depth.image,
                allocation: Some(depth.allocation),
            };
            match self.frames.first_mut() {
                Some(frame) => {
                    frame.defer_release(release_view);
                    frame.defer_release(release_image);
                }
                None => {
                    release_view.release(self.device.as_ref());
                    release_image.release(self.device.as_ref());
                }
            }
        }

        self.frames.clear();
        for back_buffer in self.back_buffers.drain(..) {
            self.device.destroy_image_view(back_buffer.view);
        }
    }

    /// Recreate when the surface no longer matches the swapchain
    ///
    /// # Returns
    /// `false` when the surface is zero-sized and the frame should be skipped.
    pub fn handle_surface_changes(&mut self) -> GraphicsResult<bool> {
        let capabilities = self.device.surface_capabilities(self.surface).map_err(GraphicsError::from_vk)?;
        let current = capabilities.current_extent;

        if current.width == u32::MAX {
            return Ok(true);
        }
        if current.width == 0 || current.height == 0 {
            return Ok(false);
        }
        if current != self.extent || self.handle == vk::SwapchainKHR::null() {
            log::debug!(
                "Surface changed from {}x{} to {}x{}",
                self.extent.width,
                self.extent.height,
                current.width,
                current.height
            );
            let requested = self.descriptor.extent;
            if !requested.is_empty() && requested != Extent2D::new(current.width, current.height) {
                log::debug!(
                    "Requested extent {}x{} does not fit the surface, following the surface",
                    requested.width,
                    requested.height
                );
                self.descriptor.extent = Extent2D::default();
            }
            self.update_swapchain()?;
        }
        Ok(self.handle != vk::SwapchainKHR::null())
    }

    fn acquire_next_image(&mut self) -> GraphicsResult<AcquireOutcome> {
        let semaphore = self.recycler.request()?;

        match self.device.acquire_next_image(self.handle, WAIT_FOREVER, semaphore) {
            Ok((index, suboptimal)) => {
                let Some(frame) = self.frames.get_mut(index as usize) else {
                    return Err(GraphicsError::InvalidOperation {
                        reason: format!("Acquired image {index} has no frame slot"),
                    });
                };

                // The slot owns the new semaphore from here on, even if the wait fails.
                let previous = frame.replace_acquire_semaphore(semaphore);
                // The slot's last submission must finish before its buffers are touched.
                let waited = frame.wait_and_reset();
                // On failure the rebuild idles the device before anything is acquired again.
                self.recycler.recycle(previous);
                if let Err(err) = waited {
                    self.recreate_pending = true;
                    return Err(err);
                }
                Ok(AcquireOutcome::Acquired { index, suboptimal })
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                self.recycler.recycle(semaphore);
                Ok(AcquireOutcome::OutOfDate)
            }
            Err(err) => {
                self.recycler.recycle(semaphore);
                Err(GraphicsError::from_vk(err))
            }
        }
    }

    /// Acquire a backbuffer and begin its primary command buffer
    ///
    /// # Returns
    /// `Ok(false)` when no image could be acquired this frame.
    pub fn begin_frame(&mut self) -> GraphicsResult<bool> {
        if self.frame_active {
            return Err(GraphicsError::InvalidOperation {
                reason: "Frame is still active, call end_frame first".to_string(),
            });
        }
        if self.submitted {
            log::debug!("Previous frame was never presented, presenting it now");
            self.present()?;
        }
        if self.recreate_pending {
            self.update_swapchain()?;
        }
        if !self.handle_surface_changes()? {
            return Ok(false);
        }

        let mut outcome = self.acquire_next_image()?;
        if matches!(outcome, AcquireOutcome::OutOfDate) {
            log::debug!("Swapchain out of date on acquire, recreating");
            self.update_swapchain()?;
            if self.handle == vk::SwapchainKHR::null() {
                return Ok(false);
            }
            outcome = self.acquire_next_image()?;
        }

        let AcquireOutcome::Acquired { index, suboptimal } = outcome else {
            self.device.device_wait_idle().map_err(GraphicsError::from_vk)?;
            return Ok(false);
        };
        if suboptimal {
            self.recreate_pending = true;
        }

        self.image_index = index;
        if let Err(err) = self.frames[index as usize].begin_primary() {
            self.abandon_frame();
            return Err(err);
        }
        self.frame_active = true;
        self.state = SwapchainState::Presenting;
        Ok(true)
    }

    /// Move the current backbuffer to present layout, end recording and submit
    pub fn end_frame(&mut self) -> GraphicsResult<()> {
        if !self.frame_active {
            return Err(GraphicsError::InvalidOperation {
                reason: "Frame is not active, call begin_frame first".to_string(),
            });
        }

        self.transition_back_buffer(vk::ImageLayout::PRESENT_SRC_KHR);

        let result = self.submit_current();
        self.frame_active = false;
        match result {
            Ok(()) => {
                self.submitted = true;
                Ok(())
            }
            Err(err) => {
                log::error!("Failed to submit frame: {:?}", err);
                self.abandon_frame();
                Err(err)
            }
        }
    }

    fn submit_current(&self) -> GraphicsResult<()> {
        let frame = &self.frames[self.image_index as usize];
        let command_buffer = frame.primary_command_buffer();
        self.device.end_command_buffer(command_buffer).map_err(GraphicsError::from_vk)?;

        let submit = QueueSubmit {
            command_buffer,
            wait_semaphore: frame.acquire_semaphore(),
            wait_stage: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            signal_semaphore: frame.release_semaphore(),
        };
        // Any failure before this point leaves the fence signaled.
        frame.reset_fence()?;
        self.device
            .queue_submit(self.queue, &submit, frame.fence())
            .map_err(GraphicsError::from_vk)
    }

    /// Drop an acquired image that never reached the queue
    ///
    /// The slot gets a signaled fence back so its next wait returns, and the swapchain is
    /// rebuilt at the next `begin_frame`, which also discards the unconsumed acquire semaphore.
    fn abandon_frame(&mut self) {
        let index = self.image_index as usize;
        if let Some(frame) = self.frames.get_mut(index) {
            if let Err(err) = frame.restore_fence() {
                log::warn!("Failed to restore frame fence: {:?}", err);
            }
        }
        if let Some(back_buffer) = self.back_buffers.get_mut(index) {
            back_buffer.layout = vk::ImageLayout::UNDEFINED;
        }
        self.recreate_pending = true;
    }

    /// Present the submitted frame
    ///
    /// Suboptimal and out-of-date results rebuild the swapchain. Other failures are logged
    /// and the frame is dropped, except device and surface loss which are returned.
    pub fn present(&mut self) -> GraphicsResult<()> {
        if !self.submitted {
            return Err(GraphicsError::InvalidOperation {
                reason: "No submitted frame to present".to_string(),
            });
        }
        self.submitted = false;

        let release = self.frames[self.image_index as usize].release_semaphore();
        let result = self.device.queue_present(self.queue, self.handle, self.image_index, release);

        match result {
            Ok(suboptimal) => {
                self.frame_count += 1;
                if suboptimal {
                    log::debug!("Swapchain suboptimal on present, recreating");
                    self.recreate_pending = true;
                }
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                log::debug!("Swapchain out of date on present, recreating");
                self.recreate_pending = true;
            }
            Err(err @ (vk::Result::ERROR_DEVICE_LOST | vk::Result::ERROR_SURFACE_LOST_KHR)) => {
                return Err(GraphicsError::from_vk(err));
            }
            Err(err) => log::error!("Failed to present swapchain image: {:?}", err),
        }

        if self.recreate_pending {
            self.update_swapchain()?;
        }
        Ok(())
    }

    /// Record a layout transition of the current backbuffer if it is not already in `layout`
    pub fn transition_back_buffer(&mut self, layout: vk::ImageLayout) {
        let command_buffer = self.command_buffer();
        let Some(back_buffer) = self.back_buffers.get_mut(self.image_index as usize) else {
            return;
        };
        if back_buffer.layout == layout {
            return;
        }

        self.device.cmd_image_barrier(
            command_buffer,
            back_buffer.image,
            vk::ImageAspectFlags::COLOR,
            back_buffer.layout,
            layout,
        );
        back_buffer.layout = layout;
    }

    /// Change the presentation mode; takes effect at the next recreation point
    pub fn set_vertical_sync(&mut self, enabled: bool) {
        if self.descriptor.vertical_sync != enabled {
            self.descriptor.vertical_sync = enabled;
            self.recreate_pending = true;
        }
    }

    /// Request a new backbuffer size; takes effect at the next recreation point
    pub fn resize(&mut self, extent: Extent2D) {
        if extent != Extent2D::new(self.extent.width, self.extent.height) {
            self.descriptor.extent = extent;
            self.recreate_pending = true;
        }
    }

    /// Queue a resource for release after the current frame slot completes
    pub fn defer_release(&mut self, release: DeferredRelease<D::Allocation>) -> GraphicsResult<()> {
        match self.frames.get_mut(self.image_index as usize) {
            Some(frame) => frame.defer_release(release),
            None => {
                self.device.device_wait_idle().map_err(GraphicsError::from_vk)?;
                release.release(self.device.as_ref());
            }
        }
        Ok(())
    }

    /// Frame slot of the current image
    pub fn current_frame_mut(&mut self) -> Option<&mut PerFrame<D>> {
        self.frames.get_mut(self.image_index as usize)
    }

    /// Primary command buffer of the current frame, null outside a frame
    pub fn command_buffer(&self) -> vk::CommandBuffer {
        if !self.frame_active {
            return vk::CommandBuffer::null();
        }
        self.frames
            .get(self.image_index as usize)
            .map_or(vk::CommandBuffer::null(), PerFrame::primary_command_buffer)
    }

    /// Backbuffer of the current image
    pub fn current_back_buffer(&self) -> Option<&BackBuffer> {
        self.back_buffers.get(self.image_index as usize)
    }

    /// Depth view and format, when a depth buffer exists
    pub fn depth_attachment(&self) -> Option<(vk::ImageView, vk::Format)> {
        self.depth.as_ref().map(|depth| (depth.view, depth.format))
    }

    /// Whether a frame is being recorded
    pub fn is_frame_active(&self) -> bool {
        self.frame_active
    }

    /// Current state
    pub fn state(&self) -> SwapchainState {
        self.state
    }

    /// Native handle
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.handle
    }

    /// Chosen surface format
    pub fn surface_format(&self) -> vk::SurfaceFormatKHR {
        self.surface_format
    }

    /// Chosen present mode
    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    /// Backbuffer size
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Size asked for through the descriptor or [`Self::resize`]; empty means follow the surface
    pub fn requested_extent(&self) -> Extent2D {
        self.descriptor.extent
    }

    /// Number of times the swapchain has been (re)created
    ///
    /// Handles can be reused by the driver after destruction, so this is the reliable way to
    /// tell that backbuffer views changed.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Number of swapchain images
    pub fn image_count(&self) -> usize {
        self.back_buffers.len()
    }

    /// Index of the current image
    pub fn image_index(&self) -> u32 {
        self.image_index
    }

    /// Frames presented so far
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Destroy everything; the manager is unusable afterwards
    pub fn destroy(&mut self) {
        if self.state == SwapchainState::Destroyed {
            return;
        }
        if let Err(err) = self.device.device_wait_idle() {
            log::warn!("Wait idle failed during swapchain teardown: {:?}", err);
        }

        self.release_swapchain_resources();
        self.recycler.clear();
        if self.handle != vk::SwapchainKHR::null() {
            self.device.destroy_swapchain(self.handle);
            self.handle = vk::SwapchainKHR::null();
        }
        self.state = SwapchainState::Destroyed;
    }
}

impl<D: DeviceApi> Drop for SwapchainManager<D> {
    fn drop(&mut self) {
        self.destroy();
    }
}

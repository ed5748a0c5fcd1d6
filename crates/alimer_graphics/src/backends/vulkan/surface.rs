//! Vulkan surface management
//!
//! Windowing is somebody else's job: anything that can name its instance extensions and
//! produce a `VkSurfaceKHR` implements [`SurfaceSource`]. [`RawWindowTarget`] covers any window
//! exposing `raw-window-handle` handles.

use std::ffi::{CStr, CString};

use ash::extensions::khr;
use ash::vk;
use raw_window_handle::{HasRawDisplayHandle, HasRawWindowHandle, RawDisplayHandle, RawWindowHandle};

use crate::graphics::{Extent2D, GraphicsError, GraphicsResult};

/// Something a presentation surface can be created for
pub trait SurfaceSource {
    /// Instance extensions the surface needs, e.g. `VK_KHR_surface` plus a platform extension
    fn required_instance_extensions(&self) -> GraphicsResult<Vec<CString>>;

    /// Create the surface on a freshly created instance
    fn create_surface(&mut self, entry: &ash::Entry, instance: &ash::Instance) -> GraphicsResult<vk::SurfaceKHR>;

    /// Current drawable size, used as the initial swapchain extent when none was requested
    fn framebuffer_extent(&self) -> Extent2D {
        Extent2D::default()
    }
}

/// Surface source built from raw platform handles
///
/// The handles must stay valid for as long as the surface lives.
#[derive(Debug, Clone, Copy)]
pub struct RawWindowTarget {
    display: RawDisplayHandle,
    window: RawWindowHandle,
    extent: Extent2D,
}

impl RawWindowTarget {
    /// Wrap raw handles
    pub fn new(display: RawDisplayHandle, window: RawWindowHandle) -> Self {
        Self {
            display,
            window,
            extent: Extent2D::default(),
        }
    }

    /// Capture the handles of a window
    pub fn from_window<W: HasRawDisplayHandle + HasRawWindowHandle>(window: &W) -> Self {
        Self::new(window.raw_display_handle(), window.raw_window_handle())
    }

    /// Report a drawable size alongside the handles
    pub fn with_extent(mut self, extent: Extent2D) -> Self {
        self.extent = extent;
        self
    }
}

impl SurfaceSource for RawWindowTarget {
    fn required_instance_extensions(&self) -> GraphicsResult<Vec<CString>> {
        let names = ash_window::enumerate_required_extensions(self.display).map_err(|e| {
            GraphicsError::Initialization(format!("Unsupported window system: {:?}", e))
        })?;

        Ok(names
            .iter()
            .map(|&name| unsafe { CStr::from_ptr(name) }.to_owned())
            .collect())
    }

    fn create_surface(&mut self, entry: &ash::Entry, instance: &ash::Instance) -> GraphicsResult<vk::SurfaceKHR> {
        unsafe { ash_window::create_surface(entry, instance, self.display, self.window, None) }
            .map_err(|e| GraphicsError::Initialization(format!("Failed to create surface: {:?}", e)))
    }

    fn framebuffer_extent(&self) -> Extent2D {
        self.extent
    }
}

/// Vulkan surface wrapper for presentation
pub struct Surface {
    loader: khr::Surface,
    handle: vk::SurfaceKHR,
}

impl Surface {
    /// Create a surface through its source
    pub fn new(entry: &ash::Entry, instance: &ash::Instance, source: &mut dyn SurfaceSource) -> GraphicsResult<Self> {
        let loader = khr::Surface::new(entry, instance);
        let handle = source.create_surface(entry, instance)?;
        Ok(Self { loader, handle })
    }

    /// Get the underlying surface handle
    pub fn handle(&self) -> vk::SurfaceKHR {
        self.handle
    }

    /// Get the surface loader
    pub fn loader(&self) -> &khr::Surface {
        &self.loader
    }

    /// Check if a queue family can present to this surface
    pub fn supports_present(&self, physical_device: vk::PhysicalDevice, queue_family_index: u32) -> GraphicsResult<bool> {
        unsafe {
            self.loader
                .get_physical_device_surface_support(physical_device, queue_family_index, self.handle)
                .map_err(GraphicsError::from_vk)
        }
    }

    /// Destroy the surface; later calls do nothing
    ///
    /// Any swapchain created for the surface must already be destroyed.
    pub fn destroy(&mut self) {
        if self.handle != vk::SurfaceKHR::null() {
            unsafe { self.loader.destroy_surface(self.handle, None) };
            self.handle = vk::SurfaceKHR::null();
        }
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        self.destroy();
    }
}

//! Device and swapchain creation descriptors
//!
//! Descriptors are plain serde structs so applications can ship them as config files.
//! The native window is not part of the descriptor; it is handed to device creation
//! separately.

use serde::{Deserialize, Serialize};

use super::format::PixelFormat;
use super::types::{Extent2D, PowerPreference};
use crate::config::{Config, ConfigError};

/// Primary swapchain settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwapchainDescriptor {
    /// Requested backbuffer size; zero means "use the surface's current extent"
    pub extent: Extent2D,
    /// Preferred backbuffer format
    pub color_format: PixelFormat,
    /// Depth/stencil format, `Undefined` for none
    pub depth_stencil_format: PixelFormat,
    /// Whether the window is fullscreen
    pub fullscreen: bool,
    /// MSAA sample count
    pub sample_count: u32,
    /// FIFO presentation when set; mailbox or immediate otherwise
    pub vertical_sync: bool,
    /// Requested backbuffer count, 0 for automatic
    pub image_count: u32,
}

impl SwapchainDescriptor {
    /// Create a descriptor for the given size
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            extent: Extent2D::new(width, height),
            ..Self::default()
        }
    }

    /// Set the preferred color format
    pub fn with_color_format(mut self, format: PixelFormat) -> Self {
        self.color_format = format;
        self
    }

    /// Set the depth/stencil format
    pub fn with_depth_stencil_format(mut self, format: PixelFormat) -> Self {
        self.depth_stencil_format = format;
        self
    }

    /// Enable or disable vertical sync
    pub fn with_vertical_sync(mut self, enabled: bool) -> Self {
        self.vertical_sync = enabled;
        self
    }

    /// Request a backbuffer count
    pub fn with_image_count(mut self, count: u32) -> Self {
        self.image_count = count;
        self
    }

    /// Set the sample count
    pub fn with_sample_count(mut self, count: u32) -> Self {
        self.sample_count = count;
        self
    }

    /// Whether a depth attachment is requested
    pub fn has_depth(&self) -> bool {
        self.depth_stencil_format != PixelFormat::Undefined
    }

    /// Validate descriptor values
    pub fn validate(&self) -> Result<(), String> {
        if self.color_format.is_depth() {
            return Err(format!("Color format {:?} is a depth format", self.color_format));
        }
        if self.has_depth() && !self.depth_stencil_format.is_depth() {
            return Err(format!(
                "Depth/stencil format {:?} has no depth component",
                self.depth_stencil_format
            ));
        }
        if !self.sample_count.is_power_of_two() || self.sample_count > 64 {
            return Err(format!("Sample count {} is not a power of two in 1..=64", self.sample_count));
        }
        Ok(())
    }
}

impl Default for SwapchainDescriptor {
    fn default() -> Self {
        Self {
            extent: Extent2D::default(),
            color_format: PixelFormat::BGRA8Unorm,
            depth_stencil_format: PixelFormat::Undefined,
            fullscreen: false,
            sample_count: 1,
            vertical_sync: true,
            image_count: 0,
        }
    }
}

/// Everything needed to create a device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceDescriptor {
    /// Application name reported to the driver
    pub application_name: String,
    /// Adapter class to favor
    pub power_preference: PowerPreference,
    /// Enable validation layers and the debug messenger when available
    pub enable_validation: bool,
    /// Create no surface or swapchain
    pub headless: bool,
    /// Primary swapchain settings
    pub swapchain: SwapchainDescriptor,
}

impl DeviceDescriptor {
    /// Create a descriptor with the given application name
    pub fn new(application_name: impl Into<String>) -> Self {
        Self {
            application_name: application_name.into(),
            ..Self::default()
        }
    }

    /// Set application name
    pub fn with_application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = name.into();
        self
    }

    /// Set power preference
    pub fn with_power_preference(mut self, preference: PowerPreference) -> Self {
        self.power_preference = preference;
        self
    }

    /// Enable or disable validation layers
    pub fn with_validation(mut self, enable: bool) -> Self {
        self.enable_validation = enable;
        self
    }

    /// Run without a surface
    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Set the primary swapchain descriptor
    pub fn with_swapchain(mut self, swapchain: SwapchainDescriptor) -> Self {
        self.swapchain = swapchain;
        self
    }

    /// Validate descriptor values
    pub fn validate(&self) -> Result<(), String> {
        if self.application_name.trim().is_empty() {
            return Err("Application name cannot be empty".to_string());
        }
        self.swapchain.validate()
    }
}

impl Default for DeviceDescriptor {
    fn default() -> Self {
        Self {
            application_name: "Alimer".to_string(),
            power_preference: PowerPreference::default(),
            enable_validation: cfg!(debug_assertions),
            headless: false,
            swapchain: SwapchainDescriptor::default(),
        }
    }
}

impl Config for DeviceDescriptor {
    fn check(&self) -> Result<(), ConfigError> {
        self.validate().map_err(ConfigError::Invalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_descriptor_is_valid() {
        assert!(DeviceDescriptor::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_formats() {
        let swapchain = SwapchainDescriptor::new(800, 600).with_color_format(PixelFormat::Depth32Float);
        assert!(swapchain.validate().is_err());

        let swapchain = SwapchainDescriptor::new(800, 600).with_depth_stencil_format(PixelFormat::RGBA8Unorm);
        assert!(swapchain.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_sample_count() {
        assert!(SwapchainDescriptor::default().with_sample_count(3).validate().is_err());
        assert!(SwapchainDescriptor::default().with_sample_count(0).validate().is_err());
        assert!(SwapchainDescriptor::default().with_sample_count(4).validate().is_ok());
    }

    #[test]
    fn test_rejects_empty_name() {
        assert!(DeviceDescriptor::new("  ").validate().is_err());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("device.toml");
        std::fs::write(
            &path,
            "application_name = \"Sample\"\npower_preference = \"LowPower\"\n\n[swapchain]\nvertical_sync = false\n",
        )
        .unwrap();

        let descriptor = DeviceDescriptor::load_from_file(&path).unwrap();
        assert_eq!(descriptor.application_name, "Sample");
        assert_eq!(descriptor.power_preference, PowerPreference::LowPower);
        assert!(!descriptor.swapchain.vertical_sync);
        assert_eq!(descriptor.swapchain.color_format, PixelFormat::BGRA8Unorm);
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("device.ron");
        std::fs::write(&path, "(application_name: \"\")").unwrap();

        assert!(matches!(DeviceDescriptor::load_from_file(&path), Err(ConfigError::Invalid(_))));
    }
}

//! Backend-neutral value types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Native API a device is built on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendType {
    /// Vulkan 1.1+
    Vulkan,
    /// Direct3D 12
    Direct3D12,
    /// Direct3D 11
    Direct3D11,
    /// OpenGL
    OpenGL,
}

impl BackendType {
    /// Every backend in default preference order
    pub const ALL: [Self; 4] = [Self::Vulkan, Self::Direct3D12, Self::Direct3D11, Self::OpenGL];
}

impl fmt::Display for BackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Vulkan => "Vulkan",
            Self::Direct3D12 => "Direct3D12",
            Self::Direct3D11 => "Direct3D11",
            Self::OpenGL => "OpenGL",
        };
        f.write_str(name)
    }
}

/// Kind of physical adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AdapterType {
    /// Dedicated GPU
    DiscreteGpu,
    /// GPU sharing memory with the CPU
    IntegratedGpu,
    /// GPU exposed through a hypervisor
    VirtualGpu,
    /// Software rasterizer
    Cpu,
    /// Anything else the driver reports
    #[default]
    Unknown,
}

/// Which adapter class to favor during selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PowerPreference {
    /// No preference; discrete GPUs still win
    #[default]
    DontCare,
    /// Prefer integrated GPUs
    LowPower,
    /// Prefer discrete GPUs
    HighPerformance,
}

/// What happens to an attachment's contents at the start of a render pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LoadAction {
    /// Previous contents are undefined
    DontCare,
    /// Previous contents are preserved
    Load,
    /// Contents are cleared to the clear value
    #[default]
    Clear,
}

/// Two-dimensional size in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Extent2D {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl Extent2D {
    /// Create a new extent
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Whether either dimension is zero
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Linear RGBA color used for clears
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Color {
    /// Red
    pub r: f32,
    /// Green
    pub g: f32,
    /// Blue
    pub b: f32,
    /// Alpha
    pub a: f32,
}

impl Color {
    /// Opaque black
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0, 1.0);
    /// Cornflower blue, the traditional clear color
    pub const CORNFLOWER_BLUE: Self = Self::new(0.392, 0.584, 0.929, 1.0);

    /// Create a color from components
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Components as an array
    pub const fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extent_empty() {
        assert!(Extent2D::new(0, 600).is_empty());
        assert!(Extent2D::default().is_empty());
        assert!(!Extent2D::new(800, 600).is_empty());
    }

    #[test]
    fn test_backend_display() {
        assert_eq!(BackendType::Direct3D12.to_string(), "Direct3D12");
        assert_eq!(BackendType::ALL[0], BackendType::Vulkan);
    }
}

//! Pixel formats and their Vulkan equivalents

use ash::vk;
use serde::{Deserialize, Serialize};

/// Engine-neutral pixel format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum PixelFormat {
    #[default]
    Undefined,
    // 8-bit
    R8Unorm,
    R8Snorm,
    R8Uint,
    // 16-bit
    R16Float,
    RG8Unorm,
    // 32-bit
    R32Float,
    R32Uint,
    RG16Float,
    RGBA8Unorm,
    RGBA8UnormSrgb,
    BGRA8Unorm,
    BGRA8UnormSrgb,
    RGB10A2Unorm,
    RG11B10Float,
    // 64-bit
    RG32Float,
    RGBA16Float,
    // 128-bit
    RGBA32Float,
    // Depth/stencil
    Depth16Unorm,
    Depth32Float,
    Depth24UnormStencil8,
    Depth32FloatStencil8,
    // Block compressed
    BC1RGBAUnorm,
    BC3RGBAUnorm,
    BC7RGBAUnorm,
}

/// Single source of truth for the mapping, in both directions.
const FORMAT_TABLE: &[(PixelFormat, vk::Format)] = &[
    (PixelFormat::Undefined, vk::Format::UNDEFINED),
    (PixelFormat::R8Unorm, vk::Format::R8_UNORM),
    (PixelFormat::R8Snorm, vk::Format::R8_SNORM),
    (PixelFormat::R8Uint, vk::Format::R8_UINT),
    (PixelFormat::R16Float, vk::Format::R16_SFLOAT),
    (PixelFormat::RG8Unorm, vk::Format::R8G8_UNORM),
    (PixelFormat::R32Float, vk::Format::R32_SFLOAT),
    (PixelFormat::R32Uint, vk::Format::R32_UINT),
    (PixelFormat::RG16Float, vk::Format::R16G16_SFLOAT),
    (PixelFormat::RGBA8Unorm, vk::Format::R8G8B8A8_UNORM),
    (PixelFormat::RGBA8UnormSrgb, vk::Format::R8G8B8A8_SRGB),
    (PixelFormat::BGRA8Unorm, vk::Format::B8G8R8A8_UNORM),
    (PixelFormat::BGRA8UnormSrgb, vk::Format::B8G8R8A8_SRGB),
    (PixelFormat::RGB10A2Unorm, vk::Format::A2B10G10R10_UNORM_PACK32),
    (PixelFormat::RG11B10Float, vk::Format::B10G11R11_UFLOAT_PACK32),
    (PixelFormat::RG32Float, vk::Format::R32G32_SFLOAT),
    (PixelFormat::RGBA16Float, vk::Format::R16G16B16A16_SFLOAT),
    (PixelFormat::RGBA32Float, vk::Format::R32G32B32A32_SFLOAT),
    (PixelFormat::Depth16Unorm, vk::Format::D16_UNORM),
    (PixelFormat::Depth32Float, vk::Format::D32_SFLOAT),
    (PixelFormat::Depth24UnormStencil8, vk::Format::D24_UNORM_S8_UINT),
    (PixelFormat::Depth32FloatStencil8, vk::Format::D32_SFLOAT_S8_UINT),
    (PixelFormat::BC1RGBAUnorm, vk::Format::BC1_RGBA_UNORM_BLOCK),
    (PixelFormat::BC3RGBAUnorm, vk::Format::BC3_UNORM_BLOCK),
    (PixelFormat::BC7RGBAUnorm, vk::Format::BC7_UNORM_BLOCK),
];

impl PixelFormat {
    /// Vulkan format code
    pub fn to_vk(self) -> vk::Format {
        FORMAT_TABLE
            .iter()
            .find(|(format, _)| *format == self)
            .map_or(vk::Format::UNDEFINED, |(_, vk_format)| *vk_format)
    }

    /// Engine format for a Vulkan code, `Undefined` when there is none
    pub fn from_vk(format: vk::Format) -> Self {
        FORMAT_TABLE
            .iter()
            .find(|(_, vk_format)| *vk_format == format)
            .map_or(Self::Undefined, |(format, _)| *format)
    }

    /// Whether the format has a depth component
    pub const fn is_depth(self) -> bool {
        matches!(
            self,
            Self::Depth16Unorm | Self::Depth32Float | Self::Depth24UnormStencil8 | Self::Depth32FloatStencil8
        )
    }

    /// Whether the format has a stencil component
    pub const fn has_stencil(self) -> bool {
        matches!(self, Self::Depth24UnormStencil8 | Self::Depth32FloatStencil8)
    }

    /// Whether reads and writes go through sRGB conversion
    pub const fn is_srgb(self) -> bool {
        matches!(self, Self::RGBA8UnormSrgb | Self::BGRA8UnormSrgb)
    }

    /// Aspect flags for views of this format
    pub fn aspect_mask(self) -> vk::ImageAspectFlags {
        if self.has_stencil() {
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        } else if self.is_depth() {
            vk::ImageAspectFlags::DEPTH
        } else {
            vk::ImageAspectFlags::COLOR
        }
    }
}

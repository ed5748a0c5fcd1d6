//! Device capability report consumed by upper engine layers

use super::types::{AdapterType, BackendType};

bitflags::bitflags! {
    /// Optional features the device supports
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct GraphicsFeatures: u32 {
        /// Per-attachment blend state
        const INDEPENDENT_BLEND = 1 << 0;
        /// Compute pipelines
        const COMPUTE_SHADER = 1 << 1;
        /// Geometry shader stage
        const GEOMETRY_SHADER = 1 << 2;
        /// Tessellation stages
        const TESSELLATION_SHADER = 1 << 3;
        /// More than one viewport per draw
        const MULTI_VIEWPORT = 1 << 4;
        /// 32-bit index values up to `u32::MAX`
        const FULL_DRAW_INDEX_UINT32 = 1 << 5;
        /// Multiple draws per indirect call
        const MULTI_DRAW_INDIRECT = 1 << 6;
        /// Wireframe and point fill modes
        const FILL_MODE_NON_SOLID = 1 << 7;
        /// Anisotropic filtering
        const SAMPLER_ANISOTROPY = 1 << 8;
        /// ETC2/EAC compressed textures
        const TEXTURE_COMPRESSION_ETC2 = 1 << 9;
        /// ASTC LDR compressed textures
        const TEXTURE_COMPRESSION_ASTC_LDR = 1 << 10;
        /// BC compressed textures
        const TEXTURE_COMPRESSION_BC = 1 << 11;
        /// Cube map arrays
        const TEXTURE_CUBE_ARRAY = 1 << 12;
        /// Hardware raytracing
        const RAYTRACING = 1 << 13;
    }
}

/// Hard limits reported by the adapter
#[derive(Debug, Clone, Default, PartialEq)]
#[allow(missing_docs)]
pub struct GraphicsLimits {
    pub max_vertex_attributes: u32,
    pub max_vertex_bindings: u32,
    pub max_vertex_attribute_offset: u32,
    pub max_vertex_binding_stride: u32,
    pub max_texture_dimension_2d: u32,
    pub max_texture_dimension_3d: u32,
    pub max_texture_dimension_cube: u32,
    pub max_texture_array_layers: u32,
    pub max_color_attachments: u32,
    pub max_uniform_buffer_size: u32,
    pub min_uniform_buffer_offset_alignment: u64,
    pub max_storage_buffer_size: u32,
    pub min_storage_buffer_offset_alignment: u64,
    pub max_sampler_anisotropy: f32,
    pub max_viewports: u32,
    pub max_viewport_width: u32,
    pub max_viewport_height: u32,
    pub max_tessellation_patch_size: u32,
    pub point_size_range_min: f32,
    pub point_size_range_max: f32,
    pub line_width_range_min: f32,
    pub line_width_range_max: f32,
    pub max_compute_shared_memory_size: u32,
    pub max_compute_work_group_count: [u32; 3],
    pub max_compute_work_group_invocations: u32,
    pub max_compute_work_group_size: [u32; 3],
}

/// Everything upper layers may ask about the active device
#[derive(Debug, Clone, PartialEq)]
pub struct GraphicsDeviceCapabilities {
    /// Backend the device runs on
    pub backend: BackendType,
    /// PCI vendor ID
    pub vendor_id: u32,
    /// Vendor-specific device ID
    pub device_id: u32,
    /// Human readable adapter name
    pub adapter_name: String,
    /// Adapter class
    pub adapter_type: AdapterType,
    /// Supported optional features
    pub features: GraphicsFeatures,
    /// Hard limits
    pub limits: GraphicsLimits,
}

impl GraphicsDeviceCapabilities {
    /// Capabilities with no features and zeroed limits
    pub fn empty(backend: BackendType) -> Self {
        Self {
            backend,
            vendor_id: 0,
            device_id: 0,
            adapter_name: String::new(),
            adapter_type: AdapterType::Unknown,
            features: GraphicsFeatures::empty(),
            limits: GraphicsLimits::default(),
        }
    }

    /// Shorthand for `features.contains`
    pub fn supports(&self, features: GraphicsFeatures) -> bool {
        self.features.contains(features)
    }
}

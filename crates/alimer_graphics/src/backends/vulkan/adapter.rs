//! Physical device enumeration, suitability filtering and scoring

use std::ffi::CStr;

use ash::extensions::khr;
use ash::vk;

use super::extensions::DeviceExtensions;
use super::queue::{resolve_queue_families, QueueFamilyIndices};
use crate::graphics::{
    AdapterType, BackendType, GraphicsDeviceCapabilities, GraphicsError, GraphicsFeatures, GraphicsLimits,
    GraphicsResult, PowerPreference,
};

/// Score an adapter; higher wins
///
/// Vulkan 1.2 support dominates everything else, then the device type weighed by the power
/// preference.
pub fn score_adapter(api_version: u32, device_type: vk::PhysicalDeviceType, preference: PowerPreference) -> u32 {
    let mut score = 0u32;

    if api_version >= vk::API_VERSION_1_2 {
        score += 10_000;
    }

    score += match device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => {
            let preferred = matches!(preference, PowerPreference::HighPerformance | PowerPreference::DontCare);
            100 + if preferred { 1000 } else { 0 }
        }
        vk::PhysicalDeviceType::INTEGRATED_GPU => {
            90 + if preference == PowerPreference::LowPower { 1000 } else { 0 }
        }
        vk::PhysicalDeviceType::VIRTUAL_GPU => 80,
        vk::PhysicalDeviceType::CPU => 70,
        _ => 10,
    };

    score
}

/// Index of the highest score; ties go to the earliest entry
pub fn pick_best(scores: impl IntoIterator<Item = u32>) -> Option<usize> {
    let mut best: Option<(usize, u32)> = None;
    for (index, score) in scores.into_iter().enumerate() {
        if best.map_or(true, |(_, best_score)| score > best_score) {
            best = Some((index, score));
        }
    }
    best.map(|(index, _)| index)
}

/// Graphics family with present support, and viewport flipping through maintenance1
pub fn is_suitable(queues: &QueueFamilyIndices, extensions: &DeviceExtensions) -> bool {
    queues.has_graphics() && extensions.maintenance1
}

/// Engine-side adapter class
pub fn adapter_type(device_type: vk::PhysicalDeviceType) -> AdapterType {
    match device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => AdapterType::DiscreteGpu,
        vk::PhysicalDeviceType::INTEGRATED_GPU => AdapterType::IntegratedGpu,
        vk::PhysicalDeviceType::VIRTUAL_GPU => AdapterType::VirtualGpu,
        vk::PhysicalDeviceType::CPU => AdapterType::Cpu,
        _ => AdapterType::Unknown,
    }
}

/// Format a packed API version as `major.minor.patch`
pub fn version_string(version: u32) -> String {
    format!(
        "{}.{}.{}",
        vk::api_version_major(version),
        vk::api_version_minor(version),
        vk::api_version_patch(version)
    )
}

/// A physical device that passed the suitability filter
#[derive(Clone)]
pub struct Adapter {
    /// Native handle
    pub physical_device: vk::PhysicalDevice,
    /// Properties and limits
    pub properties: vk::PhysicalDeviceProperties,
    /// Supported core features
    pub features: vk::PhysicalDeviceFeatures,
    /// Memory heaps and types
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    /// Queue family table
    pub queue_families: Vec<vk::QueueFamilyProperties>,
    /// Resolved queue roles
    pub queue_indices: QueueFamilyIndices,
    /// Known extensions the device supports
    pub extensions: DeviceExtensions,
}

impl Adapter {
    /// Device name as reported by the driver
    pub fn name(&self) -> String {
        // SAFETY: the driver writes a null-terminated string into the fixed array
        unsafe { CStr::from_ptr(self.properties.device_name.as_ptr()) }
            .to_string_lossy()
            .into_owned()
    }

    /// Adapter class
    pub fn adapter_type(&self) -> AdapterType {
        adapter_type(self.properties.device_type)
    }

    /// Highest API version the device supports
    pub fn api_version(&self) -> u32 {
        self.properties.api_version
    }

    /// Score under a power preference
    pub fn score(&self, preference: PowerPreference) -> u32 {
        score_adapter(self.properties.api_version, self.properties.device_type, preference)
    }

    /// Capability report for upper layers
    pub fn capabilities(&self) -> GraphicsDeviceCapabilities {
        GraphicsDeviceCapabilities {
            backend: BackendType::Vulkan,
            vendor_id: self.properties.vendor_id,
            device_id: self.properties.device_id,
            adapter_name: self.name(),
            adapter_type: self.adapter_type(),
            features: features_from(&super::extensions::select_features(&self.features)),
            limits: limits_from(&self.properties.limits),
        }
    }
}

impl std::fmt::Debug for Adapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Adapter")
            .field("name", &self.name())
            .field("type", &self.adapter_type())
            .field("api_version", &version_string(self.api_version()))
            .field("queues", &self.queue_indices)
            .finish()
    }
}

/// Feature flags for what is actually enabled on the device
pub fn features_from(enabled: &vk::PhysicalDeviceFeatures) -> GraphicsFeatures {
    let on = |value: vk::Bool32| value == vk::TRUE;
    let mut features = GraphicsFeatures::COMPUTE_SHADER;

    features.set(GraphicsFeatures::INDEPENDENT_BLEND, on(enabled.independent_blend));
    features.set(GraphicsFeatures::GEOMETRY_SHADER, on(enabled.geometry_shader));
    features.set(GraphicsFeatures::TESSELLATION_SHADER, on(enabled.tessellation_shader));
    features.set(GraphicsFeatures::MULTI_VIEWPORT, on(enabled.multi_viewport));
    features.set(GraphicsFeatures::FULL_DRAW_INDEX_UINT32, on(enabled.full_draw_index_uint32));
    features.set(GraphicsFeatures::MULTI_DRAW_INDIRECT, on(enabled.multi_draw_indirect));
    features.set(GraphicsFeatures::FILL_MODE_NON_SOLID, on(enabled.fill_mode_non_solid));
    features.set(GraphicsFeatures::SAMPLER_ANISOTROPY, on(enabled.sampler_anisotropy));
    features.set(GraphicsFeatures::TEXTURE_COMPRESSION_ETC2, on(enabled.texture_compression_etc2));
    features.set(GraphicsFeatures::TEXTURE_COMPRESSION_ASTC_LDR, on(enabled.texture_compression_astc_ldr));
    features.set(GraphicsFeatures::TEXTURE_COMPRESSION_BC, on(enabled.texture_compression_bc));
    features.set(GraphicsFeatures::TEXTURE_CUBE_ARRAY, on(enabled.image_cube_array));

    features
}

/// Copy the limits upper layers care about
pub fn limits_from(limits: &vk::PhysicalDeviceLimits) -> GraphicsLimits {
    GraphicsLimits {
        max_vertex_attributes: limits.max_vertex_input_attributes,
        max_vertex_bindings: limits.max_vertex_input_bindings,
        max_vertex_attribute_offset: limits.max_vertex_input_attribute_offset,
        max_vertex_binding_stride: limits.max_vertex_input_binding_stride,
        max_texture_dimension_2d: limits.max_image_dimension2_d,
        max_texture_dimension_3d: limits.max_image_dimension3_d,
        max_texture_dimension_cube: limits.max_image_dimension_cube,
        max_texture_array_layers: limits.max_image_array_layers,
        max_color_attachments: limits.max_color_attachments,
        max_uniform_buffer_size: limits.max_uniform_buffer_range,
        min_uniform_buffer_offset_alignment: limits.min_uniform_buffer_offset_alignment,
        max_storage_buffer_size: limits.max_storage_buffer_range,
        min_storage_buffer_offset_alignment: limits.min_storage_buffer_offset_alignment,
        max_sampler_anisotropy: limits.max_sampler_anisotropy,
        max_viewports: limits.max_viewports,
        max_viewport_width: limits.max_viewport_dimensions[0],
        max_viewport_height: limits.max_viewport_dimensions[1],
        max_tessellation_patch_size: limits.max_tessellation_patch_size,
        point_size_range_min: limits.point_size_range[0],
        point_size_range_max: limits.point_size_range[1],
        line_width_range_min: limits.line_width_range[0],
        line_width_range_max: limits.line_width_range[1],
        max_compute_shared_memory_size: limits.max_compute_shared_memory_size,
        max_compute_work_group_count: limits.max_compute_work_group_count,
        max_compute_work_group_invocations: limits.max_compute_work_group_invocations,
        max_compute_work_group_size: limits.max_compute_work_group_size,
    }
}

/// Query every physical device and keep the suitable ones, in enumeration order
///
/// `surface` is `None` when running headless; present support is then assumed.
pub fn enumerate_adapters(
    instance: &ash::Instance,
    surface: Option<(&khr::Surface, vk::SurfaceKHR)>,
) -> GraphicsResult<Vec<Adapter>> {
    let devices = unsafe { instance.enumerate_physical_devices() }.map_err(GraphicsError::from_vk)?;
    if devices.is_empty() {
        log::error!("No GPUs with Vulkan support found");
        return Err(GraphicsError::NoSuitableAdapter);
    }

    let mut adapters = Vec::with_capacity(devices.len());
    for physical_device in devices {
        let adapter = query_adapter(instance, physical_device, surface)?;

        if is_suitable(&adapter.queue_indices, &adapter.extensions) {
            adapters.push(adapter);
        } else {
            log::debug!("Skipping unsuitable adapter {:?}", adapter);
        }
    }

    Ok(adapters)
}

fn query_adapter(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    surface: Option<(&khr::Surface, vk::SurfaceKHR)>,
) -> GraphicsResult<Adapter> {
    let (properties, features, memory_properties, queue_families, extension_properties) = unsafe {
        (
            instance.get_physical_device_properties(physical_device),
            instance.get_physical_device_features(physical_device),
            instance.get_physical_device_memory_properties(physical_device),
            instance.get_physical_device_queue_family_properties(physical_device),
            instance
                .enumerate_device_extension_properties(physical_device)
                .map_err(GraphicsError::from_vk)?,
        )
    };

    let queue_indices = resolve_queue_families(&queue_families, |family| match surface {
        // A failed support query counts as no support for that family.
        Some((loader, surface)) => unsafe {
            loader
                .get_physical_device_surface_support(physical_device, family, surface)
                .unwrap_or(false)
        },
        None => true,
    });

    let names = extension_properties
        .iter()
        .map(|ext| unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) });
    let extensions = DeviceExtensions::from_names(names, properties.api_version);

    Ok(Adapter {
        physical_device,
        properties,
        features,
        memory_properties,
        queue_families,
        queue_indices,
        extensions,
    })
}

/// Pick the best scoring adapter
pub fn select_adapter(adapters: Vec<Adapter>, preference: PowerPreference) -> GraphicsResult<Adapter> {
    let best = pick_best(adapters.iter().map(|adapter| adapter.score(preference)))
        .ok_or(GraphicsError::NoSuitableAdapter)?;

    let adapter = adapters.into_iter().nth(best).ok_or(GraphicsError::NoSuitableAdapter)?;
    log::info!(
        "Selected adapter '{}' ({:?}) with API version {}",
        adapter.name(),
        adapter.adapter_type(),
        version_string(adapter.api_version())
    );
    Ok(adapter)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TYPES: [vk::PhysicalDeviceType; 5] = [
        vk::PhysicalDeviceType::DISCRETE_GPU,
        vk::PhysicalDeviceType::INTEGRATED_GPU,
        vk::PhysicalDeviceType::VIRTUAL_GPU,
        vk::PhysicalDeviceType::CPU,
        vk::PhysicalDeviceType::OTHER,
    ];
    const PREFERENCES: [PowerPreference; 3] =
        [PowerPreference::DontCare, PowerPreference::LowPower, PowerPreference::HighPerformance];

    #[test]
    fn test_score_values() {
        let v11 = vk::API_VERSION_1_1;
        let v12 = vk::API_VERSION_1_2;
        assert_eq!(score_adapter(v11, vk::PhysicalDeviceType::DISCRETE_GPU, PowerPreference::DontCare), 1100);
        assert_eq!(score_adapter(v11, vk::PhysicalDeviceType::DISCRETE_GPU, PowerPreference::LowPower), 100);
        assert_eq!(score_adapter(v11, vk::PhysicalDeviceType::INTEGRATED_GPU, PowerPreference::LowPower), 1090);
        assert_eq!(score_adapter(v12, vk::PhysicalDeviceType::CPU, PowerPreference::DontCare), 10_070);
        assert_eq!(score_adapter(v11, vk::PhysicalDeviceType::OTHER, PowerPreference::DontCare), 10);
    }

    #[test]
    fn test_discrete_beats_integrated_for_performance() {
        for version in [vk::API_VERSION_1_1, vk::API_VERSION_1_2, vk::API_VERSION_1_3] {
            let discrete = score_adapter(version, vk::PhysicalDeviceType::DISCRETE_GPU, PowerPreference::HighPerformance);
            let integrated =
                score_adapter(version, vk::PhysicalDeviceType::INTEGRATED_GPU, PowerPreference::HighPerformance);
            assert!(discrete > integrated);
        }
    }

    #[test]
    fn test_api_1_2_floor() {
        for device_type in TYPES {
            for preference in PREFERENCES {
                let score = score_adapter(vk::API_VERSION_1_2, device_type, preference);
                let base = score_adapter(vk::API_VERSION_1_1, device_type, preference);
                assert!(score >= 10_000);
                assert_eq!(score, base + 10_000);
            }
        }
    }

    #[test]
    fn test_pick_best_prefers_first_on_tie() {
        assert_eq!(pick_best([10, 1100, 1100, 90]), Some(1));
        assert_eq!(pick_best([70]), Some(0));
        assert_eq!(pick_best(std::iter::empty()), None);
    }

    #[test]
    fn test_suitability() {
        let graphics = QueueFamilyIndices {
            graphics: Some(0),
            ..Default::default()
        };
        let maintenance = DeviceExtensions {
            maintenance1: true,
            ..Default::default()
        };

        assert!(is_suitable(&graphics, &maintenance));
        assert!(!is_suitable(&QueueFamilyIndices::default(), &maintenance));
        assert!(!is_suitable(&graphics, &DeviceExtensions::default()));
    }

    #[test]
    fn test_features_reflect_enabled_set() {
        let enabled = vk::PhysicalDeviceFeatures {
            texture_compression_bc: vk::TRUE,
            geometry_shader: vk::TRUE,
            ..Default::default()
        };
        let features = features_from(&enabled);
        assert!(features.contains(GraphicsFeatures::COMPUTE_SHADER | GraphicsFeatures::GEOMETRY_SHADER));
        assert!(features.contains(GraphicsFeatures::TEXTURE_COMPRESSION_BC));
        assert!(!features.contains(GraphicsFeatures::RAYTRACING));
        assert!(!features.contains(GraphicsFeatures::TESSELLATION_SHADER));
    }

    #[test]
    fn test_limits_copy() {
        let limits = vk::PhysicalDeviceLimits {
            max_image_dimension2_d: 16384,
            max_viewport_dimensions: [8192, 4096],
            line_width_range: [1.0, 8.0],
            max_compute_work_group_size: [1024, 1024, 64],
            ..Default::default()
        };
        let converted = limits_from(&limits);
        assert_eq!(converted.max_texture_dimension_2d, 16384);
        assert_eq!(converted.max_viewport_height, 4096);
        assert_eq!(converted.line_width_range_max, 8.0);
        assert_eq!(converted.max_compute_work_group_size, [1024, 1024, 64]);
    }

    #[test]
    fn test_version_string() {
        assert_eq!(version_string(vk::make_api_version(0, 1, 2, 131)), "1.2.131");
    }
}

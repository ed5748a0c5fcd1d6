//! Device extension and feature selection
//!
//! Everything here is a pure function of what the adapter reports, so the enable lists can be
//! checked without a driver.

use std::ffi::CStr;

use ash::extensions::khr;
use ash::vk;

/// Device extensions the backend knows how to use
///
/// Extensions promoted to core in Vulkan 1.1 are reported as present on 1.1 devices even when
/// the driver does not list them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct DeviceExtensions {
    pub swapchain: bool,
    pub get_memory_requirements2: bool,
    pub dedicated_allocation: bool,
    pub bind_memory2: bool,
    pub memory_budget: bool,
    pub maintenance1: bool,
    pub maintenance2: bool,
    pub maintenance3: bool,
    pub image_format_list: bool,
    pub sampler_mirror_clamp_to_edge: bool,
    pub depth_clip_enable: bool,
    pub full_screen_exclusive: bool,
    pub multiview: bool,
}

impl DeviceExtensions {
    /// Build from the names a physical device reports
    pub fn from_names<'a>(names: impl IntoIterator<Item = &'a CStr>, api_version: u32) -> Self {
        let mut exts = Self::default();

        for name in names {
            match name {
                n if n == khr::Swapchain::name() => exts.swapchain = true,
                n if n == vk::KhrGetMemoryRequirements2Fn::name() => exts.get_memory_requirements2 = true,
                n if n == vk::KhrDedicatedAllocationFn::name() => exts.dedicated_allocation = true,
                n if n == vk::KhrBindMemory2Fn::name() => exts.bind_memory2 = true,
                n if n == vk::ExtMemoryBudgetFn::name() => exts.memory_budget = true,
                n if n == vk::KhrMaintenance1Fn::name() => exts.maintenance1 = true,
                n if n == vk::KhrMaintenance2Fn::name() => exts.maintenance2 = true,
                n if n == vk::KhrMaintenance3Fn::name() => exts.maintenance3 = true,
                n if n == vk::KhrImageFormatListFn::name() => exts.image_format_list = true,
                n if n == vk::KhrSamplerMirrorClampToEdgeFn::name() => exts.sampler_mirror_clamp_to_edge = true,
                n if n == vk::ExtDepthClipEnableFn::name() => exts.depth_clip_enable = true,
                n if n == vk::ExtFullScreenExclusiveFn::name() => exts.full_screen_exclusive = true,
                n if n == vk::KhrMultiviewFn::name() => exts.multiview = true,
                _ => {}
            }
        }

        if api_version >= vk::API_VERSION_1_1 {
            exts.maintenance1 = true;
            exts.maintenance2 = true;
            exts.maintenance3 = true;
            exts.get_memory_requirements2 = true;
            exts.bind_memory2 = true;
            exts.multiview = true;
        }

        exts
    }

    /// Whether the allocator can use dedicated allocations
    pub fn supports_dedicated_allocation(&self) -> bool {
        self.get_memory_requirements2 && self.dedicated_allocation
    }
}

/// Extensions to enable at device creation
///
/// # Arguments
/// * `headless` - Skip the swapchain extension
/// * `surface_capabilities2` - Whether the instance enabled `VK_KHR_get_surface_capabilities2`,
///   which full-screen exclusive depends on
pub fn select_device_extensions(
    exts: &DeviceExtensions,
    api_version: u32,
    headless: bool,
    surface_capabilities2: bool,
) -> Vec<&'static CStr> {
    let below_1_1 = api_version < vk::API_VERSION_1_1;
    let mut enabled = Vec::new();

    if !headless {
        enabled.push(khr::Swapchain::name());
    }

    if exts.supports_dedicated_allocation() {
        enabled.push(vk::KhrGetMemoryRequirements2Fn::name());
        enabled.push(vk::KhrDedicatedAllocationFn::name());
    }

    if below_1_1 {
        let maintenance = [
            (exts.maintenance1, vk::KhrMaintenance1Fn::name()),
            (exts.maintenance2, vk::KhrMaintenance2Fn::name()),
            (exts.maintenance3, vk::KhrMaintenance3Fn::name()),
        ];
        enabled.extend(maintenance.into_iter().filter(|(present, _)| *present).map(|(_, name)| name));
    }

    if exts.image_format_list {
        enabled.push(vk::KhrImageFormatListFn::name());
    }
    if exts.sampler_mirror_clamp_to_edge {
        enabled.push(vk::KhrSamplerMirrorClampToEdgeFn::name());
    }
    if exts.depth_clip_enable {
        enabled.push(vk::ExtDepthClipEnableFn::name());
    }

    if cfg!(windows) && surface_capabilities2 && exts.full_screen_exclusive {
        enabled.push(vk::ExtFullScreenExclusiveFn::name());
    }

    if exts.multiview && below_1_1 {
        enabled.push(vk::KhrMultiviewFn::name());
    }

    enabled
}

/// Core features to enable, given what the adapter supports
///
/// Only one texture compression family is enabled: BC, else ASTC LDR, else ETC2.
pub fn select_features(supported: &vk::PhysicalDeviceFeatures) -> vk::PhysicalDeviceFeatures {
    let mut enabled = vk::PhysicalDeviceFeatures::default();

    if supported.texture_compression_bc == vk::TRUE {
        enabled.texture_compression_bc = vk::TRUE;
    } else if supported.texture_compression_astc_ldr == vk::TRUE {
        enabled.texture_compression_astc_ldr = vk::TRUE;
    } else if supported.texture_compression_etc2 == vk::TRUE {
        enabled.texture_compression_etc2 = vk::TRUE;
    }

    enabled.full_draw_index_uint32 = supported.full_draw_index_uint32;
    enabled.multi_draw_indirect = supported.multi_draw_indirect;
    enabled.image_cube_array = supported.image_cube_array;
    enabled.fill_mode_non_solid = supported.fill_mode_non_solid;
    enabled.independent_blend = supported.independent_blend;
    enabled.shader_sampled_image_array_dynamic_indexing = supported.shader_sampled_image_array_dynamic_indexing;
    enabled.sampler_anisotropy = supported.sampler_anisotropy;
    enabled.geometry_shader = supported.geometry_shader;
    enabled.tessellation_shader = supported.tessellation_shader;
    enabled.multi_viewport = supported.multi_viewport;

    enabled
}

#[cfg(test)]
mod tests {
    use super::*;

    const API_1_0: u32 = vk::API_VERSION_1_0;
    const API_1_2: u32 = vk::API_VERSION_1_2;

    #[test]
    fn test_promoted_extensions_on_1_1() {
        let exts = DeviceExtensions::from_names(std::iter::empty(), vk::API_VERSION_1_1);
        assert!(exts.maintenance1);
        assert!(exts.multiview);
        assert!(exts.get_memory_requirements2);
        assert!(!exts.dedicated_allocation);
        assert!(!exts.supports_dedicated_allocation());
    }

    #[test]
    fn test_from_names_matches_known_extensions() {
        let names = [
            khr::Swapchain::name(),
            vk::KhrDedicatedAllocationFn::name(),
            vk::KhrGetMemoryRequirements2Fn::name(),
            vk::ExtDepthClipEnableFn::name(),
        ];
        let exts = DeviceExtensions::from_names(names, API_1_0);
        assert!(exts.swapchain);
        assert!(exts.supports_dedicated_allocation());
        assert!(exts.depth_clip_enable);
        assert!(!exts.maintenance1);
    }

    #[test]
    fn test_headless_skips_swapchain() {
        let exts = DeviceExtensions {
            swapchain: true,
            ..Default::default()
        };
        assert!(select_device_extensions(&exts, API_1_2, true, false).is_empty());
        assert_eq!(select_device_extensions(&exts, API_1_2, false, false), vec![khr::Swapchain::name()]);
    }

    #[test]
    fn test_dedicated_allocation_enabled_as_pair() {
        let exts = DeviceExtensions {
            get_memory_requirements2: true,
            dedicated_allocation: true,
            ..Default::default()
        };
        let enabled = select_device_extensions(&exts, API_1_2, true, false);
        assert_eq!(
            enabled,
            vec![vk::KhrGetMemoryRequirements2Fn::name(), vk::KhrDedicatedAllocationFn::name()]
        );

        let only_one = DeviceExtensions {
            dedicated_allocation: true,
            ..Default::default()
        };
        assert!(select_device_extensions(&only_one, API_1_2, true, false).is_empty());
    }

    #[test]
    fn test_maintenance_and_multiview_only_below_1_1() {
        let exts = DeviceExtensions {
            maintenance1: true,
            maintenance3: true,
            multiview: true,
            ..Default::default()
        };

        let old = select_device_extensions(&exts, API_1_0, true, false);
        assert!(old.contains(&vk::KhrMaintenance1Fn::name()));
        assert!(!old.contains(&vk::KhrMaintenance2Fn::name()));
        assert!(old.contains(&vk::KhrMaintenance3Fn::name()));
        assert!(old.contains(&vk::KhrMultiviewFn::name()));

        assert!(select_device_extensions(&exts, API_1_2, true, false).is_empty());
    }

    #[test]
    fn test_full_screen_exclusive_needs_surface_caps2() {
        let exts = DeviceExtensions {
            full_screen_exclusive: true,
            ..Default::default()
        };
        assert!(select_device_extensions(&exts, API_1_2, true, false).is_empty());

        let with_caps2 = select_device_extensions(&exts, API_1_2, true, true);
        assert_eq!(with_caps2.contains(&vk::ExtFullScreenExclusiveFn::name()), cfg!(windows));
    }

    #[test]
    fn test_texture_compression_priority() {
        let all = vk::PhysicalDeviceFeatures {
            texture_compression_bc: vk::TRUE,
            texture_compression_astc_ldr: vk::TRUE,
            texture_compression_etc2: vk::TRUE,
            ..Default::default()
        };
        let enabled = select_features(&all);
        assert_eq!(enabled.texture_compression_bc, vk::TRUE);
        assert_eq!(enabled.texture_compression_astc_ldr, vk::FALSE);
        assert_eq!(enabled.texture_compression_etc2, vk::FALSE);

        let mobile = vk::PhysicalDeviceFeatures {
            texture_compression_astc_ldr: vk::TRUE,
            texture_compression_etc2: vk::TRUE,
            ..Default::default()
        };
        let enabled = select_features(&mobile);
        assert_eq!(enabled.texture_compression_astc_ldr, vk::TRUE);
        assert_eq!(enabled.texture_compression_etc2, vk::FALSE);
    }

    #[test]
    fn test_optional_features_follow_support() {
        let supported = vk::PhysicalDeviceFeatures {
            independent_blend: vk::TRUE,
            fill_mode_non_solid: vk::TRUE,
            robust_buffer_access: vk::TRUE,
            ..Default::default()
        };
        let enabled = select_features(&supported);
        assert_eq!(enabled.independent_blend, vk::TRUE);
        assert_eq!(enabled.fill_mode_non_solid, vk::TRUE);
        assert_eq!(enabled.multi_draw_indirect, vk::FALSE);
        assert_eq!(enabled.robust_buffer_access, vk::FALSE);
    }
}

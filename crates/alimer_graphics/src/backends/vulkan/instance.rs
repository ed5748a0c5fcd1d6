//! Vulkan instance creation with optional validation

use std::collections::HashSet;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;

use ash::extensions::ext::DebugUtils;
use ash::{vk, Entry, Instance};

use super::adapter::version_string;
use crate::graphics::{GraphicsError, GraphicsResult};

/// Khronos validation layer
pub const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Loader version, treating a 1.0 loader without the query as 1.0
pub fn loader_version(entry: &Entry) -> u32 {
    match entry.try_enumerate_instance_version() {
        Ok(Some(version)) => version,
        _ => vk::API_VERSION_1_0,
    }
}

/// Whether the loader knows the validation layer
pub fn validation_layer_available(entry: &Entry) -> bool {
    entry
        .enumerate_instance_layer_properties()
        .map(|layers| {
            layers
                .iter()
                .any(|layer| unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) } == VALIDATION_LAYER)
        })
        .unwrap_or(false)
}

/// Vulkan instance wrapper with RAII cleanup
pub struct VulkanInstance {
    entry: Entry,
    instance: Instance,
    debug_utils: Option<DebugUtils>,
    debug_messenger: vk::DebugUtilsMessengerEXT,
    api_version: u32,
    surface_capabilities2: bool,
}

impl VulkanInstance {
    /// Load the loader and create an instance
    ///
    /// # Arguments
    /// * `app_name` - Reported to the driver
    /// * `surface_extensions` - Instance extensions the presentation surface needs; empty when headless
    /// * `enable_validation` - Enable the validation layer and debug messenger when available
    pub fn new(app_name: &str, surface_extensions: &[CString], enable_validation: bool) -> GraphicsResult<Self> {
        let entry = unsafe { Entry::load() }
            .map_err(|e| GraphicsError::Initialization(format!("Failed to load Vulkan: {}", e)))?;

        let api_version = loader_version(&entry);
        if api_version < vk::API_VERSION_1_1 {
            return Err(GraphicsError::Initialization(format!(
                "Vulkan 1.1 is required, loader reports {}",
                version_string(api_version)
            )));
        }

        let available: HashSet<CString> = entry
            .enumerate_instance_extension_properties(None)
            .map_err(GraphicsError::from_vk)?
            .iter()
            .map(|ext| unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) }.to_owned())
            .collect();

        let mut extensions: Vec<CString> = Vec::new();
        for required in surface_extensions {
            if !available.contains(required) {
                return Err(GraphicsError::Initialization(format!(
                    "Required instance extension {:?} is not available",
                    required
                )));
            }
            extensions.push(required.clone());
        }

        let caps2 = vk::KhrGetSurfaceCapabilities2Fn::name();
        let surface_capabilities2 = !surface_extensions.is_empty() && available.contains(caps2);
        if surface_capabilities2 {
            extensions.push(caps2.to_owned());
        }

        let debug_utils_available = available.contains(DebugUtils::name());
        let mut layers: Vec<&CStr> = Vec::new();
        let mut use_debug_utils = false;
        if enable_validation {
            if validation_layer_available(&entry) {
                layers.push(VALIDATION_LAYER);
            } else {
                log::warn!("Validation requested but {:?} is not installed", VALIDATION_LAYER);
            }
            if debug_utils_available {
                extensions.push(DebugUtils::name().to_owned());
                use_debug_utils = true;
            }
        }

        let app_name = CString::new(app_name)
            .map_err(|_| GraphicsError::Initialization("Application name contains a null byte".to_string()))?;
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(c"Alimer")
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(api_version);

        let extension_ptrs: Vec<*const c_char> = extensions.iter().map(|ext| ext.as_ptr()).collect();
        let layer_ptrs: Vec<*const c_char> = layers.iter().map(|layer| layer.as_ptr()).collect();

        // Chained so messages emitted during vkCreateInstance itself reach the log too.
        let mut messenger_info = messenger_create_info();
        let mut create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extension_ptrs)
            .enabled_layer_names(&layer_ptrs);
        if use_debug_utils {
            create_info = create_info.push_next(&mut messenger_info);
        }

        let instance = unsafe { entry.create_instance(&create_info, None) }.map_err(|e| {
            GraphicsError::Initialization(format!("Could not create Vulkan instance: {:?}", e))
        })?;

        let (debug_utils, debug_messenger) = if use_debug_utils {
            let debug_utils = DebugUtils::new(&entry, &instance);
            let messenger = unsafe { debug_utils.create_debug_utils_messenger(&messenger_create_info(), None) }
                .unwrap_or_else(|e| {
                    log::error!("Could not create debug utils messenger: {:?}", e);
                    vk::DebugUtilsMessengerEXT::null()
                });
            (Some(debug_utils), messenger)
        } else {
            (None, vk::DebugUtilsMessengerEXT::null())
        };

        log::info!("Created VkInstance with version: {}", version_string(api_version));
        for layer in &layers {
            log::info!("Instance layer '{}'", layer.to_string_lossy());
        }
        for ext in &extensions {
            log::info!("Instance extension '{}'", ext.to_string_lossy());
        }

        Ok(Self {
            entry,
            instance,
            debug_utils,
            debug_messenger,
            api_version,
            surface_capabilities2,
        })
    }

    /// Get a reference to the Vulkan entry
    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    /// Get a reference to the Vulkan instance
    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    /// Debug utils loader, when validation enabled it
    pub fn debug_utils(&self) -> Option<&DebugUtils> {
        self.debug_utils.as_ref()
    }

    /// API version the instance was created with
    pub fn api_version(&self) -> u32 {
        self.api_version
    }

    /// Whether `VK_KHR_get_surface_capabilities2` is enabled
    pub fn has_surface_capabilities2(&self) -> bool {
        self.surface_capabilities2
    }
}

impl Drop for VulkanInstance {
    fn drop(&mut self) {
        unsafe {
            if let Some(debug_utils) = &self.debug_utils {
                if self.debug_messenger != vk::DebugUtilsMessengerEXT::null() {
                    debug_utils.destroy_debug_utils_messenger(self.debug_messenger, None);
                }
            }
            self.instance.destroy_instance(None);
        }
    }
}

fn messenger_create_info() -> vk::DebugUtilsMessengerCreateInfoEXT {
    vk::DebugUtilsMessengerCreateInfoEXT::builder()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::ERROR | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(debug_callback))
        .build()
}

/// Debug callback for validation layers
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if callback_data.is_null() || (*callback_data).p_message.is_null() {
        return vk::FALSE;
    }
    let message = CStr::from_ptr((*callback_data).p_message).to_string_lossy();

    if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        log::error!("[Vulkan] {:?} - {}", message_type, message);
    } else if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        log::warn!("[Vulkan] {:?} - {}", message_type, message);
    } else if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        log::info!("[Vulkan] {:?} - {}", message_type, message);
    } else {
        log::debug!("[Vulkan] {:?} - {}", message_type, message);
    }

    vk::FALSE
}

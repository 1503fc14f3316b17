//! Vulkan instance creation with optional validation layers

use ash::extensions::ext::DebugUtils;
use ash::{vk, Entry, Instance};
use std::ffi::{CStr, CString};
use std::os::raw::c_char;

use crate::config::RendererConfig;
use crate::vulkan::{VulkanError, VulkanResult};

/// Engine name reported to the driver
const ENGINE_NAME: &str = "SubpassRenderer";

/// Debug messenger bundle; only present when validation is active
struct DebugMessenger {
    loader: DebugUtils,
    messenger: vk::DebugUtilsMessengerEXT,
}

/// Vulkan instance wrapper with RAII cleanup
pub struct VulkanInstance {
    /// Vulkan entry point
    pub entry: Entry,
    /// Vulkan instance handle
    pub instance: Instance,
    debug: Option<DebugMessenger>,
}

impl VulkanInstance {
    /// Create a new Vulkan instance.
    ///
    /// `surface_extensions` are the windowing system's required instance
    /// extensions. Missing validation layers disable validation with a warning
    /// instead of failing.
    pub fn new(config: &RendererConfig, surface_extensions: &[String]) -> VulkanResult<Self> {
        let entry = unsafe { Entry::load() }
            .map_err(|e| VulkanError::InitializationFailed(format!("Failed to load Vulkan: {e}")))?;

        let app_name = to_cstring(&config.application_name)?;
        let engine_name = to_cstring(ENGINE_NAME)?;
        let (major, minor, patch) = config.application_version;
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, major, minor, patch))
            .engine_name(&engine_name)
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_0);

        let layers = if config.validation_enabled() {
            available_validation_layers(&entry, &config.validation_layers)?
        } else {
            Vec::new()
        };
        let validation = !layers.is_empty();

        let mut extension_names = surface_extensions
            .iter()
            .map(|name| to_cstring(name))
            .collect::<VulkanResult<Vec<_>>>()?;
        if validation {
            extension_names.push(DebugUtils::name().to_owned());
        }

        let extension_ptrs: Vec<*const c_char> =
            extension_names.iter().map(|e| e.as_ptr()).collect();
        let layer_ptrs: Vec<*const c_char> = layers.iter().map(|l| l.as_ptr()).collect();

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extension_ptrs)
            .enabled_layer_names(&layer_ptrs);

        let instance = unsafe { entry.create_instance(&create_info, None) }
            .map_err(VulkanError::Api)?;

        let debug = if validation {
            let loader = DebugUtils::new(&entry, &instance);
            match setup_debug_messenger(&loader) {
                Ok(messenger) => Some(DebugMessenger { loader, messenger }),
                Err(e) => {
                    unsafe { instance.destroy_instance(None) };
                    return Err(e);
                }
            }
        } else {
            None
        };

        log::info!(
            "Vulkan instance created (validation {})",
            if validation { "on" } else { "off" }
        );

        Ok(Self {
            entry,
            instance,
            debug,
        })
    }

    /// Whether validation layers and the debug messenger are active
    pub fn validation_enabled(&self) -> bool {
        self.debug.is_some()
    }
}

impl Drop for VulkanInstance {
    fn drop(&mut self) {
        unsafe {
            if let Some(debug) = self.debug.take() {
                debug
                    .loader
                    .destroy_debug_utils_messenger(debug.messenger, None);
            }
            self.instance.destroy_instance(None);
        }
        log::debug!("Vulkan instance destroyed");
    }
}

fn to_cstring(value: &str) -> VulkanResult<CString> {
    CString::new(value).map_err(|_| {
        VulkanError::InitializationFailed(format!("Name contains a NUL byte: {value:?}"))
    })
}

/// Keep only the requested layers the loader actually provides
fn available_validation_layers(entry: &Entry, requested: &[String]) -> VulkanResult<Vec<CString>> {
    let properties = entry
        .enumerate_instance_layer_properties()
        .map_err(VulkanError::Api)?;
    let available: Vec<String> = properties
        .iter()
        .map(|layer| {
            unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) }
                .to_string_lossy()
                .into_owned()
        })
        .collect();

    let (present, missing) = partition_layers(requested, &available);
    for layer in &missing {
        log::warn!("Validation layer {layer} is not available; continuing without it");
    }

    present.iter().map(|name| to_cstring(name)).collect()
}

/// Split requested layers into (available, missing)
pub(crate) fn partition_layers<'a>(
    requested: &'a [String],
    available: &[String],
) -> (Vec<&'a str>, Vec<&'a str>) {
    requested
        .iter()
        .map(String::as_str)
        .partition(|name| available.iter().any(|a| a.as_str() == *name))
}

fn setup_debug_messenger(loader: &DebugUtils) -> VulkanResult<vk::DebugUtilsMessengerEXT> {
    let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(debug_callback));

    unsafe { loader.create_debug_utils_messenger(&create_info, None) }.map_err(VulkanError::Api)
}

/// Route validation messages into the `log` facade
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

    if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::ERROR {
        log::error!("[Vulkan] {:?} - {}", message_type, message);
    } else if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::WARNING {
        log::warn!("[Vulkan] {:?} - {}", message_type, message);
    } else {
        log::debug!("[Vulkan] {:?} - {}", message_type, message);
    }

    vk::FALSE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_layers_are_reported_not_fatal() {
        let requested = vec![
            "VK_LAYER_KHRONOS_validation".to_string(),
            "VK_LAYER_missing".to_string(),
        ];
        let available = vec!["VK_LAYER_KHRONOS_validation".to_string()];

        let (present, missing) = partition_layers(&requested, &available);
        assert_eq!(present, vec!["VK_LAYER_KHRONOS_validation"]);
        assert_eq!(missing, vec!["VK_LAYER_missing"]);
    }

    #[test]
    fn test_no_layers_available() {
        let requested = vec!["VK_LAYER_KHRONOS_validation".to_string()];
        let (present, missing) = partition_layers(&requested, &[]);
        assert!(present.is_empty());
        assert_eq!(missing.len(), 1);
    }

    #[test]
    fn test_interior_nul_rejected() {
        assert!(to_cstring("bad\0name").is_err());
    }
}

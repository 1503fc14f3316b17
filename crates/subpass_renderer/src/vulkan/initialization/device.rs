//! Physical device selection and logical device creation
//!
//! Suitability is decided by [`check_suitability`] over an [`AdapterSurvey`],
//! a plain snapshot of everything the decision depends on, so the rules can
//! be exercised without a GPU. The first suitable adapter wins.

use ash::extensions::khr::Swapchain as SwapchainLoader;
use ash::{vk, Device, Instance};
use bitflags::bitflags;
use std::collections::BTreeSet;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;

use super::surface::Surface;
use crate::config::RendererConfig;
use crate::vulkan::{VulkanError, VulkanResult};

bitflags! {
    /// Queue capabilities an adapter must expose
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct QueueCapabilities: u32 {
        /// Graphics operations
        const GRAPHICS = 1;
        /// Presentation to the target surface
        const PRESENT = 1 << 1;
    }
}

/// Everything an adapter must provide to be selected
#[derive(Debug, Clone)]
pub struct DeviceRequirements {
    /// Required queue capabilities
    pub queue_capabilities: QueueCapabilities,
    /// Required device extensions; always contains the swapchain extension
    pub extensions: Vec<String>,
    /// Whether anisotropic sampling must be supported
    pub sampler_anisotropy: bool,
}

impl DeviceRequirements {
    /// Requirements for rendering textured geometry to a surface
    pub fn from_config(config: &RendererConfig) -> Self {
        let swapchain = SwapchainLoader::name().to_string_lossy().into_owned();
        let mut extensions = vec![swapchain];
        for extension in &config.device_extensions {
            if !extensions.contains(extension) {
                extensions.push(extension.clone());
            }
        }

        Self {
            queue_capabilities: QueueCapabilities::GRAPHICS | QueueCapabilities::PRESENT,
            extensions,
            sampler_anisotropy: true,
        }
    }
}

/// Queue family facts relevant to selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilySupport {
    /// Operations the family supports
    pub flags: vk::QueueFlags,
    /// Number of queues in the family
    pub queue_count: u32,
    /// Whether the family can present to the target surface
    pub present: bool,
}

/// Snapshot of one adapter's capabilities
#[derive(Debug, Clone, Default)]
pub struct AdapterSurvey {
    /// Human readable adapter name
    pub name: String,
    /// Queue families in index order
    pub queue_families: Vec<QueueFamilySupport>,
    /// Supported device extension names
    pub extensions: Vec<String>,
    /// Number of surface formats reported for the target surface
    pub surface_format_count: usize,
    /// Number of present modes reported for the target surface
    pub present_mode_count: usize,
    /// Whether `samplerAnisotropy` is supported
    pub sampler_anisotropy: bool,
}

/// Selected queue family indices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    /// Family used for graphics submission
    pub graphics: u32,
    /// Family used for presentation
    pub present: u32,
}

impl QueueFamilyIndices {
    /// Distinct family indices, ascending
    pub fn unique(&self) -> Vec<u32> {
        [self.graphics, self.present]
            .into_iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Whether graphics and present share a family
    pub fn is_shared(&self) -> bool {
        self.graphics == self.present
    }
}

/// Pick the graphics and present families.
///
/// A family that does both is preferred so the swapchain can stay exclusive.
pub fn find_queue_families(
    families: &[QueueFamilySupport],
    capabilities: QueueCapabilities,
) -> Option<QueueFamilyIndices> {
    let index_of = |position: usize| u32::try_from(position).ok();

    let graphics_ok = |family: &QueueFamilySupport| {
        !capabilities.contains(QueueCapabilities::GRAPHICS)
            || family.flags.contains(vk::QueueFlags::GRAPHICS)
    };
    let present_ok = |family: &QueueFamilySupport| {
        !capabilities.contains(QueueCapabilities::PRESENT) || family.present
    };

    if let Some((both, _)) = families
        .iter()
        .enumerate()
        .find(|(_, family)| family.queue_count > 0 && graphics_ok(family) && present_ok(family))
    {
        let index = index_of(both)?;
        return Some(QueueFamilyIndices {
            graphics: index,
            present: index,
        });
    }

    let graphics = families
        .iter()
        .enumerate()
        .find(|(_, family)| family.queue_count > 0 && graphics_ok(family))
        .and_then(|(i, _)| index_of(i))?;
    let present = families
        .iter()
        .enumerate()
        .find(|(_, family)| family.queue_count > 0 && present_ok(family))
        .and_then(|(i, _)| index_of(i))?;

    Some(QueueFamilyIndices { graphics, present })
}

/// Decide whether an adapter can run the renderer
pub fn check_suitability(
    survey: &AdapterSurvey,
    requirements: &DeviceRequirements,
) -> Result<QueueFamilyIndices, String> {
    let families = find_queue_families(&survey.queue_families, requirements.queue_capabilities)
        .ok_or_else(|| "missing graphics or present queue family".to_string())?;

    if let Some(missing) = requirements
        .extensions
        .iter()
        .find(|required| !survey.extensions.contains(required))
    {
        return Err(format!("missing device extension {missing}"));
    }

    if survey.surface_format_count == 0 {
        return Err("no surface formats".to_string());
    }
    if survey.present_mode_count == 0 {
        return Err("no present modes".to_string());
    }

    if requirements.sampler_anisotropy && !survey.sampler_anisotropy {
        return Err("anisotropic sampling unsupported".to_string());
    }

    Ok(families)
}

/// First candidate whose survey succeeded and passed [`check_suitability`].
///
/// A candidate whose survey failed is logged and skipped. When nothing
/// qualifies the last rejection reason is returned.
pub fn first_suitable<T>(
    candidates: impl IntoIterator<Item = (T, VulkanResult<AdapterSurvey>)>,
    requirements: &DeviceRequirements,
) -> Result<(T, AdapterSurvey, QueueFamilyIndices), String> {
    let mut last_reason = "no Vulkan adapters present".to_string();
    for (candidate, survey) in candidates {
        let survey = match survey {
            Ok(survey) => survey,
            Err(e) => {
                log::warn!("Skipping adapter whose capabilities could not be queried: {e}");
                last_reason = format!("adapter query failed: {e}");
                continue;
            }
        };
        match check_suitability(&survey, requirements) {
            Ok(families) => return Ok((candidate, survey, families)),
            Err(reason) => {
                log::debug!("Rejected GPU {}: {}", survey.name, reason);
                last_reason = format!("{}: {}", survey.name, reason);
            }
        }
    }
    Err(last_reason)
}

/// Selected physical device and the properties the renderer consults later
pub struct PhysicalDeviceInfo {
    /// Vulkan physical device handle
    pub device: vk::PhysicalDevice,
    /// Device properties and limits
    pub properties: vk::PhysicalDeviceProperties,
    /// Memory heaps and types
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    /// Chosen queue families
    pub queue_families: QueueFamilyIndices,
    /// Adapter name
    pub name: String,
}

impl PhysicalDeviceInfo {
    /// Select the first adapter that satisfies `requirements`
    pub fn select(
        instance: &Instance,
        surface: &Surface,
        requirements: &DeviceRequirements,
    ) -> VulkanResult<Self> {
        let devices = unsafe { instance.enumerate_physical_devices() }.map_err(VulkanError::Api)?;

        let surveys = devices
            .into_iter()
            .map(|device| (device, survey_adapter(instance, surface, device)));
        let (device, survey, queue_families) = first_suitable(surveys, requirements)
            .map_err(|reason| VulkanError::DeviceNotFound { reason })?;

        log::info!(
            "Selected GPU: {} (graphics family {}, present family {})",
            survey.name,
            queue_families.graphics,
            queue_families.present
        );
        let properties = unsafe { instance.get_physical_device_properties(device) };
        let memory_properties = unsafe { instance.get_physical_device_memory_properties(device) };
        Ok(Self {
            device,
            properties,
            memory_properties,
            queue_families,
            name: survey.name,
        })
    }

    /// Device limits
    pub fn limits(&self) -> &vk::PhysicalDeviceLimits {
        &self.properties.limits
    }
}

/// Query everything [`check_suitability`] needs for one adapter
fn survey_adapter(
    instance: &Instance,
    surface: &Surface,
    device: vk::PhysicalDevice,
) -> VulkanResult<AdapterSurvey> {
    let properties = unsafe { instance.get_physical_device_properties(device) };
    let features = unsafe { instance.get_physical_device_features(device) };
    let name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }
        .to_string_lossy()
        .into_owned();

    let family_properties =
        unsafe { instance.get_physical_device_queue_family_properties(device) };
    let mut queue_families = Vec::with_capacity(family_properties.len());
    for (index, family) in family_properties.iter().enumerate() {
        let index = u32::try_from(index)
            .map_err(|_| VulkanError::InitializationFailed("Too many queue families".to_string()))?;
        queue_families.push(QueueFamilySupport {
            flags: family.queue_flags,
            queue_count: family.queue_count,
            present: surface.supports_present(device, index)?,
        });
    }

    let extensions = unsafe { instance.enumerate_device_extension_properties(device) }
        .map_err(VulkanError::Api)?
        .iter()
        .map(|ext| {
            unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) }
                .to_string_lossy()
                .into_owned()
        })
        .collect();

    let surface_format_count = unsafe {
        surface
            .loader()
            .get_physical_device_surface_formats(device, surface.handle())
    }
    .map_err(VulkanError::Api)?
    .len();
    let present_mode_count = unsafe {
        surface
            .loader()
            .get_physical_device_surface_present_modes(device, surface.handle())
    }
    .map_err(VulkanError::Api)?
    .len();

    Ok(AdapterSurvey {
        name,
        queue_families,
        extensions,
        surface_format_count,
        present_mode_count,
        sampler_anisotropy: features.sampler_anisotropy == vk::TRUE,
    })
}

/// Logical device wrapper with RAII cleanup
pub struct LogicalDevice {
    /// Vulkan logical device handle
    pub device: Device,
    /// Graphics operations queue
    pub graphics_queue: vk::Queue,
    /// Surface presentation queue
    pub present_queue: vk::Queue,
    /// Queue families the queues came from
    pub queue_families: QueueFamilyIndices,
}

impl LogicalDevice {
    /// Create a new logical device with required queues
    pub fn new(
        instance: &Instance,
        physical_device: &PhysicalDeviceInfo,
        requirements: &DeviceRequirements,
    ) -> VulkanResult<Self> {
        let queue_families = physical_device.queue_families;
        let priorities = [1.0_f32];
        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = queue_families
            .unique()
            .into_iter()
            .map(|family| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(family)
                    .queue_priorities(&priorities)
                    .build()
            })
            .collect();

        let extension_names = requirements
            .extensions
            .iter()
            .map(|name| {
                CString::new(name.as_str()).map_err(|_| {
                    VulkanError::InitializationFailed(format!("Invalid extension name {name:?}"))
                })
            })
            .collect::<VulkanResult<Vec<_>>>()?;
        let extension_ptrs: Vec<*const c_char> =
            extension_names.iter().map(|e| e.as_ptr()).collect();

        let device_features = vk::PhysicalDeviceFeatures::builder()
            .sampler_anisotropy(requirements.sampler_anisotropy)
            .build();

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&extension_ptrs)
            .enabled_features(&device_features);

        let device = unsafe { instance.create_device(physical_device.device, &create_info, None) }
            .map_err(VulkanError::Api)?;

        let graphics_queue = unsafe { device.get_device_queue(queue_families.graphics, 0) };
        let present_queue = unsafe { device.get_device_queue(queue_families.present, 0) };

        Ok(Self {
            device,
            graphics_queue,
            present_queue,
            queue_families,
        })
    }
}

impl Drop for LogicalDevice {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_device(None);
        }
        log::debug!("Logical device destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SWAPCHAIN: &str = "VK_KHR_swapchain";

    fn family(flags: vk::QueueFlags, present: bool) -> QueueFamilySupport {
        QueueFamilySupport {
            flags,
            queue_count: 1,
            present,
        }
    }

    fn requirements() -> DeviceRequirements {
        DeviceRequirements {
            queue_capabilities: QueueCapabilities::GRAPHICS | QueueCapabilities::PRESENT,
            extensions: vec![SWAPCHAIN.to_string()],
            sampler_anisotropy: true,
        }
    }

    fn capable_adapter() -> AdapterSurvey {
        AdapterSurvey {
            name: "test adapter".to_string(),
            queue_families: vec![family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER, true)],
            extensions: vec![SWAPCHAIN.to_string()],
            surface_format_count: 2,
            present_mode_count: 1,
            sampler_anisotropy: true,
        }
    }

    #[test]
    fn test_capable_adapter_is_suitable() {
        let families = check_suitability(&capable_adapter(), &requirements()).unwrap();
        assert_eq!(families, QueueFamilyIndices { graphics: 0, present: 0 });
        assert!(families.is_shared());
    }

    #[test]
    fn test_missing_graphics_family_is_unsuitable() {
        let survey = AdapterSurvey {
            queue_families: vec![family(vk::QueueFlags::COMPUTE, true)],
            ..capable_adapter()
        };
        assert!(check_suitability(&survey, &requirements()).is_err());
    }

    #[test]
    fn test_missing_present_family_is_unsuitable() {
        let survey = AdapterSurvey {
            queue_families: vec![family(vk::QueueFlags::GRAPHICS, false)],
            ..capable_adapter()
        };
        assert!(check_suitability(&survey, &requirements()).is_err());
    }

    #[test]
    fn test_missing_swapchain_extension_is_unsuitable() {
        let survey = AdapterSurvey {
            extensions: vec!["VK_KHR_maintenance1".to_string()],
            ..capable_adapter()
        };
        let reason = check_suitability(&survey, &requirements()).unwrap_err();
        assert!(reason.contains(SWAPCHAIN));
    }

    #[test]
    fn test_empty_swapchain_support_is_unsuitable() {
        let no_formats = AdapterSurvey {
            surface_format_count: 0,
            ..capable_adapter()
        };
        let no_modes = AdapterSurvey {
            present_mode_count: 0,
            ..capable_adapter()
        };
        assert!(check_suitability(&no_formats, &requirements()).is_err());
        assert!(check_suitability(&no_modes, &requirements()).is_err());
    }

    #[test]
    fn test_anisotropy_only_required_when_requested() {
        let survey = AdapterSurvey {
            sampler_anisotropy: false,
            ..capable_adapter()
        };
        assert!(check_suitability(&survey, &requirements()).is_err());

        let relaxed = DeviceRequirements {
            sampler_anisotropy: false,
            ..requirements()
        };
        assert!(check_suitability(&survey, &relaxed).is_ok());
    }

    #[test]
    fn test_separate_graphics_and_present_families() {
        let families = [
            family(vk::QueueFlags::GRAPHICS, false),
            family(vk::QueueFlags::TRANSFER, true),
        ];
        let selected = find_queue_families(&families, requirements().queue_capabilities).unwrap();
        assert_eq!(selected, QueueFamilyIndices { graphics: 0, present: 1 });
        assert!(!selected.is_shared());
        assert_eq!(selected.unique(), vec![0, 1]);
    }

    #[test]
    fn test_combined_family_preferred_over_first_graphics() {
        let families = [
            family(vk::QueueFlags::GRAPHICS, false),
            family(vk::QueueFlags::GRAPHICS, true),
        ];
        let selected = find_queue_families(&families, requirements().queue_capabilities).unwrap();
        assert_eq!(selected, QueueFamilyIndices { graphics: 1, present: 1 });
    }

    #[test]
    fn test_empty_families_are_skipped() {
        let families = [
            QueueFamilySupport {
                flags: vk::QueueFlags::GRAPHICS,
                queue_count: 0,
                present: true,
            },
            family(vk::QueueFlags::GRAPHICS, true),
        ];
        let selected = find_queue_families(&families, requirements().queue_capabilities).unwrap();
        assert_eq!(selected.graphics, 1);
    }

    #[test]
    fn test_swapchain_always_required() {
        let config = RendererConfig::default();
        let requirements = DeviceRequirements::from_config(&config);
        assert_eq!(requirements.extensions, vec![SWAPCHAIN.to_string()]);
    }

    #[test]
    fn test_failed_survey_does_not_stop_selection() {
        let candidates = vec![
            (0, Err(VulkanError::Api(vk::Result::ERROR_INITIALIZATION_FAILED))),
            (1, Ok(capable_adapter())),
        ];
        let (chosen, survey, _) = first_suitable(candidates, &requirements()).unwrap();
        assert_eq!(chosen, 1);
        assert_eq!(survey.name, "test adapter");
    }

    #[test]
    fn test_first_suitable_reports_last_rejection() {
        let unsuitable = AdapterSurvey {
            present_mode_count: 0,
            ..capable_adapter()
        };
        let reason = first_suitable(vec![((), Ok(unsuitable))], &requirements()).unwrap_err();
        assert!(reason.contains("no present modes"));

        let none: Vec<((), VulkanResult<AdapterSurvey>)> = Vec::new();
        assert!(first_suitable(none, &requirements()).is_err());
    }
}

//! Vulkan context: instance, surface, physical and logical device
//!
//! Field order is teardown order: the surface goes before the device, and the
//! instance (with its debug messenger) goes last.

use ash::{vk, Device, Instance};

use super::device::{DeviceRequirements, LogicalDevice, PhysicalDeviceInfo, QueueFamilyIndices};
use super::instance::VulkanInstance;
use super::surface::{Surface, SurfaceProvider};
use crate::config::RendererConfig;
use crate::vulkan::{VulkanError, VulkanResult};

/// Long-lived Vulkan objects shared by every other renderer component
pub struct VulkanContext {
    surface: Surface,
    device: LogicalDevice,
    physical_device: PhysicalDeviceInfo,
    instance: VulkanInstance,
}

impl VulkanContext {
    /// Create instance, surface and device for `provider`
    pub fn new(config: &RendererConfig, provider: &mut dyn SurfaceProvider) -> VulkanResult<Self> {
        let surface_extensions = provider.required_instance_extensions()?;
        let instance = VulkanInstance::new(config, &surface_extensions)?;
        let surface = Surface::new(&instance.entry, &instance.instance, provider)?;

        let requirements = DeviceRequirements::from_config(config);
        let physical_device =
            PhysicalDeviceInfo::select(&instance.instance, &surface, &requirements)?;
        let device = LogicalDevice::new(&instance.instance, &physical_device, &requirements)?;

        Ok(Self {
            surface,
            device,
            physical_device,
            instance,
        })
    }

    /// Logical device
    pub fn device(&self) -> &Device {
        &self.device.device
    }

    /// Instance handle
    pub fn instance(&self) -> &Instance {
        &self.instance.instance
    }

    /// Presentation surface
    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    /// Selected physical device
    pub fn physical_device(&self) -> &PhysicalDeviceInfo {
        &self.physical_device
    }

    /// Memory types of the selected physical device
    pub fn memory_properties(&self) -> &vk::PhysicalDeviceMemoryProperties {
        &self.physical_device.memory_properties
    }

    /// Graphics and present queue families
    pub fn queue_families(&self) -> QueueFamilyIndices {
        self.device.queue_families
    }

    /// Graphics queue
    pub fn graphics_queue(&self) -> vk::Queue {
        self.device.graphics_queue
    }

    /// Present queue
    pub fn present_queue(&self) -> vk::Queue {
        self.device.present_queue
    }

    /// Format properties for `format` on the selected device
    pub fn format_properties(&self, format: vk::Format) -> vk::FormatProperties {
        unsafe {
            self.instance()
                .get_physical_device_format_properties(self.physical_device.device, format)
        }
    }

    /// Block until the device has finished all submitted work
    pub fn wait_idle(&self) -> VulkanResult<()> {
        unsafe { self.device().device_wait_idle() }.map_err(|e| match e {
            vk::Result::ERROR_DEVICE_LOST => VulkanError::DeviceLost,
            other => VulkanError::Api(other),
        })
    }
}

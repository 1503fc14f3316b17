//! Instance, surface and device bring-up

pub mod context;
pub mod device;
pub mod instance;
pub mod surface;
pub mod window;

pub use context::VulkanContext;
pub use device::{
    check_suitability, find_queue_families, AdapterSurvey, DeviceRequirements, LogicalDevice,
    PhysicalDeviceInfo, QueueCapabilities, QueueFamilyIndices, QueueFamilySupport,
};
pub use instance::VulkanInstance;
pub use surface::{Surface, SurfaceProvider};
pub use window::{Window, WindowError, WindowEvent};

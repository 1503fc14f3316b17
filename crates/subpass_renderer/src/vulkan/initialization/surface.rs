//! Presentation surface seam between the renderer and the windowing system

use ash::extensions::khr::Surface as SurfaceLoader;
use ash::{vk, Entry, Instance};

use crate::vulkan::VulkanResult;

/// What the renderer needs from a window.
///
/// The windowing collaborator creates the surface and reports the live
/// framebuffer size; the renderer never polls input or owns the event loop.
pub trait SurfaceProvider {
    /// Instance extensions the surface type requires
    fn required_instance_extensions(&self) -> VulkanResult<Vec<String>>;

    /// Create a presentation surface for `instance`
    fn create_surface(&mut self, instance: &Instance) -> VulkanResult<vk::SurfaceKHR>;

    /// Current framebuffer size in pixels; `(0, 0)` while minimised
    fn framebuffer_size(&self) -> (u32, u32);
}

/// Owned presentation surface
pub struct Surface {
    loader: SurfaceLoader,
    surface: vk::SurfaceKHR,
}

impl Surface {
    /// Create a surface through `provider` and take ownership of it
    pub fn new(
        entry: &Entry,
        instance: &Instance,
        provider: &mut dyn SurfaceProvider,
    ) -> VulkanResult<Self> {
        let surface = provider.create_surface(instance)?;
        Ok(Self {
            loader: SurfaceLoader::new(entry, instance),
            surface,
        })
    }

    /// Surface handle
    pub fn handle(&self) -> vk::SurfaceKHR {
        self.surface
    }

    /// Surface extension loader
    pub fn loader(&self) -> &SurfaceLoader {
        &self.loader
    }

    /// Whether `family` on `physical_device` can present to this surface
    pub fn supports_present(
        &self,
        physical_device: vk::PhysicalDevice,
        family: u32,
    ) -> VulkanResult<bool> {
        unsafe {
            self.loader
                .get_physical_device_surface_support(physical_device, family, self.surface)
        }
        .map_err(crate::vulkan::VulkanError::Api)
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        unsafe {
            self.loader.destroy_surface(self.surface, None);
        }
    }
}

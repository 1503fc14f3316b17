//! Swapchain negotiation and lifecycle
//!
//! The `select_*` functions hold every negotiation rule and take plain
//! Vulkan structs, so they can be checked without a device.

use ash::extensions::khr::Swapchain as SwapchainLoader;
use ash::{vk, Device};

use super::per_image::{ImageIndex, PerImage};
use crate::vulkan::initialization::{QueueFamilyIndices, VulkanContext};
use crate::vulkan::resources::image::ImageView;
use crate::vulkan::{VulkanError, VulkanResult};

/// Pick the surface format.
///
/// A lone `UNDEFINED` entry means the surface accepts anything, so
/// RGBA8 UNORM / sRGB-nonlinear is used. Otherwise the first RGBA8 or BGRA8
/// UNORM entry in sRGB-nonlinear wins, falling back to the first entry.
pub fn select_surface_format(
    formats: &[vk::SurfaceFormatKHR],
) -> VulkanResult<vk::SurfaceFormatKHR> {
    let preferred = vk::SurfaceFormatKHR {
        format: vk::Format::R8G8B8A8_UNORM,
        color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
    };

    match formats {
        [] => Err(VulkanError::UnsupportedFormat {
            purpose: "swapchain images",
        }),
        [only] if only.format == vk::Format::UNDEFINED => Ok(preferred),
        _ => Ok(formats
            .iter()
            .find(|candidate| {
                matches!(
                    candidate.format,
                    vk::Format::R8G8B8A8_UNORM | vk::Format::B8G8R8A8_UNORM
                ) && candidate.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
            })
            .copied()
            .unwrap_or(formats[0])),
    }
}

/// Mailbox when offered, otherwise FIFO (always available)
pub fn select_present_mode(modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    if modes.contains(&vk::PresentModeKHR::MAILBOX) {
        vk::PresentModeKHR::MAILBOX
    } else {
        vk::PresentModeKHR::FIFO
    }
}

/// Use the surface's extent, or the framebuffer size clamped to the limits
/// when the surface leaves it variable (`u32::MAX`)
pub fn select_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    framebuffer_size: (u32, u32),
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }

    let (width, height) = framebuffer_size;
    vk::Extent2D {
        width: width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    }
}

/// One more than the minimum, capped by a non-zero maximum
pub fn select_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let desired = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 {
        desired.min(capabilities.max_image_count)
    } else {
        desired
    }
}

/// Exclusive when one family does both, otherwise concurrent across the two
pub fn select_sharing(families: QueueFamilyIndices) -> (vk::SharingMode, Vec<u32>) {
    if families.is_shared() {
        (vk::SharingMode::EXCLUSIVE, Vec::new())
    } else {
        (
            vk::SharingMode::CONCURRENT,
            vec![families.graphics, families.present],
        )
    }
}

/// A presentable image and its color view
pub struct SwapchainImage {
    /// Image owned by the swapchain
    pub image: vk::Image,
    view: ImageView,
}

impl SwapchainImage {
    /// View handle
    pub fn view(&self) -> vk::ImageView {
        self.view.handle()
    }
}

/// Swapchain management wrapper with RAII cleanup
pub struct Swapchain {
    loader: SwapchainLoader,
    swapchain: vk::SwapchainKHR,
    images: PerImage<SwapchainImage>,
    format: vk::SurfaceFormatKHR,
    extent: vk::Extent2D,
}

impl Swapchain {
    /// Negotiate and create a swapchain.
    ///
    /// `old` is handed to the driver for resource reuse; the caller drops it
    /// afterwards. `generation` stamps every [`ImageIndex`] this swapchain
    /// produces.
    pub fn new(
        context: &VulkanContext,
        framebuffer_size: (u32, u32),
        old: Option<&Swapchain>,
        generation: u32,
    ) -> VulkanResult<Self> {
        let device = context.device();
        let surface = context.surface();
        let physical_device = context.physical_device().device;

        let capabilities = unsafe {
            surface
                .loader()
                .get_physical_device_surface_capabilities(physical_device, surface.handle())
        }
        .map_err(VulkanError::Api)?;
        let formats = unsafe {
            surface
                .loader()
                .get_physical_device_surface_formats(physical_device, surface.handle())
        }
        .map_err(VulkanError::Api)?;
        let present_modes = unsafe {
            surface
                .loader()
                .get_physical_device_surface_present_modes(physical_device, surface.handle())
        }
        .map_err(VulkanError::Api)?;

        let format = select_surface_format(&formats)?;
        let present_mode = select_present_mode(&present_modes);
        let extent = select_extent(&capabilities, framebuffer_size);
        let image_count = select_image_count(&capabilities);
        let (sharing_mode, family_indices) = select_sharing(context.queue_families());

        let create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(surface.handle())
            .min_image_count(image_count)
            .image_format(format.format)
            .image_color_space(format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(sharing_mode)
            .queue_family_indices(&family_indices)
            .pre_transform(capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old.map_or(vk::SwapchainKHR::null(), |s| s.swapchain));

        let loader = SwapchainLoader::new(context.instance(), device);
        let swapchain = unsafe { loader.create_swapchain(&create_info, None) }
            .map_err(VulkanError::Api)?;

        let created = Self::create_images(device, &loader, swapchain, format.format, generation);
        let images = match created {
            Ok(images) => images,
            Err(e) => {
                unsafe { loader.destroy_swapchain(swapchain, None) };
                return Err(e);
            }
        };

        log::info!(
            "Swapchain generation {}: {}x{}, {:?}/{:?}, {:?}, {} images",
            generation,
            extent.width,
            extent.height,
            format.format,
            format.color_space,
            present_mode,
            images.len()
        );

        Ok(Self {
            loader,
            swapchain,
            images,
            format,
            extent,
        })
    }

    fn create_images(
        device: &Device,
        loader: &SwapchainLoader,
        swapchain: vk::SwapchainKHR,
        format: vk::Format,
        generation: u32,
    ) -> VulkanResult<PerImage<SwapchainImage>> {
        let handles = unsafe { loader.get_swapchain_images(swapchain) }.map_err(VulkanError::Api)?;
        PerImage::try_from_fn(generation, handles.len(), |index| {
            let image = handles[index.index() as usize];
            Ok(SwapchainImage {
                image,
                view: ImageView::new(device, image, format, vk::ImageAspectFlags::COLOR)?,
            })
        })
    }

    /// Acquire the next image; `image_available` is signaled when it is ready.
    ///
    /// Returns the image and whether the swapchain is suboptimal.
    pub fn acquire_next_image(
        &self,
        image_available: vk::Semaphore,
    ) -> VulkanResult<(ImageIndex, bool)> {
        let (index, suboptimal) = unsafe {
            self.loader
                .acquire_next_image(self.swapchain, u64::MAX, image_available, vk::Fence::null())
        }
        .map_err(VulkanError::from_queue_result)?;

        Ok((ImageIndex::new(index, self.images.generation()), suboptimal))
    }

    /// Present `image` after `wait` is signaled; returns whether the swapchain is suboptimal
    pub fn present(
        &self,
        queue: vk::Queue,
        wait: vk::Semaphore,
        image: ImageIndex,
    ) -> VulkanResult<bool> {
        self.images.get(image)?;

        let wait_semaphores = [wait];
        let swapchains = [self.swapchain];
        let image_indices = [image.index()];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        unsafe { self.loader.queue_present(queue, &present_info) }
            .map_err(VulkanError::from_queue_result)
    }

    /// Images and views in image order
    pub fn images(&self) -> &PerImage<SwapchainImage> {
        &self.images
    }

    /// Number of images
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Chosen surface format
    pub fn format(&self) -> vk::SurfaceFormatKHR {
        self.format
    }

    /// Image extent
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Generation stamped on acquired indices
    pub fn generation(&self) -> u32 {
        self.images.generation()
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        // Views go before the swapchain that owns their images
        drop(std::mem::take(&mut self.images));
        unsafe {
            self.loader.destroy_swapchain(self.swapchain, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface_format(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space,
        }
    }

    fn capabilities(
        current: (u32, u32),
        min_count: u32,
        max_count: u32,
    ) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min_count,
            max_image_count: max_count,
            current_extent: vk::Extent2D {
                width: current.0,
                height: current.1,
            },
            min_image_extent: vk::Extent2D {
                width: 64,
                height: 64,
            },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 2048,
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_single_undefined_format_means_any() {
        let chosen = select_surface_format(&[surface_format(
            vk::Format::UNDEFINED,
            vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT,
        )])
        .unwrap();
        assert_eq!(chosen.format, vk::Format::R8G8B8A8_UNORM);
        assert_eq!(chosen.color_space, vk::ColorSpaceKHR::SRGB_NONLINEAR);
    }

    #[test]
    fn test_first_preferred_format_wins() {
        let formats = [
            surface_format(vk::Format::R16G16B16A16_SFLOAT, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            surface_format(vk::Format::B8G8R8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            surface_format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        assert_eq!(select_surface_format(&formats).unwrap(), formats[1]);
    }

    #[test]
    fn test_preferred_format_needs_srgb_nonlinear() {
        let formats = [
            surface_format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            surface_format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::DISPLAY_P3_NONLINEAR_EXT),
        ];
        assert_eq!(select_surface_format(&formats).unwrap(), formats[0]);
    }

    #[test]
    fn test_no_formats_is_an_error() {
        assert!(select_surface_format(&[]).is_err());
    }

    #[test]
    fn test_present_mode_selection() {
        assert_eq!(select_present_mode(&[vk::PresentModeKHR::FIFO]), vk::PresentModeKHR::FIFO);
        assert_eq!(
            select_present_mode(&[vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX]),
            vk::PresentModeKHR::MAILBOX
        );
        assert_eq!(
            select_present_mode(&[vk::PresentModeKHR::IMMEDIATE, vk::PresentModeKHR::FIFO]),
            vk::PresentModeKHR::FIFO
        );
    }

    #[test]
    fn test_fixed_extent_is_used_exactly() {
        let caps = capabilities((1280, 720), 2, 3);
        let extent = select_extent(&caps, (10_000, 10_000));
        assert_eq!((extent.width, extent.height), (1280, 720));
    }

    #[test]
    fn test_variable_extent_is_clamped() {
        let caps = capabilities((u32::MAX, u32::MAX), 2, 3);
        let extent = select_extent(&caps, (8000, 10));
        assert_eq!((extent.width, extent.height), (4096, 64));

        let extent = select_extent(&caps, (800, 600));
        assert_eq!((extent.width, extent.height), (800, 600));
    }

    #[test]
    fn test_image_count_is_min_plus_one_capped() {
        assert_eq!(select_image_count(&capabilities((1, 1), 2, 0)), 3);
        assert_eq!(select_image_count(&capabilities((1, 1), 2, 8)), 3);
        assert_eq!(select_image_count(&capabilities((1, 1), 3, 3)), 3);
    }

    #[test]
    fn test_sharing_mode() {
        let shared = QueueFamilyIndices {
            graphics: 0,
            present: 0,
        };
        let (mode, families) = select_sharing(shared);
        assert_eq!(mode, vk::SharingMode::EXCLUSIVE);
        assert!(families.is_empty());

        let split = QueueFamilyIndices {
            graphics: 0,
            present: 2,
        };
        let (mode, families) = select_sharing(split);
        assert_eq!(mode, vk::SharingMode::CONCURRENT);
        assert_eq!(families, vec![0, 2]);
    }
}

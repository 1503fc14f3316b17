//! Framebuffers and the per-image offscreen attachments they bind

use ash::{vk, Device};

use super::render_pass::OFFSCREEN_COLOR_FORMAT;
use crate::vulkan::resources::image::{ImageSpec, ViewedImage};
use crate::vulkan::{VulkanError, VulkanResult};

/// Framebuffer wrapper with RAII cleanup
pub struct Framebuffer {
    device: Device,
    framebuffer: vk::Framebuffer,
}

impl Framebuffer {
    /// Create a framebuffer; `attachments` follow the render pass slot order
    pub fn new(
        device: &Device,
        render_pass: vk::RenderPass,
        attachments: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> VulkanResult<Self> {
        let create_info = vk::FramebufferCreateInfo::builder()
            .render_pass(render_pass)
            .attachments(attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);

        let framebuffer = unsafe { device.create_framebuffer(&create_info, None) }
            .map_err(VulkanError::Api)?;

        Ok(Self {
            device: device.clone(),
            framebuffer,
        })
    }

    /// Get the framebuffer handle
    pub fn handle(&self) -> vk::Framebuffer {
        self.framebuffer
    }
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_framebuffer(self.framebuffer, None);
        }
    }
}

/// Offscreen color and depth targets written by the geometry subpass
/// and read as input attachments by the composition subpass
pub struct OffscreenTargets {
    /// Offscreen color target
    pub color: ViewedImage,
    /// Depth target, viewed through its depth aspect only
    pub depth: ViewedImage,
}

impl OffscreenTargets {
    /// Allocate both targets at `extent`
    pub fn new(
        device: &Device,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        extent: vk::Extent2D,
        depth_format: vk::Format,
    ) -> VulkanResult<Self> {
        let color = ViewedImage::new(
            device,
            memory_properties,
            &ImageSpec {
                extent,
                format: OFFSCREEN_COLOR_FORMAT,
                tiling: vk::ImageTiling::OPTIMAL,
                usage: vk::ImageUsageFlags::COLOR_ATTACHMENT
                    | vk::ImageUsageFlags::INPUT_ATTACHMENT,
                properties: vk::MemoryPropertyFlags::DEVICE_LOCAL,
            },
            vk::ImageAspectFlags::COLOR,
        )?;

        let depth = ViewedImage::new(
            device,
            memory_properties,
            &ImageSpec {
                extent,
                format: depth_format,
                tiling: vk::ImageTiling::OPTIMAL,
                usage: vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT
                    | vk::ImageUsageFlags::INPUT_ATTACHMENT,
                properties: vk::MemoryPropertyFlags::DEVICE_LOCAL,
            },
            vk::ImageAspectFlags::DEPTH,
        )?;

        Ok(Self { color, depth })
    }

    /// Framebuffer attachments with `swapchain_view` in slot 0
    pub fn attachments(&self, swapchain_view: vk::ImageView) -> [vk::ImageView; 3] {
        [swapchain_view, self.color.view(), self.depth.view()]
    }
}

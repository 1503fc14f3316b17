//! Staging uploads into device-local memory
//!
//! Every upload goes through a host-visible staging buffer and a one-shot
//! command buffer, then blocks until the queue is idle. Use only outside the
//! per-frame path.

use ash::{vk, Device};

use super::buffer::Buffer;
use super::image::{AllocatedImage, ImageSpec, LayoutTransition};
use crate::vulkan::rendering::commands::OneTimeCommands;
use crate::vulkan::VulkanResult;

/// Everything a blocking transfer needs
#[derive(Clone, Copy)]
pub struct TransferContext<'a> {
    /// Logical device
    pub device: &'a Device,
    /// Memory types used for staging and destination allocations
    pub memory_properties: &'a vk::PhysicalDeviceMemoryProperties,
    /// Queue the copies are submitted to; must support transfer
    pub queue: vk::Queue,
    /// Pool the one-shot command buffers come from
    pub command_pool: vk::CommandPool,
}

impl<'a> TransferContext<'a> {
    fn staging_buffer(&self, bytes: &[u8]) -> VulkanResult<Buffer> {
        let staging = Buffer::new(
            self.device,
            self.memory_properties,
            bytes.len() as vk::DeviceSize,
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;
        staging.write_bytes(bytes)?;
        Ok(staging)
    }

    /// Upload `bytes` into a new device-local buffer with `usage`
    pub fn upload_buffer(&self, bytes: &[u8], usage: vk::BufferUsageFlags) -> VulkanResult<Buffer> {
        let staging = self.staging_buffer(bytes)?;
        let destination = Buffer::new(
            self.device,
            self.memory_properties,
            staging.size(),
            usage | vk::BufferUsageFlags::TRANSFER_DST,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;

        self.copy_buffer(&staging, &destination, staging.size())?;
        Ok(destination)
    }

    /// Upload tightly packed texels into a new sampled, device-local image
    pub fn upload_image(
        &self,
        texels: &[u8],
        extent: vk::Extent2D,
        format: vk::Format,
    ) -> VulkanResult<AllocatedImage> {
        let staging = self.staging_buffer(texels)?;
        let image = AllocatedImage::new(
            self.device,
            self.memory_properties,
            &ImageSpec {
                extent,
                format,
                tiling: vk::ImageTiling::OPTIMAL,
                usage: vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED,
                properties: vk::MemoryPropertyFlags::DEVICE_LOCAL,
            },
        )?;

        let commands = OneTimeCommands::begin(self.device, self.command_pool)?;
        let cmd = commands.buffer();

        LayoutTransition::between(
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        )?
        .record(self.device, cmd, image.handle());

        let region = vk::BufferImageCopy::builder()
            .buffer_offset(0)
            .buffer_row_length(0)
            .buffer_image_height(0)
            .image_subresource(vk::ImageSubresourceLayers {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                mip_level: 0,
                base_array_layer: 0,
                layer_count: 1,
            })
            .image_offset(vk::Offset3D { x: 0, y: 0, z: 0 })
            .image_extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            })
            .build();
        unsafe {
            self.device.cmd_copy_buffer_to_image(
                cmd,
                staging.handle(),
                image.handle(),
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
            );
        }

        LayoutTransition::between(
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        )?
        .record(self.device, cmd, image.handle());

        commands.submit_and_wait(self.queue)?;
        Ok(image)
    }

    /// Copy the first `len` bytes of a `TRANSFER_SRC` buffer back to the host
    pub fn read_back(&self, source: &Buffer, len: usize) -> VulkanResult<Vec<u8>> {
        let staging = Buffer::new(
            self.device,
            self.memory_properties,
            len as vk::DeviceSize,
            vk::BufferUsageFlags::TRANSFER_DST,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;

        self.copy_buffer(source, &staging, len as vk::DeviceSize)?;
        staging.read_bytes(len)
    }

    fn copy_buffer(
        &self,
        source: &Buffer,
        destination: &Buffer,
        size: vk::DeviceSize,
    ) -> VulkanResult<()> {
        let commands = OneTimeCommands::begin(self.device, self.command_pool)?;
        let region = vk::BufferCopy {
            src_offset: 0,
            dst_offset: 0,
            size,
        };
        unsafe {
            self.device.cmd_copy_buffer(
                commands.buffer(),
                source.handle(),
                destination.handle(),
                &[region],
            );
        }
        commands.submit_and_wait(self.queue)
    }
}

//! Texture table: sampled images plus their sampler descriptor sets
//!
//! The table is append-only. Slot 0 always holds the default texture, so
//! meshes without a texture still have a valid set to bind.

use ash::{vk, Device};
use std::collections::HashMap;

use super::descriptor_set::{
    DescriptorPool, DescriptorSetWriter, PoolSizing, SAMPLER_BINDING,
};
use super::image::{AllocatedImage, ViewedImage};
use crate::vulkan::{ResourceKind, VulkanError, VulkanResult};

/// Format every texture is uploaded in
pub const TEXTURE_FORMAT: vk::Format = vk::Format::R8G8B8A8_UNORM;

/// Anisotropy requested for the shared sampler
const MAX_ANISOTROPY: f32 = 16.0;

/// Index into the texture table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(usize);

impl TextureId {
    /// The default "no texture" entry
    pub const DEFAULT: Self = Self(0);

    pub(crate) const fn from_index(index: usize) -> Self {
        Self(index)
    }

    /// Raw table index
    pub fn index(self) -> usize {
        self.0
    }
}

/// Sampler wrapper with RAII cleanup
pub struct Sampler {
    device: Device,
    sampler: vk::Sampler,
}

impl Sampler {
    /// Linear, repeating sampler with anisotropic filtering
    pub fn new(device: &Device, limits: &vk::PhysicalDeviceLimits) -> VulkanResult<Self> {
        let create_info = vk::SamplerCreateInfo::builder()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .address_mode_u(vk::SamplerAddressMode::REPEAT)
            .address_mode_v(vk::SamplerAddressMode::REPEAT)
            .address_mode_w(vk::SamplerAddressMode::REPEAT)
            .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
            .unnormalized_coordinates(false)
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
            .mip_lod_bias(0.0)
            .min_lod(0.0)
            .max_lod(0.0)
            .anisotropy_enable(true)
            .max_anisotropy(MAX_ANISOTROPY.min(limits.max_sampler_anisotropy));

        let sampler =
            unsafe { device.create_sampler(&create_info, None) }.map_err(VulkanError::Api)?;

        Ok(Self {
            device: device.clone(),
            sampler,
        })
    }

    /// Sampler handle
    pub fn handle(&self) -> vk::Sampler {
        self.sampler
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_sampler(self.sampler, None);
        }
    }
}

/// Fails once `len` entries fill a table of `capacity`
pub(crate) fn ensure_capacity(len: usize, capacity: u32) -> VulkanResult<()> {
    if len >= capacity as usize {
        return Err(VulkanError::invalid(format!(
            "Texture table is full ({capacity} entries)"
        )));
    }
    Ok(())
}

/// Append-only texture storage.
///
/// Field order is teardown order: descriptor pool, sampler, then images.
pub struct TextureTable {
    pool: DescriptorPool,
    sampler: Sampler,
    textures: Vec<ViewedImage>,
    sets: Vec<vk::DescriptorSet>,
    by_name: HashMap<String, TextureId>,
    capacity: u32,
}

impl TextureTable {
    /// Create an empty table able to hold `capacity` textures
    pub fn new(
        device: &Device,
        limits: &vk::PhysicalDeviceLimits,
        capacity: u32,
    ) -> VulkanResult<Self> {
        Ok(Self {
            pool: DescriptorPool::new(device, &PoolSizing::samplers(capacity))?,
            sampler: Sampler::new(device, limits)?,
            textures: Vec::new(),
            sets: Vec::new(),
            by_name: HashMap::new(),
            capacity,
        })
    }

    /// Append an uploaded image and allocate its sampler set
    pub fn insert(
        &mut self,
        device: &Device,
        image: AllocatedImage,
        layout: vk::DescriptorSetLayout,
    ) -> VulkanResult<TextureId> {
        ensure_capacity(self.textures.len(), self.capacity)?;

        let texture = ViewedImage::from_image(device, image, vk::ImageAspectFlags::COLOR)?;
        let set = self.pool.allocate(layout)?;
        DescriptorSetWriter::new()
            .write_image(set, SAMPLER_BINDING, texture.view(), self.sampler.handle())
            .update(device);

        let id = TextureId(self.textures.len());
        self.textures.push(texture);
        self.sets.push(set);
        log::debug!("Texture {} registered", id.index());
        Ok(id)
    }

    /// Remember that `name` was loaded as `id`
    pub fn remember_name(&mut self, name: &str, id: TextureId) {
        self.by_name.insert(name.to_string(), id);
    }

    /// Texture previously loaded from `name`
    pub fn find_by_name(&self, name: &str) -> Option<TextureId> {
        self.by_name.get(name).copied()
    }

    /// Check that `id` refers to an existing texture
    pub fn contains(&self, id: TextureId) -> VulkanResult<TextureId> {
        if id.index() < self.sets.len() {
            Ok(id)
        } else {
            Err(VulkanError::not_found(ResourceKind::Texture, id.index()))
        }
    }

    /// Sampler descriptor sets indexed by texture id
    pub fn descriptor_sets(&self) -> &[vk::DescriptorSet] {
        &self.sets
    }

    /// Number of textures
    pub fn len(&self) -> usize {
        self.textures.len()
    }

    /// Whether the table holds no textures yet
    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_texture_is_slot_zero() {
        assert_eq!(TextureId::DEFAULT.index(), 0);
    }

    #[test]
    fn test_capacity_check() {
        assert!(ensure_capacity(0, 2).is_ok());
        assert!(ensure_capacity(1, 2).is_ok());
        assert!(matches!(
            ensure_capacity(2, 2),
            Err(VulkanError::InvalidOperation { .. })
        ));
    }
}

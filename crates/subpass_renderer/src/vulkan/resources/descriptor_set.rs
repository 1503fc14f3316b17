//! Descriptor set layouts, pools and writes
//!
//! The renderer uses three layout families:
//! - view/projection uniform (vertex stage), one set per swapchain image
//! - combined image sampler (fragment stage), one set per texture
//! - input attachment pair (fragment stage), color at binding 0 and depth at
//!   binding 1, one set per swapchain image

use ash::{vk, Device};

use crate::vulkan::{VulkanError, VulkanResult};

/// Binding of the view/projection uniform
pub const UNIFORM_BINDING: u32 = 0;
/// Binding of the texture sampler
pub const SAMPLER_BINDING: u32 = 0;
/// Binding of the offscreen color input attachment
pub const INPUT_COLOR_BINDING: u32 = 0;
/// Binding of the offscreen depth input attachment
pub const INPUT_DEPTH_BINDING: u32 = 1;

/// Descriptor set layout builder for creating reusable layouts
#[derive(Default)]
pub struct DescriptorSetLayoutBuilder {
    bindings: Vec<vk::DescriptorSetLayoutBinding>,
}

impl DescriptorSetLayoutBuilder {
    /// Create a new descriptor set layout builder
    pub fn new() -> Self {
        Self::default()
    }

    fn add(
        mut self,
        binding: u32,
        ty: vk::DescriptorType,
        stage_flags: vk::ShaderStageFlags,
    ) -> Self {
        self.bindings.push(
            vk::DescriptorSetLayoutBinding::builder()
                .binding(binding)
                .descriptor_type(ty)
                .descriptor_count(1)
                .stage_flags(stage_flags)
                .build(),
        );
        self
    }

    /// Add a uniform buffer binding
    pub fn add_uniform_buffer(self, binding: u32, stage_flags: vk::ShaderStageFlags) -> Self {
        self.add(binding, vk::DescriptorType::UNIFORM_BUFFER, stage_flags)
    }

    /// Add a combined image sampler binding
    pub fn add_combined_image_sampler(
        self,
        binding: u32,
        stage_flags: vk::ShaderStageFlags,
    ) -> Self {
        self.add(binding, vk::DescriptorType::COMBINED_IMAGE_SAMPLER, stage_flags)
    }

    /// Add an input attachment binding
    pub fn add_input_attachment(self, binding: u32, stage_flags: vk::ShaderStageFlags) -> Self {
        self.add(binding, vk::DescriptorType::INPUT_ATTACHMENT, stage_flags)
    }

    /// Bindings added so far
    pub fn bindings(&self) -> &[vk::DescriptorSetLayoutBinding] {
        &self.bindings
    }

    /// Build the descriptor set layout
    pub fn build(self, device: &Device) -> VulkanResult<DescriptorSetLayout> {
        let layout_info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(&self.bindings);

        let layout = unsafe { device.create_descriptor_set_layout(&layout_info, None) }
            .map_err(VulkanError::Api)?;

        Ok(DescriptorSetLayout {
            layout,
            device: device.clone(),
        })
    }
}

/// Descriptor set layout wrapper with automatic cleanup
pub struct DescriptorSetLayout {
    layout: vk::DescriptorSetLayout,
    device: Device,
}

impl DescriptorSetLayout {
    /// Get the Vulkan descriptor set layout handle
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_set_layout(self.layout, None);
        }
    }
}

/// Layout for the per-image view/projection uniform
pub fn uniform_layout() -> DescriptorSetLayoutBuilder {
    DescriptorSetLayoutBuilder::new()
        .add_uniform_buffer(UNIFORM_BINDING, vk::ShaderStageFlags::VERTEX)
}

/// Layout for one texture sampler
pub fn sampler_layout() -> DescriptorSetLayoutBuilder {
    DescriptorSetLayoutBuilder::new()
        .add_combined_image_sampler(SAMPLER_BINDING, vk::ShaderStageFlags::FRAGMENT)
}

/// Layout for the per-image offscreen color/depth input attachments
pub fn input_attachment_layout() -> DescriptorSetLayoutBuilder {
    DescriptorSetLayoutBuilder::new()
        .add_input_attachment(INPUT_COLOR_BINDING, vk::ShaderStageFlags::FRAGMENT)
        .add_input_attachment(INPUT_DEPTH_BINDING, vk::ShaderStageFlags::FRAGMENT)
}

/// The three layout families
pub struct DescriptorLayouts {
    /// View/projection uniform layout
    pub uniform: DescriptorSetLayout,
    /// Texture sampler layout
    pub sampler: DescriptorSetLayout,
    /// Input attachment pair layout
    pub input: DescriptorSetLayout,
}

impl DescriptorLayouts {
    /// Create all three layouts
    pub fn new(device: &Device) -> VulkanResult<Self> {
        Ok(Self {
            uniform: uniform_layout().build(device)?,
            sampler: sampler_layout().build(device)?,
            input: input_attachment_layout().build(device)?,
        })
    }
}

/// Pool capacity: maximum sets plus per-type descriptor counts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSizing {
    /// Maximum number of sets
    pub max_sets: u32,
    /// Descriptor counts per type
    pub sizes: Vec<(vk::DescriptorType, u32)>,
}

impl PoolSizing {
    /// One uniform set per swapchain image
    pub fn uniform(image_count: u32) -> Self {
        Self {
            max_sets: image_count,
            sizes: vec![(vk::DescriptorType::UNIFORM_BUFFER, image_count)],
        }
    }

    /// One sampler set per texture slot
    pub fn samplers(max_textures: u32) -> Self {
        Self {
            max_sets: max_textures,
            sizes: vec![(vk::DescriptorType::COMBINED_IMAGE_SAMPLER, max_textures)],
        }
    }

    /// One input attachment pair per swapchain image
    pub fn input_attachments(image_count: u32) -> Self {
        Self {
            max_sets: image_count,
            sizes: vec![(vk::DescriptorType::INPUT_ATTACHMENT, image_count * 2)],
        }
    }
}

/// Descriptor pool for allocating descriptor sets
pub struct DescriptorPool {
    pool: vk::DescriptorPool,
    device: Device,
}

impl DescriptorPool {
    /// Create a new descriptor pool
    pub fn new(device: &Device, sizing: &PoolSizing) -> VulkanResult<Self> {
        let pool_sizes: Vec<vk::DescriptorPoolSize> = sizing
            .sizes
            .iter()
            .map(|&(ty, descriptor_count)| vk::DescriptorPoolSize {
                ty,
                descriptor_count,
            })
            .collect();

        let pool_info = vk::DescriptorPoolCreateInfo::builder()
            .max_sets(sizing.max_sets)
            .pool_sizes(&pool_sizes);

        let pool = unsafe { device.create_descriptor_pool(&pool_info, None) }
            .map_err(VulkanError::Api)?;

        Ok(Self {
            pool,
            device: device.clone(),
        })
    }

    /// Allocate one set per entry of `layouts`
    pub fn allocate_descriptor_sets(
        &self,
        layouts: &[vk::DescriptorSetLayout],
    ) -> VulkanResult<Vec<vk::DescriptorSet>> {
        let alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(self.pool)
            .set_layouts(layouts);

        unsafe { self.device.allocate_descriptor_sets(&alloc_info) }.map_err(VulkanError::Api)
    }

    /// Allocate a single set
    pub fn allocate(&self, layout: vk::DescriptorSetLayout) -> VulkanResult<vk::DescriptorSet> {
        self.allocate_descriptor_sets(&[layout])?
            .into_iter()
            .next()
            .ok_or_else(|| VulkanError::invalid("Driver returned no descriptor set"))
    }

    /// Get the pool handle
    pub fn handle(&self) -> vk::DescriptorPool {
        self.pool
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_pool(self.pool, None);
        }
    }
}

enum PendingWrite {
    Buffer {
        set: vk::DescriptorSet,
        binding: u32,
        info: vk::DescriptorBufferInfo,
    },
    Image {
        set: vk::DescriptorSet,
        binding: u32,
        ty: vk::DescriptorType,
        info: vk::DescriptorImageInfo,
    },
}

/// Batches descriptor writes and applies them in one update call
#[derive(Default)]
pub struct DescriptorSetWriter {
    writes: Vec<PendingWrite>,
}

impl DescriptorSetWriter {
    /// Create a new descriptor set writer
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a uniform buffer range
    pub fn write_buffer(
        mut self,
        set: vk::DescriptorSet,
        binding: u32,
        buffer: vk::Buffer,
        range: vk::DeviceSize,
    ) -> Self {
        self.writes.push(PendingWrite::Buffer {
            set,
            binding,
            info: vk::DescriptorBufferInfo {
                buffer,
                offset: 0,
                range,
            },
        });
        self
    }

    /// Write a combined image sampler
    pub fn write_image(
        mut self,
        set: vk::DescriptorSet,
        binding: u32,
        image_view: vk::ImageView,
        sampler: vk::Sampler,
    ) -> Self {
        self.writes.push(PendingWrite::Image {
            set,
            binding,
            ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            info: vk::DescriptorImageInfo {
                sampler,
                image_view,
                image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            },
        });
        self
    }

    /// Write an input attachment; input attachments are not sampled
    pub fn write_input_attachment(
        mut self,
        set: vk::DescriptorSet,
        binding: u32,
        image_view: vk::ImageView,
    ) -> Self {
        self.writes.push(PendingWrite::Image {
            set,
            binding,
            ty: vk::DescriptorType::INPUT_ATTACHMENT,
            info: vk::DescriptorImageInfo {
                sampler: vk::Sampler::null(),
                image_view,
                image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            },
        });
        self
    }

    /// Number of queued writes
    pub fn len(&self) -> usize {
        self.writes.len()
    }

    /// Whether no writes are queued
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Apply every queued write
    pub fn update(self, device: &Device) {
        let writes: Vec<vk::WriteDescriptorSet> = self
            .writes
            .iter()
            .map(|write| match write {
                PendingWrite::Buffer { set, binding, info } => vk::WriteDescriptorSet::builder()
                    .dst_set(*set)
                    .dst_binding(*binding)
                    .dst_array_element(0)
                    .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                    .buffer_info(std::slice::from_ref(info))
                    .build(),
                PendingWrite::Image {
                    set,
                    binding,
                    ty,
                    info,
                } => vk::WriteDescriptorSet::builder()
                    .dst_set(*set)
                    .dst_binding(*binding)
                    .dst_array_element(0)
                    .descriptor_type(*ty)
                    .image_info(std::slice::from_ref(info))
                    .build(),
            })
            .collect();

        unsafe {
            device.update_descriptor_sets(&writes, &[]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_layout_is_vertex_stage_uniform() {
        let builder = uniform_layout();
        let bindings = builder.bindings();
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].descriptor_type, vk::DescriptorType::UNIFORM_BUFFER);
        assert_eq!(bindings[0].stage_flags, vk::ShaderStageFlags::VERTEX);
    }

    #[test]
    fn test_sampler_layout_is_fragment_stage_sampler() {
        let builder = sampler_layout();
        let bindings = builder.bindings();
        assert_eq!(bindings.len(), 1);
        assert_eq!(
            bindings[0].descriptor_type,
            vk::DescriptorType::COMBINED_IMAGE_SAMPLER
        );
        assert_eq!(bindings[0].stage_flags, vk::ShaderStageFlags::FRAGMENT);
    }

    #[test]
    fn test_input_layout_has_color_then_depth() {
        let builder = input_attachment_layout();
        let bindings = builder.bindings();
        assert_eq!(bindings.len(), 2);
        assert_eq!(bindings[0].binding, INPUT_COLOR_BINDING);
        assert_eq!(bindings[1].binding, INPUT_DEPTH_BINDING);
        for binding in bindings {
            assert_eq!(binding.descriptor_type, vk::DescriptorType::INPUT_ATTACHMENT);
            assert_eq!(binding.stage_flags, vk::ShaderStageFlags::FRAGMENT);
        }
    }

    #[test]
    fn test_pool_sizing_per_family() {
        assert_eq!(
            PoolSizing::uniform(3),
            PoolSizing {
                max_sets: 3,
                sizes: vec![(vk::DescriptorType::UNIFORM_BUFFER, 3)],
            }
        );
        assert_eq!(PoolSizing::samplers(20).max_sets, 20);
        assert_eq!(
            PoolSizing::input_attachments(3).sizes,
            vec![(vk::DescriptorType::INPUT_ATTACHMENT, 6)]
        );
    }

    #[test]
    fn test_writer_queues_writes() {
        let writer = DescriptorSetWriter::new()
            .write_buffer(vk::DescriptorSet::null(), UNIFORM_BINDING, vk::Buffer::null(), 128)
            .write_input_attachment(
                vk::DescriptorSet::null(),
                INPUT_DEPTH_BINDING,
                vk::ImageView::null(),
            );
        assert_eq!(writer.len(), 2);
        assert!(!writer.is_empty());
    }
}

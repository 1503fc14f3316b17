//! Per-model push constant block

use ash::vk;
use bytemuck::{Pod, Zeroable};

use crate::foundation::math::{Mat4, Mat4Ext};
use crate::vulkan::{VulkanError, VulkanResult};

/// Model matrix pushed once per model, read by the geometry vertex shader
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPushConstants {
    /// Column-major model matrix
    pub model: [[f32; 4]; 4],
}

unsafe impl Pod for ModelPushConstants {}
unsafe impl Zeroable for ModelPushConstants {}

impl ModelPushConstants {
    /// Block size in bytes
    pub const SIZE: u32 = std::mem::size_of::<Self>() as u32;

    /// Block for `transform`
    pub fn new(transform: &Mat4) -> Self {
        Self {
            model: transform.to_cols_array_2d(),
        }
    }
}

/// Vertex-stage range covering [`ModelPushConstants`].
///
/// Fails when the device cannot hold the block.
pub fn push_constant_range(
    limits: &vk::PhysicalDeviceLimits,
) -> VulkanResult<vk::PushConstantRange> {
    if ModelPushConstants::SIZE > limits.max_push_constants_size {
        return Err(VulkanError::InvalidOperation {
            reason: format!(
                "Push constant block of {} bytes exceeds device limit of {} bytes",
                ModelPushConstants::SIZE,
                limits.max_push_constants_size
            ),
        });
    }

    Ok(vk::PushConstantRange {
        stage_flags: vk::ShaderStageFlags::VERTEX,
        offset: 0,
        size: ModelPushConstants::SIZE,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits(max_push_constants_size: u32) -> vk::PhysicalDeviceLimits {
        vk::PhysicalDeviceLimits {
            max_push_constants_size,
            ..Default::default()
        }
    }

    #[test]
    fn test_block_is_one_matrix() {
        assert_eq!(ModelPushConstants::SIZE, 64);
    }

    #[test]
    fn test_block_bytes_are_column_major() {
        let transform = Mat4::new_translation(&crate::foundation::math::Vec3::new(1.0, 2.0, 3.0));
        let block = ModelPushConstants::new(&transform);
        let floats: &[f32] = bytemuck::cast_slice(bytemuck::bytes_of(&block));
        assert_eq!(&floats[12..15], &[1.0, 2.0, 3.0]);
        assert_eq!(floats[15], 1.0);
    }

    #[test]
    fn test_range_within_limits() {
        let range = push_constant_range(&limits(128)).unwrap();
        assert_eq!(range.size, 64);
        assert_eq!(range.offset, 0);
        assert_eq!(range.stage_flags, vk::ShaderStageFlags::VERTEX);
    }

    #[test]
    fn test_range_exceeding_limits_fails() {
        assert!(matches!(
            push_constant_range(&limits(32)),
            Err(VulkanError::InvalidOperation { .. })
        ));
    }
}

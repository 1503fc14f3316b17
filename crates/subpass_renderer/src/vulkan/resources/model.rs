//! GPU meshes and the model table
//!
//! Models are stored in a slot map so a handle from a removed model is
//! detected instead of silently aliasing a newer one. Draw order is kept
//! separately because the slot map reuses freed slots.

use ash::vk;
use slotmap::{new_key_type, Key, SlotMap};

use super::buffer::Buffer;
use super::texture::TextureId;
use super::upload::TransferContext;
use crate::assets::MeshData;
use crate::foundation::math::Mat4;
use crate::vulkan::{ResourceKind, VulkanError, VulkanResult};

new_key_type! {
    /// Handle to a model created by the renderer
    pub struct ModelHandle;
}

/// What the frame recorder needs to draw a mesh
pub trait DrawableMesh {
    /// Vertex buffer bound at binding 0
    fn vertex_buffer(&self) -> vk::Buffer;
    /// 32-bit index buffer
    fn index_buffer(&self) -> vk::Buffer;
    /// Number of indices to draw
    fn index_count(&self) -> u32;
    /// Texture table entry sampled by the mesh
    fn texture(&self) -> TextureId;
}

/// Mesh living in device-local buffers
pub struct GpuMesh {
    vertex_buffer: Buffer,
    index_buffer: Buffer,
    index_count: u32,
    texture: TextureId,
}

impl GpuMesh {
    /// Validate and upload mesh data through staging buffers
    pub fn upload(
        transfer: &TransferContext<'_>,
        data: &MeshData,
        texture: TextureId,
    ) -> VulkanResult<Self> {
        data.validate()?;

        let vertex_buffer =
            transfer.upload_buffer(data.vertex_bytes(), vk::BufferUsageFlags::VERTEX_BUFFER)?;
        let index_buffer =
            transfer.upload_buffer(data.index_bytes(), vk::BufferUsageFlags::INDEX_BUFFER)?;

        Ok(Self {
            vertex_buffer,
            index_buffer,
            index_count: count_u32(data.indices.len())?,
            texture,
        })
    }
}

fn count_u32(len: usize) -> VulkanResult<u32> {
    u32::try_from(len).map_err(|_| VulkanError::invalid(format!("{len} elements exceed u32")))
}

impl DrawableMesh for GpuMesh {
    fn vertex_buffer(&self) -> vk::Buffer {
        self.vertex_buffer.handle()
    }

    fn index_buffer(&self) -> vk::Buffer {
        self.index_buffer.handle()
    }

    fn index_count(&self) -> u32 {
        self.index_count
    }

    fn texture(&self) -> TextureId {
        self.texture
    }
}

/// Ordered meshes sharing one model transform
pub struct Model<M> {
    meshes: Vec<M>,
    transform: Mat4,
}

impl<M> Model<M> {
    /// Model with identity transform
    pub fn new(meshes: Vec<M>) -> Self {
        Self {
            meshes,
            transform: Mat4::identity(),
        }
    }

    /// Meshes in draw order
    pub fn meshes(&self) -> &[M] {
        &self.meshes
    }

    /// Current model transform
    pub fn transform(&self) -> &Mat4 {
        &self.transform
    }
}

/// All live models, drawn in insertion order
pub struct ModelTable<M> {
    models: SlotMap<ModelHandle, Model<M>>,
    order: Vec<ModelHandle>,
}

impl<M> Default for ModelTable<M> {
    fn default() -> Self {
        Self {
            models: SlotMap::with_key(),
            order: Vec::new(),
        }
    }
}

impl<M> ModelTable<M> {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a model and return its handle
    pub fn insert(&mut self, model: Model<M>) -> ModelHandle {
        let handle = self.models.insert(model);
        self.order.push(handle);
        handle
    }

    /// Look up a model
    pub fn get(&self, handle: ModelHandle) -> VulkanResult<&Model<M>> {
        self.models.get(handle).ok_or_else(|| missing(handle))
    }

    /// Replace a model's transform; visible to the next recorded frame
    pub fn set_transform(&mut self, handle: ModelHandle, transform: Mat4) -> VulkanResult<()> {
        let model = self.models.get_mut(handle).ok_or_else(|| missing(handle))?;
        model.transform = transform;
        Ok(())
    }

    /// Remove a model. Its GPU resources must no longer be in use.
    pub fn remove(&mut self, handle: ModelHandle) -> VulkanResult<Model<M>> {
        let model = self.models.remove(handle).ok_or_else(|| missing(handle))?;
        self.order.retain(|&h| h != handle);
        Ok(model)
    }

    /// Models in draw order
    pub fn iter(&self) -> impl Iterator<Item = &Model<M>> {
        self.order.iter().filter_map(|&handle| self.models.get(handle))
    }

    /// Number of models
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

fn missing(handle: ModelHandle) -> VulkanError {
    // Low 32 bits of the FFI form are the slot index
    let index = (handle.data().as_ffi() & u64::from(u32::MAX)) as usize;
    VulkanError::not_found(ResourceKind::Model, index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;

    #[test]
    fn test_set_transform_updates_model() {
        let mut table: ModelTable<()> = ModelTable::new();
        let handle = table.insert(Model::new(vec![(), ()]));

        let transform = Mat4::new_translation(&Vec3::new(1.0, 2.0, 3.0));
        table.set_transform(handle, transform).unwrap();

        assert_eq!(table.get(handle).unwrap().transform(), &transform);
        assert_eq!(table.get(handle).unwrap().meshes().len(), 2);
    }

    #[test]
    fn test_new_model_has_identity_transform() {
        let model: Model<()> = Model::new(Vec::new());
        assert_eq!(model.transform(), &Mat4::identity());
    }

    #[test]
    fn test_removed_handle_is_not_found() {
        let mut table: ModelTable<()> = ModelTable::new();
        let handle = table.insert(Model::new(vec![()]));
        table.remove(handle).unwrap();

        let result = table.set_transform(handle, Mat4::identity());
        assert!(matches!(
            result,
            Err(VulkanError::ResourceNotFound {
                kind: ResourceKind::Model,
                ..
            })
        ));
    }

    #[test]
    fn test_stale_handle_does_not_alias_new_model() {
        let mut table: ModelTable<u32> = ModelTable::new();
        let old = table.insert(Model::new(vec![1]));
        table.remove(old).unwrap();
        let new = table.insert(Model::new(vec![2]));

        assert!(table.get(old).is_err());
        assert_eq!(table.get(new).unwrap().meshes(), &[2]);
    }

    #[test]
    fn test_iteration_follows_insertion_order() {
        let mut table: ModelTable<u32> = ModelTable::new();
        for value in 0..4 {
            table.insert(Model::new(vec![value]));
        }
        let order: Vec<u32> = table.iter().map(|m| m.meshes()[0]).collect();
        assert_eq!(order, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_reused_slot_draws_after_older_models() {
        let mut table: ModelTable<u32> = ModelTable::new();
        let a = table.insert(Model::new(vec![0]));
        table.insert(Model::new(vec![1]));
        table.insert(Model::new(vec![2]));
        table.remove(a).unwrap();
        table.insert(Model::new(vec![3]));

        let order: Vec<u32> = table.iter().map(|m| m.meshes()[0]).collect();
        assert_eq!(order, vec![1, 2, 3]);
        assert_eq!(table.len(), 3);
    }
}

//! Parsed mesh data

use bytemuck::{Pod, Zeroable};

use crate::vulkan::resources::texture::TextureId;
use crate::vulkan::{VulkanError, VulkanResult};

/// Vertex layout consumed by the geometry pipeline
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vertex {
    /// Object-space position
    pub position: [f32; 3],
    /// Vertex color
    pub color: [f32; 3],
    /// Texture coordinate
    pub tex_coord: [f32; 2],
}

unsafe impl Zeroable for Vertex {}
unsafe impl Pod for Vertex {}

impl Vertex {
    /// Create a vertex
    pub const fn new(position: [f32; 3], color: [f32; 3], tex_coord: [f32; 2]) -> Self {
        Self {
            position,
            color,
            tex_coord,
        }
    }
}

/// Which texture a mesh samples
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MeshTexture {
    /// The built-in "no texture" entry
    #[default]
    Default,
    /// A file name resolved against the configured texture directory
    File(String),
    /// A texture that was already created
    Id(TextureId),
}

/// One sub-mesh: vertices, triangle-list indices and its texture
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeshData {
    /// Vertex array
    pub vertices: Vec<Vertex>,
    /// Triangle list indices into `vertices`
    pub indices: Vec<u32>,
    /// Texture reference
    pub texture: MeshTexture,
}

impl MeshData {
    /// Create mesh data that samples the default texture
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        Self {
            vertices,
            indices,
            texture: MeshTexture::Default,
        }
    }

    /// Attach a texture reference
    pub fn with_texture(mut self, texture: MeshTexture) -> Self {
        self.texture = texture;
        self
    }

    /// Reject meshes the GPU would read out of bounds
    pub fn validate(&self) -> VulkanResult<()> {
        if self.vertices.is_empty() || self.indices.is_empty() {
            return Err(VulkanError::invalid("Mesh needs at least one vertex and one index"));
        }
        if self.indices.len() % 3 != 0 {
            return Err(VulkanError::invalid(format!(
                "Index count {} is not a whole number of triangles",
                self.indices.len()
            )));
        }
        let vertex_count = self.vertices.len();
        if let Some(bad) = self.indices.iter().find(|&&i| i as usize >= vertex_count) {
            return Err(VulkanError::invalid(format!(
                "Index {bad} is out of range for {vertex_count} vertices"
            )));
        }
        Ok(())
    }

    /// Vertex data as bytes
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Index data as bytes
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }
}

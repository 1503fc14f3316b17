//! CPU-side mesh and texture data handed to the renderer
//!
//! Parsing model formats is left to the caller; these types are the
//! already-parsed form the renderer uploads.

pub mod mesh;
pub mod texture;

pub use mesh::{MeshData, MeshTexture, Vertex};
pub use texture::TextureData;

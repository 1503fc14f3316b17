//! GPU memory, buffers, images, descriptors and the model/texture tables

pub mod buffer;
pub mod descriptor_set;
pub mod image;
pub mod memory;
pub mod model;
pub mod texture;
pub mod uniform;
pub mod upload;

pub use buffer::{Buffer, UniformBuffer};
pub use descriptor_set::{DescriptorLayouts, DescriptorPool, DescriptorSetWriter};
pub use image::{AllocatedImage, ImageSpec, ImageView, ViewedImage};
pub use model::{DrawableMesh, GpuMesh, Model, ModelHandle, ModelTable};
pub use texture::{TextureId, TextureTable};
pub use uniform::{Camera, ViewProjection};
pub use upload::TransferContext;

//! Vulkan rendering backend
//!
//! Every wrapper owns its handle and releases it in `Drop`; owners declare
//! fields in reverse creation order so teardown follows Vulkan's rules.

pub mod error;
pub mod initialization;
pub mod rendering;
pub mod renderer;
pub mod resources;
pub mod state;

pub use error::{ResourceKind, VulkanError, VulkanResult};
pub use initialization::{SurfaceProvider, VulkanContext, Window, WindowError, WindowEvent};
pub use renderer::{FrameStatus, VulkanRenderer};
pub use resources::{ModelHandle, TextureId};

//! # Subpass Renderer
//!
//! A Vulkan frame renderer built around one render pass with two subpasses:
//! a geometry subpass draws textured models into offscreen color and depth
//! targets, and a composition subpass reads both back as input attachments
//! to produce the swapchain image.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use subpass_renderer::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut window = Window::new(&WindowConfig::default())?;
//!     let mut renderer = VulkanRenderer::initialize(RendererConfig::default(), &mut window)?;
//!
//!     while !window.should_close() {
//!         window.poll_events();
//!         renderer.draw(&window)?;
//!     }
//!
//!     renderer.shutdown()?;
//!     Ok(())
//! }
//! ```

pub mod assets;
pub mod config;
pub mod foundation;
pub mod vulkan;

pub use vulkan::{FrameStatus, VulkanError, VulkanRenderer, VulkanResult};

/// Common imports for renderer users
pub mod prelude {
    pub use crate::{
        assets::{MeshData, MeshTexture, TextureData, Vertex},
        config::{CameraConfig, Config, RendererConfig, ShaderConfig, WindowConfig},
        foundation::math::{Mat4, Mat4Ext, Vec3},
        vulkan::{
            FrameStatus, ModelHandle, SurfaceProvider, TextureId, VulkanError, VulkanRenderer,
            VulkanResult, Window, WindowEvent,
        },
    };
}

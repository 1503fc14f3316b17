//! Render pass, pipelines and command recording

pub mod commands;
pub mod frame_recorder;
pub mod framebuffer;
pub mod pipeline;
pub mod push_constants;
pub mod render_pass;
pub mod vertex_layout;

pub use commands::{CommandPool, CommandRecorder, OneTimeCommands};
pub use frame_recorder::{CommandSink, FrameBindings, FrameRecorder, PipelineBindings};
pub use framebuffer::{Framebuffer, OffscreenTargets};
pub use pipeline::{GraphicsPipeline, PipelineSettings, Pipelines, ShaderModule, ShaderSet};
pub use push_constants::ModelPushConstants;
pub use render_pass::{RenderGraphDesc, RenderPass};
pub use vertex_layout::VertexLayout;

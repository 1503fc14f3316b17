//! Two-subpass render pass: geometry into offscreen targets, then composition
//! into the swapchain image through input attachments
//!
//! The pass is described as plain data first ([`RenderGraphDesc`]) so the
//! attachment and dependency layout can be inspected without a device.

use ash::{vk, Device};

use crate::config::RendererConfig;
use crate::vulkan::{VulkanError, VulkanResult};

/// Format of the offscreen color target written by the geometry subpass
pub const OFFSCREEN_COLOR_FORMAT: vk::Format = vk::Format::R8G8B8A8_UNORM;

/// Depth formats in order of preference
pub const DEPTH_FORMAT_CANDIDATES: [vk::Format; 3] = [
    vk::Format::D32_SFLOAT_S8_UINT,
    vk::Format::D32_SFLOAT,
    vk::Format::D24_UNORM_S8_UINT,
];

/// Attachment slot of the swapchain image
pub const SWAPCHAIN_ATTACHMENT: u32 = 0;
/// Attachment slot of the offscreen color target
pub const OFFSCREEN_COLOR_ATTACHMENT: u32 = 1;
/// Attachment slot of the depth target
pub const DEPTH_ATTACHMENT: u32 = 2;

/// Subpass drawing scene geometry
pub const GEOMETRY_SUBPASS: u32 = 0;
/// Subpass compositing the offscreen targets
pub const COMPOSITION_SUBPASS: u32 = 1;

/// Whether `properties` allow `features` under `tiling`
pub fn supports_format(
    properties: &vk::FormatProperties,
    tiling: vk::ImageTiling,
    features: vk::FormatFeatureFlags,
) -> bool {
    match tiling {
        vk::ImageTiling::LINEAR => properties.linear_tiling_features.contains(features),
        vk::ImageTiling::OPTIMAL => properties.optimal_tiling_features.contains(features),
        _ => false,
    }
}

/// First candidate usable as an optimally tiled depth/stencil attachment
pub fn select_depth_format(
    candidates: &[vk::Format],
    format_properties: impl Fn(vk::Format) -> vk::FormatProperties,
) -> VulkanResult<vk::Format> {
    candidates
        .iter()
        .copied()
        .find(|&format| {
            supports_format(
                &format_properties(format),
                vk::ImageTiling::OPTIMAL,
                vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
            )
        })
        .ok_or(VulkanError::UnsupportedFormat {
            purpose: "depth attachment",
        })
}

/// Fail unless the offscreen color format can be rendered to
pub fn check_offscreen_color_format(properties: &vk::FormatProperties) -> VulkanResult<()> {
    if supports_format(
        properties,
        vk::ImageTiling::OPTIMAL,
        vk::FormatFeatureFlags::COLOR_ATTACHMENT,
    ) {
        Ok(())
    } else {
        Err(VulkanError::UnsupportedFormat {
            purpose: "offscreen color attachment",
        })
    }
}

/// Attachment references of one subpass
#[derive(Debug, Clone, Default)]
pub struct SubpassDesc {
    /// Color outputs
    pub color: Vec<vk::AttachmentReference>,
    /// Depth/stencil output
    pub depth: Option<vk::AttachmentReference>,
    /// Input attachments read at the current pixel
    pub inputs: Vec<vk::AttachmentReference>,
}

/// Attachments, subpasses and dependencies of a render pass
#[derive(Debug, Clone)]
pub struct RenderGraphDesc {
    /// Attachment descriptions, indexed by attachment slot
    pub attachments: Vec<vk::AttachmentDescription>,
    /// Subpasses in execution order
    pub subpasses: Vec<SubpassDesc>,
    /// Execution and memory dependencies
    pub dependencies: Vec<vk::SubpassDependency>,
}

fn attachment(
    format: vk::Format,
    store_op: vk::AttachmentStoreOp,
    final_layout: vk::ImageLayout,
) -> vk::AttachmentDescription {
    vk::AttachmentDescription {
        format,
        samples: vk::SampleCountFlags::TYPE_1,
        load_op: vk::AttachmentLoadOp::CLEAR,
        store_op,
        stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
        stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
        initial_layout: vk::ImageLayout::UNDEFINED,
        final_layout,
        ..Default::default()
    }
}

fn reference(attachment: u32, layout: vk::ImageLayout) -> vk::AttachmentReference {
    vk::AttachmentReference { attachment, layout }
}

impl RenderGraphDesc {
    /// Geometry-then-composition layout.
    ///
    /// Only the swapchain image is stored; the offscreen targets live for the
    /// duration of the pass and are read back through input attachments.
    pub fn two_subpass(
        swapchain_format: vk::Format,
        color_format: vk::Format,
        depth_format: vk::Format,
    ) -> Self {
        let attachments = vec![
            attachment(
                swapchain_format,
                vk::AttachmentStoreOp::STORE,
                vk::ImageLayout::PRESENT_SRC_KHR,
            ),
            attachment(
                color_format,
                vk::AttachmentStoreOp::DONT_CARE,
                vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            ),
            attachment(
                depth_format,
                vk::AttachmentStoreOp::DONT_CARE,
                vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            ),
        ];

        let geometry = SubpassDesc {
            color: vec![reference(
                OFFSCREEN_COLOR_ATTACHMENT,
                vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            )],
            depth: Some(reference(
                DEPTH_ATTACHMENT,
                vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            )),
            inputs: Vec::new(),
        };

        let composition = SubpassDesc {
            color: vec![reference(
                SWAPCHAIN_ATTACHMENT,
                vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            )],
            depth: None,
            inputs: vec![
                reference(
                    OFFSCREEN_COLOR_ATTACHMENT,
                    vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                ),
                reference(DEPTH_ATTACHMENT, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL),
            ],
        };

        let dependencies = vec![
            vk::SubpassDependency {
                src_subpass: vk::SUBPASS_EXTERNAL,
                dst_subpass: GEOMETRY_SUBPASS,
                src_stage_mask: vk::PipelineStageFlags::BOTTOM_OF_PIPE,
                dst_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                    | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
                src_access_mask: vk::AccessFlags::MEMORY_READ,
                dst_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_READ
                    | vk::AccessFlags::COLOR_ATTACHMENT_WRITE
                    | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
                dependency_flags: vk::DependencyFlags::empty(),
            },
            vk::SubpassDependency {
                src_subpass: GEOMETRY_SUBPASS,
                dst_subpass: COMPOSITION_SUBPASS,
                src_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                    | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS,
                dst_stage_mask: vk::PipelineStageFlags::FRAGMENT_SHADER,
                src_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_WRITE
                    | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
                dst_access_mask: vk::AccessFlags::INPUT_ATTACHMENT_READ,
                dependency_flags: vk::DependencyFlags::BY_REGION,
            },
            vk::SubpassDependency {
                src_subpass: COMPOSITION_SUBPASS,
                dst_subpass: vk::SUBPASS_EXTERNAL,
                src_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                dst_stage_mask: vk::PipelineStageFlags::BOTTOM_OF_PIPE,
                src_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_READ
                    | vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
                dst_access_mask: vk::AccessFlags::MEMORY_READ,
                dependency_flags: vk::DependencyFlags::empty(),
            },
        ];

        Self {
            attachments,
            subpasses: vec![geometry, composition],
            dependencies,
        }
    }
}

/// Clear values in attachment order: swapchain, offscreen color, depth
pub fn clear_values(config: &RendererConfig) -> [vk::ClearValue; 3] {
    [
        vk::ClearValue {
            color: vk::ClearColorValue {
                float32: config.clear_color,
            },
        },
        vk::ClearValue {
            color: vk::ClearColorValue {
                float32: config.offscreen_clear_color,
            },
        },
        vk::ClearValue {
            depth_stencil: vk::ClearDepthStencilValue {
                depth: 1.0,
                stencil: 0,
            },
        },
    ]
}

/// Render pass wrapper with RAII cleanup
pub struct RenderPass {
    device: Device,
    render_pass: vk::RenderPass,
}

impl RenderPass {
    /// Create a render pass from its description
    pub fn new(device: &Device, desc: &RenderGraphDesc) -> VulkanResult<Self> {
        let subpasses: Vec<vk::SubpassDescription> = desc
            .subpasses
            .iter()
            .map(|subpass| {
                let mut builder = vk::SubpassDescription::builder()
                    .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
                    .color_attachments(&subpass.color)
                    .input_attachments(&subpass.inputs);
                if let Some(depth) = subpass.depth.as_ref() {
                    builder = builder.depth_stencil_attachment(depth);
                }
                builder.build()
            })
            .collect();

        let create_info = vk::RenderPassCreateInfo::builder()
            .attachments(&desc.attachments)
            .subpasses(&subpasses)
            .dependencies(&desc.dependencies);

        let render_pass = unsafe { device.create_render_pass(&create_info, None) }
            .map_err(VulkanError::Api)?;

        Ok(Self {
            device: device.clone(),
            render_pass,
        })
    }

    /// Get the render pass handle
    pub fn handle(&self) -> vk::RenderPass {
        self.render_pass
    }
}

impl Drop for RenderPass {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_render_pass(self.render_pass, None);
        }
    }
}

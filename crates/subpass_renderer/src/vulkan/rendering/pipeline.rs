//! Shader modules and the geometry/composition graphics pipelines

use ash::{vk, Device};
use std::ffi::CStr;
use std::io::Cursor;
use std::path::Path;

use super::render_pass::{COMPOSITION_SUBPASS, GEOMETRY_SUBPASS};
use super::vertex_layout::VertexLayout;
use crate::config::ShaderConfig;
use crate::vulkan::resources::descriptor_set::DescriptorLayouts;
use crate::vulkan::{VulkanError, VulkanResult};

const ENTRY_POINT: &CStr = c"main";

/// Shader module wrapper with RAII cleanup
pub struct ShaderModule {
    device: Device,
    module: vk::ShaderModule,
}

impl ShaderModule {
    /// Create a shader module from SPIR-V words
    pub fn from_words(device: &Device, code: &[u32]) -> VulkanResult<Self> {
        let create_info = vk::ShaderModuleCreateInfo::builder().code(code);
        let module = unsafe { device.create_shader_module(&create_info, None) }
            .map_err(VulkanError::Api)?;

        Ok(Self {
            device: device.clone(),
            module,
        })
    }

    /// Load a SPIR-V file
    pub fn from_file(device: &Device, path: &Path) -> VulkanResult<Self> {
        let words = read_spirv(path)?;
        log::debug!("Loaded shader {} ({} words)", path.display(), words.len());
        Self::from_words(device, &words)
    }

    /// Get shader module handle
    pub fn handle(&self) -> vk::ShaderModule {
        self.module
    }

    fn stage(&self, stage: vk::ShaderStageFlags) -> vk::PipelineShaderStageCreateInfo {
        vk::PipelineShaderStageCreateInfo::builder()
            .stage(stage)
            .module(self.module)
            .name(ENTRY_POINT)
            .build()
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_shader_module(self.module, None);
        }
    }
}

/// Read a SPIR-V file into properly aligned words
pub fn read_spirv(path: &Path) -> VulkanResult<Vec<u32>> {
    let shader_load = |source: std::io::Error| VulkanError::ShaderLoad {
        path: path.to_path_buf(),
        source,
    };
    let bytes = std::fs::read(path).map_err(shader_load)?;
    ash::util::read_spv(&mut Cursor::new(bytes)).map_err(shader_load)
}

/// The four shader modules, kept for the renderer's lifetime so pipelines can
/// be rebuilt after swapchain recreation without touching the filesystem
pub struct ShaderSet {
    /// Geometry vertex stage
    pub geometry_vertex: ShaderModule,
    /// Geometry fragment stage
    pub geometry_fragment: ShaderModule,
    /// Composition vertex stage
    pub composition_vertex: ShaderModule,
    /// Composition fragment stage
    pub composition_fragment: ShaderModule,
}

impl ShaderSet {
    /// Load every shader named in `config`
    pub fn load(device: &Device, config: &ShaderConfig) -> VulkanResult<Self> {
        Ok(Self {
            geometry_vertex: ShaderModule::from_file(device, &config.geometry_vertex)?,
            geometry_fragment: ShaderModule::from_file(device, &config.geometry_fragment)?,
            composition_vertex: ShaderModule::from_file(device, &config.composition_vertex)?,
            composition_fragment: ShaderModule::from_file(device, &config.composition_fragment)?,
        })
    }
}

/// Fixed-function choices that differ between the two pipelines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Subpass the pipeline runs in
    pub subpass: u32,
    /// Whether vertices come from the [`VertexLayout`] buffer binding
    pub vertex_input: bool,
    /// Face culling
    pub cull_mode: vk::CullModeFlags,
    /// Winding order of front faces
    pub front_face: vk::FrontFace,
    /// Depth comparison enabled
    pub depth_test: bool,
    /// Depth writes enabled
    pub depth_write: bool,
    /// Source-alpha blending on the color output
    pub alpha_blend: bool,
}

impl PipelineSettings {
    /// Textured, depth-tested, alpha-blended scene geometry
    pub const fn geometry() -> Self {
        Self {
            subpass: GEOMETRY_SUBPASS,
            vertex_input: true,
            cull_mode: vk::CullModeFlags::BACK,
            front_face: vk::FrontFace::COUNTER_CLOCKWISE,
            depth_test: true,
            depth_write: true,
            alpha_blend: true,
        }
    }

    /// Full-screen triangle generated in the vertex shader
    pub const fn composition() -> Self {
        Self {
            subpass: COMPOSITION_SUBPASS,
            vertex_input: false,
            cull_mode: vk::CullModeFlags::NONE,
            front_face: vk::FrontFace::COUNTER_CLOCKWISE,
            depth_test: false,
            depth_write: false,
            alpha_blend: false,
        }
    }

    fn blend_attachment(&self) -> vk::PipelineColorBlendAttachmentState {
        let state = vk::PipelineColorBlendAttachmentState::builder()
            .color_write_mask(vk::ColorComponentFlags::RGBA);
        if self.alpha_blend {
            state
                .blend_enable(true)
                .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
                .dst_color_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
                .color_blend_op(vk::BlendOp::ADD)
                .src_alpha_blend_factor(vk::BlendFactor::ONE)
                .dst_alpha_blend_factor(vk::BlendFactor::ZERO)
                .alpha_blend_op(vk::BlendOp::ADD)
                .build()
        } else {
            state.blend_enable(false).build()
        }
    }
}

/// Graphics pipeline wrapper with RAII cleanup
pub struct GraphicsPipeline {
    device: Device,
    pipeline: vk::Pipeline,
    layout: vk::PipelineLayout,
}

impl GraphicsPipeline {
    /// Create a pipeline and its layout.
    ///
    /// Viewport and scissor are dynamic so the pipeline does not depend on
    /// the swapchain extent.
    pub fn new(
        device: &Device,
        render_pass: vk::RenderPass,
        stages: (&ShaderModule, &ShaderModule),
        set_layouts: &[vk::DescriptorSetLayout],
        push_constant_ranges: &[vk::PushConstantRange],
        settings: &PipelineSettings,
    ) -> VulkanResult<Self> {
        let layout_info = vk::PipelineLayoutCreateInfo::builder()
            .set_layouts(set_layouts)
            .push_constant_ranges(push_constant_ranges);
        let layout = unsafe { device.create_pipeline_layout(&layout_info, None) }
            .map_err(VulkanError::Api)?;

        match Self::create_pipeline(device, render_pass, layout, stages, settings) {
            Ok(pipeline) => Ok(Self {
                device: device.clone(),
                pipeline,
                layout,
            }),
            Err(e) => {
                unsafe { device.destroy_pipeline_layout(layout, None) };
                Err(e)
            }
        }
    }

    fn create_pipeline(
        device: &Device,
        render_pass: vk::RenderPass,
        layout: vk::PipelineLayout,
        (vertex, fragment): (&ShaderModule, &ShaderModule),
        settings: &PipelineSettings,
    ) -> VulkanResult<vk::Pipeline> {
        let shader_stages = [
            vertex.stage(vk::ShaderStageFlags::VERTEX),
            fragment.stage(vk::ShaderStageFlags::FRAGMENT),
        ];

        let bindings = [VertexLayout::binding_description()];
        let attributes = VertexLayout::attribute_descriptions();
        let vertex_input = if settings.vertex_input {
            vk::PipelineVertexInputStateCreateInfo::builder()
                .vertex_binding_descriptions(&bindings)
                .vertex_attribute_descriptions(&attributes)
        } else {
            vk::PipelineVertexInputStateCreateInfo::builder()
        };

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);

        let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
            .viewport_count(1)
            .scissor_count(1);

        let rasterizer = vk::PipelineRasterizationStateCreateInfo::builder()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(settings.cull_mode)
            .front_face(settings.front_face)
            .depth_bias_enable(false);

        let multisampling = vk::PipelineMultisampleStateCreateInfo::builder()
            .sample_shading_enable(false)
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::builder()
            .depth_test_enable(settings.depth_test)
            .depth_write_enable(settings.depth_write)
            .depth_compare_op(vk::CompareOp::LESS)
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false);

        let blend_attachments = [settings.blend_attachment()];
        let color_blending = vk::PipelineColorBlendStateCreateInfo::builder()
            .logic_op_enable(false)
            .attachments(&blend_attachments);

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state =
            vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(&dynamic_states);

        let pipeline_info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterizer)
            .multisample_state(&multisampling)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blending)
            .dynamic_state(&dynamic_state)
            .layout(layout)
            .render_pass(render_pass)
            .subpass(settings.subpass)
            .build();

        let pipelines = unsafe {
            device.create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
        }
        .map_err(|(_, e)| VulkanError::Api(e))?;

        pipelines
            .into_iter()
            .next()
            .ok_or_else(|| VulkanError::InitializationFailed("No pipeline returned".to_string()))
    }

    /// Get pipeline handle
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }

    /// Get pipeline layout handle
    pub fn layout(&self) -> vk::PipelineLayout {
        self.layout
    }
}

impl Drop for GraphicsPipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_pipeline(self.pipeline, None);
            self.device.destroy_pipeline_layout(self.layout, None);
        }
    }
}

/// Both pipelines of the two-subpass pass
pub struct Pipelines {
    /// Subpass 0: draws models into the offscreen targets
    pub geometry: GraphicsPipeline,
    /// Subpass 1: composites the offscreen targets into the swapchain image
    pub composition: GraphicsPipeline,
}

impl Pipelines {
    /// Build both pipelines against `render_pass`
    pub fn new(
        device: &Device,
        render_pass: vk::RenderPass,
        layouts: &DescriptorLayouts,
        shaders: &ShaderSet,
        push_constants: vk::PushConstantRange,
    ) -> VulkanResult<Self> {
        let geometry = GraphicsPipeline::new(
            device,
            render_pass,
            (&shaders.geometry_vertex, &shaders.geometry_fragment),
            &[layouts.uniform.handle(), layouts.sampler.handle()],
            &[push_constants],
            &PipelineSettings::geometry(),
        )?;

        let composition = GraphicsPipeline::new(
            device,
            render_pass,
            (&shaders.composition_vertex, &shaders.composition_fragment),
            &[layouts.input.handle()],
            &[],
            &PipelineSettings::composition(),
        )?;

        Ok(Self {
            geometry,
            composition,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry_settings() {
        let settings = PipelineSettings::geometry();
        assert_eq!(settings.subpass, GEOMETRY_SUBPASS);
        assert!(settings.vertex_input);
        assert!(settings.depth_test && settings.depth_write);
        assert_eq!(settings.cull_mode, vk::CullModeFlags::BACK);
        assert_eq!(settings.front_face, vk::FrontFace::COUNTER_CLOCKWISE);

        let blend = settings.blend_attachment();
        assert_eq!(blend.blend_enable, vk::TRUE);
        assert_eq!(blend.src_color_blend_factor, vk::BlendFactor::SRC_ALPHA);
        assert_eq!(blend.dst_color_blend_factor, vk::BlendFactor::ONE_MINUS_SRC_ALPHA);
    }

    #[test]
    fn test_composition_settings() {
        let settings = PipelineSettings::composition();
        assert_eq!(settings.subpass, COMPOSITION_SUBPASS);
        assert!(!settings.vertex_input);
        assert!(!settings.depth_test);
        assert!(!settings.depth_write);
        assert_eq!(settings.blend_attachment().blend_enable, vk::FALSE);
        assert_eq!(
            settings.blend_attachment().color_write_mask,
            vk::ColorComponentFlags::RGBA
        );
    }

    #[test]
    fn test_missing_shader_file_reports_path() {
        let err = read_spirv(Path::new("definitely/not/here.spv")).unwrap_err();
        assert!(matches!(err, VulkanError::ShaderLoad { .. }));
        assert!(err.to_string().contains("definitely/not/here.spv"));
    }

    #[test]
    fn test_spirv_words_are_read_little_endian() {
        let path = std::env::temp_dir().join(format!("spirv_words_{}.spv", std::process::id()));
        let magic: u32 = 0x0723_0203;
        let mut bytes = magic.to_le_bytes().to_vec();
        bytes.extend_from_slice(&7u32.to_le_bytes());
        std::fs::write(&path, &bytes).unwrap();

        let words = read_spirv(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(words, vec![magic, 7]);
    }

    #[test]
    fn test_truncated_spirv_is_rejected() {
        let path = std::env::temp_dir().join(format!("spirv_truncated_{}.spv", std::process::id()));
        std::fs::write(&path, [0x03, 0x02, 0x23]).unwrap();

        let result = read_spirv(&path);
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(result, Err(VulkanError::ShaderLoad { .. })));
    }
}

//! Per-image command recording for the two-subpass frame
//!
//! Recording goes through [`CommandSink`] so the exact command stream can be
//! inspected without a device.

use ash::vk;

use super::push_constants::ModelPushConstants;
use crate::vulkan::resources::model::{DrawableMesh, ModelTable};
use crate::vulkan::{ResourceKind, VulkanError, VulkanResult};

/// Destination for recorded frame commands
pub trait CommandSink {
    /// Start recording
    fn begin(&mut self) -> VulkanResult<()>;
    /// Begin the render pass over the full extent
    fn begin_render_pass(
        &mut self,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        extent: vk::Extent2D,
        clear_values: &[vk::ClearValue],
    );
    /// Set viewport and scissor to cover `extent`
    fn set_viewport(&mut self, extent: vk::Extent2D);
    /// Bind a graphics pipeline
    fn bind_pipeline(&mut self, pipeline: vk::Pipeline);
    /// Bind descriptor sets starting at set 0
    fn bind_descriptor_sets(&mut self, layout: vk::PipelineLayout, sets: &[vk::DescriptorSet]);
    /// Write push constant bytes at offset 0
    fn push_constants(
        &mut self,
        layout: vk::PipelineLayout,
        stages: vk::ShaderStageFlags,
        bytes: &[u8],
    );
    /// Bind a vertex buffer at binding 0
    fn bind_vertex_buffer(&mut self, buffer: vk::Buffer);
    /// Bind a 32-bit index buffer
    fn bind_index_buffer(&mut self, buffer: vk::Buffer);
    /// Indexed draw of one instance
    fn draw_indexed(&mut self, index_count: u32);
    /// Non-indexed draw of one instance
    fn draw(&mut self, vertex_count: u32);
    /// Advance to the next subpass
    fn next_subpass(&mut self);
    /// End the render pass
    fn end_render_pass(&mut self);
    /// Finish recording
    fn end(&mut self) -> VulkanResult<()>;
}

/// Per-image objects one frame is recorded against
#[derive(Debug, Clone, Copy)]
pub struct FrameBindings {
    /// Two-subpass render pass
    pub render_pass: vk::RenderPass,
    /// Framebuffer of the target image
    pub framebuffer: vk::Framebuffer,
    /// Render area
    pub extent: vk::Extent2D,
    /// View/projection uniform set of the target image
    pub uniform_set: vk::DescriptorSet,
    /// Input attachment set of the target image
    pub input_set: vk::DescriptorSet,
}

/// Pipeline handles used while recording
#[derive(Debug, Clone, Copy)]
pub struct PipelineBindings {
    /// Geometry pipeline
    pub geometry: vk::Pipeline,
    /// Geometry pipeline layout
    pub geometry_layout: vk::PipelineLayout,
    /// Composition pipeline
    pub composition: vk::Pipeline,
    /// Composition pipeline layout
    pub composition_layout: vk::PipelineLayout,
}

/// Records the geometry and composition subpasses of one frame
pub struct FrameRecorder {
    clear_values: [vk::ClearValue; 3],
}

impl FrameRecorder {
    /// Recorder clearing attachments to `clear_values`
    pub fn new(clear_values: [vk::ClearValue; 3]) -> Self {
        Self { clear_values }
    }

    /// Record every model, then the full-screen composition triangle.
    ///
    /// `sampler_sets` is indexed by texture id. Every texture reference is
    /// checked before anything is recorded, so a failure leaves the sink
    /// untouched.
    pub fn record<S: CommandSink, M: DrawableMesh>(
        &self,
        sink: &mut S,
        frame: &FrameBindings,
        pipelines: &PipelineBindings,
        models: &ModelTable<M>,
        sampler_sets: &[vk::DescriptorSet],
    ) -> VulkanResult<()> {
        let draws = models
            .iter()
            .map(|model| {
                let meshes = model
                    .meshes()
                    .iter()
                    .map(|mesh| {
                        let index = mesh.texture().index();
                        sampler_sets
                            .get(index)
                            .map(|&set| (mesh, set))
                            .ok_or_else(|| VulkanError::not_found(ResourceKind::Texture, index))
                    })
                    .collect::<VulkanResult<Vec<_>>>()?;
                Ok((ModelPushConstants::new(model.transform()), meshes))
            })
            .collect::<VulkanResult<Vec<_>>>()?;

        sink.begin()?;
        sink.begin_render_pass(
            frame.render_pass,
            frame.framebuffer,
            frame.extent,
            &self.clear_values,
        );
        sink.set_viewport(frame.extent);

        sink.bind_pipeline(pipelines.geometry);
        for (push, meshes) in &draws {
            sink.push_constants(
                pipelines.geometry_layout,
                vk::ShaderStageFlags::VERTEX,
                bytemuck::bytes_of(push),
            );
            for (mesh, sampler_set) in meshes {
                sink.bind_vertex_buffer(mesh.vertex_buffer());
                sink.bind_index_buffer(mesh.index_buffer());
                sink.bind_descriptor_sets(
                    pipelines.geometry_layout,
                    &[frame.uniform_set, *sampler_set],
                );
                sink.draw_indexed(mesh.index_count());
            }
        }

        sink.next_subpass();
        sink.bind_pipeline(pipelines.composition);
        sink.bind_descriptor_sets(pipelines.composition_layout, &[frame.input_set]);
        sink.draw(3);

        sink.end_render_pass();
        sink.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Mat4, Mat4Ext, Vec3};
    use crate::vulkan::resources::model::Model;
    use crate::vulkan::resources::texture::TextureId;
    use ash::vk::Handle;

    #[derive(Debug, Clone, PartialEq)]
    enum Command {
        Begin,
        BeginRenderPass(usize),
        SetViewport,
        BindPipeline(vk::Pipeline),
        BindSets(Vec<vk::DescriptorSet>),
        PushConstants(Vec<u8>),
        BindVertex(vk::Buffer),
        BindIndex(vk::Buffer),
        DrawIndexed(u32),
        Draw(u32),
        NextSubpass,
        EndRenderPass,
        End,
    }

    #[derive(Default)]
    struct RecordingSink {
        commands: Vec<Command>,
    }

    impl CommandSink for RecordingSink {
        fn begin(&mut self) -> VulkanResult<()> {
            self.commands.push(Command::Begin);
            Ok(())
        }
        fn begin_render_pass(
            &mut self,
            _: vk::RenderPass,
            _: vk::Framebuffer,
            _: vk::Extent2D,
            clear_values: &[vk::ClearValue],
        ) {
            self.commands.push(Command::BeginRenderPass(clear_values.len()));
        }
        fn set_viewport(&mut self, _: vk::Extent2D) {
            self.commands.push(Command::SetViewport);
        }
        fn bind_pipeline(&mut self, pipeline: vk::Pipeline) {
            self.commands.push(Command::BindPipeline(pipeline));
        }
        fn bind_descriptor_sets(&mut self, _: vk::PipelineLayout, sets: &[vk::DescriptorSet]) {
            self.commands.push(Command::BindSets(sets.to_vec()));
        }
        fn push_constants(&mut self, _: vk::PipelineLayout, _: vk::ShaderStageFlags, bytes: &[u8]) {
            self.commands.push(Command::PushConstants(bytes.to_vec()));
        }
        fn bind_vertex_buffer(&mut self, buffer: vk::Buffer) {
            self.commands.push(Command::BindVertex(buffer));
        }
        fn bind_index_buffer(&mut self, buffer: vk::Buffer) {
            self.commands.push(Command::BindIndex(buffer));
        }
        fn draw_indexed(&mut self, index_count: u32) {
            self.commands.push(Command::DrawIndexed(index_count));
        }
        fn draw(&mut self, vertex_count: u32) {
            self.commands.push(Command::Draw(vertex_count));
        }
        fn next_subpass(&mut self) {
            self.commands.push(Command::NextSubpass);
        }
        fn end_render_pass(&mut self) {
            self.commands.push(Command::EndRenderPass);
        }
        fn end(&mut self) -> VulkanResult<()> {
            self.commands.push(Command::End);
            Ok(())
        }
    }

    struct FakeMesh {
        id: u64,
        index_count: u32,
        texture: TextureId,
    }

    impl DrawableMesh for FakeMesh {
        fn vertex_buffer(&self) -> vk::Buffer {
            vk::Buffer::from_raw(self.id)
        }
        fn index_buffer(&self) -> vk::Buffer {
            vk::Buffer::from_raw(self.id + 100)
        }
        fn index_count(&self) -> u32 {
            self.index_count
        }
        fn texture(&self) -> TextureId {
            self.texture
        }
    }

    fn mesh(id: u64, index_count: u32, texture: usize) -> FakeMesh {
        FakeMesh {
            id,
            index_count,
            texture: TextureId::from_index(texture),
        }
    }

    fn frame() -> FrameBindings {
        FrameBindings {
            render_pass: vk::RenderPass::from_raw(1),
            framebuffer: vk::Framebuffer::from_raw(2),
            extent: vk::Extent2D {
                width: 800,
                height: 600,
            },
            uniform_set: vk::DescriptorSet::from_raw(10),
            input_set: vk::DescriptorSet::from_raw(11),
        }
    }

    fn pipelines() -> PipelineBindings {
        PipelineBindings {
            geometry: vk::Pipeline::from_raw(20),
            geometry_layout: vk::PipelineLayout::from_raw(21),
            composition: vk::Pipeline::from_raw(22),
            composition_layout: vk::PipelineLayout::from_raw(23),
        }
    }

    fn sampler_sets() -> Vec<vk::DescriptorSet> {
        vec![vk::DescriptorSet::from_raw(30), vk::DescriptorSet::from_raw(31)]
    }

    fn recorder() -> FrameRecorder {
        FrameRecorder::new([vk::ClearValue::default(); 3])
    }

    fn split_at_subpass(commands: &[Command]) -> (&[Command], &[Command]) {
        let at = commands
            .iter()
            .position(|c| *c == Command::NextSubpass)
            .unwrap();
        (&commands[..at], &commands[at + 1..])
    }

    #[test]
    fn test_two_meshes_draw_then_composite() {
        let mut models = ModelTable::new();
        models.insert(Model::new(vec![mesh(1, 6, 0), mesh(2, 36, 1)]));

        let mut sink = RecordingSink::default();
        recorder()
            .record(&mut sink, &frame(), &pipelines(), &models, &sampler_sets())
            .unwrap();

        let (geometry, composition) = split_at_subpass(&sink.commands);
        let indexed: Vec<u32> = geometry
            .iter()
            .filter_map(|c| match c {
                Command::DrawIndexed(n) => Some(*n),
                _ => None,
            })
            .collect();
        assert_eq!(indexed, vec![6, 36]);
        assert!(!composition.iter().any(|c| matches!(c, Command::DrawIndexed(_))));

        let draws: Vec<&Command> = composition
            .iter()
            .filter(|c| matches!(c, Command::Draw(_)))
            .collect();
        assert_eq!(draws, vec![&Command::Draw(3)]);
    }

    #[test]
    fn test_command_stream_shape() {
        let mut models = ModelTable::new();
        models.insert(Model::new(vec![mesh(1, 3, 1)]));

        let mut sink = RecordingSink::default();
        recorder()
            .record(&mut sink, &frame(), &pipelines(), &models, &sampler_sets())
            .unwrap();

        let expected = vec![
            Command::Begin,
            Command::BeginRenderPass(3),
            Command::SetViewport,
            Command::BindPipeline(vk::Pipeline::from_raw(20)),
            Command::PushConstants(
                bytemuck::bytes_of(&ModelPushConstants::new(&Mat4::identity())).to_vec(),
            ),
            Command::BindVertex(vk::Buffer::from_raw(1)),
            Command::BindIndex(vk::Buffer::from_raw(101)),
            Command::BindSets(vec![
                vk::DescriptorSet::from_raw(10),
                vk::DescriptorSet::from_raw(31),
            ]),
            Command::DrawIndexed(3),
            Command::NextSubpass,
            Command::BindPipeline(vk::Pipeline::from_raw(22)),
            Command::BindSets(vec![vk::DescriptorSet::from_raw(11)]),
            Command::Draw(3),
            Command::EndRenderPass,
            Command::End,
        ];
        assert_eq!(sink.commands, expected);
    }

    #[test]
    fn test_updated_transform_is_pushed() {
        let mut models = ModelTable::new();
        let handle = models.insert(Model::new(vec![mesh(1, 3, 0)]));

        let transform = Mat4::new_translation(&Vec3::new(4.0, -2.0, 0.5)) * Mat4::rotation_z(0.3);
        models.set_transform(handle, transform).unwrap();

        let mut sink = RecordingSink::default();
        recorder()
            .record(&mut sink, &frame(), &pipelines(), &models, &sampler_sets())
            .unwrap();

        let pushed = sink
            .commands
            .iter()
            .find_map(|c| match c {
                Command::PushConstants(bytes) => Some(bytes.clone()),
                _ => None,
            })
            .unwrap();
        let expected = transform.to_cols_array_2d();
        assert_eq!(pushed, bytemuck::bytes_of(&expected).to_vec());
    }

    #[test]
    fn test_one_push_per_model() {
        let mut models = ModelTable::new();
        models.insert(Model::new(vec![mesh(1, 3, 0), mesh(2, 3, 0)]));
        models.insert(Model::new(vec![mesh(3, 3, 1)]));

        let mut sink = RecordingSink::default();
        recorder()
            .record(&mut sink, &frame(), &pipelines(), &models, &sampler_sets())
            .unwrap();

        let pushes = sink
            .commands
            .iter()
            .filter(|c| matches!(c, Command::PushConstants(_)))
            .count();
        assert_eq!(pushes, 2);
    }

    #[test]
    fn test_empty_scene_still_composites() {
        let models: ModelTable<FakeMesh> = ModelTable::new();

        let mut sink = RecordingSink::default();
        recorder()
            .record(&mut sink, &frame(), &pipelines(), &models, &sampler_sets())
            .unwrap();

        let (geometry, composition) = split_at_subpass(&sink.commands);
        assert!(!geometry.iter().any(|c| matches!(c, Command::DrawIndexed(_))));
        assert!(composition.contains(&Command::Draw(3)));
    }

    #[test]
    fn test_unknown_texture_fails_before_recording() {
        let mut models = ModelTable::new();
        models.insert(Model::new(vec![mesh(1, 3, 0), mesh(2, 3, 7)]));

        let mut sink = RecordingSink::default();
        let result = recorder().record(&mut sink, &frame(), &pipelines(), &models, &sampler_sets());

        assert!(matches!(
            result,
            Err(VulkanError::ResourceNotFound {
                kind: ResourceKind::Texture,
                index: 7
            })
        ));
        assert!(sink.commands.is_empty());
    }
}

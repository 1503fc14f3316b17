//! Frame orchestration for the two-subpass renderer
//!
//! `VulkanRenderer` owns every GPU object. Struct fields are declared in
//! reverse creation order so Rust's drop order is Vulkan's teardown order:
//! models and textures, then everything bound to the swapchain, then frame
//! synchronization, the command pool, descriptor layouts, shader modules and
//! finally the context (surface, device, debug messenger, instance).
//!
//! Each frame:
//! ```text
//! 1. Wait for the frame slot's fence
//! 2. Acquire a swapchain image (recreate on out-of-date)
//! 3. Wait for whichever slot last rendered that image
//! 4. Write the image's view/projection uniform
//! 5. Re-record the image's command buffer
//! 6. Reset the fence and submit (on any failure since acquire, replace
//!    the slot's sync objects)
//! 7. Advance the frame slot
//! 8. Present (recreate on out-of-date or suboptimal)
//! ```

use ash::{vk, Device};

use super::initialization::{SurfaceProvider, VulkanContext};
use super::rendering::commands::{CommandPool, CommandRecorder};
use super::rendering::frame_recorder::{FrameBindings, FrameRecorder, PipelineBindings};
use super::rendering::framebuffer::{Framebuffer, OffscreenTargets};
use super::rendering::pipeline::{Pipelines, ShaderSet};
use super::rendering::push_constants::push_constant_range;
use super::rendering::render_pass::{
    check_offscreen_color_format, clear_values, select_depth_format, RenderGraphDesc, RenderPass,
    DEPTH_FORMAT_CANDIDATES, OFFSCREEN_COLOR_FORMAT,
};
use super::resources::buffer::UniformBuffer;
use super::resources::descriptor_set::{
    DescriptorLayouts, DescriptorPool, DescriptorSetWriter, PoolSizing, INPUT_COLOR_BINDING,
    INPUT_DEPTH_BINDING, UNIFORM_BINDING,
};
use super::resources::model::{GpuMesh, Model, ModelHandle, ModelTable};
use super::resources::texture::{TextureId, TextureTable, TEXTURE_FORMAT};
use super::resources::uniform::{Camera, ViewProjection};
use super::resources::upload::TransferContext;
use super::state::per_image::{ImageIndex, PerImage};
use super::state::frame_flow::{after_acquire, after_present, before_acquire, FrameAction};
use super::state::swapchain::Swapchain;
use super::state::sync::{FrameCounter, FrameIndex, FrameSlots, FrameSync};
use super::{VulkanError, VulkanResult};
use crate::assets::{MeshData, MeshTexture, TextureData};
use crate::config::RendererConfig;
use crate::foundation::math::Mat4;

/// Color of the default texture in slot 0
const DEFAULT_TEXTURE_RGBA: [u8; 4] = [255, 255, 255, 255];

/// Outcome of one [`VulkanRenderer::draw`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    /// A frame was submitted and presented
    Presented,
    /// The swapchain was rebuilt; the frame may not have been presented
    Recreated,
    /// The framebuffer has no area (minimised window); nothing was drawn
    Skipped,
}

/// Resources owned by one swapchain image
struct ImageResources {
    framebuffer: Framebuffer,
    _offscreen: OffscreenTargets,
    uniform: UniformBuffer<ViewProjection>,
    uniform_set: vk::DescriptorSet,
    input_set: vk::DescriptorSet,
}

/// Long-lived objects swapchain-bound resources are built from
struct TargetInputs<'a> {
    layouts: &'a DescriptorLayouts,
    shaders: &'a ShaderSet,
    command_pool: &'a CommandPool,
    push_constants: vk::PushConstantRange,
    depth_format: vk::Format,
}

/// Everything rebuilt when the swapchain is recreated
struct SwapchainTargets {
    device: Device,
    command_pool: vk::CommandPool,
    command_buffers: PerImage<vk::CommandBuffer>,
    images_in_flight: PerImage<Option<FrameIndex>>,
    images: PerImage<ImageResources>,
    _uniform_pool: DescriptorPool,
    _input_pool: DescriptorPool,
    pipelines: Pipelines,
    render_pass: RenderPass,
    swapchain: Swapchain,
}

impl SwapchainTargets {
    fn new(
        context: &VulkanContext,
        inputs: &TargetInputs<'_>,
        framebuffer_size: (u32, u32),
        old: Option<&Swapchain>,
        generation: u32,
    ) -> VulkanResult<Self> {
        let device = context.device();
        let memory_properties = context.memory_properties();

        let swapchain = Swapchain::new(context, framebuffer_size, old, generation)?;
        let extent = swapchain.extent();

        let graph = RenderGraphDesc::two_subpass(
            swapchain.format().format,
            OFFSCREEN_COLOR_FORMAT,
            inputs.depth_format,
        );
        let render_pass = RenderPass::new(device, &graph)?;
        let pipelines = Pipelines::new(
            device,
            render_pass.handle(),
            inputs.layouts,
            inputs.shaders,
            inputs.push_constants,
        )?;

        let image_count = u32::try_from(swapchain.image_count())
            .map_err(|_| VulkanError::invalid("Too many swapchain images"))?;
        let uniform_pool = DescriptorPool::new(device, &PoolSizing::uniform(image_count))?;
        let input_pool = DescriptorPool::new(device, &PoolSizing::input_attachments(image_count))?;

        let images = swapchain.images().try_map(|_, image| {
            let offscreen =
                OffscreenTargets::new(device, memory_properties, extent, inputs.depth_format)?;
            let framebuffer = Framebuffer::new(
                device,
                render_pass.handle(),
                &offscreen.attachments(image.view()),
                extent,
            )?;
            let uniform = UniformBuffer::<ViewProjection>::new(device, memory_properties)?;

            let uniform_set = uniform_pool.allocate(inputs.layouts.uniform.handle())?;
            let input_set = input_pool.allocate(inputs.layouts.input.handle())?;
            DescriptorSetWriter::new()
                .write_buffer(uniform_set, UNIFORM_BINDING, uniform.handle(), uniform.range())
                .write_input_attachment(input_set, INPUT_COLOR_BINDING, offscreen.color.view())
                .write_input_attachment(input_set, INPUT_DEPTH_BINDING, offscreen.depth.view())
                .update(device);

            Ok(ImageResources {
                framebuffer,
                _offscreen: offscreen,
                uniform,
                uniform_set,
                input_set,
            })
        })?;

        let images_in_flight = images.try_map(|_, _| Ok(None))?;

        // Allocated last so nothing fallible runs while they are unowned
        let buffers = inputs.command_pool.allocate_command_buffers(image_count)?;
        let command_buffers = PerImage::new(generation, buffers);

        debug_assert_eq!(images.len(), swapchain.image_count());
        debug_assert_eq!(command_buffers.len(), swapchain.image_count());

        Ok(Self {
            device: device.clone(),
            command_pool: inputs.command_pool.handle(),
            command_buffers,
            images_in_flight,
            images,
            _uniform_pool: uniform_pool,
            _input_pool: input_pool,
            pipelines,
            render_pass,
            swapchain,
        })
    }

    fn frame_bindings(&self, image: ImageIndex) -> VulkanResult<FrameBindings> {
        let resources = self.images.get(image)?;
        Ok(FrameBindings {
            render_pass: self.render_pass.handle(),
            framebuffer: resources.framebuffer.handle(),
            extent: self.swapchain.extent(),
            uniform_set: resources.uniform_set,
            input_set: resources.input_set,
        })
    }

    fn pipeline_bindings(&self) -> PipelineBindings {
        PipelineBindings {
            geometry: self.pipelines.geometry.handle(),
            geometry_layout: self.pipelines.geometry.layout(),
            composition: self.pipelines.composition.handle(),
            composition_layout: self.pipelines.composition.layout(),
        }
    }

    fn aspect_ratio(&self) -> f32 {
        let extent = self.swapchain.extent();
        extent.width as f32 / extent.height.max(1) as f32
    }
}

impl Drop for SwapchainTargets {
    fn drop(&mut self) {
        let buffers: Vec<vk::CommandBuffer> = self.command_buffers.iter().copied().collect();
        if !buffers.is_empty() {
            unsafe {
                self.device.free_command_buffers(self.command_pool, &buffers);
            }
        }
    }
}

/// Two-subpass Vulkan renderer
pub struct VulkanRenderer {
    models: ModelTable<GpuMesh>,
    textures: TextureTable,
    targets: SwapchainTargets,
    frame_sync: FrameSlots<FrameSync>,
    command_pool: CommandPool,
    layouts: DescriptorLayouts,
    shaders: ShaderSet,
    context: VulkanContext,

    config: RendererConfig,
    counter: FrameCounter,
    camera: Camera,
    recorder: FrameRecorder,
    push_constants: vk::PushConstantRange,
    depth_format: vk::Format,
    generation: u32,
    resized: bool,
}

impl VulkanRenderer {
    /// Bring up the whole renderer for `surface`.
    ///
    /// Either every object is created or, on error, everything created so far
    /// is released before returning.
    pub fn initialize(
        config: RendererConfig,
        surface: &mut dyn SurfaceProvider,
    ) -> VulkanResult<Self> {
        config
            .validate()
            .map_err(|e| VulkanError::InitializationFailed(format!("Invalid configuration: {e}")))?;

        log::info!("Initializing renderer for '{}'", config.application_name);

        let context = VulkanContext::new(&config, surface)?;
        let device = context.device();
        let limits = *context.physical_device().limits();

        let push_constants = push_constant_range(&limits)?;
        check_offscreen_color_format(&context.format_properties(OFFSCREEN_COLOR_FORMAT))?;
        let depth_format = select_depth_format(&DEPTH_FORMAT_CANDIDATES, |format| {
            context.format_properties(format)
        })?;
        log::info!("Depth format: {:?}", depth_format);

        let shaders = ShaderSet::load(device, &config.shaders)?;
        let layouts = DescriptorLayouts::new(device)?;
        let command_pool = CommandPool::new(device, context.queue_families().graphics)?;

        let counter = FrameCounter::new(config.frames_in_flight)?;
        let frame_sync = FrameSlots::try_new(&counter, |_| FrameSync::new(device))?;

        let generation = 0;
        let targets = SwapchainTargets::new(
            &context,
            &TargetInputs {
                layouts: &layouts,
                shaders: &shaders,
                command_pool: &command_pool,
                push_constants,
                depth_format,
            },
            surface.framebuffer_size(),
            None,
            generation,
        )?;

        let textures = TextureTable::new(device, &limits, config.max_textures)?;
        let camera = Camera::from_config(&config.camera, targets.aspect_ratio());
        let recorder = FrameRecorder::new(clear_values(&config));

        let mut renderer = Self {
            models: ModelTable::new(),
            textures,
            targets,
            frame_sync,
            command_pool,
            layouts,
            shaders,
            context,
            config,
            counter,
            camera,
            recorder,
            push_constants,
            depth_format,
            generation,
            resized: false,
        };

        let default_texture = renderer.create_texture(&TextureData::solid(DEFAULT_TEXTURE_RGBA))?;
        debug_assert_eq!(default_texture, TextureId::DEFAULT);

        log::info!(
            "Renderer ready: {} frames in flight, {} swapchain images",
            renderer.frame_sync.len(),
            renderer.targets.swapchain.image_count()
        );
        Ok(renderer)
    }

    fn transfer(&self) -> TransferContext<'_> {
        TransferContext {
            device: self.context.device(),
            memory_properties: self.context.memory_properties(),
            queue: self.context.graphics_queue(),
            command_pool: self.command_pool.handle(),
        }
    }

    /// Upload RGBA8 pixels and append them to the texture table
    pub fn create_texture(&mut self, data: &TextureData) -> VulkanResult<TextureId> {
        let image = self.transfer().upload_image(
            data.pixels(),
            vk::Extent2D {
                width: data.width(),
                height: data.height(),
            },
            TEXTURE_FORMAT,
        )?;
        self.textures
            .insert(self.context.device(), image, self.layouts.sampler.handle())
    }

    /// Load `name` from the texture directory, reusing an earlier load of
    /// the same name
    pub fn create_texture_from_file(&mut self, name: &str) -> VulkanResult<TextureId> {
        if let Some(id) = self.textures.find_by_name(name) {
            return Ok(id);
        }

        let path = self.config.texture_directory.join(name);
        let data = TextureData::load(&path)?;
        let id = self.create_texture(&data)?;
        self.textures.remember_name(name, id);
        log::debug!("Loaded texture {} as {}", path.display(), id.index());
        Ok(id)
    }

    fn resolve_texture(&mut self, texture: &MeshTexture) -> VulkanResult<TextureId> {
        match texture {
            MeshTexture::Default => Ok(TextureId::DEFAULT),
            MeshTexture::File(name) => self.create_texture_from_file(name),
            MeshTexture::Id(id) => self.textures.contains(*id),
        }
    }

    /// Upload a model made of `meshes`, drawn with an identity transform
    /// until [`Self::update_model`] is called
    pub fn create_model(&mut self, meshes: &[MeshData]) -> VulkanResult<ModelHandle> {
        for mesh in meshes {
            mesh.validate()?;
        }

        let textures = meshes
            .iter()
            .map(|mesh| self.resolve_texture(&mesh.texture))
            .collect::<VulkanResult<Vec<_>>>()?;

        let transfer = self.transfer();
        let gpu_meshes = meshes
            .iter()
            .zip(textures)
            .map(|(mesh, texture)| GpuMesh::upload(&transfer, mesh, texture))
            .collect::<VulkanResult<Vec<_>>>()?;

        let handle = self.models.insert(Model::new(gpu_meshes));
        log::debug!("Created model with {} meshes", meshes.len());
        Ok(handle)
    }

    /// Set a model's transform; the next recorded frame uses it
    pub fn update_model(&mut self, handle: ModelHandle, transform: Mat4) -> VulkanResult<()> {
        self.models.set_transform(handle, transform)
    }

    /// Remove a model after the GPU has finished with it
    pub fn remove_model(&mut self, handle: ModelHandle) -> VulkanResult<()> {
        self.models.get(handle)?;
        self.wait_idle()?;
        self.models.remove(handle).map(drop)
    }

    /// Replace the view and projection matrices
    pub fn set_camera(&mut self, view: Mat4, projection: Mat4) {
        self.camera.view = view;
        self.camera.projection = projection;
    }

    /// Current camera
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Current swapchain extent
    pub fn extent(&self) -> vk::Extent2D {
        self.targets.swapchain.extent()
    }

    /// Request swapchain recreation before the next frame
    pub fn notify_resized(&mut self) {
        self.resized = true;
    }

    /// Render and present one frame
    pub fn draw(&mut self, surface: &dyn SurfaceProvider) -> VulkanResult<FrameStatus> {
        let frame = self.counter.current();
        self.frame_sync.get(frame)?.in_flight.wait(u64::MAX)?;

        let framebuffer_size = surface.framebuffer_size();
        match before_acquire(framebuffer_size, self.resized) {
            FrameAction::Skip => return Ok(FrameStatus::Skipped),
            FrameAction::Rebuild => {
                self.rebuild_targets(framebuffer_size)?;
                return Ok(FrameStatus::Recreated);
            }
            FrameAction::Proceed => {}
        }

        let image_available = self.frame_sync.get(frame)?.image_available.handle();
        let acquired = self.targets.swapchain.acquire_next_image(image_available);
        let Some((image, acquired_suboptimal)) = after_acquire(acquired)? else {
            self.rebuild_targets(framebuffer_size)?;
            return Ok(FrameStatus::Recreated);
        };

        if let Err(e) = self.submit_frame(image, frame) {
            self.reset_frame_sync(frame);
            return Err(e);
        }

        // The slot's fence now belongs to the submission
        self.counter.advance();

        let render_finished = self.frame_sync.get(frame)?.render_finished.handle();
        let presented =
            self.targets
                .swapchain
                .present(self.context.present_queue(), render_finished, image);

        match after_present(presented, acquired_suboptimal, self.resized)? {
            FrameAction::Rebuild => {
                self.rebuild_targets(framebuffer_size)?;
                Ok(FrameStatus::Recreated)
            }
            FrameAction::Proceed | FrameAction::Skip => Ok(FrameStatus::Presented),
        }
    }

    /// Write the uniform, record and submit `image` on `frame`'s slot
    fn submit_frame(&mut self, image: ImageIndex, frame: FrameIndex) -> VulkanResult<()> {
        self.wait_for_image(image, frame)?;

        self.targets
            .images
            .get_mut(image)?
            .uniform
            .write(&self.camera.uniform());

        let command_buffer = *self.targets.command_buffers.get(image)?;
        let mut sink = CommandRecorder::new(self.context.device(), command_buffer);
        self.recorder.record(
            &mut sink,
            &self.targets.frame_bindings(image)?,
            &self.targets.pipeline_bindings(),
            &self.models,
            self.textures.descriptor_sets(),
        )?;

        let sync = self.frame_sync.get(frame)?;
        // Reset only once a submit is certain to follow
        sync.in_flight.reset()?;

        let wait_semaphores = [sync.image_available.handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [command_buffer];
        let signal_semaphores = [sync.render_finished.handle()];
        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores)
            .build();

        unsafe {
            self.context.device().queue_submit(
                self.context.graphics_queue(),
                &[submit_info],
                sync.in_flight.handle(),
            )
        }
        .map_err(VulkanError::from_queue_result)
    }

    /// Replace `frame`'s sync objects after a failure between acquire and a
    /// successful submit: the image-available semaphore may still hold the
    /// acquire's signal and the fence may already be reset.
    fn reset_frame_sync(&mut self, frame: FrameIndex) {
        let fresh = self
            .wait_idle()
            .and_then(|()| FrameSync::new(self.context.device()));
        match fresh.and_then(|sync| self.frame_sync.replace(frame, sync)) {
            Ok(_) => log::warn!("Recreated sync objects for frame slot {}", frame.index()),
            Err(e) => log::error!(
                "Failed to recreate sync objects for frame slot {}: {e}",
                frame.index()
            ),
        }
    }

    /// Block until no other frame slot is still rendering to `image`, then
    /// claim it for `frame`
    fn wait_for_image(&mut self, image: ImageIndex, frame: FrameIndex) -> VulkanResult<()> {
        if let Some(previous) = *self.targets.images_in_flight.get(image)? {
            if previous != frame {
                self.frame_sync.get(previous)?.in_flight.wait(u64::MAX)?;
            }
        }
        *self.targets.images_in_flight.get_mut(image)? = Some(frame);
        Ok(())
    }

    /// Rebuild the swapchain and everything that depends on it
    pub fn recreate_swapchain(&mut self, surface: &dyn SurfaceProvider) -> VulkanResult<()> {
        self.rebuild_targets(surface.framebuffer_size())
    }

    fn rebuild_targets(&mut self, framebuffer_size: (u32, u32)) -> VulkanResult<()> {
        self.wait_idle()?;

        let generation = self.generation.wrapping_add(1);
        let targets = SwapchainTargets::new(
            &self.context,
            &TargetInputs {
                layouts: &self.layouts,
                shaders: &self.shaders,
                command_pool: &self.command_pool,
                push_constants: self.push_constants,
                depth_format: self.depth_format,
            },
            framebuffer_size,
            Some(&self.targets.swapchain),
            generation,
        )?;

        self.targets = targets;
        self.generation = generation;
        self.resized = false;
        self.camera.set_aspect(self.targets.aspect_ratio());

        let extent = self.targets.swapchain.extent();
        log::info!(
            "Swapchain recreated at {}x{}",
            extent.width,
            extent.height
        );
        Ok(())
    }

    /// Block until the device has finished all submitted work
    pub fn wait_idle(&self) -> VulkanResult<()> {
        self.context.wait_idle()
    }

    /// Wait for the GPU, then release every resource in teardown order
    pub fn shutdown(self) -> VulkanResult<()> {
        log::info!("Shutting down renderer");
        self.wait_idle()
    }
}

impl Drop for VulkanRenderer {
    fn drop(&mut self) {
        if let Err(e) = self.wait_idle() {
            log::error!("Failed to wait for device idle during teardown: {e}");
        }
        log::debug!("Releasing renderer resources");
    }
}

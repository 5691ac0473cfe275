//! The renderer the host application drives.
//!
//! [`Renderer`] owns every GPU object of the viewer and exposes the frame
//! protocol (`begin_frame` / `draw_scene` / `end_frame`), resizing, and scene
//! loading. Construction is a single ordered chain; a value of this type is
//! always fully initialized.
//!
//! # Resource Destruction Order
//!
//! Fields are declared so Rust's drop order releases scene resources first,
//! then pipeline state, per-frame objects, the swapchain, the surface, the
//! device and finally the instance. `Drop` waits for the GPU before any of
//! that happens.

use std::path::Path;
use std::sync::Arc;

use ash::vk;
use glam::{Mat4, Vec2};
use tracing::{debug, error, info, warn};

use objview_core::ViewerConfig;
use objview_platform::{Surface, Window};
use objview_resources::{MaterialDesc, MeshData, SceneConstants, TextureData};
use objview_rhi::{RhiError, RhiResult};
use objview_rhi::buffer::{Buffer, BufferUsage};
use objview_rhi::command::{CommandBuffer, CommandPool};
use objview_rhi::descriptor::{DescriptorPool, write_uniform_dynamic};
use objview_rhi::device::Device;
use objview_rhi::instance::Instance;
use objview_rhi::physical_device::{SurfaceSupport, rank_adapters};
use objview_rhi::rendering::RenderingPass;
use objview_rhi::swapchain::Swapchain;
use objview_rhi::sync::Semaphore;
use objview_scene::{BoundingSphere, Camera, DirectionalLight};

use crate::constants::ConstantRing;
use crate::depth_buffer::DepthBuffer;
use crate::draw_plan::{DrawCommand, plan_draws, scene_materials};
use crate::error::{RendererError, RendererResult};
use crate::frame_scheduler::{FRAME_COUNT, FrameRing, QueueFence};
use crate::scene_pipeline::ScenePipeline;
use crate::textures::{GpuTexture, TextureTable};
use crate::uploader::ResourceUploader;

/// A material together with the texture slot it samples, if any.
struct GpuMaterial {
    desc: MaterialDesc,
    texture: Option<GpuTexture>,
}

/// Geometry and materials of the scene currently on screen.
struct GpuScene {
    vertex_buffer: Buffer,
    index_buffer: Option<Buffer>,
    draws: Vec<DrawCommand>,
    materials: Vec<GpuMaterial>,
    bounds: BoundingSphere,
}

/// Recording context of one frame slot.
struct FrameSlot {
    cmd: CommandBuffer,
    pool: CommandPool,
    /// Signaled by acquire; reusable once the slot's fence value completes.
    image_available: Semaphore,
}

impl FrameSlot {
    fn new(device: &Arc<Device>) -> RendererResult<Self> {
        let pool = CommandPool::new(device.clone(), device.graphics_family())?;
        let cmd = CommandBuffer::new(device.clone(), &pool)?;
        let image_available = Semaphore::new(device.clone())?;
        Ok(Self {
            cmd,
            pool,
            image_available,
        })
    }
}

/// Forward renderer for a single static mesh scene.
pub struct Renderer {
    scene: GpuScene,
    textures: TextureTable,
    constants_set: vk::DescriptorSet,
    _constants_pool: DescriptorPool,
    constants: ConstantRing,
    uploader: ResourceUploader,
    pipeline: ScenePipeline,
    frames: Vec<FrameSlot>,
    /// One per swapchain image, waited on by present.
    render_finished: Vec<Semaphore>,
    ring: FrameRing<QueueFence>,
    depth: DepthBuffer,
    swapchain: Swapchain,
    surface: Surface,
    device: Arc<Device>,
    instance: Instance,

    camera: Camera,
    light: DirectionalLight,
    tex_tiling: Vec2,
    tex_scroll: Vec2,
    fade: Vec2,
    /// Latest size reported by the window; 0×0 while minimized.
    extent: vk::Extent2D,
    /// Swapchain image acquired by `begin_frame`, consumed by `end_frame`.
    image_index: Option<u32>,
    needs_resize: bool,
}

impl Renderer {
    /// Creates the device, presentation objects and pipeline, and installs the
    /// default cube scene.
    ///
    /// # Errors
    ///
    /// Any failure here is fatal: no adapter, no device, shader translation,
    /// pipeline creation or an allocation that cannot be satisfied.
    pub fn new(window: &Window, config: &ViewerConfig) -> RendererResult<Self> {
        let extent = vk::Extent2D {
            width: window.width(),
            height: window.height(),
        };
        info!(
            "Initializing renderer ({}x{})",
            extent.width, extent.height
        );

        let instance = Instance::new(config.validation, &window.required_extensions()?)?;
        let surface = window.create_surface(instance.entry(), instance.handle())?;

        let adapters = rank_adapters(
            instance.handle(),
            Some(SurfaceSupport {
                surface: surface.handle(),
                loader: surface.loader(),
            }),
        )?;
        let device = Device::create(&instance, &adapters, true)?;

        let swapchain = Swapchain::new(
            &instance,
            device.clone(),
            surface.handle(),
            surface.loader(),
            extent,
            FRAME_COUNT as u32,
        )?;
        let depth = DepthBuffer::new(device.clone(), swapchain.extent())?;

        let frames = (0..FRAME_COUNT)
            .map(|_| FrameSlot::new(&device))
            .collect::<RendererResult<Vec<_>>>()?;
        let render_finished = create_semaphores(&device, swapchain.image_count())?;
        let mut ring = FrameRing::new(QueueFence::new(&device)?);

        let pipeline = ScenePipeline::new(device.clone(), swapchain.format())?;

        let mut uploader = ResourceUploader::new(device.clone())?;
        let mut textures =
            TextureTable::new(device.clone(), pipeline.texture_layout(), &mut uploader)?;

        let constants = ConstantRing::new(device.clone())?;
        let constants_pool =
            DescriptorPool::with_sets(device.clone(), pipeline.constants_layout(), 1)?;
        let constants_set = constants_pool.sets()[0];
        write_uniform_dynamic(
            &device,
            constants_set,
            constants.buffer(),
            constants.binding_range(),
        );

        let scene = build_scene(&mut uploader, &mut textures, &MeshData::cube(), Path::new(""))?;
        uploader.flush(&mut ring)?;

        info!(
            "Renderer ready on '{}': {} swapchain images, {} frames in flight, validation {}",
            device.adapter().device_name(),
            swapchain.image_count(),
            FRAME_COUNT,
            if instance.has_validation() { "on" } else { "off" }
        );

        Ok(Self {
            camera: Camera::framing(&scene.bounds),
            scene,
            textures,
            constants_set,
            _constants_pool: constants_pool,
            constants,
            uploader,
            pipeline,
            frames,
            render_finished,
            ring,
            depth,
            swapchain,
            surface,
            device,
            instance,
            light: DirectionalLight::default(),
            tex_tiling: Vec2::from(config.tex_tiling),
            tex_scroll: Vec2::from(config.tex_scroll),
            fade: Vec2::from(config.fade),
            extent,
            image_index: None,
            needs_resize: false,
        })
    }

    /// Acquires a swapchain image and starts recording the current frame slot.
    ///
    /// Does nothing while the window is minimized or when the swapchain turns
    /// out to be stale; the following `draw_scene` and `end_frame` then skip
    /// as well.
    pub fn begin_frame(&mut self, clear_color: [f32; 4]) -> RendererResult<()> {
        self.image_index = None;
        if self.is_minimized() {
            return Ok(());
        }
        if self.needs_resize {
            self.recreate_swapchain()?;
        }

        let frame = &self.frames[self.ring.current_index()];
        let image_index = match self
            .swapchain
            .acquire_next_image(frame.image_available.handle())
        {
            Ok((index, suboptimal)) => {
                self.needs_resize |= suboptimal;
                index
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                debug!("Swapchain out of date on acquire");
                self.needs_resize = true;
                return Ok(());
            }
            Err(e) => return Err(RhiError::from(e).into()),
        };

        frame.pool.reset()?;
        let cmd = &frame.cmd;
        cmd.begin()?;
        cmd.transition_image_layout(
            self.swapchain.image(image_index as usize),
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            vk::ImageAspectFlags::COLOR,
        );
        self.depth.prepare_for_rendering(cmd);

        let extent = self.swapchain.extent();
        let pass = RenderingPass::new(
            extent,
            self.swapchain.image_view(image_index as usize),
            clear_color,
            Some(self.depth.view()),
        );
        cmd.begin_rendering(&pass.info());
        cmd.set_full_viewport(extent);

        self.image_index = Some(image_index);
        Ok(())
    }

    /// Records one indexed draw per non-empty subset.
    pub fn draw_scene(&mut self, total_time: f32, _delta_time: f32) -> RendererResult<()> {
        if self.image_index.is_none() || self.scene.draws.is_empty() {
            return Ok(());
        }
        let Some(index_buffer) = &self.scene.index_buffer else {
            return Ok(());
        };

        let frame_index = self.ring.current_index();
        let cmd = &self.frames[frame_index].cmd;
        cmd.bind_graphics_pipeline(self.pipeline.pipeline());
        cmd.bind_vertex_buffer(self.scene.vertex_buffer.handle());
        cmd.bind_index_buffer(index_buffer.handle());

        let base = self.frame_constants(total_time);
        for draw in &self.scene.draws {
            let material = &self.scene.materials[draw.material];

            let mut constants = base;
            constants.set_material(&material.desc, material.texture.is_some());
            let offset = self.constants.write(frame_index, draw.subset, &constants)?;

            cmd.bind_descriptor_sets(
                self.pipeline.layout(),
                0,
                &[
                    self.constants_set,
                    self.textures.set_for(material.texture.as_ref()),
                ],
                &[offset],
            );
            cmd.draw_indexed(draw.index_count, draw.first_index);
        }

        Ok(())
    }

    /// Submits the frame, presents it and advances to the next frame slot.
    pub fn end_frame(&mut self) -> RendererResult<()> {
        let Some(image_index) = self.image_index.take() else {
            return Ok(());
        };

        let frame = &self.frames[self.ring.current_index()];
        let cmd = &frame.cmd;
        cmd.end_rendering();
        cmd.transition_image_layout(
            self.swapchain.image(image_index as usize),
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            vk::ImageLayout::PRESENT_SRC_KHR,
            vk::ImageAspectFlags::COLOR,
        );
        cmd.end()?;

        let render_finished = self.render_finished[image_index as usize].handle();
        let wait_semaphores = [frame.image_available.handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [cmd.handle()];
        let signal_semaphores = [render_finished];
        let submit = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        // SAFETY: the command buffer finished recording above and the slot's
        // previous submission completed before begin_frame reset its pool.
        unsafe { self.device.submit_graphics(&[submit], vk::Fence::null())? };

        let presented =
            self.swapchain
                .present(self.device.present_queue(), image_index, render_finished);

        // Advance even when present failed so the submission above is fenced
        self.ring.move_to_next_frame()?;

        match presented {
            Ok(suboptimal) => self.needs_resize |= suboptimal,
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => self.needs_resize = true,
            Err(e) => return Err(RhiError::from(e).into()),
        }
        Ok(())
    }

    /// Follows a window size change.
    ///
    /// A repeated size is ignored. A 0×0 size pauses rendering until the next
    /// non-zero size arrives. Otherwise all frames in flight are drained before
    /// the swapchain and depth buffer are rebuilt.
    pub fn on_resize(&mut self, width: u32, height: u32) -> RendererResult<()> {
        if self.extent.width == width && self.extent.height == height {
            return Ok(());
        }

        self.extent = vk::Extent2D { width, height };
        if self.is_minimized() {
            debug!("Window minimized, rendering paused");
            return Ok(());
        }

        self.recreate_swapchain()
    }

    /// Replaces the scene with the OBJ file at `path`.
    ///
    /// Returns false and keeps the current scene when the file cannot be
    /// decoded. Textures that fail to load leave their material untextured.
    pub fn load_obj(&mut self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        match self.replace_scene(path) {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to load '{}': {}", path.display(), e);
                false
            }
        }
    }

    pub fn set_tex_tiling(&mut self, x: f32, y: f32) {
        self.tex_tiling = Vec2::new(x, y);
    }

    pub fn set_tex_scroll(&mut self, x: f32, y: f32) {
        self.tex_scroll = Vec2::new(x, y);
    }

    #[inline]
    fn is_minimized(&self) -> bool {
        self.extent.width == 0 || self.extent.height == 0
    }

    fn replace_scene(&mut self, path: &Path) -> RendererResult<()> {
        self.ring.wait_for_gpu()?;

        let mesh = MeshData::load_obj(path)?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
        let scene = build_scene(&mut self.uploader, &mut self.textures, &mesh, base_dir)?;
        self.uploader.flush(&mut self.ring)?;

        self.camera = Camera::framing(&scene.bounds);
        info!(
            "Scene '{}': {} draws, {} materials, {} textures, radius {:.3}",
            path.display(),
            scene.draws.len(),
            scene.materials.len(),
            self.textures.used_slots(),
            scene.bounds.radius
        );
        self.scene = scene;
        Ok(())
    }

    fn recreate_swapchain(&mut self) -> RendererResult<()> {
        let Self {
            ring,
            swapchain,
            depth,
            render_finished,
            instance,
            surface,
            device,
            extent,
            needs_resize,
            ..
        } = self;
        let target = *extent;

        ring.drain_then(|| {
            swapchain.recreate(instance, surface.handle(), surface.loader(), target)?;
            *depth = DepthBuffer::new(device.clone(), swapchain.extent())?;
            *render_finished = create_semaphores(device, swapchain.image_count())?;
            Ok(())
        })?;

        *needs_resize = false;
        Ok(())
    }

    fn frame_constants(&self, total_time: f32) -> SceneConstants {
        let extent = self.swapchain.extent();
        let aspect = extent.width as f32 / extent.height.max(1) as f32;

        let mut constants = SceneConstants::new(
            Mat4::IDENTITY,
            self.camera.view_matrix(),
            self.camera.projection_matrix(aspect),
            self.camera.eye,
        );
        constants.light_dir = self.light.direction_vec4();
        constants.light_color = self.light.color_vec4();
        constants.ambient_color = self.light.ambient_vec4();
        constants.total_time = total_time;
        constants.tex_tiling = self.tex_tiling;
        constants.tex_scroll = self.tex_scroll;
        constants.fade_start = self.fade.x;
        constants.fade_end = self.fade.y;
        constants
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        if let Err(e) = self.ring.wait_for_gpu() {
            error!("Failed to wait for the GPU during shutdown: {}", e);
        }
        info!("Renderer shutting down");
    }
}

fn create_semaphores(device: &Arc<Device>, count: usize) -> RhiResult<Vec<Semaphore>> {
    (0..count).map(|_| Semaphore::new(device.clone())).collect()
}

/// Uploads geometry and material textures for `mesh`.
///
/// Texture paths are resolved against `base_dir`. Geometry is uploaded before
/// the texture table is recycled so a failed upload leaves the current scene
/// intact.
fn build_scene(
    uploader: &mut ResourceUploader,
    textures: &mut TextureTable,
    mesh: &MeshData,
    base_dir: &Path,
) -> RendererResult<GpuScene> {
    let vertex_buffer =
        uploader.upload_static(BufferUsage::Vertex, bytemuck::cast_slice(&mesh.vertices))?;
    let index_buffer = uploader.upload_indices(&mesh.indices)?;

    textures.clear();
    let mut materials = Vec::new();
    for desc in scene_materials(&mesh.materials) {
        let texture = desc
            .diffuse_texture
            .as_ref()
            .and_then(|relative| load_texture(uploader, textures, &base_dir.join(relative)));
        materials.push(GpuMaterial { desc, texture });
    }

    let bounds = mesh
        .bounds()
        .map(|(min, max)| BoundingSphere::from_aabb(min, max))
        .unwrap_or_default();

    Ok(GpuScene {
        vertex_buffer,
        index_buffer,
        draws: plan_draws(&mesh.subsets, materials.len()),
        materials,
        bounds,
    })
}

fn load_texture(
    uploader: &mut ResourceUploader,
    textures: &mut TextureTable,
    path: &Path,
) -> Option<GpuTexture> {
    // The slot is taken before any copy is recorded
    let result = TextureData::load(path)
        .map_err(RendererError::from)
        .and_then(|data| Ok((textures.reserve()?, data)))
        .and_then(|(slot, data)| Ok(textures.bind(slot, uploader.upload_texture(&data)?)));

    match result {
        Ok(texture) => {
            let extent = texture.extent();
            debug!(
                "Texture '{}' ({}x{}) in slot {}",
                path.display(),
                extent.width,
                extent.height,
                texture.slot()
            );
            Some(texture)
        }
        Err(e) => {
            warn!(
                "Texture '{}' unavailable, drawing untextured: {}",
                path.display(),
                e
            );
            None
        }
    }
}

//! The single graphics pipeline used to draw meshes.
//!
//! Set 0 carries the per-draw [`SceneConstants`](objview_resources::SceneConstants)
//! through a dynamic uniform buffer visible to both stages. Set 1 carries the
//! diffuse texture and its sampler, visible to the fragment stage only.

use std::sync::Arc;

use ash::vk;
use tracing::info;

use objview_rhi::RhiResult;
use objview_rhi::descriptor::{DescriptorSetLayout, layout_binding};
use objview_rhi::device::Device;
use objview_rhi::pipeline::{BlendMode, GraphicsPipelineDesc, Pipeline, PipelineLayout};
use objview_rhi::shader::{Shader, ShaderStage};
use objview_rhi::vertex::MeshVertex;

use crate::depth_buffer::DEPTH_FORMAT;

/// WGSL source shared by both stages.
pub const SHADER_SOURCE: &str = include_str!("../shaders/phong.wgsl");
pub const VERTEX_ENTRY: &str = "vs_main";
pub const FRAGMENT_ENTRY: &str = "fs_main";

/// Pipeline, its layout and the two descriptor set layouts it was built from.
pub struct ScenePipeline {
    pipeline: Pipeline,
    layout: PipelineLayout,
    constants_layout: DescriptorSetLayout,
    texture_layout: DescriptorSetLayout,
}

impl ScenePipeline {
    /// Compiles the shaders and builds the pipeline for `color_format` targets.
    ///
    /// # Errors
    ///
    /// Any shader or pipeline failure is returned; there is no fallback.
    pub fn new(device: Arc<Device>, color_format: vk::Format) -> RhiResult<Self> {
        let vertex_shader = Shader::from_wgsl(
            device.clone(),
            SHADER_SOURCE,
            ShaderStage::Vertex,
            VERTEX_ENTRY,
        )?;
        let fragment_shader = Shader::from_wgsl(
            device.clone(),
            SHADER_SOURCE,
            ShaderStage::Fragment,
            FRAGMENT_ENTRY,
        )?;

        let constants_layout = DescriptorSetLayout::new(
            device.clone(),
            &[layout_binding(
                0,
                vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
                vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
            )],
        )?;
        let texture_layout = DescriptorSetLayout::new(
            device.clone(),
            &[
                layout_binding(0, vk::DescriptorType::SAMPLED_IMAGE, vk::ShaderStageFlags::FRAGMENT),
                layout_binding(1, vk::DescriptorType::SAMPLER, vk::ShaderStageFlags::FRAGMENT),
            ],
        )?;

        let layout = PipelineLayout::new(
            device.clone(),
            &[constants_layout.handle(), texture_layout.handle()],
        )?;

        let pipeline = Pipeline::graphics(
            device,
            &layout,
            &GraphicsPipelineDesc {
                vertex: &vertex_shader,
                fragment: &fragment_shader,
                vertex_binding: MeshVertex::binding_description(),
                vertex_attributes: &MeshVertex::attribute_descriptions(),
                blend: BlendMode::Alpha,
                color_format,
                depth_format: Some(DEPTH_FORMAT),
            },
        )?;

        info!("Scene pipeline ready ({:?} / {:?})", color_format, DEPTH_FORMAT);

        Ok(Self {
            pipeline,
            layout,
            constants_layout,
            texture_layout,
        })
    }

    #[inline]
    pub fn pipeline(&self) -> vk::Pipeline {
        self.pipeline.handle()
    }

    #[inline]
    pub fn layout(&self) -> vk::PipelineLayout {
        self.layout.handle()
    }

    #[inline]
    pub fn constants_layout(&self) -> &DescriptorSetLayout {
        &self.constants_layout
    }

    #[inline]
    pub fn texture_layout(&self) -> &DescriptorSetLayout {
        &self.texture_layout
    }
}

//! Graphics pipelines for dynamic rendering.
//!
//! Mesh pipelines share one fixed-function setup: triangle lists, no culling,
//! counter-clockwise front faces and a `LESS` depth test when a depth target
//! is present. Viewport and scissor are dynamic. A [`GraphicsPipelineDesc`]
//! supplies only what differs between pipelines.
//!
//! ```no_run
//! use std::sync::Arc;
//! use objview_rhi::device::Device;
//! use objview_rhi::shader::Shader;
//! use objview_rhi::pipeline::{BlendMode, GraphicsPipelineDesc, Pipeline, PipelineLayout};
//! use objview_rhi::vertex::MeshVertex;
//! use ash::vk;
//!
//! # fn example(device: Arc<Device>, vs: &Shader, fs: &Shader) -> Result<(), objview_rhi::RhiError> {
//! let layout = PipelineLayout::new(device.clone(), &[])?;
//! let pipeline = Pipeline::graphics(
//!     device,
//!     &layout,
//!     &GraphicsPipelineDesc {
//!         vertex: vs,
//!         fragment: fs,
//!         vertex_binding: MeshVertex::binding_description(),
//!         vertex_attributes: &MeshVertex::attribute_descriptions(),
//!         blend: BlendMode::Alpha,
//!         color_format: vk::Format::B8G8R8A8_UNORM,
//!         depth_format: Some(vk::Format::D32_SFLOAT),
//!     },
//! )?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::shader::{Shader, ShaderStage};

pub struct PipelineLayout {
    device: Arc<Device>,
    layout: vk::PipelineLayout,
}

impl PipelineLayout {
    /// Layout over `set_layouts`, where index `n` is descriptor set `n`.
    pub fn new(device: Arc<Device>, set_layouts: &[vk::DescriptorSetLayout]) -> RhiResult<Self> {
        let create_info = vk::PipelineLayoutCreateInfo::default().set_layouts(set_layouts);
        let layout = unsafe { device.handle().create_pipeline_layout(&create_info, None)? };
        Ok(Self { device, layout })
    }

    #[inline]
    pub fn handle(&self) -> vk::PipelineLayout {
        self.layout
    }
}

impl Drop for PipelineLayout {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_pipeline_layout(self.layout, None);
        }
    }
}

/// How fragments combine with the color target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlendMode {
    Opaque,
    /// `src * src_alpha + dst * (1 - src_alpha)`; destination alpha takes the source alpha.
    Alpha,
}

impl BlendMode {
    pub fn attachment_state(self) -> vk::PipelineColorBlendAttachmentState {
        let state = vk::PipelineColorBlendAttachmentState::default()
            .color_write_mask(vk::ColorComponentFlags::RGBA)
            .color_blend_op(vk::BlendOp::ADD)
            .alpha_blend_op(vk::BlendOp::ADD)
            .src_alpha_blend_factor(vk::BlendFactor::ONE)
            .dst_alpha_blend_factor(vk::BlendFactor::ZERO);

        match self {
            Self::Opaque => state
                .blend_enable(false)
                .src_color_blend_factor(vk::BlendFactor::ONE)
                .dst_color_blend_factor(vk::BlendFactor::ZERO),
            Self::Alpha => state
                .blend_enable(true)
                .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
                .dst_color_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA),
        }
    }
}

/// The parts of a mesh pipeline that vary between pipelines.
pub struct GraphicsPipelineDesc<'a> {
    pub vertex: &'a Shader,
    pub fragment: &'a Shader,
    pub vertex_binding: vk::VertexInputBindingDescription,
    pub vertex_attributes: &'a [vk::VertexInputAttributeDescription],
    pub blend: BlendMode,
    pub color_format: vk::Format,
    /// Enables depth test and write when set.
    pub depth_format: Option<vk::Format>,
}

fn rasterization_state() -> vk::PipelineRasterizationStateCreateInfo<'static> {
    vk::PipelineRasterizationStateCreateInfo::default()
        .polygon_mode(vk::PolygonMode::FILL)
        .cull_mode(vk::CullModeFlags::NONE)
        .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
        .line_width(1.0)
}

fn depth_state(enabled: bool) -> vk::PipelineDepthStencilStateCreateInfo<'static> {
    vk::PipelineDepthStencilStateCreateInfo::default()
        .depth_test_enable(enabled)
        .depth_write_enable(enabled)
        .depth_compare_op(vk::CompareOp::LESS)
        .max_depth_bounds(1.0)
}

pub struct Pipeline {
    device: Arc<Device>,
    pipeline: vk::Pipeline,
}

impl Pipeline {
    /// Builds a graphics pipeline rendering into one color target.
    pub fn graphics(
        device: Arc<Device>,
        layout: &PipelineLayout,
        desc: &GraphicsPipelineDesc<'_>,
    ) -> RhiResult<Self> {
        if desc.vertex.stage() != ShaderStage::Vertex
            || desc.fragment.stage() != ShaderStage::Fragment
        {
            return Err(RhiError::PipelineError(
                "shader stages do not match their pipeline slots".to_string(),
            ));
        }

        let stages = [
            desc.vertex.stage_create_info(),
            desc.fragment.stage_create_info(),
        ];
        let bindings = [desc.vertex_binding];
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&bindings)
            .vertex_attribute_descriptions(desc.vertex_attributes);
        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST);
        let viewport = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);
        let rasterization = rasterization_state();
        let multisample = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);
        let depth_stencil = depth_state(desc.depth_format.is_some());
        let blend_attachments = [desc.blend.attachment_state()];
        let color_blend =
            vk::PipelineColorBlendStateCreateInfo::default().attachments(&blend_attachments);
        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic = vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        let color_formats = [desc.color_format];
        let mut rendering = vk::PipelineRenderingCreateInfo::default()
            .color_attachment_formats(&color_formats)
            .depth_attachment_format(desc.depth_format.unwrap_or(vk::Format::UNDEFINED));

        let create_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport)
            .rasterization_state(&rasterization)
            .multisample_state(&multisample)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blend)
            .dynamic_state(&dynamic)
            .layout(layout.handle())
            .push_next(&mut rendering);

        let pipelines = unsafe {
            device
                .handle()
                .create_graphics_pipelines(vk::PipelineCache::null(), &[create_info], None)
                .map_err(|(_, result)| result)?
        };
        let pipeline = pipelines
            .into_iter()
            .next()
            .ok_or_else(|| RhiError::PipelineError("driver returned no pipeline".to_string()))?;

        debug!(
            "Graphics pipeline created ({:?}, depth {:?})",
            desc.color_format, desc.depth_format
        );
        Ok(Self { device, pipeline })
    }

    #[inline]
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_pipeline(self.pipeline, None);
        }
    }
}

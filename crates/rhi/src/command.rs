//! Command recording.
//!
//! A [`CommandPool`] is created per frame slot (and one for uploads) and
//! reset wholesale; each pool hands out one [`CommandBuffer`] that is
//! re-recorded every time the pool is reset. Image barriers are derived from
//! the layout pair through [`TransitionScope::between`].
//!
//! ```no_run
//! use std::sync::Arc;
//! use objview_rhi::device::Device;
//! use objview_rhi::command::{CommandPool, CommandBuffer};
//!
//! # fn example(device: Arc<Device>) -> Result<(), objview_rhi::RhiError> {
//! let pool = CommandPool::new(device.clone(), device.graphics_family())?;
//! let cmd = CommandBuffer::new(device.clone(), &pool)?;
//!
//! pool.reset()?;
//! cmd.begin()?;
//! cmd.end()?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::{trace, warn};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// Transient command pool on one queue family.
pub struct CommandPool {
    device: Arc<Device>,
    pool: vk::CommandPool,
}

impl CommandPool {
    pub fn new(device: Arc<Device>, queue_family_index: u32) -> RhiResult<Self> {
        let create_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(queue_family_index)
            .flags(vk::CommandPoolCreateFlags::TRANSIENT);
        let pool = unsafe { device.handle().create_command_pool(&create_info, None)? };
        trace!("Command pool on family {}", queue_family_index);
        Ok(Self { device, pool })
    }

    /// Recycles every buffer allocated from this pool.
    ///
    /// None of them may still be pending on the GPU.
    pub fn reset(&self) -> RhiResult<()> {
        unsafe {
            self.device
                .handle()
                .reset_command_pool(self.pool, vk::CommandPoolResetFlags::empty())?;
        }
        Ok(())
    }

    fn allocate_primary(&self) -> RhiResult<vk::CommandBuffer> {
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let buffers = unsafe { self.device.handle().allocate_command_buffers(&alloc_info)? };
        buffers
            .into_iter()
            .next()
            .ok_or(RhiError::VulkanError(vk::Result::ERROR_OUT_OF_HOST_MEMORY))
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        unsafe { self.device.handle().destroy_command_pool(self.pool, None) };
    }
}

/// Primary command buffer, freed together with the pool it came from.
pub struct CommandBuffer {
    device: Arc<Device>,
    buffer: vk::CommandBuffer,
}

impl CommandBuffer {
    pub fn new(device: Arc<Device>, pool: &CommandPool) -> RhiResult<Self> {
        let buffer = pool.allocate_primary()?;
        Ok(Self { device, buffer })
    }

    #[inline]
    pub fn handle(&self) -> vk::CommandBuffer {
        self.buffer
    }

    #[inline]
    fn raw(&self) -> &ash::Device {
        self.device.handle()
    }

    /// Starts a one-time-submit recording.
    pub fn begin(&self) -> RhiResult<()> {
        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe { self.raw().begin_command_buffer(self.buffer, &begin_info)? };
        Ok(())
    }

    pub fn end(&self) -> RhiResult<()> {
        unsafe { self.raw().end_command_buffer(self.buffer)? };
        Ok(())
    }

    pub fn begin_rendering(&self, rendering_info: &vk::RenderingInfo) {
        unsafe { self.raw().cmd_begin_rendering(self.buffer, rendering_info) };
    }

    pub fn end_rendering(&self) {
        unsafe { self.raw().cmd_end_rendering(self.buffer) };
    }

    pub fn bind_graphics_pipeline(&self, pipeline: vk::Pipeline) {
        unsafe {
            self.raw()
                .cmd_bind_pipeline(self.buffer, vk::PipelineBindPoint::GRAPHICS, pipeline)
        };
    }

    /// Binds `buffer` at vertex binding 0.
    pub fn bind_vertex_buffer(&self, buffer: vk::Buffer) {
        unsafe { self.raw().cmd_bind_vertex_buffers(self.buffer, 0, &[buffer], &[0]) };
    }

    /// Binds `buffer` as a `u32` index buffer.
    pub fn bind_index_buffer(&self, buffer: vk::Buffer) {
        unsafe {
            self.raw()
                .cmd_bind_index_buffer(self.buffer, buffer, 0, vk::IndexType::UINT32)
        };
    }

    /// Binds `sets` to consecutive graphics set numbers from `first_set`.
    pub fn bind_descriptor_sets(
        &self,
        layout: vk::PipelineLayout,
        first_set: u32,
        sets: &[vk::DescriptorSet],
        dynamic_offsets: &[u32],
    ) {
        unsafe {
            self.raw().cmd_bind_descriptor_sets(
                self.buffer,
                vk::PipelineBindPoint::GRAPHICS,
                layout,
                first_set,
                sets,
                dynamic_offsets,
            )
        };
    }

    /// Viewport and scissor covering all of `extent`, depth range 0..1.
    pub fn set_full_viewport(&self, extent: vk::Extent2D) {
        let viewport = vk::Viewport::default()
            .width(extent.width as f32)
            .height(extent.height as f32)
            .max_depth(1.0);
        let scissor = vk::Rect2D::default().extent(extent);
        unsafe {
            self.raw().cmd_set_viewport(self.buffer, 0, &[viewport]);
            self.raw().cmd_set_scissor(self.buffer, 0, &[scissor]);
        }
    }

    /// One instance of `index_count` indices from `first_index`.
    pub fn draw_indexed(&self, index_count: u32, first_index: u32) {
        unsafe {
            self.raw()
                .cmd_draw_indexed(self.buffer, index_count, 1, first_index, 0, 0)
        };
    }

    /// Copies staged texels into `dst`, which must be in `TRANSFER_DST_OPTIMAL`.
    pub fn copy_buffer_to_image(
        &self,
        src: vk::Buffer,
        dst: vk::Image,
        regions: &[vk::BufferImageCopy],
    ) {
        unsafe {
            self.raw().cmd_copy_buffer_to_image(
                self.buffer,
                src,
                dst,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                regions,
            )
        };
    }

    /// Barrier moving mip 0, layer 0 of `image` from `old_layout` to `new_layout`.
    pub fn transition_image_layout(
        &self,
        image: vk::Image,
        old_layout: vk::ImageLayout,
        new_layout: vk::ImageLayout,
        aspect_mask: vk::ImageAspectFlags,
    ) {
        let scope = TransitionScope::between(old_layout, new_layout);
        let range = vk::ImageSubresourceRange::default()
            .aspect_mask(aspect_mask)
            .level_count(1)
            .layer_count(1);
        let barrier = vk::ImageMemoryBarrier::default()
            .old_layout(old_layout)
            .new_layout(new_layout)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(image)
            .subresource_range(range)
            .src_access_mask(scope.src_access)
            .dst_access_mask(scope.dst_access);

        unsafe {
            self.raw().cmd_pipeline_barrier(
                self.buffer,
                scope.src_stage,
                scope.dst_stage,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[barrier],
            )
        };
    }
}

/// Execution and memory scopes on both sides of a layout transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransitionScope {
    pub src_stage: vk::PipelineStageFlags,
    pub src_access: vk::AccessFlags,
    pub dst_stage: vk::PipelineStageFlags,
    pub dst_access: vk::AccessFlags,
}

impl TransitionScope {
    const FRAGMENT_TESTS: vk::PipelineStageFlags = vk::PipelineStageFlags::from_raw(
        vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS.as_raw()
            | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS.as_raw(),
    );

    /// Scopes for the transitions the viewer records.
    ///
    /// Any other pair gets a full `ALL_COMMANDS` barrier and a warning.
    pub fn between(old_layout: vk::ImageLayout, new_layout: vk::ImageLayout) -> Self {
        use vk::AccessFlags as A;
        use vk::ImageLayout as L;
        use vk::PipelineStageFlags as S;

        let (src_stage, src_access, dst_stage, dst_access) = match (old_layout, new_layout) {
            // Swapchain contents are cleared, so the old layout is discarded
            (L::UNDEFINED, L::COLOR_ATTACHMENT_OPTIMAL) => (
                S::COLOR_ATTACHMENT_OUTPUT,
                A::empty(),
                S::COLOR_ATTACHMENT_OUTPUT,
                A::COLOR_ATTACHMENT_WRITE,
            ),
            (L::COLOR_ATTACHMENT_OPTIMAL, L::PRESENT_SRC_KHR) => (
                S::COLOR_ATTACHMENT_OUTPUT,
                A::COLOR_ATTACHMENT_WRITE,
                S::BOTTOM_OF_PIPE,
                A::empty(),
            ),
            // The previous frame's depth writes must land before this frame clears
            (L::UNDEFINED, L::DEPTH_ATTACHMENT_OPTIMAL) => (
                Self::FRAGMENT_TESTS,
                A::DEPTH_STENCIL_ATTACHMENT_WRITE,
                Self::FRAGMENT_TESTS,
                A::DEPTH_STENCIL_ATTACHMENT_READ | A::DEPTH_STENCIL_ATTACHMENT_WRITE,
            ),
            (L::UNDEFINED, L::TRANSFER_DST_OPTIMAL) => {
                (S::TOP_OF_PIPE, A::empty(), S::TRANSFER, A::TRANSFER_WRITE)
            }
            (L::TRANSFER_DST_OPTIMAL, L::SHADER_READ_ONLY_OPTIMAL) => (
                S::TRANSFER,
                A::TRANSFER_WRITE,
                S::FRAGMENT_SHADER,
                A::SHADER_READ,
            ),
            _ => {
                warn!(
                    "No barrier scope for {:?} -> {:?}, using a full barrier",
                    old_layout, new_layout
                );
                let everything = A::MEMORY_READ | A::MEMORY_WRITE;
                (S::ALL_COMMANDS, everything, S::ALL_COMMANDS, everything)
            }
        };

        Self {
            src_stage,
            src_access,
            dst_stage,
            dst_access,
        }
    }
}

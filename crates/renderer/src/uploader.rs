//! One-shot uploads of static geometry and textures.
//!
//! Geometry lives in host-visible memory that the GPU reads directly, so a
//! static upload is just an allocation plus a copy. Textures need a copy
//! command into device-local memory; those commands are batched in the
//! uploader's own command buffer and executed by [`ResourceUploader::flush`],
//! which also releases the staging memory once the GPU is done with it.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use objview_resources::TextureData;
use objview_rhi::RhiResult;
use objview_rhi::buffer::{Buffer, BufferUsage};
use objview_rhi::command::{CommandBuffer, CommandPool};
use objview_rhi::device::Device;
use objview_rhi::image::{Image, ImageDesc};

use crate::frame_scheduler::{CompletionFence, FrameRing};

/// Records and executes upload work on the graphics queue.
pub struct ResourceUploader {
    device: Arc<Device>,
    cmd: CommandBuffer,
    pool: CommandPool,
    staging: Vec<Buffer>,
    recording: bool,
}

impl ResourceUploader {
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let pool = CommandPool::new(device.clone(), device.graphics_family())?;
        let cmd = CommandBuffer::new(device.clone(), &pool)?;
        Ok(Self {
            device,
            cmd,
            pool,
            staging: Vec::new(),
            recording: false,
        })
    }

    /// Copies `bytes` into a new GPU-readable buffer.
    ///
    /// The data is visible to the GPU immediately; no flush is needed.
    pub fn upload_static(&self, usage: BufferUsage, bytes: &[u8]) -> RhiResult<Buffer> {
        Buffer::new_with_data(self.device.clone(), usage, bytes)
    }

    /// Uploads a 32-bit index buffer, or returns `None` for no indices.
    ///
    /// Meshes whose faces all collapsed still have vertices but nothing to
    /// index, and a zero-sized buffer cannot be created.
    pub fn upload_indices(&self, indices: &[u32]) -> RhiResult<Option<Buffer>> {
        if indices.is_empty() {
            return Ok(None);
        }
        self.upload_static(BufferUsage::Index, bytemuck::cast_slice(indices))
            .map(Some)
    }

    /// Creates a sampled RGBA8 image and records the copy of `texture` into it.
    ///
    /// The image is usable for sampling after the next [`flush`](Self::flush).
    /// On error nothing is recorded.
    pub fn upload_texture(&mut self, texture: &TextureData) -> RhiResult<Image> {
        let image = Image::new(
            self.device.clone(),
            ImageDesc::sampled_rgba8(texture.width, texture.height),
        )?;

        let mut bytes = Vec::with_capacity(texture.pixels.len());
        for row in texture.rows() {
            bytes.extend_from_slice(row);
        }
        let staging = Buffer::new_with_data(self.device.clone(), BufferUsage::Staging, &bytes)?;

        self.ensure_recording()?;
        self.cmd.transition_image_layout(
            image.handle(),
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageAspectFlags::COLOR,
        );
        self.cmd.copy_buffer_to_image(
            staging.handle(),
            image.handle(),
            &[texture_copy_region(texture)],
        );
        self.cmd.transition_image_layout(
            image.handle(),
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            vk::ImageAspectFlags::COLOR,
        );

        self.staging.push(staging);
        debug!("Queued texture upload {}x{}", texture.width, texture.height);
        Ok(image)
    }

    /// Number of staging buffers waiting for a flush.
    #[inline]
    pub fn pending(&self) -> usize {
        self.staging.len()
    }

    /// Submits recorded uploads, waits for the GPU and frees staging memory.
    pub fn flush<F: CompletionFence>(&mut self, ring: &mut FrameRing<F>) -> RhiResult<()> {
        if !self.recording {
            return Ok(());
        }

        self.cmd.end()?;
        self.recording = false;

        let command_buffers = [self.cmd.handle()];
        let submit = vk::SubmitInfo::default().command_buffers(&command_buffers);
        unsafe { self.device.submit_graphics(&[submit], vk::Fence::null())? };

        ring.wait_for_gpu()?;

        debug!("Flushed {} upload(s)", self.staging.len());
        self.staging.clear();
        self.pool.reset()
    }

    fn ensure_recording(&mut self) -> RhiResult<()> {
        if !self.recording {
            self.cmd.begin()?;
            self.recording = true;
        }
        Ok(())
    }
}

/// Copy region for a tightly packed texture.
fn texture_copy_region(texture: &TextureData) -> vk::BufferImageCopy {
    vk::BufferImageCopy::default()
        .buffer_offset(0)
        // Row length is in texels; 0 would also mean tightly packed
        .buffer_row_length(texture.row_pitch / 4)
        .buffer_image_height(texture.height)
        .image_subresource(
            vk::ImageSubresourceLayers::default()
                .aspect_mask(vk::ImageAspectFlags::COLOR)
                .mip_level(0)
                .base_array_layer(0)
                .layer_count(1),
        )
        .image_extent(vk::Extent3D {
            width: texture.width,
            height: texture.height,
            depth: 1,
        })
}

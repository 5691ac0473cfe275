//! Per-(frame, subset) uniform slots in one persistently mapped buffer.
//!
//! The buffer holds `FRAME_COUNT * MAX_SUBSETS` slots. A draw writes its
//! [`SceneConstants`] into the slot for its frame and subset and binds the
//! slot through a dynamic offset, so frames in flight never share bytes.
//! Subset indices past [`MAX_SUBSETS`] wrap around and share a slot with an
//! earlier subset of the same frame; the later write wins for both draws.

use std::sync::Arc;

use ash::vk;

use objview_resources::SceneConstants;
use objview_rhi::RhiResult;
use objview_rhi::buffer::{Buffer, BufferUsage};
use objview_rhi::device::Device;

use crate::frame_scheduler::FRAME_COUNT;

/// Uniform slots reserved per frame.
pub const MAX_SUBSETS: usize = 512;

/// Slot index for `subset` drawn in `frame`.
#[inline]
pub const fn constant_slot(frame: usize, subset: usize) -> usize {
    frame * MAX_SUBSETS + (subset % MAX_SUBSETS)
}

/// Rounds `size` up to a multiple of `alignment` (0 means unaligned).
#[inline]
pub const fn aligned_slot_size(size: u64, alignment: u64) -> u64 {
    if alignment <= 1 {
        size
    } else {
        size.div_ceil(alignment) * alignment
    }
}

/// Host-visible ring of uniform slots.
pub struct ConstantRing {
    buffer: Buffer,
    slot_size: u64,
}

impl ConstantRing {
    /// Allocates slots for every frame, aligned to the device's
    /// `minUniformBufferOffsetAlignment`.
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let alignment = device.adapter().min_uniform_buffer_offset_alignment();
        let slot_size = aligned_slot_size(SceneConstants::size() as u64, alignment);
        let size = slot_size * (FRAME_COUNT * MAX_SUBSETS) as u64;

        let buffer = Buffer::new(device, BufferUsage::Uniform, size)?;
        tracing::debug!(
            "Constant ring: {} slots of {} bytes (alignment {})",
            FRAME_COUNT * MAX_SUBSETS,
            slot_size,
            alignment
        );

        Ok(Self { buffer, slot_size })
    }

    /// Writes `constants` for `subset` in `frame`; returns the dynamic offset to bind.
    pub fn write(&self, frame: usize, subset: usize, constants: &SceneConstants) -> RhiResult<u32> {
        let offset = constant_slot(frame, subset) as u64 * self.slot_size;
        self.buffer.write_data(offset, bytemuck::bytes_of(constants))?;
        Ok(offset as u32)
    }

    #[inline]
    pub fn slot_size(&self) -> u64 {
        self.slot_size
    }

    #[inline]
    pub fn buffer(&self) -> vk::Buffer {
        self.buffer.handle()
    }

    /// Bytes visible to the shader through one binding.
    #[inline]
    pub fn binding_range(&self) -> u64 {
        SceneConstants::size() as u64
    }
}

//! Fixed-capacity table of texture descriptor sets.
//!
//! Set 0 is permanently bound to a 1x1 white image and is used by every
//! material without a texture. A texture registered in slot `n` lives in
//! set `1 + n`. Materials own their [`GpuTexture`]; everything else refers
//! to it only through that slot number.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use objview_resources::TextureData;
use objview_rhi::descriptor::{DescriptorPool, DescriptorSetLayout, write_texture};
use objview_rhi::device::Device;
use objview_rhi::image::Image;
use objview_rhi::sampler::Sampler;
use objview_rhi::{RhiError, RhiResult};

use crate::uploader::ResourceUploader;

/// Texture slots available to one scene.
pub const MAX_TEXTURES: usize = 512;

/// Descriptor set index for a texture slot; `None` selects the fallback set.
#[inline]
pub const fn texture_set_index(slot: Option<usize>) -> usize {
    match slot {
        Some(slot) => 1 + slot,
        None => 0,
    }
}

/// A sampled image registered in the texture table.
pub struct GpuTexture {
    image: Image,
    slot: usize,
}

impl GpuTexture {
    #[inline]
    pub fn slot(&self) -> usize {
        self.slot
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.image.extent()
    }
}

/// A slot held for an image that is still being uploaded.
#[derive(Debug, PartialEq, Eq)]
pub struct TextureSlot(usize);

/// Hands out slots in order until [`MAX_TEXTURES`] are in use.
#[derive(Debug, Default)]
struct SlotAllocator {
    next: usize,
}

impl SlotAllocator {
    fn reserve(&mut self) -> RhiResult<TextureSlot> {
        if self.next >= MAX_TEXTURES {
            return Err(RhiError::CapacityExceeded(format!(
                "texture table holds at most {} textures",
                MAX_TEXTURES
            )));
        }
        self.next += 1;
        Ok(TextureSlot(self.next - 1))
    }
}

/// Descriptor sets for the fallback texture plus [`MAX_TEXTURES`] slots.
pub struct TextureTable {
    device: Arc<Device>,
    pool: DescriptorPool,
    slots: SlotAllocator,
    sampler: Sampler,
    _fallback: Image,
}

impl TextureTable {
    /// Allocates every set up front and records the fallback upload.
    ///
    /// The fallback is sampleable after the uploader's next flush.
    pub fn new(
        device: Arc<Device>,
        layout: &DescriptorSetLayout,
        uploader: &mut ResourceUploader,
    ) -> RhiResult<Self> {
        let set_count = 1 + MAX_TEXTURES as u32;
        let pool = DescriptorPool::with_sets(device.clone(), layout, set_count)?;

        let sampler = Sampler::linear_repeat(device.clone())?;
        let fallback = uploader.upload_texture(&TextureData::solid([255, 255, 255, 255]))?;
        write_texture(
            &device,
            pool.sets()[texture_set_index(None)],
            fallback.view(),
            sampler.handle(),
        );

        debug!("Texture table ready: {} sets", set_count);

        Ok(Self {
            device,
            pool,
            slots: SlotAllocator::default(),
            sampler,
            _fallback: fallback,
        })
    }

    /// Frees every slot for a new scene.
    ///
    /// Must only be called once the GPU no longer uses the previous scene.
    pub fn clear(&mut self) {
        self.slots = SlotAllocator::default();
    }

    /// Takes the next free slot.
    ///
    /// Reserve before recording an upload, so a full table never leaves a
    /// recorded copy without an owner for its image.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::CapacityExceeded`] once [`MAX_TEXTURES`] slots are in use.
    pub fn reserve(&mut self) -> RhiResult<TextureSlot> {
        self.slots.reserve()
    }

    /// Points `slot`'s set at `image`.
    pub fn bind(&self, slot: TextureSlot, image: Image) -> GpuTexture {
        let TextureSlot(slot) = slot;
        write_texture(
            &self.device,
            self.pool.sets()[texture_set_index(Some(slot))],
            image.view(),
            self.sampler.handle(),
        );
        GpuTexture { image, slot }
    }

    /// Set to bind for a material's texture, or the fallback set.
    #[inline]
    pub fn set_for(&self, texture: Option<&GpuTexture>) -> vk::DescriptorSet {
        self.pool.sets()[texture_set_index(texture.map(GpuTexture::slot))]
    }

    #[inline]
    pub fn used_slots(&self) -> usize {
        self.slots.next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_zero_is_reserved() {
        assert_eq!(texture_set_index(None), 0);
        assert_eq!(texture_set_index(Some(0)), 1);
        assert_eq!(texture_set_index(Some(MAX_TEXTURES - 1)), MAX_TEXTURES);
    }

    #[test]
    fn test_slots_run_out_at_capacity() {
        let mut slots = SlotAllocator::default();
        for expected in 0..MAX_TEXTURES {
            assert_eq!(slots.reserve().unwrap(), TextureSlot(expected));
        }
        assert!(matches!(slots.reserve(), Err(RhiError::CapacityExceeded(_))));
        // A refused reservation does not consume anything
        assert_eq!(slots.next, MAX_TEXTURES);
    }
}

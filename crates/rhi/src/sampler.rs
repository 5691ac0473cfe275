//! Texture sampler.

use std::sync::Arc;

use ash::vk;

use crate::device::Device;
use crate::error::RhiResult;

/// Linear-filtered sampler with repeat addressing on every axis.
///
/// Repeat addressing is what makes texture tiling and scrolling wrap.
pub struct Sampler {
    device: Arc<Device>,
    sampler: vk::Sampler,
}

impl Sampler {
    pub fn linear_repeat(device: Arc<Device>) -> RhiResult<Self> {
        let create_info = linear_repeat_info();
        let sampler = unsafe { device.handle().create_sampler(&create_info, None)? };
        Ok(Self { device, sampler })
    }

    #[inline]
    pub fn handle(&self) -> vk::Sampler {
        self.sampler
    }
}

fn linear_repeat_info() -> vk::SamplerCreateInfo<'static> {
    vk::SamplerCreateInfo::default()
        .mag_filter(vk::Filter::LINEAR)
        .min_filter(vk::Filter::LINEAR)
        .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
        .address_mode_u(vk::SamplerAddressMode::REPEAT)
        .address_mode_v(vk::SamplerAddressMode::REPEAT)
        .address_mode_w(vk::SamplerAddressMode::REPEAT)
        .min_lod(0.0)
        .max_lod(vk::LOD_CLAMP_NONE)
}

impl Drop for Sampler {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_sampler(self.sampler, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sampler_wraps_and_filters_linearly() {
        let info = linear_repeat_info();
        assert_eq!(info.mag_filter, vk::Filter::LINEAR);
        assert_eq!(info.min_filter, vk::Filter::LINEAR);
        assert_eq!(info.address_mode_u, vk::SamplerAddressMode::REPEAT);
        assert_eq!(info.address_mode_v, vk::SamplerAddressMode::REPEAT);
        assert_eq!(info.address_mode_w, vk::SamplerAddressMode::REPEAT);
    }
}

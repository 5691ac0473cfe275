//! Depth buffer sized to the presentation surface.
//!
//! The buffer is cleared every frame, so it is transitioned from
//! `UNDEFINED` each time and its previous contents never matter.

use std::sync::Arc;

use ash::vk;
use tracing::info;

use objview_rhi::RhiResult;
use objview_rhi::command::CommandBuffer;
use objview_rhi::device::Device;
use objview_rhi::image::{Image, ImageDesc};

/// Depth format used by the pipeline and the depth buffer.
pub const DEPTH_FORMAT: vk::Format = vk::Format::D32_SFLOAT;

/// Depth attachment matching the swapchain extent.
pub struct DepthBuffer {
    image: Image,
}

impl DepthBuffer {
    /// Creates a [`DEPTH_FORMAT`] depth buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if either dimension is zero or allocation fails.
    pub fn new(device: Arc<Device>, extent: vk::Extent2D) -> RhiResult<Self> {
        let image = Image::new(
            device,
            ImageDesc::depth(extent.width, extent.height, DEPTH_FORMAT),
        )?;
        info!(
            "Created depth buffer: {}x{} ({:?})",
            extent.width, extent.height, DEPTH_FORMAT
        );
        Ok(Self { image })
    }

    #[inline]
    pub fn view(&self) -> vk::ImageView {
        self.image.view()
    }

    /// Records the transition into the depth attachment layout.
    pub fn prepare_for_rendering(&self, cmd: &CommandBuffer) {
        cmd.transition_image_layout(
            self.image.handle(),
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL,
            vk::ImageAspectFlags::DEPTH,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_format_matches_image_desc() {
        let desc = ImageDesc::depth(64, 32, DEPTH_FORMAT);
        assert_eq!(desc.format, vk::Format::D32_SFLOAT);
        assert_eq!(desc.aspect, vk::ImageAspectFlags::DEPTH);
        assert!(desc.usage.contains(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT));
    }
}

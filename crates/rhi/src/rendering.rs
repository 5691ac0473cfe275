//! Attachments for a dynamic rendering pass.
//!
//! Each frame renders one pass into the swapchain image with an optional
//! depth target. Both are cleared on load; color is stored for presentation
//! and depth is discarded.

use ash::vk;

/// Depth clear value; the far plane under a `LESS` test.
pub const CLEAR_DEPTH: f32 = 1.0;

fn color_target(view: vk::ImageView, clear: [f32; 4]) -> vk::RenderingAttachmentInfo<'static> {
    vk::RenderingAttachmentInfo::default()
        .image_view(view)
        .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::STORE)
        .clear_value(vk::ClearValue {
            color: vk::ClearColorValue { float32: clear },
        })
}

fn depth_target(view: vk::ImageView) -> vk::RenderingAttachmentInfo<'static> {
    vk::RenderingAttachmentInfo::default()
        .image_view(view)
        .image_layout(vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::DONT_CARE)
        .clear_value(vk::ClearValue {
            depth_stencil: vk::ClearDepthStencilValue {
                depth: CLEAR_DEPTH,
                stencil: 0,
            },
        })
}

/// Attachment infos kept alive for one `vkCmdBeginRendering` call.
pub struct RenderingPass {
    color: [vk::RenderingAttachmentInfo<'static>; 1],
    depth: Option<vk::RenderingAttachmentInfo<'static>>,
    extent: vk::Extent2D,
}

impl RenderingPass {
    /// A pass over all of `extent`, clearing `color_view` to `clear_color`.
    pub fn new(
        extent: vk::Extent2D,
        color_view: vk::ImageView,
        clear_color: [f32; 4],
        depth_view: Option<vk::ImageView>,
    ) -> Self {
        Self {
            color: [color_target(color_view, clear_color)],
            depth: depth_view.map(depth_target),
            extent,
        }
    }

    /// Rendering info borrowing this pass's attachments.
    pub fn info(&self) -> vk::RenderingInfo<'_> {
        let info = vk::RenderingInfo::default()
            .render_area(vk::Rect2D::default().extent(self.extent))
            .layer_count(1)
            .color_attachments(&self.color);
        match &self.depth {
            Some(depth) => info.depth_attachment(depth),
            None => info,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXTENT: vk::Extent2D = vk::Extent2D {
        width: 1280,
        height: 720,
    };

    #[test]
    fn test_color_is_cleared_and_kept() {
        let info = color_target(vk::ImageView::null(), [0.1, 0.1, 0.15, 1.0]);
        assert_eq!(info.load_op, vk::AttachmentLoadOp::CLEAR);
        assert_eq!(info.store_op, vk::AttachmentStoreOp::STORE);
        assert_eq!(info.image_layout, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
        let clear = unsafe { info.clear_value.color.float32 };
        assert_eq!(clear, [0.1, 0.1, 0.15, 1.0]);
    }

    #[test]
    fn test_depth_is_cleared_to_far_plane_and_dropped() {
        let info = depth_target(vk::ImageView::null());
        assert_eq!(info.load_op, vk::AttachmentLoadOp::CLEAR);
        assert_eq!(info.store_op, vk::AttachmentStoreOp::DONT_CARE);
        let depth = unsafe { info.clear_value.depth_stencil.depth };
        assert_eq!(depth, CLEAR_DEPTH);
    }

    #[test]
    fn test_pass_covers_extent() {
        let pass = RenderingPass::new(EXTENT, vk::ImageView::null(), [0.0; 4], Some(vk::ImageView::null()));
        let info = pass.info();
        assert_eq!(info.render_area.offset.x, 0);
        assert_eq!(info.render_area.extent.width, 1280);
        assert_eq!(info.render_area.extent.height, 720);
        assert_eq!(info.layer_count, 1);
        assert_eq!(info.color_attachment_count, 1);
        assert!(!info.p_depth_attachment.is_null());
    }

    #[test]
    fn test_pass_without_depth() {
        let pass = RenderingPass::new(EXTENT, vk::ImageView::null(), [0.0; 4], None);
        assert!(pass.info().p_depth_attachment.is_null());
    }
}

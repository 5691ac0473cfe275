//! Presentation swapchain.
//!
//! The viewer asks for a fixed number of images (clamped to the surface
//! limits), prefers an 8-bit UNORM format and always presents with FIFO, so
//! presentation is vsync-paced and available on every driver.
//!
//! Recreation does not wait on the GPU. Callers drain in-flight frames before
//! calling [`Swapchain::recreate`].

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info, warn};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::image::create_view;
use crate::instance::Instance;

const PREFERRED_FORMATS: [vk::Format; 2] =
    [vk::Format::B8G8R8A8_UNORM, vk::Format::R8G8B8A8_UNORM];

/// Parameters chosen for one swapchain generation.
#[derive(Debug, Clone, Copy)]
struct Generation {
    surface_format: vk::SurfaceFormatKHR,
    extent: vk::Extent2D,
    image_count: u32,
}

impl Generation {
    fn choose(
        capabilities: &vk::SurfaceCapabilitiesKHR,
        formats: &[vk::SurfaceFormatKHR],
        requested_extent: vk::Extent2D,
        requested_images: u32,
    ) -> RhiResult<Self> {
        let surface_format = pick_format(formats).ok_or_else(|| {
            RhiError::SwapchainError("surface reports no formats".to_string())
        })?;

        // u32::MAX means the surface size follows the swapchain
        let extent = if capabilities.current_extent.width == u32::MAX {
            vk::Extent2D {
                width: requested_extent.width.clamp(
                    capabilities.min_image_extent.width,
                    capabilities.max_image_extent.width,
                ),
                height: requested_extent.height.clamp(
                    capabilities.min_image_extent.height,
                    capabilities.max_image_extent.height,
                ),
            }
        } else {
            capabilities.current_extent
        };

        let mut image_count = requested_images.max(capabilities.min_image_count);
        if capabilities.max_image_count != 0 {
            image_count = image_count.min(capabilities.max_image_count);
        }

        Ok(Self {
            surface_format,
            extent,
            image_count,
        })
    }
}

fn pick_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    let preferred = PREFERRED_FORMATS.iter().find_map(|&wanted| {
        formats.iter().copied().find(|f| {
            f.format == wanted && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
    });

    preferred.or_else(|| {
        let first = formats.first().copied();
        if let Some(format) = first {
            warn!("No preferred surface format, using {:?}", format.format);
        }
        first
    })
}

/// Swapchain plus one color view per image.
pub struct Swapchain {
    device: Arc<Device>,
    loader: ash::khr::swapchain::Device,
    handle: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    views: Vec<vk::ImageView>,
    format: vk::Format,
    extent: vk::Extent2D,
    requested_images: u32,
}

impl Swapchain {
    /// Creates a swapchain with `requested_images` images at `extent`.
    ///
    /// # Errors
    ///
    /// Fails when surface queries fail, the surface has no formats, or
    /// swapchain or view creation is rejected.
    pub fn new(
        instance: &Instance,
        device: Arc<Device>,
        surface: vk::SurfaceKHR,
        surface_loader: &ash::khr::surface::Instance,
        extent: vk::Extent2D,
        requested_images: u32,
    ) -> RhiResult<Self> {
        Self::build(
            instance,
            device,
            surface,
            surface_loader,
            extent,
            requested_images,
            vk::SwapchainKHR::null(),
        )
    }

    fn build(
        instance: &Instance,
        device: Arc<Device>,
        surface: vk::SurfaceKHR,
        surface_loader: &ash::khr::surface::Instance,
        requested_extent: vk::Extent2D,
        requested_images: u32,
        retired: vk::SwapchainKHR,
    ) -> RhiResult<Self> {
        let physical = device.physical_device();
        let (capabilities, formats) = unsafe {
            (
                surface_loader.get_physical_device_surface_capabilities(physical, surface)?,
                surface_loader.get_physical_device_surface_formats(physical, surface)?,
            )
        };
        let generation =
            Generation::choose(&capabilities, &formats, requested_extent, requested_images)?;

        info!(
            "Swapchain {}x{} {:?}, {} images",
            generation.extent.width,
            generation.extent.height,
            generation.surface_format.format,
            generation.image_count
        );

        let graphics = device.graphics_family();
        let present = device.present_family();
        let families = [graphics, present];

        let mut create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface)
            .min_image_count(generation.image_count)
            .image_format(generation.surface_format.format)
            .image_color_space(generation.surface_format.color_space)
            .image_extent(generation.extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(vk::PresentModeKHR::FIFO)
            .clipped(true)
            .old_swapchain(retired);
        if graphics != present {
            create_info = create_info
                .image_sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(&families);
        }

        let loader = ash::khr::swapchain::Device::new(instance.handle(), device.handle());
        let handle = unsafe { loader.create_swapchain(&create_info, None)? };

        // Drop releases whatever has been created if a later step fails
        let mut swapchain = Self {
            device,
            loader,
            handle,
            images: Vec::new(),
            views: Vec::new(),
            format: generation.surface_format.format,
            extent: generation.extent,
            requested_images,
        };

        swapchain.images = unsafe { swapchain.loader.get_swapchain_images(handle)? };
        for &image in &swapchain.images {
            let view = create_view(
                &swapchain.device,
                image,
                swapchain.format,
                vk::ImageAspectFlags::COLOR,
            )?;
            swapchain.views.push(view);
        }

        Ok(swapchain)
    }

    /// Replaces the swapchain with one sized for `extent`.
    ///
    /// No submitted work may still reference the current images. The old
    /// swapchain is retired either way; on failure it stays owned by `self`
    /// and is released on drop.
    pub fn recreate(
        &mut self,
        instance: &Instance,
        surface: vk::SurfaceKHR,
        surface_loader: &ash::khr::surface::Instance,
        extent: vk::Extent2D,
    ) -> RhiResult<()> {
        *self = Self::build(
            instance,
            self.device.clone(),
            surface,
            surface_loader,
            extent,
            self.requested_images,
            self.handle,
        )?;
        Ok(())
    }

    /// Acquires an image, signaling `semaphore` when it may be rendered to.
    ///
    /// Returns the image index and whether the swapchain is suboptimal.
    /// `ERROR_OUT_OF_DATE_KHR` is returned as is.
    pub fn acquire_next_image(&self, semaphore: vk::Semaphore) -> Result<(u32, bool), vk::Result> {
        unsafe {
            self.loader
                .acquire_next_image(self.handle, u64::MAX, semaphore, vk::Fence::null())
        }
    }

    /// Presents `image_index` once `wait_semaphore` is signaled.
    ///
    /// Returns whether the swapchain is suboptimal.
    pub fn present(
        &self,
        queue: vk::Queue,
        image_index: u32,
        wait_semaphore: vk::Semaphore,
    ) -> Result<bool, vk::Result> {
        let swapchains = [self.handle];
        let indices = [image_index];
        let waits = [wait_semaphore];
        let info = vk::PresentInfoKHR::default()
            .wait_semaphores(&waits)
            .swapchains(&swapchains)
            .image_indices(&indices);

        unsafe { self.loader.queue_present(queue, &info) }
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    #[inline]
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    #[inline]
    pub fn image(&self, index: usize) -> vk::Image {
        self.images[index]
    }

    #[inline]
    pub fn image_view(&self, index: usize) -> vk::ImageView {
        self.views[index]
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            for &view in &self.views {
                self.device.handle().destroy_image_view(view, None);
            }
            self.loader.destroy_swapchain(self.handle, None);
        }
        debug!(
            "Swapchain released ({}x{})",
            self.extent.width, self.extent.height
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn srgb(format: vk::Format) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }
    }

    fn capabilities(min_images: u32, max_images: u32) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min_images,
            max_image_count: max_images,
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: 1,
                height: 1,
            },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 2160,
            },
            ..Default::default()
        }
    }

    const HD: vk::Extent2D = vk::Extent2D {
        width: 1280,
        height: 720,
    };

    #[test]
    fn test_unorm_formats_are_preferred() {
        let formats = [
            srgb(vk::Format::B8G8R8A8_SRGB),
            srgb(vk::Format::R8G8B8A8_UNORM),
            srgb(vk::Format::B8G8R8A8_UNORM),
        ];
        assert_eq!(
            pick_format(&formats).map(|f| f.format),
            Some(vk::Format::B8G8R8A8_UNORM)
        );

        let formats = [srgb(vk::Format::B8G8R8A8_SRGB), srgb(vk::Format::R8G8B8A8_UNORM)];
        assert_eq!(
            pick_format(&formats).map(|f| f.format),
            Some(vk::Format::R8G8B8A8_UNORM)
        );
    }

    #[test]
    fn test_unknown_formats_fall_back_to_first() {
        let formats = [srgb(vk::Format::A2B10G10R10_UNORM_PACK32)];
        assert_eq!(
            pick_format(&formats).map(|f| f.format),
            Some(vk::Format::A2B10G10R10_UNORM_PACK32)
        );
        assert!(pick_format(&[]).is_none());
    }

    #[test]
    fn test_no_formats_is_an_error() {
        let result = Generation::choose(&capabilities(2, 3), &[], HD, 2);
        assert!(matches!(result, Err(RhiError::SwapchainError(_))));
    }

    #[test]
    fn test_fixed_surface_extent_wins() {
        let mut caps = capabilities(2, 3);
        caps.current_extent = vk::Extent2D {
            width: 800,
            height: 600,
        };
        let generation =
            Generation::choose(&caps, &[srgb(vk::Format::B8G8R8A8_UNORM)], HD, 2).unwrap();
        assert_eq!(generation.extent, caps.current_extent);
    }

    #[test]
    fn test_requested_extent_is_clamped() {
        let huge = vk::Extent2D {
            width: 8000,
            height: 0,
        };
        let generation =
            Generation::choose(&capabilities(2, 3), &[srgb(vk::Format::B8G8R8A8_UNORM)], huge, 2)
                .unwrap();
        assert_eq!(
            generation.extent,
            vk::Extent2D {
                width: 4096,
                height: 1
            }
        );
    }

    #[test]
    fn test_image_count_respects_limits() {
        let formats = [srgb(vk::Format::B8G8R8A8_UNORM)];
        let count = |min, max| {
            Generation::choose(&capabilities(min, max), &formats, HD, 2)
                .unwrap()
                .image_count
        };
        assert_eq!(count(2, 8), 2);
        assert_eq!(count(3, 8), 3);
        assert_eq!(count(1, 1), 1);
        // Zero maximum means unbounded
        assert_eq!(count(1, 0), 2);
    }
}

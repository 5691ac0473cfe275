//! GPU-only 2D images with a single mip level and array layer.
//!
//! [`Image`] backs both the depth buffer and sampled textures. Memory comes
//! from the device's gpu-allocator instance and is released on drop.

use std::sync::Arc;

use ash::vk;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use tracing::{debug, error};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// Parameters for [`Image::new`].
#[derive(Clone, Copy, Debug)]
pub struct ImageDesc {
    pub width: u32,
    pub height: u32,
    pub format: vk::Format,
    pub usage: vk::ImageUsageFlags,
    /// Aspect used for the image view and for layout transitions.
    pub aspect: vk::ImageAspectFlags,
    /// Allocation name shown in allocator reports.
    pub name: &'static str,
}

impl ImageDesc {
    /// A depth attachment of the given size.
    pub fn depth(width: u32, height: u32, format: vk::Format) -> Self {
        Self {
            width,
            height,
            format,
            usage: vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            aspect: vk::ImageAspectFlags::DEPTH,
            name: "depth_buffer",
        }
    }

    /// An RGBA8 image filled by a transfer and then sampled.
    pub fn sampled_rgba8(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            format: vk::Format::R8G8B8A8_UNORM,
            usage: vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED,
            aspect: vk::ImageAspectFlags::COLOR,
            name: "texture",
        }
    }
}

/// A device-local image and its view.
///
/// Resources are destroyed view first, then image, then memory.
pub struct Image {
    device: Arc<Device>,
    image: vk::Image,
    view: vk::ImageView,
    allocation: Option<Allocation>,
    desc: ImageDesc,
}

impl Image {
    /// Creates the image, binds GPU-only memory and creates a view.
    ///
    /// # Errors
    ///
    /// Returns an error if either dimension is zero or any Vulkan or
    /// allocation call fails. Partially created objects are released.
    pub fn new(device: Arc<Device>, desc: ImageDesc) -> RhiResult<Self> {
        if desc.width == 0 || desc.height == 0 {
            return Err(RhiError::UploadError(format!(
                "{} dimensions must be greater than 0 (got {}x{})",
                desc.name, desc.width, desc.height
            )));
        }

        let image_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(desc.format)
            .extent(vk::Extent3D {
                width: desc.width,
                height: desc.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(desc.usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let image = unsafe { device.handle().create_image(&image_info, None)? };

        let requirements = unsafe { device.handle().get_image_memory_requirements(image) };

        let allocation = device.lock_allocator().and_then(|mut allocator| {
            allocator
                .allocate(&AllocationCreateDesc {
                    name: desc.name,
                    requirements,
                    location: MemoryLocation::GpuOnly,
                    linear: false,
                    allocation_scheme: AllocationScheme::GpuAllocatorManaged,
                })
                .map_err(RhiError::from)
        });

        let allocation = match allocation {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { device.handle().destroy_image(image, None) };
                return Err(e);
            }
        };

        // From here on Drop handles cleanup; a null view is skipped by Vulkan
        let mut this = Self {
            device,
            image,
            view: vk::ImageView::null(),
            allocation: Some(allocation),
            desc,
        };

        if let Some(allocation) = &this.allocation {
            unsafe {
                this.device.handle().bind_image_memory(
                    this.image,
                    allocation.memory(),
                    allocation.offset(),
                )?;
            }
        }

        this.view = create_view(&this.device, this.image, desc.format, desc.aspect)?;

        debug!(
            "Created {} image: {}x{} ({:?})",
            desc.name, desc.width, desc.height, desc.format
        );

        Ok(this)
    }

    #[inline]
    pub fn handle(&self) -> vk::Image {
        self.image
    }

    #[inline]
    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.desc.format
    }

    #[inline]
    pub fn aspect(&self) -> vk::ImageAspectFlags {
        self.desc.aspect
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        vk::Extent2D {
            width: self.desc.width,
            height: self.desc.height,
        }
    }
}

/// Creates a 2D view over mip 0, layer 0 of `image`.
pub(crate) fn create_view(
    device: &Device,
    image: vk::Image,
    format: vk::Format,
    aspect: vk::ImageAspectFlags,
) -> RhiResult<vk::ImageView> {
    let view_info = vk::ImageViewCreateInfo::default()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
        .subresource_range(
            vk::ImageSubresourceRange::default()
                .aspect_mask(aspect)
                .level_count(1)
                .layer_count(1),
        );

    Ok(unsafe { device.handle().create_image_view(&view_info, None)? })
}

impl Drop for Image {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_image_view(self.view, None);
            self.device.handle().destroy_image(self.image, None);
        }

        if let Some(allocation) = self.allocation.take() {
            match self.device.lock_allocator() {
                Ok(mut allocator) => {
                    if let Err(e) = allocator.free(allocation) {
                        error!("Failed to free {} allocation: {:?}", self.desc.name, e);
                    }
                }
                Err(e) => error!("Failed to free {} allocation: {}", self.desc.name, e),
            }
        }
    }
}

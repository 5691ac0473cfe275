//! Host-visible GPU buffers.
//!
//! Vertex, index, uniform and staging buffers all live in `CpuToGpu` memory
//! and stay persistently mapped. Static geometry is written once and read by
//! the GPU in place; there is no device-local copy.
//!
//! ```no_run
//! use std::sync::Arc;
//! use objview_rhi::device::Device;
//! use objview_rhi::buffer::{Buffer, BufferUsage};
//!
//! # fn example(device: Arc<Device>) -> Result<(), objview_rhi::RhiError> {
//! let indices: [u32; 3] = [0, 1, 2];
//! let index_buffer =
//!     Buffer::new_with_data(device, BufferUsage::Index, bytemuck::cast_slice(&indices))?;
//! # Ok(())
//! # }
//! ```

use std::ops::Range;
use std::sync::Arc;

use ash::vk;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use tracing::{error, trace};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferUsage {
    Vertex,
    Index,
    /// Ring of per-draw constant slots.
    Uniform,
    /// Source of buffer-to-image copies.
    Staging,
}

impl BufferUsage {
    fn flags(self) -> vk::BufferUsageFlags {
        match self {
            Self::Vertex => vk::BufferUsageFlags::VERTEX_BUFFER,
            Self::Index => vk::BufferUsageFlags::INDEX_BUFFER,
            Self::Uniform => vk::BufferUsageFlags::UNIFORM_BUFFER,
            Self::Staging => vk::BufferUsageFlags::TRANSFER_SRC,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Vertex => "vertex buffer",
            Self::Index => "index buffer",
            Self::Uniform => "uniform ring",
            Self::Staging => "staging buffer",
        }
    }
}

/// Byte range `offset..offset + len` if it lies inside a buffer of `size` bytes.
fn checked_range(size: vk::DeviceSize, offset: vk::DeviceSize, len: usize) -> RhiResult<Range<usize>> {
    offset
        .checked_add(len as vk::DeviceSize)
        .filter(|&end| end <= size)
        .map(|end| offset as usize..end as usize)
        .ok_or_else(|| {
            RhiError::UploadError(format!(
                "{} bytes at offset {} overrun a {}-byte buffer",
                len, offset, size
            ))
        })
}

/// A persistently mapped buffer and its allocation.
pub struct Buffer {
    device: Arc<Device>,
    buffer: vk::Buffer,
    allocation: Option<Allocation>,
    size: vk::DeviceSize,
    usage: BufferUsage,
}

impl Buffer {
    /// Creates an uninitialized buffer of `size` bytes.
    ///
    /// # Errors
    ///
    /// A zero `size` is an [`RhiError::UploadError`]; creation, allocation
    /// and binding failures are forwarded.
    pub fn new(device: Arc<Device>, usage: BufferUsage, size: vk::DeviceSize) -> RhiResult<Self> {
        if size == 0 {
            return Err(RhiError::UploadError(format!("empty {}", usage.label())));
        }

        let info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage.flags())
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let buffer = unsafe { device.handle().create_buffer(&info, None)? };
        let requirements = unsafe { device.handle().get_buffer_memory_requirements(buffer) };

        let allocation = device.lock_allocator().and_then(|mut allocator| {
            Ok(allocator.allocate(&AllocationCreateDesc {
                name: usage.label(),
                requirements,
                location: MemoryLocation::CpuToGpu,
                linear: true,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })?)
        });
        let allocation = match allocation {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { device.handle().destroy_buffer(buffer, None) };
                return Err(e);
            }
        };
        let (memory, memory_offset) = unsafe { (allocation.memory(), allocation.offset()) };

        // Owned from here on, so Drop releases both on a failed bind
        let buffer = Self {
            device,
            buffer,
            allocation: Some(allocation),
            size,
            usage,
        };
        unsafe {
            buffer
                .device
                .handle()
                .bind_buffer_memory(buffer.buffer, memory, memory_offset)?
        };

        trace!("{}: {} bytes", usage.label(), size);
        Ok(buffer)
    }

    /// Creates a buffer holding exactly `data`.
    pub fn new_with_data(device: Arc<Device>, usage: BufferUsage, data: &[u8]) -> RhiResult<Self> {
        let buffer = Self::new(device, usage, data.len() as vk::DeviceSize)?;
        buffer.write_data(0, data)?;
        Ok(buffer)
    }

    /// Copies `data` into the mapping at `offset`.
    ///
    /// The caller keeps the GPU off the written range until the write is done.
    pub fn write_data(&self, offset: vk::DeviceSize, data: &[u8]) -> RhiResult<()> {
        let range = checked_range(self.size, offset, data.len())?;
        let base = self.mapped_base()?;
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), base.add(range.start), range.len());
        }
        Ok(())
    }

    /// Copies `len` bytes at `offset` out of the mapping.
    pub fn read_data(&self, offset: vk::DeviceSize, len: usize) -> RhiResult<Vec<u8>> {
        let range = checked_range(self.size, offset, len)?;
        let base = self.mapped_base()?;
        let mut out = vec![0u8; range.len()];
        unsafe {
            std::ptr::copy_nonoverlapping(base.add(range.start), out.as_mut_ptr(), range.len());
        }
        Ok(out)
    }

    fn mapped_base(&self) -> RhiResult<*mut u8> {
        self.allocation
            .as_ref()
            .and_then(Allocation::mapped_ptr)
            .map(|ptr| ptr.as_ptr().cast::<u8>())
            .ok_or_else(|| RhiError::UploadError(format!("{} is not mapped", self.usage.label())))
    }

    #[inline]
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    #[inline]
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe { self.device.handle().destroy_buffer(self.buffer, None) };

        let Some(allocation) = self.allocation.take() else {
            return;
        };
        match self.device.lock_allocator() {
            Ok(mut allocator) => {
                if let Err(e) = allocator.free(allocation) {
                    error!("Freeing {} failed: {}", self.usage.label(), e);
                }
            }
            Err(e) => error!("Leaking {}: {}", self.usage.label(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_flags() {
        assert_eq!(BufferUsage::Vertex.flags(), vk::BufferUsageFlags::VERTEX_BUFFER);
        assert_eq!(BufferUsage::Index.flags(), vk::BufferUsageFlags::INDEX_BUFFER);
        assert_eq!(BufferUsage::Uniform.flags(), vk::BufferUsageFlags::UNIFORM_BUFFER);
        assert_eq!(BufferUsage::Staging.flags(), vk::BufferUsageFlags::TRANSFER_SRC);
    }

    #[test]
    fn test_range_inside_buffer() {
        assert_eq!(checked_range(1024, 512, 400).unwrap(), 512..912);
        assert_eq!(checked_range(1024, 0, 1024).unwrap(), 0..1024);
        assert_eq!(checked_range(16, 16, 0).unwrap(), 16..16);
    }

    #[test]
    fn test_range_overrun_is_rejected() {
        assert!(matches!(
            checked_range(1024, 1000, 25),
            Err(RhiError::UploadError(_))
        ));
        assert!(checked_range(16, u64::MAX, 1).is_err());
    }
}

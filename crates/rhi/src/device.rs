//! Logical device, queues and the GPU memory allocator.
//!
//! [`Device`] is shared as `Arc<Device>` by every object that owns Vulkan
//! handles, so it is destroyed last. Buffers and images allocate through the
//! `gpu-allocator` instance it holds behind a mutex.
//!
//! ```no_run
//! use objview_rhi::instance::Instance;
//! use objview_rhi::physical_device::rank_adapters;
//! use objview_rhi::device::Device;
//!
//! let instance = Instance::new(false, &[]).expect("Vulkan loader");
//! let adapters = rank_adapters(instance.handle(), None).expect("no usable GPU");
//! let device = Device::create(&instance, &adapters, false).expect("device");
//! let _queue = device.graphics_queue();
//! ```

use std::ffi::{CStr, c_char};
use std::mem::ManuallyDrop;
use std::sync::{Arc, Mutex, MutexGuard};

use ash::vk;
use gpu_allocator::AllocationError;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use tracing::{debug, error, info, warn};

use crate::error::{RhiError, RhiResult};
use crate::instance::Instance;
use crate::physical_device::Adapter;

/// Device extensions to enable; only presentation needs any.
fn device_extensions(presentation: bool) -> &'static [&'static CStr] {
    const PRESENT: &[&CStr] = &[ash::khr::swapchain::NAME];
    if presentation { PRESENT } else { &[] }
}

pub struct Device {
    device: ash::Device,
    adapter: Adapter,
    allocator: ManuallyDrop<Mutex<Allocator>>,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
}

impl Device {
    /// Creates a device on the first adapter in `adapters` that accepts it.
    ///
    /// Failures on one adapter are logged and the next one is tried.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::NoSuitableGpu`] when every adapter failed.
    pub fn create(
        instance: &Instance,
        adapters: &[Adapter],
        presentation: bool,
    ) -> RhiResult<Arc<Self>> {
        adapters
            .iter()
            .find_map(|adapter| match Self::on_adapter(instance, adapter, presentation) {
                Ok(device) => Some(device),
                Err(e) => {
                    warn!("No device on '{}': {}", adapter.device_name(), e);
                    None
                }
            })
            .ok_or(RhiError::NoSuitableGpu)
    }

    /// Creates the device with timeline semaphores and dynamic rendering enabled.
    fn on_adapter(
        instance: &Instance,
        adapter: &Adapter,
        presentation: bool,
    ) -> RhiResult<Arc<Self>> {
        let families = adapter.queues.unique();
        let priorities = [1.0f32];
        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = families
            .iter()
            .map(|&family| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(family)
                    .queue_priorities(&priorities)
            })
            .collect();

        let extensions: Vec<*const c_char> = device_extensions(presentation)
            .iter()
            .map(|name| name.as_ptr())
            .collect();
        let mut vulkan12 = vk::PhysicalDeviceVulkan12Features::default().timeline_semaphore(true);
        let mut vulkan13 = vk::PhysicalDeviceVulkan13Features::default().dynamic_rendering(true);

        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&extensions)
            .push_next(&mut vulkan12)
            .push_next(&mut vulkan13);

        let device = unsafe {
            instance
                .handle()
                .create_device(adapter.handle, &create_info, None)?
        };

        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: instance.handle().clone(),
            device: device.clone(),
            physical_device: adapter.handle,
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        });
        let allocator = match allocator {
            Ok(allocator) => allocator,
            Err(e) => {
                unsafe { device.destroy_device(None) };
                return Err(e.into());
            }
        };

        let graphics_queue = unsafe { device.get_device_queue(adapter.queues.graphics, 0) };
        let present_queue = unsafe { device.get_device_queue(adapter.queues.present, 0) };

        info!(
            "Device created on '{}' ({}), queue families {:?}",
            adapter.device_name(),
            adapter.kind(),
            families
        );

        Ok(Arc::new(Self {
            device,
            adapter: adapter.clone(),
            allocator: ManuallyDrop::new(Mutex::new(allocator)),
            graphics_queue,
            present_queue,
        }))
    }

    #[inline]
    pub fn handle(&self) -> &ash::Device {
        &self.device
    }

    #[inline]
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.adapter.handle
    }

    #[inline]
    pub fn adapter(&self) -> &Adapter {
        &self.adapter
    }

    #[inline]
    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    #[inline]
    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    #[inline]
    pub fn graphics_family(&self) -> u32 {
        self.adapter.queues.graphics
    }

    #[inline]
    pub fn present_family(&self) -> u32 {
        self.adapter.queues.present
    }

    /// Locks the allocator; a poisoned lock becomes an allocator error.
    pub fn lock_allocator(&self) -> RhiResult<MutexGuard<'_, Allocator>> {
        self.allocator.lock().map_err(|_| {
            RhiError::AllocatorError(AllocationError::Internal(
                "allocator mutex poisoned".to_string(),
            ))
        })
    }

    pub fn wait_idle(&self) -> RhiResult<()> {
        unsafe { self.device.device_wait_idle()? };
        Ok(())
    }

    /// Submits to the graphics queue.
    ///
    /// # Safety
    ///
    /// Every command buffer and semaphore referenced by `submits` must be
    /// valid, and `fence` must be null or unsignaled.
    pub unsafe fn submit_graphics(
        &self,
        submits: &[vk::SubmitInfo],
        fence: vk::Fence,
    ) -> RhiResult<()> {
        unsafe {
            self.device
                .queue_submit(self.graphics_queue, submits, fence)?
        };
        Ok(())
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        if let Err(e) = self.wait_idle() {
            error!("Device wait before destruction failed: {}", e);
        }
        unsafe {
            // Frees its memory blocks through the device
            ManuallyDrop::drop(&mut self.allocator);
            self.device.destroy_device(None);
        }
        debug!("Device destroyed");
    }
}

// SAFETY: ash::Device is Send + Sync, queues are plain handles and the
// allocator sits behind a Mutex. Queue submission is externally
// synchronized by the renderer owning all submits.
unsafe impl Send for Device {}
unsafe impl Sync for Device {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swapchain_extension_only_for_presentation() {
        assert_eq!(device_extensions(true), &[ash::khr::swapchain::NAME]);
        assert!(device_extensions(false).is_empty());
    }

    #[test]
    fn test_device_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Device>();
    }
}

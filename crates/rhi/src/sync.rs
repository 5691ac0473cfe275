//! Binary and timeline semaphores.
//!
//! Binary [`Semaphore`]s order acquire, submit and present on the GPU.
//! The [`Timeline`] is the frame fence: the graphics queue signals
//! increasing values and the CPU waits for the value it assigned a frame.
//!
//! ```no_run
//! use std::sync::Arc;
//! use objview_rhi::device::Device;
//! use objview_rhi::sync::Timeline;
//!
//! # fn example(device: Arc<Device>) -> Result<(), objview_rhi::RhiError> {
//! let timeline = Timeline::new(device.clone(), 0)?;
//! timeline.signal_on_queue(device.graphics_queue(), 1)?;
//! timeline.wait(1, u64::MAX)?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;

use crate::device::Device;
use crate::error::RhiResult;

fn create_semaphore(device: &Device, timeline_start: Option<u64>) -> RhiResult<vk::Semaphore> {
    let mut type_info = vk::SemaphoreTypeCreateInfo::default()
        .semaphore_type(vk::SemaphoreType::TIMELINE)
        .initial_value(timeline_start.unwrap_or(0));
    let mut create_info = vk::SemaphoreCreateInfo::default();
    if timeline_start.is_some() {
        create_info = create_info.push_next(&mut type_info);
    }
    Ok(unsafe { device.handle().create_semaphore(&create_info, None)? })
}

/// Binary semaphore, unsignaled at creation.
pub struct Semaphore {
    device: Arc<Device>,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let semaphore = create_semaphore(&device, None)?;
        Ok(Self { device, semaphore })
    }

    #[inline]
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe { self.device.handle().destroy_semaphore(self.semaphore, None) };
    }
}

/// A 64-bit counter advanced by the GPU and observed by the CPU.
pub struct Timeline {
    device: Arc<Device>,
    semaphore: vk::Semaphore,
}

impl Timeline {
    pub fn new(device: Arc<Device>, initial_value: u64) -> RhiResult<Self> {
        let semaphore = create_semaphore(&device, Some(initial_value))?;
        Ok(Self { device, semaphore })
    }

    /// Highest value reached so far; never blocks.
    pub fn completed_value(&self) -> RhiResult<u64> {
        Ok(unsafe {
            self.device
                .handle()
                .get_semaphore_counter_value(self.semaphore)?
        })
    }

    /// Blocks until the counter reaches `value`.
    ///
    /// # Errors
    ///
    /// `vk::Result::TIMEOUT` once `timeout` nanoseconds pass.
    pub fn wait(&self, value: u64, timeout: u64) -> RhiResult<()> {
        let semaphores = [self.semaphore];
        let values = [value];
        let wait_info = vk::SemaphoreWaitInfo::default()
            .semaphores(&semaphores)
            .values(&values);
        unsafe { self.device.handle().wait_semaphores(&wait_info, timeout)? };
        Ok(())
    }

    /// Submits a signal of `value` behind everything already queued on `queue`.
    pub fn signal_on_queue(&self, queue: vk::Queue, value: u64) -> RhiResult<()> {
        let semaphores = [self.semaphore];
        let values = [value];
        let mut timeline_info =
            vk::TimelineSemaphoreSubmitInfo::default().signal_semaphore_values(&values);
        let submit = vk::SubmitInfo::default()
            .signal_semaphores(&semaphores)
            .push_next(&mut timeline_info);

        unsafe {
            self.device
                .handle()
                .queue_submit(queue, &[submit], vk::Fence::null())?
        };
        Ok(())
    }
}

impl Drop for Timeline {
    fn drop(&mut self) {
        unsafe { self.device.handle().destroy_semaphore(self.semaphore, None) };
    }
}

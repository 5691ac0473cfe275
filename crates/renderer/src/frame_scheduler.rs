//! Frame-in-flight scheduling on a monotonic completion fence.
//!
//! The CPU records into one of [`FRAME_COUNT`] slots while the GPU may still
//! be executing the others. Each slot carries the fence value its last
//! submission will signal. [`FrameRing::move_to_next_frame`] blocks only when
//! the slot about to be reused has not reached that value yet, so steady
//! state never stalls unless the GPU falls a full ring behind.
//!
//! # Fence protocol
//!
//! ```text
//! move_to_next_frame:
//!   signal(fence_values[current])           after this slot's work
//!   current = (current + 1) % FRAME_COUNT
//!   wait(fence_values[current])             only if not yet reached
//!   fence_values[current] = signaled + 1
//!
//! wait_for_gpu:
//!   signal(fence_values[current]); wait for it; fence_values[current] += 1
//! ```
//!
//! Every signaled value is strictly greater than the previous one, which is
//! what a Vulkan timeline semaphore requires.

use std::sync::Arc;

use ash::vk;
use tracing::trace;

use objview_rhi::RhiResult;
use objview_rhi::device::Device;
use objview_rhi::sync::Timeline;

/// Number of frame slots (double buffering).
pub const FRAME_COUNT: usize = 2;

/// A counter the GPU advances after finishing submitted work.
///
/// Implemented by [`QueueFence`] for real hardware; tests supply a mock.
pub trait CompletionFence {
    /// Enqueues `value` to be signaled once all previously submitted work is done.
    fn signal(&mut self, value: u64) -> RhiResult<()>;

    /// Highest value the GPU has reached.
    fn completed_value(&self) -> RhiResult<u64>;

    /// Blocks until the counter reaches `value`. There is no timeout.
    fn wait(&self, value: u64) -> RhiResult<()>;

    /// Blocks until every queue is idle, presentation included.
    fn wait_idle(&self) -> RhiResult<()>;
}

/// Timeline semaphore signaled from the graphics queue.
pub struct QueueFence {
    device: Arc<Device>,
    timeline: Timeline,
    queue: vk::Queue,
}

impl QueueFence {
    pub fn new(device: &Arc<Device>) -> RhiResult<Self> {
        Ok(Self {
            device: device.clone(),
            timeline: Timeline::new(device.clone(), 0)?,
            queue: device.graphics_queue(),
        })
    }
}

impl CompletionFence for QueueFence {
    fn signal(&mut self, value: u64) -> RhiResult<()> {
        self.timeline.signal_on_queue(self.queue, value)
    }

    fn completed_value(&self) -> RhiResult<u64> {
        self.timeline.completed_value()
    }

    fn wait(&self, value: u64) -> RhiResult<()> {
        self.timeline.wait(value, u64::MAX)
    }

    fn wait_idle(&self) -> RhiResult<()> {
        self.device.wait_idle()
    }
}

/// Ring of frame slots guarded by a [`CompletionFence`].
pub struct FrameRing<F: CompletionFence> {
    fence: F,
    fence_values: [u64; FRAME_COUNT],
    current: usize,
}

impl<F: CompletionFence> FrameRing<F> {
    /// Starts at slot 0. The fence must start at 0.
    pub fn new(fence: F) -> Self {
        let mut fence_values = [0; FRAME_COUNT];
        fence_values[0] = 1;
        Self {
            fence,
            fence_values,
            current: 0,
        }
    }

    /// Slot the CPU may record into.
    #[inline]
    pub fn current_index(&self) -> usize {
        self.current
    }

    /// Value the next signal from `slot` will use.
    #[inline]
    pub fn fence_value(&self, slot: usize) -> u64 {
        self.fence_values[slot]
    }

    #[inline]
    pub fn fence(&self) -> &F {
        &self.fence
    }

    /// Blocks until the GPU has finished everything submitted so far.
    ///
    /// Used at shutdown, before resizing and around scene loads. Never
    /// call it from the per-frame path.
    pub fn wait_for_gpu(&mut self) -> RhiResult<()> {
        let value = self.fence_values[self.current];
        self.fence.signal(value)?;
        self.fence.wait(value)?;
        self.fence_values[self.current] += 1;
        trace!("GPU drained at fence value {}", value);
        Ok(())
    }

    /// Fences the current slot's submission and advances to the next slot,
    /// blocking until that slot's previous submission has completed.
    pub fn move_to_next_frame(&mut self) -> RhiResult<usize> {
        let submitted = self.fence_values[self.current];
        self.fence.signal(submitted)?;

        self.current = (self.current + 1) % FRAME_COUNT;

        let pending = self.fence_values[self.current];
        if self.fence.completed_value()? < pending {
            trace!("Waiting for frame slot {} (fence {})", self.current, pending);
            self.fence.wait(pending)?;
        }

        self.fence_values[self.current] = submitted + 1;
        Ok(self.current)
    }

    /// Drains the GPU, then runs `mutate`.
    ///
    /// Anything the GPU might still read (presentation images, depth
    /// buffer, scene buffers) must only be replaced inside `mutate`. The
    /// timeline does not cover pending presents, whose wait semaphores stay
    /// in use until the device is idle.
    pub fn drain_then<T>(&mut self, mutate: impl FnOnce() -> RhiResult<T>) -> RhiResult<T> {
        self.wait_for_gpu()?;
        self.fence.wait_idle()?;
        mutate()
    }
}

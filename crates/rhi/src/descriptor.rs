//! Descriptor set layouts, pools and writes.
//!
//! The viewer binds two sets per draw:
//! - set 0: one dynamic uniform buffer carrying the per-draw constants
//! - set 1: the diffuse texture (binding 0) and its sampler (binding 1)
//!
//! Every pool is sized for exactly one layout and allocates all of its sets
//! at creation; sets are rewritten in place and never freed individually.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::RhiResult;

/// A single-descriptor layout binding.
#[inline]
pub fn layout_binding(
    binding: u32,
    ty: vk::DescriptorType,
    stages: vk::ShaderStageFlags,
) -> vk::DescriptorSetLayoutBinding<'static> {
    vk::DescriptorSetLayoutBinding::default()
        .binding(binding)
        .descriptor_type(ty)
        .descriptor_count(1)
        .stage_flags(stages)
}

pub struct DescriptorSetLayout {
    device: Arc<Device>,
    layout: vk::DescriptorSetLayout,
    pool_sizes: Vec<vk::DescriptorPoolSize>,
}

impl DescriptorSetLayout {
    pub fn new(
        device: Arc<Device>,
        bindings: &[vk::DescriptorSetLayoutBinding],
    ) -> RhiResult<Self> {
        let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(bindings);
        let layout = unsafe {
            device
                .handle()
                .create_descriptor_set_layout(&create_info, None)?
        };
        Ok(Self {
            device,
            layout,
            pool_sizes: pool_sizes_per_set(bindings),
        })
    }

    #[inline]
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_descriptor_set_layout(self.layout, None);
        }
    }
}

/// Descriptor counts one set of `bindings` needs, merged by type.
fn pool_sizes_per_set(bindings: &[vk::DescriptorSetLayoutBinding]) -> Vec<vk::DescriptorPoolSize> {
    let mut sizes: Vec<vk::DescriptorPoolSize> = Vec::new();
    for binding in bindings {
        match sizes.iter_mut().find(|s| s.ty == binding.descriptor_type) {
            Some(size) => size.descriptor_count += binding.descriptor_count,
            None => sizes.push(
                vk::DescriptorPoolSize::default()
                    .ty(binding.descriptor_type)
                    .descriptor_count(binding.descriptor_count),
            ),
        }
    }
    sizes
}

/// A pool holding a fixed number of sets of one layout.
pub struct DescriptorPool {
    device: Arc<Device>,
    pool: vk::DescriptorPool,
    sets: Vec<vk::DescriptorSet>,
}

impl DescriptorPool {
    /// Creates the pool and allocates all `set_count` sets from it.
    pub fn with_sets(
        device: Arc<Device>,
        layout: &DescriptorSetLayout,
        set_count: u32,
    ) -> RhiResult<Self> {
        let pool_sizes: Vec<_> = layout
            .pool_sizes
            .iter()
            .map(|&size| size.descriptor_count(size.descriptor_count * set_count))
            .collect();
        let create_info = vk::DescriptorPoolCreateInfo::default()
            .max_sets(set_count)
            .pool_sizes(&pool_sizes);
        let pool = unsafe { device.handle().create_descriptor_pool(&create_info, None)? };

        let layouts = vec![layout.handle(); set_count as usize];
        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(pool)
            .set_layouts(&layouts);
        let sets = match unsafe { device.handle().allocate_descriptor_sets(&alloc_info) } {
            Ok(sets) => sets,
            Err(e) => {
                unsafe { device.handle().destroy_descriptor_pool(pool, None) };
                return Err(e.into());
            }
        };

        debug!("Descriptor pool with {} set(s)", set_count);
        Ok(Self { device, pool, sets })
    }

    #[inline]
    pub fn sets(&self) -> &[vk::DescriptorSet] {
        &self.sets
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_descriptor_pool(self.pool, None);
        }
    }
}

/// Points binding 0 of `set` at a `range`-byte window of `buffer`.
///
/// The window start is supplied as a dynamic offset at bind time.
pub fn write_uniform_dynamic(
    device: &Device,
    set: vk::DescriptorSet,
    buffer: vk::Buffer,
    range: vk::DeviceSize,
) {
    let buffer_info = [vk::DescriptorBufferInfo::default()
        .buffer(buffer)
        .range(range)];
    let write = vk::WriteDescriptorSet::default()
        .dst_set(set)
        .dst_binding(0)
        .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC)
        .buffer_info(&buffer_info);

    unsafe { device.handle().update_descriptor_sets(&[write], &[]) };
}

/// Points binding 0 of `set` at a shader-readable image and binding 1 at `sampler`.
pub fn write_texture(
    device: &Device,
    set: vk::DescriptorSet,
    view: vk::ImageView,
    sampler: vk::Sampler,
) {
    let image_info = [vk::DescriptorImageInfo::default()
        .image_view(view)
        .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)];
    let sampler_info = [vk::DescriptorImageInfo::default().sampler(sampler)];

    let writes = [
        vk::WriteDescriptorSet::default()
            .dst_set(set)
            .dst_binding(0)
            .descriptor_type(vk::DescriptorType::SAMPLED_IMAGE)
            .image_info(&image_info),
        vk::WriteDescriptorSet::default()
            .dst_set(set)
            .dst_binding(1)
            .descriptor_type(vk::DescriptorType::SAMPLER)
            .image_info(&sampler_info),
    ];

    unsafe { device.handle().update_descriptor_sets(&writes, &[]) };
}

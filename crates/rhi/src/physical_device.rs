//! Adapter enumeration and ranking.
//!
//! An adapter qualifies when it exposes Vulkan 1.3, a graphics queue, and
//! (when a surface is given) a queue that can present to it. Qualifying
//! adapters are returned best first; [`crate::device::Device::create`] walks
//! that list and moves on whenever device creation fails.
//!
//! ```no_run
//! use objview_rhi::instance::Instance;
//! use objview_rhi::physical_device::rank_adapters;
//!
//! let instance = Instance::new(false, &[]).expect("Vulkan loader");
//! let adapters = rank_adapters(instance.handle(), None).expect("no usable GPU");
//! println!("Preferred GPU: {}", adapters[0].device_name());
//! ```

use std::ffi::CStr;

use ash::vk;
use tracing::{debug, info};

use crate::error::{RhiError, RhiResult};

/// Graphics and present queue family indices, possibly the same family.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueFamilies {
    pub graphics: u32,
    pub present: u32,
}

impl QueueFamilies {
    #[inline]
    pub fn is_shared(&self) -> bool {
        self.graphics == self.present
    }

    /// Each family once, graphics first.
    pub fn unique(&self) -> Vec<u32> {
        if self.is_shared() {
            vec![self.graphics]
        } else {
            vec![self.graphics, self.present]
        }
    }
}

/// Picks queue families from per-family `(graphics, present)` capabilities.
///
/// A family doing both wins outright; otherwise the first graphics family is
/// paired with the first presenting one.
fn pick_queue_families(caps: impl IntoIterator<Item = (bool, bool)>) -> Option<QueueFamilies> {
    let mut graphics = None;
    let mut present = None;

    for (index, (has_graphics, can_present)) in (0u32..).zip(caps) {
        if has_graphics && can_present {
            return Some(QueueFamilies {
                graphics: index,
                present: index,
            });
        }
        if has_graphics {
            graphics.get_or_insert(index);
        }
        if can_present {
            present.get_or_insert(index);
        }
    }

    Some(QueueFamilies {
        graphics: graphics?,
        present: present?,
    })
}

/// A surface together with the loader used to query it.
#[derive(Clone, Copy)]
pub struct SurfaceSupport<'a> {
    pub surface: vk::SurfaceKHR,
    pub loader: &'a ash::khr::surface::Instance,
}

/// A physical device that can run the viewer.
#[derive(Clone)]
pub struct Adapter {
    pub handle: vk::PhysicalDevice,
    pub properties: vk::PhysicalDeviceProperties,
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    pub queues: QueueFamilies,
}

impl Adapter {
    pub fn device_name(&self) -> &str {
        self.properties
            .device_name_as_c_str()
            .ok()
            .and_then(|name| name.to_str().ok())
            .unwrap_or("unknown adapter")
    }

    pub fn kind(&self) -> &'static str {
        match self.properties.device_type {
            vk::PhysicalDeviceType::DISCRETE_GPU => "discrete",
            vk::PhysicalDeviceType::INTEGRATED_GPU => "integrated",
            vk::PhysicalDeviceType::VIRTUAL_GPU => "virtual",
            vk::PhysicalDeviceType::CPU => "software",
            _ => "other",
        }
    }

    /// Sum of all device-local heaps, in bytes.
    pub fn local_memory(&self) -> u64 {
        let heaps = &self.memory_properties.memory_heaps
            [..self.memory_properties.memory_heap_count as usize];
        heaps
            .iter()
            .filter(|heap| heap.flags.contains(vk::MemoryHeapFlags::DEVICE_LOCAL))
            .map(|heap| heap.size)
            .sum()
    }

    /// Minimum alignment of uniform buffer offsets, in bytes.
    #[inline]
    pub fn min_uniform_buffer_offset_alignment(&self) -> u64 {
        self.properties.limits.min_uniform_buffer_offset_alignment
    }

    fn score(&self) -> u64 {
        adapter_score(self.properties.device_type, self.local_memory())
    }
}

impl std::fmt::Debug for Adapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let version = self.properties.api_version;
        f.debug_struct("Adapter")
            .field("name", &self.device_name())
            .field("kind", &self.kind())
            .field(
                "api",
                &format_args!(
                    "{}.{}",
                    vk::api_version_major(version),
                    vk::api_version_minor(version)
                ),
            )
            .field("queues", &self.queues)
            .finish()
    }
}

/// Enumerates usable adapters, best first.
///
/// Pass `None` for `surface` when no presentation is needed.
///
/// # Errors
///
/// Returns [`RhiError::NoSuitableGpu`] if no adapter qualifies.
pub fn rank_adapters(
    instance: &ash::Instance,
    surface: Option<SurfaceSupport<'_>>,
) -> RhiResult<Vec<Adapter>> {
    let devices = unsafe { instance.enumerate_physical_devices()? };
    info!("Found {} Vulkan device(s)", devices.len());

    let mut adapters: Vec<Adapter> = devices
        .into_iter()
        .filter_map(|device| inspect(instance, device, surface))
        .collect();
    if adapters.is_empty() {
        return Err(RhiError::NoSuitableGpu);
    }

    // Stable: equal scores keep the loader's enumeration order
    adapters.sort_by_key(|adapter| std::cmp::Reverse(adapter.score()));
    for adapter in &adapters {
        debug!("Candidate {:?}, score {}", adapter, adapter.score());
    }
    Ok(adapters)
}

fn inspect(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
    surface: Option<SurfaceSupport<'_>>,
) -> Option<Adapter> {
    let properties = unsafe { instance.get_physical_device_properties(device) };
    let name = properties
        .device_name_as_c_str()
        .map(CStr::to_string_lossy)
        .unwrap_or_default();

    // Dynamic rendering and timeline semaphores are core in 1.3
    if properties.api_version < vk::API_VERSION_1_3 {
        debug!(
            "Skipping '{}': Vulkan {}.{} only",
            name,
            vk::api_version_major(properties.api_version),
            vk::api_version_minor(properties.api_version)
        );
        return None;
    }

    let families = unsafe { instance.get_physical_device_queue_family_properties(device) };
    let caps = (0u32..).zip(&families).map(|(index, family)| {
        let has_graphics =
            family.queue_count > 0 && family.queue_flags.contains(vk::QueueFlags::GRAPHICS);
        let can_present = match surface {
            Some(support) => {
                family.queue_count > 0
                    && unsafe {
                        support
                            .loader
                            .get_physical_device_surface_support(device, index, support.surface)
                            .unwrap_or(false)
                    }
            }
            None => has_graphics,
        };
        (has_graphics, can_present)
    });
    let Some(queues) = pick_queue_families(caps) else {
        debug!("Skipping '{}': no graphics or present queue", name);
        return None;
    };

    Some(Adapter {
        handle: device,
        properties,
        memory_properties: unsafe { instance.get_physical_device_memory_properties(device) },
        queues,
    })
}

/// Ranks an adapter; higher is preferred.
///
/// Device class dominates, local memory breaks ties within a class.
pub fn adapter_score(device_type: vk::PhysicalDeviceType, device_local_memory: u64) -> u64 {
    let class = match device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 4,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 3,
        vk::PhysicalDeviceType::VIRTUAL_GPU => 2,
        vk::PhysicalDeviceType::CPU => 1,
        _ => 0,
    };
    // MiB, capped below one class step
    let mib = (device_local_memory >> 20).min(999_999);
    class * 1_000_000 + mib
}

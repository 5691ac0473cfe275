//! Renderer building blocks on a real device.
//!
//! Each test returns early when no Vulkan 1.3 device is available.

use std::sync::Arc;

use objview_renderer::constants::ConstantRing;
use objview_renderer::frame_scheduler::{CompletionFence, FrameRing, QueueFence};
use objview_renderer::scene_pipeline::ScenePipeline;
use objview_renderer::textures::TextureTable;
use objview_renderer::uploader::ResourceUploader;
use objview_resources::{SceneConstants, TextureData};
use objview_rhi::buffer::BufferUsage;
use objview_rhi::device::Device;
use objview_rhi::instance::Instance;
use objview_rhi::physical_device::rank_adapters;
use objview_rhi::vk;

fn headless() -> Option<(Arc<Device>, Instance)> {
    let instance = Instance::new(false, &[])
        .map_err(|e| eprintln!("skipping: no Vulkan loader ({e})"))
        .ok()?;
    let adapters = rank_adapters(instance.handle(), None)
        .map_err(|e| eprintln!("skipping: no adapter ({e})"))
        .ok()?;
    let device = Device::create(&instance, &adapters, false)
        .map_err(|e| eprintln!("skipping: no device ({e})"))
        .ok()?;
    Some((device, instance))
}

#[test]
fn static_upload_reads_back_unchanged() {
    let Some((device, _instance)) = headless() else {
        return;
    };

    let uploader = ResourceUploader::new(device.clone()).unwrap();
    let indices: [u32; 9] = [0, 1, 2, 2, 3, 0, 4, 5, 6];
    let bytes: &[u8] = bytemuck::cast_slice(&indices);

    let buffer = uploader.upload_static(BufferUsage::Index, bytes).unwrap();
    assert_eq!(buffer.read_data(0, bytes.len()).unwrap(), bytes);
}

#[test]
fn index_upload_skips_empty_meshes() {
    let Some((device, _instance)) = headless() else {
        return;
    };

    let uploader = ResourceUploader::new(device.clone()).unwrap();
    assert!(uploader.upload_indices(&[]).unwrap().is_none());

    let indices = [0u32, 1, 2];
    let buffer = uploader.upload_indices(&indices).unwrap().unwrap();
    assert_eq!(buffer.read_data(0, 12).unwrap(), bytemuck::cast_slice::<u32, u8>(&indices));
}

#[test]
fn texture_upload_completes_on_flush() {
    let Some((device, _instance)) = headless() else {
        return;
    };

    let mut ring = FrameRing::new(QueueFence::new(&device).unwrap());
    let mut uploader = ResourceUploader::new(device.clone()).unwrap();

    let texture = TextureData {
        width: 4,
        height: 2,
        row_pitch: 16,
        pixels: vec![128; 32],
    };
    let image = uploader.upload_texture(&texture).unwrap();
    assert_eq!(uploader.pending(), 1);

    uploader.flush(&mut ring).unwrap();
    assert_eq!(uploader.pending(), 0);
    assert_eq!(image.extent().width, 4);
    assert!(ring.fence().completed_value().unwrap() >= 1);

    // Nothing recorded: flushing again is a no-op
    uploader.flush(&mut ring).unwrap();
}

#[test]
fn texture_table_hands_out_slots_in_order() {
    let Some((device, _instance)) = headless() else {
        return;
    };

    let mut ring = FrameRing::new(QueueFence::new(&device).unwrap());
    let pipeline = ScenePipeline::new(device.clone(), vk::Format::B8G8R8A8_UNORM).unwrap();
    let mut uploader = ResourceUploader::new(device.clone()).unwrap();
    let mut table =
        TextureTable::new(device.clone(), pipeline.texture_layout(), &mut uploader).unwrap();

    let first = uploader
        .upload_texture(&TextureData::solid([255, 0, 0, 255]))
        .unwrap();
    let second = uploader
        .upload_texture(&TextureData::solid([0, 255, 0, 255]))
        .unwrap();
    uploader.flush(&mut ring).unwrap();

    let first_slot = table.reserve().unwrap();
    let second_slot = table.reserve().unwrap();
    let first = table.bind(first_slot, first);
    let second = table.bind(second_slot, second);
    assert_eq!(first.slot(), 0);
    assert_eq!(second.slot(), 1);
    assert_eq!(table.used_slots(), 2);

    let fallback = table.set_for(None);
    assert_ne!(table.set_for(Some(&first)), fallback);
    assert_ne!(table.set_for(Some(&first)), table.set_for(Some(&second)));

    table.clear();
    assert_eq!(table.used_slots(), 0);
}

#[test]
fn constant_slots_do_not_overlap() {
    let Some((device, _instance)) = headless() else {
        return;
    };

    let ring = ConstantRing::new(device.clone()).unwrap();
    let alignment = device.adapter().min_uniform_buffer_offset_alignment().max(1);
    assert_eq!(ring.slot_size() % alignment, 0);
    assert!(ring.slot_size() >= SceneConstants::size() as u64);

    let constants = SceneConstants::default();
    let a = ring.write(0, 0, &constants).unwrap();
    let b = ring.write(0, 1, &constants).unwrap();
    let c = ring.write(1, 0, &constants).unwrap();
    assert_eq!(a, 0);
    assert_eq!(u64::from(b), ring.slot_size());
    assert_eq!(u64::from(c), 512 * ring.slot_size());

    // Past capacity the slot wraps onto subset 1 of the same frame
    assert_eq!(ring.write(1, 513, &constants).unwrap(), ring.write(1, 1, &constants).unwrap());
}

//! Staging upload round-trip against a real device
//!
//! Run with `cargo test -- --ignored` on a machine with a Vulkan driver.

use ash::vk;
use subpass_renderer::config::RendererConfig;
use subpass_renderer::vulkan::initialization::VulkanInstance;
use subpass_renderer::vulkan::rendering::CommandPool;
use subpass_renderer::vulkan::resources::TransferContext;

struct HeadlessDevice {
    device: ash::Device,
    queue: vk::Queue,
    queue_family: u32,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
}

impl Drop for HeadlessDevice {
    fn drop(&mut self) {
        unsafe { self.device.destroy_device(None) };
    }
}

fn headless_device(instance: &ash::Instance) -> HeadlessDevice {
    let physical_devices = unsafe { instance.enumerate_physical_devices() }.unwrap();
    let (physical_device, queue_family) = physical_devices
        .iter()
        .find_map(|&pd| {
            let families = unsafe { instance.get_physical_device_queue_family_properties(pd) };
            families
                .iter()
                .position(|f| f.queue_flags.contains(vk::QueueFlags::GRAPHICS))
                .map(|i| (pd, i as u32))
        })
        .expect("no graphics-capable adapter");

    let priorities = [1.0];
    let queue_info = [vk::DeviceQueueCreateInfo::builder()
        .queue_family_index(queue_family)
        .queue_priorities(&priorities)
        .build()];
    let device_info = vk::DeviceCreateInfo::builder().queue_create_infos(&queue_info);
    let device = unsafe { instance.create_device(physical_device, &device_info, None) }.unwrap();

    HeadlessDevice {
        queue: unsafe { device.get_device_queue(queue_family, 0) },
        device,
        queue_family,
        memory_properties: unsafe {
            instance.get_physical_device_memory_properties(physical_device)
        },
    }
}

#[test]
#[ignore = "requires a Vulkan-capable GPU"]
fn staging_upload_reads_back_identical_bytes() {
    let config = RendererConfig::new("roundtrip").with_validation(false);
    let instance = VulkanInstance::new(&config, &[]).unwrap();
    let headless = headless_device(&instance.instance);

    {
        let pool = CommandPool::new(&headless.device, headless.queue_family).unwrap();
        let transfer = TransferContext {
            device: &headless.device,
            memory_properties: &headless.memory_properties,
            queue: headless.queue,
            command_pool: pool.handle(),
        };

        for len in [1usize, 4, 1000, 65_537] {
            let bytes: Vec<u8> = (0..len).map(|i| (i * 31 % 251) as u8).collect();
            let buffer = transfer
                .upload_buffer(&bytes, vk::BufferUsageFlags::TRANSFER_SRC)
                .unwrap();
            let read = transfer.read_back(&buffer, len).unwrap();
            assert_eq!(read, bytes, "round-trip of {len} bytes");
        }
    }
}

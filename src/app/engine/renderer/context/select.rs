use vulkanalia::vk;

/// Picks the first discrete GPU, falling back to the first enumerated device.
pub fn select_physical_device(device_types: &[vk::PhysicalDeviceType]) -> Option<usize> {
    if device_types.is_empty() {
        return None;
    }

    device_types
        .iter()
        .position(|t| *t == vk::PhysicalDeviceType::DISCRETE_GPU)
        .or(Some(0))
}

pub fn select_queue_family(families: &[vk::QueueFlags]) -> Option<u32> {
    families
        .iter()
        .position(|flags| flags.contains(vk::QueueFlags::GRAPHICS))
        .map(|i| i as u32)
}

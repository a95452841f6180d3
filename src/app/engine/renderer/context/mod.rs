use anyhow::{Context as _, Result, anyhow};
use std::collections::HashSet;
use std::ffi::{CStr, c_char};
use std::os::raw::c_void;
use vulkanalia::Version;
use vulkanalia::loader::{LIBRARY, LibloadingLoader};
use vulkanalia::prelude::v1_0::*;
use vulkanalia::vk::{ExtDebugUtilsExtension, Handle, KhrSurfaceExtension, KhrSwapchainExtension};
use vulkanalia::window as vk_window;
use winit::window::Window;

use super::api::{DeviceApi, Submission, SwapchainRequest};
use super::error::InitError;

pub mod select;

pub use select::{select_physical_device, select_queue_family};

const VALIDATION_ENABLED: bool = cfg!(debug_assertions);

const VALIDATION_LAYER: vk::ExtensionName =
    vk::ExtensionName::from_bytes(b"VK_LAYER_KHRONOS_validation");

const PORTABILITY_MACOS_VERSION: Version = Version::new(1, 3, 216);

const DESCRIPTORS_PER_TYPE: u32 = 1000;

const DESCRIPTOR_TYPES: [vk::DescriptorType; 11] = [
    vk::DescriptorType::SAMPLER,
    vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
    vk::DescriptorType::SAMPLED_IMAGE,
    vk::DescriptorType::STORAGE_IMAGE,
    vk::DescriptorType::UNIFORM_TEXEL_BUFFER,
    vk::DescriptorType::STORAGE_TEXEL_BUFFER,
    vk::DescriptorType::UNIFORM_BUFFER,
    vk::DescriptorType::STORAGE_BUFFER,
    vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
    vk::DescriptorType::STORAGE_BUFFER_DYNAMIC,
    vk::DescriptorType::INPUT_ATTACHMENT,
];

/// Instance, GPU, logical device and queue shared by everything that renders
/// into the window.
pub struct DeviceContext {
    pub entry: Entry,
    pub instance: Instance,
    pub device: Device,
    pub data: ContextData,
}

pub struct ContextData {
    pub messenger: vk::DebugUtilsMessengerEXT,
    pub physical_device: vk::PhysicalDevice,
    pub queue_family: u32,
    pub queue: vk::Queue,
    pub descriptor_pool: vk::DescriptorPool,
    validation: bool,
}

impl DeviceContext {
    /// Runs the whole device bring-up. Any failing step aborts startup.
    pub unsafe fn create(window: &Window) -> Result<Self> {
        let loader = unsafe { LibloadingLoader::new(LIBRARY)? };
        let entry = unsafe { Entry::new(loader) }.map_err(|e| anyhow!("{}", e))?;

        let mut data = ContextData {
            messenger: vk::DebugUtilsMessengerEXT::null(),
            physical_device: vk::PhysicalDevice::null(),
            queue_family: 0,
            queue: vk::Queue::null(),
            descriptor_pool: vk::DescriptorPool::null(),
            validation: VALIDATION_ENABLED,
        };

        let required = vk_window::get_required_instance_extensions(window)
            .iter()
            .map(|e| e.as_ptr())
            .collect::<Vec<_>>();

        let instance = unsafe { Self::create_instance(&entry, required, &mut data) }
            .context("failed to create Vulkan instance")?;

        // From here on, a failing step releases what the earlier ones created.
        let device = match unsafe { Self::create_device(&entry, &instance, &mut data) } {
            Ok(device) => device,
            Err(err) => {
                unsafe { Self::destroy_instance(&instance, &data) };
                return Err(err);
            }
        };
        data.descriptor_pool = match unsafe { Self::create_descriptor_pool(&device) }
            .context("failed to create descriptor pool")
        {
            Ok(pool) => pool,
            Err(err) => {
                unsafe {
                    device.destroy_device(None);
                    Self::destroy_instance(&instance, &data);
                }
                return Err(err);
            }
        };

        Ok(Self {
            entry,
            instance,
            device,
            data,
        })
    }

    unsafe fn create_instance(
        entry: &Entry,
        mut extensions: Vec<*const c_char>,
        data: &mut ContextData,
    ) -> Result<Instance> {
        let app_info = vk::ApplicationInfo::builder()
            .application_name(b"vulkan-present\0")
            .application_version(vk::make_version(0, 1, 0))
            .engine_name(b"No Engine\0")
            .engine_version(vk::make_version(1, 0, 0))
            .api_version(vk::make_version(1, 0, 0));

        let available_layers = unsafe { entry.enumerate_instance_layer_properties()? }
            .iter()
            .map(|l| l.layer_name)
            .collect::<HashSet<_>>();

        if data.validation && !available_layers.contains(&VALIDATION_LAYER) {
            tracing::warn!("Validation layer requested but not available, continuing without it.");
            data.validation = false;
        }

        let layers = if data.validation {
            vec![VALIDATION_LAYER.as_ptr()]
        } else {
            Vec::new()
        };

        if data.validation {
            extensions.push(vk::EXT_DEBUG_UTILS_EXTENSION.name.as_ptr());
        }

        // MoltenVK only shows up through the portability enumeration.
        let flags = if cfg!(target_os = "macos") && entry.version()? >= PORTABILITY_MACOS_VERSION {
            extensions.push(
                vk::KHR_GET_PHYSICAL_DEVICE_PROPERTIES2_EXTENSION
                    .name
                    .as_ptr(),
            );
            extensions.push(vk::KHR_PORTABILITY_ENUMERATION_EXTENSION.name.as_ptr());
            vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR
        } else {
            vk::InstanceCreateFlags::empty()
        };

        let mut info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_layer_names(&layers)
            .enabled_extension_names(&extensions)
            .flags(flags);

        let messenger_info = || {
            vk::DebugUtilsMessengerCreateInfoEXT::builder()
                .message_severity(vk::DebugUtilsMessageSeverityFlagsEXT::all())
                .message_type(
                    vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                        | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                        | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
                )
                .user_callback(Some(Self::debug_callback))
        };

        // Chained so instance creation and destruction are covered as well.
        let mut debug_info = messenger_info();
        if data.validation {
            info = info.push_next(&mut debug_info);
        }

        let instance = unsafe { entry.create_instance(&info, None)? };

        if data.validation {
            let debug_info = messenger_info();
            match unsafe { instance.create_debug_utils_messenger_ext(&debug_info, None) } {
                Ok(messenger) => data.messenger = messenger,
                Err(err) => {
                    unsafe { instance.destroy_instance(None) };
                    return Err(err.into());
                }
            }
        }

        Ok(instance)
    }

    unsafe fn destroy_instance(instance: &Instance, data: &ContextData) {
        unsafe {
            if data.validation && !data.messenger.is_null() {
                instance.destroy_debug_utils_messenger_ext(data.messenger, None);
            }
            instance.destroy_instance(None);
        }
    }

    unsafe fn create_device(
        entry: &Entry,
        instance: &Instance,
        data: &mut ContextData,
    ) -> Result<Device> {
        unsafe {
            Self::pick_physical_device(instance, data)?;
            Self::pick_queue_family(instance, data)?;
            Self::create_logical_device(entry, instance, data)
                .context("failed to create logical device")
        }
    }

    pub extern "system" fn debug_callback(
        severity: vk::DebugUtilsMessageSeverityFlagsEXT,
        type_: vk::DebugUtilsMessageTypeFlagsEXT,
        data: *const vk::DebugUtilsMessengerCallbackDataEXT,
        _: *mut c_void,
    ) -> vk::Bool32 {
        let data = unsafe { *data };
        let message = unsafe { CStr::from_ptr(data.message) }.to_string_lossy();

        if severity >= vk::DebugUtilsMessageSeverityFlagsEXT::ERROR {
            tracing::error!("({:?}) {}", type_, message);
        } else if severity >= vk::DebugUtilsMessageSeverityFlagsEXT::WARNING {
            tracing::warn!("({:?}) {}", type_, message);
        } else if severity >= vk::DebugUtilsMessageSeverityFlagsEXT::INFO {
            tracing::debug!("({:?}) {}", type_, message);
        } else {
            tracing::trace!("({:?}) {}", type_, message);
        }

        vk::FALSE
    }

    unsafe fn pick_physical_device(instance: &Instance, data: &mut ContextData) -> Result<()> {
        let devices = unsafe { instance.enumerate_physical_devices()? };
        let properties = devices
            .iter()
            .map(|d| unsafe { instance.get_physical_device_properties(*d) })
            .collect::<Vec<_>>();

        for p in &properties {
            tracing::debug!("Found physical device `{}` ({:?}).", p.device_name, p.device_type);
        }

        let kinds = properties.iter().map(|p| p.device_type).collect::<Vec<_>>();
        let index = select_physical_device(&kinds).ok_or(InitError::NoPhysicalDevice)?;

        tracing::info!(
            "Selected physical device (`{}`).",
            properties[index].device_name
        );
        data.physical_device = devices[index];
        Ok(())
    }

    unsafe fn pick_queue_family(instance: &Instance, data: &mut ContextData) -> Result<()> {
        let families = unsafe {
            instance.get_physical_device_queue_family_properties(data.physical_device)
        };
        let flags = families.iter().map(|f| f.queue_flags).collect::<Vec<_>>();

        data.queue_family = select_queue_family(&flags).ok_or(InitError::NoGraphicsQueue)?;
        tracing::info!("Selected queue family {}.", data.queue_family);
        Ok(())
    }

    unsafe fn create_logical_device(
        entry: &Entry,
        instance: &Instance,
        data: &mut ContextData,
    ) -> Result<Device> {
        let queue_priorities = &[1.0];
        let queue_info = vk::DeviceQueueCreateInfo::builder()
            .queue_family_index(data.queue_family)
            .queue_priorities(queue_priorities);

        let layers = if data.validation {
            vec![VALIDATION_LAYER.as_ptr()]
        } else {
            vec![]
        };

        let mut extensions = vec![vk::KHR_SWAPCHAIN_EXTENSION.name.as_ptr()];

        // Required by Vulkan SDK on macOS since 1.3.216.
        if cfg!(target_os = "macos") && entry.version()? >= PORTABILITY_MACOS_VERSION {
            extensions.push(vk::KHR_PORTABILITY_SUBSET_EXTENSION.name.as_ptr());
        }
        let features = vk::PhysicalDeviceFeatures::builder();

        let queue_infos = &[queue_info];
        let info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(queue_infos)
            .enabled_layer_names(&layers)
            .enabled_extension_names(&extensions)
            .enabled_features(&features);

        let device = unsafe { instance.create_device(data.physical_device, &info, None)? };
        data.queue = unsafe { device.get_device_queue(data.queue_family, 0) };
        Ok(device)
    }

    unsafe fn create_descriptor_pool(device: &Device) -> Result<vk::DescriptorPool> {
        let sizes = DESCRIPTOR_TYPES
            .iter()
            .map(|t| {
                vk::DescriptorPoolSize::builder()
                    .type_(*t)
                    .descriptor_count(DESCRIPTORS_PER_TYPE)
            })
            .collect::<Vec<_>>();

        let info = vk::DescriptorPoolCreateInfo::builder()
            .flags(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET)
            .max_sets(DESCRIPTORS_PER_TYPE * DESCRIPTOR_TYPES.len() as u32)
            .pool_sizes(&sizes);

        Ok(unsafe { device.create_descriptor_pool(&info, None)? })
    }
}

// SAFETY (all methods below): handles come from this context and the caller
// keeps them alive for the duration of the call, as `DeviceApi` requires.
impl DeviceApi for DeviceContext {
    fn queue_family(&self) -> u32 {
        self.data.queue_family
    }

    fn descriptor_pool(&self) -> vk::DescriptorPool {
        self.data.descriptor_pool
    }

    fn surface_support(&self, queue_family: u32, surface: vk::SurfaceKHR) -> VkResult<bool> {
        unsafe {
            self.instance.get_physical_device_surface_support_khr(
                self.data.physical_device,
                queue_family,
                surface,
            )
        }
    }

    fn surface_capabilities(
        &self,
        surface: vk::SurfaceKHR,
    ) -> VkResult<vk::SurfaceCapabilitiesKHR> {
        unsafe {
            self.instance
                .get_physical_device_surface_capabilities_khr(self.data.physical_device, surface)
        }
    }

    fn surface_formats(&self, surface: vk::SurfaceKHR) -> VkResult<Vec<vk::SurfaceFormatKHR>> {
        unsafe {
            self.instance
                .get_physical_device_surface_formats_khr(self.data.physical_device, surface)
        }
    }

    fn surface_present_modes(&self, surface: vk::SurfaceKHR) -> VkResult<Vec<vk::PresentModeKHR>> {
        unsafe {
            self.instance
                .get_physical_device_surface_present_modes_khr(self.data.physical_device, surface)
        }
    }

    fn destroy_surface(&self, surface: vk::SurfaceKHR) {
        unsafe { self.instance.destroy_surface_khr(surface, None) }
    }

    fn create_swapchain(&self, request: &SwapchainRequest) -> VkResult<vk::SwapchainKHR> {
        let info = vk::SwapchainCreateInfoKHR::builder()
            .surface(request.surface)
            .min_image_count(request.min_image_count)
            .image_format(request.surface_format.format)
            .image_color_space(request.surface_format.color_space)
            .image_extent(request.extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(request.pre_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(request.present_mode)
            .clipped(true)
            .old_swapchain(request.old_swapchain);

        unsafe { self.device.create_swapchain_khr(&info, None) }
    }

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>> {
        unsafe { self.device.get_swapchain_images_khr(swapchain) }
    }

    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
        unsafe { self.device.destroy_swapchain_khr(swapchain, None) }
    }

    fn create_render_pass(&self, format: vk::Format) -> VkResult<vk::RenderPass> {
        let attachment = vk::AttachmentDescription::builder()
            .format(format)
            .samples(vk::SampleCountFlags::_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::PRESENT_SRC_KHR);

        let color_ref = vk::AttachmentReference::builder()
            .attachment(0)
            .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
        let color_refs = &[color_ref];

        let subpass = vk::SubpassDescription::builder()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(color_refs);

        // The clear must not start before the acquire semaphore is waited on.
        let dependency = vk::SubpassDependency::builder()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(0)
            .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
            .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
            .src_access_mask(vk::AccessFlags::empty())
            .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE);

        let attachments = &[attachment];
        let subpasses = &[subpass];
        let dependencies = &[dependency];
        let info = vk::RenderPassCreateInfo::builder()
            .attachments(attachments)
            .subpasses(subpasses)
            .dependencies(dependencies);

        unsafe { self.device.create_render_pass(&info, None) }
    }

    fn destroy_render_pass(&self, render_pass: vk::RenderPass) {
        unsafe { self.device.destroy_render_pass(render_pass, None) }
    }

    fn create_image_view(&self, image: vk::Image, format: vk::Format) -> VkResult<vk::ImageView> {
        let components = vk::ComponentMapping::builder()
            .r(vk::ComponentSwizzle::IDENTITY)
            .g(vk::ComponentSwizzle::IDENTITY)
            .b(vk::ComponentSwizzle::IDENTITY)
            .a(vk::ComponentSwizzle::IDENTITY);

        let subresource_range = vk::ImageSubresourceRange::builder()
            .aspect_mask(vk::ImageAspectFlags::COLOR)
            .base_mip_level(0)
            .level_count(1)
            .base_array_layer(0)
            .layer_count(1);

        let info = vk::ImageViewCreateInfo::builder()
            .image(image)
            .view_type(vk::ImageViewType::_2D)
            .format(format)
            .components(components)
            .subresource_range(subresource_range);

        unsafe { self.device.create_image_view(&info, None) }
    }

    fn destroy_image_view(&self, view: vk::ImageView) {
        unsafe { self.device.destroy_image_view(view, None) }
    }

    fn create_framebuffer(
        &self,
        render_pass: vk::RenderPass,
        view: vk::ImageView,
        extent: vk::Extent2D,
    ) -> VkResult<vk::Framebuffer> {
        let attachments = &[view];
        let info = vk::FramebufferCreateInfo::builder()
            .render_pass(render_pass)
            .attachments(attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);

        unsafe { self.device.create_framebuffer(&info, None) }
    }

    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer) {
        unsafe { self.device.destroy_framebuffer(framebuffer, None) }
    }

    fn create_command_pool(&self, queue_family: u32) -> VkResult<vk::CommandPool> {
        let info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::empty())
            .queue_family_index(queue_family);

        unsafe { self.device.create_command_pool(&info, None) }
    }

    fn destroy_command_pool(&self, pool: vk::CommandPool) {
        unsafe { self.device.destroy_command_pool(pool, None) }
    }

    fn allocate_command_buffer(&self, pool: vk::CommandPool) -> VkResult<vk::CommandBuffer> {
        let info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        let buffers = unsafe { self.device.allocate_command_buffers(&info)? };
        buffers
            .into_iter()
            .next()
            .ok_or(vk::ErrorCode::OUT_OF_HOST_MEMORY)
    }

    fn free_command_buffer(&self, pool: vk::CommandPool, command_buffer: vk::CommandBuffer) {
        unsafe { self.device.free_command_buffers(pool, &[command_buffer]) }
    }

    fn create_fence(&self, signaled: bool) -> VkResult<vk::Fence> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let info = vk::FenceCreateInfo::builder().flags(flags);

        unsafe { self.device.create_fence(&info, None) }
    }

    fn destroy_fence(&self, fence: vk::Fence) {
        unsafe { self.device.destroy_fence(fence, None) }
    }

    fn create_semaphore(&self) -> VkResult<vk::Semaphore> {
        let info = vk::SemaphoreCreateInfo::builder();
        unsafe { self.device.create_semaphore(&info, None) }
    }

    fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        unsafe { self.device.destroy_semaphore(semaphore, None) }
    }

    fn wait_idle(&self) -> VkResult<()> {
        unsafe { self.device.device_wait_idle() }
    }

    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        semaphore: vk::Semaphore,
    ) -> VkSuccessResult<u32> {
        unsafe {
            self.device
                .acquire_next_image_khr(swapchain, u64::MAX, semaphore, vk::Fence::null())
        }
    }

    fn wait_for_fence(&self, fence: vk::Fence) -> VkResult<()> {
        unsafe { self.device.wait_for_fences(&[fence], true, u64::MAX) }.map(|_| ())
    }

    fn reset_fence(&self, fence: vk::Fence) -> VkResult<()> {
        unsafe { self.device.reset_fences(&[fence]) }
    }

    fn reset_command_pool(&self, pool: vk::CommandPool) -> VkResult<()> {
        unsafe {
            self.device
                .reset_command_pool(pool, vk::CommandPoolResetFlags::empty())
        }
    }

    fn begin_command_buffer(&self, command_buffer: vk::CommandBuffer) -> VkResult<()> {
        let info = vk::CommandBufferBeginInfo::builder()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe { self.device.begin_command_buffer(command_buffer, &info) }
    }

    fn end_command_buffer(&self, command_buffer: vk::CommandBuffer) -> VkResult<()> {
        unsafe { self.device.end_command_buffer(command_buffer) }
    }

    fn cmd_begin_render_pass(
        &self,
        command_buffer: vk::CommandBuffer,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        extent: vk::Extent2D,
        clear_color: [f32; 4],
    ) {
        let render_area = vk::Rect2D::builder()
            .offset(vk::Offset2D::default())
            .extent(extent);
        let clear_values = &[vk::ClearValue {
            color: vk::ClearColorValue {
                float32: clear_color,
            },
        }];
        let info = vk::RenderPassBeginInfo::builder()
            .render_pass(render_pass)
            .framebuffer(framebuffer)
            .render_area(render_area)
            .clear_values(clear_values);

        unsafe {
            self.device
                .cmd_begin_render_pass(command_buffer, &info, vk::SubpassContents::INLINE)
        }
    }

    fn cmd_end_render_pass(&self, command_buffer: vk::CommandBuffer) {
        unsafe { self.device.cmd_end_render_pass(command_buffer) }
    }

    fn submit(&self, submission: &Submission) -> VkResult<()> {
        let command_buffers = &[submission.command_buffer];
        let (wait_semaphores, wait_stages) = match submission.wait {
            Some((semaphore, stage)) => (vec![semaphore], vec![stage]),
            None => (vec![], vec![]),
        };
        let signal_semaphores = submission.signal.into_iter().collect::<Vec<_>>();

        let info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            self.device
                .queue_submit(self.data.queue, &[info], submission.fence)
        }
    }

    fn present(
        &self,
        swapchain: vk::SwapchainKHR,
        image_index: u32,
        wait: vk::Semaphore,
    ) -> VkResult<vk::SuccessCode> {
        let wait_semaphores = &[wait];
        let swapchains = &[swapchain];
        let image_indices = &[image_index];
        let info = vk::PresentInfoKHR::builder()
            .wait_semaphores(wait_semaphores)
            .swapchains(swapchains)
            .image_indices(image_indices);

        unsafe { self.device.queue_present_khr(self.data.queue, &info) }
    }

    fn destroy(&mut self) {
        unsafe {
            self.device
                .destroy_descriptor_pool(self.data.descriptor_pool, None);
            self.device.destroy_device(None);
            Self::destroy_instance(&self.instance, &self.data);
        }
        tracing::info!("Vulkan instance destroyed.");
    }
}

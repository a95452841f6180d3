use std::mem;

use vulkanalia::vk::{self, Handle};

use super::api::{DeviceApi, SwapchainRequest};
use super::error::{CallSite, GpuError};

pub const PREFERRED_FORMATS: [vk::Format; 4] = [
    vk::Format::B8G8R8A8_UNORM,
    vk::Format::R8G8B8A8_UNORM,
    vk::Format::B8G8R8_UNORM,
    vk::Format::R8G8B8_UNORM,
];

pub const PREFERRED_COLOR_SPACE: vk::ColorSpaceKHR = vk::ColorSpaceKHR::SRGB_NONLINEAR;

pub const PREFERRED_PRESENT_MODES: [vk::PresentModeKHR; 1] = [vk::PresentModeKHR::FIFO];

/// Per-image resources, recycled every time its image is acquired.
#[derive(Copy, Clone, Debug, Default)]
pub struct Frame {
    pub image: vk::Image,
    pub image_view: vk::ImageView,
    pub framebuffer: vk::Framebuffer,
    pub command_pool: vk::CommandPool,
    pub command_buffer: vk::CommandBuffer,
    pub fence: vk::Fence,
}

#[derive(Copy, Clone, Debug, Default)]
pub struct FrameSemaphores {
    pub image_acquired: vk::Semaphore,
    pub render_complete: vk::Semaphore,
}

pub fn select_surface_format(
    available: &[vk::SurfaceFormatKHR],
    requested: &[vk::Format],
    color_space: vk::ColorSpaceKHR,
) -> Option<vk::SurfaceFormatKHR> {
    let first = *available.first()?;

    // A lone UNDEFINED entry means the surface takes any format.
    if available.len() == 1 && first.format == vk::Format::UNDEFINED {
        let format = requested.first().copied().unwrap_or(vk::Format::B8G8R8A8_UNORM);
        return Some(vk::SurfaceFormatKHR { format, color_space });
    }

    requested
        .iter()
        .find_map(|format| {
            available
                .iter()
                .find(|a| a.format == *format && a.color_space == color_space)
                .copied()
        })
        .or(Some(first))
}

pub fn select_present_mode(
    available: &[vk::PresentModeKHR],
    requested: &[vk::PresentModeKHR],
) -> vk::PresentModeKHR {
    requested
        .iter()
        .find(|m| available.contains(m))
        .or_else(|| available.first())
        .copied()
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

/// Requested minimum, raised to the surface minimum and capped by its maximum
/// (zero means unbounded).
pub fn image_count(min_image_count: u32, caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let count = min_image_count.max(caps.min_image_count);
    if caps.max_image_count != 0 {
        count.min(caps.max_image_count)
    } else {
        count
    }
}

pub fn swapchain_extent(width: u32, height: u32, caps: &vk::SurfaceCapabilitiesKHR) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        return caps.current_extent;
    }

    vk::Extent2D {
        width: width.clamp(caps.min_image_extent.width, caps.max_image_extent.width),
        height: height.clamp(caps.min_image_extent.height, caps.max_image_extent.height),
    }
}

/// Owns the swapchain, its render pass and everything allocated per image.
pub struct SwapchainManager {
    surface: vk::SurfaceKHR,
    surface_format: vk::SurfaceFormatKHR,
    present_mode: vk::PresentModeKHR,
    swapchain: vk::SwapchainKHR,
    render_pass: vk::RenderPass,
    extent: vk::Extent2D,
    frames: Vec<Frame>,
    semaphores: Vec<FrameSemaphores>,
    complete: bool,
}

impl SwapchainManager {
    /// Negotiates the render target format and present mode for `surface`.
    /// No swapchain exists until the first `build_or_resize`.
    pub fn new<D: DeviceApi>(device: &D, surface: vk::SurfaceKHR) -> Result<Self, GpuError> {
        let formats = device
            .surface_formats(surface)
            .at("vkGetPhysicalDeviceSurfaceFormatsKHR")?;
        let surface_format =
            select_surface_format(&formats, &PREFERRED_FORMATS, PREFERRED_COLOR_SPACE).ok_or(
                GpuError::Call {
                    call: "vkGetPhysicalDeviceSurfaceFormatsKHR",
                    code: vk::ErrorCode::FORMAT_NOT_SUPPORTED,
                },
            )?;

        let modes = device
            .surface_present_modes(surface)
            .at("vkGetPhysicalDeviceSurfacePresentModesKHR")?;
        let present_mode = select_present_mode(&modes, &PREFERRED_PRESENT_MODES);

        tracing::info!(
            "Render target {:?}/{:?}, present mode {:?}.",
            surface_format.format,
            surface_format.color_space,
            present_mode
        );

        Ok(Self {
            surface,
            surface_format,
            present_mode,
            swapchain: vk::SwapchainKHR::null(),
            render_pass: vk::RenderPass::null(),
            extent: vk::Extent2D::default(),
            frames: Vec::new(),
            semaphores: Vec::new(),
            complete: false,
        })
    }

    /// (Re)creates the swapchain and every per-image resource for a
    /// `width` x `height` window. Waits for the device to go idle before
    /// anything in flight is destroyed.
    pub fn build_or_resize<D: DeviceApi>(
        &mut self,
        device: &D,
        queue_family: u32,
        width: u32,
        height: u32,
        min_image_count: u32,
    ) -> Result<(), GpuError> {
        device.wait_idle().at("vkDeviceWaitIdle")?;

        self.complete = false;
        self.destroy_frames(device);

        let caps = device
            .surface_capabilities(self.surface)
            .at("vkGetPhysicalDeviceSurfaceCapabilitiesKHR")?;
        let extent = swapchain_extent(width, height, &caps);

        let old_swapchain = mem::replace(&mut self.swapchain, vk::SwapchainKHR::null());
        let created = device.create_swapchain(&SwapchainRequest {
            surface: self.surface,
            min_image_count: image_count(min_image_count, &caps),
            surface_format: self.surface_format,
            present_mode: self.present_mode,
            extent,
            pre_transform: caps.current_transform,
            old_swapchain,
        });
        if !old_swapchain.is_null() {
            device.destroy_swapchain(old_swapchain);
        }
        self.swapchain = created.at("vkCreateSwapchainKHR")?;
        self.extent = extent;

        let images = device
            .swapchain_images(self.swapchain)
            .at("vkGetSwapchainImagesKHR")?;

        self.render_pass = device
            .create_render_pass(self.surface_format.format)
            .at("vkCreateRenderPass")?;

        for image in images {
            self.frames.push(Frame {
                image,
                ..Frame::default()
            });
            self.create_frame(device, queue_family)?;

            self.semaphores.push(FrameSemaphores::default());
            self.create_semaphores(device)?;
        }

        self.complete = true;
        tracing::info!(
            "Swapchain built: {} images, {}x{}.",
            self.frames.len(),
            extent.width,
            extent.height
        );
        Ok(())
    }

    /// Fills in the last pushed frame. Handles are stored as soon as they
    /// exist so a failure part way leaves nothing untracked.
    fn create_frame<D: DeviceApi>(&mut self, device: &D, queue_family: u32) -> Result<(), GpuError> {
        let format = self.surface_format.format;
        let (render_pass, extent) = (self.render_pass, self.extent);
        let Some(frame) = self.frames.last_mut() else {
            return Ok(());
        };

        frame.image_view = device
            .create_image_view(frame.image, format)
            .at("vkCreateImageView")?;
        frame.framebuffer = device
            .create_framebuffer(render_pass, frame.image_view, extent)
            .at("vkCreateFramebuffer")?;
        frame.command_pool = device
            .create_command_pool(queue_family)
            .at("vkCreateCommandPool")?;
        frame.command_buffer = device
            .allocate_command_buffer(frame.command_pool)
            .at("vkAllocateCommandBuffers")?;
        // Signalled so the first wait on a fresh frame returns at once.
        frame.fence = device.create_fence(true).at("vkCreateFence")?;
        Ok(())
    }

    fn create_semaphores<D: DeviceApi>(&mut self, device: &D) -> Result<(), GpuError> {
        let Some(pair) = self.semaphores.last_mut() else {
            return Ok(());
        };

        pair.image_acquired = device.create_semaphore().at("vkCreateSemaphore")?;
        pair.render_complete = device.create_semaphore().at("vkCreateSemaphore")?;
        Ok(())
    }

    fn destroy_frames<D: DeviceApi>(&mut self, device: &D) {
        for frame in self.frames.drain(..) {
            if !frame.fence.is_null() {
                device.destroy_fence(frame.fence);
            }
            if !frame.command_buffer.is_null() {
                device.free_command_buffer(frame.command_pool, frame.command_buffer);
            }
            if !frame.command_pool.is_null() {
                device.destroy_command_pool(frame.command_pool);
            }
            if !frame.framebuffer.is_null() {
                device.destroy_framebuffer(frame.framebuffer);
            }
            if !frame.image_view.is_null() {
                device.destroy_image_view(frame.image_view);
            }
        }

        for pair in self.semaphores.drain(..) {
            if !pair.image_acquired.is_null() {
                device.destroy_semaphore(pair.image_acquired);
            }
            if !pair.render_complete.is_null() {
                device.destroy_semaphore(pair.render_complete);
            }
        }

        if !self.render_pass.is_null() {
            device.destroy_render_pass(self.render_pass);
            self.render_pass = vk::RenderPass::null();
        }
    }

    /// Releases every per-image resource and the swapchain. The caller must
    /// have waited for the device to go idle.
    pub fn destroy<D: DeviceApi>(&mut self, device: &D) {
        self.complete = false;
        self.destroy_frames(device);

        if !self.swapchain.is_null() {
            device.destroy_swapchain(self.swapchain);
            self.swapchain = vk::SwapchainKHR::null();
        }
    }

    pub fn is_ready(&self) -> bool {
        self.complete
    }

    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    pub fn image_count(&self) -> usize {
        self.frames.len()
    }

    pub fn frame(&self, image_index: u32) -> Option<&Frame> {
        self.frames.get(image_index as usize)
    }

    pub fn semaphores(&self, index: usize) -> Option<&FrameSemaphores> {
        self.semaphores.get(index)
    }
}

use vulkanalia::vk::{self, Handle};
use vulkanalia::window as vk_window;
use winit::window::Window;

use super::api::DeviceApi;
use super::context::DeviceContext;
use super::error::{CallSite, GpuError, InitError};

#[derive(Debug)]
pub struct SurfaceBinding {
    surface: vk::SurfaceKHR,
}

impl SurfaceBinding {
    pub unsafe fn bind(context: &DeviceContext, window: &Window) -> Result<Self, GpuError> {
        let surface = unsafe { vk_window::create_surface(&context.instance, window, window) }
            .at("vkCreateSurfaceKHR")?;
        tracing::debug!("Created window surface {:?}.", surface);
        Ok(Self { surface })
    }

    pub fn from_handle(surface: vk::SurfaceKHR) -> Self {
        Self { surface }
    }

    /// The chosen queue family must be able to present to this surface. There
    /// is no fallback search for a separate present queue.
    pub fn verify_present_support<D: DeviceApi>(&self, device: &D) -> Result<(), InitError> {
        let queue_family = device.queue_family();
        let supported = device
            .surface_support(queue_family, self.surface)
            .at("vkGetPhysicalDeviceSurfaceSupportKHR")?;
        if supported {
            Ok(())
        } else {
            Err(InitError::PresentNotSupported(queue_family))
        }
    }

    pub fn handle(&self) -> vk::SurfaceKHR {
        self.surface
    }

    /// Must run after the swapchain built on this surface is gone.
    pub fn destroy<D: DeviceApi>(&mut self, device: &D) {
        if !self.surface.is_null() {
            device.destroy_surface(self.surface);
            self.surface = vk::SurfaceKHR::null();
        }
    }
}

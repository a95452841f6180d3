use anyhow::Result;
use vulkanalia::vk;

use crate::app::engine::ui::{DrawData, UiBindings, UiRenderer};

pub mod api;
pub mod context;
pub mod error;
pub mod frame;
#[cfg(test)]
pub mod mock;
pub mod surface;
pub mod swapchain;

pub use api::DeviceApi;
pub use context::DeviceContext;
pub use error::{GpuError, InitError};
pub use frame::{FrameScheduler, FrameStatus};
pub use surface::SurfaceBinding;
pub use swapchain::SwapchainManager;

/// Everything that turns UI draw data into presented images for one window.
pub struct Renderer<D: DeviceApi> {
    device: D,
    surface: SurfaceBinding,
    swapchain: SwapchainManager,
    scheduler: FrameScheduler,
    min_image_count: u32,
    // Window size the swapchain was last built for; the surface may have
    // chosen a different extent.
    target_size: (u32, u32),
}

impl<D: DeviceApi> Renderer<D> {
    /// Checks that the device can present to `surface` and builds the first
    /// swapchain. On failure the surface and device are released before
    /// returning.
    pub fn new(
        mut device: D,
        mut surface: SurfaceBinding,
        width: u32,
        height: u32,
        min_image_count: u32,
    ) -> Result<Self, InitError> {
        match Self::first_swapchain(&device, &surface, width, height, min_image_count) {
            Ok(swapchain) => Ok(Self {
                device,
                surface,
                swapchain,
                scheduler: FrameScheduler::new(),
                min_image_count,
                target_size: (width, height),
            }),
            Err(err) => {
                surface.destroy(&device);
                device.destroy();
                Err(err)
            }
        }
    }

    fn first_swapchain(
        device: &D,
        surface: &SurfaceBinding,
        width: u32,
        height: u32,
        min_image_count: u32,
    ) -> Result<SwapchainManager, InitError> {
        surface.verify_present_support(device)?;

        let mut swapchain = SwapchainManager::new(device, surface.handle())?;
        if let Err(err) =
            swapchain.build_or_resize(device, device.queue_family(), width, height, min_image_count)
        {
            swapchain.destroy(device);
            return Err(err.into());
        }
        Ok(swapchain)
    }

    pub fn needs_rebuild(&self) -> bool {
        self.scheduler.rebuild_pending()
    }

    pub fn request_rebuild(&mut self) {
        self.scheduler.request_rebuild();
    }

    /// Rebuilds the swapchain for a `width` x `height` framebuffer. A failed
    /// build leaves the rebuild pending so the next iteration tries again.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), GpuError> {
        self.scheduler.request_rebuild();
        self.swapchain.build_or_resize(
            &self.device,
            self.device.queue_family(),
            width,
            height,
            self.min_image_count,
        )?;
        self.scheduler.on_rebuild(self.swapchain.image_count());
        self.target_size = (width, height);

        let extent = self.swapchain.extent();
        tracing::debug!(
            "Swapchain rebuilt at {}x{} with {} images.",
            extent.width,
            extent.height,
            self.swapchain.image_count()
        );
        Ok(())
    }

    pub fn draw_frame<U: UiRenderer>(
        &mut self,
        ui: &mut U,
        draw_data: &DrawData,
    ) -> Result<FrameStatus, GpuError> {
        self.scheduler
            .draw(&self.device, &self.swapchain, ui, draw_data)
    }

    pub fn upload_fonts<U: UiRenderer>(&self, ui: &mut U) -> Result<()> {
        self.scheduler.upload_fonts(&self.device, &self.swapchain, ui)
    }

    pub fn ui_bindings(&self) -> UiBindings {
        UiBindings {
            queue_family: self.device.queue_family(),
            descriptor_pool: self.device.descriptor_pool(),
            render_pass: self.swapchain.render_pass(),
            min_image_count: self.min_image_count,
            image_count: self.swapchain.image_count() as u32,
        }
    }

    pub fn min_image_count(&self) -> u32 {
        self.min_image_count
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent()
    }

    pub fn target_size(&self) -> (u32, u32) {
        self.target_size
    }

    #[cfg(test)]
    pub fn device(&self) -> &D {
        &self.device
    }

    #[cfg(test)]
    pub fn scheduler(&self) -> &FrameScheduler {
        &self.scheduler
    }

    /// Tears down in dependency order: nothing may still be executing when
    /// the UI and the per-image resources go, and the surface outlives the
    /// swapchain built on it.
    pub fn shutdown<U: UiRenderer>(mut self, ui: &mut U) {
        if let Err(err) = self.device.wait_idle() {
            tracing::error!("vkDeviceWaitIdle failed during shutdown: {}", err);
        }
        ui.shutdown();
        self.swapchain.destroy(&self.device);
        self.surface.destroy(&self.device);
        self.device.destroy();
        tracing::info!("Renderer shut down.");
    }
}

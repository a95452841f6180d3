use vulkanalia::vk::{self, Handle};

use super::api::{DeviceApi, Submission};
use super::error::{CallSite, GpuError};
use super::swapchain::{FrameSemaphores, SwapchainManager};
use crate::app::engine::ui::{DrawData, UiRenderer};

/// How a frame attempt ended, when it did not fail.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FrameStatus {
    Presented,
    Stale,
    Minimized,
    NotReady,
}

/// Drives acquire → record → submit → present and owns the two rotating
/// indices.
///
/// `frame_index` is the image the swapchain handed out last and selects the
/// command pool, buffer and fence. `semaphore_index` walks the semaphore
/// pairs independently and only moves after a successful present.
#[derive(Debug, Default)]
pub struct FrameScheduler {
    frame_index: u32,
    semaphore_index: usize,
    rebuild_pending: bool,
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frame_index(&self) -> u32 {
        self.frame_index
    }

    pub fn semaphore_index(&self) -> usize {
        self.semaphore_index
    }

    pub fn rebuild_pending(&self) -> bool {
        self.rebuild_pending
    }

    pub fn request_rebuild(&mut self) {
        self.rebuild_pending = true;
    }

    /// Resets after the swapchain was rebuilt. The semaphore rotation carries
    /// over so a pair that may still be pending is not handed out again.
    pub fn on_rebuild(&mut self, image_count: usize) {
        self.frame_index = 0;
        if image_count > 0 {
            self.semaphore_index %= image_count;
        }
        self.rebuild_pending = false;
    }

    pub fn draw<D: DeviceApi, U: UiRenderer>(
        &mut self,
        device: &D,
        swapchain: &SwapchainManager,
        ui: &mut U,
        draw_data: &DrawData,
    ) -> Result<FrameStatus, GpuError> {
        if draw_data.is_minimized() {
            return Ok(FrameStatus::Minimized);
        }
        if !swapchain.is_ready() {
            return Ok(FrameStatus::NotReady);
        }

        let Some(image_index) = self.acquire(device, swapchain)? else {
            return Ok(FrameStatus::Stale);
        };

        // From here on the acquire semaphore is signalled and the fence may
        // be reset; abandoning the frame leaves both unusable until rebuilt.
        if let Err(err) = self.record_and_submit(device, swapchain, ui, draw_data, image_index) {
            self.rebuild_pending = true;
            return Err(err);
        }

        self.present(device, swapchain, image_index)
    }

    fn acquire<D: DeviceApi>(
        &mut self,
        device: &D,
        swapchain: &SwapchainManager,
    ) -> Result<Option<u32>, GpuError> {
        let semaphores = self.current_semaphores(swapchain)?;

        match device.acquire_next_image(swapchain.handle(), semaphores.image_acquired) {
            Ok((_, vk::SuccessCode::SUBOPTIMAL_KHR)) | Err(vk::ErrorCode::OUT_OF_DATE_KHR) => {
                tracing::debug!("Surface out of date on acquire, rebuilding.");
                self.rebuild_pending = true;
                Ok(None)
            }
            Ok((index, _)) => {
                self.frame_index = index;
                Ok(Some(index))
            }
            Err(code) => Err(GpuError::Call {
                call: "vkAcquireNextImageKHR",
                code,
            }),
        }
    }

    fn record_and_submit<D: DeviceApi, U: UiRenderer>(
        &self,
        device: &D,
        swapchain: &SwapchainManager,
        ui: &mut U,
        draw_data: &DrawData,
        image_index: u32,
    ) -> Result<(), GpuError> {
        let frame = swapchain
            .frame(image_index)
            .ok_or(GpuError::UnknownImage(image_index))?;
        let semaphores = self.current_semaphores(swapchain)?;

        // Blocks until the GPU is done with this frame's pool and buffer.
        device.wait_for_fence(frame.fence).at("vkWaitForFences")?;
        device.reset_fence(frame.fence).at("vkResetFences")?;
        device
            .reset_command_pool(frame.command_pool)
            .at("vkResetCommandPool")?;

        let cmd = frame.command_buffer;
        device.begin_command_buffer(cmd).at("vkBeginCommandBuffer")?;
        device.cmd_begin_render_pass(
            cmd,
            swapchain.render_pass(),
            frame.framebuffer,
            swapchain.extent(),
            draw_data.clear_color,
        );
        ui.emit_draw_commands(draw_data, cmd);
        device.cmd_end_render_pass(cmd);
        device.end_command_buffer(cmd).at("vkEndCommandBuffer")?;

        device
            .submit(&Submission {
                command_buffer: cmd,
                wait: Some((
                    semaphores.image_acquired,
                    vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                )),
                signal: Some(semaphores.render_complete),
                fence: frame.fence,
            })
            .at("vkQueueSubmit")
    }

    fn present<D: DeviceApi>(
        &mut self,
        device: &D,
        swapchain: &SwapchainManager,
        image_index: u32,
    ) -> Result<FrameStatus, GpuError> {
        let semaphores = self.current_semaphores(swapchain)?;

        match device.present(swapchain.handle(), image_index, semaphores.render_complete) {
            Ok(vk::SuccessCode::SUBOPTIMAL_KHR) | Err(vk::ErrorCode::OUT_OF_DATE_KHR) => {
                tracing::debug!("Surface out of date on present, rebuilding.");
                self.rebuild_pending = true;
                Ok(FrameStatus::Stale)
            }
            Ok(_) => {
                self.semaphore_index = (self.semaphore_index + 1) % swapchain.image_count();
                Ok(FrameStatus::Presented)
            }
            Err(code) => Err(GpuError::Call {
                call: "vkQueuePresentKHR",
                code,
            }),
        }
    }

    fn current_semaphores<'a>(
        &self,
        swapchain: &'a SwapchainManager,
    ) -> Result<&'a FrameSemaphores, GpuError> {
        swapchain
            .semaphores(self.semaphore_index)
            .ok_or(GpuError::NoSemaphores(self.semaphore_index))
    }

    /// One-time font upload through the current frame's command buffer.
    /// Waits for the device to go idle before the UI frees its staging data.
    pub fn upload_fonts<D: DeviceApi, U: UiRenderer>(
        &self,
        device: &D,
        swapchain: &SwapchainManager,
        ui: &mut U,
    ) -> anyhow::Result<()> {
        let frame = swapchain
            .frame(self.frame_index)
            .ok_or(GpuError::UnknownImage(self.frame_index))?;
        let cmd = frame.command_buffer;

        device
            .reset_command_pool(frame.command_pool)
            .at("vkResetCommandPool")?;
        device.begin_command_buffer(cmd).at("vkBeginCommandBuffer")?;
        ui.upload_font_resources(cmd)?;
        device.end_command_buffer(cmd).at("vkEndCommandBuffer")?;
        device
            .submit(&Submission {
                command_buffer: cmd,
                wait: None,
                signal: None,
                fence: vk::Fence::null(),
            })
            .at("vkQueueSubmit")?;
        device.wait_idle().at("vkDeviceWaitIdle")?;

        ui.destroy_font_upload_objects();
        Ok(())
    }
}

//! Recording stand-ins for the device and the UI, used by the unit tests.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;

use anyhow::Result;
use vulkanalia::prelude::v1_0::*;
use vulkanalia::vk::Handle;

use super::api::{DeviceApi, Submission, SwapchainRequest};
use crate::app::engine::ui::{DrawData, UiBindings, UiRenderer};

/// Owned by the device itself, so never part of the live set.
pub const DESCRIPTOR_POOL: u64 = 0xDE5C;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Call {
    SurfaceSupport,
    SurfaceCapabilities,
    SurfaceFormats,
    SurfacePresentModes,
    DestroySurface,
    CreateSwapchain,
    SwapchainImages,
    DestroySwapchain,
    CreateRenderPass,
    DestroyRenderPass,
    CreateImageView,
    DestroyImageView,
    CreateFramebuffer,
    DestroyFramebuffer,
    CreateCommandPool,
    DestroyCommandPool,
    AllocateCommandBuffer,
    FreeCommandBuffer,
    CreateFence,
    DestroyFence,
    CreateSemaphore,
    DestroySemaphore,
    WaitIdle,
    AcquireNextImage,
    WaitForFence,
    ResetFence,
    ResetCommandPool,
    BeginCommandBuffer,
    EndCommandBuffer,
    BeginRenderPass,
    EndRenderPass,
    Submit,
    Present,
    DestroyDevice,
    UiShutdown,
    WindowClosed,
}

/// Ordered record of calls, shareable between doubles.
#[derive(Clone, Debug, Default)]
pub struct CallLog(Rc<RefCell<Vec<Call>>>);

impl CallLog {
    pub fn push(&self, call: Call) {
        self.0.borrow_mut().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.borrow().clone()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

pub struct MockState {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
    pub present_support: bool,
    /// Images per swapchain; defaults to the requested minimum.
    pub image_count: Option<u32>,
    pub failures: HashMap<Call, vk::ErrorCode>,
    acquire_script: VecDeque<VkSuccessResult<u32>>,
    present_script: VecDeque<VkResult<vk::SuccessCode>>,
    next_handle: u64,
    live: HashSet<u64>,
    signaled: HashMap<u64, bool>,
    swapchain_images: HashMap<u64, u32>,
    next_image: u32,
    stale_uses: Vec<(Call, u64)>,
    hangs: usize,
    swapchain_requests: Vec<SwapchainRequest>,
    submissions: Vec<Submission>,
    present_waits: Vec<vk::Semaphore>,
    clear_colors: Vec<[f32; 4]>,
}

/// A device whose GPU finishes every submission immediately.
pub struct MockDevice {
    pub state: RefCell<MockState>,
    log: CallLog,
    surface: vk::SurfaceKHR,
}

impl MockDevice {
    pub fn new() -> Self {
        Self::with_log(CallLog::default())
    }

    pub fn with_log(log: CallLog) -> Self {
        let mut state = MockState {
            capabilities: vk::SurfaceCapabilitiesKHR {
                min_image_count: 2,
                max_image_count: 8,
                current_extent: vk::Extent2D {
                    width: u32::MAX,
                    height: u32::MAX,
                },
                min_image_extent: vk::Extent2D {
                    width: 1,
                    height: 1,
                },
                max_image_extent: vk::Extent2D {
                    width: 16384,
                    height: 16384,
                },
                ..Default::default()
            },
            formats: vec![vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            }],
            present_modes: vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX],
            present_support: true,
            image_count: None,
            failures: HashMap::new(),
            acquire_script: VecDeque::new(),
            present_script: VecDeque::new(),
            next_handle: 1,
            live: HashSet::new(),
            signaled: HashMap::new(),
            swapchain_images: HashMap::new(),
            next_image: 0,
            stale_uses: Vec::new(),
            hangs: 0,
            swapchain_requests: Vec::new(),
            submissions: Vec::new(),
            present_waits: Vec::new(),
            clear_colors: Vec::new(),
        };
        let surface = vk::SurfaceKHR::from_raw(state.allocate());

        Self {
            state: RefCell::new(state),
            log,
            surface,
        }
    }

    pub fn surface(&self) -> vk::SurfaceKHR {
        self.surface
    }

    pub fn log(&self) -> CallLog {
        self.log.clone()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.log.calls()
    }

    pub fn clear_calls(&self) {
        self.log.clear();
    }

    pub fn count(&self, call: Call) -> usize {
        self.log.calls().iter().filter(|c| **c == call).count()
    }

    pub fn fail(&self, call: Call, code: vk::ErrorCode) {
        self.state.borrow_mut().failures.insert(call, code);
    }

    pub fn script_acquire(&self, result: VkSuccessResult<u32>) {
        self.state.borrow_mut().acquire_script.push_back(result);
    }

    pub fn script_present(&self, result: VkResult<vk::SuccessCode>) {
        self.state.borrow_mut().present_script.push_back(result);
    }

    pub fn is_live(&self, raw: u64) -> bool {
        self.state.borrow().live.contains(&raw)
    }

    pub fn live_count(&self) -> usize {
        self.state.borrow().live.len()
    }

    /// Destroyed (or never created) handles that were passed to a call.
    pub fn stale_uses(&self) -> Vec<(Call, u64)> {
        self.state.borrow().stale_uses.clone()
    }

    /// Waits on a fence nothing will ever signal.
    pub fn hangs(&self) -> usize {
        self.state.borrow().hangs
    }

    pub fn fence_signaled(&self, fence: vk::Fence) -> bool {
        self.state
            .borrow()
            .signaled
            .get(&fence.as_raw())
            .copied()
            .unwrap_or(false)
    }

    pub fn last_swapchain_extent(&self) -> Option<vk::Extent2D> {
        self.state.borrow().swapchain_requests.last().map(|r| r.extent)
    }

    pub fn last_old_swapchain(&self) -> Option<vk::SwapchainKHR> {
        self.state
            .borrow()
            .swapchain_requests
            .last()
            .map(|r| r.old_swapchain)
    }

    pub fn last_submission(&self) -> Option<Submission> {
        self.state.borrow().submissions.last().copied()
    }

    pub fn last_present_wait(&self) -> Option<vk::Semaphore> {
        self.state.borrow().present_waits.last().copied()
    }

    pub fn last_clear_color(&self) -> Option<[f32; 4]> {
        self.state.borrow().clear_colors.last().copied()
    }

    fn record(&self, call: Call) -> VkResult<()> {
        self.log.push(call);
        match self.state.borrow().failures.get(&call) {
            Some(code) => Err(*code),
            None => Ok(()),
        }
    }

    fn touch(&self, call: Call, raw: u64) {
        let mut state = self.state.borrow_mut();
        if raw != 0 && !state.live.contains(&raw) {
            state.stale_uses.push((call, raw));
        }
    }

    fn create(&self, call: Call) -> VkResult<u64> {
        self.record(call)?;
        let mut state = self.state.borrow_mut();
        let raw = state.allocate();
        Ok(raw)
    }

    fn release(&self, call: Call, raw: u64) {
        self.log.push(call);
        let mut state = self.state.borrow_mut();
        if !state.live.remove(&raw) {
            state.stale_uses.push((call, raw));
        }
        state.signaled.remove(&raw);
    }
}

impl MockState {
    fn allocate(&mut self) -> u64 {
        let raw = self.next_handle;
        self.next_handle += 1;
        self.live.insert(raw);
        raw
    }
}

fn raw_cmd(command_buffer: vk::CommandBuffer) -> u64 {
    command_buffer.as_raw() as u64
}

impl DeviceApi for MockDevice {
    fn queue_family(&self) -> u32 {
        0
    }

    fn descriptor_pool(&self) -> vk::DescriptorPool {
        vk::DescriptorPool::from_raw(DESCRIPTOR_POOL)
    }

    fn surface_support(&self, _queue_family: u32, surface: vk::SurfaceKHR) -> VkResult<bool> {
        self.record(Call::SurfaceSupport)?;
        self.touch(Call::SurfaceSupport, surface.as_raw());
        Ok(self.state.borrow().present_support)
    }

    fn surface_capabilities(
        &self,
        surface: vk::SurfaceKHR,
    ) -> VkResult<vk::SurfaceCapabilitiesKHR> {
        self.record(Call::SurfaceCapabilities)?;
        self.touch(Call::SurfaceCapabilities, surface.as_raw());
        Ok(self.state.borrow().capabilities)
    }

    fn surface_formats(&self, surface: vk::SurfaceKHR) -> VkResult<Vec<vk::SurfaceFormatKHR>> {
        self.record(Call::SurfaceFormats)?;
        self.touch(Call::SurfaceFormats, surface.as_raw());
        Ok(self.state.borrow().formats.clone())
    }

    fn surface_present_modes(&self, surface: vk::SurfaceKHR) -> VkResult<Vec<vk::PresentModeKHR>> {
        self.record(Call::SurfacePresentModes)?;
        self.touch(Call::SurfacePresentModes, surface.as_raw());
        Ok(self.state.borrow().present_modes.clone())
    }

    fn destroy_surface(&self, surface: vk::SurfaceKHR) {
        self.release(Call::DestroySurface, surface.as_raw());
    }

    fn create_swapchain(&self, request: &SwapchainRequest) -> VkResult<vk::SwapchainKHR> {
        self.touch(Call::CreateSwapchain, request.surface.as_raw());
        self.touch(Call::CreateSwapchain, request.old_swapchain.as_raw());
        let raw = self.create(Call::CreateSwapchain)?;

        let mut state = self.state.borrow_mut();
        let count = state.image_count.unwrap_or(request.min_image_count);
        state.swapchain_images.insert(raw, count);
        state.swapchain_requests.push(*request);
        state.next_image = 0;
        Ok(vk::SwapchainKHR::from_raw(raw))
    }

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>> {
        self.record(Call::SwapchainImages)?;
        self.touch(Call::SwapchainImages, swapchain.as_raw());

        let mut state = self.state.borrow_mut();
        let count = state
            .swapchain_images
            .get(&swapchain.as_raw())
            .copied()
            .unwrap_or(0);
        // Images belong to the swapchain and are never destroyed on their own.
        let images = (0..count)
            .map(|_| {
                let raw = state.next_handle;
                state.next_handle += 1;
                vk::Image::from_raw(raw)
            })
            .collect();
        Ok(images)
    }

    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
        self.release(Call::DestroySwapchain, swapchain.as_raw());
    }

    fn create_render_pass(&self, _format: vk::Format) -> VkResult<vk::RenderPass> {
        Ok(vk::RenderPass::from_raw(self.create(Call::CreateRenderPass)?))
    }

    fn destroy_render_pass(&self, render_pass: vk::RenderPass) {
        self.release(Call::DestroyRenderPass, render_pass.as_raw());
    }

    fn create_image_view(&self, _image: vk::Image, _format: vk::Format) -> VkResult<vk::ImageView> {
        Ok(vk::ImageView::from_raw(self.create(Call::CreateImageView)?))
    }

    fn destroy_image_view(&self, view: vk::ImageView) {
        self.release(Call::DestroyImageView, view.as_raw());
    }

    fn create_framebuffer(
        &self,
        render_pass: vk::RenderPass,
        view: vk::ImageView,
        _extent: vk::Extent2D,
    ) -> VkResult<vk::Framebuffer> {
        self.touch(Call::CreateFramebuffer, render_pass.as_raw());
        self.touch(Call::CreateFramebuffer, view.as_raw());
        Ok(vk::Framebuffer::from_raw(self.create(Call::CreateFramebuffer)?))
    }

    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer) {
        self.release(Call::DestroyFramebuffer, framebuffer.as_raw());
    }

    fn create_command_pool(&self, _queue_family: u32) -> VkResult<vk::CommandPool> {
        Ok(vk::CommandPool::from_raw(self.create(Call::CreateCommandPool)?))
    }

    fn destroy_command_pool(&self, pool: vk::CommandPool) {
        self.release(Call::DestroyCommandPool, pool.as_raw());
    }

    fn allocate_command_buffer(&self, pool: vk::CommandPool) -> VkResult<vk::CommandBuffer> {
        self.touch(Call::AllocateCommandBuffer, pool.as_raw());
        let raw = self.create(Call::AllocateCommandBuffer)?;
        Ok(vk::CommandBuffer::from_raw(raw as usize))
    }

    fn free_command_buffer(&self, pool: vk::CommandPool, command_buffer: vk::CommandBuffer) {
        self.touch(Call::FreeCommandBuffer, pool.as_raw());
        self.release(Call::FreeCommandBuffer, raw_cmd(command_buffer));
    }

    fn create_fence(&self, signaled: bool) -> VkResult<vk::Fence> {
        let raw = self.create(Call::CreateFence)?;
        self.state.borrow_mut().signaled.insert(raw, signaled);
        Ok(vk::Fence::from_raw(raw))
    }

    fn destroy_fence(&self, fence: vk::Fence) {
        self.release(Call::DestroyFence, fence.as_raw());
    }

    fn create_semaphore(&self) -> VkResult<vk::Semaphore> {
        Ok(vk::Semaphore::from_raw(self.create(Call::CreateSemaphore)?))
    }

    fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        self.release(Call::DestroySemaphore, semaphore.as_raw());
    }

    fn wait_idle(&self) -> VkResult<()> {
        self.record(Call::WaitIdle)
    }

    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        semaphore: vk::Semaphore,
    ) -> VkSuccessResult<u32> {
        self.record(Call::AcquireNextImage)?;
        self.touch(Call::AcquireNextImage, swapchain.as_raw());
        self.touch(Call::AcquireNextImage, semaphore.as_raw());

        let mut state = self.state.borrow_mut();
        if let Some(result) = state.acquire_script.pop_front() {
            return result;
        }
        let count = state
            .swapchain_images
            .get(&swapchain.as_raw())
            .copied()
            .unwrap_or(1)
            .max(1);
        let index = state.next_image % count;
        state.next_image = index + 1;
        Ok((index, vk::SuccessCode::SUCCESS))
    }

    fn wait_for_fence(&self, fence: vk::Fence) -> VkResult<()> {
        self.record(Call::WaitForFence)?;
        self.touch(Call::WaitForFence, fence.as_raw());
        let mut state = self.state.borrow_mut();
        if !state.signaled.get(&fence.as_raw()).copied().unwrap_or(false) {
            state.hangs += 1;
        }
        Ok(())
    }

    fn reset_fence(&self, fence: vk::Fence) -> VkResult<()> {
        self.record(Call::ResetFence)?;
        self.touch(Call::ResetFence, fence.as_raw());
        self.state.borrow_mut().signaled.insert(fence.as_raw(), false);
        Ok(())
    }

    fn reset_command_pool(&self, pool: vk::CommandPool) -> VkResult<()> {
        self.record(Call::ResetCommandPool)?;
        self.touch(Call::ResetCommandPool, pool.as_raw());
        Ok(())
    }

    fn begin_command_buffer(&self, command_buffer: vk::CommandBuffer) -> VkResult<()> {
        self.record(Call::BeginCommandBuffer)?;
        self.touch(Call::BeginCommandBuffer, raw_cmd(command_buffer));
        Ok(())
    }

    fn end_command_buffer(&self, command_buffer: vk::CommandBuffer) -> VkResult<()> {
        self.record(Call::EndCommandBuffer)?;
        self.touch(Call::EndCommandBuffer, raw_cmd(command_buffer));
        Ok(())
    }

    fn cmd_begin_render_pass(
        &self,
        command_buffer: vk::CommandBuffer,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        _extent: vk::Extent2D,
        clear_color: [f32; 4],
    ) {
        self.log.push(Call::BeginRenderPass);
        self.touch(Call::BeginRenderPass, raw_cmd(command_buffer));
        self.touch(Call::BeginRenderPass, render_pass.as_raw());
        self.touch(Call::BeginRenderPass, framebuffer.as_raw());
        self.state.borrow_mut().clear_colors.push(clear_color);
    }

    fn cmd_end_render_pass(&self, command_buffer: vk::CommandBuffer) {
        self.log.push(Call::EndRenderPass);
        self.touch(Call::EndRenderPass, raw_cmd(command_buffer));
    }

    fn submit(&self, submission: &Submission) -> VkResult<()> {
        self.record(Call::Submit)?;
        self.touch(Call::Submit, raw_cmd(submission.command_buffer));
        if let Some((semaphore, _)) = submission.wait {
            self.touch(Call::Submit, semaphore.as_raw());
        }
        if let Some(semaphore) = submission.signal {
            self.touch(Call::Submit, semaphore.as_raw());
        }
        self.touch(Call::Submit, submission.fence.as_raw());

        let mut state = self.state.borrow_mut();
        if !submission.fence.is_null() {
            state.signaled.insert(submission.fence.as_raw(), true);
        }
        state.submissions.push(*submission);
        Ok(())
    }

    fn present(
        &self,
        swapchain: vk::SwapchainKHR,
        _image_index: u32,
        wait: vk::Semaphore,
    ) -> VkResult<vk::SuccessCode> {
        self.record(Call::Present)?;
        self.touch(Call::Present, swapchain.as_raw());
        self.touch(Call::Present, wait.as_raw());

        let mut state = self.state.borrow_mut();
        state.present_waits.push(wait);
        state
            .present_script
            .pop_front()
            .unwrap_or(Ok(vk::SuccessCode::SUCCESS))
    }

    fn destroy(&mut self) {
        self.log.push(Call::DestroyDevice);
    }
}

/// Counts what the frame loop asks of the UI.
#[derive(Debug, Default)]
pub struct MockUi {
    pub log: Option<CallLog>,
    pub bindings: Option<UiBindings>,
    pub frames_begun: usize,
    pub display_size: (u32, u32),
    pub emitted: usize,
    pub fonts_uploaded: usize,
    pub upload_objects_destroyed: bool,
    pub min_image_count: Option<u32>,
    pub shut_down: bool,
}

impl MockUi {
    pub fn with_log(log: CallLog) -> Self {
        Self {
            log: Some(log),
            ..Self::default()
        }
    }
}

impl UiRenderer for MockUi {
    fn init(&mut self, bindings: &UiBindings) -> Result<()> {
        self.bindings = Some(*bindings);
        Ok(())
    }

    fn begin_frame(&mut self, framebuffer_size: (u32, u32)) {
        self.frames_begun += 1;
        self.display_size = framebuffer_size;
    }

    fn build_widgets(&mut self) {}

    fn render(&mut self) -> DrawData {
        DrawData {
            display_size: [self.display_size.0 as f32, self.display_size.1 as f32],
            clear_color: [0.1, 0.1, 0.1, 1.0],
        }
    }

    fn emit_draw_commands(&mut self, _draw_data: &DrawData, _command_buffer: vk::CommandBuffer) {
        self.emitted += 1;
    }

    fn upload_font_resources(&mut self, _command_buffer: vk::CommandBuffer) -> Result<()> {
        self.fonts_uploaded += 1;
        Ok(())
    }

    fn destroy_font_upload_objects(&mut self) {
        self.upload_objects_destroyed = true;
    }

    fn set_min_image_count(&mut self, min_image_count: u32) {
        self.min_image_count = Some(min_image_count);
    }

    fn shutdown(&mut self) {
        self.shut_down = true;
        if let Some(log) = &self.log {
            log.push(Call::UiShutdown);
        }
    }
}

use anyhow::Result;
use vulkanalia::vk;

/// What one UI frame produced. Draw lists stay inside the renderer that
/// built them; the frame loop only needs the size and background.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DrawData {
    pub display_size: [f32; 2],
    /// Premultiplied RGBA used to clear the render target.
    pub clear_color: [f32; 4],
}

impl DrawData {
    /// A zero-sized display means the window is minimized; nothing may be
    /// submitted for it.
    pub fn is_minimized(&self) -> bool {
        self.display_size[0] <= 0.0 || self.display_size[1] <= 0.0
    }
}

/// Handles the UI side needs from the device to create its pipelines.
#[derive(Copy, Clone, Debug)]
pub struct UiBindings {
    pub queue_family: u32,
    pub descriptor_pool: vk::DescriptorPool,
    pub render_pass: vk::RenderPass,
    pub min_image_count: u32,
    pub image_count: u32,
}

/// The immediate-mode UI toolkit driving each frame.
pub trait UiRenderer {
    fn init(&mut self, bindings: &UiBindings) -> Result<()>;

    fn begin_frame(&mut self, framebuffer_size: (u32, u32));
    fn build_widgets(&mut self);
    fn render(&mut self) -> DrawData;

    /// Records the draw data into `command_buffer`, inside the active render pass.
    fn emit_draw_commands(&mut self, draw_data: &DrawData, command_buffer: vk::CommandBuffer);

    /// Records the font atlas upload. Staging objects stay alive until
    /// `destroy_font_upload_objects` is called once the GPU is done with them.
    fn upload_font_resources(&mut self, command_buffer: vk::CommandBuffer) -> Result<()>;
    fn destroy_font_upload_objects(&mut self);

    /// Called after every swapchain rebuild.
    fn set_min_image_count(&mut self, _min_image_count: u32) {}

    fn shutdown(&mut self);
}

/// Clears the window to a flat background and draws nothing else.
pub struct Backdrop {
    background: [f32; 4],
    display_size: [f32; 2],
    bindings: Option<UiBindings>,
}

impl Backdrop {
    pub fn new(background: [f32; 4]) -> Self {
        Self {
            background,
            display_size: [0.0, 0.0],
            bindings: None,
        }
    }

    fn premultiplied(&self) -> [f32; 4] {
        let [r, g, b, a] = self.background;
        [r * a, g * a, b * a, a]
    }
}

impl UiRenderer for Backdrop {
    fn init(&mut self, bindings: &UiBindings) -> Result<()> {
        tracing::debug!(
            "UI bound to queue family {}, descriptor pool {:?}, render pass {:?} ({} images).",
            bindings.queue_family,
            bindings.descriptor_pool,
            bindings.render_pass,
            bindings.image_count
        );
        self.bindings = Some(*bindings);
        Ok(())
    }

    fn begin_frame(&mut self, framebuffer_size: (u32, u32)) {
        self.display_size = [framebuffer_size.0 as f32, framebuffer_size.1 as f32];
    }

    fn build_widgets(&mut self) {}

    fn render(&mut self) -> DrawData {
        DrawData {
            display_size: self.display_size,
            clear_color: self.premultiplied(),
        }
    }

    fn emit_draw_commands(&mut self, _draw_data: &DrawData, _command_buffer: vk::CommandBuffer) {}

    fn upload_font_resources(&mut self, _command_buffer: vk::CommandBuffer) -> Result<()> {
        tracing::debug!("No font atlas to upload.");
        Ok(())
    }

    fn destroy_font_upload_objects(&mut self) {}

    fn set_min_image_count(&mut self, min_image_count: u32) {
        if let Some(bindings) = self.bindings.as_mut() {
            bindings.min_image_count = min_image_count;
        }
    }

    fn shutdown(&mut self) {
        self.bindings = None;
    }
}

use renderer::{DeviceApi, FrameStatus, Renderer};
use ui::UiRenderer;

use crate::app::window::WindowSystem;

pub mod renderer;
pub mod ui;

/// Polls the window, rebuilds the swapchain when needed and draws one UI
/// frame per iteration until the window asks to close.
pub struct RenderLoop<W: WindowSystem, U: UiRenderer, D: DeviceApi> {
    window: W,
    ui: U,
    renderer: Renderer<D>,
    last_size: (u32, u32),
}

impl<W: WindowSystem, U: UiRenderer, D: DeviceApi> RenderLoop<W, U, D> {
    pub fn new(window: W, ui: U, renderer: Renderer<D>) -> Self {
        let last_size = window.framebuffer_size();
        Self {
            window,
            ui,
            renderer,
            last_size,
        }
    }

    pub fn run(mut self) {
        tracing::info!("Entering render loop.");
        while self.step() {}
        self.shutdown();
    }

    /// One poll-and-draw iteration. Returns `false` once the window wants to
    /// close; nothing is drawn in that case.
    pub fn step(&mut self) -> bool {
        self.window.poll_events();
        if self.window.should_close() {
            return false;
        }

        let size = self.window.framebuffer_size();
        self.track_resize(size);

        let (width, height) = size;
        if self.renderer.needs_rebuild() && width > 0 && height > 0 {
            match self.renderer.resize(width, height) {
                Ok(()) => self.ui.set_min_image_count(self.renderer.min_image_count()),
                Err(err) => tracing::error!("Swapchain rebuild failed: {}", err),
            }
        }

        self.ui.begin_frame(size);
        self.ui.build_widgets();
        let draw_data = self.ui.render();

        match self.renderer.draw_frame(&mut self.ui, &draw_data) {
            Ok(FrameStatus::Stale) => tracing::debug!("Surface is stale, rebuild scheduled."),
            Ok(_) => {}
            Err(err) => tracing::error!("Frame dropped: {}", err),
        }
        true
    }

    /// Schedules a rebuild when the window comes back from a zero size or
    /// reports a size the swapchain was not built for. The surface's own
    /// extent is not compared, since it may never match the window.
    fn track_resize(&mut self, size: (u32, u32)) {
        let was_empty = self.last_size.0 == 0 || self.last_size.1 == 0;
        self.last_size = size;
        if size.0 == 0 || size.1 == 0 {
            return;
        }

        if was_empty || size != self.renderer.target_size() {
            self.renderer.request_rebuild();
        }
    }

    fn shutdown(mut self) {
        self.renderer.shutdown(&mut self.ui);
        self.window.close();
        tracing::info!("Shut down cleanly.");
    }
}

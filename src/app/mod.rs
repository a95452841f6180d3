use anyhow::{Context, Result};

use config::AppConfig;
use engine::RenderLoop;
use engine::renderer::{DeviceApi, DeviceContext, Renderer, SurfaceBinding};
use engine::ui::{Backdrop, UiRenderer};
use window::{WindowSystem, WinitWindow};

pub mod config;
pub mod engine;
pub mod window;

pub type App = RenderLoop<WinitWindow, Backdrop, DeviceContext>;

/// Brings everything up in order: window, device, surface, swapchain, UI,
/// fonts. Whatever was created before a failing stage is released again.
pub fn init(config: &AppConfig) -> Result<App> {
    let window = WinitWindow::open(&config.title, config.width, config.height)
        .context("Failed to create window")?;

    // SAFETY: the window outlives the context and the surface created on it.
    let mut context = unsafe { DeviceContext::create(window.window()) }
        .context("Failed to initialise Vulkan")?;

    let surface = match unsafe { SurfaceBinding::bind(&context, window.window()) } {
        Ok(surface) => surface,
        Err(err) => {
            context.destroy();
            return Err(err).context("Failed to create window surface");
        }
    };

    let (width, height) = window.framebuffer_size();
    let renderer = Renderer::new(context, surface, width, height, config.min_image_count)
        .context("Failed to set up the swapchain")?;

    let mut ui = Backdrop::new(config.background);
    if let Err(err) = ui
        .init(&renderer.ui_bindings())
        .context("Failed to initialise the UI")
        .and_then(|()| renderer.upload_fonts(&mut ui).context("Failed to upload fonts"))
    {
        renderer.shutdown(&mut ui);
        return Err(err);
    }

    tracing::info!("Initialised {}x{} window.", width, height);
    Ok(RenderLoop::new(window, ui, renderer))
}

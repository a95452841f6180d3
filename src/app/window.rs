use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::error::OsError;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::{Window, WindowAttributes, WindowId};

/// What the render loop needs from the windowing system.
pub trait WindowSystem {
    /// Processes pending events without blocking.
    fn poll_events(&mut self);
    fn should_close(&self) -> bool;
    fn request_close(&mut self);
    /// Drawable size in pixels; zero in either dimension while minimized.
    fn framebuffer_size(&self) -> (u32, u32);
    /// Destroys the window and the event loop behind it.
    fn close(self);
}

/// Creates the window once the event loop reports it can.
struct Bootstrap {
    attributes: WindowAttributes,
    window: Option<Result<Window, OsError>>,
}

impl ApplicationHandler for Bootstrap {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            self.window = Some(event_loop.create_window(self.attributes.clone()));
        }
    }

    fn window_event(&mut self, _: &ActiveEventLoop, _: WindowId, _: WindowEvent) {}
}

#[derive(Default)]
struct WindowEvents {
    close_requested: bool,
}

impl ApplicationHandler for WindowEvents {
    fn resumed(&mut self, _: &ActiveEventLoop) {}

    fn window_event(&mut self, _: &ActiveEventLoop, _: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => self.close_requested = true,
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        logical_key: Key::Named(NamedKey::Escape),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => self.close_requested = true,
            WindowEvent::Resized(size) => {
                tracing::trace!("Window resized to {}x{}.", size.width, size.height);
            }
            _ => {}
        }
    }
}

/// A single window driven by polling a winit event loop, one batch of events
/// per frame.
pub struct WinitWindow {
    event_loop: EventLoop<()>,
    window: Window,
    events: WindowEvents,
}

impl WinitWindow {
    pub fn open(title: &str, width: u32, height: u32) -> Result<Self> {
        let mut event_loop = EventLoop::new()?;
        let mut bootstrap = Bootstrap {
            attributes: Window::default_attributes()
                .with_title(title)
                .with_inner_size(LogicalSize::new(width, height)),
            window: None,
        };

        while bootstrap.window.is_none() {
            if let PumpStatus::Exit(code) =
                event_loop.pump_app_events(Some(Duration::ZERO), &mut bootstrap)
            {
                bail!("Event loop exited ({}) before the window was created.", code);
            }
        }
        let window = bootstrap
            .window
            .take()
            .ok_or_else(|| anyhow!("Window was not created."))??;

        let size = window.inner_size();
        tracing::info!("Framebuffer size {}x{}.", size.width, size.height);

        Ok(Self {
            event_loop,
            window,
            events: WindowEvents::default(),
        })
    }

    pub fn window(&self) -> &Window {
        &self.window
    }
}

impl WindowSystem for WinitWindow {
    fn poll_events(&mut self) {
        if let PumpStatus::Exit(_) = self
            .event_loop
            .pump_app_events(Some(Duration::ZERO), &mut self.events)
        {
            self.events.close_requested = true;
        }
    }

    fn should_close(&self) -> bool {
        self.events.close_requested
    }

    fn request_close(&mut self) {
        self.events.close_requested = true;
    }

    fn framebuffer_size(&self) -> (u32, u32) {
        if self.window.is_minimized() == Some(true) {
            return (0, 0);
        }
        let size = self.window.inner_size();
        (size.width, size.height)
    }

    fn close(self) {
        let Self {
            event_loop, window, ..
        } = self;
        drop(window);
        drop(event_loop);
        tracing::debug!("Window closed.");
    }
}

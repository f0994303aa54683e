// Window - the platform window the renderer presents to
//
// The renderer only sees the `WindowSystem` trait. `WinitWindow` implements
// it with winit's pump API so the frame loop can poll for events between
// frames instead of handing control to the event loop.

use crate::config::WindowConfig;
use crate::error::{RenderError, Result};
use ash::prelude::VkResult;
use ash::vk;
use raw_window_handle::{HasRawDisplayHandle, HasRawWindowHandle, RawDisplayHandle, RawWindowHandle};
use std::ffi::CStr;
use std::time::Duration;
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    platform::pump_events::{EventLoopExtPumpEvents, PumpStatus},
    window::{Window, WindowAttributes, WindowId},
};

/// What the renderer needs from a window.
pub trait WindowSystem {
    fn should_close(&self) -> bool;

    /// Process pending events without blocking.
    fn poll_events(&mut self);

    /// Drawable size in pixels
    fn extent(&self) -> vk::Extent2D;

    /// Instance extensions needed to create a surface for this window
    fn required_extensions(&self) -> VkResult<Vec<&'static CStr>>;

    fn raw_display_handle(&self) -> RawDisplayHandle;
    fn raw_window_handle(&self) -> RawWindowHandle;
}

/// Upper bound on pumps while waiting for the platform to hand out a window
const CREATE_ATTEMPTS: usize = 100;

/// Event handler state driven by `pump_app_events`
struct WindowEvents {
    attributes: WindowAttributes,
    window: Option<Window>,
    created: bool,
    close_requested: bool,
    create_error: Option<String>,
}

impl ApplicationHandler for WindowEvents {
    /// Called when the application is ready to create windows.
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.created {
            return;
        }
        self.created = true;

        match event_loop.create_window(self.attributes.clone()) {
            Ok(window) => self.window = Some(window),
            Err(e) => self.create_error = Some(e.to_string()),
        }
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                self.close_requested = true;
            }

            WindowEvent::KeyboardInput { event, .. } => {
                use winit::keyboard::{KeyCode, PhysicalKey};

                if event.state.is_pressed() && event.physical_key == PhysicalKey::Code(KeyCode::Escape)
                {
                    log::info!("ESC pressed, exiting...");
                    self.close_requested = true;
                }
            }

            WindowEvent::Resized(size) => {
                log::debug!(
                    "Window resized to {}x{}, swapchain keeps its original size",
                    size.width,
                    size.height
                );
            }

            _ => {}
        }
    }
}

pub struct WinitWindow {
    event_loop: EventLoop<()>,
    events: WindowEvents,
    window: Window,
}

impl WinitWindow {
    /// Create the window and wait until the platform has actually made it.
    pub fn new(config: &WindowConfig) -> Result<Self> {
        log::info!(
            "Creating window: {}x{} ({})",
            config.width,
            config.height,
            config.title
        );

        let mut event_loop = EventLoop::new().map_err(|e| window_error(e.to_string()))?;

        let attributes = WindowAttributes::default()
            .with_title(&config.title)
            .with_resizable(false)
            .with_inner_size(winit::dpi::PhysicalSize::new(config.width, config.height));

        let mut events = WindowEvents {
            attributes,
            window: None,
            created: false,
            close_requested: false,
            create_error: None,
        };

        for _ in 0..CREATE_ATTEMPTS {
            if let PumpStatus::Exit(code) =
                event_loop.pump_app_events(Some(Duration::from_millis(10)), &mut events)
            {
                return Err(window_error(format!(
                    "event loop exited with code {} before the window was created",
                    code
                )));
            }
            if let Some(error) = events.create_error.take() {
                return Err(window_error(error));
            }
            if let Some(window) = events.window.take() {
                return Ok(Self {
                    event_loop,
                    events,
                    window,
                });
            }
        }

        Err(window_error("the platform never created the window".into()))
    }
}

fn window_error(message: String) -> RenderError {
    let err = RenderError::Window(message);
    log::error!("{}", err);
    err
}

impl WindowSystem for WinitWindow {
    fn should_close(&self) -> bool {
        self.events.close_requested
    }

    fn poll_events(&mut self) {
        if let PumpStatus::Exit(_) = self
            .event_loop
            .pump_app_events(Some(Duration::ZERO), &mut self.events)
        {
            self.events.close_requested = true;
        }
    }

    fn extent(&self) -> vk::Extent2D {
        let size = self.window.inner_size();
        vk::Extent2D {
            width: size.width,
            height: size.height,
        }
    }

    fn required_extensions(&self) -> VkResult<Vec<&'static CStr>> {
        let names = ash_window::enumerate_required_extensions(self.raw_display_handle())?;
        // SAFETY: ash-window returns pointers to 'static extension name constants
        Ok(names
            .iter()
            .map(|&ptr| unsafe { CStr::from_ptr(ptr) })
            .collect())
    }

    fn raw_display_handle(&self) -> RawDisplayHandle {
        self.window.raw_display_handle()
    }

    fn raw_window_handle(&self) -> RawWindowHandle {
        self.window.raw_window_handle()
    }
}

impl Drop for WinitWindow {
    fn drop(&mut self) {
        log::info!("Destroying window");
    }
}

//! Clear-screen demo
//!
//! Opens a glfw window and runs the `begin_frame` / `clear` / `end_frame` / `present` loop.
//! Device settings are read from `alimer.toml` in the working directory when it exists.
//!
//! Keys: `Escape` quits, `V` toggles vertical sync.

use std::ffi::CString;

use alimer_graphics::foundation::logging;
use alimer_graphics::prelude::*;
use ash::vk;
use glfw::{Action, Key, WindowEvent};
use thiserror::Error;

const CONFIG_PATH: &str = "alimer.toml";

/// Window management errors
#[derive(Error, Debug)]
enum WindowError {
    #[error("GLFW initialization failed")]
    InitializationFailed,

    #[error("Window creation failed")]
    CreationFailed,
}

/// GLFW window that can host a Vulkan surface
struct Window {
    glfw: glfw::Glfw,
    window: glfw::PWindow,
    events: glfw::GlfwReceiver<(f64, WindowEvent)>,
}

impl Window {
    fn new(title: &str, width: u32, height: u32) -> Result<Self, WindowError> {
        let mut glfw = glfw::init(glfw::fail_on_errors).map_err(|_| WindowError::InitializationFailed)?;

        // Vulkan renders without a client API context
        glfw.window_hint(glfw::WindowHint::ClientApi(glfw::ClientApiHint::NoApi));
        glfw.window_hint(glfw::WindowHint::Resizable(true));

        let (mut window, events) = glfw
            .create_window(width, height, title, glfw::WindowMode::Windowed)
            .ok_or(WindowError::CreationFailed)?;

        window.set_key_polling(true);
        window.set_close_polling(true);
        window.set_framebuffer_size_polling(true);

        Ok(Self { glfw, window, events })
    }

    fn should_close(&self) -> bool {
        self.window.should_close()
    }

    fn set_should_close(&mut self, should_close: bool) {
        self.window.set_should_close(should_close);
    }

    fn poll_events(&mut self) -> Vec<WindowEvent> {
        self.glfw.poll_events();
        glfw::flush_messages(&self.events).map(|(_, event)| event).collect()
    }
}

impl SurfaceSource for Window {
    fn required_instance_extensions(&self) -> GraphicsResult<Vec<CString>> {
        let names = self
            .glfw
            .get_required_instance_extensions()
            .ok_or_else(|| GraphicsError::Initialization("GLFW reports no Vulkan support".to_string()))?;

        names
            .into_iter()
            .map(|name| {
                CString::new(name)
                    .map_err(|_| GraphicsError::Initialization("Invalid extension name from GLFW".to_string()))
            })
            .collect()
    }

    fn create_surface(&mut self, _entry: &ash::Entry, instance: &ash::Instance) -> GraphicsResult<vk::SurfaceKHR> {
        let mut surface = vk::SurfaceKHR::null();
        let result = self
            .window
            .create_window_surface(instance.handle(), std::ptr::null(), &mut surface);

        if result == vk::Result::SUCCESS {
            Ok(surface)
        } else {
            Err(GraphicsError::Initialization(format!(
                "Failed to create Vulkan surface: {:?}",
                result
            )))
        }
    }

    fn framebuffer_extent(&self) -> Extent2D {
        let (width, height) = self.window.get_framebuffer_size();
        Extent2D::new(width.max(0) as u32, height.max(0) as u32)
    }
}

/// Slowly cycle between two colors
fn clear_color(frame: u64) -> Color {
    const PERIOD: u64 = 240;
    let phase = (frame % PERIOD) as f32 / PERIOD as f32;
    let t = 0.5 - 0.5 * (phase * std::f32::consts::TAU).cos();

    let from = Color::CORNFLOWER_BLUE;
    let to = Color::BLACK;
    Color::new(
        from.r + (to.r - from.r) * t,
        from.g + (to.g - from.g) * t,
        from.b + (to.b - from.b) * t,
        1.0,
    )
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_with_filter("info");

    let descriptor = DeviceDescriptor::load_or_default(CONFIG_PATH)?.with_application_name("Clear Screen");
    log::info!(
        "Available backends: {:?}",
        BackendRegistry::available_backends()
    );

    let mut window = Window::new(&descriptor.application_name, 1280, 720)?;
    let mut device = BackendRegistry::create_device(&descriptor, Some(&mut window as &mut dyn SurfaceSource))?;

    let capabilities = device.capabilities();
    log::info!(
        "Running on '{}' ({:?}) through {}",
        capabilities.adapter_name,
        capabilities.adapter_type,
        device.backend_type()
    );

    let mut vertical_sync = descriptor.swapchain.vertical_sync;
    while !window.should_close() {
        for event in window.poll_events() {
            match event {
                WindowEvent::Key(Key::Escape, _, Action::Press, _) | WindowEvent::Close => {
                    window.set_should_close(true);
                }
                WindowEvent::Key(Key::V, _, Action::Press, _) => {
                    vertical_sync = !vertical_sync;
                    log::info!("Vertical sync {}", if vertical_sync { "on" } else { "off" });
                }
                WindowEvent::FramebufferSize(width, height) => {
                    device.resize(Extent2D::new(width.max(0) as u32, height.max(0) as u32))?;
                }
                _ => {}
            }
        }

        if device.begin_frame()? {
            device.clear(clear_color(device.frame_count()))?;
            device.end_frame()?;
            device.present(vertical_sync)?;
        }
    }

    device.wait_for_gpu()?;
    log::info!("Presented {} frames", device.frame_count());
    Ok(())
}

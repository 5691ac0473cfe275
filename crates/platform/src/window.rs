//! Viewer window and its Vulkan surface.

use std::ffi::{CStr, c_char};
use std::sync::Arc;

use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use winit::dpi::PhysicalSize;
use winit::event_loop::ActiveEventLoop;
use winit::window::{Window as WinitWindow, WindowAttributes};

use objview_core::{Error, Result};

/// A `VkSurfaceKHR` destroyed on drop.
///
/// The instance that created it must outlive this value.
pub struct Surface {
    handle: vk::SurfaceKHR,
    loader: ash::khr::surface::Instance,
}

impl Surface {
    #[inline]
    pub fn handle(&self) -> vk::SurfaceKHR {
        self.handle
    }

    /// Loader for surface capability, format and present-mode queries.
    #[inline]
    pub fn loader(&self) -> &ash::khr::surface::Instance {
        &self.loader
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        // SAFETY: the handle came from ash_window::create_surface on the same
        // instance the loader was built from, and is destroyed only here.
        unsafe {
            self.loader.destroy_surface(self.handle, None);
        }
        tracing::debug!("Surface destroyed");
    }
}

/// Resizable top-level window the viewer presents into.
pub struct Window {
    window: Arc<WinitWindow>,
    width: u32,
    height: u32,
}

impl Window {
    /// Opens a window with a `width`×`height` client area.
    pub fn new(event_loop: &ActiveEventLoop, width: u32, height: u32, title: &str) -> Result<Self> {
        let attrs = WindowAttributes::default()
            .with_title(title)
            .with_inner_size(PhysicalSize::new(width, height))
            .with_resizable(true);

        let window = event_loop
            .create_window(attrs)
            .map_err(|e| Error::Window(e.to_string()))?;

        // The platform may not honor the requested size exactly
        let size = window.inner_size();
        tracing::info!("Window '{}' opened: {}x{}", title, size.width, size.height);

        Ok(Self {
            window: Arc::new(window),
            width: size.width,
            height: size.height,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Records a new client size from a resize event.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    /// True while the client area is empty, as when minimized.
    pub fn is_minimized(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn request_redraw(&self) {
        self.window.request_redraw();
    }

    /// Instance extensions needed to create a surface for this window.
    ///
    /// The returned pointers reference static strings owned by the Vulkan
    /// loader.
    pub fn required_extensions(&self) -> Result<Vec<*const c_char>> {
        let display = self
            .window
            .display_handle()
            .map_err(|e| Error::Window(format!("No display handle: {}", e)))?;

        let extensions = ash_window::enumerate_required_extensions(display.as_raw())
            .map_err(|e| Error::Vulkan(format!("Cannot enumerate surface extensions: {}", e)))?;

        for &name in extensions {
            // SAFETY: ash_window returns valid, null-terminated static strings.
            let name = unsafe { CStr::from_ptr(name) };
            tracing::debug!("Surface extension: {:?}", name);
        }

        Ok(extensions.to_vec())
    }

    /// Creates a surface for this window on `instance`.
    pub fn create_surface(&self, entry: &ash::Entry, instance: &ash::Instance) -> Result<Surface> {
        let display = self
            .window
            .display_handle()
            .map_err(|e| Error::Window(format!("No display handle: {}", e)))?;
        let window = self
            .window
            .window_handle()
            .map_err(|e| Error::Window(format!("No window handle: {}", e)))?;

        // SAFETY: entry and instance are live, and both raw handles come from
        // a window that outlives this call. Surface::drop destroys the result.
        let handle = unsafe {
            ash_window::create_surface(entry, instance, display.as_raw(), window.as_raw(), None)
        }
        .map_err(|e| Error::Vulkan(format!("Surface creation failed: {}", e)))?;

        tracing::info!("Surface created");

        Ok(Surface {
            handle,
            loader: ash::khr::surface::Instance::new(entry, instance),
        })
    }
}

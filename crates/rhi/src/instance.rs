//! Vulkan instance creation.
//!
//! The instance targets Vulkan 1.3. Surface extensions come from the window
//! layer, so the same type serves the viewer and headless tests. When
//! validation is requested and the Khronos layer is installed, its messages
//! are forwarded to `tracing`.
//!
//! ```no_run
//! use objview_rhi::instance::Instance;
//!
//! let instance = Instance::new(false, &[]).expect("Vulkan loader");
//! let _ = instance.handle();
//! ```

use std::borrow::Cow;
use std::ffi::{CStr, c_char, c_void};

use ash::{Entry, vk};
use tracing::{debug, error, info, warn};

use crate::error::RhiError;

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Debug-utils loader and the messenger registered through it.
struct Messenger {
    loader: ash::ext::debug_utils::Instance,
    handle: vk::DebugUtilsMessengerEXT,
}

/// Owner of the `VkInstance` and the loaded entry points.
pub struct Instance {
    entry: Entry,
    instance: ash::Instance,
    messenger: Option<Messenger>,
}

impl Instance {
    /// Loads Vulkan and creates an instance.
    ///
    /// Pass an empty `surface_extensions` slice for a headless instance.
    /// Missing validation layers only produce a warning.
    ///
    /// # Errors
    ///
    /// Fails when the loader is missing, an extension is unsupported, or
    /// instance creation is rejected by the driver.
    pub fn new(
        enable_validation: bool,
        surface_extensions: &[*const c_char],
    ) -> Result<Self, RhiError> {
        let entry = unsafe { Entry::load()? };

        let validation = enable_validation && layer_available(&entry, VALIDATION_LAYER)?;
        if enable_validation && !validation {
            warn!("Validation requested but {:?} is not installed", VALIDATION_LAYER);
        }

        let app_info = vk::ApplicationInfo::default()
            .application_name(c"objview")
            .application_version(vk::make_api_version(0, 0, 1, 0))
            .engine_name(c"objview")
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(vk::API_VERSION_1_3);

        let extensions = instance_extensions(surface_extensions, validation);
        let layers: Vec<*const c_char> = if validation {
            vec![VALIDATION_LAYER.as_ptr()]
        } else {
            Vec::new()
        };

        let create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layers);

        let instance = unsafe { entry.create_instance(&create_info, None)? };
        info!(
            "Vulkan 1.3 instance created ({} extensions, validation {})",
            extensions.len(),
            if validation { "on" } else { "off" }
        );

        let messenger = if validation {
            let loader = ash::ext::debug_utils::Instance::new(&entry, &instance);
            match create_messenger(&loader) {
                Ok(handle) => Some(Messenger { loader, handle }),
                Err(e) => {
                    unsafe { instance.destroy_instance(None) };
                    return Err(e);
                }
            }
        } else {
            None
        };

        Ok(Self {
            entry,
            instance,
            messenger,
        })
    }

    #[inline]
    pub fn handle(&self) -> &ash::Instance {
        &self.instance
    }

    #[inline]
    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    /// True when validation messages are being forwarded.
    #[inline]
    pub fn has_validation(&self) -> bool {
        self.messenger.is_some()
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        unsafe {
            if let Some(messenger) = self.messenger.take() {
                messenger
                    .loader
                    .destroy_debug_utils_messenger(messenger.handle, None);
            }
            self.instance.destroy_instance(None);
        }
        debug!("Vulkan instance destroyed");
    }
}

/// Surface extensions plus debug utils when validation is on.
fn instance_extensions(surface: &[*const c_char], validation: bool) -> Vec<*const c_char> {
    let mut extensions = surface.to_vec();
    if validation {
        extensions.push(ash::ext::debug_utils::NAME.as_ptr());
    }
    extensions
}

fn layer_available(entry: &Entry, name: &CStr) -> Result<bool, RhiError> {
    let layers = unsafe { entry.enumerate_instance_layer_properties()? };
    Ok(layers
        .iter()
        .any(|layer| layer.layer_name_as_c_str().is_ok_and(|n| n == name)))
}

fn create_messenger(
    loader: &ash::ext::debug_utils::Instance,
) -> Result<vk::DebugUtilsMessengerEXT, RhiError> {
    let create_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(forward_to_tracing));

    Ok(unsafe { loader.create_debug_utils_messenger(&create_info, None)? })
}

fn message_category(message_type: vk::DebugUtilsMessageTypeFlagsEXT) -> &'static str {
    if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
        "validation"
    } else if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
        "performance"
    } else {
        "general"
    }
}

unsafe extern "system" fn forward_to_tracing(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut c_void,
) -> vk::Bool32 {
    // SAFETY: the layer passes either null or a pointer valid for this call.
    let Some(data) = (unsafe { data.as_ref() }) else {
        return vk::FALSE;
    };
    let message = if data.p_message.is_null() {
        Cow::Borrowed("(no message)")
    } else {
        unsafe { CStr::from_ptr(data.p_message) }.to_string_lossy()
    };
    let category = message_category(message_type);

    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        error!(target: "vulkan", "[{}] {}", category, message);
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        warn!(target: "vulkan", "[{}] {}", category, message);
    } else {
        debug!(target: "vulkan", "[{}] {}", category, message);
    }

    vk::FALSE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_utils_only_with_validation() {
        let surface = [ash::khr::surface::NAME.as_ptr()];

        let plain = instance_extensions(&surface, false);
        assert_eq!(plain, surface.to_vec());

        let validated = instance_extensions(&surface, true);
        assert_eq!(validated.len(), 2);
        assert_eq!(validated[1], ash::ext::debug_utils::NAME.as_ptr());
    }

    #[test]
    fn test_message_category() {
        assert_eq!(
            message_category(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION),
            "validation"
        );
        assert_eq!(
            message_category(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE
            ),
            "performance"
        );
        assert_eq!(
            message_category(vk::DebugUtilsMessageTypeFlagsEXT::GENERAL),
            "general"
        );
    }

    #[test]
    fn test_headless_instance() {
        match Instance::new(false, &[]) {
            Ok(instance) => assert!(!instance.has_validation()),
            Err(RhiError::LoadingError(_) | RhiError::VulkanError(_)) => {
                eprintln!("skipping: Vulkan not available");
            }
            Err(e) => panic!("unexpected error: {e:?}"),
        }
    }
}

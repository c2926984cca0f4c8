use log::{debug, error, info, warn};
use std::ffi::{CStr, CString};

use ash::extensions::ext::DebugUtils;
use ash::vk;

/// Start a labeled region visible in RenderDoc / Nsight captures.
pub unsafe fn cmd_begin_debug_label(
  debug_utils: &DebugUtils,
  command_buffer: vk::CommandBuffer,
  name: &str,
) {
  // interior NUL would be a programmer error, just drop the label then
  let Ok(name_c) = CString::new(name) else {
    return;
  };
  let label = vk::DebugUtilsLabelEXT::builder()
    .label_name(&name_c)
    .color([0.85, 0.45, 0.35, 1.0])
    .build();
  debug_utils.cmd_begin_debug_utils_label(command_buffer, &label);
}

pub unsafe fn cmd_end_debug_label(debug_utils: &DebugUtils, command_buffer: vk::CommandBuffer) {
  debug_utils.cmd_end_debug_utils_label(command_buffer);
}

/// Push descriptors are reported as unbound by some validation layer versions,
/// even though the shader sees them.
const IGNORED_PUSH_DESCRIPTOR_MSG: &str = "a descriptor set must have been bound to n";

// called on validation layer message
extern "system" fn vulkan_debug_callback(
  message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
  message_type: vk::DebugUtilsMessageTypeFlagsEXT,
  p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
  _user_data: *mut std::os::raw::c_void,
) -> vk::Bool32 {
  let message = unsafe {
    let callback_data = *p_callback_data;
    if callback_data.p_message.is_null() {
      return vk::FALSE;
    }
    CStr::from_ptr(callback_data.p_message).to_string_lossy()
  };
  if message.contains(IGNORED_PUSH_DESCRIPTOR_MSG) {
    return vk::FALSE;
  }

  match message_severity {
    vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => error!("[VK {:?}] {}", message_type, message),
    vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => warn!("[VK {:?}] {}", message_type, message),
    vk::DebugUtilsMessageSeverityFlagsEXT::INFO => info!("[VK {:?}] {}", message_type, message),
    _ => debug!("[VK {:?}] {}", message_type, message),
  }
  vk::FALSE
}

/// Route validation layer messages to `log`. Instance needs VK_EXT_debug_utils.
pub fn setup_debug_reporting(
  entry: &ash::Entry,
  instance: &ash::Instance,
) -> (DebugUtils, vk::DebugUtilsMessengerEXT) {
  let debug_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
    .message_severity(
      vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
        | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
        | vk::DebugUtilsMessageSeverityFlagsEXT::INFO,
    )
    .message_type(
      vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
        | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE
        | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION,
    )
    .pfn_user_callback(Some(vulkan_debug_callback))
    .build();

  let debug_utils = DebugUtils::new(entry, instance);
  let debug_messenger = unsafe {
    debug_utils
      .create_debug_utils_messenger(&debug_info, None)
      .expect("Failed creating debug messenger")
  };
  (debug_utils, debug_messenger)
}

use log::{info, trace, warn};
use std::ffi::CStr;
use std::os::raw::c_char;
use std::sync::Arc;

use ash::extensions::ext::DebugUtils;
use ash::extensions::khr::PushDescriptor;
use ash::vk;

use crate::config::Config;
use crate::render_graph::TextureId;
use crate::vk_host::VkRenderHost;
use crate::vk_utils::{render_target_usage, setup_debug_reporting, VkTexture};

const VALIDATION_LAYER: &[u8] = b"VK_LAYER_KHRONOS_validation\0";

/// Tried in order, the first one usable as sampled depth/stencil attachment wins
const DEPTH_STENCIL_CANDIDATES: [vk::Format; 2] = [
  vk::Format::D24_UNORM_S8_UINT,
  vk::Format::D32_SFLOAT_S8_UINT,
];

fn from_c_str(s: &[c_char]) -> &CStr {
  unsafe { CStr::from_ptr(s.as_ptr()) }
}

fn get_app_version() -> u32 {
  let to_u32 = |s: &str| s.parse::<u32>().unwrap_or(0);
  vk::make_api_version(
    0,
    to_u32(env!("CARGO_PKG_VERSION_MAJOR")),
    to_u32(env!("CARGO_PKG_VERSION_MINOR")),
    to_u32(env!("CARGO_PKG_VERSION_PATCH")),
  )
}

/// No surface: nothing is ever presented.
pub fn get_instance_extension_names(graphics_debugging: bool) -> Vec<*const c_char> {
  let mut names = Vec::new();
  if graphics_debugging {
    names.push(DebugUtils::name().as_ptr());
  }
  names
}

fn get_layer_names(graphics_debugging: bool) -> Vec<*const c_char> {
  let mut names = Vec::new();
  if graphics_debugging {
    names.push(VALIDATION_LAYER.as_ptr() as *const c_char);
  }
  names
}

pub fn create_instance(graphics_debugging: bool) -> (ash::Entry, ash::Instance) {
  let entry = unsafe { ash::Entry::load().expect("Failed to load Vulkan library") };

  let app_name = unsafe { CStr::from_bytes_with_nul_unchecked(b"rs-ssss\0") };
  let app_info = vk::ApplicationInfo::builder()
    .application_name(app_name)
    .application_version(get_app_version())
    .api_version(vk::make_api_version(0, 1, 2, 0))
    .build();

  let layer_names = get_layer_names(graphics_debugging);
  let extension_names = get_instance_extension_names(graphics_debugging);
  let create_info = vk::InstanceCreateInfo::builder()
    .application_info(&app_info)
    .enabled_layer_names(&layer_names)
    .enabled_extension_names(&extension_names)
    .build();

  let instance = unsafe {
    entry
      .create_instance(&create_info, None)
      .expect("Failed to create ash::Instance")
  };
  trace!("Ash instance created");
  (entry, instance)
}

/// First family that can draw, copy and write timestamps.
pub fn find_graphics_queue_family(families: &[vk::QueueFamilyProperties]) -> Option<usize> {
  families.iter().position(|q| {
    q.queue_flags
      .contains(vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER)
      && q.timestamp_valid_bits > 0
  })
}

/// Lower is better
pub fn device_type_rank(device_type: vk::PhysicalDeviceType) -> u32 {
  match device_type {
    vk::PhysicalDeviceType::DISCRETE_GPU => 0,
    vk::PhysicalDeviceType::INTEGRATED_GPU => 1,
    vk::PhysicalDeviceType::VIRTUAL_GPU => 2,
    vk::PhysicalDeviceType::CPU => 3,
    _ => 4,
  }
}

pub fn has_extension(available: &[vk::ExtensionProperties], name: &CStr) -> bool {
  available
    .iter()
    .any(|ext| from_c_str(&ext.extension_name) == name)
}

/// Picks physical device e.g. "GeForce GTX 1050 Ti" and graphic queue family index.
/// Device has to support push descriptors, discrete GPUs are preferred.
pub fn pick_physical_device_and_queue_family_idx(
  instance: &ash::Instance,
) -> (vk::PhysicalDevice, u32) {
  let phys_devices = unsafe {
    instance
      .enumerate_physical_devices()
      .expect("Failed to enumerate physical devices")
  };
  trace!("Found {} physical devices", phys_devices.len());

  let best = phys_devices
    .iter()
    .filter_map(|&phys_device| {
      let extensions = unsafe { instance.enumerate_device_extension_properties(phys_device) }
        .unwrap_or_default();
      if !has_extension(&extensions, PushDescriptor::name()) {
        return None;
      }
      let families = unsafe { instance.get_physical_device_queue_family_properties(phys_device) };
      let queue_family_idx = find_graphics_queue_family(&families)?;
      let props = unsafe { instance.get_physical_device_properties(phys_device) };
      Some((device_type_rank(props.device_type), phys_device, queue_family_idx))
    })
    .min_by_key(|(rank, _, _)| *rank);

  match best {
    None => panic!("No Vulkan device with graphics queue and VK_KHR_push_descriptor found"),
    Some((_, phys_device, idx)) => {
      let props = unsafe { instance.get_physical_device_properties(phys_device) };
      info!("Using physical device: {:?}", from_c_str(&props.device_name));
      (phys_device, idx as u32)
    }
  }
}

/// Pick logical device
pub fn pick_device_and_queue(
  instance: &ash::Instance,
  phys_device: vk::PhysicalDevice,
  queue_family_index: u32,
) -> (ash::Device, vk::Queue) {
  let queue_prio = [1.0f32]; // only one queue
  let queue_create_infos = [vk::DeviceQueueCreateInfo::builder()
    .queue_family_index(queue_family_index)
    .queue_priorities(&queue_prio)
    .build()];
  let device_extension_names_raw = [PushDescriptor::name().as_ptr()];
  let features = vk::PhysicalDeviceFeatures::default();

  let device_create_info = vk::DeviceCreateInfo::builder()
    .queue_create_infos(&queue_create_infos)
    .enabled_extension_names(&device_extension_names_raw)
    .enabled_features(&features)
    .build();

  let device = unsafe {
    instance
      .create_device(phys_device, &device_create_info, None)
      .expect("Failed to create (logical) device")
  };
  let queue = unsafe { device.get_device_queue(queue_family_index, 0) };
  trace!("Logical device and queue created");
  (device, queue)
}

pub fn pick_depth_stencil_format(
  candidates: &[vk::Format],
  is_supported: impl Fn(vk::Format) -> bool,
) -> Option<vk::Format> {
  candidates.iter().copied().find(|format| is_supported(*format))
}

/// Vulkan objects for rendering offscreen: no window, no swapchain,
/// a single command buffer guarded by a single fence.
pub struct VkHeadlessCtx {
  pub entry: ash::Entry,
  pub instance: ash::Instance,
  pub physical_device: vk::PhysicalDevice,
  pub queue_family_index: u32,
  pub device: ash::Device,
  pub queue: vk::Queue,
  pub allocator: Arc<vma::Allocator>,
  pub command_pool: vk::CommandPool,
  pub command_buffer: vk::CommandBuffer,
  pub fence: vk::Fence,
  pub debug_utils: Option<(DebugUtils, vk::DebugUtilsMessengerEXT)>,
}

impl VkHeadlessCtx {
  pub fn new(graphics_debugging: bool) -> Self {
    let (entry, instance) = create_instance(graphics_debugging);
    let debug_utils = if graphics_debugging {
      Some(setup_debug_reporting(&entry, &instance))
    } else {
      None
    };

    let (physical_device, queue_family_index) = pick_physical_device_and_queue_family_idx(&instance);
    let (device, queue) = pick_device_and_queue(&instance, physical_device, queue_family_index);

    let allocator_info = vma::AllocatorCreateInfo::new(&instance, &device, physical_device)
      .vulkan_api_version(vk::make_api_version(0, 1, 2, 0));
    #[allow(unused_unsafe)]
    let allocator = unsafe { vma::Allocator::new(allocator_info) }
      .expect("Failed creating memory allocator (VMA lib init)");

    let pool_create_info = vk::CommandPoolCreateInfo::builder()
      .queue_family_index(queue_family_index)
      .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
      .build();
    let command_pool = unsafe {
      device
        .create_command_pool(&pool_create_info, None)
        .expect("Failed creating command pool")
    };
    let cmd_buf_create_info = vk::CommandBufferAllocateInfo::builder()
      .command_buffer_count(1)
      .command_pool(command_pool)
      .level(vk::CommandBufferLevel::PRIMARY)
      .build();
    let command_buffer = unsafe {
      device
        .allocate_command_buffers(&cmd_buf_create_info)
        .expect("Failed allocating command buffer")[0]
    };
    let fence = unsafe {
      device
        .create_fence(&vk::FenceCreateInfo::default(), None)
        .expect("Failed to create fence")
    };
    info!("Headless Vulkan context created");

    Self {
      entry,
      instance,
      physical_device,
      queue_family_index,
      device,
      queue,
      allocator: Arc::new(allocator),
      command_pool,
      command_buffer,
      fence,
      debug_utils,
    }
  }

  /// Loader for debug labels, if validation is on.
  pub fn debug_utils_loader(&self) -> Option<DebugUtils> {
    self.debug_utils.as_ref().map(|(loader, _)| loader.clone())
  }

  pub fn pick_depth_stencil_format(&self) -> vk::Format {
    let required = vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT
      | vk::FormatFeatureFlags::SAMPLED_IMAGE
      | vk::FormatFeatureFlags::TRANSFER_DST;
    let format = pick_depth_stencil_format(&DEPTH_STENCIL_CANDIDATES, |format| {
      let props = unsafe {
        self
          .instance
          .get_physical_device_format_properties(self.physical_device, format)
      };
      props.optimal_tiling_features.contains(required)
    });
    match format {
      Some(format) => format,
      None => panic!("No sampleable depth/stencil format among {:?}", DEPTH_STENCIL_CANDIDATES),
    }
  }

  /// Reset the command buffer and start recording.
  pub fn begin_commands(&self) -> vk::CommandBuffer {
    let cmd_buf_begin_info = vk::CommandBufferBeginInfo::builder()
      .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT)
      .build();
    unsafe {
      self
        .device
        .begin_command_buffer(self.command_buffer, &cmd_buf_begin_info)
        .expect("Failed - begin_command_buffer");
    }
    self.command_buffer
  }

  /// Stop recording, submit and block until the GPU is done.
  pub fn submit_and_wait(&self) {
    let device = &self.device;
    unsafe {
      device
        .end_command_buffer(self.command_buffer)
        .expect("Failed - end_command_buffer");
      let submit_info = vk::SubmitInfo::builder()
        .command_buffers(std::slice::from_ref(&self.command_buffer))
        .build();
      device
        .queue_submit(self.queue, &[submit_info], self.fence)
        .expect("Failed - queue_submit");
      device
        .wait_for_fences(&[self.fence], true, u64::MAX)
        .expect("Failed - wait_for_fences");
      device
        .reset_fences(&[self.fence])
        .expect("Failed - reset_fences");
    }
  }

  /// Record with `callback`, submit, wait.
  pub fn with_setup_cb(&self, callback: impl FnOnce(&ash::Device, vk::CommandBuffer)) {
    let command_buffer = self.begin_commands();
    callback(&self.device, command_buffer);
    self.submit_and_wait();
  }

  /// Every other owner of the allocator has to be dropped first.
  pub unsafe fn destroy(self) {
    info!("VkHeadlessCtx::destroy()");
    let Self {
      instance,
      device,
      allocator,
      command_pool,
      fence,
      debug_utils,
      ..
    } = self;
    device.device_wait_idle().expect("Failed - device_wait_idle");

    device.destroy_fence(fence, None);
    device.destroy_command_pool(command_pool, None);
    if Arc::strong_count(&allocator) > 1 {
      warn!("VMA allocator still shared on destroy, GPU memory leaks");
    }
    drop(allocator);
    device.destroy_device(None);

    if let Some((loader, messenger)) = debug_utils {
      loader.destroy_debug_utils_messenger(messenger, None);
    }
    instance.destroy_instance(None);
  }
}

/// Camera color and depth/stencil owned by the application.
/// The render host only sees imported views of them.
pub struct VkCameraTargets {
  pub color: VkTexture,
  pub depth_stencil: VkTexture,
}

impl VkCameraTargets {
  pub fn new(ctx: &VkHeadlessCtx, config: &Config) -> Self {
    let size = vk::Extent2D {
      width: config.window_width,
      height: config.window_height,
    };
    let color_format = vk::Format::R16G16B16A16_SFLOAT;
    let depth_format = ctx.pick_depth_stencil_format();
    trace!("Camera targets {:?}: {:?}, {:?}", size, color_format, depth_format);

    Self {
      color: VkTexture::empty(
        &ctx.device,
        &ctx.allocator,
        "CameraColor".to_string(),
        size,
        color_format,
        render_target_usage(color_format),
      ),
      depth_stencil: VkTexture::empty(
        &ctx.device,
        &ctx.allocator,
        "CameraDepthStencil".to_string(),
        size,
        depth_format,
        render_target_usage(depth_format),
      ),
    }
  }

  /// Clear both targets. Host picks the layouts up on import.
  pub fn cmd_clear(
    &mut self,
    device: &ash::Device,
    command_buffer: vk::CommandBuffer,
    color: [f32; 4],
  ) {
    let layout = vk::ImageLayout::TRANSFER_DST_OPTIMAL;
    let range = |aspect_mask| vk::ImageSubresourceRange {
      aspect_mask,
      base_mip_level: 0,
      level_count: 1,
      base_array_layer: 0,
      layer_count: 1,
    };
    self.color.cmd_transition(device, command_buffer, layout);
    self.depth_stencil.cmd_transition(device, command_buffer, layout);
    unsafe {
      device.cmd_clear_color_image(
        command_buffer,
        self.color.image,
        layout,
        &vk::ClearColorValue { float32: color },
        &[range(self.color.aspect_flags())],
      );
      device.cmd_clear_depth_stencil_image(
        command_buffer,
        self.depth_stencil.image,
        layout,
        &vk::ClearDepthStencilValue {
          depth: 1.0,
          stencil: 0,
        },
        &[range(self.depth_stencil.aspect_flags())],
      );
    }
  }

  /// Returns `(color, depth_stencil)` ids and makes them the host's renderer targets.
  pub fn import_into(&self, host: &mut VkRenderHost) -> (TextureId, TextureId) {
    let color = host.import_texture(imported_view(&self.color, "CameraColor"));
    let depth_stencil = host.import_texture(imported_view(&self.depth_stencil, "CameraDepthStencil"));
    host.set_renderer_targets(color, depth_stencil);
    (color, depth_stencil)
  }

  pub unsafe fn delete(&mut self, device: &ash::Device, allocator: &vma::Allocator) {
    self.color.delete(device, allocator);
    self.depth_stencil.delete(device, allocator);
  }
}

fn imported_view(texture: &VkTexture, name: &str) -> VkTexture {
  VkTexture::import(
    name.to_string(),
    texture.image,
    texture.image_view(),
    texture.sampled_image_view(),
    texture.stencil_image_view(),
    texture.size(),
    texture.format,
    texture.layout,
  )
}

#[cfg(test)]
mod tests {
  use super::*;

  fn queue_family(queue_flags: vk::QueueFlags, timestamp_valid_bits: u32) -> vk::QueueFamilyProperties {
    vk::QueueFamilyProperties {
      queue_flags,
      queue_count: 1,
      timestamp_valid_bits,
      ..Default::default()
    }
  }

  fn extension(name: &[u8]) -> vk::ExtensionProperties {
    let mut ext = vk::ExtensionProperties::default();
    name
      .iter()
      .enumerate()
      .for_each(|(i, c)| ext.extension_name[i] = *c as c_char);
    ext
  }

  #[test]
  fn picks_family_that_draws_and_measures() {
    let families = [
      queue_family(vk::QueueFlags::TRANSFER, 64),
      queue_family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER, 0),
      queue_family(
        vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER,
        64,
      ),
    ];
    assert_eq!(find_graphics_queue_family(&families), Some(2));
    assert_eq!(find_graphics_queue_family(&families[..2]), None);
  }

  #[test]
  fn discrete_gpu_is_preferred() {
    let mut types = vec![
      vk::PhysicalDeviceType::CPU,
      vk::PhysicalDeviceType::DISCRETE_GPU,
      vk::PhysicalDeviceType::INTEGRATED_GPU,
    ];
    types.sort_by_key(|t| device_type_rank(*t));
    assert_eq!(types[0], vk::PhysicalDeviceType::DISCRETE_GPU);
    assert_eq!(types[2], vk::PhysicalDeviceType::CPU);
  }

  #[test]
  fn finds_push_descriptor_extension() {
    let available = [
      extension(b"VK_KHR_swapchain"),
      extension(b"VK_KHR_push_descriptor"),
    ];
    assert!(has_extension(&available, PushDescriptor::name()));
    assert!(!has_extension(&available[..1], PushDescriptor::name()));
  }

  #[test]
  fn falls_back_to_second_depth_format() {
    let only_d32 = |f: vk::Format| f == vk::Format::D32_SFLOAT_S8_UINT;
    assert_eq!(
      pick_depth_stencil_format(&DEPTH_STENCIL_CANDIDATES, only_d32),
      Some(vk::Format::D32_SFLOAT_S8_UINT)
    );
    assert_eq!(
      pick_depth_stencil_format(&DEPTH_STENCIL_CANDIDATES, |_| true),
      Some(vk::Format::D24_UNORM_S8_UINT)
    );
    assert_eq!(pick_depth_stencil_format(&DEPTH_STENCIL_CANDIDATES, |_| false), None);
  }

  #[test]
  fn debug_extension_only_when_debugging() {
    assert!(get_instance_extension_names(false).is_empty());
    assert_eq!(get_instance_extension_names(true).len(), 1);
    assert_eq!(get_layer_names(true).len(), 1);
  }
}

use log::trace;
use std::path::Path;

use ash::vk;

// https://github.com/zeux/niagara/blob/master/src/shaders.cpp

const SHADER_ENTRY_POINT: &[u8] = b"main\0";

/// `None` if the file does not exist. Unreadable or invalid SPIR-V is fatal.
pub fn load_shader_module(device: &ash::Device, path: &Path) -> Option<vk::ShaderModule> {
  if !path.is_file() {
    return None;
  }
  trace!("Loading shader from {}", path.to_string_lossy());

  let mut file =
    std::fs::File::open(path).expect(&format!("Could not open file '{}'", path.to_string_lossy()));
  let spirv_code = ash::util::read_spv(&mut file).expect(&format!(
    "File '{}' is not valid SPIR-V",
    path.to_string_lossy()
  ));
  let create_info = vk::ShaderModuleCreateInfo::builder()
    .code(&spirv_code)
    .build();

  let shader_module = unsafe {
    device
      .create_shader_module(&create_info, None)
      .expect(&format!(
        "Failed to create shader module from file '{}'",
        path.to_string_lossy()
      ))
  };

  Some(shader_module)
}

/// Stage info referencing the module. Module has to outlive pipeline creation.
pub fn shader_stage(
  stage: vk::ShaderStageFlags,
  module: vk::ShaderModule,
) -> vk::PipelineShaderStageCreateInfo {
  let shader_fn_name = unsafe { std::ffi::CStr::from_bytes_with_nul_unchecked(SHADER_ENTRY_POINT) };

  vk::PipelineShaderStageCreateInfo::builder()
    .stage(stage)
    .module(module)
    .name(shader_fn_name)
    .build()
}

/// Fullscreen triangle vertex shader shared by every material
pub fn fullscreen_vertex_shader_path(shader_dir: &Path) -> std::path::PathBuf {
  shader_dir.join("fullscreen_quad.vert.spv")
}

/// `{shader_dir}/{name}.pass{index}.frag.spv`
pub fn material_pass_shader_path(
  shader_dir: &Path,
  shader_name: &str,
  pass_index: u32,
) -> std::path::PathBuf {
  shader_dir.join(format!("{}.pass{}.frag.spv", shader_name, pass_index))
}

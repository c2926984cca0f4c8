use std::collections::HashMap;
use std::path::Path;

use ash::vk;
use log::{debug, info};

use crate::vk_utils::*;

/// Compiled shader with its fullscreen passes. Pipelines are created on first
/// use, as they depend on the render pass they are drawn in.
pub struct VkMaterial {
  pub name: String,
  /// Fragment shader of each pass, by pass index
  fragment_modules: Vec<vk::ShaderModule>,
  pipelines: HashMap<(u32, RenderPassKey), vk::Pipeline>,
  /// Byte offset of the uniforms in the frame's uniform buffer
  pub uniforms_offset: Option<u64>,
  /// Stencil reference for masked draws, copied from the uniforms
  pub stencil_ref: u32,
}

impl VkMaterial {
  /// Loads `{name}.pass0.frag.spv`, `{name}.pass1.frag.spv`, ... until the first missing file.
  /// `None` if even pass 0 does not exist.
  pub fn load(device: &ash::Device, shader_dir: &Path, name: &str) -> Option<VkMaterial> {
    let fragment_modules: Vec<vk::ShaderModule> = (0u32..)
      .map(|pass_idx| {
        let path = material_pass_shader_path(shader_dir, name, pass_idx);
        load_shader_module(device, &path)
      })
      .take_while(|module| module.is_some())
      .flatten()
      .collect();

    if fragment_modules.is_empty() {
      return None;
    }
    info!(
      "Loaded material '{}' with {} passes",
      name,
      fragment_modules.len()
    );
    Some(VkMaterial {
      name: name.to_string(),
      fragment_modules,
      pipelines: HashMap::new(),
      uniforms_offset: None,
      stencil_ref: 0,
    })
  }

  /// Material of the scene renderers. Has no fullscreen passes.
  pub fn scene_only(name: &str) -> VkMaterial {
    VkMaterial {
      name: name.to_string(),
      fragment_modules: Vec::new(),
      pipelines: HashMap::new(),
      uniforms_offset: None,
      stencil_ref: 0,
    }
  }

  pub fn pass_count(&self) -> u32 {
    self.fragment_modules.len() as u32
  }

  pub fn get_or_create_pipeline(
    &mut self,
    device: &ash::Device,
    pipeline_cache: vk::PipelineCache,
    pipeline_layout: vk::PipelineLayout,
    vertex_module: vk::ShaderModule,
    pass_index: u32,
    render_pass: vk::RenderPass,
    render_pass_key: &RenderPassKey,
  ) -> vk::Pipeline {
    let cache_key = (pass_index, render_pass_key.clone());
    if let Some(pipeline) = self.pipelines.get(&cache_key) {
      return *pipeline;
    }

    let fragment_module = match self.fragment_modules.get(pass_index as usize) {
      Some(module) => *module,
      None => panic!(
        "Material '{}' has no pass {} (has {})",
        self.name,
        pass_index,
        self.pass_count()
      ),
    };
    debug!(
      "Creating pipeline for '{}' pass {}, {:?}",
      self.name, pass_index, render_pass_key
    );

    let stages = [
      shader_stage(vk::ShaderStageFlags::VERTEX, vertex_module),
      shader_stage(vk::ShaderStageFlags::FRAGMENT, fragment_module),
    ];
    let opts = FullscreenPipelineOpts {
      color_attachment_count: render_pass_key.color_formats.len(),
      stencil_equal_test: render_pass_key.depth_stencil.is_some(),
    };
    let pipeline = create_fullscreen_pipeline(
      device,
      pipeline_cache,
      render_pass,
      pipeline_layout,
      &stages,
      &opts,
    );

    self.pipelines.insert(cache_key, pipeline);
    pipeline
  }

  pub unsafe fn destroy(&mut self, device: &ash::Device) {
    self
      .pipelines
      .drain()
      .for_each(|(_, pipeline)| device.destroy_pipeline(pipeline, None));
    self
      .fragment_modules
      .drain(..)
      .for_each(|module| device.destroy_shader_module(module, None));
  }
}

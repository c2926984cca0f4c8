use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use ash::extensions::ext::DebugUtils;
use ash::extensions::khr::PushDescriptor;
use ash::vk;
use log::{debug, info, trace};

use crate::render_graph::{
  FilterMode, FullscreenDraw, GlobalTextureSlot, MaterialId, RenderHost, RenderTargetDesc,
  RendererTargets, SSSBlurUBO, TextureId,
};
use crate::vk_utils::*;

mod gpu_profiler;
mod texture_pool;
mod vk_material;

pub use self::gpu_profiler::{GpuProfiler, GpuProfilerReport};
pub use self::texture_pool::TexturePool;
use self::vk_material::VkMaterial;

/// Uniform writes possible in a single frame (one per material per camera)
const MAX_UNIFORM_WRITES_PER_FRAME: usize = 32;

const BINDING_UNIFORMS: u32 = 0;
const BINDING_SOURCE: u32 = 1;
const BINDING_CAMERA_COLOR: u32 = 2;
const BINDING_CAMERA_DEPTH: u32 = 3;
const BINDING_SPECULAR_IBL: u32 = 4;
const BINDING_SPECULAR_LUT: u32 = 5;
/// Stencil aspect of the mask, taps outside the masked surface are rejected
const BINDING_STENCIL: u32 = 6;

/// Pushed to every fullscreen pass.
/// `u_viewport`: `[width, height, 1/width, 1/height]` of the target.
#[derive(Copy, Clone, Debug)]
#[repr(C)]
pub struct FullscreenPushConstants {
  pub u_viewport: [f32; 4],
}

unsafe impl bytemuck::Zeroable for FullscreenPushConstants {}
unsafe impl bytemuck::Pod for FullscreenPushConstants {}

impl FullscreenPushConstants {
  pub fn new(size: &vk::Extent2D) -> Self {
    let (w, h) = (size.width as f32, size.height as f32);
    Self {
      u_viewport: [w, h, 1.0 / w, 1.0 / h],
    }
  }
}

/// What `draw_renderers` gives the application to record its scene draws with.
/// Render pass is already begun, viewport and scissor are set.
pub struct VkSceneDrawContext<'a> {
  pub device: &'a ash::Device,
  pub command_buffer: vk::CommandBuffer,
  pub render_pass: vk::RenderPass,
  pub size: vk::Extent2D,
  pub shader_tag: &'a str,
}

pub type VkSceneRenderer = Box<dyn FnMut(&VkSceneDrawContext)>;

pub struct VkHostCreateInfo {
  pub instance: ash::Instance,
  pub physical_device: vk::PhysicalDevice,
  pub device: ash::Device,
  pub allocator: Arc<vma::Allocator>,
  /// `None` if VK_EXT_debug_utils is not enabled
  pub debug_utils: Option<DebugUtils>,
  /// Directory with compiled `.spv` shaders
  pub shader_dir: PathBuf,
}

enum TextureOwner {
  /// Returns to the pool on release
  Temporary(RenderTargetDesc),
  Asset,
  /// Camera targets, never destroyed by us
  Imported,
}

struct HostTexture {
  texture: VkTexture,
  owner: TextureOwner,
  filter: FilterMode,
}

/// `RenderHost` that records every command into a Vulkan command buffer
/// provided by the application with `begin_frame`.
///
/// Only one frame in flight: call `on_frame_completed` after the command buffer
/// finished executing and before the next `begin_frame`.
pub struct VkRenderHost {
  device: ash::Device,
  allocator: Arc<vma::Allocator>,
  push_descriptor: PushDescriptor,
  debug_utils: Option<DebugUtils>,
  shader_dir: PathBuf,
  command_buffer: Option<vk::CommandBuffer>,
  renderer: Option<RendererTargets>,

  textures: HashMap<TextureId, HostTexture>,
  next_texture_id: u32,
  texture_pool: TexturePool<VkTexture>,
  assets: HashMap<String, TextureId>,
  globals: HashMap<GlobalTextureSlot, TextureId>,
  /// Bound instead of missing optional textures. 1x1 black
  fallback_texture: VkTexture,
  samplers: HashMap<FilterMode, vk::Sampler>,

  materials: Vec<VkMaterial>,
  vertex_module: vk::ShaderModule,
  descriptor_layout: vk::DescriptorSetLayout,
  pipeline_layout: vk::PipelineLayout,
  pipeline_cache: vk::PipelineCache,
  render_passes: HashMap<RenderPassKey, vk::RenderPass>,
  /// Framebuffers of the recorded frame, destroyed once it completes
  frame_framebuffers: Vec<vk::Framebuffer>,

  uniforms: VkUniformRing,

  scene_renderer: Option<VkSceneRenderer>,
  profiler: GpuProfiler,
}

impl VkRenderHost {
  pub fn new(create_info: VkHostCreateInfo) -> Self {
    let VkHostCreateInfo {
      instance,
      physical_device,
      device,
      allocator,
      debug_utils,
      shader_dir,
    } = create_info;
    info!("Creating Vulkan render host, shaders from {:?}", shader_dir);

    let limits = unsafe { instance.get_physical_device_properties(physical_device) }.limits;
    let push_descriptor = PushDescriptor::new(&instance, &device);

    let vertex_shader_path = fullscreen_vertex_shader_path(&shader_dir);
    let vertex_module = match load_shader_module(&device, &vertex_shader_path) {
      Some(module) => module,
      None => panic!(
        "Fullscreen vertex shader not found: {}",
        vertex_shader_path.to_string_lossy()
      ),
    };

    let descriptor_layout = create_push_descriptor_layout(
      &device,
      &[
        create_ubo_binding(BINDING_UNIFORMS, vk::ShaderStageFlags::FRAGMENT),
        create_texture_binding(BINDING_SOURCE, vk::ShaderStageFlags::FRAGMENT),
        create_texture_binding(BINDING_CAMERA_COLOR, vk::ShaderStageFlags::FRAGMENT),
        create_texture_binding(BINDING_CAMERA_DEPTH, vk::ShaderStageFlags::FRAGMENT),
        create_texture_binding(BINDING_SPECULAR_IBL, vk::ShaderStageFlags::FRAGMENT),
        create_texture_binding(BINDING_SPECULAR_LUT, vk::ShaderStageFlags::FRAGMENT),
        create_texture_binding(BINDING_STENCIL, vk::ShaderStageFlags::FRAGMENT),
      ],
    );
    let push_constant_ranges = [vk::PushConstantRange {
      stage_flags: vk::ShaderStageFlags::FRAGMENT,
      offset: 0,
      size: std::mem::size_of::<FullscreenPushConstants>() as u32,
    }];
    let pipeline_layout =
      create_pipeline_layout(&device, &[descriptor_layout], &push_constant_ranges);
    let pipeline_cache = create_pipeline_cache(&device);

    let uniforms = VkUniformRing::new::<SSSBlurUBO>(
      "SSSBlurUBO ring",
      MAX_UNIFORM_WRITES_PER_FRAME,
      limits.min_uniform_buffer_offset_alignment,
      &allocator,
    );

    let fallback_texture = VkTexture::empty(
      &device,
      &allocator,
      "Fallback".to_string(),
      vk::Extent2D {
        width: 1,
        height: 1,
      },
      vk::Format::R16G16B16A16_SFLOAT,
      vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::TRANSFER_DST,
    );
    let samplers = [FilterMode::Point, FilterMode::Bilinear]
      .iter()
      .map(|filter| (*filter, create_sampler(&device, *filter)))
      .collect();
    let profiler = GpuProfiler::new(&device, limits.timestamp_period);

    Self {
      device,
      allocator,
      push_descriptor,
      debug_utils,
      shader_dir,
      command_buffer: None,
      renderer: None,
      textures: HashMap::new(),
      next_texture_id: 1,
      texture_pool: TexturePool::new(),
      assets: HashMap::new(),
      globals: HashMap::new(),
      fallback_texture,
      samplers,
      materials: Vec::new(),
      vertex_module,
      descriptor_layout,
      pipeline_layout,
      pipeline_cache,
      render_passes: HashMap::new(),
      frame_framebuffers: Vec::new(),
      uniforms,
      scene_renderer: None,
      profiler,
    }
  }

  ////////////////////////////////
  // Application side
  ////////////////////////////////

  /// Wrap image owned by the application. Layout is tracked from now on,
  /// read it back with `texture_layout` after the frame.
  pub fn import_texture(&mut self, texture: VkTexture) -> TextureId {
    self.add_texture(texture, TextureOwner::Imported, FilterMode::Point)
  }

  /// Camera color and depth/stencil the passes work on. Both single sampled.
  pub fn set_renderer_targets(&mut self, camera_color: TextureId, camera_depth_stencil: TextureId) {
    let depth_texture = self.expect_texture(camera_depth_stencil);
    assert!(
      depth_texture.is_depth_stencil() && depth_texture.stencil_image_view().is_some(),
      "Camera depth target has to have depth and stencil aspects, and a stencil view"
    );
    self.renderer = Some(RendererTargets {
      camera_color,
      camera_depth_stencil,
    });
  }

  pub fn renderer_targets(&self) -> RendererTargets {
    match self.renderer {
      Some(targets) => targets,
      None => panic!("VkRenderHost: set_renderer_targets was not called"),
    }
  }

  /// Make `texture` loadable with `load_texture(path)`. Host takes ownership.
  pub fn register_asset(&mut self, path: &str, texture: VkTexture) -> TextureId {
    let id = self.add_texture(texture, TextureOwner::Asset, FilterMode::Bilinear);
    self.assets.insert(path.to_string(), id);
    id
  }

  /// Material for `draw_renderers` tags, the app draws with its own pipelines.
  pub fn register_scene_material(&mut self, shader_name: &str) {
    if self.find_loaded_material(shader_name).is_none() {
      self.materials.push(VkMaterial::scene_only(shader_name));
    }
  }

  pub fn set_scene_renderer(&mut self, scene_renderer: VkSceneRenderer) {
    self.scene_renderer = Some(scene_renderer);
  }

  pub fn texture_layout(&self, id: TextureId) -> vk::ImageLayout {
    self.expect_texture(id).layout
  }

  pub fn set_profiler_enabled(&mut self, enabled: bool) {
    self.profiler.set_enabled(enabled);
  }

  pub fn last_profiler_report(&self) -> Option<&GpuProfilerReport> {
    self.profiler.last_report.as_ref()
  }

  /// Start recording into `command_buffer`. It has to be in recording state
  /// and outside of any render pass.
  pub fn begin_frame(&mut self, command_buffer: vk::CommandBuffer) {
    if self.command_buffer.is_some() {
      panic!("VkRenderHost: begin_frame called twice without end_frame");
    }
    self.command_buffer = Some(command_buffer);
    self.uniforms.rewind();
    self
      .materials
      .iter_mut()
      .for_each(|material| material.uniforms_offset = None);
    self.profiler.begin_frame(&self.device, command_buffer);
    self.clear_fallback_texture(command_buffer);
  }

  /// Stop recording. Command buffer can be submitted now.
  pub fn end_frame(&mut self) {
    if self.command_buffer.take().is_none() {
      panic!("VkRenderHost: end_frame without begin_frame");
    }
  }

  /// Command buffer of the last frame finished executing on the GPU.
  pub fn on_frame_completed(&mut self) {
    let device = &self.device;
    self
      .frame_framebuffers
      .drain(..)
      .for_each(|fbo| unsafe { device.destroy_framebuffer(fbo, None) });
    self.profiler.end_frame(&self.device);
  }

  /// Drop pooled render targets, e.g. after resize. GPU has to be idle.
  pub unsafe fn purge_texture_pool(&mut self) {
    debug!("VkRenderHost: purging {} pooled textures", self.texture_pool.len());
    for mut texture in self.texture_pool.drain() {
      texture.delete(&self.device, &self.allocator);
    }
  }

  /// GPU has to be idle.
  pub unsafe fn destroy(&mut self) {
    self.on_frame_completed();
    self.purge_texture_pool();
    let device = &self.device;

    for (_, mut entry) in self.textures.drain() {
      entry.texture.delete(device, &self.allocator);
    }
    self.fallback_texture.delete(device, &self.allocator);
    self.uniforms.delete(&self.allocator);

    self
      .samplers
      .drain()
      .for_each(|(_, sampler)| device.destroy_sampler(sampler, None));
    self
      .materials
      .iter_mut()
      .for_each(|material| material.destroy(device));
    self
      .render_passes
      .drain()
      .for_each(|(_, render_pass)| device.destroy_render_pass(render_pass, None));
    device.destroy_shader_module(self.vertex_module, None);
    device.destroy_pipeline_cache(self.pipeline_cache, None);
    device.destroy_pipeline_layout(self.pipeline_layout, None);
    device.destroy_descriptor_set_layout(self.descriptor_layout, None);
    self.profiler.destroy(device);
  }

  ////////////////////////////////
  // Internals
  ////////////////////////////////

  fn add_texture(&mut self, texture: VkTexture, owner: TextureOwner, filter: FilterMode) -> TextureId {
    let id = TextureId(self.next_texture_id);
    self.next_texture_id += 1;
    self.textures.insert(
      id,
      HostTexture {
        texture,
        owner,
        filter,
      },
    );
    id
  }

  fn expect_texture(&self, id: TextureId) -> &VkTexture {
    match self.textures.get(&id) {
      Some(entry) => &entry.texture,
      None => panic!("VkRenderHost: texture {:?} does not exist", id),
    }
  }

  fn current_command_buffer(&self) -> vk::CommandBuffer {
    match self.command_buffer {
      Some(cb) => cb,
      None => panic!("VkRenderHost: GPU command recorded outside begin_frame/end_frame"),
    }
  }

  fn find_loaded_material(&self, shader_name: &str) -> Option<MaterialId> {
    self
      .materials
      .iter()
      .position(|m| m.name == shader_name)
      .map(|idx| MaterialId(idx as u32))
  }

  fn material_mut(&mut self, material: MaterialId) -> &mut VkMaterial {
    match self.materials.get_mut(material.0 as usize) {
      Some(m) => m,
      None => panic!("VkRenderHost: material {:?} does not exist", material),
    }
  }

  fn transition(&mut self, id: TextureId, layout: vk::ImageLayout) {
    let command_buffer = self.current_command_buffer();
    match self.textures.get_mut(&id) {
      Some(entry) => entry.texture.cmd_transition(&self.device, command_buffer, layout),
      None => panic!("VkRenderHost: texture {:?} does not exist", id),
    }
  }

  fn transition_for_sampling(&mut self, id: TextureId) {
    let layout = self.expect_texture(id).sampled_layout();
    self.transition(id, layout);
  }

  fn clear_fallback_texture(&mut self, command_buffer: vk::CommandBuffer) {
    if self.fallback_texture.layout != vk::ImageLayout::UNDEFINED {
      return;
    }
    let device = &self.device;
    let texture = &mut self.fallback_texture;
    texture.cmd_transition(device, command_buffer, vk::ImageLayout::TRANSFER_DST_OPTIMAL);
    let range = vk::ImageSubresourceRange {
      aspect_mask: vk::ImageAspectFlags::COLOR,
      base_mip_level: 0,
      level_count: 1,
      base_array_layer: 0,
      layer_count: 1,
    };
    unsafe {
      device.cmd_clear_color_image(
        command_buffer,
        texture.image,
        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        &vk::ClearColorValue {
          float32: [0.0, 0.0, 0.0, 0.0],
        },
        &[range],
      );
    }
    texture.cmd_transition(device, command_buffer, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
  }

  fn get_or_create_render_pass(&mut self, key: &RenderPassKey) -> vk::RenderPass {
    if let Some(render_pass) = self.render_passes.get(key) {
      return *render_pass;
    }
    let render_pass = create_render_pass(&self.device, key);
    self.render_passes.insert(key.clone(), render_pass);
    render_pass
  }

  /// Framebuffer lives until the frame completes
  fn create_frame_framebuffer(
    &mut self,
    render_pass: vk::RenderPass,
    attachments: &[TextureId],
  ) -> vk::Framebuffer {
    let image_views: Vec<vk::ImageView> = attachments
      .iter()
      .map(|id| self.expect_texture(*id).image_view())
      .collect();
    let size = self.expect_texture(attachments[0]).size();
    let fbo = create_framebuffer(&self.device, render_pass, &image_views, &size);
    self.frame_framebuffers.push(fbo);
    fbo
  }

  /// Global texture, or the fallback if nothing is bound.
  fn sampled_resource(&self, binding: u32, texture: Option<TextureId>) -> BindableResource<'_> {
    let entry = texture.and_then(|id| self.textures.get(&id));
    match entry {
      Some(entry) => BindableResource::Texture {
        binding,
        texture: &entry.texture,
        image_view: entry.texture.sampled_image_view(),
        sampler: self.samplers[&entry.filter],
      },
      None => BindableResource::Texture {
        binding,
        texture: &self.fallback_texture,
        image_view: self.fallback_texture.sampled_image_view(),
        sampler: self.samplers[&FilterMode::Point],
      },
    }
  }

  /// Integer texture, always point sampled
  fn stencil_resource(&self, texture: TextureId) -> BindableResource<'_> {
    let texture = self.expect_texture(texture);
    let image_view = match texture.stencil_image_view() {
      Some(view) => view,
      None => panic!("VkRenderHost: {} has no stencil", texture.name()),
    };
    BindableResource::Texture {
      binding: BINDING_STENCIL,
      texture,
      image_view,
      sampler: self.samplers[&FilterMode::Point],
    }
  }

  fn begin_debug_label(&self, name: &str) {
    if let Some(debug_utils) = &self.debug_utils {
      unsafe { cmd_begin_debug_label(debug_utils, self.current_command_buffer(), name) };
    }
  }

  fn end_debug_label(&self) {
    if let Some(debug_utils) = &self.debug_utils {
      unsafe { cmd_end_debug_label(debug_utils, self.current_command_buffer()) };
    }
  }
}

impl RenderHost for VkRenderHost {
  fn find_material(&mut self, shader_name: &str) -> Option<MaterialId> {
    if let Some(material) = self.find_loaded_material(shader_name) {
      return Some(material);
    }
    let material = VkMaterial::load(&self.device, &self.shader_dir, shader_name)?;
    self.materials.push(material);
    Some(MaterialId((self.materials.len() - 1) as u32))
  }

  fn get_temporary_rt(&mut self, name: &str, desc: &RenderTargetDesc) -> TextureId {
    let texture = match self.texture_pool.acquire(desc) {
      Some(texture) => texture,
      None => {
        debug!("VkRenderHost: allocating '{}' {:?}", name, desc);
        VkTexture::render_target(&self.device, &self.allocator, name, desc)
      }
    };
    self.add_texture(texture, TextureOwner::Temporary(*desc), desc.filter)
  }

  fn release_temporary_rt(&mut self, texture: TextureId) {
    let entry = match self.textures.remove(&texture) {
      Some(entry) => entry,
      None => panic!("VkRenderHost: released unknown texture {:?}", texture),
    };
    match entry.owner {
      TextureOwner::Temporary(desc) => self.texture_pool.release(desc, entry.texture),
      _ => panic!(
        "VkRenderHost: {} is not a temporary render target",
        entry.texture.name()
      ),
    }
    self.globals.retain(|_, bound| *bound != texture);
  }

  fn load_texture(&mut self, path: &str) -> Option<TextureId> {
    self.assets.get(path).copied()
  }

  fn set_global_texture(&mut self, slot: GlobalTextureSlot, texture: TextureId) {
    self.expect_texture(texture);
    self.globals.insert(slot, texture);
  }

  fn set_material_uniforms(&mut self, material: MaterialId, uniforms: &SSSBlurUBO) {
    let offset = self.uniforms.push(uniforms);
    let vk_material = self.material_mut(material);
    vk_material.uniforms_offset = Some(offset);
    vk_material.stencil_ref = uniforms.stencil_ref() as u32;
  }

  fn begin_sample(&mut self, name: &str) {
    let command_buffer = self.current_command_buffer();
    self.begin_debug_label(name);
    self.profiler.begin_scope(&self.device, command_buffer, name);
  }

  fn end_sample(&mut self, name: &str) {
    let command_buffer = self.current_command_buffer();
    self.profiler.end_scope(&self.device, command_buffer, name);
    self.end_debug_label();
  }

  fn draw_fullscreen(&mut self, material: MaterialId, draw: &FullscreenDraw) {
    let command_buffer = self.current_command_buffer();
    let renderer = self.renderer_targets();
    let vk_material = self.material_mut(material);
    let (uniforms_offset, stencil_ref) = match vk_material.uniforms_offset {
      Some(offset) => (offset, vk_material.stencil_ref),
      None => panic!(
        "VkRenderHost: draw with material {:?} before its uniforms were set",
        material
      ),
    };

    let sampled = [
      Some(draw.source),
      self.globals.get(&GlobalTextureSlot::CameraColor).copied(),
      Some(renderer.camera_depth_stencil),
      self.globals.get(&GlobalTextureSlot::SpecularIBL).copied(),
      self.globals.get(&GlobalTextureSlot::SpecularLUT).copied(),
    ];
    if sampled.contains(&Some(draw.target)) {
      panic!(
        "VkRenderHost: {} is both sampled and drawn to",
        self.expect_texture(draw.target).name()
      );
    }

    // layouts
    sampled
      .iter()
      .flatten()
      .for_each(|id| self.transition_for_sampling(*id));
    self.transition(draw.target, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
    let mut attachments = vec![draw.target];
    let target = self.expect_texture(draw.target);
    let size = target.size();
    let mut render_pass_key = RenderPassKey {
      color_formats: vec![target.format],
      color_load_op: if draw.clear_target {
        vk::AttachmentLoadOp::CLEAR
      } else {
        vk::AttachmentLoadOp::LOAD
      },
      depth_stencil: None,
    };
    if let Some(ds) = draw.depth_stencil {
      let ds_texture = self.expect_texture(ds);
      if ds_texture.size() != size {
        panic!(
          "VkRenderHost: stencil mask {} does not match target size {:?}",
          ds_texture.name(),
          size
        );
      }
      let layout = vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL;
      render_pass_key.depth_stencil = Some((ds_texture.format, layout));
      self.transition(ds, layout);
      attachments.push(ds);
    }

    // pipeline objects
    let render_pass = self.get_or_create_render_pass(&render_pass_key);
    let framebuffer = self.create_frame_framebuffer(render_pass, &attachments);
    let (device, pipeline_cache, pipeline_layout, vertex_module) = (
      &self.device,
      self.pipeline_cache,
      self.pipeline_layout,
      self.vertex_module,
    );
    let pipeline = match self.materials.get_mut(material.0 as usize) {
      Some(m) => m.get_or_create_pipeline(
        device,
        pipeline_cache,
        pipeline_layout,
        vertex_module,
        draw.pass_index,
        render_pass,
        &render_pass_key,
      ),
      None => panic!("VkRenderHost: material {:?} does not exist", material),
    };
    trace!(
      "VkRenderHost: pass {} -> {}",
      draw.pass_index,
      self.expect_texture(draw.target).name()
    );

    let clear_values = [
      vk::ClearValue {
        color: vk::ClearColorValue {
          float32: [0.0, 0.0, 0.0, 0.0],
        },
      },
      vk::ClearValue {
        depth_stencil: vk::ClearDepthStencilValue {
          depth: 1.0,
          stencil: 0,
        },
      },
    ];
    let resources = [
      BindableResource::Uniform {
        binding: BINDING_UNIFORMS,
        buffer: &self.uniforms.buffer,
        offset: uniforms_offset,
        range: self.uniforms.block_range::<SSSBlurUBO>(),
      },
      self.sampled_resource(BINDING_SOURCE, sampled[0]),
      self.sampled_resource(BINDING_CAMERA_COLOR, sampled[1]),
      self.sampled_resource(BINDING_CAMERA_DEPTH, sampled[2]),
      self.sampled_resource(BINDING_SPECULAR_IBL, sampled[3]),
      self.sampled_resource(BINDING_SPECULAR_LUT, sampled[4]),
      self.stencil_resource(draw.depth_stencil.unwrap_or(renderer.camera_depth_stencil)),
    ];
    let binder = ResouceBinder {
      push_descriptor: &self.push_descriptor,
      command_buffer,
      pipeline_layout: self.pipeline_layout,
    };
    let push_constants = FullscreenPushConstants::new(&size);

    unsafe {
      cmd_begin_render_pass_for_framebuffer(
        &self.device,
        &command_buffer,
        &render_pass,
        &framebuffer,
        &size,
        &clear_values,
      );
      self
        .device
        .cmd_bind_pipeline(command_buffer, vk::PipelineBindPoint::GRAPHICS, pipeline);
      bind_resources_to_descriptors(&binder, 0, &resources);
      self.device.cmd_push_constants(
        command_buffer,
        self.pipeline_layout,
        vk::ShaderStageFlags::FRAGMENT,
        0,
        bytemuck::bytes_of(&push_constants),
      );
      if draw.depth_stencil.is_some() {
        self.device.cmd_set_stencil_reference(
          command_buffer,
          vk::StencilFaceFlags::FRONT_AND_BACK,
          stencil_ref,
        );
      }
      self.device.cmd_draw(command_buffer, 3, 1, 0, 0);
      self.device.cmd_end_render_pass(command_buffer);
    }
  }

  fn blit(&mut self, source: TextureId, target: TextureId) {
    let command_buffer = self.current_command_buffer();
    self.transition(source, vk::ImageLayout::TRANSFER_SRC_OPTIMAL);
    self.transition(target, vk::ImageLayout::TRANSFER_DST_OPTIMAL);

    let src = self.expect_texture(source);
    let dst = self.expect_texture(target);
    if src.aspect_flags() != dst.aspect_flags() {
      panic!("VkRenderHost: cannot blit {} into {}", src.name(), dst.name());
    }
    let subresource = vk::ImageSubresourceLayers {
      aspect_mask: src.aspect_flags(),
      mip_level: 0,
      base_array_layer: 0,
      layer_count: 1,
    };
    let region = vk::ImageBlit {
      src_subresource: subresource,
      src_offsets: [
        vk::Offset3D { x: 0, y: 0, z: 0 },
        vk::Offset3D {
          x: src.width as i32,
          y: src.height as i32,
          z: 1,
        },
      ],
      dst_subresource: subresource,
      dst_offsets: [
        vk::Offset3D { x: 0, y: 0, z: 0 },
        vk::Offset3D {
          x: dst.width as i32,
          y: dst.height as i32,
          z: 1,
        },
      ],
    };

    unsafe {
      self.device.cmd_blit_image(
        command_buffer,
        src.image,
        vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
        dst.image,
        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        &[region],
        vk::Filter::NEAREST,
      );
    }
  }

  fn draw_renderers(
    &mut self,
    shader_tag: &str,
    color_targets: &[TextureId],
    depth_stencil: TextureId,
  ) {
    let command_buffer = self.current_command_buffer();
    let mut scene_renderer = match self.scene_renderer.take() {
      Some(r) => r,
      None => panic!(
        "VkRenderHost: draw_renderers('{}') without scene renderer",
        shader_tag
      ),
    };

    color_targets
      .iter()
      .for_each(|id| self.transition(*id, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL));
    let ds_layout = vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL;
    self.transition(depth_stencil, ds_layout);

    let render_pass_key = RenderPassKey {
      color_formats: color_targets
        .iter()
        .map(|id| self.expect_texture(*id).format)
        .collect(),
      color_load_op: vk::AttachmentLoadOp::CLEAR,
      depth_stencil: Some((self.expect_texture(depth_stencil).format, ds_layout)),
    };
    let render_pass = self.get_or_create_render_pass(&render_pass_key);
    let mut attachments = color_targets.to_vec();
    attachments.push(depth_stencil);
    let framebuffer = self.create_frame_framebuffer(render_pass, &attachments);
    let size = self.expect_texture(depth_stencil).size();

    let mut clear_values: Vec<vk::ClearValue> = color_targets
      .iter()
      .map(|_| vk::ClearValue {
        color: vk::ClearColorValue {
          float32: [0.0, 0.0, 0.0, 0.0],
        },
      })
      .collect();
    clear_values.push(vk::ClearValue {
      depth_stencil: vk::ClearDepthStencilValue {
        depth: 1.0,
        stencil: 0,
      },
    });

    unsafe {
      cmd_begin_render_pass_for_framebuffer(
        &self.device,
        &command_buffer,
        &render_pass,
        &framebuffer,
        &size,
        &clear_values,
      );
    }
    scene_renderer(&VkSceneDrawContext {
      device: &self.device,
      command_buffer,
      render_pass,
      size,
      shader_tag,
    });
    unsafe { self.device.cmd_end_render_pass(command_buffer) };
    self.scene_renderer = Some(scene_renderer);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn push_constants_describe_target() {
    let pc = FullscreenPushConstants::new(&vk::Extent2D {
      width: 200,
      height: 100,
    });
    assert_eq!(pc.u_viewport, [200.0, 100.0, 0.005, 0.01]);
    assert_eq!(bytemuck::bytes_of(&pc).len(), 16);
  }
}

use super::{RenderTargetDesc, SSSBlurUBO};

/// Handle to a texture owned by the host.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TextureId(pub u32);

/// Handle to a compiled shader (with all its passes) owned by the host.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct MaterialId(pub u32);

/// Named texture bindings visible to every shader.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum GlobalTextureSlot {
  /// Source of the current fullscreen draw
  MainTex,
  /// Camera color as it was before post-processing
  CameraColor,
  TempTex,
  BlurTex,
  SpecularIBL,
  SpecularLUT,
  GBuffer0,
  GBuffer1,
  GBuffer2,
  GBuffer3,
}

impl GlobalTextureSlot {
  pub const GBUFFERS: [GlobalTextureSlot; 4] = [
    GlobalTextureSlot::GBuffer0,
    GlobalTextureSlot::GBuffer1,
    GlobalTextureSlot::GBuffer2,
    GlobalTextureSlot::GBuffer3,
  ];
}

/// Camera targets of the renderer the passes were registered with.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RendererTargets {
  pub camera_color: TextureId,
  pub camera_depth_stencil: TextureId,
}

/// Single screen-space draw (identity view/projection).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FullscreenDraw {
  /// Which pass of the material to run
  pub pass_index: u32,
  pub source: TextureId,
  pub target: TextureId,
  /// Read-only stencil mask. Only pixels where stencil equals the bound
  /// reference value are written. Nothing is ever written to this texture.
  pub depth_stencil: Option<TextureId>,
  /// Clear target to transparent black before the draw
  pub clear_target: bool,
}

/// Everything the passes need from the renderer they are plugged into.
/// Calls are recorded in order, the host decides when they reach the GPU.
pub trait RenderHost {
  /// `None` if the shader does not exist.
  fn find_material(&mut self, shader_name: &str) -> Option<MaterialId>;

  fn get_temporary_rt(&mut self, name: &str, desc: &RenderTargetDesc) -> TextureId;

  fn release_temporary_rt(&mut self, texture: TextureId);

  /// `None` if the asset does not exist.
  fn load_texture(&mut self, path: &str) -> Option<TextureId>;

  fn set_global_texture(&mut self, slot: GlobalTextureSlot, texture: TextureId);

  fn set_material_uniforms(&mut self, material: MaterialId, uniforms: &SSSBlurUBO);

  /// Start named profiler scope
  fn begin_sample(&mut self, name: &str);

  fn end_sample(&mut self, name: &str);

  fn draw_fullscreen(&mut self, material: MaterialId, draw: &FullscreenDraw);

  fn blit(&mut self, source: TextureId, target: TextureId);

  /// Draw scene objects tagged with `shader_tag` into multiple render targets.
  fn draw_renderers(
    &mut self,
    shader_tag: &str,
    color_targets: &[TextureId],
    depth_stencil: TextureId,
  );
}

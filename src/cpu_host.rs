use std::collections::HashMap;

use glam::Vec4;
use log::{debug, trace};

use crate::render_graph::{
  FullscreenDraw, GlobalTextureSlot, MaterialId, RenderHost, RenderTargetDesc, RendererTargets,
  SSSBlurUBO, SSSMaterialPass, TextureFormat, TextureId,
};

mod cpu_texture;
mod sss_shaders;

pub use self::cpu_texture::CpuTexture;
pub use self::sss_shaders::linear_depth;
use self::sss_shaders::{BlurInputs, SampleMask, SpecularInputs};

/// Draws scene objects for `draw_renderers`: (shader tag, color targets, depth/stencil).
pub type CpuSceneRenderer = Box<dyn FnMut(&str, &mut [CpuTexture], &mut CpuTexture)>;

/// Everything the passes asked of the host, in order.
#[derive(Clone, Debug, PartialEq)]
pub enum HostCommand {
  FindMaterial {
    shader_name: String,
    material: Option<MaterialId>,
  },
  GetTemporaryRT {
    name: String,
    texture: TextureId,
    desc: RenderTargetDesc,
  },
  ReleaseTemporaryRT {
    texture: TextureId,
  },
  LoadTexture {
    path: String,
    texture: Option<TextureId>,
  },
  SetGlobalTexture {
    slot: GlobalTextureSlot,
    texture: TextureId,
  },
  SetMaterialUniforms {
    material: MaterialId,
  },
  BeginSample {
    name: String,
  },
  EndSample {
    name: String,
  },
  DrawFullscreen {
    material: MaterialId,
    draw: FullscreenDraw,
  },
  Blit {
    source: TextureId,
    target: TextureId,
  },
  DrawRenderers {
    shader_tag: String,
    color_targets: Vec<TextureId>,
    depth_stencil: TextureId,
  },
}

/// Shaders the host knows about
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum CpuShader {
  /// 3 pass separable SSS, see `SSSMaterialPass`
  SeparableSSS,
  /// Lit shading model of the scene renderers. No fullscreen passes
  Lit,
}

const BUILTIN_SHADERS: [(&str, CpuShader); 2] =
  [("S_SSSS", CpuShader::SeparableSSS), ("S_PBR", CpuShader::Lit)];

/// Reference implementation of `RenderHost` that executes every command immediately
/// in system memory. Records each call, so tests can check what the passes did.
pub struct CpuRenderHost {
  renderer: RendererTargets,
  textures: HashMap<TextureId, CpuTexture>,
  next_texture_id: u32,
  assets: HashMap<String, TextureId>,
  globals: HashMap<GlobalTextureSlot, TextureId>,
  materials: Vec<CpuShader>,
  uniforms: HashMap<MaterialId, SSSBlurUBO>,
  open_samples: Vec<String>,
  command_log: Vec<HostCommand>,
  scene_renderer: Option<CpuSceneRenderer>,
}

impl CpuRenderHost {
  pub const CAMERA_COLOR_NAME: &'static str = "_CameraColorTexture";
  pub const CAMERA_DEPTH_NAME: &'static str = "_CameraDepthTexture";

  /// Creates camera color and depth/stencil targets matching `camera_desc`.
  pub fn new(camera_desc: RenderTargetDesc) -> Self {
    let mut host = Self {
      renderer: RendererTargets {
        camera_color: TextureId(0),
        camera_depth_stencil: TextureId(0),
      },
      textures: HashMap::new(),
      next_texture_id: 1,
      assets: HashMap::new(),
      globals: HashMap::new(),
      materials: Vec::new(),
      uniforms: HashMap::new(),
      open_samples: Vec::new(),
      command_log: Vec::new(),
      scene_renderer: None,
    };

    let depth_desc = RenderTargetDesc {
      format: TextureFormat::Depth24Stencil8,
      ..camera_desc
    };
    host.renderer = RendererTargets {
      camera_color: host.add_texture(CpuTexture::new(Self::CAMERA_COLOR_NAME, &camera_desc)),
      camera_depth_stencil: host.add_texture(CpuTexture::new(Self::CAMERA_DEPTH_NAME, &depth_desc)),
    };
    host
  }

  pub fn renderer_targets(&self) -> RendererTargets {
    self.renderer
  }

  fn add_texture(&mut self, texture: CpuTexture) -> TextureId {
    let id = TextureId(self.next_texture_id);
    self.next_texture_id += 1;
    self.textures.insert(id, texture);
    id
  }

  /// Make `texture` loadable through `load_texture(path)`.
  pub fn register_asset(&mut self, path: &str, texture: CpuTexture) -> TextureId {
    let id = self.add_texture(texture);
    self.assets.insert(path.to_string(), id);
    id
  }

  pub fn set_scene_renderer(&mut self, scene_renderer: CpuSceneRenderer) {
    self.scene_renderer = Some(scene_renderer);
  }

  pub fn texture(&self, id: TextureId) -> Option<&CpuTexture> {
    self.textures.get(&id)
  }

  pub fn texture_mut(&mut self, id: TextureId) -> Option<&mut CpuTexture> {
    self.textures.get_mut(&id)
  }

  pub fn texture_desc(&self, id: TextureId) -> Option<RenderTargetDesc> {
    self.textures.get(&id).map(|t| *t.desc())
  }

  pub fn camera_color(&self) -> &CpuTexture {
    self.expect_texture(self.renderer.camera_color)
  }

  pub fn camera_color_mut(&mut self) -> &mut CpuTexture {
    let id = self.renderer.camera_color;
    self.expect_texture_mut(id)
  }

  pub fn camera_depth_stencil_mut(&mut self) -> &mut CpuTexture {
    let id = self.renderer.camera_depth_stencil;
    self.expect_texture_mut(id)
  }

  pub fn live_texture_count(&self) -> usize {
    self.textures.len()
  }

  pub fn global_texture(&self, slot: GlobalTextureSlot) -> Option<TextureId> {
    self.globals.get(&slot).copied()
  }

  pub fn material_uniforms(&self, material: MaterialId) -> Option<&SSSBlurUBO> {
    self.uniforms.get(&material)
  }

  pub fn command_log(&self) -> &[HostCommand] {
    &self.command_log
  }

  pub fn clear_command_log(&mut self) {
    self.command_log.clear();
  }

  fn expect_texture(&self, id: TextureId) -> &CpuTexture {
    match self.textures.get(&id) {
      Some(t) => t,
      None => panic!("CpuRenderHost: texture {:?} does not exist", id),
    }
  }

  fn expect_texture_mut(&mut self, id: TextureId) -> &mut CpuTexture {
    match self.textures.get_mut(&id) {
      Some(t) => t,
      None => panic!("CpuRenderHost: texture {:?} does not exist", id),
    }
  }

  fn global_texture_ref(&self, slot: GlobalTextureSlot) -> Option<&CpuTexture> {
    self.global_texture(slot).and_then(|id| self.textures.get(&id))
  }

  fn shader(&self, material: MaterialId) -> CpuShader {
    match self.materials.get(material.0 as usize) {
      Some(shader) => *shader,
      None => panic!("CpuRenderHost: material {:?} does not exist", material),
    }
  }

  fn write_texels(&mut self, target: TextureId, clear: bool, texels: Vec<Option<Vec4>>) {
    let target = self.expect_texture_mut(target);
    if clear {
      target.fill_color(Vec4::ZERO);
    }
    let width = target.width();
    texels
      .into_iter()
      .enumerate()
      .filter_map(|(idx, texel)| texel.map(|c| (idx as u32, c)))
      .for_each(|(idx, color)| target.set_color(idx % width, idx / width, color));
  }

  fn execute_sss_pass(&mut self, material: MaterialId, draw: &FullscreenDraw) {
    let ubo = match self.uniforms.get(&material) {
      Some(ubo) => ubo,
      None => panic!("CpuRenderHost: draw with material {:?} before its uniforms were set", material),
    };
    let pass = match SSSMaterialPass::from_index(draw.pass_index) {
      Some(p) => p,
      None => panic!("CpuRenderHost: S_SSSS has no pass {}", draw.pass_index),
    };
    let target = self.expect_texture(draw.target);
    let (target_w, target_h) = (target.width(), target.height());
    let source = self.expect_texture(draw.source);
    let camera_depth = self.expect_texture(self.renderer.camera_depth_stencil);

    let texels = match pass {
      SSSMaterialPass::BlurHorizontal => {
        let stencil_tex = match draw.depth_stencil {
          Some(id) => self.expect_texture(id),
          None => panic!("CpuRenderHost: 1st SSS blur requires the stencil mask"),
        };
        let inputs = BlurInputs {
          ubo,
          color: source,
          depth_stencil: camera_depth,
          mask: SampleMask::Stencil(stencil_tex, ubo.stencil_ref()),
        };
        sss_shaders::blur_horizontal(&inputs, target_w, target_h)
      }
      SSSMaterialPass::BlurVertical => {
        let inputs = BlurInputs {
          ubo,
          color: source,
          depth_stencil: camera_depth,
          mask: SampleMask::Alpha,
        };
        sss_shaders::blur_vertical(&inputs, target_w, target_h)
      }
      SSSMaterialPass::SpecularRecombine => {
        let camera_color = match self.global_texture_ref(GlobalTextureSlot::CameraColor) {
          Some(t) => t,
          None => panic!("CpuRenderHost: specular recombination requires CameraColor"),
        };
        let inputs = SpecularInputs {
          blurred: source,
          camera_color,
          specular_ibl: self.global_texture_ref(GlobalTextureSlot::SpecularIBL),
          specular_lut: self.global_texture_ref(GlobalTextureSlot::SpecularLUT),
        };
        sss_shaders::specular_recombine(&inputs, target_w, target_h)
      }
    };

    trace!("CpuRenderHost: {:?} -> {:?}", pass, draw.target);
    self.write_texels(draw.target, draw.clear_target, texels);
  }
}

impl RenderHost for CpuRenderHost {
  fn find_material(&mut self, shader_name: &str) -> Option<MaterialId> {
    let material = BUILTIN_SHADERS
      .iter()
      .find(|(name, _)| *name == shader_name)
      .map(|(_, shader)| match self.materials.iter().position(|s| s == shader) {
        Some(idx) => MaterialId(idx as u32),
        None => {
          self.materials.push(*shader);
          MaterialId((self.materials.len() - 1) as u32)
        }
      });

    self.command_log.push(HostCommand::FindMaterial {
      shader_name: shader_name.to_string(),
      material,
    });
    material
  }

  fn get_temporary_rt(&mut self, name: &str, desc: &RenderTargetDesc) -> TextureId {
    let texture = self.add_texture(CpuTexture::new(name, desc));
    debug!(
      "CpuRenderHost: allocated {} as {:?}",
      self.expect_texture(texture).name(),
      texture
    );
    self.command_log.push(HostCommand::GetTemporaryRT {
      name: name.to_string(),
      texture,
      desc: *desc,
    });
    texture
  }

  fn release_temporary_rt(&mut self, texture: TextureId) {
    if self.textures.remove(&texture).is_none() {
      panic!("CpuRenderHost: released unknown texture {:?}", texture);
    }
    self.globals.retain(|_, bound| *bound != texture);
    self.command_log.push(HostCommand::ReleaseTemporaryRT { texture });
  }

  fn load_texture(&mut self, path: &str) -> Option<TextureId> {
    let texture = self.assets.get(path).copied();
    self.command_log.push(HostCommand::LoadTexture {
      path: path.to_string(),
      texture,
    });
    texture
  }

  fn set_global_texture(&mut self, slot: GlobalTextureSlot, texture: TextureId) {
    self.expect_texture(texture);
    self.globals.insert(slot, texture);
    self
      .command_log
      .push(HostCommand::SetGlobalTexture { slot, texture });
  }

  fn set_material_uniforms(&mut self, material: MaterialId, uniforms: &SSSBlurUBO) {
    // validates the handle
    let _ = self.shader(material);
    self.uniforms.insert(material, *uniforms);
    self
      .command_log
      .push(HostCommand::SetMaterialUniforms { material });
  }

  fn begin_sample(&mut self, name: &str) {
    self.open_samples.push(name.to_string());
    self.command_log.push(HostCommand::BeginSample {
      name: name.to_string(),
    });
  }

  fn end_sample(&mut self, name: &str) {
    match self.open_samples.pop() {
      Some(open) if open == name => (),
      open => panic!(
        "CpuRenderHost: end_sample('{}') does not match open sample {:?}",
        name, open
      ),
    }
    self.command_log.push(HostCommand::EndSample {
      name: name.to_string(),
    });
  }

  fn draw_fullscreen(&mut self, material: MaterialId, draw: &FullscreenDraw) {
    self.command_log.push(HostCommand::DrawFullscreen {
      material,
      draw: *draw,
    });
    match self.shader(material) {
      CpuShader::SeparableSSS => self.execute_sss_pass(material, draw),
      shader => panic!("CpuRenderHost: {:?} has no fullscreen passes", shader),
    }
  }

  fn blit(&mut self, source: TextureId, target: TextureId) {
    self.command_log.push(HostCommand::Blit { source, target });
    let mut target_tex = match self.textures.remove(&target) {
      Some(t) => t,
      None => panic!("CpuRenderHost: blit into unknown texture {:?}", target),
    };
    target_tex.copy_from(self.expect_texture(source));
    self.textures.insert(target, target_tex);
  }

  fn draw_renderers(
    &mut self,
    shader_tag: &str,
    color_targets: &[TextureId],
    depth_stencil: TextureId,
  ) {
    self.command_log.push(HostCommand::DrawRenderers {
      shader_tag: shader_tag.to_string(),
      color_targets: color_targets.to_vec(),
      depth_stencil,
    });

    let mut targets: Vec<CpuTexture> = color_targets
      .iter()
      .map(|id| match self.textures.remove(id) {
        Some(t) => t,
        None => panic!("CpuRenderHost: draw into unknown texture {:?}", id),
      })
      .collect();
    targets.iter_mut().for_each(|t| t.fill_color(Vec4::ZERO));
    let mut depth = match self.textures.remove(&depth_stencil) {
      Some(t) => t,
      None => panic!("CpuRenderHost: unknown depth/stencil {:?}", depth_stencil),
    };

    if let Some(scene_renderer) = self.scene_renderer.as_mut() {
      scene_renderer(shader_tag, targets.as_mut_slice(), &mut depth);
    }

    self.textures.insert(depth_stencil, depth);
    color_targets
      .iter()
      .zip(targets.into_iter())
      .for_each(|(id, t)| {
        self.textures.insert(*id, t);
      });
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::render_graph::FilterMode;
  use glam::vec4;

  fn camera_desc() -> RenderTargetDesc {
    RenderTargetDesc {
      width: 4,
      height: 4,
      format: TextureFormat::DefaultHDR,
      msaa_samples: 1,
      depth_buffer_bits: 24,
      use_mipmap: false,
      auto_generate_mips: false,
      filter: FilterMode::Bilinear,
    }
  }

  #[test]
  fn creates_camera_targets() {
    let host = CpuRenderHost::new(camera_desc());
    let renderer = host.renderer_targets();
    assert_eq!(host.live_texture_count(), 2);
    assert_eq!(
      host.texture_desc(renderer.camera_depth_stencil).map(|d| d.format),
      Some(TextureFormat::Depth24Stencil8)
    );
    assert!(!host.camera_color().is_depth_stencil());
  }

  #[test]
  fn finds_only_builtin_shaders() {
    let mut host = CpuRenderHost::new(camera_desc());
    let sss = host.find_material("S_SSSS");
    assert!(sss.is_some());
    assert_eq!(host.find_material("S_SSSS"), sss);
    assert!(host.find_material("S_PBR").is_some());
    assert_ne!(host.find_material("S_PBR"), sss);
    assert_eq!(host.find_material("S_Unknown"), None);
  }

  #[test]
  fn load_texture_returns_registered_assets() {
    let mut host = CpuRenderHost::new(camera_desc());
    let lut = host.register_asset("Tex/GI/LUT", CpuTexture::new("lut", &camera_desc()));
    assert_eq!(host.load_texture("Tex/GI/LUT"), Some(lut));
    assert_eq!(host.load_texture("Tex/GI/Missing"), None);
  }

  #[test]
  fn release_unbinds_globals() {
    let mut host = CpuRenderHost::new(camera_desc());
    let tex = host.get_temporary_rt("_TempTex", &camera_desc());
    host.set_global_texture(GlobalTextureSlot::TempTex, tex);
    host.release_temporary_rt(tex);
    assert_eq!(host.global_texture(GlobalTextureSlot::TempTex), None);
    assert_eq!(host.live_texture_count(), 2);
  }

  #[test]
  fn blit_copies_texels() {
    let mut host = CpuRenderHost::new(camera_desc());
    let tex = host.get_temporary_rt("_TempTex", &camera_desc());
    host
      .texture_mut(tex)
      .expect("allocated")
      .fill_color(vec4(0.1, 0.2, 0.3, 1.0));
    let camera_color = host.renderer_targets().camera_color;
    host.blit(tex, camera_color);
    assert_eq!(host.camera_color().color(3, 3), vec4(0.1, 0.2, 0.3, 1.0));
  }

  #[test]
  fn draw_renderers_calls_scene_renderer() {
    let mut host = CpuRenderHost::new(camera_desc());
    host.set_scene_renderer(Box::new(
      |tag: &str, targets: &mut [CpuTexture], depth: &mut CpuTexture| {
        assert_eq!(tag, "GBuffer");
        targets[1].set_color(0, 0, Vec4::ONE);
        depth.set_depth_stencil(0, 0, 0.5, 1);
      },
    ));
    let gbuffer = [
      host.get_temporary_rt("_GBuffer0", &camera_desc()),
      host.get_temporary_rt("_GBuffer1", &camera_desc()),
    ];
    let depth = host.renderer_targets().camera_depth_stencil;
    host.draw_renderers("GBuffer", &gbuffer, depth);

    assert_eq!(host.texture(gbuffer[1]).map(|t| t.color(0, 0)), Some(Vec4::ONE));
    assert_eq!(host.texture(depth).map(|t| t.stencil(0, 0)), Some(1));
  }

  #[test]
  #[should_panic(expected = "does not match open sample")]
  fn mismatched_samples_are_fatal() {
    let mut host = CpuRenderHost::new(camera_desc());
    host.begin_sample("a");
    host.end_sample("b");
  }

  #[test]
  #[should_panic(expected = "before its uniforms were set")]
  fn draw_without_uniforms_is_fatal() {
    let mut host = CpuRenderHost::new(camera_desc());
    let material = host.find_material("S_SSSS").expect("builtin");
    let renderer = host.renderer_targets();
    let tex = host.get_temporary_rt("_TempTex", &camera_desc());
    host.draw_fullscreen(
      material,
      &FullscreenDraw {
        pass_index: 0,
        source: renderer.camera_color,
        target: tex,
        depth_stencil: Some(renderer.camera_depth_stencil),
        clear_target: true,
      },
    );
  }
}

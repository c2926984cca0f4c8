use log::{debug, info, trace, warn};

use crate::config::SSSBlurPassCfg;
use crate::sss_kernel::{compute_kernel, SSSKernel};

use super::{
  FilterMode, FullscreenDraw, GlobalTextureSlot, MaterialId, PassExecContext, RenderHost,
  RenderPass, RenderPassEvent, RenderTargetDesc, RendererTargets, SSSBlurUBO, TextureFormat,
  TextureId,
};

/// Scratch targets are full resolution. Kept as a parameter so a slower GPU can trade quality.
const SCRATCH_DOWNSAMPLE: (u32, u32) = (1, 1);

const TEMP_RT_NAME: &str = "_TempTex";
const BLUR_RT_NAME: &str = "_BlurTex";
const SAMPLE_BLUR_HORIZONTAL: &str = "SSSS Blur Horizon";
const SAMPLE_BLUR_VERTICAL: &str = "SSSS Blur Vertical";
const SAMPLE_SPECULAR: &str = "SSSS Specular";

/// Passes of the `S_SSSS` shader, by index.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SSSMaterialPass {
  BlurHorizontal = 0,
  BlurVertical = 1,
  SpecularRecombine = 2,
}

impl SSSMaterialPass {
  pub fn from_index(idx: u32) -> Option<SSSMaterialPass> {
    match idx {
      0 => Some(SSSMaterialPass::BlurHorizontal),
      1 => Some(SSSMaterialPass::BlurVertical),
      2 => Some(SSSMaterialPass::SpecularRecombine),
      _ => None,
    }
  }
}

/// Resources that live from camera setup till camera cleanup.
#[derive(Debug)]
pub struct SSSBlurFrameResources {
  /// 1st blur result, then specular recombination result
  pub temp_rt: TextureId,
  /// 2nd blur result
  pub blur_rt: TextureId,
  pub kernel: SSSKernel,
}

#[derive(Debug)]
pub enum SSSBlurPassState {
  Idle,
  /// Secondary camera, nothing was allocated
  Skipped,
  Ready(SSSBlurFrameResources),
  Executed(SSSBlurFrameResources),
}

/// Separable SSS: horizontal blur -> vertical blur -> specular recombination,
/// result copied back over the camera color.
/// `SSSSBlurPS` from Jimenez, Gutierrez. Blur only touches pixels tagged with `ref_value`
/// in the camera's stencil.
///
/// ### Targets:
/// * camera color - read by 1st blur and specular, written by final copy
/// * camera depth/stencil - read-only stencil mask for 1st blur
/// * `_TempTex` - 1st blur write, 2nd blur read, specular write, final copy read
/// * `_BlurTex` - 2nd blur write, specular read
pub struct SSSBlurPass {
  profiler_tag: String,
  pass_event: RenderPassEvent,
  material: MaterialId,
  renderer: Option<RendererTargets>,
  state: SSSBlurPassState,
}

impl SSSBlurPass {
  pub fn new(host: &mut dyn RenderHost, cfg: &SSSBlurPassCfg) -> Self {
    info!("Creating SSSBlurPass");
    let material = match host.find_material(&cfg.shader_name) {
      Some(m) => m,
      None => panic!(
        "SSSBlurPass could not find shader '{}'",
        cfg.shader_name
      ),
    };

    Self {
      profiler_tag: cfg.profiler_tag.clone(),
      pass_event: cfg.pass_event,
      material,
      renderer: None,
      state: SSSBlurPassState::Idle,
    }
  }

  pub fn state(&self) -> &SSSBlurPassState {
    &self.state
  }

  pub fn material(&self) -> MaterialId {
    self.material
  }

  /// Kernel bound for the current camera, if any
  pub fn kernel(&self) -> Option<&SSSKernel> {
    match &self.state {
      SSSBlurPassState::Ready(res) | SSSBlurPassState::Executed(res) => Some(&res.kernel),
      _ => None,
    }
  }

  pub fn scratch_target_desc(camera_desc: &RenderTargetDesc) -> RenderTargetDesc {
    RenderTargetDesc::derive(
      camera_desc,
      SCRATCH_DOWNSAMPLE.0,
      SCRATCH_DOWNSAMPLE.1,
      TextureFormat::DefaultHDR,
      0,
      true,
      true,
      FilterMode::Point,
    )
  }

  fn allocate_scratch(
    host: &mut dyn RenderHost,
    name: &str,
    slot: GlobalTextureSlot,
    desc: &RenderTargetDesc,
  ) -> TextureId {
    let texture = host.get_temporary_rt(name, desc);
    host.set_global_texture(slot, texture);
    debug!(
      "SSSBlurPass allocated {} {:?} ({}x{})",
      name, texture, desc.width, desc.height
    );
    texture
  }

  fn bind_lookup_texture(host: &mut dyn RenderHost, slot: GlobalTextureSlot, path: &str) {
    match host.load_texture(path) {
      Some(texture) => host.set_global_texture(slot, texture),
      None => warn!(
        "SSSBlurPass lookup texture '{}' not found, {:?} left unbound",
        path, slot
      ),
    }
  }

  fn renderer_targets(&self) -> RendererTargets {
    match self.renderer {
      Some(r) => r,
      None => panic!("SSSBlurPass executed before setup() provided the renderer"),
    }
  }

  fn execute_blur_horizontal(
    &self,
    host: &mut dyn RenderHost,
    renderer: &RendererTargets,
    res: &SSSBlurFrameResources,
  ) {
    host.begin_sample(SAMPLE_BLUR_HORIZONTAL);
    let draw = FullscreenDraw {
      pass_index: SSSMaterialPass::BlurHorizontal as _,
      source: renderer.camera_color,                    // read
      target: res.temp_rt,                              // write
      depth_stencil: Some(renderer.camera_depth_stencil), // stencil mask
      clear_target: true,
    };
    host.set_global_texture(GlobalTextureSlot::MainTex, draw.source);
    host.draw_fullscreen(self.material, &draw);
    host.set_global_texture(GlobalTextureSlot::MainTex, res.temp_rt);
    host.end_sample(SAMPLE_BLUR_HORIZONTAL);
  }

  fn execute_blur_vertical(&self, host: &mut dyn RenderHost, res: &SSSBlurFrameResources) {
    host.begin_sample(SAMPLE_BLUR_VERTICAL);
    let draw = FullscreenDraw {
      pass_index: SSSMaterialPass::BlurVertical as _,
      source: res.temp_rt,
      target: res.blur_rt,
      depth_stencil: None,
      clear_target: false,
    };
    host.draw_fullscreen(self.material, &draw);
    host.set_global_texture(GlobalTextureSlot::MainTex, res.blur_rt);
    host.end_sample(SAMPLE_BLUR_VERTICAL);
  }

  fn execute_specular(
    &self,
    host: &mut dyn RenderHost,
    renderer: &RendererTargets,
    res: &SSSBlurFrameResources,
  ) {
    host.begin_sample(SAMPLE_SPECULAR);
    let draw = FullscreenDraw {
      pass_index: SSSMaterialPass::SpecularRecombine as _,
      source: res.blur_rt,
      target: res.temp_rt,
      depth_stencil: None,
      clear_target: false,
    };
    host.draw_fullscreen(self.material, &draw);
    host.set_global_texture(GlobalTextureSlot::MainTex, renderer.camera_color);
    host.end_sample(SAMPLE_SPECULAR);
  }
}

impl RenderPass for SSSBlurPass {
  fn name(&self) -> &str {
    &self.profiler_tag
  }

  fn pass_event(&self) -> RenderPassEvent {
    self.pass_event
  }

  fn setup(&mut self, renderer: RendererTargets) {
    self.renderer = Some(renderer);
  }

  fn on_camera_setup(&mut self, host: &mut dyn RenderHost, exec_ctx: &PassExecContext) {
    assert!(
      matches!(self.state, SSSBlurPassState::Idle),
      "SSSBlurPass::on_camera_setup called twice without cleanup, state: {:?}",
      self.state
    );

    if exec_ctx.is_scene_view_camera() {
      trace!("SSSBlurPass skipped for scene view camera");
      self.state = SSSBlurPassState::Skipped;
      return;
    }

    let scratch_desc = Self::scratch_target_desc(&exec_ctx.camera_target_desc);
    let temp_rt = Self::allocate_scratch(host, TEMP_RT_NAME, GlobalTextureSlot::TempTex, &scratch_desc);
    let blur_rt = Self::allocate_scratch(host, BLUR_RT_NAME, GlobalTextureSlot::BlurTex, &scratch_desc);

    let cfg = exec_ctx.config.sss_blur.sanitized();
    let kernel = compute_kernel(
      cfg.kernel_samples,
      cfg.subsurface_color_rgb(),
      cfg.subsurface_falloff,
    );
    let uniforms = SSSBlurUBO::new(&cfg, &kernel, exec_ctx.camera);
    host.set_material_uniforms(self.material, &uniforms);

    Self::bind_lookup_texture(host, GlobalTextureSlot::SpecularIBL, &cfg.specular_ibl_tex);
    Self::bind_lookup_texture(host, GlobalTextureSlot::SpecularLUT, &cfg.specular_lut_tex);

    self.state = SSSBlurPassState::Ready(SSSBlurFrameResources {
      temp_rt,
      blur_rt,
      kernel,
    });
  }

  fn execute(&mut self, host: &mut dyn RenderHost, _exec_ctx: &PassExecContext) {
    let renderer = self.renderer_targets();

    let res = match std::mem::replace(&mut self.state, SSSBlurPassState::Idle) {
      SSSBlurPassState::Ready(res) => res,
      SSSBlurPassState::Skipped => {
        self.state = SSSBlurPassState::Skipped;
        return;
      }
      state => panic!(
        "SSSBlurPass::execute requires on_camera_setup first, state: {:?}",
        state
      ),
    };

    host.begin_sample(&self.profiler_tag);
    host.set_global_texture(GlobalTextureSlot::CameraColor, renderer.camera_color);
    self.execute_blur_horizontal(host, &renderer, &res);
    self.execute_blur_vertical(host, &res);
    self.execute_specular(host, &renderer, &res);
    host.blit(res.temp_rt, renderer.camera_color);
    host.end_sample(&self.profiler_tag);

    self.state = SSSBlurPassState::Executed(res);
  }

  fn on_camera_cleanup(&mut self, host: &mut dyn RenderHost) {
    match std::mem::replace(&mut self.state, SSSBlurPassState::Idle) {
      SSSBlurPassState::Ready(res) | SSSBlurPassState::Executed(res) => {
        host.release_temporary_rt(res.temp_rt);
        host.release_temporary_rt(res.blur_rt);
      }
      SSSBlurPassState::Idle | SSSBlurPassState::Skipped => (),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::Config;
  use crate::cpu_host::{CpuRenderHost, HostCommand};
  use crate::scene::Camera;

  fn small_config() -> Config {
    let mut config = Config::new();
    config.window_width = 16;
    config.window_height = 8;
    config
  }

  fn create_pass(host: &mut CpuRenderHost, config: &Config) -> SSSBlurPass {
    let mut pass = SSSBlurPass::new(host, &config.sss_blur);
    pass.setup(host.renderer_targets());
    pass
  }

  #[test]
  fn executes_passes_in_order_with_buffer_routing() {
    let config = small_config();
    let camera = Camera::new(&config.camera, config.aspect_ratio());
    let mut host = CpuRenderHost::new(config.camera_target_desc());
    let renderer = host.renderer_targets();
    let mut pass = create_pass(&mut host, &config);
    let ctx = PassExecContext::new(&config, &camera);

    pass.on_camera_setup(&mut host, &ctx);
    let (temp_rt, blur_rt) = match pass.state() {
      SSSBlurPassState::Ready(res) => (res.temp_rt, res.blur_rt),
      s => panic!("unexpected state {:?}", s),
    };
    host.clear_command_log();
    pass.execute(&mut host, &ctx);

    let draws: Vec<FullscreenDraw> = host
      .command_log()
      .iter()
      .filter_map(|c| match c {
        HostCommand::DrawFullscreen { draw, .. } => Some(*draw),
        _ => None,
      })
      .collect();
    assert_eq!(draws.len(), 3);

    assert_eq!(draws[0].pass_index, SSSMaterialPass::BlurHorizontal as u32);
    assert_eq!(draws[0].source, renderer.camera_color);
    assert_eq!(draws[0].target, temp_rt);
    assert_eq!(draws[0].depth_stencil, Some(renderer.camera_depth_stencil));
    assert!(draws[0].clear_target);

    assert_eq!(draws[1].pass_index, SSSMaterialPass::BlurVertical as u32);
    assert_eq!((draws[1].source, draws[1].target), (temp_rt, blur_rt));
    assert_eq!(draws[1].depth_stencil, None);

    assert_eq!(draws[2].pass_index, SSSMaterialPass::SpecularRecombine as u32);
    assert_eq!((draws[2].source, draws[2].target), (blur_rt, temp_rt));

    let last_blit = host.command_log().iter().rev().find_map(|c| match c {
      HostCommand::Blit { source, target } => Some((*source, *target)),
      _ => None,
    });
    assert_eq!(last_blit, Some((temp_rt, renderer.camera_color)));
  }

  #[test]
  fn scratch_targets_are_single_sampled_camera_sized() {
    let mut config = small_config();
    config.camera_msaa_samples = 4;
    let camera = Camera::new(&config.camera, config.aspect_ratio());
    let mut host = CpuRenderHost::new(config.camera_target_desc());
    let mut pass = create_pass(&mut host, &config);
    let ctx = PassExecContext::new(&config, &camera);

    pass.on_camera_setup(&mut host, &ctx);
    let descs: Vec<RenderTargetDesc> = host
      .command_log()
      .iter()
      .filter_map(|c| match c {
        HostCommand::GetTemporaryRT { desc, .. } => Some(*desc),
        _ => None,
      })
      .collect();
    assert_eq!(descs.len(), 2);
    descs.iter().for_each(|d| {
      assert_eq!((d.width, d.height), (16, 8));
      assert_eq!(d.msaa_samples, 1);
      assert_eq!(d.depth_buffer_bits, 0);
      assert_eq!(d.format, TextureFormat::DefaultHDR);
    });
  }

  #[test]
  fn cleanup_releases_scratch_targets() {
    let config = small_config();
    let camera = Camera::new(&config.camera, config.aspect_ratio());
    let mut host = CpuRenderHost::new(config.camera_target_desc());
    let mut pass = create_pass(&mut host, &config);
    let ctx = PassExecContext::new(&config, &camera);
    let textures_before = host.live_texture_count();

    pass.on_camera_setup(&mut host, &ctx);
    assert_eq!(host.live_texture_count(), textures_before + 2);
    pass.execute(&mut host, &ctx);
    pass.on_camera_cleanup(&mut host);

    assert_eq!(host.live_texture_count(), textures_before);
    assert!(matches!(pass.state(), SSSBlurPassState::Idle));
    assert!(pass.kernel().is_none());
  }

  #[test]
  fn scene_view_camera_does_no_work() {
    let config = small_config();
    let camera = Camera::scene_view(&config.camera, config.aspect_ratio());
    let mut host = CpuRenderHost::new(config.camera_target_desc());
    let mut pass = create_pass(&mut host, &config);
    let ctx = PassExecContext::new(&config, &camera);
    host.clear_command_log();

    pass.on_camera_setup(&mut host, &ctx);
    pass.execute(&mut host, &ctx);
    pass.on_camera_cleanup(&mut host);

    assert!(host.command_log().is_empty());
    assert!(matches!(pass.state(), SSSBlurPassState::Idle));
  }

  #[test]
  fn kernel_is_rebuilt_on_every_setup() {
    let mut config = small_config();
    let camera = Camera::new(&config.camera, config.aspect_ratio());
    let mut host = CpuRenderHost::new(config.camera_target_desc());
    let mut pass = create_pass(&mut host, &config);

    {
      let ctx = PassExecContext::new(&config, &camera);
      pass.on_camera_setup(&mut host, &ctx);
      assert_eq!(pass.kernel().map(|k| k.len()), Some(25));
      pass.on_camera_cleanup(&mut host);
    }

    config.sss_blur.kernel_samples = 11;
    let ctx = PassExecContext::new(&config, &camera);
    pass.on_camera_setup(&mut host, &ctx);
    assert_eq!(pass.kernel().map(|k| k.len()), Some(11));
    assert_eq!(host.material_uniforms(pass.material()).map(|u| u.kernel_size()), Some(11));
  }

  #[test]
  #[should_panic(expected = "could not find shader")]
  fn missing_shader_is_fatal() {
    let config = small_config();
    let mut host = CpuRenderHost::new(config.camera_target_desc());
    let cfg = SSSBlurPassCfg {
      shader_name: String::from("NotAShader"),
      ..SSSBlurPassCfg::default()
    };
    SSSBlurPass::new(&mut host, &cfg);
  }

  #[test]
  #[should_panic(expected = "before setup()")]
  fn execute_without_renderer_is_fatal() {
    let config = small_config();
    let camera = Camera::new(&config.camera, config.aspect_ratio());
    let mut host = CpuRenderHost::new(config.camera_target_desc());
    let mut pass = SSSBlurPass::new(&mut host, &config.sss_blur);
    let ctx = PassExecContext::new(&config, &camera);
    pass.on_camera_setup(&mut host, &ctx);
    pass.execute(&mut host, &ctx);
  }

  #[test]
  #[should_panic(expected = "requires on_camera_setup")]
  fn execute_without_camera_setup_is_fatal() {
    let config = small_config();
    let camera = Camera::new(&config.camera, config.aspect_ratio());
    let mut host = CpuRenderHost::new(config.camera_target_desc());
    let mut pass = create_pass(&mut host, &config);
    let ctx = PassExecContext::new(&config, &camera);
    pass.execute(&mut host, &ctx);
  }
}

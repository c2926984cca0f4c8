use log::info;

use crate::config::GBufferPassCfg;

use super::{
  FilterMode, GlobalTextureSlot, PassExecContext, RenderHost, RenderPass,
  RenderPassEvent, RenderTargetDesc, RendererTargets, TextureFormat, TextureId,
};

const GBUFFER_COUNT: usize = 4;
const GBUFFER_NAMES: [&str; GBUFFER_COUNT] = ["_GBuffer0", "_GBuffer1", "_GBuffer2", "_GBuffer3"];

/// Allocates the geometry buffer (4x full float RGBA) and draws `GBuffer`-tagged
/// renderers into it, depth-tested against the camera depth/stencil.
/// What goes into each target is decided by the host's shading model.
pub struct GBufferPass {
  profiler_tag: String,
  pass_event: RenderPassEvent,
  shader_tag: String,
  renderer: Option<RendererTargets>,
  gbuffers: Option<[TextureId; GBUFFER_COUNT]>,
}

impl GBufferPass {
  pub fn new(host: &mut dyn RenderHost, cfg: &GBufferPassCfg) -> Self {
    info!("Creating GBufferPass");
    // renderers bring their own shaders, this only checks the shading model is present
    if host.find_material(&cfg.shader_name).is_none() {
      panic!("GBufferPass could not find shader '{}'", cfg.shader_name);
    }

    Self {
      profiler_tag: cfg.profiler_tag.clone(),
      pass_event: cfg.pass_event,
      shader_tag: cfg.shader_tag.clone(),
      renderer: None,
      gbuffers: None,
    }
  }

  pub fn gbuffers(&self) -> Option<&[TextureId; GBUFFER_COUNT]> {
    self.gbuffers.as_ref()
  }

  pub fn gbuffer_target_desc(camera_desc: &RenderTargetDesc) -> RenderTargetDesc {
    RenderTargetDesc::derive(
      camera_desc,
      1,
      1,
      TextureFormat::ARGBFloat,
      0,
      true,
      true,
      FilterMode::Point,
    )
  }
}

impl RenderPass for GBufferPass {
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
      self.gbuffers.is_none(),
      "GBufferPass::on_camera_setup called twice without cleanup"
    );
    let desc = Self::gbuffer_target_desc(&exec_ctx.camera_target_desc);

    let mut gbuffers = [TextureId(0); GBUFFER_COUNT];
    for (i, name) in GBUFFER_NAMES.iter().enumerate() {
      let texture = host.get_temporary_rt(name, &desc);
      host.set_global_texture(GlobalTextureSlot::GBUFFERS[i], texture);
      gbuffers[i] = texture;
    }
    self.gbuffers = Some(gbuffers);
  }

  fn execute(&mut self, host: &mut dyn RenderHost, _exec_ctx: &PassExecContext) {
    let renderer = match self.renderer {
      Some(r) => r,
      None => panic!("GBufferPass executed before setup() provided the renderer"),
    };
    let gbuffers = match self.gbuffers {
      Some(g) => g,
      None => panic!("GBufferPass::execute requires on_camera_setup first"),
    };

    host.begin_sample(&self.profiler_tag);
    host.draw_renderers(&self.shader_tag, &gbuffers, renderer.camera_depth_stencil);
    host.end_sample(&self.profiler_tag);
  }

  fn on_camera_cleanup(&mut self, host: &mut dyn RenderHost) {
    if let Some(gbuffers) = self.gbuffers.take() {
      gbuffers
        .iter()
        .for_each(|texture| host.release_temporary_rt(*texture));
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::Config;
  use crate::cpu_host::{CpuRenderHost, HostCommand};
  use crate::scene::Camera;

  #[test]
  fn allocates_four_float_targets_and_draws_into_them() {
    let mut config = Config::new();
    config.window_width = 8;
    config.window_height = 4;
    let camera = Camera::new(&config.camera, config.aspect_ratio());
    let mut host = CpuRenderHost::new(config.camera_target_desc());
    let renderer = host.renderer_targets();
    let mut pass = GBufferPass::new(&mut host, &config.gbuffer);
    pass.setup(renderer);
    let ctx = PassExecContext::new(&config, &camera);
    let textures_before = host.live_texture_count();

    pass.on_camera_setup(&mut host, &ctx);
    let gbuffers = *pass.gbuffers().expect("gbuffers allocated");
    assert_eq!(host.live_texture_count(), textures_before + 4);
    gbuffers.iter().for_each(|t| {
      let desc = host.texture_desc(*t).expect("gbuffer exists");
      assert_eq!(desc.format, TextureFormat::ARGBFloat);
      assert_eq!((desc.width, desc.height), (8, 4));
    });

    pass.execute(&mut host, &ctx);
    let draw = host.command_log().iter().find_map(|c| match c {
      HostCommand::DrawRenderers {
        shader_tag,
        color_targets,
        depth_stencil,
      } => Some((shader_tag.clone(), color_targets.clone(), *depth_stencil)),
      _ => None,
    });
    assert_eq!(
      draw,
      Some((
        String::from("GBuffer"),
        gbuffers.to_vec(),
        renderer.camera_depth_stencil
      ))
    );

    pass.on_camera_cleanup(&mut host);
    assert_eq!(host.live_texture_count(), textures_before);
    assert!(pass.gbuffers().is_none());
  }

  #[test]
  #[should_panic(expected = "could not find shader")]
  fn missing_shader_is_fatal() {
    let config = Config::new();
    let mut host = CpuRenderHost::new(config.camera_target_desc());
    let cfg = GBufferPassCfg {
      shader_name: String::from("S_Unknown"),
      ..GBufferPassCfg::default()
    };
    GBufferPass::new(&mut host, &cfg);
  }
}

use crate::render_graph::RenderPassEvent;

pub struct GBufferPassCfg {
  pub profiler_tag: String,
  pub pass_event: RenderPassEvent,
  pub shader_name: String,
  /// Only renderers with this shader tag are drawn into the geometry buffer
  pub shader_tag: String,
}

impl Default for GBufferPassCfg {
  fn default() -> Self {
    Self {
      profiler_tag: String::from("GBuffer"),
      pass_event: RenderPassEvent::AfterRenderingTransparents,
      shader_name: String::from("S_PBR"),
      shader_tag: String::from("GBuffer"),
    }
  }
}

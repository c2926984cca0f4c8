use log::{info, trace};

use crate::config::Config;

mod _shared;
mod gbuffer_pass;
mod sss_blur_pass;

pub use self::_shared::*;
pub use self::gbuffer_pass::GBufferPass;
pub use self::sss_blur_pass::{
  SSSBlurFrameResources, SSSBlurPass, SSSBlurPassState, SSSMaterialPass,
};

/// Where in the host pipeline a pass is inserted.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RenderPassEvent {
  BeforeRendering = 0,
  AfterRenderingOpaques = 300,
  AfterRenderingSkybox = 400,
  AfterRenderingTransparents = 500,
  AfterRendering = 1000,
}

/// Lifecycle hooks, called by `RenderGraph` in strict per-camera order:
/// `on_camera_setup` -> `execute` -> `on_camera_cleanup`.
pub trait RenderPass {
  /// Profiler label
  fn name(&self) -> &str;

  fn pass_event(&self) -> RenderPassEvent;

  /// Bind to the renderer whose camera targets the pass reads and writes.
  fn setup(&mut self, renderer: RendererTargets);

  /// Allocate per-camera resources and bind material data.
  fn on_camera_setup(&mut self, host: &mut dyn RenderHost, exec_ctx: &PassExecContext);

  fn execute(&mut self, host: &mut dyn RenderHost, exec_ctx: &PassExecContext);

  /// Release everything `on_camera_setup` allocated.
  fn on_camera_cleanup(&mut self, host: &mut dyn RenderHost);
}

/// Ordered list of passes and the per-frame driver that runs them.
pub struct RenderGraph {
  passes: Vec<Box<dyn RenderPass>>,
}

impl RenderGraph {
  pub fn new() -> Self {
    Self { passes: Vec::new() }
  }

  /// Graph with the geometry buffer pass followed by the SSS blur.
  pub fn with_default_passes(host: &mut dyn RenderHost, config: &Config) -> Self {
    let mut render_graph = RenderGraph::new();
    render_graph.add_pass(Box::new(GBufferPass::new(host, &config.gbuffer)));
    render_graph.add_pass(Box::new(SSSBlurPass::new(host, &config.sss_blur)));
    render_graph
  }

  /// Insert pass by its `RenderPassEvent`. Passes with the same event keep insertion order.
  pub fn add_pass(&mut self, pass: Box<dyn RenderPass>) {
    info!(
      "RenderGraph: add pass '{}' at {:?}",
      pass.name(),
      pass.pass_event()
    );
    let event = pass.pass_event();
    let idx = self
      .passes
      .iter()
      .position(|p| p.pass_event() > event)
      .unwrap_or(self.passes.len());
    self.passes.insert(idx, pass);
  }

  pub fn pass_names(&self) -> Vec<&str> {
    self.passes.iter().map(|p| p.name()).collect()
  }

  pub fn setup(&mut self, renderer: RendererTargets) {
    self
      .passes
      .iter_mut()
      .for_each(|pass| pass.setup(renderer));
  }

  /// Run every pass for a single camera.
  pub fn render_camera(&mut self, host: &mut dyn RenderHost, exec_ctx: &PassExecContext) {
    for pass in self.passes.iter_mut() {
      RenderGraph::debug_start_pass(pass.as_ref());
      pass.on_camera_setup(host, exec_ctx);
      pass.execute(host, exec_ctx);
      pass.on_camera_cleanup(host);
    }
  }

  fn debug_start_pass(pass: &dyn RenderPass) {
    trace!("Start {}", pass.name());
  }
}

impl Default for RenderGraph {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::cell::RefCell;
  use std::rc::Rc;

  use crate::cpu_host::CpuRenderHost;
  use crate::scene::Camera;

  /// Appends `<name>:<hook>` to a shared log on every hook
  struct TracingPass {
    name: String,
    event: RenderPassEvent,
    log: Rc<RefCell<Vec<String>>>,
  }

  impl TracingPass {
    fn boxed(name: &str, event: RenderPassEvent, log: &Rc<RefCell<Vec<String>>>) -> Box<Self> {
      Box::new(Self {
        name: name.to_string(),
        event,
        log: log.clone(),
      })
    }

    fn push(&self, hook: &str) {
      self.log.borrow_mut().push(format!("{}:{}", self.name, hook));
    }
  }

  impl RenderPass for TracingPass {
    fn name(&self) -> &str {
      &self.name
    }
    fn pass_event(&self) -> RenderPassEvent {
      self.event
    }
    fn setup(&mut self, _renderer: RendererTargets) {
      self.push("setup");
    }
    fn on_camera_setup(&mut self, _host: &mut dyn RenderHost, _exec_ctx: &PassExecContext) {
      self.push("camera_setup");
    }
    fn execute(&mut self, _host: &mut dyn RenderHost, _exec_ctx: &PassExecContext) {
      self.push("execute");
    }
    fn on_camera_cleanup(&mut self, _host: &mut dyn RenderHost) {
      self.push("cleanup");
    }
  }

  #[test]
  fn passes_are_ordered_by_event_then_insertion() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut graph = RenderGraph::new();
    graph.add_pass(TracingPass::boxed("late", RenderPassEvent::AfterRendering, &log));
    graph.add_pass(TracingPass::boxed("t0", RenderPassEvent::AfterRenderingTransparents, &log));
    graph.add_pass(TracingPass::boxed("opaque", RenderPassEvent::AfterRenderingOpaques, &log));
    graph.add_pass(TracingPass::boxed("t1", RenderPassEvent::AfterRenderingTransparents, &log));

    assert_eq!(graph.pass_names(), vec!["opaque", "t0", "t1", "late"]);
  }

  #[test]
  fn each_pass_runs_its_full_lifecycle_in_order() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let config = Config::new();
    let camera = Camera::new(&config.camera, config.aspect_ratio());
    let mut host = CpuRenderHost::new(config.camera_target_desc());
    let mut graph = RenderGraph::new();
    graph.add_pass(TracingPass::boxed("a", RenderPassEvent::AfterRenderingOpaques, &log));
    graph.add_pass(TracingPass::boxed("b", RenderPassEvent::AfterRendering, &log));

    graph.setup(host.renderer_targets());
    let ctx = PassExecContext::new(&config, &camera);
    graph.render_camera(&mut host, &ctx);

    let expected = vec![
      "a:setup",
      "b:setup",
      "a:camera_setup",
      "a:execute",
      "a:cleanup",
      "b:camera_setup",
      "b:execute",
      "b:cleanup",
    ];
    assert_eq!(*log.borrow(), expected);
  }

  #[test]
  fn default_graph_runs_gbuffer_before_sss() {
    let config = Config::new();
    let mut host = CpuRenderHost::new(config.camera_target_desc());
    let graph = RenderGraph::with_default_passes(&mut host, &config);
    assert_eq!(
      graph.pass_names(),
      vec!["GBuffer", "Separable Subsurface Scatter"]
    );
  }
}

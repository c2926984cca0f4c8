use crate::config::Config;
use crate::scene::Camera;

use super::RenderTargetDesc;

/// Per camera, per frame data that every pass might want.
/// Created so we do not have to provide it all one-by-one.
pub struct PassExecContext<'a> {
  pub config: &'a Config,
  pub camera: &'a Camera,
  /// Descriptor of the camera color target
  pub camera_target_desc: RenderTargetDesc,
}

impl<'a> PassExecContext<'a> {
  pub fn new(config: &'a Config, camera: &'a Camera) -> Self {
    Self {
      config,
      camera,
      camera_target_desc: config.camera_target_desc(),
    }
  }

  /// Editor / scene-view cameras do not get post-processing
  pub fn is_scene_view_camera(&self) -> bool {
    self.camera.is_scene_view
  }
}

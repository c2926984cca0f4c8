use glam::{vec3, Vec3};

pub struct CameraConfig {
  pub position: Vec3,
  pub target: Vec3,
  /// Vertical field of view
  pub fov_dgr: f32,
  pub z_near: f32,
  pub z_far: f32,
}

impl Default for CameraConfig {
  fn default() -> Self {
    Self {
      position: vec3(0.0, 0.0, 2.0), // en face
      target: Vec3::ZERO,
      fov_dgr: 60.0,
      z_near: 0.1,
      z_far: 100.0,
    }
  }
}

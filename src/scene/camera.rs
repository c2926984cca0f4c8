use glam::{Mat4, Vec3};

use crate::config::CameraConfig;

const VULKAN_UP: Vec3 = Vec3::Y;

/// Current-frame camera data. No history is kept, there is no motion data.
#[derive(Clone, Debug)]
pub struct Camera {
  view_matrix: Mat4,
  perspective_matrix: Mat4,
  fov_dgr: f32,
  /// Secondary viewpoint (editor / scene view). Post-process passes skip these
  pub is_scene_view: bool,
}

impl Camera {
  pub fn new(cfg: &CameraConfig, aspect_ratio: f32) -> Camera {
    Camera {
      fov_dgr: cfg.fov_dgr,
      view_matrix: Mat4::look_at_rh(cfg.position, cfg.target, VULKAN_UP),
      // https://matthewwellings.com/blog/the-new-vulkan-coordinate-system/
      // glam's `perspective_rh` already maps depth into [0, 1]
      perspective_matrix: Mat4::perspective_rh(
        cfg.fov_dgr.to_radians(),
        aspect_ratio,
        cfg.z_near,
        cfg.z_far,
      ),
      is_scene_view: false,
    }
  }

  pub fn scene_view(cfg: &CameraConfig, aspect_ratio: f32) -> Camera {
    Camera {
      is_scene_view: true,
      ..Camera::new(cfg, aspect_ratio)
    }
  }

  pub fn view_matrix(&self) -> &Mat4 {
    &self.view_matrix
  }

  pub fn perspective_matrix(&self) -> &Mat4 {
    &self.perspective_matrix
  }

  pub fn view_projection_matrix(&self) -> Mat4 {
    self.perspective_matrix * self.view_matrix
  }

  /// Depth buffer value of a world-space point, `[0, 1]` between near and far planes.
  pub fn device_depth(&self, world_pos: Vec3) -> f32 {
    let clip = self.view_projection_matrix() * world_pos.extend(1.0);
    clip.z / clip.w
  }

  /// Converts world-space blur width into screen-space.
  /// `1 / (0.5 * tan(fov))`, full field of view in radians.
  pub fn distance_to_projection_window(&self) -> f32 {
    1.0 / (0.5 * self.fov_dgr.to_radians().tan())
  }
}

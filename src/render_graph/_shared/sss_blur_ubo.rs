use glam::{vec4, Mat4, Vec4};

use crate::config::SSSBlurPassCfg;
use crate::scene::Camera;
use crate::sss_kernel::{SSSKernel, MAX_KERNEL_SAMPLES};

/// Material data of the SSS blur, rebuilt every camera setup.
/// Only `Vec4`/`Mat4` members, so `#[repr(C)]` matches std140.
#[derive(Copy, Clone, Debug)] // , bytemuck::Zeroable, bytemuck::Pod
#[repr(C)]
pub struct SSSBlurUBO {
  /// `.rgb` - weight, `.a` - offset [mm]. Element 0 is the center tap.
  pub u_kernel: [Vec4; MAX_KERNEL_SAMPLES],
  /// `[scale, distanceToProjectionWindow, strength, kernelSampleCount]`
  pub u_sss_params: Vec4,
  /// `[stencilRef, followSurface, 0, 0]`
  pub u_stencil_and_flags: Vec4,
  pub u_matrix_v: Mat4,
  pub u_matrix_i_v: Mat4,
  pub u_matrix_p: Mat4,
  pub u_matrix_i_p: Mat4,
  pub u_matrix_vp: Mat4,
  pub u_matrix_i_vp: Mat4,
}

unsafe impl bytemuck::Zeroable for SSSBlurUBO {}
unsafe impl bytemuck::Pod for SSSBlurUBO {}

impl SSSBlurUBO {
  pub fn new(cfg: &SSSBlurPassCfg, kernel: &SSSKernel, camera: &Camera) -> SSSBlurUBO {
    let view = *camera.view_matrix();
    let projection = *camera.perspective_matrix();
    let view_projection = camera.view_projection_matrix();

    SSSBlurUBO {
      u_kernel: kernel.to_uniform_array(),
      u_sss_params: vec4(
        cfg.subsurface_scaler,
        camera.distance_to_projection_window(),
        cfg.subsurface_strength(),
        kernel.len() as f32,
      ),
      u_stencil_and_flags: vec4(
        cfg.ref_value as f32,
        if cfg.follow_surface { 1.0 } else { 0.0 },
        0.0,
        0.0,
      ),
      u_matrix_v: view,
      u_matrix_i_v: view.inverse(),
      u_matrix_p: projection,
      u_matrix_i_p: projection.inverse(),
      u_matrix_vp: view_projection,
      u_matrix_i_vp: view_projection.inverse(),
    }
  }

  pub fn scale(&self) -> f32 {
    self.u_sss_params.x
  }

  pub fn distance_to_projection_window(&self) -> f32 {
    self.u_sss_params.y
  }

  pub fn strength(&self) -> f32 {
    self.u_sss_params.z
  }

  pub fn kernel_size(&self) -> usize {
    self.u_sss_params.w as usize
  }

  pub fn stencil_ref(&self) -> u8 {
    self.u_stencil_and_flags.x as u8
  }

  pub fn follow_surface(&self) -> bool {
    self.u_stencil_and_flags.y > 0.5
  }

  /// Taps actually used by the shader, center first
  pub fn kernel(&self) -> &[Vec4] {
    &self.u_kernel[..self.kernel_size()]
  }
}

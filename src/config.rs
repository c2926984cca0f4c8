use glam::Vec3;

use crate::render_graph::{FilterMode, RenderTargetDesc, TextureFormat};
use crate::utils::color_hex_to_vec;

pub use self::{camera::*, gbuffer::*, sss::*};

pub mod camera;
pub mod gbuffer;
pub mod sss;

pub struct Config {
  pub window_width: u32,
  pub window_height: u32,
  /// MSAA sample count of the camera target. SSS scratch targets are always single sampled
  pub camera_msaa_samples: u32,
  pub clear_color: Vec3,
  pub camera: CameraConfig,
  pub gbuffer: GBufferPassCfg,
  pub sss_blur: SSSBlurPassCfg,
}

impl Config {
  /// Stencil value written for skin during geometry rendering
  pub const STENCIL_BIT_SKIN: u8 = 1 << 0;

  pub fn new() -> Config {
    let clear_col: u8 = 93;

    Config {
      window_width: 800,
      window_height: 600,
      camera_msaa_samples: 1,
      clear_color: color_hex_to_vec(clear_col, clear_col, clear_col),
      camera: CameraConfig::default(),
      gbuffer: GBufferPassCfg::default(),
      sss_blur: SSSBlurPassCfg {
        ref_value: Self::STENCIL_BIT_SKIN,
        ..SSSBlurPassCfg::default()
      },
    }
  }

  pub fn aspect_ratio(&self) -> f32 {
    self.window_width as f32 / self.window_height as f32
  }

  /// Descriptor of the main camera color target
  pub fn camera_target_desc(&self) -> RenderTargetDesc {
    RenderTargetDesc {
      width: self.window_width,
      height: self.window_height,
      format: TextureFormat::DefaultHDR,
      msaa_samples: self.camera_msaa_samples,
      depth_buffer_bits: 24,
      use_mipmap: false,
      auto_generate_mips: false,
      filter: FilterMode::Bilinear,
    }
  }
}

impl Default for Config {
  fn default() -> Self {
    Self::new()
  }
}

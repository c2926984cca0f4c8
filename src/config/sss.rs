use glam::{vec3, vec4, Vec3, Vec4};
use log::warn;

use crate::render_graph::RenderPassEvent;
use crate::utils::{saturate_vec3, vec3_to_pretty_str};

/// Artist-facing settings of the separable subsurface scattering blur.
///
/// Kernel is rebuilt from `subsurface_color` and `subsurface_falloff`
/// every time a camera is set up, so changes here apply on the next frame.
#[derive(Clone, Debug)]
pub struct SSSBlurPassCfg {
  /// Label for profiler scopes and debug markers
  pub profiler_tag: String,
  pub pass_event: RenderPassEvent,
  /// Blur width in world space. Range: [0, 3]
  pub subsurface_scaler: f32,
  /// `.rgb` - how much the blurred result replaces the unblurred one, per channel.
  /// `.a` - strength of the effect (scales sample footprint).
  pub subsurface_color: Vec4,
  /// How fast light dies off with distance, per channel. Lower values - faster falloff.
  pub subsurface_falloff: Vec3,
  /// Pixels with this stencil value receive the blur. Range: [0, 255]
  pub ref_value: u8,
  /// Kernel size. Range: (0, 64)
  pub kernel_samples: usize,
  /// Reject samples that lie on a different surface (big depth difference)
  pub follow_surface: bool,
  pub shader_name: String,
  pub specular_ibl_tex: String,
  pub specular_lut_tex: String,
}

impl Default for SSSBlurPassCfg {
  fn default() -> Self {
    Self {
      profiler_tag: String::from("Separable Subsurface Scatter"),
      pass_event: RenderPassEvent::AfterRenderingTransparents,
      subsurface_scaler: 0.25,
      subsurface_color: vec4(0.48, 0.41, 0.28, 1.0),
      subsurface_falloff: vec3(1.0, 0.37, 0.3),
      ref_value: 1,
      kernel_samples: Self::DEFAULT_KERNEL_SAMPLES,
      follow_surface: true,
      shader_name: String::from("S_SSSS"),
      specular_ibl_tex: String::from("Tex/GI/Prefilter_Full02"),
      specular_lut_tex: String::from("Tex/GI/LUT"),
    }
  }
}

impl SSSBlurPassCfg {
  pub const SSS_SCALE_MIN: f32 = 0.0;
  pub const SSS_SCALE_MAX: f32 = 3.0;
  pub const DEFAULT_KERNEL_SAMPLES: usize = 25;

  pub fn subsurface_color_rgb(&self) -> Vec3 {
    self.subsurface_color.truncate()
  }

  pub fn subsurface_strength(&self) -> f32 {
    self.subsurface_color.w
  }

  /// Copy with every artist parameter forced into its allowed range.
  /// Kernel sample count is left as-is, kernel synthesis asserts on it.
  pub fn sanitized(&self) -> Self {
    let mut cfg = self.clone();

    let scale = self
      .subsurface_scaler
      .clamp(Self::SSS_SCALE_MIN, Self::SSS_SCALE_MAX);
    if scale != self.subsurface_scaler {
      warn!(
        "SSS scale {} outside [{}, {}], clamped to {}",
        self.subsurface_scaler,
        Self::SSS_SCALE_MIN,
        Self::SSS_SCALE_MAX,
        scale
      );
    }
    cfg.subsurface_scaler = scale;

    let color = saturate_vec3(self.subsurface_color_rgb());
    if color != self.subsurface_color_rgb() {
      warn!(
        "SSS color {} outside [0, 1], clamped to {}",
        vec3_to_pretty_str(self.subsurface_color_rgb()),
        vec3_to_pretty_str(color)
      );
    }
    let strength = self.subsurface_strength().clamp(0.0, 1.0);
    cfg.subsurface_color = color.extend(strength);

    let falloff = self.subsurface_falloff.max(Vec3::ZERO);
    if falloff != self.subsurface_falloff {
      warn!(
        "SSS falloff {} has negative channels, clamped to {}",
        vec3_to_pretty_str(self.subsurface_falloff),
        vec3_to_pretty_str(falloff)
      );
    }
    cfg.subsurface_falloff = falloff;

    cfg
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn sanitized_clamps_artist_ranges() {
    let cfg = SSSBlurPassCfg {
      subsurface_scaler: 5.0,
      subsurface_color: vec4(1.5, -0.2, 0.5, 2.0),
      subsurface_falloff: vec3(-1.0, 0.5, 1.0),
      ..SSSBlurPassCfg::default()
    };
    let s = cfg.sanitized();

    assert_eq!(s.subsurface_scaler, SSSBlurPassCfg::SSS_SCALE_MAX);
    assert_eq!(s.subsurface_color, vec4(1.0, 0.0, 0.5, 1.0));
    assert_eq!(s.subsurface_falloff, vec3(0.0, 0.5, 1.0));
  }

  #[test]
  fn sanitized_keeps_valid_values() {
    let cfg = SSSBlurPassCfg::default();
    let s = cfg.sanitized();
    assert_eq!(s.subsurface_scaler, cfg.subsurface_scaler);
    assert_eq!(s.subsurface_color, cfg.subsurface_color);
    assert_eq!(s.subsurface_falloff, cfg.subsurface_falloff);
    assert_eq!(s.kernel_samples, 25);
  }
}

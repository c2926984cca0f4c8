//! Passes of the `S_SSSS` material, executed per texel.
//! `SSSSBlurPS` from Jimenez, Gutierrez: "Separable Subsurface Scattering".

use glam::{vec2, vec4, Mat4, Vec2, Vec3, Vec4};

use crate::render_graph::SSSBlurUBO;
use crate::utils::saturate;

use super::CpuTexture;

pub const BLUR_DIRECTION_PASS0: Vec2 = vec2(1.0, 0.0);
pub const BLUR_DIRECTION_PASS1: Vec2 = vec2(0.0, 1.0);

/// Depth difference multiplier when rejecting samples from other surfaces
const FOLLOW_SURFACE_SHARPNESS: f32 = 300.0;

/// Which texels belong to the blurred surface. Samples outside are replaced with the center color.
pub enum SampleMask<'a> {
  /// Stencil equals the value
  Stencil(&'a CpuTexture, u8),
  /// Alpha written by the previous blur pass
  Alpha,
}

impl<'a> SampleMask<'a> {
  fn covers(&self, color_tex: &CpuTexture, uv: Vec2) -> bool {
    match self {
      SampleMask::Stencil(stencil_tex, ref_value) => stencil_tex.sample_stencil(uv) == *ref_value,
      SampleMask::Alpha => color_tex.sample_point(uv).w > 0.0,
    }
  }
}

pub struct BlurInputs<'a> {
  pub ubo: &'a SSSBlurUBO,
  pub color: &'a CpuTexture,
  pub depth_stencil: &'a CpuTexture,
  pub mask: SampleMask<'a>,
}

/// View-space distance from device depth
pub fn linear_depth(inv_projection: &Mat4, device_depth: f32) -> f32 {
  let p = *inv_projection * vec4(0.0, 0.0, device_depth, 1.0);
  -p.z / p.w
}

fn blur_texel(inputs: &BlurInputs, uv: Vec2, dir: Vec2) -> Vec3 {
  let ubo = inputs.ubo;
  let color_m = inputs.color.sample_point(uv).truncate();
  let depth_m = linear_depth(&ubo.u_matrix_i_p, inputs.depth_stencil.sample_depth(uv));
  if !(depth_m > 0.0) {
    return color_m;
  }

  let kernel = ubo.kernel();
  let max_offset = kernel.iter().fold(0.0f32, |acc, tap| acc.max(tap.w.abs()));
  if max_offset <= 0.0 {
    return color_m * kernel[0].truncate();
  }

  // outermost tap lands `scale` world units away, projected to the screen
  let dist_to_proj_window = ubo.distance_to_projection_window();
  let final_step =
    dir * (ubo.scale() * ubo.strength() * dist_to_proj_window / depth_m / max_offset);

  let mut blurred = color_m * kernel[0].truncate();
  for tap in kernel.iter().skip(1) {
    let offset_uv = uv + final_step * tap.w;
    let mut color = inputs.color.sample_point(offset_uv).truncate();

    if !inputs.mask.covers(inputs.color, offset_uv) {
      color = color_m;
    } else if ubo.follow_surface() {
      let depth = linear_depth(
        &ubo.u_matrix_i_p,
        inputs.depth_stencil.sample_depth(offset_uv),
      );
      let s = saturate(
        FOLLOW_SURFACE_SHARPNESS * dist_to_proj_window * ubo.scale() * (depth_m - depth).abs(),
      );
      color = color.lerp(color_m, s);
    }

    blurred += tap.truncate() * color;
  }
  blurred
}

/// 1st blur. Only masked texels are written, with alpha 1.
/// `None` means the texel is left untouched.
pub fn blur_horizontal(inputs: &BlurInputs, target_w: u32, target_h: u32) -> Vec<Option<Vec4>> {
  for_each_texel(target_w, target_h, |uv| {
    if inputs.mask.covers(inputs.color, uv) {
      Some(blur_texel(inputs, uv, BLUR_DIRECTION_PASS0).extend(1.0))
    } else {
      None
    }
  })
}

/// 2nd blur. Texels outside the mask pass through.
pub fn blur_vertical(inputs: &BlurInputs, target_w: u32, target_h: u32) -> Vec<Option<Vec4>> {
  for_each_texel(target_w, target_h, |uv| {
    let color_m = inputs.color.sample_point(uv);
    if inputs.mask.covers(inputs.color, uv) {
      Some(blur_texel(inputs, uv, BLUR_DIRECTION_PASS1).extend(color_m.w))
    } else {
      Some(color_m)
    }
  })
}

pub struct SpecularInputs<'a> {
  pub blurred: &'a CpuTexture,
  pub camera_color: &'a CpuTexture,
  pub specular_ibl: Option<&'a CpuTexture>,
  pub specular_lut: Option<&'a CpuTexture>,
}

/// Blend blurred diffuse + specular over the original camera color, weighted by blur alpha.
pub fn specular_recombine(
  inputs: &SpecularInputs,
  target_w: u32,
  target_h: u32,
) -> Vec<Option<Vec4>> {
  for_each_texel(target_w, target_h, |uv| {
    let blurred = inputs.blurred.sample_point(uv);
    let camera = inputs.camera_color.sample_point(uv);
    let specular = match (inputs.specular_ibl, inputs.specular_lut) {
      (Some(ibl), Some(lut)) => {
        let brdf = lut.sample_point(uv);
        ibl.sample_point(uv).truncate() * (brdf.x + brdf.y)
      }
      _ => Vec3::ZERO,
    };

    let a = saturate(blurred.w);
    let rgb = camera.truncate() * (1.0 - a) + (blurred.truncate() + specular) * a;
    Some(rgb.extend(camera.w))
  })
}

fn for_each_texel(
  width: u32,
  height: u32,
  shade: impl Fn(Vec2) -> Option<Vec4>,
) -> Vec<Option<Vec4>> {
  let texel_size = vec2(1.0 / width as f32, 1.0 / height as f32);
  (0..height)
    .flat_map(|y| (0..width).map(move |x| (x, y)))
    .map(|(x, y)| shade((vec2(x as f32, y as f32) + 0.5) * texel_size))
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::{CameraConfig, SSSBlurPassCfg};
  use crate::render_graph::{FilterMode, RenderTargetDesc, TextureFormat};
  use crate::scene::Camera;
  use crate::sss_kernel::compute_kernel;
  use approx::assert_relative_eq;

  fn desc(format: TextureFormat) -> RenderTargetDesc {
    RenderTargetDesc {
      width: 8,
      height: 8,
      format,
      msaa_samples: 1,
      depth_buffer_bits: 0,
      use_mipmap: false,
      auto_generate_mips: false,
      filter: FilterMode::Point,
    }
  }

  fn ubo_for(subsurface_color: Vec3) -> (SSSBlurUBO, Camera) {
    let cfg = SSSBlurPassCfg::default();
    let camera = Camera::new(&CameraConfig::default(), 1.0);
    let kernel = compute_kernel(cfg.kernel_samples, subsurface_color, cfg.subsurface_falloff);
    (SSSBlurUBO::new(&cfg, &kernel, &camera), camera)
  }

  fn device_depth(camera: &Camera, distance: f32) -> f32 {
    let clip = *camera.perspective_matrix() * vec4(0.0, 0.0, -distance, 1.0);
    clip.z / clip.w
  }

  #[test]
  fn linear_depth_inverts_projection() {
    let (ubo, camera) = ubo_for(Vec3::ONE);
    let d = device_depth(&camera, 2.0);
    assert_relative_eq!(linear_depth(&ubo.u_matrix_i_p, d), 2.0, epsilon = 1e-3);
  }

  #[test]
  fn uniform_surface_keeps_its_color() {
    let (ubo, camera) = ubo_for(Vec3::ONE);
    let mut color = CpuTexture::new("c", &desc(TextureFormat::DefaultHDR));
    color.fill_color(vec4(0.8, 0.5, 0.3, 1.0));
    let mut ds = CpuTexture::new("ds", &desc(TextureFormat::Depth24Stencil8));
    ds.clear_depth_stencil(device_depth(&camera, 2.0), 1);

    let inputs = BlurInputs {
      ubo: &ubo,
      color: &color,
      depth_stencil: &ds,
      mask: SampleMask::Stencil(&ds, 1),
    };
    let out = blur_horizontal(&inputs, 8, 8);
    out.iter().for_each(|texel| {
      let c = texel.expect("every texel is masked");
      assert_relative_eq!(c.x, 0.8, epsilon = 1e-4);
      assert_relative_eq!(c.y, 0.5, epsilon = 1e-4);
      assert_relative_eq!(c.z, 0.3, epsilon = 1e-4);
      assert_eq!(c.w, 1.0);
    });
  }

  #[test]
  fn unmasked_texels_are_not_written() {
    let (ubo, _) = ubo_for(Vec3::ONE);
    let color = CpuTexture::new("c", &desc(TextureFormat::DefaultHDR));
    let ds = CpuTexture::new("ds", &desc(TextureFormat::Depth24Stencil8));
    let inputs = BlurInputs {
      ubo: &ubo,
      color: &color,
      depth_stencil: &ds,
      mask: SampleMask::Stencil(&ds, 1),
    };
    assert!(blur_horizontal(&inputs, 8, 8).iter().all(|t| t.is_none()));
  }

  #[test]
  fn specular_keeps_camera_color_outside_blur() {
    let mut camera_color = CpuTexture::new("cam", &desc(TextureFormat::DefaultHDR));
    camera_color.fill_color(vec4(0.2, 0.4, 0.6, 1.0));
    let mut blurred = CpuTexture::new("blur", &desc(TextureFormat::DefaultHDR));
    blurred.set_color(0, 0, vec4(1.0, 1.0, 1.0, 1.0));

    let inputs = SpecularInputs {
      blurred: &blurred,
      camera_color: &camera_color,
      specular_ibl: None,
      specular_lut: None,
    };
    let out = specular_recombine(&inputs, 8, 8);
    assert_eq!(out[0], Some(vec4(1.0, 1.0, 1.0, 1.0)));
    assert_eq!(out[1], Some(vec4(0.2, 0.4, 0.6, 1.0)));
  }

  #[test]
  fn specular_adds_ibl_scaled_by_lut() {
    let camera_color = CpuTexture::new("cam", &desc(TextureFormat::DefaultHDR));
    let mut blurred = CpuTexture::new("blur", &desc(TextureFormat::DefaultHDR));
    blurred.fill_color(vec4(0.1, 0.1, 0.1, 1.0));
    let mut ibl = CpuTexture::new("ibl", &desc(TextureFormat::DefaultHDR));
    ibl.fill_color(vec4(0.5, 0.25, 0.0, 1.0));
    let mut lut = CpuTexture::new("lut", &desc(TextureFormat::DefaultHDR));
    lut.fill_color(vec4(0.5, 0.1, 0.0, 1.0));

    let inputs = SpecularInputs {
      blurred: &blurred,
      camera_color: &camera_color,
      specular_ibl: Some(&ibl),
      specular_lut: Some(&lut),
    };
    let c = specular_recombine(&inputs, 8, 8)[5].expect("written");
    assert_relative_eq!(c.x, 0.1 + 0.5 * 0.6, epsilon = 1e-6);
    assert_relative_eq!(c.y, 0.1 + 0.25 * 0.6, epsilon = 1e-6);
    assert_relative_eq!(c.z, 0.1, epsilon = 1e-6);
  }
}

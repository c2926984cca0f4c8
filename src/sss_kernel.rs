use glam::{vec3, Vec3, Vec4};
use log::{trace, warn};

use crate::utils::{lerp_f32, vec4_to_pretty_str};

/// Upper bound (exclusive) of kernel size. Also the length of the uniform array in the blur shader.
pub const MAX_KERNEL_SAMPLES: usize = 64;

/// Shape of the step function that spreads samples over `[-range, range]`.
const OFFSET_EXPONENT: f32 = 2.0;

/// Guards division by zero for a zero falloff channel.
const FALLOFF_EPSILON: f32 = 0.001;

/// `(variance, weight)` of the gaussians that approximate the skin diffusion profile.
/// The 6th gaussian `(0.0064, 0.233)` is direct reflection, handled by the specular pass.
const PROFILE_GAUSSIANS: [(f32, f32); 5] = [
  (0.0484, 0.1),
  (0.187, 0.118),
  (0.567, 0.113),
  (1.99, 0.358),
  (7.41, 0.078),
];

/// One tap of the separable blur.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct KernelSample {
  /// Fraction of the reflected light, per channel, contributed by this tap
  pub weight: Vec3,
  /// Signed distance along the blur direction [mm], in `[-range^3, range^3]`
  pub offset: f32,
}

impl KernelSample {
  fn at_offset(offset: f32) -> Self {
    Self {
      weight: Vec3::ZERO,
      offset,
    }
  }

  /// Layout expected by the shader: `.rgb` - weight, `.a` - offset
  pub fn as_vec4(&self) -> Vec4 {
    self.weight.extend(self.offset)
  }
}

/// Separable SSS kernel. Element 0 is always the center tap,
/// the blur shader reads it before looping over the rest.
///
/// Jimenez, Gutierrez et al. "Separable Subsurface Scattering", 2015.
#[derive(Clone, Debug, PartialEq)]
pub struct SSSKernel {
  samples: Vec<KernelSample>,
}

impl SSSKernel {
  pub fn samples(&self) -> &[KernelSample] {
    &self.samples
  }

  pub fn len(&self) -> usize {
    self.samples.len()
  }

  pub fn is_empty(&self) -> bool {
    self.samples.is_empty()
  }

  pub fn center(&self) -> &KernelSample {
    &self.samples[0]
  }

  /// Fixed size array for the uniform buffer. Unused tail is zeroed.
  pub fn to_uniform_array(&self) -> [Vec4; MAX_KERNEL_SAMPLES] {
    let mut result = [Vec4::ZERO; MAX_KERNEL_SAMPLES];
    self
      .samples
      .iter()
      .enumerate()
      .for_each(|(i, s)| result[i] = s.as_vec4());
    result
  }

  /// Sum of all weights per channel, center tap included
  pub fn total_weight(&self) -> Vec3 {
    self.samples.iter().map(|s| s.weight).sum()
  }

  /// Sum of weights per channel of every tap except the center one
  pub fn scattered_weight(&self) -> Vec3 {
    self.samples.iter().skip(1).map(|s| s.weight).sum()
  }
}

/// Build the kernel. Deterministic and cheap enough to call every frame.
///
/// ### Params:
/// * `n_total_samples` - kernel size, must be in `(0, 64)`
/// * `subsurface_color` - per channel `[0, 1]`. 0 means no scattering (center tap gets all
///     the weight), 1 means the full diffusion profile
/// * `falloff_color` - per channel profile width
pub fn compute_kernel(
  n_total_samples: usize,
  subsurface_color: Vec3,
  falloff_color: Vec3,
) -> SSSKernel {
  let mut samples = compute_normalized_profile(n_total_samples, falloff_color);

  // center: lerp between 'no blur' and the profile
  let center = &mut samples[0];
  center.weight = vec3(
    lerp_f32(1.0, center.weight.x, subsurface_color.x),
    lerp_f32(1.0, center.weight.y, subsurface_color.y),
    lerp_f32(1.0, center.weight.z, subsurface_color.z),
  );
  // rest: fade out
  samples
    .iter_mut()
    .skip(1)
    .for_each(|s| s.weight *= subsurface_color);

  let kernel = SSSKernel { samples };
  trace_kernel(&kernel);
  kernel
}

/// Kernel before the color blend: center tap at index 0, each channel sums to 1.
pub fn compute_normalized_profile(n_total_samples: usize, falloff_color: Vec3) -> Vec<KernelSample> {
  assert!(
    n_total_samples > 0 && n_total_samples < MAX_KERNEL_SAMPLES,
    "SSS kernel size must be in (0, {}), got {}",
    MAX_KERNEL_SAMPLES,
    n_total_samples
  );

  let mut samples = generate_offsets(n_total_samples);
  assign_profile_weights(&mut samples, falloff_color);
  let mut samples = move_center_to_front(samples);
  normalize_weights(&mut samples);
  samples
}

/// Max influence radius [mm] for a kernel of this size
pub fn kernel_range(n_total_samples: usize) -> f32 {
  if n_total_samples > 20 {
    3.0
  } else {
    2.0
  }
}

/// Taps evenly spaced over `[-range, range]`, then pushed outwards by `range * sign(o) * o^2`.
/// Results are sorted by offset.
fn generate_offsets(n_total_samples: usize) -> Vec<KernelSample> {
  if n_total_samples == 1 {
    return vec![KernelSample::at_offset(0.0)];
  }

  let range = kernel_range(n_total_samples);
  let step = 2.0 * range / (n_total_samples - 1) as f32;

  (0..n_total_samples)
    .map(|i| {
      let o = -range + (i as f32) * step;
      let sign = if o < 0.0 { -1.0 } else { 1.0 };
      KernelSample::at_offset(range * sign * o.powf(OFFSET_EXPONENT).abs())
    })
    .collect()
}

/// Each tap covers half the distance to both of its neighbours.
fn assign_profile_weights(samples: &mut [KernelSample], falloff_color: Vec3) {
  let offsets: Vec<f32> = samples.iter().map(|s| s.offset).collect();
  let last = offsets.len() - 1;

  samples.iter_mut().enumerate().for_each(|(i, sample)| {
    let w0 = if i > 0 {
      (offsets[i] - offsets[i - 1]).abs()
    } else {
      0.0
    };
    let w1 = if i < last {
      (offsets[i] - offsets[i + 1]).abs()
    } else {
      0.0
    };
    let area = (w0 + w1) / 2.0;
    sample.weight = area * diffusion_profile(sample.offset, falloff_color);
  });
}

/// `[center, <taps left of center>, <taps right of center>]`.
/// Order of both sides is preserved, the shader indexes this positionally.
fn move_center_to_front(samples: Vec<KernelSample>) -> Vec<KernelSample> {
  let center_idx = samples.len() / 2;
  let mut result = Vec::with_capacity(samples.len());
  result.push(samples[center_idx]);
  result.extend_from_slice(&samples[..center_idx]);
  result.extend_from_slice(&samples[center_idx + 1..]);
  result
}

/// Each channel sums to 1. A channel that sums to 0 (or overflows) becomes pass-through:
/// center tap 1, everything else 0.
fn normalize_weights(samples: &mut [KernelSample]) {
  let sum: Vec3 = samples.iter().map(|s| s.weight).sum();

  for channel in 0..3 {
    let channel_sum = sum[channel];
    if channel_sum > 0.0 && channel_sum.is_finite() {
      samples
        .iter_mut()
        .for_each(|s| s.weight[channel] /= channel_sum);
    } else {
      warn!(
        "SSS kernel channel {} has weight sum {}, falling back to pass-through",
        channel, channel_sum
      );
      samples.iter_mut().enumerate().for_each(|(i, s)| {
        s.weight[channel] = if i == 0 { 1.0 } else { 0.0 };
      });
    }
  }
}

/// Sum of gaussians fitted to the skin dipole profile.
///
/// ### Params:
/// * `radius` - distance from the entry point [mm]
pub fn diffusion_profile(radius: f32, falloff_color: Vec3) -> Vec3 {
  PROFILE_GAUSSIANS
    .iter()
    .map(|&(variance, weight)| weight * gaussian(variance, radius, falloff_color))
    .sum()
}

/// Normalized 2D gaussian, evaluated per channel with the radius stretched by falloff.
pub fn gaussian(variance: f32, radius: f32, falloff_color: Vec3) -> Vec3 {
  let eval = |falloff: f32| {
    let rr = radius / (FALLOFF_EPSILON + falloff);
    (-(rr * rr) / (2.0 * variance)).exp() / (2.0 * std::f32::consts::PI * variance)
  };
  vec3(
    eval(falloff_color.x),
    eval(falloff_color.y),
    eval(falloff_color.z),
  )
}

fn trace_kernel(kernel: &SSSKernel) {
  if !log::log_enabled!(log::Level::Trace) {
    return;
  }
  trace!("SSS kernel ({} samples):", kernel.len());
  kernel
    .samples()
    .iter()
    .enumerate()
    .for_each(|(i, s)| trace!("  [{:2}] {}", i, vec4_to_pretty_str(s.as_vec4())));
}

#[cfg(test)]
mod tests {
  use super::*;
  use approx::{assert_abs_diff_eq, assert_relative_eq};

  #[test]
  fn gaussian_peak_is_normalization_constant() {
    let g = gaussian(1.0, 0.0, Vec3::ONE);
    let expected = 1.0 / (2.0 * std::f32::consts::PI);
    assert_relative_eq!(g.x, expected, epsilon = 1e-6);
    assert_relative_eq!(g.y, expected, epsilon = 1e-6);
    assert_relative_eq!(g.z, expected, epsilon = 1e-6);
  }

  #[test]
  fn gaussian_with_zero_falloff_is_finite() {
    let g = gaussian(0.0484, 0.5, Vec3::ZERO);
    assert!(g.is_finite());
    assert_eq!(g, Vec3::ZERO);
  }

  #[test]
  fn profile_decays_with_radius() {
    let falloff = vec3(1.0, 0.37, 0.3);
    let near = diffusion_profile(0.1, falloff);
    let far = diffusion_profile(1.5, falloff);
    assert!(near.x > far.x && near.y > far.y && near.z > far.z);
    // lower falloff -> faster decay
    assert!(far.x > far.y && far.y > far.z);
  }

  #[test]
  fn offsets_are_pushed_outwards_quadratically() {
    let samples = generate_offsets(5);
    // range 2, step 1: o = [-2, -1, 0, 1, 2] -> 2 * sign(o) * o^2
    let offsets: Vec<f32> = samples.iter().map(|s| s.offset).collect();
    assert_eq!(offsets, vec![-8.0, -2.0, 0.0, 2.0, 8.0]);
    assert!(samples.iter().all(|s| s.weight == Vec3::ZERO));
  }

  #[test]
  fn area_weights_use_both_neighbours() {
    let mut samples = generate_offsets(5);
    assign_profile_weights(&mut samples, Vec3::ONE);
    // offsets [-8, -2, 0, 2, 8]: areas [3, 4, 2, 4, 3]
    let expected_areas = [3.0, 4.0, 2.0, 4.0, 3.0];
    samples.iter().zip(expected_areas.iter()).for_each(|(s, area)| {
      let expected = *area * diffusion_profile(s.offset, Vec3::ONE);
      assert_relative_eq!(s.weight.x, expected.x, epsilon = 1e-9);
    });
  }

  #[test]
  fn center_relocation_keeps_both_sides_in_order() {
    let samples: Vec<KernelSample> = (0..7)
      .map(|i| KernelSample::at_offset(i as f32))
      .collect();
    let offsets: Vec<f32> = move_center_to_front(samples)
      .iter()
      .map(|s| s.offset)
      .collect();
    assert_eq!(offsets, vec![3.0, 0.0, 1.0, 2.0, 4.0, 5.0, 6.0]);

    let samples: Vec<KernelSample> = (0..6)
      .map(|i| KernelSample::at_offset(i as f32))
      .collect();
    let offsets: Vec<f32> = move_center_to_front(samples)
      .iter()
      .map(|s| s.offset)
      .collect();
    assert_eq!(offsets, vec![3.0, 0.0, 1.0, 2.0, 4.0, 5.0]);
  }

  #[test]
  fn normalized_profile_sums_to_one() {
    for n in 1..MAX_KERNEL_SAMPLES {
      let samples = compute_normalized_profile(n, vec3(1.0, 0.37, 0.3));
      let sum: Vec3 = samples.iter().map(|s| s.weight).sum();
      assert_relative_eq!(sum.x, 1.0, epsilon = 1e-5);
      assert_relative_eq!(sum.y, 1.0, epsilon = 1e-5);
      assert_relative_eq!(sum.z, 1.0, epsilon = 1e-5);
    }
  }

  #[test]
  fn single_sample_kernel_is_pass_through() {
    let kernel = compute_kernel(1, vec3(1.0, 0.5, 0.2), Vec3::ONE);
    assert_eq!(kernel.len(), 1);
    assert_eq!(kernel.center().offset, 0.0);
    assert_eq!(kernel.center().weight, Vec3::ONE);
  }

  #[test]
  fn zero_weight_channel_falls_back_to_pass_through() {
    let mut samples = generate_offsets(5);
    samples.iter_mut().for_each(|s| s.weight = vec3(1.0, 0.0, 2.0));
    normalize_weights(&mut samples);

    assert_abs_diff_eq!(samples[0].weight.y, 1.0);
    assert!(samples[1..].iter().all(|s| s.weight.y == 0.0));
    assert_relative_eq!(samples[0].weight.x, 0.2, epsilon = 1e-6);
    assert_relative_eq!(samples[3].weight.z, 0.2, epsilon = 1e-6);
  }

  #[test]
  fn uniform_array_is_zero_padded() {
    let kernel = compute_kernel(25, Vec3::ONE, Vec3::ONE);
    let arr = kernel.to_uniform_array();
    assert_eq!(arr[0], kernel.center().as_vec4());
    assert_eq!(arr[24], kernel.samples()[24].as_vec4());
    assert!(arr[25..].iter().all(|v| *v == Vec4::ZERO));
  }

  #[test]
  #[should_panic(expected = "SSS kernel size")]
  fn zero_samples_is_fatal() {
    compute_kernel(0, Vec3::ONE, Vec3::ONE);
  }

  #[test]
  #[should_panic(expected = "SSS kernel size")]
  fn too_many_samples_is_fatal() {
    compute_kernel(MAX_KERNEL_SAMPLES, Vec3::ONE, Vec3::ONE);
  }
}

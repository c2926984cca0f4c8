use approx::assert_relative_eq;
use glam::{vec3, Vec3};

use rs_ssss::sss_kernel::{
  compute_kernel, compute_normalized_profile, kernel_range, KernelSample, MAX_KERNEL_SAMPLES,
};

const SKIN_FALLOFF: Vec3 = Vec3::new(1.0, 0.37, 0.3);

fn channel_sums(samples: &[KernelSample]) -> Vec3 {
  samples.iter().fold(Vec3::ZERO, |acc, s| acc + s.weight)
}

#[test]
fn normalized_profile_sums_to_one() {
  for n in 1..MAX_KERNEL_SAMPLES {
    let sum = channel_sums(&compute_normalized_profile(n, SKIN_FALLOFF));
    assert_relative_eq!(sum.x, 1.0, epsilon = 1e-4);
    assert_relative_eq!(sum.y, 1.0, epsilon = 1e-4);
    assert_relative_eq!(sum.z, 1.0, epsilon = 1e-4);
  }
}

#[test]
fn full_color_keeps_the_profile() {
  let profile = compute_normalized_profile(25, SKIN_FALLOFF);
  let kernel = compute_kernel(25, Vec3::ONE, SKIN_FALLOFF);

  assert_eq!(kernel.len(), profile.len());
  kernel
    .samples()
    .iter()
    .zip(profile.iter())
    .for_each(|(k, p)| {
      assert_relative_eq!(k.weight.x, p.weight.x, epsilon = 1e-6);
      assert_relative_eq!(k.weight.y, p.weight.y, epsilon = 1e-6);
      assert_relative_eq!(k.weight.z, p.weight.z, epsilon = 1e-6);
      assert_eq!(k.offset, p.offset);
    });
}

#[test]
fn black_color_is_pass_through() {
  let kernel = compute_kernel(25, Vec3::ZERO, SKIN_FALLOFF);

  assert_eq!(kernel.center().weight, Vec3::ONE);
  kernel
    .samples()
    .iter()
    .skip(1)
    .for_each(|s| assert_eq!(s.weight, Vec3::ZERO));
}

#[test]
fn center_tap_has_the_smallest_offset() {
  for n in &[3usize, 11, 25, 63] {
    let kernel = compute_kernel(*n, vec3(0.48, 0.41, 0.28), SKIN_FALLOFF);
    let center = kernel.center().offset.abs();
    assert!(
      kernel.samples().iter().all(|s| center <= s.offset.abs()),
      "n={} center offset {}",
      n,
      center
    );
  }
}

#[test]
fn range_grows_with_sample_count() {
  assert_eq!(kernel_range(20), 2.0);
  assert_eq!(kernel_range(21), 3.0);
}

#[test]
fn odd_kernel_is_symmetric() {
  let n = 25;
  let kernel = compute_kernel(n, vec3(0.48, 0.41, 0.28), Vec3::ONE);
  let samples = kernel.samples();
  let half = n / 2;

  // center moved to the front, taps left of it shifted right by one
  for i in 0..half {
    let left = &samples[i + 1];
    let right = &samples[n - 1 - i];
    assert_relative_eq!(left.offset, -right.offset, epsilon = 1e-6);
    assert_relative_eq!(left.weight.x, right.weight.x, epsilon = 1e-6);
    assert_relative_eq!(left.weight.y, right.weight.y, epsilon = 1e-6);
    assert_relative_eq!(left.weight.z, right.weight.z, epsilon = 1e-6);
  }
}

#[test]
fn red_scatters_the_furthest() {
  // same profile width for every channel, only the color tells them apart
  let kernel = compute_kernel(25, vec3(1.0, 0.5, 0.2), Vec3::ONE);
  let scattered = kernel.scattered_weight();

  assert!(scattered.x > scattered.y, "{:?}", scattered);
  assert!(scattered.y > scattered.z, "{:?}", scattered);
}

#[test]
fn each_channel_blends_with_its_own_color() {
  let color = [0.9f32, 0.4, 0.1];
  let profile = compute_normalized_profile(25, SKIN_FALLOFF);
  let kernel = compute_kernel(25, vec3(color[0], color[1], color[2]), SKIN_FALLOFF);
  let samples = kernel.samples();

  for c in 0..3 {
    let s = color[c];
    // center: 1 at s == 0, the profile weight at s == 1
    let expected_center = 1.0 + (profile[0].weight[c] - 1.0) * s;
    assert_relative_eq!(samples[0].weight[c], expected_center, epsilon = 1e-6);

    for i in 1..samples.len() {
      let expected = profile[i].weight[c] * s;
      assert_relative_eq!(samples[i].weight[c], expected, epsilon = 1e-6);
      assert_eq!(samples[i].offset, profile[i].offset);
    }
  }
}

#[test]
fn single_sample_kernel_is_identity() {
  let kernel = compute_kernel(1, vec3(0.48, 0.41, 0.28), SKIN_FALLOFF);
  assert_eq!(kernel.len(), 1);
  assert!(!kernel.is_empty());
  assert_relative_eq!(kernel.center().weight.x, 1.0, epsilon = 1e-6);
  assert_relative_eq!(kernel.center().weight.y, 1.0, epsilon = 1e-6);
  assert_relative_eq!(kernel.center().weight.z, 1.0, epsilon = 1e-6);
}

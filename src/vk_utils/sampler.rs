use ash::vk;

use crate::render_graph::FilterMode;

pub fn filter_mode_to_vk(filter: FilterMode) -> vk::Filter {
  match filter {
    FilterMode::Point => vk::Filter::NEAREST,
    FilterMode::Bilinear => vk::Filter::LINEAR,
  }
}

/// OMG so much fluff for simple sampler.
/// Screen-space taps outside the image repeat the edge texel.
pub fn create_sampler(device: &ash::Device, filter: FilterMode) -> vk::Sampler {
  let vk_filter = filter_mode_to_vk(filter);
  let create_info = vk::SamplerCreateInfo::builder()
    .mag_filter(vk_filter)
    .min_filter(vk_filter)
    .address_mode_u(vk::SamplerAddressMode::CLAMP_TO_EDGE)
    .address_mode_v(vk::SamplerAddressMode::CLAMP_TO_EDGE)
    .address_mode_w(vk::SamplerAddressMode::CLAMP_TO_EDGE)
    .anisotropy_enable(false)
    .max_anisotropy(1f32)
    .compare_enable(false)
    .compare_op(vk::CompareOp::ALWAYS)
    .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
    .unnormalized_coordinates(false) // address with [0, 1) instead of [0, tex_width)
    // single mip
    .mipmap_mode(vk::SamplerMipmapMode::NEAREST)
    .mip_lod_bias(0f32)
    .min_lod(0f32)
    .max_lod(0f32)
    .build();

  unsafe {
    device
      .create_sampler(&create_info, None)
      .expect("Failed creating sampler")
  }
}

use ash::extensions::khr::PushDescriptor;
use ash::vk;

use super::VkBuffer;
use super::VkTexture;

// Resources are bound with VK_KHR_push_descriptor, recorded straight into
// the command buffer. No descriptor pools or sets to manage.

/// Create layout for a single uniform buffer object.
pub fn create_ubo_binding(
  binding: u32,
  stage_flags: vk::ShaderStageFlags,
) -> vk::DescriptorSetLayoutBinding {
  vk::DescriptorSetLayoutBinding::builder()
    .binding(binding)
    .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
    .descriptor_count(1)
    .stage_flags(stage_flags)
    .build()
}

/// Create layout for a single texture/sampler object.
pub fn create_texture_binding(
  binding: u32,
  stage_flags: vk::ShaderStageFlags,
) -> vk::DescriptorSetLayoutBinding {
  vk::DescriptorSetLayoutBinding::builder()
    .binding(binding)
    .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
    .descriptor_count(1)
    .stage_flags(stage_flags)
    .build()
}

pub fn create_push_descriptor_layout(
  device: &ash::Device,
  bindings: &[vk::DescriptorSetLayoutBinding],
) -> vk::DescriptorSetLayout {
  let create_info = vk::DescriptorSetLayoutCreateInfo::builder()
    .flags(vk::DescriptorSetLayoutCreateFlags::PUSH_DESCRIPTOR_KHR)
    .bindings(bindings)
    .build();

  unsafe {
    device
      .create_descriptor_set_layout(&create_info, None)
      .expect("Failed to create DescriptorSetLayout")
  }
}

/// Pack stuff into struct to make it more palatable as param
pub struct ResouceBinder<'a> {
  pub push_descriptor: &'a PushDescriptor,
  pub command_buffer: vk::CommandBuffer,
  pub pipeline_layout: vk::PipelineLayout,
}

pub enum BindableResource<'a> {
  Uniform {
    binding: u32,
    buffer: &'a VkBuffer,
    /// Bytes from the start of the buffer
    offset: u64,
    range: u64,
  },
  Texture {
    binding: u32,
    texture: &'a VkTexture,
    /// View to sample, usually `texture.sampled_image_view()`
    image_view: vk::ImageView,
    sampler: vk::Sampler,
  },
}

pub unsafe fn bind_resources_to_descriptors(
  binder: &ResouceBinder,
  descriptor_set: u32,
  resources_to_bind: &[BindableResource],
) {
  // vk::WriteDescriptorSet has POINTERS to these. Allocate upfront, so they never move.
  let mut buffer_infos: Vec<vk::DescriptorBufferInfo> = Vec::with_capacity(resources_to_bind.len());
  let mut image_infos: Vec<vk::DescriptorImageInfo> = Vec::with_capacity(resources_to_bind.len());

  resources_to_bind.iter().for_each(|resource| match resource {
    BindableResource::Uniform {
      buffer,
      offset,
      range,
      ..
    } => buffer_infos.push(vk::DescriptorBufferInfo {
      buffer: buffer.buffer,
      offset: *offset,
      range: *range,
    }),
    BindableResource::Texture {
      texture,
      image_view,
      sampler,
      ..
    } => image_infos.push(vk::DescriptorImageInfo {
      image_layout: texture.layout,
      image_view: *image_view,
      sampler: *sampler,
    }),
  });

  let mut next_buffer = 0;
  let mut next_image = 0;
  let next_descriptors: Vec<vk::WriteDescriptorSet> = resources_to_bind
    .iter()
    .map(|resource| match resource {
      BindableResource::Uniform { binding, .. } => {
        let data_slice = &buffer_infos[next_buffer..next_buffer + 1];
        next_buffer += 1;
        vk::WriteDescriptorSet::builder()
          .dst_binding(*binding)
          .dst_array_element(0)
          .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
          .buffer_info(data_slice)
          .build()
      }
      BindableResource::Texture { binding, .. } => {
        let data_slice = &image_infos[next_image..next_image + 1];
        next_image += 1;
        vk::WriteDescriptorSet::builder()
          .dst_binding(*binding)
          .dst_array_element(0)
          .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
          .image_info(data_slice)
          .build()
      }
    })
    .collect();

  binder.push_descriptor.cmd_push_descriptor_set(
    binder.command_buffer,
    vk::PipelineBindPoint::GRAPHICS,
    binder.pipeline_layout,
    descriptor_set,
    next_descriptors.as_slice(),
  );
}

/// `offset` rounded up to the device's `minUniformBufferOffsetAlignment`.
pub fn align_uniform_offset(offset: u64, alignment: u64) -> u64 {
  if alignment <= 1 {
    offset
  } else {
    (offset + alignment - 1) / alignment * alignment
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn aligns_offsets_up() {
    assert_eq!(align_uniform_offset(0, 256), 0);
    assert_eq!(align_uniform_offset(1, 256), 256);
    assert_eq!(align_uniform_offset(256, 256), 256);
    assert_eq!(align_uniform_offset(257, 64), 320);
    assert_eq!(align_uniform_offset(13, 0), 13);
  }
}

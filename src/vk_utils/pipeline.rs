use ash::vk;

pub fn create_pipeline_cache(device: &ash::Device) -> vk::PipelineCache {
  let create_info = vk::PipelineCacheCreateInfo::builder().build();
  unsafe {
    device
      .create_pipeline_cache(&create_info, None)
      .expect("Failed to create pipeline cache")
  }
}

pub fn create_pipeline_layout(
  device: &ash::Device,
  uniform_layouts: &[vk::DescriptorSetLayout],
  push_constant_ranges: &[vk::PushConstantRange],
) -> vk::PipelineLayout {
  let create_info = vk::PipelineLayoutCreateInfo::builder()
    .set_layouts(uniform_layouts)
    .push_constant_ranges(push_constant_ranges)
    .build();
  unsafe {
    device
      .create_pipeline_layout(&create_info, None)
      .expect("Failed to create pipeline layout")
  }
}

/// Fixed function state of a fullscreen draw.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct FullscreenPipelineOpts {
  pub color_attachment_count: usize,
  /// Draw only where stencil equals the dynamic reference value.
  /// Requires depth/stencil attachment in the render pass.
  pub stencil_equal_test: bool,
}

/// Pipeline for the fullscreen triangle. Viewport, scissor and stencil
/// reference are dynamic, so one pipeline serves any target size.
pub fn create_fullscreen_pipeline(
  device: &ash::Device,
  pipeline_cache: vk::PipelineCache,
  render_pass: vk::RenderPass,
  pipeline_layout: vk::PipelineLayout,
  stages: &[vk::PipelineShaderStageCreateInfo],
  opts: &FullscreenPipelineOpts,
) -> vk::Pipeline {
  let mut dynamic_states = vec![vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
  if opts.stencil_equal_test {
    dynamic_states.push(vk::DynamicState::STENCIL_REFERENCE);
  }
  let dynamic_state = vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(&dynamic_states);

  let vertex_input_state = ps_vertex_empty();
  let input_assembly_state = ps_ia_triangle_list();
  let viewport_state = ps_viewport_single_dynamic();
  let rasterization_state = ps_raster_polygons(vk::CullModeFlags::NONE);
  let multisample_state = ps_multisample_disabled();
  let depth_stencil_state = if opts.stencil_equal_test {
    ps_depth_always_stencil_equal()
  } else {
    ps_depth_always_stencil_always()
  };
  let color_attachments = ps_color_attachments_write_all(opts.color_attachment_count);
  let color_blend_state =
    vk::PipelineColorBlendStateCreateInfo::builder().attachments(&color_attachments);

  let create_info = vk::GraphicsPipelineCreateInfo::builder()
    .stages(stages)
    .vertex_input_state(&vertex_input_state)
    .input_assembly_state(&input_assembly_state)
    .viewport_state(&viewport_state)
    .rasterization_state(&rasterization_state)
    .multisample_state(&multisample_state)
    .depth_stencil_state(&depth_stencil_state)
    .color_blend_state(&color_blend_state)
    .dynamic_state(&dynamic_state)
    .layout(pipeline_layout)
    .render_pass(render_pass)
    .build();

  let pipelines = unsafe {
    device
      .create_graphics_pipelines(pipeline_cache, &[create_info], None)
      .ok()
  };
  match pipelines.and_then(|ps| ps.first().copied()) {
    Some(pipeline) => pipeline,
    None => panic!("Failed to create graphic pipeline"),
  }
}

// Presets for `vk::GraphicsPipelineCreateInfo`

/// No data for vertices provided by the app, it will all be handled in the shader.
/// https://www.saschawillems.de/blog/2016/08/13/vulkan-tutorial-on-rendering-a-fullscreen-quad-without-buffers/
pub fn ps_vertex_empty() -> vk::PipelineVertexInputStateCreateInfo {
  vk::PipelineVertexInputStateCreateInfo::builder().build()
}

pub fn ps_ia_triangle_list() -> vk::PipelineInputAssemblyStateCreateInfo {
  vk::PipelineInputAssemblyStateCreateInfo::builder()
    .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
    .build()
}

/// Does not specify dimensions during pipeline create, requires PipelineDynamicStateCreateInfo with
/// - vk::DynamicState::VIEWPORT
/// - vk::DynamicState::SCISSOR
pub fn ps_viewport_single_dynamic() -> vk::PipelineViewportStateCreateInfo {
  vk::PipelineViewportStateCreateInfo {
    viewport_count: 1,
    scissor_count: 1,
    ..Default::default()
  }
}

pub fn ps_raster_polygons(
  cull_mode: vk::CullModeFlags,
) -> vk::PipelineRasterizationStateCreateInfo {
  vk::PipelineRasterizationStateCreateInfo::builder()
    .depth_clamp_enable(false)
    .polygon_mode(vk::PolygonMode::FILL)
    .cull_mode(cull_mode)
    .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
    .line_width(1.0) // validation layers: has to be 1.0 if not dynamic
    .build()
}

/// - Depth: test SKIP, write OFF
/// - Stencil: test SKIP
pub fn ps_depth_always_stencil_always() -> vk::PipelineDepthStencilStateCreateInfo {
  vk::PipelineDepthStencilStateCreateInfo::builder()
    .depth_test_enable(false)
    .depth_write_enable(false)
    .depth_compare_op(vk::CompareOp::ALWAYS)
    .depth_bounds_test_enable(false)
    .stencil_test_enable(false)
    .build()
}

/// - Depth: test SKIP, write OFF
/// - Stencil: test EQUAL to dynamic reference, write OFF
pub fn ps_depth_always_stencil_equal() -> vk::PipelineDepthStencilStateCreateInfo {
  let stencil_op = vk::StencilOpState {
    fail_op: vk::StencilOp::KEEP,
    pass_op: vk::StencilOp::KEEP,
    depth_fail_op: vk::StencilOp::KEEP,
    compare_op: vk::CompareOp::EQUAL,
    compare_mask: 0xff,
    write_mask: 0x00,
    reference: 0, // dynamic
  };

  vk::PipelineDepthStencilStateCreateInfo::builder()
    .depth_test_enable(false)
    .depth_write_enable(false)
    .depth_compare_op(vk::CompareOp::ALWAYS)
    .depth_bounds_test_enable(false)
    .stencil_test_enable(true)
    .front(stencil_op)
    .back(stencil_op)
    .build()
}

pub fn ps_multisample_disabled() -> vk::PipelineMultisampleStateCreateInfo {
  vk::PipelineMultisampleStateCreateInfo::builder()
    .rasterization_samples(vk::SampleCountFlags::TYPE_1)
    .sample_shading_enable(false)
    .build()
}

/// Write result to all color attachments, disable blending
pub fn ps_color_attachments_write_all(
  attachment_count: usize,
) -> Vec<vk::PipelineColorBlendAttachmentState> {
  // > If the independent blending feature is not enabled on the device,
  // all VkPipelineColorBlendAttachmentState elements in the pAttachments
  // array must be identical.
  let write_all = vk::PipelineColorBlendAttachmentState::builder()
    .color_write_mask(vk::ColorComponentFlags::RGBA)
    .blend_enable(false)
    .src_color_blend_factor(vk::BlendFactor::ONE)
    .dst_color_blend_factor(vk::BlendFactor::ZERO)
    .src_alpha_blend_factor(vk::BlendFactor::ONE)
    .dst_alpha_blend_factor(vk::BlendFactor::ZERO)
    .build();

  vec![write_all; attachment_count]
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn stencil_test_never_writes() {
    let state = ps_depth_always_stencil_equal();
    assert_eq!(state.stencil_test_enable, vk::TRUE);
    assert_eq!(state.depth_write_enable, vk::FALSE);
    assert_eq!(state.front.compare_op, vk::CompareOp::EQUAL);
    assert_eq!(state.front.write_mask, 0);
    assert_eq!(state.back.write_mask, 0);
  }

  #[test]
  fn writes_every_color_attachment() {
    let attachments = ps_color_attachments_write_all(4);
    assert_eq!(attachments.len(), 4);
    assert!(attachments
      .iter()
      .all(|a| a.color_write_mask == vk::ColorComponentFlags::RGBA && a.blend_enable == vk::FALSE));
  }
}

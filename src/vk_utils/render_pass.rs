use ash::vk;
use log::trace;

/// Raw Vulkan objects used to create vk::RenderPass
pub type AttachmentDefinition = (vk::AttachmentDescription, vk::AttachmentReference);

/// Everything that decides render pass compatibility for our draws.
/// Textures are transitioned before the render pass begins, so initial and
/// final layouts are always the attachment layouts.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RenderPassKey {
  pub color_formats: Vec<vk::Format>,
  pub color_load_op: vk::AttachmentLoadOp,
  /// Format and layout of the depth/stencil attachment, always loaded
  pub depth_stencil: Option<(vk::Format, vk::ImageLayout)>,
}

pub fn create_color_attachment(
  attachment_idx: u32,
  image_format: vk::Format,
  load_op: vk::AttachmentLoadOp,
  store_op: vk::AttachmentStoreOp,
) -> AttachmentDefinition {
  let layout = vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL;
  let attachment = vk::AttachmentDescription::builder()
    .format(image_format)
    .samples(vk::SampleCountFlags::TYPE_1) // single sampled
    .load_op(load_op)
    .store_op(store_op)
    .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
    .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
    .initial_layout(layout)
    .final_layout(layout)
    .build();

  let attachment_reference = vk::AttachmentReference {
    attachment: attachment_idx,
    layout,
  };

  (attachment, attachment_reference)
}

pub fn create_depth_stencil_attachment(
  attachment_idx: u32,
  image_format: vk::Format,
  depth_load_op: vk::AttachmentLoadOp,
  depth_store_op: vk::AttachmentStoreOp,
  stencil_load_op: vk::AttachmentLoadOp,
  stencil_store_op: vk::AttachmentStoreOp,
  layout: vk::ImageLayout,
) -> AttachmentDefinition {
  let attachment = vk::AttachmentDescription::builder()
    .format(image_format)
    .samples(vk::SampleCountFlags::TYPE_1) // single sampled
    .load_op(depth_load_op)
    .store_op(depth_store_op)
    .stencil_load_op(stencil_load_op)
    .stencil_store_op(stencil_store_op)
    .initial_layout(layout)
    .final_layout(layout)
    .build();

  let attachment_reference = vk::AttachmentReference {
    attachment: attachment_idx,
    layout,
  };

  (attachment, attachment_reference)
}

/// Colors take the first indices, depth/stencil (if any) comes last.
pub fn create_render_pass(device: &ash::Device, key: &RenderPassKey) -> vk::RenderPass {
  trace!("Creating render pass {:?}", key);
  let colors: Vec<AttachmentDefinition> = key
    .color_formats
    .iter()
    .enumerate()
    .map(|(idx, format)| {
      create_color_attachment(
        idx as u32,
        *format,
        key.color_load_op,
        vk::AttachmentStoreOp::STORE,
      )
    })
    .collect();

  let depth = key.depth_stencil.map(|(format, layout)| {
    create_depth_stencil_attachment(
      colors.len() as u32,
      format,
      vk::AttachmentLoadOp::LOAD,
      vk::AttachmentStoreOp::STORE,
      vk::AttachmentLoadOp::LOAD,
      vk::AttachmentStoreOp::STORE,
      layout,
    )
  });

  unsafe { create_render_pass_from_attachments(device, depth, &colors) }
}

pub unsafe fn create_render_pass_from_attachments(
  device: &ash::Device,
  depth: Option<AttachmentDefinition>,
  colors: &[AttachmentDefinition],
) -> vk::RenderPass {
  let mut all_attachment_descs = Vec::<vk::AttachmentDescription>::with_capacity(colors.len() + 1);
  let mut src_stage_mask = vk::PipelineStageFlags::empty();
  let mut dst_stage_mask = vk::PipelineStageFlags::empty();
  let mut dst_access_mask = vk::AccessFlags::empty();

  // colors
  if colors.len() > 0 {
    src_stage_mask = src_stage_mask | vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT;
    dst_stage_mask = dst_stage_mask | vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT;
    dst_access_mask = dst_access_mask | vk::AccessFlags::COLOR_ATTACHMENT_WRITE;
  }
  colors.iter().for_each(|a| all_attachment_descs.push(a.0));
  let color_refs = colors.iter().map(|a| a.1).collect::<Vec<_>>();

  // depth. Reference has to outlive the create call
  let depth_ref = depth.map(|a_ds| {
    src_stage_mask = src_stage_mask
      | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS
      | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS;
    dst_stage_mask = dst_stage_mask
      | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS
      | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS;
    dst_access_mask = dst_access_mask | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ;
    all_attachment_descs.push(a_ds.0);
    a_ds.1
  });

  let mut subpass = vk::SubpassDescription::builder()
    .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
    .color_attachments(&color_refs);
  if let Some(depth_ref) = depth_ref.as_ref() {
    subpass = subpass.depth_stencil_attachment(depth_ref);
  }
  let subpasses = [subpass.build()];

  let dependencies = [vk::SubpassDependency::builder()
    .src_subpass(vk::SUBPASS_EXTERNAL)
    .dst_subpass(0)
    .src_stage_mask(src_stage_mask)
    .src_access_mask(vk::AccessFlags::empty())
    .dst_stage_mask(dst_stage_mask)
    .dst_access_mask(dst_access_mask)
    .build()];

  let create_info = vk::RenderPassCreateInfo::builder()
    .dependencies(&dependencies)
    .attachments(&all_attachment_descs)
    .subpasses(&subpasses)
    .build();
  device
    .create_render_pass(&create_info, None)
    .expect("Failed creating render pass")
}

pub fn create_framebuffer(
  device: &ash::Device,
  render_pass: vk::RenderPass,
  image_views: &[vk::ImageView],
  size: &vk::Extent2D,
) -> vk::Framebuffer {
  let create_info = vk::FramebufferCreateInfo::builder()
    .render_pass(render_pass)
    .attachments(image_views)
    .width(size.width)
    .height(size.height)
    .layers(1)
    .build();
  unsafe {
    device
      .create_framebuffer(&create_info, None)
      .expect("Failed to create framebuffer")
  }
}

pub fn create_viewport(size: &vk::Extent2D) -> vk::Viewport {
  vk::Viewport {
    x: 0f32,
    y: size.height as f32, // flip vulkan coord system - important!
    width: size.width as f32,
    height: -(size.height as f32), // flip vulkan coord system - important!
    min_depth: 0f32,
    max_depth: 1.0f32,
  }
}

pub fn size_to_rect_vk(size: &vk::Extent2D) -> vk::Rect2D {
  vk::Rect2D {
    offset: vk::Offset2D { x: 0, y: 0 },
    extent: *size,
  }
}

/// Begin render pass and set dynamic viewport + scissor to cover the whole framebuffer.
pub unsafe fn cmd_begin_render_pass_for_framebuffer(
  device: &ash::Device,
  command_buffer: &vk::CommandBuffer,
  render_pass: &vk::RenderPass,
  framebuffer: &vk::Framebuffer,
  size: &vk::Extent2D,
  clear_values: &[vk::ClearValue],
) {
  let render_area = size_to_rect_vk(size);
  let render_pass_begin_info = vk::RenderPassBeginInfo::builder()
    .render_pass(*render_pass)
    .framebuffer(*framebuffer)
    .render_area(render_area)
    .clear_values(clear_values)
    .build();

  device.cmd_begin_render_pass(
    *command_buffer,
    &render_pass_begin_info,
    vk::SubpassContents::INLINE,
  );
  device.cmd_set_viewport(*command_buffer, 0, &[create_viewport(size)]);
  device.cmd_set_scissor(*command_buffer, 0, &[render_area]);
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn viewport_is_flipped() {
    let vp = create_viewport(&vk::Extent2D {
      width: 800,
      height: 600,
    });
    assert_eq!(vp.y, 600.0);
    assert_eq!(vp.height, -600.0);
  }

  #[test]
  fn read_only_depth_keeps_its_layout() {
    let (desc, reference) = create_depth_stencil_attachment(
      1,
      vk::Format::D24_UNORM_S8_UINT,
      vk::AttachmentLoadOp::LOAD,
      vk::AttachmentStoreOp::STORE,
      vk::AttachmentLoadOp::LOAD,
      vk::AttachmentStoreOp::STORE,
      vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
    );
    assert_eq!(desc.initial_layout, desc.final_layout);
    assert_eq!(reference.attachment, 1);
    assert_eq!(
      reference.layout,
      vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL
    );
  }
}

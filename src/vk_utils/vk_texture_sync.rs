use log::trace;

use ash::vk;

use super::VkTexture;

const DEBUG_LAYOUT_TRANSITIONS: bool = false;

pub fn create_image_barrier(
  image: vk::Image,
  aspect_mask: vk::ImageAspectFlags,
  old_layout: vk::ImageLayout,
  new_layout: vk::ImageLayout,
  src_access_mask: vk::AccessFlags,
  dst_access_mask: vk::AccessFlags,
) -> vk::ImageMemoryBarrier {
  vk::ImageMemoryBarrier::builder()
    .old_layout(old_layout)
    .new_layout(new_layout)
    .src_access_mask(src_access_mask)
    .dst_access_mask(dst_access_mask)
    .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
    .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
    .image(image)
    .subresource_range(vk::ImageSubresourceRange {
      aspect_mask,
      base_mip_level: 0,
      level_count: 1,
      base_array_layer: 0,
      layer_count: 1,
    })
    .build()
}

/// Which ops touched the image in `layout` (or will touch it), and in which stage.
pub fn layout_access_and_stage(
  layout: vk::ImageLayout,
) -> (vk::AccessFlags, vk::PipelineStageFlags) {
  match layout {
    vk::ImageLayout::UNDEFINED => (
      vk::AccessFlags::empty(),
      vk::PipelineStageFlags::TOP_OF_PIPE,
    ),
    vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL => (
      vk::AccessFlags::COLOR_ATTACHMENT_READ | vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
      vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
    ),
    vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL => (
      vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ
        | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
      vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS,
    ),
    // stencil test on one side, depth sampled in the fragment shader on the other
    vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL => (
      vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ | vk::AccessFlags::SHADER_READ,
      vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS
        | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS
        | vk::PipelineStageFlags::FRAGMENT_SHADER,
    ),
    vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL => (
      vk::AccessFlags::SHADER_READ,
      vk::PipelineStageFlags::FRAGMENT_SHADER,
    ),
    vk::ImageLayout::TRANSFER_SRC_OPTIMAL => (
      vk::AccessFlags::TRANSFER_READ,
      vk::PipelineStageFlags::TRANSFER,
    ),
    vk::ImageLayout::TRANSFER_DST_OPTIMAL => (
      vk::AccessFlags::TRANSFER_WRITE,
      vk::PipelineStageFlags::TRANSFER,
    ),
    _ => (
      vk::AccessFlags::MEMORY_READ | vk::AccessFlags::MEMORY_WRITE,
      vk::PipelineStageFlags::ALL_COMMANDS,
    ),
  }
}

/// Layouts in which nothing writes to the image. Read-after-read needs no barrier.
pub fn is_read_only_layout(layout: vk::ImageLayout) -> bool {
  matches!(
    layout,
    vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL
      | vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL
      | vk::ImageLayout::TRANSFER_SRC_OPTIMAL
  )
}

impl VkTexture {
  /// The `srcStageMask` marks the stages to wait for in previous commands
  /// before allowing the stages given in `dstStageMask` to execute
  /// in subsequent commands.
  ///
  /// ## Docs
  /// * https://github.com/KhronosGroup/Vulkan-Docs/wiki/Synchronization-Examples-(Legacy-synchronization-APIs)
  /// * https://www.khronos.org/blog/understanding-vulkan-synchronization
  ///
  /// Returns `None` if the texture is already in the read-only `new_layout`.
  pub fn barrier_prepare_for_layout_transition(
    &mut self,
    new_layout: vk::ImageLayout,
  ) -> Option<(
    vk::ImageMemoryBarrier,
    vk::PipelineStageFlags,
    vk::PipelineStageFlags,
  )> {
    if self.layout == new_layout && is_read_only_layout(new_layout) {
      return None;
    }
    self.trace_log_layout_transition(new_layout);

    let (src_access, src_stage) = layout_access_and_stage(self.layout);
    let (dst_access, dst_stage) = layout_access_and_stage(new_layout);
    let barrier = create_image_barrier(
      self.image,
      self.aspect_flags(),
      self.layout,
      new_layout,
      src_access,
      dst_access,
    );

    self.layout = new_layout;
    Some((barrier, src_stage, dst_stage))
  }

  /// Record the layout transition into the command buffer.
  pub fn cmd_transition(
    &mut self,
    device: &ash::Device,
    command_buffer: vk::CommandBuffer,
    new_layout: vk::ImageLayout,
  ) {
    let Some((barrier, src_stage, dst_stage)) =
      self.barrier_prepare_for_layout_transition(new_layout)
    else {
      return;
    };

    unsafe {
      device.cmd_pipeline_barrier(
        command_buffer,
        src_stage,
        dst_stage,
        vk::DependencyFlags::empty(),
        &[],
        &[],
        &[barrier],
      );
    }
  }

  /// Layout when the texture is bound to a shader
  pub fn sampled_layout(&self) -> vk::ImageLayout {
    if self.is_depth_stencil() {
      vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL
    } else {
      vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL
    }
  }

  /// Layout when the texture is written as render pass attachment
  pub fn attachment_layout(&self) -> vk::ImageLayout {
    if self.is_depth_stencil() {
      vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL
    } else {
      vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL
    }
  }

  fn trace_log_layout_transition(&self, new_layout: vk::ImageLayout) {
    if DEBUG_LAYOUT_TRANSITIONS {
      trace!(
        "VkTexture::LayoutTransition '{}' ({:?} -> {:?})",
        self.name(),
        self.layout,
        new_layout
      );
    }
  }
}

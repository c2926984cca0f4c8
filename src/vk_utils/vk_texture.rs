use log::trace;
use vma::Alloc;

use ash::vk;

use crate::render_graph::{RenderTargetDesc, TextureFormat};

/// Vulkan format for each of the host-independent formats.
pub fn texture_format_to_vk(format: TextureFormat) -> vk::Format {
  match format {
    TextureFormat::DefaultHDR => vk::Format::R16G16B16A16_SFLOAT,
    TextureFormat::ARGBFloat => vk::Format::R32G32B32A32_SFLOAT,
    TextureFormat::Depth24Stencil8 => vk::Format::D24_UNORM_S8_UINT,
  }
}

pub fn is_depth_stencil_format(format: vk::Format) -> bool {
  matches!(
    format,
    vk::Format::D24_UNORM_S8_UINT | vk::Format::D32_SFLOAT_S8_UINT | vk::Format::D16_UNORM_S8_UINT
  )
}

/// Every render target can be drawn to, sampled and copied in both directions (blit).
pub fn render_target_usage(format: vk::Format) -> vk::ImageUsageFlags {
  let attachment = if is_depth_stencil_format(format) {
    vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT
  } else {
    vk::ImageUsageFlags::COLOR_ATTACHMENT
  };
  attachment
    | vk::ImageUsageFlags::SAMPLED
    | vk::ImageUsageFlags::TRANSFER_SRC
    | vk::ImageUsageFlags::TRANSFER_DST
}

pub fn create_image_view(
  device: &ash::Device,
  image: vk::Image,
  image_format: vk::Format,
  aspect_mask_flags: vk::ImageAspectFlags,
) -> vk::ImageView {
  let subresource_range = vk::ImageSubresourceRange::builder()
    .aspect_mask(aspect_mask_flags)
    .base_array_layer(0)
    .layer_count(1)
    .base_mip_level(0)
    .level_count(1)
    .build();

  let create_info = vk::ImageViewCreateInfo::builder()
    .image(image)
    .view_type(vk::ImageViewType::TYPE_2D)
    .format(image_format)
    .subresource_range(subresource_range)
    .build();

  unsafe {
    device
      .create_image_view(&create_info, None)
      .expect("Failed creating image view")
  }
}

pub struct VkTexture {
  // For debugging
  name: String,
  pub width: u32,
  pub height: u32,
  pub format: vk::Format,
  /// Native Vulkan image
  pub image: vk::Image,
  /// All aspects. Used as attachment
  image_view: vk::ImageView,
  /// Depth aspect only for depth/stencil, as only one aspect can be sampled
  sampled_image_view: vk::ImageView,
  /// Stencil aspect only, `None` for color textures
  stencil_image_view: Option<vk::ImageView>,
  aspect_flags: vk::ImageAspectFlags,
  pub layout: vk::ImageLayout,
  /// `None` if the image is owned by someone else
  pub allocation: Option<vma::Allocation>,
}

impl VkTexture {
  pub fn empty(
    device: &ash::Device,
    allocator: &vma::Allocator,
    name: String,
    size: vk::Extent2D,
    format: vk::Format,
    usage: vk::ImageUsageFlags,
  ) -> VkTexture {
    let create_info = vk::ImageCreateInfo::builder()
      .image_type(vk::ImageType::TYPE_2D)
      .extent(vk::Extent3D {
        width: size.width,
        height: size.height,
        depth: 1,
      })
      .format(format)
      .tiling(vk::ImageTiling::OPTIMAL)
      .usage(usage)
      .initial_layout(vk::ImageLayout::UNDEFINED)
      // verbose properties, but vulkan requires
      .sharing_mode(vk::SharingMode::EXCLUSIVE)
      .samples(vk::SampleCountFlags::TYPE_1)
      .mip_levels(1)
      .array_layers(1)
      .build();

    let alloc_info = vma::AllocationCreateInfo {
      usage: vma::MemoryUsage::AutoPreferDevice,
      ..Default::default()
    };

    let (image, allocation) = unsafe {
      allocator
        .create_image(&create_info, &alloc_info)
        .expect("Failed allocating GPU memory for texture")
    };

    let (aspect_flags, sampled_aspect) = if is_depth_stencil_format(format) {
      (
        vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL,
        vk::ImageAspectFlags::DEPTH,
      )
    } else {
      (vk::ImageAspectFlags::COLOR, vk::ImageAspectFlags::COLOR)
    };
    let image_view = create_image_view(device, image, format, aspect_flags);
    let sampled_image_view = if sampled_aspect == aspect_flags {
      image_view
    } else {
      create_image_view(device, image, format, sampled_aspect)
    };
    let stencil_image_view = if aspect_flags.contains(vk::ImageAspectFlags::STENCIL) {
      Some(create_image_view(
        device,
        image,
        format,
        vk::ImageAspectFlags::STENCIL,
      ))
    } else {
      None
    };

    let texture = VkTexture {
      name: create_texture_name(name, size.width, size.height),
      width: size.width,
      height: size.height,
      format,
      image,
      image_view,
      sampled_image_view,
      stencil_image_view,
      aspect_flags,
      layout: create_info.initial_layout,
      allocation: Some(allocation),
    };
    trace!("Created {}", texture.name());
    texture
  }

  /// Render target for `desc`. Always single sampled with 1 mip level.
  pub fn render_target(
    device: &ash::Device,
    allocator: &vma::Allocator,
    name: &str,
    desc: &RenderTargetDesc,
  ) -> VkTexture {
    let format = texture_format_to_vk(desc.format);
    VkTexture::empty(
      device,
      allocator,
      name.to_string(),
      vk::Extent2D {
        width: desc.width,
        height: desc.height,
      },
      format,
      render_target_usage(format),
    )
  }

  /// Wrap image created outside of this crate, e.g. renderer's camera targets.
  /// Views are not destroyed by `delete`. For depth/stencil images
  /// `sampled_image_view` has to be depth aspect only and `stencil_image_view`
  /// stencil aspect only.
  pub fn import(
    name: String,
    image: vk::Image,
    image_view: vk::ImageView,
    sampled_image_view: vk::ImageView,
    stencil_image_view: Option<vk::ImageView>,
    size: vk::Extent2D,
    format: vk::Format,
    layout: vk::ImageLayout,
  ) -> VkTexture {
    let aspect_flags = if is_depth_stencil_format(format) {
      vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
    } else {
      vk::ImageAspectFlags::COLOR
    };
    VkTexture {
      name: create_texture_name(name, size.width, size.height),
      width: size.width,
      height: size.height,
      format,
      image,
      image_view,
      sampled_image_view,
      stencil_image_view,
      aspect_flags,
      layout,
      allocation: None,
    }
  }

  pub fn is_imported(&self) -> bool {
    self.allocation.is_none()
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn size(&self) -> vk::Extent2D {
    vk::Extent2D {
      width: self.width,
      height: self.height,
    }
  }

  pub fn image_view(&self) -> vk::ImageView {
    self.image_view
  }

  pub fn sampled_image_view(&self) -> vk::ImageView {
    self.sampled_image_view
  }

  pub fn stencil_image_view(&self) -> Option<vk::ImageView> {
    self.stencil_image_view
  }

  pub fn is_color(&self) -> bool {
    self.aspect_flags.contains(vk::ImageAspectFlags::COLOR)
  }

  pub fn is_depth_stencil(&self) -> bool {
    self
      .aspect_flags
      .contains(vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL)
  }

  pub fn aspect_flags(&self) -> vk::ImageAspectFlags {
    self.aspect_flags
  }

  /// No-op for imported textures.
  pub unsafe fn delete(&mut self, device: &ash::Device, allocator: &vma::Allocator) -> () {
    let Some(mut allocation) = self.allocation.take() else {
      return;
    };
    if let Some(view) = self.stencil_image_view.take() {
      device.destroy_image_view(view, None);
    }
    if self.sampled_image_view != self.image_view {
      device.destroy_image_view(self.sampled_image_view, None);
    }
    device.destroy_image_view(self.image_view, None);
    allocator.destroy_image(self.image, &mut allocation)
  }
}

fn create_texture_name(name: String, width: u32, height: u32) -> String {
  format!("VkTexture({}, {}x{})", name, width, height)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn maps_formats() {
    assert_eq!(
      texture_format_to_vk(TextureFormat::DefaultHDR),
      vk::Format::R16G16B16A16_SFLOAT
    );
    assert_eq!(
      texture_format_to_vk(TextureFormat::ARGBFloat),
      vk::Format::R32G32B32A32_SFLOAT
    );
    assert_eq!(
      texture_format_to_vk(TextureFormat::Depth24Stencil8),
      vk::Format::D24_UNORM_S8_UINT
    );
  }

  #[test]
  fn render_targets_can_be_blitted() {
    let usage = render_target_usage(vk::Format::R16G16B16A16_SFLOAT);
    assert!(usage.contains(vk::ImageUsageFlags::COLOR_ATTACHMENT));
    assert!(usage.contains(vk::ImageUsageFlags::TRANSFER_SRC | vk::ImageUsageFlags::TRANSFER_DST));

    let usage = render_target_usage(vk::Format::D24_UNORM_S8_UINT);
    assert!(usage.contains(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT));
    assert!(!usage.contains(vk::ImageUsageFlags::COLOR_ATTACHMENT));
  }
}

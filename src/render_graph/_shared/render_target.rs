/// Pixel formats used by the passes. Each host maps these to its native formats.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TextureFormat {
  /// Host's default HDR color format (half float RGBA)
  DefaultHDR,
  /// Full float RGBA, used for geometry buffer
  ARGBFloat,
  Depth24Stencil8,
}

impl TextureFormat {
  pub fn is_depth_stencil(&self) -> bool {
    *self == TextureFormat::Depth24Stencil8
  }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum FilterMode {
  Point,
  Bilinear,
}

/// Size and format of a render target.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct RenderTargetDesc {
  pub width: u32,
  pub height: u32,
  pub format: TextureFormat,
  pub msaa_samples: u32,
  /// 0 means no dedicated depth buffer
  pub depth_buffer_bits: u32,
  pub use_mipmap: bool,
  pub auto_generate_mips: bool,
  pub filter: FilterMode,
}

impl RenderTargetDesc {
  /// Derive offscreen target from the camera target.
  /// Always single sampled, size divided by the downsample factors.
  pub fn derive(
    camera_desc: &RenderTargetDesc,
    downsample_width: u32,
    downsample_height: u32,
    format: TextureFormat,
    depth_buffer_bits: u32,
    use_mipmap: bool,
    auto_generate_mips: bool,
    filter: FilterMode,
  ) -> RenderTargetDesc {
    assert!(
      downsample_width > 0 && downsample_height > 0,
      "Render target downsample factors must be positive, got {}x{}",
      downsample_width,
      downsample_height
    );

    RenderTargetDesc {
      width: (camera_desc.width / downsample_width).max(1),
      height: (camera_desc.height / downsample_height).max(1),
      format,
      msaa_samples: 1,
      depth_buffer_bits,
      use_mipmap,
      auto_generate_mips,
      filter,
    }
  }

  pub fn pixel_count(&self) -> usize {
    (self.width as usize) * (self.height as usize)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn camera_desc() -> RenderTargetDesc {
    RenderTargetDesc {
      width: 1920,
      height: 1080,
      format: TextureFormat::DefaultHDR,
      msaa_samples: 4,
      depth_buffer_bits: 24,
      use_mipmap: false,
      auto_generate_mips: false,
      filter: FilterMode::Bilinear,
    }
  }

  #[test]
  fn derived_target_is_single_sampled_without_depth() {
    let desc = RenderTargetDesc::derive(
      &camera_desc(),
      1,
      1,
      TextureFormat::DefaultHDR,
      0,
      true,
      true,
      FilterMode::Point,
    );
    assert_eq!(desc.width, 1920);
    assert_eq!(desc.height, 1080);
    assert_eq!(desc.msaa_samples, 1);
    assert_eq!(desc.depth_buffer_bits, 0);
    assert_eq!(desc.filter, FilterMode::Point);
    assert!(desc.use_mipmap && desc.auto_generate_mips);
  }

  #[test]
  fn derived_target_applies_downsample() {
    let desc = RenderTargetDesc::derive(
      &camera_desc(),
      2,
      4,
      TextureFormat::ARGBFloat,
      0,
      false,
      false,
      FilterMode::Point,
    );
    assert_eq!((desc.width, desc.height), (960, 270));
    assert_eq!(desc.format, TextureFormat::ARGBFloat);
  }

  #[test]
  #[should_panic(expected = "downsample factors")]
  fn zero_downsample_is_fatal() {
    RenderTargetDesc::derive(
      &camera_desc(),
      0,
      1,
      TextureFormat::DefaultHDR,
      0,
      false,
      false,
      FilterMode::Point,
    );
  }
}

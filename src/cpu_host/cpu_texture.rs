use glam::{Vec2, Vec4};

use crate::render_graph::RenderTargetDesc;

enum CpuTextureData {
  Color(Vec<Vec4>),
  DepthStencil { depth: Vec<f32>, stencil: Vec<u8> },
}

/// Texture in system memory. Color formats are stored as `f32` RGBA regardless
/// of the requested precision. Depth is device depth in `[0, 1]`, 1 is the far plane.
pub struct CpuTexture {
  name: String,
  desc: RenderTargetDesc,
  data: CpuTextureData,
}

impl CpuTexture {
  pub const CLEAR_DEPTH: f32 = 1.0;

  pub fn new(name: &str, desc: &RenderTargetDesc) -> CpuTexture {
    assert!(
      desc.width > 0 && desc.height > 0,
      "Texture '{}' has invalid size {}x{}",
      name,
      desc.width,
      desc.height
    );
    let pixel_count = desc.pixel_count();
    let data = if desc.format.is_depth_stencil() {
      CpuTextureData::DepthStencil {
        depth: vec![Self::CLEAR_DEPTH; pixel_count],
        stencil: vec![0; pixel_count],
      }
    } else {
      CpuTextureData::Color(vec![Vec4::ZERO; pixel_count])
    };

    CpuTexture {
      name: create_texture_name(name, desc),
      desc: *desc,
      data,
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn desc(&self) -> &RenderTargetDesc {
    &self.desc
  }

  pub fn width(&self) -> u32 {
    self.desc.width
  }

  pub fn height(&self) -> u32 {
    self.desc.height
  }

  pub fn is_depth_stencil(&self) -> bool {
    matches!(self.data, CpuTextureData::DepthStencil { .. })
  }

  fn texel_index(&self, x: u32, y: u32) -> usize {
    assert!(
      x < self.desc.width && y < self.desc.height,
      "Texel ({}, {}) outside of {}",
      x,
      y,
      self.name
    );
    (y as usize) * (self.desc.width as usize) + (x as usize)
  }

  /// Nearest texel for `uv`, clamped to edge.
  pub fn texel_at_uv(&self, uv: Vec2) -> (u32, u32) {
    let to_texel = |coord: f32, size: u32| -> u32 {
      let texel = (coord * size as f32).floor();
      if texel.is_nan() {
        0
      } else {
        texel.clamp(0.0, (size - 1) as f32) as u32
      }
    };
    (
      to_texel(uv.x, self.desc.width),
      to_texel(uv.y, self.desc.height),
    )
  }

  /// Center of the texel in `[0, 1]` uv space
  pub fn texel_center_uv(&self, x: u32, y: u32) -> Vec2 {
    Vec2::new(
      (x as f32 + 0.5) / self.desc.width as f32,
      (y as f32 + 0.5) / self.desc.height as f32,
    )
  }

  pub fn color_texels(&self) -> &[Vec4] {
    match &self.data {
      CpuTextureData::Color(texels) => texels,
      _ => panic!("Tried to read color from depth/stencil {}", self.name),
    }
  }

  fn color_texels_mut(&mut self) -> &mut [Vec4] {
    match &mut self.data {
      CpuTextureData::Color(texels) => texels,
      _ => panic!("Tried to write color to depth/stencil {}", self.name),
    }
  }

  pub fn color(&self, x: u32, y: u32) -> Vec4 {
    let idx = self.texel_index(x, y);
    self.color_texels()[idx]
  }

  pub fn set_color(&mut self, x: u32, y: u32, color: Vec4) {
    let idx = self.texel_index(x, y);
    self.color_texels_mut()[idx] = color;
  }

  pub fn fill_color(&mut self, color: Vec4) {
    self
      .color_texels_mut()
      .iter_mut()
      .for_each(|texel| *texel = color);
  }

  /// Overwrite every texel. `texels` has to match texture size
  pub fn write_color_texels(&mut self, texels: &[Vec4]) {
    let name = self.name.clone();
    let dst = self.color_texels_mut();
    assert_eq!(
      dst.len(),
      texels.len(),
      "Texel count mismatch when writing {}",
      name
    );
    dst.copy_from_slice(texels);
  }

  pub fn sample_point(&self, uv: Vec2) -> Vec4 {
    let (x, y) = self.texel_at_uv(uv);
    self.color(x, y)
  }

  pub fn depth(&self, x: u32, y: u32) -> f32 {
    let idx = self.texel_index(x, y);
    match &self.data {
      CpuTextureData::DepthStencil { depth, .. } => depth[idx],
      _ => panic!("Tried to read depth from color {}", self.name),
    }
  }

  pub fn stencil(&self, x: u32, y: u32) -> u8 {
    let idx = self.texel_index(x, y);
    match &self.data {
      CpuTextureData::DepthStencil { stencil, .. } => stencil[idx],
      _ => panic!("Tried to read stencil from color {}", self.name),
    }
  }

  pub fn set_depth_stencil(&mut self, x: u32, y: u32, depth_value: f32, stencil_value: u8) {
    let idx = self.texel_index(x, y);
    match &mut self.data {
      CpuTextureData::DepthStencil { depth, stencil } => {
        depth[idx] = depth_value;
        stencil[idx] = stencil_value;
      }
      _ => panic!("Tried to write depth/stencil to color {}", self.name),
    }
  }

  pub fn clear_depth_stencil(&mut self, depth_value: f32, stencil_value: u8) {
    match &mut self.data {
      CpuTextureData::DepthStencil { depth, stencil } => {
        depth.iter_mut().for_each(|d| *d = depth_value);
        stencil.iter_mut().for_each(|s| *s = stencil_value);
      }
      _ => panic!("Tried to clear depth/stencil of color {}", self.name),
    }
  }

  pub fn sample_depth(&self, uv: Vec2) -> f32 {
    let (x, y) = self.texel_at_uv(uv);
    self.depth(x, y)
  }

  pub fn sample_stencil(&self, uv: Vec2) -> u8 {
    let (x, y) = self.texel_at_uv(uv);
    self.stencil(x, y)
  }

  /// Point-filtered copy, resamples if sizes differ.
  pub fn copy_from(&mut self, source: &CpuTexture) {
    if source.desc.width == self.desc.width && source.desc.height == self.desc.height {
      self.write_color_texels(source.color_texels());
      return;
    }

    let (w, h) = (self.desc.width, self.desc.height);
    let texels: Vec<Vec4> = (0..h)
      .flat_map(|y| (0..w).map(move |x| (x, y)))
      .map(|(x, y)| source.sample_point(self.texel_center_uv(x, y)))
      .collect();
    self.write_color_texels(&texels);
  }
}

fn create_texture_name(name: &str, desc: &RenderTargetDesc) -> String {
  format!(
    "CpuTexture({}, {}x{}, {:?})",
    name, desc.width, desc.height, desc.format
  )
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::render_graph::{FilterMode, TextureFormat};
  use glam::{vec2, vec4};

  fn desc(width: u32, height: u32, format: TextureFormat) -> RenderTargetDesc {
    RenderTargetDesc {
      width,
      height,
      format,
      msaa_samples: 1,
      depth_buffer_bits: 0,
      use_mipmap: false,
      auto_generate_mips: false,
      filter: FilterMode::Point,
    }
  }

  #[test]
  fn color_texture_starts_transparent_black() {
    let tex = CpuTexture::new("c", &desc(3, 2, TextureFormat::DefaultHDR));
    assert!(tex.color_texels().iter().all(|c| *c == Vec4::ZERO));
    assert!(!tex.is_depth_stencil());
  }

  #[test]
  fn depth_texture_starts_at_far_plane() {
    let tex = CpuTexture::new("d", &desc(3, 2, TextureFormat::Depth24Stencil8));
    assert!(tex.is_depth_stencil());
    assert_eq!(tex.depth(2, 1), CpuTexture::CLEAR_DEPTH);
    assert_eq!(tex.stencil(0, 0), 0);
  }

  #[test]
  fn uv_lookup_clamps_to_edge() {
    let mut tex = CpuTexture::new("c", &desc(4, 4, TextureFormat::DefaultHDR));
    tex.set_color(3, 0, vec4(1.0, 2.0, 3.0, 4.0));
    assert_eq!(tex.texel_at_uv(vec2(1.7, -0.3)), (3, 0));
    assert_eq!(tex.sample_point(vec2(5.0, -5.0)), vec4(1.0, 2.0, 3.0, 4.0));
    assert_eq!(tex.texel_at_uv(tex.texel_center_uv(2, 1)), (2, 1));
  }

  #[test]
  fn copy_resamples_different_size() {
    let mut src = CpuTexture::new("src", &desc(2, 1, TextureFormat::DefaultHDR));
    src.set_color(0, 0, Vec4::ONE);
    let mut dst = CpuTexture::new("dst", &desc(4, 2, TextureFormat::DefaultHDR));
    dst.copy_from(&src);
    assert_eq!(dst.color(1, 1), Vec4::ONE);
    assert_eq!(dst.color(2, 0), Vec4::ZERO);
  }

  #[test]
  #[should_panic(expected = "depth/stencil")]
  fn reading_color_from_depth_is_fatal() {
    let tex = CpuTexture::new("d", &desc(1, 1, TextureFormat::Depth24Stencil8));
    tex.color(0, 0);
  }
}

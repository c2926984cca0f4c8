use glam::{vec3, Vec3, Vec4};

/// Convert u8 [0..255) into float
pub fn color_u8_to_float(col_u8: u8) -> f32 {
  (col_u8 as f32) / 255.0
}

/// Convert u8 [0..255) into float vector
pub fn color_hex_to_vec(c0: u8, c1: u8, c2: u8) -> Vec3 {
  vec3(
    color_u8_to_float(c0),
    color_u8_to_float(c1),
    color_u8_to_float(c2),
  )
}

/// https://registry.khronos.org/OpenGL-Refpages/gl4/html/mix.xhtml
pub fn lerp_f32(min: f32, max: f32, weight: f32) -> f32 {
  min + (max - min) * weight
}

/// https://registry.khronos.org/OpenGL-Refpages/gl4/html/clamp.xhtml
pub fn saturate(v: f32) -> f32 {
  v.clamp(0.0, 1.0)
}

/// Clamp each of the first 3 components into [0, 1]
pub fn saturate_vec3(v: Vec3) -> Vec3 {
  v.clamp(Vec3::ZERO, Vec3::ONE)
}

pub fn vec3_to_pretty_str(v: Vec3) -> String {
  format!("[{:.3}, {:.3}, {:.3}]", v.x, v.y, v.z)
}

pub fn vec4_to_pretty_str(v: Vec4) -> String {
  format!("[{:.4}, {:.4}, {:.4}, {:.4}]", v.x, v.y, v.z, v.w)
}

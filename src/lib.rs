//! Separable screen-space subsurface scattering.
//!
//! * `sss_kernel` - builds the per-channel blur kernel from the artist's colors.
//! * `render_graph` - passes that allocate scratch targets and record the blur
//!   into a `RenderHost`.
//! * `cpu_host` / `vk_host` - hosts that execute what the passes recorded.
//! * `vk_init` - headless Vulkan device for running `vk_host` without a window.

pub mod config;
pub mod cpu_host;
pub mod render_graph;
pub mod scene;
pub mod sss_kernel;
pub mod utils;
pub mod vk_host;
pub mod vk_init;
pub mod vk_utils;

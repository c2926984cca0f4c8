// mostly inspired by:
// - https://github.com/zeux/niagara/tree/master/src
// - https://github.com/MaikKlein/ash/blob/master/examples/src/lib.rs#L256
mod debug;
mod pipeline;
mod render_pass;
mod sampler;
mod shaders;
mod uniforms;
mod vk_buffer;
mod vk_texture;
mod vk_texture_sync;

pub use self::debug::*;
pub use self::pipeline::*;
pub use self::render_pass::*;
pub use self::sampler::*;
pub use self::shaders::*;
pub use self::uniforms::*;
pub use self::vk_buffer::*;
pub use self::vk_texture::*;
pub use self::vk_texture_sync::*;

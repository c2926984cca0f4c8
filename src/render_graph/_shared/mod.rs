mod pass_exec_context;
mod render_host;
mod render_target;
mod sss_blur_ubo;

pub use self::pass_exec_context::*;
pub use self::render_host::*;
pub use self::render_target::*;
pub use self::sss_blur_ubo::*;

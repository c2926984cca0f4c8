use glam::{vec3, Vec3};
use log::info;
use std::path::PathBuf;

use ash::vk;

use rs_ssss::config::Config;
use rs_ssss::cpu_host::CpuRenderHost;
use rs_ssss::render_graph::{PassExecContext, RenderGraph};
use rs_ssss::scene::Camera;
use rs_ssss::sss_kernel::compute_kernel;
use rs_ssss::utils::{color_hex_to_vec, vec3_to_pretty_str};
use rs_ssss::vk_host::{VkHostCreateInfo, VkRenderHost, VkSceneDrawContext};
use rs_ssss::vk_init::{VkCameraTargets, VkHeadlessCtx};

/// Radius of the skin disc, fraction of the smaller window side
const DISC_RADIUS: f32 = 0.3;

// cargo run -- --vulkan --shaders=assets/shaders --validation
// Without `--vulkan` everything runs on the CPU host.

fn main() {
  simple_logger::SimpleLogger::new().init().unwrap();
  log::set_max_level(log::LevelFilter::Info);
  info!("-- Start --");

  let args: Vec<String> = std::env::args().skip(1).collect();
  let mut config = Config::new();
  config.window_width = 320;
  config.window_height = 240;

  log_kernel(&config);

  if args.iter().any(|a| a == "--vulkan") {
    let shader_dir = args
      .iter()
      .find_map(|a| a.strip_prefix("--shaders="))
      .map(PathBuf::from)
      .unwrap_or_else(|| PathBuf::from("assets/shaders"));
    let graphics_debugging = args.iter().any(|a| a == "--validation");
    run_vulkan(&config, shader_dir, graphics_debugging);
  } else {
    run_cpu(&config);
  }

  info!("-- Done --");
}

fn log_kernel(config: &Config) {
  let cfg = config.sss_blur.sanitized();
  let kernel = compute_kernel(
    cfg.kernel_samples,
    cfg.subsurface_color_rgb(),
    cfg.subsurface_falloff,
  );
  info!(
    "SSS kernel: {} samples, center {}, scattered {}, total {}",
    kernel.len(),
    vec3_to_pretty_str(kernel.center().weight),
    vec3_to_pretty_str(kernel.scattered_weight()),
    vec3_to_pretty_str(kernel.total_weight())
  );
}

fn skin_albedo() -> Vec3 {
  color_hex_to_vec(224, 172, 150)
}

////////////////////////////////
// CPU
////////////////////////////////

fn run_cpu(config: &Config) {
  let camera = Camera::new(&config.camera, config.aspect_ratio());
  let scene_view_camera = Camera::scene_view(&config.camera, config.aspect_ratio());

  // init renderer
  let mut host = CpuRenderHost::new(config.camera_target_desc());
  let mut render_graph = RenderGraph::with_default_passes(&mut host, config);
  render_graph.setup(host.renderer_targets());
  info!("Render init went OK!");

  // main camera
  draw_synthetic_frame(&mut host, config, &camera);
  let before = skin_energy(&host, config);
  render_graph.render_camera(&mut host, &PassExecContext::new(config, &camera));
  let after = skin_energy(&host, config);
  info!(
    "Main camera: skin energy {} -> {}",
    vec3_to_pretty_str(before),
    vec3_to_pretty_str(after)
  );

  // scene view camera, post-processing is skipped
  draw_synthetic_frame(&mut host, config, &scene_view_camera);
  let before = skin_energy(&host, config);
  render_graph.render_camera(
    &mut host,
    &PassExecContext::new(config, &scene_view_camera),
  );
  let after = skin_energy(&host, config);
  info!(
    "Scene view camera: skin energy {} -> {}",
    vec3_to_pretty_str(before),
    vec3_to_pretty_str(after)
  );

  info!("Live textures after frame: {}", host.live_texture_count());
}

/// Lit sphere with the skin stencil over a flat background.
fn draw_synthetic_frame(host: &mut CpuRenderHost, config: &Config, camera: &Camera) {
  let (w, h) = (config.window_width, config.window_height);
  let center = (w as f32 * 0.5, h as f32 * 0.5);
  let radius = DISC_RADIUS * (w.min(h) as f32);
  let light_dir = vec3(-0.5, 0.6, 0.6).normalize();
  let to_camera = (config.camera.position - config.camera.target).normalize();

  host.camera_color_mut().fill_color(config.clear_color.extend(1.0));
  host.camera_depth_stencil_mut().clear_depth_stencil(1.0, 0);

  for y in 0..h {
    for x in 0..w {
      let dx = (x as f32 + 0.5 - center.0) / radius;
      let dy = (center.1 - y as f32 - 0.5) / radius;
      let r2 = dx * dx + dy * dy;
      if r2 >= 1.0 {
        continue;
      }

      let normal = vec3(dx, dy, (1.0 - r2).sqrt());
      let n_dot_l = normal.dot(light_dir).max(0.0);
      // hard terminator, so the blur has something to soften
      let lit = if n_dot_l > 0.2 { 0.15 + n_dot_l } else { 0.15 };
      let color: Vec3 = skin_albedo() * lit;

      let surface = config.camera.target + to_camera * (normal.z * 0.5);
      host.camera_color_mut().set_color(x, y, color.extend(1.0));
      host.camera_depth_stencil_mut().set_depth_stencil(
        x,
        y,
        camera.device_depth(surface),
        Config::STENCIL_BIT_SKIN,
      );
    }
  }
}

fn skin_energy(host: &CpuRenderHost, config: &Config) -> Vec3 {
  let depth_id = host.renderer_targets().camera_depth_stencil;
  let depth = match host.texture(depth_id) {
    Some(t) => t,
    None => return Vec3::ZERO,
  };
  let color = host.camera_color();

  let mut energy = Vec3::ZERO;
  for y in 0..config.window_height {
    for x in 0..config.window_width {
      if depth.stencil(x, y) == Config::STENCIL_BIT_SKIN {
        energy += color.color(x, y).truncate();
      }
    }
  }
  energy
}

////////////////////////////////
// Vulkan
////////////////////////////////

/// Middle of the screen, `DISC_RADIUS` from the center
fn skin_rect(config: &Config) -> vk::Rect2D {
  let (w, h) = (config.window_width, config.window_height);
  let half = (DISC_RADIUS * w.min(h) as f32) as u32;
  vk::Rect2D {
    offset: vk::Offset2D {
      x: (w / 2).saturating_sub(half) as i32,
      y: (h / 2).saturating_sub(half) as i32,
    },
    extent: vk::Extent2D {
      width: (2 * half).min(w),
      height: (2 * half).min(h),
    },
  }
}

/// One offscreen frame through `VkRenderHost`. Camera color is skin colored,
/// the scene renderer tags a rect in the middle with the skin stencil value.
fn run_vulkan(config: &Config, shader_dir: PathBuf, graphics_debugging: bool) {
  let ctx = VkHeadlessCtx::new(graphics_debugging);
  let mut host = VkRenderHost::new(VkHostCreateInfo {
    instance: ctx.instance.clone(),
    physical_device: ctx.physical_device,
    device: ctx.device.clone(),
    allocator: ctx.allocator.clone(),
    debug_utils: ctx.debug_utils_loader(),
    shader_dir,
  });
  host.set_profiler_enabled(true);

  let mut targets = VkCameraTargets::new(&ctx, config);
  let skin = skin_albedo().extend(1.0).to_array();
  ctx.with_setup_cb(|device, command_buffer| targets.cmd_clear(device, command_buffer, skin));
  let (camera_color, camera_depth_stencil) = targets.import_into(&mut host);

  let camera = Camera::new(&config.camera, config.aspect_ratio());
  let skin_depth = camera.device_depth(config.camera.target);
  let rect = skin_rect(config);
  host.register_scene_material(&config.gbuffer.shader_name);
  host.set_scene_renderer(Box::new(move |draw: &VkSceneDrawContext| {
    let attachment = vk::ClearAttachment {
      aspect_mask: vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL,
      color_attachment: 0,
      clear_value: vk::ClearValue {
        depth_stencil: vk::ClearDepthStencilValue {
          depth: skin_depth,
          stencil: Config::STENCIL_BIT_SKIN as u32,
        },
      },
    };
    let clear_rect = vk::ClearRect {
      rect,
      base_array_layer: 0,
      layer_count: 1,
    };
    unsafe {
      draw
        .device
        .cmd_clear_attachments(draw.command_buffer, &[attachment], &[clear_rect]);
    }
  }));

  let mut render_graph = RenderGraph::with_default_passes(&mut host, config);
  render_graph.setup(host.renderer_targets());
  info!("Render init went OK!");

  let command_buffer = ctx.begin_commands();
  host.begin_frame(command_buffer);
  render_graph.render_camera(&mut host, &PassExecContext::new(config, &camera));
  host.end_frame();
  ctx.submit_and_wait();
  host.on_frame_completed();

  if let Some(report) = host.last_profiler_report() {
    report
      .iter()
      .for_each(|(name, ms)| info!("GPU '{}': {:.3}ms", name, ms));
  }
  info!(
    "Camera targets end in {:?} / {:?}",
    host.texture_layout(camera_color),
    host.texture_layout(camera_depth_stencil)
  );

  unsafe {
    host.destroy();
    drop(host);
    targets.delete(&ctx.device, &ctx.allocator);
    ctx.destroy();
  }
}

use ash::vk;
use log::trace;

/// Name of the scope and timing in milliseconds.
pub type TimesScope = (String, f32);
/// List of scopes and their times, in the order they were opened
pub type GpuProfilerReport = Vec<TimesScope>;

/// Big amount of queries to never have to carry about it
const MAX_SCOPE_COUNT: u32 = 256;
/// Each scope has BEGIN and END timestamp query
const QUERIES_PER_SCOPE: u32 = 2;
const TOTAL_MAX_QUERIES: u32 = MAX_SCOPE_COUNT * QUERIES_PER_SCOPE;

/// Scope names waiting for their `end_scope`. Scopes nest, so the last one opened
/// has to be the first closed.
#[derive(Debug, Default)]
pub struct ScopeStack {
  /// All scopes of the frame, index is the query id
  names: Vec<String>,
  open: Vec<u32>,
}

impl ScopeStack {
  pub fn clear(&mut self) {
    self.names.clear();
    self.open.clear();
  }

  /// `None` if there are no free queries left
  pub fn push(&mut self, name: &str) -> Option<u32> {
    if self.names.len() as u32 >= MAX_SCOPE_COUNT {
      return None;
    }
    let scope_id = self.names.len() as u32;
    self.names.push(name.to_string());
    self.open.push(scope_id);
    Some(scope_id)
  }

  /// Close the innermost scope. `Ok(None)` if it was opened past the query limit.
  pub fn pop(&mut self, name: &str) -> Result<Option<u32>, String> {
    let open_name = self.innermost_open_name();
    match open_name {
      Some(open) if open == name => (),
      Some(open) => return Err(format!("innermost open scope is '{}'", open)),
      // past the limit nothing was pushed, nothing to pop
      None if self.names.len() as u32 >= MAX_SCOPE_COUNT => return Ok(None),
      None => return Err("no scope is open".to_string()),
    }
    Ok(self.open.pop())
  }

  fn innermost_open_name(&self) -> Option<&str> {
    self
      .open
      .last()
      .map(|scope_id| self.names[*scope_id as usize].as_str())
  }

  pub fn is_balanced(&self) -> bool {
    self.open.is_empty()
  }

  pub fn names(&self) -> &[String] {
    &self.names
  }
}

/// ### Docs
/// - https://nikitablack.github.io/post/how_to_use_vulkan_timestamp_queries/ <- very good!
/// - https://docs.vulkan.org/spec/latest/chapters/queries.html#queries-timestamps
pub struct GpuProfiler {
  enabled: bool,
  /// Nanoseconds per timestamp tick
  timestamp_period: f32,
  query_pool: vk::QueryPool,
  scopes: ScopeStack,
  pub last_report: Option<GpuProfilerReport>,
}

impl GpuProfiler {
  pub fn new(device: &ash::Device, timestamp_period: f32) -> Self {
    let pool_info = vk::QueryPoolCreateInfo::builder()
      .query_type(vk::QueryType::TIMESTAMP)
      .query_count(TOTAL_MAX_QUERIES);
    let query_pool = unsafe {
      device
        .create_query_pool(&pool_info, None)
        .expect("Failed to create query pool")
    };

    Self {
      enabled: false,
      timestamp_period,
      query_pool,
      scopes: ScopeStack::default(),
      last_report: None,
    }
  }

  pub unsafe fn destroy(&mut self, device: &ash::Device) {
    device.destroy_query_pool(self.query_pool, None);
  }

  pub fn set_enabled(&mut self, enabled: bool) {
    self.enabled = enabled
  }

  /// Has to be recorded outside of render pass
  pub fn begin_frame(&mut self, device: &ash::Device, command_buffer: vk::CommandBuffer) {
    self.scopes.clear();

    if self.enabled {
      unsafe {
        device.cmd_reset_query_pool(command_buffer, self.query_pool, 0, TOTAL_MAX_QUERIES);
      }
    }
  }

  /// Read the timestamps. Call only after the frame's command buffer finished executing.
  pub fn end_frame(&mut self, device: &ash::Device) {
    if !self.scopes.is_balanced() {
      panic!(
        "GpuProfiler: frame ended with open scopes, all scopes: {:?}",
        self.scopes.names()
      );
    }
    if self.enabled {
      self.last_report = self.create_queries_report(device);
    }
  }

  pub fn begin_scope(&mut self, device: &ash::Device, command_buffer: vk::CommandBuffer, name: &str) {
    // scopes are tracked even when disabled, so mismatched pairs are always caught
    let Some(scope_id) = self.scopes.push(name) else {
      return;
    };
    if self.enabled {
      self.write_timestamp(device, command_buffer, scope_id * QUERIES_PER_SCOPE);
    }
  }

  pub fn end_scope(&mut self, device: &ash::Device, command_buffer: vk::CommandBuffer, name: &str) {
    let scope_id = match self.scopes.pop(name) {
      Ok(Some(scope_id)) => scope_id,
      Ok(None) => return,
      Err(msg) => panic!("GpuProfiler: end_scope('{}') failed, {}", name, msg),
    };
    if self.enabled {
      self.write_timestamp(device, command_buffer, scope_id * QUERIES_PER_SCOPE + 1);
    }
  }

  fn write_timestamp(&self, device: &ash::Device, command_buffer: vk::CommandBuffer, query: u32) {
    unsafe {
      device.cmd_write_timestamp(
        command_buffer,
        vk::PipelineStageFlags::BOTTOM_OF_PIPE,
        self.query_pool,
        query,
      );
    }
  }

  fn create_queries_report(&self, device: &ash::Device) -> Option<GpuProfilerReport> {
    let names = self.scopes.names();
    if names.is_empty() {
      trace!("No profiling scopes added to the frame");
      return None;
    }

    trace!("Reading profiling result for {:?}", names);
    let query_count = names.len() as u32 * QUERIES_PER_SCOPE;
    let mut timestamps: Vec<u64> = vec![0u64; query_count as usize];
    unsafe {
      device
        .get_query_pool_results(
          self.query_pool,
          0,
          query_count,
          timestamps.as_mut_slice(),
          vk::QueryResultFlags::TYPE_64 | vk::QueryResultFlags::WAIT,
        )
        .expect("Failed to get profiler results")
    };

    let report: GpuProfilerReport = names
      .iter()
      .enumerate()
      .map(|(scope_idx, name)| {
        let base_query = scope_idx * (QUERIES_PER_SCOPE as usize);
        let ticks = timestamps[base_query + 1].saturating_sub(timestamps[base_query]);
        let duration_ms = (ticks as f32) * self.timestamp_period * 0.000001;
        trace!("'{}' took {:.2}ms", name, duration_ms);
        (name.clone(), duration_ms)
      })
      .collect();

    Some(report)
  }
}

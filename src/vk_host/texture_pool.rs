use std::collections::HashMap;

use crate::render_graph::RenderTargetDesc;

/// Released render targets, kept for the next `get_temporary_rt` with the same descriptor.
pub struct TexturePool<T> {
  free: HashMap<RenderTargetDesc, Vec<T>>,
}

impl<T> TexturePool<T> {
  pub fn new() -> Self {
    Self {
      free: HashMap::new(),
    }
  }

  pub fn acquire(&mut self, desc: &RenderTargetDesc) -> Option<T> {
    self.free.get_mut(desc).and_then(|textures| textures.pop())
  }

  pub fn release(&mut self, desc: RenderTargetDesc, texture: T) {
    self.free.entry(desc).or_insert_with(Vec::new).push(texture);
  }

  pub fn len(&self) -> usize {
    self.free.values().map(|textures| textures.len()).sum()
  }

  /// Empty the pool, e.g. after resize when old sizes are never requested again.
  pub fn drain(&mut self) -> Vec<T> {
    self.free.drain().flat_map(|(_, textures)| textures).collect()
  }
}

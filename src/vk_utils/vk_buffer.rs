use ash::vk;
use bytemuck::Pod;
use vma::Alloc;

use super::align_uniform_offset;

// https://gpuopen-librariesandsdks.github.io/VulkanMemoryAllocator/html/usage_patterns.html

/// Host-visible buffer, mapped for its whole lifetime.
pub struct VkBuffer {
  // For debugging
  name: String,
  /// Size in bytes
  pub size: usize,
  pub buffer: vk::Buffer,
  allocation: vma::Allocation,
  mapped_pointer: *mut u8,
}

impl VkBuffer {
  pub fn mapped(
    name: &str,
    size: usize,
    usage: vk::BufferUsageFlags,
    allocator: &vma::Allocator,
  ) -> Self {
    let buffer_info = vk::BufferCreateInfo::builder()
      .size(size as u64)
      .usage(usage)
      .sharing_mode(vk::SharingMode::EXCLUSIVE);

    let alloc_info = vma::AllocationCreateInfo {
      usage: vma::MemoryUsage::Auto,
      flags: vma::AllocationCreateFlags::HOST_ACCESS_SEQUENTIAL_WRITE
        | vma::AllocationCreateFlags::MAPPED,
      required_flags: vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
      ..Default::default()
    };

    let (buffer, allocation) = unsafe {
      allocator
        .create_buffer(&buffer_info, &alloc_info)
        .unwrap_or_else(|e| panic!("Failed allocating buffer '{}' ({} bytes): {}", name, size, e))
    };

    let mapped_pointer = allocator.get_allocation_info(&allocation).mapped_data as *mut u8;
    if mapped_pointer.is_null() {
      panic!("Buffer '{}' was not mapped", name);
    }

    Self {
      name: name.to_string(),
      size,
      buffer,
      allocation,
      mapped_pointer,
    }
  }

  /// Copy `bytes` into the buffer, starting at `offset` bytes.
  pub fn write_to_mapped(&self, offset: usize, bytes: &[u8]) {
    let size = bytes.len();
    if offset + size > self.size {
      panic!(
        "Tried to write {} bytes at offset {} to buffer '{}' ({} bytes)",
        size, offset, self.name, self.size
      )
    }

    let slice = unsafe { std::slice::from_raw_parts_mut(self.mapped_pointer.add(offset), size) };
    slice.copy_from_slice(bytes);
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub unsafe fn delete(&mut self, allocator: &vma::Allocator) {
    allocator.destroy_buffer(self.buffer, &mut self.allocation)
  }
}

/// Fixed count of uniform blocks, each aligned for dynamic binding.
/// Written front to back during the frame, rewound when the frame starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformSlots {
  /// Bytes between two blocks
  pub stride: u64,
  pub capacity: usize,
  used: usize,
}

impl UniformSlots {
  pub fn new(block_size: u64, min_alignment: u64, capacity: usize) -> Self {
    Self {
      stride: align_uniform_offset(block_size, min_alignment),
      capacity,
      used: 0,
    }
  }

  pub fn total_size(&self) -> usize {
    self.stride as usize * self.capacity
  }

  /// Offset of the next free block. `None` when the frame used all of them.
  pub fn next_offset(&mut self) -> Option<u64> {
    if self.used >= self.capacity {
      return None;
    }
    let offset = self.used as u64 * self.stride;
    self.used += 1;
    Some(offset)
  }

  pub fn rewind(&mut self) {
    self.used = 0;
  }
}

/// Per-frame uniform blocks in a single mapped buffer.
pub struct VkUniformRing {
  pub buffer: VkBuffer,
  slots: UniformSlots,
}

impl VkUniformRing {
  pub fn new<T: Pod>(
    name: &str,
    capacity: usize,
    min_alignment: u64,
    allocator: &vma::Allocator,
  ) -> Self {
    let slots = UniformSlots::new(std::mem::size_of::<T>() as u64, min_alignment, capacity);
    let buffer = VkBuffer::mapped(
      name,
      slots.total_size(),
      vk::BufferUsageFlags::UNIFORM_BUFFER,
      allocator,
    );
    Self { buffer, slots }
  }

  /// Copy `value` into the next free block and return its offset.
  pub fn push<T: Pod>(&mut self, value: &T) -> u64 {
    let offset = match self.slots.next_offset() {
      Some(offset) => offset,
      None => panic!(
        "Uniform ring '{}' is full, {} writes per frame",
        self.buffer.name(),
        self.slots.capacity
      ),
    };
    self
      .buffer
      .write_to_mapped(offset as usize, bytemuck::bytes_of(value));
    offset
  }

  pub fn rewind(&mut self) {
    self.slots.rewind();
  }

  /// Bytes visible to a single binding
  pub fn block_range<T: Pod>(&self) -> u64 {
    std::mem::size_of::<T>() as u64
  }

  pub unsafe fn delete(&mut self, allocator: &vma::Allocator) {
    self.buffer.delete(allocator);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn slots_are_aligned_and_bounded() {
    let mut slots = UniformSlots::new(1104, 256, 3);
    assert_eq!(slots.stride, 1280);
    assert_eq!(slots.total_size(), 3840);
    assert_eq!(slots.next_offset(), Some(0));
    assert_eq!(slots.next_offset(), Some(1280));
    assert_eq!(slots.next_offset(), Some(2560));
    assert_eq!(slots.next_offset(), None);

    slots.rewind();
    assert_eq!(slots.next_offset(), Some(0));
  }
}

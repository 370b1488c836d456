//! Shader-visible descriptor heap management.
//!
//! - [`RingBufferAllocator`]: serial-tracked range allocator
//! - [`ShaderVisibleDescriptorAllocator`]: per-device, per-kind heap owner
//!   with generation-based invalidation

pub mod allocator;
pub mod ring_buffer;

pub use allocator::{GpuDescriptorAllocation, ShaderVisibleDescriptorAllocator};
pub use ring_buffer::RingBufferAllocator;

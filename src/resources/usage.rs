//! Frontend usage flags and the per-pass usage sets computed by validation.

use std::sync::Arc;

use bitflags::bitflags;

use super::{Buffer, Texture};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BufferUsage: u32 {
        const MAP_READ = 0x1;
        const MAP_WRITE = 0x2;
        const COPY_SRC = 0x4;
        const COPY_DST = 0x8;
        const INDEX = 0x10;
        const VERTEX = 0x20;
        const UNIFORM = 0x40;
        const STORAGE = 0x80;
        const INDIRECT = 0x100;
        /// Internal usage of read-only storage bindings.
        const READONLY_STORAGE = 0x1000;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TextureUsage: u32 {
        const COPY_SRC = 0x1;
        const COPY_DST = 0x2;
        const SAMPLED = 0x4;
        const STORAGE = 0x8;
        const OUTPUT_ATTACHMENT = 0x10;
        /// Internal usage of read-only storage texture bindings.
        const READONLY_STORAGE = 0x1000;
    }
}

/// Resources touched by one pass and the combined usage of each.
///
/// Produced by frontend validation, consumed once by the replay engine and
/// never mutated here.
#[derive(Debug, Clone, Default)]
pub struct PassResourceUsage {
    pub buffers: Vec<(Arc<Buffer>, BufferUsage)>,
    pub textures: Vec<(Arc<Texture>, TextureUsage)>,
}

impl PassResourceUsage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_buffer(mut self, buffer: &Arc<Buffer>, usage: BufferUsage) -> Self {
        self.buffers.push((Arc::clone(buffer), usage));
        self
    }

    #[must_use]
    pub fn with_texture(mut self, texture: &Arc<Texture>, usage: TextureUsage) -> Self {
        self.textures.push((Arc::clone(texture), usage));
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty() && self.textures.is_empty()
    }
}

/// Usage sets for every pass of a command buffer, in pass order.
#[derive(Debug, Clone, Default)]
pub struct CommandBufferResourceUsage {
    pub per_pass: Vec<PassResourceUsage>,
}

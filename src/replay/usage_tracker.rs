use smallvec::SmallVec;

use crate::native::ResourceBarrier;
use crate::resources::{BufferUsage, PassResourceUsage, TextureUsage};

use super::CommandRecordingContext;

/// Transitions every resource of a pass to its pass-wide usage.
///
/// Textures read by the pass are lazily cleared first. Output attachments
/// are skipped here; the render pass setup clears them through their load
/// op. All transitions are issued in one barrier call.
///
/// Returns whether the pass uses any resource as storage.
pub fn prepare_resources_for_pass(
    ctx: &mut CommandRecordingContext<'_>,
    usages: &PassResourceUsage,
) -> bool {
    let pending_serial = ctx.pending_serial();
    let mut barriers: SmallVec<[ResourceBarrier; 16]> = SmallVec::new();

    let mut buffer_usages = BufferUsage::empty();
    for (buffer, usage) in &usages.buffers {
        if let Some(barrier) = buffer.track_usage_and_get_barrier(*usage, pending_serial) {
            barriers.push(barrier);
        }
        buffer_usages |= *usage;
    }

    for (texture, usage) in &usages.textures {
        if !usage.contains(TextureUsage::OUTPUT_ATTACHMENT) {
            texture.ensure_subresource_content_initialized(ctx, texture.full_range());
        }
    }

    let mut texture_usages = TextureUsage::empty();
    for (texture, usage) in &usages.textures {
        if let Some(barrier) = texture.track_usage_and_get_barrier(*usage, pending_serial) {
            barriers.push(barrier);
        }
        texture_usages |= *usage;
    }

    if !barriers.is_empty() {
        log::trace!("Pass prologue: {} barriers", barriers.len());
        ctx.list().resource_barrier(&barriers);
    }

    buffer_usages.contains(BufferUsage::STORAGE) || texture_usages.contains(TextureUsage::STORAGE)
}

//! Textures, texture views and lazy content initialization.
//!
//! A freshly created texture has undefined contents. Each subresource carries
//! an "initialized" flag; any read of an uninitialized subresource is
//! preceded by a clear to zero, so no pass ever observes garbage.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::native::convert::texture_usage_to_states;
use crate::native::{
    ClearMethod, CpuDescriptorHandle, NativeResource, ResourceBarrier, ResourceStates,
    SubresourceRange,
};
use crate::replay::{CommandRecordingContext, Serial};

use super::{ResourceId, TextureUsage};

// ─── Formats & Extents ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    R8Unorm,
    Rgba8Unorm,
    Bgra8Unorm,
    Rgba16Float,
    Rgba32Float,
    Depth32Float,
    Depth24Plus,
    Depth24PlusStencil8,
}

impl TextureFormat {
    #[inline]
    #[must_use]
    pub fn has_depth(self) -> bool {
        matches!(
            self,
            Self::Depth32Float | Self::Depth24Plus | Self::Depth24PlusStencil8
        )
    }

    #[inline]
    #[must_use]
    pub fn has_stencil(self) -> bool {
        matches!(self, Self::Depth24PlusStencil8)
    }

    #[inline]
    #[must_use]
    pub fn has_depth_or_stencil(self) -> bool {
        self.has_depth() || self.has_stencil()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureDimension {
    D1,
    #[default]
    D2,
    D3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent3d {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Origin3d {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

// ─── Texture ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct TextureDescriptor {
    pub dimension: TextureDimension,
    /// For 2D textures `depth` is the array layer count.
    pub size: Extent3d,
    pub format: TextureFormat,
    pub mip_level_count: u32,
    pub sample_count: u32,
    pub usage: TextureUsage,
}

#[derive(Debug)]
struct TextureState {
    last_state: ResourceStates,
    last_used_serial: Serial,
    /// Set when the current state was reached by implicit promotion to a
    /// read-only state; such states decay back to `COMMON` between
    /// submissions.
    valid_to_decay: bool,
    /// Indexed by subresource index.
    initialized: Vec<bool>,
}

#[derive(Debug)]
pub struct Texture {
    id: ResourceId,
    native: NativeResource,
    dimension: TextureDimension,
    size: Extent3d,
    format: TextureFormat,
    mip_level_count: u32,
    array_layer_count: u32,
    sample_count: u32,
    usage: TextureUsage,
    state: Mutex<TextureState>,
}

impl Texture {
    #[must_use]
    pub fn new(native: NativeResource, descriptor: &TextureDescriptor) -> Self {
        let array_layer_count = match descriptor.dimension {
            TextureDimension::D2 => descriptor.size.depth.max(1),
            TextureDimension::D1 | TextureDimension::D3 => 1,
        };
        let mip_level_count = descriptor.mip_level_count.max(1);
        let subresources = (mip_level_count * array_layer_count) as usize;

        Self {
            id: ResourceId::next(),
            native,
            dimension: descriptor.dimension,
            size: descriptor.size,
            format: descriptor.format,
            mip_level_count,
            array_layer_count,
            sample_count: descriptor.sample_count.max(1),
            usage: descriptor.usage,
            state: Mutex::new(TextureState {
                last_state: ResourceStates::COMMON,
                last_used_serial: 0,
                valid_to_decay: false,
                initialized: vec![false; subresources],
            }),
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> ResourceId {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn native(&self) -> NativeResource {
        self.native
    }

    #[inline]
    #[must_use]
    pub fn dimension(&self) -> TextureDimension {
        self.dimension
    }

    #[inline]
    #[must_use]
    pub fn size(&self) -> Extent3d {
        self.size
    }

    #[inline]
    #[must_use]
    pub fn format(&self) -> TextureFormat {
        self.format
    }

    #[inline]
    #[must_use]
    pub fn mip_level_count(&self) -> u32 {
        self.mip_level_count
    }

    #[inline]
    #[must_use]
    pub fn array_layer_count(&self) -> u32 {
        self.array_layer_count
    }

    #[inline]
    #[must_use]
    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    #[inline]
    #[must_use]
    pub fn usage(&self) -> TextureUsage {
        self.usage
    }

    #[must_use]
    pub fn current_state(&self) -> ResourceStates {
        self.state.lock().last_state
    }

    /// Native subresource index of `(mip_level, array_layer)`.
    #[inline]
    #[must_use]
    pub fn subresource_index(&self, mip_level: u32, array_layer: u32) -> u32 {
        mip_level + array_layer * self.mip_level_count
    }

    /// Size of one subresource at `mip_level`, never smaller than one texel.
    #[must_use]
    pub fn mip_size(&self, mip_level: u32) -> Extent3d {
        let depth = match self.dimension {
            TextureDimension::D3 => (self.size.depth >> mip_level).max(1),
            TextureDimension::D1 | TextureDimension::D2 => 1,
        };
        Extent3d {
            width: (self.size.width >> mip_level).max(1),
            height: (self.size.height >> mip_level).max(1),
            depth,
        }
    }

    /// Depth a whole-resource copy must cover.
    #[must_use]
    pub fn copy_depth(&self) -> u32 {
        match self.dimension {
            TextureDimension::D1 => 1,
            TextureDimension::D2 => self.array_layer_count,
            TextureDimension::D3 => self.size.depth,
        }
    }

    // ─── Content Initialization ──────────────────────────────────────────────

    fn subresource_indices(&self, range: SubresourceRange) -> impl Iterator<Item = usize> + '_ {
        (range.base_array_layer..range.base_array_layer + range.layer_count).flat_map(
            move |layer| {
                (range.base_mip_level..range.base_mip_level + range.level_count)
                    .map(move |mip| self.subresource_index(mip, layer) as usize)
            },
        )
    }

    #[must_use]
    pub fn is_subresource_content_initialized(&self, range: SubresourceRange) -> bool {
        let state = self.state.lock();
        self.subresource_indices(range)
            .all(|index| state.initialized.get(index).copied().unwrap_or(false))
    }

    pub fn set_is_subresource_content_initialized(&self, initialized: bool, range: SubresourceRange) {
        let mut state = self.state.lock();
        for index in self.subresource_indices(range) {
            if let Some(flag) = state.initialized.get_mut(index) {
                *flag = initialized;
            }
        }
    }

    /// Clears `range` to zero if any subresource in it is uninitialized.
    ///
    /// Issues exactly one native clear for the whole range.
    pub fn ensure_subresource_content_initialized(
        &self,
        ctx: &mut CommandRecordingContext<'_>,
        range: SubresourceRange,
    ) {
        if self.is_subresource_content_initialized(range) {
            return;
        }

        let method = self.clear_method();
        let clear_state = match method {
            ClearMethod::RenderTarget => ResourceStates::RENDER_TARGET,
            ClearMethod::DepthStencil => ResourceStates::DEPTH_WRITE,
            ClearMethod::Copy => ResourceStates::COPY_DEST,
        };
        self.transition_state_now(ctx, clear_state);

        log::trace!("Lazy clear of texture {:?} ({method:?}) {range:?}", self.id);
        ctx.list().clear_texture(self.native, method, range);

        self.set_is_subresource_content_initialized(true, range);
    }

    /// Full subresource range of the texture.
    #[must_use]
    pub fn full_range(&self) -> SubresourceRange {
        SubresourceRange {
            base_mip_level: 0,
            level_count: self.mip_level_count,
            base_array_layer: 0,
            layer_count: self.array_layer_count,
        }
    }

    fn clear_method(&self) -> ClearMethod {
        if self.format.has_depth_or_stencil() {
            ClearMethod::DepthStencil
        } else if self.usage.contains(TextureUsage::OUTPUT_ATTACHMENT) {
            ClearMethod::RenderTarget
        } else {
            ClearMethod::Copy
        }
    }

    // ─── State Tracking ──────────────────────────────────────────────────────

    /// Records a transition to `new_state` and returns its barrier, if any.
    ///
    /// Non-simultaneous-access textures can only be implicitly promoted from
    /// `COMMON` to copy or shader-resource states.
    pub fn track_state_and_get_barrier(
        &self,
        new_state: ResourceStates,
        pending_serial: Serial,
    ) -> Option<ResourceBarrier> {
        const PROMOTABLE_READS: ResourceStates = ResourceStates::COPY_SOURCE
            .union(ResourceStates::NON_PIXEL_SHADER_RESOURCE)
            .union(ResourceStates::PIXEL_SHADER_RESOURCE);

        let mut state = self.state.lock();

        if pending_serial > state.last_used_serial {
            if state.valid_to_decay {
                state.last_state = ResourceStates::COMMON;
                state.valid_to_decay = false;
            }
            state.last_used_serial = pending_serial;
        }

        let last_state = state.last_state;
        if last_state == ResourceStates::UNORDERED_ACCESS
            && new_state == ResourceStates::UNORDERED_ACCESS
        {
            return Some(ResourceBarrier::Uav {
                resource: self.native,
            });
        }
        if new_state.is_empty() || last_state == new_state {
            return None;
        }

        state.last_state = new_state;

        if last_state == ResourceStates::COMMON {
            if new_state == ResourceStates::COPY_DEST {
                state.valid_to_decay = false;
                return None;
            }
            if PROMOTABLE_READS.contains(new_state) {
                state.valid_to_decay = true;
                return None;
            }
        }

        state.valid_to_decay = false;
        Some(ResourceBarrier::Transition {
            resource: self.native,
            before: last_state,
            after: new_state,
        })
    }

    pub fn track_usage_and_get_barrier(
        &self,
        new_usage: TextureUsage,
        pending_serial: Serial,
    ) -> Option<ResourceBarrier> {
        self.track_state_and_get_barrier(
            texture_usage_to_states(new_usage, self.format),
            pending_serial,
        )
    }

    pub fn track_usage_and_transition_now(
        &self,
        ctx: &mut CommandRecordingContext<'_>,
        new_usage: TextureUsage,
    ) {
        self.transition_state_now(ctx, texture_usage_to_states(new_usage, self.format));
    }

    pub fn transition_state_now(&self, ctx: &mut CommandRecordingContext<'_>, new_state: ResourceStates) {
        if let Some(barrier) = self.track_state_and_get_barrier(new_state, ctx.pending_serial()) {
            log::trace!("Texture {:?}: {barrier:?}", self.id);
            ctx.list().resource_barrier(&[barrier]);
        }
    }
}

// ─── TextureView ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct TextureViewDescriptor {
    pub format: TextureFormat,
    pub base_mip_level: u32,
    pub mip_level_count: u32,
    pub base_array_layer: u32,
    pub array_layer_count: u32,
    /// Render-target or depth-stencil descriptor for attachment use.
    pub attachment_descriptor: CpuDescriptorHandle,
}

/// A subresource range of a texture, usable as binding or attachment.
#[derive(Debug)]
pub struct TextureView {
    id: ResourceId,
    texture: Arc<Texture>,
    descriptor: TextureViewDescriptor,
}

impl TextureView {
    #[must_use]
    pub fn new(texture: &Arc<Texture>, descriptor: TextureViewDescriptor) -> Self {
        Self {
            id: ResourceId::next(),
            texture: Arc::clone(texture),
            descriptor,
        }
    }

    /// A view over mip 0 / layer 0 with the texture's own format.
    #[must_use]
    pub fn single(texture: &Arc<Texture>, attachment_descriptor: CpuDescriptorHandle) -> Self {
        Self::new(
            texture,
            TextureViewDescriptor {
                format: texture.format(),
                base_mip_level: 0,
                mip_level_count: 1,
                base_array_layer: 0,
                array_layer_count: 1,
                attachment_descriptor,
            },
        )
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> ResourceId {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn texture(&self) -> &Arc<Texture> {
        &self.texture
    }

    #[inline]
    #[must_use]
    pub fn format(&self) -> TextureFormat {
        self.descriptor.format
    }

    #[inline]
    #[must_use]
    pub fn base_mip_level(&self) -> u32 {
        self.descriptor.base_mip_level
    }

    #[inline]
    #[must_use]
    pub fn base_array_layer(&self) -> u32 {
        self.descriptor.base_array_layer
    }

    #[inline]
    #[must_use]
    pub fn attachment_descriptor(&self) -> CpuDescriptorHandle {
        self.descriptor.attachment_descriptor
    }

    #[must_use]
    pub fn subresource_range(&self) -> SubresourceRange {
        SubresourceRange {
            base_mip_level: self.descriptor.base_mip_level,
            level_count: self.descriptor.mip_level_count,
            base_array_layer: self.descriptor.base_array_layer,
            layer_count: self.descriptor.array_layer_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texture(mips: u32, layers: u32) -> Texture {
        Texture::new(
            NativeResource(3),
            &TextureDescriptor {
                dimension: TextureDimension::D2,
                size: Extent3d { width: 64, height: 32, depth: layers },
                format: TextureFormat::Rgba8Unorm,
                mip_level_count: mips,
                sample_count: 1,
                usage: TextureUsage::SAMPLED | TextureUsage::COPY_SRC | TextureUsage::COPY_DST,
            },
        )
    }

    #[test]
    fn subresource_index_is_mip_major_within_layer() {
        let tex = texture(4, 3);
        assert_eq!(tex.subresource_index(0, 0), 0);
        assert_eq!(tex.subresource_index(2, 0), 2);
        assert_eq!(tex.subresource_index(1, 2), 9);
    }

    #[test]
    fn initialization_flags_are_per_subresource() {
        let tex = texture(2, 2);
        let mip1_layer1 = SubresourceRange {
            base_mip_level: 1,
            level_count: 1,
            base_array_layer: 1,
            layer_count: 1,
        };
        tex.set_is_subresource_content_initialized(true, mip1_layer1);
        assert!(tex.is_subresource_content_initialized(mip1_layer1));
        assert!(!tex.is_subresource_content_initialized(tex.full_range()));
    }

    #[test]
    fn common_promotes_to_copy_source_and_decays() {
        let tex = texture(1, 1);
        assert!(tex.track_usage_and_get_barrier(TextureUsage::COPY_SRC, 1).is_none());
        // Promoted read states decay on the next submission.
        assert!(tex.track_usage_and_get_barrier(TextureUsage::COPY_DST, 2).is_none());
        // COPY_DEST reached by promotion does not decay.
        let barrier = tex.track_usage_and_get_barrier(TextureUsage::SAMPLED, 3);
        assert!(matches!(
            barrier,
            Some(ResourceBarrier::Transition { before: ResourceStates::COPY_DEST, .. })
        ));
    }

    #[test]
    fn common_to_render_target_needs_barrier() {
        let tex = texture(1, 1);
        let barrier = tex.track_state_and_get_barrier(ResourceStates::RENDER_TARGET, 1);
        assert!(barrier.is_some());
    }

    #[test]
    fn storage_after_storage_needs_uav_barrier() {
        let tex = texture(1, 1);
        tex.track_state_and_get_barrier(ResourceStates::UNORDERED_ACCESS, 1);
        assert_eq!(
            tex.track_state_and_get_barrier(ResourceStates::UNORDERED_ACCESS, 1),
            Some(ResourceBarrier::Uav {
                resource: NativeResource(3),
            })
        );
    }

    #[test]
    fn mip_size_is_clamped_to_one() {
        let tex = texture(8, 1);
        let size = tex.mip_size(7);
        assert_eq!((size.width, size.height), (1, 1));
    }
}

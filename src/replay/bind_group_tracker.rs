//! Bind Group State Tracker
//!
//! Keeps the native root parameters in sync with the bind groups set by the
//! command stream, emitting only what changed since the last draw, dispatch
//! or trace.
//!
//! # Design
//!
//! ```text
//!   SetBindGroup / SetPipeline          Draw / Dispatch / TraceRays
//!            │                                   │
//!            ▼                                   ▼
//!   dirty_bind_groups              ┌──────── apply() ─────────┐
//!   dirty_object_changed_or_       │ 1. populate dirty slots  │
//!     is_dynamic                   │ 2. on failure: switch    │
//!                                  │    heap, repopulate all  │
//!                                  │ 3. root descriptors and  │
//!                                  │    descriptor tables     │
//!                                  │ 4. storage barriers      │
//!                                  │    (compute / rays only) │
//!                                  └──────────────────────────┘
//! ```
//!
//! Two dirty sets are kept. `dirty_bind_groups` holds slots whose group
//! changed and need their descriptor tables rebound.
//! `dirty_object_changed_or_is_dynamic` additionally holds slots with
//! dynamic offsets, whose root descriptors are rebound on every set.
//!
//! A tracker lives for one pass. Root arguments are per bind point, so
//! nothing recorded for one pass is assumed bound in the next.
//!
//! A heap switch invalidates every table populated from the previous
//! generation, so recovery marks the whole layout mask dirty and
//! repopulates it against the new heaps. Heap capacity is validated to fit
//! one full layout set, so the second pass failing is reported as
//! [`ReplayError::ResourceExhaustion`].

use std::sync::Arc;

use smallvec::SmallVec;

use crate::errors::{NativeError, NativeErrorKind, ReplayError, Result};
use crate::limits::{MAX_BIND_GROUPS, MAX_DYNAMIC_BUFFERS_PER_GROUP};
use crate::native::DescriptorHeapKind;
use crate::resources::{
    BindGroup, BindingResource, BindingType, BufferUsage, PipelineLayout, ResourceId,
    TextureUsage,
};
use crate::utils::SlotMask;

use super::{CommandRecordingContext, PassKind};

type DynamicOffsets = SmallVec<[u32; MAX_DYNAMIC_BUFFERS_PER_GROUP]>;

#[derive(Debug)]
pub struct BindGroupStateTracker {
    pass_kind: PassKind,
    bind_groups: [Option<Arc<BindGroup>>; MAX_BIND_GROUPS],
    dynamic_offsets: [DynamicOffsets; MAX_BIND_GROUPS],
    dirty_bind_groups: SlotMask,
    dirty_object_changed_or_is_dynamic: SlotMask,
    bind_group_layouts_mask: SlotMask,
    pipeline_layout: Option<Arc<PipelineLayout>>,
    last_applied_layout: Option<ResourceId>,
}

impl Default for BindGroupStateTracker {
    fn default() -> Self {
        Self::new(PassKind::default())
    }
}

impl BindGroupStateTracker {
    /// A tracker for one pass. `pass_kind` selects the root signature bind
    /// point and whether storage barriers are emitted on apply.
    #[must_use]
    pub fn new(pass_kind: PassKind) -> Self {
        Self {
            pass_kind,
            bind_groups: Default::default(),
            dynamic_offsets: Default::default(),
            dirty_bind_groups: SlotMask::EMPTY,
            dirty_object_changed_or_is_dynamic: SlotMask::EMPTY,
            bind_group_layouts_mask: SlotMask::EMPTY,
            pipeline_layout: None,
            last_applied_layout: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn pass_kind(&self) -> PassKind {
        self.pass_kind
    }

    #[inline]
    #[must_use]
    pub fn dirty_bind_groups(&self) -> SlotMask {
        self.dirty_bind_groups
    }

    #[inline]
    #[must_use]
    pub fn dirty_object_changed_or_is_dynamic(&self) -> SlotMask {
        self.dirty_object_changed_or_is_dynamic
    }

    // ─── Recording ───────────────────────────────────────────────────────────

    pub fn on_set_bind_group(
        &mut self,
        index: u32,
        group: &Arc<BindGroup>,
        dynamic_offsets: &[u32],
    ) -> Result<()> {
        let slot = index as usize;
        if slot >= MAX_BIND_GROUPS {
            return Err(ReplayError::unreachable(format!(
                "bind group index {index} is out of range"
            )));
        }

        let changed = self.bind_groups[slot]
            .as_ref()
            .is_none_or(|current| current.id() != group.id());
        if changed {
            self.dirty_bind_groups.set(slot);
            self.dirty_object_changed_or_is_dynamic.set(slot);
            self.bind_groups[slot] = Some(Arc::clone(group));
        }
        if !dynamic_offsets.is_empty() {
            self.dirty_object_changed_or_is_dynamic.set(slot);
        }
        self.dynamic_offsets[slot] = DynamicOffsets::from_slice(dynamic_offsets);
        Ok(())
    }

    /// A layout different from the last applied one invalidates the root
    /// arguments of every slot it uses.
    pub fn on_set_pipeline(&mut self, layout: &Arc<PipelineLayout>) {
        if self.last_applied_layout != Some(layout.id()) {
            let mask = layout.bind_group_layouts_mask();
            self.bind_group_layouts_mask = mask;
            self.dirty_bind_groups |= mask;
            self.dirty_object_changed_or_is_dynamic |= mask;
        }
        self.pipeline_layout = Some(Arc::clone(layout));
    }

    // ─── Apply ───────────────────────────────────────────────────────────────

    /// Brings the native root arguments up to date. Called right before
    /// every draw, dispatch and trace.
    pub fn apply(&mut self, ctx: &mut CommandRecordingContext<'_>) -> Result<()> {
        let layout = self
            .pipeline_layout
            .clone()
            .ok_or_else(|| ReplayError::unreachable("apply without a pipeline"))?;
        let mask = self.bind_group_layouts_mask;

        self.populate_descriptors(ctx, mask)?;

        for slot in self.dirty_object_changed_or_is_dynamic.intersection(mask) {
            self.apply_bind_group(ctx, &layout, slot)?;
        }

        if self.pass_kind.has_storage_barriers() {
            self.transition_storage_bindings(ctx, mask)?;
        }

        self.did_apply();
        Ok(())
    }

    fn did_apply(&mut self) {
        self.dirty_bind_groups.clear();
        self.dirty_object_changed_or_is_dynamic.clear();
        self.last_applied_layout = self.pipeline_layout.as_ref().map(|layout| layout.id());
    }

    fn bound_group(&self, slot: usize) -> Result<&Arc<BindGroup>> {
        self.bind_groups[slot]
            .as_ref()
            .ok_or_else(|| ReplayError::unreachable(format!("no bind group set at slot {slot}")))
    }

    fn populate_descriptors(
        &mut self,
        ctx: &mut CommandRecordingContext<'_>,
        mask: SlotMask,
    ) -> Result<()> {
        let device = ctx.device();
        let views = device.view_allocator();
        let samplers = device.sampler_allocator();
        let pending_serial = ctx.pending_serial();

        let mut views_failed = false;
        let mut samplers_failed = false;
        for slot in self.dirty_bind_groups.intersection(mask) {
            let group = self.bound_group(slot)?;
            views_failed |= !group.populate_views(views, pending_serial);
            samplers_failed |= !group.populate_samplers(samplers, pending_serial);
            if views_failed && samplers_failed {
                break;
            }
        }

        if !views_failed && !samplers_failed {
            return Ok(());
        }

        log::debug!(
            "Descriptor heap exhausted (views: {views_failed}, samplers: {samplers_failed}), switching"
        );

        let completed_serial = device.completed_serial();
        if views_failed {
            views.allocate_and_switch_shader_visible_heap(pending_serial, completed_serial)?;
        }
        if samplers_failed {
            samplers.allocate_and_switch_shader_visible_heap(pending_serial, completed_serial)?;
        }

        self.dirty_bind_groups |= mask;
        self.dirty_object_changed_or_is_dynamic |= mask;

        ctx.list()
            .set_descriptor_heaps(views.shader_visible_heap(), samplers.shader_visible_heap());

        for slot in mask {
            let group = self.bound_group(slot)?;
            if !group.populate_views(views, pending_serial) {
                return Err(exhausted(DescriptorHeapKind::View));
            }
            if !group.populate_samplers(samplers, pending_serial) {
                return Err(exhausted(DescriptorHeapKind::Sampler));
            }
        }
        Ok(())
    }

    fn apply_bind_group(
        &self,
        ctx: &mut CommandRecordingContext<'_>,
        layout: &PipelineLayout,
        slot: usize,
    ) -> Result<()> {
        let group = self.bound_group(slot)?;
        let group_layout = group.layout();
        let bind_point = self.pass_kind.bind_point();
        let offsets = &self.dynamic_offsets[slot];

        // Dynamic buffers are packed at the front of the layout.
        for index in 0..group_layout.dynamic_buffer_count() as usize {
            let parameter_index = layout
                .dynamic_root_parameter_index(slot, index)
                .ok_or_else(|| {
                    ReplayError::unreachable(format!(
                        "slot {slot} dynamic binding {index} has no root parameter"
                    ))
                })?;
            let binding = group.buffer_binding(index).ok_or_else(|| {
                ReplayError::unreachable(format!("slot {slot} binding {index} is not a buffer"))
            })?;
            let dynamic_offset = offsets.get(index).copied().ok_or_else(|| {
                ReplayError::unreachable(format!("slot {slot} is missing dynamic offset {index}"))
            })?;
            let location =
                binding.buffer.gpu_address() + binding.offset + u64::from(dynamic_offset);

            let list = ctx.list();
            match group_layout.entries()[index].ty {
                BindingType::UniformBuffer => {
                    list.set_root_constant_buffer_view(bind_point, parameter_index, location);
                }
                BindingType::StorageBuffer => {
                    list.set_root_unordered_access_view(bind_point, parameter_index, location);
                }
                BindingType::ReadonlyStorageBuffer => {
                    list.set_root_shader_resource_view(bind_point, parameter_index, location);
                }
                other => {
                    return Err(ReplayError::unreachable(format!(
                        "{other:?} cannot have a dynamic offset"
                    )));
                }
            }
        }

        // Only dynamic offsets changed.
        if !self.dirty_bind_groups.contains(slot) {
            return Ok(());
        }

        if group_layout.view_descriptor_count() > 0 {
            let parameter_index = layout.view_root_parameter_index(slot).ok_or_else(|| {
                ReplayError::unreachable(format!("slot {slot} has no view table parameter"))
            })?;
            let base = group.base_view_descriptor().ok_or_else(|| {
                ReplayError::unreachable(format!("slot {slot} view table was not populated"))
            })?;
            ctx.list()
                .set_root_descriptor_table(bind_point, parameter_index, base);
        }

        if group_layout.sampler_descriptor_count() > 0 {
            let parameter_index = layout.sampler_root_parameter_index(slot).ok_or_else(|| {
                ReplayError::unreachable(format!("slot {slot} has no sampler table parameter"))
            })?;
            let base = group.base_sampler_descriptor().ok_or_else(|| {
                ReplayError::unreachable(format!("slot {slot} sampler table was not populated"))
            })?;
            ctx.list()
                .set_root_descriptor_table(bind_point, parameter_index, base);
        }

        Ok(())
    }

    /// Storage resources may change state between dispatches of one pass,
    /// so they are transitioned right before each one.
    fn transition_storage_bindings(
        &self,
        ctx: &mut CommandRecordingContext<'_>,
        mask: SlotMask,
    ) -> Result<()> {
        for slot in mask {
            let group = self.bound_group(slot)?;
            let group_layout = group.layout();
            for index in group_layout.bindings_needing_barrier() {
                let ty = group_layout.entries()[index].ty;
                match (ty, group.binding(index)) {
                    (BindingType::StorageBuffer, Some(BindingResource::Buffer { buffer, .. })) => {
                        buffer.track_usage_and_transition_now(ctx, BufferUsage::STORAGE);
                    }
                    (BindingType::ReadonlyStorageTexture, Some(BindingResource::TextureView(view))) => {
                        view.texture()
                            .track_usage_and_transition_now(ctx, TextureUsage::READONLY_STORAGE);
                    }
                    (
                        BindingType::StorageTexture | BindingType::WriteonlyStorageTexture,
                        Some(BindingResource::TextureView(view)),
                    ) => {
                        view.texture()
                            .track_usage_and_transition_now(ctx, TextureUsage::STORAGE);
                    }
                    (ty, _) => {
                        return Err(ReplayError::unreachable(format!(
                            "{ty:?} binding at slot {slot} does not need a storage barrier"
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

fn exhausted(kind: DescriptorHeapKind) -> ReplayError {
    log::error!("{kind:?} heap cannot hold the active layout set after a switch");
    ReplayError::ResourceExhaustion {
        kind,
        source: NativeError::new(
            "PopulateDescriptors",
            NativeErrorKind::OutOfMemory,
            "fresh heap generation cannot hold the active bind groups",
        ),
    }
}

//! Bind group layouts and bind groups.
//!
//! A layout orders its bindings so that dynamic-offset buffers come first;
//! the resulting position is the *binding index* used everywhere else.
//! Dynamic buffers are bound as root descriptors, every other binding lives
//! in one of two descriptor tables (views, samplers).
//!
//! A bind group owns CPU staging descriptors for its tables and caches the
//! shader-visible copy it last populated.

use std::sync::Arc;

use parking_lot::Mutex;
use smallvec::SmallVec;

use crate::descriptor::{GpuDescriptorAllocation, ShaderVisibleDescriptorAllocator};
use crate::errors::{ReplayError, Result};
use crate::limits::{MAX_BINDINGS_PER_GROUP, MAX_DYNAMIC_BUFFERS_PER_GROUP};
use crate::native::{CpuDescriptorHandle, DescriptorHeapKind, GpuDescriptorHandle};
use crate::replay::Serial;
use crate::utils::SlotMask;

use super::{AccelerationContainer, Buffer, ResourceId, Sampler, TextureView};

// ─── Binding Types ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingType {
    UniformBuffer,
    StorageBuffer,
    ReadonlyStorageBuffer,
    Sampler,
    ComparisonSampler,
    SampledTexture,
    StorageTexture,
    ReadonlyStorageTexture,
    WriteonlyStorageTexture,
    AccelerationContainer,
}

impl BindingType {
    #[inline]
    #[must_use]
    pub fn is_buffer(self) -> bool {
        matches!(
            self,
            Self::UniformBuffer | Self::StorageBuffer | Self::ReadonlyStorageBuffer
        )
    }

    #[inline]
    #[must_use]
    pub fn is_sampler(self) -> bool {
        matches!(self, Self::Sampler | Self::ComparisonSampler)
    }

    /// Mutable storage bindings must be transitioned right before a
    /// dispatch, since their state can change between dispatches of a pass.
    #[inline]
    #[must_use]
    pub fn needs_storage_barrier(self) -> bool {
        matches!(
            self,
            Self::StorageBuffer
                | Self::StorageTexture
                | Self::ReadonlyStorageTexture
                | Self::WriteonlyStorageTexture
        )
    }

    #[inline]
    #[must_use]
    pub fn heap_kind(self) -> DescriptorHeapKind {
        if self.is_sampler() {
            DescriptorHeapKind::Sampler
        } else {
            DescriptorHeapKind::View
        }
    }
}

// ─── BindGroupLayout ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindGroupLayoutEntry {
    /// Binding number as written in the shader.
    pub binding: u32,
    pub ty: BindingType,
    pub has_dynamic_offset: bool,
}

#[derive(Debug)]
pub struct BindGroupLayout {
    id: ResourceId,
    /// Sorted: dynamic buffers first, then by binding number.
    entries: SmallVec<[BindGroupLayoutEntry; 8]>,
    dynamic_buffer_count: u32,
    view_descriptor_count: u32,
    sampler_descriptor_count: u32,
    needs_barrier: SlotMask,
}

impl BindGroupLayout {
    pub fn new(entries: &[BindGroupLayoutEntry]) -> Result<Self> {
        if entries.len() > MAX_BINDINGS_PER_GROUP {
            return Err(ReplayError::validation(format!(
                "bind group layout has {} bindings, the limit is {MAX_BINDINGS_PER_GROUP}",
                entries.len()
            )));
        }
        if let Some(entry) = entries
            .iter()
            .find(|e| e.has_dynamic_offset && !e.ty.is_buffer())
        {
            return Err(ReplayError::validation(format!(
                "binding {} of type {:?} cannot have a dynamic offset",
                entry.binding, entry.ty
            )));
        }

        let mut sorted: SmallVec<[BindGroupLayoutEntry; 8]> = entries.iter().copied().collect();
        sorted.sort_by_key(|e| (!e.has_dynamic_offset, e.binding));

        let dynamic_buffer_count = sorted.iter().filter(|e| e.has_dynamic_offset).count() as u32;
        if dynamic_buffer_count as usize > MAX_DYNAMIC_BUFFERS_PER_GROUP {
            return Err(ReplayError::validation(format!(
                "bind group layout has {dynamic_buffer_count} dynamic buffers, the limit is {MAX_DYNAMIC_BUFFERS_PER_GROUP}"
            )));
        }

        let mut view_descriptor_count = 0;
        let mut sampler_descriptor_count = 0;
        let mut needs_barrier = SlotMask::EMPTY;
        for (index, entry) in sorted.iter().enumerate() {
            if entry.ty.needs_storage_barrier() {
                needs_barrier.set(index);
            }
            if entry.has_dynamic_offset {
                continue;
            }
            match entry.ty.heap_kind() {
                DescriptorHeapKind::View => view_descriptor_count += 1,
                DescriptorHeapKind::Sampler => sampler_descriptor_count += 1,
            }
        }

        Ok(Self {
            id: ResourceId::next(),
            entries: sorted,
            dynamic_buffer_count,
            view_descriptor_count,
            sampler_descriptor_count,
            needs_barrier,
        })
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> ResourceId {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn entries(&self) -> &[BindGroupLayoutEntry] {
        &self.entries
    }

    #[inline]
    #[must_use]
    pub fn binding_count(&self) -> usize {
        self.entries.len()
    }

    /// Dynamic buffers occupy binding indices `0..dynamic_buffer_count`.
    #[inline]
    #[must_use]
    pub fn dynamic_buffer_count(&self) -> u32 {
        self.dynamic_buffer_count
    }

    /// CBV/SRV/UAV descriptors in the view table.
    #[inline]
    #[must_use]
    pub fn view_descriptor_count(&self) -> u32 {
        self.view_descriptor_count
    }

    #[inline]
    #[must_use]
    pub fn sampler_descriptor_count(&self) -> u32 {
        self.sampler_descriptor_count
    }

    /// Binding indices that need a storage barrier before dispatch.
    #[inline]
    #[must_use]
    pub fn bindings_needing_barrier(&self) -> SlotMask {
        self.needs_barrier
    }

    /// Binding index of a shader binding number.
    #[must_use]
    pub fn binding_index(&self, binding: u32) -> Option<usize> {
        self.entries.iter().position(|e| e.binding == binding)
    }
}

// ─── BindGroup ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum BindingResource {
    Buffer {
        buffer: Arc<Buffer>,
        offset: u64,
        size: u64,
    },
    Sampler(Arc<Sampler>),
    TextureView(Arc<TextureView>),
    AccelerationContainer(Arc<AccelerationContainer>),
}

#[derive(Debug, Clone, Copy)]
pub struct BufferBinding<'a> {
    pub buffer: &'a Arc<Buffer>,
    pub offset: u64,
    pub size: u64,
}

#[derive(Debug, Default)]
struct ShaderVisibleAllocations {
    views: Option<GpuDescriptorAllocation>,
    samplers: Option<GpuDescriptorAllocation>,
}

/// CPU staging locations of a bind group's descriptor tables.
#[derive(Debug, Clone, Copy, Default)]
pub struct StagingDescriptors {
    pub views: CpuDescriptorHandle,
    pub samplers: CpuDescriptorHandle,
}

#[derive(Debug)]
pub struct BindGroup {
    id: ResourceId,
    layout: Arc<BindGroupLayout>,
    /// Indexed by binding index.
    bindings: Vec<BindingResource>,
    staging: StagingDescriptors,
    allocations: Mutex<ShaderVisibleAllocations>,
}

impl BindGroup {
    /// `resources` are given by binding number and reordered to match the
    /// layout.
    pub fn new(
        layout: &Arc<BindGroupLayout>,
        resources: Vec<(u32, BindingResource)>,
        staging: StagingDescriptors,
    ) -> Result<Self> {
        if resources.len() != layout.binding_count() {
            return Err(ReplayError::validation(format!(
                "bind group provides {} resources, layout expects {}",
                resources.len(),
                layout.binding_count()
            )));
        }

        let mut slots: Vec<Option<BindingResource>> = vec![None; layout.binding_count()];
        for (binding, resource) in resources {
            let index = layout.binding_index(binding).ok_or_else(|| {
                ReplayError::validation(format!("binding {binding} is not in the layout"))
            })?;
            let ty = layout.entries()[index].ty;
            let compatible = match &resource {
                BindingResource::Buffer { .. } => ty.is_buffer(),
                BindingResource::Sampler(_) => ty.is_sampler(),
                BindingResource::TextureView(_) => matches!(
                    ty,
                    BindingType::SampledTexture
                        | BindingType::StorageTexture
                        | BindingType::ReadonlyStorageTexture
                        | BindingType::WriteonlyStorageTexture
                ),
                BindingResource::AccelerationContainer(_) => {
                    ty == BindingType::AccelerationContainer
                }
            };
            if !compatible {
                return Err(ReplayError::validation(format!(
                    "binding {binding} expects {ty:?}"
                )));
            }
            slots[index] = Some(resource);
        }

        let bindings = slots
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| ReplayError::validation("bind group binds a binding twice"))?;

        Ok(Self {
            id: ResourceId::next(),
            layout: Arc::clone(layout),
            bindings,
            staging,
            allocations: Mutex::new(ShaderVisibleAllocations::default()),
        })
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> ResourceId {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn layout(&self) -> &Arc<BindGroupLayout> {
        &self.layout
    }

    #[must_use]
    pub fn binding(&self, index: usize) -> Option<&BindingResource> {
        self.bindings.get(index)
    }

    #[must_use]
    pub fn buffer_binding(&self, index: usize) -> Option<BufferBinding<'_>> {
        match self.bindings.get(index)? {
            BindingResource::Buffer {
                buffer,
                offset,
                size,
            } => Some(BufferBinding {
                buffer,
                offset: *offset,
                size: *size,
            }),
            _ => None,
        }
    }

    /// Copies the view table into the current view heap unless a valid copy
    /// already exists. Returns `false` when the heap is exhausted.
    pub fn populate_views(
        &self,
        allocator: &ShaderVisibleDescriptorAllocator,
        pending_serial: Serial,
    ) -> bool {
        let count = self.layout.view_descriptor_count();
        let mut allocations = self.allocations.lock();
        populate(
            &mut allocations.views,
            allocator,
            count,
            self.staging.views,
            pending_serial,
        )
    }

    pub fn populate_samplers(
        &self,
        allocator: &ShaderVisibleDescriptorAllocator,
        pending_serial: Serial,
    ) -> bool {
        let count = self.layout.sampler_descriptor_count();
        let mut allocations = self.allocations.lock();
        populate(
            &mut allocations.samplers,
            allocator,
            count,
            self.staging.samplers,
            pending_serial,
        )
    }

    /// GPU base of the populated view table.
    #[must_use]
    pub fn base_view_descriptor(&self) -> Option<GpuDescriptorHandle> {
        self.allocations.lock().views.map(|a| a.gpu_base)
    }

    #[must_use]
    pub fn base_sampler_descriptor(&self) -> Option<GpuDescriptorHandle> {
        self.allocations.lock().samplers.map(|a| a.gpu_base)
    }

    #[must_use]
    pub fn view_allocation(&self) -> Option<GpuDescriptorAllocation> {
        self.allocations.lock().views
    }

    #[must_use]
    pub fn sampler_allocation(&self) -> Option<GpuDescriptorAllocation> {
        self.allocations.lock().samplers
    }
}

fn populate(
    slot: &mut Option<GpuDescriptorAllocation>,
    allocator: &ShaderVisibleDescriptorAllocator,
    count: u32,
    source: CpuDescriptorHandle,
    pending_serial: Serial,
) -> bool {
    if count == 0 {
        return true;
    }
    if let Some(existing) = slot
        && allocator.is_allocation_still_valid(existing, pending_serial)
    {
        return true;
    }
    match allocator.populate(count, source, pending_serial) {
        Some(allocation) => {
            *slot = Some(allocation);
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(binding: u32, ty: BindingType, has_dynamic_offset: bool) -> BindGroupLayoutEntry {
        BindGroupLayoutEntry {
            binding,
            ty,
            has_dynamic_offset,
        }
    }

    #[test]
    fn dynamic_buffers_are_packed_first() {
        let layout = BindGroupLayout::new(&[
            entry(0, BindingType::SampledTexture, false),
            entry(3, BindingType::UniformBuffer, true),
            entry(1, BindingType::Sampler, false),
            entry(2, BindingType::StorageBuffer, true),
        ])
        .unwrap();

        let order: Vec<u32> = layout.entries().iter().map(|e| e.binding).collect();
        assert_eq!(order, vec![2, 3, 0, 1]);
        assert_eq!(layout.dynamic_buffer_count(), 2);
        assert_eq!(layout.view_descriptor_count(), 1);
        assert_eq!(layout.sampler_descriptor_count(), 1);
    }

    #[test]
    fn dynamic_offset_on_texture_is_rejected() {
        let err = BindGroupLayout::new(&[entry(0, BindingType::SampledTexture, true)]).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn storage_bindings_need_barriers() {
        let layout = BindGroupLayout::new(&[
            entry(0, BindingType::UniformBuffer, false),
            entry(1, BindingType::StorageBuffer, false),
            entry(2, BindingType::WriteonlyStorageTexture, false),
        ])
        .unwrap();
        assert_eq!(
            layout.bindings_needing_barrier().iter().collect::<Vec<_>>(),
            vec![1, 2]
        );
    }
}

//! Pipeline layouts and the pipeline objects the replay engine binds.
//!
//! # Root Signature Layout
//!
//! Root parameters are assigned per bind group slot, in slot order:
//!
//! ```text
//!   slot 0: [view table]? [sampler table]? [dynamic root descriptor]*
//!   slot 1: ...
//! ```
//!
//! Tables are only present when the group layout has descriptors of that
//! kind.

use std::sync::Arc;

use smallvec::SmallVec;

use crate::errors::{ReplayError, Result};
use crate::limits::{MAX_BIND_GROUPS, MAX_VERTEX_BUFFERS};
use crate::native::{
    GpuVirtualAddress, NativeResource, PipelineStateId, RootSignatureId, StateObjectId,
};
use crate::utils::SlotMask;

use super::{BindGroupLayout, ResourceId};

// ─── PipelineLayout ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
struct GroupRootParameters {
    view_table: Option<u32>,
    sampler_table: Option<u32>,
    dynamic: SmallVec<[u32; 4]>,
}

#[derive(Debug)]
pub struct PipelineLayout {
    id: ResourceId,
    root_signature: RootSignatureId,
    bind_group_layouts: [Option<Arc<BindGroupLayout>>; MAX_BIND_GROUPS],
    mask: SlotMask,
    root_parameters: [GroupRootParameters; MAX_BIND_GROUPS],
}

impl PipelineLayout {
    /// `bind_group_layouts[i]` is the layout of slot `i`; `None` leaves the
    /// slot unused.
    pub fn new(
        root_signature: RootSignatureId,
        bind_group_layouts: &[Option<Arc<BindGroupLayout>>],
    ) -> Result<Self> {
        if bind_group_layouts.len() > MAX_BIND_GROUPS {
            return Err(ReplayError::validation(format!(
                "pipeline layout has {} bind groups, the limit is {MAX_BIND_GROUPS}",
                bind_group_layouts.len()
            )));
        }

        let mut layouts: [Option<Arc<BindGroupLayout>>; MAX_BIND_GROUPS] = Default::default();
        let mut root_parameters: [GroupRootParameters; MAX_BIND_GROUPS] = Default::default();
        let mut mask = SlotMask::EMPTY;
        let mut next_parameter = 0u32;

        for (slot, layout) in bind_group_layouts.iter().enumerate() {
            let Some(layout) = layout else { continue };
            mask.set(slot);

            let params = &mut root_parameters[slot];
            if layout.view_descriptor_count() > 0 {
                params.view_table = Some(next_parameter);
                next_parameter += 1;
            }
            if layout.sampler_descriptor_count() > 0 {
                params.sampler_table = Some(next_parameter);
                next_parameter += 1;
            }
            for _ in 0..layout.dynamic_buffer_count() {
                params.dynamic.push(next_parameter);
                next_parameter += 1;
            }

            layouts[slot] = Some(Arc::clone(layout));
        }

        Ok(Self {
            id: ResourceId::next(),
            root_signature,
            bind_group_layouts: layouts,
            mask,
            root_parameters,
        })
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> ResourceId {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn root_signature(&self) -> RootSignatureId {
        self.root_signature
    }

    /// Slots that have a bind group layout.
    #[inline]
    #[must_use]
    pub fn bind_group_layouts_mask(&self) -> SlotMask {
        self.mask
    }

    #[must_use]
    pub fn bind_group_layout(&self, slot: usize) -> Option<&Arc<BindGroupLayout>> {
        self.bind_group_layouts.get(slot)?.as_ref()
    }

    #[must_use]
    pub fn view_root_parameter_index(&self, slot: usize) -> Option<u32> {
        self.root_parameters.get(slot)?.view_table
    }

    #[must_use]
    pub fn sampler_root_parameter_index(&self, slot: usize) -> Option<u32> {
        self.root_parameters.get(slot)?.sampler_table
    }

    #[must_use]
    pub fn dynamic_root_parameter_index(&self, slot: usize, binding_index: usize) -> Option<u32> {
        self.root_parameters.get(slot)?.dynamic.get(binding_index).copied()
    }
}

// ─── Render Pipeline ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveKind {
    PointList,
    LineList,
    LineStrip,
    #[default]
    TriangleList,
    TriangleStrip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IndexFormat {
    Uint16,
    #[default]
    Uint32,
}

#[derive(Debug, Clone)]
pub struct RenderPipelineDescriptor {
    pub layout: Arc<PipelineLayout>,
    pub pipeline_state: PipelineStateId,
    pub primitive: PrimitiveKind,
    pub index_format: IndexFormat,
    /// `(slot, array_stride)` for every vertex buffer the pipeline reads.
    pub vertex_buffers: Vec<(u32, u32)>,
}

#[derive(Debug)]
pub struct RenderPipeline {
    id: ResourceId,
    layout: Arc<PipelineLayout>,
    pipeline_state: PipelineStateId,
    primitive: PrimitiveKind,
    index_format: IndexFormat,
    vertex_strides: [u32; MAX_VERTEX_BUFFERS],
    vertex_slots_used: SlotMask,
}

impl RenderPipeline {
    pub fn new(descriptor: RenderPipelineDescriptor) -> Result<Self> {
        let mut vertex_strides = [0; MAX_VERTEX_BUFFERS];
        let mut vertex_slots_used = SlotMask::EMPTY;
        for &(slot, stride) in &descriptor.vertex_buffers {
            let index = slot as usize;
            if index >= MAX_VERTEX_BUFFERS {
                return Err(ReplayError::validation(format!(
                    "vertex buffer slot {slot} exceeds the limit of {MAX_VERTEX_BUFFERS}"
                )));
            }
            vertex_strides[index] = stride;
            vertex_slots_used.set(index);
        }

        Ok(Self {
            id: ResourceId::next(),
            layout: descriptor.layout,
            pipeline_state: descriptor.pipeline_state,
            primitive: descriptor.primitive,
            index_format: descriptor.index_format,
            vertex_strides,
            vertex_slots_used,
        })
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> ResourceId {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn layout(&self) -> &Arc<PipelineLayout> {
        &self.layout
    }

    #[inline]
    #[must_use]
    pub fn pipeline_state(&self) -> PipelineStateId {
        self.pipeline_state
    }

    #[inline]
    #[must_use]
    pub fn primitive(&self) -> PrimitiveKind {
        self.primitive
    }

    #[inline]
    #[must_use]
    pub fn index_format(&self) -> IndexFormat {
        self.index_format
    }

    #[inline]
    #[must_use]
    pub fn vertex_slots_used(&self) -> SlotMask {
        self.vertex_slots_used
    }

    #[inline]
    #[must_use]
    pub fn vertex_stride(&self, slot: usize) -> u32 {
        self.vertex_strides.get(slot).copied().unwrap_or(0)
    }
}

// ─── Compute Pipeline ─────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct ComputePipeline {
    id: ResourceId,
    layout: Arc<PipelineLayout>,
    pipeline_state: PipelineStateId,
}

impl ComputePipeline {
    #[must_use]
    pub fn new(layout: Arc<PipelineLayout>, pipeline_state: PipelineStateId) -> Self {
        Self {
            id: ResourceId::next(),
            layout,
            pipeline_state,
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> ResourceId {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn layout(&self) -> &Arc<PipelineLayout> {
        &self.layout
    }

    #[inline]
    #[must_use]
    pub fn pipeline_state(&self) -> PipelineStateId {
        self.pipeline_state
    }
}

// ─── Ray Tracing Pipeline ─────────────────────────────────────────────────────

/// Shader records laid out in one buffer with a fixed record size.
///
/// Record groups (generation, hit, miss) are addressed by
/// `group_offset * table_size` from the buffer start.
#[derive(Debug)]
pub struct ShaderBindingTable {
    id: ResourceId,
    buffer: NativeResource,
    address: GpuVirtualAddress,
    table_size: u32,
}

impl ShaderBindingTable {
    #[must_use]
    pub fn new(buffer: NativeResource, address: GpuVirtualAddress, table_size: u32) -> Self {
        Self {
            id: ResourceId::next(),
            buffer,
            address,
            table_size,
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> ResourceId {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn buffer(&self) -> NativeResource {
        self.buffer
    }

    #[inline]
    #[must_use]
    pub fn address(&self) -> GpuVirtualAddress {
        self.address
    }

    #[inline]
    #[must_use]
    pub fn table_size(&self) -> u32 {
        self.table_size
    }
}

#[derive(Debug)]
pub struct RayTracingPipeline {
    id: ResourceId,
    layout: Arc<PipelineLayout>,
    state_object: StateObjectId,
    shader_binding_table: Arc<ShaderBindingTable>,
}

impl RayTracingPipeline {
    #[must_use]
    pub fn new(
        layout: Arc<PipelineLayout>,
        state_object: StateObjectId,
        shader_binding_table: Arc<ShaderBindingTable>,
    ) -> Self {
        Self {
            id: ResourceId::next(),
            layout,
            state_object,
            shader_binding_table,
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> ResourceId {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn layout(&self) -> &Arc<PipelineLayout> {
        &self.layout
    }

    #[inline]
    #[must_use]
    pub fn state_object(&self) -> StateObjectId {
        self.state_object
    }

    #[inline]
    #[must_use]
    pub fn shader_binding_table(&self) -> &Arc<ShaderBindingTable> {
        &self.shader_binding_table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{BindGroupLayoutEntry, BindingType};

    fn layout(entries: &[(u32, BindingType, bool)]) -> Arc<BindGroupLayout> {
        let entries: Vec<_> = entries
            .iter()
            .map(|&(binding, ty, has_dynamic_offset)| BindGroupLayoutEntry {
                binding,
                ty,
                has_dynamic_offset,
            })
            .collect();
        Arc::new(BindGroupLayout::new(&entries).unwrap())
    }

    #[test]
    fn root_parameters_follow_slot_order() {
        let g0 = layout(&[
            (0, BindingType::SampledTexture, false),
            (1, BindingType::Sampler, false),
            (2, BindingType::UniformBuffer, true),
        ]);
        let g1 = layout(&[(0, BindingType::StorageBuffer, false)]);
        let pl = PipelineLayout::new(RootSignatureId(1), &[Some(g0), None, Some(g1)]).unwrap();

        assert_eq!(pl.view_root_parameter_index(0), Some(0));
        assert_eq!(pl.sampler_root_parameter_index(0), Some(1));
        assert_eq!(pl.dynamic_root_parameter_index(0, 0), Some(2));
        assert_eq!(pl.view_root_parameter_index(2), Some(3));
        assert_eq!(pl.sampler_root_parameter_index(2), None);
        assert_eq!(pl.bind_group_layouts_mask().iter().collect::<Vec<_>>(), vec![0, 2]);
    }
}

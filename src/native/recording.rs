//! Recording backend.
//!
//! [`RecordingCommandList`] and [`RecordingDevice`] implement the native
//! traits without a driver: every call is appended to a log that can be
//! inspected afterwards. Used for headless replay and throughout the test
//! suite.
//!
//! ```rust,ignore
//! let device = Arc::new(RecordingDevice::new());
//! let mut list = RecordingCommandList::new();
//! // ... replay into `list` ...
//! assert_eq!(list.count(|c| matches!(c, NativeCall::DispatchRays(_))), 1);
//! ```

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::errors::NativeError;
use crate::resources::{MemoryEntry, TextureFormat};

use super::{
    AccelerationStructureCopyMode, BindPoint, BuildAccelerationStructureDesc, ClearFlags,
    ClearMethod, CopyBox, CpuDescriptorHandle, DescriptorHeapKind, DispatchRaysDesc,
    GpuDescriptorHandle, GpuVirtualAddress, IndexBufferView, IndirectCommandKind,
    NativeCommandList, NativeDevice, NativeHeap, NativeHeapId, NativeResource, PipelineStateId,
    PrimitiveTopology, Rect, RenderPassDepthStencilDesc, RenderPassFlags,
    RenderPassRenderTargetDesc, ResourceBarrier, RootSignatureId, StateObjectId,
    SubresourceRange, TextureCopyLocation, VertexBufferView, Viewport,
};

/// One recorded command-list call.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeCall {
    SetDescriptorHeaps {
        view_heap: NativeHeapId,
        sampler_heap: NativeHeapId,
    },
    ResourceBarrier(Vec<ResourceBarrier>),
    SetRootSignature(BindPoint, RootSignatureId),
    SetPipelineState(PipelineStateId),
    SetRayTracingStateObject(StateObjectId),
    SetRootDescriptorTable {
        bind_point: BindPoint,
        parameter_index: u32,
        base_descriptor: GpuDescriptorHandle,
    },
    SetRootConstantBufferView {
        bind_point: BindPoint,
        parameter_index: u32,
        location: GpuVirtualAddress,
    },
    SetRootUnorderedAccessView {
        bind_point: BindPoint,
        parameter_index: u32,
        location: GpuVirtualAddress,
    },
    SetRootShaderResourceView {
        bind_point: BindPoint,
        parameter_index: u32,
        location: GpuVirtualAddress,
    },
    IaSetPrimitiveTopology(PrimitiveTopology),
    IaSetVertexBuffers {
        start_slot: u32,
        views: Vec<VertexBufferView>,
    },
    IaSetIndexBuffer(IndexBufferView),
    DrawInstanced {
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    },
    DrawIndexedInstanced {
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        base_vertex: i32,
        first_instance: u32,
    },
    ExecuteIndirect {
        kind: IndirectCommandKind,
        max_command_count: u32,
        argument_buffer: NativeResource,
        argument_offset: u64,
    },
    Dispatch(u32, u32, u32),
    DispatchRays(DispatchRaysDesc),
    BuildAccelerationStructure(BuildAccelerationStructureDesc),
    CopyAccelerationStructure {
        dest: GpuVirtualAddress,
        source: GpuVirtualAddress,
        mode: AccelerationStructureCopyMode,
    },
    CopyBufferRegion {
        dest: NativeResource,
        dest_offset: u64,
        source: NativeResource,
        source_offset: u64,
        size: u64,
    },
    CopyTextureRegion {
        dest: TextureCopyLocation,
        dest_origin: (u32, u32, u32),
        source: TextureCopyLocation,
        source_box: CopyBox,
    },
    CopyResource {
        dest: NativeResource,
        source: NativeResource,
    },
    ClearRenderTargetView {
        view: CpuDescriptorHandle,
        color: [f32; 4],
    },
    ClearDepthStencilView {
        view: CpuDescriptorHandle,
        flags: ClearFlags,
        depth: f32,
        stencil: u8,
    },
    ClearTexture {
        resource: NativeResource,
        method: ClearMethod,
        range: SubresourceRange,
    },
    ResolveSubresource {
        dest: NativeResource,
        dest_subresource: u32,
        source: NativeResource,
        source_subresource: u32,
        format: TextureFormat,
    },
    OmSetRenderTargets {
        render_targets: Vec<CpuDescriptorHandle>,
        depth_stencil: Option<CpuDescriptorHandle>,
    },
    BeginRenderPass {
        render_targets: Vec<RenderPassRenderTargetDesc>,
        depth_stencil: Option<RenderPassDepthStencilDesc>,
        flags: RenderPassFlags,
    },
    EndRenderPass,
    RsSetViewports(Vec<Viewport>),
    RsSetScissorRects(Vec<Rect>),
    OmSetBlendFactor([f32; 4]),
    OmSetStencilRef(u32),
    SetMarker(String),
    BeginEvent(String),
    EndEvent,
}

impl NativeCall {
    #[must_use]
    pub fn is_barrier(&self) -> bool {
        matches!(self, Self::ResourceBarrier(_))
    }

    /// `true` for root descriptor table binds of either heap kind.
    #[must_use]
    pub fn is_descriptor_table(&self) -> bool {
        matches!(self, Self::SetRootDescriptorTable { .. })
    }
}

// ─── RecordingCommandList ─────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct RecordingCommandList {
    calls: Vec<NativeCall>,
}

impl RecordingCommandList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn calls(&self) -> &[NativeCall] {
        &self.calls
    }

    /// Drains the log, leaving the list empty.
    pub fn take_calls(&mut self) -> Vec<NativeCall> {
        std::mem::take(&mut self.calls)
    }

    #[must_use]
    pub fn count(&self, predicate: impl Fn(&NativeCall) -> bool) -> usize {
        self.calls.iter().filter(|call| predicate(call)).count()
    }

    /// Index of the first call matching `predicate`.
    #[must_use]
    pub fn position(&self, predicate: impl Fn(&NativeCall) -> bool) -> Option<usize> {
        self.calls.iter().position(predicate)
    }

    /// Every barrier entry, flattened across `resource_barrier` calls.
    #[must_use]
    pub fn barriers(&self) -> Vec<ResourceBarrier> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                NativeCall::ResourceBarrier(barriers) => Some(barriers.iter().copied()),
                _ => None,
            })
            .flatten()
            .collect()
    }
}

impl NativeCommandList for RecordingCommandList {
    fn set_descriptor_heaps(&mut self, view_heap: NativeHeapId, sampler_heap: NativeHeapId) {
        self.calls.push(NativeCall::SetDescriptorHeaps {
            view_heap,
            sampler_heap,
        });
    }

    fn resource_barrier(&mut self, barriers: &[ResourceBarrier]) {
        self.calls.push(NativeCall::ResourceBarrier(barriers.to_vec()));
    }

    fn set_root_signature(&mut self, bind_point: BindPoint, root_signature: RootSignatureId) {
        self.calls
            .push(NativeCall::SetRootSignature(bind_point, root_signature));
    }

    fn set_pipeline_state(&mut self, pipeline: PipelineStateId) {
        self.calls.push(NativeCall::SetPipelineState(pipeline));
    }

    fn set_ray_tracing_state_object(&mut self, state_object: StateObjectId) {
        self.calls
            .push(NativeCall::SetRayTracingStateObject(state_object));
    }

    fn set_root_descriptor_table(
        &mut self,
        bind_point: BindPoint,
        parameter_index: u32,
        base_descriptor: GpuDescriptorHandle,
    ) {
        self.calls.push(NativeCall::SetRootDescriptorTable {
            bind_point,
            parameter_index,
            base_descriptor,
        });
    }

    fn set_root_constant_buffer_view(
        &mut self,
        bind_point: BindPoint,
        parameter_index: u32,
        location: GpuVirtualAddress,
    ) {
        self.calls.push(NativeCall::SetRootConstantBufferView {
            bind_point,
            parameter_index,
            location,
        });
    }

    fn set_root_unordered_access_view(
        &mut self,
        bind_point: BindPoint,
        parameter_index: u32,
        location: GpuVirtualAddress,
    ) {
        self.calls.push(NativeCall::SetRootUnorderedAccessView {
            bind_point,
            parameter_index,
            location,
        });
    }

    fn set_root_shader_resource_view(
        &mut self,
        bind_point: BindPoint,
        parameter_index: u32,
        location: GpuVirtualAddress,
    ) {
        self.calls.push(NativeCall::SetRootShaderResourceView {
            bind_point,
            parameter_index,
            location,
        });
    }

    fn ia_set_primitive_topology(&mut self, topology: PrimitiveTopology) {
        self.calls.push(NativeCall::IaSetPrimitiveTopology(topology));
    }

    fn ia_set_vertex_buffers(&mut self, start_slot: u32, views: &[VertexBufferView]) {
        self.calls.push(NativeCall::IaSetVertexBuffers {
            start_slot,
            views: views.to_vec(),
        });
    }

    fn ia_set_index_buffer(&mut self, view: &IndexBufferView) {
        self.calls.push(NativeCall::IaSetIndexBuffer(*view));
    }

    fn draw_instanced(
        &mut self,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) {
        self.calls.push(NativeCall::DrawInstanced {
            vertex_count,
            instance_count,
            first_vertex,
            first_instance,
        });
    }

    fn draw_indexed_instanced(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        base_vertex: i32,
        first_instance: u32,
    ) {
        self.calls.push(NativeCall::DrawIndexedInstanced {
            index_count,
            instance_count,
            first_index,
            base_vertex,
            first_instance,
        });
    }

    fn execute_indirect(
        &mut self,
        kind: IndirectCommandKind,
        max_command_count: u32,
        argument_buffer: NativeResource,
        argument_offset: u64,
    ) {
        self.calls.push(NativeCall::ExecuteIndirect {
            kind,
            max_command_count,
            argument_buffer,
            argument_offset,
        });
    }

    fn dispatch(&mut self, x: u32, y: u32, z: u32) {
        self.calls.push(NativeCall::Dispatch(x, y, z));
    }

    fn dispatch_rays(&mut self, desc: &DispatchRaysDesc) {
        self.calls.push(NativeCall::DispatchRays(*desc));
    }

    fn build_raytracing_acceleration_structure(&mut self, desc: &BuildAccelerationStructureDesc) {
        self.calls
            .push(NativeCall::BuildAccelerationStructure(desc.clone()));
    }

    fn copy_raytracing_acceleration_structure(
        &mut self,
        dest: GpuVirtualAddress,
        source: GpuVirtualAddress,
        mode: AccelerationStructureCopyMode,
    ) {
        self.calls
            .push(NativeCall::CopyAccelerationStructure { dest, source, mode });
    }

    fn copy_buffer_region(
        &mut self,
        dest: NativeResource,
        dest_offset: u64,
        source: NativeResource,
        source_offset: u64,
        size: u64,
    ) {
        self.calls.push(NativeCall::CopyBufferRegion {
            dest,
            dest_offset,
            source,
            source_offset,
            size,
        });
    }

    fn copy_texture_region(
        &mut self,
        dest: &TextureCopyLocation,
        dest_x: u32,
        dest_y: u32,
        dest_z: u32,
        source: &TextureCopyLocation,
        source_box: &CopyBox,
    ) {
        self.calls.push(NativeCall::CopyTextureRegion {
            dest: *dest,
            dest_origin: (dest_x, dest_y, dest_z),
            source: *source,
            source_box: *source_box,
        });
    }

    fn copy_resource(&mut self, dest: NativeResource, source: NativeResource) {
        self.calls.push(NativeCall::CopyResource { dest, source });
    }

    fn clear_render_target_view(&mut self, view: CpuDescriptorHandle, color: [f32; 4]) {
        self.calls
            .push(NativeCall::ClearRenderTargetView { view, color });
    }

    fn clear_depth_stencil_view(
        &mut self,
        view: CpuDescriptorHandle,
        flags: ClearFlags,
        depth: f32,
        stencil: u8,
    ) {
        self.calls.push(NativeCall::ClearDepthStencilView {
            view,
            flags,
            depth,
            stencil,
        });
    }

    fn clear_texture(
        &mut self,
        resource: NativeResource,
        method: ClearMethod,
        range: SubresourceRange,
    ) {
        self.calls.push(NativeCall::ClearTexture {
            resource,
            method,
            range,
        });
    }

    fn resolve_subresource(
        &mut self,
        dest: NativeResource,
        dest_subresource: u32,
        source: NativeResource,
        source_subresource: u32,
        format: TextureFormat,
    ) {
        self.calls.push(NativeCall::ResolveSubresource {
            dest,
            dest_subresource,
            source,
            source_subresource,
            format,
        });
    }

    fn om_set_render_targets(
        &mut self,
        render_targets: &[CpuDescriptorHandle],
        depth_stencil: Option<CpuDescriptorHandle>,
    ) {
        self.calls.push(NativeCall::OmSetRenderTargets {
            render_targets: render_targets.to_vec(),
            depth_stencil,
        });
    }

    fn begin_render_pass(
        &mut self,
        render_targets: &[RenderPassRenderTargetDesc],
        depth_stencil: Option<&RenderPassDepthStencilDesc>,
        flags: RenderPassFlags,
    ) {
        self.calls.push(NativeCall::BeginRenderPass {
            render_targets: render_targets.to_vec(),
            depth_stencil: depth_stencil.copied(),
            flags,
        });
    }

    fn end_render_pass(&mut self) {
        self.calls.push(NativeCall::EndRenderPass);
    }

    fn rs_set_viewports(&mut self, viewports: &[Viewport]) {
        self.calls.push(NativeCall::RsSetViewports(viewports.to_vec()));
    }

    fn rs_set_scissor_rects(&mut self, rects: &[Rect]) {
        self.calls.push(NativeCall::RsSetScissorRects(rects.to_vec()));
    }

    fn om_set_blend_factor(&mut self, factor: [f32; 4]) {
        self.calls.push(NativeCall::OmSetBlendFactor(factor));
    }

    fn om_set_stencil_ref(&mut self, reference: u32) {
        self.calls.push(NativeCall::OmSetStencilRef(reference));
    }

    fn set_marker(&mut self, label: &str) {
        self.calls.push(NativeCall::SetMarker(label.to_owned()));
    }

    fn begin_event(&mut self, label: &str) {
        self.calls.push(NativeCall::BeginEvent(label.to_owned()));
    }

    fn end_event(&mut self) {
        self.calls.push(NativeCall::EndEvent);
    }
}

// ─── RecordingDevice ──────────────────────────────────────────────────────────

/// Stride between two descriptors in a recorded heap.
const DESCRIPTOR_INCREMENT: u32 = 32;

/// Address space reserved per recorded heap.
const HEAP_ADDRESS_STRIDE: u64 = 1 << 32;

#[derive(Debug, Default)]
struct DeviceLog {
    next_heap_id: u64,
    heaps_created: u32,
    heap_budget: Option<u32>,
    descriptor_copies: Vec<(DescriptorHeapKind, u32)>,
    releases: FxHashMap<NativeResource, u32>,
}

#[derive(Debug, Default)]
pub struct RecordingDevice {
    log: Mutex<DeviceLog>,
}

impl RecordingDevice {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A device that reports out-of-memory once `budget` heaps exist.
    #[must_use]
    pub fn with_heap_budget(budget: u32) -> Self {
        let device = Self::default();
        device.log.lock().heap_budget = Some(budget);
        device
    }

    #[must_use]
    pub fn heaps_created(&self) -> u32 {
        self.log.lock().heaps_created
    }

    /// Number of `copy_descriptors_simple` calls.
    #[must_use]
    pub fn descriptor_copies(&self) -> usize {
        self.log.lock().descriptor_copies.len()
    }

    #[must_use]
    pub fn descriptor_copies_of(&self, kind: DescriptorHeapKind) -> usize {
        self.log
            .lock()
            .descriptor_copies
            .iter()
            .filter(|(k, _)| *k == kind)
            .count()
    }

    /// How many times the memory backed by `buffer` was released.
    #[must_use]
    pub fn release_count(&self, buffer: NativeResource) -> u32 {
        self.log.lock().releases.get(&buffer).copied().unwrap_or(0)
    }
}

impl NativeDevice for RecordingDevice {
    fn create_shader_visible_heap(
        &self,
        kind: DescriptorHeapKind,
        capacity: u32,
    ) -> Result<NativeHeap, NativeError> {
        let mut log = self.log.lock();
        if log.heap_budget.is_some_and(|budget| log.heaps_created >= budget) {
            return Err(NativeError::out_of_memory("CreateDescriptorHeap"));
        }

        log.next_heap_id += 1;
        log.heaps_created += 1;
        let id = log.next_heap_id;
        let base = id * HEAP_ADDRESS_STRIDE;

        Ok(NativeHeap {
            id: NativeHeapId(id),
            kind,
            capacity,
            cpu_start: CpuDescriptorHandle(base),
            gpu_start: GpuDescriptorHandle(base | 0x8000_0000),
            increment: DESCRIPTOR_INCREMENT,
        })
    }

    fn copy_descriptors_simple(
        &self,
        count: u32,
        _dest: CpuDescriptorHandle,
        _source: CpuDescriptorHandle,
        kind: DescriptorHeapKind,
    ) {
        self.log.lock().descriptor_copies.push((kind, count));
    }

    fn release_memory(&self, memory: &MemoryEntry) {
        *self.log.lock().releases.entry(memory.buffer).or_insert(0) += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heap_budget_reports_out_of_memory() {
        let device = RecordingDevice::with_heap_budget(1);
        assert!(device.create_shader_visible_heap(DescriptorHeapKind::View, 8).is_ok());
        let err = device
            .create_shader_visible_heap(DescriptorHeapKind::View, 8)
            .unwrap_err();
        assert_eq!(err.kind, crate::errors::NativeErrorKind::OutOfMemory);
    }

    #[test]
    fn heaps_have_disjoint_address_ranges() {
        let device = RecordingDevice::new();
        let a = device.create_shader_visible_heap(DescriptorHeapKind::View, 8).unwrap();
        let b = device.create_shader_visible_heap(DescriptorHeapKind::View, 8).unwrap();
        assert_ne!(a.id, b.id);
        assert!(b.gpu_start.0 > a.gpu_start.offset(8, a.increment).0);
    }

    #[test]
    fn barriers_are_flattened() {
        let mut list = RecordingCommandList::new();
        list.resource_barrier(&[ResourceBarrier::Uav { resource: NativeResource(1) }]);
        list.resource_barrier(&[
            ResourceBarrier::Uav { resource: NativeResource(2) },
            ResourceBarrier::Uav { resource: NativeResource(3) },
        ]);
        assert_eq!(list.count(NativeCall::is_barrier), 2);
        assert_eq!(list.barriers().len(), 3);
    }
}

//! Native Device Interface
//!
//! The seam between the replay engine and the driver. The engine records
//! into a [`NativeCommandList`] and asks a [`NativeDevice`] for the few
//! device-level services it needs (shader-visible heaps, descriptor copies,
//! scratch memory release).
//!
//! # Design
//!
//! ```text
//! ┌──────────────────┐   record   ┌──────────────────────┐
//! │  CommandBuffer   │ ─────────→ │ dyn NativeCommandList │
//! │  (replay loop)   │            └──────────────────────┘
//! │                  │   heaps    ┌──────────────────────┐
//! │  Descriptor      │ ─────────→ │ dyn NativeDevice      │
//! │  allocators      │            └──────────────────────┘
//! └──────────────────┘
//! ```
//!
//! Command-list calls mirror the native API one-to-one and cannot fail;
//! native errors are reported when the list is closed, outside this crate.
//! Device calls that allocate return [`NativeError`].
//!
//! [`recording`] provides an implementation of both traits that appends
//! every call to a log, used for headless replay and tests.

pub mod convert;
pub mod recording;
mod types;

pub use types::*;

use crate::errors::NativeError;
use crate::resources::MemoryEntry;

/// A native graphics command list (including the ray tracing extension).
pub trait NativeCommandList {
    // ─── Descriptor Heaps & Barriers ─────────────────────────────────────────

    /// Binds the shader-visible view and sampler heaps.
    fn set_descriptor_heaps(&mut self, view_heap: NativeHeapId, sampler_heap: NativeHeapId);

    fn resource_barrier(&mut self, barriers: &[ResourceBarrier]);

    // ─── Pipeline State ──────────────────────────────────────────────────────

    fn set_root_signature(&mut self, bind_point: BindPoint, root_signature: RootSignatureId);

    fn set_pipeline_state(&mut self, pipeline: PipelineStateId);

    fn set_ray_tracing_state_object(&mut self, state_object: StateObjectId);

    // ─── Root Parameters ─────────────────────────────────────────────────────

    fn set_root_descriptor_table(
        &mut self,
        bind_point: BindPoint,
        parameter_index: u32,
        base_descriptor: GpuDescriptorHandle,
    );

    fn set_root_constant_buffer_view(
        &mut self,
        bind_point: BindPoint,
        parameter_index: u32,
        location: GpuVirtualAddress,
    );

    fn set_root_unordered_access_view(
        &mut self,
        bind_point: BindPoint,
        parameter_index: u32,
        location: GpuVirtualAddress,
    );

    fn set_root_shader_resource_view(
        &mut self,
        bind_point: BindPoint,
        parameter_index: u32,
        location: GpuVirtualAddress,
    );

    // ─── Input Assembler ─────────────────────────────────────────────────────

    fn ia_set_primitive_topology(&mut self, topology: PrimitiveTopology);

    fn ia_set_vertex_buffers(&mut self, start_slot: u32, views: &[VertexBufferView]);

    fn ia_set_index_buffer(&mut self, view: &IndexBufferView);

    // ─── Draw / Dispatch ─────────────────────────────────────────────────────

    fn draw_instanced(
        &mut self,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    );

    fn draw_indexed_instanced(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        base_vertex: i32,
        first_instance: u32,
    );

    fn execute_indirect(
        &mut self,
        kind: IndirectCommandKind,
        max_command_count: u32,
        argument_buffer: NativeResource,
        argument_offset: u64,
    );

    fn dispatch(&mut self, x: u32, y: u32, z: u32);

    fn dispatch_rays(&mut self, desc: &DispatchRaysDesc);

    // ─── Acceleration Structures ─────────────────────────────────────────────

    fn build_raytracing_acceleration_structure(&mut self, desc: &BuildAccelerationStructureDesc);

    fn copy_raytracing_acceleration_structure(
        &mut self,
        dest: GpuVirtualAddress,
        source: GpuVirtualAddress,
        mode: AccelerationStructureCopyMode,
    );

    // ─── Copies & Clears ─────────────────────────────────────────────────────

    fn copy_buffer_region(
        &mut self,
        dest: NativeResource,
        dest_offset: u64,
        source: NativeResource,
        source_offset: u64,
        size: u64,
    );

    fn copy_texture_region(
        &mut self,
        dest: &TextureCopyLocation,
        dest_x: u32,
        dest_y: u32,
        dest_z: u32,
        source: &TextureCopyLocation,
        source_box: &CopyBox,
    );

    fn copy_resource(&mut self, dest: NativeResource, source: NativeResource);

    fn clear_render_target_view(&mut self, view: CpuDescriptorHandle, color: [f32; 4]);

    fn clear_depth_stencil_view(
        &mut self,
        view: CpuDescriptorHandle,
        flags: ClearFlags,
        depth: f32,
        stencil: u8,
    );

    /// Clears a subresource range of a texture to zero using `method`.
    fn clear_texture(
        &mut self,
        resource: NativeResource,
        method: ClearMethod,
        range: SubresourceRange,
    );

    fn resolve_subresource(
        &mut self,
        dest: NativeResource,
        dest_subresource: u32,
        source: NativeResource,
        source_subresource: u32,
        format: crate::resources::TextureFormat,
    );

    // ─── Render Passes ───────────────────────────────────────────────────────

    fn om_set_render_targets(
        &mut self,
        render_targets: &[CpuDescriptorHandle],
        depth_stencil: Option<CpuDescriptorHandle>,
    );

    fn begin_render_pass(
        &mut self,
        render_targets: &[RenderPassRenderTargetDesc],
        depth_stencil: Option<&RenderPassDepthStencilDesc>,
        flags: RenderPassFlags,
    );

    fn end_render_pass(&mut self);

    // ─── Dynamic State ───────────────────────────────────────────────────────

    fn rs_set_viewports(&mut self, viewports: &[Viewport]);

    fn rs_set_scissor_rects(&mut self, rects: &[Rect]);

    fn om_set_blend_factor(&mut self, factor: [f32; 4]);

    fn om_set_stencil_ref(&mut self, reference: u32);

    // ─── Debug ───────────────────────────────────────────────────────────────

    fn set_marker(&mut self, label: &str);

    fn begin_event(&mut self, label: &str);

    fn end_event(&mut self);
}

/// Device-level services used during replay.
///
/// Shared by every replay instance on the device, hence `Send + Sync`.
pub trait NativeDevice: Send + Sync {
    /// Creates a new shader-visible descriptor heap of `capacity` descriptors.
    fn create_shader_visible_heap(
        &self,
        kind: DescriptorHeapKind,
        capacity: u32,
    ) -> Result<NativeHeap, NativeError>;

    /// Copies `count` descriptors from a CPU staging heap into a
    /// shader-visible heap.
    fn copy_descriptors_simple(
        &self,
        count: u32,
        dest: CpuDescriptorHandle,
        source: CpuDescriptorHandle,
        kind: DescriptorHeapKind,
    );

    /// Returns a scratch memory region to the device.
    fn release_memory(&self, memory: &MemoryEntry);
}

impl std::fmt::Debug for dyn NativeDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("NativeDevice")
    }
}

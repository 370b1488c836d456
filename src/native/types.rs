//! Plain data types passed across the native command-list boundary.
//!
//! Every handle is an opaque newtype. The replay engine never dereferences
//! them; it only forwards them to [`NativeCommandList`](super::NativeCommandList)
//! and [`NativeDevice`](super::NativeDevice) calls.

use bitflags::bitflags;

use crate::resources::TextureFormat;

// ─── Handles ──────────────────────────────────────────────────────────────────

/// A native committed or placed resource (buffer or texture).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NativeResource(pub u64);

/// A GPU virtual address.
pub type GpuVirtualAddress = u64;

/// A native descriptor heap object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeHeapId(pub u64);

/// A root signature object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RootSignatureId(pub u64);

/// A graphics or compute pipeline state object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineStateId(pub u64);

/// A ray tracing state object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StateObjectId(pub u64);

/// CPU-side descriptor address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CpuDescriptorHandle(pub u64);

impl CpuDescriptorHandle {
    #[inline]
    #[must_use]
    pub fn offset(self, index: u32, increment: u32) -> Self {
        Self(self.0 + u64::from(index) * u64::from(increment))
    }
}

/// GPU-side descriptor address, only meaningful in a shader-visible heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct GpuDescriptorHandle(pub u64);

impl GpuDescriptorHandle {
    #[inline]
    #[must_use]
    pub fn offset(self, index: u32, increment: u32) -> Self {
        Self(self.0 + u64::from(index) * u64::from(increment))
    }
}

// ─── Descriptor Heaps ─────────────────────────────────────────────────────────

/// The two shader-visible heap kinds. Exactly one heap of each kind is bound
/// to the command list at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorHeapKind {
    /// CBV / SRV / UAV descriptors.
    View,
    Sampler,
}

/// A shader-visible descriptor heap created by the native device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeHeap {
    pub id: NativeHeapId,
    pub kind: DescriptorHeapKind,
    pub capacity: u32,
    pub cpu_start: CpuDescriptorHandle,
    pub gpu_start: GpuDescriptorHandle,
    /// Byte stride between two consecutive descriptors.
    pub increment: u32,
}

// ─── Resource States & Barriers ───────────────────────────────────────────────

bitflags! {
    /// Native resource states. `COMMON` is the empty set.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ResourceStates: u32 {
        const COMMON = 0;
        const VERTEX_AND_CONSTANT_BUFFER = 0x1;
        const INDEX_BUFFER = 0x2;
        const RENDER_TARGET = 0x4;
        const UNORDERED_ACCESS = 0x8;
        const DEPTH_WRITE = 0x10;
        const DEPTH_READ = 0x20;
        const NON_PIXEL_SHADER_RESOURCE = 0x40;
        const PIXEL_SHADER_RESOURCE = 0x80;
        const STREAM_OUT = 0x100;
        const INDIRECT_ARGUMENT = 0x200;
        const COPY_DEST = 0x400;
        const COPY_SOURCE = 0x800;
        const RESOLVE_DEST = 0x1000;
        const RESOLVE_SOURCE = 0x2000;
        const RAYTRACING_ACCELERATION_STRUCTURE = 0x40_0000;

        const GENERIC_READ = Self::VERTEX_AND_CONSTANT_BUFFER.bits()
            | Self::INDEX_BUFFER.bits()
            | Self::NON_PIXEL_SHADER_RESOURCE.bits()
            | Self::PIXEL_SHADER_RESOURCE.bits()
            | Self::INDIRECT_ARGUMENT.bits()
            | Self::COPY_SOURCE.bits();
    }
}

impl ResourceStates {
    /// States that only read from the resource.
    pub const READ_ONLY: Self = Self::VERTEX_AND_CONSTANT_BUFFER
        .union(Self::INDEX_BUFFER)
        .union(Self::DEPTH_READ)
        .union(Self::NON_PIXEL_SHADER_RESOURCE)
        .union(Self::PIXEL_SHADER_RESOURCE)
        .union(Self::INDIRECT_ARGUMENT)
        .union(Self::COPY_SOURCE)
        .union(Self::RESOLVE_SOURCE);

    /// States that may write to the resource.
    pub const WRITE: Self = Self::RENDER_TARGET
        .union(Self::UNORDERED_ACCESS)
        .union(Self::DEPTH_WRITE)
        .union(Self::STREAM_OUT)
        .union(Self::COPY_DEST)
        .union(Self::RESOLVE_DEST);

    /// `true` when the state is a single write state.
    #[inline]
    #[must_use]
    pub fn is_single_write(self) -> bool {
        self.bits().count_ones() == 1 && Self::WRITE.contains(self)
    }

    /// `true` when every bit of the state is a read state.
    #[inline]
    #[must_use]
    pub fn is_read_only(self) -> bool {
        !self.is_empty() && Self::READ_ONLY.contains(self)
    }
}

/// A single entry of a `ResourceBarrier` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceBarrier {
    Transition {
        resource: NativeResource,
        before: ResourceStates,
        after: ResourceStates,
    },
    /// Orders unordered-access writes against subsequent accesses.
    Uav { resource: NativeResource },
}

impl ResourceBarrier {
    #[must_use]
    pub fn resource(&self) -> NativeResource {
        match *self {
            Self::Transition { resource, .. } | Self::Uav { resource } => resource,
        }
    }
}

// ─── Root Bindings ────────────────────────────────────────────────────────────

/// Which root signature slot set a root binding targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindPoint {
    Graphics,
    /// Used by both compute and ray tracing passes.
    Compute,
}

// ─── Input Assembler ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VertexBufferView {
    pub location: GpuVirtualAddress,
    pub size_in_bytes: u64,
    pub stride_in_bytes: u32,
}

/// Native index format. `Unknown` doubles as "no index buffer applied yet".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NativeIndexFormat {
    #[default]
    Unknown,
    R16Uint,
    R32Uint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndexBufferView {
    pub location: GpuVirtualAddress,
    pub size_in_bytes: u64,
    pub format: NativeIndexFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveTopology {
    PointList,
    LineList,
    LineStrip,
    TriangleList,
    TriangleStrip,
}

// ─── Rasterizer / Output Merger ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Viewport {
    pub top_left_x: f32,
    pub top_left_y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClearFlags: u32 {
        const DEPTH = 0x1;
        const STENCIL = 0x2;
    }
}

// ─── Indirect Execution ───────────────────────────────────────────────────────

/// Identifies the command signature used by `ExecuteIndirect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndirectCommandKind {
    Draw,
    DrawIndexed,
    Dispatch,
}

// ─── Ray Tracing ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GpuAddressRange {
    pub start: GpuVirtualAddress,
    pub size_in_bytes: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GpuAddressRangeAndStride {
    pub start: GpuVirtualAddress,
    pub size_in_bytes: u64,
    pub stride_in_bytes: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchRaysDesc {
    pub ray_generation: GpuAddressRange,
    pub miss: GpuAddressRangeAndStride,
    pub hit_group: GpuAddressRangeAndStride,
    pub callable: GpuAddressRangeAndStride,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccelerationStructureType {
    TopLevel,
    BottomLevel,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AccelerationStructureBuildFlags: u32 {
        const ALLOW_UPDATE = 0x1;
        const ALLOW_COMPACTION = 0x2;
        const PREFER_FAST_TRACE = 0x4;
        const PREFER_FAST_BUILD = 0x8;
        const MINIMIZE_MEMORY = 0x10;
        const PERFORM_UPDATE = 0x20;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct NativeGeometryFlags: u32 {
        const OPAQUE = 0x1;
        const NO_DUPLICATE_ANYHIT_INVOCATION = 0x2;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct NativeInstanceFlags: u32 {
        const TRIANGLE_CULL_DISABLE = 0x1;
        const TRIANGLE_FRONT_COUNTERCLOCKWISE = 0x2;
        const FORCE_OPAQUE = 0x4;
        const FORCE_NON_OPAQUE = 0x8;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeGeometryType {
    Triangles,
    ProceduralPrimitiveAabbs,
}

/// One bottom-level geometry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeGeometryDesc {
    pub ty: NativeGeometryType,
    pub flags: NativeGeometryFlags,
    /// Vertex data for triangles, AABB data for procedural geometry.
    pub data: GpuAddressRangeAndStride,
    pub index_buffer: GpuVirtualAddress,
    pub index_count: u32,
    pub index_format: NativeIndexFormat,
}

/// One record of a top-level instance buffer, as the driver reads it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NativeInstanceDesc {
    /// Row-major 3x4 object-to-world transform.
    pub transform: [f32; 12],
    pub instance_id: u32,
    pub instance_mask: u8,
    pub instance_contribution_to_hit_group_index: u32,
    pub flags: NativeInstanceFlags,
    /// Result address of the instanced bottom-level structure.
    pub acceleration_structure: GpuVirtualAddress,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccelerationStructureInputDescs {
    Geometries(Vec<NativeGeometryDesc>),
    Instances {
        /// Address of the packed instance descriptor array.
        address: GpuVirtualAddress,
        count: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccelerationStructureInputs {
    pub ty: AccelerationStructureType,
    pub flags: AccelerationStructureBuildFlags,
    pub descs: AccelerationStructureInputDescs,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildAccelerationStructureDesc {
    pub dest: GpuVirtualAddress,
    pub inputs: AccelerationStructureInputs,
    /// Zero for a fresh build, the destination itself for an in-place update.
    pub source: GpuVirtualAddress,
    pub scratch: GpuVirtualAddress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccelerationStructureCopyMode {
    Clone,
    Compact,
}

// ─── Render Passes ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearValue {
    Color([f32; 4]),
    DepthStencil { depth: f32, stencil: u8 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BeginningAccess {
    Discard,
    Preserve,
    Clear(ClearValue),
    NoAccess,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveParameters {
    pub source: NativeResource,
    pub destination: NativeResource,
    pub source_subresource: u32,
    pub destination_subresource: u32,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    /// Preserve the multisampled source after resolving.
    pub preserve_source: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndingAccess {
    Discard,
    Preserve,
    Resolve(ResolveParameters),
    NoAccess,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderPassRenderTargetDesc {
    pub cpu_descriptor: CpuDescriptorHandle,
    pub beginning_access: BeginningAccess,
    pub ending_access: EndingAccess,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderPassDepthStencilDesc {
    pub cpu_descriptor: CpuDescriptorHandle,
    pub depth_beginning_access: BeginningAccess,
    pub stencil_beginning_access: BeginningAccess,
    pub depth_ending_access: EndingAccess,
    pub stencil_ending_access: EndingAccess,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RenderPassFlags: u32 {
        const ALLOW_UAV_WRITES = 0x1;
    }
}

// ─── Copies ───────────────────────────────────────────────────────────────────

/// Buffer-side layout of a texture copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacedFootprint {
    pub offset: u64,
    pub format: TextureFormat,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub row_pitch: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureCopyLocation {
    Subresource {
        resource: NativeResource,
        index: u32,
    },
    PlacedFootprint {
        resource: NativeResource,
        footprint: PlacedFootprint,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CopyBox {
    pub left: u32,
    pub top: u32,
    pub front: u32,
    pub right: u32,
    pub bottom: u32,
    pub back: u32,
}

/// How a lazily-initialized texture is cleared to zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClearMethod {
    RenderTarget,
    DepthStencil,
    /// Copy from a zero-filled upload buffer.
    Copy,
}

/// Subresource range of a native clear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubresourceRange {
    pub base_mip_level: u32,
    pub level_count: u32,
    pub base_array_layer: u32,
    pub layer_count: u32,
}

//! Command records and their payloads.

use std::sync::Arc;

use smallvec::SmallVec;

use crate::limits::{MAX_COLOR_ATTACHMENTS, MAX_DYNAMIC_BUFFERS_PER_GROUP};
use crate::resources::{
    AccelerationContainer, BindGroup, Buffer, ComputePipeline, Extent3d, Origin3d,
    RayTracingPipeline, RenderPipeline, Texture, TextureView,
};

use super::RenderBundle;

// ─── Render Pass ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadOp {
    Clear,
    Load,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Store,
    /// Contents are discarded at the end of the pass.
    Clear,
}

#[derive(Debug, Clone)]
pub struct RenderPassColorAttachment {
    pub view: Arc<TextureView>,
    pub resolve_target: Option<Arc<TextureView>>,
    pub load_op: LoadOp,
    pub store_op: StoreOp,
    pub clear_color: [f32; 4],
}

#[derive(Debug, Clone)]
pub struct RenderPassDepthStencilAttachment {
    pub view: Arc<TextureView>,
    pub depth_load_op: LoadOp,
    pub depth_store_op: StoreOp,
    pub clear_depth: f32,
    pub stencil_load_op: LoadOp,
    pub stencil_store_op: StoreOp,
    pub clear_stencil: u8,
}

#[derive(Debug, Clone)]
pub struct BeginRenderPassCmd {
    pub color_attachments: SmallVec<[RenderPassColorAttachment; MAX_COLOR_ATTACHMENTS]>,
    pub depth_stencil_attachment: Option<RenderPassDepthStencilAttachment>,
    pub width: u32,
    pub height: u32,
    pub sample_count: u32,
}

// ─── State ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SetBindGroupCmd {
    pub index: u32,
    pub group: Arc<BindGroup>,
    pub dynamic_offsets: SmallVec<[u32; MAX_DYNAMIC_BUFFERS_PER_GROUP]>,
}

#[derive(Debug, Clone)]
pub struct SetVertexBufferCmd {
    pub slot: u32,
    pub buffer: Arc<Buffer>,
    pub offset: u64,
    pub size: u64,
}

#[derive(Debug, Clone)]
pub struct SetIndexBufferCmd {
    pub buffer: Arc<Buffer>,
    pub offset: u64,
    pub size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SetViewportCmd {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetScissorRectCmd {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

// ─── Draw / Dispatch / Trace ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawCmd {
    pub vertex_count: u32,
    pub instance_count: u32,
    pub first_vertex: u32,
    pub first_instance: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawIndexedCmd {
    pub index_count: u32,
    pub instance_count: u32,
    pub first_index: u32,
    pub base_vertex: i32,
    pub first_instance: u32,
}

#[derive(Debug, Clone)]
pub struct IndirectCmd {
    pub indirect_buffer: Arc<Buffer>,
    pub indirect_offset: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchCmd {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

/// Shader table offsets are in records, not bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceRaysCmd {
    pub ray_generation_offset: u32,
    pub ray_hit_offset: u32,
    pub ray_miss_offset: u32,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

// ─── Copies ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct BufferCopyView {
    pub buffer: Arc<Buffer>,
    pub offset: u64,
    pub bytes_per_row: u32,
    pub rows_per_image: u32,
}

#[derive(Debug, Clone)]
pub struct TextureCopyView {
    pub texture: Arc<Texture>,
    pub mip_level: u32,
    pub array_layer: u32,
    pub origin: Origin3d,
}

#[derive(Debug, Clone)]
pub struct CopyBufferToBufferCmd {
    pub source: Arc<Buffer>,
    pub source_offset: u64,
    pub destination: Arc<Buffer>,
    pub destination_offset: u64,
    pub size: u64,
}

#[derive(Debug, Clone)]
pub struct CopyBufferToTextureCmd {
    pub source: BufferCopyView,
    pub destination: TextureCopyView,
    pub copy_size: Extent3d,
}

#[derive(Debug, Clone)]
pub struct CopyTextureToBufferCmd {
    pub source: TextureCopyView,
    pub destination: BufferCopyView,
    pub copy_size: Extent3d,
}

#[derive(Debug, Clone)]
pub struct CopyTextureToTextureCmd {
    pub source: TextureCopyView,
    pub destination: TextureCopyView,
    pub copy_size: Extent3d,
}

#[derive(Debug, Clone)]
pub struct CopyAccelerationContainerCmd {
    pub source: Arc<AccelerationContainer>,
    pub destination: Arc<AccelerationContainer>,
}

// ─── Command ──────────────────────────────────────────────────────────────────

/// One recorded command.
///
/// Pass-scoped commands appear between a `Begin*Pass` and its matching
/// `End*Pass`; copies and acceleration container commands appear between
/// passes.
#[derive(Debug, Clone)]
pub enum Command {
    BeginComputePass,
    EndComputePass,
    BeginRenderPass(Box<BeginRenderPassCmd>),
    EndRenderPass,
    BeginRayTracingPass,
    EndRayTracingPass,

    SetComputePipeline(Arc<ComputePipeline>),
    SetRenderPipeline(Arc<RenderPipeline>),
    SetRayTracingPipeline(Arc<RayTracingPipeline>),
    SetBindGroup(SetBindGroupCmd),
    SetVertexBuffer(SetVertexBufferCmd),
    SetIndexBuffer(SetIndexBufferCmd),

    Draw(DrawCmd),
    DrawIndexed(DrawIndexedCmd),
    DrawIndirect(IndirectCmd),
    DrawIndexedIndirect(IndirectCmd),
    Dispatch(DispatchCmd),
    DispatchIndirect(IndirectCmd),
    TraceRays(TraceRaysCmd),

    SetStencilReference(u32),
    SetViewport(SetViewportCmd),
    SetScissorRect(SetScissorRectCmd),
    SetBlendColor([f32; 4]),
    ExecuteBundles(Vec<Arc<RenderBundle>>),

    CopyBufferToBuffer(CopyBufferToBufferCmd),
    CopyBufferToTexture(CopyBufferToTextureCmd),
    CopyTextureToBuffer(CopyTextureToBufferCmd),
    CopyTextureToTexture(CopyTextureToTextureCmd),

    BuildAccelerationContainer(Arc<AccelerationContainer>),
    UpdateAccelerationContainer(Arc<AccelerationContainer>),
    CopyAccelerationContainer(CopyAccelerationContainerCmd),

    InsertDebugMarker(String),
    PushDebugGroup(String),
    PopDebugGroup,
}

impl Command {
    /// Tag name, used in diagnostics.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::BeginComputePass => "BeginComputePass",
            Self::EndComputePass => "EndComputePass",
            Self::BeginRenderPass(_) => "BeginRenderPass",
            Self::EndRenderPass => "EndRenderPass",
            Self::BeginRayTracingPass => "BeginRayTracingPass",
            Self::EndRayTracingPass => "EndRayTracingPass",
            Self::SetComputePipeline(_) => "SetComputePipeline",
            Self::SetRenderPipeline(_) => "SetRenderPipeline",
            Self::SetRayTracingPipeline(_) => "SetRayTracingPipeline",
            Self::SetBindGroup(_) => "SetBindGroup",
            Self::SetVertexBuffer(_) => "SetVertexBuffer",
            Self::SetIndexBuffer(_) => "SetIndexBuffer",
            Self::Draw(_) => "Draw",
            Self::DrawIndexed(_) => "DrawIndexed",
            Self::DrawIndirect(_) => "DrawIndirect",
            Self::DrawIndexedIndirect(_) => "DrawIndexedIndirect",
            Self::Dispatch(_) => "Dispatch",
            Self::DispatchIndirect(_) => "DispatchIndirect",
            Self::TraceRays(_) => "TraceRays",
            Self::SetStencilReference(_) => "SetStencilReference",
            Self::SetViewport(_) => "SetViewport",
            Self::SetScissorRect(_) => "SetScissorRect",
            Self::SetBlendColor(_) => "SetBlendColor",
            Self::ExecuteBundles(_) => "ExecuteBundles",
            Self::CopyBufferToBuffer(_) => "CopyBufferToBuffer",
            Self::CopyBufferToTexture(_) => "CopyBufferToTexture",
            Self::CopyTextureToBuffer(_) => "CopyTextureToBuffer",
            Self::CopyTextureToTexture(_) => "CopyTextureToTexture",
            Self::BuildAccelerationContainer(_) => "BuildAccelerationContainer",
            Self::UpdateAccelerationContainer(_) => "UpdateAccelerationContainer",
            Self::CopyAccelerationContainer(_) => "CopyAccelerationContainer",
            Self::InsertDebugMarker(_) => "InsertDebugMarker",
            Self::PushDebugGroup(_) => "PushDebugGroup",
            Self::PopDebugGroup => "PopDebugGroup",
        }
    }

    /// Commands a render bundle may contain.
    #[must_use]
    pub fn is_bundle_command(&self) -> bool {
        matches!(
            self,
            Self::SetRenderPipeline(_)
                | Self::SetBindGroup(_)
                | Self::SetVertexBuffer(_)
                | Self::SetIndexBuffer(_)
                | Self::Draw(_)
                | Self::DrawIndexed(_)
                | Self::DrawIndirect(_)
                | Self::DrawIndexedIndirect(_)
                | Self::InsertDebugMarker(_)
                | Self::PushDebugGroup(_)
                | Self::PopDebugGroup
        )
    }
}

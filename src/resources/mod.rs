//! Frontend object model consumed by the replay engine.
//!
//! Objects are created and validated by the frontend; replay only reads
//! them and updates their tracked native state:
//! - Buffer / Texture / TextureView: native resources with state tracking
//! - Sampler
//! - BindGroupLayout / BindGroup: binding sets and their descriptor tables
//! - PipelineLayout and the render, compute and ray tracing pipelines
//! - AccelerationContainer: ray tracing structures and their scratch memory
//! - PassResourceUsage: per-pass usage sets computed by validation

pub mod acceleration;
pub mod bind_group;
pub mod buffer;
pub mod pipeline;
pub mod sampler;
pub mod texture;
pub mod tracked;
pub mod usage;

pub use acceleration::{
    AccelerationContainer, AccelerationContainerDescriptor, ContainerFlags, ContainerLevel,
    GeometryDescriptor, GeometryFlags, GeometryIndexData, GeometryType, InstanceDescriptor,
    InstanceFlags, MemoryEntry, ScratchMemory,
};
pub use bind_group::{
    BindGroup, BindGroupLayout, BindGroupLayoutEntry, BindingResource, BindingType, BufferBinding,
    StagingDescriptors,
};
pub use buffer::{Buffer, BufferDescriptor, MemoryLocation};
pub use pipeline::{
    ComputePipeline, IndexFormat, PipelineLayout, PrimitiveKind, RayTracingPipeline,
    RenderPipeline, RenderPipelineDescriptor, ShaderBindingTable,
};
pub use sampler::Sampler;
pub use texture::{
    Extent3d, Origin3d, Texture, TextureDescriptor, TextureDimension, TextureFormat, TextureView,
    TextureViewDescriptor,
};
pub use tracked::ResourceId;
pub use usage::{BufferUsage, CommandBufferResourceUsage, PassResourceUsage, TextureUsage};

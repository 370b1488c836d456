//! Frontend → native enum and flag conversions.

use crate::resources::{
    BufferUsage, ContainerFlags, ContainerLevel, Extent3d, GeometryFlags, GeometryType,
    IndexFormat, InstanceFlags, Origin3d, PrimitiveKind, TextureFormat, TextureUsage,
};

use super::{
    AccelerationStructureBuildFlags, AccelerationStructureType, CopyBox, NativeGeometryFlags,
    NativeGeometryType, NativeIndexFormat, NativeInstanceFlags, PrimitiveTopology, ResourceStates,
};

// ─── Resource States ──────────────────────────────────────────────────────────

/// Native state required by a combined buffer usage.
///
/// Map usages have no native state; mappable buffers live in fixed-state
/// heaps and are never transitioned.
#[must_use]
pub fn buffer_usage_to_states(usage: BufferUsage) -> ResourceStates {
    let mut states = ResourceStates::COMMON;

    if usage.contains(BufferUsage::COPY_SRC) {
        states |= ResourceStates::COPY_SOURCE;
    }
    if usage.contains(BufferUsage::COPY_DST) {
        states |= ResourceStates::COPY_DEST;
    }
    if usage.intersects(BufferUsage::VERTEX | BufferUsage::UNIFORM) {
        states |= ResourceStates::VERTEX_AND_CONSTANT_BUFFER;
    }
    if usage.contains(BufferUsage::INDEX) {
        states |= ResourceStates::INDEX_BUFFER;
    }
    if usage.contains(BufferUsage::STORAGE) {
        states |= ResourceStates::UNORDERED_ACCESS;
    }
    if usage.contains(BufferUsage::READONLY_STORAGE) {
        states |= ResourceStates::PIXEL_SHADER_RESOURCE | ResourceStates::NON_PIXEL_SHADER_RESOURCE;
    }
    if usage.contains(BufferUsage::INDIRECT) {
        states |= ResourceStates::INDIRECT_ARGUMENT;
    }

    states
}

/// Native state required by a combined texture usage.
#[must_use]
pub fn texture_usage_to_states(usage: TextureUsage, format: TextureFormat) -> ResourceStates {
    let mut states = ResourceStates::COMMON;

    if usage.contains(TextureUsage::COPY_SRC) {
        states |= ResourceStates::COPY_SOURCE;
    }
    if usage.contains(TextureUsage::COPY_DST) {
        states |= ResourceStates::COPY_DEST;
    }
    if usage.intersects(TextureUsage::SAMPLED | TextureUsage::READONLY_STORAGE) {
        states |= ResourceStates::PIXEL_SHADER_RESOURCE | ResourceStates::NON_PIXEL_SHADER_RESOURCE;
    }
    if usage.contains(TextureUsage::STORAGE) {
        states |= ResourceStates::UNORDERED_ACCESS;
    }
    if usage.contains(TextureUsage::OUTPUT_ATTACHMENT) {
        if format.has_depth_or_stencil() {
            states |= ResourceStates::DEPTH_WRITE;
        } else {
            states |= ResourceStates::RENDER_TARGET;
        }
    }

    states
}

// ─── Input Assembler ──────────────────────────────────────────────────────────

#[must_use]
pub fn index_format(format: IndexFormat) -> NativeIndexFormat {
    match format {
        IndexFormat::Uint16 => NativeIndexFormat::R16Uint,
        IndexFormat::Uint32 => NativeIndexFormat::R32Uint,
    }
}

#[must_use]
pub fn primitive_topology(kind: PrimitiveKind) -> PrimitiveTopology {
    match kind {
        PrimitiveKind::PointList => PrimitiveTopology::PointList,
        PrimitiveKind::LineList => PrimitiveTopology::LineList,
        PrimitiveKind::LineStrip => PrimitiveTopology::LineStrip,
        PrimitiveKind::TriangleList => PrimitiveTopology::TriangleList,
        PrimitiveKind::TriangleStrip => PrimitiveTopology::TriangleStrip,
    }
}

// ─── Acceleration Containers ──────────────────────────────────────────────────

#[must_use]
pub fn container_level(level: ContainerLevel) -> AccelerationStructureType {
    match level {
        ContainerLevel::Bottom => AccelerationStructureType::BottomLevel,
        ContainerLevel::Top => AccelerationStructureType::TopLevel,
    }
}

#[must_use]
pub fn geometry_type(ty: GeometryType) -> NativeGeometryType {
    match ty {
        GeometryType::Triangles => NativeGeometryType::Triangles,
        GeometryType::Aabbs => NativeGeometryType::ProceduralPrimitiveAabbs,
    }
}

#[must_use]
pub fn container_build_flags(flags: ContainerFlags) -> AccelerationStructureBuildFlags {
    let mut native = AccelerationStructureBuildFlags::empty();
    if flags.contains(ContainerFlags::ALLOW_UPDATE) {
        native |= AccelerationStructureBuildFlags::ALLOW_UPDATE;
    }
    if flags.contains(ContainerFlags::PREFER_FAST_BUILD) {
        native |= AccelerationStructureBuildFlags::PREFER_FAST_BUILD;
    }
    if flags.contains(ContainerFlags::PREFER_FAST_TRACE) {
        native |= AccelerationStructureBuildFlags::PREFER_FAST_TRACE;
    }
    if flags.contains(ContainerFlags::LOW_MEMORY) {
        native |= AccelerationStructureBuildFlags::MINIMIZE_MEMORY;
    }
    native
}

#[must_use]
pub fn geometry_flags(flags: GeometryFlags) -> NativeGeometryFlags {
    let mut native = NativeGeometryFlags::empty();
    if flags.contains(GeometryFlags::OPAQUE) {
        native |= NativeGeometryFlags::OPAQUE;
    }
    if flags.contains(GeometryFlags::ALLOW_ANY_HIT) {
        native |= NativeGeometryFlags::NO_DUPLICATE_ANYHIT_INVOCATION;
    }
    native
}

#[must_use]
pub fn instance_flags(flags: InstanceFlags) -> NativeInstanceFlags {
    let mut native = NativeInstanceFlags::empty();
    if flags.contains(InstanceFlags::TRIANGLE_CULL_DISABLE) {
        native |= NativeInstanceFlags::TRIANGLE_CULL_DISABLE;
    }
    if flags.contains(InstanceFlags::TRIANGLE_FRONT_COUNTERCLOCKWISE) {
        native |= NativeInstanceFlags::TRIANGLE_FRONT_COUNTERCLOCKWISE;
    }
    if flags.contains(InstanceFlags::FORCE_OPAQUE) {
        native |= NativeInstanceFlags::FORCE_OPAQUE;
    }
    if flags.contains(InstanceFlags::FORCE_NO_OPAQUE) {
        native |= NativeInstanceFlags::FORCE_NON_OPAQUE;
    }
    native
}

// ─── Copies ───────────────────────────────────────────────────────────────────

#[must_use]
pub fn copy_box(origin: Origin3d, size: Extent3d) -> CopyBox {
    CopyBox {
        left: origin.x,
        top: origin.y,
        front: origin.z,
        right: origin.x + size.width,
        bottom: origin.y + size.height,
        back: origin.z + size.depth,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_and_vertex_share_one_state() {
        let states = buffer_usage_to_states(BufferUsage::VERTEX | BufferUsage::UNIFORM);
        assert_eq!(states, ResourceStates::VERTEX_AND_CONSTANT_BUFFER);
    }

    #[test]
    fn map_usage_has_no_native_state() {
        assert_eq!(
            buffer_usage_to_states(BufferUsage::MAP_READ),
            ResourceStates::COMMON
        );
    }

    #[test]
    fn depth_attachment_uses_depth_write() {
        let states =
            texture_usage_to_states(TextureUsage::OUTPUT_ATTACHMENT, TextureFormat::Depth32Float);
        assert_eq!(states, ResourceStates::DEPTH_WRITE);

        let states =
            texture_usage_to_states(TextureUsage::OUTPUT_ATTACHMENT, TextureFormat::Rgba8Unorm);
        assert_eq!(states, ResourceStates::RENDER_TARGET);
    }

    #[test]
    fn low_memory_maps_to_minimize_memory() {
        let native = container_build_flags(ContainerFlags::ALLOW_UPDATE | ContainerFlags::LOW_MEMORY);
        assert_eq!(
            native,
            AccelerationStructureBuildFlags::ALLOW_UPDATE
                | AccelerationStructureBuildFlags::MINIMIZE_MEMORY
        );
    }

    #[test]
    fn any_hit_maps_to_no_duplicate_invocation() {
        assert_eq!(
            geometry_flags(GeometryFlags::ALLOW_ANY_HIT),
            NativeGeometryFlags::NO_DUPLICATE_ANYHIT_INVOCATION
        );
    }

    #[test]
    fn copy_box_spans_origin_plus_size() {
        let b = copy_box(
            Origin3d { x: 1, y: 2, z: 0 },
            Extent3d { width: 4, height: 8, depth: 1 },
        );
        assert_eq!((b.left, b.top, b.front), (1, 2, 0));
        assert_eq!((b.right, b.bottom, b.back), (5, 10, 1));
    }
}

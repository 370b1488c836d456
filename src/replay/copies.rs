//! Buffer and texture copies recorded between passes.
//!
//! Every copy transitions its operands immediately. Texture sources are
//! lazily cleared before being read; a destination is only cleared when the
//! copy leaves part of a subresource untouched.
//!
//! Native texture copies address one subresource at a time, so copies of
//! several 2D array layers are issued layer by layer.

use crate::commands::{
    CopyBufferToBufferCmd, CopyBufferToTextureCmd, CopyTextureToBufferCmd,
    CopyTextureToTextureCmd, TextureCopyView,
};
use crate::native::convert::copy_box;
use crate::native::{PlacedFootprint, SubresourceRange, TextureCopyLocation};
use crate::resources::{BufferUsage, Extent3d, Origin3d, Texture, TextureDimension, TextureUsage};

use super::CommandRecordingContext;

// ─── Helpers ──────────────────────────────────────────────────────────────────

/// Array layers touched by a copy of `size` into a texture.
fn copy_layer_count(texture: &Texture, size: Extent3d) -> u32 {
    match texture.dimension() {
        TextureDimension::D2 => size.depth.max(1),
        TextureDimension::D1 | TextureDimension::D3 => 1,
    }
}

/// Extent of one native copy: a single layer for 2D arrays.
fn per_layer_extent(texture: &Texture, size: Extent3d) -> Extent3d {
    match texture.dimension() {
        TextureDimension::D2 => Extent3d { depth: 1, ..size },
        TextureDimension::D1 | TextureDimension::D3 => size,
    }
}

fn copy_range(view: &TextureCopyView, size: Extent3d) -> SubresourceRange {
    SubresourceRange {
        base_mip_level: view.mip_level,
        level_count: 1,
        base_array_layer: view.array_layer,
        layer_count: copy_layer_count(&view.texture, size),
    }
}

/// Whether the copy overwrites every texel of each subresource it touches.
fn is_complete_subresource_copied_to(texture: &Texture, size: Extent3d, mip_level: u32) -> bool {
    let extent = texture.mip_size(mip_level);
    extent == per_layer_extent(texture, size)
}

/// Marks a fully covered destination initialized, or clears it first.
fn initialize_destination(
    ctx: &mut CommandRecordingContext<'_>,
    view: &TextureCopyView,
    size: Extent3d,
) {
    let range = copy_range(view, size);
    if is_complete_subresource_copied_to(&view.texture, size, view.mip_level) {
        view.texture.set_is_subresource_content_initialized(true, range);
    } else {
        view.texture.ensure_subresource_content_initialized(ctx, range);
    }
}

/// Bytes between two consecutive layers in a linear buffer layout.
fn layer_pitch(bytes_per_row: u32, rows_per_image: u32, size: Extent3d) -> u64 {
    let rows = if rows_per_image == 0 {
        size.height
    } else {
        rows_per_image
    };
    u64::from(bytes_per_row) * u64::from(rows)
}

/// Whole-resource copies need two identical single-mip textures fully
/// covered by the copy.
fn can_use_copy_resource(source: &Texture, destination: &Texture, size: Extent3d) -> bool {
    let source_size = source.size();
    let destination_size = destination.size();

    source.dimension() == destination.dimension()
        && source.mip_level_count() == 1
        && destination.mip_level_count() == 1
        && source_size.width == destination_size.width
        && source_size.width == size.width
        && source_size.height == destination_size.height
        && source_size.height == size.height
        && source.copy_depth() == destination.copy_depth()
        && source.copy_depth() == size.depth
}

// ─── Copies ───────────────────────────────────────────────────────────────────

pub fn copy_buffer_to_buffer(ctx: &mut CommandRecordingContext<'_>, copy: &CopyBufferToBufferCmd) {
    copy.source
        .track_usage_and_transition_now(ctx, BufferUsage::COPY_SRC);
    copy.destination
        .track_usage_and_transition_now(ctx, BufferUsage::COPY_DST);

    ctx.list().copy_buffer_region(
        copy.destination.native(),
        copy.destination_offset,
        copy.source.native(),
        copy.source_offset,
        copy.size,
    );
}

pub fn copy_buffer_to_texture(ctx: &mut CommandRecordingContext<'_>, copy: &CopyBufferToTextureCmd) {
    let source = &copy.source;
    let destination = &copy.destination;
    let texture = &destination.texture;

    initialize_destination(ctx, destination, copy.copy_size);

    source
        .buffer
        .track_usage_and_transition_now(ctx, BufferUsage::COPY_SRC);
    texture.track_usage_and_transition_now(ctx, TextureUsage::COPY_DST);

    let extent = per_layer_extent(texture, copy.copy_size);
    let pitch = layer_pitch(source.bytes_per_row, source.rows_per_image, extent);
    let source_box = copy_box(Origin3d::default(), extent);

    for layer in 0..copy_layer_count(texture, copy.copy_size) {
        let dest = TextureCopyLocation::Subresource {
            resource: texture.native(),
            index: texture.subresource_index(destination.mip_level, destination.array_layer + layer),
        };
        let footprint = TextureCopyLocation::PlacedFootprint {
            resource: source.buffer.native(),
            footprint: PlacedFootprint {
                offset: source.offset + u64::from(layer) * pitch,
                format: texture.format(),
                width: extent.width,
                height: extent.height,
                depth: extent.depth,
                row_pitch: source.bytes_per_row,
            },
        };
        ctx.list().copy_texture_region(
            &dest,
            destination.origin.x,
            destination.origin.y,
            destination.origin.z,
            &footprint,
            &source_box,
        );
    }
}

pub fn copy_texture_to_buffer(ctx: &mut CommandRecordingContext<'_>, copy: &CopyTextureToBufferCmd) {
    let source = &copy.source;
    let destination = &copy.destination;
    let texture = &source.texture;

    texture.ensure_subresource_content_initialized(ctx, copy_range(source, copy.copy_size));

    texture.track_usage_and_transition_now(ctx, TextureUsage::COPY_SRC);
    destination
        .buffer
        .track_usage_and_transition_now(ctx, BufferUsage::COPY_DST);

    let extent = per_layer_extent(texture, copy.copy_size);
    let pitch = layer_pitch(destination.bytes_per_row, destination.rows_per_image, extent);
    let source_box = copy_box(source.origin, extent);

    for layer in 0..copy_layer_count(texture, copy.copy_size) {
        let footprint = TextureCopyLocation::PlacedFootprint {
            resource: destination.buffer.native(),
            footprint: PlacedFootprint {
                offset: destination.offset + u64::from(layer) * pitch,
                format: texture.format(),
                width: extent.width,
                height: extent.height,
                depth: extent.depth,
                row_pitch: destination.bytes_per_row,
            },
        };
        let subresource = TextureCopyLocation::Subresource {
            resource: texture.native(),
            index: texture.subresource_index(source.mip_level, source.array_layer + layer),
        };
        ctx.list()
            .copy_texture_region(&footprint, 0, 0, 0, &subresource, &source_box);
    }
}

pub fn copy_texture_to_texture(ctx: &mut CommandRecordingContext<'_>, copy: &CopyTextureToTextureCmd) {
    let source = &copy.source;
    let destination = &copy.destination;

    source
        .texture
        .ensure_subresource_content_initialized(ctx, copy_range(source, copy.copy_size));
    initialize_destination(ctx, destination, copy.copy_size);

    source
        .texture
        .track_usage_and_transition_now(ctx, TextureUsage::COPY_SRC);
    destination
        .texture
        .track_usage_and_transition_now(ctx, TextureUsage::COPY_DST);

    if can_use_copy_resource(&source.texture, &destination.texture, copy.copy_size) {
        ctx.list()
            .copy_resource(destination.texture.native(), source.texture.native());
        return;
    }

    let extent = per_layer_extent(&source.texture, copy.copy_size);
    let source_box = copy_box(source.origin, extent);
    for layer in 0..copy_layer_count(&source.texture, copy.copy_size) {
        let dest = TextureCopyLocation::Subresource {
            resource: destination.texture.native(),
            index: destination
                .texture
                .subresource_index(destination.mip_level, destination.array_layer + layer),
        };
        let src = TextureCopyLocation::Subresource {
            resource: source.texture.native(),
            index: source
                .texture
                .subresource_index(source.mip_level, source.array_layer + layer),
        };
        ctx.list().copy_texture_region(
            &dest,
            destination.origin.x,
            destination.origin.y,
            destination.origin.z,
            &src,
            &source_box,
        );
    }
}

use std::sync::Arc;

use crate::commands::{Command, CommandIterator};
use crate::errors::{ReplayError, Result};
use crate::native::convert::primitive_topology;
use crate::native::{BindPoint, IndirectCommandKind, Rect, Viewport};
use crate::resources::RenderPipeline;

use super::super::buffer_trackers::{IndexBufferTracker, VertexBufferTracker};
use super::super::render_pass::{RenderPassAttachmentPlan, RenderPassBuilder};
use super::super::{BindGroupStateTracker, CommandRecordingContext};
use super::{record_debug_marker, unexpected, unterminated};

/// State shared by the pass loop and the bundles it executes.
struct RenderEncoder<'c> {
    vertex_buffers: VertexBufferTracker,
    index_buffer: IndexBufferTracker,
    last_pipeline: Option<&'c Arc<RenderPipeline>>,
}

impl<'c> RenderEncoder<'c> {
    fn pipeline(&self, command: &Command) -> Result<&'c Arc<RenderPipeline>> {
        self.last_pipeline.ok_or_else(|| {
            ReplayError::unreachable(format!("{} without a render pipeline", command.name()))
        })
    }

    /// Encodes a command valid both in a render pass and in a render bundle.
    /// Returns `false` for anything else.
    fn encode(
        &mut self,
        ctx: &mut CommandRecordingContext<'_>,
        bindings: &mut BindGroupStateTracker,
        command: &'c Command,
    ) -> Result<bool> {
        match command {
            Command::Draw(draw) => {
                let pipeline = self.pipeline(command)?;
                bindings.apply(ctx)?;
                self.vertex_buffers.apply(ctx.list(), pipeline);
                ctx.list().draw_instanced(
                    draw.vertex_count,
                    draw.instance_count,
                    draw.first_vertex,
                    draw.first_instance,
                );
            }

            Command::DrawIndexed(draw) => {
                let pipeline = self.pipeline(command)?;
                bindings.apply(ctx)?;
                self.index_buffer.apply(ctx.list());
                self.vertex_buffers.apply(ctx.list(), pipeline);
                ctx.list().draw_indexed_instanced(
                    draw.index_count,
                    draw.instance_count,
                    draw.first_index,
                    draw.base_vertex,
                    draw.first_instance,
                );
            }

            Command::DrawIndirect(indirect) => {
                let pipeline = self.pipeline(command)?;
                bindings.apply(ctx)?;
                self.vertex_buffers.apply(ctx.list(), pipeline);
                ctx.list().execute_indirect(
                    IndirectCommandKind::Draw,
                    1,
                    indirect.indirect_buffer.native(),
                    indirect.indirect_offset,
                );
            }

            Command::DrawIndexedIndirect(indirect) => {
                let pipeline = self.pipeline(command)?;
                bindings.apply(ctx)?;
                self.index_buffer.apply(ctx.list());
                self.vertex_buffers.apply(ctx.list(), pipeline);
                ctx.list().execute_indirect(
                    IndirectCommandKind::DrawIndexed,
                    1,
                    indirect.indirect_buffer.native(),
                    indirect.indirect_offset,
                );
            }

            Command::SetRenderPipeline(pipeline) => {
                let list = ctx.list();
                list.set_root_signature(BindPoint::Graphics, pipeline.layout().root_signature());
                list.set_pipeline_state(pipeline.pipeline_state());
                list.ia_set_primitive_topology(primitive_topology(pipeline.primitive()));

                bindings.on_set_pipeline(pipeline.layout());
                self.index_buffer.on_set_pipeline(pipeline);
                self.last_pipeline = Some(pipeline);
            }

            Command::SetBindGroup(cmd) => {
                bindings.on_set_bind_group(cmd.index, &cmd.group, &cmd.dynamic_offsets)?;
            }

            Command::SetIndexBuffer(cmd) => {
                self.index_buffer
                    .on_set_index_buffer(&cmd.buffer, cmd.offset, cmd.size);
            }

            Command::SetVertexBuffer(cmd) => {
                self.vertex_buffers
                    .on_set_vertex_buffer(cmd.slot, &cmd.buffer, cmd.offset, cmd.size)?;
            }

            other => return Ok(record_debug_marker(ctx, other)),
        }
        Ok(true)
    }
}

/// Replays a render pass up to `EndRenderPass`.
///
/// `plan` carries the attachments after lazy clears; `has_uav` reports
/// whether the pass writes storage resources.
pub fn record_render_pass(
    ctx: &mut CommandRecordingContext<'_>,
    bindings: &mut BindGroupStateTracker,
    plan: &RenderPassAttachmentPlan,
    has_uav: bool,
    commands: &mut CommandIterator<'_>,
) -> Result<()> {
    let use_native = ctx.device().settings().use_native_render_pass;
    let builder = RenderPassBuilder::new(ctx, plan, has_uav);
    builder.begin(ctx, use_native);

    // Default dynamic state covers the whole attachment area.
    {
        let list = ctx.list();
        list.rs_set_viewports(&[Viewport {
            top_left_x: 0.0,
            top_left_y: 0.0,
            width: plan.width as f32,
            height: plan.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }]);
        list.rs_set_scissor_rects(&[Rect {
            left: 0,
            top: 0,
            right: plan.width as i32,
            bottom: plan.height as i32,
        }]);
        list.om_set_blend_factor([0.0; 4]);
    }

    let mut encoder = RenderEncoder {
        vertex_buffers: VertexBufferTracker::new(),
        index_buffer: IndexBufferTracker::new(),
        last_pipeline: None,
    };

    for command in commands.by_ref() {
        match command {
            Command::EndRenderPass => {
                builder.end(ctx, use_native);
                return Ok(());
            }

            Command::SetStencilReference(reference) => {
                ctx.list().om_set_stencil_ref(*reference);
            }

            Command::SetViewport(viewport) => {
                ctx.list().rs_set_viewports(&[Viewport {
                    top_left_x: viewport.x,
                    top_left_y: viewport.y,
                    width: viewport.width,
                    height: viewport.height,
                    min_depth: viewport.min_depth,
                    max_depth: viewport.max_depth,
                }]);
            }

            Command::SetScissorRect(scissor) => {
                ctx.list().rs_set_scissor_rects(&[Rect {
                    left: scissor.x as i32,
                    top: scissor.y as i32,
                    right: (scissor.x + scissor.width) as i32,
                    bottom: (scissor.y + scissor.height) as i32,
                }]);
            }

            Command::SetBlendColor(color) => {
                ctx.list().om_set_blend_factor(*color);
            }

            Command::ExecuteBundles(bundles) => {
                for bundle in bundles {
                    for bundle_command in bundle.commands().commands() {
                        if !encoder.encode(ctx, bindings, bundle_command)? {
                            return Err(unexpected(bundle_command, "a render bundle"));
                        }
                    }
                }
            }

            other => {
                if !encoder.encode(ctx, bindings, other)? {
                    return Err(unexpected(other, "a render pass"));
                }
            }
        }
    }
    unterminated("a render pass")
}

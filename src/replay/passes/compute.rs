use crate::commands::{Command, CommandIterator};
use crate::errors::Result;
use crate::native::{BindPoint, IndirectCommandKind};

use super::super::{BindGroupStateTracker, CommandRecordingContext};
use super::{record_debug_marker, unexpected, unterminated};

/// Replays a compute pass up to `EndComputePass`.
pub fn record_compute_pass(
    ctx: &mut CommandRecordingContext<'_>,
    bindings: &mut BindGroupStateTracker,
    commands: &mut CommandIterator<'_>,
) -> Result<()> {
    for command in commands.by_ref() {
        match command {
            Command::EndComputePass => return Ok(()),

            Command::SetComputePipeline(pipeline) => {
                let list = ctx.list();
                list.set_root_signature(BindPoint::Compute, pipeline.layout().root_signature());
                list.set_pipeline_state(pipeline.pipeline_state());
                bindings.on_set_pipeline(pipeline.layout());
            }

            Command::SetBindGroup(cmd) => {
                bindings.on_set_bind_group(cmd.index, &cmd.group, &cmd.dynamic_offsets)?;
            }

            Command::Dispatch(dispatch) => {
                bindings.apply(ctx)?;
                ctx.list().dispatch(dispatch.x, dispatch.y, dispatch.z);
            }

            Command::DispatchIndirect(indirect) => {
                bindings.apply(ctx)?;
                ctx.list().execute_indirect(
                    IndirectCommandKind::Dispatch,
                    1,
                    indirect.indirect_buffer.native(),
                    indirect.indirect_offset,
                );
            }

            other => {
                if !record_debug_marker(ctx, other) {
                    return Err(unexpected(other, "a compute pass"));
                }
            }
        }
    }
    unterminated("a compute pass")
}

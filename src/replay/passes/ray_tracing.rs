use std::sync::Arc;

use crate::commands::{Command, CommandIterator, TraceRaysCmd};
use crate::errors::{ReplayError, Result};
use crate::native::{BindPoint, DispatchRaysDesc, GpuAddressRange, GpuAddressRangeAndStride};
use crate::resources::{RayTracingPipeline, ShaderBindingTable};

use super::super::{BindGroupStateTracker, CommandRecordingContext};
use super::{record_debug_marker, unexpected, unterminated};

/// Replays a ray tracing pass up to `EndRayTracingPass`.
pub fn record_ray_tracing_pass(
    ctx: &mut CommandRecordingContext<'_>,
    bindings: &mut BindGroupStateTracker,
    commands: &mut CommandIterator<'_>,
) -> Result<()> {
    let mut last_pipeline: Option<&Arc<RayTracingPipeline>> = None;

    for command in commands.by_ref() {
        match command {
            Command::EndRayTracingPass => return Ok(()),

            Command::SetRayTracingPipeline(pipeline) => {
                let list = ctx.list();
                list.set_root_signature(BindPoint::Compute, pipeline.layout().root_signature());
                list.set_ray_tracing_state_object(pipeline.state_object());
                bindings.on_set_pipeline(pipeline.layout());
                last_pipeline = Some(pipeline);
            }

            Command::SetBindGroup(cmd) => {
                bindings.on_set_bind_group(cmd.index, &cmd.group, &cmd.dynamic_offsets)?;
            }

            Command::TraceRays(trace) => {
                let pipeline = last_pipeline
                    .ok_or_else(|| ReplayError::unreachable("TraceRays without a pipeline"))?;
                bindings.apply(ctx)?;
                let desc = dispatch_rays_desc(pipeline.shader_binding_table(), trace);
                ctx.list().dispatch_rays(&desc);
            }

            other => {
                if !record_debug_marker(ctx, other) {
                    return Err(unexpected(other, "a ray tracing pass"));
                }
            }
        }
    }
    unterminated("a ray tracing pass")
}

/// Shader table offsets count whole records of `table_size` bytes.
fn dispatch_rays_desc(table: &ShaderBindingTable, trace: &TraceRaysCmd) -> DispatchRaysDesc {
    let base = table.address();
    let record = u64::from(table.table_size());
    let entry = |offset: u32| GpuAddressRangeAndStride {
        start: base + u64::from(offset) * record,
        size_in_bytes: record,
        stride_in_bytes: record,
    };

    DispatchRaysDesc {
        ray_generation: GpuAddressRange {
            start: base + u64::from(trace.ray_generation_offset) * record,
            size_in_bytes: record,
        },
        miss: entry(trace.ray_miss_offset),
        hit_group: entry(trace.ray_hit_offset),
        callable: GpuAddressRangeAndStride::default(),
        width: trace.width,
        height: trace.height,
        depth: trace.depth,
    }
}

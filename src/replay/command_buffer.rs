use crate::commands::{Command, CommandIterator, CommandStream};
use crate::errors::{ReplayError, Result};
use crate::resources::{CommandBufferResourceUsage, PassResourceUsage};

use super::acceleration::{AccelerationPassState, copy_container};
use super::passes::{
    record_compute_pass, record_debug_marker, record_ray_tracing_pass, record_render_pass,
};
use super::render_pass::RenderPassAttachmentPlan;
use super::{BindGroupStateTracker, CommandRecordingContext, PassKind, copies, prepare_resources_for_pass};

/// A finished, validated command stream together with the per-pass
/// resource usages computed when it was encoded.
#[derive(Debug)]
pub struct CommandBuffer {
    commands: CommandStream,
    resource_usages: CommandBufferResourceUsage,
}

impl CommandBuffer {
    #[must_use]
    pub fn new(commands: CommandStream, resource_usages: CommandBufferResourceUsage) -> Self {
        Self {
            commands,
            resource_usages,
        }
    }

    #[inline]
    #[must_use]
    pub fn commands(&self) -> &CommandStream {
        &self.commands
    }

    #[inline]
    #[must_use]
    pub fn resource_usages(&self) -> &CommandBufferResourceUsage {
        &self.resource_usages
    }

    fn pass_usage(&self, index: usize) -> Result<&PassResourceUsage> {
        self.resource_usages.per_pass.get(index).ok_or_else(|| {
            ReplayError::unreachable(format!("no resource usage recorded for pass {index}"))
        })
    }

    /// Replays the whole stream into `ctx`.
    ///
    /// Descriptor heaps are bound once up front; a heap switch during replay
    /// rebinds them. Recording stops at the first error.
    pub fn record_commands(&self, ctx: &mut CommandRecordingContext<'_>) -> Result<()> {
        let device = ctx.device();
        ctx.list().set_descriptor_heaps(
            device.view_allocator().shader_visible_heap(),
            device.sampler_allocator().shader_visible_heap(),
        );

        let mut acceleration = AccelerationPassState::new();
        let mut next_pass = 0;
        let mut iter = CommandIterator::new(self.commands.commands());

        while let Some(command) = iter.next() {
            match command {
                Command::BeginComputePass => {
                    prepare_resources_for_pass(ctx, self.pass_usage(next_pass)?);
                    let mut bindings = BindGroupStateTracker::new(PassKind::Compute);
                    record_compute_pass(ctx, &mut bindings, &mut iter)?;
                    next_pass += 1;
                }

                Command::BeginRenderPass(begin) => {
                    let has_uav = prepare_resources_for_pass(ctx, self.pass_usage(next_pass)?);
                    let mut bindings = BindGroupStateTracker::new(PassKind::Render);
                    let plan = RenderPassAttachmentPlan::new(begin);
                    record_render_pass(ctx, &mut bindings, &plan, has_uav, &mut iter)?;
                    next_pass += 1;
                }

                Command::BeginRayTracingPass => {
                    prepare_resources_for_pass(ctx, self.pass_usage(next_pass)?);
                    let mut bindings = BindGroupStateTracker::new(PassKind::RayTracing);
                    record_ray_tracing_pass(ctx, &mut bindings, &mut iter)?;
                    next_pass += 1;
                }

                Command::CopyBufferToBuffer(copy) => copies::copy_buffer_to_buffer(ctx, copy),
                Command::CopyBufferToTexture(copy) => copies::copy_buffer_to_texture(ctx, copy),
                Command::CopyTextureToBuffer(copy) => copies::copy_texture_to_buffer(ctx, copy),
                Command::CopyTextureToTexture(copy) => copies::copy_texture_to_texture(ctx, copy),

                Command::BuildAccelerationContainer(container) => {
                    acceleration.build(ctx, container)?;
                }
                Command::UpdateAccelerationContainer(container) => {
                    acceleration.update(ctx, container)?;
                }
                Command::CopyAccelerationContainer(copy) => {
                    copy_container(ctx, &copy.source, &copy.destination)?;
                }

                other => {
                    if !record_debug_marker(ctx, other) {
                        return Err(ReplayError::unreachable(format!(
                            "{} outside of a pass",
                            other.name()
                        )));
                    }
                }
            }
        }

        log::debug!(
            "Recorded {} commands across {next_pass} passes",
            self.commands.len()
        );
        Ok(())
    }
}

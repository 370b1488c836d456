//! Acceleration container commands.
//!
//! Builds and updates recorded in one command buffer must be homogeneous:
//! either all builds or all updates, all of the same level. Every check runs
//! before any native call or state change for the offending command.

use crate::errors::{ReplayError, Result};
use crate::native::{
    AccelerationStructureBuildFlags, AccelerationStructureCopyMode,
    BuildAccelerationStructureDesc, ResourceBarrier,
};
use crate::resources::{AccelerationContainer, ContainerLevel};

use super::CommandRecordingContext;

/// Build/update sequencing state of one command buffer.
#[derive(Debug, Default)]
pub struct AccelerationPassState {
    build_level: Option<ContainerLevel>,
    update_level: Option<ContainerLevel>,
}

impl AccelerationPassState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn build(
        &mut self,
        ctx: &mut CommandRecordingContext<'_>,
        container: &AccelerationContainer,
    ) -> Result<()> {
        let level = container.level();
        if self.update_level.is_some() {
            return Err(ReplayError::validation(
                "cannot build and update acceleration containers in the same command buffer",
            ));
        }
        if let Some(previous) = self.build_level
            && previous != level
        {
            return Err(ReplayError::validation(format!(
                "cannot build {level:?}-level and {previous:?}-level containers in the same command buffer"
            )));
        }
        if level == ContainerLevel::Top {
            container.check_bottom_levels_built()?;
        }
        let scratch = container.build_memory().ok_or_else(|| {
            ReplayError::validation(format!(
                "container {:?} was already updated and has no build scratch",
                container.id()
            ))
        })?;

        self.build_level = Some(level);

        let result = container.result_memory();
        let desc = BuildAccelerationStructureDesc {
            dest: result.address,
            inputs: container.build_information().clone(),
            source: 0,
            scratch: scratch.address,
        };
        let list = ctx.list();
        list.build_raytracing_acceleration_structure(&desc);
        list.resource_barrier(&[ResourceBarrier::Uav {
            resource: result.buffer,
        }]);

        container.set_build_state(true);
        log::debug!("Built {level:?}-level container {:?}", container.id());
        Ok(())
    }

    /// Updates in place. The first update of a container releases its build
    /// scratch.
    pub fn update(
        &mut self,
        ctx: &mut CommandRecordingContext<'_>,
        container: &AccelerationContainer,
    ) -> Result<()> {
        let level = container.level();
        if self.build_level.is_some() {
            return Err(ReplayError::validation(
                "cannot build and update acceleration containers in the same command buffer",
            ));
        }
        if let Some(previous) = self.update_level
            && previous != level
        {
            return Err(ReplayError::validation(format!(
                "cannot update {level:?}-level and {previous:?}-level containers in the same command buffer"
            )));
        }
        if !container.is_built() {
            return Err(ReplayError::validation(format!(
                "container {:?} is updated before it is built",
                container.id()
            )));
        }
        if !container.allows_update() {
            return Err(ReplayError::validation(format!(
                "container {:?} was not created with ALLOW_UPDATE",
                container.id()
            )));
        }
        if level == ContainerLevel::Top {
            container.check_bottom_levels_built()?;
        }

        self.update_level = Some(level);

        if !container.is_updated() {
            container.release_build_scratch(ctx.device().native().as_ref());
            container.set_update_state(true);
        }

        let result = container.result_memory();
        let mut inputs = container.build_information().clone();
        inputs.flags |= AccelerationStructureBuildFlags::PERFORM_UPDATE;
        let desc = BuildAccelerationStructureDesc {
            dest: result.address,
            inputs,
            source: result.address,
            scratch: container.update_memory().address,
        };
        let list = ctx.list();
        list.build_raytracing_acceleration_structure(&desc);
        list.resource_barrier(&[ResourceBarrier::Uav {
            resource: result.buffer,
        }]);

        log::trace!("Updated {level:?}-level container {:?}", container.id());
        Ok(())
    }
}

/// Clones the structure of a built `source` into `destination`.
pub fn copy_container(
    ctx: &mut CommandRecordingContext<'_>,
    source: &AccelerationContainer,
    destination: &AccelerationContainer,
) -> Result<()> {
    if !source.is_built() {
        return Err(ReplayError::validation(format!(
            "container {:?} is copied before it is built",
            source.id()
        )));
    }
    ctx.list().copy_raytracing_acceleration_structure(
        destination.result_memory().address,
        source.result_memory().address,
        AccelerationStructureCopyMode::Clone,
    );
    destination.set_build_state(true);
    Ok(())
}

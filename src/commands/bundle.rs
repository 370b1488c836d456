use crate::errors::{ReplayError, Result};
use crate::resources::ResourceId;

use super::{Command, CommandStream};

/// A pre-recorded sequence of render commands, executed inside render
/// passes with the pass's own trackers.
#[derive(Debug)]
pub struct RenderBundle {
    id: ResourceId,
    commands: CommandStream,
}

impl RenderBundle {
    pub fn new(commands: Vec<Command>) -> Result<Self> {
        if let Some(command) = commands.iter().find(|c| !c.is_bundle_command()) {
            return Err(ReplayError::validation(format!(
                "{} is not allowed in a render bundle",
                command.name()
            )));
        }
        Ok(Self {
            id: ResourceId::next(),
            commands: CommandStream::from_commands(commands),
        })
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> ResourceId {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn commands(&self) -> &CommandStream {
        &self.commands
    }
}

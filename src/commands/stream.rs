use super::Command;

/// An ordered, immutable sequence of recorded commands.
#[derive(Debug, Clone, Default)]
pub struct CommandStream {
    commands: Vec<Command>,
}

impl CommandStream {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_commands(commands: Vec<Command>) -> Self {
        Self { commands }
    }

    pub fn push(&mut self, command: Command) {
        self.commands.push(command);
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Starts a forward-only walk from the first command.
    #[must_use]
    pub fn iter(&self) -> CommandIterator<'_> {
        CommandIterator::new(&self.commands)
    }
}

impl FromIterator<Command> for CommandStream {
    fn from_iter<I: IntoIterator<Item = Command>>(iter: I) -> Self {
        Self {
            commands: iter.into_iter().collect(),
        }
    }
}

/// Forward-only cursor over a command slice.
///
/// Sub-pass replay functions take the iterator by `&mut` and consume
/// commands up to and including their pass terminator, so the caller
/// resumes right after the pass.
#[derive(Debug, Clone)]
pub struct CommandIterator<'a> {
    commands: &'a [Command],
    cursor: usize,
}

impl<'a> CommandIterator<'a> {
    #[must_use]
    pub fn new(commands: &'a [Command]) -> Self {
        Self {
            commands,
            cursor: 0,
        }
    }

    /// Commands not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.commands.len() - self.cursor
    }
}

impl<'a> Iterator for CommandIterator<'a> {
    type Item = &'a Command;

    fn next(&mut self) -> Option<&'a Command> {
        let command = self.commands.get(self.cursor)?;
        self.cursor += 1;
        Some(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iterator_resumes_where_sub_walk_stopped() {
        let stream: CommandStream = [
            Command::BeginComputePass,
            Command::PopDebugGroup,
            Command::EndComputePass,
            Command::PopDebugGroup,
        ]
        .into_iter()
        .collect();

        let mut iter = stream.iter();
        assert!(matches!(iter.next(), Some(Command::BeginComputePass)));
        for command in iter.by_ref() {
            if matches!(command, Command::EndComputePass) {
                break;
            }
        }
        assert_eq!(iter.remaining(), 1);
        assert!(matches!(iter.next(), Some(Command::PopDebugGroup)));
        assert!(iter.next().is_none());
    }
}

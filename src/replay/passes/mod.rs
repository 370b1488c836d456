//! Per-pass replay loops.
//!
//! Each loop is entered right after its `Begin*Pass` command and consumes
//! the iterator up to and including the matching `End*Pass`. The loops are
//! public so a command fragment can be replayed against a recording
//! backend in isolation.

mod compute;
mod ray_tracing;
mod render;

pub use compute::record_compute_pass;
pub use ray_tracing::record_ray_tracing_pass;
pub use render::record_render_pass;

use crate::commands::Command;
use crate::errors::{ReplayError, Result};

use super::CommandRecordingContext;

/// Records a debug marker command. Returns `false` for any other command.
///
/// Markers are dropped when
/// [`emit_debug_markers`](crate::settings::ReplaySettings::emit_debug_markers)
/// is off.
pub(crate) fn record_debug_marker(ctx: &mut CommandRecordingContext<'_>, command: &Command) -> bool {
    let emit = ctx.device().settings().emit_debug_markers;
    match command {
        Command::InsertDebugMarker(label) => {
            if emit {
                ctx.list().set_marker(label);
            }
        }
        Command::PushDebugGroup(label) => {
            if emit {
                ctx.list().begin_event(label);
            }
        }
        Command::PopDebugGroup => {
            if emit {
                ctx.list().end_event();
            }
        }
        _ => return false,
    }
    true
}

pub(crate) fn unexpected(command: &Command, context: &str) -> ReplayError {
    ReplayError::unreachable(format!("{} is not valid in {context}", command.name()))
}

/// A pass loop ran out of commands before its terminator.
pub(crate) fn unterminated(context: &str) -> Result<()> {
    Err(ReplayError::unreachable(format!(
        "command stream ended inside {context}"
    )))
}

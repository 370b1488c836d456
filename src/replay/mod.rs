//! Command Buffer Replay
//!
//! Translates a recorded [`CommandStream`](crate::commands::CommandStream)
//! into calls on a [`NativeCommandList`](crate::native::NativeCommandList).
//!
//! # Overview
//!
//! ```text
//! CommandBuffer::record_commands
//!   │
//!   ├─ set_descriptor_heaps (once)
//!   │
//!   ├─ Begin*Pass ──► prepare_resources_for_pass   (one barrier batch)
//!   │                 record_{compute,render,ray_tracing}_pass
//!   │                   ├─ BindGroupStateTracker::apply   (before each draw/dispatch/trace)
//!   │                   ├─ VertexBufferTracker / IndexBufferTracker
//!   │                   └─ RenderPassBuilder (native or emulated)
//!   │
//!   ├─ Copy*            ──► copies (transition now, lazy clears)
//!   └─ Build/Update/Copy acceleration containers
//! ```
//!
//! Trackers are created per pass: bind group, vertex and index state never
//! carries over from one pass to the next. Acceleration build/update
//! homogeneity is tracked for the whole `record_commands` call.

mod acceleration;
mod bind_group_tracker;
pub mod buffer_trackers;
mod command_buffer;
mod context;
mod copies;
mod device;
pub mod passes;
pub mod render_pass;
mod usage_tracker;

pub use acceleration::{AccelerationPassState, copy_container};
pub use bind_group_tracker::BindGroupStateTracker;
pub use buffer_trackers::{IndexBufferTracker, VertexBufferTracker};
pub use command_buffer::CommandBuffer;
pub use context::CommandRecordingContext;
pub use device::{Device, Serial};
pub use render_pass::{RenderPassAttachmentPlan, RenderPassBuilder};
pub use usage_tracker::prepare_resources_for_pass;

use crate::native::BindPoint;

/// Kind of the pass currently being replayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PassKind {
    #[default]
    Render,
    Compute,
    RayTracing,
}

impl PassKind {
    /// Root signature slot the pass binds through. Ray tracing shares the
    /// compute root signature.
    #[inline]
    #[must_use]
    pub fn bind_point(self) -> BindPoint {
        match self {
            Self::Render => BindPoint::Graphics,
            Self::Compute | Self::RayTracing => BindPoint::Compute,
        }
    }

    /// Whether storage bindings are transitioned when their group is applied.
    #[inline]
    #[must_use]
    pub fn has_storage_barriers(self) -> bool {
        matches!(self, Self::Compute | Self::RayTracing)
    }
}

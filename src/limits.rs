//! Fixed limits shared by the frontend object model and the replay trackers.

/// Number of bind group slots in a pipeline layout.
pub const MAX_BIND_GROUPS: usize = 4;

/// Maximum number of bindings in one bind group layout.
pub const MAX_BINDINGS_PER_GROUP: usize = 16;

/// Maximum number of dynamic buffer bindings in one bind group layout.
pub const MAX_DYNAMIC_BUFFERS_PER_GROUP: usize = 8;

/// Number of vertex buffer slots on the input assembler.
pub const MAX_VERTEX_BUFFERS: usize = 16;

/// Maximum number of color attachments in a render pass.
pub const MAX_COLOR_ATTACHMENTS: usize = 4;

/// Smallest view heap that can hold one full layout set.
pub const MIN_VIEW_HEAP_SIZE: u32 = (MAX_BIND_GROUPS * MAX_BINDINGS_PER_GROUP) as u32;

/// Smallest sampler heap that can hold one full layout set.
pub const MIN_SAMPLER_HEAP_SIZE: u32 = (MAX_BIND_GROUPS * MAX_BINDINGS_PER_GROUP) as u32;

//! Command Stream
//!
//! The recorded, validated command stream handed over by the frontend.
//!
//! # Design
//!
//! ```text
//!   CommandStream ──iter()──► CommandIterator ──► record_commands
//!                                  │                  │
//!                                  │   Begin*Pass     ▼
//!                                  └────────────► pass sub-loop
//!                                                 (consumes up to End*Pass)
//! ```
//!
//! Commands form a closed enum with one payload struct per kind. Replay
//! matches on the tag; there is no dynamic dispatch per command and no
//! allocation while walking the stream.

mod bundle;
mod command;
mod stream;

pub use bundle::RenderBundle;
pub use command::{
    BeginRenderPassCmd, BufferCopyView, Command, CopyAccelerationContainerCmd,
    CopyBufferToBufferCmd, CopyBufferToTextureCmd, CopyTextureToBufferCmd,
    CopyTextureToTextureCmd, DispatchCmd, DrawCmd, DrawIndexedCmd, IndirectCmd, LoadOp,
    RenderPassColorAttachment, RenderPassDepthStencilAttachment, SetBindGroupCmd,
    SetIndexBufferCmd, SetScissorRectCmd, SetVertexBufferCmd, SetViewportCmd, StoreOp,
    TextureCopyView, TraceRaysCmd,
};
pub use stream::{CommandIterator, CommandStream};

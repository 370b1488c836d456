//! # Tessera
//!
//! Replays recorded GPU command streams onto a D3D12-style native command
//! list: descriptor heap management, resource state transitions, lazy
//! clears, render pass setup and ray tracing dispatch.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tessera::native::recording::{RecordingCommandList, RecordingDevice};
//! use tessera::{CommandBuffer, CommandRecordingContext, Device, ReplaySettings};
//!
//! let device = Device::new(Arc::new(RecordingDevice::new()), ReplaySettings::default())?;
//! let mut list = RecordingCommandList::new();
//! let mut ctx = CommandRecordingContext::new(&device, &mut list);
//! command_buffer.record_commands(&mut ctx)?;
//! device.submit();
//! ```

#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

pub mod commands;
pub mod descriptor;
pub mod errors;
pub mod limits;
pub mod native;
pub mod replay;
pub mod resources;
pub mod settings;
pub mod utils;

pub use commands::{Command, CommandStream, RenderBundle};
pub use errors::{NativeError, NativeErrorKind, ReplayError, Result};
pub use native::{NativeCommandList, NativeDevice};
pub use replay::{CommandBuffer, CommandRecordingContext, Device, PassKind, Serial};
pub use settings::ReplaySettings;

//! Error Types
//!
//! This module defines the error types surfaced by command replay.
//!
//! # Overview
//!
//! The main error type [`ReplayError`] covers every way a replay can abort:
//! - Validation failures (illegal acceleration-container sequencing)
//! - Resource exhaustion (shader-visible descriptor heap switch failed)
//! - Internal invariant violations (unexpected command, missing pipeline)
//! - Opaque native backend errors, forwarded unchanged
//! - Malformed replay settings
//!
//! # Usage
//!
//! All fallible replay APIs return [`Result<T>`], an alias for
//! `std::result::Result<T, ReplayError>`.
//!
//! ```rust,ignore
//! use tessera::errors::Result;
//!
//! fn replay(buffer: &CommandBuffer, ctx: &mut CommandRecordingContext<'_>) -> Result<()> {
//!     buffer.record_commands(ctx)?;
//!     Ok(())
//! }
//! ```

use thiserror::Error;

use crate::native::DescriptorHeapKind;

/// The main error type for command replay.
///
/// Any error aborts the remaining commands of the command buffer being
/// replayed. Partially recorded native content must be discarded by the
/// caller.
#[derive(Error, Debug)]
pub enum ReplayError {
    // ========================================================================
    // Validation Errors
    // ========================================================================
    /// Illegal command sequencing detected during replay.
    #[error("Validation error: {0}")]
    Validation(String),

    // ========================================================================
    // Device Errors
    // ========================================================================
    /// A shader-visible descriptor heap could not be replaced.
    #[error("Out of {kind:?} descriptor heap memory")]
    ResourceExhaustion {
        /// The heap kind whose switch failed.
        kind: DescriptorHeapKind,
        /// The native failure reported by the device.
        #[source]
        source: NativeError,
    },

    /// Any other native call failure.
    #[error("Backend error: {0}")]
    Backend(#[from] NativeError),

    // ========================================================================
    // Internal Errors
    // ========================================================================
    /// An internal invariant was violated. This is a programming error in the
    /// frontend or in the replay engine, never a recoverable condition.
    #[error("Unreachable state: {0}")]
    Unreachable(String),

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// The replay settings document could not be parsed.
    #[error("Invalid replay settings: {0}")]
    Config(#[from] serde_json::Error),

    /// The replay settings were parsed but describe an unusable configuration.
    #[error("Invalid replay settings: {0}")]
    InvalidSettings(String),
}

impl ReplayError {
    /// Builds an [`ReplayError::Unreachable`] and logs it.
    ///
    /// Unreachable states are programming errors, so they are always reported
    /// at `error` level even when the caller handles the result.
    pub(crate) fn unreachable(message: impl Into<String>) -> Self {
        let message = message.into();
        log::error!("Unreachable replay state: {message}");
        Self::Unreachable(message)
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        let message = message.into();
        log::error!("Replay validation failed: {message}");
        Self::Validation(message)
    }

    /// Returns `true` for [`ReplayError::Validation`].
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

/// Classification of a native failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeErrorKind {
    OutOfMemory,
    DeviceLost,
    Other,
}

/// An opaque error reported by the native device.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{call} failed ({kind:?}): {message}")]
pub struct NativeError {
    /// Name of the native entry point that failed.
    pub call: &'static str,
    pub kind: NativeErrorKind,
    pub message: String,
}

impl NativeError {
    #[must_use]
    pub fn new(call: &'static str, kind: NativeErrorKind, message: impl Into<String>) -> Self {
        Self {
            call,
            kind,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn out_of_memory(call: &'static str) -> Self {
        Self::new(call, NativeErrorKind::OutOfMemory, "out of memory")
    }
}

/// Alias for `Result<T, ReplayError>`.
pub type Result<T> = std::result::Result<T, ReplayError>;

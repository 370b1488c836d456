//! Replay Settings
//!
//! Device-level configuration consumed by the replay engine. Settings are
//! fixed for the lifetime of a [`Device`](crate::replay::Device) and shared by
//! every command buffer replayed against it.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use tessera::settings::ReplaySettings;
//!
//! // Defaults: emulated render passes, debug markers on
//! let settings = ReplaySettings::default();
//!
//! // Loaded from a JSON document, missing fields fall back to defaults
//! let settings = ReplaySettings::from_json_str(r#"{ "use_native_render_pass": true }"#)?;
//! ```

use serde::{Deserialize, Serialize};

use crate::errors::{ReplayError, Result};
use crate::limits::{MIN_SAMPLER_HEAP_SIZE, MIN_VIEW_HEAP_SIZE};

// ---------------------------------------------------------------------------
// ReplaySettings
// ---------------------------------------------------------------------------

/// Global configuration for command replay.
///
/// # Fields
///
/// | Field                    | Description                                  | Default |
/// |--------------------------|----------------------------------------------|---------|
/// | `use_native_render_pass` | Use native begin/end render pass calls       | `false` |
/// | `emit_debug_markers`     | Forward debug markers to the command list    | `true`  |
/// | `view_heap_size`         | Descriptors per shader-visible view heap     | `4096`  |
/// | `sampler_heap_size`      | Descriptors per shader-visible sampler heap  | `2048`  |
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplaySettings {
    /// Selects the render pass code path.
    ///
    /// When `true`, passes are recorded with native begin/end render pass
    /// calls carrying beginning/ending access descriptors. When `false`, the
    /// pass is emulated with explicit clears, an output-merger bind and an
    /// explicit multisample resolve at pass end.
    pub use_native_render_pass: bool,

    /// Forward `InsertDebugMarker` / `PushDebugGroup` / `PopDebugGroup` to the
    /// native command list. When `false`, markers are consumed and dropped.
    pub emit_debug_markers: bool,

    /// Capacity of each shader-visible CBV/SRV/UAV heap generation.
    pub view_heap_size: u32,

    /// Capacity of each shader-visible sampler heap generation.
    pub sampler_heap_size: u32,
}

impl Default for ReplaySettings {
    fn default() -> Self {
        Self {
            use_native_render_pass: false,
            emit_debug_markers: true,
            view_heap_size: 4096,
            sampler_heap_size: 2048,
        }
    }
}

impl ReplaySettings {
    /// Parses settings from a JSON document and validates them.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Serializes the settings as pretty-printed JSON.
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Checks that each heap generation can hold one full layout set.
    ///
    /// After a heap switch every bound slot is repopulated against the fresh
    /// generation; that second pass must always fit.
    pub fn validate(&self) -> Result<()> {
        if self.view_heap_size < MIN_VIEW_HEAP_SIZE {
            return Err(ReplayError::InvalidSettings(format!(
                "view_heap_size {} is below the minimum of {MIN_VIEW_HEAP_SIZE}",
                self.view_heap_size
            )));
        }
        if self.sampler_heap_size < MIN_SAMPLER_HEAP_SIZE {
            return Err(ReplayError::InvalidSettings(format!(
                "sampler_heap_size {} is below the minimum of {MIN_SAMPLER_HEAP_SIZE}",
                self.sampler_heap_size
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(ReplaySettings::default().validate().is_ok());
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let settings = ReplaySettings::from_json_str(r#"{ "use_native_render_pass": true }"#)
            .expect("valid settings");
        assert!(settings.use_native_render_pass);
        assert_eq!(settings.view_heap_size, 4096);
        assert!(settings.emit_debug_markers);
    }

    #[test]
    fn undersized_heap_is_rejected() {
        let err = ReplaySettings::from_json_str(r#"{ "sampler_heap_size": 8 }"#).unwrap_err();
        assert!(matches!(err, ReplayError::InvalidSettings(_)));
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        let err = ReplaySettings::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, ReplayError::Config(_)));
    }

    #[test]
    fn json_round_trip_preserves_fields() {
        let settings = ReplaySettings {
            use_native_render_pass: true,
            emit_debug_markers: false,
            view_heap_size: 128,
            sampler_heap_size: 64,
        };
        let json = settings.to_json_string().unwrap();
        assert_eq!(ReplaySettings::from_json_str(&json).unwrap(), settings);
    }
}

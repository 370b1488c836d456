use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::descriptor::ShaderVisibleDescriptorAllocator;
use crate::errors::Result;
use crate::native::{DescriptorHeapKind, NativeDevice};
use crate::settings::ReplaySettings;

/// Monotonic submission serial. Serial `0` is never pending.
pub type Serial = u64;

/// Per-device replay state shared by every command buffer.
///
/// Owns the two shader-visible descriptor allocators and the submission
/// serials used to reclaim their ranges. Concurrent replays hold `&Device`;
/// the allocators serialize their own mutation.
#[derive(Debug)]
pub struct Device {
    native: Arc<dyn NativeDevice>,
    settings: ReplaySettings,
    view_allocator: ShaderVisibleDescriptorAllocator,
    sampler_allocator: ShaderVisibleDescriptorAllocator,
    pending_serial: AtomicU64,
    completed_serial: AtomicU64,
}

impl Device {
    /// Validates `settings` and creates the first heap generation of each
    /// kind.
    pub fn new(native: Arc<dyn NativeDevice>, settings: ReplaySettings) -> Result<Self> {
        settings.validate()?;

        let view_allocator = ShaderVisibleDescriptorAllocator::new(
            Arc::clone(&native),
            DescriptorHeapKind::View,
            settings.view_heap_size,
        )?;
        let sampler_allocator = ShaderVisibleDescriptorAllocator::new(
            Arc::clone(&native),
            DescriptorHeapKind::Sampler,
            settings.sampler_heap_size,
        )?;

        log::info!(
            "Replay device ready (native render pass: {}, debug markers: {})",
            settings.use_native_render_pass,
            settings.emit_debug_markers
        );

        Ok(Self {
            native,
            settings,
            view_allocator,
            sampler_allocator,
            pending_serial: AtomicU64::new(1),
            completed_serial: AtomicU64::new(0),
        })
    }

    #[inline]
    #[must_use]
    pub fn native(&self) -> &Arc<dyn NativeDevice> {
        &self.native
    }

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &ReplaySettings {
        &self.settings
    }

    #[inline]
    #[must_use]
    pub fn view_allocator(&self) -> &ShaderVisibleDescriptorAllocator {
        &self.view_allocator
    }

    #[inline]
    #[must_use]
    pub fn sampler_allocator(&self) -> &ShaderVisibleDescriptorAllocator {
        &self.sampler_allocator
    }

    /// Serial of the submission currently being recorded.
    #[inline]
    #[must_use]
    pub fn pending_serial(&self) -> Serial {
        self.pending_serial.load(Ordering::Acquire)
    }

    /// Latest serial known to be finished on the GPU.
    #[inline]
    #[must_use]
    pub fn completed_serial(&self) -> Serial {
        self.completed_serial.load(Ordering::Acquire)
    }

    /// Closes the pending submission and returns its serial.
    pub fn submit(&self) -> Serial {
        let submitted = self.pending_serial.fetch_add(1, Ordering::AcqRel);
        log::trace!("Submitted serial {submitted}");
        submitted
    }

    /// Marks every serial up to `completed` as finished and reclaims the
    /// descriptor ranges they used.
    pub fn tick(&self, completed: Serial) {
        let previous = self.completed_serial.fetch_max(completed, Ordering::AcqRel);
        if completed <= previous {
            return;
        }
        self.view_allocator.tick(completed);
        self.sampler_allocator.tick(completed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ReplayError;
    use crate::native::recording::RecordingDevice;

    #[test]
    fn serials_advance_on_submit() {
        let device = Device::new(Arc::new(RecordingDevice::new()), ReplaySettings::default()).unwrap();
        assert_eq!(device.pending_serial(), 1);
        assert_eq!(device.submit(), 1);
        assert_eq!(device.pending_serial(), 2);

        device.tick(1);
        device.tick(0);
        assert_eq!(device.completed_serial(), 1);
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let settings = ReplaySettings {
            view_heap_size: 1,
            ..ReplaySettings::default()
        };
        let err = Device::new(Arc::new(RecordingDevice::new()), settings).unwrap_err();
        assert!(matches!(err, ReplayError::InvalidSettings(_)));
    }

    #[test]
    fn creates_one_heap_per_kind() {
        let native = Arc::new(RecordingDevice::new());
        let _device = Device::new(native.clone(), ReplaySettings::default()).unwrap();
        assert_eq!(native.heaps_created(), 2);
    }
}

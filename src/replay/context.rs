use crate::native::NativeCommandList;

use super::{Device, Serial};

/// The command list being recorded, paired with the device it targets.
pub struct CommandRecordingContext<'a> {
    list: &'a mut dyn NativeCommandList,
    device: &'a Device,
}

impl<'a> CommandRecordingContext<'a> {
    pub fn new(device: &'a Device, list: &'a mut dyn NativeCommandList) -> Self {
        Self { list, device }
    }

    #[inline]
    pub fn list(&mut self) -> &mut (dyn NativeCommandList + 'a) {
        self.list
    }

    /// The device outlives the context, so the borrow is independent of
    /// `self`.
    #[inline]
    #[must_use]
    pub fn device(&self) -> &'a Device {
        self.device
    }

    #[inline]
    #[must_use]
    pub fn pending_serial(&self) -> Serial {
        self.device.pending_serial()
    }
}

impl std::fmt::Debug for CommandRecordingContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRecordingContext")
            .field("pending_serial", &self.pending_serial())
            .finish_non_exhaustive()
    }
}

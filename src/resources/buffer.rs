use parking_lot::Mutex;

use crate::native::convert::buffer_usage_to_states;
use crate::native::{GpuVirtualAddress, NativeResource, ResourceBarrier, ResourceStates};
use crate::replay::{CommandRecordingContext, Serial};

use super::{BufferUsage, ResourceId};

/// Which native heap a buffer lives in.
///
/// Upload and readback heaps pin their resources to a fixed state; such
/// buffers never take part in barrier tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MemoryLocation {
    #[default]
    Device,
    Upload,
    Readback,
}

impl MemoryLocation {
    #[must_use]
    pub fn fixed_state(self) -> Option<ResourceStates> {
        match self {
            Self::Device => None,
            Self::Upload => Some(ResourceStates::GENERIC_READ),
            Self::Readback => Some(ResourceStates::COPY_DEST),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BufferDescriptor {
    pub size: u64,
    pub usage: BufferUsage,
    pub location: MemoryLocation,
}

#[derive(Debug)]
struct BufferState {
    last_usage: BufferUsage,
    last_state: ResourceStates,
    last_used_serial: Serial,
}

/// A native buffer with tracked resource state.
#[derive(Debug)]
pub struct Buffer {
    id: ResourceId,
    native: NativeResource,
    gpu_address: GpuVirtualAddress,
    size: u64,
    usage: BufferUsage,
    location: MemoryLocation,
    state: Mutex<BufferState>,
}

impl Buffer {
    #[must_use]
    pub fn new(
        native: NativeResource,
        gpu_address: GpuVirtualAddress,
        descriptor: &BufferDescriptor,
    ) -> Self {
        let initial_state = descriptor
            .location
            .fixed_state()
            .unwrap_or(ResourceStates::COMMON);
        Self {
            id: ResourceId::next(),
            native,
            gpu_address,
            size: descriptor.size,
            usage: descriptor.usage,
            location: descriptor.location,
            state: Mutex::new(BufferState {
                last_usage: BufferUsage::empty(),
                last_state: initial_state,
                last_used_serial: 0,
            }),
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> ResourceId {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn native(&self) -> NativeResource {
        self.native
    }

    /// GPU virtual address of the first byte.
    #[inline]
    #[must_use]
    pub fn gpu_address(&self) -> GpuVirtualAddress {
        self.gpu_address
    }

    #[inline]
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    #[inline]
    #[must_use]
    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    #[inline]
    #[must_use]
    pub fn location(&self) -> MemoryLocation {
        self.location
    }

    #[must_use]
    pub fn last_usage(&self) -> BufferUsage {
        self.state.lock().last_usage
    }

    #[must_use]
    pub fn current_state(&self) -> ResourceStates {
        self.state.lock().last_state
    }

    /// Records `new_usage` and returns the barrier needed to reach it, if any.
    ///
    /// Buffers decay to `COMMON` once the submission that last used them is
    /// executed, and are implicitly promoted out of `COMMON` to either one
    /// write state or any combination of read states.
    pub fn track_usage_and_get_barrier(
        &self,
        new_usage: BufferUsage,
        pending_serial: Serial,
    ) -> Option<ResourceBarrier> {
        if self.location.fixed_state().is_some() {
            return None;
        }

        let new_state = buffer_usage_to_states(new_usage);
        let mut state = self.state.lock();

        if pending_serial > state.last_used_serial {
            state.last_state = ResourceStates::COMMON;
            state.last_used_serial = pending_serial;
        }

        let last_state = state.last_state;
        state.last_usage = new_usage;

        if new_state.is_empty() {
            return None;
        }
        // Storage writes are ordered against the previous storage access.
        if last_state == ResourceStates::UNORDERED_ACCESS
            && new_state == ResourceStates::UNORDERED_ACCESS
        {
            return Some(ResourceBarrier::Uav {
                resource: self.native,
            });
        }
        // Already in a state that covers every requested access.
        if last_state == new_state || (last_state.is_read_only() && last_state.contains(new_state)) {
            return None;
        }

        state.last_state = new_state;

        if last_state == ResourceStates::COMMON
            && (new_state.is_single_write() || new_state.is_read_only())
        {
            return None;
        }

        Some(ResourceBarrier::Transition {
            resource: self.native,
            before: last_state,
            after: new_state,
        })
    }

    /// Tracks `new_usage` and records its barrier immediately.
    pub fn track_usage_and_transition_now(
        &self,
        ctx: &mut CommandRecordingContext<'_>,
        new_usage: BufferUsage,
    ) {
        if let Some(barrier) = self.track_usage_and_get_barrier(new_usage, ctx.pending_serial()) {
            log::trace!("Buffer {:?}: {barrier:?}", self.id);
            ctx.list().resource_barrier(&[barrier]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device_buffer() -> Buffer {
        Buffer::new(
            NativeResource(7),
            0x1000,
            &BufferDescriptor {
                size: 256,
                usage: BufferUsage::STORAGE | BufferUsage::COPY_DST | BufferUsage::VERTEX,
                location: MemoryLocation::Device,
            },
        )
    }

    #[test]
    fn common_promotes_to_single_write_without_barrier() {
        let buffer = device_buffer();
        assert!(buffer.track_usage_and_get_barrier(BufferUsage::COPY_DST, 1).is_none());
        assert_eq!(buffer.current_state(), ResourceStates::COPY_DEST);
    }

    #[test]
    fn write_to_write_needs_transition() {
        let buffer = device_buffer();
        buffer.track_usage_and_get_barrier(BufferUsage::COPY_DST, 1);
        let barrier = buffer.track_usage_and_get_barrier(BufferUsage::STORAGE, 1);
        assert_eq!(
            barrier,
            Some(ResourceBarrier::Transition {
                resource: NativeResource(7),
                before: ResourceStates::COPY_DEST,
                after: ResourceStates::UNORDERED_ACCESS,
            })
        );
    }

    #[test]
    fn same_state_is_skipped() {
        let buffer = device_buffer();
        buffer.track_usage_and_get_barrier(BufferUsage::COPY_DST, 1);
        assert!(buffer.track_usage_and_get_barrier(BufferUsage::COPY_DST, 1).is_none());
    }

    #[test]
    fn storage_after_storage_needs_uav_barrier() {
        let buffer = device_buffer();
        buffer.track_usage_and_get_barrier(BufferUsage::COPY_DST, 1);
        buffer.track_usage_and_get_barrier(BufferUsage::STORAGE, 1);
        assert_eq!(
            buffer.track_usage_and_get_barrier(BufferUsage::STORAGE, 1),
            Some(ResourceBarrier::Uav {
                resource: NativeResource(7),
            })
        );
        assert_eq!(buffer.current_state(), ResourceStates::UNORDERED_ACCESS);
    }

    #[test]
    fn state_decays_on_new_submission() {
        let buffer = device_buffer();
        buffer.track_usage_and_get_barrier(BufferUsage::COPY_DST, 1);
        buffer.track_usage_and_get_barrier(BufferUsage::STORAGE, 1);
        // Next submission starts from COMMON again.
        assert!(buffer.track_usage_and_get_barrier(BufferUsage::VERTEX, 2).is_none());
    }

    #[test]
    fn fixed_state_buffers_never_transition() {
        let buffer = Buffer::new(
            NativeResource(9),
            0x2000,
            &BufferDescriptor {
                size: 64,
                usage: BufferUsage::MAP_WRITE | BufferUsage::COPY_SRC,
                location: MemoryLocation::Upload,
            },
        );
        assert!(buffer.track_usage_and_get_barrier(BufferUsage::COPY_SRC, 1).is_none());
        assert_eq!(buffer.current_state(), ResourceStates::GENERIC_READ);
    }
}

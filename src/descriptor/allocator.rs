//! Shader-Visible Descriptor Allocator
//!
//! Owns the shader-visible descriptor heap of one kind (views or samplers)
//! for a device. Bind groups copy their CPU staging descriptors into ranges
//! sub-allocated from the current heap.
//!
//! # Design
//!
//! ```text
//!   generation N heap ──► RingBufferAllocator (serial-tagged ranges)
//!        │
//!        │ switch: heap pushed to pool tagged with the pending serial,
//!        ▼         oldest completed heap recycled or a new one created
//!   generation N+1 heap
//! ```
//!
//! An allocation is a `(generation, offset)` pair. Switching bumps the
//! generation, which invalidates every allocation handed out before the
//! switch. Allocation is best-effort: [`populate`](ShaderVisibleDescriptorAllocator::populate)
//! returns `None` on exhaustion and the caller decides when to switch.
//!
//! One allocator exists per device and kind; all state sits behind a single
//! lock so concurrent replays serialize populate and switch.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::errors::{NativeErrorKind, ReplayError, Result};
use crate::native::{
    CpuDescriptorHandle, DescriptorHeapKind, GpuDescriptorHandle, NativeDevice, NativeHeap,
    NativeHeapId,
};
use crate::replay::Serial;

use super::RingBufferAllocator;

/// A descriptor range inside one heap generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuDescriptorAllocation {
    pub generation: u64,
    /// Submission serial the range was allocated for.
    pub serial: Serial,
    pub offset: u32,
    pub count: u32,
    pub cpu_base: CpuDescriptorHandle,
    pub gpu_base: GpuDescriptorHandle,
}

#[derive(Debug)]
struct AllocatorState {
    heap: NativeHeap,
    generation: u64,
    ring: RingBufferAllocator,
    /// Switched-out heaps with the serial of their last use, oldest first.
    pool: VecDeque<(Serial, NativeHeap)>,
    heaps_created: u32,
}

pub struct ShaderVisibleDescriptorAllocator {
    device: Arc<dyn NativeDevice>,
    kind: DescriptorHeapKind,
    capacity: u32,
    state: Mutex<AllocatorState>,
}

impl std::fmt::Debug for ShaderVisibleDescriptorAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShaderVisibleDescriptorAllocator")
            .field("kind", &self.kind)
            .field("capacity", &self.capacity)
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}

impl ShaderVisibleDescriptorAllocator {
    /// Creates the allocator and its first heap generation.
    pub fn new(device: Arc<dyn NativeDevice>, kind: DescriptorHeapKind, capacity: u32) -> Result<Self> {
        let heap = create_heap(device.as_ref(), kind, capacity)?;
        log::info!("Created {kind:?} shader-visible heap with {capacity} descriptors");

        Ok(Self {
            device,
            kind,
            capacity,
            state: Mutex::new(AllocatorState {
                heap,
                generation: 0,
                ring: RingBufferAllocator::new(u64::from(capacity)),
                pool: VecDeque::new(),
                heaps_created: 1,
            }),
        })
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> DescriptorHeapKind {
        self.kind
    }

    #[inline]
    #[must_use]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// The heap currently bound for this kind.
    #[must_use]
    pub fn shader_visible_heap(&self) -> NativeHeapId {
        self.state.lock().heap.id
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }

    /// Number of native heaps created so far (recycled heaps not counted).
    #[must_use]
    pub fn heaps_created(&self) -> u32 {
        self.state.lock().heaps_created
    }

    /// Sub-allocates `count` descriptors for `pending_serial`.
    pub fn allocate_gpu_descriptors(
        &self,
        count: u32,
        pending_serial: Serial,
    ) -> Option<GpuDescriptorAllocation> {
        let mut state = self.state.lock();
        let offset = state.ring.allocate(u64::from(count), pending_serial)? as u32;
        let heap = state.heap;
        Some(GpuDescriptorAllocation {
            generation: state.generation,
            serial: pending_serial,
            offset,
            count,
            cpu_base: heap.cpu_start.offset(offset, heap.increment),
            gpu_base: heap.gpu_start.offset(offset, heap.increment),
        })
    }

    /// Allocates a range and copies `count` staging descriptors into it.
    pub fn populate(
        &self,
        count: u32,
        source: CpuDescriptorHandle,
        pending_serial: Serial,
    ) -> Option<GpuDescriptorAllocation> {
        let allocation = self.allocate_gpu_descriptors(count, pending_serial)?;
        self.device
            .copy_descriptors_simple(count, allocation.cpu_base, source, self.kind);
        Some(allocation)
    }

    /// An allocation stays usable while its heap generation is current and
    /// it belongs to the submission being recorded. Ranges are reclaimed when
    /// their own serial completes, so a later submission cannot borrow them.
    #[must_use]
    pub fn is_allocation_still_valid(
        &self,
        allocation: &GpuDescriptorAllocation,
        pending_serial: Serial,
    ) -> bool {
        allocation.generation == self.state.lock().generation && allocation.serial == pending_serial
    }

    /// Retires the current heap and binds a fresh generation.
    ///
    /// The oldest pooled heap is reused once the GPU has finished with it;
    /// otherwise a new native heap is created.
    pub fn allocate_and_switch_shader_visible_heap(
        &self,
        pending_serial: Serial,
        completed_serial: Serial,
    ) -> Result<()> {
        let mut state = self.state.lock();

        let retired = state.heap;
        state.pool.push_back((pending_serial, retired));

        let reusable = state
            .pool
            .front()
            .is_some_and(|&(serial, _)| serial <= completed_serial);
        let recycled = if reusable {
            state.pool.pop_front().map(|(_, heap)| heap)
        } else {
            None
        };

        let heap = if let Some(heap) = recycled {
            heap
        } else {
            match create_heap(self.device.as_ref(), self.kind, self.capacity) {
                Ok(heap) => {
                    state.heaps_created += 1;
                    heap
                }
                Err(err) => {
                    // Keep the retired heap bound so the allocator stays usable.
                    state.pool.pop_back();
                    return Err(err);
                }
            }
        };

        state.heap = heap;
        state.generation += 1;
        state.ring = RingBufferAllocator::new(u64::from(self.capacity));

        log::debug!(
            "Switched {:?} shader-visible heap to generation {} ({:?})",
            self.kind,
            state.generation,
            heap.id
        );
        Ok(())
    }

    /// Reclaims descriptor ranges used by completed submissions.
    pub fn tick(&self, completed_serial: Serial) {
        self.state.lock().ring.deallocate(completed_serial);
    }
}

fn create_heap(device: &dyn NativeDevice, kind: DescriptorHeapKind, capacity: u32) -> Result<NativeHeap> {
    device
        .create_shader_visible_heap(kind, capacity)
        .map_err(|source| match source.kind {
            NativeErrorKind::OutOfMemory => {
                log::error!("Out of memory creating {kind:?} shader-visible heap");
                ReplayError::ResourceExhaustion { kind, source }
            }
            NativeErrorKind::DeviceLost | NativeErrorKind::Other => ReplayError::Backend(source),
        })
}

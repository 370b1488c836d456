//! Ray tracing acceleration containers.
//!
//! # Lifecycle
//!
//! ```text
//!   Unbuilt ──Build──► Built ──first Update──► Updated ──Update──► Updated
//!                                 │
//!                                 └─ releases the build scratch region
//! ```
//!
//! Every container owns three memory regions:
//!
//! | Region   | Purpose                              | Lifetime                    |
//! |----------|--------------------------------------|-----------------------------|
//! | `result` | Persistent structure storage         | Container                   |
//! | `build`  | Scratch for the initial build        | Until the first update      |
//! | `update` | Scratch for in-place updates         | Container                   |
//!
//! Top-level containers hold `Weak` references to the bottom-level
//! containers they instance; dropping a bottom-level container makes any
//! later build of the top-level container a validation error.

use std::sync::{Arc, Weak};

use bitflags::bitflags;
use parking_lot::Mutex;

use crate::errors::{ReplayError, Result};
use crate::native::convert::{
    container_build_flags, container_level, geometry_flags, geometry_type, index_format,
    instance_flags,
};
use crate::native::{
    AccelerationStructureInputDescs, AccelerationStructureInputs, GpuAddressRangeAndStride,
    GpuVirtualAddress, NativeDevice, NativeGeometryDesc, NativeIndexFormat, NativeInstanceDesc,
    NativeResource,
};

use super::{IndexFormat, ResourceId};

// ─── Flags & Enums ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerLevel {
    Bottom,
    Top,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeometryType {
    Triangles,
    Aabbs,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ContainerFlags: u32 {
        const ALLOW_UPDATE = 0x1;
        const PREFER_FAST_BUILD = 0x2;
        const PREFER_FAST_TRACE = 0x4;
        const LOW_MEMORY = 0x8;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct GeometryFlags: u32 {
        const OPAQUE = 0x1;
        const ALLOW_ANY_HIT = 0x2;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct InstanceFlags: u32 {
        const TRIANGLE_CULL_DISABLE = 0x1;
        const TRIANGLE_FRONT_COUNTERCLOCKWISE = 0x2;
        const FORCE_OPAQUE = 0x4;
        const FORCE_NO_OPAQUE = 0x8;
    }
}

// ─── Memory ───────────────────────────────────────────────────────────────────

/// A sub-range of a device buffer used as structure or scratch storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryEntry {
    pub buffer: NativeResource,
    pub address: GpuVirtualAddress,
    pub size: u64,
}

/// The three memory regions of a container, allocated by the frontend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScratchMemory {
    pub result: MemoryEntry,
    pub build: MemoryEntry,
    pub update: MemoryEntry,
}

// ─── Descriptors ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeometryIndexData {
    pub address: GpuVirtualAddress,
    pub count: u32,
    pub format: IndexFormat,
}

/// One bottom-level geometry: triangles or procedural AABBs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeometryDescriptor {
    pub ty: GeometryType,
    pub flags: GeometryFlags,
    /// Vertex positions for triangles, AABB records for procedural geometry.
    pub data: GpuAddressRangeAndStride,
    pub index: Option<GeometryIndexData>,
}

#[derive(Debug, Clone)]
pub struct InstanceDescriptor {
    pub container: Arc<AccelerationContainer>,
    pub flags: InstanceFlags,
    pub mask: u8,
    pub instance_id: u32,
    pub instance_offset: u32,
    pub transform: [f32; 12],
}

#[derive(Debug, Clone)]
pub struct AccelerationContainerDescriptor {
    pub level: ContainerLevel,
    pub flags: ContainerFlags,
    /// Bottom-level only.
    pub geometries: Vec<GeometryDescriptor>,
    /// Top-level only.
    pub instances: Vec<InstanceDescriptor>,
    /// Where the frontend uploads [`AccelerationContainer::instance_records`].
    pub instance_buffer: GpuVirtualAddress,
}

// ─── AccelerationContainer ────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct ContainerState {
    built: bool,
    updated: bool,
}

#[derive(Debug)]
pub struct AccelerationContainer {
    id: ResourceId,
    level: ContainerLevel,
    flags: ContainerFlags,
    inputs: AccelerationStructureInputs,
    instance_records: Vec<NativeInstanceDesc>,
    bottom_levels: Vec<Weak<AccelerationContainer>>,
    result: MemoryEntry,
    update: MemoryEntry,
    /// `None` once released after the first update.
    build: Mutex<Option<MemoryEntry>>,
    state: Mutex<ContainerState>,
}

impl AccelerationContainer {
    pub fn new(descriptor: &AccelerationContainerDescriptor, scratch: ScratchMemory) -> Result<Self> {
        let descs = match descriptor.level {
            ContainerLevel::Bottom => {
                if !descriptor.instances.is_empty() {
                    return Err(ReplayError::validation(
                        "bottom-level containers cannot hold instances",
                    ));
                }
                if descriptor.geometries.is_empty() {
                    return Err(ReplayError::validation(
                        "bottom-level container has no geometry",
                    ));
                }
                AccelerationStructureInputDescs::Geometries(
                    descriptor.geometries.iter().map(native_geometry).collect(),
                )
            }
            ContainerLevel::Top => {
                if !descriptor.geometries.is_empty() {
                    return Err(ReplayError::validation(
                        "top-level containers cannot hold geometry",
                    ));
                }
                if descriptor.instances.is_empty() {
                    return Err(ReplayError::validation("top-level container has no instances"));
                }
                if let Some(instance) = descriptor
                    .instances
                    .iter()
                    .find(|i| i.container.level != ContainerLevel::Bottom)
                {
                    return Err(ReplayError::validation(format!(
                        "instance {} references a top-level container",
                        instance.instance_id
                    )));
                }
                AccelerationStructureInputDescs::Instances {
                    address: descriptor.instance_buffer,
                    count: descriptor.instances.len() as u32,
                }
            }
        };

        let mut bottom_levels: Vec<Weak<AccelerationContainer>> = Vec::new();
        let mut seen = rustc_hash::FxHashSet::default();
        for instance in &descriptor.instances {
            if seen.insert(instance.container.id) {
                bottom_levels.push(Arc::downgrade(&instance.container));
            }
        }

        let instance_records = descriptor
            .instances
            .iter()
            .map(|instance| NativeInstanceDesc {
                transform: instance.transform,
                instance_id: instance.instance_id,
                instance_mask: instance.mask,
                instance_contribution_to_hit_group_index: instance.instance_offset,
                flags: instance_flags(instance.flags),
                acceleration_structure: instance.container.result.address,
            })
            .collect();

        Ok(Self {
            id: ResourceId::next(),
            level: descriptor.level,
            flags: descriptor.flags,
            inputs: AccelerationStructureInputs {
                ty: container_level(descriptor.level),
                flags: container_build_flags(descriptor.flags),
                descs,
            },
            instance_records,
            bottom_levels,
            result: scratch.result,
            update: scratch.update,
            build: Mutex::new(Some(scratch.build)),
            state: Mutex::new(ContainerState::default()),
        })
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> ResourceId {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn level(&self) -> ContainerLevel {
        self.level
    }

    #[inline]
    #[must_use]
    pub fn flags(&self) -> ContainerFlags {
        self.flags
    }

    #[inline]
    #[must_use]
    pub fn allows_update(&self) -> bool {
        self.flags.contains(ContainerFlags::ALLOW_UPDATE)
    }

    /// Native build inputs, without the update flag.
    #[inline]
    #[must_use]
    pub fn build_information(&self) -> &AccelerationStructureInputs {
        &self.inputs
    }

    /// Instance records to upload into the instance buffer.
    #[inline]
    #[must_use]
    pub fn instance_records(&self) -> &[NativeInstanceDesc] {
        &self.instance_records
    }

    #[inline]
    #[must_use]
    pub fn result_memory(&self) -> MemoryEntry {
        self.result
    }

    #[inline]
    #[must_use]
    pub fn update_memory(&self) -> MemoryEntry {
        self.update
    }

    /// Build scratch region, `None` once released.
    #[must_use]
    pub fn build_memory(&self) -> Option<MemoryEntry> {
        *self.build.lock()
    }

    #[must_use]
    pub fn is_built(&self) -> bool {
        self.state.lock().built
    }

    #[must_use]
    pub fn is_updated(&self) -> bool {
        self.state.lock().updated
    }

    pub fn set_build_state(&self, built: bool) {
        self.state.lock().built = built;
    }

    pub fn set_update_state(&self, updated: bool) {
        self.state.lock().updated = updated;
    }

    /// Returns the build scratch region to the device.
    ///
    /// Only the first call releases anything; returns whether it did.
    pub fn release_build_scratch(&self, device: &dyn NativeDevice) -> bool {
        let Some(memory) = self.build.lock().take() else {
            return false;
        };
        device.release_memory(&memory);
        log::debug!(
            "Released build scratch of container {:?} ({} bytes)",
            self.id,
            memory.size
        );
        true
    }

    /// Every bottom-level container this one instances must still exist and
    /// be built.
    pub fn check_bottom_levels_built(&self) -> Result<()> {
        for weak in &self.bottom_levels {
            let Some(bottom) = weak.upgrade() else {
                return Err(ReplayError::validation(format!(
                    "container {:?} instances a destroyed bottom-level container",
                    self.id
                )));
            };
            if !bottom.is_built() {
                return Err(ReplayError::validation(format!(
                    "container {:?} instances bottom-level container {:?} before it is built",
                    self.id, bottom.id
                )));
            }
        }
        Ok(())
    }
}

fn native_geometry(geometry: &GeometryDescriptor) -> NativeGeometryDesc {
    let (index_buffer, index_count, format) = match geometry.index {
        Some(index) => (index.address, index.count, index_format(index.format)),
        None => (0, 0, NativeIndexFormat::Unknown),
    };
    NativeGeometryDesc {
        ty: geometry_type(geometry.ty),
        flags: geometry_flags(geometry.flags),
        data: geometry.data,
        index_buffer,
        index_count,
        index_format: format,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::recording::RecordingDevice;

    fn memory(base: u64) -> ScratchMemory {
        ScratchMemory {
            result: MemoryEntry { buffer: NativeResource(base), address: base << 16, size: 256 },
            build: MemoryEntry { buffer: NativeResource(base + 1), address: (base + 1) << 16, size: 128 },
            update: MemoryEntry { buffer: NativeResource(base + 2), address: (base + 2) << 16, size: 64 },
        }
    }

    fn triangles() -> GeometryDescriptor {
        GeometryDescriptor {
            ty: GeometryType::Triangles,
            flags: GeometryFlags::OPAQUE,
            data: GpuAddressRangeAndStride { start: 0x4000, size_in_bytes: 36, stride_in_bytes: 12 },
            index: None,
        }
    }

    fn bottom() -> Arc<AccelerationContainer> {
        let desc = AccelerationContainerDescriptor {
            level: ContainerLevel::Bottom,
            flags: ContainerFlags::ALLOW_UPDATE,
            geometries: vec![triangles()],
            instances: Vec::new(),
            instance_buffer: 0,
        };
        Arc::new(AccelerationContainer::new(&desc, memory(10)).unwrap())
    }

    fn instance(container: &Arc<AccelerationContainer>, id: u32) -> InstanceDescriptor {
        InstanceDescriptor {
            container: Arc::clone(container),
            flags: InstanceFlags::FORCE_OPAQUE,
            mask: 0xFF,
            instance_id: id,
            instance_offset: 0,
            transform: [1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0],
        }
    }

    #[test]
    fn build_scratch_is_released_once() {
        let device = RecordingDevice::new();
        let container = bottom();
        assert!(container.release_build_scratch(&device));
        assert!(!container.release_build_scratch(&device));
        assert_eq!(device.release_count(NativeResource(11)), 1);
        assert!(container.build_memory().is_none());
    }

    #[test]
    fn top_level_deduplicates_bottom_levels() {
        let blas = bottom();
        let desc = AccelerationContainerDescriptor {
            level: ContainerLevel::Top,
            flags: ContainerFlags::empty(),
            geometries: Vec::new(),
            instances: vec![instance(&blas, 0), instance(&blas, 1)],
            instance_buffer: 0x9000,
        };
        let tlas = AccelerationContainer::new(&desc, memory(20)).unwrap();
        assert_eq!(tlas.bottom_levels.len(), 1);
        assert_eq!(tlas.instance_records().len(), 2);
        assert_eq!(tlas.instance_records()[0].acceleration_structure, blas.result_memory().address);
    }

    #[test]
    fn unbuilt_or_dropped_bottom_level_is_rejected() {
        let blas = bottom();
        let desc = AccelerationContainerDescriptor {
            level: ContainerLevel::Top,
            flags: ContainerFlags::empty(),
            geometries: Vec::new(),
            instances: vec![instance(&blas, 0)],
            instance_buffer: 0x9000,
        };
        let tlas = AccelerationContainer::new(&desc, memory(20)).unwrap();
        assert!(tlas.check_bottom_levels_built().unwrap_err().is_validation());

        blas.set_build_state(true);
        assert!(tlas.check_bottom_levels_built().is_ok());

        drop(desc);
        drop(blas);
        assert!(tlas.check_bottom_levels_built().is_err());
    }

    #[test]
    fn bottom_level_without_geometry_is_rejected() {
        let desc = AccelerationContainerDescriptor {
            level: ContainerLevel::Bottom,
            flags: ContainerFlags::empty(),
            geometries: Vec::new(),
            instances: Vec::new(),
            instance_buffer: 0,
        };
        assert!(AccelerationContainer::new(&desc, memory(1)).is_err());
    }
}

//! Device Lifecycle Tests
//!
//! Tests for:
//! - Settings documents driving device creation
//! - Descriptor range reclamation by completed serials
//! - Heap recycling across generations
//! - Resource state decay between submissions

use std::sync::Arc;

use tessera::commands::{Command, CommandStream, CopyBufferToBufferCmd};
use tessera::native::recording::{RecordingCommandList, RecordingDevice};
use tessera::native::{NativeResource, ResourceBarrier, ResourceStates};
use tessera::resources::{
    Buffer, BufferDescriptor, BufferUsage, CommandBufferResourceUsage, MemoryLocation,
};
use tessera::{CommandBuffer, CommandRecordingContext, Device, ReplayError, ReplaySettings};

// ============================================================================
// Helpers
// ============================================================================

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn buffer(id: u64) -> Arc<Buffer> {
    Arc::new(Buffer::new(
        NativeResource(id),
        id << 20,
        &BufferDescriptor {
            size: 4096,
            usage: BufferUsage::COPY_SRC | BufferUsage::COPY_DST,
            location: MemoryLocation::Device,
        },
    ))
}

fn copy(source: &Arc<Buffer>, destination: &Arc<Buffer>) -> Command {
    Command::CopyBufferToBuffer(CopyBufferToBufferCmd {
        source: Arc::clone(source),
        source_offset: 0,
        destination: Arc::clone(destination),
        destination_offset: 0,
        size: 256,
    })
}

fn record(device: &Device, commands: Vec<Command>) -> anyhow::Result<RecordingCommandList> {
    let buffer = CommandBuffer::new(
        CommandStream::from_commands(commands),
        CommandBufferResourceUsage::default(),
    );
    let mut list = RecordingCommandList::new();
    {
        let mut ctx = CommandRecordingContext::new(device, &mut list);
        buffer.record_commands(&mut ctx)?;
    }
    Ok(list)
}

// ============================================================================
// Settings
// ============================================================================

#[test]
fn settings_document_configures_the_device() -> anyhow::Result<()> {
    init_logger();
    let settings = ReplaySettings::from_json_str(
        r#"{ "use_native_render_pass": true, "emit_debug_markers": false, "view_heap_size": 256 }"#,
    )?;
    let native = Arc::new(RecordingDevice::new());
    let device = Device::new(native.clone(), settings)?;

    assert!(device.settings().use_native_render_pass);
    assert!(!device.settings().emit_debug_markers);
    assert_eq!(device.view_allocator().capacity(), 256);
    assert_eq!(device.sampler_allocator().capacity(), 2048);
    assert_eq!(native.heaps_created(), 2);
    Ok(())
}

#[test]
fn exhausted_first_heap_fails_device_creation() {
    init_logger();
    let native = Arc::new(RecordingDevice::with_heap_budget(1));
    let err = Device::new(native, ReplaySettings::default()).unwrap_err();
    assert!(matches!(err, ReplayError::ResourceExhaustion { .. }));
}

// ============================================================================
// Descriptor Reclamation
// ============================================================================

#[test]
fn completed_serial_frees_descriptor_ranges() -> anyhow::Result<()> {
    init_logger();
    let settings = ReplaySettings {
        view_heap_size: 64,
        ..ReplaySettings::default()
    };
    let device = Device::new(Arc::new(RecordingDevice::new()), settings)?;
    let allocator = device.view_allocator();

    let serial = device.pending_serial();
    assert!(allocator.allocate_gpu_descriptors(64, serial).is_some());
    assert!(allocator.allocate_gpu_descriptors(1, serial).is_none());

    let submitted = device.submit();
    // Still in flight.
    assert!(allocator.allocate_gpu_descriptors(1, device.pending_serial()).is_none());

    device.tick(submitted);
    let allocation = allocator.allocate_gpu_descriptors(64, device.pending_serial());
    assert!(allocation.is_some_and(|a| a.offset == 0));
    Ok(())
}

#[test]
fn retired_heaps_are_recycled_once_complete() -> anyhow::Result<()> {
    init_logger();
    let native = Arc::new(RecordingDevice::new());
    let device = Device::new(native.clone(), ReplaySettings::default())?;
    let allocator = device.view_allocator();
    let first = allocator.shader_visible_heap();

    allocator.allocate_and_switch_shader_visible_heap(1, 0)?;
    assert_eq!(native.heaps_created(), 3);
    assert_ne!(allocator.shader_visible_heap(), first);

    // The heap retired at serial 1 is reusable once serial 1 completes.
    allocator.allocate_and_switch_shader_visible_heap(2, 1)?;
    assert_eq!(native.heaps_created(), 3);
    assert_eq!(allocator.shader_visible_heap(), first);
    assert_eq!(allocator.generation(), 2);
    Ok(())
}

// ============================================================================
// State Decay
// ============================================================================

#[test]
fn buffers_decay_to_common_between_submissions() -> anyhow::Result<()> {
    init_logger();
    let device = Device::new(Arc::new(RecordingDevice::new()), ReplaySettings::default())?;
    let a = buffer(1);
    let b = buffer(2);

    let first = record(&device, vec![copy(&a, &b)])?;
    assert!(first.barriers().is_empty());
    device.submit();

    // `b` left COPY_DEST in the previous submission; reading it now is a
    // promotion from COMMON.
    let second = record(&device, vec![copy(&b, &a)])?;
    assert!(second.barriers().is_empty());
    Ok(())
}

#[test]
fn buffers_keep_their_state_within_a_submission() -> anyhow::Result<()> {
    init_logger();
    let device = Device::new(Arc::new(RecordingDevice::new()), ReplaySettings::default())?;
    let a = buffer(1);
    let b = buffer(2);

    record(&device, vec![copy(&a, &b)])?;
    let second = record(&device, vec![copy(&b, &a)])?;
    assert_eq!(
        second.barriers()[0],
        ResourceBarrier::Transition {
            resource: b.native(),
            before: ResourceStates::COPY_DEST,
            after: ResourceStates::COPY_SOURCE,
        }
    );
    Ok(())
}

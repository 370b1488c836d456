//! Render Pass Replay Tests
//!
//! Tests for:
//! - Lazy attachment clears: uninitialized Load attachments become Clear
//! - Native render pass vs emulated clears + OMSetRenderTargets
//! - Multisample resolve on both paths
//! - Default dynamic state and explicit viewport/scissor/blend/stencil
//! - Render bundles replayed with the pass trackers
//! - Bind groups rebound on the graphics root signature after a compute pass
//! - Debug marker gating

use std::sync::Arc;

use smallvec::smallvec;

use tessera::commands::{
    BeginRenderPassCmd, Command, CommandStream, DispatchCmd, DrawCmd, DrawIndexedCmd, LoadOp,
    RenderPassColorAttachment, RenderPassDepthStencilAttachment, SetBindGroupCmd,
    SetIndexBufferCmd, SetScissorRectCmd, SetVertexBufferCmd, StoreOp,
};
use tessera::native::recording::{NativeCall, RecordingCommandList, RecordingDevice};
use tessera::native::{
    BeginningAccess, BindPoint, ClearFlags, ClearValue, CpuDescriptorHandle, EndingAccess, NativeResource,
    PipelineStateId, Rect, RenderPassFlags, ResourceBarrier, ResourceStates, RootSignatureId,
    VertexBufferView, Viewport,
};
use tessera::resources::{
    BindGroup, BindGroupLayout, BindGroupLayoutEntry, BindingResource, BindingType, Buffer,
    BufferDescriptor, ComputePipeline, StagingDescriptors, BufferUsage, CommandBufferResourceUsage, Extent3d, IndexFormat,
    MemoryLocation, PassResourceUsage, PipelineLayout, PrimitiveKind, RenderPipeline,
    RenderPipelineDescriptor, Texture, TextureDescriptor, TextureDimension, TextureFormat,
    TextureUsage, TextureView,
};
use tessera::{CommandBuffer, CommandRecordingContext, Device, RenderBundle, ReplaySettings};

// ============================================================================
// Helpers
// ============================================================================

fn device(use_native_render_pass: bool) -> Device {
    let settings = ReplaySettings {
        use_native_render_pass,
        ..ReplaySettings::default()
    };
    Device::new(Arc::new(RecordingDevice::new()), settings).unwrap()
}

fn texture(id: u64, format: TextureFormat, sample_count: u32) -> Arc<Texture> {
    Arc::new(Texture::new(
        NativeResource(id),
        &TextureDescriptor {
            dimension: TextureDimension::D2,
            size: Extent3d {
                width: 64,
                height: 32,
                depth: 1,
            },
            format,
            mip_level_count: 1,
            sample_count,
            usage: TextureUsage::OUTPUT_ATTACHMENT | TextureUsage::SAMPLED,
        },
    ))
}

fn view(texture: &Arc<Texture>) -> Arc<TextureView> {
    Arc::new(TextureView::single(
        texture,
        CpuDescriptorHandle(0x100 + texture.native().0),
    ))
}

fn color(view: &Arc<TextureView>, load_op: LoadOp) -> RenderPassColorAttachment {
    RenderPassColorAttachment {
        view: Arc::clone(view),
        resolve_target: None,
        load_op,
        store_op: StoreOp::Store,
        clear_color: [0.25, 0.5, 0.75, 1.0],
    }
}

fn begin(color_attachments: Vec<RenderPassColorAttachment>, sample_count: u32) -> Command {
    Command::BeginRenderPass(Box::new(BeginRenderPassCmd {
        color_attachments: color_attachments.into_iter().collect(),
        depth_stencil_attachment: None,
        width: 64,
        height: 32,
        sample_count,
    }))
}

fn render_pipeline() -> Arc<RenderPipeline> {
    let layout = PipelineLayout::new(RootSignatureId(2), &[]).unwrap();
    Arc::new(
        RenderPipeline::new(RenderPipelineDescriptor {
            layout: Arc::new(layout),
            pipeline_state: PipelineStateId(2),
            primitive: PrimitiveKind::TriangleList,
            index_format: IndexFormat::Uint16,
            vertex_buffers: vec![(0, 12), (1, 8)],
        })
        .unwrap(),
    )
}

fn buffer(id: u64, usage: BufferUsage) -> Arc<Buffer> {
    Arc::new(Buffer::new(
        NativeResource(id),
        id << 20,
        &BufferDescriptor {
            size: 4096,
            usage,
            location: MemoryLocation::Device,
        },
    ))
}

fn record(
    device: &Device,
    commands: Vec<Command>,
    per_pass: Vec<PassResourceUsage>,
) -> (tessera::Result<()>, RecordingCommandList) {
    let buffer = CommandBuffer::new(
        CommandStream::from_commands(commands),
        CommandBufferResourceUsage { per_pass },
    );
    let mut list = RecordingCommandList::new();
    let result = {
        let mut ctx = CommandRecordingContext::new(device, &mut list);
        buffer.record_commands(&mut ctx)
    };
    (result, list)
}

fn attachment_usage(textures: &[&Arc<Texture>]) -> PassResourceUsage {
    textures.iter().fold(PassResourceUsage::new(), |usage, texture| {
        usage.with_texture(texture, TextureUsage::OUTPUT_ATTACHMENT)
    })
}

// ============================================================================
// Lazy Clears
// ============================================================================

#[test]
fn uninitialized_load_is_cleared_to_zero() {
    let device = device(false);
    let target = texture(1, TextureFormat::Rgba8Unorm, 1);
    let target_view = view(&target);

    let commands = vec![
        begin(vec![color(&target_view, LoadOp::Load)], 1),
        Command::EndRenderPass,
        begin(vec![color(&target_view, LoadOp::Load)], 1),
        Command::EndRenderPass,
    ];
    let usage = attachment_usage(&[&target]);
    let (result, list) = record(&device, commands, vec![usage.clone(), usage]);
    result.unwrap();

    // Only the first pass clears; its store initializes the attachment.
    let clears: Vec<_> = list
        .calls()
        .iter()
        .filter(|c| matches!(c, NativeCall::ClearRenderTargetView { .. }))
        .collect();
    assert_eq!(
        clears,
        vec![&NativeCall::ClearRenderTargetView {
            view: target_view.attachment_descriptor(),
            color: [0.0; 4],
        }]
    );
    assert!(target.is_subresource_content_initialized(target.full_range()));
    assert_eq!(
        list.count(|c| matches!(c, NativeCall::OmSetRenderTargets { .. })),
        2
    );
    // Attachments are never cleared through ClearTexture.
    assert_eq!(list.count(|c| matches!(c, NativeCall::ClearTexture { .. })), 0);
}

#[test]
fn discarded_attachment_is_cleared_again() {
    let device = device(false);
    let target = texture(2, TextureFormat::Rgba8Unorm, 1);
    let target_view = view(&target);

    let mut discard = color(&target_view, LoadOp::Clear);
    discard.store_op = StoreOp::Clear;
    let commands = vec![
        begin(vec![discard], 1),
        Command::EndRenderPass,
        begin(vec![color(&target_view, LoadOp::Load)], 1),
        Command::EndRenderPass,
    ];
    let usage = attachment_usage(&[&target]);
    let (result, list) = record(&device, commands, vec![usage.clone(), usage]);
    result.unwrap();

    let colors: Vec<[f32; 4]> = list
        .calls()
        .iter()
        .filter_map(|c| match c {
            NativeCall::ClearRenderTargetView { color, .. } => Some(*color),
            _ => None,
        })
        .collect();
    assert_eq!(colors, vec![[0.25, 0.5, 0.75, 1.0], [0.0; 4]]);
}

#[test]
fn depth_stencil_is_cleared_with_both_flags() {
    let device = device(false);
    let depth = texture(3, TextureFormat::Depth24PlusStencil8, 1);
    let depth_view = view(&depth);

    let commands = vec![
        Command::BeginRenderPass(Box::new(BeginRenderPassCmd {
            color_attachments: smallvec![],
            depth_stencil_attachment: Some(RenderPassDepthStencilAttachment {
                view: Arc::clone(&depth_view),
                depth_load_op: LoadOp::Load,
                depth_store_op: StoreOp::Store,
                clear_depth: 1.0,
                stencil_load_op: LoadOp::Load,
                stencil_store_op: StoreOp::Store,
                clear_stencil: 7,
            }),
            width: 64,
            height: 32,
            sample_count: 1,
        })),
        Command::EndRenderPass,
    ];
    let (result, list) = record(&device, commands, vec![attachment_usage(&[&depth])]);
    result.unwrap();

    assert!(list.calls().contains(&NativeCall::ClearDepthStencilView {
        view: depth_view.attachment_descriptor(),
        flags: ClearFlags::DEPTH | ClearFlags::STENCIL,
        depth: 0.0,
        stencil: 0,
    }));
    assert!(list.calls().contains(&NativeCall::ResourceBarrier(vec![
        ResourceBarrier::Transition {
            resource: depth.native(),
            before: ResourceStates::COMMON,
            after: ResourceStates::DEPTH_WRITE,
        }
    ])));
}

// ============================================================================
// Native vs Emulated
// ============================================================================

#[test]
fn native_render_pass_carries_access_descriptors() {
    let device = device(true);
    let target = texture(4, TextureFormat::Bgra8Unorm, 1);
    let target_view = view(&target);
    let storage = buffer(5, BufferUsage::STORAGE);

    let commands = vec![
        begin(vec![color(&target_view, LoadOp::Clear)], 1),
        Command::EndRenderPass,
    ];
    let usage = attachment_usage(&[&target]).with_buffer(&storage, BufferUsage::STORAGE);
    let (result, list) = record(&device, commands, vec![usage]);
    result.unwrap();

    let begin_at = list
        .position(|c| matches!(c, NativeCall::BeginRenderPass { .. }))
        .unwrap();
    let NativeCall::BeginRenderPass {
        render_targets,
        depth_stencil,
        flags,
    } = &list.calls()[begin_at]
    else {
        unreachable!();
    };
    assert_eq!(render_targets.len(), 1);
    assert_eq!(render_targets[0].cpu_descriptor, target_view.attachment_descriptor());
    assert_eq!(
        render_targets[0].beginning_access,
        BeginningAccess::Clear(ClearValue::Color([0.25, 0.5, 0.75, 1.0]))
    );
    assert_eq!(render_targets[0].ending_access, EndingAccess::Preserve);
    assert!(depth_stencil.is_none());
    assert_eq!(*flags, RenderPassFlags::ALLOW_UAV_WRITES);

    assert_eq!(list.calls().last(), Some(&NativeCall::EndRenderPass));
    assert_eq!(list.count(|c| matches!(c, NativeCall::OmSetRenderTargets { .. })), 0);
    assert_eq!(
        list.count(|c| matches!(c, NativeCall::ClearRenderTargetView { .. })),
        0
    );
}

#[test]
fn emulated_render_pass_never_begins_natively() {
    let device = device(false);
    let target = texture(6, TextureFormat::Rgba8Unorm, 1);
    let target_view = view(&target);

    let commands = vec![
        begin(vec![color(&target_view, LoadOp::Clear)], 1),
        Command::EndRenderPass,
    ];
    let (result, list) = record(&device, commands, vec![attachment_usage(&[&target])]);
    result.unwrap();

    assert_eq!(list.count(|c| matches!(c, NativeCall::BeginRenderPass { .. })), 0);
    assert_eq!(list.count(|c| matches!(c, NativeCall::EndRenderPass)), 0);
    assert!(list.calls().contains(&NativeCall::OmSetRenderTargets {
        render_targets: vec![target_view.attachment_descriptor()],
        depth_stencil: None,
    }));
}

// ============================================================================
// Resolve
// ============================================================================

fn resolve_pass(device: &Device) -> (Arc<Texture>, Arc<Texture>, RecordingCommandList) {
    let source = texture(10, TextureFormat::Rgba8Unorm, 4);
    let destination = texture(11, TextureFormat::Rgba8Unorm, 1);
    let mut attachment = color(&view(&source), LoadOp::Clear);
    attachment.resolve_target = Some(view(&destination));
    attachment.store_op = StoreOp::Clear;

    let commands = vec![begin(vec![attachment], 4), Command::EndRenderPass];
    let usage = attachment_usage(&[&source, &destination]);
    let (result, list) = record(device, commands, vec![usage]);
    result.unwrap();
    (source, destination, list)
}

#[test]
fn emulated_resolve_runs_after_the_pass() {
    let device = device(false);
    let (source, destination, list) = resolve_pass(&device);

    assert_eq!(
        list.calls().last(),
        Some(&NativeCall::ResolveSubresource {
            dest: destination.native(),
            dest_subresource: 0,
            source: source.native(),
            source_subresource: 0,
            format: TextureFormat::Rgba8Unorm,
        })
    );
    assert!(list.barriers().contains(&ResourceBarrier::Transition {
        resource: source.native(),
        before: ResourceStates::RENDER_TARGET,
        after: ResourceStates::RESOLVE_SOURCE,
    }));
    assert_eq!(destination.current_state(), ResourceStates::RESOLVE_DEST);
    assert!(destination.is_subresource_content_initialized(destination.full_range()));
    assert!(!source.is_subresource_content_initialized(source.full_range()));
}

#[test]
fn native_resolve_is_an_ending_access() {
    let device = device(true);
    let (source, destination, list) = resolve_pass(&device);

    assert_eq!(list.count(|c| matches!(c, NativeCall::ResolveSubresource { .. })), 0);
    let Some(NativeCall::BeginRenderPass { render_targets, .. }) = list
        .calls()
        .iter()
        .find(|c| matches!(c, NativeCall::BeginRenderPass { .. }))
    else {
        unreachable!();
    };
    let EndingAccess::Resolve(params) = render_targets[0].ending_access else {
        panic!("expected a resolve ending access");
    };
    assert_eq!(params.source, source.native());
    assert_eq!(params.destination, destination.native());
    assert_eq!((params.width, params.height), (64, 32));
    assert!(!params.preserve_source);
}

// ============================================================================
// Dynamic State
// ============================================================================

#[test]
fn default_dynamic_state_covers_the_attachments() {
    let device = device(false);
    let target = texture(20, TextureFormat::Rgba8Unorm, 1);
    let target_view = view(&target);

    let commands = vec![
        begin(vec![color(&target_view, LoadOp::Clear)], 1),
        Command::SetScissorRect(SetScissorRectCmd {
            x: 4,
            y: 2,
            width: 8,
            height: 6,
        }),
        Command::SetStencilReference(3),
        Command::SetBlendColor([1.0, 0.0, 0.0, 1.0]),
        Command::EndRenderPass,
    ];
    let (result, list) = record(&device, commands, vec![attachment_usage(&[&target])]);
    result.unwrap();

    let om_at = list
        .position(|c| matches!(c, NativeCall::OmSetRenderTargets { .. }))
        .unwrap();
    assert_eq!(
        list.calls()[om_at + 1],
        NativeCall::RsSetViewports(vec![Viewport {
            top_left_x: 0.0,
            top_left_y: 0.0,
            width: 64.0,
            height: 32.0,
            min_depth: 0.0,
            max_depth: 1.0,
        }])
    );
    assert_eq!(
        list.calls()[om_at + 2],
        NativeCall::RsSetScissorRects(vec![Rect {
            left: 0,
            top: 0,
            right: 64,
            bottom: 32,
        }])
    );
    assert_eq!(list.calls()[om_at + 3], NativeCall::OmSetBlendFactor([0.0; 4]));
    assert_eq!(
        list.calls()[om_at + 4],
        NativeCall::RsSetScissorRects(vec![Rect {
            left: 4,
            top: 2,
            right: 12,
            bottom: 8,
        }])
    );
    assert_eq!(list.calls()[om_at + 5], NativeCall::OmSetStencilRef(3));
    assert_eq!(
        list.calls()[om_at + 6],
        NativeCall::OmSetBlendFactor([1.0, 0.0, 0.0, 1.0])
    );
}

// ============================================================================
// Draws & Bundles
// ============================================================================

#[test]
fn vertex_and_index_buffers_bind_once_per_change() {
    let device = device(false);
    let target = texture(30, TextureFormat::Rgba8Unorm, 1);
    let target_view = view(&target);
    let vertices = buffer(31, BufferUsage::VERTEX);
    let indices = buffer(32, BufferUsage::INDEX);
    let pipeline = render_pipeline();

    let draw = Command::DrawIndexed(DrawIndexedCmd {
        index_count: 6,
        instance_count: 1,
        first_index: 0,
        base_vertex: 0,
        first_instance: 0,
    });
    let commands = vec![
        begin(vec![color(&target_view, LoadOp::Clear)], 1),
        Command::SetRenderPipeline(Arc::clone(&pipeline)),
        Command::SetVertexBuffer(SetVertexBufferCmd {
            slot: 0,
            buffer: Arc::clone(&vertices),
            offset: 0,
            size: 1024,
        }),
        Command::SetVertexBuffer(SetVertexBufferCmd {
            slot: 1,
            buffer: Arc::clone(&vertices),
            offset: 1024,
            size: 512,
        }),
        Command::SetIndexBuffer(SetIndexBufferCmd {
            buffer: Arc::clone(&indices),
            offset: 0,
            size: 12,
        }),
        draw.clone(),
        draw,
        Command::EndRenderPass,
    ];
    let usage = attachment_usage(&[&target])
        .with_buffer(&vertices, BufferUsage::VERTEX)
        .with_buffer(&indices, BufferUsage::INDEX);
    let (result, list) = record(&device, commands, vec![usage]);
    result.unwrap();

    let vertex_binds: Vec<_> = list
        .calls()
        .iter()
        .filter(|c| matches!(c, NativeCall::IaSetVertexBuffers { .. }))
        .collect();
    assert_eq!(
        vertex_binds,
        vec![&NativeCall::IaSetVertexBuffers {
            start_slot: 0,
            views: vec![
                VertexBufferView {
                    location: vertices.gpu_address(),
                    size_in_bytes: 1024,
                    stride_in_bytes: 12,
                },
                VertexBufferView {
                    location: vertices.gpu_address() + 1024,
                    size_in_bytes: 512,
                    stride_in_bytes: 8,
                },
            ],
        }]
    );
    assert_eq!(list.count(|c| matches!(c, NativeCall::IaSetIndexBuffer(_))), 1);
    assert_eq!(
        list.count(|c| matches!(c, NativeCall::DrawIndexedInstanced { .. })),
        2
    );
}

#[test]
fn bundles_replay_with_pass_state() {
    let device = device(false);
    let target = texture(40, TextureFormat::Rgba8Unorm, 1);
    let target_view = view(&target);
    let vertices = buffer(41, BufferUsage::VERTEX);
    let pipeline = render_pipeline();

    let bundle = Arc::new(
        RenderBundle::new(vec![
            Command::SetRenderPipeline(Arc::clone(&pipeline)),
            Command::SetVertexBuffer(SetVertexBufferCmd {
                slot: 0,
                buffer: Arc::clone(&vertices),
                offset: 0,
                size: 36,
            }),
            Command::Draw(DrawCmd {
                vertex_count: 3,
                instance_count: 1,
                first_vertex: 0,
                first_instance: 0,
            }),
        ])
        .unwrap(),
    );

    let commands = vec![
        begin(vec![color(&target_view, LoadOp::Clear)], 1),
        Command::ExecuteBundles(vec![Arc::clone(&bundle), bundle]),
        Command::EndRenderPass,
    ];
    let usage = attachment_usage(&[&target]).with_buffer(&vertices, BufferUsage::VERTEX);
    let (result, list) = record(&device, commands, vec![usage]);
    result.unwrap();

    assert_eq!(list.count(|c| matches!(c, NativeCall::DrawInstanced { .. })), 2);
    assert_eq!(list.count(|c| matches!(c, NativeCall::SetPipelineState(_))), 2);
    // The second bundle rebinds only the slot it sets.
    assert_eq!(
        list.count(|c| matches!(c, NativeCall::IaSetVertexBuffers { .. })),
        2
    );
}

// ============================================================================
// Bind Groups Across Passes
// ============================================================================

#[test]
fn bind_group_is_rebound_on_graphics_after_compute() {
    let device = device(false);
    let target = texture(40, TextureFormat::Bgra8Unorm, 1);
    let target_view = view(&target);
    let uniforms = buffer(41, BufferUsage::UNIFORM);

    let group_layout = Arc::new(
        BindGroupLayout::new(&[BindGroupLayoutEntry {
            binding: 0,
            ty: BindingType::UniformBuffer,
            has_dynamic_offset: false,
        }])
        .unwrap(),
    );
    let group = Arc::new(
        BindGroup::new(
            &group_layout,
            vec![(
                0,
                BindingResource::Buffer {
                    buffer: Arc::clone(&uniforms),
                    offset: 0,
                    size: 256,
                },
            )],
            StagingDescriptors::default(),
        )
        .unwrap(),
    );
    let layout = Arc::new(PipelineLayout::new(RootSignatureId(3), &[Some(group_layout)]).unwrap());
    let compute = Arc::new(ComputePipeline::new(Arc::clone(&layout), PipelineStateId(3)));
    let render = Arc::new(
        RenderPipeline::new(RenderPipelineDescriptor {
            layout: Arc::clone(&layout),
            pipeline_state: PipelineStateId(4),
            primitive: PrimitiveKind::TriangleList,
            index_format: IndexFormat::Uint16,
            vertex_buffers: Vec::new(),
        })
        .unwrap(),
    );
    let set_group = || {
        Command::SetBindGroup(SetBindGroupCmd {
            index: 0,
            group: Arc::clone(&group),
            dynamic_offsets: smallvec![],
        })
    };

    let commands = vec![
        Command::BeginComputePass,
        Command::SetComputePipeline(compute),
        set_group(),
        Command::Dispatch(DispatchCmd { x: 1, y: 1, z: 1 }),
        Command::EndComputePass,
        begin(vec![color(&target_view, LoadOp::Clear)], 1),
        Command::SetRenderPipeline(render),
        set_group(),
        Command::Draw(DrawCmd {
            vertex_count: 3,
            instance_count: 1,
            first_vertex: 0,
            first_instance: 0,
        }),
        Command::EndRenderPass,
    ];
    let (result, list) = record(
        &device,
        commands,
        vec![PassResourceUsage::new(), attachment_usage(&[&target])],
    );
    result.unwrap();

    let tables: Vec<(BindPoint, u64)> = list
        .calls()
        .iter()
        .filter_map(|call| match call {
            NativeCall::SetRootDescriptorTable {
                bind_point,
                base_descriptor,
                ..
            } => Some((*bind_point, base_descriptor.0)),
            _ => None,
        })
        .collect();
    // The allocation from the compute pass is still valid and is reused.
    let base = group.base_view_descriptor().unwrap().0;
    assert_eq!(
        tables,
        vec![(BindPoint::Compute, base), (BindPoint::Graphics, base)]
    );

    let table_at = list
        .position(|c| {
            matches!(
                c,
                NativeCall::SetRootDescriptorTable {
                    bind_point: BindPoint::Graphics,
                    ..
                }
            )
        })
        .unwrap();
    let draw_at = list
        .position(|c| matches!(c, NativeCall::DrawInstanced { .. }))
        .unwrap();
    assert!(table_at < draw_at);
}

// ============================================================================
// Debug Markers
// ============================================================================

#[test]
fn markers_follow_settings() {
    for emit in [true, false] {
        let settings = ReplaySettings {
            emit_debug_markers: emit,
            ..ReplaySettings::default()
        };
        let device = Device::new(Arc::new(RecordingDevice::new()), settings).unwrap();
        let target = texture(50, TextureFormat::Rgba8Unorm, 1);
        let target_view = view(&target);

        let commands = vec![
            Command::PushDebugGroup("frame".into()),
            begin(vec![color(&target_view, LoadOp::Clear)], 1),
            Command::InsertDebugMarker("draw".into()),
            Command::EndRenderPass,
            Command::PopDebugGroup,
        ];
        let (result, list) = record(&device, commands, vec![attachment_usage(&[&target])]);
        result.unwrap();

        let markers = list.count(|c| {
            matches!(
                c,
                NativeCall::BeginEvent(_) | NativeCall::SetMarker(_) | NativeCall::EndEvent
            )
        });
        assert_eq!(markers, if emit { 3 } else { 0 });
    }
}

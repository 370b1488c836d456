//! Input assembler state for render passes.
//!
//! Both trackers live for one render pass.

use crate::errors::{ReplayError, Result};
use crate::limits::MAX_VERTEX_BUFFERS;
use crate::native::convert::index_format;
use crate::native::{
    IndexBufferView, NativeCommandList, NativeIndexFormat, VertexBufferView,
};
use crate::resources::{Buffer, RenderPipeline, ResourceId};

/// Coalesces vertex buffer changes into one ranged bind per draw.
///
/// The dirty range is `[start_slot, end_slot)`; slots inside it that were
/// never set are re-bound with whatever they held before.
#[derive(Debug)]
pub struct VertexBufferTracker {
    start_slot: usize,
    end_slot: usize,
    views: [VertexBufferView; MAX_VERTEX_BUFFERS],
    last_applied_pipeline: Option<ResourceId>,
}

impl Default for VertexBufferTracker {
    fn default() -> Self {
        Self {
            start_slot: MAX_VERTEX_BUFFERS,
            end_slot: 0,
            views: [VertexBufferView::default(); MAX_VERTEX_BUFFERS],
            last_applied_pipeline: None,
        }
    }
}

impl VertexBufferTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_set_vertex_buffer(
        &mut self,
        slot: u32,
        buffer: &Buffer,
        offset: u64,
        size: u64,
    ) -> Result<()> {
        let slot = slot as usize;
        let view = self.views.get_mut(slot).ok_or_else(|| {
            ReplayError::unreachable(format!("vertex buffer slot {slot} is out of range"))
        })?;
        view.location = buffer.gpu_address() + offset;
        view.size_in_bytes = size;

        self.start_slot = self.start_slot.min(slot);
        self.end_slot = self.end_slot.max(slot + 1);
        Ok(())
    }

    /// A pipeline change re-derives strides and dirties every slot it uses.
    pub fn apply(&mut self, list: &mut dyn NativeCommandList, pipeline: &RenderPipeline) {
        let mut start_slot = self.start_slot;
        let mut end_slot = self.end_slot;

        if self.last_applied_pipeline != Some(pipeline.id()) {
            self.last_applied_pipeline = Some(pipeline.id());
            for slot in pipeline.vertex_slots_used() {
                start_slot = start_slot.min(slot);
                end_slot = end_slot.max(slot + 1);
                self.views[slot].stride_in_bytes = pipeline.vertex_stride(slot);
            }
        }

        if end_slot <= start_slot {
            return;
        }

        list.ia_set_vertex_buffers(start_slot as u32, &self.views[start_slot..end_slot]);

        self.start_slot = MAX_VERTEX_BUFFERS;
        self.end_slot = 0;
    }
}

/// Re-binds the index buffer when its view or format changed.
#[derive(Debug, Default)]
pub struct IndexBufferTracker {
    view: IndexBufferView,
    last_applied_format: NativeIndexFormat,
}

impl IndexBufferTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_set_index_buffer(&mut self, buffer: &Buffer, offset: u64, size: u64) {
        self.view.location = buffer.gpu_address() + offset;
        self.view.size_in_bytes = size;
        // Forces a re-bind on the next apply.
        self.last_applied_format = NativeIndexFormat::Unknown;
    }

    pub fn on_set_pipeline(&mut self, pipeline: &RenderPipeline) {
        self.view.format = index_format(pipeline.index_format());
    }

    pub fn apply(&mut self, list: &mut dyn NativeCommandList) {
        if self.view.format == self.last_applied_format {
            return;
        }
        list.ia_set_index_buffer(&self.view);
        self.last_applied_format = self.view.format;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::native::recording::{NativeCall, RecordingCommandList};
    use crate::native::{NativeResource, PipelineStateId, RootSignatureId};
    use crate::resources::{
        BufferDescriptor, BufferUsage, IndexFormat, MemoryLocation, PipelineLayout,
        PrimitiveKind, RenderPipelineDescriptor,
    };

    fn buffer(address: u64) -> Buffer {
        Buffer::new(
            NativeResource(address),
            address,
            &BufferDescriptor {
                size: 1024,
                usage: BufferUsage::VERTEX | BufferUsage::INDEX,
                location: MemoryLocation::Device,
            },
        )
    }

    fn pipeline(vertex_buffers: Vec<(u32, u32)>, index: IndexFormat) -> RenderPipeline {
        let layout = Arc::new(PipelineLayout::new(RootSignatureId(1), &[]).unwrap());
        RenderPipeline::new(RenderPipelineDescriptor {
            layout,
            pipeline_state: PipelineStateId(1),
            primitive: PrimitiveKind::TriangleList,
            index_format: index,
            vertex_buffers,
        })
        .unwrap()
    }

    fn vertex_binds(list: &RecordingCommandList) -> Vec<(u32, Vec<VertexBufferView>)> {
        list.calls()
            .iter()
            .filter_map(|call| match call {
                NativeCall::IaSetVertexBuffers { start_slot, views } => {
                    Some((*start_slot, views.clone()))
                }
                _ => None,
            })
            .collect()
    }

    #[test]
    fn dirty_slots_coalesce_into_one_range() {
        let pipeline = pipeline(vec![(2, 12), (3, 16), (5, 20)], IndexFormat::Uint32);
        let mut tracker = VertexBufferTracker::new();
        let mut list = RecordingCommandList::new();

        let first = buffer(0x1000);
        let second = buffer(0x2000);
        tracker.on_set_vertex_buffer(2, &first, 0, 64).unwrap();
        tracker.on_set_vertex_buffer(5, &first, 128, 64).unwrap();
        tracker.on_set_vertex_buffer(3, &first, 256, 64).unwrap();
        tracker.on_set_vertex_buffer(2, &second, 0, 32).unwrap();
        tracker.apply(&mut list, &pipeline);

        let binds = vertex_binds(&list);
        assert_eq!(binds.len(), 1);
        let (start, views) = &binds[0];
        assert_eq!(*start, 2);
        assert_eq!(views.len(), 4);
        assert_eq!(views[0].location, 0x2000);
        assert_eq!(views[0].size_in_bytes, 32);
        assert_eq!(views[1].location, 0x1000 + 256);
        // Slot 4 was never set.
        assert_eq!(views[2], VertexBufferView::default());
        assert_eq!(views[3].location, 0x1000 + 128);
        assert_eq!(views[3].stride_in_bytes, 20);
    }

    #[test]
    fn apply_without_changes_is_a_no_op() {
        let pipeline = pipeline(vec![(0, 12)], IndexFormat::Uint32);
        let mut tracker = VertexBufferTracker::new();
        let mut list = RecordingCommandList::new();

        tracker.on_set_vertex_buffer(0, &buffer(0x1000), 0, 64).unwrap();
        tracker.apply(&mut list, &pipeline);
        tracker.apply(&mut list, &pipeline);
        assert_eq!(vertex_binds(&list).len(), 1);
    }

    #[test]
    fn pipeline_change_dirties_its_slots() {
        let a = pipeline(vec![(0, 12)], IndexFormat::Uint32);
        let b = pipeline(vec![(0, 24), (1, 8)], IndexFormat::Uint32);
        let mut tracker = VertexBufferTracker::new();
        let mut list = RecordingCommandList::new();

        tracker.on_set_vertex_buffer(0, &buffer(0x1000), 0, 64).unwrap();
        tracker.apply(&mut list, &a);
        tracker.apply(&mut list, &b);

        let binds = vertex_binds(&list);
        assert_eq!(binds.len(), 2);
        assert_eq!(binds[1].0, 0);
        assert_eq!(binds[1].1.len(), 2);
        assert_eq!(binds[1].1[0].stride_in_bytes, 24);
        assert_eq!(binds[1].1[0].location, 0x1000);
    }

    #[test]
    fn out_of_range_slot_is_unreachable() {
        let mut tracker = VertexBufferTracker::new();
        let err = tracker
            .on_set_vertex_buffer(MAX_VERTEX_BUFFERS as u32, &buffer(0x1000), 0, 4)
            .unwrap_err();
        assert!(matches!(err, ReplayError::Unreachable(_)));
    }

    #[test]
    fn index_buffer_rebinds_on_format_or_buffer_change() {
        let wide = pipeline(Vec::new(), IndexFormat::Uint32);
        let narrow = pipeline(Vec::new(), IndexFormat::Uint16);
        let mut tracker = IndexBufferTracker::new();
        let mut list = RecordingCommandList::new();

        tracker.on_set_index_buffer(&buffer(0x3000), 16, 96);
        tracker.on_set_pipeline(&wide);
        tracker.apply(&mut list);
        tracker.apply(&mut list);
        tracker.on_set_pipeline(&narrow);
        tracker.apply(&mut list);
        tracker.on_set_index_buffer(&buffer(0x4000), 0, 48);
        tracker.apply(&mut list);

        let binds: Vec<IndexBufferView> = list
            .calls()
            .iter()
            .filter_map(|call| match call {
                NativeCall::IaSetIndexBuffer(view) => Some(*view),
                _ => None,
            })
            .collect();
        assert_eq!(binds.len(), 3);
        assert_eq!(binds[0].location, 0x3010);
        assert_eq!(binds[0].format, NativeIndexFormat::R32Uint);
        assert_eq!(binds[1].format, NativeIndexFormat::R16Uint);
        assert_eq!(binds[2].location, 0x4000);
    }
}

//! Render Pass Builder
//!
//! Translates attachment load/store/resolve intent into native calls.
//!
//! # Overview
//!
//! ```text
//!   BeginRenderPassCmd
//!          │  RenderPassAttachmentPlan::new   (lazy attachment clears)
//!          ▼
//!   RenderPassAttachmentPlan
//!          │  RenderPassBuilder::new          (access descriptors,
//!          ▼                                   resolve target transition)
//!   RenderPassBuilder ──begin()──► native BeginRenderPass
//!                     │            or clears + OMSetRenderTargets
//!                     └──end()───► native EndRenderPass
//!                                  or explicit ResolveSubresource
//! ```
//!
//! Exactly one path runs per pass, selected by
//! [`ReplaySettings::use_native_render_pass`](crate::settings::ReplaySettings).

use std::sync::Arc;

use smallvec::SmallVec;

use crate::commands::{
    BeginRenderPassCmd, LoadOp, RenderPassColorAttachment, RenderPassDepthStencilAttachment,
    StoreOp,
};
use crate::limits::MAX_COLOR_ATTACHMENTS;
use crate::native::{
    BeginningAccess, ClearFlags, ClearValue, CpuDescriptorHandle, EndingAccess,
    RenderPassDepthStencilDesc, RenderPassFlags, RenderPassRenderTargetDesc, ResolveParameters,
    ResourceStates, SubresourceRange,
};
use crate::resources::TextureView;

use super::CommandRecordingContext;

/// The single subresource an attachment view renders to.
fn attachment_range(view: &TextureView) -> SubresourceRange {
    SubresourceRange {
        base_mip_level: view.base_mip_level(),
        level_count: 1,
        base_array_layer: view.base_array_layer(),
        layer_count: 1,
    }
}

// ─── Attachment Plan ──────────────────────────────────────────────────────────

/// Per-attachment load/store/resolve intent of one render pass.
///
/// Derived from the begin command with lazy clears applied: an attachment
/// whose contents were never initialized is cleared instead of loaded.
/// Building the plan also records which subresources the pass leaves
/// initialized.
#[derive(Debug, Clone)]
pub struct RenderPassAttachmentPlan {
    pub color_attachments: SmallVec<[RenderPassColorAttachment; MAX_COLOR_ATTACHMENTS]>,
    pub depth_stencil_attachment: Option<RenderPassDepthStencilAttachment>,
    pub width: u32,
    pub height: u32,
    pub sample_count: u32,
}

impl RenderPassAttachmentPlan {
    #[must_use]
    pub fn new(cmd: &BeginRenderPassCmd) -> Self {
        let mut color_attachments = cmd.color_attachments.clone();
        for attachment in &mut color_attachments {
            let texture = attachment.view.texture();
            let range = attachment_range(&attachment.view);

            if attachment.load_op == LoadOp::Load
                && !texture.is_subresource_content_initialized(range)
            {
                log::trace!("Lazy clear of color attachment {:?}", attachment.view.id());
                attachment.load_op = LoadOp::Clear;
                attachment.clear_color = [0.0; 4];
            }

            if let Some(resolve_target) = &attachment.resolve_target {
                resolve_target
                    .texture()
                    .set_is_subresource_content_initialized(true, attachment_range(resolve_target));
            }

            match attachment.store_op {
                StoreOp::Store => texture.set_is_subresource_content_initialized(true, range),
                StoreOp::Clear => texture.set_is_subresource_content_initialized(false, range),
            }
        }

        let mut depth_stencil_attachment = cmd.depth_stencil_attachment.clone();
        if let Some(attachment) = &mut depth_stencil_attachment {
            let texture = attachment.view.texture();
            let range = attachment_range(&attachment.view);

            if attachment.depth_load_op == LoadOp::Load
                && attachment.stencil_load_op == LoadOp::Load
                && !texture.is_subresource_content_initialized(range)
            {
                log::trace!("Lazy clear of depth-stencil attachment {:?}", attachment.view.id());
                attachment.depth_load_op = LoadOp::Clear;
                attachment.stencil_load_op = LoadOp::Clear;
                attachment.clear_depth = 0.0;
                attachment.clear_stencil = 0;
            }

            match (attachment.depth_store_op, attachment.stencil_store_op) {
                (StoreOp::Store, StoreOp::Store) => {
                    texture.set_is_subresource_content_initialized(true, range);
                }
                (StoreOp::Clear, StoreOp::Clear) => {
                    texture.set_is_subresource_content_initialized(false, range);
                }
                _ => {}
            }
        }

        Self {
            color_attachments,
            depth_stencil_attachment,
            width: cmd.width,
            height: cmd.height,
            sample_count: cmd.sample_count,
        }
    }
}

// ─── Builder ──────────────────────────────────────────────────────────────────

fn beginning_access(load_op: LoadOp, clear: ClearValue) -> BeginningAccess {
    match load_op {
        LoadOp::Clear => BeginningAccess::Clear(clear),
        LoadOp::Load => BeginningAccess::Preserve,
    }
}

fn ending_access(store_op: StoreOp) -> EndingAccess {
    match store_op {
        StoreOp::Store => EndingAccess::Preserve,
        StoreOp::Clear => EndingAccess::Discard,
    }
}

/// A color attachment with a resolve target, resolved at pass end.
#[derive(Debug, Clone)]
struct PendingResolve {
    source: Arc<TextureView>,
    destination: Arc<TextureView>,
}

/// Native access descriptors for one render pass.
#[derive(Debug)]
pub struct RenderPassBuilder {
    render_targets: SmallVec<[RenderPassRenderTargetDesc; MAX_COLOR_ATTACHMENTS]>,
    depth_stencil: Option<RenderPassDepthStencilDesc>,
    resolves: SmallVec<[PendingResolve; MAX_COLOR_ATTACHMENTS]>,
    sample_count: u32,
    has_uav: bool,
}

impl RenderPassBuilder {
    /// Translates `plan` and transitions resolve targets to `RESOLVE_DEST`.
    pub fn new(
        ctx: &mut CommandRecordingContext<'_>,
        plan: &RenderPassAttachmentPlan,
        has_uav: bool,
    ) -> Self {
        let mut render_targets = SmallVec::new();
        let mut resolves = SmallVec::new();

        for attachment in &plan.color_attachments {
            let beginning_access =
                beginning_access(attachment.load_op, ClearValue::Color(attachment.clear_color));

            let ending_access = match &attachment.resolve_target {
                Some(resolve_target) => {
                    let destination = resolve_target.texture();
                    destination.transition_state_now(ctx, ResourceStates::RESOLVE_DEST);

                    let source = attachment.view.texture();
                    let size = destination.mip_size(resolve_target.base_mip_level());
                    resolves.push(PendingResolve {
                        source: Arc::clone(&attachment.view),
                        destination: Arc::clone(resolve_target),
                    });
                    EndingAccess::Resolve(ResolveParameters {
                        source: source.native(),
                        destination: destination.native(),
                        source_subresource: 0,
                        destination_subresource: destination.subresource_index(
                            resolve_target.base_mip_level(),
                            resolve_target.base_array_layer(),
                        ),
                        width: size.width,
                        height: size.height,
                        format: source.format(),
                        preserve_source: attachment.store_op == StoreOp::Store,
                    })
                }
                None => ending_access(attachment.store_op),
            };

            render_targets.push(RenderPassRenderTargetDesc {
                cpu_descriptor: attachment.view.attachment_descriptor(),
                beginning_access,
                ending_access,
            });
        }

        let depth_stencil = plan.depth_stencil_attachment.as_ref().map(|attachment| {
            let format = attachment.view.texture().format();
            let clear = ClearValue::DepthStencil {
                depth: attachment.clear_depth,
                stencil: attachment.clear_stencil,
            };
            let (depth_beginning_access, depth_ending_access) = if format.has_depth() {
                (
                    beginning_access(attachment.depth_load_op, clear),
                    ending_access(attachment.depth_store_op),
                )
            } else {
                (BeginningAccess::NoAccess, EndingAccess::NoAccess)
            };
            let (stencil_beginning_access, stencil_ending_access) = if format.has_stencil() {
                (
                    beginning_access(attachment.stencil_load_op, clear),
                    ending_access(attachment.stencil_store_op),
                )
            } else {
                (BeginningAccess::NoAccess, EndingAccess::NoAccess)
            };
            RenderPassDepthStencilDesc {
                cpu_descriptor: attachment.view.attachment_descriptor(),
                depth_beginning_access,
                stencil_beginning_access,
                depth_ending_access,
                stencil_ending_access,
            }
        });

        Self {
            render_targets,
            depth_stencil,
            resolves,
            sample_count: plan.sample_count,
            has_uav,
        }
    }

    #[must_use]
    pub fn render_targets(&self) -> &[RenderPassRenderTargetDesc] {
        &self.render_targets
    }

    #[must_use]
    pub fn depth_stencil(&self) -> Option<&RenderPassDepthStencilDesc> {
        self.depth_stencil.as_ref()
    }

    pub fn begin(&self, ctx: &mut CommandRecordingContext<'_>, use_native: bool) {
        if use_native {
            let flags = if self.has_uav {
                RenderPassFlags::ALLOW_UAV_WRITES
            } else {
                RenderPassFlags::empty()
            };
            ctx.list()
                .begin_render_pass(&self.render_targets, self.depth_stencil.as_ref(), flags);
        } else {
            self.emulate_begin(ctx);
        }
    }

    fn emulate_begin(&self, ctx: &mut CommandRecordingContext<'_>) {
        let list = ctx.list();

        for target in &self.render_targets {
            if let BeginningAccess::Clear(ClearValue::Color(color)) = target.beginning_access {
                list.clear_render_target_view(target.cpu_descriptor, color);
            }
        }

        if let Some(ds) = &self.depth_stencil {
            let mut flags = ClearFlags::empty();
            let mut depth = 0.0;
            let mut stencil = 0;
            if let BeginningAccess::Clear(ClearValue::DepthStencil { depth: d, .. }) =
                ds.depth_beginning_access
            {
                flags |= ClearFlags::DEPTH;
                depth = d;
            }
            if let BeginningAccess::Clear(ClearValue::DepthStencil { stencil: s, .. }) =
                ds.stencil_beginning_access
            {
                flags |= ClearFlags::STENCIL;
                stencil = s;
            }
            if !flags.is_empty() {
                list.clear_depth_stencil_view(ds.cpu_descriptor, flags, depth, stencil);
            }
        }

        let handles: SmallVec<[CpuDescriptorHandle; MAX_COLOR_ATTACHMENTS]> = self
            .render_targets
            .iter()
            .map(|target| target.cpu_descriptor)
            .collect();
        list.om_set_render_targets(
            &handles,
            self.depth_stencil.as_ref().map(|ds| ds.cpu_descriptor),
        );
    }

    pub fn end(&self, ctx: &mut CommandRecordingContext<'_>, use_native: bool) {
        if use_native {
            ctx.list().end_render_pass();
        } else if self.sample_count > 1 {
            self.resolve_multisampled(ctx);
        }
    }

    fn resolve_multisampled(&self, ctx: &mut CommandRecordingContext<'_>) {
        for resolve in &self.resolves {
            let source = resolve.source.texture();
            let destination = resolve.destination.texture();

            source.transition_state_now(ctx, ResourceStates::RESOLVE_SOURCE);
            destination.transition_state_now(ctx, ResourceStates::RESOLVE_DEST);

            ctx.list().resolve_subresource(
                destination.native(),
                destination.subresource_index(
                    resolve.destination.base_mip_level(),
                    resolve.destination.base_array_layer(),
                ),
                source.native(),
                0,
                source.format(),
            );
        }
    }
}

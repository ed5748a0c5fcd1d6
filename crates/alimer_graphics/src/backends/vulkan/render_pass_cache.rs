//! Render pass and framebuffer caches
//!
//! Render passes are looked up by attachment formats and load actions, framebuffers by render
//! pass, attachment views and size. Both live until explicitly cleared. Framebuffers must be
//! cleared whenever the views they reference are destroyed, which in practice means every
//! swapchain recreation.

use std::collections::HashMap;
use std::sync::Arc;

use ash::vk;

use super::api::DeviceApi;
use crate::graphics::{GraphicsError, GraphicsResult, LoadAction};

/// Format and load action of one attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttachmentKey {
    /// Native format
    pub format: vk::Format,
    /// Load action at pass start
    pub load_action: LoadAction,
}

impl AttachmentKey {
    /// Create a key
    pub const fn new(format: vk::Format, load_action: LoadAction) -> Self {
        Self { format, load_action }
    }
}

/// Identity of a render pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct RenderPassKey {
    /// Color attachments in binding order
    pub colors: Vec<AttachmentKey>,
    /// Depth/stencil attachment, always placed after the colors
    pub depth_stencil: Option<AttachmentKey>,
}

/// Identity of a framebuffer
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FramebufferKey {
    /// Render pass the framebuffer is compatible with
    pub render_pass: vk::RenderPass,
    /// Attachment views, colors first
    pub attachments: Vec<vk::ImageView>,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

fn load_op(action: LoadAction) -> vk::AttachmentLoadOp {
    match action {
        LoadAction::DontCare => vk::AttachmentLoadOp::DONT_CARE,
        LoadAction::Load => vk::AttachmentLoadOp::LOAD,
        LoadAction::Clear => vk::AttachmentLoadOp::CLEAR,
    }
}

/// Attachment descriptions for a key, colors first and depth last
pub fn attachment_descriptions(key: &RenderPassKey) -> Vec<vk::AttachmentDescription> {
    let colors = key.colors.iter().map(|color| vk::AttachmentDescription {
        format: color.format,
        samples: vk::SampleCountFlags::TYPE_1,
        load_op: load_op(color.load_action),
        store_op: vk::AttachmentStoreOp::STORE,
        stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
        stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
        initial_layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        final_layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        ..Default::default()
    });

    // Depth contents are only preserved across passes when they are loaded.
    let depth = key.depth_stencil.map(|depth| vk::AttachmentDescription {
        format: depth.format,
        samples: vk::SampleCountFlags::TYPE_1,
        load_op: load_op(depth.load_action),
        store_op: vk::AttachmentStoreOp::STORE,
        stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
        stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
        initial_layout: if depth.load_action == LoadAction::Load {
            vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL
        } else {
            vk::ImageLayout::UNDEFINED
        },
        final_layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        ..Default::default()
    });

    colors.chain(depth).collect()
}

/// Lazily built render passes and framebuffers
pub struct RenderPassCache<D: DeviceApi> {
    device: Arc<D>,
    render_passes: HashMap<RenderPassKey, vk::RenderPass>,
    framebuffers: HashMap<FramebufferKey, vk::Framebuffer>,
}

impl<D: DeviceApi> RenderPassCache<D> {
    /// Create empty caches
    pub fn new(device: Arc<D>) -> Self {
        Self {
            device,
            render_passes: HashMap::new(),
            framebuffers: HashMap::new(),
        }
    }

    /// Render pass for a key, created on first use
    pub fn get_render_pass(&mut self, key: &RenderPassKey) -> GraphicsResult<vk::RenderPass> {
        if let Some(&render_pass) = self.render_passes.get(key) {
            return Ok(render_pass);
        }
        if key.colors.is_empty() && key.depth_stencil.is_none() {
            return Err(GraphicsError::InvalidOperation {
                reason: "Render pass needs at least one attachment".to_string(),
            });
        }

        let attachments = attachment_descriptions(key);
        let color_refs: Vec<vk::AttachmentReference> = (0..key.colors.len() as u32)
            .map(|attachment| vk::AttachmentReference {
                attachment,
                layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            })
            .collect();
        let depth_ref = vk::AttachmentReference {
            attachment: key.colors.len() as u32,
            layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        };

        let mut subpass = vk::SubpassDescription::builder()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_refs);
        if key.depth_stencil.is_some() {
            subpass = subpass.depth_stencil_attachment(&depth_ref);
        }
        let subpasses = [subpass.build()];

        let create_info = vk::RenderPassCreateInfo::builder()
            .attachments(&attachments)
            .subpasses(&subpasses);

        let render_pass = self.device.create_render_pass(&create_info).map_err(GraphicsError::from_vk)?;
        log::debug!("Created render pass for {:?}", key);
        self.render_passes.insert(key.clone(), render_pass);
        Ok(render_pass)
    }

    /// Framebuffer for a render pass and its views, created on first use
    pub fn get_framebuffer(
        &mut self,
        render_pass: vk::RenderPass,
        attachments: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> GraphicsResult<vk::Framebuffer> {
        let key = FramebufferKey {
            render_pass,
            attachments: attachments.to_vec(),
            width: extent.width,
            height: extent.height,
        };
        if let Some(&framebuffer) = self.framebuffers.get(&key) {
            return Ok(framebuffer);
        }

        let create_info = vk::FramebufferCreateInfo::builder()
            .render_pass(render_pass)
            .attachments(attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);

        let framebuffer = self.device.create_framebuffer(&create_info).map_err(GraphicsError::from_vk)?;
        self.framebuffers.insert(key, framebuffer);
        Ok(framebuffer)
    }

    /// Destroy every cached render pass
    pub fn clear_render_passes(&mut self) {
        for (_, render_pass) in self.render_passes.drain() {
            self.device.destroy_render_pass(render_pass);
        }
    }

    /// Destroy every cached framebuffer
    pub fn clear_framebuffers(&mut self) {
        for (_, framebuffer) in self.framebuffers.drain() {
            self.device.destroy_framebuffer(framebuffer);
        }
    }

    /// Number of cached render passes
    pub fn render_pass_count(&self) -> usize {
        self.render_passes.len()
    }

    /// Number of cached framebuffers
    pub fn framebuffer_count(&self) -> usize {
        self.framebuffers.len()
    }
}

impl<D: DeviceApi> Drop for RenderPassCache<D> {
    fn drop(&mut self) {
        self.clear_framebuffers();
        self.clear_render_passes();
    }
}

// Graphics pipeline creation
//
// One render pass with a single color attachment, one pipeline with no
// vertex input and no descriptors, one framebuffer per swapchain image.
// All state is fixed at bootstrap; the pipeline is never rebuilt.

use super::driver::{
    Driver, FramebufferDesc, GpuObject, GraphicsPipelineDesc, RenderPassDesc,
};
use super::shader::{create_shader_module, ShaderBytecode};
use crate::context::Ledger;
use crate::error::{check, ObjectKind, Op, Result};
use ash::vk;
use std::ffi::{CStr, CString};

pub const SHADER_ENTRY_POINT: &CStr = c"main";

/// Clear on load, keep on store, hand the image to the presentation engine.
pub fn render_pass_desc(format: vk::Format) -> RenderPassDesc {
    let color_attachment = vk::AttachmentDescription::builder()
        .format(format)
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::STORE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)
        .build();

    let color_reference = vk::AttachmentReference::builder()
        .attachment(0)
        .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
        .build();

    // The layout transition must wait until the acquire semaphore has fired
    let dependency = vk::SubpassDependency::builder()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
        .src_access_mask(vk::AccessFlags::empty())
        .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
        .dst_access_mask(
            vk::AccessFlags::COLOR_ATTACHMENT_READ | vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
        )
        .build();

    RenderPassDesc {
        color_attachment,
        color_reference,
        dependency,
    }
}

pub fn viewport_for(extent: vk::Extent2D) -> vk::Viewport {
    vk::Viewport::builder()
        .x(0.0)
        .y(0.0)
        .width(extent.width as f32)
        .height(extent.height as f32)
        .min_depth(0.0)
        .max_depth(1.0)
        .build()
}

pub fn full_rect(extent: vk::Extent2D) -> vk::Rect2D {
    vk::Rect2D {
        offset: vk::Offset2D { x: 0, y: 0 },
        extent,
    }
}

/// Standard alpha blending on color, alpha written through unchanged.
pub fn alpha_blend_attachment() -> vk::PipelineColorBlendAttachmentState {
    vk::PipelineColorBlendAttachmentState::builder()
        .blend_enable(true)
        .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
        .dst_color_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
        .color_blend_op(vk::BlendOp::ADD)
        .src_alpha_blend_factor(vk::BlendFactor::ONE)
        .dst_alpha_blend_factor(vk::BlendFactor::ZERO)
        .alpha_blend_op(vk::BlendOp::ADD)
        .color_write_mask(vk::ColorComponentFlags::RGBA)
        .build()
}

pub struct PipelineTargets {
    pub layout: vk::PipelineLayout,
    pub render_pass: vk::RenderPass,
    pub extent: vk::Extent2D,
}

pub fn graphics_pipeline_desc(
    vertex_shader: vk::ShaderModule,
    fragment_shader: vk::ShaderModule,
    targets: &PipelineTargets,
) -> GraphicsPipelineDesc {
    GraphicsPipelineDesc {
        vertex_shader,
        fragment_shader,
        entry_point: CString::from(SHADER_ENTRY_POINT),
        topology: vk::PrimitiveTopology::TRIANGLE_LIST,
        viewport: viewport_for(targets.extent),
        scissor: full_rect(targets.extent),
        polygon_mode: vk::PolygonMode::FILL,
        cull_mode: vk::CullModeFlags::BACK,
        front_face: vk::FrontFace::CLOCKWISE,
        samples: vk::SampleCountFlags::TYPE_1,
        color_blend: alpha_blend_attachment(),
        layout: targets.layout,
        render_pass: targets.render_pass,
        subpass: 0,
    }
}

/// Render pass, layout and pipeline. The shader modules are gone by the
/// time this exists.
#[derive(Debug, Clone, Copy)]
pub struct GraphicsPipeline {
    pub render_pass: vk::RenderPass,
    pub layout: vk::PipelineLayout,
    pub pipeline: vk::Pipeline,
}

impl GraphicsPipeline {
    pub fn new<D: Driver>(
        driver: &mut D,
        ledger: &mut Ledger,
        format: vk::Format,
        extent: vk::Extent2D,
        vertex: &ShaderBytecode,
        fragment: &ShaderBytecode,
    ) -> Result<Self> {
        log::info!("Creating graphics pipeline: {:?}, {}x{}", format, extent.width, extent.height);

        let vert_module = create_shader_module(driver, ledger, vertex)?;
        let frag_module = create_shader_module(driver, ledger, fragment)?;

        let layout = check(
            driver.create_pipeline_layout(),
            Op::Create(ObjectKind::PipelineLayout),
        )?;
        ledger.record(GpuObject::PipelineLayout(layout));

        let render_pass = check(
            driver.create_render_pass(&render_pass_desc(format)),
            Op::Create(ObjectKind::RenderPass),
        )?;
        ledger.record(GpuObject::RenderPass(render_pass));

        let targets = PipelineTargets {
            layout,
            render_pass,
            extent,
        };
        let pipeline = check(
            driver.create_graphics_pipeline(&graphics_pipeline_desc(
                vert_module,
                frag_module,
                &targets,
            )),
            Op::Create(ObjectKind::GraphicsPipeline),
        )?;
        ledger.record(GpuObject::Pipeline(pipeline));

        // Modules are only needed while the pipeline is compiled
        ledger.release(driver, &GpuObject::ShaderModule(frag_module));
        ledger.release(driver, &GpuObject::ShaderModule(vert_module));

        Ok(Self {
            render_pass,
            layout,
            pipeline,
        })
    }
}

/// One framebuffer per image view, all sized to the swapchain extent
pub fn create_framebuffers<D: Driver>(
    driver: &mut D,
    ledger: &mut Ledger,
    image_views: &[vk::ImageView],
    render_pass: vk::RenderPass,
    extent: vk::Extent2D,
) -> Result<Vec<vk::Framebuffer>> {
    let mut framebuffers = Vec::with_capacity(image_views.len());
    for &attachment in image_views {
        let framebuffer = check(
            driver.create_framebuffer(&FramebufferDesc {
                render_pass,
                attachment,
                extent,
            }),
            Op::Create(ObjectKind::Framebuffer),
        )?;
        ledger.record(GpuObject::Framebuffer(framebuffer));
        framebuffers.push(framebuffer);
    }
    log::info!("Created {} framebuffers", framebuffers.len());
    Ok(framebuffers)
}

// Command pool + static command buffers
//
// One primary buffer per framebuffer, recorded exactly once at bootstrap.
// After `StaticCommands::record_all` the buffers are only readable, so the
// frame loop can submit them but never record into them again.

use super::driver::{Driver, GpuObject, RenderPassBegin};
use super::pipeline::{full_rect, GraphicsPipeline};
use crate::context::Ledger;
use crate::error::{check, ObjectKind, Op, Result};
use ash::vk;

pub const TRIANGLE_VERTEX_COUNT: u32 = 3;

pub fn create_command_pool<D: Driver>(
    driver: &mut D,
    ledger: &mut Ledger,
    queue_family: u32,
) -> Result<vk::CommandPool> {
    let pool = check(
        driver.create_command_pool(queue_family),
        Op::Create(ObjectKind::CommandPool),
    )?;
    ledger.record(GpuObject::CommandPool(pool));
    Ok(pool)
}

/// Everything one recording needs
#[derive(Clone, Copy)]
pub struct FrameRecording {
    pub render_pass: vk::RenderPass,
    pub framebuffer: vk::Framebuffer,
    pub pipeline: vk::Pipeline,
    pub extent: vk::Extent2D,
    pub clear_color: [f32; 4],
}

/// Clear, bind, draw the triangle.
pub fn record_frame<D: Driver>(
    driver: &mut D,
    command_buffer: vk::CommandBuffer,
    frame: &FrameRecording,
) -> Result<()> {
    let op = Op::Create(ObjectKind::CommandRecording);

    check(
        driver.begin_command_buffer(command_buffer, vk::CommandBufferUsageFlags::SIMULTANEOUS_USE),
        op,
    )?;

    let begin = RenderPassBegin {
        render_pass: frame.render_pass,
        framebuffer: frame.framebuffer,
        render_area: full_rect(frame.extent),
        clear_value: vk::ClearValue {
            color: vk::ClearColorValue {
                float32: frame.clear_color,
            },
        },
    };
    driver.cmd_begin_render_pass(command_buffer, &begin);
    driver.cmd_bind_pipeline(command_buffer, frame.pipeline);
    driver.cmd_draw(command_buffer, TRIANGLE_VERTEX_COUNT, 1, 0, 0);
    driver.cmd_end_render_pass(command_buffer);

    check(driver.end_command_buffer(command_buffer), op)
}

/// Allocated but not yet recorded
pub struct StaticCommands {
    buffers: Vec<vk::CommandBuffer>,
}

impl StaticCommands {
    pub fn allocate<D: Driver>(
        driver: &mut D,
        ledger: &mut Ledger,
        pool: vk::CommandPool,
        count: u32,
    ) -> Result<Self> {
        let buffers = check(
            driver.allocate_command_buffers(pool, count),
            Op::Create(ObjectKind::CommandBuffers),
        )?;
        ledger.record(GpuObject::CommandBuffers {
            pool,
            buffers: buffers.clone(),
        });
        log::info!("Allocated {} command buffers", buffers.len());
        Ok(Self { buffers })
    }

    /// Record buffer `i` against `framebuffers[i]`. Consumes the unrecorded
    /// set; there is no path back.
    pub fn record_all<D: Driver>(
        self,
        driver: &mut D,
        pipeline: &GraphicsPipeline,
        framebuffers: &[vk::Framebuffer],
        extent: vk::Extent2D,
        clear_color: [f32; 4],
    ) -> Result<RecordedCommands> {
        debug_assert_eq!(self.buffers.len(), framebuffers.len());

        for (&command_buffer, &framebuffer) in self.buffers.iter().zip(framebuffers) {
            record_frame(
                driver,
                command_buffer,
                &FrameRecording {
                    render_pass: pipeline.render_pass,
                    framebuffer,
                    pipeline: pipeline.pipeline,
                    extent,
                    clear_color,
                },
            )?;
        }
        log::info!("Recorded {} command buffers", self.buffers.len());

        Ok(RecordedCommands {
            buffers: self.buffers,
        })
    }
}

/// Pre-recorded buffers, one per swapchain image
#[derive(Debug, Clone)]
pub struct RecordedCommands {
    buffers: Vec<vk::CommandBuffer>,
}

impl RecordedCommands {
    pub fn buffers(&self) -> &[vk::CommandBuffer] {
        &self.buffers
    }

    pub fn for_image(&self, image_index: u32) -> Option<vk::CommandBuffer> {
        self.buffers.get(image_index as usize).copied()
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}

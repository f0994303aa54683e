// =============================================================================
// FRAME SCHEDULER - acquire / submit / present
// =============================================================================
//
// FRAME TIMELINE:
// ┌──────────────────────────────────────────────────────────────────────┐
// │  poll ─> close? ─> acquire ─> submit ─> present ─> (next iteration)  │
// │                    signals    waits     waits                        │
// │                    image_     image_    rendering_                   │
// │                    available  available finished                     │
// └──────────────────────────────────────────────────────────────────────┘
//
// One semaphore pair, no fences: at most one frame is in flight. Any error
// ends the loop; there is no swapchain recreation.
//
// =============================================================================

use crate::backend::driver::{Driver, PresentDesc, SubmitDesc};
use crate::context::GraphicsContext;
use crate::error::{check, FrameOp, Op, RenderError, Result};
use crate::window::WindowSystem;
use ash::vk;
use std::time::{Duration, Instant};

pub const ACQUIRE_TIMEOUT: u64 = u64::MAX;

/// Stage the submit waits at for the acquired image
pub const WAIT_STAGE: vk::PipelineStageFlags = vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    Idle,
    Acquiring,
    Submitting,
    Presenting,
    ShuttingDown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub frames: u64,
    pub suboptimal: u64,
}

pub struct FrameScheduler {
    state: FrameState,
    stats: FrameStats,
    suboptimal_logged: bool,

    // FPS tracking
    frames_since_report: u32,
    last_report: Instant,
}

impl Default for FrameScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self {
            state: FrameState::Idle,
            stats: FrameStats::default(),
            suboptimal_logged: false,
            frames_since_report: 0,
            last_report: Instant::now(),
        }
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    /// Drive frames until the window asks to close or a frame fails.
    pub fn run<D: Driver, W: WindowSystem>(
        &mut self,
        ctx: &mut GraphicsContext<D>,
        window: &mut W,
    ) -> Result<FrameStats> {
        log::info!("Entering frame loop");

        loop {
            window.poll_events();
            if window.should_close() {
                log::info!("Close requested, shutting down...");
                self.state = FrameState::ShuttingDown;
                break;
            }

            self.draw_frame(ctx)?;
        }

        log::info!(
            "Frame loop finished after {} frames ({} suboptimal)",
            self.stats.frames,
            self.stats.suboptimal
        );
        Ok(self.stats)
    }

    /// One acquire/submit/present cycle.
    pub fn draw_frame<D: Driver>(&mut self, ctx: &mut GraphicsContext<D>) -> Result<()> {
        let result = self.cycle(ctx);
        match &result {
            Ok(()) => {
                self.state = FrameState::Idle;
                self.stats.frames += 1;
                self.update_fps();
            }
            Err(e) => {
                if e.is_swapchain_out_of_date() {
                    log::warn!("Swapchain is out of date and is never rebuilt, stopping");
                }
                self.state = FrameState::ShuttingDown;
            }
        }
        result
    }

    fn cycle<D: Driver>(&mut self, ctx: &mut GraphicsContext<D>) -> Result<()> {
        let swapchain = ctx.swapchain().handle;
        let queue = ctx.queue();
        let sync = *ctx.sync();

        // ─────────────────────────────────────────────────────────────────────
        // STEP 1: Acquire next swapchain image
        // ─────────────────────────────────────────────────────────────────────
        self.state = FrameState::Acquiring;
        let (image_index, suboptimal) = check(
            ctx.driver_mut()
                .acquire_next_image(swapchain, ACQUIRE_TIMEOUT, sync.image_available),
            Op::Frame(FrameOp::Acquire),
        )?;
        self.note_suboptimal(suboptimal, FrameOp::Acquire);

        // ─────────────────────────────────────────────────────────────────────
        // STEP 2: Submit the pre-recorded buffer for that image
        // ─────────────────────────────────────────────────────────────────────
        self.state = FrameState::Submitting;
        let commands = ctx.commands();
        let command_buffer = commands.for_image(image_index).ok_or_else(|| {
            let err = RenderError::ImageIndexOutOfRange {
                index: image_index,
                images: commands.len(),
            };
            log::error!("{}", err);
            err
        })?;

        let submit = SubmitDesc {
            wait_semaphore: sync.image_available,
            wait_stage: WAIT_STAGE,
            command_buffer,
            signal_semaphore: sync.rendering_finished,
        };
        check(
            ctx.driver_mut().queue_submit(queue, &submit),
            Op::Frame(FrameOp::Submit),
        )?;

        // ─────────────────────────────────────────────────────────────────────
        // STEP 3: Present once rendering has finished
        // ─────────────────────────────────────────────────────────────────────
        self.state = FrameState::Presenting;
        let present = PresentDesc {
            wait_semaphore: sync.rendering_finished,
            swapchain,
            image_index,
        };
        let suboptimal = check(
            ctx.driver_mut().queue_present(queue, &present),
            Op::Frame(FrameOp::Present),
        )?;
        self.note_suboptimal(suboptimal, FrameOp::Present);

        Ok(())
    }

    fn note_suboptimal(&mut self, suboptimal: bool, op: FrameOp) {
        if !suboptimal {
            return;
        }
        self.stats.suboptimal += 1;
        if !self.suboptimal_logged {
            log::warn!("Swapchain reported suboptimal on {}, ignoring", op);
            self.suboptimal_logged = true;
        }
    }

    fn update_fps(&mut self) {
        self.frames_since_report += 1;

        let elapsed = self.last_report.elapsed();
        if elapsed >= Duration::from_secs(1) {
            let fps = self.frames_since_report as f32 / elapsed.as_secs_f32();
            log::debug!("{:.0} FPS ({:.2}ms)", fps, 1000.0 / fps);
            self.frames_since_report = 0;
            self.last_report = Instant::now();
        }
    }
}

/// Convenience wrapper: fresh scheduler, run to completion.
pub fn run<D: Driver, W: WindowSystem>(
    ctx: &mut GraphicsContext<D>,
    window: &mut W,
) -> Result<FrameStats> {
    FrameScheduler::new().run(ctx, window)
}

// =============================================================================
// TRIANGLE RENDERER - Vulkan bootstrap + single-triangle frame loop
// =============================================================================
//
// ARCHITECTURE OVERVIEW:
// ┌─────────────────────────────────────────────────────────────────┐
// │  WindowSystem (winit)                                           │
// │    └── GraphicsContext<D: Driver>                               │
// │          ├── Ledger (every GPU object, in creation order)       │
// │          ├── Swapchain + image views + framebuffers             │
// │          ├── Render pass + pipeline                             │
// │          └── Pre-recorded command buffers + semaphore pair      │
// │    └── FrameScheduler (acquire -> submit -> present)            │
// └─────────────────────────────────────────────────────────────────┘
//
// =============================================================================

pub mod backend;
pub mod config;
pub mod context;
pub mod error;
pub mod frame;
pub mod logging;
pub mod window;

pub use backend::{Driver, GpuObject, VulkanDriver};
pub use config::Config;
pub use context::{GraphicsContext, Ledger};
pub use error::{ErrorCategory, RenderError, Result};
pub use frame::{FrameScheduler, FrameState, FrameStats};
pub use window::{WindowSystem, WinitWindow};

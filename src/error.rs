//! Error taxonomy for the bootstrap and the frame loop.
//!
//! Every variant is fatal. `check` is the one place a raw `vk::Result` turns
//! into a `RenderError`, and it logs the failure on the way through so the
//! error log always names the call that failed.

use ash::{prelude::VkResult, vk};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// GPU object kinds, used to name what failed to be created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Instance,
    Surface,
    Device,
    Swapchain,
    ImageView,
    ShaderModule,
    PipelineLayout,
    RenderPass,
    GraphicsPipeline,
    Framebuffer,
    CommandPool,
    CommandBuffers,
    CommandRecording,
    Semaphore,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ObjectKind::Instance => "instance",
            ObjectKind::Surface => "surface",
            ObjectKind::Device => "logical device",
            ObjectKind::Swapchain => "swapchain",
            ObjectKind::ImageView => "image view",
            ObjectKind::ShaderModule => "shader module",
            ObjectKind::PipelineLayout => "pipeline layout",
            ObjectKind::RenderPass => "render pass",
            ObjectKind::GraphicsPipeline => "graphics pipeline",
            ObjectKind::Framebuffer => "framebuffer",
            ObjectKind::CommandPool => "command pool",
            ObjectKind::CommandBuffers => "command buffers",
            ObjectKind::CommandRecording => "command buffer recording",
            ObjectKind::Semaphore => "semaphore",
        };
        f.write_str(name)
    }
}

/// Steady-state operations of the frame loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOp {
    Acquire,
    Submit,
    Present,
    WaitIdle,
}

impl fmt::Display for FrameOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FrameOp::Acquire => "acquire next image",
            FrameOp::Submit => "queue submit",
            FrameOp::Present => "queue present",
            FrameOp::WaitIdle => "device wait idle",
        };
        f.write_str(name)
    }
}

/// The five failure classes of the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Enumeration,
    Creation,
    ResourceLoad,
    RuntimeLoop,
    Precondition,
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Failed to enumerate {what}: {result}")]
    Enumeration { what: &'static str, result: vk::Result },

    #[error("Failed to create {object}: {result}")]
    Creation { object: ObjectKind, result: vk::Result },

    #[error("Failed to load Vulkan: {0}")]
    Loading(#[from] ash::LoadingError),

    #[error("Swapchain was created with zero images")]
    NoSwapchainImages,

    #[error("Failed to open shader file {path:?}")]
    ShaderLoad {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Shader file {path:?} is not valid SPIR-V")]
    InvalidShader {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{op} failed: {result}")]
    Frame { op: FrameOp, result: vk::Result },

    #[error("Acquired image {index} but only {images} command buffers exist")]
    ImageIndexOutOfRange { index: u32, images: usize },

    #[error("No Vulkan-capable GPU found")]
    NoPhysicalDevice,

    #[error("Selected GPU has no graphics queue family")]
    NoGraphicsQueue,

    #[error("Queue family {family} cannot present to the window surface")]
    PresentationUnsupported { family: u32 },

    #[error("Surface does not support present mode {0:?}")]
    PresentModeUnsupported(vk::PresentModeKHR),

    #[error("Required instance extension {0} is not available")]
    MissingInstanceExtension(String),

    #[error("Window error: {0}")]
    Window(String),
}

impl RenderError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            RenderError::Enumeration { .. } => ErrorCategory::Enumeration,
            RenderError::Creation { .. }
            | RenderError::Loading(_)
            | RenderError::NoSwapchainImages => ErrorCategory::Creation,
            RenderError::ShaderLoad { .. } | RenderError::InvalidShader { .. } => {
                ErrorCategory::ResourceLoad
            }
            RenderError::Frame { .. } | RenderError::ImageIndexOutOfRange { .. } => {
                ErrorCategory::RuntimeLoop
            }
            RenderError::NoPhysicalDevice
            | RenderError::NoGraphicsQueue
            | RenderError::PresentationUnsupported { .. }
            | RenderError::PresentModeUnsupported(_)
            | RenderError::MissingInstanceExtension(_)
            | RenderError::Window(_) => ErrorCategory::Precondition,
        }
    }

    /// The one failure a swapchain rebuild could recover from. The renderer
    /// never rebuilds, so this only sharpens the log message.
    pub fn is_swapchain_out_of_date(&self) -> bool {
        matches!(
            self,
            RenderError::Frame {
                result: vk::Result::ERROR_OUT_OF_DATE_KHR,
                ..
            }
        )
    }
}

/// What a checked call was doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Enumerate(&'static str),
    Create(ObjectKind),
    Frame(FrameOp),
}

/// Map a raw Vulkan result onto the renderer's taxonomy. Failures are logged
/// at error level before they are returned.
pub fn check<T>(result: VkResult<T>, op: Op) -> Result<T, RenderError> {
    result.map_err(|result| {
        let err = match op {
            Op::Enumerate(what) => RenderError::Enumeration { what, result },
            Op::Create(object) => RenderError::Creation { object, result },
            Op::Frame(op) => RenderError::Frame { op, result },
        };
        log::error!("{}", err);
        err
    })
}

pub type Result<T, E = RenderError> = std::result::Result<T, E>;

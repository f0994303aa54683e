// Backend module - Vulkan abstraction layer
//
// Design: every GPU call goes through the `Driver` trait. The builders in
// this module turn renderer decisions into descriptors and record what they
// create in the context's ledger; `VulkanDriver` turns descriptors into ash
// calls.

pub mod command;
pub mod device;
pub mod driver;
pub mod enumerate;
pub mod pipeline;
pub mod shader;
pub mod swapchain;
pub mod sync;
pub mod vulkan;

pub use driver::{Driver, GpuObject};
pub use vulkan::VulkanDriver;

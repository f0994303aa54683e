// Driver - the Vulkan calls the renderer makes
//
// The bootstrap and the frame loop only talk to the GPU through this trait.
// `VulkanDriver` implements it on ash; the integration tests implement it
// with a recorder. Handles are plain `vk` handles, descriptors are plain data,
// and the driver owns whatever loader state it needs to turn one into a call.

use ash::prelude::VkResult;
use ash::vk;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use std::ffi::CString;

/// One instance layer as reported by the loader
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerInfo {
    pub name: String,
    pub spec_version: u32,
    pub implementation_version: u32,
    pub description: String,
}

/// One instance extension as reported by the loader
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionInfo {
    pub name: String,
    pub spec_version: u32,
}

#[derive(Debug, Clone)]
pub struct InstanceDesc {
    pub application_name: CString,
    pub engine_name: CString,
    pub api_version: u32,
    pub layers: Vec<CString>,
    pub extensions: Vec<CString>,
    /// Install a debug-utils messenger that forwards validation output to `log`
    pub debug_messenger: bool,
}

#[derive(Debug, Clone)]
pub struct DeviceDesc {
    pub queue_family_index: u32,
    /// One entry per requested queue
    pub queue_priorities: Vec<f32>,
    pub extensions: Vec<CString>,
}

#[derive(Debug, Clone, Copy)]
pub struct SwapchainDesc {
    pub surface: vk::SurfaceKHR,
    pub min_image_count: u32,
    pub format: vk::SurfaceFormatKHR,
    pub extent: vk::Extent2D,
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
    pub present_mode: vk::PresentModeKHR,
}

#[derive(Debug, Clone, Copy)]
pub struct ImageViewDesc {
    pub image: vk::Image,
    pub format: vk::Format,
    pub components: vk::ComponentMapping,
    pub subresource_range: vk::ImageSubresourceRange,
}

#[derive(Debug, Clone, Copy)]
pub struct RenderPassDesc {
    pub color_attachment: vk::AttachmentDescription,
    pub color_reference: vk::AttachmentReference,
    pub dependency: vk::SubpassDependency,
}

/// Complete state of a graphics pipeline with no vertex input and no
/// descriptor bindings.
#[derive(Debug, Clone)]
pub struct GraphicsPipelineDesc {
    pub vertex_shader: vk::ShaderModule,
    pub fragment_shader: vk::ShaderModule,
    pub entry_point: CString,
    pub topology: vk::PrimitiveTopology,
    pub viewport: vk::Viewport,
    pub scissor: vk::Rect2D,
    pub polygon_mode: vk::PolygonMode,
    pub cull_mode: vk::CullModeFlags,
    pub front_face: vk::FrontFace,
    pub samples: vk::SampleCountFlags,
    pub color_blend: vk::PipelineColorBlendAttachmentState,
    pub layout: vk::PipelineLayout,
    pub render_pass: vk::RenderPass,
    pub subpass: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct FramebufferDesc {
    pub render_pass: vk::RenderPass,
    pub attachment: vk::ImageView,
    pub extent: vk::Extent2D,
}

#[derive(Clone, Copy)]
pub struct RenderPassBegin {
    pub render_pass: vk::RenderPass,
    pub framebuffer: vk::Framebuffer,
    pub render_area: vk::Rect2D,
    pub clear_value: vk::ClearValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitDesc {
    pub wait_semaphore: vk::Semaphore,
    pub wait_stage: vk::PipelineStageFlags,
    pub command_buffer: vk::CommandBuffer,
    pub signal_semaphore: vk::Semaphore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresentDesc {
    pub wait_semaphore: vk::Semaphore,
    pub swapchain: vk::SwapchainKHR,
    pub image_index: u32,
}

/// Anything the driver can destroy. Command buffers are freed back to their
/// pool as one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GpuObject {
    Instance(vk::Instance),
    Surface(vk::SurfaceKHR),
    Device(vk::Device),
    Swapchain(vk::SwapchainKHR),
    ImageView(vk::ImageView),
    ShaderModule(vk::ShaderModule),
    PipelineLayout(vk::PipelineLayout),
    RenderPass(vk::RenderPass),
    Pipeline(vk::Pipeline),
    Framebuffer(vk::Framebuffer),
    CommandPool(vk::CommandPool),
    CommandBuffers {
        pool: vk::CommandPool,
        buffers: Vec<vk::CommandBuffer>,
    },
    Semaphore(vk::Semaphore),
}

pub trait Driver {
    // ── Capability queries ──────────────────────────────────────────────
    fn instance_layers(&mut self) -> VkResult<Vec<LayerInfo>>;
    fn instance_extensions(&mut self) -> VkResult<Vec<ExtensionInfo>>;
    fn physical_devices(&mut self) -> VkResult<Vec<vk::PhysicalDevice>>;
    fn physical_device_properties(&mut self, physical: vk::PhysicalDevice)
        -> vk::PhysicalDeviceProperties;
    fn physical_device_features(&mut self, physical: vk::PhysicalDevice)
        -> vk::PhysicalDeviceFeatures;
    fn physical_device_memory_properties(
        &mut self,
        physical: vk::PhysicalDevice,
    ) -> vk::PhysicalDeviceMemoryProperties;
    fn queue_families(&mut self, physical: vk::PhysicalDevice) -> Vec<vk::QueueFamilyProperties>;
    fn surface_support(
        &mut self,
        physical: vk::PhysicalDevice,
        queue_family: u32,
        surface: vk::SurfaceKHR,
    ) -> VkResult<bool>;
    fn surface_capabilities(
        &mut self,
        physical: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<vk::SurfaceCapabilitiesKHR>;
    fn surface_formats(
        &mut self,
        physical: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::SurfaceFormatKHR>>;
    fn surface_present_modes(
        &mut self,
        physical: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::PresentModeKHR>>;

    // ── Object creation ────────────────────────────────────────────────
    fn create_instance(&mut self, desc: &InstanceDesc) -> VkResult<vk::Instance>;
    fn create_surface(
        &mut self,
        display: RawDisplayHandle,
        window: RawWindowHandle,
    ) -> VkResult<vk::SurfaceKHR>;
    fn create_device(
        &mut self,
        physical: vk::PhysicalDevice,
        desc: &DeviceDesc,
    ) -> VkResult<vk::Device>;
    fn device_queue(&mut self, queue_family: u32, index: u32) -> vk::Queue;
    fn create_swapchain(&mut self, desc: &SwapchainDesc) -> VkResult<vk::SwapchainKHR>;
    fn swapchain_images(&mut self, swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>>;
    fn create_image_view(&mut self, desc: &ImageViewDesc) -> VkResult<vk::ImageView>;
    fn create_shader_module(&mut self, code: &[u32]) -> VkResult<vk::ShaderModule>;
    fn create_pipeline_layout(&mut self) -> VkResult<vk::PipelineLayout>;
    fn create_render_pass(&mut self, desc: &RenderPassDesc) -> VkResult<vk::RenderPass>;
    fn create_graphics_pipeline(&mut self, desc: &GraphicsPipelineDesc)
        -> VkResult<vk::Pipeline>;
    fn create_framebuffer(&mut self, desc: &FramebufferDesc) -> VkResult<vk::Framebuffer>;
    fn create_command_pool(&mut self, queue_family: u32) -> VkResult<vk::CommandPool>;
    fn allocate_command_buffers(
        &mut self,
        pool: vk::CommandPool,
        count: u32,
    ) -> VkResult<Vec<vk::CommandBuffer>>;
    fn create_semaphore(&mut self) -> VkResult<vk::Semaphore>;

    // ── Command recording ──────────────────────────────────────────────
    fn begin_command_buffer(
        &mut self,
        command_buffer: vk::CommandBuffer,
        flags: vk::CommandBufferUsageFlags,
    ) -> VkResult<()>;
    fn cmd_begin_render_pass(&mut self, command_buffer: vk::CommandBuffer, begin: &RenderPassBegin);
    fn cmd_bind_pipeline(&mut self, command_buffer: vk::CommandBuffer, pipeline: vk::Pipeline);
    fn cmd_draw(
        &mut self,
        command_buffer: vk::CommandBuffer,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    );
    fn cmd_end_render_pass(&mut self, command_buffer: vk::CommandBuffer);
    fn end_command_buffer(&mut self, command_buffer: vk::CommandBuffer) -> VkResult<()>;

    // ── Frame operations ───────────────────────────────────────────────
    /// Returns the image index and whether the swapchain is suboptimal
    fn acquire_next_image(
        &mut self,
        swapchain: vk::SwapchainKHR,
        timeout: u64,
        signal: vk::Semaphore,
    ) -> VkResult<(u32, bool)>;
    fn queue_submit(&mut self, queue: vk::Queue, submit: &SubmitDesc) -> VkResult<()>;
    /// Returns whether the swapchain is suboptimal
    fn queue_present(&mut self, queue: vk::Queue, present: &PresentDesc) -> VkResult<bool>;
    fn device_wait_idle(&mut self) -> VkResult<()>;

    // ── Teardown ───────────────────────────────────────────────────────
    fn destroy(&mut self, object: GpuObject);
}

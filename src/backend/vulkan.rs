// Vulkan driver - the `Driver` trait on top of ash
//
// Responsibilities:
// - Loading the Vulkan library
// - Holding the instance/device dispatch tables and extension loaders
// - Turning descriptors into create-info structs
// - Forwarding validation messages to `log`
//
// Object lifetime is not tracked here: the context decides when each handle
// is destroyed and calls `destroy` in the right order.

use super::driver::{
    DeviceDesc, Driver, ExtensionInfo, FramebufferDesc, GpuObject, GraphicsPipelineDesc,
    ImageViewDesc, InstanceDesc, LayerInfo, PresentDesc, RenderPassBegin, RenderPassDesc,
    SubmitDesc, SwapchainDesc,
};
use super::enumerate::enumerate;
use crate::error::{RenderError, Result};
use ash::extensions::ext::DebugUtils;
use ash::extensions::khr::{Surface, Swapchain};
use ash::prelude::VkResult;
use ash::{vk, Entry};
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

/// Returned by calls that need an instance or device that does not exist
const NOT_READY: vk::Result = vk::Result::ERROR_INITIALIZATION_FAILED;

pub struct VulkanDriver {
    entry: Entry,
    instance: Option<ash::Instance>,
    surface_loader: Option<Surface>,
    debug_utils: Option<(DebugUtils, vk::DebugUtilsMessengerEXT)>,
    device: Option<ash::Device>,
    swapchain_loader: Option<Swapchain>,
}

impl VulkanDriver {
    pub fn new() -> Result<Self> {
        log::info!("Loading Vulkan library");
        let entry = unsafe { Entry::load() }.map_err(|e| {
            let err = RenderError::from(e);
            log::error!("{}", err);
            err
        })?;

        Ok(Self {
            entry,
            instance: None,
            surface_loader: None,
            debug_utils: None,
            device: None,
            swapchain_loader: None,
        })
    }

    fn instance(&self) -> VkResult<&ash::Instance> {
        self.instance.as_ref().ok_or(NOT_READY)
    }

    fn surface_loader(&self) -> VkResult<&Surface> {
        self.surface_loader.as_ref().ok_or(NOT_READY)
    }

    fn device(&self) -> VkResult<&ash::Device> {
        self.device.as_ref().ok_or(NOT_READY)
    }

    fn swapchain_loader(&self) -> VkResult<&Swapchain> {
        self.swapchain_loader.as_ref().ok_or(NOT_READY)
    }

    fn setup_debug_messenger(
        entry: &Entry,
        instance: &ash::Instance,
    ) -> VkResult<(DebugUtils, vk::DebugUtilsMessengerEXT)> {
        let debug_utils = DebugUtils::new(entry, instance);

        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        let messenger = unsafe { debug_utils.create_debug_utils_messenger(&create_info, None) }?;

        Ok((debug_utils, messenger))
    }

    fn destroy_instance(&mut self, handle: vk::Instance) {
        let Some(instance) = self.instance.take() else {
            log::warn!("Instance {:?} destroyed twice", handle);
            return;
        };
        self.surface_loader = None;

        unsafe {
            if let Some((debug_utils, messenger)) = self.debug_utils.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }
            instance.destroy_instance(None);
        }
    }

    fn destroy_device(&mut self, handle: vk::Device) {
        let Some(device) = self.device.take() else {
            log::warn!("Device {:?} destroyed twice", handle);
            return;
        };
        self.swapchain_loader = None;
        unsafe { device.destroy_device(None) };
    }
}

fn as_ptrs(names: &[CString]) -> Vec<*const c_char> {
    names.iter().map(|n| n.as_ptr()).collect()
}

impl Driver for VulkanDriver {
    fn instance_layers(&mut self) -> VkResult<Vec<LayerInfo>> {
        let fp = self.entry.fp_v1_0();
        let raw = unsafe {
            enumerate(|count, data| (fp.enumerate_instance_layer_properties)(count, data))
        }?;
        Ok(raw.iter().map(LayerInfo::from_raw).collect())
    }

    fn instance_extensions(&mut self) -> VkResult<Vec<ExtensionInfo>> {
        let fp = self.entry.fp_v1_0();
        let raw = unsafe {
            enumerate(|count, data| {
                (fp.enumerate_instance_extension_properties)(ptr::null(), count, data)
            })
        }?;
        Ok(raw.iter().map(ExtensionInfo::from_raw).collect())
    }

    fn physical_devices(&mut self) -> VkResult<Vec<vk::PhysicalDevice>> {
        let instance = self.instance()?;
        let handle = instance.handle();
        let fp = instance.fp_v1_0();
        unsafe { enumerate(|count, data| (fp.enumerate_physical_devices)(handle, count, data)) }
    }

    fn physical_device_properties(
        &mut self,
        physical: vk::PhysicalDevice,
    ) -> vk::PhysicalDeviceProperties {
        self.instance()
            .map(|i| unsafe { i.get_physical_device_properties(physical) })
            .unwrap_or_default()
    }

    fn physical_device_features(
        &mut self,
        physical: vk::PhysicalDevice,
    ) -> vk::PhysicalDeviceFeatures {
        self.instance()
            .map(|i| unsafe { i.get_physical_device_features(physical) })
            .unwrap_or_default()
    }

    fn physical_device_memory_properties(
        &mut self,
        physical: vk::PhysicalDevice,
    ) -> vk::PhysicalDeviceMemoryProperties {
        self.instance()
            .map(|i| unsafe { i.get_physical_device_memory_properties(physical) })
            .unwrap_or_default()
    }

    fn queue_families(&mut self, physical: vk::PhysicalDevice) -> Vec<vk::QueueFamilyProperties> {
        let Ok(instance) = self.instance() else {
            return Vec::new();
        };
        let fp = instance.fp_v1_0();
        unsafe {
            enumerate(|count, data| {
                (fp.get_physical_device_queue_family_properties)(physical, count, data);
                vk::Result::SUCCESS
            })
        }
        .unwrap_or_default()
    }

    fn surface_support(
        &mut self,
        physical: vk::PhysicalDevice,
        queue_family: u32,
        surface: vk::SurfaceKHR,
    ) -> VkResult<bool> {
        unsafe {
            self.surface_loader()?
                .get_physical_device_surface_support(physical, queue_family, surface)
        }
    }

    fn surface_capabilities(
        &mut self,
        physical: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<vk::SurfaceCapabilitiesKHR> {
        unsafe {
            self.surface_loader()?
                .get_physical_device_surface_capabilities(physical, surface)
        }
    }

    fn surface_formats(
        &mut self,
        physical: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::SurfaceFormatKHR>> {
        let fp = self.surface_loader()?.fp();
        unsafe {
            enumerate(|count, data| {
                (fp.get_physical_device_surface_formats_khr)(physical, surface, count, data)
            })
        }
    }

    fn surface_present_modes(
        &mut self,
        physical: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::PresentModeKHR>> {
        let fp = self.surface_loader()?.fp();
        unsafe {
            enumerate(|count, data| {
                (fp.get_physical_device_surface_present_modes_khr)(physical, surface, count, data)
            })
        }
    }

    fn create_instance(&mut self, desc: &InstanceDesc) -> VkResult<vk::Instance> {
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&desc.application_name)
            .application_version(vk::make_api_version(0, 0, 1, 0))
            .engine_name(&desc.engine_name)
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(desc.api_version);

        let extensions = as_ptrs(&desc.extensions);
        let layers = as_ptrs(&desc.layers);

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layers);

        let instance = unsafe { self.entry.create_instance(&create_info, None) }?;

        if desc.debug_messenger {
            match Self::setup_debug_messenger(&self.entry, &instance) {
                Ok(debug_utils) => self.debug_utils = Some(debug_utils),
                Err(e) => {
                    // Reported to the caller as an instance creation failure
                    log::warn!("Debug messenger creation failed: {}", e);
                    unsafe { instance.destroy_instance(None) };
                    return Err(e);
                }
            }
        }

        let handle = instance.handle();
        self.surface_loader = Some(Surface::new(&self.entry, &instance));
        self.instance = Some(instance);
        Ok(handle)
    }

    fn create_surface(
        &mut self,
        display: RawDisplayHandle,
        window: RawWindowHandle,
    ) -> VkResult<vk::SurfaceKHR> {
        let instance = self.instance()?;
        unsafe { ash_window::create_surface(&self.entry, instance, display, window, None) }
    }

    fn create_device(
        &mut self,
        physical: vk::PhysicalDevice,
        desc: &DeviceDesc,
    ) -> VkResult<vk::Device> {
        let instance = self.instance()?;

        let queue_create_info = vk::DeviceQueueCreateInfo::builder()
            .queue_family_index(desc.queue_family_index)
            .queue_priorities(&desc.queue_priorities)
            .build();

        let extensions = as_ptrs(&desc.extensions);
        let features = vk::PhysicalDeviceFeatures::default();

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(std::slice::from_ref(&queue_create_info))
            .enabled_extension_names(&extensions)
            .enabled_features(&features);

        let device = unsafe { instance.create_device(physical, &create_info, None) }?;

        let handle = device.handle();
        let swapchain_loader = Swapchain::new(instance, &device);
        self.swapchain_loader = Some(swapchain_loader);
        self.device = Some(device);
        Ok(handle)
    }

    fn device_queue(&mut self, queue_family: u32, index: u32) -> vk::Queue {
        self.device()
            .map(|d| unsafe { d.get_device_queue(queue_family, index) })
            .unwrap_or_else(|_| vk::Queue::null())
    }

    fn create_swapchain(&mut self, desc: &SwapchainDesc) -> VkResult<vk::SwapchainKHR> {
        let create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(desc.surface)
            .min_image_count(desc.min_image_count)
            .image_format(desc.format.format)
            .image_color_space(desc.format.color_space)
            .image_extent(desc.extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(desc.pre_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(desc.present_mode)
            .clipped(true)
            .old_swapchain(vk::SwapchainKHR::null());

        unsafe { self.swapchain_loader()?.create_swapchain(&create_info, None) }
    }

    fn swapchain_images(&mut self, swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>> {
        let device = self.device()?.handle();
        let fp = self.swapchain_loader()?.fp();
        unsafe {
            enumerate(|count, data| (fp.get_swapchain_images_khr)(device, swapchain, count, data))
        }
    }

    fn create_image_view(&mut self, desc: &ImageViewDesc) -> VkResult<vk::ImageView> {
        let create_info = vk::ImageViewCreateInfo::builder()
            .image(desc.image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(desc.format)
            .components(desc.components)
            .subresource_range(desc.subresource_range);

        unsafe { self.device()?.create_image_view(&create_info, None) }
    }

    fn create_shader_module(&mut self, code: &[u32]) -> VkResult<vk::ShaderModule> {
        let create_info = vk::ShaderModuleCreateInfo::builder().code(code);
        unsafe { self.device()?.create_shader_module(&create_info, None) }
    }

    fn create_pipeline_layout(&mut self) -> VkResult<vk::PipelineLayout> {
        let layout_info = vk::PipelineLayoutCreateInfo::builder();
        unsafe { self.device()?.create_pipeline_layout(&layout_info, None) }
    }

    fn create_render_pass(&mut self, desc: &RenderPassDesc) -> VkResult<vk::RenderPass> {
        let attachments = [desc.color_attachment];
        let color_references = [desc.color_reference];
        let subpass = vk::SubpassDescription::builder()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_references)
            .build();
        let subpasses = [subpass];
        let dependencies = [desc.dependency];

        let render_pass_info = vk::RenderPassCreateInfo::builder()
            .attachments(&attachments)
            .subpasses(&subpasses)
            .dependencies(&dependencies);

        unsafe { self.device()?.create_render_pass(&render_pass_info, None) }
    }

    fn create_graphics_pipeline(
        &mut self,
        desc: &GraphicsPipelineDesc,
    ) -> VkResult<vk::Pipeline> {
        let vert_stage = vk::PipelineShaderStageCreateInfo::builder()
            .stage(vk::ShaderStageFlags::VERTEX)
            .module(desc.vertex_shader)
            .name(&desc.entry_point)
            .build();

        let frag_stage = vk::PipelineShaderStageCreateInfo::builder()
            .stage(vk::ShaderStageFlags::FRAGMENT)
            .module(desc.fragment_shader)
            .name(&desc.entry_point)
            .build();

        let shader_stages = [vert_stage, frag_stage];

        // Vertices come from gl_VertexIndex, nothing is bound
        let vertex_input_info = vk::PipelineVertexInputStateCreateInfo::builder();

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(desc.topology)
            .primitive_restart_enable(false);

        let viewports = [desc.viewport];
        let scissors = [desc.scissor];
        let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
            .viewports(&viewports)
            .scissors(&scissors);

        let rasterizer = vk::PipelineRasterizationStateCreateInfo::builder()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(desc.polygon_mode)
            .line_width(1.0)
            .cull_mode(desc.cull_mode)
            .front_face(desc.front_face)
            .depth_bias_enable(false);

        let multisampling = vk::PipelineMultisampleStateCreateInfo::builder()
            .sample_shading_enable(false)
            .rasterization_samples(desc.samples)
            .min_sample_shading(1.0);

        let color_blend_attachments = [desc.color_blend];
        let color_blending = vk::PipelineColorBlendStateCreateInfo::builder()
            .logic_op_enable(false)
            .logic_op(vk::LogicOp::COPY)
            .attachments(&color_blend_attachments)
            .blend_constants([0.0; 4]);

        let pipeline_info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input_info)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterizer)
            .multisample_state(&multisampling)
            .color_blend_state(&color_blending)
            .layout(desc.layout)
            .render_pass(desc.render_pass)
            .subpass(desc.subpass)
            .base_pipeline_handle(vk::Pipeline::null())
            .base_pipeline_index(-1)
            .build();

        let pipelines = unsafe {
            self.device()?
                .create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
                .map_err(|(_, e)| e)?
        };

        pipelines.into_iter().next().ok_or(vk::Result::ERROR_UNKNOWN)
    }

    fn create_framebuffer(&mut self, desc: &FramebufferDesc) -> VkResult<vk::Framebuffer> {
        let attachments = [desc.attachment];
        let framebuffer_info = vk::FramebufferCreateInfo::builder()
            .render_pass(desc.render_pass)
            .attachments(&attachments)
            .width(desc.extent.width)
            .height(desc.extent.height)
            .layers(1);

        unsafe { self.device()?.create_framebuffer(&framebuffer_info, None) }
    }

    fn create_command_pool(&mut self, queue_family: u32) -> VkResult<vk::CommandPool> {
        let pool_info = vk::CommandPoolCreateInfo::builder().queue_family_index(queue_family);
        unsafe { self.device()?.create_command_pool(&pool_info, None) }
    }

    fn allocate_command_buffers(
        &mut self,
        pool: vk::CommandPool,
        count: u32,
    ) -> VkResult<Vec<vk::CommandBuffer>> {
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);

        unsafe { self.device()?.allocate_command_buffers(&alloc_info) }
    }

    fn create_semaphore(&mut self) -> VkResult<vk::Semaphore> {
        let semaphore_info = vk::SemaphoreCreateInfo::builder();
        unsafe { self.device()?.create_semaphore(&semaphore_info, None) }
    }

    fn begin_command_buffer(
        &mut self,
        command_buffer: vk::CommandBuffer,
        flags: vk::CommandBufferUsageFlags,
    ) -> VkResult<()> {
        let begin_info = vk::CommandBufferBeginInfo::builder().flags(flags);
        unsafe { self.device()?.begin_command_buffer(command_buffer, &begin_info) }
    }

    fn cmd_begin_render_pass(&mut self, command_buffer: vk::CommandBuffer, begin: &RenderPassBegin) {
        let Ok(device) = self.device() else { return };
        let clear_values = [begin.clear_value];
        let begin_info = vk::RenderPassBeginInfo::builder()
            .render_pass(begin.render_pass)
            .framebuffer(begin.framebuffer)
            .render_area(begin.render_area)
            .clear_values(&clear_values);

        unsafe {
            device.cmd_begin_render_pass(command_buffer, &begin_info, vk::SubpassContents::INLINE)
        };
    }

    fn cmd_bind_pipeline(&mut self, command_buffer: vk::CommandBuffer, pipeline: vk::Pipeline) {
        if let Ok(device) = self.device() {
            unsafe {
                device.cmd_bind_pipeline(command_buffer, vk::PipelineBindPoint::GRAPHICS, pipeline)
            };
        }
    }

    fn cmd_draw(
        &mut self,
        command_buffer: vk::CommandBuffer,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) {
        if let Ok(device) = self.device() {
            unsafe {
                device.cmd_draw(
                    command_buffer,
                    vertex_count,
                    instance_count,
                    first_vertex,
                    first_instance,
                )
            };
        }
    }

    fn cmd_end_render_pass(&mut self, command_buffer: vk::CommandBuffer) {
        if let Ok(device) = self.device() {
            unsafe { device.cmd_end_render_pass(command_buffer) };
        }
    }

    fn end_command_buffer(&mut self, command_buffer: vk::CommandBuffer) -> VkResult<()> {
        unsafe { self.device()?.end_command_buffer(command_buffer) }
    }

    fn acquire_next_image(
        &mut self,
        swapchain: vk::SwapchainKHR,
        timeout: u64,
        signal: vk::Semaphore,
    ) -> VkResult<(u32, bool)> {
        unsafe {
            self.swapchain_loader()?
                .acquire_next_image(swapchain, timeout, signal, vk::Fence::null())
        }
    }

    fn queue_submit(&mut self, queue: vk::Queue, submit: &SubmitDesc) -> VkResult<()> {
        let wait_semaphores = [submit.wait_semaphore];
        let wait_stages = [submit.wait_stage];
        let command_buffers = [submit.command_buffer];
        let signal_semaphores = [submit.signal_semaphore];

        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores)
            .build();

        unsafe {
            self.device()?
                .queue_submit(queue, &[submit_info], vk::Fence::null())
        }
    }

    fn queue_present(&mut self, queue: vk::Queue, present: &PresentDesc) -> VkResult<bool> {
        let wait_semaphores = [present.wait_semaphore];
        let swapchains = [present.swapchain];
        let image_indices = [present.image_index];

        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        unsafe { self.swapchain_loader()?.queue_present(queue, &present_info) }
    }

    fn device_wait_idle(&mut self) -> VkResult<()> {
        unsafe { self.device()?.device_wait_idle() }
    }

    fn destroy(&mut self, object: GpuObject) {
        log::debug!("Destroying {:?}", object);

        match object {
            GpuObject::Instance(handle) => return self.destroy_instance(handle),
            GpuObject::Device(handle) => return self.destroy_device(handle),
            GpuObject::Surface(surface) => {
                if let Ok(loader) = self.surface_loader() {
                    unsafe { loader.destroy_surface(surface, None) };
                }
                return;
            }
            GpuObject::Swapchain(swapchain) => {
                if let Ok(loader) = self.swapchain_loader() {
                    unsafe { loader.destroy_swapchain(swapchain, None) };
                }
                return;
            }
            _ => {}
        }

        let Ok(device) = self.device() else {
            log::warn!("No device left to destroy {:?}", object);
            return;
        };

        unsafe {
            match object {
                GpuObject::ImageView(view) => device.destroy_image_view(view, None),
                GpuObject::ShaderModule(module) => device.destroy_shader_module(module, None),
                GpuObject::PipelineLayout(layout) => device.destroy_pipeline_layout(layout, None),
                GpuObject::RenderPass(render_pass) => device.destroy_render_pass(render_pass, None),
                GpuObject::Pipeline(pipeline) => device.destroy_pipeline(pipeline, None),
                GpuObject::Framebuffer(framebuffer) => device.destroy_framebuffer(framebuffer, None),
                GpuObject::CommandPool(pool) => device.destroy_command_pool(pool, None),
                GpuObject::CommandBuffers { pool, buffers } => {
                    device.free_command_buffers(pool, &buffers)
                }
                GpuObject::Semaphore(semaphore) => device.destroy_semaphore(semaphore, None),
                GpuObject::Instance(_)
                | GpuObject::Device(_)
                | GpuObject::Surface(_)
                | GpuObject::Swapchain(_) => {}
            }
        }
    }
}

// Debug callback for validation layers
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _p_user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() || (*p_callback_data).p_message.is_null() {
        return vk::FALSE;
    }
    let message = CStr::from_ptr((*p_callback_data).p_message);

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => {
            log::error!("[Vulkan {:?}] {}", message_type, message.to_string_lossy());
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => {
            log::warn!("[Vulkan {:?}] {}", message_type, message.to_string_lossy());
        }
        _ => {
            log::debug!("[Vulkan {:?}] {}", message_type, message.to_string_lossy());
        }
    }

    vk::FALSE
}

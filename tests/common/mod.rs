// Shared fixtures: a driver that records every call instead of talking to a
// GPU, and a window that closes after a fixed number of polls.
#![allow(dead_code)]

use ash::prelude::VkResult;
use ash::vk::{self, Handle};
use raw_window_handle::{RawDisplayHandle, RawWindowHandle, XlibDisplayHandle, XlibWindowHandle};
use std::cell::RefCell;
use std::ffi::CStr;
use std::path::PathBuf;
use std::rc::Rc;
use triangle_renderer::backend::driver::{
    DeviceDesc, Driver, ExtensionInfo, FramebufferDesc, GpuObject, GraphicsPipelineDesc,
    ImageViewDesc, InstanceDesc, LayerInfo, PresentDesc, RenderPassBegin, RenderPassDesc,
    SubmitDesc, SwapchainDesc,
};
use triangle_renderer::config::Config;
use triangle_renderer::error::{FrameOp, ObjectKind};
use triangle_renderer::window::WindowSystem;

pub const SURFACE_EXTENSION: &CStr = c"VK_KHR_surface";
pub const XLIB_SURFACE_EXTENSION: &CStr = c"VK_KHR_xlib_surface";

#[derive(Debug, Clone)]
pub enum Event {
    EnumerateLayers,
    EnumerateExtensions,
    EnumeratePhysicalDevices,
    SurfaceSupport { family: u32 },
    SurfaceQuery { physical: vk::PhysicalDevice },
    InstanceRequested { layers: usize, extensions: usize },
    DeviceRequested { family: u32, queues: usize, extensions: usize },
    SwapchainRequested { min_image_count: u32, present_mode: vk::PresentModeKHR },
    Create(GpuObject),
    GetQueue { family: u32, index: u32 },
    SwapchainImages,
    BeginCommandBuffer { command_buffer: vk::CommandBuffer, flags: vk::CommandBufferUsageFlags },
    BeginRenderPass { command_buffer: vk::CommandBuffer, framebuffer: vk::Framebuffer },
    BindPipeline { command_buffer: vk::CommandBuffer, pipeline: vk::Pipeline },
    Draw { command_buffer: vk::CommandBuffer, vertex_count: u32, instance_count: u32 },
    EndRenderPass { command_buffer: vk::CommandBuffer },
    EndCommandBuffer { command_buffer: vk::CommandBuffer },
    Acquire { signal: vk::Semaphore },
    Submit(SubmitDesc),
    Present(PresentDesc),
    WaitIdle,
    Destroy(GpuObject),
}

pub type EventLog = Rc<RefCell<Vec<Event>>>;

/// Knobs for the recording driver
#[derive(Debug, Clone)]
pub struct Behaviour {
    pub physical_devices: usize,
    pub surface_supported: bool,
    pub min_image_count: u32,
    pub max_image_count: u32,
    pub present_modes: Vec<vk::PresentModeKHR>,
    pub queue_families: Vec<vk::QueueFamilyProperties>,
    /// Surface queries on this device index report a lost surface
    pub surface_lost_on: Option<usize>,
    /// Report this many swapchain images instead of what was requested
    pub image_override: Option<usize>,
    /// Fail the first creation of this kind
    pub fail_create: Option<(ObjectKind, vk::Result)>,
    /// Fail the nth (0-based) call of a frame operation
    pub fail_frame: Option<(FrameOp, usize, vk::Result)>,
    pub suboptimal_present: bool,
}

impl Default for Behaviour {
    fn default() -> Self {
        Self {
            physical_devices: 1,
            surface_supported: true,
            min_image_count: 2,
            max_image_count: 8,
            present_modes: vec![vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::FIFO],
            queue_families: vec![vk::QueueFamilyProperties {
                queue_flags: vk::QueueFlags::GRAPHICS
                    | vk::QueueFlags::COMPUTE
                    | vk::QueueFlags::TRANSFER,
                queue_count: 16,
                ..Default::default()
            }],
            surface_lost_on: None,
            image_override: None,
            fail_create: None,
            fail_frame: None,
            suboptimal_present: false,
        }
    }
}

/// Handle the recorder reports for the device at `index`
pub fn physical_device(index: usize) -> vk::PhysicalDevice {
    vk::PhysicalDevice::from_raw(0x100 + index as u64)
}

pub struct RecordingDriver {
    behaviour: Behaviour,
    log: EventLog,
    next_handle: u64,
    image_count: usize,
    acquires: usize,
    submits: usize,
    presents: usize,
}

impl RecordingDriver {
    pub fn new(behaviour: Behaviour) -> (Self, EventLog) {
        let log = EventLog::default();
        let driver = Self {
            behaviour,
            log: log.clone(),
            next_handle: 0,
            image_count: 0,
            acquires: 0,
            submits: 0,
            presents: 0,
        };
        (driver, log)
    }

    fn push(&self, event: Event) {
        self.log.borrow_mut().push(event);
    }

    fn handle<H: Handle>(&mut self) -> H {
        self.next_handle += 1;
        H::from_raw(0x1000 + self.next_handle)
    }

    /// Fail once if this kind is configured to fail
    fn creation(&mut self, kind: ObjectKind) -> VkResult<()> {
        match self.behaviour.fail_create {
            Some((failing, result)) if failing == kind => {
                self.behaviour.fail_create = None;
                Err(result)
            }
            _ => Ok(()),
        }
    }

    fn create<H: Handle + Copy>(
        &mut self,
        kind: ObjectKind,
        wrap: fn(H) -> GpuObject,
    ) -> VkResult<H> {
        self.creation(kind)?;
        let handle = self.handle();
        self.push(Event::Create(wrap(handle)));
        Ok(handle)
    }

    fn surface_query(&self, physical: vk::PhysicalDevice) -> VkResult<()> {
        match self.behaviour.surface_lost_on {
            Some(index) if physical == physical_device(index) => {
                Err(vk::Result::ERROR_SURFACE_LOST_KHR)
            }
            _ => Ok(()),
        }
    }

    fn frame(&mut self, op: FrameOp, call: usize) -> VkResult<()> {
        match self.behaviour.fail_frame {
            Some((failing, nth, result)) if failing == op && nth == call => Err(result),
            _ => Ok(()),
        }
    }
}

impl Driver for RecordingDriver {
    fn instance_layers(&mut self) -> VkResult<Vec<LayerInfo>> {
        self.push(Event::EnumerateLayers);
        Ok(vec![LayerInfo {
            name: "VK_LAYER_KHRONOS_validation".into(),
            spec_version: vk::API_VERSION_1_3,
            implementation_version: 1,
            description: "Khronos validation layer".into(),
        }])
    }

    fn instance_extensions(&mut self) -> VkResult<Vec<ExtensionInfo>> {
        self.push(Event::EnumerateExtensions);
        Ok(["VK_KHR_surface", "VK_KHR_xlib_surface", "VK_EXT_debug_utils"]
            .iter()
            .map(|name| ExtensionInfo {
                name: name.to_string(),
                spec_version: 1,
            })
            .collect())
    }

    fn physical_devices(&mut self) -> VkResult<Vec<vk::PhysicalDevice>> {
        self.push(Event::EnumeratePhysicalDevices);
        Ok((0..self.behaviour.physical_devices)
            .map(physical_device)
            .collect())
    }

    fn physical_device_properties(
        &mut self,
        _physical: vk::PhysicalDevice,
    ) -> vk::PhysicalDeviceProperties {
        vk::PhysicalDeviceProperties {
            api_version: vk::API_VERSION_1_1,
            device_type: vk::PhysicalDeviceType::DISCRETE_GPU,
            ..Default::default()
        }
    }

    fn physical_device_features(&mut self, _physical: vk::PhysicalDevice) -> vk::PhysicalDeviceFeatures {
        vk::PhysicalDeviceFeatures::default()
    }

    fn physical_device_memory_properties(
        &mut self,
        _physical: vk::PhysicalDevice,
    ) -> vk::PhysicalDeviceMemoryProperties {
        vk::PhysicalDeviceMemoryProperties::default()
    }

    fn queue_families(&mut self, _physical: vk::PhysicalDevice) -> Vec<vk::QueueFamilyProperties> {
        self.behaviour.queue_families.clone()
    }

    fn surface_support(
        &mut self,
        _physical: vk::PhysicalDevice,
        queue_family: u32,
        _surface: vk::SurfaceKHR,
    ) -> VkResult<bool> {
        self.push(Event::SurfaceSupport {
            family: queue_family,
        });
        Ok(self.behaviour.surface_supported)
    }

    fn surface_capabilities(
        &mut self,
        physical: vk::PhysicalDevice,
        _surface: vk::SurfaceKHR,
    ) -> VkResult<vk::SurfaceCapabilitiesKHR> {
        self.push(Event::SurfaceQuery { physical });
        self.surface_query(physical)?;
        Ok(vk::SurfaceCapabilitiesKHR {
            min_image_count: self.behaviour.min_image_count,
            max_image_count: self.behaviour.max_image_count,
            current_extent: vk::Extent2D {
                width: 1280,
                height: 780,
            },
            max_image_array_layers: 1,
            supported_transforms: vk::SurfaceTransformFlagsKHR::IDENTITY,
            current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
            supported_composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
            supported_usage_flags: vk::ImageUsageFlags::COLOR_ATTACHMENT,
            ..Default::default()
        })
    }

    fn surface_formats(
        &mut self,
        physical: vk::PhysicalDevice,
        _surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::SurfaceFormatKHR>> {
        self.surface_query(physical)?;
        Ok(vec![vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }])
    }

    fn surface_present_modes(
        &mut self,
        physical: vk::PhysicalDevice,
        _surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::PresentModeKHR>> {
        self.surface_query(physical)?;
        Ok(self.behaviour.present_modes.clone())
    }

    fn create_instance(&mut self, desc: &InstanceDesc) -> VkResult<vk::Instance> {
        self.push(Event::InstanceRequested {
            layers: desc.layers.len(),
            extensions: desc.extensions.len(),
        });
        self.create(ObjectKind::Instance, GpuObject::Instance)
    }

    fn create_surface(
        &mut self,
        _display: RawDisplayHandle,
        _window: RawWindowHandle,
    ) -> VkResult<vk::SurfaceKHR> {
        self.create(ObjectKind::Surface, GpuObject::Surface)
    }

    fn create_device(
        &mut self,
        _physical: vk::PhysicalDevice,
        desc: &DeviceDesc,
    ) -> VkResult<vk::Device> {
        self.push(Event::DeviceRequested {
            family: desc.queue_family_index,
            queues: desc.queue_priorities.len(),
            extensions: desc.extensions.len(),
        });
        self.create(ObjectKind::Device, GpuObject::Device)
    }

    fn device_queue(&mut self, queue_family: u32, index: u32) -> vk::Queue {
        self.push(Event::GetQueue {
            family: queue_family,
            index,
        });
        vk::Queue::from_raw(0x900 + u64::from(index))
    }

    fn create_swapchain(&mut self, desc: &SwapchainDesc) -> VkResult<vk::SwapchainKHR> {
        self.push(Event::SwapchainRequested {
            min_image_count: desc.min_image_count,
            present_mode: desc.present_mode,
        });
        self.image_count = self
            .behaviour
            .image_override
            .unwrap_or(desc.min_image_count as usize);
        self.create(ObjectKind::Swapchain, GpuObject::Swapchain)
    }

    fn swapchain_images(&mut self, _swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>> {
        self.push(Event::SwapchainImages);
        Ok((0..self.image_count)
            .map(|i| vk::Image::from_raw(0x500 + i as u64))
            .collect())
    }

    fn create_image_view(&mut self, _desc: &ImageViewDesc) -> VkResult<vk::ImageView> {
        self.create(ObjectKind::ImageView, GpuObject::ImageView)
    }

    fn create_shader_module(&mut self, _code: &[u32]) -> VkResult<vk::ShaderModule> {
        self.create(ObjectKind::ShaderModule, GpuObject::ShaderModule)
    }

    fn create_pipeline_layout(&mut self) -> VkResult<vk::PipelineLayout> {
        self.create(ObjectKind::PipelineLayout, GpuObject::PipelineLayout)
    }

    fn create_render_pass(&mut self, _desc: &RenderPassDesc) -> VkResult<vk::RenderPass> {
        self.create(ObjectKind::RenderPass, GpuObject::RenderPass)
    }

    fn create_graphics_pipeline(
        &mut self,
        _desc: &GraphicsPipelineDesc,
    ) -> VkResult<vk::Pipeline> {
        self.create(ObjectKind::GraphicsPipeline, GpuObject::Pipeline)
    }

    fn create_framebuffer(&mut self, _desc: &FramebufferDesc) -> VkResult<vk::Framebuffer> {
        self.create(ObjectKind::Framebuffer, GpuObject::Framebuffer)
    }

    fn create_command_pool(&mut self, _queue_family: u32) -> VkResult<vk::CommandPool> {
        self.create(ObjectKind::CommandPool, GpuObject::CommandPool)
    }

    fn allocate_command_buffers(
        &mut self,
        pool: vk::CommandPool,
        count: u32,
    ) -> VkResult<Vec<vk::CommandBuffer>> {
        self.creation(ObjectKind::CommandBuffers)?;
        let buffers: Vec<vk::CommandBuffer> = (0..count).map(|_| self.handle()).collect();
        self.push(Event::Create(GpuObject::CommandBuffers {
            pool,
            buffers: buffers.clone(),
        }));
        Ok(buffers)
    }

    fn create_semaphore(&mut self) -> VkResult<vk::Semaphore> {
        self.create(ObjectKind::Semaphore, GpuObject::Semaphore)
    }

    fn begin_command_buffer(
        &mut self,
        command_buffer: vk::CommandBuffer,
        flags: vk::CommandBufferUsageFlags,
    ) -> VkResult<()> {
        self.creation(ObjectKind::CommandRecording)?;
        self.push(Event::BeginCommandBuffer {
            command_buffer,
            flags,
        });
        Ok(())
    }

    fn cmd_begin_render_pass(&mut self, command_buffer: vk::CommandBuffer, begin: &RenderPassBegin) {
        self.push(Event::BeginRenderPass {
            command_buffer,
            framebuffer: begin.framebuffer,
        });
    }

    fn cmd_bind_pipeline(&mut self, command_buffer: vk::CommandBuffer, pipeline: vk::Pipeline) {
        self.push(Event::BindPipeline {
            command_buffer,
            pipeline,
        });
    }

    fn cmd_draw(
        &mut self,
        command_buffer: vk::CommandBuffer,
        vertex_count: u32,
        instance_count: u32,
        _first_vertex: u32,
        _first_instance: u32,
    ) {
        self.push(Event::Draw {
            command_buffer,
            vertex_count,
            instance_count,
        });
    }

    fn cmd_end_render_pass(&mut self, command_buffer: vk::CommandBuffer) {
        self.push(Event::EndRenderPass { command_buffer });
    }

    fn end_command_buffer(&mut self, command_buffer: vk::CommandBuffer) -> VkResult<()> {
        self.push(Event::EndCommandBuffer { command_buffer });
        Ok(())
    }

    fn acquire_next_image(
        &mut self,
        _swapchain: vk::SwapchainKHR,
        _timeout: u64,
        signal: vk::Semaphore,
    ) -> VkResult<(u32, bool)> {
        let call = self.acquires;
        self.acquires += 1;
        self.frame(FrameOp::Acquire, call)?;
        self.push(Event::Acquire { signal });
        Ok(((call % self.image_count.max(1)) as u32, false))
    }

    fn queue_submit(&mut self, _queue: vk::Queue, submit: &SubmitDesc) -> VkResult<()> {
        let call = self.submits;
        self.submits += 1;
        self.frame(FrameOp::Submit, call)?;
        self.push(Event::Submit(*submit));
        Ok(())
    }

    fn queue_present(&mut self, _queue: vk::Queue, present: &PresentDesc) -> VkResult<bool> {
        let call = self.presents;
        self.presents += 1;
        self.frame(FrameOp::Present, call)?;
        self.push(Event::Present(*present));
        Ok(self.behaviour.suboptimal_present)
    }

    fn device_wait_idle(&mut self) -> VkResult<()> {
        self.push(Event::WaitIdle);
        Ok(())
    }

    fn destroy(&mut self, object: GpuObject) {
        self.push(Event::Destroy(object));
    }
}

/// A window that asks to close on poll number `frames + 1`
pub struct ScriptedWindow {
    pub frames: usize,
    pub polls: usize,
    pub extent: vk::Extent2D,
}

impl ScriptedWindow {
    pub fn closing_after(frames: usize) -> Self {
        Self {
            frames,
            polls: 0,
            extent: vk::Extent2D {
                width: 1280,
                height: 780,
            },
        }
    }
}

impl WindowSystem for ScriptedWindow {
    fn should_close(&self) -> bool {
        self.polls > self.frames
    }

    fn poll_events(&mut self) {
        self.polls += 1;
    }

    fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    fn required_extensions(&self) -> VkResult<Vec<&'static CStr>> {
        Ok(vec![SURFACE_EXTENSION, XLIB_SURFACE_EXTENSION])
    }

    fn raw_display_handle(&self) -> RawDisplayHandle {
        RawDisplayHandle::Xlib(XlibDisplayHandle::empty())
    }

    fn raw_window_handle(&self) -> RawWindowHandle {
        RawWindowHandle::Xlib(XlibWindowHandle::empty())
    }
}

/// Minimal valid SPIR-V header, enough for the loader's checks
fn spirv_stub() -> Vec<u8> {
    [0x0723_0203u32, 0x0001_0000, 0, 1, 0]
        .iter()
        .flat_map(|w| w.to_le_bytes())
        .collect()
}

/// Config pointing at freshly written shader stubs in a per-test directory
pub fn test_config(name: &str) -> Config {
    let dir = std::env::temp_dir().join(format!(
        "triangle-renderer-test-{}-{}",
        name,
        std::process::id()
    ));
    std::fs::create_dir_all(&dir).expect("create shader dir");

    let vertex = dir.join("vert.spv");
    let fragment = dir.join("frag.spv");
    std::fs::write(&vertex, spirv_stub()).expect("write vertex shader");
    std::fs::write(&fragment, spirv_stub()).expect("write fragment shader");

    let mut config = Config::default();
    config.shaders.vertex = vertex;
    config.shaders.fragment = fragment;
    config.debug.validation_layers = false;
    config.debug.log_to_file = false;
    config
}

pub fn missing_shader() -> PathBuf {
    PathBuf::from("this/path/does/not/exist/vert.spv")
}

// ── Event log queries ──────────────────────────────────────────────────────

pub fn events(log: &EventLog) -> Vec<Event> {
    log.borrow().clone()
}

pub fn created(log: &EventLog) -> Vec<GpuObject> {
    log.borrow()
        .iter()
        .filter_map(|e| match e {
            Event::Create(o) => Some(o.clone()),
            _ => None,
        })
        .collect()
}

pub fn destroyed(log: &EventLog) -> Vec<GpuObject> {
    log.borrow()
        .iter()
        .filter_map(|e| match e {
            Event::Destroy(o) => Some(o.clone()),
            _ => None,
        })
        .collect()
}

/// Index of the first event matching `pred`
pub fn position(log: &EventLog, pred: impl Fn(&Event) -> bool) -> Option<usize> {
    log.borrow().iter().position(pred)
}

pub fn count(log: &EventLog, pred: impl Fn(&Event) -> bool) -> usize {
    log.borrow().iter().filter(|e| pred(e)).count()
}

pub fn is_create(kind: fn(&GpuObject) -> bool) -> impl Fn(&Event) -> bool {
    move |e| matches!(e, Event::Create(o) if kind(o))
}

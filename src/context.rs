// =============================================================================
// GRAPHICS CONTEXT - Bootstrap and teardown of every GPU object
// =============================================================================
//
// CREATION ORDER:
//   instance -> surface -> physical device -> logical device + queue
//     -> swapchain + image views -> shader modules -> pipeline layout
//     -> render pass -> pipeline -> framebuffers -> command pool + buffers
//     -> semaphores
//
// Every object is recorded in the ledger as soon as it exists. Teardown (and
// a failed bootstrap) pops the ledger, so destruction is always the exact
// reverse of creation.
//
// =============================================================================

use crate::backend::command::{create_command_pool, RecordedCommands, StaticCommands};
use crate::backend::device::{
    create_logical_device, device_desc, graphics_queue_family, policy_for, require_presentation,
    select_device,
};
use crate::backend::driver::{Driver, GpuObject, InstanceDesc};
use crate::backend::enumerate::{
    describe_physical_device, list_physical_devices, query_instance_capabilities,
    PhysicalDeviceInfo,
};
use crate::backend::pipeline::{create_framebuffers, GraphicsPipeline};
use crate::backend::shader::load_shader_bytecode;
use crate::backend::swapchain::{query_surface, swapchain_desc, Swapchain};
use crate::backend::sync::FrameSync;
use crate::config::Config;
use crate::error::{check, FrameOp, ObjectKind, Op, RenderError, Result};
use crate::logging::LIFECYCLE;
use crate::window::WindowSystem;
use ash::extensions::ext::DebugUtils;
use ash::vk;
use std::ffi::{CStr, CString};

pub const ENGINE_NAME: &CStr = c"Triangle Engine";
pub const API_VERSION: u32 = vk::API_VERSION_1_1;
pub const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

// =============================================================================
// LEDGER
// =============================================================================

/// Live GPU objects in creation order.
#[derive(Debug, Default)]
pub struct Ledger {
    objects: Vec<GpuObject>,
}

impl Ledger {
    pub fn record(&mut self, object: GpuObject) {
        self.objects.push(object);
    }

    /// Destroy one object ahead of teardown and forget it.
    pub fn release<D: Driver>(&mut self, driver: &mut D, object: &GpuObject) {
        if let Some(pos) = self.objects.iter().rposition(|o| o == object) {
            driver.destroy(self.objects.remove(pos));
        } else {
            log::warn!("Released {:?} which was never recorded", object);
        }
    }

    /// Destroy everything, newest first.
    pub fn unwind<D: Driver>(&mut self, driver: &mut D) {
        while let Some(object) = self.objects.pop() {
            driver.destroy(object);
        }
    }

    pub fn objects(&self) -> &[GpuObject] {
        &self.objects
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

// =============================================================================
// CONTEXT
// =============================================================================

/// Owns the driver and every handle the renderer creates.
pub struct GraphicsContext<D: Driver> {
    // ─────────────────────────────────────────────────────────────────────────
    // DRIVER & LIFETIME TRACKING
    // ─────────────────────────────────────────────────────────────────────────
    driver: D,
    ledger: Ledger,
    torn_down: bool,

    // ─────────────────────────────────────────────────────────────────────────
    // VULKAN CORE
    // ─────────────────────────────────────────────────────────────────────────
    instance: vk::Instance,
    surface: vk::SurfaceKHR,
    physical_device: PhysicalDeviceInfo,
    queue_family: u32,
    device: vk::Device,
    queue: vk::Queue,

    // ─────────────────────────────────────────────────────────────────────────
    // PRESENTATION & PIPELINE
    // ─────────────────────────────────────────────────────────────────────────
    swapchain: Swapchain,
    pipeline: GraphicsPipeline,
    framebuffers: Vec<vk::Framebuffer>,

    // ─────────────────────────────────────────────────────────────────────────
    // COMMANDS & SYNCHRONIZATION
    // ─────────────────────────────────────────────────────────────────────────
    commands: RecordedCommands,
    sync: FrameSync,
}

/// Everything `build` produces, before the ledger and driver join it
struct Handles {
    instance: vk::Instance,
    surface: vk::SurfaceKHR,
    physical_device: PhysicalDeviceInfo,
    queue_family: u32,
    device: vk::Device,
    queue: vk::Queue,
    swapchain: Swapchain,
    pipeline: GraphicsPipeline,
    framebuffers: Vec<vk::Framebuffer>,
    commands: RecordedCommands,
    sync: FrameSync,
}

impl<D: Driver> GraphicsContext<D> {
    /// Create every GPU object in order. On failure whatever was created is
    /// destroyed again and the first error is returned.
    pub fn bootstrap<W: WindowSystem>(mut driver: D, window: &W, config: &Config) -> Result<Self> {
        log::info!(target: LIFECYCLE, "Startup initialized...");

        let mut ledger = Ledger::default();
        match Self::build(&mut driver, &mut ledger, window, config) {
            Ok(handles) => {
                log::info!(
                    target: LIFECYCLE,
                    "Startup finished: {} objects, {} swapchain images",
                    ledger.len(),
                    handles.swapchain.len()
                );
                Ok(Self {
                    driver,
                    ledger,
                    torn_down: false,
                    instance: handles.instance,
                    surface: handles.surface,
                    physical_device: handles.physical_device,
                    queue_family: handles.queue_family,
                    device: handles.device,
                    queue: handles.queue,
                    swapchain: handles.swapchain,
                    pipeline: handles.pipeline,
                    framebuffers: handles.framebuffers,
                    commands: handles.commands,
                    sync: handles.sync,
                })
            }
            Err(e) => {
                log::info!(
                    target: LIFECYCLE,
                    "Startup failed ({:?}), unwinding {} objects created before the failure",
                    e.category(),
                    ledger.len()
                );
                ledger.unwind(&mut driver);
                Err(e)
            }
        }
    }

    fn build<W: WindowSystem>(
        driver: &mut D,
        ledger: &mut Ledger,
        window: &W,
        config: &Config,
    ) -> Result<Handles> {
        // ─────────────────────────────────────────────────────────────────────
        // STEP 1: Instance + surface
        // ─────────────────────────────────────────────────────────────────────
        let instance = Self::create_instance(driver, ledger, window, config)?;

        log::info!("Creating window surface");
        let surface = check(
            driver.create_surface(window.raw_display_handle(), window.raw_window_handle()),
            Op::Create(ObjectKind::Surface),
        )?;
        ledger.record(GpuObject::Surface(surface));

        // ─────────────────────────────────────────────────────────────────────
        // STEP 2: Pick a GPU and check it can present
        // ─────────────────────────────────────────────────────────────────────
        let handles = list_physical_devices(driver)?;
        log::info!("Amount of physical devices: {}", handles.len());

        let candidates: Vec<_> = handles
            .iter()
            .map(|&handle| describe_physical_device(driver, handle))
            .collect();

        let policy = policy_for(config.graphics.device_policy);
        let physical_device = candidates[select_device(policy.as_ref(), &candidates)?].clone();

        let (queue_family, queue_count) = graphics_queue_family(&physical_device.queue_families)?;
        require_presentation(driver, physical_device.handle, queue_family, surface)?;

        // ─────────────────────────────────────────────────────────────────────
        // STEP 3: Logical device
        // ─────────────────────────────────────────────────────────────────────
        let device = create_logical_device(
            driver,
            physical_device.handle,
            &device_desc(queue_family, queue_count),
        )?;
        ledger.record(GpuObject::Device(device));
        let queue = driver.device_queue(queue_family, 0);

        // ─────────────────────────────────────────────────────────────────────
        // STEP 4: Swapchain + image views
        // ─────────────────────────────────────────────────────────────────────
        let support = query_surface(driver, physical_device.handle, surface)?;
        let desc = swapchain_desc(
            surface,
            &support,
            window.extent(),
            config.graphics.image_count,
        )?;
        let swapchain = Swapchain::new(driver, ledger, &desc)?;

        // ─────────────────────────────────────────────────────────────────────
        // STEP 5: Pipeline. Both shaders are read before any module exists.
        // ─────────────────────────────────────────────────────────────────────
        let vertex = load_shader_bytecode(&config.shaders.vertex)?;
        let fragment = load_shader_bytecode(&config.shaders.fragment)?;
        let pipeline = GraphicsPipeline::new(
            driver,
            ledger,
            swapchain.format,
            swapchain.extent,
            &vertex,
            &fragment,
        )?;

        let framebuffers = create_framebuffers(
            driver,
            ledger,
            &swapchain.image_views,
            pipeline.render_pass,
            swapchain.extent,
        )?;

        // ─────────────────────────────────────────────────────────────────────
        // STEP 6: Commands, recorded once
        // ─────────────────────────────────────────────────────────────────────
        let pool = create_command_pool(driver, ledger, queue_family)?;
        let commands = StaticCommands::allocate(driver, ledger, pool, swapchain.len() as u32)?
            .record_all(
                driver,
                &pipeline,
                &framebuffers,
                swapchain.extent,
                config.graphics.clear_color,
            )?;

        // ─────────────────────────────────────────────────────────────────────
        // STEP 7: Semaphores
        // ─────────────────────────────────────────────────────────────────────
        let sync = FrameSync::new(driver, ledger)?;

        Ok(Handles {
            instance,
            surface,
            physical_device,
            queue_family,
            device,
            queue,
            swapchain,
            pipeline,
            framebuffers,
            commands,
            sync,
        })
    }

    fn create_instance<W: WindowSystem>(
        driver: &mut D,
        ledger: &mut Ledger,
        window: &W,
        config: &Config,
    ) -> Result<vk::Instance> {
        let caps = query_instance_capabilities(driver)?;

        let mut validation = config.validation_requested();
        if validation && !caps.has_layer(VALIDATION_LAYER) {
            log::warn!(
                "{} requested but not installed, continuing without validation",
                VALIDATION_LAYER.to_string_lossy()
            );
            validation = false;
        }

        let mut extensions = check(
            window.required_extensions(),
            Op::Enumerate("window instance extensions"),
        )?;
        if validation {
            extensions.push(DebugUtils::name());
        }

        for &ext in &extensions {
            if !caps.has_extension(ext) {
                let err = RenderError::MissingInstanceExtension(ext.to_string_lossy().into_owned());
                log::error!("{}", err);
                return Err(err);
            }
        }

        let application_name = CString::new(config.window.title.as_str()).unwrap_or_else(|_| {
            log::warn!("Window title contains a NUL byte, using the engine name");
            CString::from(ENGINE_NAME)
        });

        let desc = InstanceDesc {
            application_name,
            engine_name: CString::from(ENGINE_NAME),
            api_version: API_VERSION,
            layers: if validation {
                vec![CString::from(VALIDATION_LAYER)]
            } else {
                Vec::new()
            },
            extensions: extensions.into_iter().map(CString::from).collect(),
            debug_messenger: validation,
        };

        log::info!(
            "Creating Vulkan instance: {} ({} extensions, validation {})",
            config.window.title,
            desc.extensions.len(),
            if validation { "on" } else { "off" }
        );
        let instance = check(driver.create_instance(&desc), Op::Create(ObjectKind::Instance))?;
        ledger.record(GpuObject::Instance(instance));
        Ok(instance)
    }

    // =========================================================================
    // TEARDOWN
    // =========================================================================

    /// Wait for the GPU, then destroy everything in reverse creation order.
    /// Objects are destroyed even if the wait fails; the wait error is
    /// returned afterwards.
    pub fn shutdown(mut self) -> Result<()> {
        self.teardown()
    }

    fn teardown(&mut self) -> Result<()> {
        if self.torn_down {
            return Ok(());
        }
        self.torn_down = true;

        log::info!(target: LIFECYCLE, "Shutdown initialized...");
        let idle = check(self.driver.device_wait_idle(), Op::Frame(FrameOp::WaitIdle));

        let count = self.ledger.len();
        self.ledger.unwind(&mut self.driver);
        log::info!(target: LIFECYCLE, "Shutdown finished: {} objects destroyed", count);

        idle
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn instance(&self) -> vk::Instance {
        self.instance
    }

    pub fn surface(&self) -> vk::SurfaceKHR {
        self.surface
    }

    pub fn physical_device(&self) -> &PhysicalDeviceInfo {
        &self.physical_device
    }

    pub fn queue_family(&self) -> u32 {
        self.queue_family
    }

    pub fn device(&self) -> vk::Device {
        self.device
    }

    pub fn queue(&self) -> vk::Queue {
        self.queue
    }

    pub fn swapchain(&self) -> &Swapchain {
        &self.swapchain
    }

    pub fn pipeline(&self) -> &GraphicsPipeline {
        &self.pipeline
    }

    pub fn framebuffers(&self) -> &[vk::Framebuffer] {
        &self.framebuffers
    }

    pub fn commands(&self) -> &RecordedCommands {
        &self.commands
    }

    pub fn sync(&self) -> &FrameSync {
        &self.sync
    }
}

impl<D: Driver> Drop for GraphicsContext<D> {
    fn drop(&mut self) {
        if let Err(e) = self.teardown() {
            log::debug!("Teardown after drop: {}", e);
        }
    }
}


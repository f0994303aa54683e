// Capability enumeration
//
// Read-only introspection: instance layers and extensions, physical devices,
// and a per-device snapshot used to pick one. Nothing here creates a GPU
// object.

use super::driver::{Driver, ExtensionInfo, LayerInfo};
use crate::error::{check, Op, Result};
use ash::prelude::VkResult;
use ash::vk;
use std::ffi::CStr;
use std::ptr;

/// The Vulkan count-then-fill idiom.
///
/// `query` is called once with a null buffer to learn the count, then again
/// with a buffer of that capacity. A `VK_INCOMPLETE` answer on the fill call
/// means the set grew in between, so the whole exchange restarts. An error
/// code from either call is returned as is.
///
/// # Safety
/// `query` must behave like a Vulkan enumeration entry point: on the fill
/// call it writes at most `*count` elements to the buffer and stores the
/// number written back into `count`.
pub unsafe fn enumerate<T, F>(mut query: F) -> VkResult<Vec<T>>
where
    F: FnMut(&mut u32, *mut T) -> vk::Result,
{
    loop {
        let mut count = 0u32;
        query(&mut count, ptr::null_mut()).result()?;

        let mut data = Vec::with_capacity(count as usize);
        let err = query(&mut count, data.as_mut_ptr());
        if err != vk::Result::INCOMPLETE {
            err.result()?;
            // SAFETY: the query initialized `count` elements
            unsafe { data.set_len(count as usize) };
            return Ok(data);
        }
    }
}

/// Decode a fixed-size, NUL-terminated Vulkan string field.
pub fn name_from_raw(raw: &[std::os::raw::c_char]) -> String {
    let bytes: Vec<u8> = raw
        .iter()
        .take_while(|&&c| c != 0)
        .map(|&c| c as u8)
        .collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

impl LayerInfo {
    pub fn from_raw(props: &vk::LayerProperties) -> Self {
        Self {
            name: name_from_raw(&props.layer_name),
            spec_version: props.spec_version,
            implementation_version: props.implementation_version,
            description: name_from_raw(&props.description),
        }
    }
}

impl ExtensionInfo {
    pub fn from_raw(props: &vk::ExtensionProperties) -> Self {
        Self {
            name: name_from_raw(&props.extension_name),
            spec_version: props.spec_version,
        }
    }
}

/// What the loader offers before an instance exists.
#[derive(Debug, Clone, Default)]
pub struct InstanceCapabilities {
    pub layers: Vec<LayerInfo>,
    pub extensions: Vec<ExtensionInfo>,
}

impl InstanceCapabilities {
    pub fn has_layer(&self, name: &CStr) -> bool {
        let name = name.to_string_lossy();
        self.layers.iter().any(|l| l.name == name)
    }

    pub fn has_extension(&self, name: &CStr) -> bool {
        let name = name.to_string_lossy();
        self.extensions.iter().any(|e| e.name == name)
    }
}

pub fn list_instance_layers<D: Driver>(driver: &mut D) -> Result<Vec<LayerInfo>> {
    check(driver.instance_layers(), Op::Enumerate("instance layers"))
}

pub fn list_instance_extensions<D: Driver>(driver: &mut D) -> Result<Vec<ExtensionInfo>> {
    check(driver.instance_extensions(), Op::Enumerate("instance extensions"))
}

pub fn list_physical_devices<D: Driver>(driver: &mut D) -> Result<Vec<vk::PhysicalDevice>> {
    check(driver.physical_devices(), Op::Enumerate("physical devices"))
}

pub fn query_instance_capabilities<D: Driver>(driver: &mut D) -> Result<InstanceCapabilities> {
    let layers = list_instance_layers(driver)?;
    log::info!("Amount of instance layers: {}", layers.len());
    for layer in &layers {
        log::debug!(
            "  layer {} (spec {}, impl {}): {}",
            layer.name,
            version_string(layer.spec_version),
            layer.implementation_version,
            layer.description
        );
    }

    let extensions = list_instance_extensions(driver)?;
    log::info!("Amount of instance extensions: {}", extensions.len());
    for ext in &extensions {
        log::debug!("  extension {} (spec {})", ext.name, ext.spec_version);
    }

    Ok(InstanceCapabilities { layers, extensions })
}

/// Snapshot of one candidate GPU. Surface properties are queried later, and
/// only for the selected device once it is known to support the surface.
#[derive(Debug, Clone)]
pub struct PhysicalDeviceInfo {
    pub handle: vk::PhysicalDevice,
    pub properties: vk::PhysicalDeviceProperties,
    pub features: vk::PhysicalDeviceFeatures,
    pub memory: vk::PhysicalDeviceMemoryProperties,
    pub queue_families: Vec<vk::QueueFamilyProperties>,
}

impl PhysicalDeviceInfo {
    pub fn name(&self) -> String {
        name_from_raw(&self.properties.device_name)
    }

    pub fn device_type(&self) -> vk::PhysicalDeviceType {
        self.properties.device_type
    }
}

pub fn describe_physical_device<D: Driver>(
    driver: &mut D,
    handle: vk::PhysicalDevice,
) -> PhysicalDeviceInfo {
    let info = PhysicalDeviceInfo {
        handle,
        properties: driver.physical_device_properties(handle),
        features: driver.physical_device_features(handle),
        memory: driver.physical_device_memory_properties(handle),
        queue_families: driver.queue_families(handle),
    };

    log_physical_device(&info);
    info
}

fn version_string(version: u32) -> String {
    format!(
        "{}.{}.{}",
        vk::api_version_major(version),
        vk::api_version_minor(version),
        vk::api_version_patch(version)
    )
}

fn log_physical_device(info: &PhysicalDeviceInfo) {
    let props = &info.properties;
    log::info!(
        "GPU {}: API {}, driver {}, vendor 0x{:04x}, device 0x{:04x}, {:?}",
        info.name(),
        version_string(props.api_version),
        props.driver_version,
        props.vendor_id,
        props.device_id,
        props.device_type
    );
    log::debug!(
        "  discrete queue priorities: {}",
        props.limits.discrete_queue_priorities
    );

    let f = &info.features;
    log::debug!(
        "  features: geometry_shader={} tessellation_shader={} fill_mode_non_solid={} \
         wide_lines={} sampler_anisotropy={} multi_viewport={} shader_float64={}",
        f.geometry_shader,
        f.tessellation_shader,
        f.fill_mode_non_solid,
        f.wide_lines,
        f.sampler_anisotropy,
        f.multi_viewport,
        f.shader_float64
    );
    log::debug!(
        "  memory: {} types, {} heaps",
        info.memory.memory_type_count,
        info.memory.memory_heap_count
    );

    for (i, family) in info.queue_families.iter().enumerate() {
        let g = family.min_image_transfer_granularity;
        log::debug!(
            "  queue family {}: {:?} x{} (timestamp bits {}, granularity {},{},{})",
            i,
            family.queue_flags,
            family.queue_count,
            family.timestamp_valid_bits,
            g.width,
            g.height,
            g.depth
        );
    }
}

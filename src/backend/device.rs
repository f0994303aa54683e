// Vulkan Device - GPU selection and logical device
//
// Responsibilities:
// - Device selection policy (first suitable by default, discrete on request)
// - Graphics queue family lookup + presentation check
// - Logical device + queue creation

use super::driver::{DeviceDesc, Driver};
use super::enumerate::PhysicalDeviceInfo;
use crate::config::DevicePolicyKind;
use crate::error::{check, ObjectKind, Op, RenderError, Result};
use ash::vk;
use std::ffi::CString;

/// Upper bound on queues requested from the graphics family
pub const MAX_QUEUES: u32 = 4;

/// Picks one GPU out of the enumerated candidates.
pub trait DevicePolicy {
    fn name(&self) -> &'static str;

    /// Index into `candidates`, or `None` if nothing qualifies. Never called
    /// with an empty slice.
    fn select(&self, candidates: &[PhysicalDeviceInfo]) -> Option<usize>;
}

/// Takes the first enumerated device, no scoring.
#[derive(Debug, Default, Clone, Copy)]
pub struct PickFirstSuitable;

impl DevicePolicy for PickFirstSuitable {
    fn name(&self) -> &'static str {
        "first suitable"
    }

    fn select(&self, candidates: &[PhysicalDeviceInfo]) -> Option<usize> {
        if candidates.is_empty() {
            None
        } else {
            Some(0)
        }
    }
}

/// Discrete beats integrated beats everything else. Ties go to the earlier
/// device.
#[derive(Debug, Default, Clone, Copy)]
pub struct PreferDiscrete;

impl PreferDiscrete {
    fn score(device_type: vk::PhysicalDeviceType) -> u32 {
        match device_type {
            vk::PhysicalDeviceType::DISCRETE_GPU => 1000,
            vk::PhysicalDeviceType::INTEGRATED_GPU => 100,
            _ => 1,
        }
    }
}

impl DevicePolicy for PreferDiscrete {
    fn name(&self) -> &'static str {
        "prefer discrete"
    }

    fn select(&self, candidates: &[PhysicalDeviceInfo]) -> Option<usize> {
        let mut best = None;
        let mut best_score = 0;

        for (i, candidate) in candidates.iter().enumerate() {
            let score = Self::score(candidate.device_type());
            if score > best_score {
                best_score = score;
                best = Some(i);
            }
        }

        best
    }
}

pub fn policy_for(kind: DevicePolicyKind) -> Box<dyn DevicePolicy> {
    match kind {
        DevicePolicyKind::First => Box::new(PickFirstSuitable),
        DevicePolicyKind::Discrete => Box::new(PreferDiscrete),
    }
}

/// Apply `policy` to the candidates. An empty list is a precondition failure.
pub fn select_device(
    policy: &dyn DevicePolicy,
    candidates: &[PhysicalDeviceInfo],
) -> Result<usize> {
    if candidates.is_empty() {
        log::error!("{}", RenderError::NoPhysicalDevice);
        return Err(RenderError::NoPhysicalDevice);
    }

    let index = policy.select(candidates).ok_or_else(|| {
        log::error!("{}", RenderError::NoPhysicalDevice);
        RenderError::NoPhysicalDevice
    })?;
    log::info!(
        "Selected GPU {} of {}: {} (policy: {})",
        index,
        candidates.len(),
        candidates[index].name(),
        policy.name()
    );
    Ok(index)
}

/// First queue family with graphics support, with its queue count.
pub fn graphics_queue_family(families: &[vk::QueueFamilyProperties]) -> Result<(u32, u32)> {
    families
        .iter()
        .enumerate()
        .find(|(_, props)| props.queue_flags.contains(vk::QueueFlags::GRAPHICS))
        .map(|(i, props)| (i as u32, props.queue_count))
        .ok_or_else(|| {
            log::error!("{}", RenderError::NoGraphicsQueue);
            RenderError::NoGraphicsQueue
        })
}

pub fn queue_priorities(queue_count: u32) -> Vec<f32> {
    vec![1.0; queue_count.min(MAX_QUEUES) as usize]
}

/// Fails before any device exists if the family cannot present to `surface`.
pub fn require_presentation<D: Driver>(
    driver: &mut D,
    physical: vk::PhysicalDevice,
    family: u32,
    surface: vk::SurfaceKHR,
) -> Result<()> {
    let supported = check(
        driver.surface_support(physical, family, surface),
        Op::Enumerate("surface support"),
    )?;

    if supported {
        Ok(())
    } else {
        let err = RenderError::PresentationUnsupported { family };
        log::error!("Surface not supported! {}", err);
        Err(err)
    }
}

pub fn device_desc(family: u32, queue_count: u32) -> DeviceDesc {
    DeviceDesc {
        queue_family_index: family,
        queue_priorities: queue_priorities(queue_count),
        extensions: vec![CString::from(ash::extensions::khr::Swapchain::name())],
    }
}

pub fn create_logical_device<D: Driver>(
    driver: &mut D,
    physical: vk::PhysicalDevice,
    desc: &DeviceDesc,
) -> Result<vk::Device> {
    log::info!(
        "Creating logical device: family {}, {} queue(s)",
        desc.queue_family_index,
        desc.queue_priorities.len()
    );
    check(
        driver.create_device(physical, desc),
        Op::Create(ObjectKind::Device),
    )
}

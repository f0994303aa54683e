// Swapchain - Window presentation
//
// Manages the chain of images we render to and present to the screen.
// Built once at startup and never recreated: the extent is the window's
// configured size and the present mode is always FIFO.

use super::driver::{Driver, GpuObject, ImageViewDesc, SwapchainDesc};
use crate::context::Ledger;
use crate::error::{check, ObjectKind, Op, RenderError, Result};
use ash::vk;

pub const PREFERRED_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::B8G8R8A8_UNORM,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

pub const PRESENT_MODE: vk::PresentModeKHR = vk::PresentModeKHR::FIFO;

/// What a surface can do on one physical device
#[derive(Debug, Clone)]
pub struct SurfaceSupport {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

/// Only valid once `physical` is known to present to `surface`.
pub fn query_surface<D: Driver>(
    driver: &mut D,
    physical: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
) -> Result<SurfaceSupport> {
    let support = SurfaceSupport {
        capabilities: check(
            driver.surface_capabilities(physical, surface),
            Op::Enumerate("surface capabilities"),
        )?,
        formats: check(
            driver.surface_formats(physical, surface),
            Op::Enumerate("surface formats"),
        )?,
        present_modes: check(
            driver.surface_present_modes(physical, surface),
            Op::Enumerate("surface present modes"),
        )?,
    };

    let caps = &support.capabilities;
    log::debug!(
        "Surface: images {}..{}, current extent {}x{}, extent range {}x{}..{}x{}, \
         max layers {}, transforms {:?} (current {:?}), composite alpha {:?}, usage {:?}",
        caps.min_image_count,
        caps.max_image_count,
        caps.current_extent.width,
        caps.current_extent.height,
        caps.min_image_extent.width,
        caps.min_image_extent.height,
        caps.max_image_extent.width,
        caps.max_image_extent.height,
        caps.max_image_array_layers,
        caps.supported_transforms,
        caps.current_transform,
        caps.supported_composite_alpha,
        caps.supported_usage_flags
    );
    log::debug!("  surface formats: {:?}", support.formats);
    log::debug!("  present modes: {:?}", support.present_modes);

    Ok(support)
}

/// `desired` raised to the surface minimum, then capped at the maximum.
/// A maximum of zero means unbounded.
pub fn choose_image_count(desired: u32, caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let mut count = desired.max(caps.min_image_count);
    if caps.max_image_count != 0 {
        count = count.min(caps.max_image_count);
    }
    count
}

fn same_format(a: &vk::SurfaceFormatKHR, b: &vk::SurfaceFormatKHR) -> bool {
    a.format == b.format && a.color_space == b.color_space
}

pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    // A lone UNDEFINED entry means the surface takes any format
    if let [only] = formats {
        if only.format == vk::Format::UNDEFINED {
            return PREFERRED_FORMAT;
        }
    }

    if formats.iter().any(|f| same_format(f, &PREFERRED_FORMAT)) {
        return PREFERRED_FORMAT;
    }

    match formats.first() {
        Some(&first) => {
            log::warn!(
                "Surface does not offer {:?}/{:?}, falling back to {:?}/{:?}",
                PREFERRED_FORMAT.format,
                PREFERRED_FORMAT.color_space,
                first.format,
                first.color_space
            );
            first
        }
        None => {
            log::warn!("Surface reported no formats, requesting the preferred one anyway");
            PREFERRED_FORMAT
        }
    }
}

pub fn choose_present_mode(modes: &[vk::PresentModeKHR]) -> Result<vk::PresentModeKHR> {
    if modes.contains(&PRESENT_MODE) {
        Ok(PRESENT_MODE)
    } else {
        let err = RenderError::PresentModeUnsupported(PRESENT_MODE);
        log::error!("{}", err);
        Err(err)
    }
}

pub fn choose_transform(caps: &vk::SurfaceCapabilitiesKHR) -> vk::SurfaceTransformFlagsKHR {
    if caps
        .supported_transforms
        .contains(vk::SurfaceTransformFlagsKHR::IDENTITY)
    {
        vk::SurfaceTransformFlagsKHR::IDENTITY
    } else {
        caps.current_transform
    }
}

pub fn swapchain_desc(
    surface: vk::SurfaceKHR,
    support: &SurfaceSupport,
    extent: vk::Extent2D,
    desired_images: u32,
) -> Result<SwapchainDesc> {
    Ok(SwapchainDesc {
        surface,
        min_image_count: choose_image_count(desired_images, &support.capabilities),
        format: choose_surface_format(&support.formats),
        extent,
        pre_transform: choose_transform(&support.capabilities),
        present_mode: choose_present_mode(&support.present_modes)?,
    })
}

pub fn image_view_desc(image: vk::Image, format: vk::Format) -> ImageViewDesc {
    ImageViewDesc {
        image,
        format,
        components: vk::ComponentMapping {
            r: vk::ComponentSwizzle::IDENTITY,
            g: vk::ComponentSwizzle::IDENTITY,
            b: vk::ComponentSwizzle::IDENTITY,
            a: vk::ComponentSwizzle::IDENTITY,
        },
        subresource_range: vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        },
    }
}

/// The swapchain with its images and one view per image
#[derive(Debug, Clone)]
pub struct Swapchain {
    pub handle: vk::SwapchainKHR,
    pub format: vk::Format,
    pub extent: vk::Extent2D,
    pub images: Vec<vk::Image>,
    pub image_views: Vec<vk::ImageView>,
}

impl Swapchain {
    pub fn new<D: Driver>(
        driver: &mut D,
        ledger: &mut Ledger,
        desc: &SwapchainDesc,
    ) -> Result<Self> {
        log::info!(
            "Creating swapchain: {}x{}, {} images requested, {:?}, {:?}",
            desc.extent.width,
            desc.extent.height,
            desc.min_image_count,
            desc.format.format,
            desc.present_mode
        );

        let handle = check(
            driver.create_swapchain(desc),
            Op::Create(ObjectKind::Swapchain),
        )?;
        ledger.record(GpuObject::Swapchain(handle));

        let images = check(
            driver.swapchain_images(handle),
            Op::Enumerate("swapchain images"),
        )?;
        if images.is_empty() {
            log::error!("{}", RenderError::NoSwapchainImages);
            return Err(RenderError::NoSwapchainImages);
        }
        log::info!("Created swapchain with {} images", images.len());

        let mut image_views = Vec::with_capacity(images.len());
        for &image in &images {
            let view = check(
                driver.create_image_view(&image_view_desc(image, desc.format.format)),
                Op::Create(ObjectKind::ImageView),
            )?;
            ledger.record(GpuObject::ImageView(view));
            image_views.push(view);
        }

        Ok(Self {
            handle,
            format: desc.format.format,
            extent: desc.extent,
            images,
            image_views,
        })
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

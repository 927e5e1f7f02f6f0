/// Physical device selection
///
/// Candidate devices are scored and the best one wins: discrete beats
/// integrated beats virtual, and a device missing anything the renderer
/// needs scores zero. The scoring policy is a pure function so it is
/// testable without a GPU.

use ash::khr;
use ash::vk;
use std::ffi::CStr;

use ember_2d_engine::ember2d::{Error, Result};
use ember_2d_engine::{engine_debug, engine_error};

/// Queue families the renderer needs on its device
#[derive(Debug, Clone, Copy, Default)]
pub struct QueueFamilyIndices {
    pub graphics_family: Option<u32>,
    pub present_family: Option<u32>,
}

impl QueueFamilyIndices {
    pub fn is_complete(&self) -> bool {
        self.graphics_family.is_some() && self.present_family.is_some()
    }
}

/// What the surface supports on a particular device
pub struct SwapChainSupportDetails {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

/// Find the graphics and present queue families of a device
pub fn find_queue_families(
    instance: &ash::Instance,
    surface_loader: &khr::surface::Instance,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
) -> QueueFamilyIndices {
    let mut indices = QueueFamilyIndices::default();

    let queue_families = unsafe { instance.get_physical_device_queue_family_properties(device) };

    for (i, family) in queue_families.iter().enumerate() {
        let i = i as u32;

        if family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
            indices.graphics_family = Some(i);
        }

        let present_support = unsafe {
            surface_loader
                .get_physical_device_surface_support(device, i, surface)
                .unwrap_or(false)
        };
        if present_support {
            indices.present_family = Some(i);
        }

        if indices.is_complete() {
            break;
        }
    }

    indices
}

/// Query the surface capabilities, formats, and present modes of a device
pub fn query_swapchain_support(
    surface_loader: &khr::surface::Instance,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
) -> Result<SwapChainSupportDetails> {
    unsafe {
        let capabilities = surface_loader
            .get_physical_device_surface_capabilities(device, surface)
            .map_err(|e| {
                engine_error!(
                    "ember2d::vulkan",
                    "Failed to query surface capabilities: {:?}",
                    e
                );
                Error::InitializationFailed(format!(
                    "failed to query surface capabilities: {:?}",
                    e
                ))
            })?;

        let formats = surface_loader
            .get_physical_device_surface_formats(device, surface)
            .map_err(|e| {
                engine_error!("ember2d::vulkan", "Failed to query surface formats: {:?}", e);
                Error::InitializationFailed(format!("failed to query surface formats: {:?}", e))
            })?;

        let present_modes = surface_loader
            .get_physical_device_surface_present_modes(device, surface)
            .map_err(|e| {
                engine_error!(
                    "ember2d::vulkan",
                    "Failed to query surface present modes: {:?}",
                    e
                );
                Error::InitializationFailed(format!(
                    "failed to query surface present modes: {:?}",
                    e
                ))
            })?;

        Ok(SwapChainSupportDetails {
            capabilities,
            formats,
            present_modes,
        })
    }
}

fn supports_required_extensions(instance: &ash::Instance, device: vk::PhysicalDevice) -> bool {
    let available = match unsafe { instance.enumerate_device_extension_properties(device) } {
        Ok(extensions) => extensions,
        Err(_) => return false,
    };

    available.iter().any(|ext| {
        let name = unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) };
        name == khr::swapchain::NAME
    })
}

/// Score a device from the facts that matter to the renderer
///
/// Zero means unusable. Among usable devices a discrete GPU beats an
/// integrated one, which beats a virtual one.
pub fn score_device(
    device_type: vk::PhysicalDeviceType,
    queues_complete: bool,
    extensions_supported: bool,
    swapchain_adequate: bool,
    sampler_anisotropy: bool,
) -> u32 {
    if !queues_complete || !extensions_supported || !swapchain_adequate || !sampler_anisotropy {
        return 0;
    }

    let mut score = 1;

    if device_type == vk::PhysicalDeviceType::DISCRETE_GPU {
        score += 1000;
    }
    if device_type == vk::PhysicalDeviceType::INTEGRATED_GPU {
        score += 100;
    }
    if device_type == vk::PhysicalDeviceType::VIRTUAL_GPU {
        score += 10;
    }

    score
}

fn rate_device_suitability(
    instance: &ash::Instance,
    surface_loader: &khr::surface::Instance,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
) -> u32 {
    let (properties, features) = unsafe {
        (
            instance.get_physical_device_properties(device),
            instance.get_physical_device_features(device),
        )
    };

    let queues_complete =
        find_queue_families(instance, surface_loader, device, surface).is_complete();
    let extensions_supported = supports_required_extensions(instance, device);
    // Only meaningful to ask once the swapchain extension is present
    let swapchain_adequate = extensions_supported
        && query_swapchain_support(surface_loader, device, surface)
            .map(|support| !support.formats.is_empty() && !support.present_modes.is_empty())
            .unwrap_or(false);

    score_device(
        properties.device_type,
        queues_complete,
        extensions_supported,
        swapchain_adequate,
        features.sampler_anisotropy == vk::TRUE,
    )
}

/// Pick the highest scoring physical device for the surface
pub fn pick_physical_device(
    instance: &ash::Instance,
    surface_loader: &khr::surface::Instance,
    surface: vk::SurfaceKHR,
) -> Result<vk::PhysicalDevice> {
    let devices = unsafe { instance.enumerate_physical_devices() }.map_err(|e| {
        engine_error!(
            "ember2d::vulkan",
            "Failed to enumerate physical devices: {:?}",
            e
        );
        Error::InitializationFailed(format!("failed to find GPUs with Vulkan support: {:?}", e))
    })?;

    if devices.is_empty() {
        engine_error!("ember2d::vulkan", "No Vulkan-capable GPU found");
        return Err(Error::InitializationFailed(
            "failed to find GPUs with Vulkan support".to_string(),
        ));
    }

    let best = devices
        .into_iter()
        .map(|device| {
            (
                rate_device_suitability(instance, surface_loader, device, surface),
                device,
            )
        })
        .filter(|&(score, _)| score > 0)
        .max_by_key(|&(score, _)| score);

    match best {
        Some((score, device)) => {
            engine_debug!(
                "ember2d::vulkan",
                "Selected physical device with score {}",
                score
            );
            Ok(device)
        }
        None => {
            engine_error!("ember2d::vulkan", "No suitable GPU found");
            Err(Error::InitializationFailed(
                "failed to find a suitable gpu".to_string(),
            ))
        }
    }
}

#[cfg(test)]
#[path = "vulkan_device_tests.rs"]
mod tests;

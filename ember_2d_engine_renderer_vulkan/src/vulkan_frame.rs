/// FrameSync - per-frame synchronization primitives for the present cycle
///
/// Semaphores and fences are indexed by frame slot (0..MAX_FRAMES_IN_FLIGHT);
/// the images-in-flight table is indexed by swapchain image index and tracks
/// which frame slot fence last submitted work targeting that image.

use ash::vk;

use ember_2d_engine::ember2d::{Error, Result};
use ember_2d_engine::engine_error;

/// Number of frames the CPU may record ahead of the GPU
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

/// Advance a frame slot index round-robin
pub fn next_frame_slot(current: usize) -> usize {
    (current + 1) % MAX_FRAMES_IN_FLIGHT
}

/// Synchronization objects for the frame loop
pub struct FrameSync {
    /// Signaled when the acquired swapchain image is ready to be rendered to
    pub image_available: Vec<vk::Semaphore>,
    /// Signaled when rendering to the image has finished, waited by present
    pub render_finished: Vec<vk::Semaphore>,
    /// Signaled when the frame slot's submission has completed on the GPU
    ///
    /// Created signaled so the first wait on each slot passes immediately.
    pub in_flight: Vec<vk::Fence>,
    /// Per swapchain image: the in-flight fence of the last submission
    /// targeting it, or null if the image has never been rendered to
    pub images_in_flight: Vec<vk::Fence>,
}

impl FrameSync {
    /// Create the full set of synchronization objects
    ///
    /// # Arguments
    ///
    /// * `image_count` - Number of swapchain images
    pub fn new(device: &ash::Device, image_count: usize) -> Result<Self> {
        unsafe {
            let semaphore_create_info = vk::SemaphoreCreateInfo::default();
            let fence_create_info = vk::FenceCreateInfo::default()
                .flags(vk::FenceCreateFlags::SIGNALED);

            let mut image_available = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
            let mut render_finished = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
            let mut in_flight = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);

            for _ in 0..MAX_FRAMES_IN_FLIGHT {
                image_available.push(
                    device.create_semaphore(&semaphore_create_info, None)
                        .map_err(|e| {
                            engine_error!("ember2d::vulkan", "Failed to create image-available semaphore: {:?}", e);
                            Error::InitializationFailed(format!("Failed to create synchronization objects for a frame: {:?}", e))
                        })?
                );
                render_finished.push(
                    device.create_semaphore(&semaphore_create_info, None)
                        .map_err(|e| {
                            engine_error!("ember2d::vulkan", "Failed to create render-finished semaphore: {:?}", e);
                            Error::InitializationFailed(format!("Failed to create synchronization objects for a frame: {:?}", e))
                        })?
                );
                in_flight.push(
                    device.create_fence(&fence_create_info, None)
                        .map_err(|e| {
                            engine_error!("ember2d::vulkan", "Failed to create in-flight fence: {:?}", e);
                            Error::InitializationFailed(format!("Failed to create synchronization objects for a frame: {:?}", e))
                        })?
                );
            }

            Ok(Self {
                image_available,
                render_finished,
                in_flight,
                images_in_flight: vec![vk::Fence::null(); image_count],
            })
        }
    }

    /// Reset the images-in-flight table for a recreated swapchain
    ///
    /// The old entries reference fences of submissions that targeted images
    /// which no longer exist; the table restarts empty at the new count.
    pub fn resize_images_in_flight(&mut self, image_count: usize) {
        self.images_in_flight.clear();
        self.images_in_flight.resize(image_count, vk::Fence::null());
    }

    /// Destroy all owned semaphores and fences
    ///
    /// The caller must ensure the device is idle first.
    pub fn destroy(&mut self, device: &ash::Device) {
        unsafe {
            for &semaphore in &self.image_available {
                device.destroy_semaphore(semaphore, None);
            }
            for &semaphore in &self.render_finished {
                device.destroy_semaphore(semaphore, None);
            }
            for &fence in &self.in_flight {
                device.destroy_fence(fence, None);
            }
        }
        self.image_available.clear();
        self.render_finished.clear();
        self.in_flight.clear();
        self.images_in_flight.clear();
    }
}

#[cfg(test)]
#[path = "vulkan_frame_tests.rs"]
mod tests;

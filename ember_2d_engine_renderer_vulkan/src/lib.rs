/*!
# Ember 2D Engine - Vulkan Graphics Backend

Vulkan implementation of the Ember 2D graphics backend.

This crate provides a Vulkan backend that implements the ember_2d_engine
Graphics trait using the Ash library for Vulkan bindings and gpu-allocator
for memory management.

Registering the backend installs a "vulkan" factory in the engine's
plugin registry, from which a window plus shader stages produce a
ready `Graphics` handle.
*/

// Backend hub and GPU resources
mod vulkan;
mod vulkan_buffer;
mod vulkan_shader;
mod vulkan_texture;

// Device bring-up and per-frame machinery
mod vulkan_batch;
mod vulkan_context;
mod vulkan_descriptor;
mod vulkan_device;
mod vulkan_format;
mod vulkan_frame;
mod vulkan_pipeline;

mod debug;

pub use vulkan::VulkanGraphics;

pub use debug::{get_validation_stats, print_validation_stats_report};

/// Install the "vulkan" factory in the engine's plugin registry
///
/// # Example
///
/// ```no_run
/// // Register at startup, before the engine creates its graphics backend
/// ember_2d_engine_renderer_vulkan::register();
/// ```
pub fn register() {
    use ember_2d_engine::ember2d::graphics::{register_graphics_plugin, Graphics};
    use std::sync::{Arc, Mutex};

    register_graphics_plugin("vulkan", |window: &winit::window::Window, default_shader, config| {
        let graphics = VulkanGraphics::new(window, default_shader, config)?;
        Ok(Arc::new(Mutex::new(graphics)) as Arc<Mutex<dyn Graphics>>)
    });
}

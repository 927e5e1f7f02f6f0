/// Descriptor set machinery for the shared shader interface
///
/// Every pipeline uses the same descriptor set layout: binding 0 holds the
/// builtin uniform block, binding 1 the color texture sampler. Sets are
/// allocated once per distinct texture/uniform pairing (one set per frame
/// slot) and reused through a linear-scan cache, like the pipeline cache.

use ash::vk;
use ash::vk::Handle;
use glam::{Mat3, Mat4, Vec4};
use std::sync::Arc;

use ember_2d_engine::ember2d::graphics::{
    gamma_correct_color, BufferUsage, BuiltinUniformData, StreamBuffer,
};
use ember_2d_engine::ember2d::{Error, Result};
use ember_2d_engine::engine_error;

use crate::vulkan_buffer::VulkanStreamBuffer;
use crate::vulkan_context::GpuContext;
use crate::vulkan_frame::MAX_FRAMES_IN_FLIGHT;

/// Distinct texture/uniform configurations the pool can hold at once
const MAX_DESCRIPTOR_CONFIGURATIONS: u32 = 128;

// ============================================================================
// Layout and pool
// ============================================================================

/// Create the descriptor set layout every pipeline shares
///
/// Binding 0 is the builtin uniform block (vertex and fragment stages),
/// binding 1 the color texture sampler (fragment stage).
pub fn create_descriptor_set_layout(device: &ash::Device) -> Result<vk::DescriptorSetLayout> {
    let bindings = [
        vk::DescriptorSetLayoutBinding::default()
            .binding(0)
            .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
            .descriptor_count(1)
            .stage_flags(vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT),
        vk::DescriptorSetLayoutBinding::default()
            .binding(1)
            .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .descriptor_count(1)
            .stage_flags(vk::ShaderStageFlags::FRAGMENT),
    ];

    let layout_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);

    unsafe { device.create_descriptor_set_layout(&layout_info, None) }.map_err(|e| {
        engine_error!(
            "ember2d::vulkan",
            "Failed to create descriptor set layout: {:?}",
            e
        );
        Error::InitializationFailed(format!("failed to create descriptor set layout: {:?}", e))
    })
}

/// Create the descriptor pool backing the set cache
///
/// Each configuration consumes one set per frame slot, and each set one
/// uniform buffer plus one combined image sampler descriptor.
pub fn create_descriptor_pool(device: &ash::Device) -> Result<vk::DescriptorPool> {
    let set_count = MAX_DESCRIPTOR_CONFIGURATIONS * MAX_FRAMES_IN_FLIGHT as u32;

    let pool_sizes = [
        vk::DescriptorPoolSize::default()
            .ty(vk::DescriptorType::UNIFORM_BUFFER)
            .descriptor_count(set_count),
        vk::DescriptorPoolSize::default()
            .ty(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .descriptor_count(set_count),
    ];

    let pool_info = vk::DescriptorPoolCreateInfo::default()
        .pool_sizes(&pool_sizes)
        .max_sets(set_count);

    unsafe { device.create_descriptor_pool(&pool_info, None) }.map_err(|e| {
        engine_error!("ember2d::vulkan", "Failed to create descriptor pool: {:?}", e);
        Error::InitializationFailed(format!("failed to create descriptor pool: {:?}", e))
    })
}

// ============================================================================
// Set allocation and writes
// ============================================================================

/// Allocate one descriptor set per frame slot
pub fn allocate_descriptor_sets(
    device: &ash::Device,
    pool: vk::DescriptorPool,
    layout: vk::DescriptorSetLayout,
) -> Result<Vec<vk::DescriptorSet>> {
    let layouts = vec![layout; MAX_FRAMES_IN_FLIGHT];
    let alloc_info = vk::DescriptorSetAllocateInfo::default()
        .descriptor_pool(pool)
        .set_layouts(&layouts);

    unsafe { device.allocate_descriptor_sets(&alloc_info) }.map_err(|e| {
        engine_error!("ember2d::vulkan", "Failed to allocate descriptor sets: {:?}", e);
        classify_descriptor_allocation_error(e)
    })
}

/// Map a descriptor set allocation failure to an engine error
///
/// Host and device memory exhaustion are true out-of-memory conditions.
/// Pool fragmentation and exhaustion mean the fixed-size pool ran out of
/// room for new configurations.
fn classify_descriptor_allocation_error(result: vk::Result) -> Error {
    match result {
        vk::Result::ERROR_OUT_OF_HOST_MEMORY | vk::Result::ERROR_OUT_OF_DEVICE_MEMORY => {
            Error::OutOfMemory
        }
        vk::Result::ERROR_FRAGMENTED_POOL => {
            Error::BackendError("failed to allocate descriptor sets: fragmented pool".to_string())
        }
        vk::Result::ERROR_OUT_OF_POOL_MEMORY => Error::BackendError(
            "failed to allocate descriptor sets: out of pool memory".to_string(),
        ),
        other => Error::BackendError(format!("failed to allocate descriptor sets: {:?}", other)),
    }
}

/// Point freshly allocated sets at a configuration's buffer and texture
pub fn write_descriptor_sets(
    device: &ash::Device,
    sets: &[vk::DescriptorSet],
    config: &DescriptorSetConfiguration,
) {
    for &set in sets {
        let buffer_info = [vk::DescriptorBufferInfo::default()
            .buffer(config.uniform_buffer)
            .offset(0)
            .range(std::mem::size_of::<BuiltinUniformData>() as u64)];

        let image_info = [vk::DescriptorImageInfo::default()
            .image_layout(vk::ImageLayout::GENERAL)
            .image_view(config.image_view)
            .sampler(config.sampler)];

        let writes = [
            vk::WriteDescriptorSet::default()
                .dst_set(set)
                .dst_binding(0)
                .dst_array_element(0)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                .buffer_info(&buffer_info),
            vk::WriteDescriptorSet::default()
                .dst_set(set)
                .dst_binding(1)
                .dst_array_element(0)
                .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .image_info(&image_info),
        ];

        unsafe { device.update_descriptor_sets(&writes, &[]) };
    }
}

// ============================================================================
// Descriptor set cache
// ============================================================================

/// The texture and uniform buffer a descriptor set was written for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorSetConfiguration {
    pub image_view: vk::ImageView,
    pub sampler: vk::Sampler,
    pub uniform_buffer: vk::Buffer,
}

/// Cache of allocated descriptor sets, one per frame slot per configuration
///
/// Linear scan, O(n) over cached configurations; 2D scenes touch few
/// distinct texture/uniform pairings per frame.
pub struct DescriptorSetCache {
    entries: Vec<(DescriptorSetConfiguration, Vec<vk::DescriptorSet>)>,
}

impl DescriptorSetCache {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Look up the set written for a configuration in the given frame slot
    pub fn find(
        &self,
        config: &DescriptorSetConfiguration,
        frame: usize,
    ) -> Option<vk::DescriptorSet> {
        self.entries
            .iter()
            .find(|(entry_config, _)| entry_config == config)
            .map(|(_, sets)| sets[frame])
    }

    pub fn insert(&mut self, config: DescriptorSetConfiguration, sets: Vec<vk::DescriptorSet>) {
        self.entries.push((config, sets));
    }

    /// Forget every cached set
    ///
    /// Sets are owned by the descriptor pool; destroying the pool reclaims
    /// them, so clearing the cache frees nothing by itself.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of cached configurations
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

// ============================================================================
// Uniform buffer cache
// ============================================================================

/// Cache of single-block uniform buffers keyed by their contents
///
/// The builtin uniform block changes rarely within a frame, so draws that
/// snapshot identical data reuse the buffer already holding it. Linear
/// scan by value equality.
pub struct UniformBufferCache {
    entries: Vec<(BuiltinUniformData, VulkanStreamBuffer)>,
}

impl UniformBufferCache {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Return a device buffer holding exactly `data`, uploading on miss
    pub fn buffer_for(
        &mut self,
        ctx: &Arc<GpuContext>,
        data: &BuiltinUniformData,
    ) -> Result<vk::Buffer> {
        if let Some((_, buffer)) = self.entries.iter().find(|(entry, _)| entry == data) {
            return Ok(vk::Buffer::from_raw(buffer.native_handle()));
        }

        let size = std::mem::size_of::<BuiltinUniformData>();
        let mut buffer = VulkanStreamBuffer::new(Arc::clone(ctx), BufferUsage::Uniform, size)?;
        buffer.map(size)?[..size].copy_from_slice(data.as_bytes());
        buffer.unmap(size);

        let handle = vk::Buffer::from_raw(buffer.native_handle());
        self.entries.push((*data, buffer));
        Ok(handle)
    }

    /// Drop every cached buffer
    ///
    /// The caller must ensure the device is idle first.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

// ============================================================================
// Builtin uniform snapshot
// ============================================================================

/// Capture the builtin uniform block for the current draw state
///
/// The normal matrix is the transposed inverse of the transform's upper
/// 3x3, packed as three rows whose spare w lanes carry the DPI scale and
/// point size. The draw color is linearized here because the swapchain
/// target is sRGB.
pub fn builtin_uniform_snapshot(
    transform: Mat4,
    projection: Mat4,
    extent: vk::Extent2D,
    dpi_scale: f32,
    point_size: f32,
    draw_color: Vec4,
) -> BuiltinUniformData {
    let normal = Mat3::from_mat4(transform).inverse().transpose();
    let mut normal_matrix = [
        normal.col(0).extend(0.0),
        normal.col(1).extend(0.0),
        normal.col(2).extend(0.0),
    ];
    normal_matrix[0].w = dpi_scale;
    normal_matrix[1].w = point_size;

    BuiltinUniformData {
        transform,
        projection,
        normal_matrix,
        screen_size_params: Vec4::new(extent.width as f32, extent.height as f32, 1.0, 0.0),
        constant_color: gamma_correct_color(draw_color),
    }
}

#[cfg(test)]
#[path = "vulkan_descriptor_tests.rs"]
mod tests;

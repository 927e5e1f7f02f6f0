/// VulkanBuffer / VulkanStreamBuffer - Vulkan implementations of the
/// core buffer traits
///
/// Both live in CpuToGpu memory and stay persistently mapped. The stream
/// buffer adds the per-frame write cursor the batched draw path rotates
/// with `next_frame`.

use ash::vk;
use ash::vk::Handle;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use gpu_allocator::MemoryLocation;
use std::sync::Arc;

use ember_2d_engine::ember2d::{Error, Result};
use ember_2d_engine::ember2d::graphics::{Buffer, BufferDesc, BufferUsage, StreamBuffer};
use ember_2d_engine::{engine_bail, engine_err, engine_error};

use crate::vulkan_context::GpuContext;

fn buffer_usage_to_vk(usage: BufferUsage) -> vk::BufferUsageFlags {
    match usage {
        BufferUsage::Vertex => vk::BufferUsageFlags::VERTEX_BUFFER,
        BufferUsage::Index => vk::BufferUsageFlags::INDEX_BUFFER,
        BufferUsage::Uniform => vk::BufferUsageFlags::UNIFORM_BUFFER,
        BufferUsage::Storage => vk::BufferUsageFlags::STORAGE_BUFFER,
    }
}

/// Create a buffer with a persistently mapped CpuToGpu allocation
fn create_mapped_buffer(
    ctx: &GpuContext,
    size: u64,
    usage: BufferUsage,
    name: &str,
) -> Result<(vk::Buffer, Allocation)> {
    unsafe {
        let buffer_create_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(buffer_usage_to_vk(usage) | vk::BufferUsageFlags::TRANSFER_DST)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = ctx.device.create_buffer(&buffer_create_info, None)
            .map_err(|e| engine_err!("ember2d::vulkan", "Failed to create buffer of size {} bytes: {:?}", size, e))?;

        let requirements = ctx.device.get_buffer_memory_requirements(buffer);

        let allocation = ctx.allocator.lock().unwrap().allocate(&AllocationCreateDesc {
            name,
            requirements,
            location: MemoryLocation::CpuToGpu,
            linear: true,
            allocation_scheme: AllocationScheme::GpuAllocatorManaged,
        })
        .map_err(|_e| {
            let size_mb = requirements.size as f64 / (1024.0 * 1024.0);
            engine_error!("ember2d::vulkan", "Out of GPU memory for buffer (required: {:.2} MB)", size_mb);
            ctx.device.destroy_buffer(buffer, None);
            Error::OutOfMemory
        })?;

        if let Err(e) = ctx.device.bind_buffer_memory(buffer, allocation.memory(), allocation.offset()) {
            ctx.allocator.lock().unwrap().free(allocation).ok();
            ctx.device.destroy_buffer(buffer, None);
            return Err(engine_err!("ember2d::vulkan", "Failed to bind buffer memory: {:?}", e));
        }

        Ok((buffer, allocation))
    }
}

// ============================================================================
// VulkanBuffer
// ============================================================================

/// General-purpose buffer in persistently mapped memory
pub struct VulkanBuffer {
    /// Shared GPU context (device, allocator, queue, upload pool)
    ctx: Arc<GpuContext>,
    /// Buffer handle
    buffer: vk::Buffer,
    /// Backing allocation, taken out in Drop
    allocation: Option<Allocation>,
    /// Size in bytes from the descriptor
    size: u64,
    usage: BufferUsage,
}

impl VulkanBuffer {
    /// Create a new Vulkan buffer per the descriptor
    pub fn new(ctx: Arc<GpuContext>, desc: BufferDesc) -> Result<Self> {
        let (buffer, allocation) = create_mapped_buffer(&ctx, desc.size, desc.usage, "buffer")?;

        Ok(Self {
            ctx,
            buffer,
            allocation: Some(allocation),
            size: desc.size,
            usage: desc.usage,
        })
    }
}

impl Buffer for VulkanBuffer {
    fn size(&self) -> u64 {
        self.size
    }

    fn usage(&self) -> BufferUsage {
        self.usage
    }

    fn update(&self, offset: u64, data: &[u8]) -> Result<()> {
        unsafe {
            if offset + data.len() as u64 > self.size {
                engine_bail!(
                    "ember2d::vulkan",
                    "Buffer update out of bounds: offset {} + {} bytes exceeds size {}",
                    offset,
                    data.len(),
                    self.size
                );
            }

            if let Some(allocation) = &self.allocation {
                let mapped_ptr = allocation
                    .mapped_ptr()
                    .ok_or_else(|| Error::BackendError("Buffer memory is not host-visible".to_string()))?
                    .as_ptr() as *mut u8;

                std::ptr::copy_nonoverlapping(
                    data.as_ptr(),
                    mapped_ptr.offset(offset as isize),
                    data.len(),
                );

                Ok(())
            } else {
                engine_error!("ember2d::vulkan", "Buffer update failed: no GPU allocation");
                Err(Error::BackendError("Buffer allocation already freed".to_string()))
            }
        }
    }

    fn mapped_ptr(&self) -> Option<*mut u8> {
        self.allocation
            .as_ref()
            .and_then(|a| a.mapped_ptr())
            .map(|p| p.as_ptr() as *mut u8)
    }

    fn native_handle(&self) -> u64 {
        self.buffer.as_raw()
    }
}

impl Drop for VulkanBuffer {
    fn drop(&mut self) {
        unsafe {
            // Hand the backing memory back to the allocator
            if let Some(allocation) = self.allocation.take() {
                if let Ok(mut allocator) = self.ctx.allocator.lock() {
                    allocator.free(allocation).ok();
                }
            }

            self.ctx.device.destroy_buffer(self.buffer, None);
        }
    }
}

// ============================================================================
// VulkanStreamBuffer
// ============================================================================

/// Persistently mapped streaming buffer with a per-frame write cursor
///
/// The frame loop calls `next_frame()` when the buffer's frame slot comes
/// around again; the in-flight fence guarantees the GPU finished reading
/// the previous contents by then, so the cursor simply resets.
pub struct VulkanStreamBuffer {
    ctx: Arc<GpuContext>,
    buffer: vk::Buffer,
    allocation: Option<Allocation>,
    size: usize,
    usage: BufferUsage,
    /// Bytes written this frame; doubles as the next map offset
    used: usize,
}

impl VulkanStreamBuffer {
    /// Create a streaming buffer of `size` bytes bound as `usage`
    pub fn new(ctx: Arc<GpuContext>, usage: BufferUsage, size: usize) -> Result<Self> {
        let (buffer, allocation) = create_mapped_buffer(&ctx, size as u64, usage, "stream buffer")?;

        if allocation.mapped_ptr().is_none() {
            // CpuToGpu should always be host-visible; treat anything else as fatal
            unsafe {
                ctx.allocator.lock().unwrap().free(allocation).ok();
                ctx.device.destroy_buffer(buffer, None);
            }
            engine_bail!("ember2d::vulkan", "Stream buffer allocation is not CPU-mappable");
        }

        Ok(Self {
            ctx,
            buffer,
            allocation: Some(allocation),
            size,
            usage,
            used: 0,
        })
    }

    fn mapped_base(&self) -> *mut u8 {
        // Checked non-null at creation
        self.allocation
            .as_ref()
            .and_then(|a| a.mapped_ptr())
            .map(|p| p.as_ptr() as *mut u8)
            .unwrap_or(std::ptr::null_mut())
    }
}

impl StreamBuffer for VulkanStreamBuffer {
    fn map(&mut self, min_size: usize) -> Result<&mut [u8]> {
        if self.used + min_size > self.size {
            engine_bail!(
                "ember2d::vulkan",
                "Stream buffer overflow: {} bytes requested, {} available",
                min_size,
                self.size - self.used
            );
        }

        unsafe {
            let base = self.mapped_base();
            Ok(std::slice::from_raw_parts_mut(
                base.add(self.used),
                self.size - self.used,
            ))
        }
    }

    fn unmap(&mut self, used_size: usize) -> usize {
        let offset = self.used;
        self.used += used_size;
        offset
    }

    fn mark_used(&mut self, size: usize) {
        self.used += size;
    }

    fn next_frame(&mut self) {
        self.used = 0;
    }

    fn usable_size(&self) -> usize {
        self.size - self.used
    }

    fn size(&self) -> usize {
        self.size
    }

    fn usage(&self) -> BufferUsage {
        self.usage
    }

    fn native_handle(&self) -> u64 {
        self.buffer.as_raw()
    }
}

impl Drop for VulkanStreamBuffer {
    fn drop(&mut self) {
        unsafe {
            if let Some(allocation) = self.allocation.take() {
                if let Ok(mut allocator) = self.ctx.allocator.lock() {
                    allocator.free(allocation).ok();
                }
            }

            self.ctx.device.destroy_buffer(self.buffer, None);
        }
    }
}

//! Texture trait, pixel formats, and format usage flags

use bitflags::bitflags;

/// Pixel formats for textures
///
/// The set mirrors what 2D content pipelines produce. Backends translate
/// these to native formats; entries a backend does not translate yet are
/// reported as unsupported with a descriptive error rather than mapped to
/// a best-effort substitute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum PixelFormat {
    UNKNOWN,

    // Chooses a sized format below based on what the backend renders best
    NORMAL,
    HDR,

    // Single channel
    R8_UNORM,
    R8_INT,
    R8_UINT,
    R16_UNORM,
    R16_FLOAT,
    R16_INT,
    R16_UINT,
    R32_FLOAT,
    R32_INT,
    R32_UINT,

    // Two channels
    RG8_UNORM,
    RG8_INT,
    RG8_UINT,
    LA8_UNORM,
    RG16_UNORM,
    RG16_FLOAT,
    RG16_INT,
    RG16_UINT,
    RG32_FLOAT,
    RG32_INT,
    RG32_UINT,

    // Four channels
    RGBA8_UNORM,
    RGBA8_UNORM_sRGB,
    BGRA8_UNORM,
    BGRA8_UNORM_sRGB,
    RGBA8_INT,
    RGBA8_UINT,
    RGBA16_UNORM,
    RGBA16_FLOAT,
    RGBA16_INT,
    RGBA16_UINT,
    RGBA32_FLOAT,
    RGBA32_INT,
    RGBA32_UINT,

    // Packed
    RGBA4_UNORM,
    RGB5A1_UNORM,
    RGB565_UNORM,
    RGB10A2_UNORM,
    RG11B10_FLOAT,

    // Depth/stencil
    STENCIL8,
    DEPTH16_UNORM,
    DEPTH24_UNORM,
    DEPTH32_FLOAT,
    DEPTH24_UNORM_STENCIL8,
    DEPTH32_FLOAT_STENCIL8,

    // Compressed (DXT / BC)
    DXT1_UNORM,
    DXT3_UNORM,
    DXT5_UNORM,
    BC4_UNORM,
    BC4_SNORM,
    BC5_UNORM,
    BC5_SNORM,
    BC6H_UFLOAT,
    BC6H_FLOAT,
    BC7_UNORM,

    // Compressed (mobile)
    PVR1_RGB2_UNORM,
    PVR1_RGB4_UNORM,
    PVR1_RGBA2_UNORM,
    PVR1_RGBA4_UNORM,
    ETC1_UNORM,
    ETC2_RGB_UNORM,
    ETC2_RGBA_UNORM,
    ETC2_RGBA1_UNORM,
    EAC_R_UNORM,
    EAC_R_SNORM,
    EAC_RG_UNORM,
    EAC_RG_SNORM,
    ASTC_4X4,
    ASTC_5X4,
    ASTC_5X5,
    ASTC_6X5,
    ASTC_6X6,
    ASTC_8X5,
    ASTC_8X6,
    ASTC_8X8,
    ASTC_10X5,
    ASTC_10X6,
    ASTC_10X8,
    ASTC_10X10,
    ASTC_12X10,
    ASTC_12X12,
}

bitflags! {
    /// How a pixel format is going to be used
    ///
    /// Passed to `Graphics::supports_pixel_format` to check whether the
    /// device supports a format for the requested operations.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PixelFormatUsage: u32 {
        /// Sampled in a shader
        const SAMPLE = 1 << 0;
        /// Sampled with linear filtering
        const LINEAR = 1 << 1;
        /// Used as a render target attachment
        const RENDER_TARGET = 1 << 2;
        /// Blended into as a render target
        const BLEND = 1 << 3;
        /// Multisampled render target
        const MSAA = 1 << 4;
        /// Written from a compute shader
        const COMPUTE_WRITE = 1 << 5;
    }
}

/// Texture resource trait
///
/// Implemented by backend-specific texture types (e.g., VulkanTexture).
/// The texture is automatically destroyed when dropped.
pub trait Texture: Send + Sync {
    /// Width in pixels
    fn width(&self) -> u32;

    /// Height in pixels
    fn height(&self) -> u32;

    /// Pixel format
    fn format(&self) -> PixelFormat;

    /// Backend image view handle as an opaque integer
    ///
    /// For the Vulkan backend this is the raw `VkImageView`, letting the
    /// backend build descriptor writes for textures it did not create
    /// itself without downcasting.
    fn native_view_handle(&self) -> u64;

    /// Backend sampler handle as an opaque integer (raw `VkSampler` for Vulkan)
    fn native_sampler_handle(&self) -> u64;
}

#[cfg(test)]
#[path = "texture_tests.rs"]
mod tests;

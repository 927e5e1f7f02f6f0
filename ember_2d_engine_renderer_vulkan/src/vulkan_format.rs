/// Format translation tables between the engine data model and Vulkan
///
/// Pure functions so the draw and texture paths share one table and the
/// tables are testable without a device. Entries the backend does not
/// implement yet return a descriptive `UnsupportedFormat` instead of
/// mapping to a best-effort substitute.

use ash::vk;
use ember_2d_engine::ember2d::{Error, Result};
use ember_2d_engine::ember2d::graphics::{DataFormat, IndexType, PixelFormat};

/// A pixel format translated to Vulkan: the image format plus the
/// component swizzle the image view needs to present the engine's
/// channel order.
#[derive(Debug, Clone, Copy)]
pub struct TextureFormatMapping {
    pub format: vk::Format,
    pub swizzle: vk::ComponentMapping,
}

impl TextureFormatMapping {
    fn new(format: vk::Format) -> Self {
        Self {
            format,
            // Default() is IDENTITY on all four components
            swizzle: vk::ComponentMapping::default(),
        }
    }

    fn with_swizzle(format: vk::Format, swizzle: vk::ComponentMapping) -> Self {
        Self { format, swizzle }
    }
}

/// Convert a vertex attribute data format to a Vulkan format
///
/// Matrix and bool attributes are not implemented as vertex inputs.
pub fn vertex_format_to_vk(format: DataFormat) -> Result<vk::Format> {
    match format {
        DataFormat::FLOAT => Ok(vk::Format::R32_SFLOAT),
        DataFormat::FLOAT_VEC2 => Ok(vk::Format::R32G32_SFLOAT),
        DataFormat::FLOAT_VEC3 => Ok(vk::Format::R32G32B32_SFLOAT),
        DataFormat::FLOAT_VEC4 => Ok(vk::Format::R32G32B32A32_SFLOAT),

        DataFormat::FLOAT_MAT2X2
        | DataFormat::FLOAT_MAT2X3
        | DataFormat::FLOAT_MAT2X4
        | DataFormat::FLOAT_MAT3X2
        | DataFormat::FLOAT_MAT3X3
        | DataFormat::FLOAT_MAT3X4
        | DataFormat::FLOAT_MAT4X2
        | DataFormat::FLOAT_MAT4X3
        | DataFormat::FLOAT_MAT4X4 => {
            Err(Error::UnsupportedFormat("unimplemented data format (matnxm)".to_string()))
        }

        DataFormat::INT32 => Ok(vk::Format::R32_SINT),
        DataFormat::INT32_VEC2 => Ok(vk::Format::R32G32_SINT),
        DataFormat::INT32_VEC3 => Ok(vk::Format::R32G32B32_SINT),
        DataFormat::INT32_VEC4 => Ok(vk::Format::R32G32B32A32_SINT),

        DataFormat::UINT32 => Ok(vk::Format::R32_UINT),
        DataFormat::UINT32_VEC2 => Ok(vk::Format::R32G32_UINT),
        DataFormat::UINT32_VEC3 => Ok(vk::Format::R32G32B32_UINT),
        DataFormat::UINT32_VEC4 => Ok(vk::Format::R32G32B32A32_UINT),

        DataFormat::SNORM8_VEC4 => Ok(vk::Format::R8G8B8A8_SNORM),
        DataFormat::UNORM8_VEC4 => Ok(vk::Format::R8G8B8A8_UNORM),
        DataFormat::INT8_VEC4 => Ok(vk::Format::R8G8B8A8_SINT),
        DataFormat::UINT8_VEC4 => Ok(vk::Format::R8G8B8A8_UINT),

        DataFormat::SNORM16_VEC2 => Ok(vk::Format::R16G16_SNORM),
        DataFormat::SNORM16_VEC4 => Ok(vk::Format::R16G16B16A16_SNORM),
        DataFormat::UNORM16_VEC2 => Ok(vk::Format::R16G16_UNORM),
        DataFormat::UNORM16_VEC4 => Ok(vk::Format::R16G16B16A16_UNORM),

        DataFormat::INT16_VEC2 => Ok(vk::Format::R16G16_SINT),
        DataFormat::INT16_VEC4 => Ok(vk::Format::R16G16B16A16_SINT),

        DataFormat::UINT16 => Ok(vk::Format::R16_UINT),
        DataFormat::UINT16_VEC2 => Ok(vk::Format::R16G16_UINT),
        DataFormat::UINT16_VEC4 => Ok(vk::Format::R16G16B16A16_UINT),

        DataFormat::BOOL
        | DataFormat::BOOL_VEC2
        | DataFormat::BOOL_VEC3
        | DataFormat::BOOL_VEC4 => {
            Err(Error::UnsupportedFormat("unimplemented data format (bool)".to_string()))
        }
    }
}

/// Convert an engine pixel format to a Vulkan format plus view swizzle
///
/// LA8 is stored as R8G8 and swizzled (R, R, R, G); the BGRA formats are
/// stored RGBA with R and B swapped in the view. Packed, depth/stencil,
/// and compressed formats are not implemented yet.
pub fn pixel_format_to_vk(format: PixelFormat) -> Result<TextureFormatMapping> {
    match format {
        PixelFormat::UNKNOWN => {
            Err(Error::UnsupportedFormat("unknown pixel format".to_string()))
        }
        PixelFormat::NORMAL => Ok(TextureFormatMapping::new(vk::Format::R8G8B8A8_SRGB)),
        PixelFormat::HDR => {
            Err(Error::UnsupportedFormat("unimplemented pixel format: hdr".to_string()))
        }

        PixelFormat::R8_UNORM => Ok(TextureFormatMapping::new(vk::Format::R8_UNORM)),
        PixelFormat::R8_INT => Ok(TextureFormatMapping::new(vk::Format::R8_SINT)),
        PixelFormat::R8_UINT => Ok(TextureFormatMapping::new(vk::Format::R8_UINT)),
        PixelFormat::R16_UNORM => Ok(TextureFormatMapping::new(vk::Format::R16_UNORM)),
        PixelFormat::R16_FLOAT => Ok(TextureFormatMapping::new(vk::Format::R16_SFLOAT)),
        PixelFormat::R16_INT => Ok(TextureFormatMapping::new(vk::Format::R16_SINT)),
        PixelFormat::R16_UINT => Ok(TextureFormatMapping::new(vk::Format::R16_UINT)),
        PixelFormat::R32_FLOAT => Ok(TextureFormatMapping::new(vk::Format::R32_SFLOAT)),
        PixelFormat::R32_INT => Ok(TextureFormatMapping::new(vk::Format::R32_SINT)),
        PixelFormat::R32_UINT => Ok(TextureFormatMapping::new(vk::Format::R32_UINT)),

        PixelFormat::RG8_UNORM => Ok(TextureFormatMapping::new(vk::Format::R8G8_UNORM)),
        PixelFormat::RG8_INT => Ok(TextureFormatMapping::new(vk::Format::R8G8_SINT)),
        PixelFormat::RG8_UINT => Ok(TextureFormatMapping::new(vk::Format::R8G8_UINT)),
        // Same storage as RG8, read back as (L, L, L, A)
        PixelFormat::LA8_UNORM => Ok(TextureFormatMapping::with_swizzle(
            vk::Format::R8G8_UNORM,
            vk::ComponentMapping {
                r: vk::ComponentSwizzle::R,
                g: vk::ComponentSwizzle::R,
                b: vk::ComponentSwizzle::R,
                a: vk::ComponentSwizzle::G,
            },
        )),
        PixelFormat::RG16_UNORM => Ok(TextureFormatMapping::new(vk::Format::R16G16_UNORM)),
        PixelFormat::RG16_FLOAT => Ok(TextureFormatMapping::new(vk::Format::R16G16_SFLOAT)),
        PixelFormat::RG16_INT => Ok(TextureFormatMapping::new(vk::Format::R16G16_SINT)),
        PixelFormat::RG16_UINT => Ok(TextureFormatMapping::new(vk::Format::R16G16_UINT)),
        PixelFormat::RG32_FLOAT => Ok(TextureFormatMapping::new(vk::Format::R32G32_SFLOAT)),
        PixelFormat::RG32_INT => Ok(TextureFormatMapping::new(vk::Format::R32G32_SINT)),
        PixelFormat::RG32_UINT => Ok(TextureFormatMapping::new(vk::Format::R32G32_UINT)),

        PixelFormat::RGBA8_UNORM => Ok(TextureFormatMapping::new(vk::Format::R8G8B8A8_SRGB)),
        PixelFormat::RGBA8_UNORM_sRGB => Ok(TextureFormatMapping::new(vk::Format::R8G8B8A8_SRGB)),
        PixelFormat::BGRA8_UNORM => Ok(TextureFormatMapping::with_swizzle(
            vk::Format::R8G8B8A8_UNORM,
            vk::ComponentMapping {
                r: vk::ComponentSwizzle::B,
                g: vk::ComponentSwizzle::IDENTITY,
                b: vk::ComponentSwizzle::R,
                a: vk::ComponentSwizzle::IDENTITY,
            },
        )),
        PixelFormat::BGRA8_UNORM_sRGB => Ok(TextureFormatMapping::with_swizzle(
            vk::Format::R8G8B8A8_SRGB,
            vk::ComponentMapping {
                r: vk::ComponentSwizzle::B,
                g: vk::ComponentSwizzle::IDENTITY,
                b: vk::ComponentSwizzle::R,
                a: vk::ComponentSwizzle::IDENTITY,
            },
        )),
        PixelFormat::RGBA8_INT => Ok(TextureFormatMapping::new(vk::Format::R8G8B8A8_SINT)),
        PixelFormat::RGBA8_UINT => Ok(TextureFormatMapping::new(vk::Format::R8G8B8A8_UINT)),
        PixelFormat::RGBA16_UNORM => Ok(TextureFormatMapping::new(vk::Format::R16G16B16A16_UNORM)),
        PixelFormat::RGBA16_FLOAT => Ok(TextureFormatMapping::new(vk::Format::R16G16B16A16_SFLOAT)),
        PixelFormat::RGBA16_INT => Ok(TextureFormatMapping::new(vk::Format::R16G16B16A16_SINT)),
        PixelFormat::RGBA16_UINT => Ok(TextureFormatMapping::new(vk::Format::R16G16B16A16_UINT)),
        PixelFormat::RGBA32_FLOAT => Ok(TextureFormatMapping::new(vk::Format::R32G32B32A32_SFLOAT)),
        PixelFormat::RGBA32_INT => Ok(TextureFormatMapping::new(vk::Format::R32G32B32A32_SINT)),
        PixelFormat::RGBA32_UINT => Ok(TextureFormatMapping::new(vk::Format::R32G32B32A32_UINT)),

        PixelFormat::RGBA4_UNORM
        | PixelFormat::RGB5A1_UNORM
        | PixelFormat::RGB565_UNORM
        | PixelFormat::RGB10A2_UNORM
        | PixelFormat::RG11B10_FLOAT
        | PixelFormat::STENCIL8
        | PixelFormat::DEPTH16_UNORM
        | PixelFormat::DEPTH24_UNORM
        | PixelFormat::DEPTH32_FLOAT
        | PixelFormat::DEPTH24_UNORM_STENCIL8
        | PixelFormat::DEPTH32_FLOAT_STENCIL8
        | PixelFormat::DXT1_UNORM
        | PixelFormat::DXT3_UNORM
        | PixelFormat::DXT5_UNORM
        | PixelFormat::BC4_UNORM
        | PixelFormat::BC4_SNORM
        | PixelFormat::BC5_UNORM
        | PixelFormat::BC5_SNORM
        | PixelFormat::BC6H_UFLOAT
        | PixelFormat::BC6H_FLOAT
        | PixelFormat::BC7_UNORM
        | PixelFormat::PVR1_RGB2_UNORM
        | PixelFormat::PVR1_RGB4_UNORM
        | PixelFormat::PVR1_RGBA2_UNORM
        | PixelFormat::PVR1_RGBA4_UNORM
        | PixelFormat::ETC1_UNORM
        | PixelFormat::ETC2_RGB_UNORM
        | PixelFormat::ETC2_RGBA_UNORM
        | PixelFormat::ETC2_RGBA1_UNORM
        | PixelFormat::EAC_R_UNORM
        | PixelFormat::EAC_R_SNORM
        | PixelFormat::EAC_RG_UNORM
        | PixelFormat::EAC_RG_SNORM
        | PixelFormat::ASTC_4X4
        | PixelFormat::ASTC_5X4
        | PixelFormat::ASTC_5X5
        | PixelFormat::ASTC_6X5
        | PixelFormat::ASTC_6X6
        | PixelFormat::ASTC_8X5
        | PixelFormat::ASTC_8X6
        | PixelFormat::ASTC_8X8
        | PixelFormat::ASTC_10X5
        | PixelFormat::ASTC_10X6
        | PixelFormat::ASTC_10X8
        | PixelFormat::ASTC_10X10
        | PixelFormat::ASTC_12X10
        | PixelFormat::ASTC_12X12 => {
            Err(Error::UnsupportedFormat("unimplemented pixel format".to_string()))
        }
    }
}

/// Convert an index element type to the Vulkan index type
pub fn index_type_to_vk(index_type: IndexType) -> vk::IndexType {
    match index_type {
        IndexType::Uint16 => vk::IndexType::UINT16,
        IndexType::Uint32 => vk::IndexType::UINT32,
    }
}

/// PCI vendor id to vendor name
///
/// Ids from https://pcisig.com/membership/member-companies as referenced
/// by the VkPhysicalDeviceProperties documentation.
pub fn vendor_name(vendor_id: u32) -> &'static str {
    match vendor_id {
        4318 => "Nvidia",
        8086 => "Intel",
        4130 => "Advanced Micro Devices",
        _ => "unknown",
    }
}

/// Render a packed Vulkan API version as "variant.major.minor.patch"
pub fn api_version_string(version: u32) -> String {
    format!(
        "{}.{}.{}.{}",
        vk::api_version_variant(version),
        vk::api_version_major(version),
        vk::api_version_minor(version),
        vk::api_version_patch(version)
    )
}

#[cfg(test)]
#[path = "vulkan_format_tests.rs"]
mod tests;

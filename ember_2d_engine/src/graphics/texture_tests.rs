//! Unit tests for texture.rs

use crate::graphics::{PixelFormat, PixelFormatUsage, Texture};

// ============================================================================
// PIXEL FORMAT TESTS
// ============================================================================

#[test]
fn test_pixel_format_equality() {
    assert_eq!(PixelFormat::RGBA8_UNORM, PixelFormat::RGBA8_UNORM);
    assert_ne!(PixelFormat::RGBA8_UNORM, PixelFormat::RGBA8_UNORM_sRGB);
    assert_ne!(PixelFormat::BGRA8_UNORM, PixelFormat::RGBA8_UNORM);
}

#[test]
fn test_pixel_format_usable_as_map_key() {
    use std::collections::HashMap;

    let mut map = HashMap::new();
    map.insert(PixelFormat::LA8_UNORM, 2u32);
    map.insert(PixelFormat::RGBA32_FLOAT, 16u32);

    assert_eq!(map.get(&PixelFormat::LA8_UNORM), Some(&2));
    assert_eq!(map.get(&PixelFormat::RGBA32_FLOAT), Some(&16));
    assert_eq!(map.get(&PixelFormat::DXT1_UNORM), None);
}

// ============================================================================
// PIXEL FORMAT USAGE TESTS
// ============================================================================

#[test]
fn test_pixel_format_usage_flags_combine() {
    let usage = PixelFormatUsage::SAMPLE | PixelFormatUsage::LINEAR;
    assert!(usage.contains(PixelFormatUsage::SAMPLE));
    assert!(usage.contains(PixelFormatUsage::LINEAR));
    assert!(!usage.contains(PixelFormatUsage::RENDER_TARGET));
}

#[test]
fn test_pixel_format_usage_empty() {
    let usage = PixelFormatUsage::empty();
    assert!(!usage.contains(PixelFormatUsage::SAMPLE));
    assert!(usage.is_empty());
}

#[test]
fn test_pixel_format_usage_render_target_group() {
    let usage = PixelFormatUsage::RENDER_TARGET | PixelFormatUsage::BLEND | PixelFormatUsage::MSAA;
    assert!(usage.contains(PixelFormatUsage::RENDER_TARGET));
    assert!(usage.contains(PixelFormatUsage::BLEND));
    assert!(usage.contains(PixelFormatUsage::MSAA));
    assert!(!usage.contains(PixelFormatUsage::COMPUTE_WRITE));
}

// ============================================================================
// TEXTURE TRAIT OBJECT TESTS
// ============================================================================

struct StubTexture {
    width: u32,
    height: u32,
    format: PixelFormat,
}

impl Texture for StubTexture {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn format(&self) -> PixelFormat {
        self.format
    }

    fn native_view_handle(&self) -> u64 {
        0x1000
    }

    fn native_sampler_handle(&self) -> u64 {
        0x2000
    }
}

#[test]
fn test_texture_trait_object() {
    let texture: Box<dyn Texture> = Box::new(StubTexture {
        width: 64,
        height: 32,
        format: PixelFormat::RGBA8_UNORM,
    });

    assert_eq!(texture.width(), 64);
    assert_eq!(texture.height(), 32);
    assert_eq!(texture.format(), PixelFormat::RGBA8_UNORM);
    assert_eq!(texture.native_view_handle(), 0x1000);
    assert_eq!(texture.native_sampler_handle(), 0x2000);
}

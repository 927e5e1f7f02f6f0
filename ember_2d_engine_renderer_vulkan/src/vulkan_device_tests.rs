//! Unit tests for the device scoring policy
//!
//! Scoring is pure; enumeration and queue discovery need an instance and
//! are exercised by the GPU integration tests.

use ash::vk;

use super::{score_device, QueueFamilyIndices};

fn score_usable(device_type: vk::PhysicalDeviceType) -> u32 {
    score_device(device_type, true, true, true, true)
}

// ============================================================================
// Device Scoring
// ============================================================================

#[test]
fn test_scoring_prefers_discrete_then_integrated_then_virtual() {
    let discrete = score_usable(vk::PhysicalDeviceType::DISCRETE_GPU);
    let integrated = score_usable(vk::PhysicalDeviceType::INTEGRATED_GPU);
    let virtual_gpu = score_usable(vk::PhysicalDeviceType::VIRTUAL_GPU);
    let cpu = score_usable(vk::PhysicalDeviceType::CPU);

    assert!(discrete > integrated);
    assert!(integrated > virtual_gpu);
    assert!(virtual_gpu > cpu);
}

#[test]
fn test_any_usable_device_scores_positive() {
    assert!(score_usable(vk::PhysicalDeviceType::CPU) > 0);
    assert!(score_usable(vk::PhysicalDeviceType::OTHER) > 0);
}

#[test]
fn test_incomplete_queues_disqualify() {
    assert_eq!(
        score_device(vk::PhysicalDeviceType::DISCRETE_GPU, false, true, true, true),
        0
    );
}

#[test]
fn test_missing_extensions_disqualify() {
    assert_eq!(
        score_device(vk::PhysicalDeviceType::DISCRETE_GPU, true, false, true, true),
        0
    );
}

#[test]
fn test_inadequate_swapchain_disqualifies() {
    assert_eq!(
        score_device(vk::PhysicalDeviceType::DISCRETE_GPU, true, true, false, true),
        0
    );
}

#[test]
fn test_missing_anisotropy_disqualifies() {
    assert_eq!(
        score_device(vk::PhysicalDeviceType::DISCRETE_GPU, true, true, true, false),
        0
    );
}

// ============================================================================
// Queue Family Indices
// ============================================================================

#[test]
fn test_default_indices_are_incomplete() {
    assert!(!QueueFamilyIndices::default().is_complete());
}

#[test]
fn test_graphics_alone_is_incomplete() {
    let indices = QueueFamilyIndices {
        graphics_family: Some(0),
        present_family: None,
    };

    assert!(!indices.is_complete());
}

#[test]
fn test_both_families_complete() {
    let indices = QueueFamilyIndices {
        graphics_family: Some(0),
        present_family: Some(2),
    };

    assert!(indices.is_complete());
}

/// VulkanShader - Vulkan implementation of the Shader trait
///
/// Wraps a compiled vertex + fragment module pair. Every pipeline is
/// built against the single fixed descriptor set layout (binding 0
/// uniform block, binding 1 combined image sampler), so creation reflects
/// both stages with spirq and rejects anything the layout cannot satisfy
/// instead of failing later with a validation error at draw time.

use ash::vk;
use std::sync::Arc;

use ember_2d_engine::ember2d::{Error, Result};
use ember_2d_engine::ember2d::graphics::{Shader, ShaderStages};
use ember_2d_engine::{engine_err, engine_error};

use crate::vulkan_context::GpuContext;

/// Vulkan shader implementation
pub struct VulkanShader {
    /// Shared GPU context (for cleanup)
    ctx: Arc<GpuContext>,
    /// Compiled vertex stage module
    pub(crate) vertex_module: vk::ShaderModule,
    /// Compiled fragment stage module
    pub(crate) fragment_module: vk::ShaderModule,
}

impl VulkanShader {
    /// Create a shader pair from compiled SPIR-V words
    pub fn new(ctx: Arc<GpuContext>, stages: ShaderStages) -> Result<Self> {
        validate_stage_bindings(&stages.vertex, "vertex")?;
        validate_stage_bindings(&stages.fragment, "fragment")?;

        unsafe {
            let vertex_create_info = vk::ShaderModuleCreateInfo::default()
                .code(&stages.vertex);

            let vertex_module = ctx.device.create_shader_module(&vertex_create_info, None)
                .map_err(|e| engine_err!("ember2d::vulkan", "Failed to create vertex shader module: {:?}", e))?;

            let fragment_create_info = vk::ShaderModuleCreateInfo::default()
                .code(&stages.fragment);

            let fragment_module = match ctx.device.create_shader_module(&fragment_create_info, None) {
                Ok(module) => module,
                Err(e) => {
                    ctx.device.destroy_shader_module(vertex_module, None);
                    return Err(engine_err!("ember2d::vulkan", "Failed to create fragment shader module: {:?}", e));
                }
            };

            Ok(Self {
                ctx,
                vertex_module,
                fragment_module,
            })
        }
    }
}

impl Shader for VulkanShader {}

impl Drop for VulkanShader {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_shader_module(self.vertex_module, None);
            self.ctx.device.destroy_shader_module(self.fragment_module, None);
        }
    }
}

/// Reflect one stage with spirq and check its descriptors against the
/// fixed set layout
fn validate_stage_bindings(code: &[u32], stage_name: &str) -> Result<()> {
    let entry_points = spirq::ReflectConfig::new()
        .spv(code)
        .ref_all_rscs(true)
        .reflect()
        .map_err(|e| {
            engine_error!("ember2d::vulkan", "SPIR-V reflection failed for {} stage: {:?}", stage_name, e);
            Error::InvalidResource(format!("{} shader stage is not valid SPIR-V: {:?}", stage_name, e))
        })?;

    if entry_points.is_empty() {
        engine_error!("ember2d::vulkan", "{} shader stage declares no entry point", stage_name);
        return Err(Error::InvalidResource(format!(
            "{} shader stage declares no entry point",
            stage_name
        )));
    }

    for entry_point in &entry_points {
        for var in entry_point.vars.iter() {
            match var {
                spirq::var::Variable::Descriptor { name, desc_bind, desc_ty, .. } => {
                    let allowed = matches!(
                        (desc_bind.set(), desc_bind.bind(), desc_ty),
                        (0, 0, spirq::ty::DescriptorType::UniformBuffer())
                            | (0, 1, spirq::ty::DescriptorType::CombinedImageSampler())
                    );
                    if !allowed {
                        let var_name = name.clone().unwrap_or_default();
                        engine_error!(
                            "ember2d::vulkan",
                            "{} shader stage declares descriptor '{}' (set {}, binding {}, {:?}) outside the fixed set layout",
                            stage_name, var_name, desc_bind.set(), desc_bind.bind(), desc_ty
                        );
                        return Err(Error::InvalidResource(format!(
                            "{} shader stage declares descriptor '{}' (set {}, binding {}) the fixed set layout does not provide",
                            stage_name, var_name, desc_bind.set(), desc_bind.bind()
                        )));
                    }
                }
                spirq::var::Variable::PushConstant { name, .. } => {
                    let var_name = name.clone().unwrap_or_default();
                    engine_error!(
                        "ember2d::vulkan",
                        "{} shader stage declares push constant '{}' but pipeline layouts carry no push constant ranges",
                        stage_name, var_name
                    );
                    return Err(Error::InvalidResource(format!(
                        "{} shader stage declares push constant '{}' but pipeline layouts carry no push constant ranges",
                        stage_name, var_name
                    )));
                }
                _ => {}
            }
        }
    }

    Ok(())
}

#[cfg(test)]
#[path = "vulkan_shader_tests.rs"]
mod tests;

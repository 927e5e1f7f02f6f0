//! Shader stages and the default shader source
//!
//! Shader compilation lives outside the graphics module; backends receive
//! already-compiled SPIR-V words. The GLSL source of the default shader
//! pair ships here so the compiling side and the backend agree on the
//! vertex inputs and the builtin uniform block.

/// Shader pipeline stages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

/// A compiled vertex + fragment shader pair (SPIR-V words)
#[derive(Debug, Clone, Default)]
pub struct ShaderStages {
    pub vertex: Vec<u32>,
    pub fragment: Vec<u32>,
}

impl ShaderStages {
    pub fn new(vertex: Vec<u32>, fragment: Vec<u32>) -> Self {
        Self { vertex, fragment }
    }
}

/// Shader resource trait
///
/// Implemented by backend-specific shader types (e.g., VulkanShader).
/// The shader modules are automatically destroyed when dropped.
pub trait Shader: Send + Sync {}

/// GLSL source of the default shader for a stage
///
/// The vertex stage consumes the three reserved attribute locations
/// (position, texture coordinates, color); the fragment stage modulates
/// the bound texture by the interpolated color. Binding 0 is the builtin
/// uniform block, binding 1 the combined image sampler, matching the
/// descriptor set layout every backend pipeline uses.
pub fn default_shader_source(stage: ShaderStage) -> &'static str {
    match stage {
        ShaderStage::Vertex => DEFAULT_VERTEX_SHADER,
        ShaderStage::Fragment => DEFAULT_FRAGMENT_SHADER,
    }
}

const DEFAULT_VERTEX_SHADER: &str = r#"
#version 450

layout(location = 0) in vec2 inPosition;
layout(location = 1) in vec2 inTexCoord;
layout(location = 2) in vec4 inColor;

layout(binding = 0) uniform BuiltinUniforms {
    mat4 transform;
    mat4 projection;
    vec4 normalMatrix[3];
    vec4 screenSizeParams;
    vec4 constantColor;
} ubo;

layout(location = 0) out vec2 fragTexCoord;
layout(location = 1) out vec4 fragColor;

void main() {
    gl_Position = ubo.projection * ubo.transform * vec4(inPosition, 0.0, 1.0);
    fragTexCoord = inTexCoord;
    fragColor = inColor * ubo.constantColor;
}
"#;

const DEFAULT_FRAGMENT_SHADER: &str = r#"
#version 450

layout(location = 0) in vec2 fragTexCoord;
layout(location = 1) in vec4 fragColor;

layout(binding = 1) uniform sampler2D texSampler;

layout(location = 0) out vec4 outColor;

void main() {
    outColor = texture(texSampler, fragTexCoord) * fragColor;
}
"#;

#[cfg(test)]
#[path = "shader_tests.rs"]
mod tests;

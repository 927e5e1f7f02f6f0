/// Graphics pipeline configuration, vertex format derivation, and the
/// pipeline cache
///
/// A pipeline is fully determined by its vertex input state; every other
/// piece of state is fixed (topology, viewport from the swapchain extent,
/// rasterizer, alpha blending, the shared shader pair). The cache is a
/// deliberate linear scan: 2D workloads produce a handful of distinct
/// vertex formats, so the list stays short.

use ash::vk;

use ember_2d_engine::ember2d::Result;
use ember_2d_engine::ember2d::graphics::{
    VertexAttributes, ATTRIB_COLOR, MAX_VERTEX_ATTRIBUTES,
};
use ember_2d_engine::engine_err;

use crate::vulkan_format::vertex_format_to_vk;

/// Vertex input state a pipeline was compiled for
pub struct GraphicsPipelineConfiguration {
    pub binding_descriptions: Vec<vk::VertexInputBindingDescription>,
    pub attribute_descriptions: Vec<vk::VertexInputAttributeDescription>,
}

impl PartialEq for GraphicsPipelineConfiguration {
    fn eq(&self, other: &Self) -> bool {
        if self.binding_descriptions.len() != other.binding_descriptions.len()
            || self.attribute_descriptions.len() != other.attribute_descriptions.len()
        {
            return false;
        }

        let bindings_match = self
            .binding_descriptions
            .iter()
            .zip(&other.binding_descriptions)
            .all(|(a, b)| {
                a.binding == b.binding && a.input_rate == b.input_rate && a.stride == b.stride
            });

        let attributes_match = self
            .attribute_descriptions
            .iter()
            .zip(&other.attribute_descriptions)
            .all(|(a, b)| {
                a.location == b.location
                    && a.binding == b.binding
                    && a.offset == b.offset
                    && a.format == b.format
            });

        bindings_match && attributes_match
    }
}

/// Derive the Vulkan vertex input state from an enabled attribute set
///
/// Returns the configuration and whether the constant color stream must be
/// bound. The shared shaders always read a color attribute, so when the set
/// does not enable one a zero-stride binding is synthesized one slot above
/// the highest used buffer binding; the draw path binds the prefilled
/// constant color stream there.
pub fn build_vertex_format(
    attributes: &VertexAttributes,
) -> Result<(GraphicsPipelineConfiguration, bool)> {
    let mut binding_descriptions = Vec::new();
    let mut attribute_descriptions = Vec::new();

    let mut seen_buffers: u32 = 0;
    let mut uses_color = false;
    let mut highest_buffer_binding: u32 = 0;

    for i in 0..MAX_VERTEX_ATTRIBUTES as u32 {
        let bit = 1u32 << i;
        if attributes.enable_bits & bit != 0 {
            if i == ATTRIB_COLOR {
                uses_color = true;
            }

            let attrib = attributes.attribs[i as usize];
            let buffer_binding = attrib.buffer_index;
            if seen_buffers & (1u32 << buffer_binding) == 0 {
                seen_buffers |= 1u32 << buffer_binding;

                binding_descriptions.push(
                    vk::VertexInputBindingDescription::default()
                        .binding(buffer_binding)
                        .input_rate(vk::VertexInputRate::VERTEX)
                        .stride(attributes.buffer_layouts[buffer_binding as usize].stride),
                );

                highest_buffer_binding = highest_buffer_binding.max(buffer_binding);
            }

            attribute_descriptions.push(
                vk::VertexInputAttributeDescription::default()
                    .location(i)
                    .binding(buffer_binding)
                    .offset(attrib.offset_from_vertex)
                    .format(vertex_format_to_vk(attrib.format)?),
            );
        }
    }

    // Do we need to use a constant vertex color?
    if !uses_color {
        let constant_color_binding = highest_buffer_binding + 1;

        binding_descriptions.push(
            vk::VertexInputBindingDescription::default()
                .binding(constant_color_binding)
                .input_rate(vk::VertexInputRate::VERTEX)
                // No stride, will always read the same color multiple times
                .stride(0),
        );

        attribute_descriptions.push(
            vk::VertexInputAttributeDescription::default()
                .location(ATTRIB_COLOR)
                .binding(constant_color_binding)
                .offset(0)
                .format(vk::Format::R32G32B32A32_SFLOAT),
        );
    }

    Ok((
        GraphicsPipelineConfiguration {
            binding_descriptions,
            attribute_descriptions,
        },
        !uses_color,
    ))
}

/// Cache of compiled pipelines keyed by their vertex input state
///
/// Layouts are tracked separately because one is created per pipeline;
/// they are all identical in content, so any of them is compatible for
/// descriptor set binding.
pub struct PipelineCache {
    entries: Vec<(GraphicsPipelineConfiguration, vk::Pipeline)>,
    layouts: Vec<vk::PipelineLayout>,
}

impl PipelineCache {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            layouts: Vec::new(),
        }
    }

    /// Look up the pipeline for a configuration
    pub fn find(&self, config: &GraphicsPipelineConfiguration) -> Option<vk::Pipeline> {
        self.entries
            .iter()
            .find(|(entry_config, _)| entry_config == config)
            .map(|&(_, pipeline)| pipeline)
    }

    pub fn insert(&mut self, config: GraphicsPipelineConfiguration, pipeline: vk::Pipeline) {
        self.entries.push((config, pipeline));
    }

    pub fn add_layout(&mut self, layout: vk::PipelineLayout) {
        self.layouts.push(layout);
    }

    /// Number of cached pipelines
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Destroy all cached pipelines and layouts
    ///
    /// The caller must ensure the device is idle first.
    pub fn destroy(&mut self, device: &ash::Device) {
        unsafe {
            for (_, pipeline) in self.entries.drain(..) {
                device.destroy_pipeline(pipeline, None);
            }
            for layout in self.layouts.drain(..) {
                device.destroy_pipeline_layout(layout, None);
            }
        }
    }
}

/// Compile a graphics pipeline for a vertex input configuration
///
/// All state other than the vertex input is fixed. Returns the pipeline
/// and its freshly created layout; the caller owns both.
pub fn create_graphics_pipeline(
    device: &ash::Device,
    config: &GraphicsPipelineConfiguration,
    vertex_module: vk::ShaderModule,
    fragment_module: vk::ShaderModule,
    extent: vk::Extent2D,
    render_pass: vk::RenderPass,
    set_layout: vk::DescriptorSetLayout,
) -> Result<(vk::Pipeline, vk::PipelineLayout)> {
    unsafe {
        let shader_stages = [
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(vertex_module)
                .name(c"main"),
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(fragment_module)
                .name(c"main"),
        ];

        let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&config.binding_descriptions)
            .vertex_attribute_descriptions(&config.attribute_descriptions);

        let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);

        let viewports = [vk::Viewport::default()
            .x(0.0)
            .y(0.0)
            .width(extent.width as f32)
            .height(extent.height as f32)
            .min_depth(0.0)
            .max_depth(1.0)];

        let scissors = [vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        }];

        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewports(&viewports)
            .scissors(&scissors);

        let rasterization_state = vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(vk::CullModeFlags::FRONT)
            .front_face(vk::FrontFace::CLOCKWISE)
            .depth_bias_enable(false);

        let multisample_state = vk::PipelineMultisampleStateCreateInfo::default()
            .sample_shading_enable(false)
            .rasterization_samples(vk::SampleCountFlags::TYPE_1)
            .min_sample_shading(1.0);

        // Standard alpha blending: straight alpha over, alpha replaced
        let color_blend_attachments = [vk::PipelineColorBlendAttachmentState::default()
            .color_write_mask(vk::ColorComponentFlags::RGBA)
            .blend_enable(true)
            .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
            .dst_color_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
            .color_blend_op(vk::BlendOp::ADD)
            .src_alpha_blend_factor(vk::BlendFactor::ONE)
            .dst_alpha_blend_factor(vk::BlendFactor::ZERO)
            .alpha_blend_op(vk::BlendOp::ADD)];

        let color_blend_state = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .logic_op(vk::LogicOp::COPY)
            .attachments(&color_blend_attachments);

        let set_layouts = [set_layout];
        let layout_create_info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(&set_layouts);

        let layout = device.create_pipeline_layout(&layout_create_info, None)
            .map_err(|e| engine_err!("ember2d::vulkan", "Failed to create pipeline layout: {:?}", e))?;

        let pipeline_create_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input_state)
            .input_assembly_state(&input_assembly_state)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization_state)
            .multisample_state(&multisample_state)
            .color_blend_state(&color_blend_state)
            .layout(layout)
            .render_pass(render_pass)
            .subpass(0);

        let pipelines = device
            .create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_create_info], None)
            .map_err(|(_, e)| {
                device.destroy_pipeline_layout(layout, None);
                engine_err!("ember2d::vulkan", "Failed to create graphics pipeline: {:?}", e)
            })?;

        Ok((pipelines[0], layout))
    }
}

#[cfg(test)]
#[path = "vulkan_pipeline_tests.rs"]
mod tests;

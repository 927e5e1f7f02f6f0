//! Vertex data model: data formats, attribute sets, buffer bindings,
//! and index generation for batched quads
//!
//! Attribute sets and buffer bindings use bitmasks so draw paths can scan
//! enabled slots in index order without touching disabled ones.

use std::sync::Arc;
use crate::graphics::Buffer;

/// Maximum number of vertex attributes (one bit each in `enable_bits`)
pub const MAX_VERTEX_ATTRIBUTES: usize = 32;

/// Maximum number of vertex buffer bind slots (one bit each in `use_bits`)
pub const MAX_VERTEX_BUFFERS: usize = 32;

/// Attribute location of vertex positions in the shared shader interface
pub const ATTRIB_POS: u32 = 0;
/// Attribute location of texture coordinates
pub const ATTRIB_TEXCOORD: u32 = 1;
/// Attribute location of vertex colors
///
/// When a draw's attribute set does not enable this location, the backend
/// synthesizes a constant color stream so the shared shaders can always
/// read a color input.
pub const ATTRIB_COLOR: u32 = 2;

/// CPU-side data formats for vertex attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[allow(non_camel_case_types)]
pub enum DataFormat {
    #[default]
    FLOAT,
    FLOAT_VEC2,
    FLOAT_VEC3,
    FLOAT_VEC4,

    FLOAT_MAT2X2,
    FLOAT_MAT2X3,
    FLOAT_MAT2X4,
    FLOAT_MAT3X2,
    FLOAT_MAT3X3,
    FLOAT_MAT3X4,
    FLOAT_MAT4X2,
    FLOAT_MAT4X3,
    FLOAT_MAT4X4,

    INT32,
    INT32_VEC2,
    INT32_VEC3,
    INT32_VEC4,

    UINT32,
    UINT32_VEC2,
    UINT32_VEC3,
    UINT32_VEC4,

    SNORM8_VEC4,
    UNORM8_VEC4,
    INT8_VEC4,
    UINT8_VEC4,

    SNORM16_VEC2,
    SNORM16_VEC4,
    UNORM16_VEC2,
    UNORM16_VEC4,

    INT16_VEC2,
    INT16_VEC4,

    UINT16,
    UINT16_VEC2,
    UINT16_VEC4,

    BOOL,
    BOOL_VEC2,
    BOOL_VEC3,
    BOOL_VEC4,
}

/// Index element types for indexed draws
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexType {
    Uint16,
    Uint32,
}

impl IndexType {
    /// Size of one index element in bytes
    pub fn size_bytes(&self) -> usize {
        match self {
            IndexType::Uint16 => 2,
            IndexType::Uint32 => 4,
        }
    }
}

/// Per-attribute layout information
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VertexAttributeInfo {
    /// Which buffer bind slot the attribute reads from
    pub buffer_index: u32,
    /// Byte offset of the attribute from the start of a vertex
    pub offset_from_vertex: u32,
    /// Data format of the attribute
    pub format: DataFormat,
}

/// Per-buffer layout information
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VertexBufferLayout {
    /// Byte stride between consecutive vertices in the buffer
    pub stride: u32,
}

/// Set of enabled vertex attributes with their layouts
///
/// `enable_bits` holds one bit per attribute location; only entries whose
/// bit is set are meaningful in `attribs`. `buffer_layouts` is indexed by
/// `VertexAttributeInfo::buffer_index`.
#[derive(Debug, Clone, Copy, Default)]
pub struct VertexAttributes {
    pub enable_bits: u32,
    pub attribs: [VertexAttributeInfo; MAX_VERTEX_ATTRIBUTES],
    pub buffer_layouts: [VertexBufferLayout; MAX_VERTEX_BUFFERS],
}

impl VertexAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable an attribute location and set its layout
    pub fn set(&mut self, index: u32, format: DataFormat, offset_from_vertex: u32, buffer_index: u32) {
        self.enable_bits |= 1 << index;
        self.attribs[index as usize] = VertexAttributeInfo {
            buffer_index,
            offset_from_vertex,
            format,
        };
    }

    /// Set the vertex stride of a buffer bind slot
    pub fn set_buffer_layout(&mut self, buffer_index: u32, stride: u32) {
        self.buffer_layouts[buffer_index as usize] = VertexBufferLayout { stride };
    }

    pub fn is_enabled(&self, index: u32) -> bool {
        (self.enable_bits & (1 << index)) != 0
    }
}

/// A buffer bound to a vertex buffer slot
#[derive(Clone)]
pub struct BufferBinding {
    pub buffer: Arc<dyn Buffer>,
    pub offset: u64,
}

/// Set of bound vertex buffers
///
/// `use_bits` holds one bit per bind slot; only entries whose bit is set
/// are meaningful in `info`.
#[derive(Clone, Default)]
pub struct BufferBindings {
    pub use_bits: u32,
    pub info: [Option<BufferBinding>; MAX_VERTEX_BUFFERS],
}

impl BufferBindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a buffer to a slot
    pub fn set(&mut self, binding_index: u32, buffer: Arc<dyn Buffer>, offset: u64) {
        self.use_bits |= 1 << binding_index;
        self.info[binding_index as usize] = Some(BufferBinding { buffer, offset });
    }

    pub fn is_used(&self, binding_index: u32) -> bool {
        (self.use_bits & (1 << binding_index)) != 0
    }
}

/// Number of indices needed to draw `vertex_count` vertices as quads
/// (6 indices per 4 vertices)
pub fn quad_index_count(vertex_count: usize) -> usize {
    vertex_count * 6 / 4
}

/// Fill `indices` with triangle indices for a run of quads
///
/// Each quad is two triangles over four vertices laid out as
///
/// ```text
/// 0---2
/// | / |
/// 1---3
/// ```
///
/// Fills `vertex_count / 4` quads starting at `vertex_start`; `indices`
/// must hold at least `quad_index_count(vertex_count)` elements.
pub fn fill_quad_indices(vertex_start: u16, vertex_count: usize, indices: &mut [u16]) {
    let count = vertex_count / 4;
    for i in 0..count {
        let ii = i * 6;
        let vi = vertex_start + (i * 4) as u16;
        indices[ii] = vi;
        indices[ii + 1] = vi + 1;
        indices[ii + 2] = vi + 2;
        indices[ii + 3] = vi + 2;
        indices[ii + 4] = vi + 1;
        indices[ii + 5] = vi + 3;
    }
}

#[cfg(test)]
#[path = "vertex_tests.rs"]
mod tests;

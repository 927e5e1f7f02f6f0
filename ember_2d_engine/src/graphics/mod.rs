//! Graphics module - backend trait, resource traits, and the data model
//! shared between the engine and its rendering backends

pub mod graphics;
pub mod buffer;
pub mod stream_buffer;
pub mod texture;
pub mod shader;
pub mod vertex;

#[cfg(test)]
pub mod mock_graphics;

// Everything is flattened into one namespace
pub use graphics::*;
pub use buffer::*;
pub use stream_buffer::*;
pub use texture::*;
pub use shader::*;
pub use vertex::*;

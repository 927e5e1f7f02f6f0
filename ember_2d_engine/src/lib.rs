/*!
# Ember 2D Engine

Core traits and types for the Ember 2D game engine graphics module.

This crate provides the platform-agnostic rendering API using trait-based
dynamic polymorphism. Backend implementations (Vulkan today, others later)
live in separate crates and are created directly or through the plugin
system at runtime.

## Architecture

- **Graphics**: Backend trait (mode lifecycle, resources, draws, present)
- **Buffer / StreamBuffer**: GPU buffer resource traits
- **Texture**: Texture resource trait with the pixel format model
- **Shader**: Compiled shader pair plus the default shader GLSL source
- **VertexAttributes / BufferBindings**: Bitmask-indexed vertex state

Backend crates provide concrete types that implement these traits and
reach native handles through the opaque `native_handle` accessors.
*/

// Internal modules
mod error;
mod engine;
pub mod log;
pub mod graphics;

// Main ember2d namespace module
pub mod ember2d {
    // Error types
    pub use crate::error::{Ember2dError as Error, Ember2dResult as Result};

    // Engine singleton
    pub use crate::engine::Engine;

    // Graphics backend trait
    pub use crate::graphics::Graphics;

    // Logging sub-module (types only, NOT macros)
    pub mod log {
        pub use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};
        // Note: engine_* macros are NOT re-exported here - they live at the crate root
    }

    // Graphics sub-module with all rendering types
    pub mod graphics {
        pub use crate::graphics::*;
    }
}

// Re-export math library at crate root
pub use glam;

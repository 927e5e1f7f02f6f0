//! Ember2D Engine - Singleton manager for engine subsystems
//!
//! Holds the global graphics backend and the global logger in thread-safe
//! static storage, so game code and renderer plugins reach them without
//! passing handles around.

use std::sync::{OnceLock, RwLock, Arc, Mutex};
use std::time::SystemTime;
use crate::graphics::Graphics;
use crate::error::{Ember2dError as Error, Ember2dResult as Result};
use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};

// ===== GLOBAL STATE =====

/// Engine state, created by the first initialize()
static ENGINE_STATE: OnceLock<EngineState> = OnceLock::new();

/// Active logger; DefaultLogger until set_logger() swaps it
static LOGGER: OnceLock<RwLock<Box<dyn Logger>>> = OnceLock::new();

/// Singletons owned by the initialized engine
struct EngineState {
    /// Graphics backend, present between create_graphics and destroy_graphics
    graphics: RwLock<Option<Arc<Mutex<dyn Graphics>>>>,
}

impl EngineState {
    fn new() -> Self {
        Self {
            graphics: RwLock::new(None),
        }
    }
}

// ===== SINGLETON API =====

/// Engine singleton manager
///
/// Owns the graphics backend's lifecycle: created once, reachable from
/// anywhere, destroyed at shutdown.
///
/// # Example
///
/// ```no_run
/// use ember_2d_engine::ember2d::Engine;
/// use ember_2d_engine::ember2d::graphics::{GraphicsConfig, ShaderStages};
/// use ember_2d_engine_renderer_vulkan::VulkanGraphics;
///
/// # fn boot(window: &winit::window::Window, default_shader: ShaderStages, config: GraphicsConfig) -> ember_2d_engine::ember2d::Result<()> {
/// // Boot once at startup
/// Engine::initialize()?;
///
/// // Create graphics singleton
/// Engine::create_graphics(VulkanGraphics::new(window, default_shader, config)?)?;
///
/// // Access graphics globally
/// let graphics = Engine::graphics()?;
///
/// // Shut down at exit
/// Engine::shutdown();
/// # Ok(())
/// # }
/// ```
pub struct Engine;

impl Engine {
    /// Log an error through the engine logger before handing it to the caller
    fn log_and_return_error(error: Error) -> Error {
        crate::engine_error!("ember2d::Engine", "{}", error);
        error
    }

    /// Initialize the engine
    ///
    /// Call once at application startup, before creating any singleton.
    ///
    /// # Errors
    ///
    /// Always succeeds today; the Result leaves room for fallible setup.
    pub fn initialize() -> Result<()> {
        ENGINE_STATE.get_or_init(|| EngineState::new());
        Ok(())
    }

    /// Drop every singleton the engine holds
    ///
    /// The graphics backend is released here; its Drop tears the GPU state
    /// down once the last outside reference goes away.
    pub fn shutdown() {
        if let Some(state) = ENGINE_STATE.get() {
            if let Ok(mut graphics) = state.graphics.write() {
                *graphics = None;
            }
        }
    }

    /// Wrap a backend in `Arc<Mutex<..>>` and register it as the singleton
    ///
    /// # Errors
    ///
    /// Fails when the engine is not initialized, when a backend is already
    /// registered, or when the lock is poisoned.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use ember_2d_engine::ember2d::Engine;
    /// use ember_2d_engine::ember2d::graphics::{GraphicsConfig, ShaderStages};
    /// use ember_2d_engine_renderer_vulkan::VulkanGraphics;
    ///
    /// # fn boot(window: &winit::window::Window, default_shader: ShaderStages) -> ember_2d_engine::ember2d::Result<()> {
    /// Engine::initialize()?;
    /// Engine::create_graphics(VulkanGraphics::new(window, default_shader, GraphicsConfig::default())?)?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn create_graphics<G: Graphics + 'static>(graphics: G) -> Result<()> {
        let arc_graphics: Arc<Mutex<dyn Graphics>> = Arc::new(Mutex::new(graphics));

        Self::register_graphics(arc_graphics)?;

        crate::engine_info!("ember2d::Engine", "Graphics singleton created successfully");

        Ok(())
    }

    /// Register an already-wrapped backend
    ///
    /// Split out of `create_graphics` so crate code holding an
    /// `Arc<Mutex<dyn Graphics>>` (a plugin factory result) can register it
    /// without unwrapping.
    pub(crate) fn register_graphics(graphics: Arc<Mutex<dyn Graphics>>) -> Result<()> {
        let state = ENGINE_STATE.get()
            .ok_or_else(|| Self::log_and_return_error(
                Error::InitializationFailed("Engine not initialized; call Engine::initialize() first".to_string())
            ))?;

        let mut lock = state.graphics.write()
            .map_err(|_| Self::log_and_return_error(
                Error::BackendError("Graphics lock poisoned".to_string())
            ))?;

        if lock.is_some() {
            return Err(Self::log_and_return_error(
                Error::InitializationFailed("Graphics backend already exists. Call Engine::destroy_graphics() first.".to_string())
            ));
        }

        *lock = Some(graphics);
        Ok(())
    }

    /// Get the graphics backend singleton
    ///
    /// # Errors
    ///
    /// Fails when the engine is not initialized or no backend has been
    /// created yet.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use ember_2d_engine::ember2d::Engine;
    ///
    /// let graphics = Engine::graphics()?;
    /// let graphics_guard = graphics.lock().unwrap();
    /// // Use graphics_guard...
    /// # Ok::<(), ember_2d_engine::ember2d::Error>(())
    /// ```
    pub fn graphics() -> Result<Arc<Mutex<dyn Graphics>>> {
        let state = ENGINE_STATE.get()
            .ok_or_else(|| Self::log_and_return_error(
                Error::InitializationFailed("Engine not initialized; call Engine::initialize() first".to_string())
            ))?;

        let lock = state.graphics.read()
            .map_err(|_| Self::log_and_return_error(
                Error::BackendError("Graphics lock poisoned".to_string())
            ))?;

        lock.clone()
            .ok_or_else(|| Self::log_and_return_error(
                Error::InitializationFailed("Graphics backend not created. Call Engine::create_graphics() first.".to_string())
            ))
    }

    /// Drop the graphics backend singleton so a new one can be created
    ///
    /// References handed out earlier stay valid until their holders drop
    /// them; the GPU teardown runs when the last one goes.
    ///
    /// # Errors
    ///
    /// Fails when the engine is not initialized.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use ember_2d_engine::ember2d::Engine;
    ///
    /// Engine::destroy_graphics()?;
    /// # Ok::<(), ember_2d_engine::ember2d::Error>(())
    /// ```
    pub fn destroy_graphics() -> Result<()> {
        let state = ENGINE_STATE.get()
            .ok_or_else(|| Self::log_and_return_error(
                Error::InitializationFailed("Engine not initialized; call Engine::initialize() first".to_string())
            ))?;

        let mut lock = state.graphics.write()
            .map_err(|_| Self::log_and_return_error(
                Error::BackendError("Graphics lock poisoned".to_string())
            ))?;

        *lock = None;

        crate::engine_info!("ember2d::Engine", "Graphics singleton destroyed");

        Ok(())
    }

    /// Clear every singleton between tests
    #[cfg(test)]
    pub fn reset_for_testing() {
        if let Some(state) = ENGINE_STATE.get() {
            if let Ok(mut graphics) = state.graphics.write() {
                *graphics = None;
            }
        }
    }

    // ===== LOGGING =====

    /// Replace the global logger
    ///
    /// Every engine and backend log entry goes through the installed
    /// logger from this point on.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use ember_2d_engine::ember2d::{Engine, log::{Logger, LogEntry}};
    ///
    /// struct QuietLogger;
    /// impl Logger for QuietLogger {
    ///     fn log(&self, _entry: &LogEntry) {}
    /// }
    ///
    /// Engine::set_logger(QuietLogger);
    /// ```
    pub fn set_logger<L: Logger + 'static>(logger: L) {
        let logger_lock = LOGGER.get_or_init(|| RwLock::new(Box::new(DefaultLogger)));
        if let Ok(mut lock) = logger_lock.write() {
            *lock = Box::new(logger);
        }
    }

    /// Go back to the colored console `DefaultLogger`
    ///
    /// # Example
    ///
    /// ```no_run
    /// use ember_2d_engine::ember2d::Engine;
    ///
    /// Engine::reset_logger();
    /// ```
    pub fn reset_logger() {
        let logger_lock = LOGGER.get_or_init(|| RwLock::new(Box::new(DefaultLogger)));
        if let Ok(mut lock) = logger_lock.write() {
            *lock = Box::new(DefaultLogger);
        }
    }

    /// Route a plain entry to the installed logger
    ///
    /// Target of the engine_trace!/engine_debug!/engine_info!/engine_warn!
    /// macros; no call-site information is attached.
    pub fn log(severity: LogSeverity, source: &str, message: String) {
        let logger_lock = LOGGER.get_or_init(|| RwLock::new(Box::new(DefaultLogger)));
        if let Ok(lock) = logger_lock.read() {
            lock.log(&LogEntry {
                severity,
                timestamp: SystemTime::now(),
                source: source.to_string(),
                message,
                file: None,
                line: None,
            });
        }
    }

    /// Route an entry carrying its call site to the installed logger
    ///
    /// Target of engine_error! and engine_err!, which pass file!/line!.
    pub fn log_detailed(
        severity: LogSeverity,
        source: &str,
        message: String,
        file: &'static str,
        line: u32,
    ) {
        let logger_lock = LOGGER.get_or_init(|| RwLock::new(Box::new(DefaultLogger)));
        if let Ok(lock) = logger_lock.read() {
            lock.log(&LogEntry {
                severity,
                timestamp: SystemTime::now(),
                source: source.to_string(),
                message,
                file: Some(file),
                line: Some(line),
            });
        }
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;

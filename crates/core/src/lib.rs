// Playback controller library
// Drives an asynchronous audio engine through a guarded state machine

pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod listener;
pub mod session;
pub mod state;

mod poller;

#[cfg(test)]
mod testing;

// Re-exports
pub use config::{ControllerConfig, DEFAULT_POLL_INTERVAL_MS};
pub use controller::PlaybackController;
pub use engine::{EngineAdapter, EngineEvent, EngineEvents, PlaybackEngine};
pub use error::{EngineError, PlaybackError, Result};
pub use listener::{ListenerRegistry, PlayerEvent, PlayerListener};
pub use session::SessionHandle;
pub use state::{Command, PlaybackState};

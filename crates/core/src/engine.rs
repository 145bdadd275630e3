// Contract between the controller and the audio engine it drives

use crate::error::EngineError;
use std::fmt;
use std::sync::Arc;

/// Uniform engine callback type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Preparation finished; the engine accepts `start`
    Ready,
    BufferingProgress(u8),
    SeekCompleted,
    PlaybackCompleted,
    Error(EngineError),
}

/// Callback sink handed to the engine on every `load`.
///
/// Safe to clone and to call from any engine-owned thread. Delivery never
/// blocks on the controller.
#[derive(Clone)]
pub struct EngineEvents {
    deliver: Arc<dyn Fn(EngineEvent) + Send + Sync>,
}

impl EngineEvents {
    pub fn new(deliver: impl Fn(EngineEvent) + Send + Sync + 'static) -> Self {
        Self {
            deliver: Arc::new(deliver),
        }
    }

    pub fn emit(&self, event: EngineEvent) {
        (self.deliver)(event);
    }

    pub fn ready(&self) {
        self.emit(EngineEvent::Ready);
    }

    pub fn buffering_progress(&self, percent: u8) {
        self.emit(EngineEvent::BufferingProgress(percent.min(100)));
    }

    pub fn seek_completed(&self) {
        self.emit(EngineEvent::SeekCompleted);
    }

    pub fn playback_completed(&self) {
        self.emit(EngineEvent::PlaybackCompleted);
    }

    pub fn error(&self, error: EngineError) {
        self.emit(EngineEvent::Error(error));
    }
}

impl fmt::Debug for EngineEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineEvents").finish_non_exhaustive()
    }
}

/// Audio decode/render engine capability.
///
/// Commands are fire-and-forget: their outcome arrives later through the
/// `EngineEvents` passed to `load`. Calls outside an engine's preconditions
/// must fail with `EngineError::InvalidState` rather than be executed.
pub trait PlaybackEngine: Send {
    /// Reset to a clean slate and begin preparing `source_uri`.
    /// Open failures are reported through `events.error`.
    fn load(&mut self, source_uri: &str, events: EngineEvents);

    fn start(&mut self) -> Result<(), EngineError>;

    fn pause(&mut self) -> Result<(), EngineError>;

    fn stop(&mut self) -> Result<(), EngineError>;

    fn seek_to(&mut self, position_ms: u64) -> Result<(), EngineError>;

    /// Last known playhead position, non-blocking
    fn current_position_ms(&self) -> u64;

    /// Last known source length, non-blocking
    fn duration_ms(&self) -> u64;

    /// Free engine resources. Called at most once by the adapter.
    fn release(&mut self);
}

/// Controller-side shim around a `PlaybackEngine`.
///
/// Makes `release` idempotent, turns every call after it into a no-op, and
/// hides position/duration reads until readiness has been observed.
pub struct EngineAdapter {
    engine: Box<dyn PlaybackEngine>,
    prepared: bool,
    released: bool,
}

impl EngineAdapter {
    pub fn new(engine: Box<dyn PlaybackEngine>) -> Self {
        Self {
            engine,
            prepared: false,
            released: false,
        }
    }

    pub fn load(&mut self, source_uri: &str, events: EngineEvents) {
        if self.released {
            return;
        }
        self.prepared = false;
        self.engine.load(source_uri, events);
    }

    pub fn start(&mut self) -> Result<(), EngineError> {
        if self.released {
            return Ok(());
        }
        self.engine.start()
    }

    pub fn pause(&mut self) -> Result<(), EngineError> {
        if self.released {
            return Ok(());
        }
        self.engine.pause()
    }

    pub fn stop(&mut self) -> Result<(), EngineError> {
        if self.released {
            return Ok(());
        }
        self.engine.stop()
    }

    pub fn seek_to(&mut self, position_ms: u64) -> Result<(), EngineError> {
        if self.released {
            return Ok(());
        }
        self.engine.seek_to(position_ms)
    }

    pub fn current_position_ms(&self) -> u64 {
        if self.released || !self.prepared {
            return 0;
        }
        self.engine.current_position_ms()
    }

    pub fn duration_ms(&self) -> u64 {
        if self.released || !self.prepared {
            return 0;
        }
        self.engine.duration_ms()
    }

    /// Record that the engine signalled readiness for the current load
    pub fn mark_prepared(&mut self) {
        self.prepared = true;
    }

    /// Forget readiness, e.g. after the engine failed
    pub fn mark_unprepared(&mut self) {
        self.prepared = false;
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.prepared = false;
        self.engine.release();
    }
}
